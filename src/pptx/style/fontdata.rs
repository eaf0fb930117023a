//! Per-level font data and the generation-keyed resolution cache.
//!
//! A FontData is one rung of the style cascade: every field is either set
//! or inherited. Merging fills only unset fields, so a child's explicit
//! value always survives.

use crate::pptx::style::color::ColorRef;
use crate::pptx::xmlutil;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;

/// Resolvable font fields at one outline level of the cascade.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontData {
    /// Font size in hundredths of a point (e.g. 1800 = 18pt)
    pub size: Option<i32>,
    /// Latin typeface name
    pub latin: Option<String>,
    /// Bold flag
    pub bold: Option<bool>,
    /// Italic flag
    pub italic: Option<bool>,
    /// Font color
    pub color: Option<ColorRef>,
}

impl FontData {
    /// True when every field has a value and nothing remains to inherit.
    pub fn is_filled(&self) -> bool {
        self.size.is_some()
            && self.latin.is_some()
            && self.bold.is_some()
            && self.italic.is_some()
            && self.color.is_some()
    }

    /// Fill unset fields from a parent rung of the cascade.
    ///
    /// Explicit fields are never overwritten.
    pub fn merge_from(&mut self, parent: &FontData) {
        if self.size.is_none() {
            self.size = parent.size;
        }
        if self.latin.is_none() {
            self.latin = parent.latin.clone();
        }
        if self.bold.is_none() {
            self.bold = parent.bold;
        }
        if self.italic.is_none() {
            self.italic = parent.italic;
        }
        if self.color.is_none() {
            self.color = parent.color.clone();
        }
    }

    /// Read font fields from the attributes and children of a run-properties
    /// element (`<a:defRPr>`, `<a:rPr>`, `<a:endParaRPr>`).
    ///
    /// `element_xml` must be the complete element bytes.
    pub fn from_run_props(element_xml: &[u8]) -> FontData {
        let mut data = FontData::default();

        let mut reader = Reader::from_reader(element_xml);
        let mut buf = Vec::new();
        let mut root_seen = false;
        let mut in_fill = false;
        let mut in_outline = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    let local = e.local_name();
                    if !root_seen {
                        root_seen = true;
                        if let Some(sz) = xmlutil::attr(e, b"sz") {
                            data.size = sz.parse().ok();
                        }
                        if let Some(b) = xmlutil::attr(e, b"b") {
                            data.bold = Some(b == "1" || b == "true");
                        }
                        if let Some(i) = xmlutil::attr(e, b"i") {
                            data.italic = Some(i == "1" || i == "true");
                        }
                        continue;
                    }
                    match local.as_ref() {
                        // Outline fills are not font colors; skip the subtree.
                        b"ln" => in_outline = true,
                        b"solidFill" if !in_outline => in_fill = true,
                        b"latin" => {
                            if data.latin.is_none() {
                                data.latin = xmlutil::attr(e, b"typeface");
                            }
                        }
                        b"srgbClr" if in_fill => {
                            if data.color.is_none() {
                                data.color = xmlutil::attr(e, b"val").map(ColorRef::Rgb);
                            }
                        }
                        b"schemeClr" if in_fill => {
                            if data.color.is_none() {
                                data.color = xmlutil::attr(e, b"val").map(ColorRef::Scheme);
                            }
                        }
                        b"sysClr" if in_fill => {
                            if data.color.is_none() {
                                data.color = xmlutil::attr(e, b"lastClr")
                                    .or_else(|| xmlutil::attr(e, b"val"))
                                    .map(ColorRef::System);
                            }
                        }
                        b"prstClr" if in_fill => {
                            if data.color.is_none() {
                                data.color = xmlutil::attr(e, b"val").map(ColorRef::Preset);
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                    b"solidFill" => in_fill = false,
                    b"ln" => in_outline = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(_) => break,
                _ => {}
            }
            buf.clear();
        }

        data
    }
}

/// Parse a level-style container (`<a:lstStyle>`, `<p:titleStyle>`, ...)
/// into a map of outline level (0-based) to FontData.
///
/// Level properties appear as `<a:lvl1pPr>` through `<a:lvl9pPr>`, each with
/// an optional `<a:defRPr>` child carrying the font fields.
pub fn parse_level_styles(container_xml: &[u8]) -> HashMap<u8, FontData> {
    let mut levels = HashMap::new();

    for level in 0u8..9 {
        let qname = format!("a:lvl{}pPr", level + 1);
        let Some(span) = xmlutil::element_span(container_xml, qname.as_bytes()) else {
            continue;
        };
        let lvl_xml = &container_xml[span.start..span.end];
        if let Some(def_span) = xmlutil::element_span(lvl_xml, b"a:defRPr") {
            let data = FontData::from_run_props(&lvl_xml[def_span.start..def_span.end]);
            if data != FontData::default() {
                levels.insert(level, data);
            }
        }
    }

    levels
}

/// Generation-keyed cache of resolved per-shape, per-level font data.
///
/// Any structural mutation bumps the owning presentation's generation; the
/// cache notices the mismatch on next access and drops everything, which is
/// deliberately conservative (whole-cache invalidation, never stale reads).
#[derive(Debug, Default)]
pub struct FontCache {
    generation: u64,
    entries: HashMap<(String, u32, u8), FontData>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop stale entries if the owning generation has moved on.
    fn sync(&mut self, generation: u64) {
        if self.generation != generation {
            self.entries.clear();
            self.generation = generation;
        }
    }

    /// Look up a cached resolution.
    pub fn get(
        &mut self,
        generation: u64,
        partname: &str,
        shape_id: u32,
        level: u8,
    ) -> Option<FontData> {
        self.sync(generation);
        self.entries
            .get(&(partname.to_string(), shape_id, level))
            .cloned()
    }

    /// Store a resolution computed at the given generation.
    pub fn put(
        &mut self,
        generation: u64,
        partname: &str,
        shape_id: u32,
        level: u8,
        data: FontData,
    ) {
        self.sync(generation);
        self.entries
            .insert((partname.to_string(), shape_id, level), data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_explicit_fields() {
        let mut child = FontData {
            size: Some(2400),
            ..Default::default()
        };
        let parent = FontData {
            size: Some(1800),
            latin: Some("Calibri".to_string()),
            bold: Some(true),
            ..Default::default()
        };

        child.merge_from(&parent);
        assert_eq!(child.size, Some(2400));
        assert_eq!(child.latin.as_deref(), Some("Calibri"));
        assert_eq!(child.bold, Some(true));
        assert!(!child.is_filled());
    }

    #[test]
    fn test_from_run_props() {
        let xml = br#"<a:defRPr sz="1800" b="1" i="0"><a:solidFill><a:schemeClr val="accent1"/></a:solidFill><a:latin typeface="Arial"/></a:defRPr>"#;
        let data = FontData::from_run_props(xml);

        assert_eq!(data.size, Some(1800));
        assert_eq!(data.bold, Some(true));
        assert_eq!(data.italic, Some(false));
        assert_eq!(data.latin.as_deref(), Some("Arial"));
        assert_eq!(data.color, Some(ColorRef::Scheme("accent1".to_string())));
    }

    #[test]
    fn test_parse_level_styles() {
        let xml = br#"<a:lstStyle>
            <a:lvl1pPr><a:defRPr sz="1800"/></a:lvl1pPr>
            <a:lvl3pPr><a:defRPr sz="1400" b="1"/></a:lvl3pPr>
        </a:lstStyle>"#;
        let levels = parse_level_styles(xml);

        assert_eq!(levels.len(), 2);
        assert_eq!(levels[&0].size, Some(1800));
        assert_eq!(levels[&2].size, Some(1400));
        assert_eq!(levels[&2].bold, Some(true));
        assert!(!levels.contains_key(&1));
    }

    #[test]
    fn test_font_cache_generation_invalidation() {
        let mut cache = FontCache::new();
        let data = FontData {
            size: Some(1800),
            ..Default::default()
        };

        cache.put(1, "/ppt/slides/slide1.xml", 2, 0, data.clone());
        assert_eq!(cache.get(1, "/ppt/slides/slide1.xml", 2, 0), Some(data));

        // Bumped generation drops everything.
        assert_eq!(cache.get(2, "/ppt/slides/slide1.xml", 2, 0), None);
    }
}
