//! Theme part access: color scheme, font scheme, and the master color map.
//!
//! The theme part hangs off a slide master and terminates the style cascade:
//! any font or color field still unset after the master is filled from here.

use crate::error::Result;
use crate::pptx::xmlutil;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;

/// The named color slots of a theme color scheme (dk1, lt1, accent1, ...).
#[derive(Debug, Clone, Default)]
pub struct ColorScheme {
    slots: HashMap<String, String>,
}

impl ColorScheme {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: &str, hex: &str) {
        self.slots.insert(token.to_string(), hex.to_string());
    }

    /// Look up a scheme token, returning its RGB hex value.
    pub fn get(&self, token: &str) -> Option<&str> {
        self.slots.get(token).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// The master's token-to-token color map (`<p:clrMap>`), indirecting
/// bg1/tx1/bg2/tx2 onto concrete scheme slots.
#[derive(Debug, Clone, Default)]
pub struct ColorMap {
    entries: HashMap<String, String>,
}

impl ColorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: &str, to: &str) {
        self.entries.insert(from.to_string(), to.to_string());
    }

    /// Map a token onto the scheme slot it designates.
    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries.get(token).map(String::as_str)
    }

    /// Parse the `<p:clrMap>` element from slide master XML.
    ///
    /// Every attribute is a mapping, e.g. `tx1="dk1"`.
    pub fn from_master_xml(master_xml: &[u8]) -> Self {
        let mut map = Self::new();
        let Some(span) = xmlutil::element_span(master_xml, b"p:clrMap") else {
            return map;
        };
        let mut reader = Reader::from_reader(&master_xml[span.start..span.end]);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    if e.local_name().as_ref() == b"clrMap" {
                        for attr in e.attributes().flatten() {
                            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                            let value = String::from_utf8_lossy(&attr.value).to_string();
                            map.entries.insert(key, value);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(_) => break,
                _ => {}
            }
            buf.clear();
        }
        map
    }
}

/// Parsed theme part: color scheme slots plus the font scheme typefaces.
#[derive(Debug, Clone, Default)]
pub struct Theme {
    /// The theme color scheme
    pub color_scheme: ColorScheme,
    /// Major (heading) latin typeface
    pub major_latin: Option<String>,
    /// Minor (body) latin typeface
    pub minor_latin: Option<String>,
}

impl Theme {
    /// Parse a theme part's XML.
    pub fn parse(theme_xml: &[u8]) -> Result<Self> {
        let mut theme = Theme::default();

        let mut reader = Reader::from_reader(theme_xml);
        reader.config_mut().trim_text(true);

        // Scheme slot currently being read (dk1, accent1, ...), and which
        // font-scheme group we are inside.
        let mut slot: Option<String> = None;
        let mut in_clr_scheme = false;
        let mut font_group: Option<bool> = None; // Some(true) = major

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    match e.local_name().as_ref() {
                        b"clrScheme" => in_clr_scheme = true,
                        b"majorFont" => font_group = Some(true),
                        b"minorFont" => font_group = Some(false),
                        b"srgbClr" if in_clr_scheme => {
                            if let (Some(token), Some(hex)) =
                                (slot.as_ref(), xmlutil::attr(e, b"val"))
                            {
                                theme.color_scheme.insert(token, &hex);
                            }
                        }
                        b"sysClr" if in_clr_scheme => {
                            if let (Some(token), Some(hex)) =
                                (slot.as_ref(), xmlutil::attr(e, b"lastClr"))
                            {
                                theme.color_scheme.insert(token, &hex);
                            }
                        }
                        b"latin" => {
                            if let Some(face) = xmlutil::attr(e, b"typeface") {
                                match font_group {
                                    Some(true) => theme.major_latin = Some(face),
                                    Some(false) => theme.minor_latin = Some(face),
                                    None => {}
                                }
                            }
                        }
                        local if in_clr_scheme && slot.is_none() => {
                            slot = Some(String::from_utf8_lossy(local).to_string());
                        }
                        _ => {}
                    }
                }
                Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                    b"clrScheme" => in_clr_scheme = false,
                    b"majorFont" | b"minorFont" => font_group = None,
                    local => {
                        if slot.as_deref().map(str::as_bytes) == Some(local) {
                            slot = None;
                        }
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(crate::error::Error::Xml(format!("theme: {}", e))),
                _ => {}
            }
        }

        Ok(theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THEME_XML: &[u8] = br#"<?xml version="1.0"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office">
  <a:themeElements>
    <a:clrScheme name="Office">
      <a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1>
      <a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>
      <a:dk2><a:srgbClr val="44546A"/></a:dk2>
      <a:lt2><a:srgbClr val="E7E6E6"/></a:lt2>
      <a:accent1><a:srgbClr val="4472C4"/></a:accent1>
      <a:hlink><a:srgbClr val="0563C1"/></a:hlink>
    </a:clrScheme>
    <a:fontScheme name="Office">
      <a:majorFont><a:latin typeface="Calibri Light"/></a:majorFont>
      <a:minorFont><a:latin typeface="Calibri"/></a:minorFont>
    </a:fontScheme>
  </a:themeElements>
</a:theme>"#;

    #[test]
    fn test_parse_color_scheme() {
        let theme = Theme::parse(THEME_XML).unwrap();
        assert_eq!(theme.color_scheme.get("accent1"), Some("4472C4"));
        assert_eq!(theme.color_scheme.get("dk1"), Some("000000"));
        assert_eq!(theme.color_scheme.get("hlink"), Some("0563C1"));
        assert_eq!(theme.color_scheme.get("accent9"), None);
    }

    #[test]
    fn test_parse_font_scheme() {
        let theme = Theme::parse(THEME_XML).unwrap();
        assert_eq!(theme.major_latin.as_deref(), Some("Calibri Light"));
        assert_eq!(theme.minor_latin.as_deref(), Some("Calibri"));
    }

    #[test]
    fn test_color_map_from_master() {
        let master = br#"<p:sldMaster><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1"/></p:sldMaster>"#;
        let map = ColorMap::from_master_xml(master);
        assert_eq!(map.get("tx1"), Some("dk1"));
        assert_eq!(map.get("bg1"), Some("lt1"));
        assert_eq!(map.get("nope"), None);
    }
}
