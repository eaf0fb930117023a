//! Custom slide show support.
//!
//! Custom shows are named subsets of slides kept in the presentation root's
//! `<p:custShowLst>`. Entries reference slides by relationship id, which is
//! why removing a slide must scrub every show of the removed rId.

use crate::error::{Error, Result};
use crate::pptx::xmlutil::{self, escape_xml};
use quick_xml::Reader;
use quick_xml::events::Event;

/// A custom slide show definition.
#[derive(Debug, Clone)]
pub struct CustomShow {
    /// Unique id of the custom show
    pub id: u32,
    /// Display name of the custom show
    pub name: String,
    /// Slide relationship ids included in the show, in show order
    pub slide_rids: Vec<String>,
}

impl CustomShow {
    /// Create a new custom show.
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            slide_rids: Vec::new(),
        }
    }

    /// Set slides with builder pattern.
    pub fn with_slides(mut self, slide_rids: Vec<String>) -> Self {
        self.slide_rids = slide_rids;
        self
    }

    /// Get the number of slides in the custom show.
    pub fn slide_count(&self) -> usize {
        self.slide_rids.len()
    }
}

/// Collection of custom slide shows for a presentation.
#[derive(Debug, Clone, Default)]
pub struct CustomShowList {
    /// List of custom shows
    pub shows: Vec<CustomShow>,
    /// Next available id for new shows
    next_id: u32,
}

impl CustomShowList {
    /// Create a new empty custom show list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a custom show to the list.
    pub fn add(&mut self, show: CustomShow) {
        if show.id >= self.next_id {
            self.next_id = show.id + 1;
        }
        self.shows.push(show);
    }

    /// Create and add a new custom show.
    pub fn create(&mut self, name: impl Into<String>, slide_rids: Vec<String>) -> &CustomShow {
        let show = CustomShow::new(self.next_id, name).with_slides(slide_rids);
        self.next_id += 1;
        self.shows.push(show);
        self.shows.last().unwrap()
    }

    /// Get a custom show by name.
    pub fn get_by_name(&self, name: &str) -> Option<&CustomShow> {
        self.shows.iter().find(|s| s.name == name)
    }

    /// Remove a custom show by name.
    pub fn remove_by_name(&mut self, name: &str) -> Option<CustomShow> {
        let pos = self.shows.iter().position(|s| s.name == name)?;
        Some(self.shows.remove(pos))
    }

    /// Scrub every show of references to a slide relationship id.
    ///
    /// Called when a slide is removed; a reference left behind would dangle.
    pub fn remove_slide_rid(&mut self, r_id: &str) {
        for show in &mut self.shows {
            show.slide_rids.retain(|rid| rid != r_id);
        }
    }

    /// Get the number of custom shows.
    pub fn len(&self) -> usize {
        self.shows.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.shows.is_empty()
    }

    /// Parse the `<p:custShowLst>` element out of presentation XML.
    ///
    /// Returns an empty list when the element is absent.
    pub fn parse(presentation_xml: &[u8]) -> Result<Self> {
        let mut list = Self::new();
        let Some(span) = xmlutil::element_span(presentation_xml, b"p:custShowLst") else {
            return Ok(list);
        };

        let mut reader = Reader::from_reader(&presentation_xml[span.start..span.end]);
        reader.config_mut().trim_text(true);

        let mut current_show: Option<CustomShow> = None;
        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    match e.local_name().as_ref() {
                        b"custShow" => {
                            let name = xmlutil::attr(e, b"name").unwrap_or_default();
                            let id = xmlutil::attr(e, b"id")
                                .and_then(|v| v.parse().ok())
                                .unwrap_or(0);
                            current_show = Some(CustomShow::new(id, name));
                        }
                        b"sld" => {
                            if let Some(ref mut show) = current_show
                                && let Some(rid) = xmlutil::attr(e, b"r:id")
                            {
                                show.slide_rids.push(rid);
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::End(ref e)) => {
                    if e.local_name().as_ref() == b"custShow"
                        && let Some(show) = current_show.take()
                    {
                        list.add(show);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::Xml(format!("custShowLst: {}", e))),
                _ => {}
            }
        }

        Ok(list)
    }

    /// Generate the `<p:custShowLst>` element.
    ///
    /// Returns an empty string when there are no shows, so the element
    /// disappears from the presentation root entirely.
    pub fn to_xml(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut xml = String::with_capacity(1024);
        xml.push_str("<p:custShowLst>");
        for show in &self.shows {
            xml.push_str(&format!(
                r#"<p:custShow name="{}" id="{}">"#,
                escape_xml(&show.name),
                show.id
            ));
            xml.push_str("<p:sldLst>");
            for rid in &show.slide_rids {
                xml.push_str(&format!(r#"<p:sld r:id="{}"/>"#, escape_xml(rid)));
            }
            xml.push_str("</p:sldLst>");
            xml.push_str("</p:custShow>");
        }
        xml.push_str("</p:custShowLst>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_show_creation() {
        let show = CustomShow::new(0, "Executive Summary").with_slides(vec![
            "rId2".to_string(),
            "rId3".to_string(),
            "rId7".to_string(),
        ]);

        assert_eq!(show.name, "Executive Summary");
        assert_eq!(show.slide_count(), 3);
    }

    #[test]
    fn test_parse_and_serialize() {
        let xml = br#"<p:presentation><p:sldIdLst/><p:custShowLst><p:custShow name="Demo" id="0"><p:sldLst><p:sld r:id="rId2"/><p:sld r:id="rId3"/></p:sldLst></p:custShow></p:custShowLst></p:presentation>"#;
        let list = CustomShowList::parse(xml).unwrap();

        assert_eq!(list.len(), 1);
        let show = list.get_by_name("Demo").unwrap();
        assert_eq!(show.slide_rids, vec!["rId2", "rId3"]);

        let out = list.to_xml();
        let reparsed =
            CustomShowList::parse(format!("<p:presentation>{}</p:presentation>", out).as_bytes())
                .unwrap();
        assert_eq!(reparsed.get_by_name("Demo").unwrap().slide_rids.len(), 2);
    }

    #[test]
    fn test_absent_element_is_empty_list() {
        let list = CustomShowList::parse(b"<p:presentation><p:sldIdLst/></p:presentation>")
            .unwrap();
        assert!(list.is_empty());
        assert_eq!(list.to_xml(), "");
    }

    #[test]
    fn test_remove_slide_rid_scrubs_all_shows() {
        let mut list = CustomShowList::new();
        list.create("A", vec!["rId2".to_string(), "rId3".to_string()]);
        list.create("B", vec!["rId3".to_string(), "rId4".to_string()]);

        list.remove_slide_rid("rId3");

        assert_eq!(list.get_by_name("A").unwrap().slide_rids, vec!["rId2"]);
        assert_eq!(list.get_by_name("B").unwrap().slide_rids, vec!["rId4"]);
    }

    #[test]
    fn test_ids_allocate_past_existing() {
        let mut list = CustomShowList::new();
        list.add(CustomShow::new(5, "Existing"));
        let created = list.create("New", vec![]);
        assert_eq!(created.id, 6);
    }
}
