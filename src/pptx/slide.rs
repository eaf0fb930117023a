//! Per-slide accessors over the slide part's XML.
//!
//! The shape tree is handled by `shapes::tree`; this module covers the
//! slide-root concerns: the hidden flag and the background image reference.

use crate::pptx::xmlutil;
use quick_xml::Reader;
use quick_xml::events::Event;

/// Whether the slide is hidden (`show="0"` on the slide root).
pub fn is_hidden(slide_xml: &[u8]) -> bool {
    let mut reader = Reader::from_reader(slide_xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"sld" {
                    return xmlutil::attr(e, b"show").as_deref() == Some("0");
                }
            }
            Ok(Event::Eof) => return false,
            Err(_) => return false,
            _ => {}
        }
        buf.clear();
    }
}

/// Set or clear the hidden flag on the slide root.
pub fn set_hidden(slide_xml: &[u8], hidden: bool) -> Option<Vec<u8>> {
    let show = if hidden { "0" } else { "1" };
    xmlutil::rewrite_attrs(slide_xml, b"p:sld", &[("show", show)])
}

/// The image relationship id of the slide background, if the slide has a
/// picture-filled background.
///
/// Absence is expected control flow: callers check this before reading or
/// replacing background bytes.
pub fn background_blip_rid(slide_xml: &[u8]) -> Option<String> {
    let bg = xmlutil::element_span(slide_xml, b"p:bg")?;
    let bg_xml = &slide_xml[bg.start..bg.end];
    let blip = xmlutil::element_span(bg_xml, b"a:blip")?;

    let mut reader = Reader::from_reader(&bg_xml[blip.start..blip.end]);
    let mut buf = Vec::new();
    if let Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) = reader.read_event_into(&mut buf) {
        return xmlutil::attr(e, b"r:embed");
    }
    None
}

/// Repoint the background blip at another image relationship.
pub fn set_background_blip_rid(slide_xml: &[u8], r_id: &str) -> Option<Vec<u8>> {
    let bg = xmlutil::element_span(slide_xml, b"p:bg")?;
    let bg_xml = &slide_xml[bg.start..bg.end];
    let patched = xmlutil::rewrite_attrs(bg_xml, b"a:blip", &[("r:embed", r_id)])?;

    let mut out = Vec::with_capacity(slide_xml.len() + 16);
    out.extend_from_slice(&slide_xml[..bg.start]);
    out.extend_from_slice(&patched);
    out.extend_from_slice(&slide_xml[bg.end..]);
    Some(out)
}
