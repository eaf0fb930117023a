//! Byte-span XML helpers shared by the mutating layers.
//!
//! Shape and part mutations patch serialized XML in place rather than
//! rebuilding whole documents, so unmodeled content survives a round trip.
//! These helpers locate element spans and rewrite start-tag attributes on
//! raw bytes, using fast substring search to find candidate positions.

use memchr::memmem;
use quick_xml::events::BytesStart;

pub(crate) use crate::opc::rel::escape_xml;

/// A byte range covering a complete element, start tag through end tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// True if `b` can terminate an element name inside a tag.
#[inline]
fn is_name_end(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'/' | b'>')
}

/// Find the offset of the next `<qname` start tag at or after `from`,
/// rejecting longer names that merely share the prefix.
fn find_tag_start(xml: &[u8], qname: &[u8], from: usize) -> Option<usize> {
    let pattern = {
        let mut p = Vec::with_capacity(qname.len() + 1);
        p.push(b'<');
        p.extend_from_slice(qname);
        p
    };
    let finder = memmem::Finder::new(&pattern);
    let mut at = from;
    while let Some(rel) = finder.find(&xml[at..]) {
        let pos = at + rel;
        let after = pos + pattern.len();
        if after >= xml.len() || is_name_end(xml[after]) {
            return Some(pos);
        }
        at = pos + 1;
    }
    None
}

/// Find the end of the start tag beginning at `start`.
///
/// Returns the index one past `>` and whether the tag is self-closing.
fn start_tag_end(xml: &[u8], start: usize) -> Option<(usize, bool)> {
    let close = memchr::memchr(b'>', &xml[start..])? + start;
    let empty = close > start && xml[close - 1] == b'/';
    Some((close + 1, empty))
}

/// Find the byte span of the first `<qname>` element at or after `from`.
///
/// Handles self-closing elements and same-name nesting (group shapes).
pub fn element_span_from(xml: &[u8], qname: &[u8], from: usize) -> Option<Span> {
    let start = find_tag_start(xml, qname, from)?;
    let (mut cursor, empty) = start_tag_end(xml, start)?;
    if empty {
        return Some(Span { start, end: cursor });
    }

    let end_pattern = {
        let mut p = Vec::with_capacity(qname.len() + 3);
        p.extend_from_slice(b"</");
        p.extend_from_slice(qname);
        p.push(b'>');
        p
    };
    let end_finder = memmem::Finder::new(&end_pattern);

    let mut depth = 1usize;
    loop {
        let next_end = end_finder.find(&xml[cursor..]).map(|r| cursor + r)?;
        // Count same-name openings between here and the candidate end tag.
        let mut scan = cursor;
        while let Some(open) = find_tag_start(xml, qname, scan) {
            if open >= next_end {
                break;
            }
            let (after_open, open_empty) = start_tag_end(xml, open)?;
            if !open_empty {
                depth += 1;
            }
            scan = after_open;
        }
        depth -= 1;
        cursor = next_end + end_pattern.len();
        if depth == 0 {
            return Some(Span {
                start,
                end: cursor,
            });
        }
    }
}

/// Find the byte span of the first `<qname>` element.
pub fn element_span(xml: &[u8], qname: &[u8]) -> Option<Span> {
    element_span_from(xml, qname, 0)
}

/// Replace the first `<qname>` element with `replacement`.
pub fn replace_element(xml: &[u8], qname: &[u8], replacement: &[u8]) -> Option<Vec<u8>> {
    let span = element_span(xml, qname)?;
    let mut out = Vec::with_capacity(xml.len() - (span.end - span.start) + replacement.len());
    out.extend_from_slice(&xml[..span.start]);
    out.extend_from_slice(replacement);
    out.extend_from_slice(&xml[span.end..]);
    Some(out)
}

/// Insert `content` immediately before the first occurrence of `marker`.
pub fn insert_before(xml: &[u8], marker: &[u8], content: &[u8]) -> Option<Vec<u8>> {
    let pos = memmem::find(xml, marker)?;
    let mut out = Vec::with_capacity(xml.len() + content.len());
    out.extend_from_slice(&xml[..pos]);
    out.extend_from_slice(content);
    out.extend_from_slice(&xml[pos..]);
    Some(out)
}

/// Rewrite attributes on the first `<qname>` start tag.
///
/// Each `(key, value)` pair replaces the existing attribute of that name or
/// is appended if absent. Attribute order is otherwise preserved. Values are
/// escaped here; pass them raw.
pub fn rewrite_attrs(xml: &[u8], qname: &[u8], updates: &[(&str, &str)]) -> Option<Vec<u8>> {
    let start = find_tag_start(xml, qname, 0)?;
    let (tag_end, empty) = start_tag_end(xml, start)?;
    let content_end = if empty { tag_end - 2 } else { tag_end - 1 };

    let content = std::str::from_utf8(&xml[start + 1..content_end]).ok()?;
    let bs = BytesStart::from_content(content, qname.len());

    let mut tag = String::with_capacity(content.len() + 32);
    tag.push('<');
    tag.push_str(std::str::from_utf8(qname).ok()?);

    let mut written: Vec<&str> = Vec::new();
    for attr in bs.attributes().flatten() {
        let key = std::str::from_utf8(attr.key.as_ref()).ok()?.to_string();
        let value = match updates.iter().find(|(k, _)| *k == key) {
            Some((_, v)) => escape_xml(v),
            None => std::str::from_utf8(&attr.value).ok()?.to_string(),
        };
        tag.push(' ');
        tag.push_str(&key);
        tag.push_str("=\"");
        tag.push_str(&value);
        tag.push('"');
        if let Some((k, _)) = updates.iter().find(|(k, _)| *k == key) {
            written.push(*k);
        }
    }
    for (key, value) in updates {
        if !written.contains(key) {
            tag.push(' ');
            tag.push_str(key);
            tag.push_str("=\"");
            tag.push_str(&escape_xml(value));
            tag.push('"');
        }
    }
    if empty {
        tag.push('/');
    }
    tag.push('>');

    let mut out = Vec::with_capacity(xml.len() + 32);
    out.extend_from_slice(&xml[..start]);
    out.extend_from_slice(tag.as_bytes());
    out.extend_from_slice(&xml[tag_end..]);
    Some(out)
}

/// Get an attribute value from a start tag by its qualified name.
pub fn attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    for a in e.attributes().flatten() {
        if a.key.as_ref() == key {
            return a.unescape_value().ok().map(|v| v.to_string());
        }
    }
    None
}

/// Get an attribute value from a start tag by its local (unprefixed) name.
pub fn local_attr(e: &BytesStart, local: &[u8]) -> Option<String> {
    for a in e.attributes().flatten() {
        if a.key.local_name().as_ref() == local {
            return a.unescape_value().ok().map(|v| v.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_span_simple() {
        let xml = b"<p:sld><p:cSld><p:spTree a=\"1\">x</p:spTree></p:cSld></p:sld>";
        let span = element_span(xml, b"p:spTree").unwrap();
        assert_eq!(&xml[span.start..span.end], b"<p:spTree a=\"1\">x</p:spTree>");
    }

    #[test]
    fn test_element_span_self_closing() {
        let xml = br#"<a:pPr lvl="2"/><a:r/>"#;
        let span = element_span(xml, b"a:pPr").unwrap();
        assert_eq!(&xml[span.start..span.end], br#"<a:pPr lvl="2"/>"#);
    }

    #[test]
    fn test_element_span_rejects_prefix_collision() {
        // <p:sldIdLst> must not match a search for <p:sld>.
        let xml = b"<p:sldIdLst><p:sldId/></p:sldIdLst><p:sld>x</p:sld>";
        let span = element_span(xml, b"p:sld").unwrap();
        assert_eq!(&xml[span.start..span.end], b"<p:sld>x</p:sld>");
    }

    #[test]
    fn test_element_span_nested_same_name() {
        let xml = b"<p:grpSp><p:grpSp><p:sp/></p:grpSp><p:sp/></p:grpSp><p:grpSp/>";
        let span = element_span(xml, b"p:grpSp").unwrap();
        assert_eq!(
            &xml[span.start..span.end],
            b"<p:grpSp><p:grpSp><p:sp/></p:grpSp><p:sp/></p:grpSp>" as &[u8]
        );
    }

    #[test]
    fn test_replace_element() {
        let xml = b"<p:sp><p:txBody><a:p/></p:txBody></p:sp>";
        let out = replace_element(xml, b"p:txBody", b"<p:txBody>new</p:txBody>").unwrap();
        assert_eq!(out, b"<p:sp><p:txBody>new</p:txBody></p:sp>");
    }

    #[test]
    fn test_insert_before() {
        let xml = b"<p:sp><p:spPr/></p:sp>";
        let out = insert_before(xml, b"</p:sp>", b"<p:txBody/>").unwrap();
        assert_eq!(out, b"<p:sp><p:spPr/><p:txBody/></p:sp>");
    }

    #[test]
    fn test_rewrite_attrs_replace_and_append() {
        let xml = br#"<p:cNvPr id="2" name="Title 1"/>"#;
        let out = rewrite_attrs(xml, b"p:cNvPr", &[("id", "7"), ("descr", "x & y")]).unwrap();
        assert_eq!(
            out,
            br#"<p:cNvPr id="7" name="Title 1" descr="x &amp; y"/>"# as &[u8]
        );
    }

    #[test]
    fn test_rewrite_attrs_on_open_tag() {
        let xml = br#"<p:sld show="1"><p:cSld/></p:sld>"#;
        let out = rewrite_attrs(xml, b"p:sld", &[("show", "0")]).unwrap();
        assert_eq!(out, br#"<p:sld show="0"><p:cSld/></p:sld>"# as &[u8]);
    }
}
