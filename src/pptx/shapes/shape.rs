//! Shape nodes: the variant kinds, identity fields, and raw-XML mutation.
//!
//! A shape keeps its complete element XML as the source of truth; identity
//! fields (id, name, placeholder pairing, transform) are parsed eagerly
//! because the tree invariants depend on them. Mutations patch the raw
//! bytes in place so effects, geometry and other unmodeled content survive.

use crate::error::{Error, Result};
use crate::pptx::shapes::textframe::TextFrame;
use crate::pptx::xmlutil;
use quick_xml::Reader;
use quick_xml::events::Event;

/// The variant kinds of a shape-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// A geometry shape with an optional text frame (p:sp)
    AutoShape,
    /// A picture (p:pic)
    Picture,
    /// A graphic frame holding a table or chart (p:graphicFrame)
    GraphicFrame,
    /// A group of shapes (p:grpSp)
    Group,
    /// A connector (p:cxnSp)
    Connector,
}

impl ShapeKind {
    /// The element qname of this kind.
    pub fn qname(&self) -> &'static [u8] {
        match self {
            ShapeKind::AutoShape => b"p:sp",
            ShapeKind::Picture => b"p:pic",
            ShapeKind::GraphicFrame => b"p:graphicFrame",
            ShapeKind::Group => b"p:grpSp",
            ShapeKind::Connector => b"p:cxnSp",
        }
    }

    /// Classify an element local name.
    pub fn from_local_name(local: &[u8]) -> Option<ShapeKind> {
        match local {
            b"sp" => Some(ShapeKind::AutoShape),
            b"pic" => Some(ShapeKind::Picture),
            b"graphicFrame" => Some(ShapeKind::GraphicFrame),
            b"grpSp" => Some(ShapeKind::Group),
            b"cxnSp" => Some(ShapeKind::Connector),
            _ => None,
        }
    }
}

/// The placeholder role pairing a shape to its counterpart one level up the
/// inheritance chain. Matched by value, never by identity or position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaceholderKey {
    /// Placeholder type token (title, body, ctrTitle, subTitle, dt, ...)
    pub kind: String,
    /// Placeholder index
    pub index: u32,
}

/// Position and extent in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transform {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

/// One node of a shape tree.
#[derive(Debug, Clone)]
pub struct Shape {
    /// The variant kind
    kind: ShapeKind,
    /// Complete element XML, the source of truth
    xml: Vec<u8>,
    /// Shape id, unique within the owning tree
    id: u32,
    /// Shape name, unique within the owning tree
    name: String,
    /// Placeholder pairing when this shape is a placeholder
    placeholder: Option<PlaceholderKey>,
    /// Explicit position and extent, absent for shapes that inherit
    /// geometry through their placeholder
    transform: Option<Transform>,
}

impl Shape {
    /// Parse a shape from its complete element XML.
    pub fn from_xml(xml: Vec<u8>, kind: ShapeKind) -> Result<Shape> {
        let (id, name) = parse_identity(&xml)?;
        let placeholder = parse_placeholder(&xml);
        let transform = parse_transform(&xml);
        Ok(Shape {
            kind,
            xml,
            id,
            name,
            placeholder,
            transform,
        })
    }

    #[inline]
    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn xml(&self) -> &[u8] {
        &self.xml
    }

    /// The placeholder pairing, if this shape is a placeholder.
    #[inline]
    pub fn placeholder(&self) -> Option<&PlaceholderKey> {
        self.placeholder.as_ref()
    }

    #[inline]
    pub fn is_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }

    /// Explicit position and extent, when present.
    #[inline]
    pub fn transform(&self) -> Option<Transform> {
        self.transform
    }

    /// Rewrite the shape id on the non-visual properties element.
    pub fn set_id(&mut self, id: u32) -> Result<()> {
        self.xml = xmlutil::rewrite_attrs(&self.xml, b"p:cNvPr", &[("id", &id.to_string())])
            .ok_or_else(|| Error::Xml("shape has no cNvPr element".to_string()))?;
        self.id = id;
        Ok(())
    }

    /// Rewrite the shape name on the non-visual properties element.
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.xml = xmlutil::rewrite_attrs(&self.xml, b"p:cNvPr", &[("name", name)])
            .ok_or_else(|| Error::Xml("shape has no cNvPr element".to_string()))?;
        self.name = name.to_string();
        Ok(())
    }

    /// Set the explicit position and extent, creating the transform element
    /// inside the shape properties when the shape inherited geometry before.
    pub fn set_transform(&mut self, t: Transform) -> Result<()> {
        if xmlutil::element_span(&self.xml, b"a:xfrm").is_some()
            || xmlutil::element_span(&self.xml, b"p:xfrm").is_some()
        {
            let with_off = xmlutil::rewrite_attrs(
                &self.xml,
                b"a:off",
                &[("x", &t.x.to_string()), ("y", &t.y.to_string())],
            )
            .ok_or_else(|| Error::Xml("transform has no off element".to_string()))?;
            self.xml = xmlutil::rewrite_attrs(
                &with_off,
                b"a:ext",
                &[("cx", &t.cx.to_string()), ("cy", &t.cy.to_string())],
            )
            .ok_or_else(|| Error::Xml("transform has no ext element".to_string()))?;
        } else {
            let xfrm = format!(
                r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
                t.x, t.y, t.cx, t.cy
            );
            self.xml = insert_into_shape_props(&self.xml, xfrm.as_bytes())
                .ok_or_else(|| Error::Xml("shape has no spPr element".to_string()))?;
        }
        self.transform = Some(t);
        Ok(())
    }

    /// Whether this shape can carry a text frame.
    pub fn has_text_frame(&self) -> bool {
        self.kind == ShapeKind::AutoShape
            && xmlutil::element_span(&self.xml, b"p:txBody").is_some()
    }

    /// Parse the shape's text frame, if any.
    pub fn text_frame(&self) -> Result<Option<TextFrame>> {
        match xmlutil::element_span(&self.xml, b"p:txBody") {
            Some(span) => Ok(Some(TextFrame::parse(&self.xml[span.start..span.end])?)),
            None => Ok(None),
        }
    }

    /// Write a text frame back into the shape, replacing the existing one.
    pub fn set_text_frame(&mut self, frame: &TextFrame) -> Result<()> {
        if self.kind != ShapeKind::AutoShape {
            return Err(Error::InvalidArgument(format!(
                "shape {} cannot hold text",
                self.name
            )));
        }
        let serialized = frame.to_xml();
        self.xml = match xmlutil::element_span(&self.xml, b"p:txBody") {
            Some(_) => xmlutil::replace_element(&self.xml, b"p:txBody", &serialized)
                .ok_or_else(|| Error::Xml("failed to splice txBody".to_string()))?,
            None => xmlutil::insert_before(&self.xml, b"</p:sp>", &serialized)
                .ok_or_else(|| Error::Xml("shape has no closing tag".to_string()))?,
        };
        Ok(())
    }

    /// The preset geometry name of the shape (`rect`, `ellipse`, ...).
    pub fn geometry_type(&self) -> Option<String> {
        let span = xmlutil::element_span(&self.xml, b"a:prstGeom")?;
        first_start_attr(&self.xml[span.start..span.end], b"prst")
    }

    /// The shape's explicit solid fill color, read from its properties.
    ///
    /// Outline fills don't count; an unset fill inherits through the theme.
    pub fn fill_color(&self) -> Option<crate::pptx::style::color::ColorRef> {
        let sppr = xmlutil::element_span(&self.xml, b"p:spPr")?;
        let mut sppr_xml = self.xml[sppr.start..sppr.end].to_vec();
        // Drop the outline subtree so its fill cannot shadow the shape fill.
        if let Some(ln) = xmlutil::element_span(&sppr_xml, b"a:ln") {
            sppr_xml.drain(ln.start..ln.end);
        }
        let fill = xmlutil::element_span(&sppr_xml, b"a:solidFill")?;
        crate::pptx::style::color::ColorRef::parse(&sppr_xml[fill.start..fill.end])
    }

    /// The shape's explicit outline color, if its outline has a solid fill.
    pub fn outline_color(&self) -> Option<crate::pptx::style::color::ColorRef> {
        let ln = xmlutil::element_span(&self.xml, b"a:ln")?;
        let ln_xml = &self.xml[ln.start..ln.end];
        let fill = xmlutil::element_span(ln_xml, b"a:solidFill")?;
        crate::pptx::style::color::ColorRef::parse(&ln_xml[fill.start..fill.end])
    }

    /// The image relationship id of a picture's blip fill.
    pub fn blip_rid(&self) -> Option<String> {
        let span = xmlutil::element_span(&self.xml, b"a:blip")?;
        first_start_attr(&self.xml[span.start..span.end], b"r:embed")
    }

    /// Repoint the picture's blip fill at another image relationship.
    pub fn set_blip_rid(&mut self, r_id: &str) -> Result<()> {
        self.xml = xmlutil::rewrite_attrs(&self.xml, b"a:blip", &[("r:embed", r_id)])
            .ok_or_else(|| Error::Xml("shape has no blip element".to_string()))?;
        Ok(())
    }

    /// The relationship id of an attached vector (SVG) payload, if any.
    pub fn svg_blip_rid(&self) -> Option<String> {
        scan_for_local_attr(&self.xml, b"svgBlip", b"r:embed")
    }

    /// The relationship id of the chart referenced by a graphic frame.
    pub fn chart_rid(&self) -> Option<String> {
        if self.kind != ShapeKind::GraphicFrame {
            return None;
        }
        scan_for_local_attr(&self.xml, b"chart", b"r:id")
    }
}

/// Parse the shape id and name from the first non-visual drawing properties
/// element.
fn parse_identity(xml: &[u8]) -> Result<(u32, String)> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"cNvPr" {
                    let id = xmlutil::attr(e, b"id")
                        .and_then(|v| v.parse().ok())
                        .ok_or_else(|| Error::Xml("cNvPr lacks a numeric id".to_string()))?;
                    let name = xmlutil::attr(e, b"name").unwrap_or_default();
                    return Ok((id, name));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(format!("shape identity: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Err(Error::Xml("shape has no cNvPr element".to_string()))
}

/// Parse the placeholder pairing from the first `<p:ph>` element.
///
/// A missing type attribute means a body placeholder; a missing idx is 0.
fn parse_placeholder(xml: &[u8]) -> Option<PlaceholderKey> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"ph" {
                    let kind = xmlutil::attr(e, b"type").unwrap_or_else(|| "body".to_string());
                    let index = xmlutil::attr(e, b"idx")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                    return Some(PlaceholderKey { kind, index });
                }
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

/// Parse the explicit transform from the first transform element.
///
/// Graphic frames spell it `<p:xfrm>`, everything else `<a:xfrm>`.
fn parse_transform(xml: &[u8]) -> Option<Transform> {
    let span = xmlutil::element_span(xml, b"a:xfrm")
        .or_else(|| xmlutil::element_span(xml, b"p:xfrm"))?;
    let xfrm = &xml[span.start..span.end];

    let mut reader = Reader::from_reader(xfrm);
    let mut buf = Vec::new();
    let mut off = None;
    let mut ext = None;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"off" => {
                    let x = xmlutil::attr(e, b"x").and_then(|v| v.parse().ok())?;
                    let y = xmlutil::attr(e, b"y").and_then(|v| v.parse().ok())?;
                    off = Some((x, y));
                }
                b"ext" => {
                    let cx = xmlutil::attr(e, b"cx").and_then(|v| v.parse().ok())?;
                    let cy = xmlutil::attr(e, b"cy").and_then(|v| v.parse().ok())?;
                    ext = Some((cx, cy));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }

    let ((x, y), (cx, cy)) = (off?, ext?);
    Some(Transform { x, y, cx, cy })
}

/// Insert content as the first child of the shape properties element,
/// opening up a self-closing `<p:spPr/>` when necessary.
fn insert_into_shape_props(xml: &[u8], content: &[u8]) -> Option<Vec<u8>> {
    let span = xmlutil::element_span(xml, b"p:spPr")?;
    let element = &xml[span.start..span.end];

    let mut replacement = Vec::with_capacity(element.len() + content.len() + 16);
    if element.ends_with(b"/>") {
        replacement.extend_from_slice(&element[..element.len() - 2]);
        replacement.push(b'>');
        replacement.extend_from_slice(content);
        replacement.extend_from_slice(b"</p:spPr>");
    } else {
        let close = memchr::memchr(b'>', element)? + 1;
        replacement.extend_from_slice(&element[..close]);
        replacement.extend_from_slice(content);
        replacement.extend_from_slice(&element[close..]);
    }

    let mut out = Vec::with_capacity(xml.len() + content.len() + 16);
    out.extend_from_slice(&xml[..span.start]);
    out.extend_from_slice(&replacement);
    out.extend_from_slice(&xml[span.end..]);
    Some(out)
}

/// First attribute value of the first tag in an element slice.
fn first_start_attr(element_xml: &[u8], key: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(element_xml);
    let mut buf = Vec::new();
    if let Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) = reader.read_event_into(&mut buf) {
        return xmlutil::attr(e, key);
    }
    None
}

/// Scan for the first element with the given local name and return one of
/// its attributes.
fn scan_for_local_attr(xml: &[u8], local: &[u8], key: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == local
                    && let Some(value) = xmlutil::attr(e, key)
                {
                    return Some(value);
                }
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}
