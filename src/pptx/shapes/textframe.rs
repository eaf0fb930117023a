//! Text frame model: body properties, paragraphs, and text portions.
//!
//! A text frame is parsed from a shape's `<p:txBody>` element. The body
//! properties and list style are kept as raw bytes so unmodeled content
//! survives; paragraphs and portions are fully modeled since they are what
//! the mutation API edits.

use crate::error::{Error, Result};
use crate::pptx::style::color::ColorRef;
use crate::pptx::style::fontdata::{FontData, parse_level_styles};
use crate::pptx::xmlutil::{self, Span, escape_xml};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;

/// Default left/right text inset in EMU (0.1 inch).
pub const DEFAULT_HORIZONTAL_INSET: i64 = 91440;

/// Default top/bottom text inset in EMU (0.05 inch).
pub const DEFAULT_VERTICAL_INSET: i64 = 45720;

/// The autofit policy of a text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutofitMode {
    /// Text overflows the box freely
    #[default]
    None,
    /// Text shrinks to stay inside the box
    Shrink,
    /// The box resizes to fit the text
    Resize,
}

/// Text insets of a frame, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Margins {
    pub left: i64,
    pub right: i64,
    pub top: i64,
    pub bottom: i64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            left: DEFAULT_HORIZONTAL_INSET,
            right: DEFAULT_HORIZONTAL_INSET,
            top: DEFAULT_VERTICAL_INSET,
            bottom: DEFAULT_VERTICAL_INSET,
        }
    }
}

/// Parsed `<a:bodyPr>` fields the engines care about.
#[derive(Debug, Clone, Default)]
pub struct BodyProperties {
    /// Autofit policy
    pub autofit: AutofitMode,
    /// Whether text wraps at the frame edge (wrap="none" disables)
    pub wrap: bool,
    /// Text insets
    pub margins: Margins,
}

/// A run of text with uniform formatting.
#[derive(Debug, Clone, Default)]
pub struct Portion {
    /// The run text
    pub text: String,
    /// Explicit font fields; unset fields inherit through the cascade
    pub font: FontData,
    /// Highlight color behind the run
    pub highlight: Option<ColorRef>,
    /// Hyperlink relationship id on the slide part
    pub hyperlink_rid: Option<String>,
}

/// A paragraph: ordered portions plus paragraph-level properties.
#[derive(Debug, Clone, Default)]
pub struct Paragraph {
    /// Outline level, 0-8
    pub level: u8,
    /// Alignment token (l, ctr, r, just) when explicit
    pub alignment: Option<String>,
    /// The text runs
    pub portions: Vec<Portion>,
}

impl Paragraph {
    /// Concatenated text of all portions.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for portion in &self.portions {
            out.push_str(&portion.text);
        }
        out
    }
}

/// The text content of a shape.
#[derive(Debug, Clone)]
pub struct TextFrame {
    /// Parsed body properties
    pub body: BodyProperties,
    /// Raw `<a:bodyPr>` element bytes, preserved verbatim
    body_xml: Vec<u8>,
    /// Raw `<a:lstStyle>` element bytes (empty when absent)
    lst_style_xml: Vec<u8>,
    /// The frame's own per-level font data, parsed from the list style
    level_fonts: HashMap<u8, FontData>,
    /// Size from the first paragraph's end-paragraph run properties, used
    /// as level-0 data when the list style is empty
    end_para_size: Option<i32>,
    /// Ordered paragraphs
    pub paragraphs: Vec<Paragraph>,
}

impl TextFrame {
    /// Parse a `<p:txBody>` element.
    pub fn parse(txbody_xml: &[u8]) -> Result<TextFrame> {
        let body_xml = match xmlutil::element_span(txbody_xml, b"a:bodyPr") {
            Some(span) => txbody_xml[span.start..span.end].to_vec(),
            None => b"<a:bodyPr/>".to_vec(),
        };
        let body = parse_body_props(&body_xml)?;

        let (lst_style_xml, level_fonts) =
            match xmlutil::element_span(txbody_xml, b"a:lstStyle") {
                Some(span) => {
                    let raw = txbody_xml[span.start..span.end].to_vec();
                    let fonts = parse_level_styles(&raw);
                    (raw, fonts)
                }
                None => (Vec::new(), HashMap::new()),
            };

        let mut paragraphs = Vec::new();
        let mut end_para_size = None;
        let mut at = 0usize;
        while let Some(span) = xmlutil::element_span_from(txbody_xml, b"a:p", at) {
            let para_xml = &txbody_xml[span.start..span.end];
            paragraphs.push(parse_paragraph(para_xml)?);
            if paragraphs.len() == 1 {
                end_para_size = parse_end_para_size(para_xml);
            }
            at = span.end;
        }

        Ok(TextFrame {
            body,
            body_xml,
            lst_style_xml,
            level_fonts,
            end_para_size,
            paragraphs,
        })
    }

    /// An empty frame with default body properties.
    pub fn empty() -> TextFrame {
        TextFrame {
            body: BodyProperties {
                wrap: true,
                ..Default::default()
            },
            body_xml: b"<a:bodyPr/>".to_vec(),
            lst_style_xml: Vec::new(),
            level_fonts: HashMap::new(),
            end_para_size: None,
            paragraphs: Vec::new(),
        }
    }

    /// All frame text, paragraphs joined with newlines.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for (i, para) in self.paragraphs.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&para.text());
        }
        out
    }

    /// Replace the frame content with plain text.
    ///
    /// Each line becomes a paragraph with a single portion. The first
    /// existing portion's formatting carries over to all new portions.
    pub fn set_text(&mut self, text: &str) {
        let template = self
            .paragraphs
            .iter()
            .flat_map(|p| p.portions.first())
            .next()
            .cloned()
            .unwrap_or_default();
        let level = self.paragraphs.first().map(|p| p.level).unwrap_or(0);

        self.paragraphs = text
            .split('\n')
            .map(|line| Paragraph {
                level,
                alignment: None,
                portions: vec![Portion {
                    text: line.to_string(),
                    font: template.font.clone(),
                    highlight: template.highlight.clone(),
                    hyperlink_rid: template.hyperlink_rid.clone(),
                }],
            })
            .collect();
    }

    /// The frame's own font data for an outline level, if any.
    ///
    /// Falls back to the first paragraph's end-paragraph size at level 0
    /// when the list style carries nothing.
    pub fn level_font(&self, level: u8) -> Option<FontData> {
        if let Some(data) = self.level_fonts.get(&level) {
            return Some(data.clone());
        }
        if self.level_fonts.is_empty() && level == 0 {
            if let Some(size) = self.end_para_size {
                return Some(FontData {
                    size: Some(size),
                    ..Default::default()
                });
            }
        }
        None
    }

    /// Set the frame's own default font size for an outline level,
    /// patching the raw list style.
    pub fn set_level_size(&mut self, level: u8, size: i32) {
        let qname = format!("a:lvl{}pPr", level + 1);
        let sz = size.to_string();

        if self.lst_style_xml.is_empty() || self.lst_style_xml.ends_with(b"/>") {
            self.lst_style_xml = b"<a:lstStyle></a:lstStyle>".to_vec();
        }

        if let Some(span) = xmlutil::element_span(&self.lst_style_xml, qname.as_bytes()) {
            let lvl_xml = self.lst_style_xml[span.start..span.end].to_vec();
            let patched = if xmlutil::element_span(&lvl_xml, b"a:defRPr").is_some() {
                xmlutil::rewrite_attrs(&lvl_xml, b"a:defRPr", &[("sz", &sz)])
            } else if lvl_xml.ends_with(b"/>") {
                let mut opened = lvl_xml[..lvl_xml.len() - 2].to_vec();
                opened.extend_from_slice(
                    format!(r#"><a:defRPr sz="{}"/></{}>"#, sz, qname).as_bytes(),
                );
                Some(opened)
            } else {
                xmlutil::insert_before(
                    &lvl_xml,
                    format!("</{}>", qname).as_bytes(),
                    format!(r#"<a:defRPr sz="{}"/>"#, sz).as_bytes(),
                )
            };
            if let Some(patched) = patched {
                self.lst_style_xml.splice(span.start..span.end, patched);
            }
        } else if let Some(with_level) = xmlutil::insert_before(
            &self.lst_style_xml,
            b"</a:lstStyle>",
            format!(r#"<{}><a:defRPr sz="{}"/></{}>"#, qname, sz, qname).as_bytes(),
        ) {
            self.lst_style_xml = with_level;
        }

        self.level_fonts.entry(level).or_default().size = Some(size);
    }

    /// Change the wrap mode, patching the raw body properties.
    pub fn set_wrap(&mut self, wrap: bool) {
        let value = if wrap { "square" } else { "none" };
        if let Some(patched) = xmlutil::rewrite_attrs(&self.body_xml, b"a:bodyPr", &[("wrap", value)])
        {
            self.body_xml = patched;
        }
        self.body.wrap = wrap;
    }

    /// Change the autofit policy, patching the raw body properties.
    pub fn set_autofit(&mut self, mode: AutofitMode) {
        let child: &[u8] = match mode {
            AutofitMode::None => b"",
            AutofitMode::Shrink => b"<a:normAutofit/>",
            AutofitMode::Resize => b"<a:spAutoFit/>",
        };

        let mut body = self.body_xml.clone();
        for name in [b"a:normAutofit" as &[u8], b"a:spAutoFit", b"a:noAutofit"] {
            if let Some(Span { start, end }) = xmlutil::element_span(&body, name) {
                body.splice(start..end, std::iter::empty());
            }
        }

        // A self-closing bodyPr must be opened up before a child can land.
        if body.ends_with(b"/>") {
            let mut opened = body[..body.len() - 2].to_vec();
            opened.push(b'>');
            opened.extend_from_slice(child);
            opened.extend_from_slice(b"</a:bodyPr>");
            body = opened;
        } else if let Some(with_child) = xmlutil::insert_before(&body, b"</a:bodyPr>", child) {
            body = with_child;
        }

        self.body_xml = body;
        self.body.autofit = mode;
    }

    /// Serialize the frame back to a `<p:txBody>` element.
    pub fn to_xml(&self) -> Vec<u8> {
        let mut xml = Vec::with_capacity(256);
        xml.extend_from_slice(b"<p:txBody>");
        xml.extend_from_slice(&self.body_xml);
        xml.extend_from_slice(&self.lst_style_xml);

        for para in &self.paragraphs {
            xml.extend_from_slice(b"<a:p>");
            if para.level > 0 || para.alignment.is_some() {
                let mut ppr = String::from("<a:pPr");
                if para.level > 0 {
                    ppr.push_str(&format!(r#" lvl="{}""#, para.level));
                }
                if let Some(algn) = &para.alignment {
                    ppr.push_str(&format!(r#" algn="{}""#, escape_xml(algn)));
                }
                ppr.push_str("/>");
                xml.extend_from_slice(ppr.as_bytes());
            }
            if para.portions.is_empty() {
                xml.extend_from_slice(br#"<a:endParaRPr lang="en-US"/>"#);
            }
            for portion in &para.portions {
                xml.extend_from_slice(serialize_portion(portion).as_bytes());
            }
            xml.extend_from_slice(b"</a:p>");
        }

        xml.extend_from_slice(b"</p:txBody>");
        xml
    }
}

/// Serialize one run.
fn serialize_portion(portion: &Portion) -> String {
    let mut rpr = String::from(r#"<a:rPr lang="en-US""#);
    if let Some(size) = portion.font.size {
        rpr.push_str(&format!(r#" sz="{}""#, size));
    }
    if let Some(bold) = portion.font.bold {
        rpr.push_str(&format!(r#" b="{}""#, if bold { "1" } else { "0" }));
    }
    if let Some(italic) = portion.font.italic {
        rpr.push_str(&format!(r#" i="{}""#, if italic { "1" } else { "0" }));
    }

    let mut children = String::new();
    if let Some(color) = &portion.font.color {
        children.push_str(&format!("<a:solidFill>{}</a:solidFill>", color.to_xml()));
    }
    if let Some(highlight) = &portion.highlight {
        children.push_str(&format!("<a:highlight>{}</a:highlight>", highlight.to_xml()));
    }
    if let Some(latin) = &portion.font.latin {
        children.push_str(&format!(r#"<a:latin typeface="{}"/>"#, escape_xml(latin)));
    }
    if let Some(rid) = &portion.hyperlink_rid {
        children.push_str(&format!(r#"<a:hlinkClick r:id="{}"/>"#, escape_xml(rid)));
    }

    if children.is_empty() {
        rpr.push_str("/>");
    } else {
        rpr.push('>');
        rpr.push_str(&children);
        rpr.push_str("</a:rPr>");
    }

    format!("<a:r>{}<a:t>{}</a:t></a:r>", rpr, escape_xml(&portion.text))
}

/// Parse `<a:bodyPr>` attributes and autofit children.
fn parse_body_props(body_xml: &[u8]) -> Result<BodyProperties> {
    let mut props = BodyProperties {
        wrap: true,
        ..Default::default()
    };

    let mut reader = Reader::from_reader(body_xml);
    let mut buf = Vec::new();
    let mut root_seen = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if !root_seen {
                    root_seen = true;
                    if let Some(wrap) = xmlutil::attr(e, b"wrap") {
                        props.wrap = wrap != "none";
                    }
                    if let Some(v) = xmlutil::attr(e, b"lIns") {
                        props.margins.left = v.parse().unwrap_or(DEFAULT_HORIZONTAL_INSET);
                    }
                    if let Some(v) = xmlutil::attr(e, b"rIns") {
                        props.margins.right = v.parse().unwrap_or(DEFAULT_HORIZONTAL_INSET);
                    }
                    if let Some(v) = xmlutil::attr(e, b"tIns") {
                        props.margins.top = v.parse().unwrap_or(DEFAULT_VERTICAL_INSET);
                    }
                    if let Some(v) = xmlutil::attr(e, b"bIns") {
                        props.margins.bottom = v.parse().unwrap_or(DEFAULT_VERTICAL_INSET);
                    }
                    continue;
                }
                match e.local_name().as_ref() {
                    b"normAutofit" => props.autofit = AutofitMode::Shrink,
                    b"spAutoFit" => props.autofit = AutofitMode::Resize,
                    b"noAutofit" => props.autofit = AutofitMode::None,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(format!("bodyPr: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(props)
}

/// Parse one `<a:p>` element.
fn parse_paragraph(para_xml: &[u8]) -> Result<Paragraph> {
    let mut para = Paragraph::default();

    if let Some(span) = xmlutil::element_span(para_xml, b"a:pPr") {
        let mut reader = Reader::from_reader(&para_xml[span.start..span.end]);
        let mut buf = Vec::new();
        if let Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) =
            reader.read_event_into(&mut buf)
        {
            if let Some(lvl) = xmlutil::attr(e, b"lvl") {
                para.level = lvl.parse().unwrap_or(0);
            }
            para.alignment = xmlutil::attr(e, b"algn");
        }
    }

    let mut at = 0usize;
    while let Some(span) = xmlutil::element_span_from(para_xml, b"a:r", at) {
        para.portions
            .push(parse_portion(&para_xml[span.start..span.end])?);
        at = span.end;
    }

    Ok(para)
}

/// Parse one `<a:r>` run element.
fn parse_portion(run_xml: &[u8]) -> Result<Portion> {
    let mut portion = Portion::default();

    if let Some(span) = xmlutil::element_span(run_xml, b"a:rPr") {
        let rpr_xml = &run_xml[span.start..span.end];
        portion.font = FontData::from_run_props(rpr_xml);
        if let Some(h) = xmlutil::element_span(rpr_xml, b"a:highlight") {
            portion.highlight = ColorRef::parse(&rpr_xml[h.start..h.end]);
        }
        if let Some(link) = xmlutil::element_span(rpr_xml, b"a:hlinkClick") {
            let mut reader = Reader::from_reader(&rpr_xml[link.start..link.end]);
            let mut buf = Vec::new();
            if let Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) =
                reader.read_event_into(&mut buf)
            {
                portion.hyperlink_rid = xmlutil::attr(e, b"r:id");
            }
        }
    }

    if let Some(span) = xmlutil::element_span(run_xml, b"a:t") {
        let mut reader = Reader::from_reader(&run_xml[span.start..span.end]);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Text(e)) => {
                    let decoded = e.decode().map_err(|e| Error::Xml(e.to_string()))?;
                    portion.text.push_str(
                        &quick_xml::escape::unescape(&decoded)
                            .map_err(|e| Error::Xml(e.to_string()))?,
                    );
                }
                Ok(Event::GeneralRef(e)) => {
                    let name = e.decode().map_err(|e| Error::Xml(e.to_string()))?;
                    portion.text.push_str(
                        &quick_xml::escape::unescape(&format!("&{};", name))
                            .map_err(|e| Error::Xml(e.to_string()))?,
                    );
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::Xml(format!("run text: {}", e))),
                _ => {}
            }
            buf.clear();
        }
    }

    Ok(portion)
}

/// The size carried by a paragraph's `<a:endParaRPr>`, if any.
fn parse_end_para_size(para_xml: &[u8]) -> Option<i32> {
    let span = xmlutil::element_span(para_xml, b"a:endParaRPr")?;
    let mut reader = Reader::from_reader(&para_xml[span.start..span.end]);
    let mut buf = Vec::new();
    if let Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) = reader.read_event_into(&mut buf) {
        return xmlutil::attr(e, b"sz").and_then(|s| s.parse().ok());
    }
    None
}
