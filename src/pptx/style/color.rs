//! Color references and the scheme-resolution cascade.
//!
//! A color in shape XML is either explicit (RGB hex, a system color, a named
//! preset) or a scheme token. Scheme tokens resolve against the master's
//! theme color scheme; tokens that are not direct scheme members (bg1, tx1,
//! ...) go through the master's color map indirection once and re-query.

use crate::pptx::theme::{ColorMap, ColorScheme};
use crate::pptx::xmlutil;
use phf::phf_map;
use quick_xml::Reader;
use quick_xml::events::Event;

/// A color value as written in shape XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorRef {
    /// Explicit RGB hex value, e.g. "FF0000"
    Rgb(String),
    /// System color, carrying the last-rendered hex value when present
    System(String),
    /// Named preset color, e.g. "red"
    Preset(String),
    /// Scheme token, e.g. "accent1" or a mapped token like "tx1"
    Scheme(String),
}

impl ColorRef {
    /// Parse the first color child inside a container element such as
    /// `<a:solidFill>` or `<a:highlight>`.
    pub fn parse(container_xml: &[u8]) -> Option<ColorRef> {
        let mut reader = Reader::from_reader(container_xml);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    match e.local_name().as_ref() {
                        b"srgbClr" => {
                            return xmlutil::attr(e, b"val").map(ColorRef::Rgb);
                        }
                        b"sysClr" => {
                            // Prefer the cached lastClr hex; fall back to the name.
                            let last = xmlutil::attr(e, b"lastClr");
                            let val = xmlutil::attr(e, b"val");
                            return last.or(val).map(ColorRef::System);
                        }
                        b"prstClr" => {
                            return xmlutil::attr(e, b"val").map(ColorRef::Preset);
                        }
                        b"schemeClr" => {
                            return xmlutil::attr(e, b"val").map(ColorRef::Scheme);
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => return None,
                Err(_) => return None,
                _ => {}
            }
            buf.clear();
        }
    }

    /// Serialize as the color child of a fill/highlight container.
    pub fn to_xml(&self) -> String {
        match self {
            ColorRef::Rgb(hex) => format!(r#"<a:srgbClr val="{}"/>"#, xmlutil::escape_xml(hex)),
            ColorRef::System(name) => {
                format!(r#"<a:sysClr val="{}"/>"#, xmlutil::escape_xml(name))
            }
            ColorRef::Preset(name) => {
                format!(r#"<a:prstClr val="{}"/>"#, xmlutil::escape_xml(name))
            }
            ColorRef::Scheme(token) => {
                format!(r#"<a:schemeClr val="{}"/>"#, xmlutil::escape_xml(token))
            }
        }
    }

    /// Resolve this reference to an RGB hex string.
    ///
    /// Explicit values resolve immediately. Scheme tokens are looked up in
    /// the scheme; unknown tokens are pushed through the color map once and
    /// re-queried. Resolution never fails: an exhausted chain yields None
    /// and the caller decides whether that is acceptable.
    pub fn resolve(&self, scheme: &ColorScheme, color_map: &ColorMap) -> Option<String> {
        match self {
            ColorRef::Rgb(hex) => Some(hex.clone()),
            ColorRef::System(value) => {
                // A lastClr cache is already hex; a bare name is not resolvable.
                if value.len() == 6 && value.bytes().all(|b| b.is_ascii_hexdigit()) {
                    Some(value.clone())
                } else {
                    None
                }
            }
            ColorRef::Preset(name) => preset_hex(name).map(str::to_string),
            ColorRef::Scheme(token) => {
                if let Some(hex) = scheme.get(token) {
                    return Some(hex.to_string());
                }
                let mapped = color_map.get(token)?;
                scheme.get(mapped).map(str::to_string)
            }
        }
    }
}

/// Preset color names to RGB hex, per the DrawingML preset color table.
static PRESET_COLORS: phf::Map<&'static str, &'static str> = phf_map! {
    "aliceBlue" => "F0F8FF",
    "aqua" => "00FFFF",
    "beige" => "F5F5DC",
    "black" => "000000",
    "blue" => "0000FF",
    "brown" => "A52A2A",
    "coral" => "FF7F50",
    "crimson" => "DC143C",
    "cyan" => "00FFFF",
    "darkBlue" => "00008B",
    "darkGray" => "A9A9A9",
    "darkGreen" => "006400",
    "darkRed" => "8B0000",
    "fuchsia" => "FF00FF",
    "gold" => "FFD700",
    "gray" => "808080",
    "green" => "008000",
    "indigo" => "4B0082",
    "ivory" => "FFFFF0",
    "khaki" => "F0E68C",
    "lavender" => "E6E6FA",
    "lightBlue" => "ADD8E6",
    "lightGray" => "D3D3D3",
    "lightGreen" => "90EE90",
    "lightPink" => "FFB6C1",
    "lightYellow" => "FFFFE0",
    "lime" => "00FF00",
    "magenta" => "FF00FF",
    "maroon" => "800000",
    "navy" => "000080",
    "olive" => "808000",
    "orange" => "FFA500",
    "orchid" => "DA70D6",
    "pink" => "FFC0CB",
    "plum" => "DDA0DD",
    "purple" => "800080",
    "red" => "FF0000",
    "salmon" => "FA8072",
    "silver" => "C0C0C0",
    "skyBlue" => "87CEEB",
    "tan" => "D2B48C",
    "teal" => "008080",
    "tomato" => "FF6347",
    "turquoise" => "40E0D0",
    "violet" => "EE82EE",
    "white" => "FFFFFF",
    "yellow" => "FFFF00",
};

/// Look up a preset color name.
pub fn preset_hex(name: &str) -> Option<&'static str> {
    PRESET_COLORS.get(name).copied()
}
