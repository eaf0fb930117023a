//! The shape tree: the ordered shape sequence of a slide, layout or master.
//!
//! Parsed lazily from a part's `<p:spTree>` element and cached by the owning
//! presentation. Non-shape children (group properties, extension lists) are
//! preserved verbatim around the modeled shapes. Enforces the tree
//! invariants: shape ids and names unique within the direct tree, new ids
//! allocated as max + 1, name collisions resolved by the numeric-suffix law.

use crate::error::{Error, Result};
use crate::pptx::shapes::shape::{PlaceholderKey, Shape, ShapeKind};
use crate::pptx::xmlutil;
use memchr::memmem;

/// The ordered shape sequence of one slide, layout or master part.
#[derive(Debug, Clone)]
pub struct ShapeTree {
    /// Original `<p:spTree ...>` start tag bytes
    start_tag: Vec<u8>,
    /// Children before the first shape (group shape properties), verbatim
    preamble: Vec<u8>,
    /// The modeled shapes, in document order
    shapes: Vec<Shape>,
    /// Children after the last shape (extension lists), verbatim
    trailer: Vec<u8>,
}

impl ShapeTree {
    /// Parse the shape tree out of a slide/layout/master part's XML.
    pub fn parse(part_xml: &[u8]) -> Result<ShapeTree> {
        let span = xmlutil::element_span(part_xml, b"p:spTree")
            .ok_or_else(|| Error::PackageCorrupt("part has no shape tree".to_string()))?;
        let tree_xml = &part_xml[span.start..span.end];

        let open_end = memmem::find(tree_xml, b">")
            .ok_or_else(|| Error::Xml("malformed spTree start tag".to_string()))?
            + 1;
        let start_tag = tree_xml[..open_end].to_vec();
        let body_end = tree_xml.len() - b"</p:spTree>".len();

        let mut preamble = Vec::new();
        let mut shapes = Vec::new();
        let mut trailer = Vec::new();

        let mut cursor = open_end;
        while cursor < body_end {
            // Skip inter-element whitespace.
            while cursor < body_end && tree_xml[cursor].is_ascii_whitespace() {
                cursor += 1;
            }
            if cursor >= body_end {
                break;
            }
            if tree_xml[cursor] != b'<' {
                return Err(Error::Xml("unexpected content in spTree".to_string()));
            }

            let qname = read_qname(tree_xml, cursor + 1);
            let child_span = xmlutil::element_span_from(tree_xml, &qname, cursor)
                .ok_or_else(|| Error::Xml("unterminated spTree child".to_string()))?;
            let child_xml = &tree_xml[child_span.start..child_span.end];

            let local = qname
                .iter()
                .position(|&b| b == b':')
                .map(|p| &qname[p + 1..])
                .unwrap_or(&qname);
            match ShapeKind::from_local_name(local) {
                Some(kind) => shapes.push(Shape::from_xml(child_xml.to_vec(), kind)?),
                None if shapes.is_empty() => preamble.extend_from_slice(child_xml),
                None => trailer.extend_from_slice(child_xml),
            }
            cursor = child_span.end;
        }

        Ok(ShapeTree {
            start_tag,
            preamble,
            shapes,
            trailer,
        })
    }

    /// Serialize the tree back to a complete `<p:spTree>` element.
    pub fn to_xml(&self) -> Vec<u8> {
        let size = self.start_tag.len()
            + self.preamble.len()
            + self.shapes.iter().map(|s| s.xml().len()).sum::<usize>()
            + self.trailer.len()
            + 16;
        let mut xml = Vec::with_capacity(size);
        xml.extend_from_slice(&self.start_tag);
        xml.extend_from_slice(&self.preamble);
        for shape in &self.shapes {
            xml.extend_from_slice(shape.xml());
        }
        xml.extend_from_slice(&self.trailer);
        xml.extend_from_slice(b"</p:spTree>");
        xml
    }

    /// The shapes in document order.
    #[inline]
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Look up a shape by id.
    pub fn shape(&self, id: u32) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id() == id)
    }

    /// Look up a shape by id, mutably.
    pub fn shape_mut(&mut self, id: u32) -> Option<&mut Shape> {
        self.shapes.iter_mut().find(|s| s.id() == id)
    }

    /// Look up a shape by name.
    pub fn shape_by_name(&self, name: &str) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.name() == name)
    }

    /// Find the placeholder shape pairing with a key one level down.
    pub fn find_placeholder(&self, key: &PlaceholderKey) -> Option<&Shape> {
        self.shapes
            .iter()
            .find(|s| s.placeholder() == Some(key))
    }

    /// The next shape id: one past the maximum in the tree.
    pub fn next_id(&self) -> u32 {
        self.shapes.iter().map(Shape::id).max().unwrap_or(0) + 1
    }

    /// Resolve a name against the tree by the numeric-suffix law.
    ///
    /// Returns the name unchanged when it does not collide. Otherwise,
    /// collects names sharing the literal prefix, takes the maximum numeric
    /// suffix (non-numeric remainders don't count, and the bare name itself
    /// counts as 1), and appends max + 1.
    pub fn unique_name(&self, base: &str) -> String {
        if self.shape_by_name(base).is_none() {
            return base.to_string();
        }

        let mut max_suffix: u32 = 1;
        for shape in &self.shapes {
            let Some(rest) = shape.name().strip_prefix(base) else {
                continue;
            };
            let trimmed = rest.trim_start();
            if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(n) = trimmed.parse::<u32>() {
                    max_suffix = max_suffix.max(n);
                }
            }
        }
        format!("{} {}", base, max_suffix + 1)
    }

    /// Append a shape, enforcing id and name uniqueness.
    pub fn add_shape(&mut self, shape: Shape) -> Result<()> {
        if self.shape(shape.id()).is_some() {
            return Err(Error::InvalidArgument(format!(
                "shape id {} already present",
                shape.id()
            )));
        }
        if self.shape_by_name(shape.name()).is_some() {
            return Err(Error::InvalidArgument(format!(
                "shape name '{}' already present",
                shape.name()
            )));
        }
        self.shapes.push(shape);
        Ok(())
    }

    /// Deep-clone a shape in place.
    ///
    /// The clone gets the next unused id and a suffix-law name, and is
    /// appended at the end of the tree. Returns the new id.
    pub fn duplicate(&mut self, id: u32) -> Result<u32> {
        let source = self
            .shape(id)
            .ok_or_else(|| Error::InvalidArgument(format!("no shape with id {}", id)))?;

        let mut copy = source.clone();
        let new_id = self.next_id();
        copy.set_id(new_id)?;
        let new_name = self.unique_name(source.name());
        if new_name != copy.name() {
            copy.set_name(&new_name)?;
        }
        self.shapes.push(copy);
        Ok(new_id)
    }

    /// Detach a shape by id.
    pub fn remove_shape(&mut self, id: u32) -> Result<Shape> {
        let pos = self
            .shapes
            .iter()
            .position(|s| s.id() == id)
            .ok_or_else(|| Error::InvalidArgument(format!("no shape with id {}", id)))?;
        Ok(self.shapes.remove(pos))
    }

    /// Count references to a relationship id across all shape XML.
    ///
    /// A count above one means the target part is shared by several shapes
    /// and must not be mutated through any single one of them.
    pub fn count_rel_refs(&self, r_id: &str) -> usize {
        let embed = format!(r#"r:embed="{}""#, r_id);
        let id = format!(r#"r:id="{}""#, r_id);
        let embed_finder = memmem::Finder::new(embed.as_bytes());
        let id_finder = memmem::Finder::new(id.as_bytes());
        self.shapes
            .iter()
            .map(|s| {
                embed_finder.find_iter(s.xml()).count() + id_finder.find_iter(s.xml()).count()
            })
            .sum()
    }

    /// Concatenated text of every shape that has a text frame.
    pub fn text(&self) -> Result<String> {
        let mut out = String::new();
        for shape in &self.shapes {
            if let Some(frame) = shape.text_frame()? {
                let text = frame.text();
                if !text.is_empty() {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(&text);
                }
            }
        }
        Ok(out)
    }
}

/// Read an element qname starting just past its `<`.
fn read_qname(xml: &[u8], start: usize) -> Vec<u8> {
    let mut end = start;
    while end < xml.len()
        && !matches!(xml[end], b' ' | b'\t' | b'\r' | b'\n' | b'/' | b'>')
    {
        end += 1;
    }
    xml[start..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide_xml(shapes: &str) -> Vec<u8> {
        format!(
            r#"<p:sld><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld></p:sld>"#,
            shapes
        )
        .into_bytes()
    }

    fn sp(id: u32, name: &str) -> String {
        format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="{}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/></p:sp>"#,
            id, name
        )
    }

    #[test]
    fn test_parse_and_serialize() {
        let xml = slide_xml(&(sp(2, "Title") + &sp(3, "Body")));
        let tree = ShapeTree::parse(&xml).unwrap();

        assert_eq!(tree.shapes().len(), 2);
        assert_eq!(tree.shape(2).unwrap().name(), "Title");
        assert_eq!(tree.shape(3).unwrap().name(), "Body");

        // Reserializing and reparsing preserves the tree.
        let out = tree.to_xml();
        let wrapped = format!(
            "<p:sld><p:cSld>{}</p:cSld></p:sld>",
            String::from_utf8(out).unwrap()
        );
        let reparsed = ShapeTree::parse(wrapped.as_bytes()).unwrap();
        assert_eq!(reparsed.shapes().len(), 2);
        assert_eq!(reparsed.shape(2).unwrap().name(), "Title");
    }

    #[test]
    fn test_duplicate_id_law() {
        let xml = slide_xml(&(sp(2, "Title") + &sp(7, "Body")));
        let mut tree = ShapeTree::parse(&xml).unwrap();

        let new_id = tree.duplicate(2).unwrap();
        assert_eq!(new_id, 8); // max(2, 7) + 1
        assert_eq!(tree.shapes().len(), 3);
    }

    #[test]
    fn test_duplicate_name_gets_suffix() {
        let xml = slide_xml(&sp(2, "Title"));
        let mut tree = ShapeTree::parse(&xml).unwrap();

        let new_id = tree.duplicate(2).unwrap();
        assert_eq!(tree.shape(new_id).unwrap().name(), "Title 2");
    }

    #[test]
    fn test_name_suffix_law() {
        let xml = slide_xml(&(sp(2, "Logo") + &sp(3, "Logo 2") + &sp(4, "Logo 5")));
        let mut tree = ShapeTree::parse(&xml).unwrap();

        let new_id = tree.duplicate(2).unwrap();
        assert_eq!(tree.shape(new_id).unwrap().name(), "Logo 6");
    }

    #[test]
    fn test_name_suffix_ignores_non_numeric_remainders() {
        let xml = slide_xml(&(sp(2, "Logo") + &sp(3, "Logotype") + &sp(4, "Logo 3a")));
        let mut tree = ShapeTree::parse(&xml).unwrap();

        let new_id = tree.duplicate(2).unwrap();
        // "type" and " 3a" are not numeric suffixes; only the bare name counts.
        assert_eq!(tree.shape(new_id).unwrap().name(), "Logo 2");
    }

    #[test]
    fn test_unique_name_without_collision_is_unchanged() {
        let xml = slide_xml(&sp(2, "Title"));
        let tree = ShapeTree::parse(&xml).unwrap();
        assert_eq!(tree.unique_name("Picture"), "Picture");
    }

    #[test]
    fn test_add_shape_rejects_duplicates() {
        let xml = slide_xml(&sp(2, "Title"));
        let mut tree = ShapeTree::parse(&xml).unwrap();

        let dup_id = Shape::from_xml(sp(2, "Other").into_bytes(), ShapeKind::AutoShape).unwrap();
        assert!(matches!(
            tree.add_shape(dup_id),
            Err(Error::InvalidArgument(_))
        ));

        let dup_name =
            Shape::from_xml(sp(9, "Title").into_bytes(), ShapeKind::AutoShape).unwrap();
        assert!(matches!(
            tree.add_shape(dup_name),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_remove_shape() {
        let xml = slide_xml(&(sp(2, "Title") + &sp(3, "Body")));
        let mut tree = ShapeTree::parse(&xml).unwrap();

        let removed = tree.remove_shape(2).unwrap();
        assert_eq!(removed.name(), "Title");
        assert_eq!(tree.shapes().len(), 1);
        assert!(tree.remove_shape(2).is_err());
    }

    #[test]
    fn test_count_rel_refs() {
        let pic = |id: u32, rid: &str| {
            format!(
                r#"<p:pic><p:nvPicPr><p:cNvPr id="{}" name="P{}"/></p:nvPicPr><p:blipFill><a:blip r:embed="{}"/></p:blipFill><p:spPr/></p:pic>"#,
                id, id, rid
            )
        };
        let xml = slide_xml(&(pic(2, "rId3") + &pic(3, "rId3") + &pic(4, "rId4")));
        let tree = ShapeTree::parse(&xml).unwrap();

        assert_eq!(tree.count_rel_refs("rId3"), 2);
        assert_eq!(tree.count_rel_refs("rId4"), 1);
        assert_eq!(tree.count_rel_refs("rId5"), 0);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The suffix law always yields a fresh name one past the
            /// maximum numeric suffix present.
            #[test]
            fn duplicate_name_is_fresh_and_maximal(suffixes in proptest::collection::btree_set(2u32..200, 0..8)) {
                let mut body = sp(2, "Shape");
                let mut next_id = 3;
                for s in &suffixes {
                    body.push_str(&sp(next_id, &format!("Shape {}", s)));
                    next_id += 1;
                }
                let xml = slide_xml(&body);
                let mut tree = ShapeTree::parse(&xml).unwrap();

                let expected = suffixes.iter().copied().max().unwrap_or(1).max(1) + 1;
                let new_id = tree.duplicate(2).unwrap();
                let name = tree.shape(new_id).unwrap().name().to_string();

                prop_assert_eq!(name.clone(), format!("Shape {}", expected));
                prop_assert_eq!(
                    tree.shapes().iter().filter(|s| s.name() == name).count(),
                    1
                );
            }
        }
    }
}
