//! The presentation object: root of the object model.
//!
//! Owns the part graph, the slide and master id lists, the lazily parsed
//! shape trees, and the generation counter that keys every derived cache.
//! All mutation goes through here so invalidation has a single choke point.

use crate::error::{Error, Result};
use crate::opc::constants::{content_type as ct, relationship_type as rt};
use crate::opc::{OpcPackage, PackURI, PackageWriter, Part};
use crate::pptx::customshow::CustomShowList;
use crate::pptx::shapes::shape::Transform;
use crate::pptx::shapes::textframe::TextFrame;
use crate::pptx::shapes::tree::ShapeTree;
use crate::pptx::slide as slide_xml;
use crate::pptx::style::cascade::{self, CascadeContext, MasterTextStyles};
use crate::pptx::style::color::ColorRef;
use crate::pptx::style::fontdata::{FontCache, FontData};
use crate::pptx::theme::{ColorMap, Theme};
use crate::pptx::xmlutil;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

/// One entry of the presentation root's ordered slide id list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideIdEntry {
    /// The slide id (unique, >= 256 by convention)
    pub id: u32,
    /// The relationship id on the presentation part
    pub r_id: String,
}

/// One entry of the ordered slide master id list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterIdEntry {
    /// The master id
    pub id: u32,
    /// The relationship id on the presentation part
    pub r_id: String,
}

/// A presentation document loaded into memory.
///
/// Single-threaded and single-owner: concurrent mutation requires external
/// locking, and a failed multi-step mutation leaves the model corrupt (the
/// structural engines stage their work to make that window as small as
/// possible).
pub struct Presentation {
    /// The part graph
    pub(crate) opc: OpcPackage,
    /// Partname of the presentation root part
    pub(crate) main_partname: PackURI,
    /// Ordered slide id list
    pub(crate) slide_entries: Vec<SlideIdEntry>,
    /// Ordered master id list
    pub(crate) master_entries: Vec<MasterIdEntry>,
    /// Custom shows
    pub(crate) custom_shows: CustomShowList,
    /// Slide size in EMU, when declared
    slide_size: Option<(i64, i64)>,
    /// Lazily parsed shape trees, keyed by partname
    trees: HashMap<String, ShapeTree>,
    /// Trees whose serialized form is stale
    dirty_trees: HashSet<String>,
    /// Memoized cascade resolutions
    font_cache: FontCache,
    /// Bumped by every structural mutation; keys all derived caches
    pub(crate) generation: u64,
}

impl Presentation {
    /// Open a presentation from a file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_package(OpcPackage::open(path)?)
    }

    /// Load a presentation from package bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_package(OpcPackage::from_bytes(data)?)
    }

    fn from_package(opc: OpcPackage) -> Result<Self> {
        let main = opc.main_part()?;
        let content_type = main.content_type();
        if content_type != ct::PML_PRESENTATION_MAIN && content_type != ct::PML_PRES_MACRO_MAIN {
            return Err(Error::PackageCorrupt(format!(
                "main part has content type {}, not a presentation",
                content_type
            )));
        }
        let main_partname = main.partname().clone();
        let (slide_entries, master_entries, slide_size) = parse_presentation_xml(main.blob())?;
        let custom_shows = CustomShowList::parse(main.blob())?;

        info!(
            slides = slide_entries.len(),
            masters = master_entries.len(),
            "presentation opened"
        );
        Ok(Presentation {
            opc,
            main_partname,
            slide_entries,
            master_entries,
            custom_shows,
            slide_size,
            trees: HashMap::new(),
            dirty_trees: HashSet::new(),
            font_cache: FontCache::new(),
            generation: 0,
        })
    }

    /// Serialize the presentation back to package bytes.
    ///
    /// Flushes every dirty shape tree and the presentation root lists, then
    /// writes the part graph. Untouched parts round-trip byte-for-byte.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.flush()?;
        Ok(PackageWriter::to_bytes(&self.opc)?)
    }

    /// Save the presentation to a file.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Write pending model state back into part blobs.
    pub(crate) fn flush(&mut self) -> Result<()> {
        let dirty: Vec<String> = self.dirty_trees.drain().collect();
        for partname in dirty {
            let Some(tree) = self.trees.get(&partname) else {
                continue;
            };
            let serialized = tree.to_xml();
            let uri = PackURI::new(partname.clone()).map_err(Error::Xml)?;
            let part = self.opc.get_part_mut(&uri)?;
            let patched = xmlutil::replace_element(part.blob(), b"p:spTree", &serialized)
                .ok_or_else(|| {
                    Error::PackageCorrupt(format!("{} lost its shape tree", partname))
                })?;
            part.set_blob(patched);
        }
        self.flush_presentation_part()?;
        Ok(())
    }

    /// Rewrite the presentation root's id lists and custom shows.
    fn flush_presentation_part(&mut self) -> Result<()> {
        let mut sld_list = String::from("<p:sldIdLst>");
        for entry in &self.slide_entries {
            sld_list.push_str(&format!(
                r#"<p:sldId id="{}" r:id="{}"/>"#,
                entry.id, entry.r_id
            ));
        }
        sld_list.push_str("</p:sldIdLst>");

        let mut master_list = String::from("<p:sldMasterIdLst>");
        for entry in &self.master_entries {
            master_list.push_str(&format!(
                r#"<p:sldMasterId id="{}" r:id="{}"/>"#,
                entry.id, entry.r_id
            ));
        }
        master_list.push_str("</p:sldMasterIdLst>");

        let shows = self.custom_shows.to_xml();

        let part = self.opc.get_part_mut(&self.main_partname)?;
        let mut blob = part.blob().to_vec();

        if xmlutil::element_span(&blob, b"p:sldIdLst").is_some() {
            blob = xmlutil::replace_element(&blob, b"p:sldIdLst", sld_list.as_bytes())
                .ok_or_else(|| Error::Xml("failed to splice sldIdLst".to_string()))?;
        } else {
            blob = xmlutil::insert_before(&blob, b"</p:presentation>", sld_list.as_bytes())
                .ok_or_else(|| Error::Xml("presentation root has no closing tag".to_string()))?;
        }

        if xmlutil::element_span(&blob, b"p:sldMasterIdLst").is_some() {
            blob = xmlutil::replace_element(&blob, b"p:sldMasterIdLst", master_list.as_bytes())
                .ok_or_else(|| Error::Xml("failed to splice sldMasterIdLst".to_string()))?;
        } else {
            blob = xmlutil::insert_before(&blob, b"</p:presentation>", master_list.as_bytes())
                .ok_or_else(|| Error::Xml("presentation root has no closing tag".to_string()))?;
        }

        if xmlutil::element_span(&blob, b"p:custShowLst").is_some() {
            blob = xmlutil::replace_element(&blob, b"p:custShowLst", shows.as_bytes())
                .ok_or_else(|| Error::Xml("failed to splice custShowLst".to_string()))?;
        } else if !shows.is_empty() {
            blob = xmlutil::insert_before(&blob, b"</p:presentation>", shows.as_bytes())
                .ok_or_else(|| Error::Xml("presentation root has no closing tag".to_string()))?;
        }

        part.set_blob(blob);
        Ok(())
    }

    /// Record a structural mutation: all derived caches are now stale.
    pub(crate) fn bump_generation(&mut self) {
        self.generation += 1;
    }

    /// The number of slides.
    pub fn slide_count(&self) -> usize {
        self.slide_entries.len()
    }

    /// Slide size in EMU, when the package declares one.
    pub fn slide_size(&self) -> Option<(i64, i64)> {
        self.slide_size
    }

    /// The ordered slide id entries.
    pub fn slide_entries(&self) -> &[SlideIdEntry] {
        &self.slide_entries
    }

    /// The custom show list.
    pub fn custom_shows(&self) -> &CustomShowList {
        &self.custom_shows
    }

    /// Mutable access to the custom show list.
    pub fn custom_shows_mut(&mut self) -> &mut CustomShowList {
        &mut self.custom_shows
    }

    /// Validate a 1-based slide position and return its index.
    pub(crate) fn slide_index(&self, position: usize) -> Result<usize> {
        if position == 0 || position > self.slide_entries.len() {
            return Err(Error::InvalidArgument(format!(
                "slide position {} out of range 1..={}",
                position,
                self.slide_entries.len()
            )));
        }
        Ok(position - 1)
    }

    /// The partname of the slide at a 1-based position.
    pub fn slide_partname(&self, position: usize) -> Result<PackURI> {
        let idx = self.slide_index(position)?;
        let r_id = &self.slide_entries[idx].r_id;
        Ok(self.opc.resolve(&self.main_partname, r_id)?.partname().clone())
    }

    /// The layout partname a slide inherits from.
    pub fn layout_partname(&self, slide: &PackURI) -> Result<PackURI> {
        let part = self.opc.get_part(slide)?;
        let rel = part.rels().part_with_reltype(rt::SLIDE_LAYOUT)?;
        Ok(rel.target_partname()?)
    }

    /// The master partname a layout inherits from.
    pub fn master_partname(&self, layout: &PackURI) -> Result<PackURI> {
        let part = self.opc.get_part(layout)?;
        let rel = part.rels().part_with_reltype(rt::SLIDE_MASTER)?;
        Ok(rel.target_partname()?)
    }

    /// The theme partname hanging off a master.
    pub fn theme_partname(&self, master: &PackURI) -> Result<PackURI> {
        let part = self.opc.get_part(master)?;
        let rel = part.rels().part_with_reltype(rt::THEME)?;
        Ok(rel.target_partname()?)
    }

    /// Parse (or fetch the cached) shape tree of a part.
    pub fn tree(&mut self, partname: &PackURI) -> Result<&ShapeTree> {
        self.ensure_tree(partname)?;
        Ok(self.trees.get(partname.as_str()).unwrap())
    }

    /// Mutable access to a part's shape tree.
    ///
    /// Marks the tree dirty and bumps the generation: conservative, but
    /// stale reads are the bug class this buys out of.
    pub fn tree_mut(&mut self, partname: &PackURI) -> Result<&mut ShapeTree> {
        self.ensure_tree(partname)?;
        self.dirty_trees.insert(partname.to_string());
        self.bump_generation();
        Ok(self.trees.get_mut(partname.as_str()).unwrap())
    }

    fn ensure_tree(&mut self, partname: &PackURI) -> Result<()> {
        if !self.trees.contains_key(partname.as_str()) {
            let part = self.opc.get_part(partname)?;
            let tree = ShapeTree::parse(part.blob())?;
            self.trees.insert(partname.to_string(), tree);
        }
        Ok(())
    }

    /// Drop a cached tree (used when the part itself goes away).
    pub(crate) fn evict_tree(&mut self, partname: &str) {
        self.trees.remove(partname);
        self.dirty_trees.remove(partname);
    }

    /// Concatenated text of every shape on a slide.
    pub fn slide_text(&mut self, position: usize) -> Result<String> {
        let partname = self.slide_partname(position)?;
        self.tree(&partname)?.text()
    }

    /// Whether a slide is hidden.
    pub fn is_slide_hidden(&self, position: usize) -> Result<bool> {
        let partname = self.slide_partname(position)?;
        Ok(slide_xml::is_hidden(self.opc.get_part(&partname)?.blob()))
    }

    /// Hide or show a slide.
    pub fn set_slide_hidden(&mut self, position: usize, hidden: bool) -> Result<()> {
        let partname = self.slide_partname(position)?;
        let part = self.opc.get_part_mut(&partname)?;
        let patched = slide_xml::set_hidden(part.blob(), hidden)
            .ok_or_else(|| Error::Xml("slide root not found".to_string()))?;
        part.set_blob(patched);
        Ok(())
    }

    /// Replace the text of a shape.
    ///
    /// Plain text set: each line becomes a paragraph. Auto-fit is a separate
    /// step ([`Presentation::set_text_autofit`]) because it needs the
    /// measurement capability.
    pub fn set_text(&mut self, position: usize, shape_id: u32, text: &str) -> Result<()> {
        let partname = self.slide_partname(position)?;
        let tree = self.tree_mut(&partname)?;
        let shape = tree.shape_mut(shape_id).ok_or_else(|| {
            Error::InvalidArgument(format!("no shape with id {}", shape_id))
        })?;
        let mut frame = shape
            .text_frame()?
            .unwrap_or_else(TextFrame::empty);
        frame.set_text(text);
        shape.set_text_frame(&frame)?;
        Ok(())
    }

    /// A shape's explicit transform, when it has one.
    pub fn shape_transform(&mut self, position: usize, shape_id: u32) -> Result<Option<Transform>> {
        let partname = self.slide_partname(position)?;
        let tree = self.tree(&partname)?;
        let shape = tree.shape(shape_id).ok_or_else(|| {
            Error::InvalidArgument(format!("no shape with id {}", shape_id))
        })?;
        Ok(shape.transform())
    }

    /// A shape's effective transform, resolved through the placeholder
    /// chain when the shape inherits its geometry.
    pub fn effective_transform(
        &mut self,
        position: usize,
        shape_id: u32,
    ) -> Result<Option<Transform>> {
        let slide_pn = self.slide_partname(position)?;
        let layout_pn = self.layout_partname(&slide_pn)?;
        let master_pn = self.master_partname(&layout_pn)?;
        self.ensure_tree(&slide_pn)?;
        self.ensure_tree(&layout_pn)?;
        self.ensure_tree(&master_pn)?;

        let slide_tree = self.trees.get(slide_pn.as_str()).unwrap();
        let shape = slide_tree.shape(shape_id).ok_or_else(|| {
            Error::InvalidArgument(format!("no shape with id {}", shape_id))
        })?;
        if let Some(t) = shape.transform() {
            return Ok(Some(t));
        }
        let Some(key) = shape.placeholder() else {
            return Ok(None);
        };

        for pn in [&layout_pn, &master_pn] {
            if let Some(t) = self
                .trees
                .get(pn.as_str())
                .and_then(|t| t.find_placeholder(key))
                .and_then(|s| s.transform())
            {
                return Ok(Some(t));
            }
        }
        Ok(None)
    }

    /// Set a shape's explicit position and extent.
    pub fn set_shape_transform(
        &mut self,
        position: usize,
        shape_id: u32,
        transform: Transform,
    ) -> Result<()> {
        let partname = self.slide_partname(position)?;
        let tree = self.tree_mut(&partname)?;
        let shape = tree.shape_mut(shape_id).ok_or_else(|| {
            Error::InvalidArgument(format!("no shape with id {}", shape_id))
        })?;
        shape.set_transform(transform)
    }

    /// Resolve a shape's effective font at an outline level.
    ///
    /// Memoized per (slide, shape, level) until the next structural
    /// mutation. Resolution itself never errors; an exhausted chain yields
    /// the empty default.
    pub fn resolve_font(
        &mut self,
        position: usize,
        shape_id: u32,
        level: u8,
    ) -> Result<FontData> {
        let slide_pn = self.slide_partname(position)?;
        if let Some(hit) =
            self.font_cache
                .get(self.generation, slide_pn.as_str(), shape_id, level)
        {
            return Ok(hit);
        }

        let layout_pn = self.layout_partname(&slide_pn)?;
        let master_pn = self.master_partname(&layout_pn)?;
        self.ensure_tree(&slide_pn)?;
        self.ensure_tree(&layout_pn)?;
        self.ensure_tree(&master_pn)?;

        let master_blob = self.opc.get_part(&master_pn)?.blob();
        let master_styles = MasterTextStyles::parse(master_blob);
        let theme = match self.theme_partname(&master_pn) {
            Ok(theme_pn) => Theme::parse(self.opc.get_part(&theme_pn)?.blob())?,
            Err(_) => Theme::default(),
        };

        let slide_tree = self.trees.get(slide_pn.as_str()).unwrap();
        let shape = slide_tree.shape(shape_id).ok_or_else(|| {
            Error::InvalidArgument(format!("no shape with id {}", shape_id))
        })?;

        let ctx = CascadeContext {
            layout_tree: self.trees.get(layout_pn.as_str()),
            master_tree: self.trees.get(master_pn.as_str()),
            master_styles: &master_styles,
            theme: &theme,
        };
        let resolved = cascade::resolve_font(&ctx, shape, level);

        self.font_cache.put(
            self.generation,
            slide_pn.as_str(),
            shape_id,
            level,
            resolved.clone(),
        );
        Ok(resolved)
    }

    /// A portion's effective font: explicit fields over the shape cascade
    /// at the portion's paragraph level.
    pub fn resolve_portion_font(
        &mut self,
        position: usize,
        shape_id: u32,
        paragraph: usize,
        portion: usize,
    ) -> Result<FontData> {
        let slide_pn = self.slide_partname(position)?;
        let frame = {
            let tree = self.tree(&slide_pn)?;
            let shape = tree.shape(shape_id).ok_or_else(|| {
                Error::InvalidArgument(format!("no shape with id {}", shape_id))
            })?;
            shape.text_frame()?.ok_or_else(|| {
                Error::InvalidArgument(format!("shape {} has no text frame", shape_id))
            })?
        };
        let para = frame.paragraphs.get(paragraph).ok_or_else(|| {
            Error::InvalidArgument(format!("no paragraph {}", paragraph))
        })?;
        let portion = para.portions.get(portion).ok_or_else(|| {
            Error::InvalidArgument(format!("no portion {}", portion))
        })?;

        let resolved = self.resolve_font(position, shape_id, para.level)?;
        Ok(cascade::effective_portion_font(&portion.font, &resolved))
    }

    /// Resolve a color reference against a slide's master scheme.
    pub fn resolve_color(
        &mut self,
        position: usize,
        color: &ColorRef,
    ) -> Result<Option<String>> {
        let slide_pn = self.slide_partname(position)?;
        let layout_pn = self.layout_partname(&slide_pn)?;
        let master_pn = self.master_partname(&layout_pn)?;

        let master_blob = self.opc.get_part(&master_pn)?.blob();
        let color_map = ColorMap::from_master_xml(master_blob);
        let theme = match self.theme_partname(&master_pn) {
            Ok(theme_pn) => Theme::parse(self.opc.get_part(&theme_pn)?.blob())?,
            Err(_) => Theme::default(),
        };

        Ok(color.resolve(&theme.color_scheme, &color_map))
    }

    /// A shape's fill color resolved to RGB hex through the master scheme.
    ///
    /// None when the shape has no explicit solid fill, or the reference
    /// exhausts the chain; callers decide whether that matters.
    pub fn shape_fill_hex(&mut self, position: usize, shape_id: u32) -> Result<Option<String>> {
        let slide_pn = self.slide_partname(position)?;
        let fill = {
            let tree = self.tree(&slide_pn)?;
            let shape = tree.shape(shape_id).ok_or_else(|| {
                Error::InvalidArgument(format!("no shape with id {}", shape_id))
            })?;
            shape.fill_color()
        };
        match fill {
            Some(color) => self.resolve_color(position, &color),
            None => Ok(None),
        }
    }

    /// Whether a slide has a picture-filled background.
    pub fn has_background_image(&self, position: usize) -> Result<bool> {
        let partname = self.slide_partname(position)?;
        Ok(slide_xml::background_blip_rid(self.opc.get_part(&partname)?.blob()).is_some())
    }

    /// The background image bytes and content type of a slide.
    ///
    /// Check [`Presentation::has_background_image`] first; absence raises
    /// [`Error::NotPresent`].
    pub fn background_image(&self, position: usize) -> Result<(Vec<u8>, String)> {
        let partname = self.slide_partname(position)?;
        let blob = self.opc.get_part(&partname)?.blob();
        let r_id = slide_xml::background_blip_rid(blob).ok_or_else(|| {
            Error::NotPresent("slide has no background image".to_string())
        })?;
        let image = self.opc.resolve(&partname, &r_id)?;
        Ok((image.blob().to_vec(), image.content_type().to_string()))
    }

    /// Replace a slide's background image bytes.
    ///
    /// When the image part is shared by more than one referent, a fresh
    /// part and relationship are allocated before the write so the other
    /// referents keep their pixels.
    pub fn set_background_image(&mut self, position: usize, bytes: Vec<u8>) -> Result<()> {
        let slide_pn = self.slide_partname(position)?;
        let blob = self.opc.get_part(&slide_pn)?.blob();
        let r_id = slide_xml::background_blip_rid(blob).ok_or_else(|| {
            Error::NotPresent("slide has no background image".to_string())
        })?;

        let image_pn = self.opc.resolve(&slide_pn, &r_id)?.partname().clone();
        let shared = self.incoming_rel_count(&image_pn) > 1;

        if shared {
            let content_type = self.opc.get_part(&image_pn)?.content_type().to_string();
            let new_pn = self
                .opc
                .next_partname(&image_partname_template(&content_type))?;
            self.opc
                .add_part(Part::new(new_pn.clone(), content_type, bytes))?;
            let new_rid = self.opc.relate(&slide_pn, &new_pn, rt::IMAGE)?;

            let part = self.opc.get_part_mut(&slide_pn)?;
            let patched = slide_xml::set_background_blip_rid(part.blob(), &new_rid)
                .ok_or_else(|| Error::Xml("background blip not found".to_string()))?;
            part.set_blob(patched);
        } else {
            self.opc.get_part_mut(&image_pn)?.set_blob(bytes);
        }
        self.bump_generation();
        Ok(())
    }

    /// Number of relationships across the package pointing at a part.
    pub(crate) fn incoming_rel_count(&self, partname: &PackURI) -> usize {
        self.opc
            .iter_parts()
            .flat_map(|p| p.rels().iter())
            .filter(|rel| {
                !rel.is_external()
                    && rel
                        .target_partname()
                        .map(|t| t == *partname)
                        .unwrap_or(false)
            })
            .count()
    }

    /// The hyperlink URL of a text portion, if any.
    pub fn portion_hyperlink(
        &mut self,
        position: usize,
        shape_id: u32,
        paragraph: usize,
        portion: usize,
    ) -> Result<Option<String>> {
        let slide_pn = self.slide_partname(position)?;
        let frame = {
            let tree = self.tree(&slide_pn)?;
            let shape = tree.shape(shape_id).ok_or_else(|| {
                Error::InvalidArgument(format!("no shape with id {}", shape_id))
            })?;
            shape.text_frame()?.ok_or_else(|| {
                Error::InvalidArgument(format!("shape {} has no text frame", shape_id))
            })?
        };
        let Some(r_id) = frame
            .paragraphs
            .get(paragraph)
            .and_then(|p| p.portions.get(portion))
            .and_then(|p| p.hyperlink_rid.clone())
        else {
            return Ok(None);
        };

        let part = self.opc.get_part(&slide_pn)?;
        let rel = part.rels().get(&r_id).ok_or_else(|| {
            Error::DanglingRelationship(format!("{} has no {}", slide_pn, r_id))
        })?;
        Ok(Some(rel.target_ref().to_string()))
    }

    /// Point a text portion at an external URL.
    pub fn set_portion_hyperlink(
        &mut self,
        position: usize,
        shape_id: u32,
        paragraph: usize,
        portion: usize,
        url: &str,
    ) -> Result<()> {
        let slide_pn = self.slide_partname(position)?;
        let r_id = self
            .opc
            .get_part_mut(&slide_pn)?
            .rels_mut()
            .get_or_add_external(rt::HYPERLINK, url);

        let tree = self.tree_mut(&slide_pn)?;
        let shape = tree.shape_mut(shape_id).ok_or_else(|| {
            Error::InvalidArgument(format!("no shape with id {}", shape_id))
        })?;
        let mut frame = shape.text_frame()?.ok_or_else(|| {
            Error::InvalidArgument(format!("shape {} has no text frame", shape_id))
        })?;
        let target = frame
            .paragraphs
            .get_mut(paragraph)
            .and_then(|p| p.portions.get_mut(portion))
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "no portion {}/{} in shape {}",
                    paragraph, portion, shape_id
                ))
            })?;
        target.hyperlink_rid = Some(r_id);
        shape.set_text_frame(&frame)?;
        Ok(())
    }

    /// The vector (SVG) content attached to a picture, as a UTF-8 string.
    ///
    /// Absence raises [`Error::NotPresent`]; replacing vector content is
    /// not supported.
    pub fn picture_svg_content(&mut self, position: usize, shape_id: u32) -> Result<String> {
        let slide_pn = self.slide_partname(position)?;
        let r_id = {
            let tree = self.tree(&slide_pn)?;
            let shape = tree.shape(shape_id).ok_or_else(|| {
                Error::InvalidArgument(format!("no shape with id {}", shape_id))
            })?;
            shape.svg_blip_rid().ok_or_else(|| {
                Error::NotPresent(format!("shape {} has no vector content", shape_id))
            })?
        };
        let part = self.opc.resolve(&slide_pn, &r_id)?;
        Ok(String::from_utf8_lossy(part.blob()).into_owned())
    }

    /// Replacing a picture's vector payload is intentionally unimplemented.
    pub fn set_picture_svg_content(
        &mut self,
        _position: usize,
        _shape_id: u32,
        _svg: &str,
    ) -> Result<()> {
        Err(Error::UnsupportedOperation(
            "replacing picture vector content",
        ))
    }

    /// The embedded workbook bytes behind a chart graphic frame.
    pub fn chart_workbook_bytes(&mut self, position: usize, shape_id: u32) -> Result<Vec<u8>> {
        let slide_pn = self.slide_partname(position)?;
        let chart_rid = {
            let tree = self.tree(&slide_pn)?;
            let shape = tree.shape(shape_id).ok_or_else(|| {
                Error::InvalidArgument(format!("no shape with id {}", shape_id))
            })?;
            shape.chart_rid().ok_or_else(|| {
                Error::NotPresent(format!("shape {} references no chart", shape_id))
            })?
        };
        let chart_pn = self.opc.resolve(&slide_pn, &chart_rid)?.partname().clone();
        let chart = self.opc.get_part(&chart_pn)?;
        let workbook_rel = chart.rels().part_with_reltype(rt::PACKAGE)?;
        let workbook_pn = workbook_rel.target_partname()?;
        Ok(self.opc.get_part(&workbook_pn)?.blob().to_vec())
    }

    /// Replacing an embedded workbook is intentionally unimplemented.
    pub fn set_chart_workbook_bytes(
        &mut self,
        _position: usize,
        _shape_id: u32,
        _bytes: Vec<u8>,
    ) -> Result<()> {
        Err(Error::UnsupportedOperation("replacing embedded workbooks"))
    }

    /// Access to the underlying part graph.
    #[inline]
    pub fn package(&self) -> &OpcPackage {
        &self.opc
    }
}

/// The partname template matching an image content type.
pub(crate) fn image_partname_template(content_type: &str) -> String {
    let ext = match content_type {
        ct::PNG => "png",
        ct::JPEG => "jpeg",
        ct::GIF => "gif",
        ct::BMP => "bmp",
        ct::TIFF => "tiff",
        ct::SVG => "svg",
        ct::X_EMF => "emf",
        ct::X_WMF => "wmf",
        _ => "bin",
    };
    format!("/ppt/media/image%d.{}", ext)
}

/// Parse the slide id list, master id list and slide size out of the
/// presentation root XML.
#[allow(clippy::type_complexity)]
fn parse_presentation_xml(
    xml: &[u8],
) -> Result<(Vec<SlideIdEntry>, Vec<MasterIdEntry>, Option<(i64, i64)>)> {
    let mut slides = Vec::new();
    let mut masters = Vec::new();
    let mut size = None;

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"sldId" => {
                    let id = xmlutil::attr(e, b"id")
                        .and_then(|v| v.parse().ok())
                        .ok_or_else(|| {
                            Error::PackageCorrupt("slide id entry lacks an id".to_string())
                        })?;
                    let r_id = xmlutil::local_attr(e, b"id")
                        .filter(|v| v.starts_with("rId"))
                        .or_else(|| xmlutil::attr(e, b"r:id"))
                        .ok_or_else(|| {
                            Error::PackageCorrupt("slide id entry lacks an r:id".to_string())
                        })?;
                    slides.push(SlideIdEntry { id, r_id });
                }
                b"sldMasterId" => {
                    let id = xmlutil::attr(e, b"id")
                        .and_then(|v| v.parse().ok())
                        .ok_or_else(|| {
                            Error::PackageCorrupt("master id entry lacks an id".to_string())
                        })?;
                    let r_id = xmlutil::attr(e, b"r:id").ok_or_else(|| {
                        Error::PackageCorrupt("master id entry lacks an r:id".to_string())
                    })?;
                    masters.push(MasterIdEntry { id, r_id });
                }
                b"sldSz" => {
                    let cx = xmlutil::attr(e, b"cx").and_then(|v| v.parse().ok());
                    let cy = xmlutil::attr(e, b"cy").and_then(|v| v.parse().ok());
                    if let (Some(cx), Some(cy)) = (cx, cy) {
                        size = Some((cx, cy));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(format!("presentation root: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok((slides, masters, size))
}
