//! Structural slide operations: remove, renumber, duplicate shapes, copy
//! slides within or across packages, and add empty slides from a layout.
//!
//! Copies are staged: the full cloned subgraph (partnames allocated, blobs
//! cloned, relationships remapped, master layout list pruned) is computed
//! against an immutable view of the source, and only then spliced into the
//! destination as one batch of inserts. A failure while planning leaves the
//! destination untouched.

use crate::error::{Error, Result};
use crate::opc::constants::{namespace as ns, relationship_type as rt};
use crate::opc::{OpcPackage, PackURI, Part, PartKind};
use crate::pptx::presentation::{MasterIdEntry, Presentation, SlideIdEntry, image_partname_template};
use crate::pptx::shapes::shape::ShapeKind;
use crate::pptx::xmlutil;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info};

/// A part staged for insertion by a slide copy.
struct StagedPart {
    partname: PackURI,
    content_type: String,
    blob: Vec<u8>,
    rels: Vec<StagedRel>,
}

/// A relationship staged on a cloned part. Internal targets are already
/// remapped to their destination partnames; rIds keep their source values so
/// references inside the cloned blobs stay valid.
struct StagedRel {
    r_id: String,
    reltype: String,
    internal_target: Option<PackURI>,
    external_target: Option<String>,
}

/// The staged effect of copying one slide: every cloned part plus the two
/// partnames the id lists need.
struct ClonePlan {
    parts: Vec<StagedPart>,
    slide_partname: PackURI,
    master_partname: PackURI,
}

impl Presentation {
    /// Remove the slide at a 1-based position.
    ///
    /// Detaches the slide-id entry, removes the part with all edges touching
    /// it, and scrubs every custom show of the removed slide's rId. Layouts
    /// and masters left unreferenced are not swept; that cleanup is deferred
    /// to callers that care.
    pub fn remove_slide(&mut self, position: usize) -> Result<()> {
        let idx = self.slide_index(position)?;
        let entry = self.slide_entries[idx].clone();
        let partname = self
            .opc
            .resolve(&self.main_partname, &entry.r_id)?
            .partname()
            .clone();

        // Compute the removal before touching anything.
        let plan = self.opc.removal_plan(&partname)?;

        info!(slide = %partname, position, "removing slide");
        self.slide_entries.remove(idx);
        self.custom_shows.remove_slide_rid(&entry.r_id);
        self.opc.remove_part(plan);
        self.evict_tree(partname.as_str());
        self.bump_generation();
        Ok(())
    }

    /// Move a slide to another 1-based position: a single element move in
    /// the id list, not a re-derivation.
    pub fn set_slide_number(&mut self, from: usize, to: usize) -> Result<()> {
        let from_idx = self.slide_index(from)?;
        let to_idx = self.slide_index(to)?;
        let entry = self.slide_entries.remove(from_idx);
        self.slide_entries.insert(to_idx, entry);
        self.bump_generation();
        Ok(())
    }

    /// Deep-clone a shape on a slide.
    ///
    /// The clone gets the next unused id and a suffix-law name. A cloned
    /// picture whose image relationship is already shared gets a fresh image
    /// part with the same bytes, so mutating one copy's pixels can never
    /// corrupt the other's.
    pub fn duplicate_shape(&mut self, position: usize, shape_id: u32) -> Result<u32> {
        let slide_pn = self.slide_partname(position)?;

        let (kind, blip_rid, shared) = {
            let tree = self.tree(&slide_pn)?;
            let shape = tree.shape(shape_id).ok_or_else(|| {
                Error::InvalidArgument(format!("no shape with id {}", shape_id))
            })?;
            let blip_rid = shape.blip_rid();
            let shared = blip_rid
                .as_deref()
                .map(|rid| tree.count_rel_refs(rid) > 1)
                .unwrap_or(false);
            (shape.kind(), blip_rid, shared)
        };

        let new_id = self.tree_mut(&slide_pn)?.duplicate(shape_id)?;

        if kind == ShapeKind::Picture
            && shared
            && let Some(rid) = blip_rid
        {
            let image = self.opc.resolve(&slide_pn, &rid)?;
            let content_type = image.content_type().to_string();
            let bytes = image.blob().to_vec();

            let new_pn = self
                .opc
                .next_partname(&image_partname_template(&content_type))?;
            self.opc
                .add_part(Part::new(new_pn.clone(), content_type, bytes))?;
            let new_rid = self.opc.relate(&slide_pn, &new_pn, rt::IMAGE)?;

            let tree = self.tree_mut(&slide_pn)?;
            tree.shape_mut(new_id)
                .expect("freshly duplicated shape")
                .set_blip_rid(&new_rid)?;
            debug!(image = %new_pn, "cloned shared image payload");
        }

        Ok(new_id)
    }

    /// Duplicate a slide and place the copy at a 1-based position: an
    /// append followed by a single renumbering move.
    pub fn insert_slide(&mut self, position: usize, at: usize) -> Result<usize> {
        if at == 0 || at > self.slide_entries.len() + 1 {
            return Err(Error::InvalidArgument(format!(
                "insert position {} out of range 1..={}",
                at,
                self.slide_entries.len() + 1
            )));
        }
        let appended = self.copy_slide(position)?;
        if at != appended {
            self.set_slide_number(appended, at)?;
        }
        Ok(at)
    }

    /// Duplicate a slide within this package. Returns the new 1-based
    /// position (always appended at the end).
    pub fn copy_slide(&mut self, position: usize) -> Result<usize> {
        let slide_pn = self.slide_partname(position)?;
        self.flush()?;
        let plan = build_clone_plan(&self.opc, &self.opc, &slide_pn)?;
        self.apply_clone_plan(plan)
    }

    /// Copy a slide from another package into this one. Returns the new
    /// 1-based position.
    ///
    /// The slide part is cloned without its notes slide; its layout, master
    /// and theme come along, with the cloned master's layout list pruned to
    /// the layouts actually cloned.
    pub fn add_slide_from(
        &mut self,
        source: &mut Presentation,
        position: usize,
    ) -> Result<usize> {
        source.flush()?;
        let slide_pn = source.slide_partname(position)?;
        let plan = build_clone_plan(&source.opc, &self.opc, &slide_pn)?;
        self.apply_clone_plan(plan)
    }

    /// Splice a staged clone into this package: insert every part, then
    /// append the new slide and master ids, then renumber the cloned
    /// master's layout ids contiguously past the new master id.
    fn apply_clone_plan(&mut self, plan: ClonePlan) -> Result<usize> {
        let ClonePlan {
            parts,
            slide_partname,
            master_partname,
        } = plan;

        info!(
            slide = %slide_partname,
            parts = parts.len(),
            "copying slide subgraph"
        );
        for staged in parts {
            let mut part = Part::new(staged.partname.clone(), staged.content_type, staged.blob);
            for rel in staged.rels {
                match (rel.internal_target, rel.external_target) {
                    (Some(target), _) => {
                        let target_ref = target.relative_ref(staged.partname.base_uri());
                        part.rels_mut().load(rel.reltype, target_ref, rel.r_id, false);
                    }
                    (None, Some(url)) => {
                        part.rels_mut().load(rel.reltype, url, rel.r_id, true);
                    }
                    (None, None) => {}
                }
            }
            self.opc.add_part(part)?;
        }

        // New slide id: one past the maximum in the destination list.
        let slide_rid = self
            .opc
            .relate(&self.main_partname, &slide_partname, rt::SLIDE)?;
        let slide_id = self
            .slide_entries
            .iter()
            .map(|e| e.id)
            .max()
            .unwrap_or(255)
            + 1;
        self.slide_entries.push(SlideIdEntry {
            id: slide_id,
            r_id: slide_rid,
        });

        // New master id, then contiguous layout ids following it.
        let master_rid = self
            .opc
            .relate(&self.main_partname, &master_partname, rt::SLIDE_MASTER)?;
        let master_id = self
            .master_entries
            .iter()
            .map(|e| e.id)
            .max()
            .unwrap_or(2147483647)
            + 1;
        self.master_entries.push(MasterIdEntry {
            id: master_id,
            r_id: master_rid,
        });
        self.renumber_master_layout_ids(&master_partname, master_id)?;

        self.bump_generation();
        Ok(self.slide_entries.len())
    }

    /// Rewrite a master's `<p:sldLayoutIdLst>` so it lists exactly the
    /// layouts the master has relationships for, with ids allocated
    /// contiguously from one past the master id.
    fn renumber_master_layout_ids(&mut self, master: &PackURI, master_id: u32) -> Result<()> {
        let part = self.opc.get_part_mut(master)?;
        let layout_rids: Vec<String> = part
            .rels()
            .rels_of_type(rt::SLIDE_LAYOUT)
            .map(|rel| rel.r_id().to_string())
            .collect();

        let mut list = String::from("<p:sldLayoutIdLst>");
        for (offset, rid) in layout_rids.iter().enumerate() {
            list.push_str(&format!(
                r#"<p:sldLayoutId id="{}" r:id="{}"/>"#,
                master_id + 1 + offset as u32,
                rid
            ));
        }
        list.push_str("</p:sldLayoutIdLst>");

        let blob = part.blob();
        let patched = xmlutil::replace_element(blob, b"p:sldLayoutIdLst", list.as_bytes())
            .or_else(|| xmlutil::insert_before(blob, b"</p:sldMaster>", list.as_bytes()))
            .ok_or_else(|| Error::PackageCorrupt(format!("{} has no master root", master)))?;
        part.set_blob(patched);
        Ok(())
    }

    /// Add an empty slide built from a layout's placeholder shapes.
    ///
    /// Placeholders are cloned with their text bodies and emptied shape
    /// properties, so the new shapes inherit geometry and style through the
    /// placeholder chain. Returns the new 1-based position.
    pub fn add_empty_slide(&mut self, layout: &PackURI) -> Result<usize> {
        let layout_part = self.opc.get_part(layout)?;
        if layout_part.kind() != PartKind::SlideLayout {
            return Err(Error::InvalidArgument(format!(
                "{} is not a slide layout",
                layout
            )));
        }

        let mut shapes_xml: Vec<u8> = Vec::new();
        {
            let layout_pn = layout.clone();
            let tree = self.tree(&layout_pn)?;
            for shape in tree.shapes() {
                if !shape.is_placeholder() {
                    continue;
                }
                let mut xml = shape.xml().to_vec();
                xml = xmlutil::replace_element(&xml, b"p:spPr", b"<p:spPr/>").unwrap_or(xml);
                if xmlutil::element_span(&xml, b"p:txBody").is_none()
                    && let Some(with_body) = xmlutil::insert_before(
                        &xml,
                        b"</p:sp>",
                        b"<p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:endParaRPr lang=\"en-US\"/></a:p></p:txBody>",
                    )
                {
                    xml = with_body;
                }
                shapes_xml.extend_from_slice(&xml);
            }
        }

        let slide_xml = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<p:sld xmlns:a="{a}" xmlns:r="{r}" xmlns:p="{p}">"#,
                r#"<p:cSld><p:spTree>"#,
                r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
                r#"<p:grpSpPr/>{shapes}</p:spTree></p:cSld>"#,
                r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
            ),
            a = ns::DML_MAIN,
            r = ns::OFC_RELATIONSHIPS,
            p = ns::PML_MAIN,
            shapes = String::from_utf8_lossy(&shapes_xml),
        );

        let slide_pn = self.opc.next_partname("/ppt/slides/slide%d.xml")?;
        let mut part = Part::new(
            slide_pn.clone(),
            crate::opc::constants::content_type::PML_SLIDE.to_string(),
            slide_xml.into_bytes(),
        );
        let layout_ref = layout.relative_ref(slide_pn.base_uri());
        part.rels_mut()
            .load(rt::SLIDE_LAYOUT.to_string(), layout_ref, "rId1".to_string(), false);
        self.opc.add_part(part)?;

        let slide_rid = self.opc.relate(&self.main_partname, &slide_pn, rt::SLIDE)?;
        let slide_id = self
            .slide_entries
            .iter()
            .map(|e| e.id)
            .max()
            .unwrap_or(255)
            + 1;
        self.slide_entries.push(SlideIdEntry {
            id: slide_id,
            r_id: slide_rid,
        });
        self.bump_generation();
        Ok(self.slide_entries.len())
    }
}

/// Compute the staged clone of a slide's part closure.
///
/// Pure with respect to the destination: partnames are allocated against it
/// but nothing is modified. Traversal drops notes-slide edges entirely, and
/// from a master only follows its theme, media, and the layouts already
/// cloned, which is what prunes foreign layouts out of the copy.
fn build_clone_plan(
    source: &OpcPackage,
    dest: &OpcPackage,
    slide_pn: &PackURI,
) -> Result<ClonePlan> {
    let mut planned_names: HashSet<String> = HashSet::new();
    let mut mapping: HashMap<String, PackURI> = HashMap::new();
    let mut staged: Vec<StagedPart> = Vec::new();
    let mut queue: VecDeque<PackURI> = VecDeque::new();

    // Breadth-first over the relationship closure; the layout is reached
    // from the slide before its master, so the master visit can tell which
    // layouts made it into the clone.
    let new_slide = allocate_partname(source.get_part(slide_pn)?, dest, &mut planned_names)?;
    mapping.insert(slide_pn.to_string(), new_slide.clone());
    queue.push_back(slide_pn.clone());

    let mut new_master: Option<PackURI> = None;

    while let Some(current) = queue.pop_front() {
        let part = source.get_part(&current)?;
        let mut rels: Vec<StagedRel> = Vec::new();

        for rel in part.rels().iter_ordered() {
            if rel.is_external() {
                rels.push(StagedRel {
                    r_id: rel.r_id().to_string(),
                    reltype: rel.reltype().to_string(),
                    internal_target: None,
                    external_target: Some(rel.target_ref().to_string()),
                });
                continue;
            }

            // Notes slides never travel with a copied slide.
            if part.kind() == PartKind::Slide && rel.reltype() == rt::NOTES_SLIDE {
                continue;
            }

            let target = rel.target_partname()?;
            if !source.contains_part(&target) {
                // Pre-existing inconsistency in the source; normalize it
                // away rather than importing the corruption.
                continue;
            }

            // A master brings its theme and media, but only layouts that
            // are already part of the clone.
            if part.kind() == PartKind::SlideMaster
                && rel.reltype() == rt::SLIDE_LAYOUT
                && !mapping.contains_key(target.as_str())
            {
                continue;
            }

            let new_target = match mapping.get(target.as_str()) {
                Some(existing) => existing.clone(),
                None => {
                    let allocated =
                        allocate_partname(source.get_part(&target)?, dest, &mut planned_names)?;
                    mapping.insert(target.to_string(), allocated.clone());
                    queue.push_back(target.clone());
                    allocated
                }
            };
            rels.push(StagedRel {
                r_id: rel.r_id().to_string(),
                reltype: rel.reltype().to_string(),
                internal_target: Some(new_target),
                external_target: None,
            });
        }

        let new_name = mapping.get(current.as_str()).unwrap().clone();
        if part.kind() == PartKind::SlideMaster {
            new_master = Some(new_name.clone());
        }
        staged.push(StagedPart {
            partname: new_name,
            content_type: part.content_type().to_string(),
            blob: part.blob().to_vec(),
            rels,
        });
    }

    let master_partname = new_master.ok_or_else(|| {
        Error::PackageCorrupt(format!("{} reaches no slide master", slide_pn))
    })?;

    debug!(parts = staged.len(), "clone plan staged");
    Ok(ClonePlan {
        parts: staged,
        slide_partname: new_slide,
        master_partname,
    })
}

/// Allocate a destination partname for a cloned part, avoiding both
/// existing parts and names already claimed by this plan.
fn allocate_partname(
    part: &Part,
    dest: &OpcPackage,
    planned: &mut HashSet<String>,
) -> Result<PackURI> {
    let template = clone_partname_template(part);
    let mut n = 1u32;
    loop {
        let candidate = template.replace("%d", &n.to_string());
        let uri = PackURI::new(candidate.clone()).map_err(Error::Xml)?;
        if !dest.contains_part(&uri) && !planned.contains(&candidate) {
            planned.insert(candidate);
            return Ok(uri);
        }
        n += 1;
        if n > 100_000 {
            return Err(Error::InvalidArgument(format!(
                "no free partname for template {}",
                template
            )));
        }
    }
}

/// The sequential-name template a cloned part allocates from.
fn clone_partname_template(part: &Part) -> String {
    match part.kind() {
        PartKind::Slide => "/ppt/slides/slide%d.xml".to_string(),
        PartKind::SlideLayout => "/ppt/slideLayouts/slideLayout%d.xml".to_string(),
        PartKind::SlideMaster => "/ppt/slideMasters/slideMaster%d.xml".to_string(),
        PartKind::Theme => "/ppt/theme/theme%d.xml".to_string(),
        PartKind::Chart => "/ppt/charts/chart%d.xml".to_string(),
        PartKind::Workbook => "/ppt/embeddings/Microsoft_Excel_Sheet%d.xlsx".to_string(),
        _ => {
            // Keep the directory and extension, number the stem.
            let partname = part.partname();
            let stem: String = {
                let filename = partname.filename();
                let no_ext = match filename.rfind('.') {
                    Some(pos) => &filename[..pos],
                    None => filename,
                };
                no_ext.trim_end_matches(|c: char| c.is_ascii_digit()).to_string()
            };
            let ext = partname.ext();
            if ext.is_empty() {
                format!("{}/{}%d", partname.base_uri(), stem)
            } else {
                format!("{}/{}%d.{}", partname.base_uri(), stem, ext)
            }
        }
    }
}
