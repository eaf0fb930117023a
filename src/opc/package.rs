/// The in-memory part graph of a presentation package.
///
/// This module provides OpcPackage, which owns every part and, transitively,
/// every relationship. It enforces the graph invariants: relationship ids are
/// unique per source, and a removed part leaves no dangling edges behind.
use crate::opc::constants::relationship_type;
use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::{PACKAGE_URI, PackURI};
use crate::opc::part::{Part, PartKind};
use crate::opc::phys_pkg::PhysPkgReader;
use crate::opc::pkgreader::PackageReader;
use crate::opc::rel::Relationships;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// The part graph: all parts of a package plus the package-level relationships.
///
/// Single owner of all package state. Not safe for concurrent mutation; a
/// caller sharing a package across threads must lock externally.
pub struct OpcPackage {
    /// Package-level relationships
    rels: Relationships,

    /// All parts in the package, indexed by partname
    parts: HashMap<String, Part>,
}

/// The computed effect of removing a part: the part itself plus every
/// relationship that points at it.
///
/// Produced by [`OpcPackage::removal_plan`] as a pure computation, then
/// applied in one batch by [`OpcPackage::remove_part`], so the cleanup
/// contract is auditable independent of the removal mechanics.
#[derive(Debug)]
pub struct RemovalPlan {
    /// The partname being removed
    pub partname: PackURI,

    /// Incoming package-level relationship ids
    pub pkg_rel_ids: Vec<String>,

    /// Incoming part relationships as (source partname, rId) pairs
    pub incoming: Vec<(String, String)>,
}

impl OpcPackage {
    /// Create a new empty package.
    pub fn new() -> Self {
        Self {
            rels: Relationships::new(PACKAGE_URI.to_string()),
            parts: HashMap::new(),
        }
    }

    /// Open a package from a file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::unmarshal(PackageReader::from_phys_reader(PhysPkgReader::open(path)?)?)
    }

    /// Load a package from bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::unmarshal(PackageReader::from_phys_reader(PhysPkgReader::from_bytes(
            data,
        )?)?)
    }

    /// Unmarshal a package from a package reader.
    ///
    /// Converts serialized parts and relationships into the in-memory graph.
    fn unmarshal(pkg_reader: PackageReader) -> Result<Self> {
        let mut package = Self::new();
        let (pkg_srels, sparts) = pkg_reader.into_parts();

        for srel in pkg_srels {
            package.rels.load(
                srel.reltype.clone(),
                srel.target_ref.clone(),
                srel.r_id.clone(),
                srel.is_external(),
            );
        }

        for spart in sparts {
            let mut part = Part::new(spart.partname, spart.content_type, spart.blob);
            for srel in spart.srels {
                part.rels_mut().load(
                    srel.reltype.clone(),
                    srel.target_ref.clone(),
                    srel.r_id.clone(),
                    srel.is_external(),
                );
            }
            package.parts.insert(part.partname().to_string(), part);
        }

        debug!(parts = package.parts.len(), "package unmarshaled");
        Ok(package)
    }

    /// Get the main presentation part.
    ///
    /// Reached through the package-level officeDocument relationship; its
    /// absence means the package is corrupt.
    pub fn main_part(&self) -> Result<&Part> {
        let rel = self
            .rels
            .part_with_reltype(relationship_type::OFFICE_DOCUMENT)
            .map_err(|_| {
                OpcError::CorruptPackage("package has no officeDocument relationship".to_string())
            })?;
        let partname = rel.target_partname()?;
        self.get_part(&partname)
    }

    /// Get a part by its partname.
    pub fn get_part(&self, partname: &PackURI) -> Result<&Part> {
        self.parts
            .get(partname.as_str())
            .ok_or_else(|| OpcError::PartNotFound(partname.to_string()))
    }

    /// Get a mutable reference to a part by its partname.
    pub fn get_part_mut(&mut self, partname: &PackURI) -> Result<&mut Part> {
        self.parts
            .get_mut(partname.as_str())
            .ok_or_else(|| OpcError::PartNotFound(partname.to_string()))
    }

    /// Check if a part exists in the package.
    pub fn contains_part(&self, partname: &PackURI) -> bool {
        self.parts.contains_key(partname.as_str())
    }

    /// Get an iterator over all parts in the package.
    pub fn iter_parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    /// Iterate over the parts of a given kind.
    pub fn parts_of_kind(&self, kind: PartKind) -> impl Iterator<Item = &Part> {
        self.parts.values().filter(move |p| p.kind() == kind)
    }

    /// Get the number of parts in the package.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Add a new part to the package, returning its partname.
    ///
    /// Validates companion invariants before inserting: a slide part must
    /// already carry its slide-layout relationship, and a layout part its
    /// slide-master relationship. On violation nothing is inserted.
    pub fn add_part(&mut self, part: Part) -> Result<PackURI> {
        let partname = part.partname().clone();
        if self.parts.contains_key(partname.as_str()) {
            return Err(OpcError::InvalidRelationship(format!(
                "part already present: {}",
                partname
            )));
        }
        Self::validate_companions(&part)?;
        self.parts.insert(partname.to_string(), part);
        Ok(partname)
    }

    /// Check that a part carries the relationships its kind requires.
    fn validate_companions(part: &Part) -> Result<()> {
        let required = match part.kind() {
            PartKind::Slide => Some(relationship_type::SLIDE_LAYOUT),
            PartKind::SlideLayout => Some(relationship_type::SLIDE_MASTER),
            _ => None,
        };
        if let Some(reltype) = required
            && part.rels().part_with_reltype(reltype).is_err()
        {
            return Err(OpcError::CorruptPackage(format!(
                "{} lacks required relationship {}",
                part.partname(),
                reltype
            )));
        }
        Ok(())
    }

    /// Compute the full set of references that removing a part would touch.
    ///
    /// Pure: inspects the graph without modifying it.
    pub fn removal_plan(&self, partname: &PackURI) -> Result<RemovalPlan> {
        if !self.contains_part(partname) {
            return Err(OpcError::PartNotFound(partname.to_string()));
        }

        let pkg_rel_ids = self
            .rels
            .iter()
            .filter(|rel| {
                !rel.is_external()
                    && rel
                        .target_partname()
                        .map(|t| t == *partname)
                        .unwrap_or(false)
            })
            .map(|rel| rel.r_id().to_string())
            .collect();

        let mut incoming = Vec::new();
        for part in self.parts.values() {
            if part.partname() == partname {
                continue;
            }
            for rel in part.rels().iter() {
                if !rel.is_external()
                    && rel
                        .target_partname()
                        .map(|t| t == *partname)
                        .unwrap_or(false)
                {
                    incoming.push((part.partname().to_string(), rel.r_id().to_string()));
                }
            }
        }

        Ok(RemovalPlan {
            partname: partname.clone(),
            pkg_rel_ids,
            incoming,
        })
    }

    /// Apply a removal plan: delete the part and scrub every edge touching it
    /// in one batch. Outgoing relationships die with the part.
    pub fn remove_part(&mut self, plan: RemovalPlan) {
        debug!(
            part = %plan.partname,
            incoming = plan.incoming.len(),
            "removing part"
        );
        for r_id in &plan.pkg_rel_ids {
            self.rels.remove(r_id);
        }
        for (source, r_id) in &plan.incoming {
            if let Some(part) = self.parts.get_mut(source) {
                part.rels_mut().remove(r_id);
            }
        }
        self.parts.remove(plan.partname.as_str());
    }

    /// Record a relationship from one part to another.
    ///
    /// Allocates the next unused rId for the source; freed ids are never
    /// reallocated.
    pub fn relate(&mut self, source: &PackURI, target: &PackURI, reltype: &str) -> Result<String> {
        if !self.contains_part(target) {
            return Err(OpcError::PartNotFound(target.to_string()));
        }
        let source_part = self.get_part_mut(source)?;
        let target = target.clone();
        Ok(source_part.relate_to(&target, reltype))
    }

    /// Resolve a relationship id of a source part to the target part.
    pub fn resolve(&self, source: &PackURI, r_id: &str) -> Result<&Part> {
        let source_part = self.get_part(source)?;
        let rel = source_part.rels().get(r_id).ok_or_else(|| {
            OpcError::DanglingRelationship(format!("{} has no {}", source, r_id))
        })?;
        if rel.is_external() {
            return Err(OpcError::DanglingRelationship(format!(
                "{} {} targets an external resource",
                source, r_id
            )));
        }
        let target = rel.target_partname()?;
        self.parts.get(target.as_str()).ok_or_else(|| {
            OpcError::DanglingRelationship(format!(
                "{} {} targets missing part {}",
                source, r_id, target
            ))
        })
    }

    /// Get a reference to the package-level relationships.
    #[inline]
    pub fn rels(&self) -> &Relationships {
        &self.rels
    }

    /// Get a mutable reference to the package-level relationships.
    #[inline]
    pub fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    /// Find the next available partname for a template with a %d placeholder.
    ///
    /// Used for sequential part numbering (slide1.xml, slide2.xml, ...).
    pub fn next_partname(&self, template: &str) -> Result<PackURI> {
        let mut n = 1u32;
        loop {
            let candidate = template.replace("%d", &n.to_string());
            if !self.parts.contains_key(&candidate) {
                return PackURI::new(candidate).map_err(OpcError::InvalidPackUri);
            }
            n += 1;
            if n > 100_000 {
                return Err(OpcError::InvalidPackUri(format!(
                    "no free partname for template {}",
                    template
                )));
            }
        }
    }
}

impl Default for OpcPackage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::constants::content_type as ct;
    use std::io::{Cursor, Write};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn create_minimal_pptx() -> Vec<u8> {
        let mut zip_data = Vec::new();
        {
            let cursor = Cursor::new(&mut zip_data);
            let mut writer = ZipWriter::new(cursor);
            let options = SimpleFileOptions::default();

            writer.start_file("[Content_Types].xml", options).unwrap();
            writer.write_all(br#"<?xml version="1.0"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>
    <Override PartName="/ppt/slides/slide1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>
</Types>"#).unwrap();

            writer.start_file("_rels/.rels", options).unwrap();
            writer.write_all(br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/>
</Relationships>"#).unwrap();

            writer.start_file("ppt/presentation.xml", options).unwrap();
            writer
                .write_all(br#"<?xml version="1.0"?><p:presentation/>"#)
                .unwrap();

            writer
                .start_file("ppt/_rels/presentation.xml.rels", options)
                .unwrap();
            writer.write_all(br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>
</Relationships>"#).unwrap();

            writer.start_file("ppt/slides/slide1.xml", options).unwrap();
            writer
                .write_all(br#"<?xml version="1.0"?><p:sld/>"#)
                .unwrap();

            writer.finish().unwrap();
        }
        zip_data
    }

    #[test]
    fn test_open_package() {
        let pkg = OpcPackage::from_bytes(create_minimal_pptx()).unwrap();
        assert_eq!(pkg.part_count(), 2);

        let main = pkg.main_part().unwrap();
        assert_eq!(main.content_type(), ct::PML_PRESENTATION_MAIN);
        assert_eq!(main.kind(), PartKind::Presentation);
    }

    #[test]
    fn test_resolve() {
        let pkg = OpcPackage::from_bytes(create_minimal_pptx()).unwrap();
        let pres = PackURI::new("/ppt/presentation.xml").unwrap();

        let slide = pkg.resolve(&pres, "rId2").unwrap();
        assert_eq!(slide.partname().as_str(), "/ppt/slides/slide1.xml");

        assert!(matches!(
            pkg.resolve(&pres, "rId99"),
            Err(OpcError::DanglingRelationship(_))
        ));
    }

    #[test]
    fn test_add_part_companion_validation() {
        let mut pkg = OpcPackage::from_bytes(create_minimal_pptx()).unwrap();

        // A slide with no layout relationship is rejected outright.
        let orphan = Part::new(
            PackURI::new("/ppt/slides/slide2.xml").unwrap(),
            ct::PML_SLIDE.to_string(),
            b"<p:sld/>".to_vec(),
        );
        assert!(matches!(
            pkg.add_part(orphan),
            Err(OpcError::CorruptPackage(_))
        ));
        assert_eq!(pkg.part_count(), 2);
    }

    #[test]
    fn test_two_phase_removal() {
        let mut pkg = OpcPackage::from_bytes(create_minimal_pptx()).unwrap();
        let slide = PackURI::new("/ppt/slides/slide1.xml").unwrap();
        let pres = PackURI::new("/ppt/presentation.xml").unwrap();

        let plan = pkg.removal_plan(&slide).unwrap();
        assert_eq!(plan.incoming, vec![(pres.to_string(), "rId2".to_string())]);

        pkg.remove_part(plan);
        assert!(!pkg.contains_part(&slide));
        assert!(pkg.get_part(&pres).unwrap().rels().get("rId2").is_none());
    }

    #[test]
    fn test_relate_requires_target() {
        let mut pkg = OpcPackage::from_bytes(create_minimal_pptx()).unwrap();
        let pres = PackURI::new("/ppt/presentation.xml").unwrap();
        let missing = PackURI::new("/ppt/slides/slide9.xml").unwrap();

        assert!(pkg.relate(&pres, &missing, "whatever").is_err());

        let slide = PackURI::new("/ppt/slides/slide1.xml").unwrap();
        // rId2 is taken; the allocator continues monotonically.
        let r_id = pkg.relate(&pres, &slide, "another-edge").unwrap();
        assert_eq!(r_id, "rId3");
    }

    #[test]
    fn test_next_partname() {
        let pkg = OpcPackage::from_bytes(create_minimal_pptx()).unwrap();
        let next = pkg.next_partname("/ppt/slides/slide%d.xml").unwrap();
        assert_eq!(next.as_str(), "/ppt/slides/slide2.xml");
    }
}
