//! Package writer: serializes the part graph back to package bytes.
//!
//! Writes [Content_Types].xml, the package and per-part relationship items,
//! and every part blob. Part blobs that were never mutated are written back
//! byte-for-byte, which is what gives unmodified subtrees their round-trip
//! fidelity.

use crate::opc::constants::content_type as ct;
use crate::opc::error::Result;
use crate::opc::package::OpcPackage;
use crate::opc::packuri::{CONTENT_TYPES_URI, PACKAGE_URI, PackURI};
use crate::opc::phys_pkg::PhysPkgWriter;
use crate::opc::rel::escape_xml;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Package writer that serializes the part graph to a zip archive.
pub struct PackageWriter;

impl PackageWriter {
    /// Write a package to a file.
    pub fn write<P: AsRef<Path>>(path: P, package: &OpcPackage) -> Result<()> {
        let bytes = Self::to_bytes(package)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Serialize a package to bytes.
    pub fn to_bytes(package: &OpcPackage) -> Result<Vec<u8>> {
        let mut phys_writer = PhysPkgWriter::new();

        Self::write_content_types(&mut phys_writer, package)?;
        Self::write_pkg_rels(&mut phys_writer, package)?;
        Self::write_parts(&mut phys_writer, package)?;

        debug!(parts = package.part_count(), "package serialized");
        phys_writer.finish()
    }

    /// Write the [Content_Types].xml item.
    fn write_content_types(phys_writer: &mut PhysPkgWriter, package: &OpcPackage) -> Result<()> {
        let cti = ContentTypesItem::from_package(package);
        let uri = PackURI::new(CONTENT_TYPES_URI)
            .map_err(crate::opc::error::OpcError::InvalidPackUri)?;
        phys_writer.write(&uri, cti.to_xml().as_bytes())
    }

    /// Write the package-level relationships item.
    fn write_pkg_rels(phys_writer: &mut PhysPkgWriter, package: &OpcPackage) -> Result<()> {
        let pkg_uri =
            PackURI::new(PACKAGE_URI).map_err(crate::opc::error::OpcError::InvalidPackUri)?;
        let rels_uri = pkg_uri
            .rels_uri()
            .map_err(crate::opc::error::OpcError::InvalidPackUri)?;
        phys_writer.write(&rels_uri, package.rels().to_xml().as_bytes())
    }

    /// Write all parts and their relationship items, ordered by partname so
    /// output is deterministic.
    fn write_parts(phys_writer: &mut PhysPkgWriter, package: &OpcPackage) -> Result<()> {
        let mut parts: Vec<_> = package.iter_parts().collect();
        parts.sort_by(|a, b| a.partname().as_str().cmp(b.partname().as_str()));

        for part in parts {
            phys_writer.write(part.partname(), part.blob())?;

            if !part.rels().is_empty() {
                let rels_uri = part
                    .partname()
                    .rels_uri()
                    .map_err(crate::opc::error::OpcError::InvalidPackUri)?;
                phys_writer.write(&rels_uri, part.rels().to_xml().as_bytes())?;
            }
        }

        Ok(())
    }
}

/// Helper for building [Content_Types].xml content.
///
/// Manages Default and Override elements for content type mapping.
struct ContentTypesItem {
    /// Default content types by extension
    defaults: HashMap<String, String>,

    /// Override content types by partname
    overrides: HashMap<String, String>,
}

impl ContentTypesItem {
    fn new() -> Self {
        let mut defaults = HashMap::new();
        defaults.insert("rels".to_string(), ct::OPC_RELATIONSHIPS.to_string());
        defaults.insert("xml".to_string(), ct::XML.to_string());

        Self {
            defaults,
            overrides: HashMap::new(),
        }
    }

    /// Build the item from every part in a package.
    fn from_package(package: &OpcPackage) -> Self {
        let mut cti = Self::new();
        for part in package.iter_parts() {
            cti.add_content_type(part.partname(), part.content_type());
        }
        cti
    }

    /// Record the content type for a part.
    ///
    /// Standard extension pairings go in as Defaults; everything else gets a
    /// partname Override.
    fn add_content_type(&mut self, partname: &PackURI, content_type: &str) {
        let ext = partname.ext();
        if Self::is_default_content_type(ext, content_type) {
            self.defaults
                .insert(ext.to_string(), content_type.to_string());
        } else {
            self.overrides
                .insert(partname.to_string(), content_type.to_string());
        }
    }

    fn is_default_content_type(ext: &str, content_type: &str) -> bool {
        matches!(
            (ext, content_type),
            ("rels", ct::OPC_RELATIONSHIPS)
                | ("xml", ct::XML)
                | ("png", ct::PNG)
                | ("jpg", ct::JPEG)
                | ("jpeg", ct::JPEG)
                | ("gif", ct::GIF)
                | ("bmp", ct::BMP)
                | ("tiff", ct::TIFF)
                | ("svg", ct::SVG)
                | ("emf", ct::X_EMF)
                | ("wmf", ct::X_WMF)
        )
    }

    /// Generate the XML for [Content_Types].xml.
    fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(4096);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );
        xml.push('\n');

        let mut exts: Vec<_> = self.defaults.keys().collect();
        exts.sort();
        for ext in exts {
            xml.push_str(&format!(
                r#"  <Default Extension="{}" ContentType="{}"/>"#,
                escape_xml(ext),
                escape_xml(&self.defaults[ext])
            ));
            xml.push('\n');
        }

        let mut partnames: Vec<_> = self.overrides.keys().collect();
        partnames.sort();
        for partname in partnames {
            xml.push_str(&format!(
                r#"  <Override PartName="{}" ContentType="{}"/>"#,
                escape_xml(partname),
                escape_xml(&self.overrides[partname])
            ));
            xml.push('\n');
        }

        xml.push_str("</Types>");

        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::part::Part;

    #[test]
    fn test_content_types_xml() {
        let mut cti = ContentTypesItem::new();
        cti.add_content_type(
            &PackURI::new("/ppt/media/image1.png").unwrap(),
            ct::PNG,
        );
        cti.add_content_type(
            &PackURI::new("/ppt/presentation.xml").unwrap(),
            ct::PML_PRESENTATION_MAIN,
        );

        let xml = cti.to_xml();
        assert!(xml.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
        assert!(xml.contains(r#"<Override PartName="/ppt/presentation.xml""#));
    }

    #[test]
    fn test_write_read_round_trip() {
        let mut pkg = OpcPackage::new();
        let pres_uri = PackURI::new("/ppt/presentation.xml").unwrap();
        pkg.add_part(Part::new(
            pres_uri.clone(),
            ct::PML_PRESENTATION_MAIN.to_string(),
            b"<p:presentation/>".to_vec(),
        ))
        .unwrap();
        pkg.rels_mut().add(
            crate::opc::constants::relationship_type::OFFICE_DOCUMENT,
            "ppt/presentation.xml",
        );

        let bytes = PackageWriter::to_bytes(&pkg).unwrap();
        let reloaded = OpcPackage::from_bytes(bytes).unwrap();

        assert_eq!(reloaded.part_count(), 1);
        assert_eq!(
            reloaded.get_part(&pres_uri).unwrap().blob(),
            b"<p:presentation/>"
        );
        assert_eq!(
            reloaded.main_part().unwrap().partname().as_str(),
            "/ppt/presentation.xml"
        );
    }
}
