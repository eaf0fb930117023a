//! Low-level, read-only API to a serialized package.
//!
//! This module parses the [Content_Types].xml index and the per-source
//! .rels items, producing serialized parts ready to be unmarshaled into
//! the in-memory part graph.

use crate::opc::constants::target_mode;
use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::{PACKAGE_URI, PackURI};
use crate::opc::phys_pkg::PhysPkgReader;
use quick_xml::Reader;
use quick_xml::events::Event;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Serialized part with its content and relationships.
#[derive(Debug)]
pub struct SerializedPart {
    /// The partname (URI) of this part
    pub partname: PackURI,

    /// The content type of this part
    pub content_type: String,

    /// The binary content of this part
    pub blob: Vec<u8>,

    /// Serialized relationships from this part.
    /// Most parts carry only a handful, so they live inline.
    pub srels: SmallVec<[SerializedRelationship; 8]>,
}

/// Serialized relationship as read from a .rels item.
#[derive(Debug, Clone)]
pub struct SerializedRelationship {
    /// Relationship ID (e.g., "rId1")
    pub r_id: String,

    /// Relationship type URI
    pub reltype: String,

    /// Target reference (relative URI or external URL)
    pub target_ref: String,

    /// Target mode (Internal or External)
    pub target_mode: String,
}

impl SerializedRelationship {
    /// Check if this is an external relationship.
    #[inline]
    pub fn is_external(&self) -> bool {
        self.target_mode == target_mode::EXTERNAL
    }
}

/// Reader that assembles serialized parts from the physical package.
pub struct PackageReader {
    /// Package-level serialized relationships
    pkg_srels: Vec<SerializedRelationship>,

    /// All serialized parts
    sparts: Vec<SerializedPart>,
}

impl PackageReader {
    /// Read a package from its physical reader.
    pub fn from_phys_reader(mut phys: PhysPkgReader) -> Result<Self> {
        let content_types = ContentTypeMap::from_xml(&phys.content_types_xml()?)?;

        let pkg_uri = PackURI::new(PACKAGE_URI).map_err(OpcError::InvalidPackUri)?;
        let pkg_srels = match phys.rels_xml_for(&pkg_uri)? {
            Some(xml) => parse_rels_xml(&xml)?,
            None => Vec::new(),
        };

        let mut sparts = Vec::new();
        for membername in phys.part_membernames() {
            let partname =
                PackURI::new(format!("/{}", membername)).map_err(OpcError::InvalidPackUri)?;
            let content_type = content_types.content_type_for(&partname)?;
            let blob = phys.blob_for(&partname)?;
            let srels = match phys.rels_xml_for(&partname)? {
                Some(xml) => SmallVec::from_vec(parse_rels_xml(&xml)?),
                None => SmallVec::new(),
            };
            sparts.push(SerializedPart {
                partname,
                content_type,
                blob,
                srels,
            });
        }

        Ok(Self { pkg_srels, sparts })
    }

    /// Get the package-level serialized relationships.
    #[inline]
    pub fn pkg_srels(&self) -> &[SerializedRelationship] {
        &self.pkg_srels
    }

    /// Iterate over all serialized parts.
    #[inline]
    pub fn iter_sparts(&self) -> impl Iterator<Item = &SerializedPart> {
        self.sparts.iter()
    }

    /// Consume the reader and take ownership of the serialized parts.
    pub fn into_parts(self) -> (Vec<SerializedRelationship>, Vec<SerializedPart>) {
        (self.pkg_srels, self.sparts)
    }
}

/// Content type map implementing the OPC content type discovery algorithm.
///
/// Defaults map file extensions, Overrides map specific partnames; an
/// Override always wins.
struct ContentTypeMap {
    /// Maps lowercased file extensions to default content types
    defaults: HashMap<String, String>,

    /// Maps specific partnames to override content types
    overrides: HashMap<String, String>,
}

impl ContentTypeMap {
    /// Parse content types from [Content_Types].xml.
    fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut defaults = HashMap::new();
        let mut overrides = HashMap::new();

        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => match e.local_name().as_ref()
                {
                    b"Default" => {
                        let mut extension = None;
                        let mut content_type = None;
                        for attr in e.attributes() {
                            let attr = attr?;
                            match attr.key.as_ref() {
                                b"Extension" => {
                                    extension =
                                        Some(attr.unescape_value()?.to_ascii_lowercase());
                                }
                                b"ContentType" => {
                                    content_type = Some(attr.unescape_value()?.to_string());
                                }
                                _ => {}
                            }
                        }
                        if let (Some(ext), Some(ct)) = (extension, content_type) {
                            defaults.insert(ext, ct);
                        }
                    }
                    b"Override" => {
                        let mut partname = None;
                        let mut content_type = None;
                        for attr in e.attributes() {
                            let attr = attr?;
                            match attr.key.as_ref() {
                                b"PartName" => {
                                    partname = Some(attr.unescape_value()?.to_string());
                                }
                                b"ContentType" => {
                                    content_type = Some(attr.unescape_value()?.to_string());
                                }
                                _ => {}
                            }
                        }
                        if let (Some(pn), Some(ct)) = (partname, content_type) {
                            overrides.insert(pn, ct);
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(OpcError::XmlError(format!("content types: {}", e))),
                _ => {}
            }
            buf.clear();
        }

        Ok(Self {
            defaults,
            overrides,
        })
    }

    /// Look up the content type for a partname.
    fn content_type_for(&self, partname: &PackURI) -> Result<String> {
        if let Some(ct) = self.overrides.get(partname.as_str()) {
            return Ok(ct.clone());
        }
        if let Some(ct) = self.defaults.get(&partname.ext().to_ascii_lowercase()) {
            return Ok(ct.clone());
        }
        Err(OpcError::ContentTypeNotFound(partname.to_string()))
    }
}

/// Parse the XML of a .rels item into serialized relationships.
fn parse_rels_xml(xml: &[u8]) -> Result<Vec<SerializedRelationship>> {
    let mut srels = Vec::new();
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let mut r_id = String::new();
                    let mut reltype = String::new();
                    let mut target_ref = String::new();
                    let mut mode = target_mode::INTERNAL.to_string();
                    for attr in e.attributes() {
                        let attr = attr?;
                        match attr.key.as_ref() {
                            b"Id" => r_id = attr.unescape_value()?.to_string(),
                            b"Type" => reltype = attr.unescape_value()?.to_string(),
                            b"Target" => target_ref = attr.unescape_value()?.to_string(),
                            b"TargetMode" => mode = attr.unescape_value()?.to_string(),
                            _ => {}
                        }
                    }
                    srels.push(SerializedRelationship {
                        r_id,
                        reltype,
                        target_ref,
                        target_mode: mode,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpcError::XmlError(format!("rels: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(srels)
}
