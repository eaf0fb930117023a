use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::PackURI;
/// Relationship-related objects for OPC packages.
///
/// This module provides types for managing the named, directed edges between
/// parts, including internal and external relationships.
use std::collections::HashMap;

/// A single relationship from a source part to a target.
///
/// Identified by an rId unique among the outgoing relationships of its source.
/// Can be either internal (pointing to another part) or external (pointing to
/// a URL outside the package).
#[derive(Debug, Clone)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1", "rId2")
    r_id: String,

    /// Relationship type URI
    reltype: String,

    /// Target reference - either a relative part reference or external URL
    target_ref: String,

    /// Base URI for resolving relative references
    base_uri: String,

    /// Whether this is an external relationship
    is_external: bool,
}

impl Relationship {
    /// Create a new relationship.
    pub fn new(
        r_id: String,
        reltype: String,
        target_ref: String,
        base_uri: String,
        is_external: bool,
    ) -> Self {
        Self {
            r_id,
            reltype,
            target_ref,
            base_uri,
            is_external,
        }
    }

    /// Get the relationship ID.
    #[inline]
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    /// Get the relationship type.
    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    /// Get the target reference.
    ///
    /// For internal relationships, this is a relative part reference.
    /// For external relationships, this is an absolute URL.
    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    /// Check if this is an external relationship.
    #[inline]
    pub fn is_external(&self) -> bool {
        self.is_external
    }

    /// Get the absolute target partname for internal relationships.
    ///
    /// Returns an error if this is an external relationship.
    pub fn target_partname(&self) -> Result<PackURI> {
        if self.is_external {
            return Err(OpcError::InvalidRelationship(
                "Cannot get target_partname for external relationship".to_string(),
            ));
        }
        PackURI::from_rel_ref(&self.base_uri, &self.target_ref).map_err(OpcError::InvalidPackUri)
    }
}

/// Collection of relationships from a single source.
///
/// Stores relationships in a HashMap for O(1) lookup by rId and tracks the
/// allocation high-water mark so freed ids are never handed out again.
#[derive(Debug, Clone)]
pub struct Relationships {
    /// Base URI for resolving relative references
    base_uri: String,

    /// Map of relationship ID to Relationship
    rels: HashMap<String, Relationship>,

    /// Next rId number to allocate. Monotonic: removal never lowers it, so a
    /// stale reference to a removed relationship can never resurrect.
    next_num: u32,
}

impl Relationships {
    /// Create a new empty relationships collection.
    pub fn new(base_uri: String) -> Self {
        Self {
            base_uri,
            rels: HashMap::new(),
            next_num: 1,
        }
    }

    /// Add a relationship with an explicit rId, as read from a .rels part.
    ///
    /// Advances the allocation high-water mark past the given id.
    pub fn load(
        &mut self,
        reltype: String,
        target_ref: String,
        r_id: String,
        is_external: bool,
    ) -> &Relationship {
        if let Some(num) = Self::r_id_num(&r_id) {
            if num >= self.next_num {
                self.next_num = num + 1;
            }
        }
        let rel = Relationship::new(
            r_id.clone(),
            reltype,
            target_ref,
            self.base_uri.clone(),
            is_external,
        );
        self.rels.insert(r_id.clone(), rel);
        self.rels.get(r_id.as_str()).unwrap()
    }

    /// Add a new internal relationship, allocating the next unused rId.
    ///
    /// Returns the allocated rId.
    pub fn add(&mut self, reltype: &str, target_ref: &str) -> String {
        let r_id = self.next_r_id();
        self.load(reltype.to_string(), target_ref.to_string(), r_id.clone(), false);
        r_id
    }

    /// Get a relationship by its ID.
    #[inline]
    pub fn get(&self, r_id: &str) -> Option<&Relationship> {
        self.rels.get(r_id)
    }

    /// Get or add an external relationship.
    ///
    /// If an external relationship of the given type to the target already
    /// exists, returns its rId. Otherwise allocates a new one.
    pub fn get_or_add_external(&mut self, reltype: &str, target_ref: &str) -> String {
        for rel in self.rels.values() {
            if rel.reltype() == reltype && rel.target_ref() == target_ref && rel.is_external() {
                return rel.r_id().to_string();
            }
        }

        let r_id = self.next_r_id();
        self.load(reltype.to_string(), target_ref.to_string(), r_id.clone(), true);
        r_id
    }

    /// Peek at the next rId that would be allocated.
    fn next_r_id(&self) -> String {
        format!("rId{}", self.next_num)
    }

    /// Extract the number from an "rId123" identifier.
    fn r_id_num(r_id: &str) -> Option<u32> {
        if r_id.len() > 3 && &r_id[..3] == "rId" {
            atoi_simd::parse::<u32, false, false>(&r_id.as_bytes()[3..]).ok()
        } else {
            None
        }
    }

    /// Get the single relationship of a specific type.
    ///
    /// Returns an error if no relationship of the type is found.
    pub fn part_with_reltype<'a>(&'a self, reltype: &'a str) -> Result<&'a Relationship> {
        self.rels_of_type(reltype).next().ok_or_else(|| {
            OpcError::RelationshipNotFound(format!("No relationship of type '{}'", reltype))
        })
    }

    /// Iterate over relationships of a specific type, in rId order.
    pub fn rels_of_type<'a>(&'a self, reltype: &'a str) -> impl Iterator<Item = &'a Relationship> {
        let mut matching: Vec<&Relationship> = self
            .rels
            .values()
            .filter(|rel| rel.reltype() == reltype)
            .collect();
        matching.sort_by_key(|rel| Self::r_id_num(rel.r_id()).unwrap_or(u32::MAX));
        matching.into_iter()
    }

    /// Get an iterator over all relationships.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.values()
    }

    /// Iterate over all relationships in rId order.
    ///
    /// Used where traversal order must be deterministic.
    pub fn iter_ordered(&self) -> impl Iterator<Item = &Relationship> {
        let mut rels: Vec<&Relationship> = self.rels.values().collect();
        rels.sort_by_key(|rel| Self::r_id_num(rel.r_id()).unwrap_or(u32::MAX));
        rels.into_iter()
    }

    /// Get the number of relationships in the collection.
    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    /// Check if the collection is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// Remove a relationship by its ID.
    ///
    /// The id is not returned to the allocation pool.
    pub fn remove(&mut self, r_id: &str) -> Option<Relationship> {
        self.rels.remove(r_id)
    }

    /// Serialize relationships to the XML of a .rels part.
    ///
    /// Relationships are ordered by rId number for stable output.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(1024);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        xml.push('\n');

        let mut rels: Vec<&Relationship> = self.rels.values().collect();
        rels.sort_by_key(|rel| Self::r_id_num(rel.r_id()).unwrap_or(u32::MAX));

        for rel in rels {
            let target_mode = if rel.is_external() {
                r#" TargetMode="External""#
            } else {
                ""
            };

            xml.push_str(&format!(
                r#"  <Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                escape_xml(rel.r_id()),
                escape_xml(rel.reltype()),
                escape_xml(rel.target_ref()),
                target_mode
            ));
            xml.push('\n');
        }

        xml.push_str("</Relationships>");

        xml
    }
}

impl Default for Relationships {
    fn default() -> Self {
        Self::new("/".to_string())
    }
}

/// Escape XML special characters.
#[inline]
pub(crate) fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
