use crate::opc::constants::content_type as ct;
use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::PackURI;
use crate::opc::rel::Relationships;
use memchr::memmem;

/// The typed role a part plays in a presentation package.
///
/// Derived from the part's content type at load time. `Other` covers parts
/// the object model carries through untouched (notes, properties, etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    /// The presentation root part (/ppt/presentation.xml)
    Presentation,
    /// A slide part
    Slide,
    /// A slide layout part
    SlideLayout,
    /// A slide master part
    SlideMaster,
    /// A notes slide part
    NotesSlide,
    /// A theme part
    Theme,
    /// An image part (any raster or vector content type)
    Image,
    /// A chart part
    Chart,
    /// An embedded workbook part
    Workbook,
    /// Any other part
    Other,
}

impl PartKind {
    /// Classify a content type.
    pub fn from_content_type(content_type: &str) -> Self {
        match content_type {
            ct::PML_PRESENTATION_MAIN | ct::PML_PRES_MACRO_MAIN => PartKind::Presentation,
            ct::PML_SLIDE => PartKind::Slide,
            ct::PML_SLIDE_LAYOUT => PartKind::SlideLayout,
            ct::PML_SLIDE_MASTER => PartKind::SlideMaster,
            ct::PML_NOTES_SLIDE => PartKind::NotesSlide,
            ct::OFC_THEME => PartKind::Theme,
            ct::DML_CHART => PartKind::Chart,
            ct::SML_SHEET => PartKind::Workbook,
            _ if content_type.starts_with("image/") => PartKind::Image,
            _ => PartKind::Other,
        }
    }
}

/// A part in a presentation package.
///
/// Each part has a unique partname, a content type, binary content, and a
/// collection of outgoing relationships. XML parts keep their content as the
/// serialized bytes; higher layers parse lazily and write back mutated blobs.
#[derive(Debug, Clone)]
pub struct Part {
    /// The partname (URI) of this part
    partname: PackURI,

    /// The content type of this part
    content_type: String,

    /// The typed role, derived from the content type
    kind: PartKind,

    /// The binary content of this part
    blob: Vec<u8>,

    /// Relationships from this part to other parts
    rels: Relationships,
}

impl Part {
    /// Create a new part.
    pub fn new(partname: PackURI, content_type: String, blob: Vec<u8>) -> Self {
        let rels = Relationships::new(partname.base_uri().to_string());
        let kind = PartKind::from_content_type(&content_type);
        Self {
            partname,
            content_type,
            kind,
            blob,
            rels,
        }
    }

    /// Get the partname of this part.
    #[inline]
    pub fn partname(&self) -> &PackURI {
        &self.partname
    }

    /// Get the content type of this part.
    #[inline]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Get the typed role of this part.
    #[inline]
    pub fn kind(&self) -> PartKind {
        self.kind
    }

    /// Get the binary content of this part.
    #[inline]
    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    /// Replace the binary content of this part.
    pub fn set_blob(&mut self, blob: Vec<u8>) {
        self.blob = blob;
    }

    /// Check whether this part holds XML content.
    #[inline]
    pub fn is_xml(&self) -> bool {
        self.content_type.ends_with("+xml") || self.content_type.ends_with("/xml")
    }

    /// Get the relationships for this part.
    #[inline]
    pub fn rels(&self) -> &Relationships {
        &self.rels
    }

    /// Get mutable access to the relationships for this part.
    #[inline]
    pub fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    /// Add a relationship to another part, allocating the next unused rId.
    pub fn relate_to(&mut self, target: &PackURI, reltype: &str) -> String {
        let target_ref = target.relative_ref(self.partname.base_uri());
        self.rels.add(reltype, &target_ref)
    }

    /// Get the target reference for a relationship ID.
    pub fn target_ref(&self, r_id: &str) -> Result<&str> {
        self.rels
            .get(r_id)
            .map(|rel| rel.target_ref())
            .ok_or_else(|| {
                OpcError::DanglingRelationship(format!("{} has no {}", self.partname, r_id))
            })
    }

    /// Get the absolute partname targeted by a relationship ID.
    pub fn target_partname(&self, r_id: &str) -> Result<PackURI> {
        let rel = self.rels.get(r_id).ok_or_else(|| {
            OpcError::DanglingRelationship(format!("{} has no {}", self.partname, r_id))
        })?;
        rel.target_partname()
    }

    /// Count references to a relationship ID within the part content.
    ///
    /// Scans for `r:embed="rId"` and `r:id="rId"` attribute references.
    /// A count greater than one means the relationship target is shared by
    /// multiple elements of this part.
    pub fn rel_ref_count(&self, r_id: &str) -> usize {
        let embed = format!(r#"r:embed="{}""#, r_id);
        let id = format!(r#"r:id="{}""#, r_id);
        memmem::Finder::new(embed.as_bytes())
            .find_iter(&self.blob)
            .count()
            + memmem::Finder::new(id.as_bytes())
                .find_iter(&self.blob)
                .count()
    }
}
