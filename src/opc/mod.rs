//! Open Packaging Conventions (OPC) layer: the part graph.
//!
//! A package is a zip archive of typed parts connected by named
//! relationships. This module owns part lifecycle and the graph invariants:
//! relationship ids unique per source part, no dangling edges after a
//! removal, monotonic id allocation so freed ids never resurrect.

pub mod constants;
pub mod error;
pub mod package;
pub mod packuri;
pub mod part;
pub mod phys_pkg;
pub mod pkgreader;
pub mod pkgwriter;
pub mod rel;

pub use error::OpcError;
pub use package::{OpcPackage, RemovalPlan};
pub use packuri::PackURI;
pub use part::{Part, PartKind};
pub use pkgwriter::PackageWriter;
pub use rel::{Relationship, Relationships};
