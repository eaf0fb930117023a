/// Error types for the presentation object model.
use crate::opc::error::OpcError;
use thiserror::Error;

/// Result type for presentation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for presentation operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A required part or relationship is missing or malformed. Fatal.
    #[error("corrupt package: {0}")]
    PackageCorrupt(String),

    /// A relationship id does not resolve to an existing part. Fatal.
    #[error("dangling relationship: {0}")]
    DanglingRelationship(String),

    /// An optional element is absent. Callers should check the matching
    /// presence predicate first; expected control flow, not fatal.
    #[error("not present: {0}")]
    NotPresent(String),

    /// Out-of-range position, duplicate target, or malformed identifier.
    /// Raised before any mutation has occurred.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation that is intentionally not implemented.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// XML parsing or serialization error
    #[error("XML error: {0}")]
    Xml(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// OPC package error that does not map onto the taxonomy above
    #[error("OPC error: {0}")]
    Opc(OpcError),
}

impl From<OpcError> for Error {
    fn from(err: OpcError) -> Self {
        // Graph-level failures carry taxonomy meaning; keep it visible
        // instead of burying everything under an opaque wrapper.
        match err {
            OpcError::DanglingRelationship(s) => Error::DanglingRelationship(s),
            OpcError::RelationshipNotFound(s) => Error::DanglingRelationship(s),
            OpcError::CorruptPackage(s) => Error::PackageCorrupt(s),
            OpcError::PartNotFound(s) => Error::PackageCorrupt(format!("part not found: {s}")),
            other => Error::Opc(other),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::Xml(err.to_string())
    }
}
