//! Physical access to the zip archive backing a package.
//!
//! This module handles low-level reading and writing of the zip container,
//! keeping the rest of the OPC layer independent of the archive format.

use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::PackURI;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Physical package reader over an in-memory zip archive.
pub struct PhysPkgReader {
    /// The underlying zip archive
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl PhysPkgReader {
    /// Open a package file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(OpcError::PackageNotFound(path.display().to_string()));
        }
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Create a reader over package bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(data))?;
        Ok(Self { archive })
    }

    /// Get the binary content for a part by its PackURI.
    pub fn blob_for(&mut self, pack_uri: &PackURI) -> Result<Vec<u8>> {
        let membername = pack_uri.membername().to_string();
        let mut file = self
            .archive
            .by_name(&membername)
            .map_err(|_| OpcError::PartNotFound(pack_uri.to_string()))?;
        let mut blob = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut blob)?;
        Ok(blob)
    }

    /// Get the [Content_Types].xml content.
    ///
    /// A required item of every package; its absence is a corruption.
    pub fn content_types_xml(&mut self) -> Result<Vec<u8>> {
        let uri = PackURI::new(crate::opc::packuri::CONTENT_TYPES_URI)
            .map_err(OpcError::InvalidPackUri)?;
        self.blob_for(&uri)
            .map_err(|_| OpcError::CorruptPackage("missing [Content_Types].xml".to_string()))
    }

    /// Get the relationships XML for a source URI, or None if absent.
    pub fn rels_xml_for(&mut self, source_uri: &PackURI) -> Result<Option<Vec<u8>>> {
        let rels_uri = source_uri.rels_uri().map_err(OpcError::InvalidPackUri)?;
        match self.blob_for(&rels_uri) {
            Ok(blob) => Ok(Some(blob)),
            Err(OpcError::PartNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// List all member names in the archive, excluding directory entries
    /// and _rels items (those are folded into their source parts).
    pub fn part_membernames(&self) -> Vec<String> {
        self.archive
            .file_names()
            .filter(|name| {
                !name.ends_with('/')
                    && *name != "[Content_Types].xml"
                    && !name.contains("_rels/")
            })
            .map(String::from)
            .collect()
    }

    /// Check if a specific member exists in the archive.
    pub fn contains(&self, pack_uri: &PackURI) -> bool {
        self.archive.index_for_name(pack_uri.membername()).is_some()
    }
}

/// Physical package writer that produces an in-memory zip archive.
pub struct PhysPkgWriter {
    /// The underlying zip writer
    archive: ZipWriter<Cursor<Vec<u8>>>,
}

impl PhysPkgWriter {
    /// Create a new package writer that writes to memory.
    pub fn new() -> Self {
        Self {
            archive: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    /// Write a member with Deflate compression.
    pub fn write(&mut self, pack_uri: &PackURI, blob: &[u8]) -> Result<()> {
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        self.archive.start_file(pack_uri.membername(), options)?;
        self.archive.write_all(blob)?;
        Ok(())
    }

    /// Finish writing and return the package bytes.
    pub fn finish(self) -> Result<Vec<u8>> {
        let cursor = self.archive.finish()?;
        Ok(cursor.into_inner())
    }
}

impl Default for PhysPkgWriter {
    fn default() -> Self {
        Self::new()
    }
}
