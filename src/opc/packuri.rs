/// Provides the PackURI value type and utilities for working with package URIs.
///
/// A PackURI is the partname of a part within the package. Partnames always
/// begin with a forward slash and use forward slashes as separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackURI {
    /// The full pack URI string (e.g., "/ppt/slides/slide1.xml")
    uri: String,
}

impl PackURI {
    /// Create a new PackURI from a string.
    ///
    /// Returns an error if the URI doesn't start with a forward slash.
    pub fn new<S: Into<String>>(uri: S) -> Result<Self, String> {
        let uri = uri.into();
        if !uri.starts_with('/') {
            return Err(format!("PackURI must begin with slash, got '{}'", uri));
        }
        Ok(PackURI { uri })
    }

    /// Create a PackURI from a relative reference and a base URI.
    ///
    /// Translates a relative reference (like "../slideLayouts/slideLayout1.xml")
    /// onto a base URI (like "/ppt/slides") to produce an absolute partname.
    pub fn from_rel_ref(base_uri: &str, relative_ref: &str) -> Result<Self, String> {
        let joined = if base_uri.ends_with('/') {
            format!("{}{}", base_uri, relative_ref)
        } else {
            format!("{}/{}", base_uri, relative_ref)
        };
        Self::new(Self::normalize(&joined))
    }

    /// Get the base URI (directory portion) of this PackURI.
    ///
    /// For example, "/ppt/slides" for "/ppt/slides/slide1.xml". The package
    /// pseudo-partname "/" is its own base.
    pub fn base_uri(&self) -> &str {
        match self.uri.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &self.uri[..pos],
        }
    }

    /// Get the filename portion of this PackURI.
    ///
    /// For example, "slide1.xml" for "/ppt/slides/slide1.xml".
    pub fn filename(&self) -> &str {
        match self.uri.rfind('/') {
            Some(pos) => &self.uri[pos + 1..],
            None => "",
        }
    }

    /// Get the extension portion, without the leading period.
    pub fn ext(&self) -> &str {
        let filename = self.filename();
        match filename.rfind('.') {
            Some(pos) => &filename[pos + 1..],
            None => "",
        }
    }

    /// Get the partname index for tuple partnames, or None for singletons.
    ///
    /// Returns 21 for "/ppt/slides/slide21.xml", None for "/ppt/presentation.xml".
    pub fn idx(&self) -> Option<u32> {
        let filename = self.filename();
        let stem = match filename.rfind('.') {
            Some(pos) => &filename[..pos],
            None => filename,
        };
        let digits_at = stem.rfind(|c: char| !c.is_ascii_digit()).map(|p| p + 1)?;
        if digits_at == stem.len() {
            return None;
        }
        stem[digits_at..].parse::<u32>().ok()
    }

    /// Get the membername: the URI with the leading slash stripped.
    ///
    /// This is the form used as the zip membername for the package item.
    pub fn membername(&self) -> &str {
        if self.uri == "/" { "" } else { &self.uri[1..] }
    }

    /// Get the relative reference from a base URI to this PackURI.
    ///
    /// For example, "../slideLayouts/slideLayout1.xml" from base "/ppt/slides".
    pub fn relative_ref(&self, base_uri: &str) -> String {
        if base_uri == "/" {
            return self.membername().to_string();
        }

        let from: Vec<&str> = base_uri.split('/').filter(|s| !s.is_empty()).collect();
        let to: Vec<&str> = self.uri.split('/').filter(|s| !s.is_empty()).collect();
        let common = from
            .iter()
            .zip(to.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut result = String::new();
        for _ in common..from.len() {
            result.push_str("../");
        }
        for (i, part) in to.iter().enumerate().skip(common) {
            if i > common {
                result.push('/');
            }
            result.push_str(part);
        }
        result
    }

    /// Get the PackURI of the .rels part corresponding to this PackURI.
    ///
    /// For example, "/ppt/_rels/presentation.xml.rels" for "/ppt/presentation.xml".
    pub fn rels_uri(&self) -> Result<PackURI, String> {
        let base = self.base_uri();
        let rels = if base == "/" {
            format!("/_rels/{}.rels", self.filename())
        } else {
            format!("{}/_rels/{}.rels", base, self.filename())
        };
        Self::new(rels)
    }

    /// Get the full URI string.
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// Resolve "." and ".." segments against a joined path.
    fn normalize(path: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for part in path.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                _ => parts.push(part),
            }
        }
        if parts.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for part in parts {
            out.push('/');
            out.push_str(part);
        }
        out
    }
}

impl std::fmt::Display for PackURI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri)
    }
}

impl AsRef<str> for PackURI {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}

/// The package pseudo-partname, representing the package itself
pub const PACKAGE_URI: &str = "/";

/// The URI for the [Content_Types].xml part
pub const CONTENT_TYPES_URI: &str = "/[Content_Types].xml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packuri_new() {
        assert!(PackURI::new("/ppt/presentation.xml").is_ok());
        assert!(PackURI::new("ppt/presentation.xml").is_err());
    }

    #[test]
    fn test_base_uri_and_filename() {
        let uri = PackURI::new("/ppt/slides/slide1.xml").unwrap();
        assert_eq!(uri.base_uri(), "/ppt/slides");
        assert_eq!(uri.filename(), "slide1.xml");
        assert_eq!(uri.ext(), "xml");

        let root = PackURI::new("/").unwrap();
        assert_eq!(root.base_uri(), "/");
        assert_eq!(root.filename(), "");
    }

    #[test]
    fn test_idx() {
        let uri = PackURI::new("/ppt/slides/slide21.xml").unwrap();
        assert_eq!(uri.idx(), Some(21));

        let uri = PackURI::new("/ppt/presentation.xml").unwrap();
        assert_eq!(uri.idx(), None);
    }

    #[test]
    fn test_from_rel_ref() {
        let uri = PackURI::from_rel_ref("/ppt/slides", "../slideLayouts/slideLayout1.xml").unwrap();
        assert_eq!(uri.as_str(), "/ppt/slideLayouts/slideLayout1.xml");

        let uri = PackURI::from_rel_ref("/", "ppt/presentation.xml").unwrap();
        assert_eq!(uri.as_str(), "/ppt/presentation.xml");
    }

    #[test]
    fn test_relative_ref() {
        let uri = PackURI::new("/ppt/slideLayouts/slideLayout1.xml").unwrap();
        assert_eq!(
            uri.relative_ref("/ppt/slides"),
            "../slideLayouts/slideLayout1.xml"
        );
        assert_eq!(uri.relative_ref("/"), "ppt/slideLayouts/slideLayout1.xml");
    }

    #[test]
    fn test_rels_uri() {
        let uri = PackURI::new("/ppt/presentation.xml").unwrap();
        assert_eq!(
            uri.rels_uri().unwrap().as_str(),
            "/ppt/_rels/presentation.xml.rels"
        );

        let root = PackURI::new("/").unwrap();
        assert_eq!(root.rels_uri().unwrap().as_str(), "/_rels/.rels");
    }
}
