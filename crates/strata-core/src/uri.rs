//! URIs addressing documents and the types declared inside them.
//!
//! A [`Uri`] has a store side (protocol plus path, naming a document) and a
//! type side (the path of type names inside that document). The text form is
//! `protocol://path/to/file.strata#Outer/Inner`. Type components are
//! percent-encoded so that pattern names such as `/\d+/` survive the trip.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Characters escaped inside a type component.
const COMPONENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'/')
    .add(b'\\')
    .add(b'#')
    .add(b'%')
    .add(b'?');

/// Separates the store side from the type side.
const TYPE_SEPARATOR: char = '#';

static NEXT_MEMORY_URI: AtomicU64 = AtomicU64::new(1);

/// Protocols understood by the document loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UriProtocol {
    File,
    Http,
    Https,
    /// Documents that only exist in memory.
    Memory,
}

impl UriProtocol {
    /// Returns the protocol scheme, without the trailing colon.
    pub fn scheme(self) -> &'static str {
        match self {
            UriProtocol::File => "file",
            UriProtocol::Http => "http",
            UriProtocol::Https => "https",
            UriProtocol::Memory => "memory",
        }
    }

    /// Resolves a scheme string to a protocol.
    pub fn resolve(scheme: &str) -> Option<UriProtocol> {
        match scheme.to_ascii_lowercase().as_str() {
            "file" => Some(UriProtocol::File),
            "http" => Some(UriProtocol::Http),
            "https" => Some(UriProtocol::Https),
            "memory" => Some(UriProtocol::Memory),
            _ => None,
        }
    }
}

/// An absolute URI pointing at a document, or at a (possibly nested) type
/// declared in a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Uri {
    protocol: UriProtocol,
    /// Store-side path components, including the file name.
    path: Vec<String>,
    /// Type-side components.
    types: Vec<String>,
}

impl Uri {
    /// Parses a URI from its text form.
    pub fn parse(text: &str) -> Result<Uri, CoreError> {
        let invalid = || CoreError::InvalidUri {
            text: text.to_string(),
        };

        let (scheme, rest) = text.split_once("://").ok_or_else(invalid)?;
        let protocol = UriProtocol::resolve(scheme).ok_or_else(invalid)?;

        let (store, types) = match rest.split_once(TYPE_SEPARATOR) {
            Some((store, types)) => (store, Some(types)),
            None => (rest, None),
        };

        let path: Vec<String> = store
            .split('/')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        if path.is_empty() {
            return Err(invalid());
        }

        let mut components = Vec::new();
        for raw in types.into_iter().flat_map(|t| t.split('/')) {
            if raw.is_empty() {
                continue;
            }
            let decoded = percent_decode_str(raw)
                .decode_utf8()
                .map_err(|_| invalid())?;
            components.push(decoded.into_owned());
        }

        Ok(Uri {
            protocol,
            path,
            types: components,
        })
    }

    /// Creates a URI from a protocol and a slash-separated store path.
    pub fn from_store(protocol: UriProtocol, store_path: &str) -> Uri {
        Uri {
            protocol,
            path: store_path
                .split('/')
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
            types: Vec::new(),
        }
    }

    /// Creates a unique URI for a document that exists only in memory.
    pub fn memory() -> Uri {
        let n = NEXT_MEMORY_URI.fetch_add(1, Ordering::Relaxed);
        Uri::from_store(UriProtocol::Memory, &format!("doc-{n}.strata"))
    }

    /// Returns `true` if the text looks like a URI rather than a type name.
    pub fn looks_like_uri(text: &str) -> bool {
        text.split_once("://")
            .map(|(scheme, _)| UriProtocol::resolve(scheme).is_some())
            .unwrap_or(false)
    }

    pub fn protocol(&self) -> UriProtocol {
        self.protocol
    }

    /// Returns the type-side components of this URI.
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// Returns the number of type components.
    pub fn depth(&self) -> usize {
        self.types.len()
    }

    /// Returns the last type component, if any.
    pub fn type_name(&self) -> Option<&str> {
        self.types.last().map(String::as_str)
    }

    /// Returns the URI of the document this URI points into.
    pub fn document_uri(&self) -> Uri {
        Uri {
            protocol: self.protocol,
            path: self.path.clone(),
            types: Vec::new(),
        }
    }

    /// Creates a URI whose type path is retracted to `depth` components.
    pub fn retract_type_to(&self, depth: usize) -> Uri {
        Uri {
            protocol: self.protocol,
            path: self.path.clone(),
            types: self.types[..depth.min(self.types.len())].to_vec(),
        }
    }

    /// Creates a URI with one more type component.
    pub fn extend_type(&self, name: &str) -> Uri {
        let mut types = self.types.clone();
        types.push(name.to_string());
        Uri {
            protocol: self.protocol,
            path: self.path.clone(),
            types,
        }
    }

    /// Creates a URI with the given type path inside this URI's document.
    pub fn with_types<S: AsRef<str>>(&self, types: &[S]) -> Uri {
        Uri {
            protocol: self.protocol,
            path: self.path.clone(),
            types: types.iter().map(|t| t.as_ref().to_string()).collect(),
        }
    }

    /// Returns the store side of this URI as text.
    pub fn to_store_string(&self) -> String {
        let sep = if self.protocol == UriProtocol::File {
            ":///"
        } else {
            "://"
        };
        format!("{}{}{}", self.protocol.scheme(), sep, self.path.join("/"))
    }

    /// Returns the type side of this URI as encoded text.
    pub fn to_type_string(&self) -> String {
        self.types
            .iter()
            .map(|t| utf8_percent_encode(t, COMPONENT).to_string())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_store_string())?;
        if !self.types.is_empty() {
            write!(f, "{}{}", TYPE_SEPARATOR, self.to_type_string())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_http_uri() {
        let uri = Uri::parse("http://www.domain.com/file.strata").unwrap();
        assert_eq!(uri.protocol(), UriProtocol::Http);
        assert_eq!(uri.depth(), 0);
        assert_eq!(uri.to_string(), "http://www.domain.com/file.strata");
    }

    #[test]
    fn parse_file_uri_with_types() {
        let uri = Uri::parse("file:///zoo/animals.strata#Dog/Name").unwrap();
        assert_eq!(uri.protocol(), UriProtocol::File);
        assert_eq!(uri.types(), &["Dog".to_string(), "Name".to_string()]);
        assert_eq!(uri.type_name(), Some("Name"));
        assert_eq!(uri.to_string(), "file:///zoo/animals.strata#Dog/Name");
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(matches!(
            Uri::parse("gopher://x/y.strata"),
            Err(CoreError::InvalidUri { .. })
        ));
        assert!(Uri::parse("Dog").is_err());
    }

    #[test]
    fn pattern_components_are_encoded() {
        let doc = Uri::from_store(UriProtocol::Memory, "a.strata");
        let uri = doc.extend_type("/\\d+/");
        let text = uri.to_string();
        assert!(!text.contains("\\d"));
        assert_eq!(Uri::parse(&text).unwrap(), uri);
    }

    #[test]
    fn retract_and_extend() {
        let uri = Uri::parse("memory://a.strata#A/B/C").unwrap();
        assert_eq!(uri.retract_type_to(1).to_string(), "memory://a.strata#A");
        assert_eq!(uri.retract_type_to(0), uri.document_uri());
        assert_eq!(uri.retract_type_to(10), uri);
        assert_eq!(
            uri.retract_type_to(2).extend_type("D").to_string(),
            "memory://a.strata#A/B/D"
        );
    }

    #[test]
    fn memory_uris_are_unique() {
        assert_ne!(Uri::memory(), Uri::memory());
        assert!(Uri::looks_like_uri(&Uri::memory().to_string()));
        assert!(!Uri::looks_like_uri("Animal"));
    }
}
