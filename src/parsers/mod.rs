use std::collections::HashMap;
use std::fmt;

use crate::domain::DocumentFormat;
use crate::error::ParseError;
use crate::model::ResultSet;

pub mod ubio_metadata;
pub mod ubio_search;

pub use ubio_metadata::UbioMetadataParser;
pub use ubio_search::UbioSearchParser;

/// Turns an authority document into a result set.
pub trait DocumentParser: Send + Sync {
    fn format(&self) -> DocumentFormat;
    fn parse(&self, bytes: &[u8]) -> Result<ResultSet, ParseError>;
}

#[derive(Default)]
pub struct ParserRegistry {
    parsers: HashMap<DocumentFormat, Box<dyn DocumentParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(UbioMetadataParser));
        registry.register(Box::new(UbioSearchParser));
        registry
    }

    /// Replaces any parser already registered for the same format.
    pub fn register(&mut self, parser: Box<dyn DocumentParser>) {
        self.parsers.insert(parser.format(), parser);
    }

    pub fn supports(&self, format: DocumentFormat) -> bool {
        self.parsers.contains_key(&format)
    }

    pub fn parse(&self, bytes: &[u8], format: DocumentFormat) -> Result<ResultSet, ParseError> {
        let parser = self
            .parsers
            .get(&format)
            .ok_or(ParseError::Unsupported { format })?;
        parser.parse(bytes)
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("formats", &self.parsers.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub(crate) fn split_qname(name: &[u8]) -> (String, String) {
    let name = String::from_utf8_lossy(name);
    match name.split_once(':') {
        Some((prefix, local)) => (prefix.to_string(), local.to_string()),
        None => (String::new(), name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_registry_reports_unsupported() {
        let registry = ParserRegistry::new();
        assert!(!registry.supports(DocumentFormat::UbioSearch));
        assert_matches!(
            registry.parse(b"<results/>", DocumentFormat::UbioSearch),
            Err(ParseError::Unsupported {
                format: DocumentFormat::UbioSearch
            })
        );
    }

    #[test]
    fn defaults_cover_authority_formats() {
        let registry = ParserRegistry::with_defaults();
        assert!(registry.supports(DocumentFormat::UbioMetadata));
        assert!(registry.supports(DocumentFormat::UbioSearch));
    }

    #[test]
    fn qname_split() {
        assert_eq!(
            split_qname(b"dc:title"),
            ("dc".to_string(), "title".to_string())
        );
        assert_eq!(split_qname(b"value"), (String::new(), "value".to_string()));
    }
}
