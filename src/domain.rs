use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const LSID_PREFIX: &str = "urn:lsid:ubio.org:namebank:";

static TRAILING_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+$").unwrap());

/// A NameBank record number, taken from the tail of a GUID or request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier(u64);

impl Identifier {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn lsid(&self) -> String {
        format!("{LSID_PREFIX}{}", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Identifier {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        extract_identifier(value)
    }
}

/// Takes the longest run of ASCII digits ending the string. The input is not
/// trimmed, so `"123 "` has no identifier.
pub fn extract_identifier(raw: &str) -> Result<Identifier, ValidationError> {
    let not_parseable = || ValidationError::NotParseable {
        input: raw.to_string(),
    };
    let digits = TRAILING_DIGITS.find(raw).ok_or_else(not_parseable)?;
    let value = digits
        .as_str()
        .parse::<u64>()
        .map_err(|_| not_parseable())?;
    Ok(Identifier(value))
}

/// Output formats advertised to the host dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Nexml,
    Html,
    Json,
    Nexus,
}

pub const SUPPORTED_FORMATS: [OutputFormat; 4] = [
    OutputFormat::Nexml,
    OutputFormat::Html,
    OutputFormat::Json,
    OutputFormat::Nexus,
];

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Nexml => "nexml",
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
            OutputFormat::Nexus => "nexus",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            OutputFormat::Nexml => "application/xml",
            OutputFormat::Html => "text/html",
            OutputFormat::Json => "application/json",
            OutputFormat::Nexus => "text/plain",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wire formats the authority answers in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentFormat {
    UbioMetadata,
    UbioSearch,
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::UbioMetadata => write!(f, "ubio metadata (RDF/XML)"),
            DocumentFormat::UbioSearch => write!(f, "ubio search (XML)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn extract_identifier_from_lsid() {
        let id = extract_identifier("urn:lsid:ubio.org:namebank:2481730").unwrap();
        assert_eq!(id.value(), 2481730);
        assert_eq!(id.lsid(), "urn:lsid:ubio.org:namebank:2481730");
    }

    #[test]
    fn extract_takes_longest_trailing_run() {
        let id = extract_identifier("phylows/taxon/ubio/12ab345").unwrap();
        assert_eq!(id.value(), 345);
        let id: Identifier = "987654".parse().unwrap();
        assert_eq!(id.value(), 987654);
    }

    #[test]
    fn extract_rejects_missing_digits() {
        let err = extract_identifier("service/lookup/xyz").unwrap_err();
        assert_matches!(err, ValidationError::NotParseable { ref input } if input == "service/lookup/xyz");
        assert_matches!(extract_identifier(""), Err(ValidationError::NotParseable { .. }));
        assert_matches!(extract_identifier("123 "), Err(ValidationError::NotParseable { .. }));
    }

    #[test]
    fn extract_rejects_unicode_digits() {
        assert_matches!(
            extract_identifier("taxon/١٢٣"),
            Err(ValidationError::NotParseable { .. })
        );
    }

    #[test]
    fn output_format_names() {
        let names = SUPPORTED_FORMATS
            .iter()
            .map(|format| format.to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["nexml", "html", "json", "nexus"]);
    }
}
