use std::fmt;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

use crate::domain::{DocumentFormat, Identifier, OutputFormat};

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ValidationError {
    #[error("no trailing numeric identifier in {input:?}")]
    #[diagnostic(help("identifiers must end in a run of decimal digits, e.g. urn:lsid:ubio.org:namebank:2481730"))]
    NotParseable { input: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    NetworkFailure { url: String, reason: String },

    #[error("document from {url} is not valid {format}: {reason}")]
    ParseFailure {
        url: String,
        format: DocumentFormat,
        reason: String,
    },

    #[error("authority has no record at {url}")]
    NotFound { url: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::NetworkFailure { url, .. }
            | FetchError::ParseFailure { url, .. }
            | FetchError::NotFound { url } => url,
        }
    }

    pub(crate) fn from_parse(url: &str, err: ParseError) -> Self {
        match err {
            ParseError::Empty { .. } | ParseError::Upstream { .. } => FetchError::NotFound {
                url: url.to_string(),
            },
            ParseError::Malformed { format, reason } => FetchError::ParseFailure {
                url: url.to_string(),
                format,
                reason,
            },
            ParseError::Unsupported { format } => FetchError::ParseFailure {
                url: url.to_string(),
                format,
                reason: "no parser registered".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ParseError {
    #[error("malformed {format} document: {reason}")]
    Malformed {
        format: DocumentFormat,
        reason: String,
    },

    #[error("{format} document carries no record")]
    Empty { format: DocumentFormat },

    #[error("authority reported an error in {format} document: {message}")]
    Upstream {
        format: DocumentFormat,
        message: String,
    },

    #[error("no parser registered for {format}")]
    Unsupported { format: DocumentFormat },
}

impl ParseError {
    pub(crate) fn malformed(format: DocumentFormat, reason: impl ToString) -> Self {
        ParseError::Malformed {
            format,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ResolveError {
    #[error("no API key configured for the authority search endpoint")]
    #[diagnostic(help("set UBIO_API_KEY or api_key in kira-taxa.json"))]
    MissingCredential,

    #[error("search for {query:?} failed")]
    SearchFailed {
        query: String,
        #[source]
        source: FetchError,
    },

    #[error("candidate {candidate} of search {query:?} has no usable identifier (found {value:?})")]
    CorrelationFailed {
        query: String,
        candidate: usize,
        value: Option<String>,
    },

    #[error("enriching candidate {candidate} ({identifier}) of search {query:?} failed")]
    EnrichmentFailed {
        query: String,
        candidate: usize,
        identifier: Identifier,
        #[source]
        source: FetchError,
    },
}

/// How a host dispatcher should surface a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Client,
    Upstream,
    Configuration,
    Internal,
}

#[derive(Debug, Error)]
pub enum TaxaError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("config file not found: {0}")]
    ConfigNotFound(Utf8PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("failed to start enrichment workers: {0}")]
    WorkerPool(String),

    #[error("output format {0} cannot be rendered as a document")]
    UnsupportedOutput(OutputFormat),

    #[error("failed to render {format} output: {reason}")]
    Render { format: OutputFormat, reason: String },
}

impl Diagnostic for TaxaError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            TaxaError::Validation(err) => err.code(),
            TaxaError::Fetch(err) => err.code(),
            TaxaError::Resolve(err) => err.code(),
            _ => None,
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let hint: &'static str = match self {
            TaxaError::Validation(err) => return err.help(),
            TaxaError::Fetch(err) => return err.help(),
            TaxaError::Resolve(err) => return err.help(),
            TaxaError::ConfigNotFound(_) => {
                "pass --config an existing file, or drop it to use discovery"
            }
            TaxaError::InvalidConfig(_) => "check kira-taxa.json against the documented fields",
            _ => return None,
        };
        let hint: Box<dyn fmt::Display + 'a> = Box::new(hint);
        Some(hint)
    }
}

impl TaxaError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TaxaError::Validation(_) | TaxaError::UnsupportedOutput(_) => ErrorClass::Client,
            TaxaError::Fetch(_) => ErrorClass::Upstream,
            TaxaError::Resolve(ResolveError::MissingCredential) => ErrorClass::Configuration,
            TaxaError::Resolve(_) => ErrorClass::Upstream,
            TaxaError::ConfigNotFound(_)
            | TaxaError::ConfigRead(_)
            | TaxaError::ConfigParse(_)
            | TaxaError::InvalidConfig(_) => ErrorClass::Configuration,
            TaxaError::HttpClient(_) | TaxaError::WorkerPool(_) | TaxaError::Render { .. } => {
                ErrorClass::Internal
            }
        }
    }

    pub fn http_status(&self) -> u16 {
        match self.class() {
            ErrorClass::Client => 400,
            ErrorClass::Upstream => 502,
            ErrorClass::Configuration | ErrorClass::Internal => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_map_onto_fetch_errors() {
        let url = "http://example.org/meta";
        let empty = ParseError::Empty {
            format: DocumentFormat::UbioMetadata,
        };
        assert_eq!(
            FetchError::from_parse(url, empty),
            FetchError::NotFound {
                url: url.to_string()
            }
        );

        let malformed = ParseError::malformed(DocumentFormat::UbioMetadata, "unexpected eof");
        let fetch = FetchError::from_parse(url, malformed);
        assert!(matches!(fetch, FetchError::ParseFailure { ref reason, .. } if reason == "unexpected eof"));
        assert_eq!(fetch.url(), url);
    }

    #[test]
    fn classes_drive_status_codes() {
        let bad = TaxaError::from(ValidationError::NotParseable {
            input: "xyz".to_string(),
        });
        assert_eq!(bad.class(), ErrorClass::Client);
        assert_eq!(bad.http_status(), 400);

        let key = TaxaError::from(ResolveError::MissingCredential);
        assert_eq!(key.class(), ErrorClass::Configuration);
        assert_eq!(key.http_status(), 500);

        let upstream = TaxaError::from(FetchError::NotFound {
            url: "http://example.org".to_string(),
        });
        assert_eq!(upstream.http_status(), 502);
    }

    #[test]
    fn component_help_reaches_the_report() {
        let key = TaxaError::from(ResolveError::MissingCredential);
        let help = key.help().map(|help| help.to_string());
        assert!(help.is_some_and(|help| help.contains("UBIO_API_KEY")));

        let bad = TaxaError::from(ValidationError::NotParseable {
            input: "xyz".to_string(),
        });
        let help = bad.help().map(|help| help.to_string());
        assert!(help.is_some_and(|help| help.contains("decimal digits")));

        let report = miette::Report::new(key);
        assert_eq!(
            report.to_string(),
            "no API key configured for the authority search endpoint"
        );
        assert!(report.help().is_some());

        let upstream = TaxaError::from(FetchError::NotFound {
            url: "http://example.org".to_string(),
        });
        assert!(upstream.help().is_none());
    }
}
