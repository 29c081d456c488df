use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;

use kira_taxa::authority::AuthorityUrls;
use kira_taxa::domain::{DocumentFormat, Identifier};
use kira_taxa::error::FetchError;
use kira_taxa::fetcher::RecordFetcher;
use kira_taxa::parsers::ParserRegistry;
use kira_taxa::transport::Transport;

const SERVICE_URL: &str = "http://taxa.example.org/phylows/";

#[derive(Default)]
struct StubTransport {
    responses: HashMap<String, Result<Vec<u8>, FetchError>>,
    calls: Mutex<Vec<String>>,
}

impl StubTransport {
    fn with(mut self, url: String, body: &[u8]) -> Self {
        self.responses.insert(url, Ok(body.to_vec()));
        self
    }

    fn failing(mut self, url: String, err: FetchError) -> Self {
        self.responses.insert(url, Err(err));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for StubTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::NotFound { url: url.to_string() }))
    }
}

fn fetcher(transport: &StubTransport) -> RecordFetcher<&StubTransport> {
    RecordFetcher::new(
        transport,
        Arc::new(ParserRegistry::with_defaults()),
        AuthorityUrls::default(),
        SERVICE_URL,
    )
}

fn metadata_url(id: u64) -> String {
    AuthorityUrls::default().metadata_url(Identifier::new(id))
}

#[test]
fn fetch_record_stamps_service_provenance() {
    let body = fs::read("tests/fixtures/ubio_metadata_2481730.rdf").unwrap();
    let transport = StubTransport::default().with(metadata_url(2481730), &body);

    let set = fetcher(&transport)
        .fetch_record(Identifier::new(2481730))
        .unwrap();

    assert_eq!(set.guid.as_deref(), Some("2481730"));
    assert_eq!(set.base_url.as_deref(), Some(SERVICE_URL));
    assert_ne!(set.base_url.as_deref(), Some("http://www.ubio.org/"));
    assert!(set.retrieved_at.is_some());
    assert_eq!(set.entry_count(), 1);

    let entry = set.first_entry().unwrap();
    assert_eq!(entry.name, "Homo sapiens");
    assert_eq!(entry.link.as_deref(), Some(metadata_url(2481730).as_str()));
    assert_eq!(entry.statements.len(), 11);
    assert!(set.undeclared_prefixes().is_empty());
    assert_eq!(transport.calls(), vec![metadata_url(2481730)]);
}

#[test]
fn empty_document_is_not_found() {
    let body = br#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"/>"#;
    let transport = StubTransport::default().with(metadata_url(1), body);

    let err = fetcher(&transport)
        .fetch_record(Identifier::new(1))
        .unwrap_err();
    assert_matches!(err, FetchError::NotFound { url } if url == metadata_url(1));
}

#[test]
fn authority_error_answer_is_not_found() {
    let body = b"<?xml version=\"1.0\"?>\n<error>No record found for that LSID</error>\n";
    let transport = StubTransport::default().with(metadata_url(1), body);

    let err = fetcher(&transport)
        .fetch_record(Identifier::new(1))
        .unwrap_err();
    assert_matches!(err, FetchError::NotFound { url } if url == metadata_url(1));
    assert_eq!(transport.calls().len(), 1);
}

#[test]
fn garbage_document_is_parse_failure() {
    let transport = StubTransport::default().with(metadata_url(7), b"<html>Service Unavailable</html>");

    let err = fetcher(&transport)
        .fetch_record(Identifier::new(7))
        .unwrap_err();
    assert_matches!(
        err,
        FetchError::ParseFailure {
            format: DocumentFormat::UbioMetadata,
            ..
        }
    );
}

#[test]
fn network_failure_propagates_unchanged() {
    let url = metadata_url(42);
    let transport = StubTransport::default().failing(
        url.clone(),
        FetchError::NetworkFailure {
            url: url.clone(),
            reason: "timed out".to_string(),
        },
    );

    let err = fetcher(&transport)
        .fetch_record(Identifier::new(42))
        .unwrap_err();
    assert_matches!(err, FetchError::NetworkFailure { reason, .. } if reason == "timed out");
    assert_eq!(transport.calls().len(), 1);
}
