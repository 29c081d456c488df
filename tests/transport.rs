use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use assert_matches::assert_matches;

use kira_taxa::error::FetchError;
use kira_taxa::transport::{HttpTransport, Transport};

/// Serves one scripted response per connection, then stops listening.
struct ScriptedServer {
    url: String,
    requests: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    fn start(script: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/authority/metadata", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        let handle = thread::spawn(move || {
            for (status, body) in script {
                let (mut stream, _) = listener.accept().unwrap();
                let request_line = read_request(&mut stream);
                seen.lock().unwrap().push(request_line);
                let response = format!(
                    "HTTP/1.1 {status} {}\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    reason(status),
                    body.len()
                );
                stream.write_all(response.as_bytes()).unwrap();
                stream.flush().unwrap();
            }
        });
        Self {
            url,
            requests,
            handle,
        }
    }

    fn finish(self) -> Vec<String> {
        self.handle.join().unwrap();
        self.requests.lock().unwrap().clone()
    }
}

fn read_request(stream: &mut impl Read) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    while !raw.windows(4).any(|window| window == b"\r\n\r\n") {
        let read = stream.read(&mut buf).unwrap();
        if read == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..read]);
    }
    let text = String::from_utf8_lossy(&raw);
    text.lines().next().unwrap_or_default().to_string()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

fn transport(max_retries: usize) -> HttpTransport {
    HttpTransport::new(Duration::from_secs(5), max_retries).unwrap()
}

#[test]
fn missing_record_is_not_found_without_retry() {
    let server = ScriptedServer::start(vec![(404, "<error>unknown</error>")]);
    let url = server.url.clone();

    let err = transport(2).get(&url).unwrap_err();
    assert_matches!(err, FetchError::NotFound { url: failed } if failed == url);

    let requests = server.finish();
    assert_eq!(requests, vec!["GET /authority/metadata HTTP/1.1".to_string()]);
}

#[test]
fn unavailable_authority_is_retried() {
    let server = ScriptedServer::start(vec![(503, "busy"), (200, "<rdf:RDF/>")]);
    let url = server.url.clone();

    let body = transport(2).get(&url).unwrap();
    assert_eq!(body, b"<rdf:RDF/>".to_vec());
    assert_eq!(server.finish().len(), 2);
}

#[test]
fn persistent_server_error_is_network_failure_with_status() {
    let server = ScriptedServer::start(vec![(500, "boom"), (500, "boom"), (500, "boom")]);
    let url = server.url.clone();

    let err = transport(2).get(&url).unwrap_err();
    assert_matches!(
        err,
        FetchError::NetworkFailure { reason, .. } if reason.contains("500")
    );
    assert_eq!(server.finish().len(), 3);
}

#[test]
fn retries_disabled_returns_first_status() {
    let server = ScriptedServer::start(vec![(503, "busy")]);
    let url = server.url.clone();

    let err = transport(0).get(&url).unwrap_err();
    assert_matches!(
        err,
        FetchError::NetworkFailure { reason, .. } if reason.contains("503")
    );
    assert_eq!(server.finish().len(), 1);
}
