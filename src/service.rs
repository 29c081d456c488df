use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::ResolvedConfig;
use crate::domain::{OutputFormat, SUPPORTED_FORMATS, extract_identifier};
use crate::error::TaxaError;
use crate::fetcher::RecordFetcher;
use crate::model::ResultSet;
use crate::parsers::ParserRegistry;
use crate::redirect::{RedirectDecision, RedirectParams, RedirectPolicy};
use crate::resolver::QueryResolver;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy)]
pub enum ProgressSinkKind {
    Record,
    Search,
    Resolve,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

/// One inbound request, already split into fields by the host.
#[derive(Debug, Clone)]
pub struct Request {
    pub format: OutputFormat,
    pub query: Option<String>,
    pub path: String,
    pub guid: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "body", rename_all = "lowercase")]
pub enum Response {
    Redirect(String),
    Document(ResultSet),
}

/// Entry point for the host dispatcher: redirect first, then search or lookup.
pub struct Service<T: Transport> {
    redirect: RedirectPolicy,
    resolver: QueryResolver<T>,
}

impl<T: Transport> Service<T> {
    pub fn new(
        transport: T,
        parsers: Arc<ParserRegistry>,
        config: &ResolvedConfig,
    ) -> Result<Self, TaxaError> {
        let records = RecordFetcher::new(
            transport,
            parsers,
            config.authority.clone(),
            config.service_url.clone(),
        );
        let resolver = QueryResolver::new(records, config.resolver_options())?;
        Ok(Self {
            redirect: RedirectPolicy::new(config.authority.clone()),
            resolver,
        })
    }

    pub fn supported_formats(&self) -> &'static [OutputFormat] {
        &SUPPORTED_FORMATS
    }

    pub fn handle(
        &self,
        request: &Request,
        sink: &dyn ProgressSink,
    ) -> Result<Response, TaxaError> {
        sink.event(ProgressEvent {
            message: format!("phase=Redirect; format={}", request.format),
            elapsed: None,
        });
        let decision = self.redirect.decide(&RedirectParams {
            format: Some(request.format.as_str()),
            query: request.query.as_deref(),
            path: &request.path,
        })?;
        if let RedirectDecision::Redirect(url) = decision {
            tracing::info!(%url, "redirecting to authority page");
            return Ok(Response::Redirect(url));
        }

        match request.query.as_deref().filter(|query| !query.is_empty()) {
            Some(query) => self.search(query, sink).map(Response::Document),
            None => {
                let guid = request.guid.as_deref().unwrap_or(&request.path);
                self.record(guid, sink).map(Response::Document)
            }
        }
    }

    pub fn record(&self, guid: &str, sink: &dyn ProgressSink) -> Result<ResultSet, TaxaError> {
        let id = extract_identifier(guid)?;
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; record {id}"),
            elapsed: None,
        });
        let start = Instant::now();
        let set = self.resolver.records().fetch_record(id)?;
        sink.event(ProgressEvent {
            message: format!("phase=Done; record {id}"),
            elapsed: Some(start.elapsed()),
        });
        Ok(set)
    }

    pub fn search(&self, query: &str, sink: &dyn ProgressSink) -> Result<ResultSet, TaxaError> {
        sink.event(ProgressEvent {
            message: format!("phase=Search; query {query:?}"),
            elapsed: None,
        });
        let start = Instant::now();
        let set = self.resolver.resolve_query(query)?;
        sink.event(ProgressEvent {
            message: format!("phase=Done; {} candidates", set.entry_count()),
            elapsed: Some(start.elapsed()),
        });
        Ok(set)
    }
}
