use clap::ValueEnum;
use rayon::ThreadPool;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{DocumentFormat, Identifier, extract_identifier};
use crate::error::{FetchError, ResolveError, TaxaError};
use crate::fetcher::RecordFetcher;
use crate::merge::merge;
use crate::model::{ResultSet, TaxonEntry};
use crate::transport::Transport;

/// Candidate statement whose value names the full record to fetch.
pub const CORRELATION_PREDICATE: &str = "dc:identifier";

pub const DEFAULT_ENRICHMENT_WORKERS: usize = 4;

/// What to do when one candidate cannot be enriched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentPolicy {
    /// Fail the whole query.
    #[default]
    Abort,
    /// Keep the candidate with its search data only.
    Degrade,
}

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub api_key: Option<String>,
    pub workers: usize,
    pub policy: EnrichmentPolicy,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            api_key: None,
            workers: DEFAULT_ENRICHMENT_WORKERS,
            policy: EnrichmentPolicy::Abort,
        }
    }
}

/// Free-text search followed by a record lookup per candidate.
pub struct QueryResolver<T: Transport> {
    records: RecordFetcher<T>,
    api_key: Option<String>,
    policy: EnrichmentPolicy,
    pool: Option<ThreadPool>,
}

impl<T: Transport> QueryResolver<T> {
    pub fn new(records: RecordFetcher<T>, options: ResolverOptions) -> Result<Self, TaxaError> {
        let pool = if options.workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(options.workers)
                .thread_name(|index| format!("kira-taxa-enrich-{index}"))
                .build()
                .map_err(|err| TaxaError::WorkerPool(err.to_string()))?;
            Some(pool)
        } else {
            None
        };
        Ok(Self {
            records,
            api_key: options.api_key,
            policy: options.policy,
            pool,
        })
    }

    pub fn records(&self) -> &RecordFetcher<T> {
        &self.records
    }

    /// Candidates keep the order the authority ranked them in. The returned set
    /// has its base URL repointed at this service and its GUID set to `query`.
    pub fn resolve_query(&self, query: &str) -> Result<ResultSet, ResolveError> {
        let key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ResolveError::MissingCredential)?;
        let span = tracing::debug_span!("resolve_query", query);
        let _guard = span.enter();

        let mut set = self.search(query, key)?;
        let records = self.fetch_candidates(query, &set)?;

        let ResultSet {
            namespaces, taxa, ..
        } = &mut set;
        let candidates = taxa.iter_mut().flat_map(|taxa| taxa.entries.iter_mut());
        for (candidate, record) in candidates.zip(records) {
            let Some(record) = record else { continue };
            if let Some(source) = record.first_entry() {
                merge(candidate, source, namespaces, &record.namespaces);
            }
        }

        set.base_url = Some(self.records.service_url().to_string());
        set.guid = Some(query.to_string());
        set.retrieved_at = Some(chrono::Utc::now().to_rfc3339());
        tracing::info!(query, candidates = set.entry_count(), "search resolved");
        Ok(set)
    }

    fn search(&self, query: &str, key: &str) -> Result<ResultSet, ResolveError> {
        let url = self.records.authority().search_url(query, key);
        // keep the key out of errors and logs
        let shown = self.records.authority().search_url(query, "<redacted>");
        tracing::debug!(url = %shown, "searching authority");

        let failed = |source: FetchError| ResolveError::SearchFailed {
            query: query.to_string(),
            source,
        };
        let bytes = self
            .records
            .transport()
            .get(&url)
            .map_err(|err| failed(redact(err, &shown)))?;
        self.records
            .parsers()
            .parse(&bytes, DocumentFormat::UbioSearch)
            .map_err(|err| failed(FetchError::from_parse(&shown, err)))
    }

    fn fetch_candidates(
        &self,
        query: &str,
        set: &ResultSet,
    ) -> Result<Vec<Option<ResultSet>>, ResolveError> {
        let candidates = set.entries().collect::<Vec<_>>();
        match &self.pool {
            None => candidates
                .iter()
                .enumerate()
                .map(|(index, candidate)| self.enrich_one(query, index, candidate))
                .map(|outcome| self.apply_policy(outcome))
                .collect(),
            Some(pool) => {
                let outcomes = pool.install(|| {
                    candidates
                        .par_iter()
                        .enumerate()
                        .map(|(index, candidate)| self.enrich_one(query, index, candidate))
                        .collect::<Vec<_>>()
                });
                outcomes
                    .into_iter()
                    .map(|outcome| self.apply_policy(outcome))
                    .collect()
            }
        }
    }

    fn enrich_one(
        &self,
        query: &str,
        index: usize,
        candidate: &TaxonEntry,
    ) -> Result<ResultSet, ResolveError> {
        let id = correlation_id(candidate).map_err(|value| ResolveError::CorrelationFailed {
            query: query.to_string(),
            candidate: index,
            value,
        })?;
        self.records
            .fetch_record(id)
            .map_err(|source| ResolveError::EnrichmentFailed {
                query: query.to_string(),
                candidate: index,
                identifier: id,
                source,
            })
    }

    fn apply_policy(
        &self,
        outcome: Result<ResultSet, ResolveError>,
    ) -> Result<Option<ResultSet>, ResolveError> {
        match (outcome, self.policy) {
            (Ok(record), _) => Ok(Some(record)),
            (Err(err), EnrichmentPolicy::Abort) => Err(err),
            (Err(err), EnrichmentPolicy::Degrade) => {
                tracing::warn!(error = %err, "keeping search-only data for candidate");
                Ok(None)
            }
        }
    }
}

/// On failure returns the offending value, if there was one.
fn correlation_id(candidate: &TaxonEntry) -> Result<Identifier, Option<String>> {
    let value = candidate.value_of(CORRELATION_PREDICATE).ok_or(None)?;
    extract_identifier(value).map_err(|_| Some(value.to_string()))
}

fn redact(err: FetchError, shown: &str) -> FetchError {
    let url = shown.to_string();
    match err {
        FetchError::NetworkFailure { reason, .. } => FetchError::NetworkFailure { url, reason },
        FetchError::ParseFailure { format, reason, .. } => {
            FetchError::ParseFailure { url, format, reason }
        }
        FetchError::NotFound { .. } => FetchError::NotFound { url },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Statement;

    #[test]
    fn correlation_id_reads_identifier_statement() {
        let mut entry = TaxonEntry::new("Homo sapiens");
        entry.add_statement(Statement::literal(
            CORRELATION_PREDICATE,
            "urn:lsid:ubio.org:namebank:2481730",
        ));
        assert_eq!(correlation_id(&entry), Ok(Identifier::new(2481730)));
    }

    #[test]
    fn correlation_id_reports_bad_values() {
        let entry = TaxonEntry::new("Homo sapiens");
        assert_eq!(correlation_id(&entry), Err(None));

        let mut entry = TaxonEntry::new("Homo sapiens");
        entry.add_statement(Statement::literal(
            CORRELATION_PREDICATE,
            "urn:lsid:ubio.org:namebank:abc",
        ));
        assert_eq!(
            correlation_id(&entry),
            Err(Some("urn:lsid:ubio.org:namebank:abc".to_string()))
        );
    }

    #[test]
    fn redact_replaces_url() {
        let err = FetchError::NetworkFailure {
            url: "http://x/?keyCode=SECRET".to_string(),
            reason: "timed out".to_string(),
        };
        let redacted = redact(err, "http://x/?keyCode=<redacted>");
        assert!(!redacted.url().contains("SECRET"));
    }
}
