use std::sync::Arc;

use crate::authority::AuthorityUrls;
use crate::domain::{DocumentFormat, Identifier};
use crate::error::FetchError;
use crate::model::ResultSet;
use crate::parsers::ParserRegistry;
use crate::transport::Transport;

/// Direct lookup of one NameBank record by identifier.
pub struct RecordFetcher<T: Transport> {
    transport: T,
    parsers: Arc<ParserRegistry>,
    authority: AuthorityUrls,
    service_url: String,
}

impl<T: Transport> RecordFetcher<T> {
    pub fn new(
        transport: T,
        parsers: Arc<ParserRegistry>,
        authority: AuthorityUrls,
        service_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            parsers,
            authority,
            service_url: service_url.into(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    pub fn authority(&self) -> &AuthorityUrls {
        &self.authority
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// The returned set holds exactly one entry, with base URL repointed at
    /// this service and GUID set to the identifier.
    pub fn fetch_record(&self, id: Identifier) -> Result<ResultSet, FetchError> {
        let url = self.authority.metadata_url(id);
        let span = tracing::debug_span!("fetch_record", %id);
        let _guard = span.enter();

        let bytes = self.transport.get(&url)?;
        let mut set = self
            .parsers
            .parse(&bytes, DocumentFormat::UbioMetadata)
            .map_err(|err| FetchError::from_parse(&url, err))?;
        if set.entry_count() == 0 {
            return Err(FetchError::NotFound { url });
        }

        for entry in set.taxa.iter_mut().flat_map(|taxa| taxa.entries.iter_mut()) {
            if entry.link.is_none() {
                entry.link = Some(url.clone());
            }
        }
        set.base_url = Some(self.service_url.clone());
        set.guid = Some(id.to_string());
        set.retrieved_at = Some(chrono::Utc::now().to_rfc3339());
        let statements = set.first_entry().map_or(0, |entry| entry.statements.len());
        tracing::info!(%id, statements, "record fetched");
        Ok(set)
    }
}
