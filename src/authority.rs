use serde::{Deserialize, Serialize};
use url::Url;
use url::form_urlencoded::byte_serialize;

use crate::domain::Identifier;
use crate::error::TaxaError;

const UBIO_BASE: &str = "http://www.ubio.org/";
const UBIO_SEARCH: &str = "http://www.ubio.org/webservices/service.php?function=namebank_search&searchName={query}&sci=1&vern=1&keyCode={key}";
const UBIO_METADATA: &str =
    "http://www.ubio.org/authority/metadata.php?lsid=urn:lsid:ubio.org:namebank:{id}";
const UBIO_HTML_SEARCH: &str = "http://www.ubio.org/browser/search.php?search_all={query}";
const UBIO_HTML_RECORD: &str = "http://www.ubio.org/browser/details.php?namebankID={id}";

/// URL templates for the NameBank endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityUrls {
    pub base: String,
    pub search: String,
    pub metadata: String,
    pub html_search: String,
    pub html_record: String,
}

impl Default for AuthorityUrls {
    fn default() -> Self {
        Self {
            base: UBIO_BASE.to_string(),
            search: UBIO_SEARCH.to_string(),
            metadata: UBIO_METADATA.to_string(),
            html_search: UBIO_HTML_SEARCH.to_string(),
            html_record: UBIO_HTML_RECORD.to_string(),
        }
    }
}

impl AuthorityUrls {
    pub fn validate(&self) -> Result<(), TaxaError> {
        let base = Url::parse(&self.base)
            .map_err(|err| TaxaError::InvalidConfig(format!("authority base {}: {err}", self.base)))?;
        if base.cannot_be_a_base() {
            return Err(TaxaError::InvalidConfig(format!(
                "authority base {} is not a base URL",
                self.base
            )));
        }
        let required = [
            ("search", &self.search, &["{query}", "{key}"][..]),
            ("metadata", &self.metadata, &["{id}"][..]),
            ("html_search", &self.html_search, &["{query}"][..]),
            ("html_record", &self.html_record, &["{id}"][..]),
        ];
        for (name, template, placeholders) in required {
            for placeholder in placeholders {
                if !template.contains(placeholder) {
                    return Err(TaxaError::InvalidConfig(format!(
                        "authority template {name} is missing {placeholder}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn search_url(&self, query: &str, key: &str) -> String {
        self.search
            .replace("{query}", &encode(query))
            .replace("{key}", &encode(key))
    }

    pub fn metadata_url(&self, id: Identifier) -> String {
        self.metadata.replace("{id}", &id.to_string())
    }

    pub fn html_search_url(&self, query: &str) -> String {
        self.html_search.replace("{query}", &encode(query))
    }

    pub fn html_record_url(&self, id: Identifier) -> String {
        self.html_record.replace("{id}", &id.to_string())
    }
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}
