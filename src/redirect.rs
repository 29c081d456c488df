use serde::Serialize;

use crate::authority::AuthorityUrls;
use crate::domain::extract_identifier;
use crate::error::ValidationError;

/// Request fields the redirect decision depends on.
#[derive(Debug, Clone, Default)]
pub struct RedirectParams<'a> {
    pub format: Option<&'a str>,
    pub query: Option<&'a str>,
    pub path: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "url", rename_all = "lowercase")]
pub enum RedirectDecision {
    Stay,
    Redirect(String),
}

impl RedirectDecision {
    pub fn url(&self) -> Option<&str> {
        match self {
            RedirectDecision::Stay => None,
            RedirectDecision::Redirect(url) => Some(url),
        }
    }
}

/// Sends HTML requests to the authority's own browser pages.
#[derive(Debug, Clone)]
pub struct RedirectPolicy {
    authority: AuthorityUrls,
}

impl RedirectPolicy {
    pub fn new(authority: AuthorityUrls) -> Self {
        Self { authority }
    }

    pub fn decide(&self, params: &RedirectParams<'_>) -> Result<RedirectDecision, ValidationError> {
        if params.format != Some("html") {
            return Ok(RedirectDecision::Stay);
        }
        if let Some(query) = params.query.filter(|query| !query.is_empty()) {
            return Ok(RedirectDecision::Redirect(
                self.authority.html_search_url(query),
            ));
        }
        let id = extract_identifier(params.path)?;
        Ok(RedirectDecision::Redirect(self.authority.html_record_url(id)))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn policy() -> RedirectPolicy {
        RedirectPolicy::new(AuthorityUrls::default())
    }

    #[test]
    fn html_query_goes_to_search_page_whatever_the_path() {
        for path in ["", "phylows/taxon/ubio/123", "xyz"] {
            let decision = policy()
                .decide(&RedirectParams {
                    format: Some("html"),
                    query: Some("foo"),
                    path,
                })
                .unwrap();
            assert_eq!(
                decision,
                RedirectDecision::Redirect(
                    "http://www.ubio.org/browser/search.php?search_all=foo".to_string()
                )
            );
        }
    }

    #[test]
    fn html_without_query_goes_to_record_page() {
        let decision = policy()
            .decide(&RedirectParams {
                format: Some("html"),
                query: Some(""),
                path: "phylows/taxon/ubio/123",
            })
            .unwrap();
        assert_eq!(
            decision.url(),
            Some("http://www.ubio.org/browser/details.php?namebankID=123")
        );
    }

    #[test]
    fn structured_formats_never_redirect() {
        for format in [Some("json"), Some("nexml"), Some("HTML"), None] {
            let decision = policy()
                .decide(&RedirectParams {
                    format,
                    query: Some("foo"),
                    path: "xyz",
                })
                .unwrap();
            assert_eq!(decision, RedirectDecision::Stay);
        }
    }

    #[test]
    fn html_path_without_digits_is_rejected() {
        let err = policy()
            .decide(&RedirectParams {
                format: Some("html"),
                query: None,
                path: "service/lookup/xyz",
            })
            .unwrap_err();
        assert_matches!(err, ValidationError::NotParseable { .. });
    }
}
