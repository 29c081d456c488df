use std::fs;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::authority::AuthorityUrls;
use crate::error::TaxaError;
use crate::resolver::{DEFAULT_ENRICHMENT_WORKERS, EnrichmentPolicy, ResolverOptions};
use crate::transport::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS};

pub const CONFIG_FILE: &str = "kira-taxa.json";
pub const API_KEY_ENV: &str = "UBIO_API_KEY";
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8080/phylows/";

/// On-disk shape of `kira-taxa.json`. Every field is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub service_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub enrichment_workers: Option<usize>,
    #[serde(default)]
    pub enrichment_policy: Option<EnrichmentPolicy>,
    #[serde(default)]
    pub authority: Option<AuthorityUrls>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub source: Option<Utf8PathBuf>,
    pub service_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: usize,
    pub enrichment_workers: usize,
    pub enrichment_policy: EnrichmentPolicy,
    pub authority: AuthorityUrls,
}

impl ResolvedConfig {
    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            api_key: self.api_key.clone(),
            workers: self.enrichment_workers,
            policy: self.enrichment_policy,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, else `./kira-taxa.json`, else the user config directory,
    /// else defaults. `UBIO_API_KEY` wins over any file value.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, TaxaError> {
        let env_key = std::env::var(API_KEY_ENV).ok();
        Self::resolve_with_env(path, env_key)
    }

    pub fn resolve_with_env(
        path: Option<&str>,
        env_key: Option<String>,
    ) -> Result<ResolvedConfig, TaxaError> {
        let located = match path {
            Some(path) => {
                let path = Utf8PathBuf::from(path);
                if !path.as_std_path().exists() {
                    return Err(TaxaError::ConfigNotFound(path));
                }
                Some(path)
            }
            None => Self::discover(),
        };

        let config = match &located {
            Some(path) => Self::read(path)?,
            None => Config::default(),
        };
        let mut resolved = Self::resolve_config(config)?;
        resolved.source = located;
        if let Some(key) = env_key.filter(|key| !key.trim().is_empty()) {
            resolved.api_key = Some(key.trim().to_string());
        }
        Ok(resolved)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, TaxaError> {
        let service_url = config
            .service_url
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string());
        url::Url::parse(&service_url)
            .map_err(|err| TaxaError::InvalidConfig(format!("service_url {service_url}: {err}")))?;

        let timeout_secs = config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(TaxaError::InvalidConfig(
                "timeout_secs must be positive".to_string(),
            ));
        }
        let enrichment_workers = config
            .enrichment_workers
            .unwrap_or(DEFAULT_ENRICHMENT_WORKERS);
        if enrichment_workers == 0 {
            return Err(TaxaError::InvalidConfig(
                "enrichment_workers must be at least 1".to_string(),
            ));
        }

        let authority = config.authority.unwrap_or_default();
        authority.validate()?;

        Ok(ResolvedConfig {
            source: None,
            service_url,
            api_key: config
                .api_key
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            timeout: Duration::from_secs(timeout_secs),
            max_retries: config.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            enrichment_workers,
            enrichment_policy: config.enrichment_policy.unwrap_or_default(),
            authority,
        })
    }

    fn read(path: &Utf8Path) -> Result<Config, TaxaError> {
        let content =
            fs::read_to_string(path).map_err(|_| TaxaError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| TaxaError::ConfigParse(err.to_string()))
    }

    fn discover() -> Option<Utf8PathBuf> {
        let local = Utf8PathBuf::from(CONFIG_FILE);
        if local.as_std_path().exists() {
            return Some(local);
        }
        ProjectDirs::from("", "", "kira-taxa")
            .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.config_dir().join("config.json")).ok())
            .filter(|path| path.as_std_path().exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.service_url, DEFAULT_SERVICE_URL);
        assert_eq!(resolved.api_key, None);
        assert_eq!(resolved.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(resolved.enrichment_workers, DEFAULT_ENRICHMENT_WORKERS);
        assert_eq!(resolved.enrichment_policy, EnrichmentPolicy::Abort);
        assert_eq!(resolved.authority, AuthorityUrls::default());
    }

    #[test]
    fn blank_api_key_is_absent() {
        let config = Config {
            api_key: Some("   ".to_string()),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.api_key, None);
    }
}
