//! # Connection Configuration
//!
//! Resolves and persists the `{baseUrl, token, fullUrl}` triplet used to build
//! endpoint URLs of the form `{baseUrl}/{token}/{resource}`.
//!
//! ## Storage Keys
//!
//! - `apiConfig`: JSON object `{"baseUrl": ..., "token": ...}`
//! - `discountApiUrl`: literal override URL for the primary resource
//!
//! Both keys are independently settable and clearable. When nothing is
//! persisted, the build-time [`Defaults`] apply.
//!
//! ## Environment Configuration
//!
//! - `DISKON_API_BASE_URL`: default base URL, e.g. `https://host/api`
//! - `DISKON_API_DEFAULT_TOKEN`: default token segment

use std::sync::Arc;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::ApiResult;
use crate::models::ApiConfig;
use crate::storage::KeyValueStore;

/// Resource addressed by the override URL
pub const PRIMARY_RESOURCE: &str = "diskon";

const CONFIG_KEY: &str = "apiConfig";
const FULL_URL_KEY: &str = "discountApiUrl";

/// Deployment-supplied fallback connection settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Defaults {
    pub base_url: String,
    pub token: String,
}

impl Defaults {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Reads `DISKON_API_BASE_URL` and `DISKON_API_DEFAULT_TOKEN`; unset
    /// variables become empty strings.
    pub fn from_env() -> Self {
        let base_url = std::env::var("DISKON_API_BASE_URL").unwrap_or_default();
        let token = std::env::var("DISKON_API_DEFAULT_TOKEN").unwrap_or_default();

        let defaults = Self { base_url, token };
        for var in defaults.missing() {
            warn!("{} not set - composed URLs will be incomplete until it is configured", var);
        }

        defaults
    }

    /// Environment variables whose value is empty
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.base_url.is_empty() {
            missing.push("DISKON_API_BASE_URL");
        }
        if self.token.is_empty() {
            missing.push("DISKON_API_DEFAULT_TOKEN");
        }
        missing
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedConfig {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

/// Owner of persisted connection settings
pub struct ConfigStore {
    storage: Arc<dyn KeyValueStore>,
    defaults: Defaults,
    base_url: String,
    token: String,
    full_url: Option<String>,
}

impl ConfigStore {
    /// Builds the store and loads the active configuration
    pub async fn new(storage: Arc<dyn KeyValueStore>, defaults: Defaults) -> ApiResult<Self> {
        let mut store = Self {
            storage,
            defaults,
            base_url: String::new(),
            token: String::new(),
            full_url: None,
        };
        store.load().await?;
        Ok(store)
    }

    /// Reads persisted settings, falling back to defaults for anything absent.
    ///
    /// A missing or unreadable `apiConfig` entry is not an error.
    pub async fn load(&mut self) -> ApiResult<()> {
        let persisted = match self.storage.get(CONFIG_KEY).await? {
            Some(raw) => match serde_json::from_str::<PersistedConfig>(&raw) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Ignoring malformed {} entry: {}", CONFIG_KEY, e);
                    None
                }
            },
            None => None,
        };

        let (base_url, token) = match persisted {
            Some(config) => (config.base_url, config.token),
            None => (None, None),
        };

        self.base_url = base_url
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.defaults.base_url.clone());
        self.token = token
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.defaults.token.clone());
        self.full_url = self
            .storage
            .get(FULL_URL_KEY)
            .await?
            .filter(|s| !s.is_empty());

        debug!(
            "Loaded API config: base_url={} override={}",
            self.base_url,
            self.full_url.is_some()
        );
        Ok(())
    }

    /// Persists a base URL and token, then reloads
    pub async fn save(&mut self, base_url: &str, token: &str) -> ApiResult<()> {
        let config = PersistedConfig {
            base_url: Some(base_url.to_string()),
            token: Some(token.to_string()),
        };
        let raw = serde_json::to_string(&config)
            .map_err(|e| crate::error::ApiError::Storage(e.to_string()))?;

        self.storage.set(CONFIG_KEY, &raw).await?;
        info!("Saved API config for base URL {}", base_url);

        self.load().await
    }

    /// Persists an override URL for the primary resource.
    ///
    /// If the URL path carries a token as its second segment
    /// (`/{root}/{token}/...`), it is saved together with the default base
    /// URL so composed URLs for other resources use the same token.
    pub async fn set_full_url(&mut self, url: &str) -> ApiResult<()> {
        self.storage.set(FULL_URL_KEY, url).await?;
        info!("Saved override URL {}", url);

        if let Some(token) = Self::extract_token(url) {
            let base_url = self.defaults.base_url.clone();
            self.save(&base_url, &token).await?;
        }

        self.load().await
    }

    /// Clears everything persisted, reverting to defaults
    pub async fn reset(&mut self) -> ApiResult<()> {
        self.storage.remove(CONFIG_KEY).await?;
        self.storage.remove(FULL_URL_KEY).await?;
        info!("API config reset to defaults");

        self.load().await
    }

    /// URL for `resource`: the override for the primary resource when set,
    /// otherwise `{baseUrl}/{token}/{resource}`.
    pub async fn resolve_endpoint_url(&mut self, resource: &str) -> ApiResult<String> {
        self.ensure_loaded().await?;

        if resource == PRIMARY_RESOURCE
            && let Some(full_url) = &self.full_url
        {
            return Ok(full_url.clone());
        }

        Ok(self.compose(resource))
    }

    /// Composed URL ignoring any override
    pub async fn composed_url(&mut self, resource: &str) -> ApiResult<String> {
        self.ensure_loaded().await?;
        Ok(self.compose(resource))
    }

    pub fn get_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            full_url: self.full_url.clone(),
        }
    }

    /// Token segment of `/{root}/{token}/...`, or `None` if the URL does not
    /// parse or the path is too short.
    pub fn extract_token(url: &str) -> Option<String> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("Error extracting token from {}: {}", url, e);
                return None;
            }
        };

        let parts: Vec<&str> = parsed.path().split('/').collect();
        parts
            .get(2)
            .filter(|token| !token.is_empty())
            .map(|token| (*token).to_string())
    }

    async fn ensure_loaded(&mut self) -> ApiResult<()> {
        if self.base_url.is_empty() || self.token.is_empty() {
            self.load().await?;
        }
        Ok(())
    }

    fn compose(&self, resource: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.token,
            resource
        )
    }
}
