use super::client::Category;
use crate::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Environment variable holding the 1Password service account token.
pub const ENV_SERVICE_ACCOUNT_TOKEN: &str = "OP_SERVICE_ACCOUNT_TOKEN";

/// Integration name reported to 1Password unless configured otherwise.
pub const DEFAULT_INTEGRATION_NAME: &str = "opvault-onepassword";

/// Integration version reported to 1Password unless configured otherwise.
pub const DEFAULT_INTEGRATION_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration for the 1Password provider.
///
/// # Examples
///
/// ```
/// use opvault::provider::onepassword::OnePasswordConfig;
///
/// let config = OnePasswordConfig {
///     service_account_token: Some("ops_...".to_string()),
///     default_vault_name: Some("Private".to_string()),
///     ..Default::default()
/// };
/// assert_eq!(config.default_vault(), Some("Private"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnePasswordConfig {
    /// Service account token. Falls back to `OP_SERVICE_ACCOUNT_TOKEN`.
    #[serde(skip_serializing)]
    pub service_account_token: Option<String>,
    /// Optional account shorthand (for multiple accounts)
    pub account: Option<String>,
    pub integration_name: String,
    pub integration_version: String,
    /// Vault used when a path names none; wins over `default_vault_name`
    pub default_vault_id: Option<String>,
    /// Vault used when a path names none
    pub default_vault_name: Option<String>,
    /// Category of items created by `set`
    pub default_category: Category,
    /// How long resolved IDs stay cached; `None` or `0` caches forever
    pub cache_ttl_secs: Option<u64>,
}

impl Default for OnePasswordConfig {
    fn default() -> Self {
        Self {
            service_account_token: None,
            account: None,
            integration_name: DEFAULT_INTEGRATION_NAME.to_string(),
            integration_version: DEFAULT_INTEGRATION_VERSION.to_string(),
            default_vault_id: None,
            default_vault_name: None,
            default_category: Category::SecureNote,
            cache_ttl_secs: None,
        }
    }
}

impl OnePasswordConfig {
    /// The vault used for paths that do not name one.
    pub fn default_vault(&self) -> Option<&str> {
        self.default_vault_id
            .as_deref()
            .filter(|v| !v.is_empty())
            .or_else(|| self.default_vault_name.as_deref().filter(|v| !v.is_empty()))
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// The configured token, or the one from the environment.
    pub(crate) fn resolve_token(&self) -> Result<String> {
        self.service_account_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| {
                std::env::var(ENV_SERVICE_ACCOUNT_TOKEN)
                    .ok()
                    .filter(|t| !t.is_empty())
            })
            .ok_or_else(|| {
                VaultError::Config(format!(
                    "service account token is required: set service_account_token or the {} environment variable",
                    ENV_SERVICE_ACCOUNT_TOKEN
                ))
            })
    }
}

impl TryFrom<&Url> for OnePasswordConfig {
    type Error = VaultError;

    /// Creates a config from a provider URL.
    ///
    /// - `onepassword://Private`: default vault name
    /// - `onepassword://work@Private`: account shorthand and default vault
    /// - `onepassword+token://:ops_abc@Private`: inline service account token
    /// - `?vault_id=...&category=login&cache_ttl=300`: remaining options
    fn try_from(url: &Url) -> std::result::Result<Self, Self::Error> {
        let scheme = url.scheme();
        if scheme != "onepassword" && scheme != "onepassword+token" {
            return Err(VaultError::ProviderOperationFailed(format!(
                "Invalid scheme '{}' for onepassword provider",
                scheme
            )));
        }

        let mut config = Self::default();

        if !url.username().is_empty() {
            config.account = Some(url.username().to_string());
        }
        if let Some(password) = url.password() {
            config.service_account_token = Some(password.to_string());
        }
        if scheme == "onepassword+token" && config.service_account_token.is_none() {
            return Err(VaultError::ProviderOperationFailed(
                "onepassword+token requires a token, e.g. onepassword+token://:ops_abc@Private"
                    .to_string(),
            ));
        }

        if let Some(host) = url.host_str().filter(|h| !h.is_empty()) {
            config.default_vault_name = Some(host.to_string());
        } else if url.path() != "/" && !url.path().is_empty() {
            config.default_vault_name = Some(url.path().trim_start_matches('/').to_string());
        }

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "vault_id" => config.default_vault_id = Some(value.to_string()),
                "category" => {
                    config.default_category = value
                        .parse()
                        .map_err(VaultError::ProviderOperationFailed)?;
                }
                "cache_ttl" => {
                    let secs = value.parse::<u64>().map_err(|e| {
                        VaultError::ProviderOperationFailed(format!(
                            "Invalid cache_ttl '{}': {}",
                            value, e
                        ))
                    })?;
                    config.cache_ttl_secs = Some(secs);
                }
                "integration_name" => config.integration_name = value.to_string(),
                _ => {}
            }
        }

        Ok(config)
    }
}
