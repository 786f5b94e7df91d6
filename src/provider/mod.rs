//! # Provider System
//!
//! Providers put a uniform "path in, secret out" contract in front of a
//! secret store. Callers read, write, list and delete secrets through the
//! [`Provider`] trait and never see the backend's own API.
//!
//! ## Available Providers
//!
//! - [`OnePasswordProvider`]: 1Password via a service account
//!
//! ## URI-Based Configuration
//!
//! Providers are created from URIs:
//!
//! ```text
//! onepassword://Private
//! onepassword://work@Production
//! onepassword+token://:ops_...@Private?cache_ttl=300
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use opvault::provider::Provider;
//! use std::convert::TryFrom;
//!
//! # fn main() -> opvault::Result<()> {
//! // Create a provider from a URI string
//! let provider = Box::<dyn Provider>::try_from("onepassword://Private")?;
//!
//! // Read a whole item, or a single field of it
//! let secret = provider.get("Private/database")?;
//! let user = provider.get("Private/database/username")?;
//! println!("{} ({} fields)", user.value, secret.fields.len());
//! # Ok(())
//! # }
//! ```

use crate::{Result, VaultError};
use opvault_core::{Capabilities, Secret};
use std::collections::HashMap;
use std::convert::TryFrom;
use url::Url;

pub mod onepassword;
#[macro_use]
pub mod macros;


pub use onepassword::{OnePasswordConfig, OnePasswordProvider};

/// Information about a secret storage provider.
///
/// Contains metadata used for displaying available providers to users,
/// including the provider's name, description, and example URIs.
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    /// The canonical name of the provider (e.g., "onepassword").
    pub name: &'static str,
    /// A human-readable description of what the provider does.
    pub description: &'static str,
    /// Example URIs showing how to configure this provider.
    pub examples: &'static [&'static str],
}

impl ProviderInfo {
    /// Formats the provider information for display, including examples if available.
    ///
    /// - Without examples: "name: description"
    /// - With examples: "name: description (e.g., example1, example2)"
    pub fn display_with_examples(&self) -> String {
        if self.examples.is_empty() {
            format!("{}: {}", self.name, self.description)
        } else {
            format!(
                "{}: {} (e.g., {})",
                self.name,
                self.description,
                self.examples.join(", ")
            )
        }
    }
}

/// Macro support types
pub use macros::{PROVIDER_REGISTRY, ProviderRegistration};
pub(crate) use macros::register_provider;

/// Returns a list of all available providers with their metadata.
pub fn providers() -> Vec<ProviderInfo> {
    PROVIDER_REGISTRY
        .iter()
        .map(|reg| reg.info.clone())
        .collect()
}

/// Trait defining the interface for secret storage providers.
///
/// # Thread Safety
///
/// Providers must be `Send + Sync`; one instance is shared by every caller.
///
/// # Errors
///
/// Failures are reported as [`VaultError`] variants carrying the operation
/// and the request path. Once [`close`](Provider::close) has been called,
/// every operation fails with [`VaultError::Closed`].
pub trait Provider: Send + Sync {
    /// Retrieves the secret stored at `path`.
    fn get(&self, path: &str) -> Result<Secret>;

    /// Stores `secret` at `path`, creating or updating as needed.
    fn set(&self, path: &str, secret: &Secret) -> Result<()>;

    /// Removes the secret at `path`. Removing something absent succeeds.
    fn delete(&self, path: &str) -> Result<()>;

    /// Whether a secret exists at `path`.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Paths of all secrets starting with `prefix`; an empty prefix lists everything.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Reads several paths at once.
    ///
    /// Paths that cannot be read are left out of the result; the call only
    /// fails as a whole when the provider is closed.
    fn get_batch(&self, paths: &[&str]) -> Result<HashMap<String, Secret>> {
        let mut secrets = HashMap::with_capacity(paths.len());
        for path in paths {
            match self.get(path) {
                Ok(secret) => {
                    secrets.insert(path.to_string(), secret);
                }
                Err(e @ VaultError::Closed { .. }) => return Err(e),
                Err(_) => {}
            }
        }
        Ok(secrets)
    }

    /// Stores every entry, returning the last error encountered.
    fn set_batch(&self, secrets: &HashMap<String, Secret>) -> Result<()> {
        let mut last_err = None;
        for (path, secret) in secrets {
            if let Err(e) = self.set(path, secret) {
                last_err = Some(e);
            }
        }
        last_err.map_or(Ok(()), Err)
    }

    /// Deletes every path, returning the last error encountered.
    fn delete_batch(&self, paths: &[&str]) -> Result<()> {
        let mut last_err = None;
        for path in paths {
            if let Err(e) = self.delete(path) {
                last_err = Some(e);
            }
        }
        last_err.map_or(Ok(()), Err)
    }

    /// Returns the name of this provider.
    ///
    /// This should match the name registered with the provider macro.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Releases the provider. Calling it again is a no-op.
    fn close(&self) -> Result<()>;
}

impl TryFrom<String> for Box<dyn Provider> {
    type Error = VaultError;

    fn try_from(s: String) -> Result<Self> {
        Self::try_from(&s as &str)
    }
}

impl TryFrom<&str> for Box<dyn Provider> {
    type Error = VaultError;

    /// Creates a provider instance from a URI string.
    ///
    /// # URI Formats
    ///
    /// - **Full URI**: `scheme://authority/path` (e.g., `onepassword://work@Production`)
    /// - **Bare provider name**: `onepassword`, treated as `onepassword://`
    ///
    /// The `1password` scheme is rejected with a hint to use `onepassword`.
    fn try_from(s: &str) -> Result<Self> {
        // Parse the scheme from the input string
        let (scheme, rest) = match s.split_once(':') {
            Some((scheme, rest)) => (scheme, rest),
            // Just a provider name, no URI components
            None => (s, ""),
        };

        // Validate scheme first
        if scheme == "1password" || scheme == "1password+token" {
            return Err(VaultError::ProviderOperationFailed(
                "Invalid scheme '1password'. Use 'onepassword' instead (e.g., onepassword://Private)".to_string(),
            ));
        }

        if !PROVIDER_REGISTRY
            .iter()
            .any(|reg| reg.schemes.contains(&scheme))
        {
            return Err(VaultError::ProviderNotFound(scheme.to_string()));
        }

        // Build a proper URL with the correct scheme
        let url_string = match rest {
            "" | ":" => format!("{}://", scheme),
            s if s.starts_with("//") => format!("{}:{}", scheme, s),
            s => format!("{}://{}", scheme, s.trim_start_matches('/')),
        };

        let proper_url = Url::parse(&url_string).map_err(|e| {
            VaultError::ProviderOperationFailed(format!(
                "Invalid provider specification '{}': {}",
                s, e
            ))
        })?;

        Self::try_from(&proper_url)
    }
}

impl TryFrom<&Url> for Box<dyn Provider> {
    type Error = VaultError;

    fn try_from(url: &Url) -> Result<Self> {
        let scheme = url.scheme();

        // Find the provider registration for this scheme
        let registration = PROVIDER_REGISTRY
            .iter()
            .find(|reg| reg.schemes.contains(&scheme))
            .ok_or_else(|| VaultError::ProviderNotFound(scheme.to_string()))?;

        (registration.factory)(url)
    }
}
