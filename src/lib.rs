//! opvault - Path-addressed access to 1Password secrets
//!
//! This library puts a uniform "path in, secret out" contract in front of
//! 1Password. Callers read, write, list and delete credentials by path and
//! never deal with vault or item IDs.
//!
//! # Features
//!
//! - **Path Grammar**: `vault/item[/field]`, `item[/field]` against a default vault, or native `op://` references
//! - **ID Cache**: vault and item names are resolved once per provider
//! - **Multi-field Secrets**: whole items map to a [`Secret`] with named fields
//! - **Normalized Errors**: not found, access denied and ambiguous matches are told apart
//!
//! # Example
//!
//! ```
//! use opvault::provider::onepassword::{MemoryClient, OnePasswordConfig, OnePasswordProvider};
//! use opvault::provider::Provider;
//! use opvault::Secret;
//! use std::sync::Arc;
//!
//! # fn main() -> opvault::Result<()> {
//! let client = Arc::new(MemoryClient::new());
//! client.add_vault("Private");
//!
//! let config = OnePasswordConfig {
//!     service_account_token: Some("ops_...".to_string()),
//!     ..Default::default()
//! };
//! let provider = OnePasswordProvider::with_client(config, client)?;
//!
//! let secret = Secret::default()
//!     .with_field("username", "admin")
//!     .with_field("password", "hunter2");
//! provider.set("Private/database", &secret)?;
//!
//! assert_eq!(provider.get("Private/database")?.value, "hunter2");
//! assert_eq!(provider.get("Private/database/username")?.value, "admin");
//! assert_eq!(provider.list("Private")?, vec!["Private/database"]);
//! provider.close()?;
//! # Ok(())
//! # }
//! ```

mod error;
pub mod provider;

pub use error::{ErrorKind, Result, VaultError};
pub use opvault_core::{Capabilities, Metadata, Secret};
pub use provider::{OnePasswordConfig, OnePasswordProvider, Provider};
