//! 1Password provider.
//!
//! Secrets are addressed as `vault/item[/field]`, `item[/field]` against the
//! configured default vault, or as native `op://vault/item/[section/]field`
//! references. Reads of a single field go straight to the backend's reference
//! resolver. Everything else resolves vault and item names to IDs through a
//! per-provider cache and works on whole items.
//!
//! The backend is reached through [`OnePasswordClient`]. [`OpCli`] drives the
//! `op` command line tool; [`MemoryClient`] keeps everything in memory.

use crate::provider::Provider;
use crate::{Result, VaultError};
use opvault_core::{Capabilities, Metadata, Secret};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

mod cache;
mod cli;
mod client;
mod config;
mod convert;
mod errors;
mod memory;
mod path;

#[cfg(test)]
mod tests;

pub use cli::OpCli;
pub use client::{
    BackendError, BackendResult, Category, FieldType, Item, ItemCreateParams, ItemField,
    ItemOverview, OnePasswordClient, VaultOverview,
};
pub use config::{
    DEFAULT_INTEGRATION_NAME, DEFAULT_INTEGRATION_VERSION, ENV_SERVICE_ACCOUNT_TOKEN,
    OnePasswordConfig,
};
pub use convert::{infer_field_type, sanitize_id};
pub use memory::MemoryClient;
pub use path::{ParsedPath, PathError, REFERENCE_PREFIX, parse};

use cache::IdCache;
use errors::{is_not_found, map_error};

/// Name reported by [`OnePasswordProvider`] and stamped into secret metadata.
pub const PROVIDER_NAME: &str = "onepassword";

/// Outcome of [`OnePasswordProvider::get_batch_detailed`].
#[derive(Debug, Default)]
pub struct BatchResult {
    /// Secrets that were read, keyed by request path
    pub secrets: HashMap<String, Secret>,
    /// Why each remaining path failed, keyed by request path
    pub errors: HashMap<String, VaultError>,
}

/// Provider backed by 1Password.
pub struct OnePasswordProvider {
    client: Arc<dyn OnePasswordClient>,
    config: OnePasswordConfig,
    cache: IdCache,
    closed: RwLock<bool>,
}

crate::provider::register_provider! {
    struct: OnePasswordProvider,
    config: OnePasswordConfig,
    name: PROVIDER_NAME,
    description: "1Password via service account",
    schemes: ["onepassword", "onepassword+token"],
    examples: [
        "onepassword://Private",
        "onepassword://work@Production",
        "onepassword+token://:ops_...@Private"
    ],
}

impl OnePasswordProvider {
    /// Creates a provider that talks to 1Password through the `op` CLI.
    ///
    /// Fails when no service account token is configured or present in
    /// `OP_SERVICE_ACCOUNT_TOKEN`.
    pub fn new(config: OnePasswordConfig) -> Result<Self> {
        let token = config.resolve_token()?;
        let client = OpCli::new(
            token,
            config.account.clone(),
            config.integration_name.clone(),
            config.integration_version.clone(),
        );
        Self::with_client(config, Arc::new(client))
    }

    /// Creates a provider over an existing client.
    pub fn with_client(
        config: OnePasswordConfig,
        client: Arc<dyn OnePasswordClient>,
    ) -> Result<Self> {
        config.resolve_token()?;
        Ok(Self {
            client,
            cache: IdCache::new(config.cache_ttl()),
            config,
            closed: RwLock::new(false),
        })
    }

    pub fn config(&self) -> &OnePasswordConfig {
        &self.config
    }

    /// Reads every path, reporting the failure of each path that could not be read.
    ///
    /// Only fails as a whole when the provider is closed.
    pub fn get_batch_detailed(&self, paths: &[&str]) -> Result<BatchResult> {
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(VaultError::closed("GetBatch", paths.join(",")));
        }

        let mut result = BatchResult::default();
        for path in paths {
            match self.get_unlocked(path) {
                Ok(secret) => {
                    result.secrets.insert(path.to_string(), secret);
                }
                Err(e) => {
                    debug!(path = %path, error = %e, "batch read failed");
                    result.errors.insert(path.to_string(), e);
                }
            }
        }
        Ok(result)
    }

    fn parse(&self, operation: &'static str, path: &str) -> Result<ParsedPath> {
        parse(path, self.config.default_vault())
            .map_err(|e| VaultError::invalid_path(operation, path, e))
    }

    fn get_unlocked(&self, path: &str) -> Result<Secret> {
        let parsed = self.parse("Get", path)?;
        let canonical = parsed.to_string();
        debug!(path = %canonical, "get");

        if parsed.field.is_some() {
            let value = self
                .client
                .resolve(&parsed.secret_reference())
                .map_err(|e| map_error("Get", &canonical, e))?;
            return Ok(Secret {
                value,
                fields: HashMap::new(),
                metadata: Metadata {
                    provider: PROVIDER_NAME.to_string(),
                    path: canonical,
                    ..Default::default()
                },
            });
        }

        let item = self
            .cache
            .vault_id(&*self.client, &parsed.vault)
            .and_then(|vault_id| {
                let item_id = self.cache.item_id(&*self.client, &vault_id, &parsed.item)?;
                self.client.get_item(&vault_id, &item_id)
            })
            .map_err(|e| map_error("Get", &canonical, e))?;

        Ok(convert::item_to_secret(&item, &canonical))
    }

    fn set_unlocked(&self, path: &str, secret: &Secret) -> Result<()> {
        let parsed = self.parse("Set", path)?;
        let canonical = parsed.to_string();
        debug!(path = %canonical, "set");

        // Vaults are never created here
        let vault_id = self
            .cache
            .vault_id(&*self.client, &parsed.vault)
            .map_err(|e| map_error("Set", &canonical, e))?;

        match self.cache.item_id(&*self.client, &vault_id, &parsed.item) {
            Ok(item_id) => match self.client.get_item(&vault_id, &item_id) {
                Ok(item) => self.update_item(item, &parsed, secret, &canonical),
                Err(e) if is_not_found(&e) => {
                    debug!(path = %canonical, "cached item is gone, creating it");
                    self.cache.forget_item(&vault_id, &parsed.item);
                    self.create_item(&vault_id, &parsed, secret, &canonical)
                }
                Err(e) => Err(map_error("Set", &canonical, e)),
            },
            Err(e) if is_not_found(&e) => self.create_item(&vault_id, &parsed, secret, &canonical),
            Err(e) => Err(map_error("Set", &canonical, e)),
        }
    }

    fn create_item(
        &self,
        vault_id: &str,
        parsed: &ParsedPath,
        secret: &Secret,
        canonical: &str,
    ) -> Result<()> {
        let params = ItemCreateParams {
            vault_id: vault_id.to_string(),
            title: parsed.item.clone(),
            category: self.config.default_category,
            fields: convert::secret_to_fields(secret, parsed.field.as_deref()),
            tags: convert::tags_to_strings(&secret.metadata.tags),
        };

        let item = self
            .client
            .create_item(&params)
            .map_err(|e| map_error("Set", canonical, e))?;
        self.cache.remember_item(vault_id, &parsed.item, &item.id);
        debug!(path = %canonical, "created item");
        Ok(())
    }

    fn update_item(
        &self,
        mut item: Item,
        parsed: &ParsedPath,
        secret: &Secret,
        canonical: &str,
    ) -> Result<()> {
        match parsed.field.as_deref() {
            Some(name) => {
                match item
                    .fields
                    .iter_mut()
                    .find(|f| f.title == name || f.id == name)
                {
                    Some(field) => field.value = secret.value.clone(),
                    None => item.fields.push(ItemField::new(
                        sanitize_id(name),
                        name,
                        FieldType::Concealed,
                        secret.value.clone(),
                    )),
                }
            }
            None => item.fields = convert::secret_to_fields(secret, None),
        }

        if !secret.metadata.tags.is_empty() {
            item.tags = convert::tags_to_strings(&secret.metadata.tags);
        }

        self.client
            .update_item(&item)
            .map_err(|e| map_error("Set", canonical, e))?;
        debug!(path = %canonical, "updated item");
        Ok(())
    }

    fn delete_unlocked(&self, path: &str) -> Result<()> {
        let parsed = self.parse("Delete", path)?;
        let canonical = parsed.to_string();
        debug!(path = %canonical, "delete");

        let vault_id = match self.cache.vault_id(&*self.client, &parsed.vault) {
            Ok(id) => id,
            Err(e) if is_not_found(&e) => return Ok(()),
            Err(e) => return Err(map_error("Delete", &canonical, e)),
        };
        let item_id = match self.cache.item_id(&*self.client, &vault_id, &parsed.item) {
            Ok(id) => id,
            Err(e) if is_not_found(&e) => return Ok(()),
            Err(e) => return Err(map_error("Delete", &canonical, e)),
        };

        match self.client.delete_item(&vault_id, &item_id) {
            Ok(()) => {}
            Err(e) if is_not_found(&e) => {}
            Err(e) => return Err(map_error("Delete", &canonical, e)),
        }
        self.cache.forget_item(&vault_id, &parsed.item);
        Ok(())
    }

    fn exists_unlocked(&self, path: &str) -> Result<bool> {
        let parsed = self.parse("Exists", path)?;
        let canonical = parsed.to_string();

        let resolved = self
            .cache
            .vault_id(&*self.client, &parsed.vault)
            .and_then(|vault_id| self.cache.item_id(&*self.client, &vault_id, &parsed.item));

        match resolved {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(map_error("Exists", &canonical, e)),
        }
    }

    fn list_unlocked(&self, prefix: &str) -> Result<Vec<String>> {
        debug!(prefix = %prefix, "list");
        let vaults = self
            .client
            .list_vaults()
            .map_err(|e| map_error("List", prefix, e))?;

        let mut results = Vec::new();
        for vault in vaults {
            if !prefix.is_empty()
                && !vault.name.starts_with(prefix)
                && !prefix.starts_with(&format!("{}/", vault.name))
            {
                continue;
            }

            let items = match self.client.list_items(&vault.id) {
                Ok(items) => items,
                Err(e) => {
                    warn!(vault = %vault.name, error = %e, "skipping vault that cannot be listed");
                    continue;
                }
            };

            results.extend(
                items
                    .iter()
                    .map(|item| format!("{}/{}", vault.name, item.title))
                    .filter(|path| path.starts_with(prefix)),
            );
            self.cache.remember_vault(&vault.name, &vault.id);
        }

        Ok(results)
    }
}

impl Provider for OnePasswordProvider {
    fn get(&self, path: &str) -> Result<Secret> {
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(VaultError::closed("Get", path));
        }
        self.get_unlocked(path)
    }

    fn set(&self, path: &str, secret: &Secret) -> Result<()> {
        let closed = self.closed.write().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(VaultError::closed("Set", path));
        }
        self.set_unlocked(path, secret)
    }

    fn delete(&self, path: &str) -> Result<()> {
        let closed = self.closed.write().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(VaultError::closed("Delete", path));
        }
        self.delete_unlocked(path)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(VaultError::closed("Exists", path));
        }
        self.exists_unlocked(path)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(VaultError::closed("List", prefix));
        }
        self.list_unlocked(prefix)
    }

    fn get_batch(&self, paths: &[&str]) -> Result<HashMap<String, Secret>> {
        Ok(self.get_batch_detailed(paths)?.secrets)
    }

    fn set_batch(&self, secrets: &HashMap<String, Secret>) -> Result<()> {
        let closed = self.closed.write().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            let paths: Vec<&str> = secrets.keys().map(String::as_str).collect();
            return Err(VaultError::closed("SetBatch", paths.join(",")));
        }

        let mut last_err = None;
        for (path, secret) in secrets {
            if let Err(e) = self.set_unlocked(path, secret) {
                last_err = Some(e);
            }
        }
        last_err.map_or(Ok(()), Err)
    }

    fn delete_batch(&self, paths: &[&str]) -> Result<()> {
        let closed = self.closed.write().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(VaultError::closed("DeleteBatch", paths.join(",")));
        }

        let mut last_err = None;
        for path in paths {
            if let Err(e) = self.delete_unlocked(path) {
                last_err = Some(e);
            }
        }
        last_err.map_or(Ok(()), Err)
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            read: true,
            write: true,
            delete: true,
            list: true,
            multi_field: true,
            batch: true,
            versioning: false,
            binary: true,
            rotation: false,
        }
    }

    fn close(&self) -> Result<()> {
        let mut closed = self.closed.write().unwrap_or_else(PoisonError::into_inner);
        if !*closed {
            *closed = true;
            self.cache.clear();
            debug!("closed onepassword provider");
        }
        Ok(())
    }
}
