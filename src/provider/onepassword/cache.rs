//! Name to ID resolution for vaults and items.
//!
//! 1Password has no lookup-by-name, only enumeration. A miss lists every
//! vault (or every item of one vault) and remembers all of them, so later
//! lookups against the same vault are answered locally. IDs are cached as
//! their own names, which makes resolving an already resolved ID free.

use super::client::{BackendError, BackendResult, OnePasswordClient};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    cached_at: Instant,
}

impl Entry {
    fn new(id: &str, cached_at: Instant) -> Self {
        Self {
            id: id.to_string(),
            cached_at,
        }
    }
}

/// Vault and item ID cache owned by one provider.
#[derive(Debug, Default)]
pub(crate) struct IdCache {
    vaults: RwLock<HashMap<String, Entry>>,
    /// Keyed by `(vault_id, item name or ID)`
    items: RwLock<HashMap<(String, String), Entry>>,
    /// Entries older than this are ignored; `None` keeps entries forever
    ttl: Option<Duration>,
}

impl IdCache {
    /// A zero `ttl` is the same as none.
    pub(crate) fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl: ttl.filter(|t| !t.is_zero()),
            ..Default::default()
        }
    }

    /// Resolves a vault name or ID to the vault ID.
    pub(crate) fn vault_id(
        &self,
        client: &dyn OnePasswordClient,
        name_or_id: &str,
    ) -> BackendResult<String> {
        if name_or_id.is_empty() {
            return Err(BackendError::Message(
                "vault name or ID is required".to_string(),
            ));
        }

        if let Some(id) = self.cached(&read(&self.vaults), name_or_id) {
            debug!(vault = %name_or_id, "vault ID cache hit");
            return Ok(id);
        }

        debug!(vault = %name_or_id, "vault ID cache miss, listing vaults");
        let now = Instant::now();
        let mut found = None;
        let mut listed = HashMap::new();
        for vault in client.list_vaults()? {
            if found.is_none() && (vault.id == name_or_id || vault.name == name_or_id) {
                found = Some(vault.id.clone());
            }
            listed
                .entry(vault.name.clone())
                .or_insert_with(|| Entry::new(&vault.id, now));
            listed.insert(vault.id.clone(), Entry::new(&vault.id, now));
        }
        write(&self.vaults).extend(listed);

        found.ok_or_else(|| BackendError::Message(format!("vault not found: {}", name_or_id)))
    }

    /// Resolves an item title or ID within `vault_id` to the item ID.
    pub(crate) fn item_id(
        &self,
        client: &dyn OnePasswordClient,
        vault_id: &str,
        name_or_id: &str,
    ) -> BackendResult<String> {
        if name_or_id.is_empty() {
            return Err(BackendError::Message(
                "item name or ID is required".to_string(),
            ));
        }

        let key = (vault_id.to_string(), name_or_id.to_string());
        if let Some(entry) = read(&self.items).get(&key) {
            if self.is_fresh(entry) {
                debug!(vault_id = %vault_id, item = %name_or_id, "item ID cache hit");
                return Ok(entry.id.clone());
            }
        }

        debug!(vault_id = %vault_id, item = %name_or_id, "item ID cache miss, listing items");
        let now = Instant::now();
        let mut found = None;
        let mut listed = HashMap::new();
        for item in client.list_items(vault_id)? {
            if found.is_none() && (item.id == name_or_id || item.title == name_or_id) {
                found = Some(item.id.clone());
            }
            listed
                .entry((vault_id.to_string(), item.title.clone()))
                .or_insert_with(|| Entry::new(&item.id, now));
            listed.insert(
                (vault_id.to_string(), item.id.clone()),
                Entry::new(&item.id, now),
            );
        }
        write(&self.items).extend(listed);

        found.ok_or_else(|| BackendError::Message(format!("item not found: {}", name_or_id)))
    }

    pub(crate) fn remember_vault(&self, name: &str, id: &str) {
        let now = Instant::now();
        let mut vaults = write(&self.vaults);
        vaults.insert(name.to_string(), Entry::new(id, now));
        vaults.insert(id.to_string(), Entry::new(id, now));
    }

    pub(crate) fn remember_item(&self, vault_id: &str, title: &str, id: &str) {
        let now = Instant::now();
        let mut items = write(&self.items);
        items.insert((vault_id.to_string(), title.to_string()), Entry::new(id, now));
        items.insert((vault_id.to_string(), id.to_string()), Entry::new(id, now));
    }

    /// Drops every cached name of the item `name_or_id` refers to in `vault_id`.
    pub(crate) fn forget_item(&self, vault_id: &str, name_or_id: &str) {
        let mut items = write(&self.items);
        let id = items
            .get(&(vault_id.to_string(), name_or_id.to_string()))
            .map(|e| e.id.clone())
            .unwrap_or_else(|| name_or_id.to_string());

        items.retain(|(vault, name), entry| {
            vault != vault_id || (entry.id != id && name != name_or_id)
        });
        debug!(vault_id = %vault_id, item = %name_or_id, "invalidated item ID");
    }

    pub(crate) fn clear(&self) {
        write(&self.vaults).clear();
        write(&self.items).clear();
        debug!("cleared ID cache");
    }

    fn cached(&self, map: &HashMap<String, Entry>, key: &str) -> Option<String> {
        map.get(key)
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| entry.id.clone())
    }

    fn is_fresh(&self, entry: &Entry) -> bool {
        self.ttl.is_none_or(|ttl| entry.cached_at.elapsed() < ttl)
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
