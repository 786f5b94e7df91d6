//! In-process [`OnePasswordClient`] for tests and offline use.
//!
//! Errors use the same wording as 1Password, so provider behaviour (not
//! found, ambiguous matches, idempotent deletes) can be exercised without a
//! service account.

use super::client::{
    BackendError, BackendResult, Category, FieldType, Item, ItemCreateParams, ItemOverview,
    OnePasswordClient, VaultOverview,
};
use super::convert::{secret_to_fields, tags_to_strings};
use super::path;
use opvault_core::Secret;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

#[derive(Debug)]
struct MemoryVault {
    id: String,
    name: String,
    items: Vec<Item>,
}

#[derive(Debug, Clone)]
enum Failure {
    Message(String),
    Cancelled,
}

/// A thread-safe in-memory 1Password backend.
///
/// ```
/// use opvault::provider::onepassword::{Category, MemoryClient};
/// use opvault::Secret;
///
/// let client = MemoryClient::new();
/// let vault = client.add_vault("Private");
/// client.add_secret(&vault, "github", Category::Login, &Secret::new("token"))?;
/// # Ok::<(), opvault::provider::onepassword::BackendError>(())
/// ```
#[derive(Debug, Default)]
pub struct MemoryClient {
    vaults: RwLock<Vec<MemoryVault>>,
    next_id: AtomicU64,
    vault_lists: AtomicUsize,
    item_lists: AtomicUsize,
    totp_code: RwLock<Option<String>>,
    failure: RwLock<Option<Failure>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a vault and returns its ID.
    pub fn add_vault(&self, name: &str) -> String {
        let id = self.generate_id('v');
        self.write_vaults().push(MemoryVault {
            id: id.clone(),
            name: name.to_string(),
            items: Vec::new(),
        });
        id
    }

    /// Stores `secret` as a new item and returns the item ID.
    ///
    /// Fields are built the same way the provider builds them on `set`.
    pub fn add_secret(
        &self,
        vault_id: &str,
        title: &str,
        category: Category,
        secret: &Secret,
    ) -> BackendResult<String> {
        let params = ItemCreateParams {
            vault_id: vault_id.to_string(),
            title: title.to_string(),
            category,
            fields: secret_to_fields(secret, None),
            tags: tags_to_strings(&secret.metadata.tags),
        };
        self.insert(&params).map(|item| item.id)
    }

    /// Stores a fully specified item and returns it.
    pub fn add_item(&self, params: &ItemCreateParams) -> BackendResult<Item> {
        self.insert(params)
    }

    /// Looks up a stored item by vault name or ID and item title or ID.
    pub fn find_item(&self, vault: &str, item: &str) -> Option<Item> {
        let vaults = self.read_vaults();
        vaults
            .iter()
            .filter(|v| v.id == vault || v.name == vault)
            .flat_map(|v| v.items.iter())
            .find(|i| i.id == item || i.title == item)
            .cloned()
    }

    /// Code reported for every one-time password field from now on.
    pub fn set_totp_code(&self, code: impl Into<String>) {
        *self
            .totp_code
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(code.into());
    }

    /// Makes every following call fail with `message` until [`recover`](Self::recover).
    pub fn fail_with(&self, message: impl Into<String>) {
        self.set_failure(Some(Failure::Message(message.into())));
    }

    /// Makes every following call report a cancellation.
    pub fn fail_cancelled(&self) {
        self.set_failure(Some(Failure::Cancelled));
    }

    pub fn recover(&self) {
        self.set_failure(None);
    }

    /// Number of `list_vaults` calls served so far.
    pub fn vault_list_calls(&self) -> usize {
        self.vault_lists.load(Ordering::SeqCst)
    }

    /// Number of `list_items` calls served so far.
    pub fn item_list_calls(&self) -> usize {
        self.item_lists.load(Ordering::SeqCst)
    }

    fn set_failure(&self, failure: Option<Failure>) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = failure;
    }

    fn check_failure(&self) -> BackendResult<()> {
        let failure = self.failure.read().unwrap_or_else(PoisonError::into_inner);
        match &*failure {
            None => Ok(()),
            Some(Failure::Message(msg)) => Err(BackendError::Message(msg.clone())),
            Some(Failure::Cancelled) => {
                Err(BackendError::Cancelled("context canceled".to_string()))
            }
        }
    }

    fn generate_id(&self, prefix: char) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}{n:025}")
    }

    fn read_vaults(&self) -> std::sync::RwLockReadGuard<'_, Vec<MemoryVault>> {
        self.vaults.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_vaults(&self) -> std::sync::RwLockWriteGuard<'_, Vec<MemoryVault>> {
        self.vaults.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, params: &ItemCreateParams) -> BackendResult<Item> {
        let id = self.generate_id('i');
        let mut vaults = self.write_vaults();
        let vault = vaults
            .iter_mut()
            .find(|v| v.id == params.vault_id)
            .ok_or_else(|| not_found("vault", &params.vault_id))?;

        let mut fields = params.fields.clone();
        for (i, field) in fields.iter_mut().enumerate() {
            if field.id.is_empty() {
                field.id = format!("field{}", i + 1);
            }
        }

        let item = Item {
            id,
            title: params.title.clone(),
            category: params.category,
            vault_id: vault.id.clone(),
            version: 1,
            created_at: None,
            updated_at: None,
            fields,
            tags: params.tags.clone(),
        };
        vault.items.push(item.clone());
        Ok(item)
    }

    /// Fills in live one-time codes the way the real backend does on reads.
    fn with_codes(&self, mut item: Item) -> Item {
        let code = self
            .totp_code
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(code) = code {
            for field in item
                .fields
                .iter_mut()
                .filter(|f| f.field_type == FieldType::Totp)
            {
                field.totp = Some(code.clone());
            }
        }
        item
    }
}

fn not_found(what: &str, name: &str) -> BackendError {
    BackendError::Message(format!("{} not found: {}", what, name))
}

impl OnePasswordClient for MemoryClient {
    fn resolve(&self, reference: &str) -> BackendResult<String> {
        self.check_failure()?;

        if !reference.starts_with(path::REFERENCE_PREFIX) {
            return Err(BackendError::Message(format!(
                "invalid secret reference: {}",
                reference
            )));
        }
        let parsed = path::parse(reference, None)
            .map_err(|e| BackendError::Message(format!("invalid secret reference: {}", e)))?;
        let field_name = parsed
            .field
            .as_deref()
            .ok_or_else(|| BackendError::Message("secret reference has no field".to_string()))?;

        let vaults = self.read_vaults();
        let matching_vaults: Vec<&MemoryVault> = vaults
            .iter()
            .filter(|v| v.id == parsed.vault || v.name == parsed.vault)
            .collect();
        let vault = match matching_vaults.as_slice() {
            [] => return Err(not_found("vault", &parsed.vault)),
            [vault] => vault,
            _ => return Err(BackendError::Message("too many vaults".to_string())),
        };

        let matching_items: Vec<&Item> = vault
            .items
            .iter()
            .filter(|i| i.id == parsed.item || i.title == parsed.item)
            .collect();
        let item = match matching_items.as_slice() {
            [] => return Err(not_found("item", &parsed.item)),
            [item] => self.with_codes((*item).clone()),
            _ => return Err(BackendError::Message("too many items".to_string())),
        };

        let in_section: Vec<_> = item
            .fields
            .iter()
            .filter(|f| match &parsed.section {
                Some(section) => f.section_id.as_deref() == Some(section.as_str()),
                None => true,
            })
            .collect();
        if parsed.section.is_some() && in_section.is_empty() {
            return Err(BackendError::Message("no matching sections".to_string()));
        }

        let matching_fields: Vec<_> = in_section
            .into_iter()
            .filter(|f| f.title == field_name || f.id == field_name)
            .collect();
        match matching_fields.as_slice() {
            [] => Err(not_found("field", field_name)),
            [field] => Ok(field
                .totp
                .clone()
                .filter(|_| field.field_type == FieldType::Totp)
                .unwrap_or_else(|| field.value.clone())),
            _ => Err(BackendError::Message("too many matching fields".to_string())),
        }
    }

    fn list_vaults(&self) -> BackendResult<Vec<VaultOverview>> {
        self.vault_lists.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        Ok(self
            .read_vaults()
            .iter()
            .map(|v| VaultOverview {
                id: v.id.clone(),
                name: v.name.clone(),
            })
            .collect())
    }

    fn list_items(&self, vault_id: &str) -> BackendResult<Vec<ItemOverview>> {
        self.item_lists.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let vaults = self.read_vaults();
        let vault = vaults
            .iter()
            .find(|v| v.id == vault_id)
            .ok_or_else(|| not_found("vault", vault_id))?;

        Ok(vault
            .items
            .iter()
            .map(|i| ItemOverview {
                id: i.id.clone(),
                title: i.title.clone(),
                category: i.category,
                version: i.version,
            })
            .collect())
    }

    fn get_item(&self, vault_id: &str, item_id: &str) -> BackendResult<Item> {
        self.check_failure()?;

        let vaults = self.read_vaults();
        let vault = vaults
            .iter()
            .find(|v| v.id == vault_id)
            .ok_or_else(|| not_found("vault", vault_id))?;
        vault
            .items
            .iter()
            .find(|i| i.id == item_id)
            .map(|i| self.with_codes(i.clone()))
            .ok_or_else(|| not_found("item", item_id))
    }

    fn create_item(&self, params: &ItemCreateParams) -> BackendResult<Item> {
        self.check_failure()?;
        self.insert(params)
    }

    fn update_item(&self, item: &Item) -> BackendResult<Item> {
        self.check_failure()?;

        let mut vaults = self.write_vaults();
        let stored = vaults
            .iter_mut()
            .find(|v| v.id == item.vault_id)
            .ok_or_else(|| not_found("vault", &item.vault_id))?
            .items
            .iter_mut()
            .find(|i| i.id == item.id)
            .ok_or_else(|| not_found("item", &item.id))?;

        let version = stored.version + 1;
        *stored = item.clone();
        stored.version = version;
        Ok(stored.clone())
    }

    fn delete_item(&self, vault_id: &str, item_id: &str) -> BackendResult<()> {
        self.check_failure()?;

        let mut vaults = self.write_vaults();
        let vault = vaults
            .iter_mut()
            .find(|v| v.id == vault_id)
            .ok_or_else(|| not_found("vault", vault_id))?;
        let before = vault.items.len();
        vault.items.retain(|i| i.id != item_id);
        if vault.items.len() == before {
            return Err(not_found("item", item_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::client::ItemField;
    use super::*;

    fn client() -> (MemoryClient, String) {
        let client = MemoryClient::new();
        let vault = client.add_vault("Private");
        client.add_secret(
            &vault,
            "github",
            Category::Login,
            &Secret::from_fields([("username", "octo"), ("password", "hunter2")]),
        ).unwrap();
        (client, vault)
    }

    #[test]
    fn test_resolve() {
        let (client, vault) = client();

        assert_eq!(client.resolve("op://Private/github/password").unwrap(), "hunter2");
        assert_eq!(
            client.resolve(&format!("op://{}/github/username", vault)).unwrap(),
            "octo"
        );
        assert_eq!(
            client.resolve("op://Private/github/nope").unwrap_err().to_string(),
            "field not found: nope"
        );
        assert_eq!(
            client.resolve("op://Nope/github/password").unwrap_err().to_string(),
            "vault not found: Nope"
        );
        assert!(client.resolve("Private/github/password").is_err());
    }

    #[test]
    fn test_resolve_ambiguous_and_sections() {
        let (client, vault) = client();
        client.add_secret(&vault, "github", Category::Login, &Secret::new("other")).unwrap();
        assert_eq!(
            client.resolve("op://Private/github/password").unwrap_err().to_string(),
            "too many items"
        );

        let mut field = ItemField::new("host", "host", FieldType::Text, "db.internal");
        field.section_id = Some("conn".to_string());
        client
            .add_item(&ItemCreateParams {
                vault_id: vault.clone(),
                title: "db".to_string(),
                category: Category::Database,
                fields: vec![field],
                tags: vec![],
            })
            .unwrap();
        assert_eq!(client.resolve("op://Private/db/conn/host").unwrap(), "db.internal");
        assert_eq!(
            client.resolve("op://Private/db/other/host").unwrap_err().to_string(),
            "no matching sections"
        );
    }

    #[test]
    fn test_totp_code() {
        let (client, vault) = client();
        client.add_secret(
            &vault,
            "mfa",
            Category::Login,
            &Secret::default().with_field("otp", "otpauth://totp/x"),
        ).unwrap();

        assert_eq!(client.resolve("op://Private/mfa/otp").unwrap(), "otpauth://totp/x");
        client.set_totp_code("424242");
        assert_eq!(client.resolve("op://Private/mfa/otp").unwrap(), "424242");
    }

    #[test]
    fn test_add_secret_to_unknown_vault() {
        let (client, _) = client();
        let err = client
            .add_secret("v404", "github", Category::Login, &Secret::new("x"))
            .unwrap_err();
        assert_eq!(err.to_string(), "vault not found: v404");
        assert!(client.find_item("v404", "github").is_none());
    }

    #[test]
    fn test_update_bumps_version_and_delete_reports_missing() {
        let (client, vault) = client();
        let mut item = client.find_item("Private", "github").unwrap();
        item.tags = vec!["rotated".to_string()];

        let updated = client.update_item(&item).unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.tags, vec!["rotated"]);

        client.delete_item(&vault, &item.id).unwrap();
        let err = client.delete_item(&vault, &item.id).unwrap_err();
        assert!(err.to_string().starts_with("item not found"));
    }

    #[test]
    fn test_failure_injection() {
        let (client, _) = client();

        client.fail_with("unauthorized");
        assert_eq!(client.list_vaults().unwrap_err().to_string(), "unauthorized");
        client.fail_cancelled();
        assert!(matches!(client.list_vaults(), Err(BackendError::Cancelled(_))));
        client.recover();
        assert_eq!(client.list_vaults().unwrap().len(), 1);
        assert_eq!(client.vault_list_calls(), 3);
    }
}
