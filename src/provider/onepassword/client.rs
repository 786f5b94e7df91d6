//! The capabilities the provider needs from a 1Password backend.
//!
//! [`OnePasswordClient`] is deliberately small: resolve a secret reference,
//! enumerate vaults and items, and get/create/update/delete single items.
//! The backend only exposes enumeration, so name lookups are done by the
//! provider on top of `list_vaults`/`list_items`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised by a backend client.
///
/// The backend has no structured error codes, so `Message` carries its raw
/// text for the normalizer to classify.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{0}")]
    Message(String),
    /// The caller's cancellation or deadline fired before the call finished.
    #[error("operation cancelled: {0}")]
    Cancelled(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Field types understood by 1Password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    #[serde(rename = "STRING")]
    Text,
    Concealed,
    Url,
    Phone,
    Email,
    #[serde(rename = "OTP")]
    Totp,
    #[serde(other)]
    Other,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "STRING",
            FieldType::Concealed => "CONCEALED",
            FieldType::Url => "URL",
            FieldType::Phone => "PHONE",
            FieldType::Email => "EMAIL",
            FieldType::Totp => "OTP",
            FieldType::Other => "OTHER",
        }
    }
}

/// Item categories used when creating items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Login,
    #[default]
    SecureNote,
    #[serde(rename = "API_CREDENTIAL")]
    ApiCredentials,
    Database,
    Server,
    Password,
    SshKey,
    #[serde(other)]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Login => "LOGIN",
            Category::SecureNote => "SECURE_NOTE",
            Category::ApiCredentials => "API_CREDENTIAL",
            Category::Database => "DATABASE",
            Category::Server => "SERVER",
            Category::Password => "PASSWORD",
            Category::SshKey => "SSH_KEY",
            Category::Other => "OTHER",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Accepts the backend spelling in any case, with `-`, `_` or spaces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "LOGIN" => Ok(Category::Login),
            "SECURE_NOTE" | "SECURENOTE" => Ok(Category::SecureNote),
            "API_CREDENTIAL" | "API_CREDENTIALS" => Ok(Category::ApiCredentials),
            "DATABASE" => Ok(Category::Database),
            "SERVER" => Ok(Category::Server),
            "PASSWORD" => Ok(Category::Password),
            "SSH_KEY" | "SSHKEY" => Ok(Category::SshKey),
            _ => Err(format!("unknown item category '{}'", s)),
        }
    }
}

/// Vault summary returned by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultOverview {
    pub id: String,
    #[serde(alias = "title")]
    pub name: String,
}

/// Item summary returned by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOverview {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub version: u32,
}

/// A single field of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemField {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "label", default)]
    pub title: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    /// Live one-time code computed by the backend for `Totp` fields
    #[serde(default, skip_serializing)]
    pub totp: Option<String>,
}

impl ItemField {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        field_type: FieldType,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            field_type,
            value: value.into(),
            section_id: None,
            totp: None,
        }
    }
}

/// A full item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub vault_id: String,
    pub version: u32,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub fields: Vec<ItemField>,
    pub tags: Vec<String>,
}

/// Parameters for creating an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemCreateParams {
    pub vault_id: String,
    pub title: String,
    pub category: Category,
    pub fields: Vec<ItemField>,
    pub tags: Vec<String>,
}

/// Operations a 1Password backend must offer.
///
/// Calls block until the backend answers. Implementations that support
/// cancellation report it as [`BackendError::Cancelled`].
pub trait OnePasswordClient: Send + Sync {
    /// Resolves an `op://vault/item[/section]/field` reference to its value.
    fn resolve(&self, reference: &str) -> BackendResult<String>;

    fn list_vaults(&self) -> BackendResult<Vec<VaultOverview>>;

    fn list_items(&self, vault_id: &str) -> BackendResult<Vec<ItemOverview>>;

    fn get_item(&self, vault_id: &str, item_id: &str) -> BackendResult<Item>;

    fn create_item(&self, params: &ItemCreateParams) -> BackendResult<Item>;

    /// Persists `item` in place of the stored item with the same ID.
    fn update_item(&self, item: &Item) -> BackendResult<Item>;

    fn delete_item(&self, vault_id: &str, item_id: &str) -> BackendResult<()>;
}
