//! # opvault core
//!
//! Backend-neutral types exchanged between callers and secret providers.
//!
//! A [`Secret`] is the unit a provider hands back for a path: a primary
//! `value`, any number of named `fields`, and [`Metadata`] describing where the
//! secret came from. Providers advertise what they can do through a static
//! [`Capabilities`] matrix.
//!
//! ```
//! use opvault_core::Secret;
//!
//! let secret = Secret::default()
//!     .with_field("username", "admin")
//!     .with_field("password", "hunter2")
//!     .with_tag("env", "prod");
//!
//! assert_eq!(secret.field("username"), Some("admin"));
//! assert_eq!(secret.metadata.tags.get("env").map(String::as_str), Some("prod"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A secret read from or written to a provider.
///
/// `value` holds the primary scalar and is empty when the secret has none.
/// Multi-field secrets keep every named value in `fields`; on reads the
/// provider derives `value` from them deterministically.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    /// The primary secret value (empty when absent)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    /// Named values making up a multi-field secret
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, String>,
    /// Provider-supplied information about the secret
    #[serde(default)]
    pub metadata: Metadata,
}

impl Secret {
    /// Creates a secret holding a single primary value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    /// Creates a multi-field secret from name/value pairs.
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Adds a tag. An empty value makes a flag-only tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn has_value(&self) -> bool {
        !self.value.is_empty()
    }
}

// Values never show up in logs or panic messages.
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Secret")
            .field("value", &if self.has_value() { "<redacted>" } else { "" })
            .field("fields", &names)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Information about a secret supplied by the provider on reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Name of the provider that produced the secret
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,
    /// Canonical path of the secret within the provider
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// Backend revision marker
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Tags; an empty value marks a flag-only tag
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
    /// Backend-specific identifiers (vault ID, item ID, category, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

/// What a provider supports.
///
/// This is a fixed declaration per provider, not runtime state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    pub list: bool,
    pub multi_field: bool,
    pub batch: bool,
    pub versioning: bool,
    pub binary: bool,
    pub rotation: bool,
}
