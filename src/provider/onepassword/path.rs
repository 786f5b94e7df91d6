//! Path grammar for 1Password secrets.
//!
//! Two dialects are accepted:
//!
//! - plain paths: `vault/item/field`, `vault/item`, `item/field`, `item`,
//!   `vault/item/section/field`
//! - native secret references: `op://vault/item[/section]/field`
//!
//! Plain paths with two components are ambiguous. With a default vault
//! configured they read as `item/field`; without one they read as
//! `vault/item`.

use std::fmt;
use thiserror::Error;

/// Scheme prefix of native 1Password secret references.
pub const REFERENCE_PREFIX: &str = "op://";

/// Why a path could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("single component path requires a default vault")]
    MissingDefaultVault,
    #[error("too many path components")]
    TooManyComponents,
    #[error("invalid secret reference format")]
    InvalidReference,
}

/// A request path split into its 1Password components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    /// Vault name or ID
    pub vault: String,
    /// Item title or ID
    pub item: String,
    /// Section name, only present in four component paths
    pub section: Option<String>,
    /// Field name or ID
    pub field: Option<String>,
}

impl ParsedPath {
    fn new(vault: &str, item: &str) -> Self {
        Self {
            vault: vault.to_string(),
            item: item.to_string(),
            section: None,
            field: None,
        }
    }

    fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    fn with_section(mut self, section: &str) -> Self {
        self.section = Some(section.to_string());
        self
    }

    /// Renders the path as a native `op://` secret reference.
    pub fn secret_reference(&self) -> String {
        match (&self.section, &self.field) {
            (Some(section), Some(field)) => format!(
                "{REFERENCE_PREFIX}{}/{}/{}/{}",
                self.vault, self.item, section, field
            ),
            (_, Some(field)) => format!("{REFERENCE_PREFIX}{}/{}/{}", self.vault, self.item, field),
            _ => format!("{REFERENCE_PREFIX}{}/{}", self.vault, self.item),
        }
    }
}

/// Canonical `vault/item[/section][/field]` form.
impl fmt::Display for ParsedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            Some(self.vault.as_str()),
            Some(self.item.as_str()),
            self.section.as_deref(),
            self.field.as_deref(),
        ];
        let joined: Vec<&str> = parts
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
            .collect();
        f.write_str(&joined.join("/"))
    }
}

/// Parses `path`, filling in `default_vault` where the grammar allows it.
///
/// An empty `default_vault` counts as not configured.
pub fn parse(path: &str, default_vault: Option<&str>) -> Result<ParsedPath, PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }

    if let Some(reference) = path.strip_prefix(REFERENCE_PREFIX) {
        return parse_reference(reference);
    }

    let default_vault = default_vault.filter(|v| !v.is_empty());

    match components(path).as_slice() {
        [] => Err(PathError::Empty),
        [item] => default_vault
            .map(|vault| ParsedPath::new(vault, item))
            .ok_or(PathError::MissingDefaultVault),
        [first, second] => Ok(match default_vault {
            Some(vault) => ParsedPath::new(vault, first).with_field(second),
            None => ParsedPath::new(first, second),
        }),
        [vault, item, field] => Ok(ParsedPath::new(vault, item).with_field(field)),
        [vault, item, section, field] => Ok(ParsedPath::new(vault, item)
            .with_section(section)
            .with_field(field)),
        _ => Err(PathError::TooManyComponents),
    }
}

/// Parses the part of an `op://` reference after the scheme.
fn parse_reference(reference: &str) -> Result<ParsedPath, PathError> {
    // Query parameters such as `?attribute=totp` are not part of the path
    let reference = reference.split('?').next().unwrap_or_default();

    match components(reference).as_slice() {
        [vault, item] => Ok(ParsedPath::new(vault, item)),
        [vault, item, field] => Ok(ParsedPath::new(vault, item).with_field(field)),
        [vault, item, section, field] => Ok(ParsedPath::new(vault, item)
            .with_section(section)
            .with_field(field)),
        _ => Err(PathError::InvalidReference),
    }
}

fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|p| !p.is_empty()).collect()
}
