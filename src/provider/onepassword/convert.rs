//! Conversion between 1Password items and [`Secret`]s.

use super::PROVIDER_NAME;
use super::client::{FieldType, Item, ItemField};
use opvault_core::{Metadata, Secret};
use std::collections::HashMap;

/// Field name whose value becomes the primary value of a secret.
const PRIMARY_FIELD: &str = "password";

/// Converts a full item into a secret addressed by `path`.
///
/// The primary value comes from, in order: a field named `password`
/// (any case), the first concealed field, the first non-empty field. Fields
/// are scanned in the item's own order.
pub(crate) fn item_to_secret(item: &Item, path: &str) -> Secret {
    let mut extra = HashMap::from([
        ("vaultId".to_string(), item.vault_id.clone()),
        ("itemId".to_string(), item.id.clone()),
        ("category".to_string(), item.category.as_str().to_string()),
    ]);
    if let Some(created) = &item.created_at {
        extra.insert("createdAt".to_string(), created.clone());
    }
    if let Some(updated) = &item.updated_at {
        extra.insert("updatedAt".to_string(), updated.clone());
    }

    let mut fields = HashMap::with_capacity(item.fields.len());
    let mut password = None;
    let mut first_concealed = None;
    let mut first_non_empty = None;

    for field in &item.fields {
        let name = if field.title.is_empty() {
            &field.id
        } else {
            &field.title
        };
        let value = field_value(field);

        if password.is_none() && name.eq_ignore_ascii_case(PRIMARY_FIELD) {
            password = Some(value.to_string());
        }
        if first_concealed.is_none()
            && field.field_type == FieldType::Concealed
            && !value.is_empty()
        {
            first_concealed = Some(value.to_string());
        }
        if first_non_empty.is_none() && !value.is_empty() {
            first_non_empty = Some(value.to_string());
        }

        fields.insert(name.clone(), value.to_string());
    }

    let value = password
        .filter(|v| !v.is_empty())
        .or(first_concealed)
        .or(first_non_empty)
        .unwrap_or_default();

    Secret {
        value,
        fields,
        metadata: Metadata {
            provider: PROVIDER_NAME.to_string(),
            path: path.to_string(),
            version: item.version.to_string(),
            tags: tags_from_strings(&item.tags),
            extra,
        },
    }
}

/// The effective value of a field; one-time password fields yield the live code.
fn field_value(field: &ItemField) -> &str {
    match (&field.field_type, &field.totp) {
        (FieldType::Totp, Some(code)) => code,
        _ => &field.value,
    }
}

/// Builds item fields from a secret.
///
/// With `field` set, a single concealed field holding `secret.value` is
/// produced. Otherwise every entry of `secret.fields` becomes a field with an
/// inferred type, in name order; a secret with only a value becomes a
/// `password` field.
pub(crate) fn secret_to_fields(secret: &Secret, field: Option<&str>) -> Vec<ItemField> {
    if let Some(name) = field {
        return vec![ItemField::new(
            sanitize_id(name),
            name,
            FieldType::Concealed,
            secret.value.clone(),
        )];
    }

    let mut names: Vec<&String> = secret.fields.keys().collect();
    names.sort();

    let mut fields: Vec<ItemField> = names
        .into_iter()
        .map(|name| {
            let value = &secret.fields[name];
            ItemField::new(
                sanitize_id(name),
                name.clone(),
                infer_field_type(name, value),
                value.clone(),
            )
        })
        .collect();

    if fields.is_empty() && secret.has_value() {
        fields.push(ItemField::new(
            PRIMARY_FIELD,
            PRIMARY_FIELD,
            FieldType::Concealed,
            secret.value.clone(),
        ));
    }

    fields
}

/// Infers the field type from its name, falling back to the value for OTP URIs.
pub fn infer_field_type(name: &str, value: &str) -> FieldType {
    let name = name.to_lowercase();
    let has_any = |needles: &[&str]| needles.iter().any(|n| name.contains(n));

    if has_any(&["password", "secret", "token", "key", "credential"]) {
        FieldType::Concealed
    } else if has_any(&["url", "website", "endpoint"]) {
        FieldType::Url
    } else if has_any(&["phone", "mobile", "tel"]) {
        FieldType::Phone
    } else if value.starts_with("otpauth://") {
        FieldType::Totp
    } else {
        FieldType::Text
    }
}

/// Turns a display name into a field ID made of `[a-z0-9_]`.
pub fn sanitize_id(name: &str) -> String {
    let id: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect();

    match id.trim_matches('_') {
        "" => "field".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Parses `key:value` tags; a tag without a colon is a flag with an empty value.
pub(crate) fn tags_from_strings(tags: &[String]) -> HashMap<String, String> {
    tags.iter()
        .map(|tag| match tag.split_once(':') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (tag.clone(), String::new()),
        })
        .collect()
}

pub(crate) fn tags_to_strings(tags: &HashMap<String, String>) -> Vec<String> {
    let mut result: Vec<String> = tags
        .iter()
        .map(|(key, value)| {
            if value.is_empty() {
                key.clone()
            } else {
                format!("{}:{}", key, value)
            }
        })
        .collect();
    result.sort();
    result
}
