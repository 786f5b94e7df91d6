//! Classification of backend failures into [`VaultError`] kinds.
//!
//! 1Password reports failures as free text, so classification is a
//! case-insensitive substring match. Checks run in order: not found, then
//! access denied, then ambiguous. Anything else is wrapped unchanged.

use super::client::BackendError;
use crate::VaultError;

const NOT_FOUND: &[&str] = &[
    "item not found",
    "vault not found",
    "collection not found",
    "field not found",
    "no matching sections",
    "itemNotFound",
    "vaultNotFound",
    "fieldNotFound",
    "noMatchingSections",
];

const ACCESS_DENIED: &[&str] = &[
    "unauthorized",
    "forbidden",
    "access denied",
    "AccessDenied",
    "invalid service account token",
    "authentication failed",
];

const AMBIGUOUS: &[&str] = &[
    "too many vaults",
    "too many items",
    "too many matching fields",
    "tooManyVaults",
    "tooManyItems",
    "tooManyMatchingFields",
];

const NOT_FOUND_LOOSE: &[&str] = &["itemNotFound", "vaultNotFound", "fieldNotFound", "not found"];

/// Wraps a backend failure of `operation` on `path` in the matching [`VaultError`].
pub(crate) fn map_error(operation: &'static str, path: &str, err: BackendError) -> VaultError {
    let path = path.to_string();

    // Cancellation is reported as-is, whatever its text says
    if matches!(err, BackendError::Cancelled(_)) {
        return VaultError::Unknown {
            operation,
            path,
            source: err,
        };
    }

    let text = err.to_string();
    if contains_any(&text, NOT_FOUND) {
        VaultError::NotFound {
            operation,
            path,
            source: err,
        }
    } else if contains_any(&text, ACCESS_DENIED) {
        VaultError::AccessDenied {
            operation,
            path,
            source: err,
        }
    } else if contains_any(&text, AMBIGUOUS) {
        VaultError::Ambiguous {
            operation,
            path,
            source: err,
        }
    } else {
        VaultError::Unknown {
            operation,
            path,
            source: err,
        }
    }
}

/// Whether `err` means the thing looked up does not exist.
///
/// Broader than the `NotFound` classification of [`map_error`]; used where a
/// missing item is an expected outcome rather than a failure.
pub(crate) fn is_not_found(err: &BackendError) -> bool {
    match err {
        BackendError::Cancelled(_) => false,
        other => contains_any(&other.to_string(), NOT_FOUND_LOOSE),
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let haystack = haystack.to_lowercase();
    needles
        .iter()
        .any(|needle| haystack.contains(&needle.to_lowercase()))
}
