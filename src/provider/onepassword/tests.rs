use super::*;
use crate::ErrorKind;
use std::error::Error as _;

/// Provider over an in-memory backend holding `Private/db` and `Shared/aws`.
fn setup(default_vault: Option<&str>) -> (OnePasswordProvider, Arc<MemoryClient>, String) {
    let client = Arc::new(MemoryClient::new());
    let private = client.add_vault("Private");
    let shared = client.add_vault("Shared");
    client.add_secret(
        &private,
        "db",
        Category::Database,
        &Secret::from_fields([("username", "admin"), ("password", "s3cret")]),
    ).unwrap();
    client.add_secret(&shared, "aws", Category::Login, &Secret::new("aws-key")).unwrap();

    let config = OnePasswordConfig {
        service_account_token: Some("ops_test".to_string()),
        default_vault_name: default_vault.map(str::to_string),
        ..Default::default()
    };
    let provider = OnePasswordProvider::with_client(config, client.clone()).unwrap();
    (provider, client, private)
}

#[test]
fn test_get_full_item() {
    let (provider, _, private) = setup(None);

    let secret = provider.get("Private/db").unwrap();
    assert_eq!(secret.value, "s3cret");
    assert_eq!(secret.field("username"), Some("admin"));
    assert_eq!(secret.metadata.provider, "onepassword");
    assert_eq!(secret.metadata.path, "Private/db");
    assert_eq!(secret.metadata.version, "1");
    assert_eq!(secret.metadata.extra["vaultId"], private);
    assert_eq!(secret.metadata.extra["category"], "DATABASE");
}

#[test]
fn test_get_single_field() {
    let (provider, _, _) = setup(None);

    let secret = provider.get("Private/db/username").unwrap();
    assert_eq!(secret.value, "admin");
    assert!(secret.fields.is_empty());
    assert_eq!(secret.metadata.path, "Private/db/username");

    let secret = provider.get("op://Private/db/password").unwrap();
    assert_eq!(secret.value, "s3cret");
    assert_eq!(secret.metadata.path, "Private/db/password");
}

#[test]
fn test_default_vault_paths() {
    let (provider, _, _) = setup(Some("Private"));

    assert_eq!(provider.get("db").unwrap().value, "s3cret");
    // Two components read as item/field once a default vault is set
    assert_eq!(provider.get("db/username").unwrap().value, "admin");
    assert_eq!(provider.get("Shared/aws/password").unwrap().value, "aws-key");
}

#[test]
fn test_repeated_reads_use_cache() {
    let (provider, client, _) = setup(None);

    provider.get("Private/db").unwrap();
    provider.get("Private/db").unwrap();
    assert!(provider.exists("Private/db").unwrap());
    assert_eq!(client.vault_list_calls(), 1);
    assert_eq!(client.item_list_calls(), 1);
}

#[test]
fn test_invalid_path() {
    let (provider, client, _) = setup(None);

    let err = provider.get("").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPath);
    assert_eq!(err.operation(), Some("Get"));

    let err = provider.get("db").unwrap_err();
    assert!(matches!(
        err,
        VaultError::InvalidPath {
            source: PathError::MissingDefaultVault,
            ..
        }
    ));
    assert_eq!(err.path(), Some("db"));

    let err = provider.set("a/b/c/d/e", &Secret::new("v")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPath);
    assert_eq!(client.vault_list_calls(), 0);
}

#[test]
fn test_get_missing() {
    let (provider, _, _) = setup(None);

    let err = provider.get("Private/missing").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.path(), Some("Private/missing"));

    assert!(provider.get("Nope/db").unwrap_err().is_not_found());
    assert!(provider.get("Private/db/nofield").unwrap_err().is_not_found());
}

#[test]
fn test_set_creates_item() {
    let (provider, client, _) = setup(None);

    let secret = Secret::from_fields([("api_key", "k-123"), ("endpoint", "https://api")]);
    provider.set("Private/api", &secret).unwrap();

    let item = client.find_item("Private", "api").unwrap();
    assert_eq!(item.category, Category::SecureNote);
    assert_eq!(item.fields.len(), 2);
    assert_eq!(item.fields[0].title, "api_key");
    assert_eq!(item.fields[0].field_type, FieldType::Concealed);
    assert_eq!(item.fields[1].field_type, FieldType::Url);

    // The new item is cached, so reading it back lists nothing
    let lists = client.item_list_calls();
    let read = provider.get("Private/api").unwrap();
    assert_eq!(read.value, "k-123");
    assert_eq!(client.item_list_calls(), lists);
}

#[test]
fn test_set_creates_item_with_field() {
    let (provider, client, _) = setup(None);

    provider.set("Private/new/token", &Secret::new("t0k")).unwrap();

    let item = client.find_item("Private", "new").unwrap();
    assert_eq!(item.fields.len(), 1);
    assert_eq!(item.fields[0].id, "token");
    assert_eq!(item.fields[0].field_type, FieldType::Concealed);
    assert_eq!(provider.get("Private/new/token").unwrap().value, "t0k");
}

#[test]
fn test_set_uses_configured_category() {
    let client = Arc::new(MemoryClient::new());
    client.add_vault("Private");
    let config = OnePasswordConfig {
        service_account_token: Some("ops_test".to_string()),
        default_category: Category::ApiCredentials,
        ..Default::default()
    };
    let provider = OnePasswordProvider::with_client(config, client.clone()).unwrap();

    provider.set("Private/stripe", &Secret::new("sk")).unwrap();
    assert_eq!(
        client.find_item("Private", "stripe").unwrap().category,
        Category::ApiCredentials
    );
}

#[test]
fn test_set_field_updates_in_place() {
    let (provider, client, _) = setup(None);

    provider.set("Private/db/username", &Secret::new("root")).unwrap();
    provider.set("Private/db/host", &Secret::new("db.internal")).unwrap();

    let item = client.find_item("Private", "db").unwrap();
    assert_eq!(item.version, 3);
    assert_eq!(item.fields.len(), 3);
    let values: HashMap<&str, &str> = item
        .fields
        .iter()
        .map(|f| (f.title.as_str(), f.value.as_str()))
        .collect();
    assert_eq!(values["username"], "root");
    assert_eq!(values["password"], "s3cret");
    assert_eq!(values["host"], "db.internal");
    assert_eq!(item.fields[2].field_type, FieldType::Concealed);
}

#[test]
fn test_set_without_field_replaces_fields() {
    let (provider, client, _) = setup(None);

    provider.set("Private/db", &Secret::new("rotated")).unwrap();

    let item = client.find_item("Private", "db").unwrap();
    assert_eq!(item.fields.len(), 1);
    assert_eq!(provider.get("Private/db").unwrap().value, "rotated");
}

#[test]
fn test_set_tags() {
    let (provider, client, _) = setup(None);

    let secret = Secret::new("v").with_tag("env", "prod").with_tag("pinned", "");
    provider.set("Private/tagged", &secret).unwrap();
    assert_eq!(
        client.find_item("Private", "tagged").unwrap().tags,
        vec!["env:prod".to_string(), "pinned".to_string()]
    );

    // Updates without tags keep the existing ones
    provider.set("Private/tagged", &Secret::new("v2")).unwrap();
    let read = provider.get("Private/tagged").unwrap();
    assert_eq!(read.metadata.tags["env"], "prod");
    assert_eq!(read.metadata.tags["pinned"], "");
}

#[test]
fn test_set_missing_vault_is_not_created() {
    let (provider, client, _) = setup(None);

    let err = provider.set("Elsewhere/item", &Secret::new("v")).unwrap_err();
    assert!(err.is_not_found());
    assert!(client.find_item("Elsewhere", "item").is_none());
}

#[test]
fn test_set_recreates_item_removed_behind_cache() {
    let (provider, client, private) = setup(None);

    provider.set("Private/temp", &Secret::new("one")).unwrap();
    let first = client.find_item("Private", "temp").unwrap().id;
    client.delete_item(&private, &first).unwrap();

    provider.set("Private/temp", &Secret::new("two")).unwrap();
    let second = client.find_item("Private", "temp").unwrap();
    assert_ne!(second.id, first);
    assert_eq!(provider.get("Private/temp").unwrap().value, "two");
}

#[test]
fn test_set_ambiguous_propagates() {
    let (provider, client, _) = setup(None);
    // Vault IDs are cached by the listing, so the failure hits item resolution
    provider.list("Shared").unwrap();

    client.fail_with("More than one item matches \"db\": too many items");
    let err = provider.set("Private/db", &Secret::new("v")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Ambiguous);
    assert_eq!(err.operation(), Some("Set"));
}

#[test]
fn test_get_ambiguous_field_reference() {
    let (provider, client, private) = setup(None);
    client.add_secret(&private, "db", Category::Database, &Secret::new("other")).unwrap();

    let err = provider.get("Private/db/password").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Ambiguous);
}

#[test]
fn test_delete() {
    let (provider, client, _) = setup(None);

    assert!(provider.exists("Private/db").unwrap());
    provider.delete("Private/db").unwrap();
    assert!(client.find_item("Private", "db").is_none());
    assert!(!provider.exists("Private/db").unwrap());

    // Deleting what is not there succeeds
    provider.delete("Private/db").unwrap();
    provider.delete("Nope/db").unwrap();
}

#[test]
fn test_delete_invalidates_cache() {
    let (provider, client, _) = setup(None);

    provider.get("Private/db").unwrap();
    provider.delete("Private/db").unwrap();
    let lists = client.item_list_calls();

    assert!(provider.get("Private/db").unwrap_err().is_not_found());
    assert_eq!(client.item_list_calls(), lists + 1);
}

#[test]
fn test_exists() {
    let (provider, _, _) = setup(None);

    assert!(provider.exists("Private/db").unwrap());
    assert!(provider.exists("Shared/aws").unwrap());
    assert!(!provider.exists("Private/missing").unwrap());
    assert!(!provider.exists("Nope/db").unwrap());
    assert_eq!(
        provider.exists("").unwrap_err().kind(),
        ErrorKind::InvalidPath
    );
}

#[test]
fn test_access_denied_is_not_absence() {
    let (provider, client, _) = setup(None);
    client.fail_with("unauthorized: invalid service account token");

    assert_eq!(provider.get("Private/db").unwrap_err().kind(), ErrorKind::AccessDenied);
    assert_eq!(provider.exists("Private/db").unwrap_err().kind(), ErrorKind::AccessDenied);
    assert_eq!(provider.delete("Private/db").unwrap_err().kind(), ErrorKind::AccessDenied);
    assert_eq!(provider.list("").unwrap_err().kind(), ErrorKind::AccessDenied);

    client.recover();
    assert!(provider.exists("Private/db").unwrap());
}

#[test]
fn test_cancellation_passes_through() {
    let (provider, client, _) = setup(None);
    client.fail_cancelled();

    let err = provider.get("Private/db").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);
    let source = err.source().unwrap().downcast_ref::<BackendError>().unwrap();
    assert!(matches!(source, BackendError::Cancelled(_)));

    assert_eq!(provider.exists("Private/db").unwrap_err().kind(), ErrorKind::Unknown);
    assert_eq!(provider.delete("Private/db").unwrap_err().kind(), ErrorKind::Unknown);
}

#[test]
fn test_list() {
    let (provider, client, _) = setup(None);
    provider.set("Private/api", &Secret::new("k")).unwrap();

    let mut all = provider.list("").unwrap();
    all.sort();
    assert_eq!(all, vec!["Private/api", "Private/db", "Shared/aws"]);

    assert_eq!(provider.list("Shared").unwrap(), vec!["Shared/aws"]);
    assert_eq!(provider.list("Private/d").unwrap(), vec!["Private/db"]);
    assert!(provider.list("Nope").unwrap().is_empty());

    // Listed vaults are cached
    let vault_lists = client.vault_list_calls();
    assert!(provider.exists("Shared/aws").unwrap());
    assert_eq!(client.vault_list_calls(), vault_lists);
}

#[test]
fn test_get_batch() {
    let (provider, _, _) = setup(None);

    let secrets = provider
        .get_batch(&["Private/db", "Private/missing", "Shared/aws/password", ""])
        .unwrap();
    assert_eq!(secrets.len(), 2);
    assert_eq!(secrets["Private/db"].value, "s3cret");
    assert_eq!(secrets["Shared/aws/password"].value, "aws-key");

    assert!(provider.get_batch(&[]).unwrap().is_empty());
}

#[test]
fn test_get_batch_detailed() {
    let (provider, _, _) = setup(None);

    let result = provider
        .get_batch_detailed(&["Private/db", "Private/missing", ""])
        .unwrap();
    assert_eq!(result.secrets.len(), 1);
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors["Private/missing"].is_not_found());
    assert_eq!(result.errors[""].kind(), ErrorKind::InvalidPath);
}

#[test]
fn test_set_and_delete_batch() {
    let (provider, client, _) = setup(None);

    let secrets = HashMap::from([
        ("Private/one".to_string(), Secret::new("1")),
        ("Elsewhere/two".to_string(), Secret::new("2")),
        ("Shared/three".to_string(), Secret::new("3")),
    ]);
    let err = provider.set_batch(&secrets).unwrap_err();
    assert!(err.is_not_found());
    assert!(client.find_item("Private", "one").is_some());
    assert!(client.find_item("Shared", "three").is_some());

    provider
        .delete_batch(&["Private/one", "Shared/three", "Private/never"])
        .unwrap();
    assert!(client.find_item("Private", "one").is_none());
    assert!(client.find_item("Shared", "three").is_none());
}

#[test]
fn test_close() {
    let (provider, client, _) = setup(None);

    provider.close().unwrap();
    provider.close().unwrap();

    let calls = client.vault_list_calls();
    assert_eq!(provider.get("Private/db").unwrap_err().kind(), ErrorKind::Closed);
    assert_eq!(
        provider.set("Private/db", &Secret::new("v")).unwrap_err().kind(),
        ErrorKind::Closed
    );
    assert_eq!(provider.delete("Private/db").unwrap_err().kind(), ErrorKind::Closed);
    assert_eq!(provider.exists("Private/db").unwrap_err().kind(), ErrorKind::Closed);
    assert_eq!(provider.list("").unwrap_err().kind(), ErrorKind::Closed);
    assert_eq!(provider.get_batch(&["Private/db"]).unwrap_err().kind(), ErrorKind::Closed);
    assert_eq!(
        provider.set_batch(&HashMap::new()).unwrap_err().kind(),
        ErrorKind::Closed
    );
    assert_eq!(provider.delete_batch(&[]).unwrap_err().kind(), ErrorKind::Closed);
    assert_eq!(client.vault_list_calls(), calls);
}

#[test]
fn test_name_and_capabilities() {
    let (provider, _, _) = setup(None);

    assert_eq!(provider.name(), PROVIDER_NAME);
    let caps = provider.capabilities();
    assert!(caps.read && caps.write && caps.delete && caps.list);
    assert!(caps.multi_field && caps.batch && caps.binary);
    assert!(!caps.versioning);
    assert!(!caps.rotation);
}

#[test]
fn test_missing_token_fails_construction() {
    if std::env::var(ENV_SERVICE_ACCOUNT_TOKEN).is_ok() {
        return;
    }

    let err = OnePasswordProvider::with_client(
        OnePasswordConfig::default(),
        Arc::new(MemoryClient::new()),
    )
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(OnePasswordProvider::new(OnePasswordConfig::default()).is_err());
}

#[test]
fn test_concurrent_reads_and_writes() {
    let (provider, _, _) = setup(None);

    std::thread::scope(|s| {
        for i in 0..4 {
            let provider = &provider;
            s.spawn(move || {
                let path = format!("Private/item-{}", i);
                provider.set(&path, &Secret::new(format!("v{}", i))).unwrap();
                assert_eq!(provider.get(&path).unwrap().value, format!("v{}", i));
                assert_eq!(provider.get("Private/db").unwrap().value, "s3cret");
            });
        }
    });

    assert_eq!(provider.list("Private/item-").unwrap().len(), 4);
}
