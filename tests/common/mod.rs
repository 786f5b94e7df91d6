#![allow(dead_code)]

use opvault::provider::onepassword::{
    Category, ENV_SERVICE_ACCOUNT_TOKEN, MemoryClient, OnePasswordConfig, OnePasswordProvider,
};
use opvault::Secret;
use std::sync::Arc;

/// Vault used by the live tests, set together with the service account token.
pub const ENV_TEST_VAULT: &str = "OPVAULT_TEST_VAULT";

/// In-memory backend seeded with a few items, and a provider over it.
pub struct TestFixture {
    pub client: Arc<MemoryClient>,
    pub provider: OnePasswordProvider,
    pub private_id: String,
    pub shared_id: String,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(OnePasswordConfig::default())
    }

    /// Seeds the backend, then builds the provider from `config` plus a test token.
    pub fn with_config(config: OnePasswordConfig) -> Self {
        let client = Arc::new(MemoryClient::new());
        let private_id = client.add_vault("Private");
        let shared_id = client.add_vault("Shared");

        client.add_secret(
            &private_id,
            "database",
            Category::Database,
            &Secret::default()
                .with_field("username", "admin")
                .with_field("password", "db-pass")
                .with_field("host", "db.internal")
                .with_tag("env", "prod"),
        ).unwrap();
        client.add_secret(
            &private_id,
            "github",
            Category::ApiCredentials,
            &Secret::default().with_field("token", "ghp_123"),
        ).unwrap();
        client.add_secret(
            &shared_id,
            "stripe",
            Category::ApiCredentials,
            &Secret::new("sk_live"),
        ).unwrap();

        let config = OnePasswordConfig {
            service_account_token: Some("ops_test".to_string()),
            ..config
        };
        let provider = OnePasswordProvider::with_client(config, client.clone())
            .expect("provider with a token is constructed");

        Self {
            client,
            provider,
            private_id,
            shared_id,
        }
    }
}

/// Service account token and vault for tests against real 1Password, if both are set.
pub fn live_settings() -> Option<(String, String)> {
    let token = std::env::var(ENV_SERVICE_ACCOUNT_TOKEN).ok()?;
    let vault = std::env::var(ENV_TEST_VAULT).ok()?;
    (!token.is_empty() && !vault.is_empty()).then_some((token, vault))
}

pub fn generate_test_item_name() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_micros();
    format!("opvault_test_{}", timestamp % 1_000_000)
}
