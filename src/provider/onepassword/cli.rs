use super::client::{
    BackendError, BackendResult, Category, Item, ItemCreateParams, ItemField, ItemOverview,
    OnePasswordClient, VaultOverview,
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::Command;
use tracing::debug;

/// Item as printed by `op item get --format json`.
#[derive(Debug, Deserialize)]
struct CliItem {
    id: String,
    title: String,
    #[serde(default)]
    category: Category,
    vault: CliVaultRef,
    #[serde(default)]
    version: u32,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    fields: Vec<CliField>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CliVaultRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CliField {
    #[serde(flatten)]
    field: ItemField,
    #[serde(default)]
    section: Option<CliSection>,
}

#[derive(Debug, Deserialize)]
struct CliSection {
    id: String,
}

impl From<CliItem> for Item {
    fn from(item: CliItem) -> Self {
        Item {
            id: item.id,
            title: item.title,
            category: item.category,
            vault_id: item.vault.id,
            version: item.version,
            created_at: item.created_at,
            updated_at: item.updated_at,
            fields: item
                .fields
                .into_iter()
                .map(|f| {
                    let mut field = f.field;
                    if field.section_id.is_none() {
                        field.section_id = f.section.map(|s| s.id);
                    }
                    field
                })
                .collect(),
            tags: item.tags,
        }
    }
}

/// Template accepted by `op item create/edit --template`.
#[derive(Debug, Serialize)]
struct ItemTemplate<'a> {
    title: &'a str,
    category: Category,
    fields: Vec<TemplateField<'a>>,
    tags: &'a [String],
}

#[derive(Debug, Serialize)]
struct TemplateField<'a> {
    id: &'a str,
    label: &'a str,
    #[serde(rename = "type")]
    field_type: &'static str,
    value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    section: Option<TemplateSection<'a>>,
}

#[derive(Debug, Serialize)]
struct TemplateSection<'a> {
    id: &'a str,
}

impl<'a> ItemTemplate<'a> {
    fn new(title: &'a str, category: Category, fields: &'a [ItemField], tags: &'a [String]) -> Self {
        Self {
            title,
            category,
            fields: fields
                .iter()
                .map(|f| TemplateField {
                    id: &f.id,
                    label: &f.title,
                    field_type: f.field_type.as_str(),
                    value: &f.value,
                    section: f.section_id.as_deref().map(|id| TemplateSection { id }),
                })
                .collect(),
            tags,
        }
    }
}

/// [`OnePasswordClient`] backed by the 1Password CLI (`op`).
///
/// The service account token and integration details are passed to `op`
/// through its environment. Item templates go through a temporary file, so
/// secret values never appear in the process list.
pub struct OpCli {
    service_account_token: String,
    account: Option<String>,
    integration_name: String,
    integration_version: String,
}

impl OpCli {
    pub fn new(
        service_account_token: String,
        account: Option<String>,
        integration_name: String,
        integration_version: String,
    ) -> Self {
        Self {
            service_account_token,
            account,
            integration_name,
            integration_version,
        }
    }

    fn execute_op_command(&self, args: &[&str]) -> BackendResult<String> {
        let mut cmd = Command::new("op");
        cmd.env("OP_SERVICE_ACCOUNT_TOKEN", &self.service_account_token);
        cmd.env("OP_INTEGRATION_NAME", &self.integration_name);
        cmd.env("OP_INTEGRATION_BUILDNUMBER", &self.integration_version);

        // Add account if specified
        if let Some(account) = &self.account {
            cmd.arg("--account").arg(account);
        }

        cmd.args(args);
        debug!(command = %args.first().copied().unwrap_or_default(), "running op");

        let output = match cmd.output() {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BackendError::Message(
                    "1Password CLI (op) is not installed.\n\nTo install it:\n  - macOS: brew install 1password-cli\n  - Linux: Download from https://1password.com/downloads/command-line/\n  - Windows: Download from https://1password.com/downloads/command-line/\n  - NixOS: nix-env -iA nixpkgs._1password".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        if !output.status.success() {
            let error_msg = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Message(translate_cli_error(error_msg.trim())));
        }

        String::from_utf8(output.stdout).map_err(|e| BackendError::Message(e.to_string()))
    }

    /// Runs `args` with `--template <file>` holding `template` as JSON.
    fn execute_with_template(&self, args: &[&str], template: &ItemTemplate) -> BackendResult<String> {
        let template_json = serde_json::to_string(template)?;

        let mut temp_file = tempfile::NamedTempFile::new()?;
        temp_file.write_all(template_json.as_bytes())?;
        temp_file.flush()?;

        let template_path = temp_file.path().to_str().ok_or_else(|| {
            BackendError::Message("temporary file path is not valid UTF-8".to_string())
        })?;

        let mut full_args = args.to_vec();
        full_args.extend(["--template", template_path, "--format", "json"]);
        self.execute_op_command(&full_args)
    }
}

/// Rewrites `op` error phrases into the wording the provider classifies.
fn translate_cli_error(message: &str) -> String {
    let lower = message.to_lowercase();
    let prefix = if lower.contains("isn't an item") {
        Some("item not found")
    } else if lower.contains("isn't a vault") {
        Some("vault not found")
    } else if lower.contains("isn't a field") || lower.contains("does not have a field") {
        Some("field not found")
    } else if lower.contains("not currently signed in") {
        Some("authentication failed")
    } else if lower.contains("more than one item matches") {
        Some("too many items")
    } else if lower.contains("more than one vault matches") {
        Some("too many vaults")
    } else {
        None
    };

    match prefix {
        Some(prefix) => format!("{}: {}", prefix, message),
        None => message.to_string(),
    }
}

impl OnePasswordClient for OpCli {
    fn resolve(&self, reference: &str) -> BackendResult<String> {
        self.execute_op_command(&["read", "--no-newline", reference])
    }

    fn list_vaults(&self) -> BackendResult<Vec<VaultOverview>> {
        let output = self.execute_op_command(&["vault", "list", "--format", "json"])?;
        Ok(serde_json::from_str(&output)?)
    }

    fn list_items(&self, vault_id: &str) -> BackendResult<Vec<ItemOverview>> {
        let output =
            self.execute_op_command(&["item", "list", "--vault", vault_id, "--format", "json"])?;
        Ok(serde_json::from_str(&output)?)
    }

    fn get_item(&self, vault_id: &str, item_id: &str) -> BackendResult<Item> {
        let output = self.execute_op_command(&[
            "item", "get", item_id, "--vault", vault_id, "--format", "json",
        ])?;
        let item: CliItem = serde_json::from_str(&output)?;
        Ok(item.into())
    }

    fn create_item(&self, params: &ItemCreateParams) -> BackendResult<Item> {
        let template = ItemTemplate::new(&params.title, params.category, &params.fields, &params.tags);
        let output =
            self.execute_with_template(&["item", "create", "--vault", &params.vault_id], &template)?;
        let item: CliItem = serde_json::from_str(&output)?;
        Ok(item.into())
    }

    fn update_item(&self, item: &Item) -> BackendResult<Item> {
        let template = ItemTemplate::new(&item.title, item.category, &item.fields, &item.tags);
        let output = self.execute_with_template(
            &["item", "edit", &item.id, "--vault", &item.vault_id],
            &template,
        )?;
        let item: CliItem = serde_json::from_str(&output)?;
        Ok(item.into())
    }

    fn delete_item(&self, vault_id: &str, item_id: &str) -> BackendResult<()> {
        self.execute_op_command(&["item", "delete", item_id, "--vault", vault_id])?;
        Ok(())
    }
}
