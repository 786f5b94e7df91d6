use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use colored::Colorize;
use directories::ProjectDirs;
use opvault::Secret;
use opvault::provider::{Provider, providers};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Main CLI structure for the opvault application.
#[derive(Parser)]
#[command(name = "opvault")]
#[command(about = "Path-addressed access to 1Password secrets", long_about = None)]
#[command(version)]
struct Cli {
    /// Provider URI to use (e.g., onepassword://Private)
    #[arg(short, long, global = true, env = "OPVAULT_PROVIDER")]
    provider: Option<String>,

    /// The subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a secret
    Get {
        /// Secret path, e.g. Private/database or Private/database/password
        path: String,
        /// Print the whole secret, fields and metadata included, as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create or update a secret
    Set {
        /// Secret path
        path: String,
        /// Value of the secret (will prompt if neither a value nor fields are given)
        value: Option<String>,
        /// Named field, repeatable
        #[arg(short, long = "field", value_name = "NAME=VALUE", value_parser = parse_field)]
        fields: Vec<(String, String)>,
        /// Tag, repeatable
        #[arg(short, long = "tag", value_name = "KEY[:VALUE]", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },
    /// Delete a secret
    Delete {
        /// Secret path
        path: String,
    },
    /// Exit with status 0 if the secret exists, 1 otherwise
    Exists {
        /// Secret path
        path: String,
    },
    /// List secret paths
    List {
        /// Only list paths starting with this prefix
        prefix: Option<String>,
    },
    /// Init or show the user configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the user configuration with a default provider
    Init {
        /// Provider URI to use by default
        provider: String,
    },
    /// Show current configuration
    Show,
}

/// Contents of the user's `config.toml`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct GlobalConfig {
    #[serde(default)]
    defaults: DefaultConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DefaultConfig {
    /// Provider URI used when `--provider` is not given
    provider: Option<String>,
}

/// Get the path to the user's configuration file.
///
/// Typically `~/.config/opvault/config.toml` on Linux.
fn get_config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "opvault")
        .ok_or_else(|| eyre!("Could not find config directory"))?;
    Ok(dirs.config_dir().join("config.toml"))
}

/// Loads the configuration at `path`, or `None` if there is no file.
fn load_global_config(path: &Path) -> Result<Option<GlobalConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    let config = toml::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(config))
}

/// Writes `config` to `path`, creating parent directories if necessary.
fn save_global_config(path: &Path, config: &GlobalConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml::to_string_pretty(config)?)?;
    Ok(())
}

/// The provider URI from the command line, or else from the configuration file.
fn resolve_provider_uri(flag: Option<String>, config: Option<&GlobalConfig>) -> Result<String> {
    flag.or_else(|| config.and_then(|c| c.defaults.provider.clone()))
        .ok_or_else(|| {
            eyre!(
                "No provider configured. Pass --provider, set OPVAULT_PROVIDER, or run 'opvault config init <uri>'"
            )
        })
}

fn parse_field(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{}'", s)),
    }
}

fn parse_tag(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s.split_once(':').unwrap_or((s, ""));
    if key.is_empty() {
        return Err(format!("expected KEY[:VALUE], got '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Builds the secret to store from the `set` arguments.
fn build_secret(
    value: Option<String>,
    fields: Vec<(String, String)>,
    tags: Vec<(String, String)>,
) -> Secret {
    let mut secret = Secret::from_fields(fields);
    if let Some(value) = value {
        secret.value = value;
    }
    for (key, value) in tags {
        secret = secret.with_tag(key, value);
    }
    secret
}

fn open_provider(flag: Option<String>) -> Result<Box<dyn Provider>> {
    let config = load_global_config(&get_config_path()?)?;
    let uri = resolve_provider_uri(flag, config.as_ref())?;
    Box::<dyn Provider>::try_from(uri.as_str())
        .wrap_err_with(|| format!("Failed to open provider '{}'", uri))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("OPVAULT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Init { provider } => {
                let config = GlobalConfig {
                    defaults: DefaultConfig {
                        provider: Some(provider),
                    },
                };
                let path = get_config_path()?;
                save_global_config(&path, &config)?;
                println!("{} Configuration saved to {}", "✓".green(), path.display());
                Ok(())
            }
            ConfigAction::Show => {
                let path = get_config_path()?;
                match load_global_config(&path)? {
                    Some(config) => {
                        println!("Configuration file: {}\n", path.display());
                        match config.defaults.provider {
                            Some(provider) => println!("Provider: {}", provider),
                            None => println!("Provider: (none)"),
                        }
                    }
                    None => {
                        println!(
                            "No configuration found. Run 'opvault config init <uri>' to create one."
                        );
                    }
                }
                println!("\nAvailable providers:");
                for info in providers() {
                    println!("  {}", info.display_with_examples());
                }
                Ok(())
            }
        },
        Commands::Get { path, json } => {
            let provider = open_provider(cli.provider)?;
            let secret = provider.get(&path).wrap_err("Failed to get secret")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&secret)?);
            } else {
                println!("{}", secret.value);
            }
            provider.close()?;
            Ok(())
        }
        Commands::Set {
            path,
            value,
            fields,
            tags,
        } => {
            let provider = open_provider(cli.provider)?;
            let value = match value {
                None if fields.is_empty() => Some(
                    rpassword::prompt_password(format!("Enter value for {}: ", path))
                        .wrap_err("Failed to read value")?,
                ),
                value => value,
            };

            let secret = build_secret(value, fields, tags);
            provider.set(&path, &secret).wrap_err("Failed to set secret")?;
            provider.close()?;
            println!("{} Secret '{}' saved to {}", "✓".green(), path, provider.name());
            Ok(())
        }
        Commands::Delete { path } => {
            let provider = open_provider(cli.provider)?;
            provider.delete(&path).wrap_err("Failed to delete secret")?;
            provider.close()?;
            println!("{} Secret '{}' deleted", "✓".green(), path);
            Ok(())
        }
        Commands::Exists { path } => {
            let provider = open_provider(cli.provider)?;
            let exists = provider.exists(&path).wrap_err("Failed to check secret")?;
            provider.close()?;
            if !exists {
                eprintln!("{} Secret '{}' not found", "✗".red(), path);
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::List { prefix } => {
            let provider = open_provider(cli.provider)?;
            let mut paths = provider
                .list(prefix.as_deref().unwrap_or_default())
                .wrap_err("Failed to list secrets")?;
            provider.close()?;
            paths.sort();
            for path in paths {
                println!("{}", path);
            }
            Ok(())
        }
    }
}
