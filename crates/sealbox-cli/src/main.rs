//! `sealbox`: command-line front end for the local secret store.
//!
//! Passwords come from `SEALBOX_MASTER_PASSWORD` / `SEALBOX_NEW_MASTER_PASSWORD`
//! when set, otherwise from a hidden terminal prompt. Secret values likewise
//! come from `SEALBOX_SECRET_VALUE` or a prompt. Output is JSON on stdout.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use sb_store::{CredentialProvider, SecretMeta, SecretStore, StoreConfig, StoreError};
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

const MASTER_PASSWORD_ENV: &str = "SEALBOX_MASTER_PASSWORD";
const NEW_MASTER_PASSWORD_ENV: &str = "SEALBOX_NEW_MASTER_PASSWORD";
const SECRET_VALUE_ENV: &str = "SEALBOX_SECRET_VALUE";

#[derive(Parser)]
#[command(name = "sealbox")]
#[command(about = "Local encrypted secret manager", long_about = None)]
struct Cli {
    /// Data directory (defaults to SEALBOX_DATA_DIR or the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the master password for a new store
    Init,

    /// Show whether the store is configured
    Status,

    /// Check a password against the master password
    Verify,

    /// Store a new secret
    Add {
        label: String,
        /// Secret type
        #[arg(short = 't', long = "type", default_value = "password")]
        kind: String,
    },

    /// Print a secret by id or label
    Get { id_or_label: String },

    /// Replace the value of a secret
    Update { id: String },

    /// Delete a secret
    Delete { id: String },

    /// List all secrets (metadata only)
    List,

    /// Search secrets by label
    Search { query: String },

    /// Change the master password and re-encrypt every secret
    Rotate,
}

/// Environment variable first, then a hidden prompt.
struct PromptCredential {
    env_var: &'static str,
    confirm: bool,
}

impl PromptCredential {
    fn once(env_var: &'static str) -> Self {
        Self {
            env_var,
            confirm: false,
        }
    }

    fn twice(env_var: &'static str) -> Self {
        Self {
            env_var,
            confirm: true,
        }
    }
}

impl CredentialProvider for PromptCredential {
    fn password(&self, purpose: &str) -> Result<Zeroizing<String>, StoreError> {
        if let Ok(pw) = std::env::var(self.env_var) {
            if !pw.is_empty() {
                return Ok(Zeroizing::new(pw));
            }
        }
        let first = prompt(&format!("Enter {purpose}: "))?;
        if self.confirm {
            let second = prompt("Confirm: ")?;
            if *first != *second {
                return Err(StoreError::InvalidInput("passwords do not match".into()));
            }
        }
        Ok(first)
    }
}

fn prompt(text: &str) -> Result<Zeroizing<String>, StoreError> {
    rpassword::prompt_password(text)
        .map(Zeroizing::new)
        .map_err(|e| StoreError::InvalidInput(format!("password prompt: {e}")))
}

fn secret_value() -> Result<Zeroizing<String>> {
    if let Ok(value) = std::env::var(SECRET_VALUE_ENV) {
        if !value.is_empty() {
            return Ok(Zeroizing::new(value));
        }
    }
    Ok(prompt("Secret value: ")?)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Local wall-clock rendering of epoch seconds, `YYYY-MM-DD HH:MM:SS`.
fn local_date(secs: i64) -> Option<String> {
    Local
        .timestamp_opt(secs, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn listing(secrets: &[SecretMeta]) -> serde_json::Value {
    secrets
        .iter()
        .map(|meta| {
            json!({
                "id": meta.id,
                "label": meta.label,
                "type": meta.kind,
                "creation_time": meta.creation_time,
                "update_time": meta.update_time,
                "creation_date": local_date(meta.creation_time),
                "update_date": local_date(meta.update_time),
            })
        })
        .collect()
}

async fn unlock(store: &SecretStore) -> Result<()> {
    if !store.is_master_configured().await? {
        return Err(anyhow!("no master password set; run `sealbox init` first"));
    }
    store
        .activate_session_with(&PromptCredential::once(MASTER_PASSWORD_ENV))
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sealbox=info,sb_store=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = StoreConfig::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    debug!(path = %config.db_path().display(), "opening store");
    let store = SecretStore::open(&config).await?;

    match cli.command {
        Commands::Init => {
            store
                .set_master_password_with(&PromptCredential::twice(MASTER_PASSWORD_ENV))
                .await?;
            print_json(&json!({ "configured": true }))?;
        }

        Commands::Status => {
            print_json(&json!({
                "state": store.status().await?,
                "data_dir": config.data_dir.display().to_string(),
            }))?;
        }

        Commands::Verify => {
            let password = PromptCredential::once(MASTER_PASSWORD_ENV).password("master password")?;
            let valid = store.verify_master_password(&password).await?;
            print_json(&json!({ "valid": valid }))?;
        }

        Commands::Add { label, kind } => {
            unlock(&store).await?;
            let value = secret_value()?;
            let id = store.create_secret(&label, &value, &kind).await?;
            print_json(&json!({ "id": id, "label": label, "type": kind }))?;
        }

        Commands::Get { id_or_label } => {
            unlock(&store).await?;
            let secret = store.get_secret(&id_or_label).await?;
            print_json(&json!({
                "type": secret.kind,
                "value": secret.value.as_str(),
            }))?;
        }

        Commands::Update { id } => {
            unlock(&store).await?;
            let value = secret_value()?;
            store.update_secret(&id, &value).await?;
            print_json(&json!({ "updated": id }))?;
        }

        Commands::Delete { id } => {
            unlock(&store).await?;
            store.delete_secret(&id).await?;
            print_json(&json!({ "deleted": id }))?;
        }

        Commands::List => {
            unlock(&store).await?;
            print_json(&listing(&store.list_secrets().await?))?;
        }

        Commands::Search { query } => {
            unlock(&store).await?;
            print_json(&listing(&store.search_secrets(&query).await?))?;
        }

        Commands::Rotate => {
            let old = PromptCredential::once(MASTER_PASSWORD_ENV).password("current master password")?;
            let new = PromptCredential::twice(NEW_MASTER_PASSWORD_ENV).password("new master password")?;
            store.rotate_master_password(&old, &new).await?;
            print_json(&json!({ "rotated": true }))?;
        }
    }

    store.lock_session().await;
    Ok(())
}
