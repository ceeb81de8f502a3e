//! Vaultbox CLI - interactive shell over an encrypted secret vault.
//!
//! The vault key only lives as long as this process, so all work happens in
//! one interactive session: unlock once, then create, read, update and delete
//! secrets until the vault is locked or auto-locks.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroizing;

use vaultbox_common::{Error, Outcome, SecretId};
use vaultbox_crypto::Salt;
use vaultbox_storage::{MemoryStore, SecretStore, SqliteStore};
use vaultbox_vault::{
    CreateSecretRequest, SecretService, UpdateSecretRequest, VaultSettings, VaultState,
};

#[derive(Parser)]
#[command(name = "vaultbox")]
#[command(about = "Vaultbox - Encrypted secret storage")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Settings file (JSON). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file. Secrets are kept in memory when omitted.
    #[arg(short, long)]
    db: Option<PathBuf>,
}

const HELP: &str = "\
Commands:
  unlock           Unlock the vault with the master password
  lock             Lock the vault and wipe the key from memory
  status           Show lock state and time until auto-lock
  add              Store a new secret
  get <id>         Show a secret
  list             List all secrets
  update <id>      Replace a secret's title, type and value
  rm <id>          Delete a secret
  help             Show this help
  quit             Lock and exit";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = match &cli.config {
        Some(path) => VaultSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => VaultSettings::default(),
    };

    let store: Arc<dyn SecretStore> = match &cli.db {
        Some(path) => Arc::new(
            SqliteStore::open(path)
                .with_context(|| format!("Failed to open database {}", path.display()))?,
        ),
        None => Arc::new(MemoryStore::new()),
    };

    let vault = Arc::new(VaultState::new(settings).context("Invalid vault settings")?);
    if let Some(salt_file) = &vault.settings().salt_file {
        restore_salt(&vault, salt_file).await?;
    }

    let service = SecretService::new(Arc::clone(&vault), store);
    info!(
        auto_lock_secs = vault.settings().auto_lock_secs,
        "Vaultbox ready"
    );

    run_shell(&service).await?;

    vault.lock().await;
    Ok(())
}

/// Read commands until EOF or `quit`.
async fn run_shell(service: &SecretService) -> Result<()> {
    println!("{}", HELP);

    loop {
        let Some(line) = read_line("vaultbox> ").await? else {
            break;
        };
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let arg = words.next();

        let outcome = match command {
            "unlock" => cmd_unlock(service).await,
            "lock" => cmd_lock(service).await,
            "status" => cmd_status(service).await,
            "add" => cmd_add(service).await,
            "get" => cmd_get(service, arg).await,
            "list" | "ls" => cmd_list(service).await,
            "update" => cmd_update(service, arg).await,
            "rm" | "delete" => cmd_remove(service, arg).await,
            "help" => {
                println!("{}", HELP);
                Ok(())
            }
            "quit" | "exit" => break,
            other => {
                println!("Unknown command: {} (try `help`)", other);
                Ok(())
            }
        };

        if let Err(err) = outcome {
            match err.downcast_ref::<Error>() {
                Some(vault_err) => println!("{}", describe(vault_err)),
                None => return Err(err),
            }
        }
    }

    Ok(())
}

/// Map a vault error onto what the user sees.
fn describe(err: &Error) -> String {
    match err.kind().outcome() {
        Outcome::Unauthorized => "Vault is locked; run `unlock` first".to_string(),
        Outcome::BadRequest | Outcome::NotFound => err.to_string(),
        Outcome::Internal => {
            error!(error = %err, "Operation failed");
            err.public_message()
        }
    }
}

/// Refuse secret operations while the vault is locked.
async fn require_unlocked(service: &SecretService) -> Result<(), Error> {
    if service.vault().is_unlocked().await {
        Ok(())
    } else {
        Err(Error::VaultLocked)
    }
}

fn parse_id(arg: Option<&str>) -> Result<SecretId, Error> {
    SecretId::parse(arg.unwrap_or_default())
}

async fn cmd_unlock(service: &SecretService) -> Result<()> {
    let password = read_hidden("Master password: ").await?;
    service.vault().unlock(password.as_bytes()).await?;

    if let Some(salt_file) = &service.vault().settings().salt_file {
        persist_salt(service.vault(), salt_file).await?;
    }

    println!("Vault unlocked");
    Ok(())
}

async fn cmd_lock(service: &SecretService) -> Result<()> {
    service.vault().lock().await;
    println!("Vault locked");
    Ok(())
}

async fn cmd_status(service: &SecretService) -> Result<()> {
    let status = service.vault().status().await;

    if !status.unlocked {
        println!("Locked");
        return Ok(());
    }

    println!("Unlocked");
    if let Some(last_activity) = status.last_activity {
        println!("  Last activity: {}", last_activity.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(remaining) = status.auto_lock_in {
        println!("  Auto-lock in:  {}m {}s", remaining.as_secs() / 60, remaining.as_secs() % 60);
    }
    Ok(())
}

async fn cmd_add(service: &SecretService) -> Result<()> {
    require_unlocked(service).await?;

    let title = read_required("Title: ").await?;
    let secret_type = read_required("Type: ").await?;
    let value = read_hidden("Value: ").await?;

    let request = CreateSecretRequest::new(title, secret_type, value.as_str());
    let created = service.create(&request).await?;

    println!("Created {}", created.id);
    Ok(())
}

async fn cmd_get(service: &SecretService, arg: Option<&str>) -> Result<()> {
    require_unlocked(service).await?;
    let id = parse_id(arg)?;

    let secret = service.get(&id).await?;
    println!("ID:      {}", secret.id);
    println!("Title:   {}", secret.title);
    println!("Type:    {}", secret.secret_type);
    println!("Value:   {}", secret.value);
    println!("Created: {}", secret.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Updated: {}", secret.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    Ok(())
}

async fn cmd_list(service: &SecretService) -> Result<()> {
    require_unlocked(service).await?;

    let secrets = service.list().await?;
    if secrets.is_empty() {
        println!("(no secrets)");
        return Ok(());
    }

    for secret in &secrets {
        println!("{}  {:<12}  {}", secret.id, secret.secret_type, secret.title);
    }
    println!("\n{} secret(s)", secrets.len());
    Ok(())
}

async fn cmd_update(service: &SecretService, arg: Option<&str>) -> Result<()> {
    require_unlocked(service).await?;
    let id = parse_id(arg)?;

    let title = read_required("New title: ").await?;
    let secret_type = read_required("New type: ").await?;
    let value = read_hidden("New value: ").await?;

    let request = UpdateSecretRequest::new(title, secret_type, value.as_str());
    let updated = service.update(&id, &request).await?;

    println!("Updated {}", updated.id);
    Ok(())
}

async fn cmd_remove(service: &SecretService, arg: Option<&str>) -> Result<()> {
    require_unlocked(service).await?;
    let id = parse_id(arg)?;

    service.delete(&id).await?;
    println!("Deleted {}", id);
    Ok(())
}

/// Load a previously persisted salt, if the file exists.
async fn restore_salt(vault: &VaultState, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read salt file {}", path.display()))?;
    let salt = Salt::from_slice(&bytes)
        .with_context(|| format!("Corrupt salt file {}", path.display()))?;
    vault.restore_salt(salt).await?;

    info!(path = %path.display(), "Salt restored from file");
    Ok(())
}

/// Write the vault salt to `path` unless it is already there.
async fn persist_salt(vault: &VaultState, path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    let Some(salt) = vault.salt().await else {
        return Ok(());
    };

    tokio::fs::write(path, salt.as_bytes())
        .await
        .with_context(|| format!("Failed to write salt file {}", path.display()))?;

    info!(path = %path.display(), "Salt persisted to file");
    Ok(())
}

/// Prompt and read one line from stdin; `None` on EOF.
async fn read_line(prompt: &'static str) -> Result<Option<String>> {
    tokio::task::spawn_blocking(move || -> Result<Option<String>> {
        use std::io::Write;

        print!("{}", prompt);
        std::io::stdout().flush()?;

        let mut line = String::new();
        let read = std::io::stdin().read_line(&mut line)?;
        Ok(if read == 0 {
            None
        } else {
            Some(line.trim().to_string())
        })
    })
    .await
    .context("Input task failed")?
}

/// Prompt until a non-empty line is entered.
async fn read_required(prompt: &'static str) -> Result<String> {
    loop {
        match read_line(prompt).await? {
            Some(line) if !line.is_empty() => return Ok(line),
            Some(_) => continue,
            None => anyhow::bail!("Unexpected end of input"),
        }
    }
}

/// Prompt for input without echo.
async fn read_hidden(prompt: &'static str) -> Result<Zeroizing<String>> {
    let value = tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
        .await
        .context("Input task failed")?
        .context("Failed to read input")?;
    Ok(Zeroizing::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultbox_common::DecryptionFailure;

    #[test]
    fn test_describe_locked() {
        assert_eq!(
            describe(&Error::VaultLocked),
            "Vault is locked; run `unlock` first"
        );
    }

    #[test]
    fn test_describe_hides_internal_detail() {
        let err = Error::Storage("/var/lib/vaultbox/secrets.db is locked".to_string());
        assert_eq!(describe(&err), "Internal error");

        let err = Error::Decryption(DecryptionFailure::Integrity);
        assert_eq!(describe(&err), "Internal error");
    }

    #[test]
    fn test_describe_passes_validation_through() {
        let err = Error::Validation("title is required".to_string());
        assert_eq!(describe(&err), "Validation failed: title is required");
    }

    #[test]
    fn test_parse_id_requires_argument() {
        assert!(parse_id(None).is_err());
        assert!(parse_id(Some("nope")).is_err());

        let id = SecretId::new();
        assert_eq!(parse_id(Some(&id.to_string())).unwrap(), id);
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from(["vaultbox", "-v", "--db", "secrets.db"]);
        assert!(cli.verbose);
        assert_eq!(cli.db, Some(PathBuf::from("secrets.db")));
        assert!(cli.config.is_none());
    }

    #[tokio::test]
    async fn test_require_unlocked_gate() {
        let settings = VaultSettings {
            kdf: vaultbox_crypto::KdfParams::lightweight(),
            ..VaultSettings::default()
        };
        let vault = Arc::new(VaultState::new(settings).unwrap());
        let service = SecretService::new(Arc::clone(&vault), Arc::new(MemoryStore::new()));

        assert!(matches!(
            require_unlocked(&service).await,
            Err(Error::VaultLocked)
        ));
        vault.unlock(b"hunter2").await.unwrap();
        assert!(require_unlocked(&service).await.is_ok());
    }

    #[tokio::test]
    async fn test_salt_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("salt");
        let settings = VaultSettings {
            kdf: vaultbox_crypto::KdfParams::lightweight(),
            ..VaultSettings::default()
        };

        let first = VaultState::new(settings.clone()).unwrap();
        first.unlock(b"hunter2").await.unwrap();
        persist_salt(&first, &path).await.unwrap();
        let key1 = first.get_key().await.unwrap();

        let second = VaultState::new(settings).unwrap();
        restore_salt(&second, &path).await.unwrap();
        second.unlock(b"hunter2").await.unwrap();
        let key2 = second.get_key().await.unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }
}
