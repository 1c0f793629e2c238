//! `yonote` CLI: maintenance commands for a `yonote` deployment.
//!
//! `clean`, `migrate` work directly on the storage backend and must run with
//! the same encryption settings as the server. `health` talks to a running
//! server over HTTP. `hash-password` needs neither.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::io::BufRead as _;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::debug;

use yonote_core::crypto::{ContentCipher, DEV_PASSPHRASE, DEV_SALT};
use yonote_core::note::NoteStore;
use yonote_core::password::{DEFAULT_ITERATIONS, MAX_ITERATIONS, hash_password_with_iterations};
use yonote_core::sweeper::{SweepOptions, sweep_empty_notes};
use yonote_core::time::{format_timestamp, now};
use yonote_storage::{MemoryBackend, StorageBackend};

// ── ANSI color helpers ───────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

// ── CLI structure ────────────────────────────────────────────────────

/// yonote: maintenance for a self-hosted note service.
#[derive(Parser)]
#[command(
    name = "yonote",
    version,
    about = "yonote CLI: sweep empty notes, migrate plaintext notes, hash admin passwords",
    long_about = None,
    after_help = format!(
        "{DIM}Environment variables:{RESET}\n  \
         YONOTE_STORAGE          memory, redb, rocksdb, or postgres (default: redb)\n  \
         YONOTE_STORAGE_PATH     Path for redb/rocksdb (default: ./data)\n  \
         DATABASE_URL            PostgreSQL connection string\n  \
         YONOTE_ENCRYPTION_KEY   Content key passphrase (must match the server)\n  \
         YONOTE_ENCRYPTION_SALT  Content key salt (must match the server)\n\n\
         {DIM}Examples:{RESET}\n  \
         yonote clean --dry-run\n  \
         yonote clean --max-age-hours 48\n  \
         yonote migrate\n  \
         yonote hash-password --password 'hunter2'\n  \
         yonote health --addr http://127.0.0.1:5005"
    ),
)]
struct Cli {
    /// Storage backend.
    #[arg(long, global = true, env = "YONOTE_STORAGE", value_enum, default_value = "redb")]
    storage: StorageKind,

    /// Path for the redb or RocksDB backend.
    #[arg(long, global = true, env = "YONOTE_STORAGE_PATH", default_value = "./data")]
    storage_path: String,

    /// PostgreSQL connection string.
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Content key passphrase.
    #[arg(long, global = true, env = "YONOTE_ENCRYPTION_KEY", hide_env_values = true)]
    encryption_key: Option<String>,

    /// Content key salt.
    #[arg(long, global = true, env = "YONOTE_ENCRYPTION_SALT", hide_env_values = true)]
    encryption_salt: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StorageKind {
    Memory,
    Redb,
    Rocksdb,
    #[value(alias = "postgresql")]
    Postgres,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete notes whose content is blank.
    Clean {
        /// Only notes created at least this many hours ago.
        #[arg(long, default_value_t = 24)]
        max_age_hours: i64,
        /// List what would be deleted without deleting.
        #[arg(long)]
        dry_run: bool,
    },
    /// Encrypt every note still stored as plaintext.
    Migrate,
    /// Print a password hash for YONOTE_ADMIN_PASSWORD_HASH.
    HashPassword {
        /// Password to hash. Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
        /// PBKDF2 iterations.
        #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
        iterations: u32,
    },
    /// Check a running server's health endpoint.
    Health {
        /// Server address.
        #[arg(long, env = "YONOTE_ADDR", default_value = "http://127.0.0.1:5005")]
        addr: String,
    },
}

// ── Pretty output helpers ────────────────────────────────────────────

fn header(title: &str) {
    println!("{BOLD}{CYAN}{title}{RESET}");
    println!("{DIM}─────────────────────────────────────────{RESET}");
}

fn kv_line(key: &str, value: &str) {
    println!("  {DIM}{key:<20}{RESET} {WHITE}{value}{RESET}");
}

fn success(msg: &str) {
    println!("{GREEN}{BOLD}✓{RESET} {msg}");
}

fn warning(msg: &str) {
    println!("{YELLOW}{BOLD}⚠{RESET} {YELLOW}{msg}{RESET}");
}

// ── Command dispatch ─────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("  {RED}{BOLD}✗ Error:{RESET} {e:#}");
            eprintln!();
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Clean {
            max_age_hours,
            dry_run,
        } => {
            let store = open_store(&cli_store_args(&cli)).await?;
            cmd_clean(&store, *max_age_hours, *dry_run).await
        }
        Commands::Migrate => {
            let store = open_store(&cli_store_args(&cli)).await?;
            cmd_migrate(&store).await
        }
        Commands::HashPassword {
            password,
            iterations,
        } => cmd_hash_password(password.as_deref(), *iterations),
        Commands::Health { addr } => cmd_health(addr).await,
    }
}

// ── Storage ──────────────────────────────────────────────────────────

struct StoreArgs {
    kind: StorageKind,
    path: String,
    database_url: Option<String>,
    passphrase: String,
    salt: String,
}

fn cli_store_args(cli: &Cli) -> StoreArgs {
    let passphrase = cli.encryption_key.clone().unwrap_or_else(|| {
        warning("YONOTE_ENCRYPTION_KEY not set, using the development key");
        DEV_PASSPHRASE.to_owned()
    });
    let salt = cli.encryption_salt.clone().unwrap_or_else(|| {
        warning("YONOTE_ENCRYPTION_SALT not set, using the development salt");
        DEV_SALT.to_owned()
    });
    StoreArgs {
        kind: cli.storage,
        path: cli.storage_path.clone(),
        database_url: cli.database_url.clone(),
        passphrase,
        salt,
    }
}

async fn open_backend(args: &StoreArgs) -> Result<Arc<dyn StorageBackend>> {
    debug!(kind = ?args.kind, path = %args.path, "opening storage");
    let storage: Arc<dyn StorageBackend> = match args.kind {
        StorageKind::Memory => {
            warning("in-memory storage is empty on every run; nothing to do");
            Arc::new(MemoryBackend::new())
        }
        #[cfg(feature = "redb-backend")]
        StorageKind::Redb => Arc::new(
            yonote_storage::RedbBackend::open(&args.path)
                .with_context(|| format!("failed to open redb storage at {}", args.path))?,
        ),
        #[cfg(not(feature = "redb-backend"))]
        StorageKind::Redb => bail!("redb backend requested but feature 'redb-backend' is not enabled"),
        #[cfg(feature = "rocksdb-backend")]
        StorageKind::Rocksdb => Arc::new(
            yonote_storage::RocksDbBackend::open(&args.path)
                .with_context(|| format!("failed to open RocksDB storage at {}", args.path))?,
        ),
        #[cfg(not(feature = "rocksdb-backend"))]
        StorageKind::Rocksdb => {
            bail!("RocksDB backend requested but feature 'rocksdb-backend' is not enabled")
        }
        #[cfg(feature = "postgres-backend")]
        StorageKind::Postgres => {
            let url = args
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            Arc::new(
                yonote_storage::PostgresBackend::connect(url)
                    .await
                    .context("failed to connect to PostgreSQL storage")?,
            )
        }
        #[cfg(not(feature = "postgres-backend"))]
        StorageKind::Postgres => {
            bail!("PostgreSQL backend requested but feature 'postgres-backend' is not enabled")
        }
    };
    Ok(storage)
}

async fn open_store(args: &StoreArgs) -> Result<NoteStore> {
    let storage = open_backend(args).await?;
    let cipher = ContentCipher::from_passphrase(&args.passphrase, &args.salt);
    Ok(NoteStore::new(storage, cipher))
}

// ── Commands ─────────────────────────────────────────────────────────

async fn cmd_clean(store: &NoteStore, max_age_hours: i64, dry_run: bool) -> Result<()> {
    if max_age_hours < 0 {
        bail!("--max-age-hours must not be negative");
    }
    let options = SweepOptions {
        max_age_secs: Some(max_age_hours.saturating_mul(3600)),
        dry_run,
    };
    let report = sweep_empty_notes(store, options, now())
        .await
        .context("sweep failed")?;

    println!();
    header(if dry_run { "Empty notes (dry run)" } else { "Empty notes" });
    kv_line("Scanned", &report.scanned.to_string());
    kv_line("Older than", &format!("{max_age_hours}h"));
    for key in &report.deleted {
        println!("  {DIM}-{RESET} {key}");
    }
    println!();

    let count = report.deleted.len();
    if dry_run {
        success(&format!("{count} empty note(s) would be deleted"));
    } else {
        success(&format!("{count} empty note(s) deleted"));
    }
    Ok(())
}

async fn cmd_migrate(store: &NoteStore) -> Result<()> {
    let migrated = store
        .encrypt_plaintext_notes()
        .await
        .context("migration failed")?;

    // Every note should open with the configured key now.
    let mut unreadable = Vec::new();
    for note in store.list().await.context("failed to list notes")? {
        if store.try_content(&note).is_err() {
            unreadable.push(note.key);
        }
    }

    println!();
    header("Encryption migration");
    kv_line("Encrypted now", &migrated.to_string());
    kv_line("Unreadable", &unreadable.len().to_string());
    println!();

    if unreadable.is_empty() {
        success("all notes are encrypted and readable");
        return Ok(());
    }
    for key in &unreadable {
        println!("  {RED}-{RESET} {key}");
    }
    bail!(
        "{} note(s) cannot be decrypted with the configured key",
        unreadable.len()
    )
}

fn cmd_hash_password(password: Option<&str>, iterations: u32) -> Result<()> {
    if iterations == 0 || iterations > MAX_ITERATIONS {
        bail!("--iterations must be between 1 and {MAX_ITERATIONS}");
    }
    let password = match password {
        Some(p) => p.to_owned(),
        None => {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("failed to read password from stdin")?;
            line.trim_end_matches(['\r', '\n']).to_owned()
        }
    };
    if password.is_empty() {
        bail!("password must not be empty");
    }
    println!("{}", hash_password_with_iterations(&password, iterations));
    Ok(())
}

async fn cmd_health(addr: &str) -> Result<()> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("failed to build HTTP client")?;
    let url = format!("{}/api/health", addr.trim_end_matches('/'));
    let resp = http
        .get(&url)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?;

    let status = resp.status();
    let body = resp.text().await.context("failed to read response body")?;
    if !status.is_success() {
        bail!("server returned {status}: {body}");
    }
    let health: Value = serde_json::from_str(&body).context("failed to parse response JSON")?;

    let field = |name: &str| health.get(name).and_then(Value::as_str).unwrap_or("unknown");
    println!();
    header("yonote health");
    kv_line("Address", addr);
    kv_line("Status", field("status"));
    kv_line("Environment", field("environment"));
    if let Some(ts) = health.get("timestamp").and_then(Value::as_i64) {
        kv_line("Server time", &format_timestamp(ts));
    }
    println!();

    if field("status") == "ok" {
        success("server is healthy");
        Ok(())
    } else {
        bail!("server reported status {}", field("status"))
    }
}
