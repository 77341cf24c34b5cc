//! # Command line
//!
//! `init`, `create-admin`, `import`, `status`, `export` and `serve`. Every
//! command takes the database path from `--db` (or `LOOTO_DB`).

use crate::api::{self, AppState};
use crate::config::{ServeArgs, ServerConfig};
use chrono::Duration;
use clap::{Parser, Subcommand};
use looto_core::export::ExportKind;
use looto_core::query::DateWindow;
use looto_core::storage::CollectionCounts;
use looto_core::{AdminProfile, Amount, Backoffice, Evidence, LootoError, Role, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Core(#[from] LootoError),
    #[error("database already exists at {0} (use --force to overwrite)")]
    AlreadyExists(PathBuf),
    #[error("import failed: {0}")]
    Import(String),
    #[error("server error: {0}")]
    Server(String),
}

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Parser)]
#[command(name = "looto-admin", version, about = "Ludo Looto back-office")]
pub struct Cli {
    /// Path of the redb database file.
    #[arg(long, global = true, env = "LOOTO_DB", default_value = "looto.redb")]
    pub db: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an empty database.
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Add a back-office account.
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long, env = "LOOTO_ADMIN_PASSWORD")]
        password: String,
        /// super_admin, admin or moderator.
        #[arg(long, default_value = "admin")]
        role: String,
    },
    /// Load users, rooms and requests from a JSON fixture.
    Import {
        file: PathBuf,
    },
    /// Print document counts.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Dump users, transactions or rooms as JSON.
    Export {
        kind: String,
        #[arg(long)]
        start_date: Option<String>,
        #[arg(long)]
        end_date: Option<String>,
        /// Write to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Run the HTTP API.
    Serve(ServeArgs),
}

pub async fn run(cli: Cli) -> CliResult<()> {
    let db = cli.db;
    match cli.command {
        Command::Init { force } => cmd_init(&db, force),
        Command::CreateAdmin {
            username,
            password,
            role,
        } => cmd_create_admin(&db, &username, &password, &role).map(|profile| {
            println!("Created {} '{}' (id {})", profile.role, profile.username, profile.id);
        }),
        Command::Import { file } => cmd_import(&db, &file).map(|summary| {
            println!(
                "Imported {} users, {} rooms, {} winner requests, {} withdrawals",
                summary.users, summary.rooms, summary.winner_requests, summary.withdrawals
            );
        }),
        Command::Status { json } => cmd_status(&db, json).map(|_| ()),
        Command::Export {
            kind,
            start_date,
            end_date,
            output,
        } => cmd_export(
            &db,
            &kind,
            start_date.as_deref(),
            end_date.as_deref(),
            output.as_deref(),
        )
        .map(|_| ()),
        Command::Serve(args) => cmd_serve(&db, ServerConfig::from(args)).await,
    }
}

// =============================================================================
// INIT / ADMINS
// =============================================================================

pub fn cmd_init(db: &Path, force: bool) -> CliResult<()> {
    if db.exists() {
        if !force {
            return Err(CliError::AlreadyExists(db.to_path_buf()));
        }
        std::fs::remove_file(db)?;
    }
    Backoffice::open(db)?;
    tracing::info!(path = %db.display(), "database initialized");
    println!("Initialized database at {}", db.display());
    Ok(())
}

pub fn cmd_create_admin(
    db: &Path,
    username: &str,
    password: &str,
    role: &str,
) -> CliResult<AdminProfile> {
    let role: Role = role.parse()?;
    let office = Backoffice::open(db)?;
    Ok(office.create_admin(username, password, role)?)
}

// =============================================================================
// IMPORT
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fixture {
    pub users: Vec<FixtureUser>,
    pub rooms: Vec<FixtureRoom>,
    pub winner_requests: Vec<FixtureClaim>,
    pub withdrawals: Vec<FixtureWithdrawal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureUser {
    pub name: String,
    pub phone: String,
    /// Paise.
    #[serde(default)]
    pub deposit: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureRoom {
    pub code: String,
    pub game_type: String,
    pub entry_fee: Amount,
    pub max_players: u8,
    /// Creator's phone.
    pub creator: String,
    /// Phones of the players to seat, in join order.
    #[serde(default)]
    pub players: Vec<String>,
    #[serde(default)]
    pub start: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureClaim {
    pub room: String,
    pub declared_by: String,
    pub winner: String,
    pub fee_percent: u8,
    #[serde(default)]
    pub evidence: Option<Evidence>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureWithdrawal {
    pub user: String,
    pub amount: Amount,
    pub upi_id: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub users: usize,
    pub rooms: usize,
    pub winner_requests: usize,
    pub withdrawals: usize,
}

pub fn cmd_import(db: &Path, file: &Path) -> CliResult<ImportSummary> {
    let fixture: Fixture = serde_json::from_str(&std::fs::read_to_string(file)?)?;
    let office = Backoffice::open(db)?;
    let summary = import_fixture(&office, &fixture)?;
    tracing::info!(path = %file.display(), users = summary.users, rooms = summary.rooms, "fixture imported");
    Ok(summary)
}

/// Replay a fixture through the intake operations. Users are referenced by phone.
pub fn import_fixture(office: &Backoffice, fixture: &Fixture) -> CliResult<ImportSummary> {
    let mut phones: HashMap<&str, UserId> = HashMap::new();
    let mut summary = ImportSummary::default();

    for entry in &fixture.users {
        let user = office.register_user(&entry.name, &entry.phone)?;
        if entry.deposit > 0 {
            office.deposit(user.id, entry.deposit)?;
        }
        phones.insert(entry.phone.trim(), user.id);
        summary.users += 1;
    }

    let lookup = |phone: &str| {
        phones
            .get(phone.trim())
            .copied()
            .ok_or_else(|| CliError::Import(format!("unknown user phone '{}'", phone)))
    };

    for entry in &fixture.rooms {
        let creator = lookup(&entry.creator)?;
        office.create_room(
            &entry.code,
            &entry.game_type,
            entry.entry_fee,
            entry.max_players,
            creator,
        )?;
        for phone in &entry.players {
            office.join_room(&entry.code, lookup(phone)?)?;
        }
        if entry.start {
            office.start_room(&entry.code)?;
        }
        summary.rooms += 1;
    }

    for entry in &fixture.winner_requests {
        office.file_winner_request(
            &entry.room,
            lookup(&entry.declared_by)?,
            lookup(&entry.winner)?,
            entry.fee_percent,
            entry.evidence.clone(),
        )?;
        summary.winner_requests += 1;
    }

    for entry in &fixture.withdrawals {
        office.file_withdrawal(lookup(&entry.user)?, entry.amount, &entry.upi_id)?;
        summary.withdrawals += 1;
    }

    Ok(summary)
}

// =============================================================================
// STATUS / EXPORT
// =============================================================================

pub fn cmd_status(db: &Path, json: bool) -> CliResult<CollectionCounts> {
    let office = Backoffice::open(db)?;
    let counts = office.store().counts()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    } else {
        println!("Database: {}", db.display());
        println!("  users:               {}", counts.users);
        println!("  rooms:               {}", counts.rooms);
        println!("  transactions:        {}", counts.transactions);
        println!("  winner requests:     {}", counts.winner_requests);
        println!("  withdrawal requests: {}", counts.withdrawal_requests);
        println!("  admins:              {}", counts.admins);
    }
    Ok(counts)
}

/// Returns the number of exported rows.
pub fn cmd_export(
    db: &Path,
    kind: &str,
    start: Option<&str>,
    end: Option<&str>,
    output: Option<&Path>,
) -> CliResult<usize> {
    let kind: ExportKind = kind.parse()?;
    let window = DateWindow::parse(start, end)?;
    let office = Backoffice::open(db)?;
    let data = office.export(kind, window)?;
    let rendered = serde_json::to_string_pretty(&data)?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            eprintln!("Exported {} {} to {}", data.len(), kind, path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(data.len())
}

// =============================================================================
// SERVE
// =============================================================================

pub async fn cmd_serve(db: &Path, config: ServerConfig) -> CliResult<()> {
    let ttl = Duration::try_hours(config.session_ttl_hours)
        .ok_or_else(|| LootoError::invalid_input("Session lifetime is out of range"))?;
    let office = Backoffice::open(db)?.with_session_ttl(ttl);
    let state = AppState::new(office, config.login_rate_per_minute);
    let app = api::router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %config.bind, db = %db.display(), "back-office listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CliError::Server(e.to_string()))?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
