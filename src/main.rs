//! harvest-sync: mirror a Harvest account into SQLite
//!
//! Each invocation performs one run: fetch everything, reconcile it into the
//! local store, archive what changed or vanished, commit. Schedule it with
//! cron or a systemd timer.

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use harvest_sync::model::{Client, DayEntry, Expense, Invoice, Project, Task, TaskAssignment, User};
use harvest_sync::{Config, Entity, EntityKind, HarvestClient, Store, SyncCoordinator};

#[derive(Parser)]
#[command(name = "harvest-sync")]
#[command(about = "Mirror a Harvest account into SQLite with full change history")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "harvest-sync.toml", env = "HARVEST_SYNC_CONFIG")]
    config: PathBuf,

    /// Account URI, e.g. https://acme.harvestapp.com
    #[arg(long, env = "HARVEST_DOMAIN")]
    domain: Option<String>,

    #[arg(short, long, env = "HARVEST_USER")]
    user: Option<String>,

    #[arg(short, long, env = "HARVEST_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// username=/password= file used when no password is given
    #[arg(long, env = "HARVEST_CREDENTIALS_FILE")]
    credentials_file: Option<PathBuf>,

    /// SQLite database path
    #[arg(short, long, env = "HARVEST_SYNC_DATABASE")]
    database: Option<PathBuf>,

    /// First day of the time entry window (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day of the time entry window (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Log level for this crate when RUST_LOG does not say otherwise
    #[arg(long, default_value = "info", env = "HARVEST_SYNC_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one sync (default)
    Sync,
    /// Print the database schema
    Ddl,
    /// Print the live row and history of one entity as JSON
    History {
        /// Entity kind, e.g. project or day_entry
        #[arg(long)]
        kind: EntityKind,
        #[arg(long)]
        id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("harvest_sync={}", cli.log_level).parse()?),
        )
        .init();

    let mut config = Config::load(&cli.config)?;
    apply_overrides(&mut config, &cli);

    match cli.command.unwrap_or(Command::Sync) {
        Command::Ddl => {
            println!("{}", Store::schema_ddl());
            Ok(())
        }
        Command::History { kind, id } => {
            let store = Store::open(&config.database.path)?;
            print_history(&store, kind, id)
        }
        Command::Sync => sync(config).await,
    }
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(domain) = &cli.domain {
        config.harvest.domain = Some(domain.clone());
    }
    if let Some(user) = &cli.user {
        config.harvest.user = Some(user.clone());
    }
    if let Some(password) = &cli.password {
        config.harvest.password = Some(password.clone());
    }
    if let Some(path) = &cli.credentials_file {
        config.harvest.credentials_file = Some(path.clone());
    }
    if let Some(path) = &cli.database {
        config.database.path = path.clone();
    }
    if let Some(from) = cli.from {
        config.sync.from = Some(from);
    }
    if let Some(to) = cli.to {
        config.sync.to = Some(to);
    }
}

async fn sync(config: Config) -> anyhow::Result<()> {
    // Configuration problems surface before the database is touched.
    let window = config.window(Utc::now().date_naive())?;
    let credentials = config.credentials()?;
    let source = HarvestClient::new(&credentials.domain, credentials.user, credentials.password)
        .context("Invalid Harvest account settings")?;

    info!(domain = %credentials.domain, database = %config.database.path.display(), %window, "Starting harvest-sync");
    let store = Store::open(&config.database.path)?;
    let mut coordinator = SyncCoordinator::new(store, source);

    // Losing the race drops the run future, and with it the open transaction.
    let outcome = tokio::select! {
        result = coordinator.run_sync(window) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let Some(result) = outcome else {
        warn!("Interrupted, run rolled back");
        return Err(anyhow!("interrupted"));
    };
    let result = result?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    match result.failure {
        Some(failure) => Err(anyhow!("sync run {} {}", result.run_id, failure)),
        None => Ok(()),
    }
}

fn print_history(store: &Store, kind: EntityKind, id: i64) -> anyhow::Result<()> {
    match kind {
        EntityKind::User => print_entity_history::<User>(store, id),
        EntityKind::Client => print_entity_history::<Client>(store, id),
        EntityKind::Project => print_entity_history::<Project>(store, id),
        EntityKind::Task => print_entity_history::<Task>(store, id),
        EntityKind::TaskAssignment => print_entity_history::<TaskAssignment>(store, id),
        EntityKind::Expense => print_entity_history::<Expense>(store, id),
        EntityKind::Invoice => print_entity_history::<Invoice>(store, id),
        EntityKind::DayEntry => print_entity_history::<DayEntry>(store, id),
    }
}

fn print_entity_history<E: Entity>(store: &Store, id: i64) -> anyhow::Result<()> {
    let current = store.get::<E>(id)?;
    let history = store.history::<E>(id)?;
    let report = serde_json::json!({
        "kind": E::KIND,
        "id": id,
        "current": current,
        "history": history,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
