mod calendar_cmd;
mod check_cmd;
mod config;
mod plan_cmds;
#[cfg(test)]
mod test_util;

use std::sync::Arc;

use anyhow::bail;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::debug;

use brace_core::calendar;
use brace_core::repository::PlanRepository;
use brace_core::store::{MemoryStore, SqliteStore};
use brace_db::pool;

use config::BraceConfig;

#[derive(Parser)]
#[command(name = "brace", about = "Alternating-phase correction regimen tracker")]
struct Cli {
    /// Database URL (overrides BRACE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Use a throw-away in-memory store instead of the database
    #[arg(long, global = true, conflicts_with = "database_url")]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a brace config file (no database required)
    Init {
        /// SQLite connection URL (defaults to a file in the data directory)
        #[arg(long)]
        db_url: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the brace database and run migrations
    DbInit,
    /// Plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Show today's phase and whether it is done
    Today,
    /// Print the phase for a date (FORWARD, BACKWARD or NONE)
    Direction {
        /// Date to look up (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Mark a scheduled day as completed
    CheckIn {
        /// Date to check in (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show a month grid of phases and completions
    Calendar {
        /// Month to show as YYYY-MM (defaults to the current month)
        #[arg(long, value_parser = calendar_cmd::parse_month)]
        month: Option<NaiveDate>,
        /// Print the days as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Create a plan; it becomes the active plan
    Create {
        /// First day of the cycle (defaults to today)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Forward days per cycle
        #[arg(long)]
        forward: i32,
        /// Backward days per cycle
        #[arg(long)]
        backward: i32,
    },
    /// Show the active plan
    Show,
    /// List all plans
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a plan (its records are kept)
    Delete {
        /// Plan ID to delete
        id: i64,
    },
}

// -----------------------------------------------------------------------
// Session: repository plus the pool to close on exit
// -----------------------------------------------------------------------

struct Session {
    repo: PlanRepository,
    store: Option<SqliteStore>,
}

impl Session {
    /// Open the repository over the configured database, or over a fresh
    /// in-memory store when `memory` is set.
    async fn open(cli_db_url: Option<&str>, memory: bool) -> anyhow::Result<Self> {
        if memory {
            debug!("using in-memory store");
            let repo = PlanRepository::open(Arc::new(MemoryStore::new())).await;
            return Ok(Self { repo, store: None });
        }

        let resolved = BraceConfig::resolve(cli_db_url)?;
        debug!(url = %resolved.db_config.database_url, "opening database");

        pool::ensure_database_exists(&resolved.db_config).await?;
        let db_pool = pool::create_pool(&resolved.db_config).await?;
        pool::run_migrations(&db_pool).await?;

        let store = SqliteStore::new(db_pool);
        let repo = PlanRepository::open(Arc::new(store.clone())).await;
        Ok(Self {
            repo,
            store: Some(store),
        })
    }

    async fn close(self) {
        if let Some(store) = self.store {
            store.pool().close().await;
        }
    }
}

/// Execute the `brace init` command: write config file.
fn cmd_init(db_url: Option<&str>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let url = db_url.map_or_else(brace_db::config::DbConfig::default_url, str::to_owned);
    let cfg = config::ConfigFile {
        database: config::DatabaseSection { url: url.clone() },
    };
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {url}");
    println!();
    println!("Next: run `brace db-init` to create and migrate the database.");

    Ok(())
}

async fn migrate_and_report(db_pool: &sqlx::SqlitePool) -> anyhow::Result<()> {
    pool::run_migrations(db_pool).await?;

    let counts = pool::table_counts(db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }
    Ok(())
}

/// Execute the `brace db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = BraceConfig::resolve(cli_db_url)?;
    if resolved.db_config.is_memory() {
        bail!("db-init needs a database file, not {}", resolved.db_config.database_url);
    }

    println!("Initializing brace database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    let result = migrate_and_report(&db_pool).await;
    db_pool.close().await;
    result?;

    println!("brace db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_url = cli.database_url.as_deref();
    let today = calendar::today();

    match cli.command {
        Commands::Init {
            db_url: init_url,
            force,
        } => {
            cmd_init(init_url.as_deref(), force)?;
        }
        Commands::DbInit => {
            cmd_db_init(db_url).await?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "brace", &mut std::io::stdout());
        }
        Commands::Plan { command } => {
            let session = Session::open(db_url, cli.memory).await?;
            let result = plan_cmds::run_plan_command(command, &session.repo, today).await;
            session.close().await;
            result?;
        }
        Commands::Today => {
            let session = Session::open(db_url, cli.memory).await?;
            let result = check_cmd::run_today(&session.repo, today).await;
            session.close().await;
            result?;
        }
        Commands::Direction { date } => {
            let session = Session::open(db_url, cli.memory).await?;
            let result = check_cmd::run_direction(&session.repo, date.unwrap_or(today));
            session.close().await;
            result?;
        }
        Commands::CheckIn { date } => {
            let session = Session::open(db_url, cli.memory).await?;
            let result = check_cmd::run_check_in(&session.repo, date.unwrap_or(today)).await;
            session.close().await;
            result?;
        }
        Commands::Calendar { month, json } => {
            let session = Session::open(db_url, cli.memory).await?;
            let anchor = month.unwrap_or(today);
            let result = calendar_cmd::run_calendar(&session.repo, anchor, today, json).await;
            session.close().await;
            result?;
        }
    }

    Ok(())
}
