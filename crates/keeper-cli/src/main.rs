//! Keeper CLI - encrypted secrets with an offline cache
//!
//! Usage:
//!   keeper register                     - Create an account on the server
//!   keeper sync                         - Pull everything from the server
//!   keeper list <kind>                  - Show cached records
//!   keeper get <kind> <id>              - Show one cached record
//!   keeper add <kind> --field ...       - Store a new record
//!   keeper update --id <id> <kind> ...  - Change fields of a record
//!   keeper delete <kind> <id>           - Remove a record

mod commands;
mod config;
mod remote;

use clap::{Parser, Subcommand};
use keeper_cache::SqliteCache;
use keeper_core::{Keeper, KeeperConfig, RemoteError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{KindArg, RecordFields};
use crate::config::Config;
use crate::remote::HttpRemote;

#[derive(Parser)]
#[command(name = "keeper")]
#[command(author = "HeyBattle1")]
#[command(version)]
#[command(about = "Encrypted secrets, cached locally and synced with a server", long_about = None)]
struct Cli {
    /// Server base URL
    #[arg(long, env = "KEEPER_SERVER", default_value = "http://localhost:8080", global = true)]
    server: String,

    /// Local cache database
    #[arg(long, env = "KEEPER_CACHE", global = true)]
    cache: Option<PathBuf>,

    /// Account name on the server
    #[arg(long, env = "KEEPER_USER", global = true)]
    user: Option<String>,

    /// Per-step timeout in seconds
    #[arg(long, env = "KEEPER_TIMEOUT", default_value_t = 30, global = true)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and log in
    Register,

    /// Replace the local cache with the server's records
    Sync,

    /// List cached records of a kind
    List { kind: KindArg },

    /// Show one cached record
    Get { kind: KindArg, id: String },

    /// Store a new record
    Add {
        #[command(subcommand)]
        record: RecordFields,
    },

    /// Change fields of an existing record
    Update {
        #[arg(long)]
        id: String,
        #[command(subcommand)]
        record: RecordFields,
    },

    /// Delete a record from the server and the cache
    Delete { kind: KindArg, id: String },
}

impl Commands {
    /// Served from the cache alone when the server is unreachable
    fn is_read_only(&self) -> bool {
        matches!(self, Commands::List { .. } | Commands::Get { .. })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::new(cli.server, cli.cache, cli.user, cli.timeout);

    let user = config.user()?.to_string();
    let password = config::read_password()?;

    let cache = SqliteCache::open(&config.cache).await?;
    let remote = HttpRemote::new(&config.server, config.timeout)?;
    let keeper = Keeper::new(Arc::new(remote), Arc::new(cache)).with_config(KeeperConfig {
        remote_timeout: Some(config.timeout),
        local_timeout: Some(config.timeout),
    });

    let authenticated = if matches!(cli.command, Commands::Register) {
        keeper.remote().register(&user, &password).await
    } else {
        keeper.remote().login(&user, &password).await
    };

    match authenticated {
        Ok(()) => match keeper.start_session(&password).await {
            Ok(report) => {
                if matches!(cli.command, Commands::Sync | Commands::Register) {
                    println!("✅ Synced {} records", report.total());
                }
            }
            Err(err) if !matches!(cli.command, Commands::Sync) => {
                warn!(error = %err, "initial sync failed; showing cached data");
            }
            Err(err) => return Err(err.into()),
        },
        Err(RemoteError::Unavailable(reason)) if cli.command.is_read_only() => {
            warn!(%reason, "server unreachable; reading the local cache only");
            keeper.session().derive_key(&password);
        }
        Err(err) => return Err(err.into()),
    }

    let result = match cli.command {
        Commands::Register | Commands::Sync => Ok(()),
        Commands::List { kind } => commands::list(&keeper, kind).await,
        Commands::Get { kind, id } => commands::get(&keeper, kind, &id).await,
        Commands::Add { record } => commands::add(&keeper, record).await,
        Commands::Update { id, record } => commands::update(&keeper, &id, record).await,
        Commands::Delete { kind, id } => commands::delete(&keeper, kind, &id).await,
    };

    keeper.end_session();
    keeper.local().close().await;
    result
}
