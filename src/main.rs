//! Groove wallet server binary
//!
//! Serves the provider wallet protocol over HTTP.

use chrono::{Duration, Utc};
use clap::Parser;
use groove_wallet::api::{build_dispatcher, ApiServer};
use groove_wallet::config::{ConfigLoader, StorageBackend, WalletConfig};
use groove_wallet::directory::{InMemoryAccountDirectory, InMemorySessionOracle};
use groove_wallet::store::{open_store, WalletStore};
use rust_decimal::Decimal;
use std::{path::PathBuf, str::FromStr, sync::Arc};

#[derive(Parser, Debug)]
#[command(name = "groove-wallet")]
#[command(about = "Casino wallet endpoint for the Groove provider protocol", long_about = None)]
struct Args {
    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Start from the production preset instead of development
    #[arg(long)]
    production: bool,

    /// Listen host
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(long)]
    port: Option<u16>,

    /// Storage backend (memory or rocksdb)
    #[arg(long)]
    storage: Option<String>,

    /// Database directory
    #[arg(long)]
    data_dir: Option<String>,

    /// Allowed CORS origins (comma-separated, use * for all)
    #[arg(long)]
    cors_origins: Option<String>,

    /// Seed a session and funded player, as session:user:balance (repeatable)
    #[arg(long = "demo-player")]
    demo_players: Vec<String>,
}

struct DemoPlayer {
    session_id: String,
    user_id: String,
    balance: Decimal,
}

impl FromStr for DemoPlayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(session_id), Some(user_id), Some(balance)) if !session_id.is_empty() && !user_id.is_empty() => {
                let balance = Decimal::from_str_exact(balance)
                    .map_err(|e| format!("invalid balance '{}': {}", balance, e))?;
                Ok(DemoPlayer {
                    session_id: session_id.to_string(),
                    user_id: user_id.to_string(),
                    balance,
                })
            }
            _ => Err(format!("expected session:user:balance, got '{}'", s)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let base = if args.production {
        WalletConfig::production()
    } else {
        WalletConfig::development()
    };
    let mut loader = ConfigLoader::new().with_base(base);
    if let Some(path) = &args.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;
    apply_args(&mut config, &args)?;
    config.validate()?;

    let demo_players = args
        .demo_players
        .iter()
        .map(|spec| spec.parse::<DemoPlayer>())
        .collect::<Result<Vec<_>, _>>()?;

    println!("📂 Opening wallet store ({:?})", config.storage.backend);
    let store = open_store(&config.storage)?;
    let sessions = Arc::new(InMemorySessionOracle::new());
    let accounts = Arc::new(InMemoryAccountDirectory::new(config.ledger.default_currency.clone()));

    seed_demo_players(&demo_players, store.as_ref(), &sessions)?;

    let dispatcher = build_dispatcher(&config, store, sessions, accounts)?;
    ApiServer::new(config, dispatcher).run().await?;

    Ok(())
}

fn apply_args(config: &mut WalletConfig, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(storage) = &args.storage {
        config.storage.backend = storage.parse::<StorageBackend>()?;
    }
    if let Some(data_dir) = &args.data_dir {
        config.storage.data_directory = data_dir.clone();
    }
    if let Some(origins) = &args.cors_origins {
        config.server.allowed_origins = origins.split(',').map(|s| s.trim().to_string()).collect();
    }
    Ok(())
}

/// Open a day-long session per player and fund players that hold nothing yet
fn seed_demo_players(
    players: &[DemoPlayer],
    store: &dyn WalletStore,
    sessions: &InMemorySessionOracle,
) -> Result<(), Box<dyn std::error::Error>> {
    for player in players {
        sessions.open(&player.session_id, &player.user_id, Utc::now() + Duration::hours(24));
        if store.balance(&player.user_id)?.is_zero() && !player.balance.is_zero() {
            store.add(&player.user_id, player.balance)?;
        }
        println!(
            "🎮 Demo player {} (session {}) balance {}",
            player.user_id,
            player.session_id,
            store.balance(&player.user_id)?
        );
    }
    Ok(())
}
