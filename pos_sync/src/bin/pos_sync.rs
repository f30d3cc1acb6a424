use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use pos_client::models::Origin;
use pos_sync::{
    config::{self, SyncConfig},
    context::SyncContext,
    db::{connection::connect_sqlite, migrate},
    http, jobs, oauth,
    orders::expiry,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "POS catalog and order synchronization")]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<String>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args)]
struct RetailerFilter {
    /// Only retailers of this provider (`square` or `clover`).
    #[arg(long)]
    origin: Option<Origin>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply pending schema migrations.
    Migrate,
    /// Serve webhook and OAuth endpoints.
    Serve,
    /// Full catalog chain for every syncable retailer.
    InventorySync(RetailerFilter),
    CustomerSync(RetailerFilter),
    OrderSync(RetailerFilter),
    /// Refresh aging tokens and disconnect expired ones.
    RefreshTokens,
    /// Expire reservations whose hold ran out.
    ExpireReservations {
        /// Keep sweeping every `reservations.sweep_interval_secs`.
        #[arg(long = "loop")]
        repeat: bool,
    },
}

fn load_config(path: Option<&str>) -> Result<SyncConfig> {
    let mut cfg = match path {
        Some(path) => config::load_config_path(path)?,
        None => SyncConfig::default(),
    };
    config::apply_env_overrides(&mut cfg)?;
    config::normalize_config(&mut cfg)?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;
    let database_url = cfg.database_url.clone();

    if let Cmd::Migrate = cli.cmd {
        migrate::run_all(&database_url).context("run migrations")?;
        tracing::info!(database_url = %database_url, "migrations applied");
        return Ok(());
    }

    let ctx = SyncContext::http(cfg.clone());
    let mut conn = connect_sqlite(&database_url)
        .with_context(|| format!("open database {database_url}"))?;

    match cli.cmd {
        Cmd::Migrate => {}
        Cmd::Serve => {
            let state = http::AppState::new(&database_url, ctx);
            http::serve(state, &cfg.server.bind).await?;
        }
        Cmd::InventorySync(f) => {
            let summary = jobs::inventory_sync_all(&ctx, &mut conn, f.origin).await?;
            tracing::info!(?summary, "inventory sync finished");
        }
        Cmd::CustomerSync(f) => {
            let summary = jobs::customer_sync_all(&ctx, &mut conn, f.origin).await?;
            tracing::info!(?summary, "customer sync finished");
        }
        Cmd::OrderSync(f) => {
            let summary = jobs::order_sync_all(&ctx, &mut conn, f.origin).await?;
            tracing::info!(?summary, "order sync finished");
        }
        Cmd::RefreshTokens => {
            oauth::refresh_tokens(&ctx, &mut conn, Utc::now()).await?;
        }
        Cmd::ExpireReservations { repeat } => {
            let interval = Duration::from_secs(cfg.reservations.sweep_interval_secs.max(1));
            loop {
                let expired = expiry::sweep(&mut conn, Utc::now())?;
                tracing::info!(expired, "reservation sweep finished");
                if !repeat {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        }
    }

    Ok(())
}
