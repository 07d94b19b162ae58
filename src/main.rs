use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use rollcall::cache::{self, ActionCache};
use rollcall::clock::FacilityClock;
use rollcall::config;
use rollcall::db;
use rollcall::engine::Engine;
use rollcall::http::{self, AppState};
use rollcall::notify::{Dispatcher, HttpSmsSender, NotificationHub, SmsSender};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/rollcall.db", cfg.app.data_dir));

    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let cache = Arc::new(ActionCache::new(Duration::from_secs(
        cfg.checkin.cooldown_seconds,
    )));
    let _sweeper = cache::spawn_sweeper(
        Arc::clone(&cache),
        Duration::from_secs(cfg.checkin.sweep_interval_seconds),
    );

    let clock = FacilityClock::from_offset_hours(cfg.facility.utc_offset_hours)
        .context("invalid facility.utc_offset_hours")?;

    let hub = Arc::new(NotificationHub::new(64));
    let sms: Option<Arc<dyn SmsSender>> = if cfg.sms.enabled {
        Some(Arc::new(HttpSmsSender::from_config(&cfg.sms)))
    } else {
        info!("sms delivery disabled by configuration");
        None
    };
    let dispatcher = Dispatcher::new(pool.clone(), Arc::clone(&hub), sms);

    let engine = Arc::new(Engine::new(
        pool.clone(),
        Arc::clone(&cache),
        clock,
        dispatcher,
        cfg.facility.id.clone(),
        cfg.facility.qr_issuance,
    ));

    let app = http::build_router(AppState { engine, pool, hub });

    let addr: SocketAddr = cfg.app.bind_addr.parse().context("invalid app.bind_addr")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, facility = %cfg.facility.id, "starting check-in service");
    axum::serve(listener, app).await?;

    Ok(())
}
