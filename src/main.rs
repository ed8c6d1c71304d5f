use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;

use oichain_backend::{
    config::settings::{Settings, StoreBackend},
    db::{
        redis::RedisPool,
        store::{MemoryStore, RedisSeriesStore, SeriesStore},
    },
    middleware::metrics::Metrics,
    routes::{admin::admin_scope, health::health_scope, oi::oi_scope},
    services::{
        fetcher::NiftyTraderClient,
        scheduler::SessionScheduler,
        trading_hours::{MarketClock, TradingCalendar},
    },
    state::AppState,
};

const SESSION_RECONCILE: Duration = Duration::from_secs(30);

fn init_logging() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
        .init();
}

async fn build_store(settings: &Settings) -> anyhow::Result<Arc<dyn SeriesStore>> {
    match settings.store_backend {
        StoreBackend::Memory => {
            log::warn!("store: in-memory backend, series are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Redis => {
            let url = settings
                .redis_url
                .as_deref()
                .context("REDIS_URL is required for the redis backend")?;
            let pool = RedisPool::new(url).await.context("connecting to redis")?;
            Ok(Arc::new(RedisSeriesStore::new(pool)))
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    log::info!("Starting OI chain backend…");

    let settings = Settings::new().unwrap_or_else(|e| {
        log::error!("Failed to load settings: {e}");
        std::process::exit(1);
    });

    if let Some(port) = settings.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing prometheus exporter")?;
        log::info!("metrics: exporter listening on {addr}");
    }

    let store = build_store(&settings).await?;
    let source = Arc::new(NiftyTraderClient::from_settings(&settings).context("http client")?);

    let state = AppState::new(
        source,
        store,
        Arc::new(MarketClock),
        TradingCalendar::from_settings(&settings),
        settings.symbols.clone(),
        settings.poll_interval,
        settings.ingest_concurrency,
    );

    // --- session scheduler -------------------------------------------------
    let session = settings.auto_schedule.then(|| {
        Arc::new(SessionScheduler::new(
            Arc::clone(&state.calendar),
            settings.reset_at,
            Arc::clone(&state.controller),
            Arc::clone(&state.store),
            Arc::clone(&state.clock),
        ))
        .spawn(SESSION_RECONCILE)
    });
    if session.is_none() {
        log::info!("session: auto schedule disabled, polling is manual");
    }

    let port = settings.server_port;
    let admin_token = settings.admin_token.clone();
    if admin_token.is_none() {
        log::warn!("admin: ADMIN_TOKEN unset, admin routes are open");
    }

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Metrics)
            .app_data(web::Data::new(state.clone()))
            .service(health_scope())
            .service(oi_scope())
            .service(admin_scope(admin_token.clone()))
    })
        .bind(("0.0.0.0", port))?
        .run()
        .await?;

    if let Some(handle) = session {
        handle.abort();
    }
    Ok(())
}
