use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer,
};
use tracing::{info, warn};

use crewdeck_api::{
    app_router,
    auth::TokenVerifier,
    cache::{Cache, CacheBackend, InMemoryCache, RedisCache},
    config, db,
    events::{self, EventSender},
    handlers::AppServices,
    message_queue::{InMemoryMessageQueue, MessageQueue, RedisMessageQueue},
    services::{
        AccountService, AuditService, BookingService, KitService, LocationService, StaffService,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);
    info!(environment = %cfg.environment, "starting crewdeck-api");

    let db = Arc::new(
        db::establish_connection_from_app_config(&cfg)
            .await
            .context("failed to connect to database")?,
    );
    if cfg.auto_migrate {
        db::run_migrations(&db).await.context("migrations failed")?;
        info!("migrations applied");
    }

    let (event_sender, event_rx) = events::event_channel(1024);
    let event_sender = Arc::new(event_sender);

    let queue: Arc<dyn MessageQueue> = match cfg.message_queue_backend.as_str() {
        "redis" => Arc::new(
            RedisMessageQueue::connect(&cfg.redis_url, cfg.message_queue_namespace.clone())
                .await
                .context("failed to connect message queue to redis")?,
        ),
        other => {
            if other != "in-memory" {
                warn!(backend = other, "unknown queue backend, using in-memory");
            }
            Arc::new(InMemoryMessageQueue::new())
        }
    };
    tokio::spawn(events::process_events(event_rx, queue.clone()));

    let cache_backend: Arc<dyn CacheBackend> = match RedisCache::connect(&cfg.redis_url).await {
        Ok(redis_cache) => Arc::new(redis_cache),
        Err(e) => {
            warn!(error = %e, "redis unavailable, caching in memory");
            Arc::new(InMemoryCache::new())
        }
    };
    let cache = Cache::new(cache_backend, Duration::from_secs(cfg.cache_ttl_secs));

    let services = build_services(db.clone(), event_sender.clone(), queue, cache, &cfg);
    let state = AppState {
        db,
        config: cfg.clone(),
        event_sender: (*event_sender).clone(),
        services,
    };

    let verifier = TokenVerifier::new(&cfg.jwt_secret, &cfg.jwt_issuer, &cfg.jwt_audience);
    let cors = build_cors(&cfg);
    let app = app_router(state, verifier)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)));

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("shutdown complete");
    Ok(())
}

fn build_services(
    db: Arc<sea_orm::DatabaseConnection>,
    event_sender: Arc<EventSender>,
    queue: Arc<dyn MessageQueue>,
    cache: Cache,
    cfg: &config::AppConfig,
) -> AppServices {
    AppServices {
        accounts: Arc::new(AccountService::new(db.clone())),
        audit: Arc::new(AuditService::new(db.clone())),
        bookings: Arc::new(BookingService::new(
            db.clone(),
            event_sender.clone(),
            queue,
            cfg.booking_tx_max_attempts,
            cfg.event_publish_max_attempts,
            Duration::from_millis(cfg.event_publish_retry_delay_ms),
        )),
        kits: Arc::new(KitService::new(db.clone(), event_sender.clone(), cache)),
        locations: Arc::new(LocationService::new(db.clone(), event_sender.clone())),
        staff: Arc::new(StaffService::new(db, event_sender)),
    }
}

fn build_cors(cfg: &config::AppConfig) -> CorsLayer {
    match cfg.cors_allowed_origins.as_deref() {
        None | Some("*") => CorsLayer::permissive(),
        Some(origins) => {
            let parsed: Vec<axum::http::HeaderValue> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(tower_http::cors::AllowOrigin::list(parsed))
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
