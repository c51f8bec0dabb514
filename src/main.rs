use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::Router;
use tokio::sync::mpsc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use staysync_api::channels::ChannelRegistry;
use staysync_api::services::channel_sync::{run_sync_loop, ChannelSyncService, SyncSettings};
use staysync_api::services::expiry::{run_sweeper, ExpiryService};
use staysync_api::{
    api_v1_routes, config, db, events, handlers::AppServices, health_routes, notifications,
    openapi, services, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = config::load_config().context("failed to load configuration")?;
    config::init_tracing(&app_config.log_level, app_config.log_json);
    info!(
        environment = %app_config.environment,
        "Starting staysync-api v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db_pool = Arc::new(
        db::establish_connection_from_app_config(&app_config)
            .await
            .context("failed to connect to database")?,
    );
    if app_config.auto_migrate {
        db::ensure_schema(&db_pool)
            .await
            .context("failed to bootstrap schema")?;
    }

    // Event pipeline: booking core -> channel -> notifier
    let (event_tx, event_rx) = mpsc::channel(app_config.event_channel_capacity);
    let event_sender = events::EventSender::new(event_tx);
    tokio::spawn(events::process_events(
        event_rx,
        Arc::new(notifications::TracingNotifier),
    ));

    let catalog = Arc::new(services::catalog::CatalogService::new(db_pool.clone()));
    let pricing = Arc::new(services::pricing::PricingService::new(
        db_pool.clone(),
        Duration::from_secs(app_config.pricing_cache_ttl_secs),
    ));
    let inventory = Arc::new(services::inventory::InventoryService::new(db_pool.clone()));
    let coupons = Arc::new(services::coupons::CouponService::new(db_pool.clone()));
    let bookings = Arc::new(services::bookings::BookingService::new(
        db_pool.clone(),
        catalog.clone(),
        pricing.clone(),
        inventory.clone(),
        coupons.clone(),
        event_sender.clone(),
    ));
    let payments = Arc::new(services::payments::PaymentService::new(
        bookings.clone(),
        event_sender.clone(),
        app_config.payment_webhook_secret.clone(),
        app_config.payment_webhook_tolerance_secs,
    ));
    let expiry = Arc::new(ExpiryService::new(
        bookings.clone(),
        app_config.booking_hold_grace_minutes,
    ));
    let registry = Arc::new(ChannelRegistry::with_builtin(Duration::from_secs(
        app_config.channel_adapter_timeout_secs,
    )));
    let channel_sync = Arc::new(ChannelSyncService::new(
        db_pool.clone(),
        registry,
        catalog.clone(),
        pricing.clone(),
        inventory.clone(),
        bookings.clone(),
        event_sender.clone(),
        SyncSettings::from(&app_config),
    ));

    tokio::spawn(run_sweeper(
        expiry.clone(),
        app_config.expiry_sweep_interval_secs,
    ));
    tokio::spawn(run_sync_loop(
        channel_sync.clone(),
        app_config.channel_sync_interval_secs,
    ));

    let app_state = AppState {
        db: db_pool,
        config: app_config.clone(),
        event_sender,
        services: AppServices {
            catalog,
            pricing,
            inventory,
            coupons,
            bookings,
            payments,
            expiry,
            channel_sync,
        },
    };

    let cors = build_cors(app_config.cors_allowed_origins.as_deref());
    let app = Router::new()
        .merge(health_routes())
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(app_state);

    let addr = format!("{}:{}", app_config.host, app_config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutdown complete");
    Ok(())
}

fn build_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    match allowed_origins {
        Some(origins) => {
            let parsed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(parsed)
                .allow_methods(methods)
                .allow_headers(Any)
        }
        None => {
            warn!("CORS origins not configured; allowing any origin");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(methods)
                .allow_headers(Any)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => warn!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
