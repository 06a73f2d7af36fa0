//! Standbook HTTP server.
//!
//! Wires `PostgreSQL`, Redis and the realtime hub into the reservation API
//! and runs the expiry background tasks until shutdown.

use standbook_core::environment::SystemClock;
use standbook_core::expiry::HoldKeys;
use standbook_postgres::PostgresGateway;
use standbook_redis::{RedisExpiryStore, RedisSessionAuthenticator};
use standbook_runtime::{
    Broadcaster, ExpiryListener, MetricsRecorder, ReconciliationSweep, ReservationService,
};
use standbook_server::{AppState, Config, SpaceNamingHook, build_router};
use standbook_web::{RealtimeLimits, RealtimeState};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,standbook=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Standbook server");

    // Load configuration
    let config = Config::from_env();
    info!(
        redis_url = %config.redis.url,
        hold_ttl_secs = config.reservations.hold_ttl_secs,
        max_hold_ttl_secs = config.reservations.max_hold_ttl_secs,
        sweep_interval_secs = config.reservations.sweep_interval_secs,
        "Configuration loaded"
    );

    // Metrics
    let mut recorder = MetricsRecorder::new();
    if config.metrics.enabled {
        recorder.install()?;
    }
    let metrics = Arc::new(recorder);

    // Persistence
    info!("Connecting to PostgreSQL...");
    let gateway = PostgresGateway::connect(
        &config.postgres.url,
        config.postgres.max_connections,
        config.postgres.connect_timeout(),
    )
    .await?;
    if config.postgres.run_migrations {
        gateway.migrate().await?;
    }
    info!("PostgreSQL ready");

    // Expiry store and sessions
    info!("Connecting to Redis...");
    let expiry = RedisExpiryStore::connect(&config.redis.connection_url()).await?;
    if config.redis.configure_notifications {
        if let Err(e) = expiry.configure_notifications().await {
            warn!(error = %e, "Could not enable expired-key notifications; relying on the sweep");
        }
    }
    let authenticator =
        RedisSessionAuthenticator::new(expiry.connection(), config.auth.session_prefix.clone());
    info!(channel = %expiry.lapse_channel(), "Redis ready");

    // Reservation service
    let broadcaster = Broadcaster::default();
    let service = ReservationService::new(
        Arc::new(gateway),
        Arc::new(expiry),
        broadcaster.clone(),
        Arc::new(SystemClock),
    )
    .with_keys(HoldKeys::new(config.redis.key_prefix.clone()))
    .with_confirm_hook(Arc::new(SpaceNamingHook));

    // Background tasks
    let listener = ExpiryListener::new(service.clone()).start();
    let sweep =
        ReconciliationSweep::new(service.clone(), config.reservations.sweep_interval()).start();
    info!("Expiry listener and reconciliation sweep started");

    let authenticator: Arc<dyn standbook_core::auth::Authenticator> = Arc::new(authenticator);
    let realtime = RealtimeState::new(
        broadcaster,
        authenticator.clone(),
        RealtimeLimits::default(),
    );
    let state = AppState::new(
        service,
        authenticator,
        realtime,
        metrics,
        config.reservations.hold_ttl(),
        config.reservations.max_hold_ttl(),
    );

    // Build router
    let app = build_router(state, &config.server.cors_origins);

    let addr = config.bind_address();
    let tcp = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    // Run server with graceful shutdown
    let served = axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    listener.stop().await;
    sweep.stop().await;
    if let Err(e) = &served {
        error!(error = %e, "Server error");
    }
    served?;

    info!("Server stopped");
    Ok(())
}

/// Graceful shutdown signal handler.
///
/// Waits for:
/// - Ctrl+C (SIGINT)
/// - SIGTERM (in production environments)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
