use devauth::{
    build_router,
    config::DevAuthConfig,
    db,
    services::{
        ApiKeyService, AuthService, AuthStore, BruteForceGuard, CleanupService, CounterStore,
        EmailProvider, JwtService, PgStore, PortalService, RateLimiter, RedisCounterStore,
        SecretCipher, SmtpMailer,
    },
    AppState,
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid.
    let config = DevAuthConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting authentication service"
    );

    // Persistent store.
    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::Database(e.into()))?;
    let store: Arc<dyn AuthStore> = Arc::new(PgStore::new(pool));

    // Counter store for rate limiting and lockout.
    let counters: Arc<dyn CounterStore> = Arc::new(RedisCounterStore::new(&config.redis).await?);

    // Outbound email.
    let mailer: Arc<dyn EmailProvider> = Arc::new(SmtpMailer::new(&config.smtp)?);

    // Token and secret primitives.
    let jwt = JwtService::new(&config.jwt)?;
    let cipher = SecretCipher::new(&config.secrets.app_secret_encryption_key)
        .map_err(|e| AppError::Config(anyhow::Error::new(e)))?;
    tracing::info!("JWT and secret cipher initialized");

    let guard = BruteForceGuard::new(
        counters.clone(),
        config.lockout.max_attempts,
        Duration::from_secs(config.lockout.lockout_minutes * 60),
    );
    let rate_limiter = RateLimiter::new(
        counters.clone(),
        config.rate_limit.requests_per_minute,
        Duration::from_secs(config.rate_limit.window_seconds),
    );

    let auth = AuthService::new(
        store.clone(),
        mailer.clone(),
        jwt.clone(),
        guard,
        config.jwt.refresh_token_expiry_days,
        config.password.enforce_complexity,
    )?;
    let portal = PortalService::new(
        store.clone(),
        jwt.clone(),
        cipher,
        config.password.enforce_complexity,
    );
    let api_keys = ApiKeyService::new(store.clone());

    // Periodic cleanup sweeper in its own task; each run purges expired
    // one-time tokens and long-revoked sessions.
    let cleanup = CleanupService::new(store.clone());
    let cleanup_interval = config.cleanup.interval_seconds;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cleanup_interval));
        // The first tick completes immediately; skip it so startup is quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            cleanup.run_all().await;
        }
    });

    let state = AppState {
        config: config.clone(),
        store,
        counters,
        jwt,
        auth,
        portal,
        api_keys,
        rate_limiter,
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install signal handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
