//! Server initialization and routing

use crate::api;
use crate::config::Config;
use crate::credential::{Argon2Hasher, CredentialService};
use crate::domains::{self, Dependencies};
use crate::events::EventBus;
use crate::mediator::Mediator;
use crate::middleware::{
    attach_context, inject_client_ip, normalize_error_response, require_auth, resolve_tenant,
    ObservabilityLayer, SanitizedMakeSpan,
};
use crate::repository::{
    AccessLogRepositoryImpl, AccessRepositoryImpl, ActivityLogRepositoryImpl,
    BranchRepositoryImpl, CompanyRepositoryImpl, MySqlDb, PayrollConfigRepositoryImpl,
    RefreshTokenRepositoryImpl, UserRepositoryImpl,
};
use crate::state::HasServices;
use crate::telemetry;
use crate::tenancy::TenantResolver;
use crate::transactor::{NestedStrategy, SqlxBackend, Transactor};
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use axum::{middleware::from_fn, middleware::from_fn_with_state, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::{mysql::MySqlPoolOptions, MySqlPool};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;
use tower::util::option_layer;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: MySqlPool,
    pub mediator: Arc<Mediator>,
    pub credentials: Arc<CredentialService>,
    pub tenant_resolver: Arc<TenantResolver>,
    pub event_bus: EventBus,
    pub transactor: Arc<Transactor>,
    pub prometheus_handle: Option<PrometheusHandle>,
}

#[async_trait]
impl HasServices for AppState {
    fn config(&self) -> &Config {
        &self.config
    }

    fn mediator(&self) -> &Mediator {
        &self.mediator
    }

    fn credentials(&self) -> &CredentialService {
        &self.credentials
    }

    fn tenant_resolver(&self) -> &TenantResolver {
        &self.tenant_resolver
    }

    fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    fn transactor(&self) -> &Transactor {
        &self.transactor
    }

    fn prometheus_handle(&self) -> Option<&PrometheusHandle> {
        self.prometheus_handle.as_ref()
    }

    async fn check_ready(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.db_pool)
            .await
            .is_ok()
    }
}

/// Run the HTTP server until SIGINT/SIGTERM, then drain background work.
pub async fn run(config: Config, prometheus_handle: Option<PrometheusHandle>) -> Result<()> {
    let config = Arc::new(config);

    let db_pool = MySqlPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.dsn)
        .await
        .context("failed to connect to database")?;
    info!("Connected to database");

    if config.database.auto_migrate {
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("failed to run migrations")?;
        info!("Database migrations applied");
    }

    if prometheus_handle.is_some() {
        telemetry::metrics::spawn_pool_metrics(db_pool.clone(), Duration::from_secs(15));
    }

    let strategy: NestedStrategy = config
        .database
        .nested_strategy
        .parse()
        .map_err(anyhow::Error::msg)?;
    let db = MySqlDb::new(db_pool.clone());
    let transactor = Arc::new(Transactor::new(
        Arc::new(SqlxBackend::new(db_pool.clone())),
        strategy,
    ));

    // Create repositories
    let users = Arc::new(UserRepositoryImpl::new(db.clone()));
    let access = Arc::new(AccessRepositoryImpl::new(db.clone()));
    let refresh_tokens = Arc::new(RefreshTokenRepositoryImpl::new(db.clone()));

    let credentials = Arc::new(CredentialService::new(config.jwt.clone(), refresh_tokens));
    let mediator = Arc::new(Mediator::new());
    let event_bus = EventBus::new();

    let deps = Dependencies {
        users,
        access: access.clone(),
        companies: Arc::new(CompanyRepositoryImpl::new(db.clone())),
        branches: Arc::new(BranchRepositoryImpl::new(db.clone())),
        payroll_configs: Arc::new(PayrollConfigRepositoryImpl::new(db.clone())),
        access_logs: Arc::new(AccessLogRepositoryImpl::new(db.clone())),
        activity_logs: Arc::new(ActivityLogRepositoryImpl::new(db)),
        credentials: credentials.clone(),
        hasher: Arc::new(Argon2Hasher),
        transactor: transactor.clone(),
        mediator: mediator.clone(),
        bus: event_bus.clone(),
    };
    domains::register_all(&deps);
    mediator.seal();

    let state = AppState {
        config: config.clone(),
        db_pool: db_pool.clone(),
        mediator,
        credentials,
        tenant_resolver: Arc::new(TenantResolver::new(access)),
        event_bus: event_bus.clone(),
        transactor: transactor.clone(),
        prometheus_handle,
    };

    let app = build_router(state);

    let http_addr = config.http_addr();
    let listener = TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("failed to bind {http_addr}"))?;
    info!("HTTP server started on {}", http_addr);
    if let Some(base_url) = config.public_base_url() {
        info!("Advertised through gateway at {}", base_url);
    }

    let (signalled_tx, signalled_rx) = oneshot::channel();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = signalled_tx.send(Instant::now());
    })
    .into_future();

    // One grace budget covers in-flight requests, hooks and bus tasks.
    let grace = config.graceful_timeout;
    let started = serve_with_grace(server, signalled_rx, grace).await?;

    // Hooks publish to the bus, so drain them first.
    if !transactor
        .drain(grace.saturating_sub(started.elapsed()))
        .await
    {
        tracing::warn!("Post-commit hooks still running after grace period");
    }
    if !event_bus
        .drain(grace.saturating_sub(started.elapsed()))
        .await
    {
        tracing::warn!("Event subscribers still running after grace period");
    }

    db_pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Drive `server` until it stops. Once shutdown is signalled, in-flight
/// requests get at most `grace` to finish before the server is dropped.
/// Returns when shutdown began.
async fn serve_with_grace<F>(
    server: F,
    signalled: oneshot::Receiver<Instant>,
    grace: Duration,
) -> Result<Instant>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(server);

    let started = tokio::select! {
        result = &mut server => {
            result?;
            return Ok(Instant::now());
        }
        signalled = signalled => signalled.unwrap_or_else(|_| Instant::now()),
    };

    match tokio::time::timeout(grace.saturating_sub(started.elapsed()), &mut server).await {
        Ok(result) => result?,
        Err(_) => tracing::warn!(
            grace_secs = grace.as_secs_f64(),
            "In-flight requests still running after grace period, closing connections"
        ),
    }
    Ok(started)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received terminate signal, initiating graceful shutdown"),
    }
}

/// Build the HTTP router with generic state type
///
/// Generic over the state so the HTTP tests can drive the same router with
/// in-memory repositories.
pub fn build_router<S: HasServices>(state: S) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_timeout = state.config().request_timeout;
    // Zero disables the per-request deadline.
    let timeout =
        option_layer((!request_timeout.is_zero()).then(|| TimeoutLayer::new(request_timeout)));
    let make_span = SanitizedMakeSpan::new(state.config().app_name.as_str());

    // Layers run bottom-up: auth, then tenant resolution. `route_layer`
    // keeps them off the fallback so unknown paths stay 404.
    let protected = domains::protected_routes::<S>()
        .route_layer(from_fn_with_state(state.clone(), resolve_tenant::<S>))
        .route_layer(from_fn_with_state(state.clone(), require_auth::<S>));

    Router::new()
        .route("/health", get(api::health::health))
        .route("/ready", get(api::health::ready::<S>))
        .route("/metrics", get(api::metrics::metrics_handler::<S>))
        .merge(domains::public_routes::<S>())
        .merge(protected)
        .layer(from_fn_with_state(state.clone(), attach_context::<S>))
        .layer(from_fn(inject_client_ip))
        .layer(timeout)
        .layer(from_fn(normalize_error_response))
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(make_span))
        .layer(ObservabilityLayer)
        .with_state(state)
}
