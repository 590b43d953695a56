//! CaseDesk API Server
//!
//! The single entry point for all client requests.
//! Handles:
//! - Authentication and role checks for admins, vendors and field officers
//! - Case workflow operations and candidate self-submission
//! - Report downloads and short-link redirects
//! - Observability (logging, metrics, request IDs)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, patch, post, put},
    Router,
};
use casedesk_common::{
    auth::JwtManager,
    config::AppConfig,
    db::DbPool,
    metrics,
    notify::{self, Notifier},
    telemetry,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Application state shared across handlers
#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub jwt: Arc<JwtManager>,
    pub notifier: Arc<dyn Notifier>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    telemetry::init_tracing(&config.observability);

    info!("Starting CaseDesk API v{}", casedesk_common::VERSION);

    let config = Arc::new(config);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.observability.metrics_port))
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                metrics::LATENCY_BUCKETS,
            )?
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(port = config.observability.metrics_port, "Metrics exporter listening");
    }
    metrics::register_metrics();

    let jwt_secret = config
        .auth
        .jwt_secret
        .clone()
        .context("APP__AUTH__JWT_SECRET must be set")?;
    let jwt = Arc::new(JwtManager::new(&jwt_secret, config.auth.jwt_expiration_secs));

    // Initialize database connection
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.migrate().await?;
    }

    let notifier = notify::create_notifier(&config.notification)?;
    info!(transport = notifier.name(), "Candidate notifier ready");

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        jwt,
        notifier,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    use handlers::{
        auth, candidate, field_officers, health, links, officer_portal, records, reports,
        vendor_portal, vendors,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Login endpoints sit behind the token bucket
    let mut login_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/vendor-portal/login", post(vendor_portal::login))
        .route("/fo-portal/login", post(officer_portal::login));
    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        login_routes = login_routes.route_layer(axum::middleware::from_fn(
            move |request: axum::extract::Request, next: axum::middleware::Next| {
                middleware::rate_limit::rate_limit_middleware(request, next, limiter.clone())
            },
        ));
    }

    let record_routes = Router::new()
        .route("/bulk-upload", post(records::bulk_upload))
        .route("/manual", post(records::create_manual))
        .route("/dashboard-stats", get(records::dashboard_stats))
        .route("/", get(records::list_records))
        .route("/{id}", get(records::get_record).put(records::update_record))
        .route("/{id}/verification", get(records::get_verification))
        .route("/{id}/stop", post(records::stop))
        .route("/{id}/revert", post(records::revert))
        .route("/{id}/approve", post(records::approve))
        .route("/{id}/reject", post(records::reject))
        .route("/{id}/reinitiate", post(records::reinitiate))
        .route("/{id}/send-back", post(records::send_back));

    let vendor_routes = Router::new()
        .route("/", post(vendors::create_vendor).get(vendors::list_vendors))
        .route("/active", get(vendors::list_active_vendors))
        .route("/{id}", get(vendors::get_vendor).put(vendors::update_vendor))
        .route("/{id}/toggle-status", patch(vendors::toggle_status));

    let field_officer_routes = Router::new()
        .route(
            "/",
            post(field_officers::create_field_officer).get(field_officers::list_field_officers),
        )
        .route("/vendor/{vendor_id}", get(field_officers::list_by_vendor))
        .route(
            "/{id}",
            get(field_officers::get_field_officer).put(field_officers::update_field_officer),
        )
        .route("/{id}/toggle-status", patch(field_officers::toggle_status));

    let vendor_portal_routes = Router::new()
        .route(
            "/profile",
            get(vendor_portal::get_profile).put(vendor_portal::update_profile),
        )
        .route("/change-password", put(vendor_portal::change_password))
        .route("/dashboard/stats", get(vendor_portal::dashboard_stats))
        .route("/cases", get(vendor_portal::list_cases))
        .route("/cases/{id}", get(vendor_portal::get_case))
        .route(
            "/cases/{id}/assign-field-officer",
            post(vendor_portal::assign_field_officer),
        )
        .route(
            "/cases/{id}/assign-candidate",
            post(vendor_portal::assign_candidate),
        )
        .route("/cases/{id}/status", put(vendor_portal::update_case_status))
        .route(
            "/field-officers",
            get(vendor_portal::list_field_officers).post(vendor_portal::create_field_officer),
        )
        .route(
            "/field-officers/{id}",
            get(vendor_portal::get_field_officer)
                .put(vendor_portal::update_field_officer)
                .delete(vendor_portal::delete_field_officer),
        )
        .route(
            "/field-officers/{id}/toggle-status",
            put(vendor_portal::toggle_field_officer_status),
        );

    let officer_portal_routes = Router::new()
        .route("/cases", get(officer_portal::list_cases))
        .route("/cases/{id}", get(officer_portal::get_case))
        .route("/cases/{id}/submit", post(officer_portal::submit_verification));

    let candidate_routes = Router::new()
        .route("/validate/{token}", get(candidate::validate_token))
        .route("/submit/{token}", post(candidate::submit));

    let report_routes = Router::new()
        .route("/download-cases", get(reports::download_cases))
        .route("/vendor/download-cases", get(reports::download_vendor_cases));

    let api_routes = Router::new()
        .merge(login_routes)
        .route("/auth/register", post(auth::register))
        .nest("/records", record_routes)
        .nest("/vendors", vendor_routes)
        .nest("/field-officers", field_officer_routes)
        .nest("/vendor-portal", vendor_portal_routes)
        .nest("/fo-portal", officer_portal_routes)
        .nest("/candidate", candidate_routes)
        .nest("/reports", report_routes);

    // Compose the app
    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/c/{code}", get(links::redirect))
        .nest("/api", api_routes)
        .layer(axum::middleware::from_fn(middleware::track_metrics))
        .layer(DefaultBodyLimit::max(state.config.server.body_limit_bytes))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
