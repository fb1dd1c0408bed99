use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::auth::JwtHandler;
use crate::observability::{get_metrics, HealthChecker, LatencyTimer};

/// Application state shared across handlers. The pool and the token
/// handler are the only long-lived resources; services are constructed
/// per request on top of them.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub jwt: Arc<JwtHandler>,
    pub health_checker: Arc<HealthChecker>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(pool: PgPool, jwt: Arc<JwtHandler>) -> Self {
        let health_checker = Arc::new(HealthChecker::new(pool.clone()));
        Self {
            pool,
            jwt,
            health_checker,
            metrics_handle: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}

/// Creates the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Transactions
        .route(
            "/transactions",
            post(handlers::create_transaction).get(handlers::list_transactions),
        )
        .route(
            "/transactions/:id",
            get(handlers::get_transaction).patch(handlers::update_transaction),
        )
        // Accounts (GET is the treasury-status alias)
        .route(
            "/accounts",
            post(handlers::create_account).get(handlers::treasury_status),
        )
        .route(
            "/accounts/:id",
            get(handlers::get_account).patch(handlers::update_account),
        )
        .route("/accounts/:id/balance", get(handlers::get_account_balance))
        // Treasury
        .route("/treasury/status", get(handlers::treasury_status))
        .route("/treasury/reconcile", post(handlers::reconcile_treasury))
        .route(
            "/treasury/reconciliations",
            get(handlers::list_reconciliations),
        )
        .route(
            "/treasury/reconciliations/:id/resolve",
            post(handlers::resolve_reconciliation),
        )
        // Allocation rules
        .route(
            "/allocation-rules",
            get(handlers::list_allocation_rules).post(handlers::create_allocation_rule),
        )
        .route(
            "/allocation-rules/:id",
            get(handlers::get_allocation_rule)
                .put(handlers::update_allocation_rule)
                .patch(handlers::update_allocation_rule)
                .delete(handlers::delete_allocation_rule),
        )
        // Audit trail
        .route("/audit-log", get(handlers::list_audit_log));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(track_http_metrics))
        .with_state(state)
}

async fn track_http_metrics(request: Request, next: Next) -> Response {
    let timer = LatencyTimer::new();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    get_metrics().record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        timer.elapsed_ms(),
    );
    response
}
