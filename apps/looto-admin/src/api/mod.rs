//! # HTTP API
//!
//! The REST surface of the back-office, mounted under `/api/admin`.
//!
//! - `POST /login` is public and rate limited per username.
//! - Every other admin route needs `Authorization: Bearer <token>`; the
//!   session middleware resolves it to an [`Actor`] request extension.
//! - Handlers check their own permission, then call the core on the blocking
//!   pool (redb transactions are synchronous).

mod auth;
mod ledger;
mod response;
mod reviews;
mod rooms;
mod stats;
mod users;

pub use response::{ApiError, ApiJson, ApiQuery, ApiResponse, ApiResult, parse_id};

use crate::config::ServerConfig;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use looto_core::{Actor, Backoffice};
use serde_json::{Value, json};
use std::num::NonZeroU32;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub office: Arc<Backoffice>,
    pub login_limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl AppState {
    pub fn new(office: Backoffice, login_rate_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(login_rate_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            office: Arc::new(office),
            login_limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
        }
    }

    /// Run a core operation on the blocking pool.
    pub async fn run<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Backoffice) -> looto_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let office = Arc::clone(&self.office);
        tokio::task::spawn_blocking(move || f(&office))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "blocking task failed");
                ApiError::internal()
            })?
            .map_err(ApiError::from)
    }
}

/// Build the full router.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let protected = Router::new()
        .route("/logout", post(auth::logout))
        .route("/change-password", put(auth::change_password))
        .route("/profile", get(auth::profile))
        .route("/dashboard/stats", get(stats::dashboard))
        .route("/system/stats", get(stats::system))
        .route("/revenue/stats", get(stats::revenue))
        .route("/users", get(users::list))
        .route("/users/{id}", get(users::details))
        .route("/users/{id}/block", put(users::block))
        .route("/users/{id}/unblock", put(users::unblock))
        .route("/users/{id}/balance", put(users::adjust_balance))
        .route("/users/{id}/activity", get(users::activity))
        .route("/rooms", get(rooms::list))
        .route("/rooms/{code}", get(rooms::details))
        .route("/rooms/{code}/declare-winner", put(rooms::declare_winner))
        .route("/rooms/{code}/cancel", put(rooms::cancel))
        .route("/transactions", get(ledger::list))
        .route("/transactions/{id}", get(ledger::details))
        .route("/transactions/{id}/refund", put(ledger::refund))
        .route("/export/{kind}", get(ledger::export))
        .route("/winner-requests", get(reviews::list_winner_requests))
        .route("/winner-requests/{id}", get(reviews::winner_request_details))
        .route("/winner-requests/{id}/approve", put(reviews::approve_winner_request))
        .route("/winner-requests/{id}/reject", put(reviews::reject_winner_request))
        .route("/withdrawal-requests", get(reviews::list_withdrawals))
        .route("/withdrawal-requests/{id}", get(reviews::withdrawal_details))
        .route("/withdrawal-requests/{id}/approve", put(reviews::approve_withdrawal))
        .route("/withdrawal-requests/{id}/reject", put(reviews::reject_withdrawal))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    let admin = Router::new()
        .route("/login", post(auth::login))
        .merge(protected);

    Router::new()
        .route("/health", get(health))
        .nest("/api/admin", admin)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(config)),
        )
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.allowed_origins.is_empty() {
        tracing::warn!("no allowed origins configured; browser requests will be rejected");
    }
    let origins = if config.allow_any_origin() {
        AllowOrigin::any()
    } else {
        let list = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "ignoring invalid origin");
                    None
                }
            })
            .collect::<Vec<_>>();
        AllowOrigin::list(list)
    };
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn bearer_token(req: &Request) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Resolve the bearer token and attach the [`Actor`] to the request.
async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req).ok_or_else(ApiError::unauthorized)?;
    let actor: Actor = state
        .run(move |office| office.authenticate(&token))
        .await
        .map_err(session_error)?;
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

/// Rejected tokens share one message; store failures keep their own.
fn session_error(err: ApiError) -> ApiError {
    if err.status != StatusCode::UNAUTHORIZED {
        return err;
    }
    tracing::debug!(error = %err.message, "session rejected");
    ApiError::new(err.status, "Invalid or expired token")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_session_gets_generic_message() {
        let err = session_error(ApiError::from(looto_core::LootoError::Unauthorized));
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "Invalid or expired token");
    }

    #[test]
    fn session_store_failure_stays_internal() {
        let err = session_error(ApiError::internal());
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }
}
