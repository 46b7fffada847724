//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use axum::extract::{FromRequest, FromRequestParts};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{middleware as axum_middleware, routing::get, Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::backend::Backend;
use crate::error::AppError;
use crate::services::{AuthRedirects, Services};
use crate::session::SessionRegistry;

pub use routes::{protected_router, public_router};

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    pub services: Services,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(backend: Backend, redirects: AuthRedirects) -> Self {
        let services = Services::new(&backend, redirects);
        let sessions = SessionRegistry::new(services.companies.clone(), services.auth.clone());
        Self {
            backend,
            services,
            sessions,
        }
    }
}

// =========================================================================
// Envelope and extractors
// =========================================================================

/// Success half of the envelope: `{"data": ...}`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// `200 {"data": data}`
pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { data })
}

/// `201 {"data": data}`
pub fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(Envelope { data })).into_response()
}

/// JSON body whose rejection is an enveloped error
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

// =========================================================================
// Router
// =========================================================================

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static("x-request-id");

    // Layers run bottom-up: request id -> trace -> logging -> auth -> handler
    let protected = protected_router().route_layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::auth_middleware,
    ));

    let api = public_router()
        .merge(protected)
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}
