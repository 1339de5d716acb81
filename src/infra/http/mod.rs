//! HTTP surface: fragment rendering, catalog change hooks and health.

mod fragments;
mod invalidation;
mod middleware;

use axum::{
    Router, middleware as axum_middleware,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use super::runtime::FragmentRuntime;

pub use middleware::RequestContext;

/// Response header naming the cache path that produced a fragment.
pub const FRAGMENT_CACHE_HEADER: &str = "x-fragment-cache";

#[derive(Clone)]
pub struct HttpState {
    pub runtime: FragmentRuntime,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/catalog/product/{section}", get(fragments::render_section))
        .route(
            "/cache/products/{id}/{event}",
            post(invalidation::product_event),
        )
        .route("/cache/flush", post(invalidation::flush))
        .route("/health", get(health))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

async fn health() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
