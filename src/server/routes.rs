//! Router configuration for the addon server.

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use super::handlers;
use super::AppState;

/// Create the router. Catalog clients fetch from arbitrary origins, so CORS is
/// wide open.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_headers(Any);

    Router::new()
        .route("/", get(handlers::health))
        .route("/manifest.json", get(handlers::manifest))
        // Ids arrive with a `.json` suffix that the handlers strip
        .route("/catalog/:content_type/:id", get(handlers::catalog))
        .route("/catalog/:content_type/:id/:extra", get(handlers::catalog_with_extra))
        .route("/meta/:content_type/:id", get(handlers::meta))
        .route("/stream/:content_type/:id", get(handlers::stream))
        .layer(cors)
        .with_state(state)
}
