//! CORS layer construction.

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};

/// Builds a CORS layer from the configured origins. `*` allows any origin.
pub fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    layer.allow_origin(origins)
}
