pub mod collections;
pub mod health;
pub mod route_list;

use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::RouteServerConfig;
use crate::state::AppState;

pub fn cors_layer(config: &RouteServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allow_origin
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty() && *origin != "*")
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .merge(health::router())
        .nest(
            "/api",
            Router::new()
                .merge(route_list::router())
                .merge(collections::router())
                .merge(crate::openapi::router()),
        )
        .layer(cors)
        .with_state(state)
}
