use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(title = "Route Server", description = "Filtered cycling/hiking route API"),
    paths(
        crate::routes::health::healthz_handler,
        crate::routes::route_list::list_routes,
        crate::routes::route_list::get_route,
        crate::routes::collections::list_collections,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::routes::health::HealthResponse,
        crate::routes::route_list::RouteResponse,
        crate::routes::route_list::RouteBoundsResponse,
        crate::routes::route_list::CollectionLinkResponse,
        crate::routes::collections::CollectionResponse,
        crate::services::route_query::KomootLink,
    )),
    tags(
        (name = "health"),
        (name = "routes", description = "Route listing and detail"),
        (name = "collections", description = "Route collections used for styling")
    )
)]
pub struct ApiDoc;

pub fn openapi_json() -> serde_json::Value {
    serde_json::to_value(ApiDoc::openapi()).unwrap_or_else(|err| {
        tracing::error!(error = %err, "failed to serialize OpenAPI document");
        serde_json::Value::Null
    })
}

async fn openapi_handler() -> Json<serde_json::Value> {
    Json(openapi_json())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_handler))
}
