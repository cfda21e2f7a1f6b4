use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::{map_db_error, AppError, AppResult};
use crate::services::route_query::{self, KomootLink, RouteFilter, RouteFilterInput, RouteRow};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteBoundsResponse {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectionLinkResponse {
    pub collection_id: i32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteResponse {
    pub id: i32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
    /// Meters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation_up: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation_down: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kcal_active: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpx_file_path: Option<String>,
    /// `[lat, lng, elevation]` triples, start to end.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Vec<f64>>>)]
    pub route_points: Option<Vec<[f64; 3]>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<RouteBoundsResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub komoot: Option<KomootLink>,
    pub collections: Vec<CollectionLinkResponse>,
}

impl From<RouteRow> for RouteResponse {
    fn from(row: RouteRow) -> Self {
        let bounds = match (row.min_lat, row.min_lng, row.max_lat, row.max_lng) {
            (Some(min_lat), Some(min_lng), Some(max_lat), Some(max_lng)) => {
                Some(RouteBoundsResponse {
                    min_lat,
                    min_lng,
                    max_lat,
                    max_lng,
                })
            }
            _ => None,
        };
        Self {
            id: row.id,
            name: row.name,
            sport: row.sport,
            distance: row.distance.filter(|meters| *meters >= 0.0),
            duration: row.duration,
            elevation_up: row.elevation_up,
            elevation_down: row.elevation_down,
            kcal_active: row.kcal_active,
            status: row.status,
            gpx_file_path: row.gpx_file_path,
            route_points: row
                .route_points
                .as_ref()
                .and_then(|points| route_query::normalize_track_points(&points.0)),
            bounds,
            komoot: row.komoot.map(|komoot| komoot.0),
            collections: row
                .collection_ids
                .into_iter()
                .map(|collection_id| CollectionLinkResponse { collection_id })
                .collect(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/routes",
    tag = "routes",
    params(RouteFilterInput),
    responses(
        (status = 200, description = "Routes matching every supplied filter", body = Vec<RouteResponse>),
        (status = 400, description = "Undecodable query string", body = crate::error::ErrorBody),
        (status = 500, description = "Internal server error", body = crate::error::ErrorBody)
    )
)]
pub(crate) async fn list_routes(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> AppResult<Json<Vec<RouteResponse>>> {
    // Pairs rather than a struct so repeated keys fold instead of rejecting.
    let Query(pairs) = query.map_err(|rejection| {
        tracing::warn!(error = %rejection, "rejected route query string");
        AppError::new(StatusCode::BAD_REQUEST, "Invalid query string")
    })?;
    let input = RouteFilterInput::from_pairs(pairs);
    let filter = RouteFilter::from_input(&input, &state.limit_policy());
    let rows = route_query::fetch_routes(&state.db, &filter)
        .await
        .map_err(map_db_error)?;
    Ok(Json(rows.into_iter().map(RouteResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/routes/{id}",
    tag = "routes",
    params(("id" = i32, Path, description = "Route id")),
    responses(
        (status = 200, description = "Route", body = RouteResponse),
        (status = 404, description = "Route not found", body = crate::error::ErrorBody),
        (status = 500, description = "Internal server error", body = crate::error::ErrorBody)
    )
)]
pub(crate) async fn get_route(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<RouteResponse>> {
    let row = route_query::fetch_route(&state.db, id)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::not_found("Route not found"))?;
    Ok(Json(row.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/routes", get(list_routes))
        .route("/routes/{id}", get(get_route))
}
