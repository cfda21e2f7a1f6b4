use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::{map_db_error, AppResult};
use crate::state::AppState;

#[derive(sqlx::FromRow)]
struct CollectionRow {
    id: i32,
    name: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, utoipa::ToSchema)]
pub struct CollectionResponse {
    pub id: i32,
    pub name: String,
    /// Stable styling key derived from the name.
    pub slug: String,
}

impl From<CollectionRow> for CollectionResponse {
    fn from(row: CollectionRow) -> Self {
        Self {
            id: row.id,
            slug: slugify(&row.name),
            name: row.name,
        }
    }
}

/// Lowercases and collapses every run of non-alphanumerics into one `_`.
pub(crate) fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    slug
}

#[utoipa::path(
    get,
    path = "/api/collections",
    tag = "collections",
    responses(
        (status = 200, description = "Route collections", body = Vec<CollectionResponse>),
        (status = 500, description = "Internal server error", body = crate::error::ErrorBody)
    )
)]
pub(crate) async fn list_collections(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<CollectionResponse>>> {
    let rows: Vec<CollectionRow> =
        sqlx::query_as("SELECT id, name FROM collections ORDER BY id ASC")
            .fetch_all(&state.db)
            .await
            .map_err(map_db_error)?;
    Ok(Json(rows.into_iter().map(CollectionResponse::from).collect()))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/collections", get(list_collections))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_match_client_collection_keys() {
        assert_eq!(slugify("Personal"), "personal");
        assert_eq!(slugify("Gravelritten"), "gravelritten");
        assert_eq!(slugify("Gijs Bruinsma"), "gijs_bruinsma");
        assert_eq!(slugify("  Tour -- de  France! "), "tour_de_france");
    }
}
