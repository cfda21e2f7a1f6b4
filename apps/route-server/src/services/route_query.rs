use serde_json::Value as JsonValue;
use sqlx::types::Json as SqlJson;
use sqlx::{PgPool, Postgres, QueryBuilder};

const METERS_PER_KILOMETER: f64 = 1000.0;

const ROUTE_SELECT: &str = r#"
    SELECT
        r.id,
        COALESCE(r.name, '') AS name,
        r.sport,
        r.distance,
        r.duration,
        r.elevation_up,
        r.elevation_down,
        r.kcal_active,
        r.status,
        r.gpx_file_path,
        r.route_points,
        r.min_lat,
        r.min_lng,
        r.max_lat,
        r.max_lng,
        CASE
            WHEN k.id IS NULL THEN NULL
            ELSE json_build_object('id', k.id, 'name', k.name, 'sport', k.sport)
        END AS komoot,
        ARRAY(
            SELECT cr.collection_id
            FROM collection_routes cr
            WHERE cr.route_id = r.id
            ORDER BY cr.id
        ) AS collection_ids
    FROM routes r
    LEFT JOIN komoot_routes k ON r.komoot_id = k.id
"#;

/// Raw `GET /api/routes` query string. Every field arrives as text so that
/// malformed values can be dropped instead of rejecting the whole request.
#[derive(Debug, Clone, Default, serde::Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RouteFilterInput {
    /// Exact sport key, e.g. `gravel_bike`.
    pub sport: Option<String>,
    /// Comma-separated collection ids.
    pub collections: Option<String>,
    /// Minimum distance in kilometers (inclusive).
    pub min_distance: Option<String>,
    /// Maximum distance in kilometers (inclusive).
    pub max_distance: Option<String>,
    /// South-west corner of the visible window as `lng,lat`.
    pub min_bounds: Option<String>,
    /// North-east corner of the visible window as `lng,lat`.
    pub max_bounds: Option<String>,
    /// Maximum number of rows; defaults to 1000 and is capped server-side.
    pub limit: Option<String>,
}

impl RouteFilterInput {
    /// Folds raw query pairs. Repeated `collections` values are merged; for the
    /// scalar fields the last occurrence wins. Unknown keys are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut input = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "collections" => {
                    input.collections = Some(match input.collections.take() {
                        Some(existing) => format!("{existing},{value}"),
                        None => value,
                    });
                    continue;
                }
                "sport" => &mut input.sport,
                "minDistance" => &mut input.min_distance,
                "maxDistance" => &mut input.max_distance,
                "minBounds" => &mut input.min_bounds,
                "maxBounds" => &mut input.max_bounds,
                "limit" => &mut input.limit,
                _ => continue,
            };
            if slot.is_some() {
                tracing::debug!(field = %key, "repeated route filter; keeping the last value");
            }
            *slot = Some(value);
        }
        input
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitPolicy {
    pub default: i64,
    pub max: i64,
}

impl LimitPolicy {
    pub fn resolve(&self, requested: Option<i64>) -> i64 {
        match requested {
            Some(limit) if limit > 0 => limit.min(self.max),
            _ => self.default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    fn to_pg_point(self) -> String {
        format!("({},{})", self.lng, self.lat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub south_west: LngLat,
    pub north_east: LngLat,
}

impl GeoBounds {
    fn from_corners(a: LngLat, b: LngLat) -> Self {
        Self {
            south_west: LngLat {
                lng: a.lng.min(b.lng),
                lat: a.lat.min(b.lat),
            },
            north_east: LngLat {
                lng: a.lng.max(b.lng),
                lat: a.lat.max(b.lat),
            },
        }
    }
}

/// Validated filter. Every field is either applied to the query or absent.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteFilter {
    pub sport: Option<String>,
    pub collections: Option<Vec<i32>>,
    pub min_distance_km: Option<f64>,
    pub max_distance_km: Option<f64>,
    pub bounds: Option<GeoBounds>,
    pub limit: i64,
}

impl RouteFilter {
    pub fn from_input(input: &RouteFilterInput, limits: &LimitPolicy) -> Self {
        let sport = input
            .sport
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);

        let min_bounds = parse_corner(input.min_bounds.as_deref(), "minBounds");
        let max_bounds = parse_corner(input.max_bounds.as_deref(), "maxBounds");
        let bounds = match (min_bounds, max_bounds) {
            (Some(a), Some(b)) => Some(GeoBounds::from_corners(a, b)),
            (None, None) => None,
            _ => {
                tracing::warn!("ignoring bounds filter: both minBounds and maxBounds are required");
                None
            }
        };

        Self {
            sport,
            collections: parse_collections(input.collections.as_deref()),
            min_distance_km: parse_distance_km(input.min_distance.as_deref(), "minDistance"),
            max_distance_km: parse_distance_km(input.max_distance.as_deref(), "maxDistance"),
            bounds,
            limit: limits.resolve(parse_limit(input.limit.as_deref())),
        }
    }

}

/// Inclusive distance predicate values in meters, as bound by the query.
pub fn distance_bounds_m(filter: &RouteFilter) -> (Option<f64>, Option<f64>) {
    (
        filter.min_distance_km.map(km_to_meters),
        filter.max_distance_km.map(km_to_meters),
    )
}

fn parse_distance_km(raw: Option<&str>, field: &str) -> Option<f64> {
    let trimmed = raw.map(str::trim).filter(|value| !value.is_empty())?;
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Some(value),
        _ => {
            tracing::warn!(field, value = %trimmed, "ignoring non-numeric or negative distance filter");
            None
        }
    }
}

fn parse_limit(raw: Option<&str>) -> Option<i64> {
    let trimmed = raw.map(str::trim).filter(|value| !value.is_empty())?;
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 1.0 => Some(value.trunc().min(i64::MAX as f64) as i64),
        _ => {
            tracing::warn!(value = %trimmed, "ignoring invalid limit; using default");
            None
        }
    }
}

fn parse_collections(raw: Option<&str>) -> Option<Vec<i32>> {
    let trimmed = raw.map(str::trim).filter(|value| !value.is_empty())?;
    let mut ids = Vec::new();
    for part in trimmed.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        match part.parse::<i32>() {
            Ok(id) if id > 0 => ids.push(id),
            _ => tracing::warn!(value = %part, "ignoring invalid collection id"),
        }
    }
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        None
    } else {
        Some(ids)
    }
}

fn parse_corner(raw: Option<&str>, field: &str) -> Option<LngLat> {
    let trimmed = raw.map(str::trim).filter(|value| !value.is_empty())?;
    let parsed = trimmed.split_once(',').and_then(|(lng, lat)| {
        let lng = lng.trim().parse::<f64>().ok()?;
        let lat = lat.trim().parse::<f64>().ok()?;
        let in_range = lng.is_finite()
            && lat.is_finite()
            && (-180.0..=180.0).contains(&lng)
            && (-90.0..=90.0).contains(&lat);
        in_range.then_some(LngLat { lng, lat })
    });
    if parsed.is_none() {
        tracing::warn!(field, value = %trimmed, "ignoring malformed bounds corner; expected lng,lat");
    }
    parsed
}

pub fn km_to_meters(km: f64) -> f64 {
    km * METERS_PER_KILOMETER
}

/// Builds the route listing statement. Values only ever reach the SQL text as
/// positional placeholders.
pub fn build_route_query(filter: &RouteFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(ROUTE_SELECT);
    qb.push(" WHERE 1=1");

    let (min_m, max_m) = distance_bounds_m(filter);
    if let Some(min_m) = min_m {
        qb.push(" AND r.distance >= ").push_bind(min_m);
    }
    if let Some(max_m) = max_m {
        qb.push(" AND r.distance <= ").push_bind(max_m);
    }
    if let Some(sport) = filter.sport.clone() {
        qb.push(" AND r.sport = ").push_bind(sport);
    }
    if let Some(collections) = filter.collections.clone() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM collection_routes cr WHERE cr.route_id = r.id AND cr.collection_id = ANY(",
        )
        .push_bind(collections)
        .push("))");
    }
    if let Some(bounds) = filter.bounds {
        qb.push(
            " AND r.min_lat IS NOT NULL AND r.min_lng IS NOT NULL AND r.max_lat IS NOT NULL AND r.max_lng IS NOT NULL",
        );
        qb.push(" AND box(point(r.min_lng, r.min_lat), point(r.max_lng, r.max_lat)) && box(")
            .push_bind(bounds.south_west.to_pg_point())
            .push("::point, ")
            .push_bind(bounds.north_east.to_pg_point())
            .push("::point)");
    }

    qb.push(" ORDER BY r.id ASC LIMIT ").push_bind(filter.limit);
    qb
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct KomootLink {
    pub id: i64,
    pub name: Option<String>,
    pub sport: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct RouteRow {
    pub id: i32,
    pub name: String,
    pub sport: Option<String>,
    pub distance: Option<f64>,
    pub duration: Option<i32>,
    pub elevation_up: Option<f64>,
    pub elevation_down: Option<f64>,
    pub kcal_active: Option<i32>,
    pub status: Option<String>,
    pub gpx_file_path: Option<String>,
    pub route_points: Option<SqlJson<JsonValue>>,
    pub min_lat: Option<f64>,
    pub min_lng: Option<f64>,
    pub max_lat: Option<f64>,
    pub max_lng: Option<f64>,
    pub komoot: Option<SqlJson<KomootLink>>,
    pub collection_ids: Vec<i32>,
}

pub async fn fetch_routes(db: &PgPool, filter: &RouteFilter) -> Result<Vec<RouteRow>, sqlx::Error> {
    tracing::debug!(?filter, "querying routes");
    let mut qb = build_route_query(filter);
    qb.build_query_as::<RouteRow>().fetch_all(db).await
}

pub async fn fetch_route(db: &PgPool, id: i32) -> Result<Option<RouteRow>, sqlx::Error> {
    let mut qb = QueryBuilder::<Postgres>::new(ROUTE_SELECT);
    qb.push(" WHERE r.id = ").push_bind(id);
    qb.build_query_as::<RouteRow>().fetch_optional(db).await
}

/// Normalizes stored track points to `[lat, lng, elevation]` triples.
///
/// Points are stored either as arrays (`[lat, lng]` or `[lat, lng, ele]`) or
/// as objects (`{"lat", "lng", "elevation"}`). Unreadable points are skipped;
/// a track with fewer than two usable points is reported as absent.
pub fn normalize_track_points(value: &JsonValue) -> Option<Vec<[f64; 3]>> {
    let points = value.as_array()?;
    let normalized: Vec<[f64; 3]> = points.iter().filter_map(normalize_point).collect();
    if normalized.len() < 2 {
        return None;
    }
    Some(normalized)
}

fn normalize_point(point: &JsonValue) -> Option<[f64; 3]> {
    let (lat, lng, elevation) = match point {
        JsonValue::Array(values) => (
            values.first()?.as_f64()?,
            values.get(1)?.as_f64()?,
            values.get(2).and_then(JsonValue::as_f64),
        ),
        JsonValue::Object(map) => (
            map.get("lat")?.as_f64()?,
            map.get("lng").or_else(|| map.get("lon"))?.as_f64()?,
            map.get("elevation")
                .or_else(|| map.get("ele"))
                .and_then(JsonValue::as_f64),
        ),
        _ => return None,
    };
    Some([lat, lng, elevation.unwrap_or(0.0)])
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: LimitPolicy = LimitPolicy {
        default: 1000,
        max: 5000,
    };

    fn input() -> RouteFilterInput {
        RouteFilterInput::default()
    }

    impl RouteFilter {
        fn unfiltered(limits: &LimitPolicy) -> Self {
            Self {
                sport: None,
                collections: None,
                min_distance_km: None,
                max_distance_km: None,
                bounds: None,
                limit: limits.default,
            }
        }

        /// Query-string fields that constrain the result; the bounds window
        /// counts as the two fields it was built from.
        fn applied_field_count(&self) -> usize {
            usize::from(self.sport.is_some())
                + usize::from(self.collections.is_some())
                + usize::from(self.min_distance_km.is_some())
                + usize::from(self.max_distance_km.is_some())
                + if self.bounds.is_some() { 2 } else { 0 }
        }
    }

    fn input_from_uri(uri: &str) -> RouteFilterInput {
        let uri: axum::http::Uri = uri.parse().expect("uri");
        let axum::extract::Query(pairs) =
            axum::extract::Query::<Vec<(String, String)>>::try_from_uri(&uri).expect("query");
        RouteFilterInput::from_pairs(pairs)
    }

    fn placeholder_count(sql: &str) -> usize {
        (1..=32)
            .take_while(|n| sql.contains(&format!("${n}")))
            .count()
    }

    #[test]
    fn no_parameters_still_applies_default_limit() {
        let filter = RouteFilter::from_input(&input(), &LIMITS);
        assert_eq!(filter, RouteFilter::unfiltered(&LIMITS));
        assert_eq!(filter.limit, 1000);

        let qb = build_route_query(&filter);
        let sql = qb.sql();
        assert!(sql.contains("LIMIT $1"));
        assert_eq!(placeholder_count(sql), 1);
    }

    #[test]
    fn distances_are_converted_to_meters_and_bound() {
        let filter = RouteFilter::from_input(
            &RouteFilterInput {
                min_distance: Some("10".to_string()),
                max_distance: Some("20".to_string()),
                ..input()
            },
            &LIMITS,
        );
        assert_eq!(filter.min_distance_km, Some(10.0));
        assert_eq!(filter.max_distance_km, Some(20.0));
        assert_eq!(distance_bounds_m(&filter), (Some(10_000.0), Some(20_000.0)));

        let qb = build_route_query(&filter);
        let sql = qb.sql();
        assert!(sql.contains("r.distance >= $1"));
        assert!(sql.contains("r.distance <= $2"));
        assert!(sql.contains("LIMIT $3"));
        assert!(!sql.contains("10000"));
        assert!(!sql.contains("20000"));
    }

    #[test]
    fn query_string_fields_map_to_the_filter() {
        let filter = RouteFilter::from_input(
            &input_from_uri("/api/routes?minDistance=10&maxDistance=20&limit=abc"),
            &LIMITS,
        );
        assert_eq!(filter.min_distance_km, Some(10.0));
        assert_eq!(filter.max_distance_km, Some(20.0));
        assert_eq!(distance_bounds_m(&filter), (Some(10_000.0), Some(20_000.0)));
        assert_eq!(filter.limit, 1000);
    }

    #[test]
    fn repeated_query_keys_are_folded() {
        let input = input_from_uri(
            "/api/routes?collections=3&sport=hike&collections=1,2&sport=run&unknown=x&minBounds=5.0%2C52.0",
        );
        assert_eq!(input.collections.as_deref(), Some("3,1,2"));
        assert_eq!(input.sport.as_deref(), Some("run"));
        assert_eq!(input.min_bounds.as_deref(), Some("5.0,52.0"));

        let filter = RouteFilter::from_input(&input, &LIMITS);
        assert_eq!(filter.collections, Some(vec![1, 2, 3]));
        assert_eq!(filter.sport.as_deref(), Some("run"));
    }

    #[test]
    fn zero_distance_is_a_real_value() {
        let filter = RouteFilter::from_input(
            &RouteFilterInput {
                min_distance: Some("0".to_string()),
                ..input()
            },
            &LIMITS,
        );
        assert_eq!(filter.min_distance_km, Some(0.0));
        assert_eq!(filter.applied_field_count(), 1);
    }

    #[test]
    fn malformed_numbers_are_treated_as_absent() {
        let filter = RouteFilter::from_input(
            &RouteFilterInput {
                min_distance: Some("ten".to_string()),
                max_distance: Some("NaN".to_string()),
                limit: Some("lots".to_string()),
                ..input()
            },
            &LIMITS,
        );
        assert_eq!(filter.min_distance_km, None);
        assert_eq!(filter.max_distance_km, None);
        assert_eq!(filter.limit, 1000);
    }

    #[test]
    fn limit_is_never_unbounded() {
        let cases = [
            (None, 1000),
            (Some("0"), 1000),
            (Some("-5"), 1000),
            (Some("200"), 200),
            (Some("999999999"), 5000),
        ];
        for (raw, expected) in cases {
            let filter = RouteFilter::from_input(
                &RouteFilterInput {
                    limit: raw.map(ToOwned::to_owned),
                    ..input()
                },
                &LIMITS,
            );
            assert_eq!(filter.limit, expected, "limit {raw:?}");
        }
    }

    #[test]
    fn parameter_count_tracks_applied_fields_and_values_are_never_inlined() {
        let sport = "gravel_bike'; DROP TABLE routes; --";
        let filter = RouteFilter::from_input(
            &RouteFilterInput {
                sport: Some(sport.to_string()),
                collections: Some("2, 1,abc,2".to_string()),
                min_distance: Some("40".to_string()),
                max_distance: Some("60.5".to_string()),
                min_bounds: Some("5.0,52.0".to_string()),
                max_bounds: Some("5.5,52.3".to_string()),
                limit: Some("200".to_string()),
            },
            &LIMITS,
        );
        assert_eq!(filter.collections, Some(vec![1, 2]));
        assert_eq!(filter.applied_field_count(), 6);

        let qb = build_route_query(&filter);
        let sql = qb.sql();
        assert_eq!(placeholder_count(sql), filter.applied_field_count() + 1);
        assert!(!sql.contains("gravel_bike"));
        assert!(!sql.contains("DROP TABLE"));
        assert!(!sql.contains("52.3"));
        assert!(!sql.contains("60500"));
        assert!(!sql.contains("200"));
    }

    #[test]
    fn partial_subsets_keep_placeholders_in_order() {
        let filter = RouteFilter::from_input(
            &RouteFilterInput {
                sport: Some(" hike ".to_string()),
                max_distance: Some("12".to_string()),
                ..input()
            },
            &LIMITS,
        );
        assert_eq!(filter.sport.as_deref(), Some("hike"));

        let qb = build_route_query(&filter);
        let sql = qb.sql();
        assert!(sql.contains("r.distance <= $1"));
        assert!(sql.contains("r.sport = $2"));
        assert!(sql.contains("LIMIT $3"));
        assert_eq!(placeholder_count(sql), 3);
    }

    #[test]
    fn a_single_bounds_corner_is_ignored() {
        let filter = RouteFilter::from_input(
            &RouteFilterInput {
                min_bounds: Some("5.0,52.0".to_string()),
                ..input()
            },
            &LIMITS,
        );
        assert_eq!(filter.bounds, None);
        assert_eq!(filter.applied_field_count(), 0);

        let filter = RouteFilter::from_input(
            &RouteFilterInput {
                min_bounds: Some("5.0,52.0".to_string()),
                max_bounds: Some("not-a-corner".to_string()),
                ..input()
            },
            &LIMITS,
        );
        assert_eq!(filter.bounds, None);
    }

    #[test]
    fn bounds_corners_are_normalized() {
        let filter = RouteFilter::from_input(
            &RouteFilterInput {
                min_bounds: Some("5.5,52.3".to_string()),
                max_bounds: Some("5.0,52.0".to_string()),
                ..input()
            },
            &LIMITS,
        );
        let bounds = filter.bounds.expect("bounds");
        assert_eq!(bounds.south_west, LngLat { lng: 5.0, lat: 52.0 });
        assert_eq!(bounds.north_east, LngLat { lng: 5.5, lat: 52.3 });
        assert_eq!(bounds.south_west.to_pg_point(), "(5,52)");
    }

    #[test]
    fn empty_collection_list_is_absent() {
        assert_eq!(parse_collections(Some(" , ,x")), None);
        assert_eq!(parse_collections(Some("3")), Some(vec![3]));
    }

    #[test]
    fn track_points_normalize_from_arrays_and_objects() {
        let arrays = serde_json::json!([[52.1, 5.1, 10], [52.2, 5.2]]);
        assert_eq!(
            normalize_track_points(&arrays),
            Some(vec![[52.1, 5.1, 10.0], [52.2, 5.2, 0.0]])
        );

        let objects = serde_json::json!([
            {"lat": 52.1, "lng": 5.1, "elevation": 3.5},
            {"lat": 52.2, "lng": 5.2, "elevation": 4.0}
        ]);
        assert_eq!(
            normalize_track_points(&objects),
            Some(vec![[52.1, 5.1, 3.5], [52.2, 5.2, 4.0]])
        );
    }

    #[test]
    fn short_or_malformed_tracks_are_absent() {
        assert_eq!(normalize_track_points(&serde_json::json!([[52.1, 5.1]])), None);
        assert_eq!(normalize_track_points(&serde_json::json!({"lat": 1})), None);
        assert_eq!(
            normalize_track_points(&serde_json::json!([[52.1, 5.1], "x", [52.2]])),
            None
        );
    }
}
