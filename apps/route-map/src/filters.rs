use std::collections::BTreeSet;
use std::fmt;

use crate::model::Sport;
use crate::view::Bounds;

/// Result cap used by the sidebar until the user changes it.
pub const DEFAULT_UI_LIMIT: u32 = 200;

/// Filter criteria as edited in the sidebar. Every optional field is either
/// present with a real value or absent; zero is a value.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteFilters {
    pub sport: Option<Sport>,
    pub collections: BTreeSet<i64>,
    pub min_distance_km: Option<f64>,
    pub max_distance_km: Option<f64>,
    pub bounds: Option<Bounds>,
    pub limit: u32,
}

impl Default for RouteFilters {
    fn default() -> Self {
        Self {
            sport: None,
            collections: BTreeSet::new(),
            min_distance_km: None,
            max_distance_km: None,
            bounds: None,
            limit: DEFAULT_UI_LIMIT,
        }
    }
}

/// Canonical identity of a filter value. Two filters with the same key ask the
/// route API the same question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterKey(String);

impl FilterKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl RouteFilters {
    /// Query-string pairs in a fixed order. Absent fields are omitted and
    /// non-finite distances are treated as absent.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(sport) = self.sport {
            pairs.push(("sport", sport.key().to_string()));
        }
        if !self.collections.is_empty() {
            let ids: Vec<String> = self.collections.iter().map(i64::to_string).collect();
            pairs.push(("collections", ids.join(",")));
        }
        if let Some(km) = self.min_distance_km.filter(|km| km.is_finite()) {
            pairs.push(("minDistance", km.to_string()));
        }
        if let Some(km) = self.max_distance_km.filter(|km| km.is_finite()) {
            pairs.push(("maxDistance", km.to_string()));
        }
        if let Some(bounds) = self.bounds {
            pairs.push(("minBounds", bounds.south_west.to_query_value()));
            pairs.push(("maxBounds", bounds.north_east.to_query_value()));
        }
        pairs.push(("limit", self.limit.max(1).to_string()));
        pairs
    }

    pub fn key(&self) -> FilterKey {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in self.query_pairs() {
            serializer.append_pair(name, &value);
        }
        FilterKey(serializer.finish())
    }

    pub fn with_bounds(&self, bounds: Option<Bounds>) -> Self {
        Self {
            bounds,
            ..self.clone()
        }
    }
}

/// Coerces free-text distance input (km). Blank, non-numeric, non-finite or
/// negative input is absent rather than NaN or zero.
pub fn parse_distance_input(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.replace(',', ".").parse::<f64>() {
        Ok(km) if km.is_finite() && km >= 0.0 => Some(km),
        _ => {
            tracing::warn!(value = %trimmed, "ignoring distance input that is not a non-negative number");
            None
        }
    }
}
