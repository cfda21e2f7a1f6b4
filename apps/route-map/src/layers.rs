//! MapLibre line layers for the route source.
//!
//! Layers are plain style JSON. Base lines are colored by the `collection`
//! property; the hover and selection overlays stay transparent until the
//! matching feature-state flag is set.

use serde::Serialize;
use serde_json::{json, Value as JsonValue};

use crate::geometry::{CollectionCatalog, DEFAULT_COLLECTION};

/// GeoJSON source id the layers read from.
pub const ROUTE_SOURCE_ID: &str = "routes";

pub const ROUTES_LAYER_ID: &str = "routes";
pub const HIGHLIGHTED_LAYER_ID: &str = "highlighted-route";
pub const SELECTED_LAYER_ID: &str = "selected-route";
pub const SELECTED_BACKGROUND_LAYER_ID: &str = "selected-route-background";

const DEFAULT_COLOR: &str = "#6b7280";
const HIGHLIGHT_COLOR: &str = "#155e75";
const SELECTED_COLOR: &str = "#164e63";
const SELECTED_BACKGROUND_COLOR: &str = "#ffffff";

pub fn collection_color(slug: &str) -> &'static str {
    match slug {
        "personal" => "#0e7490",
        "gravelritten" => "#16a34a",
        "gijs_bruinsma" => "#eab308",
        _ => DEFAULT_COLOR,
    }
}

fn line_layer(id: &str, color: JsonValue, opacity: JsonValue, width: f64) -> JsonValue {
    json!({
        "id": id,
        "type": "line",
        "source": ROUTE_SOURCE_ID,
        "layout": {
            "line-join": "round",
            "line-cap": "round",
        },
        "paint": {
            "line-color": color,
            "line-opacity": opacity,
            "line-width": width,
        },
    })
}

fn feature_state_opacity(flag: &str) -> JsonValue {
    json!(["case", ["boolean", ["feature-state", flag], false], 1, 0])
}

/// `match` on the `collection` property with the default color as fallback.
fn collection_color_expression(catalog: &CollectionCatalog) -> JsonValue {
    if catalog.collections().is_empty() {
        // MapLibre rejects a match with no branches.
        return json!(DEFAULT_COLOR);
    }
    let mut expr = vec![json!("match"), json!(["get", "collection"])];
    for collection in catalog.collections() {
        expr.push(json!(collection.slug));
        expr.push(json!(collection_color(&collection.slug)));
    }
    expr.push(json!(DEFAULT_COLOR));
    JsonValue::Array(expr)
}

/// Layers in draw order, bottom first.
pub fn route_layers(catalog: &CollectionCatalog) -> Vec<JsonValue> {
    vec![
        line_layer(
            ROUTES_LAYER_ID,
            collection_color_expression(catalog),
            json!(0.5),
            5.0,
        ),
        line_layer(
            HIGHLIGHTED_LAYER_ID,
            json!(HIGHLIGHT_COLOR),
            feature_state_opacity("hover"),
            8.0,
        ),
        line_layer(
            SELECTED_BACKGROUND_LAYER_ID,
            json!(SELECTED_BACKGROUND_COLOR),
            feature_state_opacity("selected"),
            14.0,
        ),
        line_layer(
            SELECTED_LAYER_ID,
            json!(SELECTED_COLOR),
            feature_state_opacity("selected"),
            8.0,
        ),
    ]
}

/// Layers that report pointer events.
pub fn interactive_layer_ids() -> Vec<&'static str> {
    vec![ROUTES_LAYER_ID]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub slug: String,
    pub label: String,
    pub color: &'static str,
}

pub fn legend(catalog: &CollectionCatalog) -> Vec<LegendEntry> {
    catalog
        .collections()
        .iter()
        .map(|c| LegendEntry {
            slug: c.slug.clone(),
            label: c.name.clone(),
            color: collection_color(&c.slug),
        })
        .chain(std::iter::once(LegendEntry {
            slug: DEFAULT_COLLECTION.to_string(),
            label: "Other".to_string(),
            color: DEFAULT_COLOR,
        }))
        .collect()
}
