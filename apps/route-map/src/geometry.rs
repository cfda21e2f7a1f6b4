use geojson::{feature, Feature, FeatureCollection, Geometry, Value};
use serde::{Deserialize, Serialize};

use crate::model::RouteRecord;

/// Bucket for routes with no resolvable collection.
pub const DEFAULT_COLLECTION: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Maps collection ids to the slugs the layer styles key on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionCatalog {
    collections: Vec<CollectionInfo>,
}

impl Default for CollectionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CollectionCatalog {
    pub fn builtin() -> Self {
        let collections = [
            (1, "Personal", "personal"),
            (2, "Gravelritten", "gravelritten"),
            (3, "Gijs Bruinsma", "gijs_bruinsma"),
        ]
        .into_iter()
        .map(|(id, name, slug)| CollectionInfo {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
        })
        .collect();
        Self { collections }
    }

    pub fn from_collections(collections: Vec<CollectionInfo>) -> Self {
        Self { collections }
    }

    pub fn collections(&self) -> &[CollectionInfo] {
        &self.collections
    }

    pub fn slug_for(&self, collection_id: i64) -> Option<&str> {
        self.collections
            .iter()
            .find(|c| c.id == collection_id)
            .map(|c| c.slug.as_str())
    }

    pub fn label_for(&self, collection_id: i64) -> &str {
        self.collections
            .iter()
            .find(|c| c.id == collection_id)
            .map_or("Unknown", |c| c.name.as_str())
    }

    /// Only the first membership counts; anything unresolvable lands in
    /// [`DEFAULT_COLLECTION`].
    pub fn classify(&self, route: &RouteRecord) -> &str {
        route
            .collections
            .first()
            .and_then(|link| self.slug_for(link.collection_id))
            .unwrap_or(DEFAULT_COLLECTION)
    }
}

pub fn route_feature(route: &RouteRecord, catalog: &CollectionCatalog) -> Option<Feature> {
    let track = route.track()?;
    let coordinates = track.iter().map(|p| vec![p.lng, p.lat]).collect();

    let mut feature = Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::LineString(coordinates))),
        id: Some(feature::Id::Number(route.id.into())),
        properties: None,
        foreign_members: None,
    };
    feature.set_property("collection", catalog.classify(route));
    feature.set_property("name", route.name.as_str());
    Some(feature)
}

/// One line feature per drawable route, in input order. Routes without a track
/// are skipped.
pub fn route_features(routes: &[RouteRecord], catalog: &CollectionCatalog) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: routes
            .iter()
            .filter_map(|route| route_feature(route, catalog))
            .collect(),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(value: serde_json::Value) -> RouteRecord {
        serde_json::from_value(value).expect("route")
    }

    #[test]
    fn coordinates_are_swapped_to_lng_lat() {
        let routes = vec![route(serde_json::json!({
            "id": 12,
            "name": "Kromme Rijn",
            "routePoints": [[52.1, 5.1, 10], [52.2, 5.2, 20]],
            "collections": [{"collectionId": 2}]
        }))];
        let fc = route_features(&routes, &CollectionCatalog::builtin());
        assert_eq!(fc.features.len(), 1);

        let feature = &fc.features[0];
        assert_eq!(feature.id, Some(feature::Id::Number(12.into())));
        assert_eq!(
            feature.geometry.as_ref().map(|g| g.value.clone()),
            Some(Value::LineString(vec![vec![5.1, 52.1], vec![5.2, 52.2]]))
        );
        assert_eq!(
            feature.property("collection"),
            Some(&serde_json::json!("gravelritten"))
        );
        assert_eq!(feature.property("name"), Some(&serde_json::json!("Kromme Rijn")));
    }

    #[test]
    fn routes_without_collections_use_the_default_bucket() {
        let catalog = CollectionCatalog::builtin();
        let plain = route(serde_json::json!({"id": 1}));
        assert_eq!(catalog.classify(&plain), DEFAULT_COLLECTION);

        let unknown = route(serde_json::json!({"id": 2, "collections": [{"collectionId": 99}, {"collectionId": 1}]}));
        assert_eq!(catalog.classify(&unknown), DEFAULT_COLLECTION);
        assert_eq!(catalog.label_for(99), "Unknown");
    }

    #[test]
    fn routes_without_a_drawable_track_are_skipped() {
        let routes = vec![
            route(serde_json::json!({"id": 1})),
            route(serde_json::json!({"id": 2, "routePoints": [[52.1, 5.1, 0]]})),
            route(serde_json::json!({"id": 3, "routePoints": [[52.1, 5.1], [52.1, 5.2]]})),
        ];
        let fc = route_features(&routes, &CollectionCatalog::default());
        let ids: Vec<_> = fc.features.iter().map(|f| f.id.clone()).collect();
        assert_eq!(ids, vec![Some(feature::Id::Number(3.into()))]);
    }

    #[test]
    fn server_catalog_replaces_the_builtin_one() {
        let catalog = CollectionCatalog::from_collections(vec![CollectionInfo {
            id: 7,
            name: "Alpen".to_string(),
            slug: "alpen".to_string(),
        }]);
        let routed = route(serde_json::json!({"id": 1, "collections": [{"collectionId": 7}]}));
        assert_eq!(catalog.classify(&routed), "alpen");
        assert_eq!(catalog.slug_for(1), None);
    }
}
