use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use crate::error::GeolocationError;
use crate::geometry::CollectionCatalog;
use crate::model::{ExternalLink, RouteId};
use crate::store::{Action, AppState, Store};
use crate::view::{Bounds, Camera, LngLat};

pub const INITIAL_GEOLOCATION_DELAY: Duration = Duration::from_secs(1);

/// Transient per-feature flags read by the overlay layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureState {
    pub hover: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureStates {
    states: BTreeMap<RouteId, FeatureState>,
}

impl FeatureStates {
    pub fn get(&self, id: RouteId) -> FeatureState {
        self.states.get(&id).copied().unwrap_or_default()
    }

    fn update(&mut self, id: RouteId, f: impl FnOnce(&mut FeatureState)) {
        let state = self.states.entry(id).or_default();
        f(state);
        if *state == FeatureState::default() {
            self.states.remove(&id);
        }
    }

    pub fn set_hover(&mut self, id: RouteId, hover: bool) {
        self.update(id, |state| state.hover = hover);
    }

    pub fn set_selected(&mut self, id: RouteId, selected: bool) {
        self.update(id, |state| state.selected = selected);
    }

    pub fn hovered(&self) -> impl Iterator<Item = RouteId> + '_ {
        self.states
            .iter()
            .filter(|(_, state)| state.hover)
            .map(|(id, _)| *id)
    }

    pub fn selected(&self) -> impl Iterator<Item = RouteId> + '_ {
        self.states
            .iter()
            .filter(|(_, state)| state.selected)
            .map(|(id, _)| *id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutePopup {
    pub route_id: RouteId,
    pub name: String,
    pub collection: Option<String>,
    pub position: LngLat,
    pub link: Option<ExternalLink>,
}

/// Pointer, click and camera handling for the route layers.
#[derive(Debug, Clone, Default)]
pub struct MapInteraction {
    catalog: CollectionCatalog,
    feature_states: FeatureStates,
    hovered: Option<RouteId>,
    popup: Option<RoutePopup>,
}

impl MapInteraction {
    pub fn new(catalog: CollectionCatalog) -> Self {
        Self {
            catalog,
            ..Self::default()
        }
    }

    pub fn feature_states(&self) -> &FeatureStates {
        &self.feature_states
    }

    pub fn hovered(&self) -> Option<RouteId> {
        self.hovered
    }

    pub fn popup(&self) -> Option<&RoutePopup> {
        self.popup.as_ref()
    }

    pub fn cursor(&self) -> &'static str {
        if self.hovered.is_some() {
            "pointer"
        } else {
            "grab"
        }
    }

    /// Pointer is over `route_id`. Ids missing from the loaded routes count as
    /// leaving.
    pub fn pointer_enter(&mut self, state: &AppState, route_id: RouteId, position: LngLat) {
        let Some(route) = state
            .query
            .data
            .as_ref()
            .and_then(|routes| routes.iter().find(|route| route.id == route_id))
        else {
            self.pointer_leave();
            return;
        };

        if let Some(previous) = self.hovered.take() {
            self.feature_states.set_hover(previous, false);
        }
        self.feature_states.set_hover(route_id, true);
        self.hovered = Some(route_id);
        self.popup = Some(RoutePopup {
            route_id,
            name: route.name.clone(),
            collection: route
                .collections
                .first()
                .map(|link| self.catalog.label_for(link.collection_id).to_string()),
            position,
            link: route.external_link(),
        });
    }

    pub fn pointer_leave(&mut self) {
        if let Some(previous) = self.hovered.take() {
            self.feature_states.set_hover(previous, false);
        }
        self.popup = None;
    }

    /// `None` is a click on empty map and clears the selection.
    pub fn click(&mut self, store: &mut Store, route_id: Option<RouteId>) {
        let target = route_id.filter(|id| {
            store
                .state()
                .query
                .data
                .as_ref()
                .is_some_and(|routes| routes.iter().any(|route| route.id == *id))
        });
        store.dispatch(Action::SelectRoute(target));
        self.sync_selection(store.state());
    }

    /// Moves the selected flag from the previous selection to the current one.
    pub fn sync_selection(&mut self, state: &AppState) {
        let selection = state.routes.selection;
        if let Some(previous) = selection.previous {
            self.feature_states.set_selected(previous, false);
        }
        if let Some(selected) = selection.selected {
            self.feature_states.set_selected(selected, true);
        }
    }

    pub fn on_move(&self, store: &mut Store, camera: Camera) {
        store.dispatch(Action::SetCamera(camera));
    }

    /// Gesture settled; only now does the visible window reach the filters.
    pub fn on_move_end(&self, store: &mut Store, camera: Camera, bounds: Bounds) {
        store.dispatch(Action::SetCamera(camera));
        store.dispatch(Action::CommitBounds(bounds));
    }
}

pub trait Geolocator {
    fn current_position(&self) -> impl Future<Output = Result<LngLat, GeolocationError>>;
}

/// One-shot recenter on the user's position after `delay`. Failures leave the
/// default view in place.
pub async fn initial_geolocation<G: Geolocator>(store: &mut Store, locator: &G, delay: Duration) {
    tokio::time::sleep(delay).await;
    match locator.current_position().await {
        Ok(position) => store.dispatch(Action::SetCenter(position)),
        Err(err) => tracing::debug!(error = %err, "geolocation unavailable; keeping default view"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::RequestId;
    use crate::filters::RouteFilters;
    use crate::view::DEFAULT_CENTER;
    use std::sync::Arc;

    fn loaded_store() -> Store {
        let mut store = Store::default();
        let id = RequestId {
            seq: 1,
            key: RouteFilters::default().key(),
        };
        let routes = vec![
            serde_json::from_value(serde_json::json!({
                "id": 1, "name": "Amerongen", "collections": [{"collectionId": 1}],
                "komoot": {"id": 77}
            }))
            .expect("route"),
            serde_json::from_value(serde_json::json!({"id": 2, "name": "Rhenen"})).expect("route"),
        ];
        store.dispatch(Action::QueryCached {
            id,
            routes: Arc::new(routes),
        });
        store
    }

    #[test]
    fn hover_moves_between_routes() {
        let store = loaded_store();
        let mut map = MapInteraction::new(CollectionCatalog::builtin());
        let at = LngLat::new(5.4, 52.0);

        map.pointer_enter(store.state(), 1, at);
        map.pointer_enter(store.state(), 2, at);
        assert_eq!(map.feature_states().hovered().collect::<Vec<_>>(), vec![2]);
        assert!(!map.feature_states().get(1).hover);
        assert_eq!(map.popup().map(|p| p.name.as_str()), Some("Rhenen"));
        assert_eq!(map.cursor(), "pointer");

        map.pointer_leave();
        assert_eq!(map.feature_states().hovered().count(), 0);
        assert!(map.popup().is_none());
        assert_eq!(map.cursor(), "grab");
    }

    #[test]
    fn popup_carries_collection_label_and_link() {
        let store = loaded_store();
        let mut map = MapInteraction::new(CollectionCatalog::builtin());
        map.pointer_enter(store.state(), 1, LngLat::new(5.4, 52.0));
        let popup = map.popup().expect("popup");
        assert_eq!(popup.collection.as_deref(), Some("Personal"));
        assert_eq!(
            popup.link.as_ref().map(|l| l.url.as_str()),
            Some("https://www.komoot.com/tour/77")
        );
    }

    #[test]
    fn hovering_an_unknown_feature_clears_hover() {
        let store = loaded_store();
        let mut map = MapInteraction::default();
        map.pointer_enter(store.state(), 1, DEFAULT_CENTER);
        map.pointer_enter(store.state(), 404, DEFAULT_CENTER);
        assert_eq!(map.hovered(), None);
        assert_eq!(map.feature_states().hovered().count(), 0);
    }

    #[test]
    fn selecting_a_then_b_flags_only_b() {
        let mut store = loaded_store();
        let mut map = MapInteraction::default();
        map.click(&mut store, Some(1));
        map.click(&mut store, Some(2));
        assert_eq!(map.feature_states().selected().collect::<Vec<_>>(), vec![2]);
        assert_eq!(store.state().routes.selection.previous, Some(1));

        map.click(&mut store, None);
        assert_eq!(map.feature_states().selected().count(), 0);
        assert_eq!(store.state().selected_route(), None);
    }

    #[test]
    fn camera_moves_commit_bounds_on_settle_only() {
        let mut store = Store::default();
        let map = MapInteraction::default();
        let camera = Camera {
            longitude: 5.2,
            latitude: 52.1,
            zoom: 12.0,
            pitch: None,
            bearing: None,
        };
        map.on_move(&mut store, camera);
        assert_eq!(store.state().view.camera, camera);
        assert_eq!(store.state().view.committed_bounds, None);

        let bounds = Bounds::new(LngLat::new(5.0, 52.0), LngLat::new(5.4, 52.2));
        map.on_move_end(&mut store, camera, bounds);
        assert_eq!(store.state().view.committed_bounds, Some(bounds));
    }

    struct FixedLocator(Result<LngLat, GeolocationError>);

    impl Geolocator for FixedLocator {
        fn current_position(&self) -> impl Future<Output = Result<LngLat, GeolocationError>> {
            let result = self.0.clone();
            async move { result }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn geolocation_recenters_after_the_delay() {
        let mut store = Store::default();
        let started = tokio::time::Instant::now();
        let locator = FixedLocator(Ok(LngLat::new(4.9, 52.37)));
        initial_geolocation(&mut store, &locator, INITIAL_GEOLOCATION_DELAY).await;
        assert!(started.elapsed() >= INITIAL_GEOLOCATION_DELAY);
        assert_eq!(store.state().view.center(), LngLat::new(4.9, 52.37));
    }

    #[tokio::test(start_paused = true)]
    async fn geolocation_failure_keeps_the_default_view() {
        let mut store = Store::default();
        let locator = FixedLocator(Err(GeolocationError::PermissionDenied));
        initial_geolocation(&mut store, &locator, INITIAL_GEOLOCATION_DELAY).await;
        assert_eq!(store.state().view.center(), DEFAULT_CENTER);
    }
}
