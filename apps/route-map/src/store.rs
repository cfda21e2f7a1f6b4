use std::collections::BTreeSet;
use std::sync::Arc;

use crate::fetch::RequestId;
use crate::filters::{FilterKey, RouteFilters};
use crate::model::{RouteId, RouteRecord, Sport};
use crate::view::{Bounds, Camera, LngLat, ViewState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub selected: Option<RouteId>,
    /// Whatever `selected` held before the last change.
    pub previous: Option<RouteId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSlice {
    pub filters: RouteFilters,
    pub selection: Selection,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySlice {
    /// The request whose result the UI is waiting for.
    pub active: Option<RequestId>,
    pub data: Option<Arc<Vec<RouteRecord>>>,
    /// Filters `data` was fetched for.
    pub data_key: Option<FilterKey>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub view: ViewState,
    pub routes: FilterSlice,
    pub query: QuerySlice,
}

impl AppState {
    /// Sidebar filters plus the committed map window.
    pub fn effective_filters(&self) -> RouteFilters {
        self.routes.filters.with_bounds(self.view.committed_bounds)
    }

    pub fn selected_route(&self) -> Option<&RouteRecord> {
        let id = self.routes.selection.selected?;
        self.query.data.as_ref()?.iter().find(|route| route.id == id)
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    SetCamera(Camera),
    CommitBounds(Bounds),
    SetCenter(LngLat),
    SetSport(Option<Sport>),
    SetCollections(BTreeSet<i64>),
    SetMinDistance(Option<f64>),
    SetMaxDistance(Option<f64>),
    SetLimit(u32),
    ReplaceFilters(RouteFilters),
    /// Stores the new selection and the one it replaces in one step.
    SelectRoute(Option<RouteId>),
    QueryStarted(RequestId),
    QueryCached {
        id: RequestId,
        routes: Arc<Vec<RouteRecord>>,
    },
    QueryFulfilled {
        id: RequestId,
        routes: Arc<Vec<RouteRecord>>,
    },
    QueryFailed {
        id: RequestId,
        message: String,
    },
}

fn is_active(query: &QuerySlice, id: &RequestId) -> bool {
    query.active.as_ref() == Some(id)
}

/// Non-finite distances are stored as absent.
fn finite(km: Option<f64>) -> Option<f64> {
    km.filter(|km| km.is_finite())
}

pub fn reduce(state: &AppState, action: Action) -> AppState {
    let mut next = state.clone();
    match action {
        Action::SetCamera(camera) => next.view.camera = camera,
        Action::CommitBounds(bounds) => next.view.committed_bounds = Some(bounds),
        Action::SetCenter(center) => {
            next.view.camera.longitude = center.lng;
            next.view.camera.latitude = center.lat;
        }
        Action::SetSport(sport) => next.routes.filters.sport = sport,
        Action::SetCollections(collections) => next.routes.filters.collections = collections,
        Action::SetMinDistance(km) => next.routes.filters.min_distance_km = finite(km),
        Action::SetMaxDistance(km) => next.routes.filters.max_distance_km = finite(km),
        Action::SetLimit(limit) => next.routes.filters.limit = limit.max(1),
        Action::ReplaceFilters(filters) => {
            next.routes.filters = RouteFilters {
                min_distance_km: finite(filters.min_distance_km),
                max_distance_km: finite(filters.max_distance_km),
                limit: filters.limit.max(1),
                ..filters
            }
        }
        Action::SelectRoute(id) => {
            if state.routes.selection.selected != id {
                next.routes.selection = Selection {
                    selected: id,
                    previous: state.routes.selection.selected,
                };
            }
        }
        Action::QueryStarted(id) => {
            next.query.active = Some(id);
            next.query.loading = true;
            next.query.error = None;
        }
        Action::QueryCached { id, routes } => {
            next.query.data_key = Some(id.key.clone());
            next.query.active = Some(id);
            next.query.data = Some(routes);
            next.query.loading = false;
            next.query.error = None;
        }
        Action::QueryFulfilled { id, routes } => {
            if is_active(&state.query, &id) {
                next.query.data_key = Some(id.key);
                next.query.data = Some(routes);
                next.query.loading = false;
                next.query.error = None;
            } else {
                tracing::debug!(seq = id.seq, key = %id.key, "dropping stale route result");
            }
        }
        Action::QueryFailed { id, message } => {
            if is_active(&state.query, &id) {
                next.query.loading = false;
                next.query.error = Some(message);
            } else {
                tracing::debug!(seq = id.seq, key = %id.key, "dropping stale route error");
            }
        }
    }
    next
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&AppState)>;

/// Owns the state tree. Every change goes through [`Store::dispatch`].
pub struct Store {
    state: AppState,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}

impl Store {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn select<T>(&self, selector: impl FnOnce(&AppState) -> T) -> T {
        selector(&self.state)
    }

    /// Applies `action` and notifies listeners if anything changed.
    pub fn dispatch(&mut self, action: Action) {
        let next = reduce(&self.state, action);
        if next == self.state {
            return;
        }
        self.state = next;
        for (_, listener) in &mut self.listeners {
            listener(&self.state);
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&AppState) + 'static) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn request(seq: u64, filters: &RouteFilters) -> RequestId {
        RequestId {
            seq,
            key: filters.key(),
        }
    }

    fn routes(ids: &[i64]) -> Arc<Vec<RouteRecord>> {
        Arc::new(
            ids.iter()
                .map(|id| serde_json::from_value(serde_json::json!({"id": id})).expect("route"))
                .collect(),
        )
    }

    #[test]
    fn selecting_tracks_the_previous_route() {
        let mut store = Store::default();
        store.dispatch(Action::SelectRoute(Some(1)));
        store.dispatch(Action::SelectRoute(Some(2)));
        assert_eq!(
            store.state().routes.selection,
            Selection {
                selected: Some(2),
                previous: Some(1)
            }
        );

        store.dispatch(Action::SelectRoute(None));
        assert_eq!(
            store.state().routes.selection,
            Selection {
                selected: None,
                previous: Some(2)
            }
        );
    }

    #[test]
    fn reselecting_the_same_route_keeps_previous() {
        let mut store = Store::default();
        store.dispatch(Action::SelectRoute(Some(1)));
        store.dispatch(Action::SelectRoute(Some(2)));
        store.dispatch(Action::SelectRoute(Some(2)));
        assert_eq!(store.state().routes.selection.previous, Some(1));
    }

    #[test]
    fn stale_results_do_not_replace_the_active_query() {
        let f1 = RouteFilters::default();
        let f2 = RouteFilters {
            sport: Some(Sport::Hike),
            ..RouteFilters::default()
        };
        let mut store = Store::default();
        store.dispatch(Action::QueryStarted(request(1, &f1)));
        store.dispatch(Action::QueryStarted(request(2, &f2)));
        store.dispatch(Action::QueryFulfilled {
            id: request(2, &f2),
            routes: routes(&[20]),
        });
        store.dispatch(Action::QueryFulfilled {
            id: request(1, &f1),
            routes: routes(&[10]),
        });

        let query = &store.state().query;
        assert_eq!(query.data_key, Some(f2.key()));
        assert_eq!(query.data.as_ref().map(|d| d[0].id), Some(20));
        assert!(!query.loading);
    }

    #[test]
    fn failures_keep_prior_data() {
        let filters = RouteFilters::default();
        let mut store = Store::default();
        store.dispatch(Action::QueryStarted(request(1, &filters)));
        store.dispatch(Action::QueryFulfilled {
            id: request(1, &filters),
            routes: routes(&[1, 2]),
        });
        store.dispatch(Action::QueryStarted(request(2, &filters)));
        store.dispatch(Action::QueryFailed {
            id: request(2, &filters),
            message: "request failed".to_string(),
        });

        let query = &store.state().query;
        assert_eq!(query.error.as_deref(), Some("request failed"));
        assert_eq!(query.data.as_ref().map(|d| d.len()), Some(2));
        assert!(!query.loading);
    }

    #[test]
    fn nan_distance_is_stored_as_absent() {
        let mut store = Store::default();
        store.dispatch(Action::SetMinDistance(Some(f64::NAN)));
        store.dispatch(Action::SetMaxDistance(Some(0.0)));
        let filters = &store.state().routes.filters;
        assert_eq!(filters.min_distance_km, None);
        assert_eq!(filters.max_distance_km, Some(0.0));
    }

    #[test]
    fn committed_bounds_feed_the_effective_filters() {
        let mut store = Store::default();
        assert_eq!(store.state().effective_filters().bounds, None);
        let bounds = Bounds::new(LngLat::new(5.0, 52.0), LngLat::new(5.2, 52.2));
        store.dispatch(Action::CommitBounds(bounds));
        assert_eq!(store.state().effective_filters().bounds, Some(bounds));
        assert_eq!(store.state().routes.filters.bounds, None);
    }

    #[test]
    fn listeners_fire_only_on_change_until_unsubscribed() {
        let mut store = Store::default();
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let id = store.subscribe(move |_| seen.set(seen.get() + 1));

        store.dispatch(Action::SetSport(Some(Sport::Run)));
        store.dispatch(Action::SetSport(Some(Sport::Run)));
        assert_eq!(calls.get(), 1);

        assert!(store.unsubscribe(id));
        store.dispatch(Action::SetSport(None));
        assert_eq!(calls.get(), 1);
        assert!(!store.unsubscribe(id));
    }

    #[test]
    fn select_reads_a_projection() {
        let mut store = Store::default();
        store.dispatch(Action::SetLimit(0));
        assert_eq!(store.select(|s| s.routes.filters.limit), 1);
    }
}
