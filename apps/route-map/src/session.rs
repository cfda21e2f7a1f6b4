use std::sync::Arc;

use geojson::FeatureCollection;

use crate::error::ClientError;
use crate::fetch::{FetchPlan, PendingFetch, RequestId, RouteFetchClient, RouteSource};
use crate::geometry::{route_features, CollectionCatalog};
use crate::model::RouteRecord;
use crate::store::{Action, Store};

/// Wires the store to the fetch client: filter changes become queries and
/// query results flow back through the store's transitions.
pub struct MapSession<S> {
    pub store: Store,
    fetcher: RouteFetchClient<S>,
    catalog: CollectionCatalog,
}

impl<S: RouteSource> MapSession<S> {
    pub fn new(store: Store, source: S, catalog: CollectionCatalog) -> Self {
        Self {
            store,
            fetcher: RouteFetchClient::new(source),
            catalog,
        }
    }

    pub fn catalog(&self) -> &CollectionCatalog {
        &self.catalog
    }

    /// Plans a query for the current effective filters. Returns the request to
    /// run when nothing cached or outstanding covers them.
    pub fn prepare_fetch(&mut self) -> Option<PendingFetch<S>> {
        let filters = self.store.state().effective_filters();
        match self.fetcher.plan(&filters) {
            FetchPlan::Cached { id, routes } => {
                self.store.dispatch(Action::QueryCached { id, routes });
                None
            }
            FetchPlan::InFlight(id) => {
                self.store.dispatch(Action::QueryStarted(id));
                None
            }
            FetchPlan::Issue(pending) => {
                self.store.dispatch(Action::QueryStarted(pending.id.clone()));
                Some(pending)
            }
        }
    }

    pub fn complete(&mut self, id: RequestId, result: Result<Vec<RouteRecord>, ClientError>) {
        match self.fetcher.complete(&id, result) {
            Ok(routes) => self.store.dispatch(Action::QueryFulfilled { id, routes }),
            Err(err) => {
                tracing::warn!(error = %err, key = %id.key, "route query failed");
                self.store.dispatch(Action::QueryFailed {
                    id,
                    message: err.to_string(),
                });
            }
        }
    }

    /// Fetches the current filters to completion.
    pub async fn refresh(&mut self) {
        if let Some(pending) = self.prepare_fetch() {
            let (id, result) = pending.run().await;
            self.complete(id, result);
        }
    }

    pub fn routes(&self) -> Option<Arc<Vec<RouteRecord>>> {
        self.store.state().query.data.clone()
    }

    pub fn features(&self) -> FeatureCollection {
        match &self.store.state().query.data {
            Some(routes) => route_features(routes, &self.catalog),
            None => route_features(&[], &self.catalog),
        }
    }
}
