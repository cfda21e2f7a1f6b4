use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{StatusCode, Url};

use crate::error::ClientError;
use crate::filters::{FilterKey, RouteFilters};
use crate::geometry::CollectionInfo;
use crate::model::RouteRecord;

const DEFAULT_CACHE_CAPACITY: usize = 32;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Anything that can answer a filtered route query.
pub trait RouteSource: Clone + Send + Sync + 'static {
    fn fetch_routes(
        &self,
        filters: &RouteFilters,
    ) -> impl Future<Output = Result<Vec<RouteRecord>, ClientError>> + Send;
}

#[derive(Clone)]
pub struct HttpRouteSource {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpRouteSource {
    pub fn new(base_url: &str, http: reqwest::Client) -> Result<Self, ClientError> {
        let trimmed = format!("{}/", base_url.trim().trim_end_matches('/'));
        let base_url = Url::parse(&trimmed).map_err(|source| ClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        Ok(Self { base_url, http })
    }

    fn api_url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|source| ClientError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                source,
            })
    }

    pub fn routes_url(&self, filters: &RouteFilters) -> Result<Url, ClientError> {
        let mut url = self.api_url("api/routes")?;
        url.query_pairs_mut()
            .extend_pairs(filters.query_pairs());
        Ok(url)
    }

    pub async fn fetch_collections(&self) -> Result<Vec<CollectionInfo>, ClientError> {
        let url = self.api_url("api/collections")?;
        get_json(&self.http, url).await
    }
}

async fn get_json<T: serde::de::DeserializeOwned>(
    http: &reqwest::Client,
    url: Url,
) -> Result<T, ClientError> {
    let resp = http.get(url).timeout(REQUEST_TIMEOUT).send().await?;
    let status = resp.status();
    let body = resp.bytes().await?;
    if status != StatusCode::OK {
        return Err(ClientError::Status {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }
    Ok(serde_json::from_slice(&body)?)
}

/// Pulls `error` out of a `{"error": "..."}` body, falling back to the raw text.
fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("error")?.as_str().map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string())
}

impl RouteSource for HttpRouteSource {
    fn fetch_routes(
        &self,
        filters: &RouteFilters,
    ) -> impl Future<Output = Result<Vec<RouteRecord>, ClientError>> + Send {
        let http = self.http.clone();
        let url = self.routes_url(filters);
        async move {
            let url = url?;
            tracing::debug!(url = %url, "fetching routes");
            get_json(&http, url).await
        }
    }
}

/// Identity of one issued query. Results are only applied while their id is
/// still the active one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId {
    pub seq: u64,
    pub key: FilterKey,
}

pub enum FetchPlan<S> {
    /// A finished result for the same filters is cached.
    Cached {
        id: RequestId,
        routes: Arc<Vec<RouteRecord>>,
    },
    /// A request for the same filters is already outstanding.
    InFlight(RequestId),
    Issue(PendingFetch<S>),
}

pub struct PendingFetch<S> {
    pub id: RequestId,
    filters: RouteFilters,
    source: S,
}

impl<S: RouteSource> PendingFetch<S> {
    pub async fn run(self) -> (RequestId, Result<Vec<RouteRecord>, ClientError>) {
        let result = self.source.fetch_routes(&self.filters).await;
        (self.id, result)
    }
}

/// Dedupes queries by filter key and keeps a small LRU of finished results.
pub struct RouteFetchClient<S> {
    source: S,
    capacity: usize,
    cache: HashMap<FilterKey, Arc<Vec<RouteRecord>>>,
    order: VecDeque<FilterKey>,
    in_flight: HashMap<FilterKey, RequestId>,
    next_seq: u64,
}

impl<S: RouteSource> RouteFetchClient<S> {
    pub fn new(source: S) -> Self {
        Self::with_capacity(source, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(source: S, capacity: usize) -> Self {
        Self {
            source,
            capacity: capacity.max(1),
            cache: HashMap::new(),
            order: VecDeque::new(),
            in_flight: HashMap::new(),
            next_seq: 0,
        }
    }

    fn next_id(&mut self, key: FilterKey) -> RequestId {
        self.next_seq += 1;
        RequestId {
            seq: self.next_seq,
            key,
        }
    }

    pub fn plan(&mut self, filters: &RouteFilters) -> FetchPlan<S> {
        let key = filters.key();
        if let Some(routes) = self.cache.get(&key).cloned() {
            self.touch(&key);
            return FetchPlan::Cached {
                id: self.next_id(key),
                routes,
            };
        }
        if let Some(id) = self.in_flight.get(&key) {
            return FetchPlan::InFlight(id.clone());
        }
        let id = self.next_id(key.clone());
        self.in_flight.insert(key, id.clone());
        FetchPlan::Issue(PendingFetch {
            id,
            filters: filters.clone(),
            source: self.source.clone(),
        })
    }

    /// Records a finished request. Failures are not cached so the next plan for
    /// the same filters retries.
    pub fn complete(
        &mut self,
        id: &RequestId,
        result: Result<Vec<RouteRecord>, ClientError>,
    ) -> Result<Arc<Vec<RouteRecord>>, ClientError> {
        if self.in_flight.get(&id.key) == Some(id) {
            self.in_flight.remove(&id.key);
        }
        let routes = Arc::new(result?);
        self.insert(id.key.clone(), routes.clone());
        Ok(routes)
    }

    fn touch(&mut self, key: &FilterKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn insert(&mut self, key: FilterKey, routes: Arc<Vec<RouteRecord>>) {
        if self.cache.insert(key.clone(), routes).is_some() {
            self.touch(&key);
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.cache.remove(&evicted);
            }
        }
    }
}
