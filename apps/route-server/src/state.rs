use crate::config::RouteServerConfig;
use crate::services::route_query::LimitPolicy;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub config: RouteServerConfig,
    pub db: PgPool,
}

impl AppState {
    pub fn limit_policy(&self) -> LimitPolicy {
        LimitPolicy {
            default: self.config.default_route_limit,
            max: self.config.max_route_limit,
        }
    }
}
