use crate::config::RouteServerConfig;
use crate::db;
use crate::state::AppState;

/// Points at a port nothing listens on, so every query fails once the short
/// acquire timeout elapses.
pub fn test_config() -> RouteServerConfig {
    RouteServerConfig {
        database_url: "postgresql://routes@127.0.0.1:1/routes".to_string(),
        static_root: None,
        db_max_connections: 1,
        db_acquire_timeout_seconds: 1,
        default_route_limit: 1000,
        max_route_limit: 5000,
        cors_allow_origin: "*".to_string(),
    }
}

pub fn test_state() -> AppState {
    let config = test_config();
    let pool = db::connect_lazy(&config).expect("connect_lazy");
    AppState { config, db: pool }
}
