use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_ROUTE_LIMIT: i64 = 1000;
pub const DEFAULT_MAX_ROUTE_LIMIT: i64 = 5000;

fn config_file_path() -> Option<PathBuf> {
    std::env::var("ROUTES_CONFIG_PATH")
        .ok()
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFileOverrides {
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default)]
    static_root: Option<String>,
    #[serde(default)]
    db_max_connections: Option<u32>,
    #[serde(default)]
    db_acquire_timeout_seconds: Option<u64>,
    #[serde(default)]
    default_route_limit: Option<i64>,
    #[serde(default)]
    max_route_limit: Option<i64>,
    #[serde(default)]
    cors_allow_origin: Option<String>,
}

fn load_config_file_overrides(path: &Path) -> Option<ConfigFileOverrides> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "route server config file not found; using env defaults");
        return None;
    }
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to read route server config; using env defaults"
            );
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to parse route server config; using env defaults"
            );
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteServerConfig {
    pub database_url: String,
    pub static_root: Option<PathBuf>,
    pub db_max_connections: u32,
    pub db_acquire_timeout_seconds: u64,
    pub default_route_limit: i64,
    pub max_route_limit: i64,
    /// `*` allows any origin.
    pub cors_allow_origin: String,
}

/// Env lookup used while resolving; the process environment outside tests.
trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    fn string(&self, key: &str) -> Option<String> {
        non_blank(self.get(key).as_deref())
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|value| value.trim().parse::<T>().ok())
    }
}

impl<F: Fn(&str) -> Option<String>> EnvSource for F {
    fn get(&self, key: &str) -> Option<String> {
        self(key)
    }
}

impl RouteServerConfig {
    pub fn from_env(cli_static_root: Option<PathBuf>) -> Result<Self> {
        let overrides = config_file_path()
            .and_then(|path| load_config_file_overrides(&path))
            .unwrap_or_default();
        Self::resolve(cli_static_root, &overrides, &|key: &str| std::env::var(key).ok())
    }

    /// Env values win over the config file; the CLI static root wins over both.
    fn resolve(
        cli_static_root: Option<PathBuf>,
        overrides: &ConfigFileOverrides,
        env: &impl EnvSource,
    ) -> Result<Self> {
        let database_url = env
            .string("ROUTES_DATABASE_URL")
            .or_else(|| env.string("DATABASE_URL"))
            .or_else(|| non_blank(overrides.database_url.as_deref()))
            .context("ROUTES_DATABASE_URL (or DATABASE_URL) must be set, or database_url present in the config file")?;
        let database_url = normalize_database_url(database_url);
        if database_url.trim().is_empty() {
            anyhow::bail!("ROUTES_DATABASE_URL resolved to an empty value");
        }

        let static_root = cli_static_root
            .or_else(|| env.string("ROUTES_STATIC_ROOT").map(PathBuf::from))
            .or_else(|| non_blank(overrides.static_root.as_deref()).map(PathBuf::from));

        let db_max_connections = env
            .parsed::<u32>("ROUTES_DB_MAX_CONNECTIONS")
            .or(overrides.db_max_connections.filter(|v| *v != 0))
            .unwrap_or(10)
            .clamp(1, 100);
        let db_acquire_timeout_seconds = env
            .parsed::<u64>("ROUTES_DB_ACQUIRE_TIMEOUT_SECONDS")
            .or(overrides.db_acquire_timeout_seconds.filter(|v| *v != 0))
            .unwrap_or(8)
            .clamp(1, 120);

        let max_route_limit = env
            .parsed::<i64>("ROUTES_MAX_LIMIT")
            .or(overrides.max_route_limit)
            .unwrap_or(DEFAULT_MAX_ROUTE_LIMIT)
            .max(1);
        let default_route_limit = env
            .parsed::<i64>("ROUTES_DEFAULT_LIMIT")
            .or(overrides.default_route_limit)
            .unwrap_or(DEFAULT_ROUTE_LIMIT)
            .clamp(1, max_route_limit);

        let cors_allow_origin = env
            .string("ROUTES_CORS_ALLOW_ORIGIN")
            .or_else(|| non_blank(overrides.cors_allow_origin.as_deref()))
            .unwrap_or_else(|| "*".to_string());

        Ok(Self {
            database_url,
            static_root,
            db_max_connections,
            db_acquire_timeout_seconds,
            default_route_limit,
            max_route_limit,
            cors_allow_origin,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn normalize_database_url(url: String) -> String {
    if let Some(stripped) = url.strip_prefix("postgresql+psycopg://") {
        return format!("postgresql://{stripped}");
    }
    if let Some(stripped) = url.strip_prefix("postgresql+psycopg2://") {
        return format!("postgresql://{stripped}");
    }
    if let Some(stripped) = url.strip_prefix("postgresql+asyncpg://") {
        return format!("postgresql://{stripped}");
    }
    url
}
