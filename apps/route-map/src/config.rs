use std::env;
use std::path::PathBuf;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

const TOMTOM_STYLE_ID: &str =
    "dG9tdG9tQEBANEFTRUE5QUt5TFBKdWRqbztiODVmNTFmYS00OTNlLTQ4ZjEtYjYwZC1mZmU0N2JlMjljODY=";
const FALLBACK_STYLE_URL: &str = "https://demotiles.maplibre.org/style.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub tomtom_key: Option<String>,
    pub maptiler_key: Option<String>,
    pub gpx_base_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            tomtom_key: None,
            maptiler_key: None,
            gpx_base_dir: None,
        }
    }
}

fn env_optional_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            api_base_url: env_optional_string("ROUTE_MAP_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            tomtom_key: env_optional_string("ROUTE_MAP_TOMTOM_KEY"),
            maptiler_key: env_optional_string("ROUTE_MAP_MAPTILER_KEY"),
            gpx_base_dir: env_optional_string("ROUTE_MAP_GPX_BASE_DIR").map(PathBuf::from),
        }
    }

    /// TomTom when keyed, then MapTiler, then the keyless MapLibre demo style.
    pub fn map_style_url(&self) -> String {
        if let Some(key) = &self.tomtom_key {
            return format!(
                "https://api.tomtom.com/style/2/custom/style/{TOMTOM_STYLE_ID}/drafts/0.json?key={key}"
            );
        }
        if let Some(key) = &self.maptiler_key {
            return format!("https://api.maptiler.com/maps/streets/style.json?key={key}");
        }
        FALLBACK_STYLE_URL.to_string()
    }

    /// GPX files live under `<base>/<sport>/<gpx_file_path>`.
    pub fn gpx_path(&self, sport: Option<&str>, gpx_file_path: &str) -> Option<PathBuf> {
        let base = self.gpx_base_dir.as_ref()?;
        let relative = gpx_file_path.trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }
        let mut path = base.clone();
        if let Some(sport) = sport.filter(|s| !s.is_empty()) {
            path.push(sport);
        }
        path.push(relative);
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_url_prefers_tomtom_then_maptiler() {
        let mut config = ClientConfig {
            tomtom_key: Some("tt".to_string()),
            maptiler_key: Some("mt".to_string()),
            ..ClientConfig::default()
        };
        assert!(config.map_style_url().starts_with("https://api.tomtom.com/"));
        assert!(config.map_style_url().ends_with("?key=tt"));

        config.tomtom_key = None;
        assert_eq!(
            config.map_style_url(),
            "https://api.maptiler.com/maps/streets/style.json?key=mt"
        );

        config.maptiler_key = None;
        assert_eq!(config.map_style_url(), FALLBACK_STYLE_URL);
    }

    #[test]
    fn gpx_paths_are_grouped_by_sport() {
        let config = ClientConfig {
            gpx_base_dir: Some(PathBuf::from("/srv/gpx")),
            ..ClientConfig::default()
        };
        assert_eq!(
            config.gpx_path(Some("hike"), "veluwe.gpx"),
            Some(PathBuf::from("/srv/gpx/hike/veluwe.gpx"))
        );
        assert_eq!(
            config.gpx_path(None, "/veluwe.gpx"),
            Some(PathBuf::from("/srv/gpx/veluwe.gpx"))
        );
        assert_eq!(config.gpx_path(Some("hike"), ""), None);
        assert_eq!(ClientConfig::default().gpx_path(Some("hike"), "a.gpx"), None);
    }
}
