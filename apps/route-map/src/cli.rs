use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::filters::{parse_distance_input, RouteFilters, DEFAULT_UI_LIMIT};
use crate::model::Sport;
use crate::view::{Bounds, LngLat};

#[derive(Parser)]
#[command(name = "route-map", version, about = "Query the route API and print map-ready output")]
pub struct Cli {
    /// Overrides ROUTE_MAP_API_BASE_URL.
    #[arg(long, global = true)]
    pub api_base_url: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch filtered routes and print them.
    Routes(RoutesArgs),
    /// Print the map style, route layers and legend.
    Layers(LayersArgs),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// GeoJSON FeatureCollection of route lines.
    #[default]
    Features,
    /// One line per route.
    Summary,
}

#[derive(Args)]
pub struct RoutesArgs {
    #[arg(long)]
    pub sport: Option<Sport>,
    /// Kilometers. Anything that is not a non-negative number is ignored.
    #[arg(long)]
    pub min_distance: Option<String>,
    #[arg(long)]
    pub max_distance: Option<String>,
    /// Comma-separated collection ids.
    #[arg(long, value_delimiter = ',')]
    pub collections: Vec<i64>,
    /// South-west corner as `lng,lat`.
    #[arg(long, value_parser = parse_lng_lat, allow_hyphen_values = true, requires = "max_bounds")]
    pub min_bounds: Option<LngLat>,
    /// North-east corner as `lng,lat`.
    #[arg(long, value_parser = parse_lng_lat, allow_hyphen_values = true, requires = "min_bounds")]
    pub max_bounds: Option<LngLat>,
    #[arg(long, default_value_t = DEFAULT_UI_LIMIT)]
    pub limit: u32,
    #[arg(long, value_enum, default_value_t = OutputFormat::Features)]
    pub format: OutputFormat,
    /// Skip the collection catalog request and use the built-in collections.
    #[arg(long, default_value_t = false)]
    pub builtin_collections: bool,
}

impl RoutesArgs {
    pub fn filters(&self) -> RouteFilters {
        RouteFilters {
            sport: self.sport,
            collections: self.collections.iter().copied().filter(|id| *id > 0).collect(),
            min_distance_km: self.min_distance.as_deref().and_then(parse_distance_input),
            max_distance_km: self.max_distance.as_deref().and_then(parse_distance_input),
            bounds: None,
            limit: self.limit.max(1),
        }
    }

    /// Both corners or nothing; clap enforces the pairing.
    pub fn bounds(&self) -> Option<Bounds> {
        Some(Bounds::new(self.min_bounds?, self.max_bounds?))
    }
}

#[derive(Args)]
pub struct LayersArgs {
    #[arg(long, default_value_t = false)]
    pub builtin_collections: bool,
}

fn parse_lng_lat(raw: &str) -> Result<LngLat, String> {
    let (lng, lat) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected lng,lat, got {raw:?}"))?;
    let lng: f64 = lng.trim().parse().map_err(|_| format!("invalid longitude {lng:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|_| format!("invalid latitude {lat:?}"))?;
    if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
        return Err(format!("{raw:?} is outside lng [-180,180] / lat [-90,90]"));
    }
    Ok(LngLat::new(lng, lat))
}
