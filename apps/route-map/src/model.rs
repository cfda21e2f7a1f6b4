use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type RouteId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    RaceBike,
    MountainBike,
    GravelBike,
    TouringBike,
    Hike,
    Run,
}

impl Sport {
    pub const ALL: [Sport; 6] = [
        Sport::RaceBike,
        Sport::MountainBike,
        Sport::GravelBike,
        Sport::TouringBike,
        Sport::Hike,
        Sport::Run,
    ];

    /// Value stored in `routes.sport` and sent as the `sport` query parameter.
    pub fn key(self) -> &'static str {
        match self {
            Sport::RaceBike => "race_bike",
            Sport::MountainBike => "mountain_bike",
            Sport::GravelBike => "gravel_bike",
            Sport::TouringBike => "touring_bike",
            Sport::Hike => "hike",
            Sport::Run => "run",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Sport::RaceBike => "Race bike",
            Sport::MountainBike => "Mountain bike",
            Sport::GravelBike => "Gravel bike",
            Sport::TouringBike => "Touring bike",
            Sport::Hike => "Hike",
            Sport::Run => "Run",
        }
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Sport {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Sport::ALL
            .into_iter()
            .find(|sport| sport.key() == trimmed)
            .ok_or_else(|| format!("unknown sport {trimmed:?}"))
    }
}

/// A stored `[lat, lng, elevation?]` track point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct TrackPoint {
    pub lat: f64,
    pub lng: f64,
    pub elevation: Option<f64>,
}

impl TryFrom<Vec<f64>> for TrackPoint {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        match values.as_slice() {
            [lat, lng] => Ok(Self {
                lat: *lat,
                lng: *lng,
                elevation: None,
            }),
            [lat, lng, elevation, ..] => Ok(Self {
                lat: *lat,
                lng: *lng,
                elevation: Some(*elevation),
            }),
            _ => Err(format!("track point needs at least 2 values, got {}", values.len())),
        }
    }
}

impl From<TrackPoint> for Vec<f64> {
    fn from(point: TrackPoint) -> Self {
        match point.elevation {
            Some(elevation) => vec![point.lat, point.lng, elevation],
            None => vec![point.lat, point.lng],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRouteRef {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sport: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionLink {
    pub collection_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteBounds {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

/// One row of `GET /api/routes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    pub id: RouteId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sport: Option<String>,
    /// Meters.
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub elevation_up: Option<f64>,
    #[serde(default)]
    pub elevation_down: Option<f64>,
    #[serde(default)]
    pub kcal_active: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub gpx_file_path: Option<String>,
    #[serde(default)]
    pub route_points: Option<Vec<TrackPoint>>,
    #[serde(default)]
    pub bounds: Option<RouteBounds>,
    #[serde(default)]
    pub komoot: Option<ExternalRouteRef>,
    #[serde(default)]
    pub strava: Option<ExternalRouteRef>,
    #[serde(default)]
    pub collections: Vec<CollectionLink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalSource {
    Komoot,
    Strava,
}

impl ExternalSource {
    pub fn label(self) -> &'static str {
        match self {
            ExternalSource::Komoot => "Komoot",
            ExternalSource::Strava => "Strava",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLink {
    pub source: ExternalSource,
    pub url: String,
}

impl RouteRecord {
    pub fn distance_km(&self) -> Option<f64> {
        self.distance.map(|meters| meters / 1000.0)
    }

    /// Track points, if the route has a drawable line (two or more points).
    pub fn track(&self) -> Option<&[TrackPoint]> {
        self.route_points
            .as_deref()
            .filter(|points| points.len() >= 2)
    }

    /// Komoot wins when a route is linked to both sources.
    pub fn external_link(&self) -> Option<ExternalLink> {
        if let Some(komoot) = &self.komoot {
            return Some(ExternalLink {
                source: ExternalSource::Komoot,
                url: format!("https://www.komoot.com/tour/{}", komoot.id),
            });
        }
        self.strava.as_ref().map(|strava| ExternalLink {
            source: ExternalSource::Strava,
            url: format!("https://www.strava.com/routes/{}", strava.id),
        })
    }
}
