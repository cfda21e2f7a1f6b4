use serde::{Deserialize, Serialize};

/// Utrecht, where the route collections started.
pub const DEFAULT_CENTER: LngLat = LngLat {
    lng: 5.13381188435385,
    lat: 52.11015993159475,
};
pub const DEFAULT_ZOOM: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// `lng,lat`, the corner format the route API expects.
    pub fn to_query_value(self) -> String {
        format!("{},{}", self.lng, self.lat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south_west: LngLat,
    pub north_east: LngLat,
}

impl Bounds {
    pub fn new(a: LngLat, b: LngLat) -> Self {
        Self {
            south_west: LngLat::new(a.lng.min(b.lng), a.lat.min(b.lat)),
            north_east: LngLat::new(a.lng.max(b.lng), a.lat.max(b.lat)),
        }
    }
}

/// Camera as reported by every pan/zoom frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
    pub pitch: Option<f64>,
    pub bearing: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub camera: Camera,
    /// Visible window as of the last settled gesture. Drives the bounds filter.
    pub committed_bounds: Option<Bounds>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            camera: Camera {
                longitude: DEFAULT_CENTER.lng,
                latitude: DEFAULT_CENTER.lat,
                zoom: DEFAULT_ZOOM,
                pitch: None,
                bearing: None,
            },
            committed_bounds: None,
        }
    }
}

impl ViewState {
    pub fn center(&self) -> LngLat {
        LngLat::new(self.camera.longitude, self.camera.latitude)
    }
}
