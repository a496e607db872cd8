use std::sync::Arc;

use crate::cache::RadarFieldCache;
use crate::config::Config;
use crate::directions::DirectionsClient;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub radar: Arc<RadarFieldCache>,
    pub directions: Arc<DirectionsClient>,
}

/// The requested route: parallel coordinate and elapsed-time samples.
/// `elapsed_secs[0]` is 0 and the sequence is non-decreasing. Produced by the
/// directions collaborator; read-only input to the extraction.
#[derive(Debug, Clone, Default)]
pub struct Track {
    pub lons: Vec<f64>,
    pub lats: Vec<f64>,
    pub elapsed_secs: Vec<i64>,
}

impl Track {
    pub fn is_empty(&self) -> bool {
        self.lons.is_empty()
    }
}

/// A resolved route plus the metadata the caller displays.
#[derive(Debug, Clone)]
pub struct Route {
    pub source: String,
    pub destination: String,
    pub distance_km: f64,
    pub duration_min: f64,
    pub track: Track,
}
