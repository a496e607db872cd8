use std::time::Duration;

/// Forecast-horizon shifts, in units of one radar cadence step.
/// Shift 1 answers "leave 5 minutes later", shift 9 "leave 45 minutes later".
pub const SHIFTS: [usize; 5] = [1, 3, 5, 7, 9];

/// Spacing between consecutive composite frames.
pub const CADENCE_SECONDS: i64 = 300;

/// Marker the decoder emits for cells without radar coverage.
pub const MISSING_SENTINEL: f32 = -9999.0;

/// Payload bit flagging a cell as no-data.
pub const NO_DATA_FLAG: u16 = 0x2000;
/// Low bits of a payload word carrying the encoded reflectivity.
pub const VALUE_MASK: u16 = 0x0fff;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

// Polar-stereographic parameters of the national composite grid (DE1200).
pub const COMPOSITE_SPHERE_RADIUS_KM: f64 = 6370.040;
pub const COMPOSITE_REF_LON_DEG: f64 = 10.0;
pub const COMPOSITE_TRUE_SCALE_LAT_DEG: f64 = 60.0;
pub const COMPOSITE_ROWS: usize = 1200;
pub const COMPOSITE_COLS: usize = 1100;
/// Lower-left corner of the grid in projection coordinates, km.
pub const COMPOSITE_X0_KM: f64 = -543.4622;
pub const COMPOSITE_Y0_KM: f64 = -4808.645;
pub const COMPOSITE_CELL_KM: f64 = 1.0;

/// Margin added around a track's bounding box before subsetting the field.
pub const SUBSET_MARGIN_DEG: f64 = 1.0;

/// Column totals below this many millimetres count as "no rain".
pub const NO_RAIN_THRESHOLD_MM: f64 = 0.01;

/// Look-ahead windows of the bucketed point summary, minutes.
pub const SUMMARY_BUCKET_MINUTES: [i64; 7] = [0, 15, 30, 45, 60, 90, 120];

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8050";
pub const DEFAULT_CACHE_DIR: &str = "/var/lib/velorain";
pub const DEFAULT_RADAR_URL: &str =
    "https://opendata.dwd.de/weather/radar/composit/wn/WN_LATEST.tar.bz2";
pub const DEFAULT_GEOCODING_URL: &str = "https://api.mapbox.com/geocoding/v5/mapbox.places";
pub const DEFAULT_DIRECTIONS_URL: &str = "https://api.mapbox.com/directions/v5/mapbox";

/// The upstream publishes a new frame set roughly every 5 minutes; refetching
/// more often than this window only re-downloads identical data.
pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::from_secs(240);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
