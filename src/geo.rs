//! Great-circle distance, bounding-box subsetting, and the map viewport
//! helper. Subsetting is an optimization in front of the extraction, not a
//! correctness requirement: it shrinks the field before per-point work.

use crate::constants::EARTH_RADIUS_KM;
use crate::field::{FieldView, RadarField};
use ndarray::Array2;

/// Haversine distance in km between two points given in degrees.
pub fn distance_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Restricts the field to the track's bounding box expanded by `margin_deg`,
/// flattening the space axes while leaving the time axis untouched. Bounds
/// are inclusive of everything strictly inside the expanded box. An empty
/// track yields an empty view.
pub fn subset_field(field: &RadarField, lons: &[f64], lats: &[f64], margin_deg: f64) -> FieldView {
    let empty = FieldView {
        lons: Vec::new(),
        lats: Vec::new(),
        values: Array2::zeros((field.steps(), 0)),
        time_axis: field.time_axis.clone(),
        relative_secs: field.relative_secs.clone(),
    };
    if lons.is_empty() || lats.is_empty() {
        return empty;
    }

    let lon_min = lons.iter().copied().fold(f64::INFINITY, f64::min) - margin_deg;
    let lon_max = lons.iter().copied().fold(f64::NEG_INFINITY, f64::max) + margin_deg;
    let lat_min = lats.iter().copied().fold(f64::INFINITY, f64::min) - margin_deg;
    let lat_max = lats.iter().copied().fold(f64::NEG_INFINITY, f64::max) + margin_deg;

    let (rows, cols) = field.lons.dim();
    let mut kept = Vec::new();
    let mut cell_lons = Vec::new();
    let mut cell_lats = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            let lon = field.lons[[row, col]];
            let lat = field.lats[[row, col]];
            if lon > lon_min && lon < lon_max && lat > lat_min && lat < lat_max {
                kept.push((row, col));
                cell_lons.push(lon);
                cell_lats.push(lat);
            }
        }
    }
    if kept.is_empty() {
        return empty;
    }

    let mut values = Array2::zeros((field.steps(), kept.len()));
    for step in 0..field.steps() {
        for (cell, &(row, col)) in kept.iter().enumerate() {
            values[[step, cell]] = field.values[[step, row, col]];
        }
    }

    FieldView {
        lons: cell_lons,
        lats: cell_lats,
        values,
        time_axis: field.time_axis.clone(),
        relative_secs: field.relative_secs.clone(),
    }
}

/// Map viewport for displaying a track: (zoom, (lat, lon) center).
/// Web-mercator fit of the track's bounding box into a tile viewport.
pub fn zoom_center(lons: &[f64], lats: &[f64], map_width: f64, map_height: f64) -> (f64, (f64, f64)) {
    if lons.is_empty() || lats.is_empty() {
        // Country-level default view.
        return (4.0, (51.326863, 10.354922));
    }
    const WORLD_DIM: f64 = 256.0;
    const TILE_SIZE: f64 = 256.0;

    let lat_min = lats.iter().copied().fold(f64::INFINITY, f64::min);
    let lat_max = lats.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lon_min = lons.iter().copied().fold(f64::INFINITY, f64::min);
    let lon_max = lons.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let lat_world = WORLD_DIM / (2.0 * std::f64::consts::PI)
        * (lat_max.to_radians() - lat_min.to_radians()).max(1e-9);
    let lon_world = WORLD_DIM / 360.0 * (lon_max - lon_min).max(1e-9);

    let scale = (map_height / lat_world).min(map_width / lon_world);
    let zoom = (scale * TILE_SIZE / WORLD_DIM).log2().min(22.0);

    (zoom, ((lat_min + lat_max) / 2.0, (lon_min + lon_max) / 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ndarray::{Array2, Array3};

    use crate::field::RadarField;

    /// A 1-step field over a regular 4x4 degree grid: lon 5..8, lat 47..50.
    fn synthetic_field() -> RadarField {
        let rows = 4;
        let cols = 4;
        let mut lons = Array2::zeros((rows, cols));
        let mut lats = Array2::zeros((rows, cols));
        let mut values = Array3::zeros((1, rows, cols));
        for row in 0..rows {
            for col in 0..cols {
                lons[[row, col]] = 5.0 + col as f64;
                lats[[row, col]] = 47.0 + row as f64;
                values[[0, row, col]] = (row * cols + col) as f32;
            }
        }
        RadarField {
            values,
            lons,
            lats,
            time_axis: vec![Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()],
            relative_secs: vec![0],
        }
    }

    #[test]
    fn haversine_matches_a_known_distance() {
        // Hamburg -> Munich, roughly 612 km.
        let d = distance_km(9.9937, 53.5511, 11.5820, 48.1351);
        assert!((d - 612.0).abs() < 10.0, "distance {d}");
    }

    #[test]
    fn haversine_is_zero_for_identical_points() {
        assert!(distance_km(8.0, 50.0, 8.0, 50.0) < 1e-9);
    }

    #[test]
    fn subset_keeps_cells_near_the_track_and_drops_distant_ones() {
        let field = synthetic_field();
        // Track stays near (5.5, 47.5); margin 1 degree.
        let view = subset_field(&field, &[5.5], &[47.5], 1.0);

        // Every kept cell is within margin of the track's bounding box.
        for (lon, lat) in view.lons.iter().zip(&view.lats) {
            assert!(*lon > 4.5 && *lon < 6.5);
            assert!(*lat > 46.5 && *lat < 48.5);
        }
        // The far corner cell (8, 50) is definitively outside and dropped.
        assert!(view.cells() < field.lons.len());
        assert!(!view
            .lons
            .iter()
            .zip(&view.lats)
            .any(|(lon, lat)| *lon == 8.0 && *lat == 50.0));
        // Time axis is preserved unchanged.
        assert_eq!(view.steps(), field.steps());
        assert_eq!(view.relative_secs, field.relative_secs);
    }

    #[test]
    fn subset_values_track_their_coordinates() {
        let field = synthetic_field();
        let view = subset_field(&field, &[6.0], &[48.0], 0.75);
        // Only the exact cell (row 1, col 1) falls inside the 0.75 deg box.
        assert_eq!(view.cells(), 1);
        assert_eq!(view.values[[0, 0]], 5.0);
        assert_eq!(view.lons[0], 6.0);
        assert_eq!(view.lats[0], 48.0);
    }

    #[test]
    fn empty_track_yields_an_empty_view_not_an_error() {
        let field = synthetic_field();
        let view = subset_field(&field, &[], &[], 1.0);
        assert_eq!(view.cells(), 0);
        assert_eq!(view.steps(), 1);
    }

    #[test]
    fn viewport_zoom_shrinks_as_the_track_grows() {
        let (city_zoom, _) = zoom_center(&[9.9, 10.1], &[53.5, 53.6], 200.0, 360.0);
        let (country_zoom, center) = zoom_center(&[6.0, 13.0], &[47.5, 54.5], 200.0, 360.0);
        assert!(city_zoom > country_zoom);
        assert!((center.1 - 9.5).abs() < 1e-9);
    }
}
