//! Inverse polar-stereographic projection for the national composite grid.
//! The grid is fixed: every refresh reuses the same cell coordinates, so the
//! lon/lat grids are computed once and shared.

use ndarray::Array2;

use crate::constants::{
    COMPOSITE_CELL_KM, COMPOSITE_REF_LON_DEG, COMPOSITE_SPHERE_RADIUS_KM,
    COMPOSITE_TRUE_SCALE_LAT_DEG, COMPOSITE_X0_KM, COMPOSITE_Y0_KM,
};

/// Geographic coordinates of every grid cell, same (row, col) shape as one
/// composite frame. Row 0 is the southern edge.
#[derive(Debug, Clone)]
pub struct CoordinateGrid {
    pub lons: Array2<f64>,
    pub lats: Array2<f64>,
}

impl CoordinateGrid {
    pub fn shape(&self) -> (usize, usize) {
        self.lons.dim()
    }
}

/// Builds the coordinate grid for a composite of the given dimensions,
/// anchored at the national grid's lower-left corner.
pub fn coordinate_grid(rows: usize, cols: usize) -> CoordinateGrid {
    let mut lons = Array2::zeros((rows, cols));
    let mut lats = Array2::zeros((rows, cols));

    for row in 0..rows {
        let y_km = COMPOSITE_Y0_KM + (row as f64 + 0.5) * COMPOSITE_CELL_KM;
        for col in 0..cols {
            let x_km = COMPOSITE_X0_KM + (col as f64 + 0.5) * COMPOSITE_CELL_KM;
            let (lon, lat) = inverse_stereographic(x_km, y_km);
            lons[[row, col]] = lon;
            lats[[row, col]] = lat;
        }
    }

    CoordinateGrid { lons, lats }
}

/// Projection plane -> (lon, lat) in degrees. North-polar stereographic with
/// true scale at 60N and central meridian 10E on a sphere.
fn inverse_stereographic(x_km: f64, y_km: f64) -> (f64, f64) {
    let scale = 1.0 + COMPOSITE_TRUE_SCALE_LAT_DEG.to_radians().sin();
    let rk = COMPOSITE_SPHERE_RADIUS_KM * scale;
    let r2 = x_km * x_km + y_km * y_km;

    let lat = ((rk * rk - r2) / (rk * rk + r2)).asin().to_degrees();
    let lon = x_km.atan2(-y_km).to_degrees() + COMPOSITE_REF_LON_DEG;

    (lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_center_column_sits_near_the_reference_meridian() {
        // x = 0 lies exactly on the 10E meridian regardless of y.
        let (lon, lat) = inverse_stereographic(0.0, -4000.0);
        assert!((lon - 10.0).abs() < 1e-9);
        assert!(lat > 0.0 && lat < 90.0);
    }

    #[test]
    fn latitude_increases_northward_and_longitude_eastward() {
        let grid = coordinate_grid(4, 5);
        assert_eq!(grid.shape(), (4, 5));
        assert!(grid.lats[[3, 2]] > grid.lats[[0, 2]]);
        assert!(grid.lons[[1, 4]] > grid.lons[[1, 0]]);
    }

    #[test]
    fn national_grid_corner_is_in_plausible_range() {
        // The lower-left corner of the composite sits south-west of the
        // covered area, roughly west of France and south of the Alps.
        let (lon, lat) = inverse_stereographic(
            COMPOSITE_X0_KM + 0.5,
            COMPOSITE_Y0_KM + 0.5,
        );
        assert!((1.0..8.0).contains(&lon), "lon {lon}");
        assert!((43.0..48.0).contains(&lat), "lat {lat}");
    }
}
