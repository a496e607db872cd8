//! Assembly of decoded frames into the space-time field one query works on.

use chrono::{DateTime, Utc};
use ndarray::{Array2, Array3};

use crate::constants::{CADENCE_SECONDS, MISSING_SENTINEL};
use crate::error::RadarError;
use crate::projection::CoordinateGrid;
use crate::radolan::RadarFrame;

/// The assembled 3D composite: `values[[step, row, col]]` holds encoded
/// reflectivity with 0 substituted for missing cells. The coordinate grids
/// are identical for every step. Immutable once built; shared via `Arc`.
#[derive(Debug, Clone)]
pub struct RadarField {
    pub values: Array3<f32>,
    pub lons: Array2<f64>,
    pub lats: Array2<f64>,
    /// Absolute validity time of each step, strictly increasing.
    pub time_axis: Vec<DateTime<Utc>>,
    /// `time_axis - time_axis[0]` in seconds; alignment uses this instead of
    /// absolute time to stay immune to clock skew between track and radar.
    pub relative_secs: Vec<i64>,
}

impl RadarField {
    pub fn steps(&self) -> usize {
        self.time_axis.len()
    }

    /// Spacing between consecutive steps in seconds.
    pub fn cadence_secs(&self) -> i64 {
        match self.relative_secs.get(1) {
            Some(&second) => second - self.relative_secs[0],
            None => CADENCE_SECONDS,
        }
    }
}

/// A spatially flattened (and usually bounding-box subsetted) form of the
/// field: `values[[step, cell]]` with parallel per-cell coordinates.
#[derive(Debug, Clone)]
pub struct FieldView {
    pub lons: Vec<f64>,
    pub lats: Vec<f64>,
    pub values: Array2<f32>,
    pub time_axis: Vec<DateTime<Utc>>,
    pub relative_secs: Vec<i64>,
}

impl FieldView {
    pub fn steps(&self) -> usize {
        self.time_axis.len()
    }

    pub fn cells(&self) -> usize {
        self.lons.len()
    }

    pub fn cadence_secs(&self) -> i64 {
        match self.relative_secs.get(1) {
            Some(&second) => second - self.relative_secs[0],
            None => CADENCE_SECONDS,
        }
    }
}

/// Stacks decoded frames into a [`RadarField`].
///
/// Frames are ordered by capture time (ascending file-name offset gives an
/// ascending axis), the sentinel is replaced by 0, and every frame must match
/// the coordinate grid's shape. Any inconsistency aborts the whole build;
/// alignment downstream assumes complete, regularly spaced steps.
pub fn assemble(mut frames: Vec<RadarFrame>, coords: &CoordinateGrid) -> Result<RadarField, RadarError> {
    if frames.is_empty() {
        return Err(RadarError::EmptyArchive);
    }
    frames.sort_by_key(|frame| frame.capture_time);

    let (rows, cols) = coords.shape();
    let steps = frames.len();
    let mut values = Array3::zeros((steps, rows, cols));
    let mut time_axis = Vec::with_capacity(steps);

    for (step, frame) in frames.iter().enumerate() {
        if frame.grid.dim() != (rows, cols) {
            return Err(RadarError::Assembly(format!(
                "frame {} has shape {:?}, grid is {}x{}",
                step,
                frame.grid.dim(),
                rows,
                cols
            )));
        }
        if let Some(&previous) = time_axis.last() {
            if frame.capture_time <= previous {
                return Err(RadarError::Assembly(format!(
                    "duplicate or unordered capture time {}",
                    frame.capture_time
                )));
            }
        }
        for ((row, col), &encoded) in frame.grid.indexed_iter() {
            values[[step, row, col]] = if encoded == MISSING_SENTINEL {
                0.0
            } else {
                encoded
            };
        }
        time_axis.push(frame.capture_time);
    }

    let start = time_axis[0];
    let relative_secs = time_axis
        .iter()
        .map(|time| (*time - start).num_seconds())
        .collect();

    Ok(RadarField {
        values,
        lons: coords.lons.clone(),
        lats: coords.lats.clone(),
        time_axis,
        relative_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ndarray::array;

    use crate::projection::coordinate_grid;

    fn frame(minute: u32, grid: Array2<f32>) -> RadarFrame {
        RadarFrame {
            grid,
            capture_time: Utc.with_ymd_and_hms(2024, 6, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn sentinel_cells_read_as_zero_after_assembly() {
        let coords = coordinate_grid(2, 2);
        let frames = vec![frame(0, array![[MISSING_SENTINEL, 5.0], [0.0, 7.0]])];
        let field = assemble(frames, &coords).unwrap();

        assert_eq!(field.values[[0, 0, 0]], 0.0);
        assert_eq!(field.values[[0, 0, 1]], 5.0);
        assert_eq!(field.values[[0, 1, 1]], 7.0);
    }

    #[test]
    fn frames_are_ordered_and_the_relative_axis_starts_at_zero() {
        let coords = coordinate_grid(1, 1);
        let frames = vec![
            frame(10, array![[2.0]]),
            frame(0, array![[1.0]]),
            frame(5, array![[3.0]]),
        ];
        let field = assemble(frames, &coords).unwrap();

        assert_eq!(field.relative_secs, vec![0, 300, 600]);
        assert_eq!(field.values[[0, 0, 0]], 1.0);
        assert_eq!(field.values[[1, 0, 0]], 3.0);
        assert_eq!(field.values[[2, 0, 0]], 2.0);
        assert_eq!(field.cadence_secs(), 300);
    }

    #[test]
    fn shape_mismatch_aborts_the_build() {
        let coords = coordinate_grid(2, 2);
        let frames = vec![frame(0, array![[1.0, 2.0, 3.0]])];
        assert!(matches!(
            assemble(frames, &coords),
            Err(RadarError::Assembly(_))
        ));
    }

    #[test]
    fn duplicate_capture_times_abort_the_build() {
        let coords = coordinate_grid(1, 1);
        let frames = vec![frame(0, array![[1.0]]), frame(0, array![[2.0]])];
        assert!(matches!(
            assemble(frames, &coords),
            Err(RadarError::Assembly(_))
        ));
    }

    #[test]
    fn empty_frame_set_is_an_error_not_a_partial_field() {
        let coords = coordinate_grid(1, 1);
        assert!(matches!(
            assemble(Vec::new(), &coords),
            Err(RadarError::EmptyArchive)
        ));
    }
}
