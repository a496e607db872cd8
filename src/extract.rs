//! The central extraction algorithm: batch spatial + temporal match of a
//! track against the radar field, run deduplication, per-horizon fetch with
//! NaN for horizons past the field's lookahead, unit conversion, and scaling
//! of each row by the real time elapsed since the previous retained sample.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;

use crate::align::nearest_steps;
use crate::constants::NO_RAIN_THRESHOLD_MM;
use crate::field::FieldView;
use crate::spatial::SpatialIndex;
use crate::types::Track;
use crate::units::to_rain_rate;

/// The forecast table: one row per retained track sample (indexed by elapsed
/// time), one column per horizon (labelled by the absolute "leave at" time).
/// Values are mm contributed by the leg ending at that row; summing a column
/// gives the total expected precipitation for that departure. NaN marks a
/// horizon past the field's lookahead.
#[derive(Debug, Clone, PartialEq)]
pub struct RainTable {
    pub columns: Vec<DateTime<Utc>>,
    pub elapsed_secs: Vec<i64>,
    pub rows: Vec<Vec<f64>>,
}

/// Split-oriented serialization of a [`RainTable`]:
/// `{columns, index, data}` with ISO-8601 columns and `HH:MM:SS` index.
#[derive(Debug, Serialize)]
pub struct SplitTable {
    pub columns: Vec<String>,
    pub index: Vec<String>,
    pub data: Vec<Vec<f64>>,
}

impl RainTable {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            elapsed_secs: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Per-column totals in mm, skipping NaN cells.
    pub fn column_totals(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.columns.len()];
        for row in &self.rows {
            for (total, value) in totals.iter_mut().zip(row) {
                if value.is_finite() {
                    *total += value;
                }
            }
        }
        totals
    }

    /// True when every departure option stays under the no-rain threshold.
    pub fn no_rain(&self) -> bool {
        self.column_totals()
            .iter()
            .all(|total| *total < NO_RAIN_THRESHOLD_MM)
    }

    /// True when any cell fell past the field's lookahead (long-ride case).
    pub fn has_horizon_gap(&self) -> bool {
        self.rows.iter().flatten().any(|value| value.is_nan())
    }

    pub fn to_split(&self) -> SplitTable {
        SplitTable {
            columns: self
                .columns
                .iter()
                .map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true))
                .collect(),
            index: self.elapsed_secs.iter().copied().map(format_elapsed).collect(),
            data: self.rows.clone(),
        }
    }
}

fn format_elapsed(secs: i64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Runs the full extraction. Empty inputs (empty track, field with no cells
/// or no steps) yield an empty table, never an error, so callers can always
/// render "no data".
pub fn extract(track: &Track, view: &FieldView, shifts: &[usize]) -> RainTable {
    if track.is_empty() || view.cells() == 0 || view.steps() == 0 {
        return RainTable::empty();
    }

    let index = SpatialIndex::build(&view.lons, &view.lats);
    let space_idx = index.query(&track.lons, &track.lats);
    let time_idx = nearest_steps(&view.relative_secs, &track.elapsed_secs);

    // Combined dedup key. Intentionally coarse (a sum, not a tuple): points
    // collapsing to the same (space, time) cell carry no new information.
    // Keeping point i only when point i+1 maps to a different key retains the
    // last sample of each dwell.
    let keys: Vec<usize> = space_idx
        .iter()
        .zip(&time_idx)
        .map(|(space, time)| space + time)
        .collect();

    let cadence = view.cadence_secs();
    let columns = shifts
        .iter()
        .map(|&shift| view.time_axis[0] + Duration::seconds(cadence * shift as i64))
        .collect();

    let count = keys.len();
    let mut elapsed_secs = Vec::new();
    let mut rows = Vec::new();
    let mut previous_elapsed: Option<i64> = None;

    for i in 0..count {
        if i + 1 < count && keys[i] == keys[i + 1] {
            continue;
        }
        let elapsed = track.elapsed_secs[i];
        // The first retained row spans no time and contributes nothing.
        let delta_hours = previous_elapsed
            .map(|previous| (elapsed - previous) as f64 / 3600.0)
            .unwrap_or(0.0);

        let row = shifts
            .iter()
            .map(|&shift| {
                let step = time_idx[i] + shift;
                if step < view.steps() {
                    to_rain_rate(f64::from(view.values[[step, space_idx[i]]])) * delta_hours
                } else {
                    f64::NAN
                }
            })
            .collect();

        elapsed_secs.push(elapsed);
        rows.push(row);
        previous_elapsed = Some(elapsed);
    }

    RainTable {
        columns,
        elapsed_secs,
        rows,
    }
}

/// Rain-rate series at the cell nearest a single point, one value per step.
#[derive(Debug, Clone)]
pub struct PointForecast {
    pub times: Vec<DateTime<Utc>>,
    pub rates_mm_h: Vec<f64>,
    pub cell_lon: f64,
    pub cell_lat: f64,
}

pub fn point_series(view: &FieldView, lon: f64, lat: f64) -> Option<PointForecast> {
    if view.cells() == 0 || view.steps() == 0 {
        return None;
    }
    let index = SpatialIndex::build(&view.lons, &view.lats);
    let cell = index.nearest(lon, lat)?;
    let rates_mm_h = (0..view.steps())
        .map(|step| to_rain_rate(f64::from(view.values[[step, cell]])))
        .collect();
    Some(PointForecast {
        times: view.time_axis.clone(),
        rates_mm_h,
        cell_lon: view.lons[cell],
        cell_lat: view.lats[cell],
    })
}

#[derive(Debug, Serialize)]
pub struct BucketSummary {
    pub lookahead_minutes: i64,
    /// Boolean-as-string per the consumer contract.
    pub rain_expected: String,
}

/// Buckets a point forecast into fixed look-ahead windows. Bucket N covers
/// the steps later than the previous bucket and at most N minutes out; the
/// first bucket is "now".
pub fn summarize(series: &PointForecast, bucket_minutes: &[i64]) -> Vec<BucketSummary> {
    let start = series.times.first().copied();
    let mut previous = -1i64;
    bucket_minutes
        .iter()
        .map(|&minutes| {
            let expected = start.is_some_and(|start| {
                series
                    .times
                    .iter()
                    .zip(&series.rates_mm_h)
                    .any(|(time, rate)| {
                        let ahead = (*time - start).num_minutes();
                        ahead > previous && ahead <= minutes && *rate > NO_RAIN_THRESHOLD_MM
                    })
            });
            previous = minutes;
            BucketSummary {
                lookahead_minutes: minutes,
                rain_expected: expected.to_string(),
            }
        })
        .collect()
}
