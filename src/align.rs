//! Nearest-match alignment between the track's irregular elapsed times and
//! the radar's fixed-step relative axis. A one-sided nearest match, not an
//! interpolation: the 5-minute cadence is coarser than the track sampling,
//! so many consecutive samples legitimately map to the same step.

/// For each elapsed sample, the index of the nearest entry of `axis_secs`.
/// The axis must be sorted ascending. Samples beyond either end clamp to the
/// nearest available step. Ties resolve to the earlier step.
pub fn nearest_steps(axis_secs: &[i64], samples_secs: &[i64]) -> Vec<usize> {
    if axis_secs.is_empty() {
        return vec![0; samples_secs.len()];
    }
    samples_secs
        .iter()
        .map(|&sample| nearest_step(axis_secs, sample))
        .collect()
}

fn nearest_step(axis_secs: &[i64], sample: i64) -> usize {
    let after = axis_secs.partition_point(|&step| step < sample);
    if after == 0 {
        return 0;
    }
    if after == axis_secs.len() {
        return axis_secs.len() - 1;
    }
    let below = sample - axis_secs[after - 1];
    let above = axis_secs[after] - sample;
    if above < below {
        after
    } else {
        after - 1
    }
}
