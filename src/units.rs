//! Reflectivity decode + Marshall-Palmer style Z-R relation.

/// Encoded reflectivity -> rain rate in mm/h.
///
/// The encoded value is RVP6-scaled: `x/2 - 32.5` recovers dBZ, the rest is
/// `Z = 256 * R^1.42` inverted. Encoded 0 maps to a tiny positive rate; it is
/// both the missing-data substitute and the genuine zero-echo value, so
/// callers must not read it as "certainly no rain".
pub fn to_rain_rate(encoded: f64) -> f64 {
    (10f64.powf((encoded / 2.0 - 32.5) / 10.0) / 256.0).powf(1.0 / 1.42)
}
