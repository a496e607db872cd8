//! Decoder for the national composite's binary frame format: an ASCII header
//! terminated by ETX, followed by a packed little-endian u16 payload, one word
//! per grid cell. The 3-digit marker in the file name is the forecast offset
//! in minutes relative to the header's capture time.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ndarray::Array2;
use regex::Regex;

use crate::constants::{MISSING_SENTINEL, NO_DATA_FLAG, VALUE_MASK};
use crate::error::DecodeError;

const ETX: u8 = 0x03;

/// One decoded composite snapshot. `grid` holds raw encoded reflectivity with
/// [`MISSING_SENTINEL`] in cells without coverage; `capture_time` already
/// includes the file name's forecast-minute offset.
#[derive(Debug, Clone)]
pub struct RadarFrame {
    pub grid: Array2<f32>,
    pub capture_time: DateTime<Utc>,
}

pub fn decode(path: &Path) -> Result<RadarFrame, DecodeError> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let minutes = forecast_minute(name)?;
    let bytes = fs::read(path)?;
    let (grid, header_time) = decode_bytes(&bytes)?;
    Ok(RadarFrame {
        grid,
        capture_time: header_time + Duration::minutes(minutes),
    })
}

/// Parses one frame buffer into (grid, header capture time).
pub fn decode_bytes(buffer: &[u8]) -> Result<(Array2<f32>, DateTime<Utc>), DecodeError> {
    let etx = buffer
        .iter()
        .position(|&byte| byte == ETX)
        .ok_or(DecodeError::TruncatedHeader)?;
    let header = std::str::from_utf8(&buffer[..etx])
        .map_err(|_| DecodeError::MalformedHeader("header is not ASCII".into()))?;
    if header.len() < 17 {
        return Err(DecodeError::TruncatedHeader);
    }

    let capture_time = parse_capture_time(header)?;

    let declared_len = token_digits(header, "BY")
        .ok_or_else(|| DecodeError::MalformedHeader("BY length token missing".into()))?;
    if declared_len as usize != buffer.len() {
        return Err(DecodeError::MalformedHeader(format!(
            "BY declares {} bytes, file has {}",
            declared_len,
            buffer.len()
        )));
    }

    let (rows, cols) = parse_dimensions(header)?;

    let payload = &buffer[etx + 1..];
    if payload.len() != rows * cols * 2 {
        return Err(DecodeError::PayloadLength {
            found: payload.len(),
            rows,
            cols,
        });
    }

    let mut values = Vec::with_capacity(rows * cols);
    for word in payload.chunks_exact(2) {
        let raw = u16::from_le_bytes([word[0], word[1]]);
        if raw & NO_DATA_FLAG != 0 {
            values.push(MISSING_SENTINEL);
        } else {
            values.push(f32::from(raw & VALUE_MASK));
        }
    }

    // Length is checked above, so the reshape cannot fail.
    let grid = Array2::from_shape_vec((rows, cols), values).map_err(|_| {
        DecodeError::PayloadLength {
            found: payload.len(),
            rows,
            cols,
        }
    })?;

    Ok((grid, capture_time))
}

/// Header layout: product id (2), DDhhmm (6), site id (5), MMYY (4), then
/// free-form tokens (BY, VS, PR, INT, GP) up to the ETX byte.
fn parse_capture_time(header: &str) -> Result<DateTime<Utc>, DecodeError> {
    let day = field_u32(header, 2, 4)?;
    let hour = field_u32(header, 4, 6)?;
    let minute = field_u32(header, 6, 8)?;
    let month = field_u32(header, 13, 15)?;
    let year = 2000 + field_u32(header, 15, 17)?;

    Utc.with_ymd_and_hms(year as i32, month, day, hour, minute, 0)
        .single()
        .ok_or(DecodeError::BadTimestamp)
}

fn field_u32(header: &str, start: usize, end: usize) -> Result<u32, DecodeError> {
    header
        .get(start..end)
        .and_then(|text| text.parse::<u32>().ok())
        .ok_or(DecodeError::BadTimestamp)
}

fn parse_dimensions(header: &str) -> Result<(usize, usize), DecodeError> {
    let start = header
        .find("GP")
        .ok_or_else(|| DecodeError::MalformedHeader("GP dimension token missing".into()))?
        + 2;
    let dims: String = header[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == 'x')
        .collect();
    let (rows, cols) = dims
        .split_once('x')
        .and_then(|(rows, cols)| Some((rows.parse::<usize>().ok()?, cols.parse::<usize>().ok()?)))
        .ok_or_else(|| DecodeError::MalformedHeader(format!("bad GP dimensions {dims:?}")))?;
    if rows == 0 || cols == 0 {
        return Err(DecodeError::MalformedHeader(format!(
            "degenerate GP dimensions {dims:?}"
        )));
    }
    Ok((rows, cols))
}

fn token_digits(header: &str, key: &str) -> Option<u64> {
    let start = header.find(key)? + key.len();
    let digits: String = header[start..]
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Extracts the 3-digit minutes-ahead marker from a frame file name,
/// e.g. `WN2012010120_015` -> 15.
pub fn forecast_minute(name: &str) -> Result<i64, DecodeError> {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    let marker = MARKER.get_or_init(|| Regex::new(r"_(\d{3})").expect("valid marker regex"));
    marker
        .captures(name)
        .and_then(|captures| captures.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .ok_or_else(|| DecodeError::BadMinuteMarker(name.to_string()))
}
