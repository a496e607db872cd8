use thiserror::Error;

/// Failure decoding a single composite frame. One bad frame aborts the whole
/// field build; downstream alignment assumes complete, regularly spaced steps.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("composite header is truncated")]
    TruncatedHeader,
    #[error("composite header is malformed: {0}")]
    MalformedHeader(String),
    #[error("composite header carries an invalid capture timestamp")]
    BadTimestamp,
    #[error("payload of {found} bytes does not match the declared {rows}x{cols} grid")]
    PayloadLength {
        found: usize,
        rows: usize,
        cols: usize,
    },
    #[error("no 3-digit forecast-minute marker in file name {0:?}")]
    BadMinuteMarker(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure acquiring the current radar field. Surfaced to the query layer as
/// "no forecast available now"; never a partial field.
#[derive(Debug, Error)]
pub enum RadarError {
    #[error("radar download failed: {0}")]
    Download(String),
    #[error("radar archive is unreadable: {0}")]
    Archive(String),
    #[error("radar archive contained no composite frames")]
    EmptyArchive,
    #[error("inconsistent frame set: {0}")]
    Assembly(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Collaborator-boundary failures. The core has no track or point to operate
/// on without these, so they propagate unchanged.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("geocoding failed for {place:?}: {reason}")]
    Geocode { place: String, reason: String },
    #[error("directions lookup failed: {0}")]
    Directions(String),
}
