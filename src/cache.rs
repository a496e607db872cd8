//! The memoized "current field" cache. One decoded field serves every query
//! inside the refresh window; the refresh itself (download, unpack, decode,
//! assemble) runs as a critical section, so concurrent callers arriving
//! during a refresh block until it completes and then share the result.

use std::future::Future;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use bzip2::read::BzDecoder;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::constants::{COMPOSITE_COLS, COMPOSITE_ROWS};
use crate::error::RadarError;
use crate::field::{assemble, RadarField};
use crate::projection::coordinate_grid;
use crate::radolan;

/// Extracted frame files look like `WN2012010120_015`: product id, DDhhmm,
/// MMYY, then the 3-digit minutes-ahead marker.
fn frame_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^WN\d{10}_\d{3}$").expect("valid frame name regex"))
}

/// Supplies the raw `tar.bz2` archive of the current frame set.
pub trait RadarSource: Send + Sync {
    fn fetch_archive(&self)
        -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RadarError>> + Send + '_>>;
}

pub struct HttpRadarSource {
    http: Client,
    url: String,
}

impl HttpRadarSource {
    pub fn new(http: Client, url: String) -> Self {
        Self { http, url }
    }
}

impl RadarSource for HttpRadarSource {
    fn fetch_archive(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RadarError>> + Send + '_>> {
        Box::pin(async move {
            let response = self
                .http
                .get(&self.url)
                .send()
                .await
                .map_err(|error| RadarError::Download(error.to_string()))?;
            if !response.status().is_success() {
                return Err(RadarError::Download(format!(
                    "{} for {}",
                    response.status(),
                    self.url
                )));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|error| RadarError::Download(error.to_string()))?;
            Ok(bytes.to_vec())
        })
    }
}

/// Injectable wall clock so the refresh policy is testable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Default)]
struct Slot {
    field: Option<Arc<RadarField>>,
    fetched_at: Option<DateTime<Utc>>,
}

pub struct RadarFieldCache {
    source: Arc<dyn RadarSource>,
    clock: Arc<dyn Clock>,
    window: Duration,
    cache_dir: PathBuf,
    slot: Mutex<Slot>,
}

impl RadarFieldCache {
    pub fn new(
        source: Arc<dyn RadarSource>,
        clock: Arc<dyn Clock>,
        window: std::time::Duration,
        cache_dir: PathBuf,
    ) -> Self {
        Self {
            source,
            clock,
            window: Duration::from_std(window).unwrap_or(Duration::seconds(240)),
            cache_dir,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// The current field, refreshed at most once per window.
    ///
    /// Within the window the cached field is shared as-is. Once the window
    /// has expired a failed refresh is an error, never a silent reuse of the
    /// stale field. Callers arriving during a refresh block on the slot lock
    /// until the refresh finishes.
    pub async fn current(&self) -> Result<Arc<RadarField>, RadarError> {
        let mut slot = self.slot.lock().await;
        let now = self.clock.now();
        if let (Some(field), Some(fetched_at)) = (&slot.field, slot.fetched_at) {
            if now - fetched_at < self.window {
                return Ok(field.clone());
            }
        }

        let archive = self.source.fetch_archive().await?;
        let cache_dir = self.cache_dir.clone();
        let field = tokio::task::spawn_blocking(move || unpack_and_assemble(&archive, &cache_dir))
            .await
            .map_err(|error| RadarError::Archive(format!("decode task failed: {error}")))??;
        let field = Arc::new(field);

        info!(
            steps = field.steps(),
            start = %field.time_axis[0],
            "radar field refreshed"
        );
        slot.field = Some(field.clone());
        slot.fetched_at = Some(self.clock.now());
        Ok(field)
    }

    /// Cache status without forcing a refresh.
    pub async fn peek(&self) -> Option<(Arc<RadarField>, DateTime<Utc>)> {
        let slot = self.slot.lock().await;
        match (&slot.field, slot.fetched_at) {
            (Some(field), Some(fetched_at)) => Some((field.clone(), fetched_at)),
            _ => None,
        }
    }
}

/// Decompresses and unpacks the archive into the cache directory, decodes
/// every frame and assembles the field. Stale frame files are purged before
/// extraction so frames from different refresh cycles never mix.
fn unpack_and_assemble(archive: &[u8], cache_dir: &Path) -> Result<RadarField, RadarError> {
    purge_stale_frames(cache_dir)?;

    let mut decompressed = Vec::new();
    BzDecoder::new(Cursor::new(archive))
        .read_to_end(&mut decompressed)
        .map_err(|error| RadarError::Archive(format!("bzip2: {error}")))?;

    let mut tar = tar::Archive::new(Cursor::new(decompressed));
    let mut paths = Vec::new();
    for entry in tar
        .entries()
        .map_err(|error| RadarError::Archive(format!("tar: {error}")))?
    {
        let mut entry = entry.map_err(|error| RadarError::Archive(format!("tar: {error}")))?;
        let name = match entry.path() {
            Ok(path) => match path.file_name().and_then(|name| name.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            },
            Err(_) => continue,
        };
        if !frame_name_pattern().is_match(&name) {
            warn!(member = %name, "skipping unexpected archive member");
            continue;
        }
        let dest = cache_dir.join(&name);
        entry
            .unpack(&dest)
            .map_err(|error| RadarError::Archive(format!("tar extract {name}: {error}")))?;
        paths.push(dest);
    }
    if paths.is_empty() {
        return Err(RadarError::EmptyArchive);
    }

    let mut frames = Vec::with_capacity(paths.len());
    for path in &paths {
        frames.push(radolan::decode(path)?);
    }

    let (rows, cols) = frames[0].grid.dim();
    if (rows, cols) != (COMPOSITE_ROWS, COMPOSITE_COLS) {
        warn!(rows, cols, "composite dimensions differ from the national grid");
    }
    let coords = coordinate_grid(rows, cols);
    assemble(frames, &coords)
}

fn purge_stale_frames(cache_dir: &Path) -> Result<(), RadarError> {
    for entry in std::fs::read_dir(cache_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if frame_name_pattern().is_match(name) {
            std::fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::radolan::tests::build_frame;

    fn archive_with(frames: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut tar_buf = Vec::new();
        {
            let mut builder = tar::Builder::new(&mut tar_buf);
            for (name, bytes) in frames {
                let mut header = tar::Header::new_gnu();
                header.set_size(bytes.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder
                    .append_data(&mut header, name, bytes.as_slice())
                    .unwrap();
            }
            builder.finish().unwrap();
        }
        let mut encoder =
            bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(&tar_buf).unwrap();
        encoder.finish().unwrap()
    }

    fn two_frame_archive() -> Vec<u8> {
        archive_with(&[
            (
                "WN0112000124_000",
                build_frame(1, 12, 0, 1, 24, 2, 2, &[1, 2, 3, 4]),
            ),
            (
                "WN0112000124_005",
                build_frame(1, 12, 0, 1, 24, 2, 2, &[5, 6, 7, 8]),
            ),
        ])
    }

    struct StubSource {
        responses: std::sync::Mutex<Vec<Result<Vec<u8>, RadarError>>>,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(responses: Vec<Result<Vec<u8>, RadarError>>) -> Self {
            Self {
                responses: std::sync::Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl RadarSource for StubSource {
        fn fetch_archive(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RadarError>> + Send + '_>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.responses.lock().unwrap().remove(0);
            Box::pin(async move { next })
        }
    }

    struct ManualClock {
        now: std::sync::Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new(now: DateTime<Utc>) -> Self {
            Self {
                now: std::sync::Mutex::new(now),
            }
        }

        fn advance(&self, seconds: i64) {
            let mut now = self.now.lock().unwrap();
            *now += Duration::seconds(seconds);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn cache_with(
        responses: Vec<Result<Vec<u8>, RadarError>>,
        dir: &Path,
    ) -> (RadarFieldCache, Arc<StubSource>, Arc<ManualClock>) {
        let source = Arc::new(StubSource::new(responses));
        let clock = Arc::new(ManualClock::new(
            chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let cache = RadarFieldCache::new(
            source.clone(),
            clock.clone(),
            std::time::Duration::from_secs(240),
            dir.to_path_buf(),
        );
        (cache, source, clock)
    }

    #[tokio::test]
    async fn calls_inside_the_window_share_one_download() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, source, clock) = cache_with(
            vec![Ok(two_frame_archive()), Ok(two_frame_archive())],
            dir.path(),
        );

        let first = cache.current().await.unwrap();
        let second = cache.current().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.steps(), 2);
        assert_eq!(first.relative_secs, vec![0, 300]);

        clock.advance(300);
        cache.current().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn a_failed_refresh_past_expiry_is_an_error_not_a_stale_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, source, clock) = cache_with(
            vec![
                Ok(two_frame_archive()),
                Err(RadarError::Download("boom".into())),
            ],
            dir.path(),
        );

        cache.current().await.unwrap();
        clock.advance(241);
        assert!(cache.current().await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stale_extracted_frames_are_purged_before_a_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("WN9999999999_120");
        std::fs::write(&stale, b"junk from an older cycle").unwrap();
        let unrelated = dir.path().join("notes.txt");
        std::fs::write(&unrelated, b"keep me").unwrap();

        let (cache, _, _) = cache_with(vec![Ok(two_frame_archive())], dir.path());
        cache.current().await.unwrap();

        assert!(!stale.exists());
        assert!(unrelated.exists());
        assert!(dir.path().join("WN0112000124_000").exists());
    }

    #[tokio::test]
    async fn one_corrupt_frame_aborts_the_whole_field_build() {
        let dir = tempfile::tempdir().unwrap();
        let archive = archive_with(&[
            (
                "WN0112000124_000",
                build_frame(1, 12, 0, 1, 24, 2, 2, &[1, 2, 3, 4]),
            ),
            ("WN0112000124_005", b"not a composite".to_vec()),
        ]);
        let (cache, _, _) = cache_with(vec![Ok(archive)], dir.path());

        assert!(matches!(
            cache.current().await,
            Err(RadarError::Decode(_))
        ));
        assert!(cache.peek().await.is_none());
    }

    #[tokio::test]
    async fn peek_reports_the_fetch_time_without_refreshing() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, source, clock) = cache_with(vec![Ok(two_frame_archive())], dir.path());

        assert!(cache.peek().await.is_none());
        cache.current().await.unwrap();
        let (field, fetched_at) = cache.peek().await.unwrap();
        assert_eq!(field.steps(), 2);
        assert_eq!(fetched_at, clock.now());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
