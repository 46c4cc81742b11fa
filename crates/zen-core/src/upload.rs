//! Resumable file upload into a draft or a legacy deposition.
//!
//! The repository cannot resume a partial transfer, so the unit of retry is
//! the whole transfer: `PUT content` + `POST commit` for a draft slot, a
//! single `PUT` for a deposition bucket. Between attempts the workflow
//! sleeps for a uniformly random delay in `[min_delay, max_delay]`.
//!
//! ```text
//! NotCreated -> SlotCreated -> Uploading(1) -> Committed
//!     |                            |
//!     v  (same checksum)           v
//!  Skipped                     Failed(n) -> Retrying(n) -> Uploading(n+1) ...
//!                                  |
//!                                  v  (n == max_retries)
//!                             SlotDeleted
//! ```
//!
//! A bucket upload has no slot, so it goes straight from `NotCreated` to
//! `Uploading(1)` and ends in `Failed(n)` when retries run out.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;
use tracing::{Level, debug, info, instrument, trace, warn};
use url::Url;

use crate::api::decode;
use crate::checksum;
use crate::error::{InvalidInputError, UploadError};
use crate::files::{DraftFiles, FileEntry, FileStatus, validate_key};
use crate::transport::FileBody;
use crate::{Api, Result};

/// Name of the hidden directory holding downloaded remote sources.
pub const WORK_DIR_NAME: &str = ".zen";

/// Emit an event at `info`/`warn`, or at `debug` when quiet.
macro_rules! report {
    ($quiet:expr, $level:expr, $($arg:tt)+) => {
        if $quiet {
            debug!($($arg)+);
        } else if $level == Level::WARN {
            warn!($($arg)+);
        } else {
            info!($($arg)+);
        }
    };
}

/// Where the bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    /// An existing local file.
    Local(PathBuf),
    /// An `http://` or `https://` URL, downloaded before upload.
    Remote(Url),
}

impl UploadSource {
    /// Parse a path or URL.
    ///
    /// Strings starting with `http://` or `https://` are URLs; any other
    /// `scheme://` is rejected. Everything else is a local path that must
    /// name an existing file.
    pub fn parse(value: &str) -> Result<Self> {
        let lower = value.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(value).map_err(|e| InvalidInputError::Source {
                value: value.to_string(),
                reason: e.to_string(),
            })?;
            if url.host_str().is_none() {
                return Err(InvalidInputError::Source {
                    value: value.to_string(),
                    reason: "URL has no host".to_string(),
                }
                .into());
            }
            return Ok(Self::Remote(url));
        }

        if value.contains("://") {
            return Err(InvalidInputError::Source {
                value: value.to_string(),
                reason: "only http:// and https:// URLs are supported".to_string(),
            }
            .into());
        }

        let source = Self::Local(PathBuf::from(value));
        source.validate()?;
        Ok(source)
    }

    /// Check that a local source is an existing file.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Local(path) if !path.is_file() => Err(InvalidInputError::Source {
                value: path.display().to_string(),
                reason: "file not found".to_string(),
            }
            .into()),
            Self::Remote(url) if !matches!(url.scheme(), "http" | "https") => {
                Err(InvalidInputError::Source {
                    value: url.to_string(),
                    reason: "only http:// and https:// URLs are supported".to_string(),
                }
                .into())
            }
            _ => Ok(()),
        }
    }

    /// The file name part of the source, used as the default key.
    pub fn default_key(&self) -> Result<String> {
        let name = match self {
            Self::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            Self::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        };
        name.ok_or_else(|| {
            InvalidInputError::Source {
                value: self.to_string(),
                reason: "cannot derive a file key; pass one explicitly".to_string(),
            }
            .into()
        })
    }
}

impl fmt::Display for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Tuning for [`upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Key of the file in the draft. Defaults to the source's file name.
    pub key: Option<String>,
    /// Upload + commit attempts before giving up.
    pub max_retries: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Demote progress and retry reports to `debug`.
    pub quiet: bool,
    /// Parent of the `.zen` download directory. Defaults to the working directory.
    pub work_dir: Option<PathBuf>,
    /// Upload even when a file with the same key and checksum exists.
    pub force: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            key: None,
            max_retries: 15,
            min_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
            quiet: false,
            work_dir: None,
            force: false,
        }
    }
}

impl UploadOptions {
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delays(mut self, min_delay: Duration, max_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self.max_delay = max_delay;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(InvalidInputError::UploadOptions {
                reason: "max_retries must be at least 1".to_string(),
            }
            .into());
        }
        if self.min_delay > self.max_delay {
            return Err(InvalidInputError::UploadOptions {
                reason: format!(
                    "min_delay ({:?}) is greater than max_delay ({:?})",
                    self.min_delay, self.max_delay
                ),
            }
            .into());
        }
        Ok(())
    }
}

/// States of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    NotCreated,
    SlotCreated,
    Uploading { attempt: u32 },
    Failed { attempt: u32 },
    Retrying { attempt: u32, delay: Duration },
    Committed,
    SlotDeleted,
    /// The file was already there with the same content.
    Skipped,
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotCreated => f.write_str("not-created"),
            Self::SlotCreated => f.write_str("slot-created"),
            Self::Uploading { attempt } => write!(f, "uploading({attempt})"),
            Self::Failed { attempt } => write!(f, "failed({attempt})"),
            Self::Retrying { attempt, delay } => {
                write!(f, "retrying({attempt}, {}s)", delay.as_secs_f64())
            }
            Self::Committed => f.write_str("committed"),
            Self::SlotDeleted => f.write_str("slot-deleted"),
            Self::Skipped => f.write_str("skipped"),
        }
    }
}

/// The result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// The committed entry as returned by the final call, or the existing
    /// entry when the upload was skipped.
    pub entry: FileEntry,
    /// Transfers performed, including the successful one. Zero when skipped.
    pub attempts: u32,
    /// Every state the upload went through, in order.
    pub history: Vec<UploadState>,
}

impl UploadOutcome {
    /// Whether an identical file was already present.
    pub fn is_skipped(&self) -> bool {
        self.history.last() == Some(&UploadState::Skipped)
    }
}

struct Machine {
    key: String,
    state: UploadState,
    history: Vec<UploadState>,
}

impl Machine {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            state: UploadState::NotCreated,
            history: vec![UploadState::NotCreated],
        }
    }

    fn advance(&mut self, next: UploadState) {
        trace!(key = %self.key, from = %self.state, to = %next, "upload state");
        self.state = next;
        self.history.push(next);
    }

    fn skip(mut self, entry: FileEntry, quiet: bool) -> UploadOutcome {
        self.advance(UploadState::Skipped);
        report!(quiet, Level::INFO, key = %self.key, "file unchanged, upload skipped");
        UploadOutcome {
            entry,
            attempts: 0,
            history: self.history,
        }
    }
}

/// The bytes to send: a local file, or a remote source downloaded into the
/// work directory. The download lives as long as this value.
struct Staged {
    path: PathBuf,
    _download: Option<TempDownload>,
}

impl Staged {
    async fn prepare(
        api: &Api,
        source: &UploadSource,
        options: &UploadOptions,
        key: &str,
    ) -> Result<Self> {
        match source {
            UploadSource::Local(path) => Ok(Self {
                path: path.clone(),
                _download: None,
            }),
            UploadSource::Remote(url) => {
                let work_dir = match &options.work_dir {
                    Some(dir) => dir.clone(),
                    None => std::env::current_dir()?,
                };
                report!(options.quiet, Level::INFO, key = %key, %url, "downloading remote source");
                let download = TempDownload::fetch(api, url, &work_dir, key).await?;
                Ok(Self {
                    path: download.path.clone(),
                    _download: Some(download),
                })
            }
        }
    }

    fn body(&self, quiet: bool) -> FileBody {
        FileBody {
            path: self.path.clone(),
            quiet,
        }
    }

    /// Whether `existing` already holds these bytes. An entry without a
    /// checksum counts as a match, as there is nothing to compare against.
    async fn matches(&self, existing: &FileEntry) -> Result<bool> {
        let Some(remote) = existing.checksum.as_deref() else {
            return Ok(true);
        };
        let local = checksum::md5_file(&self.path).await?;
        debug!(key = %existing.key, remote, local = %local, "comparing checksums");
        Ok(checksum::same_checksum(remote, &local))
    }
}

/// Where a transfer lands.
enum Target {
    /// A draft slot: `PUT content`, then `POST commit`.
    Slot { content: String, commit: String },
    /// A deposition bucket: one `PUT {bucket}/{key}`.
    Bucket { url: String },
}

impl Target {
    fn slot(slot: &FileEntry) -> Result<Self> {
        let require = |value: &Option<String>, link: &'static str| {
            value.clone().ok_or_else(|| UploadError::MissingLink {
                key: slot.key.clone(),
                link,
            })
        };
        Ok(Self::Slot {
            content: require(&slot.links.content, "content")?,
            commit: require(&slot.links.commit, "commit")?,
        })
    }

    async fn send(&self, api: &Api, body: FileBody) -> Result<FileEntry> {
        match self {
            Self::Slot { content, commit } => {
                api.put_file(content, body).await?;
                api.post(commit, None).await
            }
            Self::Bucket { url } => {
                let response = api.put_file(url, body).await?;
                let mut entry: FileEntry = decode(url, &response)?;
                // a bucket object is complete once the PUT returns
                entry.status = FileStatus::Committed;
                Ok(entry)
            }
        }
    }
}

/// Removes the downloaded copy of a remote source on drop.
#[derive(Debug)]
struct TempDownload {
    path: PathBuf,
}

impl TempDownload {
    async fn fetch(api: &Api, url: &Url, work_dir: &Path, key: &str) -> Result<Self> {
        let dir = work_dir.join(WORK_DIR_NAME);
        tokio::fs::create_dir_all(&dir).await?;
        let guard = Self {
            path: dir.join(key.replace('/', "_")),
        };
        api.fetch_external(url.as_str(), &guard.path).await?;
        Ok(guard)
    }
}

impl Drop for TempDownload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "temporary download removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "could not remove temporary download"),
        }
    }
}

/// A uniformly random delay in `[min, max]`.
fn backoff(min: Duration, max: Duration) -> Duration {
    let (lo, hi) = (min.as_millis() as u64, max.as_millis() as u64);
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}

/// Check the options, the source and the key it resolves to.
fn resolve_key(source: &UploadSource, options: &UploadOptions) -> Result<String> {
    options.validate()?;
    source.validate()?;
    let key = match &options.key {
        Some(key) => key.clone(),
        None => source.default_key()?,
    };
    validate_key(&key)?;
    Ok(key)
}

/// Upload `source` into `files` as a new, committed file.
///
/// Input problems are reported before any request. Unless
/// `options.force` is set, a committed file with the same key and checksum
/// is left alone and the outcome is marked skipped; any other file under
/// the key is deleted first. Slot creation is attempted once. The transfer
/// itself is retried up to `options.max_retries` times; when every attempt
/// fails the slot is deleted and [`UploadError::MaxRetriesExceeded`] is
/// returned. On success the draft's file listing is refreshed.
#[instrument(skip(files, options), fields(url = %files.url()))]
pub async fn upload(
    files: &mut DraftFiles,
    source: UploadSource,
    options: UploadOptions,
) -> Result<UploadOutcome> {
    let key = resolve_key(&source, &options)?;
    let api = files.api().clone();
    let staged = Staged::prepare(&api, &source, &options, &key).await?;
    let mut machine = Machine::new(&key);

    if let Some(existing) = files.get(&key).cloned() {
        if !options.force && existing.is_committed() && staged.matches(&existing).await? {
            return Ok(machine.skip(existing, options.quiet));
        }
        files.delete(&key).await?;
        report!(options.quiet, Level::INFO, key = %key, "existing file removed for re-upload");
    }

    let slot = files.create_slot(&key).await?;
    machine.advance(UploadState::SlotCreated);
    report!(options.quiet, Level::INFO, key = %key, "file slot created");

    let result = match Target::slot(&slot) {
        Ok(target) => transfer(&api, &target, &staged, &options, &mut machine).await,
        Err(err) => Err(err),
    };

    match result {
        Ok((entry, attempts)) => {
            if let Err(e) = files.refresh().await {
                warn!(key = %key, error = %e, "upload committed but the file listing could not be refreshed");
            }
            report!(options.quiet, Level::INFO, key = %key, attempts, "upload complete");
            Ok(UploadOutcome {
                entry,
                attempts,
                history: machine.history,
            })
        }
        Err(err) => {
            let slot_url = slot
                .links
                .self_
                .clone()
                .unwrap_or_else(|| format!("{}/{}", api.url(files.url()), key));
            match api.delete(&slot_url).await {
                Ok(()) => {
                    machine.advance(UploadState::SlotDeleted);
                    report!(options.quiet, Level::WARN, key = %key, "orphaned file slot deleted");
                }
                Err(e) => warn!(key = %key, error = %e, "could not delete orphaned file slot"),
            }
            Err(err)
        }
    }
}

/// Upload `source` into a legacy deposition's file bucket.
///
/// `existing` is the deposition's current file under the same name, used
/// for the checksum skip. A bucket `PUT` replaces the object, so nothing is
/// deleted beforehand or after a failure.
#[instrument(skip(api, existing, options))]
pub(crate) async fn upload_to_bucket(
    api: &Api,
    bucket: Option<&str>,
    existing: Option<&FileEntry>,
    source: UploadSource,
    options: UploadOptions,
) -> Result<UploadOutcome> {
    let key = resolve_key(&source, &options)?;
    let bucket = bucket.ok_or_else(|| UploadError::MissingLink {
        key: key.clone(),
        link: "bucket",
    })?;
    let staged = Staged::prepare(api, &source, &options, &key).await?;
    let mut machine = Machine::new(&key);

    if let Some(existing) = existing {
        if !options.force && staged.matches(existing).await? {
            return Ok(machine.skip(existing.clone(), options.quiet));
        }
    }

    let target = Target::Bucket {
        url: format!("{}/{}", bucket.trim_end_matches('/'), key),
    };
    let (entry, attempts) = transfer(api, &target, &staged, &options, &mut machine).await?;
    report!(options.quiet, Level::INFO, key = %key, attempts, "upload complete");
    Ok(UploadOutcome {
        entry,
        attempts,
        history: machine.history,
    })
}

/// The retry loop shared by both targets.
async fn transfer(
    api: &Api,
    target: &Target,
    staged: &Staged,
    options: &UploadOptions,
    machine: &mut Machine,
) -> Result<(FileEntry, u32)> {
    let key = machine.key.clone();
    let mut attempt = 0;
    loop {
        attempt += 1;
        machine.advance(UploadState::Uploading { attempt });
        report!(options.quiet, Level::INFO, key = %key, attempt, max = options.max_retries, "uploading");

        match target.send(api, staged.body(options.quiet)).await {
            Ok(entry) => {
                machine.advance(UploadState::Committed);
                return Ok((entry, attempt));
            }
            Err(err) => {
                machine.advance(UploadState::Failed { attempt });
                report!(options.quiet, Level::WARN, key = %key, attempt, error = %err, "upload attempt failed");

                if attempt >= options.max_retries {
                    return Err(UploadError::MaxRetriesExceeded {
                        key,
                        attempts: attempt,
                        last_error: err.to_string(),
                    }
                    .into());
                }

                let delay = backoff(options.min_delay, options.max_delay);
                machine.advance(UploadState::Retrying { attempt, delay });
                report!(
                    options.quiet,
                    Level::WARN,
                    key = %key,
                    delay_secs = delay.as_secs_f64(),
                    "retrying upload"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_support::{BASE, MockTransport};
    use crate::transport::{Body, Method};
    use serde_json::{Value, json};

    const FILES: &str = "https://sandbox.zenodo.org/api/records/abc/draft/files";

    fn slot_url(key: &str) -> String {
        format!("{FILES}/{key}")
    }

    fn entry(key: &str, status: &str) -> Value {
        json!({
            "key": key,
            "status": status,
            "links": {
                "self": slot_url(key),
                "content": format!("{}/content", slot_url(key)),
                "commit": format!("{}/commit", slot_url(key)),
            }
        })
    }

    fn fast() -> UploadOptions {
        UploadOptions::default().with_delays(Duration::ZERO, Duration::ZERO)
    }

    fn local_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"a,b\n1,2\n").unwrap();
        path
    }

    fn mock_slot(mock: &MockTransport, key: &str) {
        mock.on(Method::Post, FILES, 201, json!({"entries": [entry(key, "pending")]}));
        mock.on(
            Method::Get,
            FILES,
            200,
            json!({"entries": [entry(key, "completed")]}),
        );
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let mock = MockTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let path = local_file(dir.path(), "data.csv");
        mock_slot(&mock, "data.csv");
        let content = format!("{}/content", slot_url("data.csv"));
        let commit = format!("{}/commit", slot_url("data.csv"));
        mock.on(Method::Put, &content, 500, Value::Null);
        mock.on(Method::Put, &content, 200, json!({}));
        mock.on(Method::Post, &commit, 429, Value::Null);
        mock.on(Method::Post, &commit, 200, entry("data.csv", "completed"));

        let mut files = DraftFiles::new(mock.api(), FILES.to_string());
        let outcome = upload(&mut files, UploadSource::Local(path), fast().with_retries(5))
            .await
            .unwrap();

        // attempt 1 fails on PUT, attempt 2 on commit, attempt 3 succeeds
        assert_eq!(outcome.attempts, 3);
        assert_eq!(mock.count(Method::Put, &content), 3);
        assert_eq!(mock.count(Method::Post, &commit), 2);
        assert_eq!(mock.count(Method::Delete, &slot_url("data.csv")), 0);
        assert!(files.get("data.csv").unwrap().is_committed());
        assert_eq!(outcome.history.last(), Some(&UploadState::Committed));
        assert_eq!(
            outcome
                .history
                .iter()
                .filter(|s| matches!(s, UploadState::Retrying { .. }))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn exhausted_retries_delete_slot_once() {
        let mock = MockTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let path = local_file(dir.path(), "data.csv");
        mock_slot(&mock, "data.csv");
        let content = format!("{}/content", slot_url("data.csv"));
        mock.on(Method::Put, &content, 500, Value::Null);
        mock.on(Method::Delete, &slot_url("data.csv"), 204, Value::Null);

        let mut files = DraftFiles::new(mock.api(), FILES.to_string());
        let err = upload(&mut files, UploadSource::Local(path), fast().with_retries(2))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Upload(UploadError::MaxRetriesExceeded { attempts: 2, .. })
        ));
        assert_eq!(mock.count(Method::Put, &content), 2);
        assert_eq!(mock.count(Method::Delete, &slot_url("data.csv")), 1);
    }

    #[tokio::test]
    async fn file_body_is_octet_stream() {
        let mock = MockTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let path = local_file(dir.path(), "data.csv");
        mock_slot(&mock, "renamed.csv");
        let content = format!("{}/content", slot_url("renamed.csv"));
        mock.on(Method::Put, &content, 200, json!({}));
        mock.on(
            Method::Post,
            &format!("{}/commit", slot_url("renamed.csv")),
            200,
            entry("renamed.csv", "completed"),
        );

        let mut files = DraftFiles::new(mock.api(), FILES.to_string());
        upload(
            &mut files,
            UploadSource::Local(path.clone()),
            fast().with_key("renamed.csv").quiet(true),
        )
        .await
        .unwrap();

        let put = mock
            .calls()
            .into_iter()
            .find(|c| c.method == Method::Put)
            .unwrap();
        assert_eq!(put.header("content-type"), Some("application/octet-stream"));
        assert_eq!(put.body, Body::File(FileBody { path, quiet: true }));
    }

    #[tokio::test]
    async fn slot_creation_failure_is_not_retried() {
        let mock = MockTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let path = local_file(dir.path(), "data.csv");
        mock.on(Method::Post, FILES, 403, Value::Null);

        let mut files = DraftFiles::new(mock.api(), FILES.to_string());
        let err = upload(&mut files, UploadSource::Local(path), fast())
            .await
            .unwrap_err();

        assert_eq!(err.as_api().unwrap().status, 403);
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn invalid_input_makes_no_request() {
        let mock = MockTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let path = local_file(dir.path(), "data.csv");
        let mut files = DraftFiles::new(mock.api(), FILES.to_string());

        let missing = UploadSource::Local(dir.path().join("nope.csv"));
        assert!(upload(&mut files, missing, fast()).await.is_err());

        let zero = fast().with_retries(0);
        assert!(upload(&mut files, UploadSource::Local(path.clone()), zero).await.is_err());

        let inverted = fast().with_delays(Duration::from_secs(5), Duration::from_secs(1));
        assert!(upload(&mut files, UploadSource::Local(path), inverted).await.is_err());

        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn remote_source_is_downloaded_then_removed() {
        let mock = MockTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let remote = "https://data.example.org/share/obs.csv";
        mock.on_raw(Method::Get, remote, 200, b"x,y\n".to_vec());
        mock_slot(&mock, "obs.csv");
        let content = format!("{}/content", slot_url("obs.csv"));
        mock.on(Method::Put, &content, 200, json!({}));
        mock.on(
            Method::Post,
            &format!("{}/commit", slot_url("obs.csv")),
            200,
            entry("obs.csv", "completed"),
        );

        let mut files = DraftFiles::new(mock.api(), FILES.to_string());
        let source = UploadSource::parse(remote).unwrap();
        upload(&mut files, source, fast().with_work_dir(dir.path()))
            .await
            .unwrap();

        let put = mock
            .calls()
            .into_iter()
            .find(|c| c.method == Method::Put)
            .unwrap();
        let expected = dir.path().join(WORK_DIR_NAME).join("obs.csv");
        assert_eq!(put.body, Body::File(FileBody { path: expected.clone(), quiet: false }));
        assert!(!expected.exists());
        // no credentials leak to the third-party host
        let get = mock.calls().into_iter().find(|c| c.url == remote).unwrap();
        assert_eq!(get.header("authorization"), None);
    }

    #[tokio::test]
    async fn remote_source_removed_after_failure() {
        let mock = MockTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let remote = "https://data.example.org/share/obs.csv";
        mock.on_raw(Method::Get, remote, 200, b"x,y\n".to_vec());
        mock_slot(&mock, "obs.csv");
        mock.on_error(
            Method::Put,
            &format!("{}/content", slot_url("obs.csv")),
            "connection reset",
        );
        mock.on(Method::Delete, &slot_url("obs.csv"), 204, Value::Null);

        let mut files = DraftFiles::new(mock.api(), FILES.to_string());
        let source = UploadSource::parse(remote).unwrap();
        let err = upload(
            &mut files,
            source,
            fast().with_retries(1).with_work_dir(dir.path()),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("connection reset"));
        assert!(!dir.path().join(WORK_DIR_NAME).join("obs.csv").exists());
        assert_eq!(mock.count(Method::Delete, &slot_url("obs.csv")), 1);
    }

    /// A draft whose listing already holds `key` with the given checksum.
    async fn draft_with(mock: &MockTransport, key: &str, checksum: &str) -> DraftFiles {
        let mut existing = entry(key, "completed");
        existing["checksum"] = json!(checksum);
        mock.on(Method::Get, FILES, 200, json!({"entries": [existing]}));
        let mut files = DraftFiles::new(mock.api(), FILES.to_string());
        files.refresh().await.unwrap();
        files
    }

    #[tokio::test]
    async fn same_checksum_skips_upload() {
        let mock = MockTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let path = local_file(dir.path(), "data.csv");
        let md5 = checksum::md5_hex(b"a,b\n1,2\n");
        let mut files = draft_with(&mock, "data.csv", &format!("md5:{md5}")).await;

        let outcome = upload(&mut files, UploadSource::Local(path), fast())
            .await
            .unwrap();

        assert!(outcome.is_skipped());
        assert_eq!(outcome.attempts, 0);
        assert_eq!(outcome.entry.key, "data.csv");
        // only the initial listing
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn changed_checksum_replaces_file() {
        let mock = MockTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let path = local_file(dir.path(), "data.csv");
        let mut files = draft_with(&mock, "data.csv", "md5:d41d8cd98f00b204e9800998ecf8427e").await;
        mock.on(Method::Delete, &slot_url("data.csv"), 204, Value::Null);
        mock_slot(&mock, "data.csv");
        mock.on(Method::Put, &format!("{}/content", slot_url("data.csv")), 200, json!({}));
        mock.on(
            Method::Post,
            &format!("{}/commit", slot_url("data.csv")),
            200,
            entry("data.csv", "completed"),
        );

        let outcome = upload(&mut files, UploadSource::Local(path), fast())
            .await
            .unwrap();

        assert!(!outcome.is_skipped());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(mock.count(Method::Delete, &slot_url("data.csv")), 1);
        assert_eq!(mock.count(Method::Post, FILES), 1);
    }

    #[tokio::test]
    async fn force_uploads_identical_file() {
        let mock = MockTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let path = local_file(dir.path(), "data.csv");
        let md5 = checksum::md5_hex(b"a,b\n1,2\n");
        let mut files = draft_with(&mock, "data.csv", &md5).await;
        mock.on(Method::Delete, &slot_url("data.csv"), 204, Value::Null);
        mock_slot(&mock, "data.csv");
        let content = format!("{}/content", slot_url("data.csv"));
        mock.on(Method::Put, &content, 200, json!({}));
        mock.on(
            Method::Post,
            &format!("{}/commit", slot_url("data.csv")),
            200,
            entry("data.csv", "completed"),
        );

        let outcome = upload(&mut files, UploadSource::Local(path), fast().force(true))
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(mock.count(Method::Put, &content), 1);
    }

    const BUCKET: &str = "https://sandbox.zenodo.org/api/files/0b2c-bucket";

    fn bucket_object(key: &str) -> Value {
        json!({
            "key": key,
            "size": 8,
            "checksum": "md5:5c2a1fa4b3d04a4b17a1de5e8d5ac5d5",
            "links": {"self": format!("{BUCKET}/{key}")}
        })
    }

    #[tokio::test]
    async fn bucket_upload_retries_single_put() {
        let mock = MockTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let path = local_file(dir.path(), "data.csv");
        let object = format!("{BUCKET}/data.csv");
        mock.on_error(Method::Put, &object, "connection reset");
        mock.on(Method::Put, &object, 201, bucket_object("data.csv"));

        let outcome = upload_to_bucket(
            &mock.api(),
            Some(BUCKET),
            None,
            UploadSource::Local(path),
            fast().with_retries(3),
        )
        .await
        .unwrap();

        assert_eq!(outcome.attempts, 2);
        assert!(outcome.entry.is_committed());
        assert_eq!(mock.calls().len(), 2);
        assert!(!outcome.history.contains(&UploadState::SlotCreated));
    }

    #[tokio::test]
    async fn bucket_upload_gives_up_without_cleanup() {
        let mock = MockTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let path = local_file(dir.path(), "data.csv");
        let object = format!("{BUCKET}/data.csv");
        mock.on(Method::Put, &object, 500, Value::Null);

        let err = upload_to_bucket(
            &mock.api(),
            Some(BUCKET),
            None,
            UploadSource::Local(path),
            fast().with_retries(2),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            Error::Upload(UploadError::MaxRetriesExceeded { attempts: 2, .. })
        ));
        assert_eq!(mock.calls().len(), 2);
        assert!(mock.calls().iter().all(|c| c.method == Method::Put));
    }

    #[tokio::test]
    async fn bucket_upload_without_bucket_link_makes_no_request() {
        let mock = MockTransport::new();
        let dir = tempfile::tempdir().unwrap();
        let path = local_file(dir.path(), "data.csv");

        let err = upload_to_bucket(&mock.api(), None, None, UploadSource::Local(path), fast())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Upload(UploadError::MissingLink { link: "bucket", .. })
        ));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn parse_sources() {
        assert!(matches!(
            UploadSource::parse("https://example.org/a.csv").unwrap(),
            UploadSource::Remote(_)
        ));
        assert!(UploadSource::parse("ftp://example.org/a.csv").is_err());
        assert!(UploadSource::parse("/definitely/not/here.csv").is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = local_file(dir.path(), "a.csv");
        let source = UploadSource::parse(path.to_str().unwrap()).unwrap();
        assert_eq!(source.default_key().unwrap(), "a.csv");
    }

    #[test]
    fn remote_key_from_last_segment() {
        let source = UploadSource::parse("https://example.org/dir/b.tif").unwrap();
        assert_eq!(source.default_key().unwrap(), "b.tif");
        let bare = UploadSource::parse("https://example.org/").unwrap();
        assert!(bare.default_key().is_err());
    }

    #[test]
    fn backoff_stays_in_bounds() {
        let min = Duration::from_secs(10);
        let max = Duration::from_secs(60);
        for _ in 0..200 {
            let d = backoff(min, max);
            assert!(d >= min && d <= max);
        }
        assert_eq!(backoff(Duration::ZERO, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn defaults() {
        let options = UploadOptions::default();
        assert_eq!(options.max_retries, 15);
        assert_eq!(options.min_delay, Duration::from_secs(10));
        assert_eq!(options.max_delay, Duration::from_secs(60));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn base_is_sandbox() {
        assert!(FILES.starts_with(BASE));
    }
}
