#![forbid(unsafe_code)]
//! Snapshot provisioning for the Illustria weather service.
//!
//! The dataset is a single read-only SQLite file that is not bundled
//! with the deployment artifact; it is fetched from a remote object
//! store the first time a query needs it. This crate owns that whole
//! lifecycle: streaming download (including click-through interstitial
//! pages some providers put in front of large files), plausibility
//! validation, zip extraction, atomic publication to the canonical
//! serving path, and one-shot self-healing when the file turns out to
//! be corrupt at open time.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

mod archive;
mod provision;
mod source;
mod validate;

pub use archive::{extract_snapshot, is_zip_archive, SNAPSHOT_SUFFIX};
pub use provision::{SnapshotManager, SnapshotMetrics};
pub use source::{parse_confirm_token, FakeSource, HttpSource, SnapshotSource};
pub use validate::{has_snapshot_header, is_plausible_snapshot, leading_bytes, SNAPSHOT_MAGIC};

pub const CRATE_NAME: &str = "illustria-snapshot";

pub const DEFAULT_MIN_SNAPSHOT_BYTES: u64 = 1024 * 1024;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Remote artifact location; `None` is a fatal `Config` error the
    /// first time provisioning is attempted.
    pub source_url: Option<String>,
    /// Canonical serving path. Only `SnapshotManager` writes here, and
    /// only via atomic rename.
    pub snapshot_path: PathBuf,
    /// Size floor below which a header-valid file is still rejected
    /// (guards truncated downloads and HTML error pages).
    pub min_snapshot_bytes: u64,
    pub fetch_timeout: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            source_url: None,
            snapshot_path: PathBuf::from("illustria.db"),
            min_snapshot_bytes: DEFAULT_MIN_SNAPSHOT_BYTES,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum SnapshotError {
    /// Required configuration missing; recurs deterministically until
    /// fixed, never retried automatically.
    Config(String),
    /// Non-success HTTP response from the remote store.
    FetchFailed { status: u16, url: String },
    /// Transport-level failure (connect, timeout, mid-body abort) or an
    /// interstitial page that could not be resolved.
    Network { url: String, detail: String },
    /// The fetched archive has no member with the expected suffix.
    NoSnapshotInArchive { archive: PathBuf },
    /// Post-publish validation failed; carries the file's leading bytes
    /// for diagnosis.
    InvalidFormat { leading: Vec<u8> },
    /// SQLite rejected the file after the single self-heal retry.
    Unreadable(String),
    Io(String),
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::FetchFailed { status, url } => {
                write!(f, "snapshot fetch failed with status {status} for {url}")
            }
            Self::Network { url, detail } => {
                write!(f, "snapshot fetch failed for {url}: {detail}")
            }
            Self::NoSnapshotInArchive { archive } => write!(
                f,
                "archive {} contains no {} member",
                archive.display(),
                SNAPSHOT_SUFFIX
            ),
            Self::InvalidFormat { leading } => {
                write!(f, "snapshot failed format validation; leading bytes: ")?;
                for byte in leading {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Self::Unreadable(detail) => write!(f, "snapshot unreadable: {detail}"),
            Self::Io(detail) => write!(f, "snapshot i/o error: {detail}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<std::io::Error> for SnapshotError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}
