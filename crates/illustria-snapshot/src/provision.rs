// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rusqlite::{Connection, ErrorCode, OpenFlags};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::archive::{extract_snapshot, is_zip_archive};
use crate::validate::{has_snapshot_header, is_plausible_snapshot, leading_bytes};
use crate::{SnapshotConfig, SnapshotError, SnapshotSource};

/// Provisioning counters surfaced by the health endpoint.
#[derive(Debug, Default)]
pub struct SnapshotMetrics {
    pub fetch_total: AtomicU64,
    pub cache_hits: AtomicU64,
    pub corrupt_discarded: AtomicU64,
    pub self_heal_total: AtomicU64,
}

/// Owns the canonical snapshot path. Sole writer; everything else only
/// ever reads the file through connections this type hands out.
pub struct SnapshotManager {
    cfg: SnapshotConfig,
    source: Arc<dyn SnapshotSource>,
    provision_lock: Mutex<()>,
    metrics: SnapshotMetrics,
}

enum OpenFailure {
    Corrupt(String),
    Other(String),
}

impl OpenFailure {
    fn into_detail(self) -> String {
        match self {
            Self::Corrupt(detail) | Self::Other(detail) => detail,
        }
    }
}

impl SnapshotManager {
    pub fn new(cfg: SnapshotConfig, source: Arc<dyn SnapshotSource>) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            source,
            provision_lock: Mutex::new(()),
            metrics: SnapshotMetrics::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SnapshotConfig {
        &self.cfg
    }

    #[must_use]
    pub fn metrics(&self) -> &SnapshotMetrics {
        &self.metrics
    }

    /// Whether the cached file currently passes header + size checks.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        is_plausible_snapshot(&self.cfg.snapshot_path, self.cfg.min_snapshot_bytes)
    }

    /// Guarantees a valid snapshot exists at the canonical path,
    /// fetching/extracting as needed. Concurrent callers coalesce on a
    /// single in-flight provision; callers that find a valid cached
    /// file return without touching the lock.
    pub async fn ensure_present(&self) -> Result<(), SnapshotError> {
        let url = self
            .cfg
            .source_url
            .clone()
            .ok_or_else(|| SnapshotError::Config("no snapshot source URL configured".to_string()))?;
        if self.is_ready() {
            self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        let _guard = self.provision_lock.lock().await;
        self.provision_locked(&url).await
    }

    async fn provision_locked(&self, url: &str) -> Result<(), SnapshotError> {
        let path = &self.cfg.snapshot_path;
        if path.exists() && !has_snapshot_header(path) {
            warn!(path = %path.display(), "cached snapshot failed header check; discarding");
            fs::remove_file(path)
                .map_err(|e| SnapshotError::Io(format!("failed to remove corrupt snapshot: {e}")))?;
            self.metrics.corrupt_discarded.fetch_add(1, Ordering::Relaxed);
        }
        if self.is_ready() {
            // A racing caller finished provisioning while we waited.
            return Ok(());
        }

        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        info!(url, "snapshot download start");
        let download = tempfile::NamedTempFile::new_in(parent)?;
        self.source.fetch_to(url, download.path()).await?;
        self.metrics.fetch_total.fetch_add(1, Ordering::Relaxed);

        // Publish is a same-filesystem rename: readers observe either
        // the previous complete snapshot or the new one, never a
        // partial write.
        if is_zip_archive(download.path()) {
            let staged = tempfile::NamedTempFile::new_in(parent)?;
            extract_snapshot(download.path(), staged.path())?;
            staged
                .persist(path)
                .map_err(|e| SnapshotError::Io(format!("failed to publish snapshot: {}", e.error)))?;
        } else {
            download
                .persist(path)
                .map_err(|e| SnapshotError::Io(format!("failed to publish snapshot: {}", e.error)))?;
        }

        if !self.is_ready() {
            return Err(SnapshotError::InvalidFormat {
                leading: leading_bytes(path, 16),
            });
        }
        info!(path = %path.display(), "snapshot download complete");
        Ok(())
    }

    /// The self-healing read path: provisions, opens read-only, and on
    /// an engine-reported corruption deletes the file and retries the
    /// whole sequence exactly once.
    pub async fn open_connection(&self) -> Result<Connection, SnapshotError> {
        self.ensure_present().await?;
        match self.try_open().await {
            Ok(conn) => Ok(conn),
            Err(OpenFailure::Corrupt(detail)) => {
                warn!(%detail, "sqlite rejected snapshot; discarding and re-provisioning");
                let _ = fs::remove_file(&self.cfg.snapshot_path);
                self.metrics.self_heal_total.fetch_add(1, Ordering::Relaxed);
                self.ensure_present().await?;
                self.try_open()
                    .await
                    .map_err(|f| SnapshotError::Unreadable(f.into_detail()))
            }
            Err(failure) => Err(SnapshotError::Unreadable(failure.into_detail())),
        }
    }

    async fn try_open(&self) -> Result<Connection, OpenFailure> {
        let path = self.cfg.snapshot_path.clone();
        match tokio::task::spawn_blocking(move || open_readonly(&path)).await {
            Ok(result) => result,
            Err(e) => Err(OpenFailure::Other(format!("open task failed: {e}"))),
        }
    }
}

fn open_readonly(path: &Path) -> Result<Connection, OpenFailure> {
    let conn =
        Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(classify)?;
    // Force a header read so a truncated or overwritten file fails
    // here, not on the first query.
    conn.query_row("PRAGMA schema_version", [], |row| row.get::<_, i64>(0))
        .map_err(classify)?;
    conn.execute_batch("PRAGMA query_only=ON; PRAGMA temp_store=MEMORY;")
        .map_err(classify)?;
    Ok(conn)
}

fn classify(e: rusqlite::Error) -> OpenFailure {
    if is_corruption_error(&e) {
        OpenFailure::Corrupt(e.to_string())
    } else {
        OpenFailure::Other(e.to_string())
    }
}

fn is_corruption_error(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(failure.code, ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase)
    )
}
