// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::SnapshotError;

/// Archive member suffix identifying the embedded snapshot.
pub const SNAPSHOT_SUFFIX: &str = ".db";

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// Sniffs the zip local-file-header magic. Content decides whether the
/// fetched artifact is an archive, not the URL suffix.
#[must_use]
pub fn is_zip_archive(path: &Path) -> bool {
    let mut file = match fs::File::open(path) {
        Ok(file) => file,
        Err(_) => return false,
    };
    let mut magic = [0_u8; 4];
    if file.read_exact(&mut magic).is_err() {
        return false;
    }
    magic == ZIP_MAGIC
}

/// Streams the first member ending in [`SNAPSHOT_SUFFIX`] out of the
/// archive into `dest`. Multiple eligible members are not disambiguated
/// beyond first-in-archive-order.
pub fn extract_snapshot(zip_path: &Path, dest: &Path) -> Result<(), SnapshotError> {
    let file = fs::File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| SnapshotError::Io(format!("failed to open archive: {e}")))?;

    let member_index = (0..archive.len()).find(|&i| {
        archive
            .by_index(i)
            .map(|m| m.is_file() && m.name().ends_with(SNAPSHOT_SUFFIX))
            .unwrap_or(false)
    });
    let Some(index) = member_index else {
        return Err(SnapshotError::NoSnapshotInArchive {
            archive: zip_path.to_path_buf(),
        });
    };

    let mut member = archive
        .by_index(index)
        .map_err(|e| SnapshotError::Io(format!("failed to read archive member: {e}")))?;
    let mut out = fs::File::create(dest)?;
    std::io::copy(&mut member, &mut out)
        .map_err(|e| SnapshotError::Io(format!("failed to extract snapshot: {e}")))?;
    Ok(())
}
