// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::io::Read;
use std::path::Path;

/// Fixed 15-byte prefix of the snapshot's binary format header.
pub const SNAPSHOT_MAGIC: &[u8; 15] = b"SQLite format 3";

/// Reads the first 16 header bytes and compares the magic prefix.
/// Any read error (missing file, permission, short file) is `false`,
/// never an error: callers treat unreadable as implausible.
#[must_use]
pub fn has_snapshot_header(path: &Path) -> bool {
    let mut file = match fs::File::open(path) {
        Ok(file) => file,
        Err(_) => return false,
    };
    let mut header = [0_u8; 16];
    if file.read_exact(&mut header).is_err() {
        return false;
    }
    header[..SNAPSHOT_MAGIC.len()] == SNAPSHOT_MAGIC[..]
}

/// Header match alone is not enough to accept a cached file: a
/// truncated download keeps the valid header it started with. The size
/// floor closes that hole.
#[must_use]
pub fn is_plausible_snapshot(path: &Path, min_bytes: u64) -> bool {
    if !has_snapshot_header(path) {
        return false;
    }
    fs::metadata(path).map(|m| m.len() >= min_bytes).unwrap_or(false)
}

/// Up to `n` leading bytes for diagnostics; empty on any read error.
#[must_use]
pub fn leading_bytes(path: &Path, n: usize) -> Vec<u8> {
    let mut file = match fs::File::open(path) {
        Ok(file) => file,
        Err(_) => return Vec::new(),
    };
    let mut buf = vec![0_u8; n];
    let read = file.read(&mut buf).unwrap_or(0);
    buf.truncate(read);
    buf
}
