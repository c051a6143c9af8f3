//! Disk persistence for index snapshots.
//!
//! Snapshots are written atomically (temp file + rename) with a 4-byte magic
//! and a CRC32 footer for integrity verification. They are caches over the
//! store, never truth: a failed or stale snapshot is always recoverable by
//! re-running `init`.

use crate::config::SNAPSHOT_MAGIC;
use std::fs;
use std::io;
use std::path::Path;

/// Write a snapshot payload to `path` as `[payload][magic][CRC32 BE]`.
pub fn write_snapshot(path: &Path, payload: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let crc = crc32fast::hash(payload);
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(payload);
    out.extend_from_slice(SNAPSHOT_MAGIC);
    out.extend_from_slice(&crc.to_be_bytes());

    // Atomic write: temp file in the same directory, then rename
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &out)?;
    fs::rename(&tmp_path, path)?;

    tracing::info!(
        path = %path.display(),
        bytes = payload.len(),
        crc = format_args!("{crc:#010x}"),
        "saved index snapshot"
    );
    Ok(())
}

/// Read a snapshot payload from `path`, verifying magic and CRC32.
pub fn read_snapshot(path: &Path) -> io::Result<Vec<u8>> {
    let raw = fs::read(path)?;
    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != SNAPSHOT_MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("snapshot {} has no valid footer", path.display()),
        ));
    }
    let payload = &raw[..raw.len() - 8];
    let stored_crc = u32::from_be_bytes([
        raw[raw.len() - 4],
        raw[raw.len() - 3],
        raw[raw.len() - 2],
        raw[raw.len() - 1],
    ]);
    let computed_crc = crc32fast::hash(payload);
    if computed_crc != stored_crc {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "snapshot CRC32 mismatch: expected {stored_crc:#010x}, got {computed_crc:#010x}: {}",
                path.display()
            ),
        ));
    }
    tracing::debug!(path = %path.display(), crc = format_args!("{stored_crc:#010x}"), "snapshot CRC32 verified");
    Ok(payload.to_vec())
}
