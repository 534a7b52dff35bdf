//! Directory checksum used to detect an unclean shutdown.
//!
//! Not a cryptographic checksum — just a fast fingerprint over each SST/
//! manifest file's name and length, written to `<db>.checksum` on a clean
//! close and compared on open. A mismatch almost always means the process
//! was killed mid-write; `StoreConfig::skip_check` bypasses the check for
//! an operator who wants to open anyway and let RocksDB's own WAL replay
//! sort it out.

use std::fs;
use std::path::Path;

use crate::error::{StoreError, StoreResult};

fn fnv1a(bytes: &[u8], mut hash: u64) -> u64 {
    const PRIME: u64 = 0x0000_0100_0000_01B3;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Computes the directory fingerprint, sorted by filename for determinism.
pub fn fingerprint(dir: &Path) -> StoreResult<String> {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    if !dir.exists() {
        return Ok(format!("{OFFSET_BASIS:016x}"));
    }

    let mut entries: Vec<(String, u64)> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let len = entry.metadata().ok()?.len();
            Some((entry.file_name().to_string_lossy().into_owned(), len))
        })
        .collect();
    entries.sort();

    let mut hash = OFFSET_BASIS;
    for (name, len) in entries {
        hash = fnv1a(name.as_bytes(), hash);
        hash = fnv1a(&len.to_le_bytes(), hash);
    }
    Ok(format!("{hash:016x}"))
}

fn checksum_path(db_path: &Path) -> std::path::PathBuf {
    let mut path = db_path.as_os_str().to_owned();
    path.push(".checksum");
    std::path::PathBuf::from(path)
}

/// Verifies `db_path` against its recorded checksum, if one exists.
pub fn verify(db_path: &Path, skip_check: bool) -> StoreResult<()> {
    let marker = checksum_path(db_path);
    if !marker.exists() {
        return Ok(());
    }

    let expected = fs::read_to_string(&marker)?.trim().to_string();
    let found = fingerprint(db_path)?;

    if expected != found && !skip_check {
        return Err(StoreError::ChecksumMismatch {
            path: db_path.display().to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

/// Records the current fingerprint of `db_path` for the next open.
pub fn record(db_path: &Path) -> StoreResult<()> {
    let fingerprint = fingerprint(db_path)?;
    fs::write(checksum_path(db_path), fingerprint)?;
    Ok(())
}
