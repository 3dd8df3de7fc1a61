// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Copy integrity: SHA-256 checks on files carried into an item's output.

use std::path::Path;

use folio_core::error::{FolioError, Result};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub fn hash_file(path: &Path) -> Result<String> {
    Ok(hash_bytes(&std::fs::read(path)?))
}

/// Verify that the file at `path` matches the expected SHA-256 hex digest.
pub fn verify_file(path: &Path, expected_hex: &str) -> Result<()> {
    let actual = hash_file(path)?;
    if actual == expected_hex {
        Ok(())
    } else {
        Err(FolioError::IntegrityMismatch {
            path: path.to_path_buf(),
            expected: expected_hex.to_owned(),
            actual,
        })
    }
}

/// Copy `source` to `dest` byte for byte and confirm the copy hashes the same
/// as the original. Returns the digest.
pub fn copy_verified(source: &Path, dest: &Path) -> Result<String> {
    let expected = hash_file(source)?;
    std::fs::copy(source, dest)?;
    verify_file(dest, &expected)?;
    debug!(source = %source.display(), dest = %dest.display(), sha256 = %expected, "copied");
    Ok(expected)
}
