use std::path::Path;

use sha1::{Digest, Sha1};
use sha2::Sha512;

use crate::core::error::{LauncherError, LauncherResult};

/// Hashes an artifact is expected to match. Empty means "unverifiable".
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpectedHashes<'a> {
    pub sha1: Option<&'a str>,
    pub sha512: Option<&'a str>,
}

impl<'a> ExpectedHashes<'a> {
    pub fn new(sha1: Option<&'a str>, sha512: Option<&'a str>) -> Self {
        Self {
            sha1: sha1.filter(|h| !h.trim().is_empty()),
            sha512: sha512.filter(|h| !h.trim().is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sha1.is_none() && self.sha512.is_none()
    }
}

pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn sha512_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-1 wins when both are present; SHA-512 is only consulted without it.
pub fn verify_bytes(bytes: &[u8], expected: &ExpectedHashes<'_>, subject: &str) -> LauncherResult<()> {
    let (algorithm, expected_hex, actual) = match (expected.sha1, expected.sha512) {
        (Some(sha1), _) => ("SHA-1", sha1, sha1_hex(bytes)),
        (None, Some(sha512)) => ("SHA-512", sha512, sha512_hex(bytes)),
        (None, None) => return Ok(()),
    };

    if actual.eq_ignore_ascii_case(expected_hex) {
        Ok(())
    } else {
        Err(LauncherError::HashMismatch {
            subject: subject.to_string(),
            algorithm,
            expected: expected_hex.to_string(),
            actual,
        })
    }
}

/// Hash a file on disk with the same precedence as `verify_bytes`.
///
/// `Ok(None)` when nothing was expected; IO failures are returned as errors
/// so callers can tell "could not check" apart from "mismatch".
pub async fn file_matches(path: &Path, expected: &ExpectedHashes<'_>) -> LauncherResult<Option<bool>> {
    if expected.is_empty() {
        return Ok(None);
    }

    let bytes = tokio::fs::read(path).await.map_err(LauncherError::io(path))?;
    let subject = path.display().to_string();
    match verify_bytes(&bytes, expected, &subject) {
        Ok(()) => Ok(Some(true)),
        Err(LauncherError::HashMismatch { .. }) => Ok(Some(false)),
        Err(other) => Err(other),
    }
}
