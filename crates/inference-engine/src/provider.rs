//! Model artifact readiness, owned outside the engine.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// External collaborator that decides whether the artifact may be loaded.
///
/// Implementations may touch the filesystem; the engine calls them from a
/// blocking thread.
pub trait ModelProvider: Send + Sync {
    fn is_ready(&self) -> bool;
    fn resolve_path(&self) -> PathBuf;
}

/// Result of inspecting the artifact on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactStatus {
    Missing,
    TooSmall { size: u64, required: u64 },
    ChecksumMismatch { expected: String, actual: String },
    Ready { size: u64, sha256: Option<String> },
}

impl ArtifactStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ArtifactStatus::Ready { .. })
    }
}

#[derive(Debug, Clone)]
struct DigestCache {
    len: u64,
    modified: Option<SystemTime>,
    digest: String,
}

/// Provider backed by a single file under a model directory.
///
/// The artifact is ready when it exists, is at least 90% of the minimum
/// size, and matches the expected SHA-256 when one is configured.
#[derive(Debug)]
pub struct FileModelProvider {
    dir: PathBuf,
    file_name: String,
    min_size_bytes: u64,
    expected_sha256: Option<String>,
    cache: Mutex<Option<DigestCache>>,
    warned_unverified: AtomicBool,
}

impl FileModelProvider {
    pub fn new(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
            min_size_bytes: 0,
            expected_sha256: None,
            cache: Mutex::new(None),
            warned_unverified: AtomicBool::new(false),
        }
    }

    pub fn with_min_size(mut self, bytes: u64) -> Self {
        self.min_size_bytes = bytes;
        self
    }

    /// Require the artifact's SHA-256 to equal `hex_digest` (case-insensitive).
    /// Blank digests are ignored.
    pub fn with_expected_sha256(mut self, hex_digest: impl Into<String>) -> Self {
        let digest = hex_digest.into().trim().to_ascii_lowercase();
        self.expected_sha256 = (!digest.is_empty()).then_some(digest);
        self
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    pub fn artifact_size(&self) -> Option<u64> {
        fs::metadata(self.artifact_path()).ok().map(|meta| meta.len())
    }

    /// Remove the artifact. Returns whether a file was deleted.
    pub fn delete_artifact(&self) -> io::Result<bool> {
        *self.cache.lock() = None;
        match fs::remove_file(self.artifact_path()) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub fn check(&self) -> io::Result<ArtifactStatus> {
        let path = self.artifact_path();
        let meta = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Ok(ArtifactStatus::Missing),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(ArtifactStatus::Missing)
            }
            Err(err) => return Err(err),
        };

        let size = meta.len();
        let required = self.min_size_bytes.saturating_mul(9).div_ceil(10);
        if size < required {
            return Ok(ArtifactStatus::TooSmall { size, required });
        }

        let Some(expected) = self.expected_sha256.as_deref() else {
            if !self.warned_unverified.swap(true, Ordering::Relaxed) {
                warn!(path = %path.display(), "No expected SHA-256 configured; model integrity is not verified");
            }
            return Ok(ArtifactStatus::Ready { size, sha256: None });
        };

        let actual = self.digest(&path, size, meta.modified().ok())?;
        if actual != expected {
            return Ok(ArtifactStatus::ChecksumMismatch {
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(ArtifactStatus::Ready {
            size,
            sha256: Some(actual),
        })
    }

    fn digest(&self, path: &Path, len: u64, modified: Option<SystemTime>) -> io::Result<String> {
        if let Some(cached) = self.cache.lock().as_ref() {
            if cached.len == len && cached.modified == modified {
                return Ok(cached.digest.clone());
            }
        }

        debug!(path = %path.display(), len, "Hashing model artifact");
        let digest = sha256_file(path)?;
        *self.cache.lock() = Some(DigestCache {
            len,
            modified,
            digest: digest.clone(),
        });
        Ok(digest)
    }
}

impl ModelProvider for FileModelProvider {
    fn is_ready(&self) -> bool {
        match self.check() {
            Ok(status) => {
                if !status.is_ready() {
                    debug!(?status, "Model artifact not ready");
                }
                status.is_ready()
            }
            Err(err) => {
                warn!(error = %err, "Failed to inspect model artifact");
                false
            }
        }
    }

    fn resolve_path(&self) -> PathBuf {
        self.artifact_path()
    }
}

pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) {
        fs::write(dir.path().join(name), bytes).unwrap();
    }

    #[test]
    fn missing_file_is_not_ready() {
        let dir = TempDir::new().unwrap();
        let provider = FileModelProvider::new(dir.path(), "model.spdn");
        assert_eq!(provider.check().unwrap(), ArtifactStatus::Missing);
        assert!(!provider.is_ready());
        assert_eq!(provider.artifact_size(), None);
    }

    #[test]
    fn size_gate_allows_ten_percent_slack() {
        let dir = TempDir::new().unwrap();
        write(&dir, "model.spdn", &[0u8; 90]);
        let provider = FileModelProvider::new(dir.path(), "model.spdn").with_min_size(100);
        assert!(provider.is_ready());

        let strict = FileModelProvider::new(dir.path(), "model.spdn").with_min_size(101);
        assert!(matches!(
            strict.check().unwrap(),
            ArtifactStatus::TooSmall { size: 90, .. }
        ));
    }

    #[test]
    fn checksum_is_enforced_when_configured() {
        let dir = TempDir::new().unwrap();
        write(&dir, "model.spdn", b"abc");
        // sha256("abc")
        let good = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";

        let provider = FileModelProvider::new(dir.path(), "model.spdn").with_expected_sha256(good);
        assert_eq!(
            provider.check().unwrap(),
            ArtifactStatus::Ready {
                size: 3,
                sha256: Some(good.to_ascii_lowercase())
            }
        );

        let wrong = FileModelProvider::new(dir.path(), "model.spdn").with_expected_sha256("00");
        assert!(matches!(
            wrong.check().unwrap(),
            ArtifactStatus::ChecksumMismatch { .. }
        ));
        assert!(!wrong.is_ready());
    }

    #[test]
    fn blank_checksum_means_unverified() {
        let dir = TempDir::new().unwrap();
        write(&dir, "model.spdn", b"abc");
        let provider = FileModelProvider::new(dir.path(), "model.spdn").with_expected_sha256("  ");
        assert_eq!(
            provider.check().unwrap(),
            ArtifactStatus::Ready {
                size: 3,
                sha256: None
            }
        );
    }

    #[test]
    fn delete_removes_artifact_once() {
        let dir = TempDir::new().unwrap();
        write(&dir, "model.spdn", b"abc");
        let provider = FileModelProvider::new(dir.path(), "model.spdn");
        assert!(provider.delete_artifact().unwrap());
        assert!(!provider.delete_artifact().unwrap());
        assert!(!provider.is_ready());
    }
}
