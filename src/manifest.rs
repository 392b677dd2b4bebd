//! Provisioning-manifest access.
//!
//! The manifest is a fixed-name resource bundled alongside the executable,
//! read fully as raw bytes and digested the same way as the code section.
//! A missing file is a reportable failure, not a crash, and reads are
//! capped so a replaced manifest cannot force an unbounded allocation.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, SealError};

/// Fixed resource name of the bundled signing/provisioning manifest.
pub const DEFAULT_MANIFEST_NAME: &str = "embedded.mobileprovision";

/// Cap on manifest size. Provisioning profiles are tens of kilobytes; the
/// cap leaves two orders of magnitude of headroom.
pub const DEFAULT_MAX_MANIFEST_BYTES: u64 = 4 * 1024 * 1024;

/// Resolve the default manifest location next to the running executable.
pub fn default_manifest_path() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().unwrap_or_else(|| Path::new("."));
    Ok(dir.join(DEFAULT_MANIFEST_NAME))
}

/// Read the manifest's raw bytes, enforcing the size cap.
pub fn read_manifest_bytes(path: &Path, limit: u64) -> Result<Vec<u8>> {
    let metadata = fs::metadata(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => SealError::ManifestMissing {
            path: path.to_path_buf(),
        },
        _ => SealError::Io(err),
    })?;
    let size = metadata.len();
    if size > limit {
        return Err(SealError::ManifestTooLarge { size, limit });
    }
    let bytes = fs::read(path)?;
    debug!(path = %path.display(), len = bytes.len(), "read provisioning manifest");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_reads_manifest_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_MANIFEST_NAME);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"provisioning payload").unwrap();

        let bytes = read_manifest_bytes(&path, DEFAULT_MAX_MANIFEST_BYTES).unwrap();
        assert_eq!(bytes, b"provisioning payload");
    }

    #[test]
    fn test_missing_manifest_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-there.mobileprovision");
        let err = read_manifest_bytes(&path, DEFAULT_MAX_MANIFEST_BYTES).unwrap_err();
        assert!(matches!(err, SealError::ManifestMissing { .. }));
    }

    #[test]
    fn test_oversized_manifest_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_MANIFEST_NAME);
        fs::write(&path, vec![0u8; 64]).unwrap();
        let err = read_manifest_bytes(&path, 16).unwrap_err();
        assert!(matches!(
            err,
            SealError::ManifestTooLarge { size: 64, limit: 16 }
        ));
    }
}
