//! Atomic writes for on-disk artifacts.
//!
//! Every file is first written next to its target with a `.tmp` extension and
//! then renamed over it, so a reader never sees a partially written file.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace `path` with `data` atomically.
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let temp = temp_path(path);
    fs::write(&temp, data).await?;
    fs::rename(&temp, path).await
}

/// Replace several files as one unit.
///
/// All temporary files are written before the first rename, so a failure
/// while serializing or writing leaves every target untouched. Files that
/// belong together carry a shared generation stamp; a crash between renames
/// is detected on load by a stamp mismatch.
pub(crate) async fn write_all_atomic(files: &[(PathBuf, Vec<u8>)]) -> io::Result<()> {
    let mut staged = Vec::with_capacity(files.len());
    for (path, data) in files {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp = temp_path(path);
        if let Err(e) = fs::write(&temp, data).await {
            for (temp, _) in &staged {
                let _ = fs::remove_file(temp).await;
            }
            return Err(e);
        }
        staged.push((temp, path));
    }

    for (temp, path) in staged {
        fs::rename(&temp, path).await?;
    }
    Ok(())
}

/// Read a file, mapping "not found" to `None`.
pub(crate) async fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Stamp shared by artifacts written together.
pub(crate) fn new_generation() -> String {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .map(|nanos| nanos.to_string())
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_atomic_creates_parents_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/artifact.json");

        write_atomic(&path, b"{}").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
        assert!(!dir.path().join("nested/artifact.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_all_atomic_replaces_every_file() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        std::fs::write(&a, "old").unwrap();

        write_all_atomic(&[(a.clone(), b"new-a".to_vec()), (b.clone(), b"new-b".to_vec())])
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&a).unwrap(), "new-a");
        assert_eq!(std::fs::read_to_string(&b).unwrap(), "new-b");
    }

    #[tokio::test]
    async fn test_read_optional_missing() {
        let dir = TempDir::new().unwrap();
        assert!(read_optional(&dir.path().join("absent")).await.unwrap().is_none());
    }
}
