//! Upload storage
//!
//! Every upload lands in its own uniquely named file inside the upload
//! directory. The file lives as long as its [`StoredUpload`]; dropping the
//! handle deletes it unless retention is enabled.

use std::fs::File;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tempfile::TempPath;

use crate::utils::sanitize_upload_filename;

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    retain: bool,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, retain: bool) -> Self {
        Self {
            dir: dir.into(),
            retain,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if it is missing. Safe to call repeatedly.
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create upload directory {:?}", self.dir))
    }

    /// Copy `source` into a fresh file named after `declared_name`.
    ///
    /// The copy runs on the blocking pool. On any failure the partially
    /// written file is removed before the error is returned.
    pub async fn persist(&self, source: &Path, declared_name: &str) -> Result<StoredUpload> {
        let store = self.clone();
        let source = source.to_path_buf();
        let declared_name = declared_name.to_string();
        tokio::task::spawn_blocking(move || store.persist_blocking(&source, &declared_name))
            .await
            .context("Upload copy task panicked")?
    }

    fn persist_blocking(&self, source: &Path, declared_name: &str) -> Result<StoredUpload> {
        self.ensure_dir()?;
        let dir = std::fs::canonicalize(&self.dir)
            .with_context(|| format!("Failed to resolve upload directory {:?}", self.dir))?;

        let suffix = format!("-{}", sanitize_upload_filename(declared_name));
        let mut dest = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&dir)
            .context("Failed to create upload file")?;

        let mut src = File::open(source)
            .with_context(|| format!("Failed to open multipart temp file {:?}", source))?;
        let size = std::io::copy(&mut src, dest.as_file_mut()).context("Failed to copy upload")?;
        dest.as_file().sync_all().context("Failed to flush upload")?;

        // closes the handle; the path still deletes on drop
        let temp_path = dest.into_temp_path();
        let file = if self.retain {
            let path = temp_path.keep().context("Failed to retain upload")?;
            StoredFile::Retained(path)
        } else {
            StoredFile::Scoped(temp_path)
        };

        Ok(StoredUpload {
            file,
            declared_name: declared_name.to_string(),
            size,
        })
    }
}

#[derive(Debug)]
enum StoredFile {
    Scoped(TempPath),
    Retained(PathBuf),
}

/// An upload written to disk
#[derive(Debug)]
pub struct StoredUpload {
    file: StoredFile,
    declared_name: String,
    size: u64,
}

impl StoredUpload {
    /// Absolute path of the stored copy
    pub fn path(&self) -> &Path {
        match &self.file {
            StoredFile::Scoped(p) => &**p,
            StoredFile::Retained(p) => p.as_path(),
        }
    }

    pub fn declared_name(&self) -> &str {
        &self.declared_name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn file_uri(&self) -> String {
        format!("file://{}", self.path().display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_file(dir: &Path, bytes: &[u8]) -> PathBuf {
        let path = dir.join("incoming.bin");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn test_persist_creates_dir_and_copies() {
        let scratch = tempfile::tempdir().unwrap();
        let store = UploadStore::new(scratch.path().join("nested/uploads"), false);
        let src = source_file(scratch.path(), b"not really a video");

        let stored = store.persist(&src, "clip.mp4").await.unwrap();
        assert_eq!(stored.size(), 18);
        assert_eq!(stored.declared_name(), "clip.mp4");
        assert!(stored.path().is_absolute());
        assert!(stored.path().starts_with(std::fs::canonicalize(store.dir()).unwrap()));
        assert_eq!(std::fs::read(stored.path()).unwrap(), b"not really a video");
        assert!(stored.file_uri().starts_with("file:///"));
        assert!(stored.file_uri().ends_with("-clip.mp4"));
    }

    #[tokio::test]
    async fn test_scoped_upload_removed_on_drop() {
        let scratch = tempfile::tempdir().unwrap();
        let store = UploadStore::new(scratch.path().join("uploads"), false);
        let src = source_file(scratch.path(), b"abc");

        let stored = store.persist(&src, "clip.mp4").await.unwrap();
        let path = stored.path().to_path_buf();
        assert!(path.exists());
        drop(stored);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_retained_upload_survives_drop() {
        let scratch = tempfile::tempdir().unwrap();
        let store = UploadStore::new(scratch.path().join("uploads"), true);
        let src = source_file(scratch.path(), b"abc");

        let stored = store.persist(&src, "clip.mp4").await.unwrap();
        let path = stored.path().to_path_buf();
        drop(stored);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_same_name_uploads_do_not_collide() {
        let scratch = tempfile::tempdir().unwrap();
        let store = UploadStore::new(scratch.path().join("uploads"), false);
        let first_src = scratch.path().join("first.bin");
        let second_src = scratch.path().join("second.bin");
        std::fs::write(&first_src, b"first").unwrap();
        std::fs::write(&second_src, b"second").unwrap();

        let (first, second) = tokio::join!(
            store.persist(&first_src, "same.mp4"),
            store.persist(&second_src, "same.mp4"),
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_ne!(first.path(), second.path());
        assert_eq!(std::fs::read(first.path()).unwrap(), b"first");
        assert_eq!(std::fs::read(second.path()).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_missing_source_leaves_nothing_behind() {
        let scratch = tempfile::tempdir().unwrap();
        let store = UploadStore::new(scratch.path().join("uploads"), false);

        let result = store.persist(&scratch.path().join("gone.bin"), "clip.mp4").await;
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 0);
    }
}
