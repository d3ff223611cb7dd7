//! Staging area: one quarantined temp file per fetch attempt.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Name of the file inside every staging directory.
pub const STAGED_FILE_NAME: &str = "staged_image.jpg";

const DIR_PREFIX: &str = "image-harvest-";

/// Hands out [`StagedFile`]s, under `root` or the system temp dir.
#[derive(Debug, Clone, Default)]
pub struct StagingArea {
    root: Option<PathBuf>,
}

impl StagingArea {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// Create a fresh directory holding an empty staging file.
    pub fn acquire(&self) -> io::Result<StagedFile> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix(DIR_PREFIX);
            b
        };
        let dir = match &self.root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        let path = dir.path().join(STAGED_FILE_NAME);
        fs::File::create(&path)?;

        tracing::trace!("Acquired staging file {}", path.display());
        Ok(StagedFile {
            dir: Some(dir),
            path,
        })
    }
}

/// A temp file whose directory is removed when the guard drops.
///
/// Either [`promote`](StagedFile::promote) moves the file out first, or the
/// drop deletes it with the directory. Cleanup failures are logged only.
#[derive(Debug)]
pub struct StagedFile {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that is removed on drop.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    /// Current size of the staged file in bytes.
    pub fn size(&self) -> io::Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    /// Move the staged file to `dest`, consuming the guard.
    ///
    /// `dest` must be a path the caller owns, such as one reserved with
    /// [`claim_destination`](crate::naming::claim_destination); its contents
    /// are replaced. Uses a rename when source and destination share a
    /// filesystem and falls back to a copy otherwise.
    pub fn promote(self, dest: &Path) -> io::Result<PathBuf> {
        if let Err(rename_err) = fs::rename(&self.path, dest) {
            tracing::debug!(
                "Rename into {} failed ({rename_err}), copying instead",
                dest.display()
            );
            self.copy_to(dest)?;
        }
        Ok(dest.to_path_buf())
    }

    /// Once the copy succeeds the promotion is done; the staged original
    /// goes with the directory when the guard drops.
    fn copy_to(&self, dest: &Path) -> io::Result<()> {
        if let Err(copy_err) = fs::copy(&self.path, dest) {
            // Never leave a truncated destination behind.
            let _ = fs::remove_file(dest);
            return Err(copy_err);
        }
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let shown = dir.path().display().to_string();
            if let Err(e) = dir.close() {
                tracing::error!("Error cleaning staging directory {shown}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_dropped_file_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let area = StagingArea::new(Some(root.path().to_path_buf()));

        let staged = area.acquire().unwrap();
        let dir = staged.dir().unwrap().to_path_buf();
        assert!(staged.path().exists());
        assert_eq!(staged.path().file_name().unwrap(), STAGED_FILE_NAME);

        fs::OpenOptions::new()
            .write(true)
            .open(staged.path())
            .unwrap()
            .write_all(b"payload")
            .unwrap();
        assert_eq!(staged.size().unwrap(), 7);

        drop(staged);
        assert!(!dir.exists());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_promote_moves_file_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let area = StagingArea::new(Some(root.path().to_path_buf()));

        let staged = area.acquire().unwrap();
        fs::write(staged.path(), b"jpeg bytes").unwrap();
        let dir = staged.dir().unwrap().to_path_buf();

        let dest = out.path().join("kept.jpg");
        let promoted = staged.promote(&dest).unwrap();

        assert_eq!(promoted, dest);
        assert_eq!(fs::read(&dest).unwrap(), b"jpeg bytes");
        assert!(!dir.exists());
    }

    #[test]
    fn test_copy_promotion_keeps_dest_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let area = StagingArea::new(Some(root.path().to_path_buf()));

        let staged = area.acquire().unwrap();
        fs::write(staged.path(), b"copied bytes").unwrap();
        let dir = staged.dir().unwrap().to_path_buf();

        let dest = out.path().join("kept.jpg");
        fs::File::create(&dest).unwrap();
        staged.copy_to(&dest).unwrap();
        drop(staged);

        assert_eq!(fs::read(&dest).unwrap(), b"copied bytes");
        assert!(!dir.exists());
    }

    #[test]
    fn test_failed_promotion_still_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let area = StagingArea::new(Some(root.path().to_path_buf()));

        let staged = area.acquire().unwrap();
        let dir = staged.dir().unwrap().to_path_buf();

        let dest = root.path().join("missing-dir").join("x.jpg");
        assert!(staged.promote(&dest).is_err());
        assert!(!dir.exists());
        assert!(!dest.exists());
    }

    #[test]
    fn test_each_acquire_gets_its_own_directory() {
        let root = tempfile::tempdir().unwrap();
        let area = StagingArea::new(Some(root.path().to_path_buf()));

        let a = area.acquire().unwrap();
        let b = area.acquire().unwrap();
        assert_ne!(a.dir(), b.dir());
    }
}
