//! Progress reporting out of a running harvest.

use std::path::Path;

/// Receives an event every time an image is saved.
pub trait ProgressSink: Send + Sync {
    fn image_saved(&self, saved: usize, target: usize, path: &Path);
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn image_saved(&self, _saved: usize, _target: usize, _path: &Path) {}
}
