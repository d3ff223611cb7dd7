//! Core data types for a harvest run and its outcome.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::driver::DriverError;

/// Number of bytes in one KiB, the unit callers use for `min_size`.
pub const KIB: u64 = 1024;

/// Image type filter offered by the portal's search tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Photo,
    Clipart,
    Lineart,
    Gif,
    Transparent,
    All,
}

impl ImageKind {
    /// Every kind, in the order they are advertised to callers.
    pub const ALL: [ImageKind; 6] = [
        ImageKind::Photo,
        ImageKind::Clipart,
        ImageKind::Lineart,
        ImageKind::Gif,
        ImageKind::Transparent,
        ImageKind::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Photo => "photo",
            ImageKind::Clipart => "clipart",
            ImageKind::Lineart => "lineart",
            ImageKind::Gif => "gif",
            ImageKind::Transparent => "transparent",
            ImageKind::All => "all",
        }
    }

    /// Whether a type filter has to be applied for this kind.
    pub fn is_filtered(&self) -> bool {
        !matches!(self, ImageKind::All)
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageKind {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ImageKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| {
                HarvestError::InvalidRequest(format!(
                    "unknown image type '{s}', expected one of: photo, clipart, lineart, gif, transparent, all"
                ))
            })
    }
}

/// Parameters of one harvest. Immutable for the duration of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestRequest {
    pub query: String,
    pub target_count: usize,
    pub min_size_bytes: u64,
    pub image_kind: ImageKind,
}

impl HarvestRequest {
    /// Build a request, rejecting an empty query or a zero target.
    pub fn new(
        query: impl Into<String>,
        target_count: usize,
        min_size_bytes: u64,
        image_kind: ImageKind,
    ) -> Result<Self, HarvestError> {
        let query = query.into().trim().to_string();
        if query.is_empty() {
            return Err(HarvestError::InvalidRequest(
                "query must not be empty".to_string(),
            ));
        }
        if target_count == 0 {
            return Err(HarvestError::InvalidRequest(
                "target count must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            query,
            target_count,
            min_size_bytes,
            image_kind,
        })
    }
}

/// A result container on the current page, addressed by position.
///
/// Positions are only meaningful for the page state they were read from;
/// the driver re-resolves them on every use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub index: usize,
}

/// What happened to a single candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Saved { path: PathBuf, bytes: u64 },
    Rejected(String),
    Skipped(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarvestStatus {
    Success,
    Error,
}

/// Summary of one harvest, produced exactly once on every exit path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestResult {
    pub status: HarvestStatus,
    #[serde(rename = "downloaded")]
    pub saved_count: usize,
    pub requested: usize,
    #[serde(rename = "files")]
    pub saved_files: Vec<PathBuf>,
    #[serde(rename = "attempts")]
    pub attempted_count: usize,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HarvestResult {
    pub fn is_success(&self) -> bool {
        self.status == HarvestStatus::Success
    }
}

/// Errors that can occur while harvesting.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Session failure: {0}")]
    Session(String),

    #[error("Type filter unavailable: {0}")]
    FilterUnavailable(String),

    /// A single result that cannot yield an image. Absorbed by the fetcher.
    #[error("Candidate unusable: {0}")]
    CandidateUnusable(String),

    #[error("Browser error: {0}")]
    Driver(#[from] DriverError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_kind_parse_is_case_insensitive() {
        assert_eq!("Photo".parse::<ImageKind>().unwrap(), ImageKind::Photo);
        assert_eq!(" GIF ".parse::<ImageKind>().unwrap(), ImageKind::Gif);
        assert_eq!("all".parse::<ImageKind>().unwrap(), ImageKind::All);
        assert!("panorama".parse::<ImageKind>().is_err());
    }

    #[test]
    fn test_request_validation() {
        assert!(HarvestRequest::new("  ", 3, 0, ImageKind::All).is_err());
        assert!(HarvestRequest::new("cats", 0, 0, ImageKind::All).is_err());
        let req = HarvestRequest::new(" red fox ", 3, 10, ImageKind::Photo).unwrap();
        assert_eq!(req.query, "red fox");
    }

    #[test]
    fn test_result_serializes_with_wire_keys() {
        let result = HarvestResult {
            status: HarvestStatus::Success,
            saved_count: 1,
            requested: 2,
            saved_files: vec![PathBuf::from("/tmp/a.jpg")],
            attempted_count: 4,
            cancelled: false,
            error: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["downloaded"], 1);
        assert_eq!(value["attempts"], 4);
        assert_eq!(value["files"][0], "/tmp/a.jpg");
        assert!(value.get("error").is_none());
        assert!(value.get("cancelled").is_none());
    }
}
