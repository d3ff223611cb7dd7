//! Image fetcher: one candidate in, one [`FetchOutcome`] out.

use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::config::HarvestConfig;
use crate::naming::claim_destination;
use crate::session::DownloadSession;
use crate::staging::{StagedFile, StagingArea};
use crate::types::{Candidate, FetchOutcome, HarvestError};

/// Downloads and validates the image behind a candidate.
pub struct ImageFetcher {
    client: reqwest::Client,
    staging: StagingArea,
    request_timeout: Duration,
}

impl ImageFetcher {
    pub fn new(config: &HarvestConfig) -> Result<Self, HarvestError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            staging: StagingArea::new(config.staging_root.clone()),
            request_timeout: config.request_timeout,
        })
    }

    /// Fetch one candidate. Never fails: every problem becomes `Skipped`.
    pub async fn fetch(
        &self,
        session: &mut DownloadSession,
        candidate: &Candidate,
        job: &FetchJob<'_>,
    ) -> FetchOutcome {
        match self.try_fetch(session, candidate, job).await {
            Ok(outcome) => {
                match &outcome {
                    FetchOutcome::Saved { path, bytes } => tracing::debug!(
                        "Candidate {} saved to {} ({:.1}KB)",
                        candidate.index,
                        path.display(),
                        *bytes as f64 / 1024.0
                    ),
                    FetchOutcome::Rejected(reason) | FetchOutcome::Skipped(reason) => {
                        tracing::debug!("Candidate {} not kept: {reason}", candidate.index)
                    }
                }
                outcome
            }
            Err(HarvestError::CandidateUnusable(reason)) => {
                tracing::debug!("Candidate {} skipped: {reason}", candidate.index);
                FetchOutcome::Skipped(reason)
            }
            Err(e) => {
                tracing::error!("Error processing candidate {}: {e}", candidate.index);
                FetchOutcome::Skipped(e.to_string())
            }
        }
    }

    async fn try_fetch(
        &self,
        session: &mut DownloadSession,
        candidate: &Candidate,
        job: &FetchJob<'_>,
    ) -> Result<FetchOutcome, HarvestError> {
        session.open_candidate(candidate).await?;

        let src = match session.high_res_source().await {
            Ok(src) => src,
            Err(e) if e.is_timeout() => {
                return Err(HarvestError::CandidateUnusable("no high-res element".to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let Some(url) = src.as_deref().and_then(network_url) else {
            return Err(HarvestError::CandidateUnusable("invalid url".to_string()));
        };

        let staged = self.staging.acquire()?;
        self.download_into(&url, &staged).await?;

        let bytes = staged.size()?;
        if bytes < job.min_size_bytes {
            tracing::debug!(
                "Discarding {:.1}KB image below {:.1}KB minimum",
                bytes as f64 / 1024.0,
                job.min_size_bytes as f64 / 1024.0
            );
            return Ok(FetchOutcome::Rejected("too small".to_string()));
        }

        let dest = claim_destination(job.dest_dir, job.query, job.index)?;
        match staged.promote(&dest) {
            Ok(path) => Ok(FetchOutcome::Saved { path, bytes }),
            Err(e) => {
                match std::fs::remove_file(&dest) {
                    Ok(()) => {}
                    Err(gone) if gone.kind() == std::io::ErrorKind::NotFound => {}
                    Err(remove_err) => {
                        tracing::warn!("Could not release {}: {remove_err}", dest.display())
                    }
                }
                Err(e.into())
            }
        }
    }

    async fn download_into(&self, url: &url::Url, staged: &StagedFile) -> Result<(), HarvestError> {
        let mut response = self
            .client
            .get(url.as_str())
            .timeout(self.request_timeout)
            .send()
            .await?
            .error_for_status()?;

        let mut file = tokio::fs::File::create(staged.path()).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

/// Per-attempt context handed to [`ImageFetcher::fetch`].
#[derive(Debug, Clone, Copy)]
pub struct FetchJob<'a> {
    pub query: &'a str,
    pub dest_dir: &'a Path,
    pub min_size_bytes: u64,
    /// 1-based number the file gets if it is saved.
    pub index: usize,
}

/// Parse `src` as an absolute http(s) URL.
pub fn network_url(src: &str) -> Option<url::Url> {
    let parsed = url::Url::parse(src.trim()).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host().is_some() => Some(parsed),
        _ => None,
    }
}
