//! Harvest controller: the acquisition loop and its teardown.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::HarvestConfig;
use crate::driver::BrowserLauncher;
use crate::enumerator::CandidateEnumerator;
use crate::fetcher::{FetchJob, ImageFetcher};
use crate::naming::query_dir;
use crate::progress::ProgressSink;
use crate::session::DownloadSession;
use crate::types::{FetchOutcome, HarvestError, HarvestRequest, HarvestResult, HarvestStatus};

/// Phases of one harvest, logged as the loop moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestState {
    Initializing,
    Searching,
    Collecting,
    Scrolling,
    Finalizing,
    Completed,
    Failed,
}

/// Why the collecting loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    TargetReached,
    BudgetExhausted,
    Cancelled,
}

/// Counters accumulated across the run; survives a failure.
#[derive(Debug, Default)]
struct Tally {
    saved_files: Vec<PathBuf>,
    attempted: usize,
}

impl Tally {
    fn saved(&self) -> usize {
        self.saved_files.len()
    }

    fn into_result(
        self,
        request: &HarvestRequest,
        cancelled: bool,
        error: Option<String>,
    ) -> HarvestResult {
        HarvestResult {
            status: if error.is_some() {
                HarvestStatus::Error
            } else {
                HarvestStatus::Success
            },
            saved_count: self.saved_files.len(),
            requested: request.target_count,
            saved_files: self.saved_files,
            attempted_count: self.attempted,
            cancelled,
            error,
        }
    }
}

fn enter(state: &mut HarvestState, next: HarvestState) {
    tracing::debug!("Harvest state {:?} -> {:?}", state, next);
    *state = next;
}

/// Runs harvests against a browser launcher.
pub struct Harvester {
    config: HarvestConfig,
    launcher: Arc<dyn BrowserLauncher>,
}

impl Harvester {
    pub fn new(config: HarvestConfig, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self { config, launcher }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Run one harvest to completion. Always returns a result, never fails.
    ///
    /// `cancel` is checked between candidates; once set, the run stops and
    /// reports what it already saved as a success.
    pub async fn run(
        &self,
        request: &HarvestRequest,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> HarvestResult {
        let span = tracing::info_span!(
            "harvest",
            query = %request.query,
            target = request.target_count
        );
        self.run_in_span(request, cancel, progress)
            .instrument(span)
            .await
    }

    async fn run_in_span(
        &self,
        request: &HarvestRequest,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> HarvestResult {
        tracing::info!(
            "Starting download for query: {} ({} images, min {} bytes, type {})",
            request.query,
            request.target_count,
            request.min_size_bytes,
            request.image_kind
        );

        let mut state = HarvestState::Initializing;
        let mut tally = Tally::default();
        let mut session = None;

        let outcome = self
            .drive(request, cancel, progress, &mut state, &mut session, &mut tally)
            .await;

        enter(&mut state, HarvestState::Finalizing);
        if let Some(session) = session.take() {
            session.close().await;
        }

        match outcome {
            Ok(stop) => {
                enter(&mut state, HarvestState::Completed);
                tracing::info!(
                    "Download complete ({stop:?}). Got {}/{} images in {} attempts",
                    tally.saved(),
                    request.target_count,
                    tally.attempted
                );
                tally.into_result(request, stop == Stop::Cancelled, None)
            }
            Err(e) => {
                enter(&mut state, HarvestState::Failed);
                tracing::error!(
                    "Harvest failed after {} saved images: {e}",
                    tally.saved()
                );
                tally.into_result(request, false, Some(e.to_string()))
            }
        }
    }

    async fn drive(
        &self,
        request: &HarvestRequest,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
        state: &mut HarvestState,
        slot: &mut Option<DownloadSession>,
        tally: &mut Tally,
    ) -> Result<Stop, HarvestError> {
        let dest_dir = query_dir(&self.config.output_root, &request.query);
        tokio::fs::create_dir_all(&dest_dir).await?;
        let dest_dir = tokio::fs::canonicalize(&dest_dir).await?;

        let fetcher = ImageFetcher::new(&self.config)?;
        let session = slot.insert(DownloadSession::open(self.launcher.as_ref(), &self.config).await?);

        enter(state, HarvestState::Searching);
        session.search(&request.query).await?;
        session.apply_filter(request.image_kind).await;

        let mut enumerator = CandidateEnumerator::new(self.config.scroll_budget);
        loop {
            enter(state, HarvestState::Collecting);
            let batch = enumerator.next_batch(session).await?;

            for candidate in batch {
                if tally.saved() >= request.target_count {
                    break;
                }
                if cancel.is_cancelled() {
                    tracing::info!("Stop requested, finishing with {} images", tally.saved());
                    return Ok(Stop::Cancelled);
                }

                tally.attempted += 1;
                let job = FetchJob {
                    query: &request.query,
                    dest_dir: &dest_dir,
                    min_size_bytes: request.min_size_bytes,
                    index: tally.saved() + 1,
                };
                if let FetchOutcome::Saved { path, .. } = fetcher.fetch(session, &candidate, &job).await {
                    tally.saved_files.push(path);
                    tracing::info!("Downloaded image {}/{}", tally.saved(), request.target_count);
                    if let Some(path) = tally.saved_files.last() {
                        progress.image_saved(tally.saved(), request.target_count, path);
                    }
                }
            }

            if tally.saved() >= request.target_count {
                return Ok(Stop::TargetReached);
            }
            if cancel.is_cancelled() {
                tracing::info!("Stop requested, finishing with {} images", tally.saved());
                return Ok(Stop::Cancelled);
            }

            enter(state, HarvestState::Scrolling);
            if !enumerator.load_more(session).await? {
                return Ok(Stop::BudgetExhausted);
            }
        }
    }
}
