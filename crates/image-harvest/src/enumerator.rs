//! Candidate enumeration over the loaded result containers.

use crate::session::DownloadSession;
use crate::types::{Candidate, HarvestError};

/// Walks result containers in page order and loads more by scrolling.
///
/// The cursor only moves forward, so a container is handed out at most
/// once per run even though the page keeps growing underneath it.
#[derive(Debug, Clone)]
pub struct CandidateEnumerator {
    cursor: usize,
    scrolls: u32,
    scroll_budget: u32,
}

impl CandidateEnumerator {
    pub fn new(scroll_budget: u32) -> Self {
        Self {
            cursor: 0,
            scrolls: 0,
            scroll_budget,
        }
    }

    /// Containers past the cursor, in page order. Advances the cursor.
    pub async fn next_batch(
        &mut self,
        session: &mut DownloadSession,
    ) -> Result<Vec<Candidate>, HarvestError> {
        let loaded = session.result_count().await?;
        tracing::debug!("Found {loaded} image containers");
        Ok(self.take_through(loaded))
    }

    fn take_through(&mut self, loaded: usize) -> Vec<Candidate> {
        if loaded <= self.cursor {
            return Vec::new();
        }
        let batch = (self.cursor..loaded).map(|index| Candidate { index }).collect();
        self.cursor = loaded;
        batch
    }

    /// Scroll for more results. Returns `false` once the budget is spent.
    pub async fn load_more(&mut self, session: &mut DownloadSession) -> Result<bool, HarvestError> {
        if !self.has_budget() {
            tracing::info!("Scroll budget of {} exhausted", self.scroll_budget);
            return Ok(false);
        }
        self.scrolls += 1;
        tracing::debug!("Scrolling for more results ({}/{})", self.scrolls, self.scroll_budget);
        session.scroll_to_bottom().await?;
        Ok(true)
    }

    pub fn has_budget(&self) -> bool {
        self.scrolls < self.scroll_budget
    }

    pub fn scrolls(&self) -> u32 {
        self.scrolls
    }

    pub fn visited(&self) -> usize {
        self.cursor
    }
}
