//! Run statistics

use std::time::Duration;

use serde::Serialize;

use crate::app::models::{Endpoint, PollState};

/// Outcome counts of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub endpoints: usize,
    pub shares: usize,
    pub succeeded: usize,
    pub warned: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration: Duration,
}

impl RunSummary {
    pub fn from_endpoints(endpoints: &[Endpoint], duration: Duration) -> Self {
        let mut summary = Self {
            endpoints: endpoints.len(),
            duration,
            ..Default::default()
        };

        for share in endpoints.iter().flat_map(|e| e.shares.iter()) {
            summary.shares += 1;
            match share.poll_state {
                PollState::Succeeded => summary.succeeded += 1,
                PollState::SucceededWithWarning => summary.warned += 1,
                PollState::Failed => summary.failed += 1,
                PollState::Skipped(_) | PollState::Pending | PollState::Polling => {
                    summary.skipped += 1
                }
            }
        }

        summary
    }

    /// Whether any share failed its poll
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
