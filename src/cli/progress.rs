//! Progress display for a polling run
//!
//! Completed endpoints arrive from the scheduler over an unbounded channel
//! and advance an indicatif bar on stderr. When stderr is not a terminal, or
//! the display is disabled, events are only logged.
//!
//! # Examples
//!
//! ```rust,no_run
//! use share_stats::cli::ProgressDisplay;
//!
//! # async fn example() {
//! let (display, sender) = ProgressDisplay::start(12, true);
//! // hand `sender` to Scheduler::with_progress and run it
//! drop(sender);
//! display.finish().await;
//! # }
//! ```

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::app::models::PollState;
use crate::app::scheduler::EndpointDone;

/// Counts kept while the run is in flight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressTally {
    pub endpoints: usize,
    pub shares: usize,
    pub failed_endpoints: usize,
}

impl ProgressTally {
    fn record(&mut self, event: &EndpointDone) {
        self.endpoints += 1;
        self.shares += event.shares;
        if event.state == PollState::Failed {
            self.failed_endpoints += 1;
        }
    }
}

/// Progress bar fed by scheduler events
pub struct ProgressDisplay {
    bar: Option<ProgressBar>,
    task: JoinHandle<ProgressTally>,
}

impl ProgressDisplay {
    /// Start displaying progress for `total` endpoints
    ///
    /// Returns the display and the sender to hand to the scheduler. The
    /// display finishes once every sender is dropped.
    pub fn start(total: usize, enabled: bool) -> (Self, mpsc::UnboundedSender<EndpointDone>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<EndpointDone>();
        let bar = (enabled && atty::is(atty::Stream::Stderr)).then(|| Self::create_bar(total));

        let task_bar = bar.clone();
        let task = tokio::spawn(async move {
            let mut tally = ProgressTally::default();
            while let Some(event) = rx.recv().await {
                tally.record(&event);
                debug!(
                    "Endpoint {} done: {} share(s), {:?}",
                    event.url, event.shares, event.state
                );
                if let Some(bar) = &task_bar {
                    bar.set_message(event.url.clone());
                    bar.inc(1);
                }
            }
            tally
        });

        (Self { bar, task }, tx)
    }

    fn create_bar(total: usize) -> ProgressBar {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    }

    /// Wait for the last event and clear the bar
    pub async fn finish(self) -> ProgressTally {
        let tally = self.task.await.unwrap_or_default();
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
        tally
    }
}
