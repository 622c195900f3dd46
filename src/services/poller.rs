use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::interfaces::scheduler::ScheduledJob;
use crate::scheduler::Scheduler;
use crate::services::fetcher::MessageFetcher;

struct PollJob {
    fetcher: MessageFetcher,
    interval: Duration,
}

#[async_trait]
impl ScheduledJob for PollJob {
    fn name(&self) -> &str {
        "message_poll"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<()> {
        let run_id = self.fetcher.run();
        debug!(?run_id, in_flight = self.fetcher.in_flight(), "poll tick");
        Ok(())
    }
}

/// Fallback trigger for hosts that cannot receive push notifications.
/// Every tick starts a new run whether or not earlier runs have finished.
pub struct PollScheduler {
    fetcher: MessageFetcher,
    scheduler: Option<Scheduler>,
}

impl PollScheduler {
    pub fn new(fetcher: MessageFetcher) -> Self {
        Self {
            fetcher,
            scheduler: None,
        }
    }

    /// Arm the timer. Re-arming replaces the previous interval.
    pub fn start(&mut self, interval: Duration) {
        warn!(
            interval_ms = interval.as_millis() as u64,
            "starting message fetch polling; not intended for production"
        );
        let mut scheduler = Scheduler::new();
        scheduler.register_job(Arc::new(PollJob {
            fetcher: self.fetcher.clone(),
            interval,
        }));
        scheduler.start();
        // Dropping the old scheduler disarms it.
        self.scheduler = Some(scheduler);
    }

    /// Disarm the timer. Runs that already started keep going.
    pub async fn stop(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop().await;
            info!("stopped message fetch polling");
        }
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }
}
