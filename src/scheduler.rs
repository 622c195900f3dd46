use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::warn;

use crate::interfaces::scheduler::ScheduledJob;

/// Runs each registered job on its own fixed interval until stopped. The
/// first run happens one interval after `start`.
#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<Arc<dyn ScheduledJob>>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_job(&mut self, job: Arc<dyn ScheduledJob>) {
        self.jobs.push(job);
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        for job in &self.jobs {
            let job = job.clone();
            let period = job.interval().max(Duration::from_millis(1));
            self.handles.push(tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if let Err(err) = job.run().await {
                        warn!(job = job.name(), error = %err, "scheduled job failed");
                    }
                }
            }));
        }
    }

    pub async fn stop(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}
