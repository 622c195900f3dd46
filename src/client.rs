use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::domains::run::{FetchEvent, RunId};
use crate::error::{RelayFetcherError, Result};
use crate::factories::fetcher_factory::FetcherFactory;
use crate::interfaces::relay::{MessageHandler, PushDelivery};
use crate::services::fetcher::MessageFetcher;
use crate::services::poller::PollScheduler;

/// Entry point for embedders: one fetcher plus its optional poll timer.
pub struct RelayFetcher {
    fetcher: MessageFetcher,
    poller: PollScheduler,
    poll_interval: Option<Duration>,
}

impl RelayFetcher {
    pub fn new(fetcher: MessageFetcher, poll_interval: Option<Duration>) -> Self {
        Self {
            poller: PollScheduler::new(fetcher.clone()),
            fetcher,
            poll_interval,
        }
    }

    pub async fn from_config(
        config: Config,
        handler: Arc<dyn MessageHandler>,
        push: Option<Arc<dyn PushDelivery>>,
    ) -> Result<Self> {
        let fetcher = FetcherFactory::create_from_config(&config, handler, push).await?;
        let poll_interval = config
            .fetch()
            .poll_interval_seconds
            .map(Duration::from_secs);
        Ok(Self::new(fetcher, poll_interval))
    }

    pub async fn from_config_path<P: AsRef<Path>>(
        path: P,
        password: Option<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Self> {
        let config = Config::from_file(path)?.with_password(password);
        Self::from_config(config, handler, None).await
    }

    pub fn fetcher(&self) -> &MessageFetcher {
        &self.fetcher
    }

    pub fn run(&self) -> Option<RunId> {
        self.fetcher.run()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FetchEvent> {
        self.fetcher.subscribe()
    }

    pub async fn wait_idle(&self) {
        self.fetcher.wait_idle().await
    }

    /// Start polling, using `interval` or else the configured interval.
    pub fn start_polling(&mut self, interval: Option<Duration>) -> Result<Duration> {
        let interval = interval.or(self.poll_interval).ok_or_else(|| {
            RelayFetcherError::Config("no poll interval configured".to_string())
        })?;
        if interval.is_zero() {
            return Err(RelayFetcherError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        self.poller.start(interval);
        Ok(interval)
    }

    pub async fn stop_polling(&mut self) {
        self.poller.stop().await
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }
}
