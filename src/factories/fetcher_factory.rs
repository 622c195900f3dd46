use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::interfaces::relay::{MessageHandler, PushDelivery, RelayService, StaticRestriction};
use crate::providers::http_relay::HttpRelayService;
use crate::services::fetcher::MessageFetcher;

pub struct FetcherFactory;

impl FetcherFactory {
    /// Build a fetcher talking to the relay described by `config`.
    pub async fn create_from_config(
        config: &Config,
        handler: Arc<dyn MessageHandler>,
        push: Option<Arc<dyn PushDelivery>>,
    ) -> Result<MessageFetcher> {
        config.validate()?;
        let relay = Arc::new(HttpRelayService::new(&config.relay).await?);
        Ok(Self::create_with_relay(config, relay, handler, push))
    }

    /// Same wiring as `create_from_config` around an existing relay client.
    pub fn create_with_relay(
        config: &Config,
        relay: Arc<dyn RelayService>,
        handler: Arc<dyn MessageHandler>,
        push: Option<Arc<dyn PushDelivery>>,
    ) -> MessageFetcher {
        let fetch = config.fetch();
        let mut builder = MessageFetcher::builder(relay, handler)
            .restriction(Arc::new(StaticRestriction(fetch.restricted())))
            .serialize_runs(fetch.serialize_runs())
            .event_buffer(fetch.event_buffer());
        if let Some(push) = push {
            builder = builder.push_delivery(push);
        }
        builder.build()
    }
}
