use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use relay_fetcher::client::RelayFetcher;
use relay_fetcher::error::{RelayFetcherError, Result};
use relay_fetcher::interfaces::relay::MessageHandler;
use relay_fetcher::Envelope;

#[derive(Parser, Debug)]
#[command(name = "relay-fetcher")]
#[command(about = "Fetch and acknowledge undelivered relay messages")]
struct Cli {
    #[arg(long, default_value = "./relay-fetcher.json")]
    config: String,

    #[arg(long, env = "RELAY_FETCHER_PASSWORD")]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Drain every pending page once and exit.
    Once,
    /// Poll on a timer until interrupted. For hosts without push delivery.
    Poll {
        #[arg(long)]
        interval_seconds: Option<u64>,
    },
}

struct PrintingHandler;

#[async_trait]
impl MessageHandler for PrintingHandler {
    async fn handle_envelope(&self, envelope: &Envelope) {
        let line = json!({
            "type": envelope.envelope_type,
            "source": envelope.source,
            "source_device": envelope.source_device,
            "timestamp": envelope.timestamp,
            "relay": envelope.relay,
            "legacy_message_bytes": envelope.legacy_message.as_ref().map(Vec::len),
            "content_bytes": envelope.content.as_ref().map(Vec::len),
        });
        println!("{line}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,relay_fetcher=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut client =
        RelayFetcher::from_config_path(&cli.config, cli.password, Arc::new(PrintingHandler))
            .await?;

    match cli.command {
        Commands::Once => {
            if client.run().is_none() {
                tracing::warn!("no run started; check fetch.restricted in the config");
            }
            client.wait_idle().await;
        }
        Commands::Poll { interval_seconds } => {
            let interval = client.start_polling(interval_seconds.map(Duration::from_secs))?;
            tracing::info!(interval_seconds = interval.as_secs(), "polling, press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .map_err(|e| RelayFetcherError::Runtime(e.to_string()))?;
            client.stop_polling().await;
            client.wait_idle().await;
        }
    }

    Ok(())
}
