use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dd_notify::{Notifier, TelegramTransport};
use dd_scrapers::{init_logging, load_offers, DealManager, HttpFetcher, OfferParser};
use dd_storage::{create_store, StoreKind};
use tracing::{info, warn, Level};

mod config;

use config::{Config, HumanDuration};

#[derive(Parser, Debug)]
#[command(name = "daydeal", author, version, about = "Posts retailer deals to a Telegram channel", long_about = None)]
struct Cli {
    /// Bot and storage configuration (JSON)
    #[arg(short, long)]
    config: PathBuf,
    /// Offer schemas (JSON list)
    #[arg(short, long)]
    offers: PathBuf,
    #[arg(long, value_enum, default_value_t = StoreKind::File)]
    store: StoreKind,
    #[arg(long, default_value = "info")]
    log_level: Level,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scrape every offer and update the channel
    Run {
        /// Keep running with this interval between cycles (e.g. 1h, 30m, 1h15m30s)
        #[arg(long)]
        interval: Option<HumanDuration>,
    },
    /// Scrape and print the rendered messages without posting
    Preview {
        offer_id: Option<String>,
    },
    /// List configured offers
    List,
}

async fn create_manager(cli: &Cli, parsers: Vec<OfferParser>) -> anyhow::Result<DealManager> {
    let config = Config::load(&cli.config).await?;

    let store = create_store(cli.store, &config.save_dir)
        .await
        .with_context(|| cli.store.get_error_message())?;
    info!("💾 Message store ready ({:?})", cli.store);

    let transport = Arc::new(TelegramTransport::new(
        config.bot_token.clone(),
        config.chat_id,
        config.request_timeout(),
    )?);
    let fetcher = Arc::new(HttpFetcher::new(config.request_timeout())?);
    let notifier = Arc::new(Notifier::new(store, transport));

    Ok(DealManager::new(parsers, fetcher, notifier).with_concurrency(config.concurrency))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let parsers = load_offers(&cli.offers).await?;
    info!("🦗 Loaded {} offers", parsers.len());

    match &cli.command {
        Commands::List => {
            for parser in &parsers {
                println!(
                    "{} ({}) {} {}",
                    parser.offer_id(),
                    parser.retailer_name(),
                    serde_json::to_string(&parser.schedule())?,
                    parser.scrape_url()
                );
            }
        }
        Commands::Preview { offer_id } => {
            let manager = create_manager(&cli, parsers).await?;
            for (offer, message) in manager.preview(offer_id.as_deref()).await? {
                println!("=== {} ({})", offer.offer_id, offer.sale_id);
                println!("{}\n", message.text);
            }
        }
        Commands::Run { interval } => {
            let manager = create_manager(&cli, parsers).await?;
            let Some(interval) = interval else {
                let report = manager.run_cycle().await;
                if !report.is_success() {
                    anyhow::bail!("{} of {} offers failed", report.failed.len(), manager.parsers().len());
                }
                return Ok(());
            };

            info!("Running in periodic mode with {}s interval", interval.0.as_secs());
            loop {
                let report = manager.run_cycle().await;
                if !report.is_success() {
                    warn!("{} offers failed this cycle", report.failed.len());
                }
                info!("Waiting {}s before next cycle", interval.0.as_secs());
                tokio::time::sleep(interval.0).await;
            }
        }
    }

    Ok(())
}
