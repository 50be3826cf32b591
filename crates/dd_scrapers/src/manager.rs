use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use dd_core::{Error, Offer, Result};
use dd_notify::{render_offer, Notifier, PublishOutcome, RenderedMessage};
use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::logging::Logger;
use crate::parser::OfferParser;
use crate::schema::OfferSchema;

const DEFAULT_CONCURRENCY: usize = 10;
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.5414.120 Safari/537.36";

/// Source of raw retailer pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Build every schema of an offers file. Offer ids must be unique since
/// they key the message store.
pub fn parse_offers(raw: &str) -> Result<Vec<OfferParser>> {
    let schemas: Vec<OfferSchema> =
        serde_json::from_str(raw).map_err(|e| Error::Schema(format!("offers file: {}", e)))?;
    let mut seen = HashSet::new();
    let mut parsers = Vec::with_capacity(schemas.len());
    for schema in &schemas {
        if !seen.insert(schema.offer_id.clone()) {
            return Err(Error::Config(format!("duplicate offer id {:?}", schema.offer_id)));
        }
        parsers.push(schema.build()?);
    }
    Ok(parsers)
}

pub async fn load_offers(path: impl AsRef<Path>) -> Result<Vec<OfferParser>> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Config(format!("cannot read offers file {}: {}", path.display(), e)))?;
    parse_offers(&raw)
}

/// Per-offer results of one scrape cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub published: Vec<(String, PublishOutcome)>,
    pub failed: Vec<(String, Error)>,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs every configured offer through fetch, evaluation and publishing.
pub struct DealManager {
    parsers: Vec<OfferParser>,
    fetcher: Arc<dyn PageFetcher>,
    notifier: Arc<Notifier>,
    semaphore: Arc<Semaphore>,
}

impl DealManager {
    pub fn new(parsers: Vec<OfferParser>, fetcher: Arc<dyn PageFetcher>, notifier: Arc<Notifier>) -> Self {
        Self {
            parsers,
            fetcher,
            notifier,
            semaphore: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        self
    }

    pub fn parsers(&self) -> &[OfferParser] {
        &self.parsers
    }

    fn parser(&self, offer_id: &str) -> Result<&OfferParser> {
        self.parsers
            .iter()
            .find(|p| p.offer_id() == offer_id)
            .ok_or_else(|| Error::Config(format!("unknown offer id {:?}", offer_id)))
    }

    async fn scrape(&self, parser: &OfferParser, logger: &Logger) -> Result<Offer> {
        logger.info("🦗 Scraping website");
        let markup = self.fetcher.fetch(parser.scrape_url()).await?;
        logger.debug("🔍 Extracting website data");
        parser.evaluate_html(&markup)
    }

    async fn process(&self, parser: &OfferParser) -> Result<PublishOutcome> {
        let logger = Logger::for_offer(parser.offer_id());
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| Error::External(e.into()))?;

        let offer = self.scrape(parser, &logger).await?;
        logger.debug("📨 Posting on telegram");
        let outcome = self.notifier.publish(&offer).await?;
        logger.info(&outcome.to_string());
        Ok(outcome)
    }

    /// One pass over all offers. A failing offer is reported and skipped,
    /// the others still publish.
    pub async fn run_cycle(&self) -> CycleReport {
        let results = join_all(self.parsers.iter().map(|parser| async move {
            (parser.offer_id().to_string(), self.process(parser).await)
        }))
        .await;

        let mut report = CycleReport::default();
        for (offer_id, result) in results {
            match result {
                Ok(outcome) => report.published.push((offer_id, outcome)),
                Err(e) => {
                    Logger::for_offer(&offer_id).error(&format!("🔴 Skipped this cycle: {}", e));
                    report.failed.push((offer_id, e));
                }
            }
        }
        report
    }

    /// Scrape and render without touching the channel or the store.
    pub async fn preview(&self, offer_id: Option<&str>) -> Result<Vec<(Offer, RenderedMessage)>> {
        let parsers: Vec<&OfferParser> = match offer_id {
            Some(offer_id) => vec![self.parser(offer_id)?],
            None => self.parsers.iter().collect(),
        };

        let mut previews = Vec::with_capacity(parsers.len());
        for parser in parsers {
            let offer = self.scrape(parser, &Logger::for_offer(parser.offer_id())).await?;
            let message = render_offer(&offer, Local::now().naive_local());
            previews.push((offer, message));
        }
        Ok(previews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn offers(ids: &[&str]) -> String {
        let schemas: Vec<_> = ids
            .iter()
            .map(|id| {
                json!({
                    "retailer_name": "Daydeal",
                    "offer_id": id,
                    "scrape_url": "https://www.daydeal.ch",
                    "schedule": "09:00",
                    "title": "h1",
                    "summary": "h2",
                    "image": {"driver": "html", "query": "img", "attribute": "src"},
                    "url": {"driver": "string", "string": "https://www.daydeal.ch"},
                    "price_full": "h3"
                })
            })
            .collect();
        serde_json::to_string(&schemas).unwrap()
    }

    #[test]
    fn test_parse_offers() {
        let parsers = parse_offers(&offers(&["daydeal-daily", "daydeal-weekly"])).unwrap();
        let ids: Vec<_> = parsers.iter().map(|p| p.offer_id()).collect();
        assert_eq!(ids, vec!["daydeal-daily", "daydeal-weekly"]);
    }

    #[test]
    fn test_duplicate_offer_ids_are_rejected() {
        let err = parse_offers(&offers(&["daydeal-daily", "daydeal-daily"])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("daydeal-daily")));
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let mut raw: serde_json::Value = serde_json::from_str(&offers(&["daydeal-daily"])).unwrap();
        raw[0]["scrape_url"] = json!("not a url");
        assert!(matches!(parse_offers(&raw.to_string()), Err(Error::Schema(_))));
    }

    #[test]
    fn test_bad_weekday_is_a_schema_error() {
        let mut raw: serde_json::Value = serde_json::from_str(&offers(&["daydeal-weekly"])).unwrap();
        raw[0]["schedule"] = json!({"time": "09:00", "weekday": 7});
        assert!(matches!(parse_offers(&raw.to_string()), Err(Error::Schema(_))));
    }

    #[tokio::test]
    async fn test_load_offers_missing_file() {
        let err = load_offers("/nonexistent/offers.json").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
