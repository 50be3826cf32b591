use chrono::{Local, NaiveDateTime};
use dd_core::{DriverError, Error, Offer, OfferDraft, Result, Schedule};

use crate::document::ParsedDocument;
use crate::drivers::{Chain, EvalContext, Record, Value};

/// Offer fields that are produced by driver chains, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    SaleId,
    Title,
    Summary,
    Image,
    Url,
    PriceFull,
    PriceDiscount,
    Rating,
    RatingTop,
    AvailablePercentage,
    AvailableTotal,
    AvailableSold,
    AvailableStill,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::SaleId => "sale_id",
            Field::Title => "title",
            Field::Summary => "summary",
            Field::Image => "image",
            Field::Url => "url",
            Field::PriceFull => "price_full",
            Field::PriceDiscount => "price_discount",
            Field::Rating => "rating",
            Field::RatingTop => "rating_top",
            Field::AvailablePercentage => "available_percentage",
            Field::AvailableTotal => "available_total",
            Field::AvailableSold => "available_sold",
            Field::AvailableStill => "available_still",
        }
    }
}

/// A validated offer schema, ready to evaluate pages.
#[derive(Debug, Clone)]
pub struct OfferParser {
    retailer_name: String,
    offer_id: String,
    scrape_url: String,
    schedule: Schedule,
    fields: Vec<(Field, Chain)>,
}

impl OfferParser {
    pub(crate) fn new(
        retailer_name: String,
        offer_id: String,
        scrape_url: String,
        schedule: Schedule,
        fields: Vec<(Field, Chain)>,
    ) -> Self {
        Self {
            retailer_name,
            offer_id,
            scrape_url,
            schedule,
            fields,
        }
    }

    pub fn offer_id(&self) -> &str {
        &self.offer_id
    }

    pub fn retailer_name(&self) -> &str {
        &self.retailer_name
    }

    pub fn scrape_url(&self) -> &str {
        &self.scrape_url
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Parse raw markup and evaluate it against the local clock.
    pub fn evaluate_html(&self, markup: &str) -> Result<Offer> {
        self.evaluate(&ParsedDocument::parse(markup))
    }

    pub fn evaluate(&self, document: &ParsedDocument) -> Result<Offer> {
        self.evaluate_at(document, Local::now().naive_local())
    }

    /// Run every field chain in order, then build the offer. The first
    /// unrecovered field failure aborts the whole offer.
    pub fn evaluate_at(&self, document: &ParsedDocument, now: NaiveDateTime) -> Result<Offer> {
        let mut record = Record::new();
        record.insert("retailer_name", Value::Str(self.retailer_name.clone()));
        record.insert("offer_id", Value::Str(self.offer_id.clone()));
        record.insert("scrape_url", Value::Str(self.scrape_url.clone()));

        for (field, chain) in &self.fields {
            let value = chain
                .evaluate(&EvalContext { document, record: &record })
                .map_err(|e| Error::evaluation(field.as_str(), e))?;
            record.insert(field.as_str(), value);
        }

        let draft = OfferDraft {
            retailer_name: self.retailer_name.clone(),
            offer_id: self.offer_id.clone(),
            scrape_url: self.scrape_url.clone(),
            schedule: self.schedule,
            sale_id: optional_text(&record, Field::SaleId),
            title: text(&record, Field::Title),
            summary: text(&record, Field::Summary),
            image: text(&record, Field::Image),
            url: text(&record, Field::Url),
            price_full: text(&record, Field::PriceFull),
            price_discount: optional_text(&record, Field::PriceDiscount),
            rating: count(&record, Field::Rating)?,
            rating_top: count(&record, Field::RatingTop)?,
            available_percentage: count(&record, Field::AvailablePercentage)?,
            available_total: count(&record, Field::AvailableTotal)?,
            available_sold: count(&record, Field::AvailableSold)?,
            available_still: count(&record, Field::AvailableStill)?,
        };

        Ok(draft.finish_at(now))
    }
}

fn text(record: &Record, field: Field) -> String {
    record.get(field.as_str()).map(Value::to_string).unwrap_or_default()
}

fn optional_text(record: &Record, field: Field) -> Option<String> {
    match record.get(field.as_str()) {
        None => None,
        Some(value) if value.is_empty_str() => None,
        Some(value) => Some(value.to_string()),
    }
}

fn count(record: &Record, field: Field) -> Result<Option<i64>> {
    let invalid = |raw: String| Error::evaluation(field.as_str(), DriverError::InvalidNumber(raw));
    match record.get(field.as_str()) {
        None => Ok(None),
        Some(value) if value.is_empty_str() => Ok(None),
        Some(Value::Int(i)) => Ok(Some(*i)),
        Some(Value::Float(v)) if v.is_finite() => Ok(Some(v.trunc() as i64)),
        Some(Value::Float(v)) => Err(invalid(v.to_string())),
        Some(Value::Str(s)) => s.trim().parse::<i64>().map(Some).map_err(|_| invalid(s.clone())),
    }
}
