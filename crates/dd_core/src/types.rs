use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::schedule::Schedule;
use crate::transport::SentMessage;

/// A canonical deal record, normalized from one retailer page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub retailer_name: String,
    pub offer_id: String,
    pub scrape_url: String,

    pub title: String,
    pub summary: String,
    pub image: String,
    pub url: String,
    pub schedule: Schedule,
    pub price_full: String,
    pub price_discount: Option<String>,

    pub rating: Option<i64>,
    pub rating_top: Option<i64>,
    pub available_percentage: Option<i64>,
    pub available_total: Option<i64>,
    pub available_sold: Option<i64>,
    pub available_still: Option<i64>,

    pub scheduled_current: NaiveDateTime,
    pub scheduled_next: NaiveDateTime,
    pub sale_id: String,
}

impl Offer {
    /// The price the customer pays: the discount when there is one.
    pub fn effective_price(&self) -> &str {
        effective_price(&self.price_full, self.price_discount.as_deref())
    }

    pub fn is_sold_out(&self) -> bool {
        self.available_percentage == Some(0)
    }
}

/// Field values of an offer before the derived parts are filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferDraft {
    pub retailer_name: String,
    pub offer_id: String,
    pub scrape_url: String,
    pub sale_id: Option<String>,
    pub title: String,
    pub summary: String,
    pub image: String,
    pub url: String,
    pub schedule: Schedule,
    pub price_full: String,
    pub price_discount: Option<String>,
    pub rating: Option<i64>,
    pub rating_top: Option<i64>,
    pub available_percentage: Option<i64>,
    pub available_total: Option<i64>,
    pub available_sold: Option<i64>,
    pub available_still: Option<i64>,
}

impl OfferDraft {
    /// Builds the offer, normalizing availability and deriving the sale
    /// window and sale id.
    pub fn finish_at(self, now: NaiveDateTime) -> Offer {
        let mut available_still = self.available_still;
        let mut available_percentage = self.available_percentage;

        let all_sold = matches!(self.available_total, Some(total) if total != 0 && Some(total) == self.available_sold);
        if all_sold || available_still == Some(0) || available_percentage == Some(0) {
            available_still = Some(0);
            available_percentage = Some(0);
        }

        let (scheduled_current, scheduled_next) = self.schedule.window_at(now);

        let sale_id = match self.sale_id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => sale_id(
                &self.title,
                &self.summary,
                effective_price(&self.price_full, self.price_discount.as_deref()),
            ),
        };

        Offer {
            retailer_name: self.retailer_name,
            offer_id: self.offer_id,
            scrape_url: self.scrape_url,
            title: self.title,
            summary: self.summary,
            image: self.image,
            url: self.url,
            schedule: self.schedule,
            price_full: self.price_full,
            price_discount: self.price_discount,
            rating: self.rating,
            rating_top: self.rating_top,
            available_percentage,
            available_total: self.available_total,
            available_sold: self.available_sold,
            available_still,
            scheduled_current,
            scheduled_next,
            sale_id,
        }
    }
}

fn effective_price<'a>(full: &'a str, discount: Option<&'a str>) -> &'a str {
    match discount {
        Some(discount) if !discount.is_empty() => discount,
        _ => full,
    }
}

/// Hex sha256 of title, summary and effective price.
pub fn sale_id(title: &str, summary: &str, price: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(summary.as_bytes());
    hasher.update(price.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The last notification posted for an offer id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub chat_type: String,
    pub chat_id: i64,
    pub chat_username: Option<String>,
    pub message_id: i64,
    pub offer: Offer,
}

impl MessageRecord {
    pub fn from_sent(sent: SentMessage, offer: Offer) -> Self {
        Self {
            chat_type: sent.chat_type,
            chat_id: sent.chat_id,
            chat_username: sent.chat_username,
            message_id: sent.message_id,
            offer,
        }
    }

    /// Public deep link to the message. Private chats and basic groups have none.
    pub fn link(&self) -> Option<String> {
        if matches!(self.chat_type.as_str(), "private" | "group") {
            return None;
        }
        let target = match &self.chat_username {
            Some(username) => username.clone(),
            None => {
                // supergroup and channel ids carry a -100 prefix
                let id = self.chat_id.to_string();
                format!("c/{}", id.strip_prefix("-100").unwrap_or(&id))
            }
        };
        Some(format!("https://t.me/{}/{}", target, self.message_id))
    }
}
