//! Message text and buttons for an offer.
//!
//! Output only ever contains `<b>`, `<s>` and `<a href>` markup; scraped text
//! is escaped. Rendering is a pure function of the offer and the instant.

use chrono::NaiveDateTime;
use dd_core::{InlineKeyboard, Offer};

const BUY_BUTTON: &str = "Jetzt Profitieren ➡️";
const OVER_BUTTON: &str = "Angebot Vorbei";

/// Scales beyond this are treated as no rating.
const MAX_RATING_TOP: i64 = 10;

/// Availability indicators, checked from the top.
const THRESHOLDS: [(i64, &str); 4] = [(50, "🟢"), (25, "🔵"), (10, "🟡"), (1, "🟠")];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub text: String,
    pub markup: InlineKeyboard,
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

/// The live post for an offer.
pub fn render_offer(offer: &Offer, now: NaiveDateTime) -> RenderedMessage {
    RenderedMessage {
        text: post(offer, &availability(offer, now)),
        markup: InlineKeyboard::single(BUY_BUTTON, offer.url.clone()),
    }
}

/// The post of a finished sale, pointing to its successor when possible.
pub fn render_expired(offer: &Offer, new_message_link: Option<&str>) -> RenderedMessage {
    let mut over = "🔴 Dieses Angebot ist vorbei.".to_string();
    if let Some(link) = new_message_link {
        over.push_str(&format!(" <a href=\"{}\">Zum neuen Angebot!</a>", escape(link)));
    }
    RenderedMessage {
        text: post(offer, &over),
        markup: InlineKeyboard::single(OVER_BUTTON, offer.url.clone()),
    }
}

fn post(offer: &Offer, availability: &str) -> String {
    let title = match rating(offer) {
        Some(stars) => format!("{} {}", escape(&offer.title), stars),
        None => escape(&offer.title),
    };
    format!(
        "<b>🏬 {retailer}</b>\n<a href=\"{image}\">\u{200b}</a>\n<b>📦 {title}</b>\n{summary}\n\n{availability}\n\n💸 {price}",
        retailer = escape(&offer.retailer_name),
        image = escape(&offer.image),
        title = title,
        summary = escape(&offer.summary),
        availability = availability,
        price = price(offer),
    )
}

fn rating(offer: &Offer) -> Option<String> {
    let (rating, top) = (offer.rating?, offer.rating_top?);
    if !(1..=MAX_RATING_TOP).contains(&top) {
        return None;
    }
    let filled = rating.clamp(0, top);
    Some(format!(
        "{}{}",
        "★".repeat(filled as usize),
        "☆".repeat((top - filled).max(0) as usize)
    ))
}

fn price(offer: &Offer) -> String {
    match offer.price_discount.as_deref() {
        Some(discount) if !discount.is_empty() && discount != offer.price_full => {
            format!("<s>{}</s> {}", escape(&offer.price_full), escape(discount))
        }
        _ => escape(&offer.price_full),
    }
}

fn availability(offer: &Offer, now: NaiveDateTime) -> String {
    let Some(percentage) = offer.available_percentage else {
        return "🟢 Angebot läuft noch!".to_string();
    };
    if percentage <= 0 {
        return format!(
            "🔴 Ausverkauft! Nächstes Angebot startet in {}",
            countdown(offer.scheduled_next, now)
        );
    }

    let indicator = THRESHOLDS
        .iter()
        .find(|(threshold, _)| percentage >= *threshold)
        .map_or("🟠", |(_, indicator)| *indicator);

    match (offer.available_total, offer.available_still) {
        (Some(total), Some(still)) if total > 0 => {
            format!("{} Noch {}/{} Stück verfügbar!", indicator, still, total)
        }
        _ => format!("{} Noch {}% verfügbar!", indicator, percentage),
    }
}

fn countdown(next: NaiveDateTime, now: NaiveDateTime) -> String {
    let delta = next - now;
    let days = delta.num_days();
    let hours = (delta - chrono::Duration::days(days)).num_hours();

    let mut parts = Vec::new();
    match days {
        1 => parts.push("einem Tag".to_string()),
        d if d > 1 => parts.push(format!("{} Tagen", d)),
        _ => {}
    }
    match hours {
        1 => parts.push("einer Stunde".to_string()),
        h if h > 1 => parts.push(format!("{} Stunden", h)),
        _ => {}
    }

    if parts.is_empty() {
        "weniger als einer Stunde".to_string()
    } else {
        parts.join(" und ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use dd_core::{OfferDraft, Schedule};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 12).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn offer() -> Offer {
        OfferDraft {
            retailer_name: "Daydeal".to_string(),
            offer_id: "daydeal-daily".to_string(),
            scrape_url: "https://www.daydeal.ch".to_string(),
            sale_id: None,
            title: "Kaffee & Tee".to_string(),
            summary: "Vollautomat <XL>".to_string(),
            image: "https://img.example/1.jpg".to_string(),
            url: "https://www.daydeal.ch/deal".to_string(),
            schedule: Schedule::Daily(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
            price_full: "499 CHF".to_string(),
            price_discount: Some("299 CHF".to_string()),
            rating: Some(4),
            rating_top: Some(5),
            available_percentage: Some(40),
            available_total: Some(100),
            available_sold: Some(60),
            available_still: Some(40),
        }
        .finish_at(now())
    }

    #[test]
    fn test_render_full_post() {
        let message = render_offer(&offer(), now());
        assert_eq!(
            message.text,
            "<b>🏬 Daydeal</b>\n<a href=\"https://img.example/1.jpg\">\u{200b}</a>\n\
             <b>📦 Kaffee &amp; Tee ★★★★☆</b>\nVollautomat &lt;XL&gt;\n\n\
             🔵 Noch 40/100 Stück verfügbar!\n\n💸 <s>499 CHF</s> 299 CHF"
        );
        assert_eq!(message.markup, InlineKeyboard::single(BUY_BUTTON, "https://www.daydeal.ch/deal"));
    }

    #[test]
    fn test_render_is_idempotent() {
        let offer = offer();
        assert_eq!(render_offer(&offer, now()), render_offer(&offer, now()));
    }

    #[test]
    fn test_availability_lines() {
        let mut offer = offer();
        offer.available_total = None;
        offer.available_percentage = Some(8);
        assert!(render_offer(&offer, now()).text.contains("🟠 Noch 8% verfügbar!"));

        offer.available_percentage = Some(75);
        assert!(render_offer(&offer, now()).text.contains("🟢 Noch 75% verfügbar!"));

        offer.available_percentage = None;
        assert!(render_offer(&offer, now()).text.contains("🟢 Angebot läuft noch!"));

        // next sale is tomorrow 09:00, 21 hours away
        offer.available_percentage = Some(0);
        assert!(render_offer(&offer, now())
            .text
            .contains("🔴 Ausverkauft! Nächstes Angebot startet in 21 Stunden"));
    }

    #[test]
    fn test_unusable_rating_scale_is_dropped() {
        let mut offer = offer();
        offer.rating_top = Some(4_000_000_000_000_000_000);
        let text = render_offer(&offer, now()).text;
        assert!(text.contains("<b>📦 Kaffee &amp; Tee</b>"));
        assert!(!text.contains('★'));

        offer.rating_top = Some(0);
        assert!(!render_offer(&offer, now()).text.contains('☆'));
        offer.rating_top = Some(-3);
        assert!(!render_offer(&offer, now()).text.contains('☆'));

        offer.rating = Some(99);
        offer.rating_top = Some(10);
        assert!(render_offer(&offer, now()).text.contains(&"★".repeat(10)));
    }

    #[test]
    fn test_countdown() {
        let base = now();
        assert_eq!(countdown(base + chrono::Duration::hours(1), base), "einer Stunde");
        assert_eq!(countdown(base + chrono::Duration::hours(25), base), "einem Tag und einer Stunde");
        assert_eq!(countdown(base + chrono::Duration::days(3), base), "3 Tagen");
        assert_eq!(countdown(base + chrono::Duration::minutes(20), base), "weniger als einer Stunde");
    }

    #[test]
    fn test_price_without_discount() {
        let mut offer = offer();
        offer.price_discount = None;
        assert!(render_offer(&offer, now()).text.ends_with("💸 499 CHF"));
        offer.price_discount = Some("499 CHF".to_string());
        assert!(render_offer(&offer, now()).text.ends_with("💸 499 CHF"));
    }

    #[test]
    fn test_render_expired() {
        let offer = offer();
        let message = render_expired(&offer, Some("https://t.me/daydeals/43"));
        assert!(message
            .text
            .contains("🔴 Dieses Angebot ist vorbei. <a href=\"https://t.me/daydeals/43\">Zum neuen Angebot!</a>"));
        assert_eq!(message.markup.inline_keyboard[0][0].text, OVER_BUTTON);

        let without_link = render_expired(&offer, None);
        assert!(without_link.text.contains("🔴 Dieses Angebot ist vorbei.\n"));
    }
}
