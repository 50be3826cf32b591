use chrono::NaiveDateTime;
use dd_core::{InlineKeyboard, MessageRecord, Offer};

use crate::render::{render_expired, render_offer};

/// What to do with the channel for a freshly scraped offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing was posted for this offer yet
    SendNew,
    /// Same sale, same message
    Unchanged { previous: MessageRecord },
    /// Same sale, availability or details changed
    EditExisting { previous: MessageRecord },
    /// A new sale started: post it, then mark the old message as over
    Replace { previous: MessageRecord },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Noop,
    Send,
    Edit,
}

/// One call to make against the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAction {
    pub kind: ActionKind,
    pub text: String,
    pub markup: InlineKeyboard,
    pub target_message_id: Option<i64>,
}

pub fn decide(offer: &Offer, previous: Option<&MessageRecord>, now: NaiveDateTime) -> Decision {
    let Some(previous) = previous else {
        return Decision::SendNew;
    };
    let previous = previous.clone();

    if previous.offer.sale_id != offer.sale_id {
        return Decision::Replace { previous };
    }
    if render_offer(&previous.offer, now) == render_offer(offer, now) {
        Decision::Unchanged { previous }
    } else {
        Decision::EditExisting { previous }
    }
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::SendNew => "send new",
            Decision::Unchanged { .. } => "unchanged",
            Decision::EditExisting { .. } => "edit existing",
            Decision::Replace { .. } => "replace",
        }
    }

    /// Actions in execution order. For a replacement the archive edit links
    /// to `new_message` when it is already known.
    pub fn actions(&self, offer: &Offer, new_message: Option<&MessageRecord>, now: NaiveDateTime) -> Vec<PublishAction> {
        let current = render_offer(offer, now);
        match self {
            Decision::SendNew => vec![PublishAction {
                kind: ActionKind::Send,
                text: current.text,
                markup: current.markup,
                target_message_id: None,
            }],
            Decision::Unchanged { previous } => vec![PublishAction {
                kind: ActionKind::Noop,
                text: current.text,
                markup: current.markup,
                target_message_id: Some(previous.message_id),
            }],
            Decision::EditExisting { previous } => vec![PublishAction {
                kind: ActionKind::Edit,
                text: current.text,
                markup: current.markup,
                target_message_id: Some(previous.message_id),
            }],
            Decision::Replace { previous } => {
                let expired = render_expired(&previous.offer, new_message.and_then(MessageRecord::link).as_deref());
                vec![
                    PublishAction {
                        kind: ActionKind::Send,
                        text: current.text,
                        markup: current.markup,
                        target_message_id: None,
                    },
                    PublishAction {
                        kind: ActionKind::Edit,
                        text: expired.text,
                        markup: expired.markup,
                        target_message_id: Some(previous.message_id),
                    },
                ]
            }
        }
    }
}

pub fn decide_and_render(
    offer: &Offer,
    previous: Option<&MessageRecord>,
    new_message: Option<&MessageRecord>,
    now: NaiveDateTime,
) -> Vec<PublishAction> {
    decide(offer, previous, now).actions(offer, new_message, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use dd_core::{OfferDraft, Schedule};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 12).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn offer(sale_id: &str, still: i64) -> Offer {
        OfferDraft {
            retailer_name: "Daydeal".to_string(),
            offer_id: "daydeal-daily".to_string(),
            scrape_url: "https://www.daydeal.ch".to_string(),
            sale_id: Some(sale_id.to_string()),
            title: format!("Deal {sale_id}"),
            summary: "Summary".to_string(),
            image: "https://img.example/1.jpg".to_string(),
            url: "https://www.daydeal.ch/deal".to_string(),
            schedule: Schedule::Daily(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
            price_full: "20 CHF".to_string(),
            price_discount: None,
            rating: None,
            rating_top: None,
            available_percentage: Some(still),
            available_total: Some(100),
            available_sold: Some(100 - still),
            available_still: Some(still),
        }
        .finish_at(now())
    }

    fn record(offer: Offer, message_id: i64) -> MessageRecord {
        MessageRecord {
            chat_type: "channel".to_string(),
            chat_id: -1001234,
            chat_username: Some("daydeals".to_string()),
            message_id,
            offer,
        }
    }

    #[test]
    fn test_first_offer_is_sent() {
        let actions = decide_and_render(&offer("S1", 50), None, None, now());
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::Send);
        assert_eq!(actions[0].target_message_id, None);
        assert_eq!(actions[0].text, render_offer(&offer("S1", 50), now()).text);
    }

    #[test]
    fn test_unchanged_offer_is_noop() {
        let stored = record(offer("S1", 50), 10);
        assert!(matches!(decide(&offer("S1", 50), Some(&stored), now()), Decision::Unchanged { .. }));

        let actions = decide_and_render(&offer("S1", 50), Some(&stored), None, now());
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::Noop);
    }

    #[test]
    fn test_availability_change_edits_in_place() {
        let stored = record(offer("S1", 50), 10);
        let actions = decide_and_render(&offer("S1", 20), Some(&stored), None, now());
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::Edit);
        assert_eq!(actions[0].target_message_id, Some(10));
        assert!(actions[0].text.contains("Noch 20/100"));
    }

    #[test]
    fn test_new_sale_sends_then_archives() {
        let stored = record(offer("S1", 0), 10);
        let new = offer("S2", 100);
        let sent = record(new.clone(), 11);

        let actions = decide_and_render(&new, Some(&stored), Some(&sent), now());
        assert_eq!(actions.len(), 2);

        assert_eq!(actions[0].kind, ActionKind::Send);
        assert!(actions[0].text.contains("Deal S2"));

        assert_eq!(actions[1].kind, ActionKind::Edit);
        assert_eq!(actions[1].target_message_id, Some(10));
        assert!(actions[1].text.contains("Deal S1"));
        assert!(actions[1].text.contains("<a href=\"https://t.me/daydeals/11\">Zum neuen Angebot!</a>"));
        assert_eq!(actions[1].markup.inline_keyboard[0][0].text, "Angebot Vorbei");
    }

    #[test]
    fn test_archive_without_known_link() {
        let stored = record(offer("S1", 0), 10);
        let actions = decide_and_render(&offer("S2", 100), Some(&stored), None, now());
        assert_eq!(actions.len(), 2);
        assert!(!actions[1].text.contains("<a href=\"https://t.me"));
    }
}
