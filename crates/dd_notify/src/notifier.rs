use std::fmt;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use dd_core::{MessageRecord, MessageStore, Offer, Result, Transport};
use tracing::{debug, warn};

use crate::lifecycle::{decide, Decision};
use crate::render::{render_expired, render_offer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Unchanged,
    Posted,
    Changed,
    Replaced,
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PublishOutcome::Unchanged => "⏭️ Nothing changed",
            PublishOutcome::Posted => "🟢 Message posted",
            PublishOutcome::Changed => "🔵 Message changed",
            PublishOutcome::Replaced => "🆕 New sale posted, old message archived",
        })
    }
}

/// Publishes offers to one channel and remembers what was posted.
pub struct Notifier {
    store: Arc<dyn MessageStore>,
    transport: Arc<dyn Transport>,
}

impl Notifier {
    pub fn new(store: Arc<dyn MessageStore>, transport: Arc<dyn Transport>) -> Self {
        Self { store, transport }
    }

    pub async fn publish(&self, offer: &Offer) -> Result<PublishOutcome> {
        self.publish_at(offer, Local::now().naive_local()).await
    }

    /// Reads the stored record once, talks to the transport, and writes the
    /// record back only for messages the transport confirmed.
    pub async fn publish_at(&self, offer: &Offer, now: NaiveDateTime) -> Result<PublishOutcome> {
        let previous = self.store.load(&offer.offer_id).await?;
        let decision = decide(offer, previous.as_ref(), now);
        debug!("{}: {}", offer.offer_id, decision.label());

        match &decision {
            Decision::Unchanged { .. } => Ok(PublishOutcome::Unchanged),

            Decision::EditExisting { previous } => {
                let edit = render_offer(offer, now);
                self.transport
                    .edit_message(previous.message_id, &edit.text, &edit.markup)
                    .await?;
                let record = MessageRecord {
                    offer: offer.clone(),
                    ..previous.clone()
                };
                self.store.save(&record).await?;
                Ok(PublishOutcome::Changed)
            }

            Decision::SendNew | Decision::Replace { .. } => {
                let send = render_offer(offer, now);
                let sent = self.transport.send_message(&send.text, &send.markup).await?;
                let record = MessageRecord::from_sent(sent, offer.clone());
                self.store.save(&record).await?;

                let Decision::Replace { previous } = &decision else {
                    return Ok(PublishOutcome::Posted);
                };
                // the new message is stored, so a failed archive edit only loses the "over" marker
                let archive = render_expired(&previous.offer, record.link().as_deref());
                if let Err(e) = self
                    .transport
                    .edit_message(previous.message_id, &archive.text, &archive.markup)
                    .await
                {
                    warn!("{}: could not archive message {}: {}", offer.offer_id, previous.message_id, e);
                    return Err(e);
                }
                Ok(PublishOutcome::Replaced)
            }
        }
    }
}
