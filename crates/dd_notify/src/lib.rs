pub mod lifecycle;
pub mod notifier;
pub mod render;
pub mod telegram;

pub use lifecycle::{decide, decide_and_render, ActionKind, Decision, PublishAction};
pub use notifier::{Notifier, PublishOutcome};
pub use render::{render_expired, render_offer, RenderedMessage};
pub use telegram::TelegramTransport;

pub mod prelude {
    pub use super::{Notifier, PublishOutcome, TelegramTransport};
    pub use dd_core::{Error, MessageRecord, MessageStore, Offer, Result, Transport};
}
