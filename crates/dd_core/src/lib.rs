pub mod error;
pub mod schedule;
pub mod storage;
pub mod transport;
pub mod types;

pub use error::{DriverError, Error, Result};
pub use schedule::Schedule;
pub use storage::MessageStore;
pub use transport::{InlineButton, InlineKeyboard, SentMessage, Transport};
pub use types::{MessageRecord, Offer, OfferDraft};
