pub mod document;
pub mod drivers;
pub mod logging;
pub mod manager;
pub mod parser;
pub mod schema;

pub use document::ParsedDocument;
pub use drivers::{Chain, Driver, DriverKind, Value};
pub use logging::{init_logging, Logger};
pub use manager::{load_offers, parse_offers, CycleReport, DealManager, HttpFetcher, PageFetcher};
pub use parser::{Field, OfferParser};
pub use schema::{literal_to_chain, OfferSchema};

pub mod prelude {
    pub use super::{DealManager, OfferParser, OfferSchema, PageFetcher};
    pub use dd_core::{Error, Offer, Result};
}
