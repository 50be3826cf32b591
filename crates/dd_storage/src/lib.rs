use std::path::Path;
use std::sync::Arc;

use clap::ValueEnum;
use dd_core::{MessageStore, Result};

pub mod backends;

pub use backends::*;

/// Where message records are kept between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StoreKind {
    #[default]
    File,
    Memory,
}

impl StoreKind {
    pub fn get_error_message(&self) -> &'static str {
        match self {
            StoreKind::File => "File store needs a writable save_dir",
            StoreKind::Memory => "Memory store should be available",
        }
    }
}

pub async fn create_store(kind: StoreKind, save_dir: &Path) -> Result<Arc<dyn MessageStore>> {
    Ok(match kind {
        StoreKind::File => Arc::new(FileStore::open(save_dir).await?),
        StoreKind::Memory => Arc::new(InMemoryStore::new()),
    })
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_store, StoreKind};
}
