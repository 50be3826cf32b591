use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dd_core::{Error, MessageRecord, MessageStore, Result};
use tokio::fs;
use tracing::debug;

/// One pretty-printed JSON file per offer id under `save_dir`.
#[derive(Debug, Clone)]
pub struct FileStore {
    save_dir: PathBuf,
}

impl FileStore {
    pub async fn open(save_dir: impl AsRef<Path>) -> Result<Self> {
        let save_dir = save_dir.as_ref().to_path_buf();
        fs::create_dir_all(&save_dir)
            .await
            .map_err(|e| Error::Storage(format!("cannot create {}: {}", save_dir.display(), e)))?;
        Ok(Self { save_dir })
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    fn path_for(&self, offer_id: &str) -> Result<PathBuf> {
        if offer_id.is_empty() || offer_id.contains(['/', '\\']) || offer_id.starts_with('.') {
            return Err(Error::Storage(format!("offer id {:?} is not usable as a file name", offer_id)));
        }
        Ok(self.save_dir.join(format!("{}.json", offer_id)))
    }
}

#[async_trait]
impl MessageStore for FileStore {
    async fn load(&self, offer_id: &str) -> Result<Option<MessageRecord>> {
        let path = self.path_for(offer_id)?;
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record = serde_json::from_str(&raw)
            .map_err(|e| Error::Storage(format!("{}: {}", path.display(), e)))?;
        Ok(Some(record))
    }

    async fn save(&self, record: &MessageRecord) -> Result<()> {
        let path = self.path_for(&record.offer.offer_id)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(record)?).await?;
        fs::rename(&tmp, &path).await?;
        debug!("💾 Saved message {} to {}", record.message_id, path.display());
        Ok(())
    }

    async fn offer_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.save_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
