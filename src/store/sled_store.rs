use async_stream::stream;
use async_trait::async_trait;
use futures::stream::BoxStream;

use super::{EventStore, FlagStore};
use crate::error::FlagshipError;
use crate::model::{FeatureEvent, FeatureFlag, FlagUpdate};

fn store_err(context: &str, e: impl std::fmt::Display) -> FlagshipError {
    FlagshipError::Store(format!("{}: {}", context, e))
}

/// Persistent flag storage backed by sled.
pub struct SledFlagStore {
    db: sled::Db,
}

impl SledFlagStore {
    pub fn new(db: sled::Db) -> Self {
        Self { db }
    }

    /// Open a sled database at the given directory path.
    pub fn open(data_dir: &str) -> Result<Self, FlagshipError> {
        let db = sled::open(data_dir).map_err(|e| store_err("failed to open sled db", e))?;
        Ok(Self::new(db))
    }

    fn flag_key(name: &str) -> String {
        format!("flag:{}", name)
    }
}

#[async_trait]
impl FlagStore for SledFlagStore {
    async fn find(&self, name: &str) -> Result<Option<FeatureFlag>, FlagshipError> {
        let ivec = self
            .db
            .get(Self::flag_key(name))
            .map_err(|e| store_err("failed to read flag", e))?;
        match ivec {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| store_err("failed to deserialize flag", e)),
        }
    }

    async fn upsert(&self, flag: FeatureFlag) -> Result<(), FlagshipError> {
        let bytes =
            serde_json::to_vec(&flag).map_err(|e| store_err("failed to serialize flag", e))?;
        self.db
            .insert(Self::flag_key(&flag.name), bytes)
            .map_err(|e| store_err("failed to store flag", e))?;
        self.db
            .flush()
            .map_err(|e| store_err("failed to flush", e))?;
        Ok(())
    }

    async fn update(
        &self,
        name: &str,
        update: FlagUpdate,
    ) -> Result<Option<FeatureFlag>, FlagshipError> {
        let Some(mut flag) = self.find(name).await? else {
            return Ok(None);
        };
        update.apply(&mut flag);
        self.upsert(flag.clone()).await?;
        Ok(Some(flag))
    }

    async fn delete(&self, name: &str) -> Result<bool, FlagshipError> {
        let removed = self
            .db
            .remove(Self::flag_key(name))
            .map_err(|e| store_err("failed to delete flag", e))?;
        self.db
            .flush()
            .map_err(|e| store_err("failed to flush", e))?;
        Ok(removed.is_some())
    }

    async fn list_all(&self) -> Result<Vec<FeatureFlag>, FlagshipError> {
        let mut flags = Vec::new();
        for item in self.db.scan_prefix("flag:") {
            let (_key, value) = item.map_err(|e| store_err("failed to scan flags", e))?;
            let flag: FeatureFlag = serde_json::from_slice(&value)
                .map_err(|e| store_err("failed to deserialize flag", e))?;
            flags.push(flag);
        }
        // sled iterates keys lexicographically, which is name order here
        Ok(flags)
    }
}

/// Persistent append-only event log backed by sled.
///
/// Events are keyed `event:{flag}:{seq}` with a zero-padded monotonic
/// sequence so prefix scans stream them oldest first.
pub struct SledEventStore {
    db: sled::Db,
}

impl SledEventStore {
    pub fn new(db: sled::Db) -> Self {
        Self { db }
    }

    pub fn open(data_dir: &str) -> Result<Self, FlagshipError> {
        let db = sled::open(data_dir).map_err(|e| store_err("failed to open sled db", e))?;
        Ok(Self::new(db))
    }

    fn event_prefix(name: &str) -> String {
        format!("event:{}:", name)
    }
}

#[async_trait]
impl EventStore for SledEventStore {
    async fn append(&self, event: FeatureEvent) -> Result<(), FlagshipError> {
        let seq = self
            .db
            .generate_id()
            .map_err(|e| store_err("failed to allocate event id", e))?;
        let key = format!("{}{:020}", Self::event_prefix(&event.feature_name), seq);
        let bytes =
            serde_json::to_vec(&event).map_err(|e| store_err("failed to serialize event", e))?;
        self.db
            .insert(key, bytes)
            .map_err(|e| store_err("failed to store event", e))?;
        self.db
            .flush()
            .map_err(|e| store_err("failed to flush", e))?;
        Ok(())
    }

    async fn by_flag(&self, name: &str) -> BoxStream<'static, FeatureEvent> {
        let iter = self.db.scan_prefix(Self::event_prefix(name));
        let name = name.to_string();
        Box::pin(stream! {
            for item in iter {
                let Ok((_key, value)) = item else { continue };
                match serde_json::from_slice::<FeatureEvent>(&value) {
                    // The prefix scan also matches flags that extend `name`
                    // past a ':' (keys for "promo:v2" start with "event:promo:"),
                    // so the stored name is checked for full equality.
                    Ok(event) if event.feature_name == name => yield event,
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "skipping undecodable event"),
                }
            }
        })
    }
}
