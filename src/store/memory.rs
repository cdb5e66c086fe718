use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use tokio::sync::RwLock;

use super::{EventStore, FlagStore};
use crate::error::FlagshipError;
use crate::model::{FeatureEvent, FeatureFlag, FlagUpdate};

/// In-memory flag storage backed by a `RwLock<HashMap>`.
#[derive(Default)]
pub struct MemoryFlagStore {
    data: RwLock<HashMap<String, FeatureFlag>>,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlagStore for MemoryFlagStore {
    async fn find(&self, name: &str) -> Result<Option<FeatureFlag>, FlagshipError> {
        let data = self.data.read().await;
        Ok(data.get(name).cloned())
    }

    async fn upsert(&self, flag: FeatureFlag) -> Result<(), FlagshipError> {
        let mut data = self.data.write().await;
        data.insert(flag.name.clone(), flag);
        Ok(())
    }

    async fn update(
        &self,
        name: &str,
        update: FlagUpdate,
    ) -> Result<Option<FeatureFlag>, FlagshipError> {
        let mut data = self.data.write().await;
        match data.get_mut(name) {
            Some(flag) => {
                update.apply(flag);
                Ok(Some(flag.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, name: &str) -> Result<bool, FlagshipError> {
        let mut data = self.data.write().await;
        Ok(data.remove(name).is_some())
    }

    async fn list_all(&self) -> Result<Vec<FeatureFlag>, FlagshipError> {
        let data = self.data.read().await;
        let mut flags: Vec<FeatureFlag> = data.values().cloned().collect();
        flags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(flags)
    }
}

/// In-memory append-only event log.
#[derive(Default)]
pub struct MemoryEventStore {
    events: RwLock<Vec<FeatureEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(&self, event: FeatureEvent) -> Result<(), FlagshipError> {
        let mut events = self.events.write().await;
        events.push(event);
        Ok(())
    }

    async fn by_flag(&self, name: &str) -> BoxStream<'static, FeatureEvent> {
        let events = self.events.read().await;
        let matching: Vec<FeatureEvent> = events
            .iter()
            .filter(|e| e.feature_name == name)
            .cloned()
            .collect();
        Box::pin(stream::iter(matching))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::StreamExt;

    #[tokio::test]
    async fn flag_crud_round_trip() {
        let store = MemoryFlagStore::new();
        assert!(store.find("f").await.unwrap().is_none());

        store.upsert(FeatureFlag::new("f", true)).await.unwrap();
        assert!(store.find("f").await.unwrap().unwrap().is_active);

        let updated = store
            .update(
                "f",
                FlagUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(!updated.is_active);

        assert!(store.delete("f").await.unwrap());
        assert!(!store.delete("f").await.unwrap());
    }

    #[tokio::test]
    async fn list_all_is_name_ordered() {
        let store = MemoryFlagStore::new();
        store.upsert(FeatureFlag::new("zeta", false)).await.unwrap();
        store.upsert(FeatureFlag::new("alpha", true)).await.unwrap();
        let names: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn events_stream_by_flag_only() {
        let store = MemoryEventStore::new();
        for (flag, user) in [("a", "1"), ("b", "2"), ("a", "3")] {
            store
                .append(FeatureEvent {
                    feature_name: flag.into(),
                    user_id: user.into(),
                    event_type: "viewed".into(),
                    metadata: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let users: Vec<String> = store
            .by_flag("a")
            .await
            .map(|e| e.user_id)
            .collect()
            .await;
        assert_eq!(users, vec!["1", "3"]);
    }
}
