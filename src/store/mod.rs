pub mod memory;
pub mod sled_store;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::FlagshipError;
use crate::model::{FeatureEvent, FeatureFlag, FlagUpdate};

pub use memory::{MemoryEventStore, MemoryFlagStore};
pub use sled_store::{SledEventStore, SledFlagStore};

/// Storage for flag definitions, keyed by unique flag name.
/// Implementations must be thread-safe.
#[async_trait]
pub trait FlagStore: Send + Sync {
    async fn find(&self, name: &str) -> Result<Option<FeatureFlag>, FlagshipError>;

    /// Insert or fully replace the record with the flag's name.
    async fn upsert(&self, flag: FeatureFlag) -> Result<(), FlagshipError>;

    /// Apply a partial update. Returns the updated record, or `None` if no
    /// flag with that name exists.
    async fn update(
        &self,
        name: &str,
        update: FlagUpdate,
    ) -> Result<Option<FeatureFlag>, FlagshipError>;

    /// Remove the record. Returns whether anything was deleted.
    async fn delete(&self, name: &str) -> Result<bool, FlagshipError>;

    /// All flags, ordered by name.
    async fn list_all(&self) -> Result<Vec<FeatureFlag>, FlagshipError>;
}

/// Append-only storage for tracked usage events.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, event: FeatureEvent) -> Result<(), FlagshipError>;

    /// Stream every event recorded for a flag, oldest first. Streamed so
    /// aggregation never requires the full event set in memory.
    async fn by_flag(&self, name: &str) -> BoxStream<'static, FeatureEvent>;
}

#[async_trait]
impl<T: FlagStore + ?Sized> FlagStore for std::sync::Arc<T> {
    async fn find(&self, name: &str) -> Result<Option<FeatureFlag>, FlagshipError> {
        (**self).find(name).await
    }

    async fn upsert(&self, flag: FeatureFlag) -> Result<(), FlagshipError> {
        (**self).upsert(flag).await
    }

    async fn update(
        &self,
        name: &str,
        update: FlagUpdate,
    ) -> Result<Option<FeatureFlag>, FlagshipError> {
        (**self).update(name, update).await
    }

    async fn delete(&self, name: &str) -> Result<bool, FlagshipError> {
        (**self).delete(name).await
    }

    async fn list_all(&self) -> Result<Vec<FeatureFlag>, FlagshipError> {
        (**self).list_all().await
    }
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for std::sync::Arc<T> {
    async fn append(&self, event: FeatureEvent) -> Result<(), FlagshipError> {
        (**self).append(event).await
    }

    async fn by_flag(&self, name: &str) -> BoxStream<'static, FeatureEvent> {
        (**self).by_flag(name).await
    }
}
