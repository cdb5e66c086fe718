use std::sync::Arc;

use crate::builder::FlagshipBuilder;
use crate::cache::FlagCache;
use crate::clock::Clock;
use crate::config::EnvResolver;
use crate::error::FlagshipError;
use crate::evaluator::RuleEvaluator;
use crate::model::{self, FeatureEvent, FeatureFlag, FlagUpdate, NewFlag, Subject};
use crate::store::{EventStore, FlagStore};
use crate::variant;

/// The flag evaluation engine.
///
/// Composes the flag store, event store, optional read-through cache, rule
/// evaluator, clock and environment resolver to answer "is this flag active
/// for this user now?", assign A/B variants and record usage events.
///
/// Built through [`FlagshipBuilder`]; see [`Flagship::builder`].
pub struct Flagship {
    pub(crate) flags: Arc<dyn FlagStore>,
    pub(crate) events: Arc<dyn EventStore>,
    pub(crate) cache: Option<FlagCache>,
    pub(crate) evaluator: Arc<dyn RuleEvaluator>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) env: Arc<dyn EnvResolver>,
    pub(crate) default_state: bool,
}

impl Flagship {
    pub fn builder() -> FlagshipBuilder {
        FlagshipBuilder::new()
    }

    /// The rule evaluator the engine resolved at construction. Exposed so
    /// targeting logic can be tested without going through `is_enabled`.
    pub fn evaluator(&self) -> &Arc<dyn RuleEvaluator> {
        &self.evaluator
    }

    /// Whether the flag is active right now, with no acting user.
    pub async fn is_enabled(&self, flag: &str) -> bool {
        self.evaluate(flag, None).await
    }

    /// Whether the flag is active right now for the given user.
    pub async fn is_enabled_for(&self, flag: &str, user: impl Into<Subject>) -> bool {
        self.evaluate(flag, Some(&user.into())).await
    }

    /// Gate order is significant: the environment override and the schedule
    /// window are operational kill-switches checked before targeting, so
    /// targeting logic can never bypass them.
    async fn evaluate(&self, flag: &str, user: Option<&Subject>) -> bool {
        let Some(record) = self.lookup(flag).await else {
            return self.default_state;
        };

        if let Some(environments) = &record.environments {
            if environments.get(&self.env.current()) == Some(&false) {
                return false;
            }
        }

        if !record.is_active {
            return false;
        }

        let now = self.clock.now();
        if let Some(start) = record.scheduled_start {
            if now < start {
                return false;
            }
        }
        if let Some(end) = record.scheduled_end {
            if now > end {
                return false;
            }
        }

        if record.has_targeting_rules() {
            if let (Some(rules), Some(user)) = (&record.targeting_rules, user) {
                return self.evaluator.evaluate(rules, user);
            }
        }

        true
    }

    /// Cache-aware flag lookup. Storage failure on this path degrades to
    /// "flag absent" rather than failing the evaluation call.
    async fn lookup(&self, name: &str) -> Option<FeatureFlag> {
        let result = match &self.cache {
            Some(cache) => cache.remember(name, || self.flags.find(name)).await,
            None => self.flags.find(name).await,
        };
        match result {
            Ok(flag) => flag,
            Err(e) => {
                tracing::error!(flag = name, error = %e, "flag lookup failed");
                None
            }
        }
    }

    async fn invalidate(&self, name: &str) {
        if let Some(cache) = &self.cache {
            cache.forget(name).await;
        }
    }

    /// Set the flag active. No-op if the flag does not exist.
    pub async fn enable(&self, flag: &str) -> Result<(), FlagshipError> {
        self.set_active(flag, true).await
    }

    /// Set the flag inactive. No-op if the flag does not exist.
    pub async fn disable(&self, flag: &str) -> Result<(), FlagshipError> {
        self.set_active(flag, false).await
    }

    async fn set_active(&self, flag: &str, active: bool) -> Result<(), FlagshipError> {
        let update = FlagUpdate {
            is_active: Some(active),
            ..Default::default()
        };
        if self.flags.update(flag, update).await?.is_some() {
            self.invalidate(flag).await;
        }
        Ok(())
    }

    /// Flip `is_active` relative to the stored value, never a cached view.
    /// No-op if the flag does not exist.
    pub async fn toggle(&self, flag: &str) -> Result<(), FlagshipError> {
        let Some(current) = self.flags.find(flag).await? else {
            return Ok(());
        };
        let update = FlagUpdate {
            is_active: Some(!current.is_active),
            ..Default::default()
        };
        self.flags.update(flag, update).await?;
        self.invalidate(flag).await;
        Ok(())
    }

    /// Upsert-by-name create. An existing flag keeps its other fields but
    /// has `is_active` and rules overwritten; a missing `enabled` falls back
    /// to the configured default state.
    pub async fn create(
        &self,
        flag: &str,
        enabled: Option<bool>,
        rules: Option<serde_json::Value>,
    ) -> Result<(), FlagshipError> {
        let is_active = enabled.unwrap_or(self.default_state);
        let rules = rules.filter(|r| !model::is_empty_rules(r));

        let mut record = self
            .flags
            .find(flag)
            .await?
            .unwrap_or_else(|| FeatureFlag::new(flag, is_active));
        record.is_active = is_active;
        record.targeting_rules = rules;
        record.description = Some(format!("Feature flag: {}", flag));

        self.flags.upsert(record).await?;
        self.invalidate(flag).await;
        Ok(())
    }

    /// Remove the flag. No-op if absent.
    pub async fn delete(&self, flag: &str) -> Result<(), FlagshipError> {
        self.flags.delete(flag).await?;
        self.invalidate(flag).await;
        Ok(())
    }

    /// All flags as plain records.
    pub async fn all(&self) -> Result<Vec<FeatureFlag>, FlagshipError> {
        self.flags.list_all().await
    }

    /// The user's A/B variant for the flag, or `None` when the flag does not
    /// exist, has no variants, or the variant weights leave the user's
    /// bucket unassigned. Deterministic per (flag, user).
    pub async fn get_variant(&self, flag: &str, user: impl Into<Subject>) -> Option<String> {
        let record = match self.flags.find(flag).await {
            Ok(record) => record?,
            Err(e) => {
                tracing::error!(flag, error = %e, "variant lookup failed");
                return None;
            }
        };
        let variants = record.variants.as_deref().filter(|v| !v.is_empty())?;
        variant::assign(flag, &user.into().id(), variants).map(str::to_string)
    }

    /// Record a usage event. The flag is not required to exist: tracking is
    /// decoupled from flag lifecycle so events survive deletion and renames.
    pub async fn track(
        &self,
        flag: &str,
        user: impl Into<Subject>,
        event_type: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), FlagshipError> {
        let event = FeatureEvent {
            feature_name: flag.to_string(),
            user_id: user.into().id(),
            event_type: event_type.to_string(),
            metadata,
            created_at: self.clock.now(),
        };
        self.events.append(event).await
    }

    // ── Administrative surface ───────────────────────────────

    /// Strict create: rejects duplicate names and validates the payload
    /// before touching storage.
    pub async fn create_flag(&self, flag: NewFlag) -> Result<FeatureFlag, FlagshipError> {
        flag.validate()?;
        if self.flags.find(&flag.name).await?.is_some() {
            return Err(FlagshipError::DuplicateName(flag.name));
        }
        let record = flag.into_flag();
        self.flags.upsert(record.clone()).await?;
        self.invalidate(&record.name).await;
        Ok(record)
    }

    /// Partial update of an existing flag. `NotFound` when absent.
    pub async fn update_flag(
        &self,
        flag: &str,
        update: FlagUpdate,
    ) -> Result<FeatureFlag, FlagshipError> {
        update.validate()?;
        let updated = self
            .flags
            .update(flag, update)
            .await?
            .ok_or_else(|| FlagshipError::NotFound(flag.to_string()))?;
        self.invalidate(flag).await;
        Ok(updated)
    }

    /// Delete that reports absence, for administrative callers that need a
    /// distinct "not found" outcome.
    pub async fn delete_flag(&self, flag: &str) -> Result<(), FlagshipError> {
        let deleted = self.flags.delete(flag).await?;
        self.invalidate(flag).await;
        if deleted {
            Ok(())
        } else {
            Err(FlagshipError::NotFound(flag.to_string()))
        }
    }
}
