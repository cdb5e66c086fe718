use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FlagshipError;

/// Event type that counts as an impression. Every other event type counts
/// as an interaction.
pub const EVENT_VIEWED: &str = "viewed";

/// One weighted branch of an A/B test.
///
/// Definition order is load-bearing: bucketing walks variants in order,
/// so each variant occupies the cumulative-weight range that its position
/// gives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub weight: u32,
}

impl Variant {
    pub fn new(name: impl Into<String>, weight: u32) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// A named boolean-gated feature with optional targeting, scheduling and
/// variant configuration. `name` is the unique lookup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub name: String,
    pub is_active: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Opaque to storage; interpreted only by the configured rule evaluator.
    #[serde(default)]
    pub targeting_rules: Option<serde_json::Value>,
    #[serde(default)]
    pub targeting_strategy: Option<String>,
    /// Named evaluator reference, resolvable through the evaluator registry.
    #[serde(default)]
    pub custom_evaluator: Option<String>,
    /// 0-100. Reserved for gradual rollout; not consulted by evaluation yet.
    #[serde(default)]
    pub rollout_percentage: Option<u8>,
    #[serde(default)]
    pub variants: Option<Vec<Variant>>,
    /// Inclusive schedule window bounds.
    #[serde(default)]
    pub scheduled_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_end: Option<DateTime<Utc>>,
    /// Per-environment override. An explicit `false` blocks the flag in that
    /// environment; a missing key or `true` does not.
    #[serde(default)]
    pub environments: Option<HashMap<String, bool>>,
}

impl FeatureFlag {
    /// A flag with only the boolean gate set; everything else empty.
    pub fn new(name: impl Into<String>, is_active: bool) -> Self {
        Self {
            name: name.into(),
            is_active,
            description: None,
            targeting_rules: None,
            targeting_strategy: None,
            custom_evaluator: None,
            rollout_percentage: None,
            variants: None,
            scheduled_start: None,
            scheduled_end: None,
            environments: None,
        }
    }

    /// Whether the flag carries a non-empty targeting rule set.
    pub fn has_targeting_rules(&self) -> bool {
        match &self.targeting_rules {
            None => false,
            Some(rules) => !is_empty_rules(rules),
        }
    }
}

/// Null, `[]` and `{}` all mean "no rules".
pub(crate) fn is_empty_rules(rules: &serde_json::Value) -> bool {
    match rules {
        serde_json::Value::Null => true,
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

/// A tracked usage event. Append-only; never mutated.
///
/// `feature_name` references a flag by name but is not a hard foreign key:
/// events may outlive or precede the flag they refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEvent {
    pub feature_name: String,
    pub user_id: String,
    pub event_type: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl FeatureEvent {
    pub fn is_impression(&self) -> bool {
        self.event_type == EVENT_VIEWED
    }
}

/// Caller types that expose their own identifier.
pub trait Identifiable {
    fn id(&self) -> String;
}

/// An acting user, as accepted by evaluation and tracking calls.
///
/// The closed set of shapes callers may pass: a raw numeric id, a raw string
/// id, or a plain record carrying an `id` field. All of them normalize to a
/// single string identifier through [`Subject::id`].
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    Int(i64),
    Str(String),
    Record(serde_json::Value),
}

impl Subject {
    /// Stable string identifier used for variant bucketing and event
    /// attribution.
    pub fn id(&self) -> String {
        match self {
            Subject::Int(n) => n.to_string(),
            Subject::Str(s) => s.clone(),
            Subject::Record(record) => match record.get("id") {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Number(n)) => n.to_string(),
                Some(other) => other.to_string(),
                None => record.to_string(),
            },
        }
    }

    /// Normalize a caller type that exposes an identifier accessor.
    pub fn from_identifiable<T: Identifiable + ?Sized>(user: &T) -> Self {
        Subject::Str(user.id())
    }
}

impl From<i64> for Subject {
    fn from(id: i64) -> Self {
        Subject::Int(id)
    }
}

impl From<i32> for Subject {
    fn from(id: i32) -> Self {
        Subject::Int(id as i64)
    }
}

impl From<&str> for Subject {
    fn from(id: &str) -> Self {
        Subject::Str(id.to_string())
    }
}

impl From<String> for Subject {
    fn from(id: String) -> Self {
        Subject::Str(id)
    }
}

impl From<serde_json::Value> for Subject {
    fn from(record: serde_json::Value) -> Self {
        Subject::Record(record)
    }
}

/// Full-field payload for the strict administrative create.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFlag {
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub targeting_rules: Option<serde_json::Value>,
    #[serde(default)]
    pub targeting_strategy: Option<String>,
    #[serde(default)]
    pub custom_evaluator: Option<String>,
    #[serde(default)]
    pub rollout_percentage: Option<u8>,
    #[serde(default)]
    pub variants: Option<Vec<Variant>>,
    #[serde(default)]
    pub scheduled_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub environments: Option<HashMap<String, bool>>,
}

impl NewFlag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_active: false,
            description: None,
            targeting_rules: None,
            targeting_strategy: None,
            custom_evaluator: None,
            rollout_percentage: None,
            variants: None,
            scheduled_start: None,
            scheduled_end: None,
            environments: None,
        }
    }

    pub fn validate(&self) -> Result<(), FlagshipError> {
        if self.name.trim().is_empty() {
            return Err(FlagshipError::Validation("flag name is required".into()));
        }
        validate_rollout(self.rollout_percentage)
    }

    pub(crate) fn into_flag(self) -> FeatureFlag {
        FeatureFlag {
            name: self.name,
            is_active: self.is_active,
            description: self.description,
            targeting_rules: self.targeting_rules,
            targeting_strategy: self.targeting_strategy,
            custom_evaluator: self.custom_evaluator,
            rollout_percentage: self.rollout_percentage,
            variants: self.variants,
            scheduled_start: self.scheduled_start,
            scheduled_end: self.scheduled_end,
            environments: self.environments,
        }
    }
}

/// Partial update for administrative edits. `Some` sets a field, `None`
/// leaves it untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlagUpdate {
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub targeting_rules: Option<serde_json::Value>,
    #[serde(default)]
    pub targeting_strategy: Option<String>,
    #[serde(default)]
    pub custom_evaluator: Option<String>,
    #[serde(default)]
    pub rollout_percentage: Option<u8>,
    #[serde(default)]
    pub variants: Option<Vec<Variant>>,
    #[serde(default)]
    pub scheduled_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub environments: Option<HashMap<String, bool>>,
}

impl FlagUpdate {
    pub fn validate(&self) -> Result<(), FlagshipError> {
        validate_rollout(self.rollout_percentage)
    }

    /// Apply the set fields onto an existing record.
    pub fn apply(self, flag: &mut FeatureFlag) {
        if let Some(is_active) = self.is_active {
            flag.is_active = is_active;
        }
        if let Some(description) = self.description {
            flag.description = Some(description);
        }
        if let Some(rules) = self.targeting_rules {
            flag.targeting_rules = Some(rules);
        }
        if let Some(strategy) = self.targeting_strategy {
            flag.targeting_strategy = Some(strategy);
        }
        if let Some(evaluator) = self.custom_evaluator {
            flag.custom_evaluator = Some(evaluator);
        }
        if let Some(rollout) = self.rollout_percentage {
            flag.rollout_percentage = Some(rollout);
        }
        if let Some(variants) = self.variants {
            flag.variants = Some(variants);
        }
        if let Some(start) = self.scheduled_start {
            flag.scheduled_start = Some(start);
        }
        if let Some(end) = self.scheduled_end {
            flag.scheduled_end = Some(end);
        }
        if let Some(environments) = self.environments {
            flag.environments = Some(environments);
        }
    }
}

fn validate_rollout(rollout: Option<u8>) -> Result<(), FlagshipError> {
    match rollout {
        Some(pct) if pct > 100 => Err(FlagshipError::Validation(format!(
            "rollout_percentage must be between 0 and 100, got {}",
            pct
        ))),
        _ => Ok(()),
    }
}
