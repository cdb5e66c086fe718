//! Feature-flag evaluation and A/B test analytics engine.
//!
//! The [`Flagship`] engine decides whether a named feature is active for an
//! optional acting user (global toggle, per-environment override, schedule
//! window, pluggable targeting rules), deterministically assigns users to
//! weighted A/B variants, and aggregates tracked usage events into
//! conversion statistics.
//!
//! Flags and events live behind the [`store::FlagStore`] and
//! [`store::EventStore`] traits, with in-memory and sled-backed
//! implementations included. Flag lookups optionally go through a
//! read-through TTL cache that every write invalidates.
//!
//! ```no_run
//! use flagship_lib::Flagship;
//!
//! # async fn demo() -> Result<(), flagship_lib::FlagshipError> {
//! let engine = Flagship::builder().build();
//!
//! engine.create("new-checkout", Some(true), None).await?;
//! if engine.is_enabled_for("new-checkout", 42).await {
//!     // show the new checkout
//! }
//!
//! engine.track("new-checkout", 42, "viewed", None).await?;
//! let stats = engine.feature_stats("new-checkout").await;
//! println!("{} impressions", stats.impressions);
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod builder;
pub mod cache;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod store;
pub mod variant;

pub use analytics::FeatureStats;
pub use builder::FlagshipBuilder;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{EnvResolver, FlagshipConfig, StaticEnv};
pub use engine::Flagship;
pub use error::FlagshipError;
pub use evaluator::{AlwaysTrue, EvaluatorRegistry, RuleEvaluator};
pub use model::{
    FeatureEvent, FeatureFlag, FlagUpdate, Identifiable, NewFlag, Subject, Variant, EVENT_VIEWED,
};
