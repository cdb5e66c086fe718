use std::sync::Arc;
use std::time::Duration;

use crate::cache::FlagCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{EnvResolver, FlagshipConfig, StaticEnv};
use crate::engine::Flagship;
use crate::evaluator::{EvaluatorRegistry, RuleEvaluator};
use crate::store::{EventStore, FlagStore, MemoryEventStore, MemoryFlagStore};

/// Builder for configuring a [`Flagship`] engine.
///
/// Everything has a default: in-memory stores, the system clock, the
/// configured environment name and the fail-open rule evaluator.
///
/// ```no_run
/// use flagship_lib::{Flagship, FlagshipConfig, Subject};
///
/// let engine = Flagship::builder()
///     .config(FlagshipConfig::load("flagship.toml"))
///     .evaluator(|_rules: &serde_json::Value, user: &Subject| user.id() != "blocked")
///     .build();
/// ```
pub struct FlagshipBuilder {
    config: FlagshipConfig,
    flags: Option<Arc<dyn FlagStore>>,
    events: Option<Arc<dyn EventStore>>,
    registry: EvaluatorRegistry,
    evaluator: Option<Arc<dyn RuleEvaluator>>,
    clock: Option<Arc<dyn Clock>>,
    env: Option<Arc<dyn EnvResolver>>,
}

impl FlagshipBuilder {
    pub fn new() -> Self {
        Self {
            config: FlagshipConfig::default(),
            flags: None,
            events: None,
            registry: EvaluatorRegistry::new(),
            evaluator: None,
            clock: None,
            env: None,
        }
    }

    pub fn config(mut self, config: FlagshipConfig) -> Self {
        self.config = config;
        self
    }

    pub fn flag_store(mut self, store: impl FlagStore + 'static) -> Self {
        self.flags = Some(Arc::new(store));
        self
    }

    pub fn event_store(mut self, store: impl EventStore + 'static) -> Self {
        self.events = Some(Arc::new(store));
        self
    }

    /// Supply the rule evaluator directly as a function or trait value.
    /// Takes precedence over a named reference in the configuration.
    pub fn evaluator(mut self, evaluator: impl RuleEvaluator + 'static) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    /// Make a named evaluator implementation resolvable from configuration.
    pub fn register_evaluator(
        mut self,
        name: &str,
        evaluator: impl RuleEvaluator + 'static,
    ) -> Self {
        self.registry.register(name, evaluator);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn environment(mut self, env: impl EnvResolver + 'static) -> Self {
        self.env = Some(Arc::new(env));
        self
    }

    /// Resolve the evaluator and assemble the engine. Construction is
    /// infallible: every unresolved piece falls back to its default.
    pub fn build(self) -> Flagship {
        let evaluator = match self.evaluator {
            Some(evaluator) => evaluator,
            None => self.registry.resolve(self.config.evaluator.as_deref()),
        };
        let cache = self
            .config
            .cache_enabled
            .then(|| FlagCache::new(Duration::from_secs(self.config.cache_ttl_secs)));
        let env = self
            .env
            .unwrap_or_else(|| Arc::new(StaticEnv(self.config.environment.clone())));

        Flagship {
            flags: self
                .flags
                .unwrap_or_else(|| Arc::new(MemoryFlagStore::new())),
            events: self
                .events
                .unwrap_or_else(|| Arc::new(MemoryEventStore::new())),
            cache,
            evaluator,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            env,
            default_state: self.config.default_state,
        }
    }
}

impl Default for FlagshipBuilder {
    fn default() -> Self {
        Self::new()
    }
}
