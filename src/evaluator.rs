use std::collections::HashMap;
use std::sync::Arc;

use crate::model::Subject;

/// Targeting-rule evaluation capability.
///
/// The rule set is whatever structure was stored on the flag; the engine
/// never interprets it itself. Any `Fn(&Value, &Subject) -> bool` closure
/// is an evaluator.
pub trait RuleEvaluator: Send + Sync {
    fn evaluate(&self, rules: &serde_json::Value, user: &Subject) -> bool;
}

impl<F> RuleEvaluator for F
where
    F: Fn(&serde_json::Value, &Subject) -> bool + Send + Sync,
{
    fn evaluate(&self, rules: &serde_json::Value, user: &Subject) -> bool {
        self(rules, user)
    }
}

/// Fail-open default: rules never block access.
pub struct AlwaysTrue;

impl RuleEvaluator for AlwaysTrue {
    fn evaluate(&self, _rules: &serde_json::Value, _user: &Subject) -> bool {
        true
    }
}

/// Named evaluator implementations, resolvable from configuration.
#[derive(Default)]
pub struct EvaluatorRegistry {
    entries: HashMap<String, Arc<dyn RuleEvaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        evaluator: impl RuleEvaluator + 'static,
    ) -> &mut Self {
        self.entries.insert(name.into(), Arc::new(evaluator));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RuleEvaluator>> {
        self.entries.get(name).cloned()
    }

    /// Resolve a named reference to a callable evaluator. An unknown name
    /// fails open to [`AlwaysTrue`] so flag checks stay available even when
    /// targeting is misconfigured.
    pub fn resolve(&self, name: Option<&str>) -> Arc<dyn RuleEvaluator> {
        match name {
            None => Arc::new(AlwaysTrue),
            Some(name) => match self.get(name) {
                Some(evaluator) => evaluator,
                None => {
                    tracing::warn!(
                        evaluator = name,
                        "evaluator not registered, falling back to always-true"
                    );
                    Arc::new(AlwaysTrue)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn premium_only(rules: &serde_json::Value, user: &Subject) -> bool {
        let _ = rules;
        matches!(user, Subject::Record(r) if r.get("plan") == Some(&serde_json::json!("premium")))
    }

    #[test]
    fn closures_are_evaluators() {
        let evaluator = |_: &serde_json::Value, user: &Subject| user.id() == "42";
        assert!(evaluator.evaluate(&serde_json::json!({}), &Subject::Int(42)));
        assert!(!evaluator.evaluate(&serde_json::json!({}), &Subject::Int(7)));
    }

    #[test]
    fn registry_resolves_by_name() {
        let mut registry = EvaluatorRegistry::new();
        registry.register("premium-only", premium_only);

        let resolved = registry.resolve(Some("premium-only"));
        let premium = Subject::from(serde_json::json!({"id": 1, "plan": "premium"}));
        let free = Subject::from(serde_json::json!({"id": 2, "plan": "free"}));
        assert!(resolved.evaluate(&serde_json::json!({}), &premium));
        assert!(!resolved.evaluate(&serde_json::json!({}), &free));
    }

    #[test]
    fn unknown_name_fails_open() {
        let registry = EvaluatorRegistry::new();
        let resolved = registry.resolve(Some("does-not-exist"));
        assert!(resolved.evaluate(&serde_json::json!({"blocked": true}), &Subject::Int(1)));
    }

    #[test]
    fn absent_reference_is_always_true() {
        let registry = EvaluatorRegistry::new();
        let resolved = registry.resolve(None);
        assert!(resolved.evaluate(&serde_json::Value::Null, &Subject::Int(1)));
    }
}
