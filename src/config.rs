use std::env;

use serde::Deserialize;

/// Engine configuration, typically loaded from `flagship.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct FlagshipConfig {
    /// Read-through caching of flag lookups.
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
    /// Cache entry lifetime in seconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Activation state reported for flags that do not exist.
    #[serde(default)]
    pub default_state: bool,
    /// Runtime environment key matched against per-flag overrides.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Named rule evaluator, resolved through the registry at build time.
    /// Absent means the always-true evaluator.
    #[serde(default)]
    pub evaluator: Option<String>,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_environment() -> String {
    "production".to_string()
}

impl Default for FlagshipConfig {
    fn default() -> Self {
        Self {
            cache_enabled: default_cache_enabled(),
            cache_ttl_secs: default_cache_ttl(),
            default_state: false,
            environment: default_environment(),
            evaluator: None,
        }
    }
}

impl FlagshipConfig {
    /// Load configuration from a TOML file, falling back to defaults if the
    /// file doesn't exist or cannot be parsed.
    pub fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path, error = %e, "failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Apply `FLAGSHIP_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("FLAGSHIP_CACHE_ENABLED") {
            match val.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.cache_enabled = true,
                "0" | "false" | "no" => self.cache_enabled = false,
                other => tracing::warn!(value = other, "unknown FLAGSHIP_CACHE_ENABLED value"),
            }
        }

        if let Ok(val) = env::var("FLAGSHIP_CACHE_TTL") {
            if let Ok(ttl) = val.parse::<u64>() {
                self.cache_ttl_secs = ttl;
            }
        }

        if let Ok(val) = env::var("FLAGSHIP_DEFAULT_STATE") {
            match val.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.default_state = true,
                "0" | "false" | "no" => self.default_state = false,
                other => tracing::warn!(value = other, "unknown FLAGSHIP_DEFAULT_STATE value"),
            }
        }

        if let Ok(val) = env::var("FLAGSHIP_ENV") {
            if !val.trim().is_empty() {
                self.environment = val.trim().to_string();
            }
        }

        if let Ok(val) = env::var("FLAGSHIP_EVALUATOR") {
            if val.trim().is_empty() {
                self.evaluator = None;
            } else {
                self.evaluator = Some(val.trim().to_string());
            }
        }
    }
}

/// Resolves the current runtime environment key ("production", "staging").
pub trait EnvResolver: Send + Sync {
    fn current(&self) -> String;
}

impl<T: EnvResolver + ?Sized> EnvResolver for std::sync::Arc<T> {
    fn current(&self) -> String {
        (**self).current()
    }
}

/// Fixed environment name, as configured at engine construction.
pub struct StaticEnv(pub String);

impl EnvResolver for StaticEnv {
    fn current(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = FlagshipConfig::default();
        assert!(config.cache_enabled);
        assert_eq!(config.cache_ttl_secs, 3600);
        assert!(!config.default_state);
        assert_eq!(config.environment, "production");
        assert!(config.evaluator.is_none());
    }

    #[test]
    fn parses_partial_toml() {
        let config: FlagshipConfig = toml::from_str(
            r#"
            cache_enabled = false
            environment = "staging"
            "#,
        )
        .unwrap();
        assert!(!config.cache_enabled);
        assert_eq!(config.cache_ttl_secs, 3600);
        assert_eq!(config.environment, "staging");
    }

    #[test]
    fn parses_evaluator_reference() {
        let config: FlagshipConfig = toml::from_str(r#"evaluator = "plan-based""#).unwrap();
        assert_eq!(config.evaluator.as_deref(), Some("plan-based"));
    }

    // Env vars are process-global, so every FLAGSHIP_* case lives in this
    // one test instead of racing across parallel test threads.
    #[test]
    fn env_overrides_apply() {
        let vars = [
            "FLAGSHIP_CACHE_ENABLED",
            "FLAGSHIP_CACHE_TTL",
            "FLAGSHIP_DEFAULT_STATE",
            "FLAGSHIP_ENV",
            "FLAGSHIP_EVALUATOR",
        ];

        env::set_var("FLAGSHIP_CACHE_ENABLED", "false");
        env::set_var("FLAGSHIP_CACHE_TTL", "60");
        env::set_var("FLAGSHIP_DEFAULT_STATE", "yes");
        env::set_var("FLAGSHIP_ENV", " staging ");
        env::set_var("FLAGSHIP_EVALUATOR", "plan-based");

        let mut config = FlagshipConfig::default();
        config.apply_env_overrides();
        assert!(!config.cache_enabled);
        assert_eq!(config.cache_ttl_secs, 60);
        assert!(config.default_state);
        assert_eq!(config.environment, "staging");
        assert_eq!(config.evaluator.as_deref(), Some("plan-based"));

        // alternate boolean spellings
        env::set_var("FLAGSHIP_CACHE_ENABLED", "1");
        env::set_var("FLAGSHIP_DEFAULT_STATE", "0");
        config.apply_env_overrides();
        assert!(config.cache_enabled);
        assert!(!config.default_state);

        // unparseable TTL and unknown booleans leave values untouched
        env::set_var("FLAGSHIP_CACHE_TTL", "soon");
        env::set_var("FLAGSHIP_CACHE_ENABLED", "maybe");
        config.apply_env_overrides();
        assert_eq!(config.cache_ttl_secs, 60);
        assert!(config.cache_enabled);

        // empty values clear the evaluator but not the environment
        env::set_var("FLAGSHIP_EVALUATOR", "");
        env::set_var("FLAGSHIP_ENV", "  ");
        config.apply_env_overrides();
        assert!(config.evaluator.is_none());
        assert_eq!(config.environment, "staging");

        for var in vars {
            env::remove_var(var);
        }

        // with nothing set, overrides are a no-op
        let mut untouched = FlagshipConfig::default();
        untouched.apply_env_overrides();
        assert_eq!(untouched.cache_ttl_secs, 3600);
        assert_eq!(untouched.environment, "production");
    }
}
