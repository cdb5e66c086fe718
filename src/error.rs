use thiserror::Error;

/// Errors surfaced by administrative and storage operations.
///
/// Read paths (`is_enabled`, `get_variant`) never return these: absence and
/// storage failure degrade to defined defaults there.
#[derive(Debug, Error)]
pub enum FlagshipError {
    #[error("feature flag not found: {0}")]
    NotFound(String),

    #[error("feature flag already exists: {0}")]
    DuplicateName(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// A/B report requested for a flag that does not exist or has no variants.
    #[error("No A/B test found with this name or no variants defined")]
    NoSuchTest,

    #[error("storage error: {0}")]
    Store(String),
}
