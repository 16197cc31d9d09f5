use thiserror::Error;

/// Why a plan cannot produce splits. The engine itself degrades to empty
/// results; these exist so the host can tell the user what is missing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("No elevation profile for this course")]
    NoProfile,
    #[error("No pace set for this plan")]
    MissingPace,
    #[error("No target time set for this plan")]
    MissingTarget,
    #[error("Course distance must be greater than zero")]
    ZeroDistance,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}={value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}
