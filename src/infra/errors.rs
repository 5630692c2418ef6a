// src/infra/errors.rs — Error types for Shoal

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShoalError {
    // Contract errors (raised immediately, uncaught by the engine)
    #[error("Length mismatch: {candidates} candidates vs {evaluations} evaluations")]
    LengthMismatch {
        candidates: usize,
        evaluations: usize,
    },

    #[error("Unknown {kind}: '{name}'. Available: {available:?}")]
    UnknownComponent {
        kind: String,
        name: String,
        available: Vec<String>,
    },

    #[error("Missing required context field: {0}")]
    MissingContext(String),

    #[error("Invalid optimization target: {0}")]
    InvalidTarget(String),

    // External collaborators
    #[error("Semantic judge returned no verdict")]
    JudgeUnavailable,

    #[error("Text rewriter failed: {0}")]
    Rewriter(String),

    // Infra
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShoalError {
    /// Contract errors indicate a programming mistake rather than a
    /// recoverable runtime condition.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ShoalError::LengthMismatch { .. }
                | ShoalError::UnknownComponent { .. }
                | ShoalError::MissingContext(_)
                | ShoalError::InvalidTarget(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ShoalError>;
