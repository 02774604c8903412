use thiserror::Error;

/// Errors produced while building or running an LQR controller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LqrError {
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Invalid cost weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid actuation limits: {0}")]
    InvalidLimits(String),

    #[error("Invalid channel order: {0}")]
    InvalidChannelOrder(String),

    #[error("No stabilizing Riccati solution: {0}")]
    NoStabilizingSolution(String),

    #[error("Gain denominator BᵀPB + R is singular")]
    SingularGainDenominator,

    #[error("State not initialized: {0}")]
    StateNotInitialized(&'static str),

    #[error("Eigen decomposition failed: {0}")]
    EigenDecomposition(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for LqrError {
    fn from(err: serde_json::Error) -> Self {
        LqrError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LqrError>;
