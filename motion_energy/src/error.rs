use thiserror::Error;

pub type Result<T> = std::result::Result<T, MotionError>;

/// Failures that abort an analysis run.
///
/// Per-frame conditions (an empty magnitude set, an anomalous variance) are not
/// errors; they are resolved by policy inside the pipeline.
#[derive(Debug, Error)]
pub enum MotionError {
    #[error("point sequences differ in length: prev={prev}, curr={curr}, found={found}")]
    InvalidInput { prev: usize, curr: usize, found: usize },

    #[error("cannot open video source: {0}")]
    SourceUnavailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("feature tracking failed: {0}")]
    Tracking(String),

    #[error("video decode/encode failed: {0}")]
    Video(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed configuration file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("cannot serialize run summary: {0}")]
    Summary(#[from] serde_json::Error),
}
