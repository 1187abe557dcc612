use thiserror::Error;

pub type Result<T> = std::result::Result<T, ForecastError>;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Malformed signal `{field}`: {reason}")]
    MalformedSignal { field: String, reason: String },

    #[error("Signal provider `{source_name}` unavailable: {reason}")]
    UpstreamUnavailable { source_name: String, reason: String },

    #[error("Scale mismatch for feature `{feature}`: expected {expected}, got {actual}")]
    InvalidScale {
        feature: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid parameters for model version `{version}`: {reason}")]
    InvalidParameters { version: String, reason: String },

    #[error("Unknown model version: {0}")]
    UnknownModelVersion(String),

    #[error("No prediction for filing `{filing_id}` under `{model_version}`")]
    PredictionNotFound {
        filing_id: String,
        model_version: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ForecastError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSignal {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn upstream(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_parameters(version: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            version: version.into(),
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
