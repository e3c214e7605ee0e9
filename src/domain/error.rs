//! Domain error types.

/// Top-level error type for quantback.
///
/// Every variant carries enough context (symbol, timeframe, indicator name)
/// to be logged without re-deriving it from a stack trace.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QuantbackError {
    #[error("invalid strategy: {reason}")]
    Validation { reason: String },

    #[error("indicator {name} is not supported")]
    UnsupportedIndicator { name: String },

    #[error("no historical data for {symbol} on timeframe {timeframe}")]
    DataUnavailable { symbol: String, timeframe: String },

    #[error("failed to compute {indicator}: {reason}")]
    Computation { indicator: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("cache store error: {reason}")]
    CacheStore { reason: String },

    #[error("io error: {reason}")]
    Io { reason: String },
}

impl From<std::io::Error> for QuantbackError {
    fn from(err: std::io::Error) -> Self {
        QuantbackError::Io {
            reason: err.to_string(),
        }
    }
}

impl QuantbackError {
    /// True for failures the optimizer treats as skippable per candidate
    /// rather than fatal for the whole sweep.
    pub fn is_candidate_skippable(&self) -> bool {
        matches!(
            self,
            QuantbackError::DataUnavailable { .. } | QuantbackError::Computation { .. }
        )
    }
}

impl From<&QuantbackError> for std::process::ExitCode {
    fn from(err: &QuantbackError) -> Self {
        let code: u8 = match err {
            QuantbackError::Io { .. } => 1,
            QuantbackError::ConfigParse { .. }
            | QuantbackError::ConfigMissing { .. }
            | QuantbackError::ConfigInvalid { .. } => 2,
            QuantbackError::Validation { .. } | QuantbackError::UnsupportedIndicator { .. } => 3,
            QuantbackError::DataUnavailable { .. } => 4,
            QuantbackError::Computation { .. } | QuantbackError::CacheStore { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
