use std::collections::BTreeMap;
use std::fmt;

/// Ticker → daily closes, oldest first. A ticker with no usable closes maps to an empty vec.
pub type CloseSeries = BTreeMap<String, Vec<f64>>;

/// Pair → observed rate. `None` marks a pair the provider listed with an unusable value; it is
/// published as the sanitized default but never treated as an observation.
pub type RateQuotes = BTreeMap<String, Option<f64>>;

pub type GroupResult<T> = Result<T, SourceError>;

/// Group-scoped fetch failure. Never fatal; the reconciler falls back to the previous run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Network, timeout, or provider-side error.
    Unavailable(String),
    /// The response arrived but lacks the expected structure.
    Malformed(String),
}

impl SourceError {
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::Unavailable(detail.into())
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed(detail.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "source_unavailable",
            Self::Malformed(_) => "malformed_payload",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Unavailable(d) | Self::Malformed(d) => d,
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.detail())
    }
}

impl std::error::Error for SourceError {}
