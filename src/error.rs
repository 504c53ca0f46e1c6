use thiserror::Error;

use crate::model::MAX_LOOKBACK_MINUTES;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Ticker '{0}' not found.")]
    UnknownSymbol(String),

    #[error("minutes must be an integer between 1 and {max}, got '{0}'", max = MAX_LOOKBACK_MINUTES)]
    InvalidWindow(String),

    #[error("price must be a finite number, got {0}")]
    InvalidPrice(f64),

    /// Only surfaced by `stats::mean`; query operations resolve it to zero.
    #[error("no samples in window")]
    EmptyWindow,

    #[error("poisoned lock on series '{0}'")]
    Poisoned(String),
}

impl EngineError {
    /// True for errors caused by the caller's input rather than engine state.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnknownSymbol(_) | Self::InvalidWindow(_) | Self::InvalidPrice(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
