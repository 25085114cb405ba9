//! Quote source abstraction for fetching the current rate of an instrument.

use crate::domain::{Instrument, Quote};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod mock;
pub mod yahoo;

pub use mock::MockQuoteSource;
pub use yahoo::YahooQuoteSource;

/// External collaborator that prices instruments.
///
/// Implementations handle retry/backoff themselves; callers treat a call as one
/// atomic fetch.
#[async_trait]
pub trait QuoteSource: Send + Sync + fmt::Debug {
    /// Latest single-bar quote for `instrument`.
    async fn current_quote(&self, instrument: &Instrument) -> Result<Quote, QuoteError>;
}

/// Error type for quote fetches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    /// Connection timeout, DNS failure and the like.
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    /// Invalid JSON or a malformed response.
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Unsupported instrument: {0}")]
    UnsupportedInstrument(String),
    /// The source answered, but not with a usable price.
    #[error("No quote available for {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_error_display() {
        let err = QuoteError::Network("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = QuoteError::Http {
            status: 429,
            message: "Too many requests".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 429: Too many requests");

        assert_eq!(QuoteError::RateLimited.to_string(), "Rate limited");
        assert_eq!(
            QuoteError::UnsupportedInstrument("BTC".to_string()).to_string(),
            "Unsupported instrument: BTC"
        );
    }
}
