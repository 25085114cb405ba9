//! Mock quote source for testing without network calls.

use super::{QuoteError, QuoteSource};
use crate::domain::{Decimal, Instrument, Quote};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Serves predefined quotes per instrument.
///
/// Clones share the same quote table, so a test can move prices after handing
/// the source to a desk.
#[derive(Debug, Clone, Default)]
pub struct MockQuoteSource {
    quotes: Arc<RwLock<HashMap<Instrument, Quote>>>,
}

impl MockQuoteSource {
    /// Create a mock with no quotes; every fetch fails until one is set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `quote` for `instrument`.
    pub fn with_quote(self, instrument: Instrument, quote: Quote) -> Self {
        self.set_quote(instrument, quote);
        self
    }

    /// Serve a flat bar at `price` for `instrument`.
    pub fn with_price(self, instrument: Instrument, price: Decimal) -> Self {
        self.with_quote(instrument, Quote::flat(price))
    }

    /// Replace the quote for `instrument`.
    pub fn set_quote(&self, instrument: Instrument, quote: Quote) {
        if let Ok(mut quotes) = self.quotes.write() {
            quotes.insert(instrument, quote);
        }
    }

    pub fn set_price(&self, instrument: Instrument, price: Decimal) {
        self.set_quote(instrument, Quote::flat(price));
    }
}

#[async_trait]
impl QuoteSource for MockQuoteSource {
    async fn current_quote(&self, instrument: &Instrument) -> Result<Quote, QuoteError> {
        self.quotes
            .read()
            .map_err(|e| QuoteError::Unavailable(e.to_string()))?
            .get(instrument)
            .copied()
            .ok_or_else(|| QuoteError::Unavailable(instrument.to_string()))
    }
}
