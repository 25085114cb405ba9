//! Yahoo Finance chart API client.

use super::{QuoteError, QuoteSource};
use crate::domain::{Decimal, Instrument, Quote};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Quote source backed by the public chart endpoint.
///
/// Only the latest market price is used: the returned bar is flat at that price.
#[derive(Debug, Clone)]
pub struct YahooQuoteSource {
    client: Client,
    base_url: String,
}

impl YahooQuoteSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_chart(&self, symbol: &str) -> Result<serde_json::Value, QuoteError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(15)),
            ..Default::default()
        };

        retry(backoff, || async {
            debug!(%url, "Requesting quote");
            let response = self
                .client
                .get(&url)
                .query(&[("interval", "1m"), ("range", "1d")])
                .send()
                .await
                .map_err(|e| backoff::Error::transient(QuoteError::Network(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(QuoteError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(QuoteError::Http {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(QuoteError::Http {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(QuoteError::Parse(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl QuoteSource for YahooQuoteSource {
    async fn current_quote(&self, instrument: &Instrument) -> Result<Quote, QuoteError> {
        let symbol = chart_symbol(instrument)?;
        let response = self.get_chart(&symbol).await?;
        let price = parse_market_price(&response, instrument)?;
        debug!(%instrument, %price, "Fetched quote");
        Ok(Quote::flat(price))
    }
}

/// `USD/JPY` -> `USDJPY=X`.
fn chart_symbol(instrument: &Instrument) -> Result<String, QuoteError> {
    let (base, quote) = instrument
        .currencies()
        .ok_or_else(|| QuoteError::UnsupportedInstrument(instrument.to_string()))?;
    Ok(format!("{}{}=X", base, quote))
}

fn parse_market_price(
    response: &serde_json::Value,
    instrument: &Instrument,
) -> Result<Decimal, QuoteError> {
    let result = response
        .pointer("/chart/result/0")
        .ok_or_else(|| QuoteError::Parse("Missing chart result".to_string()))?;

    let number = result
        .pointer("/meta/regularMarketPrice")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| QuoteError::Parse("Missing regularMarketPrice".to_string()))?;

    let price = Decimal::from_str_canonical(&number.to_string())
        .map_err(|e| QuoteError::Parse(format!("Invalid price {}: {}", number, e)))?;

    if !price.is_positive() {
        return Err(QuoteError::Unavailable(instrument.to_string()));
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_symbol() {
        assert_eq!(chart_symbol(&Instrument::new("USD/JPY")).unwrap(), "USDJPY=X");
        assert_eq!(chart_symbol(&Instrument::new("eur-usd")).unwrap(), "EURUSD=X");
        assert!(matches!(
            chart_symbol(&Instrument::new("BTC")),
            Err(QuoteError::UnsupportedInstrument(_))
        ));
    }

    #[test]
    fn test_parse_market_price_valid() {
        let body = serde_json::json!({
            "chart": {
                "result": [{
                    "meta": { "currency": "JPY", "symbol": "USDJPY=X", "regularMarketPrice": 149.87 }
                }],
                "error": null
            }
        });
        let price = parse_market_price(&body, &Instrument::new("USD/JPY")).unwrap();
        assert_eq!(price, Decimal::from_str_canonical("149.87").unwrap());
    }

    #[test]
    fn test_parse_market_price_rejects_missing_and_zero() {
        let instrument = Instrument::new("USD/JPY");

        let empty = serde_json::json!({ "chart": { "result": [], "error": null } });
        assert!(matches!(
            parse_market_price(&empty, &instrument),
            Err(QuoteError::Parse(_))
        ));

        let zero = serde_json::json!({
            "chart": { "result": [{ "meta": { "regularMarketPrice": 0 } }] }
        });
        assert!(matches!(
            parse_market_price(&zero, &instrument),
            Err(QuoteError::Unavailable(_))
        ));
    }
}
