//! Quote sources: an in-process synthetic generator and an HTTP client for a
//! remote quote endpoint serving the same JSON shape.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tickerchat_core::{QuoteRecord, QuoteSource, SourceError, SPARK_LEN};
use tracing::debug;

/// Generates mock quotes: price in `[100, 600)`, change in `[-5, 5)`, and a
/// sparkline jittered around the price.
#[derive(Debug, Clone, Default)]
pub struct SyntheticQuoteSource;

impl SyntheticQuoteSource {
    pub fn new() -> Self {
        Self
    }

    /// Produce one quote synchronously.
    pub fn generate(&self, symbol: &str) -> QuoteRecord {
        let mut rng = rand::rng();
        let price: f64 = rng.random_range(0.0..1.0) * 500.0 + 100.0;
        let change: f64 = rng.random_range(0.0..1.0) * 10.0 - 5.0;
        let spark = (0..SPARK_LEN)
            .map(|_| price + rng.random_range(0.0..1.0) * 5.0 - 2.0)
            .collect();
        QuoteRecord::new(symbol, price, change, spark)
    }
}

#[async_trait]
impl QuoteSource for SyntheticQuoteSource {
    async fn fetch_quote(&self, symbol: &str) -> Result<QuoteRecord, SourceError> {
        Ok(self.generate(symbol))
    }
}

/// Fetches quotes from `{base_url}/api/stock/{symbol}`.
#[derive(Debug, Clone)]
pub struct HttpQuoteSource {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpQuoteSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| SourceError::Request(format!("Invalid base URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::Request(format!(
                "Base URL {} cannot carry a path",
                base_url
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Request(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    /// The endpoint queried for `symbol`.
    pub fn quote_url(&self, symbol: &str) -> reqwest::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["api", "stock", symbol]);
        }
        url
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn fetch_quote(&self, symbol: &str) -> Result<QuoteRecord, SourceError> {
        let url = self.quote_url(symbol);
        debug!(%url, "Fetching quote");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                symbol: symbol.to_string(),
                status: status.as_u16(),
            });
        }

        let quote: QuoteRecord = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        quote.validate().map_err(SourceError::Invalid)?;
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_synthetic_quote_shape() {
        let source = SyntheticQuoteSource::new();
        let quote = source.fetch_quote("AAPL").await.unwrap();

        assert_eq!(quote.symbol, "AAPL");
        assert!(quote.validate().is_ok());
        assert!((100.0..600.0).contains(&quote.price));
        assert!((-5.0..5.0).contains(&quote.change));
        for point in &quote.spark {
            assert!(*point >= quote.price - 2.0 && *point < quote.price + 3.0);
        }
        let decimals = quote.percent.split('.').nth(1).unwrap();
        assert_eq!(decimals.len(), 2);
    }

    #[test]
    fn test_quote_url() {
        let source = HttpQuoteSource::new("http://localhost:8000", Duration::from_secs(5)).unwrap();
        assert_eq!(
            source.quote_url("RELIANCE.NS").as_str(),
            "http://localhost:8000/api/stock/RELIANCE.NS"
        );

        let nested = HttpQuoteSource::new("http://quotes.internal/v1/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            nested.quote_url("BTC-USD").as_str(),
            "http://quotes.internal/v1/api/stock/BTC-USD"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpQuoteSource::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpQuoteSource::new("mailto:quotes@example.com", Duration::from_secs(1)).is_err());
    }
}
