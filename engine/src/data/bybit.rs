// Public Bybit v5 market endpoints (spot). No authentication is needed.
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use shared::models::{Candle, Interval};
use std::time::Duration;

use super::MarketDataSource;
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    ret_code: i64,
    ret_msg: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct KlineResult {
    #[serde(default)]
    list: Vec<[String; 7]>,
}

#[derive(Debug, Deserialize)]
struct TickerResult {
    #[serde(default)]
    list: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    symbol: String,
    last_price: String,
}

pub struct BybitClient {
    client: Client,
    base_url: String,
}

impl BybitClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> EngineResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(BybitClient { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    pub fn interval_code(interval: Interval) -> &'static str {
        match interval {
            Interval::Minute5 => "5",
            Interval::Minute15 => "15",
            Interval::Minute30 => "30",
            Interval::Hour1 => "60",
            Interval::Hour4 => "240",
            Interval::Day1 => "D",
        }
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str, query: &[(&str, String)]) -> EngineResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::trace!(path, %status, bytes = body.len(), "Bybit response");

        if status != StatusCode::OK {
            return Err(EngineError::MarketDataError(format!("Bybit {} returned {}", path, status)));
        }
        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        if envelope.ret_code != 0 {
            return Err(EngineError::MarketDataError(format!(
                "Bybit {} failed with code {}: {}",
                path, envelope.ret_code, envelope.ret_msg
            )));
        }
        envelope
            .result
            .ok_or_else(|| EngineError::MarketDataError(format!("Bybit {} returned no result", path)))
    }
}

#[async_trait]
impl MarketDataSource for BybitClient {
    async fn fetch_candles(&self, symbol: &str, interval: Interval, limit: usize) -> EngineResult<Vec<Candle>> {
        let query = [
            ("category", "spot".to_string()),
            ("symbol", symbol.to_string()),
            ("interval", Self::interval_code(interval).to_string()),
            ("limit", limit.to_string()),
        ];
        let result: KlineResult = self.get("/v5/market/kline", &query).await?;
        let candles = candles_from_rows(&result.list)?;
        tracing::debug!(symbol, %interval, count = candles.len(), "Fetched candles from Bybit");
        Ok(candles)
    }

    async fn fetch_current_price(&self, symbol: &str) -> EngineResult<f64> {
        let query = [("category", "spot".to_string()), ("symbol", symbol.to_string())];
        let result: TickerResult = self.get("/v5/market/tickers", &query).await?;
        let ticker = result
            .list
            .into_iter()
            .find(|t| t.symbol == symbol)
            .ok_or_else(|| EngineError::MarketDataError(format!("Bybit returned no ticker for {}", symbol)))?;
        parse_number(&ticker.last_price, "lastPrice")
    }
}

/// Kline rows arrive newest first as `[start_ms, open, high, low, close, volume, turnover]`.
fn candles_from_rows(rows: &[[String; 7]]) -> EngineResult<Vec<Candle>> {
    let mut candles = rows
        .iter()
        .map(|row| {
            let millis: i64 = row[0]
                .parse()
                .map_err(|_| EngineError::MarketDataError(format!("Invalid kline start time '{}'", row[0])))?;
            let timestamp = DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| EngineError::MarketDataError(format!("Kline start time {} is out of range", millis)))?;
            Ok(Candle {
                timestamp,
                open: parse_number(&row[1], "open")?,
                high: parse_number(&row[2], "high")?,
                low: parse_number(&row[3], "low")?,
                close: parse_number(&row[4], "close")?,
                volume: parse_number(&row[5], "volume")?,
            })
        })
        .collect::<EngineResult<Vec<_>>>()?;
    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

fn parse_number(raw: &str, field: &str) -> EngineResult<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EngineError::MarketDataError(format!("Invalid {} value '{}'", field, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KLINE_BODY: &str = r#"{
        "retCode": 0,
        "retMsg": "OK",
        "result": {
            "category": "spot",
            "symbol": "ETHUSDT",
            "list": [
                ["1709254800000", "3351.0", "3360.2", "3340.0", "3355.5", "812.4", "2722000.1"],
                ["1709251200000", "3340.1", "3351.0", "3322.4", "3351.0", "1520.33", "5080000.0"]
            ]
        }
    }"#;

    #[test]
    fn kline_rows_are_returned_oldest_first() {
        let envelope: Envelope<KlineResult> = serde_json::from_str(KLINE_BODY).unwrap();
        let candles = candles_from_rows(&envelope.result.unwrap().list).unwrap();
        assert_eq!(candles.len(), 2);
        assert!(candles[0].timestamp < candles[1].timestamp);
        assert_eq!(candles[0].open, 3340.1);
        assert_eq!(candles[1].close, 3355.5);
    }

    #[test]
    fn malformed_row_is_an_error() {
        let rows = [["abc".to_string(), "1".into(), "1".into(), "1".into(), "1".into(), "1".into(), "1".into()]];
        assert!(candles_from_rows(&rows).is_err());
        let rows = [["1709251200000".to_string(), "x".into(), "1".into(), "1".into(), "1".into(), "1".into(), "1".into()]];
        assert!(candles_from_rows(&rows).is_err());
    }

    #[test]
    fn ticker_envelope_parses() {
        let body = r#"{"retCode":0,"retMsg":"OK","result":{"category":"spot","list":[{"symbol":"SOLUSDT","lastPrice":"142.37","volume24h":"1"}]}}"#;
        let envelope: Envelope<TickerResult> = serde_json::from_str(body).unwrap();
        let ticker = &envelope.result.unwrap().list[0];
        assert_eq!(parse_number(&ticker.last_price, "lastPrice").unwrap(), 142.37);
    }

    #[test]
    fn interval_codes_match_the_api() {
        assert_eq!(BybitClient::interval_code(Interval::Hour1), "60");
        assert_eq!(BybitClient::interval_code(Interval::Day1), "D");
    }
}
