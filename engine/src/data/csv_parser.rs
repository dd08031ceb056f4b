use chrono::{DateTime, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use shared::models::Candle;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{EngineError, EngineResult};

// Module for the timestamp and number formats found in exchange CSV exports.
pub mod exchange_format {
    use super::*;

    /// Epoch milliseconds, RFC 3339, or `YYYY-MM-DD HH:MM:SS` (UTC).
    pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
        let s = s.trim();
        if let Ok(millis) = s.parse::<i64>() {
            return DateTime::from_timestamp_millis(millis).ok_or_else(|| format!("Timestamp '{}' is out of range", s));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("Failed to parse timestamp '{}': {}", s, e))
    }

    pub fn parse_price(s: &str) -> Result<f64, String> {
        let value: f64 = s.trim().parse().map_err(|e| format!("Failed to parse number '{}': {}", s, e))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(format!("Number '{}' is not finite", s))
        }
    }

}

pub struct CandleCsvParser;

impl CandleCsvParser {
    // CSV Header: timestamp,open,high,low,close,volume
    // Example Row: 2024-03-01 00:00:00,3340.1,3351.0,3322.4,3345.9,1520.33
    pub fn load_candles_from_csv(file_path: &Path) -> EngineResult<Vec<Candle>> {
        let file = File::open(file_path).map_err(|e| {
            EngineError::MarketDataError(format!("Failed to open CSV file '{}': {}", file_path.display(), e))
        })?;
        let candles = Self::read_candles(BufReader::new(file))?;
        tracing::debug!(path = %file_path.display(), count = candles.len(), "Loaded candles from CSV");
        Ok(candles)
    }

    /// Parses candles and returns them ascending by timestamp, one per timestamp.
    pub fn read_candles<R: Read>(reader: R) -> EngineResult<Vec<Candle>> {
        let mut rdr = ReaderBuilder::new().has_headers(true).trim(Trim::All).from_reader(reader);
        let headers = rdr.headers()?.clone();

        let mut candles = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let line = idx + 2;
            let record = result.map_err(|e| EngineError::CsvDataFormatError(format!("Error reading CSV record at line {}: {}", line, e)))?;

            let timestamp_str = Self::required_field(&record, &headers, "timestamp", line)?;
            let timestamp = exchange_format::parse_timestamp(timestamp_str)
                .map_err(|e| EngineError::CsvDataFormatError(format!("Error parsing 'timestamp' at line {}: {}", line, e)))?;

            let open = Self::price_field(&record, &headers, "open", line)?;
            let high = Self::price_field(&record, &headers, "high", line)?;
            let low = Self::price_field(&record, &headers, "low", line)?;
            let close = Self::price_field(&record, &headers, "close", line)?;
            let volume = Self::price_field(&record, &headers, "volume", line)?;

            candles.push(Candle { timestamp, open, high, low, close, volume });
        }

        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);
        Ok(candles)
    }

    fn price_field(record: &StringRecord, headers: &StringRecord, name: &str, line: usize) -> EngineResult<f64> {
        let raw = Self::required_field(record, headers, name, line)?;
        exchange_format::parse_price(raw)
            .map_err(|e| EngineError::CsvDataFormatError(format!("Error parsing '{}' at line {}: {}", name, line, e)))
    }

    fn required_field<'a>(record: &'a StringRecord, headers: &StringRecord, name: &str, line: usize) -> EngineResult<&'a str> {
        Self::get_field(record, headers, name)
            .ok_or_else(|| EngineError::CsvDataFormatError(format!("Missing '{}' field in CSV record at line {}", name, line)))
    }

    // Looks a field up by header name so column order does not matter.
    fn get_field<'a>(record: &'a StringRecord, headers: &StringRecord, name: &str) -> Option<&'a str> {
        headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))
            .and_then(|pos| record.get(pos))
    }
}
