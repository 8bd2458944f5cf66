use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use common::{
    normalize_symbol, require_candles, Candle, CandleSeries, Error, MarketDataProvider, Result,
    Timeframe,
};

/// Binance caps a klines response at this many bars.
const MAX_KLINES_PER_REQUEST: usize = 1000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for Binance's public market data REST API. No API key is needed
/// for klines.
pub struct BinanceClient {
    base_url: String,
    http: Client,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        start_ms: Option<i64>,
        end_ms: Option<i64>,
    ) -> Result<Vec<Candle>> {
        let mut url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            normalize_symbol(symbol),
            timeframe,
            limit
        );
        if let Some(start) = start_ms {
            url.push_str(&format!("&startTime={start}"));
        }
        if let Some(end) = end_ms {
            url.push_str(&format!("&endTime={end}"));
        }

        debug!(%symbol, %timeframe, limit, "Fetching klines");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::DataUnavailable(format!("{symbol} {timeframe}: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::DataUnavailable(format!("{symbol} {timeframe}: {e}")))?;

        if !status.is_success() {
            return Err(Error::DataUnavailable(format!(
                "{symbol} {timeframe}: HTTP {status}: {body}"
            )));
        }
        parse_klines(&body)
    }
}

#[async_trait]
impl MarketDataProvider for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<CandleSeries> {
        // Page backwards from now until `limit` bars are collected.
        let mut pages: Vec<Vec<Candle>> = Vec::new();
        let mut remaining = limit;
        let mut end_ms: Option<i64> = None;

        while remaining > 0 {
            let take = remaining.min(MAX_KLINES_PER_REQUEST);
            let page = self.klines(symbol, timeframe, take, None, end_ms).await?;
            let Some(first) = page.first() else {
                break;
            };
            end_ms = Some(first.timestamp.timestamp_millis() - 1);
            remaining = remaining.saturating_sub(page.len());
            let exhausted = page.len() < take;
            pages.push(page);
            if exhausted {
                break;
            }
        }

        pages.reverse();
        require_candles(CandleSeries::new(pages.concat())?, symbol, timeframe)
    }

    async fn fetch_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<CandleSeries> {
        if start > end {
            return Err(Error::InvalidConfiguration(format!(
                "range start {start} is after end {end}"
            )));
        }
        let end_ms = end.timestamp_millis();
        let mut cursor = start.timestamp_millis();
        let mut candles = Vec::new();

        while cursor <= end_ms {
            let page = self
                .klines(symbol, timeframe, MAX_KLINES_PER_REQUEST, Some(cursor), Some(end_ms))
                .await?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = last.timestamp.timestamp_millis() + 1;
            let exhausted = page.len() < MAX_KLINES_PER_REQUEST;
            candles.extend(page);
            if exhausted {
                break;
            }
        }

        debug!(%symbol, %timeframe, candles = candles.len(), "Fetched range");
        require_candles(CandleSeries::new(candles)?, symbol, timeframe)
    }
}

// ─── Response parsing ─────────────────────────────────────────────────────────

/// Parse a `/api/v3/klines` body.
///
/// Each row is `[openTime, open, high, low, close, volume, closeTime, ...]`
/// with prices as decimal strings.
pub fn parse_klines(body: &str) -> Result<Vec<Candle>> {
    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|e| Error::Exchange(format!("klines: {e}")))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let open_time = row
                .first()
                .and_then(Value::as_i64)
                .ok_or_else(|| Error::Exchange(format!("kline {i}: missing open time")))?;
            let timestamp = Utc
                .timestamp_millis_opt(open_time)
                .single()
                .ok_or_else(|| Error::Exchange(format!("kline {i}: bad open time {open_time}")))?;
            Ok(Candle::new(
                timestamp,
                number(row, i, 1)?,
                number(row, i, 2)?,
                number(row, i, 3)?,
                number(row, i, 4)?,
                number(row, i, 5)?,
            ))
        })
        .collect()
}

fn number(row: &[Value], kline: usize, field: usize) -> Result<f64> {
    let parsed = match row.get(field) {
        Some(Value::String(s)) => s.parse::<f64>().ok(),
        Some(Value::Number(n)) => n.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| Error::Exchange(format!("kline {kline}: bad field {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_binance_rows() {
        let body = r#"[
            [1700000000000,"37000.10","37100.00","36950.50","37050.00","123.45",1700014399999,"0",10,"0","0","0"],
            [1700014400000,"37050.00","37200.00","37000.00","37150.00","99.00",1700028799999,"0",8,"0","0","0"]
        ]"#;
        let candles = parse_klines(body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open, 37000.10);
        assert_eq!(candles[0].volume, 123.45);
        assert_eq!(candles[1].timestamp.timestamp_millis(), 1_700_014_400_000);
    }

    #[test]
    fn rejects_short_rows() {
        let err = parse_klines(r#"[[1700000000000,"1.0","2.0"]]"#).unwrap_err();
        assert!(matches!(err, Error::Exchange(_)));
    }

    #[test]
    fn rejects_non_array_body() {
        assert!(parse_klines(r#"{"code":-1121,"msg":"Invalid symbol."}"#).is_err());
    }

    #[test]
    fn empty_body_is_empty() {
        assert!(parse_klines("[]").unwrap().is_empty());
    }

    /// Serves one canned HTTP response on a local port.
    async fn serve_once(body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn empty_klines_are_data_unavailable() {
        let client = BinanceClient::new(serve_once("[]").await).unwrap();
        let err = client
            .fetch_candles("NOPE/USDT", Timeframe::H1, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DataUnavailable(_)));
    }
}
