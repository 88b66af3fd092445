//! HTTP/JSON market data provider.
//!
//! Endpoints, relative to the configured base URL:
//! - `GET /markets/{market}/tickers?date=YYYY-MM-DD`
//! - `GET /tickers/{code}`
//! - `GET /tickers/{code}/bars?start=YYYY-MM-DD&end=YYYY-MM-DD`
//!
//! A 404 on a ticker endpoint means the provider does not know the code.

use crate::domain::error::ScannerError;
use crate::domain::ohlcv::{OhlcvBar, parse_bar_date};
use crate::domain::universe::Ticker;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct TickerRecord {
    #[serde(alias = "ticker", alias = "symbol", alias = "종목코드")]
    code: String,
    #[serde(default, alias = "종목명")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BarRecord {
    #[serde(alias = "날짜")]
    date: String,
    #[serde(alias = "시가")]
    open: f64,
    #[serde(alias = "고가")]
    high: f64,
    #[serde(alias = "저가")]
    low: f64,
    #[serde(alias = "종가")]
    close: f64,
    #[serde(alias = "거래량")]
    volume: f64,
}

pub struct HttpDataAdapter {
    client: Client,
    base_url: String,
}

impl HttpDataAdapter {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ScannerError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sigscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScannerError::Provider {
                code: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET `path` and decode the JSON body. `Ok(None)` on 404.
    fn get_json<T: DeserializeOwned>(
        &self,
        code: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, ScannerError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "provider request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .map_err(|e| request_error(code, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ScannerError::Provider {
                code: code.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let text = response.text().map_err(|e| request_error(code, e))?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ScannerError::InvalidSeries {
                code: code.to_string(),
                reason: format!("malformed response: {}", e),
            })
    }
}

fn request_error(code: &str, e: reqwest::Error) -> ScannerError {
    if e.is_timeout() {
        ScannerError::ProviderTimeout {
            code: code.to_string(),
        }
    } else {
        ScannerError::Provider {
            code: code.to_string(),
            reason: e.to_string(),
        }
    }
}

fn ymd(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl MarketDataPort for HttpDataAdapter {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScannerError> {
        let records: Vec<BarRecord> = self
            .get_json(
                code,
                &format!("/tickers/{}/bars", code),
                &[("start", ymd(start)), ("end", ymd(end))],
            )?
            .ok_or_else(|| ScannerError::NoData {
                code: code.to_string(),
            })?;

        let mut bars = Vec::with_capacity(records.len());
        for record in records {
            let date = parse_bar_date(&record.date).ok_or_else(|| ScannerError::InvalidSeries {
                code: code.to_string(),
                reason: format!("invalid date '{}'", record.date),
            })?;
            if date < start || date > end {
                continue;
            }
            bars.push(OhlcvBar {
                date,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume.max(0.0).round() as u64,
            });
        }
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn ticker_name(&self, code: &str) -> Result<Option<String>, ScannerError> {
        let record: Option<TickerRecord> =
            self.get_json(code, &format!("/tickers/{}", code), &[])?;
        Ok(record
            .and_then(|r| r.name)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()))
    }

    fn list_tickers(&self, market: &str, as_of: NaiveDate) -> Result<Vec<Ticker>, ScannerError> {
        let records: Vec<TickerRecord> = self
            .get_json(
                market,
                &format!("/markets/{}/tickers", market.to_uppercase()),
                &[("date", ymd(as_of))],
            )?
            .ok_or_else(|| ScannerError::Provider {
                code: market.to_string(),
                reason: "unknown market".to_string(),
            })?;
        Ok(records
            .into_iter()
            .map(|r| Ticker {
                code: r.code,
                name: r.name,
            })
            .collect())
    }
}
