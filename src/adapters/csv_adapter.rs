//! CSV directory market data adapter.
//!
//! Layout under the base directory:
//! - `<MARKET>.csv`: listing with `code,name[,listed_from,delisted_on]`
//! - `bars/<code>.csv`: daily bars
//!
//! Columns are matched by header name in any order. Bar files may use the
//! English (`date,open,high,low,close,volume`) or Korean
//! (`날짜,시가,고가,저가,종가,거래량`) header.

use crate::domain::error::ScannerError;
use crate::domain::ohlcv::{OhlcvBar, parse_bar_date};
use crate::domain::universe::Ticker;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct BarRecord {
    #[serde(alias = "Date", alias = "날짜", alias = "일자")]
    date: String,
    #[serde(alias = "Open", alias = "시가")]
    open: f64,
    #[serde(alias = "High", alias = "고가")]
    high: f64,
    #[serde(alias = "Low", alias = "저가")]
    low: f64,
    #[serde(alias = "Close", alias = "종가")]
    close: f64,
    #[serde(alias = "Volume", alias = "거래량")]
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct ListingRecord {
    #[serde(alias = "Code", alias = "종목코드")]
    code: String,
    #[serde(default, alias = "Name", alias = "종목명")]
    name: Option<String>,
    #[serde(default)]
    listed_from: Option<String>,
    #[serde(default)]
    delisted_on: Option<String>,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn bars_path(&self, code: &str) -> PathBuf {
        self.base_path.join("bars").join(format!("{}.csv", code))
    }

    fn listing_path(&self, market: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", market.to_uppercase()))
    }

    fn read_listing(&self, path: &Path, market: &str) -> Result<Vec<ListingRecord>, ScannerError> {
        let provider_error = |reason: String| ScannerError::Provider {
            code: market.to_string(),
            reason,
        };
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| provider_error(format!("failed to read {}: {}", path.display(), e)))?;
        rdr.deserialize()
            .collect::<Result<Vec<ListingRecord>, _>>()
            .map_err(|e| provider_error(format!("listing parse error: {}", e)))
    }
}

fn parse_optional_date(text: &Option<String>) -> Option<NaiveDate> {
    text.as_deref()
        .filter(|t| !t.trim().is_empty())
        .and_then(parse_bar_date)
}

impl ListingRecord {
    /// Listed on `as_of`: on or after `listed_from` and before `delisted_on`.
    fn listed_on(&self, as_of: NaiveDate) -> bool {
        let from_ok = parse_optional_date(&self.listed_from).is_none_or(|d| d <= as_of);
        let until_ok = parse_optional_date(&self.delisted_on).is_none_or(|d| as_of < d);
        from_ok && until_ok
    }

    fn display_name(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }
}

impl MarketDataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScannerError> {
        let path = self.bars_path(code);
        if !path.exists() {
            return Err(ScannerError::NoData {
                code: code.to_string(),
            });
        }
        let invalid = |reason: String| ScannerError::InvalidSeries {
            code: code.to_string(),
            reason,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| ScannerError::Provider {
                code: code.to_string(),
                reason: format!("failed to read {}: {}", path.display(), e),
            })?;

        let mut bars = Vec::new();
        for (row, result) in rdr.deserialize::<BarRecord>().enumerate() {
            let record = result.map_err(|e| invalid(format!("CSV parse error: {}", e)))?;
            let date = parse_bar_date(&record.date).ok_or_else(|| {
                invalid(format!("row {}: invalid date '{}'", row + 1, record.date))
            })?;
            if date < start || date > end {
                continue;
            }
            if !record.volume.is_finite() || record.volume < 0.0 {
                return Err(invalid(format!("row {}: invalid volume", row + 1)));
            }
            bars.push(OhlcvBar {
                date,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume.round() as u64,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn ticker_name(&self, code: &str) -> Result<Option<String>, ScannerError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| ScannerError::Provider {
            code: code.to_string(),
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut listings: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        listings.sort();

        for path in listings {
            let market = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let records = self.read_listing(&path, &market)?;
            if let Some(record) = records.iter().find(|r| r.code == code) {
                return Ok(record.display_name());
            }
        }
        Ok(None)
    }

    fn list_tickers(&self, market: &str, as_of: NaiveDate) -> Result<Vec<Ticker>, ScannerError> {
        let path = self.listing_path(market);
        let records = self.read_listing(&path, market)?;
        Ok(records
            .into_iter()
            .filter(|r| r.listed_on(as_of))
            .map(|r| Ticker {
                name: r.display_name(),
                code: r.code,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        fs::create_dir(path.join("bars")).unwrap();

        fs::write(
            path.join("bars/005930.csv"),
            "date,open,high,low,close,volume\n\
             2024-01-17,110.0,120.0,105.0,115.0,55000\n\
             2024-01-15,100.0,110.0,90.0,105.0,50000\n\
             2024-01-16,105.0,115.0,100.0,110.0,60000\n",
        )
        .unwrap();
        fs::write(
            path.join("bars/091990.csv"),
            "거래량,날짜,종가,시가,고가,저가\n\
             1200,20240115,51000,50000,52000,49500\n",
        )
        .unwrap();
        fs::write(
            path.join("bars/BROKEN.csv"),
            "date,open,high,low,close,volume\n2024-01-15,abc,1,1,1,1\n",
        )
        .unwrap();

        fs::write(
            path.join("KOSPI.csv"),
            "code,name,listed_from,delisted_on\n\
             005930,삼성전자,,\n\
             000660,SK하이닉스,2024-02-01,\n\
             001234,Gone Co,,2024-01-10\n",
        )
        .unwrap();
        fs::write(path.join("KOSDAQ.csv"), "code,name\n091990,셀트리온헬스케어\n").unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_ohlcv_returns_sorted_bars() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter
            .fetch_ohlcv("005930", d(2024, 1, 15), d(2024, 1, 17))
            .unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, d(2024, 1, 15));
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000);
        assert_eq!(bars[2].date, d(2024, 1, 17));
    }

    #[test]
    fn fetch_ohlcv_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter
            .fetch_ohlcv("005930", d(2024, 1, 16), d(2024, 1, 16))
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, d(2024, 1, 16));
    }

    #[test]
    fn fetch_ohlcv_reads_korean_header_in_any_order() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter
            .fetch_ohlcv("091990", d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].open, 50000.0);
        assert_eq!(bars[0].close, 51000.0);
        assert_eq!(bars[0].volume, 1200);
    }

    #[test]
    fn fetch_ohlcv_missing_file_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let result = adapter.fetch_ohlcv("XYZ", d(2024, 1, 1), d(2024, 1, 31));
        assert!(matches!(result, Err(ScannerError::NoData { code }) if code == "XYZ"));
    }

    #[test]
    fn fetch_ohlcv_bad_row_is_invalid_series() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let result = adapter.fetch_ohlcv("BROKEN", d(2024, 1, 1), d(2024, 1, 31));
        assert!(matches!(result, Err(ScannerError::InvalidSeries { .. })));
    }

    #[test]
    fn list_tickers_respects_listing_dates() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let tickers = adapter.list_tickers("KOSPI", d(2024, 1, 15)).unwrap();
        let codes: Vec<&str> = tickers.iter().map(|t| t.code.as_str()).collect();
        assert_eq!(codes, vec!["005930"]);
        assert_eq!(tickers[0].name.as_deref(), Some("삼성전자"));

        let tickers = adapter.list_tickers("kospi", d(2024, 3, 1)).unwrap();
        assert_eq!(tickers.len(), 2);
    }

    #[test]
    fn list_tickers_unknown_market_is_provider_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let result = adapter.list_tickers("NYSE", d(2024, 1, 15));
        assert!(matches!(result, Err(ScannerError::Provider { .. })));
    }

    #[test]
    fn ticker_name_searches_all_listings() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        assert_eq!(
            adapter.ticker_name("091990").unwrap().as_deref(),
            Some("셀트리온헬스케어")
        );
        assert_eq!(adapter.ticker_name("999999").unwrap(), None);
    }
}
