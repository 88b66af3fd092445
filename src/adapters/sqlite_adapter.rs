//! SQLite market data provider and signal ledger.
//!
//! Tables: `tickers` (listing per market), `ohlcv` (daily bars) and
//! `signals` (ledger rows, one per date/code/screen).

use crate::domain::error::ScannerError;
use crate::domain::matches::LedgerRow;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::universe::Ticker;
use crate::ports::data_port::MarketDataPort;
use crate::ports::ledger_port::LedgerPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_POOL_SIZE: u32 = 4;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn db_error(e: impl std::fmt::Display) -> ScannerError {
    ScannerError::Database {
        reason: e.to_string(),
    }
}

fn parse_date(text: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

impl SqliteAdapter {
    /// Open (or create) the database at `path` and make sure the schema exists.
    pub fn open(path: &str) -> Result<Self, ScannerError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(DEFAULT_POOL_SIZE)
            .build(manager)
            .map_err(|e: r2d2::Error| db_error(e))?;
        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, ScannerError> {
        // every in-memory connection is its own database, so keep exactly one
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| db_error(e))?;
        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, ScannerError> {
        self.pool.get().map_err(|e: r2d2::Error| db_error(e))
    }

    pub fn initialize_schema(&self) -> Result<(), ScannerError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tickers (
                market TEXT NOT NULL,
                code TEXT NOT NULL,
                name TEXT,
                listed_from TEXT,
                delisted_on TEXT,
                PRIMARY KEY (market, code)
            );
            CREATE TABLE IF NOT EXISTS ohlcv (
                code TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                PRIMARY KEY (code, date)
            );
            CREATE TABLE IF NOT EXISTS signals (
                date TEXT NOT NULL,
                code TEXT NOT NULL,
                screen TEXT NOT NULL,
                close REAL NOT NULL,
                PRIMARY KEY (date, code, screen)
            );
            CREATE INDEX IF NOT EXISTS idx_ohlcv_date ON ohlcv(date);",
        )
        .map_err(|e: rusqlite::Error| db_error(e))
    }

    pub fn insert_ticker(
        &self,
        market: &str,
        ticker: &Ticker,
        listed_from: Option<NaiveDate>,
        delisted_on: Option<NaiveDate>,
    ) -> Result<(), ScannerError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO tickers (market, code, name, listed_from, delisted_on)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                market.to_uppercase(),
                ticker.code,
                ticker.name,
                listed_from.map(|d| d.format(DATE_FORMAT).to_string()),
                delisted_on.map(|d| d.format(DATE_FORMAT).to_string()),
            ],
        )
        .map_err(|e: rusqlite::Error| db_error(e))?;
        Ok(())
    }

    pub fn insert_bars(&self, code: &str, bars: &[OhlcvBar]) -> Result<(), ScannerError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| db_error(e))?;

        for bar in bars {
            let volume = i64::try_from(bar.volume).map_err(db_error)?;
            tx.execute(
                "INSERT OR REPLACE INTO ohlcv (code, date, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    code,
                    bar.date.format(DATE_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    volume
                ],
            )
            .map_err(|e: rusqlite::Error| db_error(e))?;
        }

        tx.commit().map_err(|e: rusqlite::Error| db_error(e))
    }

    /// Ledger rows recorded for `date`, ordered by code then screen.
    pub fn signals_on(&self, date: NaiveDate) -> Result<Vec<LedgerRow>, ScannerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, code, screen, close FROM signals
                 WHERE date = ?1 ORDER BY code, screen",
            )
            .map_err(|e: rusqlite::Error| db_error(e))?;
        let rows = stmt
            .query_map(params![date.format(DATE_FORMAT).to_string()], |row| {
                let date: String = row.get(0)?;
                Ok(LedgerRow {
                    date: parse_date(&date)?,
                    code: row.get(1)?,
                    screen: row.get(2)?,
                    close: row.get(3)?,
                })
            })
            .map_err(|e: rusqlite::Error| db_error(e))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e: rusqlite::Error| db_error(e))
    }
}

impl MarketDataPort for SqliteAdapter {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScannerError> {
        let conn = self.conn()?;

        let known: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM ohlcv WHERE code = ?1)
                     OR EXISTS(SELECT 1 FROM tickers WHERE code = ?1)",
                params![code],
                |row| row.get(0),
            )
            .map_err(|e: rusqlite::Error| db_error(e))?;
        if !known {
            return Err(ScannerError::NoData {
                code: code.to_string(),
            });
        }

        let mut stmt = conn
            .prepare(
                "SELECT date, open, high, low, close, volume
                 FROM ohlcv
                 WHERE code = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(|e: rusqlite::Error| db_error(e))?;

        let rows = stmt
            .query_map(
                params![
                    code,
                    start.format(DATE_FORMAT).to_string(),
                    end.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    let date: String = row.get(0)?;
                    let volume: i64 = row.get(5)?;
                    Ok(OhlcvBar {
                        date: parse_date(&date)?,
                        open: row.get(1)?,
                        high: row.get(2)?,
                        low: row.get(3)?,
                        close: row.get(4)?,
                        volume: volume.max(0) as u64,
                    })
                },
            )
            .map_err(|e: rusqlite::Error| db_error(e))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e: rusqlite::Error| ScannerError::InvalidSeries {
                code: code.to_string(),
                reason: e.to_string(),
            })
    }

    fn ticker_name(&self, code: &str) -> Result<Option<String>, ScannerError> {
        let conn = self.conn()?;
        let name: Option<Option<String>> = conn
            .query_row(
                "SELECT name FROM tickers WHERE code = ?1 ORDER BY market LIMIT 1",
                params![code],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e: rusqlite::Error| db_error(e))?;
        Ok(name.flatten().filter(|n| !n.trim().is_empty()))
    }

    fn list_tickers(&self, market: &str, as_of: NaiveDate) -> Result<Vec<Ticker>, ScannerError> {
        let conn = self.conn()?;
        let as_of = as_of.format(DATE_FORMAT).to_string();
        let mut stmt = conn
            .prepare(
                "SELECT code, name FROM tickers
                 WHERE market = ?1
                   AND (listed_from IS NULL OR listed_from <= ?2)
                   AND (delisted_on IS NULL OR delisted_on > ?2)
                 ORDER BY code",
            )
            .map_err(|e: rusqlite::Error| db_error(e))?;
        let rows = stmt
            .query_map(params![market.to_uppercase(), as_of], |row| {
                Ok(Ticker {
                    code: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .map_err(|e: rusqlite::Error| db_error(e))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e: rusqlite::Error| db_error(e))
    }
}

impl LedgerPort for SqliteAdapter {
    fn name(&self) -> &str {
        "sqlite"
    }

    /// Re-running a day does not duplicate rows.
    fn append(&self, row: &LedgerRow) -> Result<(), ScannerError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO signals (date, code, screen, close) VALUES (?1, ?2, ?3, ?4)",
            params![
                row.date.format(DATE_FORMAT).to_string(),
                row.code,
                row.screen,
                row.close
            ],
        )
        .map_err(|e: rusqlite::Error| ScannerError::Sink {
            sink: "sqlite".into(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn bar(date: NaiveDate, close: f64, volume: u64) -> OhlcvBar {
        OhlcvBar {
            date,
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume,
        }
    }

    fn seeded() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter
            .insert_ticker("KOSPI", &Ticker::named("005930", "삼성전자"), None, None)
            .unwrap();
        adapter
            .insert_ticker(
                "KOSPI",
                &Ticker::new("000660"),
                Some(d(2024, 2, 1)),
                None,
            )
            .unwrap();
        adapter
            .insert_ticker(
                "KOSDAQ",
                &Ticker::named("091990", "셀트리온헬스케어"),
                None,
                Some(d(2024, 1, 10)),
            )
            .unwrap();
        adapter
            .insert_bars(
                "005930",
                &[
                    bar(d(2024, 1, 2), 100.5, 1000),
                    bar(d(2024, 1, 3), 101.5, 1500),
                    bar(d(2024, 1, 4), 99.0, 900),
                ],
            )
            .unwrap();
        adapter
    }

    #[test]
    fn in_memory_initialization_is_idempotent() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn fetch_ohlcv_returns_range_in_order() {
        let adapter = seeded();
        let fetched = adapter
            .fetch_ohlcv("005930", d(2024, 1, 3), d(2024, 1, 4))
            .unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].date, d(2024, 1, 3));
        assert_eq!(fetched[0].close, 101.5);
        assert_eq!(fetched[1].volume, 900);
    }

    #[test]
    fn fetch_ohlcv_known_ticker_without_bars_is_empty() {
        let adapter = seeded();
        let fetched = adapter
            .fetch_ohlcv("000660", d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        assert!(fetched.is_empty());
    }

    #[test]
    fn fetch_ohlcv_unknown_ticker_is_no_data() {
        let adapter = seeded();
        let result = adapter.fetch_ohlcv("999999", d(2024, 1, 1), d(2024, 1, 31));
        assert!(matches!(result, Err(ScannerError::NoData { .. })));
    }

    #[test]
    fn list_tickers_filters_by_market_and_listing_dates() {
        let adapter = seeded();
        let tickers = adapter.list_tickers("kospi", d(2024, 1, 15)).unwrap();
        assert_eq!(tickers, vec![Ticker::named("005930", "삼성전자")]);

        let tickers = adapter.list_tickers("KOSPI", d(2024, 2, 1)).unwrap();
        assert_eq!(tickers.len(), 2);

        assert!(adapter.list_tickers("KOSDAQ", d(2024, 1, 10)).unwrap().is_empty());
    }

    #[test]
    fn ticker_name_lookup() {
        let adapter = seeded();
        assert_eq!(
            adapter.ticker_name("005930").unwrap().as_deref(),
            Some("삼성전자")
        );
        assert_eq!(adapter.ticker_name("000660").unwrap(), None);
        assert_eq!(adapter.ticker_name("nope").unwrap(), None);
    }

    #[test]
    fn ledger_append_is_idempotent() {
        let adapter = seeded();
        let row = LedgerRow {
            date: d(2024, 1, 4),
            code: "005930".into(),
            screen: "MACD-GC".into(),
            close: 99.0,
        };
        adapter.append(&row).unwrap();
        adapter.append(&row).unwrap();
        let rows = adapter.signals_on(d(2024, 1, 4)).unwrap();
        assert_eq!(rows, vec![row]);
        assert!(adapter.signals_on(d(2024, 1, 5)).unwrap().is_empty());
    }

    #[test]
    fn open_creates_file_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sigscan.db");
        let path = path.to_string_lossy();
        {
            let adapter = SqliteAdapter::open(&path).unwrap();
            adapter
                .insert_ticker("KOSPI", &Ticker::new("005930"), None, None)
                .unwrap();
        }
        let reopened = SqliteAdapter::open(&path).unwrap();
        assert_eq!(reopened.list_tickers("KOSPI", d(2024, 1, 1)).unwrap().len(), 1);
    }
}
