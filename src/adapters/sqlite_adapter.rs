//! SQLite market data adapter.
//!
//! Tables `daily_adjusted` and `technical_indicators`, keyed by
//! `(symbol, date)` with dates stored as `YYYY-MM-DD` text.

use crate::domain::bar::DailyBar;
use crate::domain::error::StonksError;
use crate::domain::snapshot::{IndicatorPair, IndicatorSnapshot};
use crate::ports::market_data_port::{MarketDataPort, LOOKBACK_DAYS};
use chrono::{Duration, NaiveDate};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};

const DATE_FORMAT: &str = "%Y-%m-%d";

const BAR_COLUMNS: &str = "symbol, date, open, high, low, close, adjusted_close, volume, \
                           dividend_amount, split_coefficient";

const INDICATOR_COLUMNS: &str = "symbol, date, sma15, sma20, sma50, sma100, sma200, \
                                 ema12, ema20, ema26, ema50, ema100, ema200, \
                                 macd, macd_hist, macd_signal, rsi, \
                                 bband_lower, bband_upper, bband_middle";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_err(e: rusqlite::Error) -> StonksError {
    StonksError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn date_text(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn bar_from_row(row: &Row<'_>) -> rusqlite::Result<DailyBar> {
    Ok(DailyBar {
        symbol: row.get(0)?,
        date: date_column(row, 1)?,
        open: row.get(2)?,
        high: row.get(3)?,
        low: row.get(4)?,
        close: row.get(5)?,
        adjusted_close: row.get(6)?,
        volume: row.get(7)?,
        dividend_amount: row.get(8)?,
        split_coefficient: row.get(9)?,
    })
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<IndicatorSnapshot> {
    Ok(IndicatorSnapshot {
        symbol: row.get(0)?,
        date: date_column(row, 1)?,
        sma15: row.get(2)?,
        sma20: row.get(3)?,
        sma50: row.get(4)?,
        sma100: row.get(5)?,
        sma200: row.get(6)?,
        ema12: row.get(7)?,
        ema20: row.get(8)?,
        ema26: row.get(9)?,
        ema50: row.get(10)?,
        ema100: row.get(11)?,
        ema200: row.get(12)?,
        macd: row.get(13)?,
        macd_hist: row.get(14)?,
        macd_signal: row.get(15)?,
        rsi: row.get(16)?,
        bband_lower: row.get(17)?,
        bband_upper: row.get(18)?,
        bband_middle: row.get(19)?,
    })
}

impl SqliteAdapter {
    pub fn open(db_path: &str, pool_size: u32) -> Result<Self, StonksError> {
        let manager = SqliteConnectionManager::file(db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size.max(1))
                .build(manager)
                .map_err(|e: r2d2::Error| StonksError::Database {
                    reason: e.to_string(),
                })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, StonksError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| StonksError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StonksError> {
        self.pool.get().map_err(|e: r2d2::Error| StonksError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), StonksError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS daily_adjusted (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                adjusted_close REAL NOT NULL,
                volume INTEGER NOT NULL,
                dividend_amount REAL NOT NULL DEFAULT 0,
                split_coefficient REAL NOT NULL DEFAULT 1,
                PRIMARY KEY (symbol, date)
            );
            CREATE TABLE IF NOT EXISTS technical_indicators (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                sma15 REAL, sma20 REAL, sma50 REAL, sma100 REAL, sma200 REAL,
                ema12 REAL, ema20 REAL, ema26 REAL, ema50 REAL, ema100 REAL, ema200 REAL,
                macd REAL, macd_hist REAL, macd_signal REAL,
                rsi REAL,
                bband_lower REAL, bband_upper REAL, bband_middle REAL,
                PRIMARY KEY (symbol, date)
            );",
        )
        .map_err(query_err)?;

        Ok(())
    }

    pub fn insert_bars(&self, bars: &[DailyBar]) -> Result<(), StonksError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for bar in bars {
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO daily_adjusted ({BAR_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    bar.symbol,
                    date_text(bar.date),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.adjusted_close,
                    bar.volume,
                    bar.dividend_amount,
                    bar.split_coefficient
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(())
    }

    pub fn insert_indicators(&self, snapshots: &[IndicatorSnapshot]) -> Result<(), StonksError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for s in snapshots {
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO technical_indicators ({INDICATOR_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                             ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
                ),
                params![
                    s.symbol,
                    date_text(s.date),
                    s.sma15,
                    s.sma20,
                    s.sma50,
                    s.sma100,
                    s.sma200,
                    s.ema12,
                    s.ema20,
                    s.ema26,
                    s.ema50,
                    s.ema100,
                    s.ema200,
                    s.macd,
                    s.macd_hist,
                    s.macd_signal,
                    s.rsi,
                    s.bband_lower,
                    s.bband_upper,
                    s.bband_middle
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(())
    }

    fn query_bars(
        &self,
        symbol: &str,
        from: Option<NaiveDate>,
        to: NaiveDate,
    ) -> Result<Option<DailyBar>, StonksError> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT {BAR_COLUMNS} FROM daily_adjusted
             WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date DESC LIMIT 1"
        );
        let from = from.map(date_text).unwrap_or_default();

        let mut stmt = conn.prepare(&query).map_err(query_err)?;
        let mut rows = stmt
            .query_map(params![symbol, from, date_text(to)], bar_from_row)
            .map_err(query_err)?;
        rows.next().transpose().map_err(query_err)
    }
}

impl MarketDataPort for SqliteAdapter {
    fn daily_bar(&self, symbol: &str, date: NaiveDate) -> Result<Option<DailyBar>, StonksError> {
        self.query_bars(symbol, Some(date - Duration::days(LOOKBACK_DAYS)), date)
    }

    fn indicator_pair(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<IndicatorPair>, StonksError> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT {INDICATOR_COLUMNS} FROM technical_indicators
             WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date DESC LIMIT 2"
        );
        let from = date - Duration::days(LOOKBACK_DAYS);

        let mut stmt = conn.prepare(&query).map_err(query_err)?;
        let rows = stmt
            .query_map(
                params![symbol, date_text(from), date_text(date)],
                snapshot_from_row,
            )
            .map_err(query_err)?;

        let mut latest_first = Vec::with_capacity(2);
        for row in rows {
            latest_first.push(row.map_err(query_err)?);
        }

        let mut latest_first = latest_first.into_iter();
        match (latest_first.next(), latest_first.next()) {
            (Some(current), Some(previous)) => Ok(Some(IndicatorPair::new(previous, current))),
            _ => Ok(None),
        }
    }

    fn latest_bar(
        &self,
        symbol: &str,
        on_or_before: NaiveDate,
    ) -> Result<Option<DailyBar>, StonksError> {
        self.query_bars(symbol, None, on_or_before)
    }

    fn list_symbols(&self) -> Result<Vec<String>, StonksError> {
        let conn = self.conn()?;

        let query = "SELECT DISTINCT symbol FROM daily_adjusted ORDER BY symbol";
        let mut stmt = conn.prepare(query).map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row.map_err(query_err)?);
        }
        Ok(symbols)
    }

    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StonksError> {
        let conn = self.conn()?;

        let query = "SELECT MIN(date), MAX(date), COUNT(*) FROM daily_adjusted WHERE symbol = ?1";

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(query, params![symbol], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(query_err)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let min = NaiveDate::parse_from_str(&min_str, DATE_FORMAT).map_err(
                    |e: chrono::ParseError| StonksError::Database {
                        reason: e.to_string(),
                    },
                )?;
                let max = NaiveDate::parse_from_str(&max_str, DATE_FORMAT).map_err(
                    |e: chrono::ParseError| StonksError::Database {
                        reason: e.to_string(),
                    },
                )?;
                Ok(Some((min, max, count as usize)))
            }
            _ => Ok(None),
        }
    }
}
