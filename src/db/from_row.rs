//! Row mapping for the store's tables.

use std::str::FromStr;

use rusqlite::{Connection, Row, ToSql, types::Type};

use crate::error::Result;
use crate::license::Term;
use crate::models::*;

pub const ORDER_COLS: &str =
    "out_trade_no, identity, term, amount, status, created_at, paid_at, gateway_trade_no";
pub const TOKEN_COLS: &str =
    "id, identity, term, purchase_time, signature, token, source, out_trade_no, created_at";
pub const TRIAL_COLS: &str = "identity, token, created_at";
pub const SUBSCRIPTION_COLS: &str = "identity, expire_at, is_lifetime, updated_at";

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Parse a TEXT column through `FromStr`, reporting bad values as conversion errors.
fn parse_col<T: FromStr>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            out_trade_no: row.get(0)?,
            identity: row.get(1)?,
            term: parse_col::<Term>(row, 2)?,
            amount: row.get(3)?,
            status: parse_col::<OrderStatus>(row, 4)?,
            created_at: row.get(5)?,
            paid_at: row.get(6)?,
            gateway_trade_no: row.get(7)?,
        })
    }
}

impl FromRow for TokenRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TokenRecord {
            id: row.get(0)?,
            identity: row.get(1)?,
            term: parse_col::<Term>(row, 2)?,
            purchase_time: row.get(3)?,
            signature: row.get(4)?,
            token: row.get(5)?,
            source: parse_col::<TokenSource>(row, 6)?,
            out_trade_no: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl FromRow for TrialRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TrialRecord {
            identity: row.get(0)?,
            token: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}

impl FromRow for SubscriptionRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SubscriptionRecord {
            identity: row.get(0)?,
            expire_at: row.get(1)?,
            is_lifetime: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }
}

pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(T::from_row(row)?)),
        None => Ok(None),
    }
}

pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| T::from_row(row))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
