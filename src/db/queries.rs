use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::error::{AppError, Result};
use crate::license::ActivationToken;
use crate::models::*;

use super::from_row::{
    ORDER_COLS, SUBSCRIPTION_COLS, TOKEN_COLS, TRIAL_COLS, query_all, query_one,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Orders ============

pub fn create_order(conn: &Connection, input: &CreateOrder) -> Result<Order> {
    let now = now();
    conn.execute(
        "INSERT INTO orders (out_trade_no, identity, term, amount, status, created_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
        params![
            &input.out_trade_no,
            &input.identity,
            input.term.code(),
            &input.amount,
            now
        ],
    )?;

    Ok(Order {
        out_trade_no: input.out_trade_no.clone(),
        identity: input.identity.clone(),
        term: input.term,
        amount: input.amount.clone(),
        status: OrderStatus::Pending,
        created_at: now,
        paid_at: None,
        gateway_trade_no: None,
    })
}

pub fn get_order(conn: &Connection, out_trade_no: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE out_trade_no = ?1", ORDER_COLS),
        &[&out_trade_no],
    )
}

pub fn list_orders_for_identity(conn: &Connection, identity: &str) -> Result<Vec<Order>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM orders WHERE identity = ?1 ORDER BY created_at DESC",
            ORDER_COLS
        ),
        &[&identity],
    )
}

/// Conditional `pending -> paid`. Returns false when the order was not pending.
pub fn mark_order_paid(
    conn: &Connection,
    out_trade_no: &str,
    gateway_trade_no: Option<&str>,
    paid_at: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET status = 'paid', paid_at = ?1, gateway_trade_no = ?2
         WHERE out_trade_no = ?3 AND status = 'pending'",
        params![paid_at, gateway_trade_no, out_trade_no],
    )?;
    Ok(affected > 0)
}

// ============ Activation tokens ============

pub fn insert_token(
    conn: &Connection,
    token: &ActivationToken,
    source: TokenSource,
    out_trade_no: Option<&str>,
) -> Result<TokenRecord> {
    let encoded = token.encode()?;
    let now = now();
    conn.execute(
        "INSERT INTO activation_tokens
            (identity, term, purchase_time, signature, token, source, out_trade_no, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &token.identity,
            token.term.code(),
            token.purchase_time,
            &token.signature,
            &encoded,
            source.as_ref(),
            out_trade_no,
            now
        ],
    )?;

    Ok(TokenRecord {
        id: conn.last_insert_rowid(),
        identity: token.identity.clone(),
        term: token.term,
        purchase_time: token.purchase_time,
        signature: token.signature.clone(),
        token: encoded,
        source,
        out_trade_no: out_trade_no.map(String::from),
        created_at: now,
    })
}

/// All tokens for an identity, oldest purchase first.
pub fn list_tokens_for_identity(conn: &Connection, identity: &str) -> Result<Vec<TokenRecord>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM activation_tokens WHERE identity = ?1
             ORDER BY purchase_time ASC, id ASC",
            TOKEN_COLS
        ),
        &[&identity],
    )
}

pub fn get_token_for_order(conn: &Connection, out_trade_no: &str) -> Result<Option<TokenRecord>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM activation_tokens WHERE out_trade_no = ?1",
            TOKEN_COLS
        ),
        &[&out_trade_no],
    )
}

pub fn count_tokens_for_identity(conn: &Connection, identity: &str) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM activation_tokens WHERE identity = ?1",
        params![identity],
        |row| row.get(0),
    )?)
}

// ============ Trials ============

pub fn get_trial(conn: &Connection, identity: &str) -> Result<Option<TrialRecord>> {
    query_one(
        conn,
        &format!("SELECT {} FROM trials WHERE identity = ?1", TRIAL_COLS),
        &[&identity],
    )
}

pub fn trial_exists(conn: &Connection, identity: &str) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM trials WHERE identity = ?1",
            params![identity],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

/// Result of an insert-if-absent trial grant.
#[derive(Debug, Clone)]
pub enum TrialGrant {
    /// This call created the trial and its token.
    Granted(TokenRecord),
    /// A trial already existed; its original token string.
    Existing(String),
}

/// Grant a trial at most once per identity.
///
/// Runs in an IMMEDIATE transaction so concurrent requests for the same
/// identity serialize: the first inserts the trial row and its token, later
/// ones see the row and get the same token string back.
pub fn grant_trial_atomic(
    conn: &mut Connection,
    identity: &str,
    mint: impl FnOnce() -> ActivationToken,
) -> Result<TrialGrant> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if let Some(existing) = get_trial(&tx, identity)? {
        return Ok(TrialGrant::Existing(existing.token));
    }

    let token = mint();
    let record = insert_token(&tx, &token, TokenSource::Trial, None)?;
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO trials (identity, token, created_at) VALUES (?1, ?2, ?3)",
        params![identity, &record.token, record.created_at],
    )?;
    if inserted == 0 {
        // Unreachable under the write lock, but never hand out a second trial.
        return Err(AppError::Internal(format!(
            "trial for {} appeared mid-transaction",
            identity
        )));
    }

    tx.commit()?;
    Ok(TrialGrant::Granted(record))
}

// ============ Payment confirmation ============

/// Result of the atomic paid transition.
#[derive(Debug, Clone)]
pub enum PaymentConfirmation {
    /// This call moved the order to paid and minted its token.
    Confirmed { order: Order, token: TokenRecord },
    /// The order was already paid; nothing was written.
    AlreadyPaid {
        order: Order,
        token: Option<TokenRecord>,
    },
}

/// Move an order from pending to paid and append its token, atomically.
///
/// The conditional UPDATE inside an IMMEDIATE transaction is what makes
/// webhook and polling races safe: exactly one caller sees the row change.
pub fn confirm_payment_atomic(
    conn: &mut Connection,
    out_trade_no: &str,
    gateway_trade_no: Option<&str>,
    mint: impl FnOnce(&Order, i64) -> ActivationToken,
) -> Result<PaymentConfirmation> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let order = get_order(&tx, out_trade_no)?
        .ok_or_else(|| AppError::OrderNotFound(out_trade_no.to_string()))?;

    let paid_at = now();
    if !mark_order_paid(&tx, out_trade_no, gateway_trade_no, paid_at)? {
        let token = get_token_for_order(&tx, out_trade_no)?;
        return Ok(PaymentConfirmation::AlreadyPaid { order, token });
    }

    let token = mint(&order, paid_at);
    let record = insert_token(&tx, &token, TokenSource::Order, Some(out_trade_no))?;
    tx.commit()?;

    Ok(PaymentConfirmation::Confirmed {
        order: Order {
            status: OrderStatus::Paid,
            paid_at: Some(paid_at),
            gateway_trade_no: gateway_trade_no.map(String::from),
            ..order
        },
        token: record,
    })
}

// ============ Subscriptions ============

pub fn upsert_subscription(
    conn: &Connection,
    identity: &str,
    expire_at: i64,
    is_lifetime: bool,
) -> Result<SubscriptionRecord> {
    let now = now();
    conn.execute(
        "INSERT INTO subscriptions (identity, expire_at, is_lifetime, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(identity) DO UPDATE SET
            expire_at = excluded.expire_at,
            is_lifetime = excluded.is_lifetime,
            updated_at = excluded.updated_at",
        params![identity, expire_at, is_lifetime, now],
    )?;
    Ok(SubscriptionRecord {
        identity: identity.to_string(),
        expire_at,
        is_lifetime,
        updated_at: now,
    })
}

pub fn get_subscription(conn: &Connection, identity: &str) -> Result<Option<SubscriptionRecord>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM subscriptions WHERE identity = ?1",
            SUBSCRIPTION_COLS
        ),
        &[&identity],
    )
}

// ============ Rate limits ============

/// Fixed-window hit against the shared table. Returns the count in the
/// current window including this hit.
pub fn rate_limit_hit(conn: &Connection, key: &str, now_ms: i64, window_ms: i64) -> Result<u32> {
    let count: i64 = conn.query_row(
        "INSERT INTO rate_limits (key, window_start, count) VALUES (?1, ?2, 1)
         ON CONFLICT(key) DO UPDATE SET
            count = CASE WHEN ?2 - window_start > ?3 THEN 1 ELSE count + 1 END,
            window_start = CASE WHEN ?2 - window_start > ?3 THEN ?2 ELSE window_start END
         RETURNING count",
        params![key, now_ms, window_ms],
        |row| row.get(0),
    )?;
    Ok(count.clamp(0, u32::MAX as i64) as u32)
}
