//! Folds a holder's activation tokens into a single expiration instant.
//!
//! Tokens are folded in purchase order. A purchase made while earlier coverage
//! is still running stacks on top of it; a purchase made after coverage lapsed
//! starts fresh from its own purchase time. A lifetime token ends the fold.
//!
//! The result is always recomputed from the full token set, never patched.

use chrono::{DateTime, Months};
use serde::Serialize;

use super::{ActivationToken, Term};

const SECONDS_PER_DAY: i64 = 86400;
const LIFETIME_YEARS: u32 = 99;

/// Outcome of folding a token set. Validity against "now" is a separate step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Accumulation {
    /// Unix seconds; 0 when there are no tokens.
    pub expire_at: i64,
    pub is_lifetime: bool,
    /// Latest purchase time over every token, including any a lifetime
    /// token cut off from the fold.
    pub latest_purchase_at: Option<i64>,
}

/// Subscription validity at a particular instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubscriptionStatus {
    pub is_vip: bool,
    pub expire_at: i64,
    pub is_lifetime: bool,
    /// A token claims to have been bought after `now` (clock rolled back).
    pub clock_tampered: bool,
}

/// Add whole calendar years to a unix timestamp.
///
/// Feb 29 lands on Feb 28 in non-leap target years. Falls back to 365-day
/// years if the date is out of chrono's range.
pub fn add_calendar_years(secs: i64, years: u32) -> i64 {
    DateTime::from_timestamp(secs, 0)
        .and_then(|dt| dt.checked_add_months(Months::new(years * 12)))
        .map(|dt| dt.timestamp())
        .unwrap_or(secs + years as i64 * 365 * SECONDS_PER_DAY)
}

/// Length in seconds of `term` when bought at `purchase_at`.
///
/// `1y` and `Lifetime` follow the calendar; `1m` is a flat 30 days.
pub fn term_duration(term: Term, purchase_at: i64) -> i64 {
    match term {
        Term::Trial => 7 * SECONDS_PER_DAY,
        Term::Month => 30 * SECONDS_PER_DAY,
        Term::Year => add_calendar_years(purchase_at, 1) - purchase_at,
        Term::Lifetime => add_calendar_years(purchase_at, LIFETIME_YEARS) - purchase_at,
    }
}

/// Fold tokens into one expiration. Input order does not matter; tokens are
/// sorted by purchase time first (stable, so equal instants keep input order).
pub fn accumulate<'a, I>(tokens: I) -> Accumulation
where
    I: IntoIterator<Item = &'a ActivationToken>,
{
    let mut ordered: Vec<&ActivationToken> = tokens.into_iter().collect();
    ordered.sort_by_key(|t| t.purchase_time);

    let mut acc = Accumulation {
        latest_purchase_at: ordered.last().map(|t| t.purchase_time),
        ..Accumulation::default()
    };
    for token in ordered {
        let purchase_at = token.purchase_time;

        if token.term == Term::Lifetime {
            acc.expire_at = purchase_at + term_duration(Term::Lifetime, purchase_at);
            acc.is_lifetime = true;
            break;
        }

        let duration = term_duration(token.term, purchase_at);
        if acc.expire_at < purchase_at {
            acc.expire_at = purchase_at + duration;
        } else {
            acc.expire_at += duration;
        }
    }
    acc
}

impl Accumulation {
    /// Evaluate at `now` (unix seconds). Must run at query time since `now` moves.
    pub fn evaluate(&self, now: i64) -> SubscriptionStatus {
        let clock_tampered = self.latest_purchase_at.is_some_and(|p| p > now);
        let covered = self.is_lifetime || self.expire_at > now;
        SubscriptionStatus {
            is_vip: covered && !clock_tampered,
            expire_at: self.expire_at,
            is_lifetime: self.is_lifetime,
            clock_tampered,
        }
    }
}
