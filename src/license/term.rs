use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::AppError;

/// Purchasable license term.
///
/// The string codes are part of the token wire format and the signed message,
/// so they must never change.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum Term {
    /// Free trial, granted once per identity.
    #[strum(serialize = "7d")]
    #[serde(rename = "7d")]
    Trial,
    /// Thirty days.
    #[strum(serialize = "1m")]
    #[serde(rename = "1m")]
    Month,
    /// One calendar year.
    #[strum(serialize = "1y")]
    #[serde(rename = "1y")]
    Year,
    #[strum(serialize = "Lifetime")]
    #[serde(rename = "Lifetime")]
    Lifetime,
}

impl Term {
    pub const ALL: [Term; 4] = [Term::Trial, Term::Month, Term::Year, Term::Lifetime];

    /// Parse a wire code, failing with `InvalidTerm` for anything outside the four codes.
    pub fn from_code(code: &str) -> Result<Self, AppError> {
        code.parse()
            .map_err(|_| AppError::InvalidTerm(code.to_string()))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Term::Trial => "7d",
            Term::Month => "1m",
            Term::Year => "1y",
            Term::Lifetime => "Lifetime",
        }
    }

    pub fn is_trial(&self) -> bool {
        matches!(self, Term::Trial)
    }

    /// Human-readable product name sent to the payment gateway.
    pub fn product_name(&self) -> &'static str {
        match self {
            Term::Trial => "7-day trial",
            Term::Month => "Monthly membership",
            Term::Year => "Annual membership",
            Term::Lifetime => "Lifetime membership",
        }
    }
}
