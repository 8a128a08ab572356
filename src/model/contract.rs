//! Option contracts and the OCC packed ticker encoding.
//!
//! Tickers follow `<UNDERLYING><YYMMDD><C|P><strike×1000, 8 digits>`,
//! e.g. `SPY260116C00480000`. This module is the single parser and
//! formatter for that grammar; the vol-surface consumers and the covered
//! call strategy both go through it.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::symbol::{Symbol, SymbolError};

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn from_code(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "C" | "CALL" => Some(Self::Call),
            "P" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Call => "C",
            Self::Put => "P",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("ticker '{0}' is too short for the OCC encoding")]
    TooShort(String),

    #[error("ticker '{0}' has a malformed expiry date")]
    BadExpiry(String),

    #[error("ticker '{0}' has an unknown option-type code")]
    BadOptionType(String),

    #[error("ticker '{0}' has a malformed strike field")]
    BadStrike(String),

    #[error(transparent)]
    Symbol(#[from] SymbolError),
}

const NANOS_PER_YEAR: f64 = 365.25 * 24.0 * 60.0 * 60.0 * 1e9;
/// Contracts settle at 21:00 UTC (4pm ET) on expiry day.
const EXPIRY_HOUR_UTC: u32 = 21;

/// A listed option contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionContract {
    pub ticker: Symbol,
    pub underlying: Symbol,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub option_type: OptionType,
}

impl OptionContract {
    /// Build a contract and derive its packed ticker.
    pub fn new(
        underlying: Symbol,
        expiry: NaiveDate,
        option_type: OptionType,
        strike: Decimal,
    ) -> Result<Self, ContractError> {
        let ticker = format_occ(underlying, expiry, option_type, strike)?;
        Ok(Self {
            ticker,
            underlying,
            strike,
            expiry,
            option_type,
        })
    }

    /// Expiry instant in nanoseconds since the epoch.
    pub fn expiry_ns(&self) -> u64 {
        let dt: NaiveDateTime = self
            .expiry
            .and_hms_opt(EXPIRY_HOUR_UTC, 0, 0)
            .expect("valid time of day");
        dt.and_utc().timestamp_nanos_opt().unwrap_or(0).max(0) as u64
    }

    /// Time to expiry in years: `max(0, (expiry − now) / 365.25 days)`.
    pub fn year_fraction(&self, now_ns: u64) -> f64 {
        let expiry = self.expiry_ns();
        if expiry <= now_ns {
            return 0.0;
        }
        (expiry - now_ns) as f64 / NANOS_PER_YEAR
    }

    /// Whole days to expiration, floored at zero.
    pub fn dte(&self, now_ns: u64) -> i64 {
        let expiry = self.expiry_ns();
        if expiry <= now_ns {
            return 0;
        }
        ((expiry - now_ns) / 86_400_000_000_000) as i64
    }
}

/// Parse an OCC packed ticker.
pub fn parse_occ(ticker: &str) -> Result<OptionContract, ContractError> {
    // <UNDERLYING: >=1><YYMMDD: 6><C|P: 1><strike*1000: 8>
    if ticker.len() < 16 || !ticker.is_ascii() {
        return Err(ContractError::TooShort(ticker.to_string()));
    }
    let (head, strike_digits) = ticker.split_at(ticker.len() - 8);
    let (head, type_code) = head.split_at(head.len() - 1);
    if head.len() < 7 {
        return Err(ContractError::TooShort(ticker.to_string()));
    }
    let (underlying, date_digits) = head.split_at(head.len() - 6);

    let option_type = OptionType::from_code(type_code)
        .ok_or_else(|| ContractError::BadOptionType(ticker.to_string()))?;

    let yy: i32 = date_digits[0..2]
        .parse()
        .map_err(|_| ContractError::BadExpiry(ticker.to_string()))?;
    let mm: u32 = date_digits[2..4]
        .parse()
        .map_err(|_| ContractError::BadExpiry(ticker.to_string()))?;
    let dd: u32 = date_digits[4..6]
        .parse()
        .map_err(|_| ContractError::BadExpiry(ticker.to_string()))?;
    let expiry = NaiveDate::from_ymd_opt(2000 + yy, mm, dd)
        .ok_or_else(|| ContractError::BadExpiry(ticker.to_string()))?;

    let strike_milli: i64 = strike_digits
        .parse()
        .map_err(|_| ContractError::BadStrike(ticker.to_string()))?;
    if strike_milli <= 0 {
        return Err(ContractError::BadStrike(ticker.to_string()));
    }
    let strike = Decimal::new(strike_milli, 3);

    Ok(OptionContract {
        ticker: Symbol::new(ticker)?,
        underlying: Symbol::new(underlying)?,
        strike,
        expiry,
        option_type,
    })
}

/// Format an OCC packed ticker.
pub fn format_occ(
    underlying: Symbol,
    expiry: NaiveDate,
    option_type: OptionType,
    strike: Decimal,
) -> Result<Symbol, ContractError> {
    let strike_milli = (strike * Decimal::ONE_THOUSAND)
        .round()
        .to_i64()
        .unwrap_or(-1);
    if strike_milli <= 0 || strike_milli > 99_999_999 {
        return Err(ContractError::BadStrike(format!(
            "{underlying} strike {strike}"
        )));
    }
    let ticker = format!(
        "{}{:02}{:02}{:02}{}{:08}",
        underlying,
        expiry.year() % 100,
        expiry.month(),
        expiry.day(),
        option_type.as_code(),
        strike_milli,
    );
    Ok(Symbol::new(&ticker)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_occ() {
        let c = parse_occ("SPY260116C00480000").unwrap();
        assert_eq!(c.underlying.as_str(), "SPY");
        assert_eq!(c.expiry, NaiveDate::from_ymd_opt(2026, 1, 16).unwrap());
        assert_eq!(c.option_type, OptionType::Call);
        assert_eq!(c.strike, dec!(480.000));
    }

    #[test]
    fn test_parse_put_with_fractional_strike() {
        let c = parse_occ("QQQ251219P00412500").unwrap();
        assert_eq!(c.option_type, OptionType::Put);
        assert_eq!(c.strike, dec!(412.500));
    }

    #[test]
    fn test_format_round_trip() {
        let underlying = Symbol::new("SPY").unwrap();
        let expiry = NaiveDate::from_ymd_opt(2026, 1, 16).unwrap();
        let ticker = format_occ(underlying, expiry, OptionType::Call, dec!(480)).unwrap();
        assert_eq!(ticker.as_str(), "SPY260116C00480000");

        let parsed = parse_occ(ticker.as_str()).unwrap();
        assert_eq!(parsed.underlying, underlying);
        assert_eq!(parsed.strike, dec!(480.000));
        assert_eq!(parsed.expiry, expiry);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(parse_occ("SPY").is_err());
        assert!(parse_occ("SPY260116X00480000").is_err());
        assert!(parse_occ("SPY269916C00480000").is_err());
        assert!(parse_occ("SPY260116C0048000Z").is_err());
    }

    #[test]
    fn test_year_fraction_floors_at_zero() {
        let c = parse_occ("SPY200117C00300000").unwrap();
        // Far past expiry relative to 2026.
        let now_ns = 1_767_225_600_000_000_000u64; // 2026-01-01
        assert_eq!(c.year_fraction(now_ns), 0.0);
        assert_eq!(c.dte(now_ns), 0);
    }

    #[test]
    fn test_year_fraction_scale() {
        let c = parse_occ("SPY270101C00400000").unwrap();
        let year_ns = (365.25 * 86_400.0 * 1e9) as u64;
        let now_ns = c.expiry_ns() - year_ns;
        // Exactly one 365.25-day year before expiry.
        let t = c.year_fraction(now_ns);
        assert!((t - 1.0).abs() < 1e-9);
    }
}
