//! Salary / compensation string parsing and currency conversion (spec §4.4).

use std::time::Duration;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;

use crate::reference::currency;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidSalary {
    #[error("no salary information present")]
    Empty,

    #[error("unsupported salary format: {0:?}")]
    UnsupportedFormat(String),

    #[error("unsupported currency code or symbol in {0:?}")]
    UnsupportedCurrency(String),
}

/// An amount with an (optional, pre-conversion) currency.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Money {
    pub currency: Option<String>,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SalaryRange {
    pub min: Money,
    pub max: Money,
}

// Mirrors job_board/portals/parser.py's SALARY_AMOUNT_REGEX / SALARY_RANGE_REGEX.
static SALARY_AMOUNT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?xi)
        (?P<currency_symbol>[^\w\s\d,.\-]*)
        (?P<amount>\d+(?:,\d{3})*(?:\.\d+)?)
        (?P<multiplier>[klmb]?)
        (?:\s+(?P<currency_code>[a-z]{2,4}))?
        ",
    )
    .unwrap()
});

static SALARY_RANGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?xi)
        (?P<currency_symbol>[^\w\s\d,.\-]*)
        (?P<min_amount>\d+(?:,\d{3})*(?:\.\d+)?)
        (?P<min_multiplier>[klmb]?)
        \s*[\x{2013}\-]\s*
        (?P<currency_symbol2>[^\w\s\d,.\-]*)
        (?P<max_amount>\d+(?:,\d{3})*(?:\.\d+)?)
        (?P<max_multiplier>[klmb]?)
        (?:\s+(?P<currency_code>[a-z]{2,4}))?
        ",
    )
    .unwrap()
});

/// `amount` with thousands separators stripped, scaled by the magnitude
/// suffix (`k`/`m`/`b`, plus `l` for Indian lakh = 1e5) (spec §4.4).
fn convert_num(amount: &str, multiplier: &str) -> Decimal {
    let cleaned = amount.replace(',', "");
    let mut value: Decimal = cleaned.parse().unwrap_or_default();
    value = match multiplier.to_lowercase().as_str() {
        "k" => value * Decimal::from(1_000),
        "m" => value * Decimal::from(1_000_000),
        "b" => value * Decimal::from(1_000_000_000u64),
        "l" => value * Decimal::from(100_000),
        _ => value,
    };
    value
}

/// Resolve a currency code or symbol per spec §4.4 rules 1-3: ISO code wins,
/// else symbol lookup via the locale-aware table, else (pure-numeric amount)
/// the default currency.
fn resolve_currency(
    code: Option<&str>,
    symbol: Option<&str>,
    amount_is_numeric: bool,
    locale: &str,
    default_currency: &str,
) -> Option<String> {
    if let Some(code) = code.filter(|c| !c.is_empty()) {
        return Some(currency::normalize_code(code));
    }

    if let Some(symbol) = symbol.filter(|s| !s.is_empty()) {
        return currency::currency_from_symbol(symbol, locale);
    }

    if amount_is_numeric {
        return Some(default_currency.to_string());
    }

    None
}

/// Parse a single salary amount, e.g. `"₹15L"`, `"$120,000"`, `"95000 USD"`.
pub fn extract_salary(
    salary_info: &str,
    locale: &str,
    default_currency: &str,
) -> Result<Money, InvalidSalary> {
    let salary_info = salary_info.trim();
    if salary_info.is_empty() {
        return Err(InvalidSalary::Empty);
    }

    let captures = SALARY_AMOUNT_REGEX
        .captures(salary_info)
        .filter(|c| c.name("amount").is_some())
        .ok_or_else(|| InvalidSalary::UnsupportedFormat(salary_info.to_string()))?;

    let amount_str = captures.name("amount").unwrap().as_str();
    let multiplier = captures.name("multiplier").map(|m| m.as_str()).unwrap_or("");
    let code = captures.name("currency_code").map(|m| m.as_str());
    let symbol = captures.name("currency_symbol").map(|m| m.as_str());

    let currency = resolve_currency(code, symbol, true, locale, default_currency)
        .ok_or_else(|| InvalidSalary::UnsupportedCurrency(salary_info.to_string()))?;

    Ok(Money {
        currency: Some(currency),
        amount: Some(convert_num(amount_str, multiplier)),
    })
}

/// Parse a salary range, e.g. `"₹15L – ₹25L"`, `"$100,000 - $150,000 USD"`.
pub fn extract_salary_range(
    compensation: &str,
    locale: &str,
    default_currency: &str,
) -> Result<SalaryRange, InvalidSalary> {
    // Strip trailing equity info ("… • 1.0% – 2.0%") as the source data does.
    let salary_info = compensation.split('•').next().unwrap_or("").trim();
    if salary_info.is_empty() {
        return Err(InvalidSalary::Empty);
    }

    let captures = SALARY_RANGE_REGEX
        .captures(salary_info)
        .filter(|c| c.name("min_amount").is_some() && c.name("max_amount").is_some())
        .ok_or_else(|| InvalidSalary::UnsupportedFormat(salary_info.to_string()))?;

    let min_amount = captures.name("min_amount").unwrap().as_str();
    let max_amount = captures.name("max_amount").unwrap().as_str();
    let min_mult = captures.name("min_multiplier").map(|m| m.as_str()).unwrap_or("");
    let max_mult = captures.name("max_multiplier").map(|m| m.as_str()).unwrap_or("");
    let code = captures.name("currency_code").map(|m| m.as_str());
    let symbol = captures.name("currency_symbol").map(|m| m.as_str());

    let currency = resolve_currency(code, symbol, true, locale, default_currency)
        .ok_or_else(|| InvalidSalary::UnsupportedCurrency(salary_info.to_string()))?;

    Ok(SalaryRange {
        min: Money {
            currency: Some(currency.clone()),
            amount: Some(convert_num(min_amount, min_mult)),
        },
        max: Money {
            currency: Some(currency),
            amount: Some(convert_num(max_amount, max_mult)),
        },
    })
}

/// Convert `money` into the default currency using the FX rate for `date`.
/// A missing rate defaults to 1 with a warning — this never fails the
/// listing (spec §4.4 currency conversion rule).
pub async fn convert_to_default_currency(
    money: &Money,
    date: NaiveDate,
    default_currency: &str,
    http_timeout: Duration,
) -> Option<Decimal> {
    let amount = money.amount?;
    let from = money.currency.as_deref().unwrap_or(default_currency);

    let rate = currency::fetch_rate(from, default_currency, date, http_timeout)
        .await
        .unwrap_or_else(|| {
            warn!(from_currency = from, "no exchange rate found, defaulting to 1");
            Decimal::ONE
        });

    if rate.is_zero() {
        return Some(amount);
    }

    Some((amount / rate).round_dp(2))
}

/// Render a money amount back to the compact string form the regexes parse,
/// used by the round-trip property test.
pub fn format_amount(amount: Decimal, currency: &str) -> String {
    format!("{amount} {currency}")
}
