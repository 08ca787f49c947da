//! Location code vocabulary and name→ISO-code resolution.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;

/// ISO 3166-1 α2 country codes plus a representative set of ISO 3166-2
/// subdivisions, plus a few non-standard additions (Kosovo). This is a
/// practical working set, not a full ISO 3166 codegen dump.
static VALID_LOCATION_CODES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "US", "CA", "MX", "GB", "IE", "FR", "DE", "ES", "PT", "IT", "NL", "BE", "LU", "CH", "AT",
        "SE", "NO", "DK", "FI", "IS", "PL", "CZ", "SK", "HU", "RO", "BG", "GR", "HR", "SI", "RS",
        "UA", "RU", "TR", "IL", "AE", "SA", "EG", "ZA", "NG", "KE", "IN", "PK", "BD", "LK", "CN",
        "JP", "KR", "TW", "HK", "SG", "MY", "TH", "VN", "PH", "ID", "AU", "NZ", "BR", "AR", "CL",
        "CO", "PE", "UY",
        "XK", // Kosovo, user-assigned ISO 3166-1 code, not a formal assignment
        "US-CA", "US-NY", "US-TX", "US-WA", "US-MA", "US-IL", "US-CO", "US-GA", "US-FL",
        "GB-ENG", "GB-SCT", "GB-WLS", "GB-NIR", "CA-ON", "CA-BC", "CA-QC",
    ]
});

/// Country/region name → ISO code, lower-cased keys. Covers the common
/// aliases job boards actually emit ("USA", "United States", "UK", ...).
static NAME_TO_CODE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("united states", "US"),
        ("united states of america", "US"),
        ("usa", "US"),
        ("us", "US"),
        ("canada", "CA"),
        ("mexico", "MX"),
        ("united kingdom", "GB"),
        ("uk", "GB"),
        ("great britain", "GB"),
        ("england", "GB-ENG"),
        ("scotland", "GB-SCT"),
        ("wales", "GB-WLS"),
        ("ireland", "IE"),
        ("france", "FR"),
        ("germany", "DE"),
        ("spain", "ES"),
        ("portugal", "PT"),
        ("italy", "IT"),
        ("netherlands", "NL"),
        ("belgium", "BE"),
        ("switzerland", "CH"),
        ("austria", "AT"),
        ("sweden", "SE"),
        ("norway", "NO"),
        ("denmark", "DK"),
        ("finland", "FI"),
        ("poland", "PL"),
        ("ukraine", "UA"),
        ("russia", "RU"),
        ("turkey", "TR"),
        ("israel", "IL"),
        ("united arab emirates", "AE"),
        ("uae", "AE"),
        ("saudi arabia", "SA"),
        ("egypt", "EG"),
        ("south africa", "ZA"),
        ("nigeria", "NG"),
        ("kenya", "KE"),
        ("india", "IN"),
        ("pakistan", "PK"),
        ("bangladesh", "BD"),
        ("sri lanka", "LK"),
        ("china", "CN"),
        ("japan", "JP"),
        ("south korea", "KR"),
        ("taiwan", "TW"),
        ("hong kong", "HK"),
        ("singapore", "SG"),
        ("malaysia", "MY"),
        ("thailand", "TH"),
        ("vietnam", "VN"),
        ("philippines", "PH"),
        ("indonesia", "ID"),
        ("australia", "AU"),
        ("new zealand", "NZ"),
        ("brazil", "BR"),
        ("argentina", "AR"),
        ("chile", "CL"),
        ("colombia", "CO"),
        ("peru", "PE"),
        ("uruguay", "UY"),
        ("kosovo", "XK"),
        ("california", "US-CA"),
        ("new york", "US-NY"),
        ("texas", "US-TX"),
        ("washington", "US-WA"),
        ("ontario", "CA-ON"),
        ("british columbia", "CA-BC"),
        ("quebec", "CA-QC"),
    ])
});

/// Small memoization cache for name→code lookups, since the same free-text
/// names recur heavily across a run.
static LOOKUP_CACHE: Lazy<Mutex<HashMap<String, Option<String>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// True if `code` is in the closed location code vocabulary.
pub fn is_valid_code(code: &str) -> bool {
    VALID_LOCATION_CODES.iter().any(|c| c.eq_ignore_ascii_case(code))
}

/// The full closed vocabulary, used to seed the `valid_location_codes`
/// reference table at `setup-db` time.
pub fn all_codes() -> &'static [&'static str] {
    &VALID_LOCATION_CODES
}

/// Resolve a free-text country/region name to an ISO code. Unknown names
/// return `None` and are dropped by callers.
pub fn code_from_name(name: &str) -> Option<String> {
    let key = name.trim().to_lowercase();
    if key.is_empty() {
        return None;
    }

    if let Some(cached) = LOOKUP_CACHE.lock().unwrap().get(&key) {
        return cached.clone();
    }

    let resolved = if is_valid_code(&key.to_uppercase()) {
        Some(key.to_uppercase())
    } else {
        NAME_TO_CODE.get(key.as_str()).map(|c| c.to_string())
    };

    LOOKUP_CACHE
        .lock()
        .unwrap()
        .insert(key, resolved.clone());
    resolved
}

/// Filter a set of free-text location names down to valid ISO codes,
/// dropping anything unresolvable. If every name is unresolvable the result
/// is an empty vec.
pub fn resolve_locations(names: &[String]) -> Vec<String> {
    names.iter().filter_map(|n| code_from_name(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_country_names() {
        assert_eq!(code_from_name("United States").as_deref(), Some("US"));
        assert_eq!(code_from_name("usa").as_deref(), Some("US"));
    }

    #[test]
    fn resolves_iso_code_passthrough() {
        assert_eq!(code_from_name("gb").as_deref(), Some("GB"));
    }

    #[test]
    fn drops_unknown_names() {
        assert_eq!(code_from_name("Narnia"), None);
    }

    #[test]
    fn resolve_locations_drops_unknowns_and_keeps_known() {
        let names = vec![
            "United States".to_string(),
            "Narnia".to_string(),
            "Germany".to_string(),
        ];
        let resolved = resolve_locations(&names);
        assert_eq!(resolved, vec!["US".to_string(), "DE".to_string()]);
    }

    #[test]
    fn all_unknown_locations_yields_empty_vec() {
        let names = vec!["Narnia".to_string(), "Atlantis".to_string()];
        assert!(resolve_locations(&names).is_empty());
    }
}
