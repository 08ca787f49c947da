//! Location extraction from embedded JSON-LD `<script type="application/ld+json">`
//! blocks (spec §4.4), used by the Wellfound/We Work Remotely detail-page
//! adapters whose listing pages embed a `JobPosting` object with
//! `applicantLocationRequirements`.

use scraper::{Html, Selector};
use serde_json::Value;

use crate::reference::location;

/// Extract and resolve the `applicantLocationRequirements` locations from the
/// first JSON-LD block found in `html`. `applicantLocationRequirements` may be
/// a single object or an array; names that don't resolve to a known location
/// code are dropped (spec §7 `InvalidLocation`).
pub fn extract_locations(html: &str) -> Vec<String> {
    let Some(value) = first_json_ld_block(html) else {
        return Vec::new();
    };

    let names = match value.get("applicantLocationRequirements") {
        Some(Value::Array(items)) => items.iter().filter_map(location_name).collect::<Vec<_>>(),
        Some(single @ Value::Object(_)) => location_name(single).into_iter().collect(),
        _ => Vec::new(),
    };

    location::resolve_locations(&names)
}

fn location_name(value: &Value) -> Option<String> {
    value.get("name")?.as_str().map(|s| s.to_string())
}

fn first_json_ld_block(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

    document.select(&selector).find_map(|el| {
        let escaped = escape_raw_newlines_in_strings(&el.inner_html());
        serde_json::from_str::<Value>(&escaped).ok()
    })
}

/// Embedded JSON-LD documents are often pretty-printed server-side with raw
/// newlines left inside `description`/`title` string literals, which
/// `serde_json` rejects as unescaped control characters. Walk the text
/// tracking whether we're inside a string literal (respecting `\"` escapes)
/// and replace any literal `\n`/`\r` found there with their escape sequences,
/// per spec §4.4 ("after escaping raw newlines inside JSON string literals").
fn escape_raw_newlines_in_strings(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in raw.chars() {
        if in_string {
            if escaped {
                out.push(ch);
                escaped = false;
                continue;
            }
            match ch {
                '\\' => {
                    out.push(ch);
                    escaped = true;
                }
                '"' => {
                    out.push(ch);
                    in_string = false;
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                _ => out.push(ch),
            }
        } else {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with(json_ld: &str) -> String {
        format!(
            r#"<html><head><script type="application/ld+json">{json_ld}</script></head><body></body></html>"#
        )
    }

    #[test]
    fn extracts_single_location_object() {
        let html = page_with(
            r#"{"@type":"JobPosting","applicantLocationRequirements":{"@type":"Country","name":"United States"}}"#,
        );
        assert_eq!(extract_locations(&html), vec!["US".to_string()]);
    }

    #[test]
    fn extracts_and_resolves_array_of_locations() {
        let html = page_with(
            r#"{"@type":"JobPosting","applicantLocationRequirements":[{"name":"Germany"},{"name":"France"}]}"#,
        );
        assert_eq!(extract_locations(&html), vec!["DE".to_string(), "FR".to_string()]);
    }

    #[test]
    fn drops_unresolvable_location_names() {
        let html = page_with(
            r#"{"@type":"JobPosting","applicantLocationRequirements":[{"name":"Narnia"}]}"#,
        );
        assert!(extract_locations(&html).is_empty());
    }

    #[test]
    fn missing_json_ld_yields_empty_locations() {
        let html = "<html><body>no script here</body></html>";
        assert!(extract_locations(html).is_empty());
    }

    #[test]
    fn missing_applicant_location_requirements_yields_empty() {
        let html = page_with(r#"{"@type":"JobPosting","title":"Engineer"}"#);
        assert!(extract_locations(&html).is_empty());
    }

    #[test]
    fn raw_newline_inside_description_string_is_escaped_before_parsing() {
        let html = format!(
            "<html><head><script type=\"application/ld+json\">{{\"@type\":\"JobPosting\",\"description\":\"Line one\n\
             Line two\",\"applicantLocationRequirements\":{{\"name\":\"United States\"}}}}</script></head><body></body></html>"
        );
        assert_eq!(extract_locations(&html), vec!["US".to_string()]);
    }

    #[test]
    fn escape_pass_leaves_already_escaped_quotes_and_backslashes_intact() {
        let raw = r#"{"title":"5\" monitor","note":"back\\slash"}"#;
        let escaped = escape_raw_newlines_in_strings(raw);
        let value: Value = serde_json::from_str(&escaped).unwrap();
        assert_eq!(value["title"], "5\" monitor");
        assert_eq!(value["note"], "back\\slash");
    }
}
