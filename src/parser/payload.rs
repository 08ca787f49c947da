//! Raw payload rendering for the `payload` table (spec §3 data model): the
//! unparsed source response is kept alongside the normalized `Job` row for
//! later debugging and reprocessing.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("unsupported payload format {0:?}, expected \"json\" or \"xml\"")]
    UnsupportedFormat(String),

    #[error("payload content is not well-formed {format}: {reason}")]
    Malformed { format: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Xml,
}

impl PayloadFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadFormat::Json => "json",
            PayloadFormat::Xml => "xml",
        }
    }

    pub fn from_str(format: &str) -> Result<Self, PayloadError> {
        match format.to_lowercase().as_str() {
            "json" => Ok(PayloadFormat::Json),
            "xml" => Ok(PayloadFormat::Xml),
            other => Err(PayloadError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Validate and render `content` as the persisted payload body. This is a
/// well-formedness check, not a schema check — the parser's own
/// `SchemaMismatch` error handles semantic mismatches (spec §7).
pub fn render(format: PayloadFormat, content: &str) -> Result<String, PayloadError> {
    match format {
        PayloadFormat::Json => {
            serde_json::from_str::<serde_json::Value>(content).map_err(|e| PayloadError::Malformed {
                format: "json".to_string(),
                reason: e.to_string(),
            })?;
            Ok(content.to_string())
        }
        PayloadFormat::Xml => {
            if !looks_like_xml(content) {
                return Err(PayloadError::Malformed {
                    format: "xml".to_string(),
                    reason: "content does not start with an XML/RSS declaration or element".to_string(),
                });
            }
            Ok(content.to_string())
        }
    }
}

fn looks_like_xml(content: &str) -> bool {
    let trimmed = content.trim_start();
    trimmed.starts_with("<?xml") || trimmed.starts_with('<')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_formats() {
        assert_eq!(PayloadFormat::from_str("JSON"), Ok(PayloadFormat::Json));
        assert_eq!(PayloadFormat::from_str("xml"), Ok(PayloadFormat::Xml));
    }

    #[test]
    fn rejects_unknown_format() {
        assert_eq!(
            PayloadFormat::from_str("yaml"),
            Err(PayloadError::UnsupportedFormat("yaml".to_string()))
        );
    }

    #[test]
    fn renders_well_formed_json() {
        let content = r#"{"title":"Engineer"}"#;
        assert_eq!(render(PayloadFormat::Json, content).unwrap(), content);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(render(PayloadFormat::Json, "{not json").is_err());
    }

    #[test]
    fn renders_well_formed_rss_xml() {
        let content = "<?xml version=\"1.0\"?><rss></rss>";
        assert_eq!(render(PayloadFormat::Xml, content).unwrap(), content);
    }

    #[test]
    fn rejects_content_that_is_not_xml() {
        assert!(render(PayloadFormat::Xml, "plain text").is_err());
    }
}
