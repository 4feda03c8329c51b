//! Line-oriented key/value extraction from recognized text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

pub const NO_TEXT_ERROR: &str = "No text to process";

/// Extracted fields, or the reason nothing could be extracted
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StructuredData {
    Fields(BTreeMap<String, String>),
    Error {
        #[serde(rename = "_error")]
        error: String,
    },
}

impl StructuredData {
    pub fn get(&self, field: &str) -> Option<&str> {
        match self {
            Self::Fields(fields) => fields.get(field).map(String::as_str),
            Self::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

struct FieldPattern {
    field: &'static str,
    regex: Regex,
}

static FIELD_PATTERNS: Lazy<Vec<FieldPattern>> = Lazy::new(|| {
    [
        ("name", r"(?i)name[\s:]+([A-Za-z\s]+)"),
        ("fatherName", r"(?i)father[\s:]+([A-Za-z\s]+)"),
        ("village", r"(?i)village[\s:]+([A-Za-z\s]+)"),
        ("district", r"(?i)district[\s:]+([A-Za-z\s]+)"),
        ("date", r"(\d{1,2}[/\-]\d{1,2}[/\-]\d{4})"),
    ]
    .into_iter()
    .map(|(field, pattern)| FieldPattern {
        field,
        regex: Regex::new(pattern).expect("static regex"),
    })
    .collect()
});

/// Pull the known claim fields out of `text`.
///
/// Every non-blank line is tried against every pattern; the first line with a
/// non-empty capture sets a field and later matches are ignored. A date line with
/// several dates records the first one.
pub fn extract_structured_data(text: Option<&str>) -> StructuredData {
    let text = match text {
        Some(text) if !text.is_empty() => text,
        _ => {
            return StructuredData::Error {
                error: NO_TEXT_ERROR.to_string(),
            }
        }
    };

    let mut fields = BTreeMap::new();

    for line in text.split('\n').filter(|line| !line.trim().is_empty()) {
        for pattern in FIELD_PATTERNS.iter() {
            if fields.contains_key(pattern.field) {
                continue;
            }
            let value = pattern
                .regex
                .captures(line)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim())
                .filter(|value| !value.is_empty());
            if let Some(value) = value {
                fields.insert(pattern.field.to_string(), value.to_string());
            }
        }
    }

    tracing::debug!(fields = fields.len(), "Extracted structured data");
    StructuredData::Fields(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        let data = extract_structured_data(Some("Name: Ram Singh\nVillage: Jagdalpur\nName: Other"));
        let expected = BTreeMap::from([
            ("name".to_string(), "Ram Singh".to_string()),
            ("village".to_string(), "Jagdalpur".to_string()),
        ]);
        assert_eq!(data, StructuredData::Fields(expected));
    }

    #[test]
    fn test_missing_text() {
        for input in [None, Some("")] {
            let data = extract_structured_data(input);
            assert!(data.is_error());
            assert_eq!(
                serde_json::to_value(&data).unwrap(),
                serde_json::json!({ "_error": "No text to process" })
            );
        }
    }

    #[test]
    fn test_whitespace_only_text_yields_empty_map() {
        let data = extract_structured_data(Some("  \n\n \t"));
        assert_eq!(data, StructuredData::Fields(BTreeMap::new()));
    }

    #[test]
    fn test_all_fields() {
        let text = "Applicant\n\
                    name : Sita Devi \n\
                    FATHER: Mohan Lal\n\
                    District: Bastar\n\
                    village:  Kondagaon\n\
                    Filed on 12/03/2004 and again on 01-01-2006";
        let data = extract_structured_data(Some(text));

        assert_eq!(data.get("name"), Some("Sita Devi"));
        assert_eq!(data.get("fatherName"), Some("Mohan Lal"));
        assert_eq!(data.get("district"), Some("Bastar"));
        assert_eq!(data.get("village"), Some("Kondagaon"));
        assert_eq!(data.get("date"), Some("12/03/2004"));
    }

    #[test]
    fn test_blank_capture_does_not_claim_field() {
        let data = extract_structured_data(Some("Name: 123\nName: Ram Singh"));
        assert_eq!(data.get("name"), Some("Ram Singh"));

        let data = extract_structured_data(Some("District: 42"));
        assert_eq!(data, StructuredData::Fields(BTreeMap::new()));
    }

    #[test]
    fn test_values_stop_at_non_letters() {
        let data = extract_structured_data(Some("Village: Jagdalpur, Block 4"));
        assert_eq!(data.get("village"), Some("Jagdalpur"));
    }

    #[test]
    fn test_serializes_as_flat_object() {
        let data = extract_structured_data(Some("District: Bastar"));
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            serde_json::json!({ "district": "Bastar" })
        );
    }
}
