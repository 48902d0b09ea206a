// src/ingest/types.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One cell as it comes out of a decoder. Spreadsheet and CSV decoders can
/// hand back the same logical value in different shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Typed date cell; interpreted as UTC wall-clock time.
    DateTime(NaiveDateTime),
}

impl RawValue {
    /// A value counts as present when it carries something other than
    /// nothing or an empty string.
    pub fn is_present(&self) -> bool {
        match self {
            RawValue::Empty => false,
            RawValue::Text(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// String form used by the text, label and integer coercions.
    pub fn to_text(&self) -> String {
        match self {
            RawValue::Empty => String::new(),
            RawValue::Text(s) => s.clone(),
            RawValue::Number(n) => format_number(*n),
            RawValue::Bool(b) => b.to_string(),
            RawValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        RawValue::Number(n as f64)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

/// Integral floats print without a trailing ".0" (5.0 -> "5").
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Untrusted decoder output: arbitrary keys, arbitrary casing.
pub type RawRow = HashMap<String, RawValue>;

pub const DEFAULT_SENTIMENT: &str = "Neutral";
pub const DEFAULT_CHANNEL: &str = "Website";
pub const DEFAULT_CONTENT_TYPE: &str = "Post";
pub const DEFAULT_CATEGORY: &str = "Business Branding";
pub const DEFAULT_SUB_CATEGORY: &str = "Corporate";
pub const DEFAULT_SPEAKER: &str = "Consumer";

/// Canonical record ("mention"). Always fully populated.
///
/// Categorical fields (`sentiment`, `channel`, ...) are passed through from
/// the source as-is, so consumers must tolerate values outside the nominal
/// sets (e.g. lowercase `"positive"`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mention {
    pub id: u64,
    /// `YYYY-MM-DD`
    pub date: String,
    pub content: String,
    pub sentiment: String,
    pub channel: String,
    pub content_type: String,
    pub total_engagement: i64,
    pub username: String,
    pub category: String,
    pub sub_category: String,
    pub type_of_speaker: String,
    pub comments: i64,
    pub reactions: i64,
    pub shares: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_ignores_empty_strings_only() {
        assert!(!RawValue::Empty.is_present());
        assert!(!RawValue::from("").is_present());
        assert!(RawValue::from(" ").is_present());
        assert!(RawValue::from(0i64).is_present());
        assert!(RawValue::from(false).is_present());
    }

    #[test]
    fn numbers_stringify_like_a_spreadsheet() {
        assert_eq!(RawValue::from(5.0).to_text(), "5");
        assert_eq!(RawValue::from(3.5).to_text(), "3.5");
        assert_eq!(RawValue::from(-12i64).to_text(), "-12");
    }
}
