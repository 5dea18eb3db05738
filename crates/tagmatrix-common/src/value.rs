use chrono::NaiveDateTime;
use std::fmt::{self, Display};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Format used when a date-time has to be rendered as text (CSV, logs).
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Value written into a single cell of the matrix.
///
/// Intentionally small: the matrix only ever holds labels, identifiers,
/// timestamps and the presence marker.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    Text(String),
    Int(i64),
    Number(f64),
    DateTime(NaiveDateTime),
    #[default]
    Empty,
}

impl CellValue {
    /// The marker written at an (entity, tag) intersection.
    pub fn present() -> Self {
        CellValue::Text(PRESENT_MARKER.to_string())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Presence marker for a tag on an entity row.
pub const PRESENT_MARKER: &str = "1";

impl Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            CellValue::Empty => Ok(()),
        }
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<u64> for CellValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => CellValue::Int(v),
            Err(_) => CellValue::Number(value as f64),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn display_renders_cells_as_text() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 0)
            .unwrap();
        assert_eq!(CellValue::from(dt).to_string(), "2024-03-09 07:05:00");
        assert_eq!(CellValue::from(42u64).to_string(), "42");
        assert_eq!(CellValue::Empty.to_string(), "");
        assert_eq!(CellValue::present().as_text(), Some("1"));
    }

    #[test]
    fn option_maps_none_to_empty() {
        let missing: Option<String> = None;
        assert!(CellValue::from(missing).is_empty());
        assert!(CellValue::from("").is_empty());
        assert!(!CellValue::from(Some("Very Positive")).is_empty());
    }

    #[test]
    fn huge_ids_fall_back_to_number() {
        assert_eq!(CellValue::from(u64::MAX), CellValue::Number(u64::MAX as f64));
    }
}
