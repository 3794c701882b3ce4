// Loosely-typed scalar values and rows as returned by the query collaborator.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Scalar
// ---------------------------------------------------------------------------

/// A single cell value from an analytic store row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Numeric view of the value.
    ///
    /// Integers, floats, booleans and numeric text all coerce. Warehouses
    /// commonly hand back NUMERIC columns as strings, so text is parsed after
    /// trimming. Non-finite floats read as `None`.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            Scalar::Int(i) => *i as f64,
            Scalar::Float(f) => *f,
            Scalar::Bool(b) => f64::from(u8::from(*b)),
            Scalar::Text(s) => s.trim().parse::<f64>().ok()?,
            Scalar::Null | Scalar::Date(_) => return None,
        };
        v.is_finite().then_some(v)
    }

    /// Integer view of the value. Floats must be whole numbers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            Scalar::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            Scalar::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| Scalar::Float(s.parse::<f64>().ok()?).as_i64())
            }
            _ => None,
        }
    }

    /// Text view of the value. Numbers are rendered so that integer ids
    /// stored as INT64 compare equal to ids stored as STRING. Blank text is
    /// treated as absent.
    pub fn as_text(&self) -> Option<String> {
        let s = match self {
            Scalar::Null => return None,
            Scalar::Text(s) => s.trim().to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{}", *f as i64),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Date(d) => d.to_string(),
        };
        (!s.is_empty()).then_some(s)
    }

    /// Date view of the value. Accepts `YYYY-MM-DD` text and an optional
    /// time suffix (`2024-06-01T19:05:00`).
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Scalar::Date(d) => Some(*d),
            Scalar::Text(s) => {
                let s = s.trim();
                let day = s.get(..10).unwrap_or(s);
                NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
            }
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "NULL"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Text(s) => write!(f, "{s}"),
            Scalar::Date(d) => write!(f, "{d}"),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(i64::from(v))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map_or(Scalar::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// One result row: column name → value. Column lookups are
/// case-insensitive, matching how the warehouse treats identifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: HashMap<String, Scalar>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(column, value)` pairs. Later duplicates win.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<Scalar>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut row = Self::new();
        for (k, v) in pairs {
            row.insert(k.as_ref(), v);
        }
        row
    }

    pub fn insert(&mut self, column: &str, value: impl Into<Scalar>) {
        self.columns
            .insert(column.to_ascii_lowercase(), value.into());
    }

    /// Look up a column. Missing columns and explicit NULLs both return
    /// `None`; use [`Row::has_column`] to tell them apart.
    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.columns
            .get(&column.to_ascii_lowercase())
            .filter(|v| !v.is_null())
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(&column.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_text_coerces_to_f64() {
        assert_eq!(Scalar::from(" 0.300 ").as_f64(), Some(0.3));
        assert_eq!(Scalar::Int(4).as_f64(), Some(4.0));
        assert_eq!(Scalar::Bool(true).as_f64(), Some(1.0));
        assert_eq!(Scalar::from("n/a").as_f64(), None);
    }

    #[test]
    fn non_finite_floats_read_as_absent() {
        assert_eq!(Scalar::Float(f64::NAN).as_f64(), None);
        assert_eq!(Scalar::Float(f64::INFINITY).as_f64(), None);
        assert_eq!(Scalar::from("inf").as_f64(), None);
    }

    #[test]
    fn whole_floats_convert_to_i64() {
        assert_eq!(Scalar::Float(2024.0).as_i64(), Some(2024));
        assert_eq!(Scalar::Float(2024.5).as_i64(), None);
        assert_eq!(Scalar::from("2024").as_i64(), Some(2024));
        assert_eq!(Scalar::from("2024.0").as_i64(), Some(2024));
    }

    #[test]
    fn integer_ids_render_without_decimal() {
        assert_eq!(Scalar::Int(592450).as_text().as_deref(), Some("592450"));
        assert_eq!(Scalar::Float(592450.0).as_text().as_deref(), Some("592450"));
        assert_eq!(Scalar::from("   ").as_text(), None);
    }

    #[test]
    fn dates_parse_with_optional_time_suffix() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(Scalar::from("2024-06-01").as_date(), Some(d));
        assert_eq!(Scalar::from("2024-06-01T19:05:00").as_date(), Some(d));
        assert_eq!(Scalar::from("06/01/2024").as_date(), None);
    }

    #[test]
    fn row_lookup_is_case_insensitive() {
        let row = Row::from_pairs([("Batter_ID", Scalar::from("123")), ("hits", Scalar::Null)]);
        assert_eq!(row.get("batter_id"), Some(&Scalar::from("123")));
        assert!(row.has_column("HITS"));
        assert_eq!(row.get("hits"), None);
        assert!(!row.has_column("walks"));
    }

    #[test]
    fn scalars_serialize_as_plain_json() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let json = serde_json::to_value(vec![
            Scalar::Null,
            Scalar::Int(7),
            Scalar::Float(0.5),
            Scalar::from("NYY"),
            Scalar::Date(d),
        ])
        .unwrap();
        assert_eq!(json, serde_json::json!([null, 7, 0.5, "NYY", "2024-06-01"]));
    }
}
