//! Scalar cell values.
//!
//! Cells hold plain scalars only; concurrent writes to the same cell
//! resolve field-level last-write-wins, never as a character-level merge.
//! An empty cell is stored as the empty string, never null, so every cell
//! always renders as text.

use std::fmt;

use serde::de::{Deserializer, Error as _};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use yrs::{Any, Out};

/// A single cell's value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    #[default]
    Empty,
}

impl CellValue {
    /// Representation stored in the replicated document.
    pub fn to_any(&self) -> Any {
        match self {
            CellValue::Text(t) => Any::String(t.as_str().into()),
            CellValue::Number(n) => Any::Number(*n),
            CellValue::Bool(b) => Any::Bool(*b),
            CellValue::Empty => Any::String("".into()),
        }
    }

    /// Read back from the replicated document. Null and undefined (which a
    /// pre-migration writer could have produced) normalize to `Empty`.
    pub fn from_any(any: &Any) -> CellValue {
        match any {
            Any::String(s) if s.is_empty() => CellValue::Empty,
            Any::String(s) => CellValue::Text(s.to_string()),
            Any::Number(n) => CellValue::Number(*n),
            Any::BigInt(i) => CellValue::Number(*i as f64),
            Any::Bool(b) => CellValue::Bool(*b),
            _ => CellValue::Empty,
        }
    }

    pub fn from_out(out: &Out) -> CellValue {
        match out {
            Out::Any(any) => CellValue::from_any(any),
            _ => CellValue::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Text rendering used by the grid and by fill snapshots.
    pub fn render(&self) -> String {
        match self {
            CellValue::Text(t) => t.clone(),
            CellValue::Number(n) => {
                // Integral numbers render without a trailing ".0", matching
                // how the presentation layer formats them.
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Bool(b) => b.to_string(),
            CellValue::Empty => String::new(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

// On the wire cells are plain JS scalars; `Empty` is the empty string.
impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Text(t) => serializer.serialize_str(t),
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::Empty => serializer.serialize_str(""),
        }
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Scalar {
            Bool(bool),
            Number(f64),
            Text(String),
        }

        match Option::<Scalar>::deserialize(deserializer)? {
            None => Ok(CellValue::Empty),
            Some(Scalar::Bool(b)) => Ok(CellValue::Bool(b)),
            Some(Scalar::Number(n)) => {
                if n.is_finite() {
                    Ok(CellValue::Number(n))
                } else {
                    Err(D::Error::custom("non-finite cell number"))
                }
            }
            Some(Scalar::Text(t)) => Ok(CellValue::from(t)),
        }
    }
}
