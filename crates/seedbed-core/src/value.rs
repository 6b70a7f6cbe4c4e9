use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar cell value held by a [`crate::Table`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Parse a raw CSV cell. Blank cells are `Empty`.
    ///
    /// A cell is numeric only when writing the number back reproduces the
    /// raw text exactly, so `007`, `1.50` and digits beyond `i64` stay text.
    pub fn parse_cell(raw: &str) -> Self {
        if raw.is_empty() {
            return Value::Empty;
        }
        if let Ok(value) = raw.parse::<i64>() {
            if value.to_string() == raw {
                return Value::Int(value);
            }
            return Value::Text(raw.to_string());
        }
        if looks_numeric(raw) {
            if let Ok(value) = raw.parse::<f64>() {
                if value.is_finite() && value.to_string() == raw {
                    return Value::Float(value);
                }
            }
        }
        Value::Text(raw.to_string())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    /// Canonical textual form used for grouping, counting and CSV output.
    pub fn key(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Int(value) => value.to_string(),
            Value::Float(value) => value.to_string(),
            Value::Text(value) => value.clone(),
        }
    }

    pub fn to_csv(&self) -> String {
        self.key()
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Truncate the textual form to `max_chars` characters.
    ///
    /// The truncated text is re-typed the way a CSV reload would type it, so
    /// `12345` clipped to 3 becomes `Int(123)`.
    pub fn truncated(&self, max_chars: usize) -> Value {
        if self.is_empty() {
            return Value::Empty;
        }
        let text = self.key();
        if text.chars().count() <= max_chars {
            return self.clone();
        }
        let clipped: String = text.chars().take(max_chars).collect();
        Value::parse_cell(&clipped)
    }

    /// Append `suffix` to the textual form. The result is always text.
    pub fn with_suffix(&self, suffix: &str) -> Value {
        Value::Text(format!("{}{suffix}", self.key()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Text(value.to_string()))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Empty)
    }
}

fn looks_numeric(raw: &str) -> bool {
    raw.chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E'))
}
