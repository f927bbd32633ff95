use serde::{Deserialize, Serialize};

/// Value stored at a document leaf.
///
/// Serialized untagged so the external data layer's `null`, numbers, strings
/// and booleans map directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    /// Wrap a computed number; non-finite results become `Empty`.
    pub fn number(n: f64) -> Self {
        if n.is_finite() {
            FieldValue::Number(n)
        } else {
            FieldValue::Empty
        }
    }

    /// Numeric view of the value. Anything non-numeric reads as 0.
    pub fn as_number(&self) -> f64 {
        self.try_number().unwrap_or(0.0)
    }

    /// Numeric view of the value, `None` when it has no finite numeric reading.
    pub fn try_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) if n.is_finite() => Some(*n),
            FieldValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            _ => None,
        }
    }

    /// Empty values: `Empty`, blank text, and non-finite numbers.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Number(n) => !n.is_finite(),
            FieldValue::Bool(_) => false,
        }
    }

    /// True for values the engine must replace with a rule's default.
    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Number(n) => !n.is_finite(),
            _ => false,
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Empty, FieldValue::Empty) => true,
            // Bitwise-equal numbers compare equal, so a NaN never re-triggers a write.
            (FieldValue::Number(a), FieldValue::Number(b)) => a == b || a.to_bits() == b.to_bits(),
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(n: Option<f64>) -> Self {
        n.map(FieldValue::number).unwrap_or_default()
    }
}
