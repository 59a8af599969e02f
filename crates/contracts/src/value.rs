use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar payload carried by state vars, condition values, and effects.
///
/// Booleans and numbers are distinct variants and never compare equal across
/// types; strings compare by Unicode code points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "string",
            Self::List(_) => "list",
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{}", format_number(*value)),
            Self::Text(value) => write!(f, "{value}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Shortest decimal rendering without trailing zeros; integral values render
/// without a decimal point.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_type_values_never_compare_equal() {
        assert_ne!(Value::Bool(true), Value::Number(1.0));
        assert_ne!(Value::Text("1".to_string()), Value::Number(1.0));
        assert_eq!(Value::Number(2.0), Value::Number(2.0));
    }

    #[test]
    fn untagged_round_trip_preserves_variants() {
        let values = vec![
            Value::Bool(false),
            Value::Number(4.5),
            Value::Text("storm".to_string()),
            Value::List(vec![Value::Number(1.0), Value::Text("a".to_string())]),
        ];
        let encoded = serde_json::to_string(&values).expect("serialize");
        let decoded: Vec<Value> = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(values, decoded);
    }

    #[test]
    fn number_rendering_drops_trailing_zeros() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(-3.0), "-3");
    }

    #[test]
    fn display_renders_lists_without_quotes() {
        let value = Value::List(vec![Value::Text("brave".into()), Value::Text("calm".into())]);
        assert_eq!(value.to_string(), "[brave, calm]");
    }
}
