//! Canonical JSON used for hashing: UTF-8, sorted object keys, no whitespace,
//! numbers without trailing zeros, arrays in author order.

use serde_json::Value;

pub fn to_canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(number) => write_number(out, number),
        Value::String(text) => write_string(out, text),
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(entries) => {
            let mut keys = entries.keys().collect::<Vec<_>>();
            keys.sort();
            out.push('{');
            for (index, key) in keys.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, &entries[key.as_str()]);
            }
            out.push('}');
        }
    }
}

fn write_number(out: &mut String, number: &serde_json::Number) {
    if let Some(value) = number.as_i64() {
        out.push_str(&value.to_string());
    } else if let Some(value) = number.as_u64() {
        out.push_str(&value.to_string());
    } else if let Some(value) = number.as_f64() {
        if value.fract() == 0.0 && value.abs() < 1e15 {
            out.push_str(&format!("{}", value as i64));
        } else {
            out.push_str(&format!("{value}"));
        }
    }
}

fn write_string(out: &mut String, text: &str) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            control if (control as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", control as u32));
            }
            other => out.push(other),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_and_whitespace_dropped() {
        let value = json!({"b": 1, "a": {"z": true, "y": [1, 2]}});
        assert_eq!(
            to_canonical_string(&value),
            r#"{"a":{"y":[1,2],"z":true},"b":1}"#
        );
    }

    #[test]
    fn integral_floats_lose_trailing_zeros() {
        let value = json!({"x": 2.0, "y": 0.25});
        assert_eq!(to_canonical_string(&value), r#"{"x":2,"y":0.25}"#);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let value = json!({"c": [3, {"b": 1.5, "a": "text\nwith\tescapes"}], "a": null});
        let once = to_canonical_string(&value);
        let reparsed: serde_json::Value = serde_json::from_str(&once).expect("canonical parses");
        assert_eq!(to_canonical_string(&reparsed), once);
    }
}
