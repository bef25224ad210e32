//! Total coercion functions from a loosely-typed JSON value to the value
//! shape a formal parameter declares.
//!
//! Every function returns `Err(reason)` instead of guessing; the binder
//! turns the reason into an `InvalidArgument` that names the parameter.

use serde_json::{Number, Value};

use super::handler::FormalType;

/// Coerce `value` to the representation expected by `target`.
pub fn coerce(value: &Value, target: &FormalType) -> Result<Value, String> {
    match target {
        FormalType::Value => Ok(value.clone()),
        FormalType::Str => to_string(value).map(Value::String),
        FormalType::Char => to_char(value).map(|c| Value::String(c.to_string())),
        FormalType::Int => to_i64(value).map(Value::from),
        FormalType::Float => {
            let f = to_f64(value)?;
            Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| format!("{} is not a finite number", f))
        }
        FormalType::Bool => to_bool(value).map(Value::Bool),
        FormalType::List(inner) => to_list(value, inner),
        FormalType::Map | FormalType::Struct(_) => to_object(value),
    }
}

pub fn to_string(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err("null is not a string".to_string()),
        structured => serde_json::to_string(structured).map_err(|e| e.to_string()),
    }
}

pub fn to_char(value: &Value) -> Result<char, String> {
    let text = to_string(value)?;
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("expected exactly one character, got {:?}", text)),
    }
}

pub fn to_i64(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if n.is_u64() {
                Err(format!("{} is out of range for an integer", n))
            } else {
                float_to_i64(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(i);
            }
            match trimmed.parse::<f64>() {
                Ok(f) => float_to_i64(f),
                Err(_) => Err(format!("{:?} is not an integer", s)),
            }
        }
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(format!("{} cannot be read as an integer", type_label(other))),
    }
}

/// 2^63, the first float past the `i64` range.
const I64_UPPER_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn float_to_i64(f: f64) -> Result<i64, String> {
    if !f.is_finite() || f.fract() != 0.0 {
        return Err(format!("{} is not a whole number", f));
    }
    // `i64::MAX as f64` rounds up to 2^63, which `as` would saturate.
    if f < i64::MIN as f64 || f >= I64_UPPER_BOUND {
        return Err(format!("{} is out of range for an integer", f));
    }
    Ok(f as i64)
}

pub fn to_f64(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("{} is not representable as a float", n)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .ok_or_else(|| format!("{:?} is not a number", s)),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(format!("{} cannot be read as a number", type_label(other))),
    }
}

pub fn to_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().map_or(false, |f| f != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(format!("{:?} is not a boolean", s)),
        },
        other => Err(format!("{} cannot be read as a boolean", type_label(other))),
    }
}

/// Arrays coerce element-wise. A string holding a JSON array is accepted.
pub fn to_list(value: &Value, inner: &FormalType) -> Result<Value, String> {
    let items = match value {
        Value::Array(items) => items.clone(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items,
            _ => return Err(format!("{:?} is not an array", s)),
        },
        other => return Err(format!("{} is not an array", type_label(other))),
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| coerce(item, inner).map_err(|e| format!("element {}: {}", i, e)))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

/// Objects pass through. A string holding a JSON object is accepted.
pub fn to_object(value: &Value) -> Result<Value, String> {
    match value {
        Value::Object(_) => Ok(value.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Object(_)) => Ok(parsed),
            _ => Err(format!("{:?} is not an object", s)),
        },
        other => Err(format!("{} is not an object", type_label(other))),
    }
}

fn type_label(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
