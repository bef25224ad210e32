//! Parameter binder: reconciles an untyped payload with a handler's
//! ordered formal parameters.
//!
//! Binding steps:
//!
//! 1. When the payload uses the `args` / `kwargs` calling convention, build
//!    an effective map: positional values by declaration order, then the
//!    remaining top-level keys, then keyword entries on top.
//! 2. For each formal parameter, resolve its effective name.
//! 3. Present and non-null: structured tokens go straight into generic
//!    map parameters; everything else is coerced to the declared type.
//! 4. Absent: the declared default. Present but null: null.
//! 5. Absent, required, no default: `InvalidArgument`.

use std::borrow::Cow;

use serde_json::{Map, Value};

use super::coerce::coerce;
use super::errors::CapabilityError;
use super::handler::FormalParameter;

/// Reserved payload key carrying positional arguments.
pub const ARGS_KEY: &str = "args";
/// Reserved payload key carrying keyword arguments.
pub const KWARGS_KEY: &str = "kwargs";

/// Bind `payload` onto `params`, producing one value per formal parameter
/// in declaration order.
pub fn bind(params: &[FormalParameter], payload: &Map<String, Value>) -> Result<Vec<Value>, CapabilityError> {
    let effective = effective_payload(params, payload)?;
    params
        .iter()
        .map(|param| bind_one(param, &effective))
        .collect()
}

fn bind_one(param: &FormalParameter, effective: &Map<String, Value>) -> Result<Value, CapabilityError> {
    let name = param.effective_name();

    match effective.get(name) {
        Some(Value::Null) => Ok(Value::Null),
        Some(value) => {
            let structured = value.is_object() || value.is_array();
            if structured && param.ty.accepts_structured() {
                return Ok(value.clone());
            }
            coerce(value, &param.ty).map_err(|reason| {
                CapabilityError::invalid(format!(
                    "cannot convert parameter `{}` value {} to {}: {}",
                    name, value, param.ty, reason
                ))
            })
        }
        None => {
            if let Some(default) = &param.default {
                Ok(default.clone())
            } else if param.is_required() {
                Err(CapabilityError::invalid(format!(
                    "required parameter `{}` not provided",
                    name
                )))
            } else {
                Ok(Value::Null)
            }
        }
    }
}

/// Whether the payload uses a reserved key that no formal parameter claims.
fn uses_reserved(params: &[FormalParameter], payload: &Map<String, Value>, key: &str) -> bool {
    payload.contains_key(key) && !params.iter().any(|p| p.effective_name() == key)
}

fn effective_payload<'a>(
    params: &[FormalParameter],
    payload: &'a Map<String, Value>,
) -> Result<Cow<'a, Map<String, Value>>, CapabilityError> {
    let has_args = uses_reserved(params, payload, ARGS_KEY);
    let has_kwargs = uses_reserved(params, payload, KWARGS_KEY);
    if !has_args && !has_kwargs {
        return Ok(Cow::Borrowed(payload));
    }

    let mut effective = Map::new();

    if has_args {
        match &payload[ARGS_KEY] {
            Value::Null => {}
            Value::Array(items) => {
                if items.len() > params.len() {
                    return Err(CapabilityError::invalid(format!(
                        "too many positional arguments: got {}, expected at most {}",
                        items.len(),
                        params.len()
                    )));
                }
                for (param, item) in params.iter().zip(items) {
                    effective.insert(param.effective_name().to_string(), item.clone());
                }
            }
            scalar => {
                let first = params.first().ok_or_else(|| {
                    CapabilityError::invalid("positional argument given but the handler takes none")
                })?;
                effective.insert(first.effective_name().to_string(), scalar.clone());
            }
        }
    }

    for (key, value) in payload {
        if (has_args && key == ARGS_KEY) || (has_kwargs && key == KWARGS_KEY) {
            continue;
        }
        effective.insert(key.clone(), value.clone());
    }

    if has_kwargs {
        match &payload[KWARGS_KEY] {
            Value::Null => {}
            Value::Object(kwargs) => {
                for (key, value) in kwargs {
                    effective.insert(key.clone(), value.clone());
                }
            }
            other => {
                return Err(CapabilityError::invalid(format!(
                    "`{}` must be an object, got {}",
                    KWARGS_KEY, other
                )))
            }
        }
    }

    Ok(Cow::Owned(effective))
}
