//! Invoker: name lookup, binding, and a panic-safe handler call.
//!
//! Every failure comes back as a [`CapabilityError`]; neither an `Err` from
//! the handler body nor a panic inside it escapes this module.

use std::backtrace::BacktraceStatus;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::{Map, Value};

use super::binder::{bind, ARGS_KEY, KWARGS_KEY};
use super::catalog::Catalog;
use super::descriptor::CapabilityKind;
use super::errors::CapabilityError;
use super::handler::{Args, BoundHandler, FormalParameter, HandlerRef};
use super::introspect::find_param;

/// Look up `name` in the catalog map for `kind`, bind `payload` and call the
/// handler. The handler's result is returned untouched.
pub fn invoke(
    catalog: &Catalog,
    kind: CapabilityKind,
    name: &str,
    payload: &Map<String, Value>,
) -> Result<Value, CapabilityError> {
    let handler = resolve_handler(catalog, kind, name)?;
    call_handler(&handler, kind, name, payload)
}

/// Find the dispatch binding of a capability.
pub fn resolve_handler(
    catalog: &Catalog,
    kind: CapabilityKind,
    name: &str,
) -> Result<HandlerRef, CapabilityError> {
    let handler = match kind {
        CapabilityKind::Tool => catalog
            .get_tool(name)
            .ok_or_else(|| CapabilityError::not_found(kind.to_string(), name))?
            .handler,
        CapabilityKind::Resource => catalog
            .get_resource(name)
            .ok_or_else(|| CapabilityError::not_found(kind.to_string(), name))?
            .handler,
    };

    handler.ok_or_else(|| {
        CapabilityError::invalid(format!("{} '{}' is not a method-based capability", kind, name))
    })
}

/// Bind and call an already resolved handler.
pub fn call_handler(
    handler: &BoundHandler,
    kind: CapabilityKind,
    name: &str,
    payload: &Map<String, Value>,
) -> Result<Value, CapabilityError> {
    log::debug!("Invoking {} '{}' ({})", kind, name, handler.ident);

    let values = if kind == CapabilityKind::Resource {
        bind(&handler.params, &remap_keys(&handler.params, payload))?
    } else {
        bind(&handler.params, payload)?
    };

    let names = handler
        .params
        .iter()
        .map(|p| p.effective_name().to_string())
        .collect();
    let args = Args::new(names, values);

    match catch_unwind(AssertUnwindSafe(|| handler.call(args))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            let message = format!("{:#}", err);
            let trace = if err.backtrace().status() == BacktraceStatus::Captured
                || err.chain().count() > 1
            {
                Some(format!("{:?}", err))
            } else {
                None
            };
            log::error!("{} '{}' failed: {}", kind, name, message);
            Err(CapabilityError::HandlerFailure {
                name: name.to_string(),
                message,
                trace,
            })
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            log::error!("{} '{}' panicked: {}", kind, name, message);
            Err(CapabilityError::HandlerFailure {
                name: name.to_string(),
                message,
                trace: None,
            })
        }
    }
}

/// Rename payload keys that match a parameter name only up to ASCII case,
/// or that match the parameter's formal identifier instead of its override.
///
/// Resource parameters usually arrive from URI segments whose spelling does
/// not follow the handler's identifiers. Lookup order is the one
/// [`find_param`] uses when the descriptor is built.
fn remap_keys(params: &[FormalParameter], payload: &Map<String, Value>) -> Map<String, Value> {
    let mut remapped = Map::new();
    for (key, value) in payload {
        if key == ARGS_KEY || key == KWARGS_KEY || params.iter().any(|p| p.effective_name() == key) {
            remapped.insert(key.clone(), value.clone());
            continue;
        }
        let target = find_param(params, key)
            .map(FormalParameter::effective_name)
            .unwrap_or(key.as_str());
        // An exact key always wins over a case-insensitive one.
        if !remapped.contains_key(target) || target == key {
            remapped.insert(target.to_string(), value.clone());
        }
    }
    remapped
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::descriptor::InputSchema;
    use crate::capabilities::descriptor::ToolDescriptor;
    use crate::capabilities::handler::{FormalType, HandlerDecl, ResourceMeta, ToolMeta};
    use anyhow::{bail, Context};
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn echo_catalog() -> Catalog {
        let catalog = Catalog::new();
        catalog.register_handler(
            &HandlerDecl::new("Echo", |args| {
                let a = args.str(0)?;
                let b = args.i64(1)?;
                Ok(json!(format!("{}:{}", a, b)))
            })
            .tool(ToolMeta::new().with_name("echo"))
            .param(FormalParameter::new("a", FormalType::Str))
            .param(FormalParameter::new("b", FormalType::Int).with_default(0)),
            None,
        );
        catalog
    }

    #[test]
    fn test_end_to_end_echo() {
        let catalog = echo_catalog();
        let result = invoke(&catalog, CapabilityKind::Tool, "echo", &payload(json!({"a": "hi"}))).unwrap();
        assert_eq!(result, json!("hi:0"));

        let result = invoke(
            &catalog,
            CapabilityKind::Tool,
            "echo",
            &payload(json!({"a": "hi", "b": "7"})),
        )
        .unwrap();
        assert_eq!(result, json!("hi:7"));
    }

    #[test]
    fn test_unknown_name_is_not_found() {
        let catalog = echo_catalog();
        let err = invoke(&catalog, CapabilityKind::Tool, "nope", &Map::new()).unwrap_err();
        assert_eq!(err.kind(), "not_found");

        // Tools and resources are looked up in separate maps.
        let err = invoke(&catalog, CapabilityKind::Resource, "echo", &Map::new()).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_binder_error_propagates_unchanged() {
        let catalog = echo_catalog();
        let err = invoke(&catalog, CapabilityKind::Tool, "echo", &payload(json!({"b": 1}))).unwrap_err();
        assert_eq!(
            err,
            CapabilityError::invalid("required parameter `a` not provided")
        );
    }

    #[test]
    fn test_schema_only_tool_is_rejected() {
        let catalog = Catalog::new();
        catalog.register_legacy_tool(ToolDescriptor::schema_only("legacy", "", InputSchema::new()));
        let err = invoke(&catalog, CapabilityKind::Tool, "legacy", &Map::new()).unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
        assert!(err.to_string().contains("not a method-based capability"));
    }

    #[test]
    fn test_handler_error_becomes_failure() {
        let catalog = Catalog::new();
        catalog.register_handler(
            &HandlerDecl::new("Explode", |_| bail!("Test exception")).tool(ToolMeta::new()),
            None,
        );
        let err = invoke(&catalog, CapabilityKind::Tool, "explode", &Map::new()).unwrap_err();
        assert_eq!(err.kind(), "handler_failure");
        assert!(err.to_string().contains("Test exception"));
    }

    #[test]
    fn test_error_chain_is_kept_as_trace() {
        let catalog = Catalog::new();
        catalog.register_handler(
            &HandlerDecl::new("ReadFile", |_| {
                std::fs::read_to_string("/definitely/not/here")
                    .context("loading scene file")?;
                Ok(json!(null))
            })
            .tool(ToolMeta::new()),
            None,
        );
        let err = invoke(&catalog, CapabilityKind::Tool, "read_file", &Map::new()).unwrap_err();
        assert!(err.to_string().contains("loading scene file"));
        assert!(err.trace().is_some());
    }

    #[test]
    fn test_panic_is_contained() {
        let catalog = Catalog::new();
        catalog.register_handler(
            &HandlerDecl::new("Crash", |_| panic!("index out of range")).tool(ToolMeta::new()),
            None,
        );
        let err = invoke(&catalog, CapabilityKind::Tool, "crash", &Map::new()).unwrap_err();
        assert_eq!(err.kind(), "handler_failure");
        assert!(err.to_string().contains("index out of range"));
    }

    #[test]
    fn test_resource_keys_remapped_case_insensitively() {
        let catalog = Catalog::new();
        catalog.register_handler(
            &HandlerDecl::new("Logs", |args| Ok(json!(args.i64(0)?)))
                .resource(ResourceMeta::new("unity://logs/{MaxLogs}"))
                .param(FormalParameter::new("maxLogs", FormalType::Int)),
            None,
        );
        let result = invoke(
            &catalog,
            CapabilityKind::Resource,
            "logs",
            &payload(json!({"MAXLOGS": "25"})),
        )
        .unwrap();
        assert_eq!(result, json!(25));
    }

    #[test]
    fn test_renamed_resource_param_binds_from_uri() {
        let catalog = Catalog::new();
        catalog.register_handler(
            &HandlerDecl::new("ObjectInfo", |args| Ok(json!(args.str(0)?)))
                .resource(ResourceMeta::new("unity://object/{objectId}"))
                .param(FormalParameter::new("objectId", FormalType::Str).renamed("object_id")),
            None,
        );

        let resource = catalog.get_resource("object_info").unwrap();
        assert!(resource.parameters["objectId"].required);

        let (name, captured) = catalog.resolve_resource_uri("unity://object/Cube").unwrap();
        assert_eq!(name, "object_info");
        let result = invoke(&catalog, CapabilityKind::Resource, &name, &captured).unwrap();
        assert_eq!(result, json!("Cube"));
    }

    #[test]
    fn test_remap_prefers_exact_key() {
        let params = vec![FormalParameter::new("id", FormalType::Str)];
        let remapped = remap_keys(&params, &payload(json!({"ID": "upper", "id": "exact"})));
        assert_eq!(remapped["id"], json!("exact"));
        assert_eq!(remapped.len(), 1);
    }
}
