//! Introspector: turns handler declarations into descriptors.
//!
//! Explicit metadata always wins; whatever is left unspecified is inferred
//! from the declaration itself:
//!
//! - name: declared name, else `to_snake_case(ident)`, then the group
//!   prefix (`<prefix>_`) unless already present
//! - parameter name: declared override, else the formal identifier
//! - parameter type: declared override, else inferred from the formal type
//! - required: declared override, else "has no default value"

use std::collections::BTreeMap;

use super::descriptor::{
    InputSchema, OutputHint, ParameterDescriptor, ResourceDescriptor, ToolDescriptor,
};
use super::handler::{CapabilityTag, FormalParameter, HandlerDecl, ReturnShape};
use super::uri::template_tokens;
use crate::utilities::string_utils::{to_snake_case, with_prefix};

/// MIME type used when a resource declares none.
pub const DEFAULT_MIME_TYPE: &str = "application/json";

/// Resolve the exported name of a capability.
pub fn resolve_name(declared: Option<&str>, ident: &str, prefix: Option<&str>) -> String {
    let base = match declared {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => to_snake_case(ident),
    };
    match prefix {
        Some(prefix) => with_prefix(prefix, &base),
        None => base,
    }
}

/// Build a tool descriptor, or `None` when the handler is not tagged as a tool.
pub fn build_tool_descriptor(handler: &HandlerDecl, prefix: Option<&str>) -> Option<ToolDescriptor> {
    let meta = match &handler.tag {
        Some(CapabilityTag::Tool(meta)) => meta,
        _ => return None,
    };

    let name = resolve_name(meta.name.as_deref(), &handler.ident, prefix);
    if name.is_empty() {
        log::warn!("Skipping tool with empty name (handler '{}')", handler.ident);
        return None;
    }

    let mut input_schema = InputSchema::new();
    for param in &handler.params {
        input_schema.insert(param.effective_name(), param.descriptor());
    }

    log::debug!(
        "Built tool descriptor '{}' from '{}' ({} parameters)",
        name,
        handler.ident,
        input_schema.len()
    );

    Some(ToolDescriptor {
        name,
        description: meta.description.clone().unwrap_or_default(),
        example: meta.example.clone(),
        input_schema,
        output_hint: output_hint(&handler.returns),
        handler: Some(handler.bind_ref()),
    })
}

/// Build a resource descriptor, or `None` when the handler is not tagged as
/// a resource.
///
/// Every `{token}` in the URI template gets a parameter entry: matched
/// case-insensitively against the formal parameters, or `{string, required}`
/// when nothing matches.
pub fn build_resource_descriptor(
    handler: &HandlerDecl,
    prefix: Option<&str>,
) -> Option<ResourceDescriptor> {
    let meta = match &handler.tag {
        Some(CapabilityTag::Resource(meta)) => meta,
        _ => return None,
    };

    let name = resolve_name(meta.name.as_deref(), &handler.ident, prefix);
    if name.is_empty() {
        log::warn!("Skipping resource with empty name (handler '{}')", handler.ident);
        return None;
    }

    let mut parameters = BTreeMap::new();
    for token in template_tokens(&meta.uri) {
        let descriptor = match find_param(&handler.params, &token) {
            Some(param) => param.descriptor(),
            None => {
                log::debug!(
                    "Resource '{}': URI token '{}' matches no parameter of '{}'",
                    name,
                    token,
                    handler.ident
                );
                ParameterDescriptor::unresolved_path_param()
            }
        };
        parameters.insert(token, descriptor);
    }

    Some(ResourceDescriptor {
        name,
        description: meta.description.clone().unwrap_or_default(),
        uri_template: meta.uri.clone(),
        mime_type: meta
            .mime_type
            .clone()
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
        parameters,
        example: meta.example.clone(),
        output_hint: output_hint(&handler.returns),
        handler: Some(handler.bind_ref()),
    })
}

/// Case-insensitive lookup by effective name, falling back to the formal
/// identifier.
pub fn find_param<'a>(params: &'a [FormalParameter], token: &str) -> Option<&'a FormalParameter> {
    params
        .iter()
        .find(|p| p.effective_name().eq_ignore_ascii_case(token))
        .or_else(|| params.iter().find(|p| p.ident.eq_ignore_ascii_case(token)))
}

/// Informational output hint synthesized from the declared return shape.
pub fn output_hint(returns: &ReturnShape) -> Option<OutputHint> {
    match returns {
        ReturnShape::Unit => None,
        ReturnShape::Primitive(ty) => Some(OutputHint::Result(ty.param_type())),
        ReturnShape::Struct(fields) if !fields.is_empty() => Some(OutputHint::Fields(
            fields
                .iter()
                .map(|(name, ty)| (name.clone(), ty.param_type()))
                .collect(),
        )),
        ReturnShape::Struct(_) | ReturnShape::Opaque => Some(OutputHint::Opaque),
    }
}
