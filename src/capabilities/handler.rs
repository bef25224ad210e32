//! Handler declarations: explicit metadata for each callable a host exposes.
//!
//! A handler module describes each callable once: its identifier, an
//! optional capability tag (tool or resource metadata), its ordered formal
//! parameters, the shape of its return value, and the closure that does the
//! work. The introspector turns these declarations into descriptors and the
//! binder maps payloads onto `params`.

use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::Value;

use super::descriptor::{ParamType, ParameterDescriptor};

/// The callable behind a capability. Receives the bound argument vector.
pub type HandlerFn = Arc<dyn Fn(Args) -> Result<Value> + Send + Sync>;

/// Opaque dispatch binding stored in descriptors.
pub type HandlerRef = Arc<BoundHandler>;

// ---------------------------------------------------------------------------
// FormalType
// ---------------------------------------------------------------------------

/// Declared Rust-side type of a formal parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormalType {
    Str,
    Char,
    Int,
    Float,
    Bool,
    List(Box<FormalType>),
    /// Generic string-keyed map; structured payload values pass through as-is.
    Map,
    /// Named structured type, received as a JSON object.
    Struct(String),
    /// Untyped value; anything passes through.
    Value,
}

impl FormalType {
    pub fn list_of(inner: FormalType) -> Self {
        Self::List(Box::new(inner))
    }

    /// Schema type inferred from the declared type.
    pub fn param_type(&self) -> ParamType {
        match self {
            Self::Str | Self::Char => ParamType::String,
            Self::Int | Self::Float => ParamType::Number,
            Self::Bool => ParamType::Boolean,
            Self::List(_) => ParamType::Array,
            Self::Map | Self::Struct(_) | Self::Value => ParamType::Object,
        }
    }

    /// Whether a nested object/array token may be assigned without coercion.
    pub fn accepts_structured(&self) -> bool {
        matches!(self, Self::Map | Self::Value)
    }
}

impl fmt::Display for FormalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str => f.write_str("string"),
            Self::Char => f.write_str("char"),
            Self::Int => f.write_str("integer"),
            Self::Float => f.write_str("float"),
            Self::Bool => f.write_str("boolean"),
            Self::List(inner) => write!(f, "list<{}>", inner),
            Self::Map => f.write_str("map"),
            Self::Struct(name) => f.write_str(name),
            Self::Value => f.write_str("any"),
        }
    }
}

// ---------------------------------------------------------------------------
// FormalParameter
// ---------------------------------------------------------------------------

/// Declared per-parameter overrides. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMeta {
    /// Name the caller uses instead of the formal identifier.
    pub name: Option<String>,
    pub description: Option<String>,
    pub ty: Option<ParamType>,
    pub required: Option<bool>,
}

/// One formal parameter of a handler, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct FormalParameter {
    pub ident: String,
    pub ty: FormalType,
    pub default: Option<Value>,
    pub meta: Option<ParamMeta>,
}

impl FormalParameter {
    pub fn new(ident: impl Into<String>, ty: FormalType) -> Self {
        Self {
            ident: ident.into(),
            ty,
            default: None,
            meta: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Expose the parameter under a different name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.meta_mut().name = Some(name.into());
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.meta_mut().description = Some(description.into());
        self
    }

    pub fn typed_as(mut self, ty: ParamType) -> Self {
        self.meta_mut().ty = Some(ty);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.meta_mut().required = Some(required);
        self
    }

    fn meta_mut(&mut self) -> &mut ParamMeta {
        self.meta.get_or_insert_with(ParamMeta::default)
    }

    /// Declared override if present, else the formal identifier.
    pub fn effective_name(&self) -> &str {
        self.meta
            .as_ref()
            .and_then(|m| m.name.as_deref())
            .unwrap_or(&self.ident)
    }

    pub fn description(&self) -> &str {
        self.meta
            .as_ref()
            .and_then(|m| m.description.as_deref())
            .unwrap_or("")
    }

    /// Declared type override wins over the inferred type.
    pub fn param_type(&self) -> ParamType {
        self.meta
            .as_ref()
            .and_then(|m| m.ty)
            .unwrap_or_else(|| self.ty.param_type())
    }

    /// Declared override, else "has no default value".
    pub fn is_required(&self) -> bool {
        self.meta
            .as_ref()
            .and_then(|m| m.required)
            .unwrap_or(self.default.is_none())
    }

    pub fn descriptor(&self) -> ParameterDescriptor {
        ParameterDescriptor::new(self.param_type(), self.description(), self.is_required())
    }
}

// ---------------------------------------------------------------------------
// Capability tags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolMeta {
    pub name: Option<String>,
    pub description: Option<String>,
    pub example: Option<String>,
}

impl ToolMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMeta {
    pub name: Option<String>,
    pub description: Option<String>,
    pub uri: String,
    pub mime_type: Option<String>,
    pub example: Option<String>,
}

impl ResourceMeta {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            name: None,
            description: None,
            uri: uri.into(),
            mime_type: None,
            example: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }
}

/// Marks a handler as a capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityTag {
    Tool(ToolMeta),
    Resource(ResourceMeta),
}

// ---------------------------------------------------------------------------
// Return shape / affinity
// ---------------------------------------------------------------------------

/// Declared return type, inspected only to synthesize an output hint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReturnShape {
    #[default]
    Unit,
    Primitive(FormalType),
    /// Structured type with its accessible member fields.
    Struct(Vec<(String, FormalType)>),
    Opaque,
}

/// Where the handler body is allowed to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThreadAffinity {
    #[default]
    Any,
    /// Must run on the host's main thread, via its per-tick queue.
    MainThread,
}

// ---------------------------------------------------------------------------
// HandlerDecl / BoundHandler
// ---------------------------------------------------------------------------

/// A declared handler: metadata plus the callable.
#[derive(Clone)]
pub struct HandlerDecl {
    pub ident: String,
    pub tag: Option<CapabilityTag>,
    pub params: Vec<FormalParameter>,
    pub returns: ReturnShape,
    pub affinity: ThreadAffinity,
    pub func: HandlerFn,
}

impl fmt::Debug for HandlerDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDecl")
            .field("ident", &self.ident)
            .field("tag", &self.tag)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("affinity", &self.affinity)
            .finish()
    }
}

impl HandlerDecl {
    /// Untagged handler; call [`HandlerDecl::tool`] or
    /// [`HandlerDecl::resource`] to make it discoverable.
    pub fn new<F>(ident: impl Into<String>, func: F) -> Self
    where
        F: Fn(Args) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            ident: ident.into(),
            tag: None,
            params: Vec::new(),
            returns: ReturnShape::Unit,
            affinity: ThreadAffinity::Any,
            func: Arc::new(func),
        }
    }

    pub fn tool(mut self, meta: ToolMeta) -> Self {
        self.tag = Some(CapabilityTag::Tool(meta));
        self
    }

    pub fn resource(mut self, meta: ResourceMeta) -> Self {
        self.tag = Some(CapabilityTag::Resource(meta));
        self
    }

    pub fn param(mut self, param: FormalParameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, shape: ReturnShape) -> Self {
        self.returns = shape;
        self
    }

    pub fn on_main_thread(mut self) -> Self {
        self.affinity = ThreadAffinity::MainThread;
        self
    }

    /// Dispatch binding captured into descriptors.
    pub fn bind_ref(&self) -> HandlerRef {
        Arc::new(BoundHandler {
            ident: self.ident.clone(),
            params: self.params.clone(),
            affinity: self.affinity,
            func: Arc::clone(&self.func),
        })
    }
}

/// The part of a handler needed at call time.
pub struct BoundHandler {
    pub ident: String,
    pub params: Vec<FormalParameter>,
    pub affinity: ThreadAffinity,
    func: HandlerFn,
}

impl BoundHandler {
    pub fn call(&self, args: Args) -> Result<Value> {
        (self.func)(args)
    }
}

impl fmt::Debug for BoundHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHandler")
            .field("ident", &self.ident)
            .field("params", &self.params.len())
            .field("affinity", &self.affinity)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// HandlerGroup
// ---------------------------------------------------------------------------

/// A named container of handlers, optionally contributing a name prefix.
#[derive(Debug, Clone)]
pub struct HandlerGroup {
    pub name: String,
    pub prefix: Option<String>,
    pub handlers: Vec<HandlerDecl>,
}

impl HandlerGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: None,
            handlers: Vec::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn handler(mut self, handler: HandlerDecl) -> Self {
        self.handlers.push(handler);
        self
    }
}

// ---------------------------------------------------------------------------
// Args
// ---------------------------------------------------------------------------

static NULL: Value = Value::Null;

/// Bound argument vector in formal-parameter order.
///
/// The accessors return `anyhow` errors so handler bodies can use `?`;
/// such errors surface as handler failures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    names: Vec<String>,
    values: Vec<Value>,
}

impl Args {
    pub fn new(names: Vec<String>, values: Vec<Value>) -> Self {
        Self { names, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Value at `index`, `Null` when out of range.
    pub fn value(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&NULL)
    }

    /// Value of the parameter with this effective name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.values.get(i))
    }

    fn label(&self, index: usize) -> String {
        self.names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("#{}", index))
    }

    pub fn str(&self, index: usize) -> Result<&str> {
        self.value(index)
            .as_str()
            .ok_or_else(|| anyhow!("argument `{}` is not a string", self.label(index)))
    }

    pub fn opt_str(&self, index: usize) -> Option<&str> {
        self.value(index).as_str()
    }

    pub fn i64(&self, index: usize) -> Result<i64> {
        self.value(index)
            .as_i64()
            .ok_or_else(|| anyhow!("argument `{}` is not an integer", self.label(index)))
    }

    pub fn f64(&self, index: usize) -> Result<f64> {
        self.value(index)
            .as_f64()
            .ok_or_else(|| anyhow!("argument `{}` is not a number", self.label(index)))
    }

    pub fn bool(&self, index: usize) -> Result<bool> {
        self.value(index)
            .as_bool()
            .ok_or_else(|| anyhow!("argument `{}` is not a boolean", self.label(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_formal_type_inference() {
        assert_eq!(FormalType::Str.param_type(), ParamType::String);
        assert_eq!(FormalType::Char.param_type(), ParamType::String);
        assert_eq!(FormalType::Int.param_type(), ParamType::Number);
        assert_eq!(FormalType::Float.param_type(), ParamType::Number);
        assert_eq!(FormalType::Bool.param_type(), ParamType::Boolean);
        assert_eq!(FormalType::list_of(FormalType::Int).param_type(), ParamType::Array);
        assert_eq!(FormalType::Map.param_type(), ParamType::Object);
        assert_eq!(FormalType::Struct("Vector3".into()).param_type(), ParamType::Object);
        assert_eq!(FormalType::list_of(FormalType::Int).to_string(), "list<integer>");
    }

    #[test]
    fn test_formal_parameter_overrides() {
        let plain = FormalParameter::new("objectId", FormalType::Str);
        assert_eq!(plain.effective_name(), "objectId");
        assert!(plain.is_required());
        assert_eq!(plain.param_type(), ParamType::String);

        let tuned = FormalParameter::new("count", FormalType::Int)
            .with_default(10)
            .renamed("max_count")
            .typed_as(ParamType::Any)
            .described("Upper bound");
        assert_eq!(tuned.effective_name(), "max_count");
        assert!(!tuned.is_required());
        assert_eq!(tuned.param_type(), ParamType::Any);
        assert_eq!(tuned.description(), "Upper bound");

        let forced = FormalParameter::new("flag", FormalType::Bool)
            .with_default(false)
            .required(true);
        assert!(forced.is_required());
    }

    #[test]
    fn test_args_accessors() {
        let args = Args::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![json!("hi"), json!(7), json!(true)],
        );
        assert_eq!(args.str(0).unwrap(), "hi");
        assert_eq!(args.i64(1).unwrap(), 7);
        assert_eq!(args.f64(1).unwrap(), 7.0);
        assert!(args.bool(2).unwrap());
        assert_eq!(args.get("b"), Some(&json!(7)));
        assert_eq!(args.value(9), &Value::Null);

        let err = args.str(1).unwrap_err();
        assert!(err.to_string().contains("`b`"));
    }

    #[test]
    fn test_bind_ref_keeps_params_and_affinity() {
        let decl = HandlerDecl::new("Tick", |_| Ok(json!(1)))
            .param(FormalParameter::new("n", FormalType::Int))
            .on_main_thread();
        let bound = decl.bind_ref();
        assert_eq!(bound.ident, "Tick");
        assert_eq!(bound.params.len(), 1);
        assert_eq!(bound.affinity, ThreadAffinity::MainThread);
        assert_eq!(bound.call(Args::default()).unwrap(), json!(1));
    }
}
