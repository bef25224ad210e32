//! # Capabilities
//!
//! Discovery, description and invocation of the named tools and resources a
//! host exposes to a remote agent.
//!
//! ## Flow
//!
//! 1. Each handler module builds a [`HandlerGroup`] of [`HandlerDecl`]s
//! 2. `Catalog::bootstrap(&manifest)` runs the introspector over every
//!    tagged handler and registers the resulting descriptors
//! 3. At call time `invoke(&catalog, kind, name, payload)` looks the name
//!    up, binds the payload onto the formal parameters and calls the handler
//! 4. `export_schema(&catalog)` renders the catalog for the remote side

pub mod binder;
pub mod catalog;
pub mod coerce;
pub mod descriptor;
pub mod errors;
pub mod export;
pub mod handler;
pub mod introspect;
pub mod invoker;
pub mod uri;

pub use binder::bind;
pub use catalog::{Catalog, CatalogSnapshot, Manifest};
pub use descriptor::{
    CapabilityKind, InputSchema, OutputHint, ParamType, ParameterDescriptor, ResourceDescriptor,
    ToolDescriptor,
};
pub use errors::CapabilityError;
pub use export::export_schema;
pub use handler::{
    Args, BoundHandler, CapabilityTag, FormalParameter, FormalType, HandlerDecl, HandlerFn,
    HandlerGroup, HandlerRef, ParamMeta, ResourceMeta, ReturnShape, ThreadAffinity, ToolMeta,
};
pub use introspect::{build_resource_descriptor, build_tool_descriptor};
pub use invoker::invoke;
