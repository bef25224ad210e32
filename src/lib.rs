//! # capbridge
//!
//! Capability registry and invocation bridge between a long-running host
//! application and a remote AI agent.
//!
//! The host declares its callable actions (tools) and queryable data sources
//! (resources) once, as handler groups. The catalog turns them into a
//! machine-readable schema, and the dispatcher binds loosely-typed JSON
//! payloads onto handler arguments at call time. Remote agents reach the
//! dispatcher over a framed TCP connection or plain HTTP.

pub mod builtin;
pub mod capabilities;
pub mod config;
pub mod dispatch;
pub mod server;
pub mod transport;
pub mod utilities;

pub use capabilities::{
    export_schema, invoke, CapabilityError, CapabilityKind, Catalog, HandlerDecl, HandlerGroup,
    Manifest,
};
pub use config::BridgeConfig;
pub use dispatch::{CommandRequest, CommandResponse, Dispatcher, MainThreadQueue};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
