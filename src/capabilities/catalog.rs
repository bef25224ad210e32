//! Catalog: the name-keyed store of tool and resource descriptors.
//!
//! The catalog is filled by a single bootstrap pass over a [`Manifest`]:
//! 1. Every handler group, in declaration order
//! 2. Standalone (legacy, non-grouped) handlers
//! 3. Programmatically registered descriptors
//!
//! Registration is an upsert keyed by name: the last writer wins, which is
//! how a capability's implementation is replaced without a restart.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::descriptor::{ResourceDescriptor, ToolDescriptor};
use super::handler::{HandlerDecl, HandlerGroup};
use super::introspect::{build_resource_descriptor, build_tool_descriptor};
use super::uri::{is_literal, match_uri};

/// Explicit registration table: every handler module contributes its group
/// through a builder function.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub groups: Vec<HandlerGroup>,
    /// Legacy handlers that belong to no group.
    pub standalone: Vec<HandlerDecl>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, group: HandlerGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn standalone(mut self, handler: HandlerDecl) -> Self {
        self.standalone.push(handler);
        self
    }
}

/// Every registered descriptor, sorted by name.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub tools: Vec<ToolDescriptor>,
    pub resources: Vec<ResourceDescriptor>,
}

#[derive(Debug, Default)]
struct CatalogInner {
    tools: HashMap<String, ToolDescriptor>,
    resources: HashMap<String, ResourceDescriptor>,
}

/// Shared capability catalog.
///
/// Reads vastly outnumber writes, so both maps sit behind one reader/writer
/// lock. Lookups hand out clones; descriptors are cheap to clone because the
/// handler is reference counted.
#[derive(Debug, Default)]
pub struct Catalog {
    inner: RwLock<CatalogInner>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog and register everything the manifest declares.
    pub fn bootstrap(manifest: &Manifest) -> Self {
        let catalog = Self::new();
        let (tools, resources) = catalog.load(manifest);
        log::info!(
            "Catalog bootstrapped: {} tools, {} resources ({} groups, {} standalone handlers)",
            tools,
            resources,
            manifest.groups.len(),
            manifest.standalone.len()
        );
        catalog
    }

    /// Register every tagged handler of the manifest.
    ///
    /// Returns the number of (tools, resources) registered by this pass.
    pub fn load(&self, manifest: &Manifest) -> (usize, usize) {
        let mut tools = 0;
        let mut resources = 0;

        for group in &manifest.groups {
            log::debug!("Scanning handler group '{}'", group.name);
            for handler in &group.handlers {
                let (t, r) = self.register_handler(handler, group.prefix.as_deref());
                tools += t as usize;
                resources += r as usize;
            }
        }

        for handler in &manifest.standalone {
            let (t, r) = self.register_handler(handler, None);
            tools += t as usize;
            resources += r as usize;
        }

        (tools, resources)
    }

    /// Build and register the descriptor of one handler.
    ///
    /// Untagged handlers are skipped. Returns (tool registered, resource
    /// registered).
    pub fn register_handler(&self, handler: &HandlerDecl, prefix: Option<&str>) -> (bool, bool) {
        if let Some(tool) = build_tool_descriptor(handler, prefix) {
            self.register_tool(tool);
            return (true, false);
        }
        if let Some(resource) = build_resource_descriptor(handler, prefix) {
            self.register_resource(resource);
            return (false, true);
        }
        (false, false)
    }

    /// Upsert a tool descriptor. Returns the descriptor it replaced, if any.
    pub fn register_tool(&self, descriptor: ToolDescriptor) -> Option<ToolDescriptor> {
        let name = descriptor.name.clone();
        let previous = self.inner.write().tools.insert(name.clone(), descriptor);
        if previous.is_some() {
            log::info!("Replaced tool '{}'", name);
        } else {
            log::debug!("Registered tool '{}'", name);
        }
        previous
    }

    /// Upsert a resource descriptor. Returns the descriptor it replaced, if any.
    pub fn register_resource(&self, descriptor: ResourceDescriptor) -> Option<ResourceDescriptor> {
        let name = descriptor.name.clone();
        let previous = self.inner.write().resources.insert(name.clone(), descriptor);
        if previous.is_some() {
            log::info!("Replaced resource '{}'", name);
        } else {
            log::debug!("Registered resource '{}'", name);
        }
        previous
    }

    /// Register a schema-only tool. It is exported but cannot be invoked.
    pub fn register_legacy_tool(&self, mut descriptor: ToolDescriptor) -> Option<ToolDescriptor> {
        descriptor.handler = None;
        self.register_tool(descriptor)
    }

    pub fn get_tool(&self, name: &str) -> Option<ToolDescriptor> {
        self.inner.read().tools.get(name).cloned()
    }

    pub fn get_resource(&self, name: &str) -> Option<ResourceDescriptor> {
        self.inner.read().resources.get(name).cloned()
    }

    /// Snapshot of every descriptor, for schema export.
    pub fn all(&self) -> CatalogSnapshot {
        let inner = self.inner.read();
        let mut tools: Vec<ToolDescriptor> = inner.tools.values().cloned().collect();
        let mut resources: Vec<ResourceDescriptor> = inner.resources.values().cloned().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        CatalogSnapshot { tools, resources }
    }

    /// Drop every descriptor.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.tools.clear();
        inner.resources.clear();
        log::debug!("Catalog reset");
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn resource_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().resources.keys().cloned().collect();
        names.sort();
        names
    }

    /// Total number of tools and resources.
    pub fn len(&self) -> usize {
        let inner = self.inner.read();
        inner.tools.len() + inner.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the resource whose URI template matches a concrete URI.
    ///
    /// Literal templates win over templates with tokens; among token
    /// templates the one with the fewest tokens wins, then the name.
    /// Returns the resource name and the captured path parameters.
    pub fn resolve_resource_uri(&self, uri: &str) -> Option<(String, Map<String, Value>)> {
        let inner = self.inner.read();

        let mut best: Option<(usize, &str, Map<String, Value>)> = None;
        for resource in inner.resources.values() {
            let Some(captured) = match_uri(&resource.uri_template, uri) else {
                continue;
            };
            let rank = if is_literal(&resource.uri_template) {
                0
            } else {
                captured.len()
            };
            let better = match &best {
                None => true,
                Some((best_rank, best_name, _)) => {
                    rank < *best_rank || (rank == *best_rank && resource.name.as_str() < *best_name)
                }
            };
            if better {
                best = Some((rank, resource.name.as_str(), captured));
            }
        }

        best.map(|(_, name, captured)| (name.to_string(), captured))
    }
}
