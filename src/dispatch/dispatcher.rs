//! Command dispatcher: routes decoded commands to the catalog.
//!
//! Routing:
//! - `get_schema`       → schema export
//! - `access_resource`  → resource by name (or by concrete URI)
//! - `scheme://...`     → resource resolved by concrete URI
//! - anything else      → tool by name
//!
//! Handlers with main-thread affinity go through the [`MainThreadQueue`] and
//! are awaited with a deadline; all others run on the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use super::main_thread::{CallError, MainThreadQueue};
use super::protocol::{CommandRequest, CommandResponse, ACCESS_RESOURCE, GET_SCHEMA};
use crate::capabilities::invoker::{call_handler, resolve_handler};
use crate::capabilities::{export_schema, CapabilityError, CapabilityKind, Catalog, ThreadAffinity};

/// Default wait for main-thread work.
pub const DEFAULT_MAIN_THREAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Dispatcher {
    catalog: Arc<Catalog>,
    main_thread: Arc<MainThreadQueue>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(catalog: Arc<Catalog>, main_thread: Arc<MainThreadQueue>) -> Self {
        Self {
            catalog,
            main_thread,
            timeout: DEFAULT_MAIN_THREAD_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn main_thread(&self) -> &Arc<MainThreadQueue> {
        &self.main_thread
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute one request. Failures become error responses.
    pub async fn handle(&self, request: CommandRequest) -> CommandResponse {
        let CommandRequest {
            id,
            command,
            parameters,
            ..
        } = request;

        match self.execute(&command, parameters.unwrap_or_default()).await {
            Ok(result) => CommandResponse::success(id, result),
            Err(err) => {
                log::debug!("Command '{}' failed: {}", command, err);
                CommandResponse::failure(id, &err)
            }
        }
    }

    /// Route a command name and its parameters.
    pub async fn execute(&self, command: &str, params: Map<String, Value>) -> Result<Value, CapabilityError> {
        match command {
            GET_SCHEMA => Ok(export_schema(&self.catalog)),
            ACCESS_RESOURCE => {
                let resource_name = params
                    .get("resource_name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| CapabilityError::invalid("`resource_name` is required"))?
                    .to_string();
                let resource_params = match params.get("parameters") {
                    None | Some(Value::Null) => Map::new(),
                    Some(Value::Object(map)) => map.clone(),
                    Some(other) => {
                        return Err(CapabilityError::invalid(format!(
                            "`parameters` must be an object, got {}",
                            other
                        )))
                    }
                };
                if resource_name.contains("://") {
                    self.access_uri(&resource_name, resource_params).await
                } else {
                    self.invoke(CapabilityKind::Resource, &resource_name, resource_params)
                        .await
                }
            }
            uri if uri.contains("://") => self.access_uri(uri, params).await,
            tool => self.invoke(CapabilityKind::Tool, tool, params).await,
        }
    }

    /// Resolve a concrete resource URI and invoke it. Values captured from
    /// the URI override same-named explicit parameters.
    async fn access_uri(&self, uri: &str, mut params: Map<String, Value>) -> Result<Value, CapabilityError> {
        let (name, captured) = self
            .catalog
            .resolve_resource_uri(uri)
            .ok_or_else(|| CapabilityError::not_found(CapabilityKind::Resource.to_string(), uri))?;
        params.extend(captured);
        self.invoke(CapabilityKind::Resource, &name, params).await
    }

    /// Invoke a capability on the thread its handler requires.
    pub async fn invoke(
        &self,
        kind: CapabilityKind,
        name: &str,
        payload: Map<String, Value>,
    ) -> Result<Value, CapabilityError> {
        let handler = resolve_handler(&self.catalog, kind, name)?;
        let owned_name = name.to_string();

        match handler.affinity {
            ThreadAffinity::MainThread => {
                let job = move || call_handler(&handler, kind, &owned_name, &payload);
                match self.main_thread.call(job, self.timeout).await {
                    Ok(result) => result,
                    Err(CallError::TimedOut) => {
                        log::warn!(
                            "{} '{}' timed out after {:?} on the main thread queue",
                            kind,
                            name,
                            self.timeout
                        );
                        Err(CapabilityError::Timeout {
                            name: name.to_string(),
                            seconds: self.timeout.as_secs_f64(),
                        })
                    }
                    Err(CallError::Abandoned) => Err(CapabilityError::HandlerFailure {
                        name: name.to_string(),
                        message: CallError::Abandoned.to_string(),
                        trace: None,
                    }),
                }
            }
            ThreadAffinity::Any => {
                tokio::task::spawn_blocking(move || call_handler(&handler, kind, &owned_name, &payload))
                    .await
                    .map_err(|e| CapabilityError::HandlerFailure {
                        name: name.to_string(),
                        message: e.to_string(),
                        trace: None,
                    })?
            }
        }
    }
}
