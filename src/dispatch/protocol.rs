//! Wire-level command request/response types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capabilities::CapabilityError;

/// Command returning the exported schema.
pub const GET_SCHEMA: &str = "get_schema";
/// Command reading a resource by name: `{resource_name, parameters}`.
pub const ACCESS_RESOURCE: &str = "access_resource";

/// One inbound command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub command: String,
    #[serde(default)]
    pub parameters: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_timestamp: Option<i64>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            id: None,
            command: command.into(),
            parameters: None,
            client_timestamp: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Non-object values are ignored.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters.as_object().cloned();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Outcome of one command. `id` echoes the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl CommandResponse {
    pub fn success(id: Option<String>, result: Value) -> Self {
        Self {
            id,
            status: ResponseStatus::Success,
            result: Some(result),
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(id: Option<String>, error: &CapabilityError) -> Self {
        Self {
            id,
            status: ResponseStatus::Error,
            result: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
        }
    }

    /// Error that never reached the dispatcher, e.g. an undecodable frame.
    pub fn protocol_error(id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            status: ResponseStatus::Error,
            result: None,
            error: Some(message.into()),
            error_kind: Some("protocol".to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}
