//! Built-in `host` handler group.
//!
//! Small capabilities that describe the host process itself. The binary
//! registers them so a freshly started bridge has something to call, and the
//! end-to-end tests drive them through every transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::bail;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;

use crate::capabilities::{
    FormalParameter, FormalType, HandlerDecl, HandlerGroup, ResourceMeta, ReturnShape, ToolMeta,
};

/// Lines kept in the host log ring buffer.
pub const HOST_LOG_CAPACITY: usize = 1000;
const MAX_ECHO_REPEAT: i64 = 100;

/// Observable state of the host process.
#[derive(Debug)]
pub struct HostState {
    started_at: DateTime<Utc>,
    tick: AtomicU64,
    log: Mutex<VecDeque<String>>,
}

impl Default for HostState {
    fn default() -> Self {
        Self::new()
    }
}

impl HostState {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            tick: AtomicU64::new(0),
            log: Mutex::new(VecDeque::with_capacity(64)),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime_secs(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    /// Called once per main-loop iteration. Returns the new tick.
    pub fn advance_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Append a timestamped line, evicting the oldest beyond capacity.
    pub fn record(&self, line: impl AsRef<str>) {
        let mut log = self.log.lock();
        if log.len() == HOST_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(format!("[{}] {}", Utc::now().format("%H:%M:%S%.3f"), line.as_ref()));
    }

    /// Up to `max` most recent lines, oldest first.
    pub fn recent(&self, max: usize) -> Vec<String> {
        let log = self.log.lock();
        let skip = log.len().saturating_sub(max);
        log.iter().skip(skip).cloned().collect()
    }
}

/// The `host` group: `host_echo`, `host_ping`, and the `host_info`,
/// `host_log` and `host_tick` resources.
pub fn group(state: Arc<HostState>) -> HandlerGroup {
    let echo_state = Arc::clone(&state);
    let ping_state = Arc::clone(&state);
    let info_state = Arc::clone(&state);
    let log_state = Arc::clone(&state);
    let tick_state = state;

    HandlerGroup::new("host")
        .with_prefix("host")
        .handler(
            HandlerDecl::new("Echo", move |args| {
                let message = args.str(0)?;
                let repeat = args.i64(1)?;
                if !(1..=MAX_ECHO_REPEAT).contains(&repeat) {
                    bail!("repeat must be between 1 and {}, got {}", MAX_ECHO_REPEAT, repeat);
                }
                echo_state.record(format!("echo: {}", message));
                Ok(json!(vec![message; repeat as usize].join(" ")))
            })
            .tool(
                ToolMeta::new()
                    .with_description("Echo a message back, optionally repeated")
                    .with_example("host_echo(message=\"hello\", repeat=2)"),
            )
            .param(FormalParameter::new("message", FormalType::Str).described("Text to echo"))
            .param(
                FormalParameter::new("repeat", FormalType::Int)
                    .with_default(1)
                    .described("How many times to repeat the message"),
            )
            .returns(ReturnShape::Primitive(FormalType::Str)),
        )
        .handler(
            HandlerDecl::new("Ping", move |_| {
                ping_state.record("ping");
                Ok(json!("pong"))
            })
            .tool(ToolMeta::new().with_description("Check that the host is responsive"))
            .returns(ReturnShape::Primitive(FormalType::Str)),
        )
        .handler(
            HandlerDecl::new("Info", move |_| {
                Ok(json!({
                    "version": crate::VERSION,
                    "started_at": info_state.started_at().to_rfc3339(),
                    "uptime_secs": info_state.uptime_secs(),
                    "tick": info_state.tick(),
                }))
            })
            .resource(
                ResourceMeta::new("host://info").with_description("Host version, start time and uptime"),
            )
            .returns(ReturnShape::Struct(vec![
                ("version".into(), FormalType::Str),
                ("started_at".into(), FormalType::Str),
                ("uptime_secs".into(), FormalType::Float),
                ("tick".into(), FormalType::Int),
            ])),
        )
        .handler(
            HandlerDecl::new("Log", move |args| {
                let max = args.i64(0)?;
                if max < 0 {
                    bail!("max_entries must not be negative, got {}", max);
                }
                Ok(json!(log_state.recent(max as usize)))
            })
            .resource(
                ResourceMeta::new("host://log/{max_entries}")
                    .with_description("Most recent host log lines")
                    .with_example("host://log/20"),
            )
            .param(
                FormalParameter::new("max_entries", FormalType::Int)
                    .with_default(50)
                    .described("Maximum number of lines to return"),
            )
            .returns(ReturnShape::Primitive(FormalType::list_of(FormalType::Str))),
        )
        .handler(
            HandlerDecl::new("Tick", move |_| Ok(json!(tick_state.tick())))
                .resource(
                    ResourceMeta::new("host://tick")
                        .with_description("Current main loop tick, read on the main thread"),
                )
                .returns(ReturnShape::Primitive(FormalType::Int))
                .on_main_thread(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{invoke, CapabilityKind, Catalog, Manifest};
    use serde_json::{Map, Value};

    fn catalog(state: Arc<HostState>) -> Catalog {
        Catalog::bootstrap(&Manifest::new().group(group(state)))
    }

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_group_registers_prefixed_names() {
        let catalog = catalog(Arc::new(HostState::new()));
        assert_eq!(catalog.tool_names(), vec!["host_echo", "host_ping"]);
        assert_eq!(catalog.resource_names(), vec!["host_info", "host_log", "host_tick"]);
        let log = catalog.get_resource("host_log").unwrap();
        assert!(!log.parameters["max_entries"].required);
    }

    #[test]
    fn test_echo() {
        let state = Arc::new(HostState::new());
        let catalog = catalog(Arc::clone(&state));
        let result = invoke(
            &catalog,
            CapabilityKind::Tool,
            "host_echo",
            &payload(json!({"message": "hi", "repeat": "3"})),
        )
        .unwrap();
        assert_eq!(result, json!("hi hi hi"));
        assert!(state.recent(1)[0].ends_with("echo: hi"));

        let err = invoke(
            &catalog,
            CapabilityKind::Tool,
            "host_echo",
            &payload(json!({"message": "hi", "repeat": 0})),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "handler_failure");
    }

    #[test]
    fn test_info_and_log_resources() {
        let state = Arc::new(HostState::new());
        state.advance_tick();
        for i in 0..5 {
            state.record(format!("line {}", i));
        }
        let catalog = catalog(Arc::clone(&state));

        let info = invoke(&catalog, CapabilityKind::Resource, "host_info", &Map::new()).unwrap();
        assert_eq!(info["version"], crate::VERSION);
        assert_eq!(info["tick"], 1);

        let lines = invoke(
            &catalog,
            CapabilityKind::Resource,
            "host_log",
            &payload(json!({"max_entries": "2"})),
        )
        .unwrap();
        let lines = lines.as_array().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].as_str().unwrap().ends_with("line 4"));
    }

    #[test]
    fn test_log_ring_buffer_evicts_oldest() {
        let state = HostState::new();
        for i in 0..HOST_LOG_CAPACITY + 3 {
            state.record(format!("{}", i));
        }
        let all = state.recent(usize::MAX);
        assert_eq!(all.len(), HOST_LOG_CAPACITY);
        assert!(all[0].ends_with(" 3"));
    }
}
