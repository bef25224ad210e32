//! Command dispatch between a transport and the capability catalog.
//!
//! Transports decode `CommandRequest`s and hand them to the [`Dispatcher`];
//! the dispatcher decides where each handler runs and turns every outcome
//! into a `CommandResponse`.

pub mod dispatcher;
pub mod main_thread;
pub mod protocol;

pub use dispatcher::{Dispatcher, DEFAULT_MAIN_THREAD_TIMEOUT};
pub use main_thread::{CallError, MainThreadQueue};
pub use protocol::{CommandRequest, CommandResponse, ResponseStatus, ACCESS_RESOURCE, GET_SCHEMA};
