//! Byte-stream transport for remote agents.
//!
//! A client opens a TCP connection, sends the handshake request string and
//! waits for the handshake response. After that both sides exchange
//! STX/ETX frames: `PING`/`PONG` keepalives and JSON command frames.

pub mod frame;
pub mod tcp;

pub use frame::{FrameCodec, FrameError, DEFAULT_MAX_FRAME_BYTES, ETX, PING, PONG, STX};
pub use tcp::{SessionError, TcpBridge};
