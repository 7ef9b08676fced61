//! Client-side plumbing for the live event stream.

pub mod client;
pub mod protocol;

pub use client::{ConnectionState, EventSocket, EventSocketConfig, ReceivedEvent, MAX_BUFFERED_EVENTS};
pub use protocol::{ClientMessage, ServerMessage};
