//! vizor runtime: transport session and message correlation.
//!
//! This crate provides the low-level infrastructure for talking to app
//! instances over one shared WebSocket:
//!
//! - **Message queue**: matching inbound messages against standing listeners
//!   and pending one-shot waits
//! - **Session**: socket lifecycle, outbound framing, and demultiplexing of
//!   inbound frames into the queue
//! - **Failure handling**: timeout and retry combinators used by every
//!   protocol operation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  vizor-rs   │  Device orchestration (prepare, stories, capture)
//! └──────┬──────┘
//! ┌──────▼──────┐
//! │vizor-runtime│  This crate
//! │  ┌────────┐ │
//! │  │ Queue  │ │  Listener/wait correlation
//! │  └────────┘ │
//! │  ┌────────┐ │
//! │  │Session │ │  WebSocket transport
//! │  └────────┘ │
//! └─────────────┘
//! ```
//!
//! The queue is transport-agnostic: [`queue::MessageQueue::receive_message`]
//! is its only inbound entry point, which keeps the correlation rules fully
//! testable without a live socket.

pub mod error;
pub mod failure;
pub mod queue;
pub mod transport;

pub use error::{Error, Result};
pub use failure::{with_retries, with_timeout};
pub use queue::{MessageQueue, PendingMessage};
pub use transport::{CONNECT_TIMEOUT, Session, SessionState};
