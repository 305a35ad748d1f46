//! Wire types for the vizor device protocol.
//!
//! Devices and the orchestrator share one WebSocket with unrelated traffic,
//! so every orchestration message type carries the [`MESSAGE_PREFIX`]. The
//! envelope itself is a `{type, args}` pair; this crate gives it a typed
//! surface on both directions:
//!
//! - [`Command`]: orchestrator → device, serialized as a prefixed envelope
//!   whose single argument is the parameter object with the originating
//!   platform merged in
//! - event payload structs ([`DidPrepare`], [`SetStories`],
//!   [`CaptureScreenCompleted`], [`DeviceModelReply`]): device →
//!   orchestrator, deserialized from the first envelope argument
//! - [`ErrorArgs`]: the reserved [`ERROR_KIND`] payload a crashing device
//!   broadcasts, carrying message, stack, and the fatal flag

pub mod message;
pub mod story;

pub use message::{
	CaptureScreenCompleted, Command, DeviceModelReply, DidPrepare, Envelope, ErrorArgs,
	ErrorPayload, SetStories, events,
};
pub use story::{StoryId, StoryKind};

/// Namespace prefix distinguishing orchestration traffic from the rest of
/// the socket.
pub const MESSAGE_PREFIX: &str = "vizor:";

/// Reserved message type a device uses to report a fault. Matched against
/// listeners and waits of any kind.
pub const ERROR_KIND: &str = "vizor:error";

/// Prepends [`MESSAGE_PREFIX`] to a bare message name.
pub fn prefixed(kind: &str) -> String {
	format!("{MESSAGE_PREFIX}{kind}")
}
