//! Error types for the vizor runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from the transport session and message queue.
///
/// `Clone` because bulk rejection hands the same error to every pending
/// waiter; wrapped sources are therefore captured as strings rather than
/// kept as source errors.
#[derive(Debug, Clone, Error)]
pub enum Error {
	/// The socket never opened.
	#[error("Failed to connect to the app socket: {0}")]
	ConnectionFailed(String),

	/// No open acknowledgement arrived within the connect bound.
	#[error("Timed out connecting to the app socket")]
	ConnectTimeout,

	/// Socket-level failure after the connection was established.
	#[error("Transport error: {0}")]
	Transport(String),

	/// The connection closed while callers were still waiting.
	#[error("Connection closed")]
	ConnectionClosed,

	/// A remote device reported a fault.
	#[error("Device error: {message}")]
	Device {
		/// Human-readable message from the device.
		message: String,
		/// Device-side stack trace, when one was reported.
		stack: Option<String>,
		/// Whether the device considers itself crashed.
		is_fatal: bool,
	},

	/// A wait was not satisfied within its bound.
	#[error("Timed out waiting for {0}")]
	Timeout(String),

	/// Envelope (de)serialization failed.
	#[error("JSON error: {0}")]
	Json(String),
}

impl Error {
	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout(_) | Error::ConnectTimeout)
	}

	/// Returns true if a device reported a fatal fault.
	pub fn is_fatal_device(&self) -> bool {
		matches!(self, Error::Device { is_fatal: true, .. })
	}

	/// Returns the device-side stack trace, when one was reported.
	pub fn stack_trace(&self) -> Option<&str> {
		match self {
			Error::Device { stack, .. } => stack.as_deref(),
			_ => None,
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::Json(err.to_string())
	}
}
