//! WebSocket session owning the single duplex channel to the app.
//!
//! The session is deliberately thin: it frames outbound envelopes, feeds
//! every inbound text frame into the [`MessageQueue`], and keeps the
//! connection lifecycle explicit. Correlation of replies to requests lives
//! entirely in the queue; `send` is fire and forget.
//!
//! There is no auto-reconnect: a dropped socket rejects every pending wait
//! and reconnection is a fresh [`Session::connect`] by the caller.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::debug;
use vizor_protocol::Envelope;

use crate::error::{Error, Result};
use crate::queue::MessageQueue;

/// Default bound on the WebSocket handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Disconnected,
	Connecting,
	Connected,
	Closed,
}

/// One live WebSocket connection demultiplexing into a [`MessageQueue`].
#[derive(Debug)]
pub struct Session {
	outbound: mpsc::UnboundedSender<WsMessage>,
	state: Arc<Mutex<SessionState>>,
}

impl Session {
	/// Opens the socket and starts demultiplexing inbound frames into
	/// `queue`.
	///
	/// Fails with [`Error::ConnectTimeout`] if the handshake does not
	/// complete within `connect_timeout`. On any connect failure, and on
	/// any later socket error or close, every pending wait in `queue` is
	/// rejected so no caller hangs.
	pub async fn connect(
		uri: &str,
		queue: Arc<MessageQueue>,
		connect_timeout: Duration,
	) -> Result<Self> {
		let state = Arc::new(Mutex::new(SessionState::Connecting));
		debug!(uri, "connecting");

		let stream = match tokio::time::timeout(connect_timeout, connect_async(uri)).await {
			Ok(Ok((stream, _response))) => stream,
			Ok(Err(err)) => {
				let err = Error::ConnectionFailed(err.to_string());
				*state.lock() = SessionState::Disconnected;
				queue.reject_all(&err);
				return Err(err);
			}
			Err(_) => {
				let err = Error::ConnectTimeout;
				*state.lock() = SessionState::Disconnected;
				queue.reject_all(&err);
				return Err(err);
			}
		};
		debug!(uri, "connected");
		*state.lock() = SessionState::Connected;

		let (mut sink, mut source) = stream.split();
		let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<WsMessage>();

		// Writer: drains the outbound channel so send() never awaits.
		tokio::spawn(async move {
			while let Some(frame) = outbound_rx.recv().await {
				if let Err(err) = sink.send(frame).await {
					debug!(error = %err, "outbound write failed");
					break;
				}
			}
			let _ = sink.close().await;
		});

		// Reader: every text frame goes through the queue; a socket error or
		// close rejects all pending waits.
		let reader_state = Arc::clone(&state);
		tokio::spawn(async move {
			loop {
				match source.next().await {
					Some(Ok(WsMessage::Text(raw))) => match serde_json::from_str::<Envelope>(&raw) {
						Ok(envelope) => {
							debug!(kind = %envelope.kind, "received message");
							queue.receive_message(&envelope.kind, &envelope.args);
						}
						// The socket is shared with unrelated traffic.
						Err(err) => debug!(error = %err, "ignoring unparseable frame"),
					},
					Some(Ok(WsMessage::Close(_))) | None => {
						debug!("connection closed");
						*reader_state.lock() = SessionState::Closed;
						queue.reject_all(&Error::ConnectionClosed);
						break;
					}
					Some(Ok(_)) => {}
					Some(Err(err)) => {
						debug!(error = %err, "transport error");
						*reader_state.lock() = SessionState::Closed;
						queue.reject_all(&Error::Transport(err.to_string()));
						break;
					}
				}
			}
		});

		Ok(Self { outbound: outbound_tx, state })
	}

	/// Serializes the envelope and writes it.
	///
	/// Fire and forget: no acknowledgement is implied, and correlating a
	/// reply is the caller's job via the queue.
	pub fn send(&self, envelope: Envelope) -> Result<()> {
		if *self.state.lock() != SessionState::Connected {
			return Err(Error::ConnectionClosed);
		}
		debug!(kind = %envelope.kind, "sending message");
		let raw = serde_json::to_string(&envelope)?;
		self.outbound
			.send(WsMessage::Text(raw))
			.map_err(|_| Error::ConnectionClosed)
	}

	/// Current lifecycle state.
	pub fn state(&self) -> SessionState {
		*self.state.lock()
	}

	/// Closes the socket. Idempotent.
	pub fn close(&self) {
		{
			let mut state = self.state.lock();
			if *state == SessionState::Closed {
				return;
			}
			*state = SessionState::Closed;
		}
		let _ = self.outbound.send(WsMessage::Close(None));
	}
}

#[cfg(test)]
mod tests;
