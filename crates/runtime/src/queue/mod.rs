//! Correlation of inbound messages to listeners and one-shot waits.
//!
//! This is the request/response heart of the protocol, kept fully
//! transport-agnostic: [`MessageQueue::receive_message`] is the sole inbound
//! entry point. Two registration shapes cover the two reply patterns on the
//! wire:
//!
//! - **Standing listeners** fire on every matching message until cleared.
//!   They carry fan-in events that arrive once per device, an unknown number
//!   of times per story.
//! - **One-shot waits** settle exactly once, FIFO among waits of the same
//!   kind, and are removed on match, bulk rejection, or timeout-triggered
//!   rejection.
//!
//! Messages of the reserved error kind match listeners and waits of *any*
//! kind: a device crash can arrive while the session is waiting for anything
//! from that device, and must short-circuit whatever is being awaited.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use vizor_protocol::ErrorArgs;

use crate::error::{Error, Result};

/// Predicate over the args of an inbound message. Evaluated under the
/// registry lock; must not touch the queue.
pub type Condition = Arc<dyn Fn(&[Value]) -> bool + Send + Sync>;

type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

struct Listener {
	kind: String,
	condition: Option<Condition>,
	callback: Callback,
}

struct Waiter {
	kind: String,
	condition: Option<Condition>,
	tx: oneshot::Sender<Result<Value>>,
}

impl Waiter {
	fn matches(&self, is_error: bool, kind: &str, args: &[Value]) -> bool {
		(is_error || self.kind == kind)
			&& self.condition.as_ref().map_or(true, |condition| condition(args))
	}
}

/// Registry matching inbound messages against standing listeners and
/// pending one-shot waits.
///
/// Mutation happens only under the registry lock; listener callbacks and
/// wait settlements run after the lock is released, so callbacks may
/// re-enter the queue. Conditions are evaluated under the lock and must be
/// pure predicates over the message args.
pub struct MessageQueue {
	error_kind: String,
	inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
	listeners: Vec<Listener>,
	waiters: Vec<Waiter>,
}

impl MessageQueue {
	/// Creates a queue treating `error_kind` as the reserved error type.
	pub fn new(error_kind: impl Into<String>) -> Self {
		Self {
			error_kind: error_kind.into(),
			inner: Mutex::new(Inner::default()),
		}
	}

	/// Registers a standing subscription for `kind`. Multiple listeners of
	/// the same kind may coexist.
	pub fn add_listener<F>(&self, kind: impl Into<String>, callback: F)
	where
		F: Fn(&Value) + Send + Sync + 'static,
	{
		self.add_listener_matching(kind, None, callback);
	}

	/// Registers a standing subscription invoked only when `condition` holds
	/// over the message args.
	pub fn add_listener_matching<F>(
		&self,
		kind: impl Into<String>,
		condition: Option<Condition>,
		callback: F,
	) where
		F: Fn(&Value) + Send + Sync + 'static,
	{
		self.inner.lock().listeners.push(Listener {
			kind: kind.into(),
			condition,
			callback: Arc::new(callback),
		});
	}

	/// Removes every standing listener. Used between story captures so
	/// callbacks cannot leak across stories.
	pub fn clear_listeners(&self) {
		self.inner.lock().listeners.clear();
	}

	/// Registers a one-shot wait for the next message of `kind`.
	///
	/// Registration happens immediately, before the returned future is first
	/// polled, so a reply racing the caller cannot slip past. There is no
	/// implicit timeout; wrap with
	/// [`with_timeout`](crate::failure::with_timeout).
	pub fn wait_for(&self, kind: impl Into<String>) -> PendingMessage {
		self.wait_for_matching(kind, None)
	}

	/// Registers a one-shot wait settled only by a message whose args
	/// satisfy `condition`.
	pub fn wait_for_matching(
		&self,
		kind: impl Into<String>,
		condition: Option<Condition>,
	) -> PendingMessage {
		let (tx, rx) = oneshot::channel();
		self.inner.lock().waiters.push(Waiter { kind: kind.into(), condition, tx });
		PendingMessage { rx }
	}

	/// Sole inbound entry point.
	///
	/// Every matching listener is invoked; then the oldest matching wait is
	/// settled (resolved with the first arg, or rejected with a device
	/// error when the message is the reserved error kind) and removed. At
	/// most one wait settles per message. Waits whose receiver has been
	/// dropped are discarded during the scan and never consume a message.
	pub fn receive_message(&self, kind: &str, args: &[Value]) {
		let is_error = kind == self.error_kind;
		let payload = args.first().cloned().unwrap_or(Value::Null);

		let matched: Vec<Callback> = {
			let inner = self.inner.lock();
			inner
				.listeners
				.iter()
				.filter(|listener| {
					(is_error || listener.kind == kind)
						&& listener.condition.as_ref().map_or(true, |condition| condition(args))
				})
				.map(|listener| Arc::clone(&listener.callback))
				.collect()
		};
		for callback in matched {
			callback(&payload);
		}

		let settled = {
			let mut inner = self.inner.lock();
			let mut found = None;
			let mut index = 0;
			while index < inner.waiters.len() {
				if inner.waiters[index].tx.is_closed() {
					inner.waiters.remove(index);
					continue;
				}
				if inner.waiters[index].matches(is_error, kind, args) {
					found = Some(inner.waiters.remove(index));
					break;
				}
				index += 1;
			}
			found
		};

		if let Some(waiter) = settled {
			let outcome = if is_error { Err(device_error(args)) } else { Ok(payload) };
			let _ = waiter.tx.send(outcome);
		}
	}

	/// Rejects and removes every pending wait. Used on transport failure so
	/// no caller hangs.
	pub fn reject_all(&self, err: &Error) {
		let drained: Vec<Waiter> = {
			let mut inner = self.inner.lock();
			inner.waiters.drain(..).collect()
		};
		for waiter in drained {
			let _ = waiter.tx.send(Err(err.clone()));
		}
	}

	/// Rejects and removes only waits of `kind`. Used when one wait's
	/// timeout fires, to flush sibling waits that a late, stale message
	/// could otherwise resolve.
	pub fn reject_all_of_type(&self, kind: &str, err: &Error) {
		let drained: Vec<Waiter> = {
			let mut inner = self.inner.lock();
			let (dropped, kept) = std::mem::take(&mut inner.waiters)
				.into_iter()
				.partition(|waiter| waiter.kind == kind);
			inner.waiters = kept;
			dropped
		};
		for waiter in drained {
			let _ = waiter.tx.send(Err(err.clone()));
		}
	}
}

/// Future returned by [`MessageQueue::wait_for`].
///
/// Settles with the first arg of the matching message, or with the error
/// the wait was rejected with.
pub struct PendingMessage {
	rx: oneshot::Receiver<Result<Value>>,
}

impl Future for PendingMessage {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.rx).poll(cx).map(|received| match received {
			Ok(outcome) => outcome,
			Err(_) => Err(Error::ConnectionClosed),
		})
	}
}

/// Builds the rejection for a wait settled by the reserved error kind,
/// preserving message, stack, and the fatal flag.
fn device_error(args: &[Value]) -> Error {
	let parsed = args
		.first()
		.and_then(|arg| serde_json::from_value::<ErrorArgs>(arg.clone()).ok());
	match parsed {
		Some(ErrorArgs { error, is_fatal }) => Error::Device {
			message: error.message,
			stack: error.stack,
			is_fatal,
		},
		None => Error::Device {
			message: "device reported an unrecognized error".to_owned(),
			stack: None,
			is_fatal: false,
		},
	}
}

#[cfg(test)]
mod tests;
