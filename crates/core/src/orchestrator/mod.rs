//! Device orchestration over one storybook WebSocket.
//!
//! One [`Orchestrator`] owns one connection, one message queue, and the
//! working set of devices that answered preparation. All protocol state is
//! mutated either by the caller's own operation or by a listener running on
//! the reader task; the queue serializes inbound settlement, so the only
//! shared structures are the registry and the device set, each behind its
//! own lock.

mod capture;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};
use vizor_protocol::{
	Command, DeviceModelReply, DidPrepare, ERROR_KIND, SetStories, StoryKind, events, prefixed,
};
use vizor_runtime::queue::MessageQueue;
use vizor_runtime::transport::{Session, SessionState};
use vizor_runtime::{with_retries, with_timeout};

use crate::error::{Error, Result};

/// Wait bounds for each protocol phase.
#[derive(Debug, Clone)]
pub struct Timeouts {
	/// WebSocket handshake bound.
	pub connect: Duration,
	/// Single request/response bound (stories, device model).
	pub message: Duration,
	/// Grace window for devices to report in after `prepare`.
	pub prepare_settle: Duration,
	/// Per-device bound on the story-ready signal.
	pub story_ready: Duration,
	/// Overall bound on screenshot collection across the device set.
	pub capture_window: Duration,
	/// Per-device bound on the restore acknowledgement.
	pub restore: Duration,
}

impl Default for Timeouts {
	fn default() -> Self {
		Self {
			connect: Duration::from_secs(5),
			message: Duration::from_secs(2),
			prepare_settle: Duration::from_secs(5),
			story_ready: Duration::from_secs(30),
			capture_window: Duration::from_secs(10),
			restore: Duration::from_secs(30),
		}
	}
}

/// Times `prepare` is retried before start() gives up.
const PREPARE_RETRIES: u32 = 5;

type FatalHook = Box<dyn Fn(&vizor_runtime::Error) + Send + Sync>;

/// Drives every app instance connected to one storybook socket through the
/// capture protocol.
pub struct Orchestrator {
	uri: String,
	platform: String,
	locale: String,
	timeouts: Timeouts,
	queue: Arc<MessageQueue>,
	session: Option<Session>,
	devices: Arc<Mutex<Vec<String>>>,
	last_story_crashed: bool,
	on_fatal: Option<FatalHook>,
}

impl Orchestrator {
	pub fn new(uri: impl Into<String>, platform: impl Into<String>, locale: impl Into<String>) -> Self {
		Self {
			uri: uri.into(),
			platform: platform.into(),
			locale: locale.into(),
			timeouts: Timeouts::default(),
			queue: Arc::new(MessageQueue::new(ERROR_KIND)),
			session: None,
			devices: Arc::new(Mutex::new(Vec::new())),
			last_story_crashed: false,
			on_fatal: None,
		}
	}

	/// Replaces the default wait bounds.
	pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
		self.timeouts = timeouts;
		self
	}

	/// Injects the hook invoked when a device reports a fatal fault while a
	/// story-ready signal is being awaited.
	pub fn on_fatal_device_error<F>(mut self, hook: F) -> Self
	where
		F: Fn(&vizor_runtime::Error) + Send + Sync + 'static,
	{
		self.on_fatal = Some(Box::new(hook));
		self
	}

	/// The device working set observed during preparation.
	pub fn devices(&self) -> Vec<String> {
		self.devices.lock().clone()
	}

	/// Whether the previous story ended in a fatal device crash.
	pub fn last_story_crashed(&self) -> bool {
		self.last_story_crashed
	}

	pub fn is_connected(&self) -> bool {
		self.session
			.as_ref()
			.is_some_and(|session| session.state() == SessionState::Connected)
	}

	/// Connects and prepares every running app instance.
	///
	/// The two failure modes stay distinct: a connection failure points at
	/// the storybook server, a preparation failure at the app configuration.
	pub async fn start(&mut self) -> Result<()> {
		let session = Session::connect(&self.uri, Arc::clone(&self.queue), self.timeouts.connect)
			.await
			.map_err(|source| Error::ServerNotReachable { source })?;
		self.session = Some(session);

		with_retries(PREPARE_RETRIES, || self.prepare())
			.await
			.map_err(|source| Error::Preparation { source })?;

		if self.devices.lock().is_empty() {
			return Err(Error::NoClientDetected);
		}
		Ok(())
	}

	/// One preparation pass: broadcast `prepare` and the locale switch, then
	/// give devices a fixed grace window to report in.
	///
	/// The window is a grace period, not a count-based completion; the
	/// number of devices is unknown in advance.
	async fn prepare(&self) -> vizor_runtime::Result<()> {
		let session = self.session()?;

		let devices = Arc::clone(&self.devices);
		self.queue.add_listener(prefixed(events::DID_PREPARE), move |payload| {
			match serde_json::from_value::<DidPrepare>(payload.clone()) {
				Ok(DidPrepare { device_model: Some(model) }) => {
					let mut devices = devices.lock();
					if !devices.contains(&model) {
						debug!(model = %model, "device reported in");
						devices.push(model);
					}
				}
				Ok(DidPrepare { device_model: None }) => {
					warn!("didPrepare without a device model");
				}
				Err(err) => warn!(error = %err, "malformed didPrepare payload"),
			}
		});

		let sent = session
			.send(Command::Prepare.into_envelope(&self.platform))
			.and_then(|()| {
				session.send(
					Command::ChangeLocale { locale: self.locale.clone() }
						.into_envelope(&self.platform),
				)
			});
		if let Err(err) = sent {
			self.queue.clear_listeners();
			return Err(err);
		}

		sleep(self.timeouts.prepare_settle).await;
		self.queue.clear_listeners();
		Ok(())
	}

	/// Returns every story kind the app reports.
	pub async fn stories(&self) -> Result<Vec<StoryKind>> {
		let reply = self.wait_for_message(events::SET_STORIES.to_owned(), self.timeouts.message);
		self.session()?.send(Command::GetStories.into_envelope(&self.platform))?;
		let payload = reply.await?;
		let stories: SetStories = serde_json::from_value(payload).map_err(vizor_runtime::Error::from)?;
		Ok(stories.stories)
	}

	/// Asks the app for its device model string.
	pub async fn request_device_model(&self) -> Result<String> {
		let reply = self.wait_for_message(events::DEVICE_MODEL.to_owned(), self.timeouts.message);
		self.session()?
			.send(Command::RequestDeviceModel.into_envelope(&self.platform))?;
		let payload = reply.await?;
		let model: DeviceModelReply =
			serde_json::from_value(payload).map_err(vizor_runtime::Error::from)?;
		Ok(model.device_model)
	}

	/// Restores every device and tears the session down.
	pub async fn stop(&mut self) -> Result<()> {
		let devices = self.devices();
		let restore_waits: Vec<_> = devices
			.iter()
			.map(|model| self.wait_for_message(events::did_restore(model), self.timeouts.restore))
			.collect();
		self.session()?.send(Command::Restore.into_envelope(&self.platform))?;
		futures_util::future::try_join_all(restore_waits).await?;

		self.devices.lock().clear();
		if let Some(session) = self.session.take() {
			session.close();
		}
		Ok(())
	}

	fn session(&self) -> vizor_runtime::Result<&Session> {
		self.session.as_ref().ok_or(vizor_runtime::Error::ConnectionClosed)
	}

	/// Registers a wait for one prefixed message, bounds it, and flushes
	/// sibling waits of the same kind on failure so a late, stale reply
	/// cannot resolve them.
	///
	/// Registration happens before the returned future is polled, so the
	/// caller can register, then send the command the reply answers.
	fn wait_for_message(
		&self,
		kind: String,
		timeout: Duration,
	) -> impl Future<Output = vizor_runtime::Result<Value>> + '_ {
		let kind = prefixed(&kind);
		let pending = self.queue.wait_for(kind.clone());
		async move {
			match with_timeout(timeout, &kind, pending).await {
				Ok(value) => Ok(value),
				Err(err) => {
					self.queue.reject_all_of_type(&kind, &err);
					Err(err)
				}
			}
		}
	}

	/// Extension point for restoring devices after a fatal crash.
	///
	/// The app restarts itself shortly after a fatal error; nothing is done
	/// here yet beyond noting the state.
	fn recover_from_crash(&mut self) {
		warn!("previous story crashed fatally, continuing without recovery");
	}
}
