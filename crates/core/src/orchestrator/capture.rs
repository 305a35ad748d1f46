//! Story capture across the device working set.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::Engine;
use futures_util::future::try_join_all;
use tokio::sync::Notify;
use tracing::{debug, warn};
use vizor_protocol::{CaptureScreenCompleted, Command, StoryId, events, prefixed};

use super::Orchestrator;
use crate::error::Result;
use crate::naming::OutputTemplate;

impl Orchestrator {
	/// Advances every device to `story` and collects one screenshot per
	/// device under `output`.
	///
	/// The advance is one broadcast, not per-device; every device must then
	/// report ready before the first capture command goes out, so capture
	/// requests never race a device still transitioning. A fatal device
	/// error during the ready phase aborts the capture and marks the
	/// session; the collection phase afterwards is best effort.
	pub async fn capture_story(&mut self, story: &StoryId, output: &OutputTemplate) -> Result<()> {
		if self.last_story_crashed {
			self.recover_from_crash();
		}
		debug!(%story, "capturing story");

		let devices = self.devices();
		let ready_waits: Vec<_> = devices
			.iter()
			.map(|model| self.wait_for_message(events::ready(model), self.timeouts.story_ready))
			.collect();
		self.session()?.send(
			Command::SetCurrentStory {
				kind: story.kind.clone(),
				story: story.story.clone(),
			}
			.into_envelope(&self.platform),
		)?;

		if let Err(err) = try_join_all(ready_waits).await {
			if err.is_fatal_device() {
				self.last_story_crashed = true;
				if let Some(hook) = &self.on_fatal {
					hook(&err);
				}
			}
			return Err(err.into());
		}
		self.last_story_crashed = false;

		self.collect_screens(&devices, output).await;
		self.queue.clear_listeners();
		Ok(())
	}

	/// Fans one capture command out per device and counts the completions
	/// back in, bounded by the capture window.
	async fn collect_screens(&self, devices: &[String], output: &OutputTemplate) {
		if devices.is_empty() {
			warn!("no devices in the working set, nothing to capture");
			return;
		}
		let expected = devices.len();
		let completed = Arc::new(AtomicUsize::new(0));
		let all_done = Arc::new(Notify::new());

		let template = output.clone();
		let counter = Arc::clone(&completed);
		let done = Arc::clone(&all_done);
		self.queue
			.add_listener(prefixed(events::CAPTURE_SCREEN_COMPLETED), move |payload| {
				let shot: CaptureScreenCompleted = match serde_json::from_value(payload.clone()) {
					Ok(shot) => shot,
					Err(err) => {
						warn!(error = %err, "malformed captureScreenCompleted payload");
						return;
					}
				};
				let path = template.path_for_device(shot.device_model.as_deref());
				match base64::prelude::BASE64_STANDARD.decode(shot.screen_image.as_bytes()) {
					Ok(bytes) => match std::fs::write(&path, bytes) {
						Ok(()) => debug!(path = %path.display(), "wrote screenshot"),
						Err(err) => {
							warn!(path = %path.display(), error = %err, "failed writing screenshot");
						}
					},
					Err(err) => warn!(error = %err, "screen image was not valid base64"),
				}
				if counter.fetch_add(1, Ordering::SeqCst) + 1 >= expected {
					done.notify_one();
				}
			});

		for device in devices {
			let command = Command::CaptureScreen { device: device.clone() }.into_envelope(&self.platform);
			match self.session.as_ref() {
				Some(session) => {
					if let Err(err) = session.send(command) {
						warn!(%device, error = %err, "failed requesting a capture");
					}
				}
				None => warn!(%device, "no live session to request a capture on"),
			}
		}

		// Best effort: devices that have not answered when the window
		// elapses are reported and skipped, the run keeps going.
		if tokio::time::timeout(self.timeouts.capture_window, all_done.notified())
			.await
			.is_err()
		{
			warn!(
				expected,
				completed = completed.load(Ordering::SeqCst),
				"capture window elapsed before every device completed"
			);
		}
	}
}
