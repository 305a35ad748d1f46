//! Envelope, commands, and event payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::prefixed;

/// Wire-level message envelope shared by both directions.
///
/// `args` is positional on the wire; for every message this crate cares
/// about the payload is the first element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub args: Vec<Value>,
}

impl Envelope {
	pub fn new(kind: impl Into<String>, args: Vec<Value>) -> Self {
		Self { kind: kind.into(), args }
	}
}

/// Orchestrator → device command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
	/// Ask every running instance to enter capture mode and report in.
	Prepare,
	/// Switch the app locale before capturing.
	ChangeLocale { locale: String },
	/// Request the story collection.
	GetStories,
	/// Advance every device to the given story at once.
	SetCurrentStory { kind: String, story: String },
	/// Ask one device for its rendered screen.
	CaptureScreen { device: String },
	/// Undo capture-mode preparation.
	Restore,
	/// Ask the app for its device model string.
	RequestDeviceModel,
}

impl Command {
	/// Bare wire name, without the namespace prefix.
	pub fn name(&self) -> &'static str {
		match self {
			Command::Prepare => "prepare",
			Command::ChangeLocale { .. } => "changeLocale",
			Command::GetStories => "getStories",
			Command::SetCurrentStory { .. } => "setCurrentStory",
			Command::CaptureScreen { .. } => "captureScreen",
			Command::Restore => "restore",
			Command::RequestDeviceModel => "requestDeviceModel",
		}
	}

	/// Serializes into a prefixed envelope whose single argument is the
	/// parameter object with the originating `platform` merged in.
	pub fn into_envelope(self, platform: &str) -> Envelope {
		let name = self.name();
		let mut params = match self {
			Command::Prepare
			| Command::GetStories
			| Command::Restore
			| Command::RequestDeviceModel => Map::new(),
			Command::ChangeLocale { locale } => {
				let mut map = Map::new();
				map.insert("locale".to_owned(), Value::String(locale));
				map
			}
			Command::SetCurrentStory { kind, story } => {
				let mut map = Map::new();
				map.insert("kind".to_owned(), Value::String(kind));
				map.insert("story".to_owned(), Value::String(story));
				map
			}
			Command::CaptureScreen { device } => {
				let mut map = Map::new();
				map.insert("device".to_owned(), Value::String(device));
				map
			}
		};
		params.insert("platform".to_owned(), Value::String(platform.to_owned()));
		Envelope::new(prefixed(name), vec![Value::Object(params)])
	}
}

/// Inbound event names (unprefixed) and the per-device interpolated kinds.
pub mod events {
	pub const DID_PREPARE: &str = "didPrepare";
	pub const SET_STORIES: &str = "setStories";
	pub const CAPTURE_SCREEN_COMPLETED: &str = "captureScreenCompleted";
	pub const DEVICE_MODEL: &str = "deviceModel";

	/// Per-device readiness signal; the model is interpolated into the kind.
	pub fn ready(device_model: &str) -> String {
		format!("ready{device_model}")
	}

	/// Per-device restore acknowledgement.
	pub fn did_restore(device_model: &str) -> String {
		format!("didRestore{device_model}")
	}
}

/// Payload of `didPrepare`, sent by each instance answering preparation.
///
/// The model is optional on the wire; instances that omit it are counted as
/// unidentified and skipped by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidPrepare {
	#[serde(default)]
	pub device_model: Option<String>,
}

/// Payload of `setStories`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetStories {
	pub stories: Vec<crate::story::StoryKind>,
}

/// Payload of `captureScreenCompleted`; `screen_image` is base64 PNG data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureScreenCompleted {
	#[serde(default)]
	pub device_model: Option<String>,
	pub screen_image: String,
}

/// Payload of `deviceModel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceModelReply {
	pub device_model: String,
}

/// Fault details inside [`ErrorArgs`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stack: Option<String>,
}

/// Payload of the reserved error kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorArgs {
	pub error: ErrorPayload,
	#[serde(default)]
	pub is_fatal: bool,
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn command_envelope_is_prefixed_and_carries_the_platform() {
		let envelope = Command::SetCurrentStory {
			kind: "Button".to_owned(),
			story: "primary".to_owned(),
		}
		.into_envelope("ios");

		assert_eq!(envelope.kind, "vizor:setCurrentStory");
		assert_eq!(
			envelope.args,
			vec![json!({"kind": "Button", "story": "primary", "platform": "ios"})]
		);
	}

	#[test]
	fn parameterless_commands_still_carry_the_platform() {
		let envelope = Command::Prepare.into_envelope("android");
		assert_eq!(envelope.kind, "vizor:prepare");
		assert_eq!(envelope.args, vec![json!({"platform": "android"})]);
	}

	#[test]
	fn envelope_round_trips_through_json() {
		let raw = r#"{"type":"vizor:didPrepare","args":[{"deviceModel":"iPhone 8"}]}"#;
		let envelope: Envelope = serde_json::from_str(raw).unwrap();
		assert_eq!(envelope.kind, "vizor:didPrepare");

		let payload: DidPrepare = serde_json::from_value(envelope.args[0].clone()).unwrap();
		assert_eq!(payload.device_model.as_deref(), Some("iPhone 8"));
	}

	#[test]
	fn envelope_without_args_deserializes_to_an_empty_list() {
		let envelope: Envelope = serde_json::from_str(r#"{"type":"vizor:readyiPhone 8"}"#).unwrap();
		assert!(envelope.args.is_empty());
	}

	#[test]
	fn error_args_parse_message_stack_and_fatal_flag() {
		let raw = json!({"error": {"message": "boom", "stack": "at render"}, "isFatal": true});
		let parsed: ErrorArgs = serde_json::from_value(raw).unwrap();
		assert_eq!(parsed.error.message, "boom");
		assert_eq!(parsed.error.stack.as_deref(), Some("at render"));
		assert!(parsed.is_fatal);
	}

	#[test]
	fn interpolated_event_kinds_embed_the_device_model() {
		assert_eq!(events::ready("iPhone 8"), "readyiPhone 8");
		assert_eq!(events::did_restore("Pixel 4"), "didRestorePixel 4");
	}
}
