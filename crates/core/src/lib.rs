//! vizor: visual regression runs against native app instances.
//!
//! An [`Orchestrator`] remote-controls every simulator or emulator connected
//! to one storybook WebSocket: it prepares the apps, enumerates their
//! stories, advances all devices to a story at once, and collects one
//! rendered screenshot per device, tolerating crashes, slow startups, and
//! partial responses.
//!
//! On top of that sits the per-story test flow: [`runner::StoryRunner`]
//! captures a story, then hands each written file to the [`ImageDiffer`]
//! collaborator and reports missing references, missing outputs, and
//! mismatches story by story; one failing story never aborts the rest of
//! the run.
//!
//! Pixel comparison itself, reference approval, and platform-specific
//! capture paths are collaborator concerns and live outside this crate.

pub mod diff;
pub mod error;
pub mod naming;
pub mod orchestrator;
pub mod runner;

pub use diff::ImageDiffer;
pub use error::{Error, Result};
pub use naming::OutputTemplate;
pub use orchestrator::{Orchestrator, Timeouts};
pub use runner::{RunnerConfig, StoryCapture, StoryOutcome, StoryRunner};
pub use vizor_protocol::{StoryId, StoryKind};
