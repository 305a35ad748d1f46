//! Session-level error types.

use std::path::PathBuf;

use thiserror::Error;
use vizor_protocol::StoryId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// The companion server never opened the socket.
	#[error(
		"Failed connecting to the storybook server. Start it and review the --port and --host arguments."
	)]
	ServerNotReachable {
		#[source]
		source: vizor_runtime::Error,
	},

	/// Preparation kept failing across every retry.
	#[error(
		"Failed preparing the app for capture. Make sure it is configured and running in storybook mode."
	)]
	Preparation {
		#[source]
		source: vizor_runtime::Error,
	},

	/// Preparation succeeded but no device ever reported in.
	#[error("Couldn't detect any connected client")]
	NoClientDetected,

	/// A story was captured but no reference image exists to compare with.
	#[error("No reference image found for {story}")]
	MissingReference { story: StoryId },

	/// No output image was written for a story that should have produced one.
	#[error("No output image found for {story}")]
	MissingOutput { story: StoryId },

	/// Pixel comparison failed; the visualization is at `diff_path`.
	#[error("Screenshot for {story} differs from reference, see {}", diff_path.display())]
	ImageMismatch { story: StoryId, diff_path: PathBuf },

	#[error(transparent)]
	Runtime(#[from] vizor_runtime::Error),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl Error {
	/// Returns true if a device reported a fatal fault.
	pub fn is_fatal_device(&self) -> bool {
		matches!(self, Error::Runtime(err) if err.is_fatal_device())
	}
}
