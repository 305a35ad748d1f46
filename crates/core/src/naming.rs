//! Deterministic file naming for captured screenshots.
//!
//! Every image is identified by (story, device, locale): the story basename
//! and locale come from the caller, and the device model is folded into the
//! filename between them when a device answers a capture.

use std::path::{Path, PathBuf};

/// Filename component used when a device answers without reporting a model.
pub const UNKNOWN_DEVICE: &str = "UNKNOWN";

/// Folds a display name into a filename-safe slug.
///
/// Runs of characters outside `[A-Za-z0-9]` collapse into a single `_`;
/// case is preserved, leading and trailing separators are dropped.
pub fn slugify(input: &str) -> String {
	let mut slug = String::with_capacity(input.len());
	let mut pending_separator = false;
	for ch in input.chars() {
		if ch.is_ascii_alphanumeric() {
			if pending_separator && !slug.is_empty() {
				slug.push('_');
			}
			pending_separator = false;
			slug.push(ch);
		} else {
			pending_separator = true;
		}
	}
	slug
}

/// Basename shared by every file of one story in one configuration.
pub fn story_basename(configuration_name: &str, kind: &str, story: &str) -> String {
	slugify(&format!("{configuration_name} {kind} {story}"))
}

/// Where one story's screenshots land and how per-device filenames are
/// built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTemplate {
	dir: PathBuf,
	basename: String,
	locale: String,
	extension: String,
}

impl OutputTemplate {
	pub fn new(dir: impl Into<PathBuf>, basename: impl Into<String>, locale: impl Into<String>) -> Self {
		Self {
			dir: dir.into(),
			basename: basename.into(),
			locale: locale.into(),
			extension: "png".to_owned(),
		}
	}

	/// The same name parts rooted in a different directory. The runner uses
	/// this to mirror one filename across output, reference, and difference
	/// directories.
	pub fn in_dir(&self, dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into(), ..self.clone() }
	}

	/// Path for one device's screenshot, with the model slug between
	/// basename and locale. `None` falls back to [`UNKNOWN_DEVICE`].
	pub fn path_for_device(&self, device_model: Option<&str>) -> PathBuf {
		let device = match device_model {
			Some(model) => slugify(model),
			None => UNKNOWN_DEVICE.to_owned(),
		};
		self.dir.join(format!(
			"{}_{}_{}.{}",
			self.basename, device, self.locale, self.extension
		))
	}

	/// Glob matching every file of this story regardless of device,
	/// including legacy files without a device component.
	pub fn glob_pattern(&self) -> String {
		format!(
			"{}/{}*_{}.{}",
			self.dir.display(),
			self.basename,
			self.locale,
			self.extension
		)
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}
}
