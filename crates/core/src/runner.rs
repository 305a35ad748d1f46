//! Per-story capture-and-compare flow.
//!
//! One story run: capture it (into the reference directory when updating,
//! the output directory when checking), then hand every written file to the
//! [`ImageDiffer`] collaborator. Failures are story-scoped: the run over a
//! story list reports each failure and keeps going.

use std::future::Future;
use std::path::PathBuf;

use glob::glob;
use tracing::{debug, warn};
use vizor_protocol::StoryId;

use crate::diff::ImageDiffer;
use crate::error::{Error, Result};
use crate::naming::{OutputTemplate, story_basename};
use crate::orchestrator::Orchestrator;

/// What the runner needs from a capture backend.
///
/// The seam exists so the flow can be exercised without a live socket; the
/// production implementation is [`Orchestrator`].
pub trait StoryCapture {
	/// Advances every device to `story` and writes one screenshot per
	/// device under `output`.
	fn capture_story(
		&mut self,
		story: &StoryId,
		output: &OutputTemplate,
	) -> impl Future<Output = Result<()>> + Send;
}

impl StoryCapture for Orchestrator {
	fn capture_story(
		&mut self,
		story: &StoryId,
		output: &OutputTemplate,
	) -> impl Future<Output = Result<()>> + Send {
		Orchestrator::capture_story(self, story, output)
	}
}

/// Directory layout and comparison policy for one configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
	/// Name of the configuration, folded into every filename.
	pub configuration_name: String,
	/// Locale under test, folded into every filename.
	pub locale: String,
	pub reference_dir: PathBuf,
	pub output_dir: PathBuf,
	pub difference_dir: PathBuf,
	/// Tolerance handed through to the differ, unit defined by the engine.
	pub tolerance: f64,
	/// Rewrite reference images instead of comparing against them.
	pub update_reference: bool,
	/// Fail stories without a reference instead of creating one.
	pub require_reference: bool,
}

/// Result of one story's test.
#[derive(Debug)]
pub struct StoryOutcome {
	pub story: StoryId,
	pub result: Result<()>,
}

impl StoryOutcome {
	pub fn passed(&self) -> bool {
		self.result.is_ok()
	}
}

/// Captures stories and compares them against their references.
pub struct StoryRunner<D> {
	config: RunnerConfig,
	differ: D,
}

impl<D: ImageDiffer> StoryRunner<D> {
	pub fn new(config: RunnerConfig, differ: D) -> Self {
		Self { config, differ }
	}

	/// Tests every story in order, reporting per-story outcomes. One
	/// failing story never aborts the remaining ones.
	pub async fn run<T: StoryCapture>(&self, target: &mut T, stories: &[StoryId]) -> Vec<StoryOutcome> {
		let mut outcomes = Vec::with_capacity(stories.len());
		for story in stories {
			let result = self.test_story(target, story).await;
			if let Err(err) = &result {
				warn!(%story, error = %err, "story failed");
			}
			outcomes.push(StoryOutcome { story: story.clone(), result });
		}
		outcomes
	}

	/// Captures one story and compares every written file against its
	/// reference.
	pub async fn test_story<T: StoryCapture>(&self, target: &mut T, story: &StoryId) -> Result<()> {
		let basename = story_basename(&self.config.configuration_name, &story.kind, &story.story);
		let reference = OutputTemplate::new(&self.config.reference_dir, &basename, &self.config.locale);
		let output = reference.in_dir(&self.config.output_dir);

		let reference_exists = !matching_files(&reference).is_empty();
		let update = self.config.update_reference
			|| (!self.config.require_reference && !reference_exists);

		let capture_to = if update { &reference } else { &output };
		target.capture_story(story, capture_to).await?;

		if update {
			debug!(%story, "reference updated");
			return Ok(());
		}
		if !reference_exists {
			return Err(Error::MissingReference { story: story.clone() });
		}

		let outputs = matching_files(&output);
		if outputs.is_empty() {
			return Err(Error::MissingOutput { story: story.clone() });
		}

		for output_path in outputs {
			let Some(file_name) = output_path.file_name() else { continue };
			let reference_path = self.config.reference_dir.join(file_name);
			// A device unknown to the reference set is not a failure; the
			// update flow is how new devices enter it.
			if !reference_path.exists() {
				continue;
			}
			let difference_path = self.config.difference_dir.join(file_name);
			let is_equal = self.differ.compare(
				&reference_path,
				&output_path,
				&difference_path,
				self.config.tolerance,
			)?;
			if !is_equal {
				return Err(Error::ImageMismatch {
					story: story.clone(),
					diff_path: difference_path,
				});
			}
		}
		Ok(())
	}
}

/// Files of one story across all devices. Glob failures count as no files,
/// matching the best-effort policy of the reference lookup.
fn matching_files(template: &OutputTemplate) -> Vec<PathBuf> {
	match glob(&template.glob_pattern()) {
		Ok(paths) => paths.filter_map(|path| path.ok()).collect(),
		Err(err) => {
			warn!(error = %err, "bad glob pattern");
			Vec::new()
		}
	}
}
