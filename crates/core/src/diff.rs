//! Collaborator boundary for pixel comparison.

use std::path::Path;

use crate::error::Result;

/// Compares a captured screenshot against its reference image.
///
/// Implementations are external collaborators (a pixel-diff engine, an
/// ODiff/pixelmatch shell-out, a perceptual hash); the runner invokes
/// [`compare`](ImageDiffer::compare) once per captured file and never
/// interprets the images itself.
pub trait ImageDiffer: Send + Sync {
	/// Returns whether `output` matches `reference` within `tolerance`,
	/// writing a visualization to `difference` when they differ.
	fn compare(
		&self,
		reference: &Path,
		output: &Path,
		difference: &Path,
		tolerance: f64,
	) -> Result<bool>;
}

impl<F> ImageDiffer for F
where
	F: Fn(&Path, &Path, &Path, f64) -> Result<bool> + Send + Sync,
{
	fn compare(
		&self,
		reference: &Path,
		output: &Path,
		difference: &Path,
		tolerance: f64,
	) -> Result<bool> {
		self(reference, output, difference, tolerance)
	}
}
