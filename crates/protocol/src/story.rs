//! Story identifiers and the collection reported by the app.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One renderable state of the app under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoryId {
	/// Coarse grouping, e.g. a component name.
	pub kind: String,
	/// Story name within the kind.
	pub story: String,
}

impl StoryId {
	pub fn new(kind: impl Into<String>, story: impl Into<String>) -> Self {
		Self { kind: kind.into(), story: story.into() }
	}
}

impl fmt::Display for StoryId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.kind, self.story)
	}
}

/// One entry of the `setStories` collection: a kind and its stories, with
/// the ones the app wants excluded from capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryKind {
	pub kind: String,
	pub stories: Vec<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub skipped: Vec<String>,
}

impl StoryKind {
	/// Story ids of this kind, skipped entries excluded.
	pub fn ids(&self) -> impl Iterator<Item = StoryId> + '_ {
		self.stories
			.iter()
			.filter(|story| !self.skipped.contains(*story))
			.map(|story| StoryId::new(self.kind.clone(), story.clone()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn set_stories_wire_shape_parses() {
		let raw = r#"{"stories": [{"kind": "Button", "stories": ["primary", "danger"], "skipped": ["danger"]}]}"#;
		let parsed: crate::SetStories = serde_json::from_str(raw).unwrap();
		assert_eq!(parsed.stories.len(), 1);
		assert_eq!(parsed.stories[0].kind, "Button");
		assert_eq!(parsed.stories[0].skipped, vec!["danger"]);
	}

	#[test]
	fn ids_exclude_skipped_stories() {
		let kind = StoryKind {
			kind: "Button".to_owned(),
			stories: vec!["primary".to_owned(), "danger".to_owned()],
			skipped: vec!["danger".to_owned()],
		};
		let ids: Vec<_> = kind.ids().collect();
		assert_eq!(ids, vec![StoryId::new("Button", "primary")]);
	}
}
