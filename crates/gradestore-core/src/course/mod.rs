//! Course content tree collaborator
//!
//! Grade computation only needs to walk the blocks under a subsection and read
//! each block's live metadata. [`CourseTree`] captures that; [`BlockStructure`]
//! is an in-memory implementation loaded from a course snapshot.

mod structure;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys::{CourseKey, UsageKey};

pub use structure::{BlockStructure, CourseSnapshot, CONTAINER_BLOCK_TYPES};

/// Live metadata of one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockMetadata {
    pub location: UsageKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub has_score: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub graded: bool,
    /// Declared maximum, used when the student has no score yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,
    /// Last edit anywhere in this block's subtree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtree_edited_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub children: Vec<UsageKey>,
}

impl BlockMetadata {
    pub fn new(location: UsageKey) -> Self {
        Self {
            location,
            display_name: None,
            has_score: false,
            weight: None,
            graded: false,
            max_score: None,
            format: None,
            due: None,
            subtree_edited_on: None,
            children: Vec::new(),
        }
    }

    /// Display name, or a readable form of the block id when none is set.
    pub fn display_name_with_default(&self) -> String {
        match &self.display_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => self.url_name().replace('_', " "),
        }
    }

    pub fn url_name(&self) -> &str {
        self.location.block_id()
    }
}

/// Read access to a course's block tree.
pub trait CourseTree {
    fn course_key(&self) -> &CourseKey;

    fn root(&self) -> &UsageKey;

    fn contains(&self, location: &UsageKey) -> bool {
        self.block(location).is_some()
    }

    fn block(&self, location: &UsageKey) -> Option<&BlockMetadata>;

    /// Whether the block or something beneath it may carry a score.
    fn possibly_scored(&self, location: &UsageKey) -> bool;

    /// Every block in the tree, in no particular order.
    fn locations(&self) -> Box<dyn Iterator<Item = &UsageKey> + '_>;

    /// Lazily walk the subtree under `start`, children before parents.
    ///
    /// Nodes rejected by `filter` are skipped along with their subtrees, and a
    /// node reachable along several paths is yielded once.
    fn post_order_traversal<'a>(
        &'a self,
        start: &UsageKey,
        filter: Box<dyn Fn(&UsageKey) -> bool + 'a>,
    ) -> Box<dyn Iterator<Item = UsageKey> + 'a>;
}
