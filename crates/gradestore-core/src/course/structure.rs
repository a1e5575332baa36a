use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{BlockMetadata, CourseTree};
use crate::error::{GradeError, Result};
use crate::keys::{CourseKey, UsageKey};

/// Block types that may contain scored descendants.
pub const CONTAINER_BLOCK_TYPES: &[&str] = &["course", "chapter", "sequential", "vertical"];

const SUBSECTION_BLOCK_TYPE: &str = "sequential";

/// On-disk form of a course tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseSnapshot {
    pub course_id: CourseKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_version: Option<String>,
    pub root: UsageKey,
    pub blocks: Vec<BlockMetadata>,
}

/// In-memory course tree.
#[derive(Debug, Clone)]
pub struct BlockStructure {
    course_key: CourseKey,
    course_version: Option<String>,
    root: UsageKey,
    blocks: HashMap<UsageKey, BlockMetadata>,
}

impl BlockStructure {
    /// Validate a snapshot and index its blocks.
    pub fn from_snapshot(snapshot: CourseSnapshot) -> Result<Self> {
        let mut blocks = HashMap::with_capacity(snapshot.blocks.len());
        for block in snapshot.blocks {
            if block.location.course_key() != &snapshot.course_id {
                return Err(GradeError::structural(format!(
                    "block {} is not in course {}",
                    block.location, snapshot.course_id
                )));
            }
            if blocks.contains_key(&block.location) {
                return Err(GradeError::already_exists("block", &block.location));
            }
            blocks.insert(block.location.clone(), block);
        }

        if !blocks.contains_key(&snapshot.root) {
            return Err(GradeError::not_found("root block", &snapshot.root));
        }

        for block in blocks.values() {
            if let Some(missing) = block.children.iter().find(|c| !blocks.contains_key(*c)) {
                return Err(GradeError::structural(format!(
                    "block {} lists unknown child {}",
                    block.location, missing
                )));
            }
        }

        Ok(Self {
            course_key: snapshot.course_id,
            course_version: snapshot.course_version,
            root: snapshot.root,
            blocks,
        })
    }

    /// Load a snapshot JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let snapshot: CourseSnapshot = serde_json::from_str(&content)?;
        Self::from_snapshot(snapshot)
    }

    pub fn course_version(&self) -> Option<&str> {
        self.course_version.as_deref()
    }

    /// Restrict the tree to the subtree under `root`, keeping course identity.
    pub fn subtree(&self, root: &UsageKey) -> Result<Self> {
        if !self.blocks.contains_key(root) {
            return Err(GradeError::not_found("block", root));
        }
        let blocks = self
            .post_order_traversal(root, Box::new(|_: &UsageKey| true))
            .filter_map(|key| self.blocks.get(&key).cloned())
            .map(|block| (block.location.clone(), block))
            .collect();

        Ok(Self {
            course_key: self.course_key.clone(),
            course_version: self.course_version.clone(),
            root: root.clone(),
            blocks,
        })
    }

    /// Subsection blocks in course order.
    pub fn subsections(&self) -> Vec<UsageKey> {
        self.post_order_traversal(&self.root, Box::new(|_: &UsageKey| true))
            .filter(|key| key.block_type() == SUBSECTION_BLOCK_TYPE)
            .collect()
    }
}

impl CourseTree for BlockStructure {
    fn course_key(&self) -> &CourseKey {
        &self.course_key
    }

    fn root(&self) -> &UsageKey {
        &self.root
    }

    fn block(&self, location: &UsageKey) -> Option<&BlockMetadata> {
        self.blocks.get(location)
    }

    fn possibly_scored(&self, location: &UsageKey) -> bool {
        CONTAINER_BLOCK_TYPES.contains(&location.block_type())
            || self.blocks.get(location).is_some_and(|b| b.has_score)
    }

    fn locations(&self) -> Box<dyn Iterator<Item = &UsageKey> + '_> {
        Box::new(self.blocks.keys())
    }

    fn post_order_traversal<'a>(
        &'a self,
        start: &UsageKey,
        filter: Box<dyn Fn(&UsageKey) -> bool + 'a>,
    ) -> Box<dyn Iterator<Item = UsageKey> + 'a> {
        let mut walk = PostOrder {
            blocks: &self.blocks,
            filter,
            stack: Vec::new(),
            seen: HashSet::new(),
        };
        if let Some(block) = self.blocks.get(start) {
            if (walk.filter)(&block.location) {
                walk.seen.insert(&block.location);
                walk.stack.push((block, 0));
            }
        }
        Box::new(walk)
    }
}

struct PostOrder<'a> {
    blocks: &'a HashMap<UsageKey, BlockMetadata>,
    filter: Box<dyn Fn(&UsageKey) -> bool + 'a>,
    stack: Vec<(&'a BlockMetadata, usize)>,
    seen: HashSet<&'a UsageKey>,
}

impl<'a> Iterator for PostOrder<'a> {
    type Item = UsageKey;

    fn next(&mut self) -> Option<UsageKey> {
        loop {
            let top = self.stack.last_mut()?;
            let block = top.0;

            if top.1 < block.children.len() {
                let child_key = &block.children[top.1];
                top.1 += 1;

                if self.seen.contains(child_key) || !(self.filter)(child_key) {
                    continue;
                }
                if let Some(child) = self.blocks.get(child_key) {
                    self.seen.insert(&child.location);
                    self.stack.push((child, 0));
                }
            } else {
                self.stack.pop();
                return Some(block.location.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(block_type: &str, id: &str) -> UsageKey {
        CourseKey::new("Org", "CS101", "2016")
            .unwrap()
            .make_usage_key(block_type, id)
            .unwrap()
    }

    fn container(block_type: &str, id: &str, children: &[UsageKey]) -> BlockMetadata {
        BlockMetadata {
            children: children.to_vec(),
            ..BlockMetadata::new(key(block_type, id))
        }
    }

    fn scored(id: &str) -> BlockMetadata {
        BlockMetadata {
            has_score: true,
            ..BlockMetadata::new(key("problem", id))
        }
    }

    fn sample() -> BlockStructure {
        let shared = key("problem", "shared");
        BlockStructure::from_snapshot(CourseSnapshot {
            course_id: CourseKey::new("Org", "CS101", "2016").unwrap(),
            course_version: Some("v1".to_string()),
            root: key("course", "course"),
            blocks: vec![
                container("course", "course", &[key("chapter", "ch1")]),
                container(
                    "chapter",
                    "ch1",
                    &[key("sequential", "s1"), key("sequential", "s2")],
                ),
                container(
                    "sequential",
                    "s1",
                    &[key("vertical", "v1"), key("vertical", "v2")],
                ),
                container("sequential", "s2", &[]),
                container(
                    "vertical",
                    "v1",
                    &[key("problem", "p1"), key("html", "intro"), shared.clone()],
                ),
                container("vertical", "v2", &[shared, key("problem", "p2")]),
                scored("p1"),
                scored("p2"),
                scored("shared"),
                BlockMetadata::new(key("html", "intro")),
            ],
        })
        .unwrap()
    }

    #[test]
    fn test_post_order_children_before_parents() {
        let tree = sample();
        let order: Vec<String> = tree
            .post_order_traversal(&key("sequential", "s1"), Box::new(|_: &UsageKey| true))
            .map(|k| k.block_id().to_string())
            .collect();

        assert_eq!(order, vec!["p1", "intro", "shared", "v1", "p2", "v2", "s1"]);
    }

    #[test]
    fn test_post_order_filter_prunes_and_dedups() {
        let tree = sample();
        let order: Vec<String> = tree
            .post_order_traversal(
                &key("sequential", "s1"),
                Box::new(|k: &UsageKey| tree.possibly_scored(k)),
            )
            .map(|k| k.block_id().to_string())
            .collect();

        assert_eq!(order, vec!["p1", "shared", "v1", "p2", "v2", "s1"]);
    }

    #[test]
    fn test_post_order_unknown_start_is_empty() {
        let tree = sample();
        assert_eq!(
            tree.post_order_traversal(&key("sequential", "missing"), Box::new(|_: &UsageKey| true))
                .count(),
            0
        );
    }

    #[test]
    fn test_subsections_in_course_order() {
        let tree = sample();
        assert_eq!(
            tree.subsections(),
            vec![key("sequential", "s1"), key("sequential", "s2")]
        );
    }

    #[test]
    fn test_subtree_keeps_only_descendants() {
        let tree = sample();
        let sub = tree.subtree(&key("vertical", "v2")).unwrap();
        assert_eq!(sub.root(), &key("vertical", "v2"));
        assert!(sub.contains(&key("problem", "p2")));
        assert!(!sub.contains(&key("problem", "p1")));
        assert_eq!(sub.course_key(), tree.course_key());
    }

    #[test]
    fn test_snapshot_rejects_unknown_child() {
        let err = BlockStructure::from_snapshot(CourseSnapshot {
            course_id: CourseKey::new("Org", "CS101", "2016").unwrap(),
            course_version: None,
            root: key("course", "course"),
            blocks: vec![container("course", "course", &[key("chapter", "gone")])],
        })
        .unwrap_err();
        assert!(matches!(err, GradeError::StructuralMismatch { .. }));
    }

    #[test]
    fn test_display_name_falls_back_to_url_name() {
        let block = BlockMetadata::new(key("problem", "week_1_quiz"));
        assert_eq!(block.display_name_with_default(), "week 1 quiz");
    }
}
