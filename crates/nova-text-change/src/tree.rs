//! Edit trees: arena-allocated text edits addressed by stable ids.
//!
//! A tree owns all of its nodes. Nodes reference their children by index into
//! the arena, and callers reference nodes through [`EditId`], which also
//! records the tree the node lives in. Two nodes targeting the same region are
//! still distinct edits; filtering and group membership always compare ids,
//! never ranges.

use std::sync::atomic::{AtomicU32, Ordering};

use text_size::{TextRange, TextSize};
use thiserror::Error;

/// Process-unique identity of one [`EditTree`] instance.
///
/// Copies made by [`crate::EditTreeCopier`] receive a fresh id, so an
/// [`EditId`] of the original never resolves inside a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreeId(u32);

impl TreeId {
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        TreeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of a single node inside an [`EditTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EditId {
    tree: TreeId,
    index: u32,
}

impl EditId {
    pub fn tree(self) -> TreeId {
        self.tree
    }

    pub(crate) fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) fn from_parts(tree: TreeId, index: u32) -> Self {
        Self { tree, index }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditKind {
    /// Groups child edits. Executes nothing by itself.
    Multi,
    /// Replaces the node's region with the given text.
    ///
    /// Inserts are replacements of an empty region, deletes are replacements
    /// with an empty string.
    Replace(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditNode {
    pub(crate) range: TextRange,
    pub(crate) kind: EditKind,
    pub(crate) parent: Option<u32>,
    pub(crate) children: Vec<u32>,
    pub(crate) deleted: bool,
}

impl EditNode {
    fn new(range: TextRange, kind: EditKind, parent: Option<u32>) -> Self {
        Self {
            range,
            kind,
            parent,
            children: Vec::new(),
            deleted: false,
        }
    }

    /// The region this edit currently targets, or `None` once the edit has
    /// been swallowed by an executed ancestor.
    pub fn range(&self) -> Option<TextRange> {
        (!self.deleted).then_some(self.range)
    }

    pub fn offset(&self) -> TextSize {
        self.range.start()
    }

    pub fn len(&self) -> TextSize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn kind(&self) -> &EditKind {
        &self.kind
    }

    pub fn replacement(&self) -> Option<&str> {
        match &self.kind {
            EditKind::Multi => None,
            EditKind::Replace(text) => Some(text),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("edit range {range:?} is out of bounds for text length {text_len:?}")]
    RangeOutOfBounds { range: TextRange, text_len: TextSize },
    #[error("offset {offset:?} is not a UTF-8 character boundary")]
    InvalidUtf8Boundary { offset: TextSize },
    #[error("overlapping edits: {first:?} overlaps {second:?}")]
    OverlappingEdits { first: TextRange, second: TextRange },
    #[error("edit {child:?} is not nested inside its parent {parent:?}")]
    NotNested { parent: TextRange, child: TextRange },
    #[error("malformed edit tree: {0}")]
    MalformedTree(&'static str),
}

/// A strict tree of text edits.
///
/// Node `0` is the root. Children of a node are kept sorted by offset, are
/// pairwise disjoint and lie inside their parent's region; [`EditTree::add_child`]
/// rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditTree {
    pub(crate) id: TreeId,
    pub(crate) nodes: Vec<EditNode>,
}

impl EditTree {
    pub fn new(range: TextRange, kind: EditKind) -> Self {
        Self {
            id: TreeId::fresh(),
            nodes: vec![EditNode::new(range, kind, None)],
        }
    }

    /// Tree whose root is a [`EditKind::Multi`] container over `range`.
    pub fn multi(range: TextRange) -> Self {
        Self::new(range, EditKind::Multi)
    }

    /// Tree consisting of a single replacement.
    pub fn replace(range: TextRange, text: impl Into<String>) -> Self {
        Self::new(range, EditKind::Replace(text.into()))
    }

    /// Builds a tree from already validated parts. Used for copies and undo
    /// trees whose shape is known to be well-formed.
    pub(crate) fn from_nodes(nodes: Vec<EditNode>) -> Self {
        debug_assert!(!nodes.is_empty());
        Self {
            id: TreeId::fresh(),
            nodes,
        }
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn root(&self) -> EditId {
        self.edit_id(0)
    }

    /// Number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1 && self.nodes[0].children.is_empty()
    }

    pub fn contains(&self, id: EditId) -> bool {
        id.tree == self.id && id.index() < self.nodes.len()
    }

    pub fn node(&self, id: EditId) -> Option<&EditNode> {
        if id.tree != self.id {
            return None;
        }
        self.nodes.get(id.index())
    }

    /// Current region of `id`, `None` for foreign or deleted edits.
    pub fn range(&self, id: EditId) -> Option<TextRange> {
        self.node(id).and_then(EditNode::range)
    }

    pub fn parent(&self, id: EditId) -> Option<EditId> {
        let parent = self.node(id)?.parent?;
        Some(self.edit_id(parent))
    }

    pub fn children(&self, id: EditId) -> impl Iterator<Item = EditId> + '_ {
        self.node(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
            .iter()
            .map(move |&index| self.edit_id(index))
    }

    /// `id` followed by all of its descendants in pre-order.
    pub fn pre_order(&self, id: EditId) -> Vec<EditId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id.index];
        while let Some(index) = stack.pop() {
            out.push(self.edit_id(index));
            stack.extend(self.nodes[index as usize].children.iter().rev().copied());
        }
        out
    }

    /// The minimal range containing the current regions of `edits`.
    ///
    /// Foreign and deleted edits are ignored; returns `None` when nothing is
    /// left.
    pub fn coverage(&self, edits: impl IntoIterator<Item = EditId>) -> Option<TextRange> {
        edits
            .into_iter()
            .filter_map(|id| self.range(id))
            .reduce(|acc, range| acc.cover(range))
    }

    pub fn add_child(
        &mut self,
        parent: EditId,
        range: TextRange,
        kind: EditKind,
    ) -> Result<EditId, EditError> {
        assert!(
            self.contains(parent),
            "parent edit {parent:?} does not belong to tree {:?}",
            self.id
        );
        let parent_index = parent.index;
        let parent_node = &self.nodes[parent.index()];
        if parent_node.deleted {
            return Err(EditError::MalformedTree("cannot add a child to a deleted edit"));
        }
        if !parent_node.range.contains_range(range) {
            return Err(EditError::NotNested {
                parent: parent_node.range,
                child: range,
            });
        }

        // Inserts at an offset go before a non-empty sibling starting at the
        // same offset; otherwise the new edit goes after equal offsets.
        let position = parent_node
            .children
            .iter()
            .position(|&sibling| {
                let sibling = self.nodes[sibling as usize].range;
                sibling.start() > range.start()
                    || (sibling.start() == range.start()
                        && range.is_empty()
                        && !sibling.is_empty())
            })
            .unwrap_or(parent_node.children.len());

        if let Some(&prev) = position
            .checked_sub(1)
            .and_then(|prev| parent_node.children.get(prev))
        {
            let prev = self.nodes[prev as usize].range;
            if prev.end() > range.start() {
                return Err(EditError::OverlappingEdits {
                    first: prev,
                    second: range,
                });
            }
        }
        if let Some(&next) = parent_node.children.get(position) {
            let next = self.nodes[next as usize].range;
            if range.end() > next.start() {
                return Err(EditError::OverlappingEdits {
                    first: range,
                    second: next,
                });
            }
        }

        let index = u32::try_from(self.nodes.len())
            .map_err(|_| EditError::MalformedTree("too many edits in one tree"))?;
        self.nodes
            .push(EditNode::new(range, kind, Some(parent_index)));
        self.nodes[parent.index()].children.insert(position, index);
        Ok(self.edit_id(index))
    }

    pub fn add_multi(&mut self, parent: EditId, range: TextRange) -> Result<EditId, EditError> {
        self.add_child(parent, range, EditKind::Multi)
    }

    pub fn add_replace(
        &mut self,
        parent: EditId,
        range: TextRange,
        text: impl Into<String>,
    ) -> Result<EditId, EditError> {
        self.add_child(parent, range, EditKind::Replace(text.into()))
    }

    pub fn add_insert(
        &mut self,
        parent: EditId,
        offset: TextSize,
        text: impl Into<String>,
    ) -> Result<EditId, EditError> {
        self.add_replace(parent, TextRange::empty(offset), text)
    }

    pub fn add_delete(&mut self, parent: EditId, range: TextRange) -> Result<EditId, EditError> {
        self.add_replace(parent, range, String::new())
    }

    pub(crate) fn edit_id(&self, index: u32) -> EditId {
        EditId {
            tree: self.id,
            index,
        }
    }

    pub(crate) fn shift_subtree(&mut self, index: u32, shift: i64) {
        if shift == 0 {
            return;
        }
        let mut stack = vec![index];
        while let Some(index) = stack.pop() {
            let node = &mut self.nodes[index as usize];
            if !node.deleted {
                node.range = TextRange::at(shift_offset(node.range.start(), shift), node.range.len());
            }
            stack.extend(node.children.iter().copied());
        }
    }

    pub(crate) fn mark_descendants_deleted(&mut self, index: u32) {
        let mut stack = self.nodes[index as usize].children.clone();
        while let Some(index) = stack.pop() {
            let node = &mut self.nodes[index as usize];
            node.deleted = true;
            stack.extend(node.children.iter().copied());
        }
    }
}

pub(crate) fn shift_offset(offset: TextSize, shift: i64) -> TextSize {
    let shifted = i64::from(u32::from(offset)) + shift;
    debug_assert!(shifted >= 0, "offset shifted below zero");
    TextSize::from(shifted.clamp(0, i64::from(u32::MAX)) as u32)
}
