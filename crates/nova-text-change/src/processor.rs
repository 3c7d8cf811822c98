//! Execution of (a filtered subset of) an edit tree against a document.

use std::collections::HashSet;
use std::ops::BitOr;

use text_size::{TextRange, TextSize};

use crate::document::Document;
use crate::tree::{shift_offset, EditError, EditId, EditKind, EditTree};
use crate::undo::{UndoEdit, UndoReplace};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ProcessorFlags {
    pub create_undo: bool,
    pub update_regions: bool,
}

impl ProcessorFlags {
    pub const NONE: Self = Self {
        create_undo: false,
        update_regions: false,
    };
    pub const CREATE_UNDO: Self = Self {
        create_undo: true,
        update_regions: false,
    };
    pub const UPDATE_REGIONS: Self = Self {
        create_undo: false,
        update_regions: true,
    };
}

impl BitOr for ProcessorFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            create_undo: self.create_undo || rhs.create_undo,
            update_regions: self.update_regions || rhs.update_regions,
        }
    }
}

/// Which edits of the tree a processor executes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FilterMode {
    #[default]
    All,
    /// Only these edits. The set already contains every descendant of the
    /// edits it was configured with.
    Include(HashSet<EditId>),
    /// Everything except these edits and their subtrees.
    Exclude(HashSet<EditId>),
}

enum Decision {
    /// Skip the edit and everything below it.
    Prune,
    /// Execute the edit's replacement; descendants are subsumed.
    Apply(String),
    /// Execute nothing here but visit the children.
    Descend,
}

/// Executes an [`EditTree`] against a [`Document`].
///
/// Edits run in pre-order with siblings in offset order. A running length
/// delta maps each edit's original offset to its position in the partially
/// edited document. The whole tree is validated before the first mutation,
/// so a failed `perform` leaves both document and tree untouched.
///
/// With [`ProcessorFlags::update_regions`] the tree's regions are rewritten to
/// match the edited document. Two executions sharing one tree therefore
/// interfere; run copies (see [`crate::EditTreeCopier`]) when the tree must
/// stay intact.
pub struct EditProcessor<'a> {
    document: &'a mut Document,
    tree: &'a mut EditTree,
    flags: ProcessorFlags,
    filter: FilterMode,
}

impl<'a> EditProcessor<'a> {
    pub fn new(document: &'a mut Document, tree: &'a mut EditTree, flags: ProcessorFlags) -> Self {
        Self {
            document,
            tree,
            flags,
            filter: FilterMode::All,
        }
    }

    /// Restricts execution to `edits` and their descendants.
    ///
    /// # Panics
    ///
    /// If an include or exclude filter is already configured.
    pub fn set_includes(&mut self, edits: impl IntoIterator<Item = EditId>) {
        assert!(
            self.filter == FilterMode::All,
            "edit processor filter already configured: {:?}",
            self.filter
        );
        let mut flattened = HashSet::new();
        for edit in edits {
            flattened.extend(self.tree.pre_order(edit));
        }
        self.filter = FilterMode::Include(flattened);
    }

    /// Skips `edits` together with their subtrees.
    ///
    /// # Panics
    ///
    /// If an include or exclude filter is already configured.
    pub fn set_excludes(&mut self, edits: impl IntoIterator<Item = EditId>) {
        assert!(
            self.filter == FilterMode::All,
            "edit processor filter already configured: {:?}",
            self.filter
        );
        self.filter = FilterMode::Exclude(edits.into_iter().collect());
    }

    pub fn filter(&self) -> &FilterMode {
        &self.filter
    }

    pub fn consider_edit(&self, edit: EditId) -> bool {
        match &self.filter {
            FilterMode::All => true,
            FilterMode::Include(includes) => includes.contains(&edit),
            FilterMode::Exclude(excludes) => !excludes.contains(&edit),
        }
    }

    /// Validates the tree against the document without executing anything.
    pub fn check_integrity(&self) -> Result<(), EditError> {
        let root = &self.tree.nodes[0];
        if root.deleted {
            return Ok(());
        }
        self.document.check_range(root.range)?;

        let mut stack = vec![0u32];
        while let Some(index) = stack.pop() {
            let node = &self.tree.nodes[index as usize];
            let mut prev: Option<TextRange> = None;
            for &child in &node.children {
                let child_node = &self.tree.nodes[child as usize];
                if child_node.deleted {
                    continue;
                }
                let range = child_node.range;
                if !node.range.contains_range(range) {
                    return Err(EditError::NotNested {
                        parent: node.range,
                        child: range,
                    });
                }
                if let Some(prev) = prev {
                    if prev.end() > range.start() {
                        return Err(EditError::OverlappingEdits {
                            first: prev,
                            second: range,
                        });
                    }
                }
                self.document.check_range(range)?;
                prev = Some(range);
                stack.push(child);
            }
        }
        Ok(())
    }

    /// Executes the tree. Returns the undo edit when
    /// [`ProcessorFlags::create_undo`] is set.
    pub fn perform(mut self) -> Result<Option<UndoEdit>, EditError> {
        self.check_integrity()?;

        let mut undo = self.flags.create_undo.then(UndoEdit::default);
        let mut shift = 0i64;
        if !self.tree.nodes[0].deleted {
            self.execute(0, &mut shift, &mut undo);
        }

        tracing::debug!(
            target: "nova.text_change",
            edits = self.tree.len(),
            delta = shift,
            undo = undo.as_ref().map(UndoEdit::len),
            "performed edit tree"
        );
        Ok(undo)
    }

    fn decide(&self, index: u32) -> Decision {
        let id = self.tree.edit_id(index);
        if !self.consider_edit(id) {
            return match self.filter {
                FilterMode::Exclude(_) => Decision::Prune,
                _ => Decision::Descend,
            };
        }
        match &self.tree.nodes[index as usize].kind {
            EditKind::Multi => Decision::Descend,
            EditKind::Replace(text) => Decision::Apply(text.clone()),
        }
    }

    fn execute(&mut self, index: u32, shift: &mut i64, undo: &mut Option<UndoEdit>) {
        let node = &self.tree.nodes[index as usize];
        if node.deleted {
            return;
        }
        let original = node.range;
        let start = shift_offset(original.start(), *shift);

        match self.decide(index) {
            Decision::Prune => {
                if self.flags.update_regions {
                    self.tree.shift_subtree(index, *shift);
                }
            }
            Decision::Apply(text) => {
                let target = TextRange::at(start, original.len());
                let replaced = self.document.replace_unchecked(target, &text);
                let new_len = TextSize::of(text.as_str());
                tracing::trace!(
                    target: "nova.text_change",
                    range = ?target,
                    inserted = u32::from(new_len),
                    "applied edit"
                );

                if let Some(undo) = undo.as_mut() {
                    undo.push(UndoReplace {
                        range: TextRange::at(start, new_len),
                        text: replaced,
                    });
                }
                *shift += i64::from(u32::from(new_len)) - i64::from(u32::from(original.len()));

                if self.flags.update_regions {
                    self.tree.nodes[index as usize].range = TextRange::at(start, new_len);
                    self.tree.mark_descendants_deleted(index);
                }
            }
            Decision::Descend => {
                let before = *shift;
                let children = self.tree.nodes[index as usize].children.clone();
                for child in children {
                    self.execute(child, shift, undo);
                }
                if self.flags.update_regions {
                    let len = i64::from(u32::from(original.len())) + (*shift - before);
                    self.tree.nodes[index as usize].range =
                        TextRange::at(start, TextSize::from(len.max(0) as u32));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u32, end: u32) -> TextRange {
        TextRange::new(start.into(), end.into())
    }

    #[test]
    fn applies_replacements_left_to_right() {
        let mut doc = Document::new("0123456789");
        let mut tree = EditTree::multi(range(0, 10));
        let root = tree.root();
        tree.add_replace(root, range(1, 3), "abc").unwrap();
        tree.add_delete(root, range(5, 7)).unwrap();
        tree.add_insert(root, 9.into(), "!").unwrap();

        EditProcessor::new(&mut doc, &mut tree, ProcessorFlags::NONE)
            .perform()
            .unwrap();
        assert_eq!(doc.as_str(), "0abc3478!9");
    }

    #[test]
    fn tracked_regions_follow_the_document() {
        let mut doc = Document::new("0123456789");
        let mut tree = EditTree::multi(range(0, 10));
        let root = tree.root();
        let a = tree.add_replace(root, range(1, 3), "abc").unwrap();
        let b = tree.add_insert(root, 9.into(), "!").unwrap();

        EditProcessor::new(&mut doc, &mut tree, ProcessorFlags::UPDATE_REGIONS)
            .perform()
            .unwrap();
        assert_eq!(tree.range(a), Some(range(1, 4)));
        assert_eq!(tree.range(b), Some(range(10, 11)));
        assert_eq!(tree.range(root), Some(range(0, 12)));
    }

    #[test]
    fn untracked_execution_keeps_regions() {
        let mut doc = Document::new("0123456789");
        let mut tree = EditTree::multi(range(0, 10));
        let root = tree.root();
        let a = tree.add_replace(root, range(1, 3), "abc").unwrap();

        EditProcessor::new(&mut doc, &mut tree, ProcessorFlags::NONE)
            .perform()
            .unwrap();
        assert_eq!(tree.range(a), Some(range(1, 3)));
    }

    #[test]
    fn excluded_subtree_is_skipped_and_shifted() {
        let mut doc = Document::new("0123456789");
        let mut tree = EditTree::multi(range(0, 10));
        let root = tree.root();
        tree.add_insert(root, 0.into(), ">>").unwrap();
        let group = tree.add_multi(root, range(4, 8)).unwrap();
        let inner = tree.add_replace(group, range(5, 6), "X").unwrap();

        let mut processor =
            EditProcessor::new(&mut doc, &mut tree, ProcessorFlags::UPDATE_REGIONS);
        processor.set_excludes([group]);
        processor.perform().unwrap();

        assert_eq!(doc.as_str(), ">>0123456789");
        assert_eq!(tree.range(group), Some(range(6, 10)));
        assert_eq!(tree.range(inner), Some(range(7, 8)));
    }

    #[test]
    fn excluding_a_parent_skips_children_even_if_not_listed() {
        let mut doc = Document::new("abcdef");
        let mut tree = EditTree::multi(range(0, 6));
        let root = tree.root();
        let parent = tree.add_multi(root, range(0, 4)).unwrap();
        tree.add_replace(parent, range(1, 2), "X").unwrap();
        tree.add_replace(parent, range(2, 3), "Y").unwrap();

        let mut processor = EditProcessor::new(&mut doc, &mut tree, ProcessorFlags::NONE);
        processor.set_excludes([parent]);
        processor.perform().unwrap();
        assert_eq!(doc.as_str(), "abcdef");
    }

    #[test]
    fn include_is_flattened_to_descendants() {
        let mut doc = Document::new("abcdef");
        let mut tree = EditTree::multi(range(0, 6));
        let root = tree.root();
        let parent = tree.add_multi(root, range(0, 3)).unwrap();
        tree.add_replace(parent, range(1, 2), "X").unwrap();
        tree.add_replace(root, range(4, 5), "Y").unwrap();

        let mut processor = EditProcessor::new(&mut doc, &mut tree, ProcessorFlags::NONE);
        processor.set_includes([parent]);
        processor.perform().unwrap();
        assert_eq!(doc.as_str(), "aXcdef");
    }

    #[test]
    #[should_panic(expected = "filter already configured")]
    fn include_and_exclude_are_mutually_exclusive() {
        let mut doc = Document::new("abc");
        let mut tree = EditTree::multi(range(0, 3));
        let root = tree.root();
        let edit = tree.add_replace(root, range(0, 1), "x").unwrap();

        let mut processor = EditProcessor::new(&mut doc, &mut tree, ProcessorFlags::NONE);
        processor.set_excludes([edit]);
        processor.set_includes([edit]);
    }

    #[test]
    fn replacing_parent_subsumes_children() {
        let mut doc = Document::new("0123456789");
        let mut tree = EditTree::multi(range(0, 10));
        let root = tree.root();
        let parent = tree.add_replace(root, range(2, 8), "P").unwrap();
        let child = tree.add_replace(parent, range(3, 4), "c").unwrap();

        let undo = EditProcessor::new(
            &mut doc,
            &mut tree,
            ProcessorFlags::CREATE_UNDO | ProcessorFlags::UPDATE_REGIONS,
        )
        .perform()
        .unwrap()
        .unwrap();

        assert_eq!(doc.as_str(), "01P89");
        assert_eq!(tree.range(parent), Some(range(2, 3)));
        assert_eq!(tree.range(child), None);

        undo.apply(&mut doc).unwrap();
        assert_eq!(doc.as_str(), "0123456789");
    }

    #[test]
    fn out_of_bounds_root_leaves_document_untouched() {
        let mut doc = Document::new("abc");
        let mut tree = EditTree::multi(range(0, 10));
        let root = tree.root();
        tree.add_replace(root, range(0, 1), "X").unwrap();
        tree.add_replace(root, range(8, 9), "Y").unwrap();

        let err = EditProcessor::new(&mut doc, &mut tree, ProcessorFlags::UPDATE_REGIONS)
            .perform()
            .unwrap_err();
        assert!(matches!(err, EditError::RangeOutOfBounds { .. }));
        assert_eq!(doc.as_str(), "abc");
        assert_eq!(tree.range(root), Some(range(0, 10)));
    }

    #[test]
    fn undo_restores_original_content() {
        let original = "fn main() { let x = 1; }";
        let mut doc = Document::new(original);
        let mut tree = EditTree::multi(range(0, 24));
        let root = tree.root();
        tree.add_replace(root, range(16, 17), "value").unwrap();
        tree.add_insert(root, 22.into(), " // one").unwrap();
        tree.add_delete(root, range(3, 7)).unwrap();

        let undo = EditProcessor::new(&mut doc, &mut tree, ProcessorFlags::CREATE_UNDO)
            .perform()
            .unwrap()
            .unwrap();
        assert_eq!(doc.as_str(), "fn () { let value = 1; // one }");

        let redo = undo.apply(&mut doc).unwrap();
        assert_eq!(doc.as_str(), original);
        assert_eq!(redo.len(), 3);
    }
}
