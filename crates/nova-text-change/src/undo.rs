use text_size::{TextRange, TextSize};

use crate::document::Document;
use crate::processor::{EditProcessor, ProcessorFlags};
use crate::tree::{EditError, EditKind, EditNode, EditTree};

/// One inverse replacement recorded while executing an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoReplace {
    /// Region of the executed edit in the edited document.
    pub range: TextRange,
    /// Text the executed edit replaced.
    pub text: String,
}

/// Inverse of one edit execution.
///
/// Replacements are sorted by offset, pairwise disjoint and expressed in the
/// coordinates of the document *after* the execution, so applying all of
/// them to that document restores its previous content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoEdit {
    replacements: Vec<UndoReplace>,
}

impl UndoEdit {
    pub(crate) fn push(&mut self, replacement: UndoReplace) {
        debug_assert!(self
            .replacements
            .last()
            .map_or(true, |last| last.range.end() <= replacement.range.start()));
        self.replacements.push(replacement);
    }

    pub fn replacements(&self) -> &[UndoReplace] {
        &self.replacements
    }

    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    pub fn coverage(&self) -> Option<TextRange> {
        self.replacements
            .iter()
            .map(|replacement| replacement.range)
            .reduce(TextRange::cover)
    }

    /// Converts the undo into an edit tree: a [`EditKind::Multi`] root over the
    /// coverage with one replacement child per recorded edit.
    pub fn into_tree(self) -> EditTree {
        let root_range = self
            .coverage()
            .unwrap_or_else(|| TextRange::empty(TextSize::from(0)));
        let mut nodes = Vec::with_capacity(self.replacements.len() + 1);
        nodes.push(EditNode {
            range: root_range,
            kind: EditKind::Multi,
            parent: None,
            children: (1..=self.replacements.len() as u32).collect(),
            deleted: false,
        });
        nodes.extend(self.replacements.into_iter().map(|replacement| EditNode {
            range: replacement.range,
            kind: EditKind::Replace(replacement.text),
            parent: Some(0),
            children: Vec::new(),
            deleted: false,
        }));
        EditTree::from_nodes(nodes)
    }

    /// Applies the undo to `document` and returns the redo.
    pub fn apply(self, document: &mut Document) -> Result<UndoEdit, EditError> {
        let mut tree = self.into_tree();
        let redo = EditProcessor::new(document, &mut tree, ProcessorFlags::CREATE_UNDO).perform()?;
        Ok(redo.unwrap_or_default())
    }
}
