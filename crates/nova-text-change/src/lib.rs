//! Text change engine for Nova refactorings.
//!
//! A [`TextChange`] binds a tree of text edits ([`EditTree`]) to one document
//! and knows how to:
//! - perform the edits and produce the change that reverts them
//! - compute previews on copies, for all edits or selected [`EditGroup`]s
//! - switch groups of edits on and off before anything is applied
//!
//! Execution itself lives in [`EditProcessor`]; previews use
//! [`EditTreeCopier`] so the live tree never moves.

mod change;
mod copier;
mod document;
mod group;
mod processor;
mod progress;
mod provider;
mod status;
mod tree;
mod undo;

pub use change::{
    ActivationMode, ChangeError, ChangeOptions, TextChange, DEFAULT_DIFF_CONTEXT_LINES,
    DEFAULT_TEXT_TYPE,
};
pub use copier::{copy_tree, CopyMap, EditTreeCopier};
pub use document::{Document, LineIndex};
pub use group::{ChangeGroup, ChangeId, EditGroup, GroupId};
pub use processor::{EditProcessor, FilterMode, ProcessorFlags};
pub use progress::{NullProgressMonitor, ProgressMonitor, TokenProgressMonitor};
pub use provider::{DocumentGuard, DocumentProvider, FileDocument, ProviderError, SharedDocument};
pub use status::{RefactoringStatus, Severity, StatusEntry};
pub use text_size::{TextRange, TextSize};
pub use tree::{EditError, EditId, EditKind, EditNode, EditTree, TreeId};
pub use undo::{UndoEdit, UndoReplace};
