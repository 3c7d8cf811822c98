//! Where a [`TextChange`] gets its text from.
//!
//! A provider hands out the current [`Document`] on [`DocumentProvider::acquire`]
//! and takes the (possibly edited) buffer back on [`DocumentProvider::release`].
//! Every acquire is paired with exactly one release; [`DocumentGuard`] enforces
//! that pairing on all paths, including early returns and panics.

use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::io;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;

use crate::change::{ChangeError, TextChange};
use crate::document::Document;
use crate::undo::UndoEdit;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("document is already acquired")]
    AlreadyAcquired,
    #[error("document is not acquired")]
    NotAcquired,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub trait DocumentProvider {
    fn acquire(&mut self) -> Result<Document, ProviderError>;

    /// Hands the buffer back. The provider persists it if it changed.
    fn release(&mut self, document: Document) -> Result<(), ProviderError>;

    /// Builds the change that reverts an execution, targeting the same
    /// document as `self`.
    fn create_undo_change(&self, name: &str, undo: UndoEdit) -> Result<TextChange, ChangeError>;
}

/// Acquired document that is released when dropped.
///
/// Prefer [`DocumentGuard::release`] where release failures matter; dropping
/// the guard releases best-effort and only logs failures.
pub struct DocumentGuard<'p> {
    provider: &'p mut dyn DocumentProvider,
    document: Document,
    released: bool,
}

impl<'p> DocumentGuard<'p> {
    pub fn acquire(provider: &'p mut dyn DocumentProvider) -> Result<Self, ProviderError> {
        let document = provider.acquire()?;
        Ok(Self {
            provider,
            document,
            released: false,
        })
    }

    pub fn provider(&self) -> &dyn DocumentProvider {
        &*self.provider
    }

    pub fn release(mut self) -> Result<(), ProviderError> {
        self.released = true;
        let document = std::mem::take(&mut self.document);
        self.provider.release(document)
    }
}

impl Deref for DocumentGuard<'_> {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.document
    }
}

impl DerefMut for DocumentGuard<'_> {
    fn deref_mut(&mut self) -> &mut Document {
        &mut self.document
    }
}

impl Drop for DocumentGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let document = std::mem::take(&mut self.document);
        if let Err(err) = self.provider.release(document) {
            tracing::warn!(
                target: "nova.text_change",
                error = %err,
                "failed to release document"
            );
        }
    }
}

#[derive(Debug, Default)]
struct SharedState {
    document: Document,
    acquired: bool,
}

/// In-memory document shared between a change and the undo changes it
/// produces. Clones refer to the same buffer.
#[derive(Clone, Default)]
pub struct SharedDocument {
    state: Rc<RefCell<SharedState>>,
}

impl SharedDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            state: Rc::new(RefCell::new(SharedState {
                document: Document::new(text),
                acquired: false,
            })),
        }
    }

    /// Current committed text. Edits of an in-flight acquire are not visible
    /// until release.
    pub fn text(&self) -> String {
        self.state.borrow().document.as_str().to_string()
    }

    pub fn is_acquired(&self) -> bool {
        self.state.borrow().acquired
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.state.borrow_mut().document = Document::new(text);
    }
}

impl fmt::Debug for SharedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SharedDocument")
            .field("len", &state.document.len())
            .field("acquired", &state.acquired)
            .finish()
    }
}

impl DocumentProvider for SharedDocument {
    fn acquire(&mut self) -> Result<Document, ProviderError> {
        let mut state = self.state.borrow_mut();
        if state.acquired {
            return Err(ProviderError::AlreadyAcquired);
        }
        state.acquired = true;
        Ok(state.document.clone())
    }

    fn release(&mut self, document: Document) -> Result<(), ProviderError> {
        let mut state = self.state.borrow_mut();
        if !state.acquired {
            return Err(ProviderError::NotAcquired);
        }
        state.acquired = false;
        state.document = document;
        Ok(())
    }

    fn create_undo_change(&self, name: &str, undo: UndoEdit) -> Result<TextChange, ChangeError> {
        let mut change = TextChange::new(name, Box::new(self.clone()));
        change.set_edit(undo.into_tree());
        Ok(change)
    }
}

/// Document stored in a file on disk.
///
/// The file is read on every acquire and written back on release only if the
/// buffer was modified.
#[derive(Debug, Clone)]
pub struct FileDocument {
    path: PathBuf,
    snapshot: Option<String>,
}

impl FileDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentProvider for FileDocument {
    fn acquire(&mut self) -> Result<Document, ProviderError> {
        if self.snapshot.is_some() {
            return Err(ProviderError::AlreadyAcquired);
        }
        let text = fs::read_to_string(&self.path).map_err(|source| ProviderError::Read {
            path: self.path.clone(),
            source,
        })?;
        self.snapshot = Some(text.clone());
        Ok(Document::from(text))
    }

    fn release(&mut self, document: Document) -> Result<(), ProviderError> {
        let snapshot = self.snapshot.take().ok_or(ProviderError::NotAcquired)?;
        if snapshot == document.as_str() {
            return Ok(());
        }
        fs::write(&self.path, document.as_str()).map_err(|source| ProviderError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(
            target: "nova.text_change",
            path = %self.path.display(),
            len = u32::from(document.len()),
            "wrote document"
        );
        Ok(())
    }

    fn create_undo_change(&self, name: &str, undo: UndoEdit) -> Result<TextChange, ChangeError> {
        let mut change = TextChange::new(name, Box::new(FileDocument::new(self.path.clone())));
        change.set_edit(undo.into_tree());
        Ok(change)
    }
}
