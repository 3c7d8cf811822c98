use std::fmt;

use serde::{Deserialize, Serialize};
use similar::TextDiff;
use text_size::{TextRange, TextSize};
use thiserror::Error;

use crate::copier::{copy_tree, CopyMap};
use crate::document::Document;
use crate::group::{ChangeGroup, ChangeId, EditGroup, GroupId};
use crate::processor::{EditProcessor, ProcessorFlags};
use crate::progress::ProgressMonitor;
use crate::provider::{DocumentGuard, DocumentProvider, ProviderError};
use crate::status::{RefactoringStatus, Severity};
use crate::tree::{EditError, EditId, EditTree};
use crate::undo::UndoEdit;

pub const DEFAULT_TEXT_TYPE: &str = "txt";

/// Unchanged lines shown around each hunk of [`TextChange::preview_diff`].
pub const DEFAULT_DIFF_CONTEXT_LINES: usize = 3;

#[derive(Debug, Error)]
pub enum ChangeError {
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("text change was canceled")]
    Canceled,
}

/// How [`TextChange::set_active`] interacts with the change's groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationMode {
    /// A group is active when both the change and the group are active.
    /// Toggling the change leaves group flags untouched.
    #[default]
    Conjunction,
    /// Toggling the change overwrites every group's flag.
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeOptions {
    pub activation: ActivationMode,
    pub keep_preview_edits: bool,
    /// `None` selects [`DEFAULT_TEXT_TYPE`].
    pub text_type: Option<String>,
    pub diff_context_lines: usize,
}

impl Default for ChangeOptions {
    fn default() -> Self {
        Self {
            activation: ActivationMode::default(),
            keep_preview_edits: false,
            text_type: None,
            diff_context_lines: DEFAULT_DIFF_CONTEXT_LINES,
        }
    }
}

struct PreviewCopy {
    tree: EditTree,
    map: CopyMap,
}

#[derive(Clone, Copy)]
enum PreviewScope<'g> {
    All,
    Groups(&'g [GroupId]),
}

/// A named edit tree bound to one document.
///
/// The change owns its root edit and its groups, performs the edits against
/// the document handed out by its [`DocumentProvider`] and records the change
/// that reverts them. Previews run on copies of both the tree and the
/// document, so they never disturb the live state.
pub struct TextChange {
    id: ChangeId,
    name: String,
    provider: Box<dyn DocumentProvider>,
    edit: Option<EditTree>,
    groups: Vec<ChangeGroup>,
    active: bool,
    activation: ActivationMode,
    keep_preview_edits: bool,
    preview: Option<PreviewCopy>,
    text_type: String,
    diff_context_lines: usize,
    undo_change: Option<Box<TextChange>>,
    validation_stamp: Option<blake3::Hash>,
}

impl TextChange {
    pub fn new(name: impl Into<String>, provider: Box<dyn DocumentProvider>) -> Self {
        Self::with_options(name, provider, &ChangeOptions::default())
    }

    pub fn with_options(
        name: impl Into<String>,
        provider: Box<dyn DocumentProvider>,
        options: &ChangeOptions,
    ) -> Self {
        Self {
            id: ChangeId::fresh(),
            name: name.into(),
            provider,
            edit: None,
            groups: Vec::new(),
            active: true,
            activation: options.activation,
            keep_preview_edits: options.keep_preview_edits,
            preview: None,
            text_type: options
                .text_type
                .clone()
                .unwrap_or_else(|| DEFAULT_TEXT_TYPE.to_string()),
            diff_context_lines: options.diff_context_lines,
            undo_change: None,
            validation_stamp: None,
        }
    }

    pub fn id(&self) -> ChangeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text_type(&self) -> &str {
        &self.text_type
    }

    /// Sets the content type used to pick a viewer for previews. `None`
    /// restores [`DEFAULT_TEXT_TYPE`].
    pub fn set_text_type(&mut self, text_type: Option<&str>) {
        self.text_type = text_type.unwrap_or(DEFAULT_TEXT_TYPE).to_string();
    }

    pub fn diff_context_lines(&self) -> usize {
        self.diff_context_lines
    }

    pub fn set_diff_context_lines(&mut self, lines: usize) {
        self.diff_context_lines = lines;
    }

    pub fn activation_mode(&self) -> ActivationMode {
        self.activation
    }

    // ---- edits and groups ----------------------------------------------------

    /// # Panics
    ///
    /// If a root edit was already set.
    pub fn set_edit(&mut self, edit: EditTree) {
        assert!(self.edit.is_none(), "root edit can only be set once");
        self.edit = Some(edit);
    }

    pub fn edit(&self) -> Option<&EditTree> {
        self.edit.as_ref()
    }

    /// Mutable access for adding edits after the root was set. Existing
    /// [`EditId`]s stay valid.
    pub fn edit_mut(&mut self) -> Option<&mut EditTree> {
        self.edit.as_mut()
    }

    /// # Panics
    ///
    /// If no root edit is set or the group references edits outside of it.
    pub fn add_edit_group(&mut self, group: EditGroup) -> GroupId {
        let root = self
            .edit
            .as_ref()
            .unwrap_or_else(|| panic!("can only add an edit group once a root edit exists"));
        for &edit in group.edits() {
            assert!(
                root.contains(edit),
                "edit {edit:?} of group `{}` is not part of the root edit",
                group.name()
            );
        }

        let id = GroupId::new(self.id, self.groups.len());
        self.groups.push(ChangeGroup::new(self.id, group));
        id
    }

    pub fn groups(&self) -> &[ChangeGroup] {
        &self.groups
    }

    pub fn group_ids(&self) -> impl Iterator<Item = GroupId> + '_ {
        (0..self.groups.len()).map(|index| GroupId::new(self.id, index))
    }

    /// # Panics
    ///
    /// If `id` belongs to another change.
    pub fn group(&self, id: GroupId) -> &ChangeGroup {
        self.check_group(id);
        &self.groups[id.index()]
    }

    pub fn set_group_active(&mut self, id: GroupId, active: bool) {
        self.check_group(id);
        self.groups[id.index()].set_enabled(active);
    }

    /// Whether the group's edits take part in perform and previews.
    pub fn is_group_active(&self, id: GroupId) -> bool {
        let group = self.group(id);
        match self.activation {
            ActivationMode::Conjunction => self.active && group.is_enabled(),
            ActivationMode::Overwrite => group.is_enabled(),
        }
    }

    /// Current coverage of the group's edits in the live tree.
    pub fn group_region(&self, id: GroupId) -> Option<TextRange> {
        let group = self.group(id);
        group.edit_group().region(self.edit.as_ref()?)
    }

    fn check_group(&self, id: GroupId) {
        assert!(
            id.change() == self.id && id.index() < self.groups.len(),
            "group {id:?} does not belong to change `{}`",
            self.name
        );
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        if self.activation == ActivationMode::Overwrite {
            for group in &mut self.groups {
                group.set_enabled(active);
            }
        }
    }

    fn inactive_edits(&self) -> Vec<EditId> {
        self.group_ids()
            .filter(|&id| !self.is_group_active(id))
            .flat_map(|id| self.groups[id.index()].edits().iter().copied())
            .collect()
    }

    // ---- perform -------------------------------------------------------------

    /// Applies every edit except those of inactive groups to the document and
    /// records the reverting change, see [`TextChange::undo_change`].
    ///
    /// Nothing is modified when the tree does not fit the document.
    pub fn perform(&mut self, monitor: &mut dyn ProgressMonitor) -> Result<(), ChangeError> {
        monitor.begin_task("", 2);
        let result = self.perform_edits(monitor);
        monitor.done();

        match &result {
            Ok(()) => tracing::debug!(
                target: "nova.text_change",
                change = %self.name,
                undo_edits = self.undo_change.as_ref().and_then(|undo| undo.edit()).map(EditTree::len),
                "performed text change"
            ),
            Err(err) => tracing::debug!(
                target: "nova.text_change",
                change = %self.name,
                error = %err,
                "text change failed"
            ),
        }
        result
    }

    fn perform_edits(&mut self, monitor: &mut dyn ProgressMonitor) -> Result<(), ChangeError> {
        if monitor.is_canceled() {
            return Err(ChangeError::Canceled);
        }
        let excludes = self.inactive_edits();
        if monitor.is_canceled() {
            return Err(ChangeError::Canceled);
        }

        let mut guard = DocumentGuard::acquire(self.provider.as_mut())?;
        monitor.worked(1);

        // The guard holds the unmodified buffer until the edited one is
        // handed back; the live tree only takes the tracked regions after a
        // successful release.
        let mut document = Document::clone(&guard);
        let mut tree = self.edit.clone();
        let undo = match tree.as_mut() {
            Some(root) => {
                let mut processor = EditProcessor::new(
                    &mut document,
                    root,
                    ProcessorFlags::CREATE_UNDO | ProcessorFlags::UPDATE_REGIONS,
                );
                processor.set_excludes(excludes);
                processor.perform()?.unwrap_or_default()
            }
            None => UndoEdit::default(),
        };

        let undo_change = guard.provider().create_undo_change(&self.name, undo)?;
        *guard = document;
        guard.release()?;
        monitor.worked(1);

        self.edit = tree;
        self.undo_change = Some(Box::new(undo_change));
        Ok(())
    }

    /// The change reverting the last successful [`TextChange::perform`].
    pub fn undo_change(&self) -> Option<&TextChange> {
        self.undo_change.as_deref()
    }

    pub fn undo_change_mut(&mut self) -> Option<&mut TextChange> {
        self.undo_change.as_deref_mut()
    }

    pub fn take_undo_change(&mut self) -> Option<TextChange> {
        self.undo_change.take().map(|change| *change)
    }

    // ---- current content -----------------------------------------------------

    pub fn current_document(&mut self) -> Result<Document, ChangeError> {
        let guard = DocumentGuard::acquire(self.provider.as_mut())?;
        let document = Document::clone(&guard);
        guard.release()?;
        Ok(document)
    }

    pub fn current_content(&mut self) -> Result<String, ChangeError> {
        Ok(self.current_document()?.into_string())
    }

    /// Current text of `region`, optionally widened to full lines.
    ///
    /// `_surrounding_lines` is accepted for symmetry with
    /// [`TextChange::preview_content_for`] but not applied: the current
    /// content is always clipped to the lines the region touches.
    pub fn current_content_in(
        &mut self,
        region: TextRange,
        expand_to_full_lines: bool,
        _surrounding_lines: u32,
    ) -> Result<String, ChangeError> {
        let document = self.current_document()?;
        Ok(document.clip(region, expand_to_full_lines, 0)?.to_string())
    }

    // ---- preview -------------------------------------------------------------

    pub fn keep_preview_edits(&self) -> bool {
        self.keep_preview_edits
    }

    /// Controls whether the executed copy of the tree is retained after a
    /// preview so that [`TextChange::preview_edit`] can map into it.
    pub fn set_keep_preview_edits(&mut self, keep: bool) {
        self.keep_preview_edits = keep;
        if !keep {
            self.preview = None;
        }
    }

    fn retained_preview(&self) -> &PreviewCopy {
        assert!(
            self.keep_preview_edits,
            "preview edits are only available with keep_preview_edits enabled"
        );
        self.preview
            .as_ref()
            .unwrap_or_else(|| panic!("no preview has been computed for `{}`", self.name))
    }

    /// The retained preview tree.
    ///
    /// # Panics
    ///
    /// If preview edits are not kept or no preview was computed yet.
    pub fn preview_tree(&self) -> &EditTree {
        &self.retained_preview().tree
    }

    /// The edit executed during the last preview in place of `original`, or
    /// `None` if `original` is not managed by this change.
    ///
    /// # Panics
    ///
    /// If preview edits are not kept or no preview was computed yet.
    pub fn preview_edit(&self, original: EditId) -> Option<EditId> {
        self.retained_preview().map.copy_of(original)
    }

    /// Like [`TextChange::preview_edit`] for several edits. Edits not managed
    /// by this change are skipped.
    pub fn preview_edits(&self, originals: &[EditId]) -> Vec<EditId> {
        let preview = self.retained_preview();
        originals
            .iter()
            .filter_map(|&original| preview.map.copy_of(original))
            .collect()
    }

    /// Document with every edit applied except those of inactive groups.
    pub fn preview_document(&mut self) -> Result<Document, ChangeError> {
        let (document, _) = self.compute_preview(PreviewScope::All)?;
        Ok(document)
    }

    pub fn preview_content(&mut self) -> Result<String, ChangeError> {
        Ok(self.preview_document()?.into_string())
    }

    /// [`TextChange::preview_content`] for best-effort rendering: failures are
    /// logged and yield an empty string.
    pub fn preview_content_or_empty(&mut self) -> String {
        match self.preview_content() {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(
                    target: "nova.text_change",
                    change = %self.name,
                    error = %err,
                    "failed to compute preview"
                );
                String::new()
            }
        }
    }

    /// Preview of `region` with only the edits of the given (active) groups
    /// applied.
    ///
    /// `region` is in current-document coordinates; the returned window
    /// starts at the same offset and grows or shrinks by the length change the
    /// groups cause.
    ///
    /// # Panics
    ///
    /// If a group belongs to another change, or if `region` does not contain
    /// the current coverage of the groups.
    pub fn preview_content_for(
        &mut self,
        groups: &[GroupId],
        region: TextRange,
        expand_to_full_lines: bool,
        surrounding_lines: u32,
    ) -> Result<String, ChangeError> {
        for &group in groups {
            self.check_group(group);
        }
        let current = self.groups_region(groups);
        if let Some(current) = current {
            assert!(
                region.contains_range(current),
                "region {region:?} does not cover the groups' current region {current:?}"
            );
        }

        let (document, preview) = self.compute_preview(PreviewScope::Groups(groups))?;
        let delta = i64::from(u32::from(preview.map_or(TextSize::from(0), TextRange::len)))
            - i64::from(u32::from(current.map_or(TextSize::from(0), TextRange::len)));
        let len = (i64::from(u32::from(region.len())) + delta).max(0);
        let window = TextRange::at(region.start(), TextSize::from(len as u32));

        Ok(document
            .clip(window, expand_to_full_lines, surrounding_lines)?
            .to_string())
    }

    /// Unified diff between the current and the previewed content, with
    /// [`TextChange::diff_context_lines`] of context around each hunk.
    pub fn preview_diff(&mut self) -> Result<String, ChangeError> {
        let current = self.current_content()?;
        let preview = self.preview_content()?;
        let diff = TextDiff::from_lines(&current, &preview);
        Ok(diff
            .unified_diff()
            .context_radius(self.diff_context_lines)
            .header(&format!("a/{}", self.name), &format!("b/{}", self.name))
            .to_string())
    }

    fn groups_region(&self, groups: &[GroupId]) -> Option<TextRange> {
        let root = self.edit.as_ref()?;
        root.coverage(
            groups
                .iter()
                .flat_map(|&id| self.groups[id.index()].edits().iter().copied()),
        )
    }

    /// Runs a copy of the tree on a copy of the document. Returns the preview
    /// document and the region the scope occupies in it.
    fn compute_preview(
        &mut self,
        scope: PreviewScope<'_>,
    ) -> Result<(Document, Option<TextRange>), ChangeError> {
        let mut document = self.current_document()?;
        let Some(root) = self.edit.as_ref() else {
            self.preview = None;
            return Ok((document, None));
        };

        let (mut copy, map) = copy_tree(root);
        let result = {
            let mut processor =
                EditProcessor::new(&mut document, &mut copy, ProcessorFlags::UPDATE_REGIONS);
            match scope {
                PreviewScope::All => {
                    processor.set_excludes(
                        self.inactive_edits()
                            .into_iter()
                            .filter_map(|edit| map.copy_of(edit)),
                    );
                }
                PreviewScope::Groups(groups) => {
                    let includes: Vec<EditId> = groups
                        .iter()
                        .filter(|&&id| self.is_group_active(id))
                        .flat_map(|&id| self.groups[id.index()].edits().iter().copied())
                        .filter_map(|edit| map.copy_of(edit))
                        .collect();
                    processor.set_includes(includes);
                }
            }
            processor.perform()
        };
        if let Err(err) = result {
            self.preview = None;
            return Err(err.into());
        }

        let region = match scope {
            PreviewScope::All => copy.range(copy.root()),
            PreviewScope::Groups(groups) => copy.coverage(
                groups
                    .iter()
                    .flat_map(|&id| self.groups[id.index()].edits().iter().copied())
                    .filter_map(|edit| map.copy_of(edit)),
            ),
        };
        tracing::debug!(
            target: "nova.text_change",
            change = %self.name,
            edits = copy.len(),
            region = ?region,
            "computed preview"
        );

        self.preview = self
            .keep_preview_edits
            .then_some(PreviewCopy { tree: copy, map });
        Ok((document, region))
    }

    // ---- validation ----------------------------------------------------------

    /// Remembers the current document content. A later
    /// [`TextChange::is_valid`] reports a fatal error if it changed.
    pub fn initialize_validation_data(&mut self) -> Result<(), ChangeError> {
        let document = self.current_document()?;
        self.validation_stamp = Some(content_stamp(&document));
        Ok(())
    }

    pub fn is_valid(&mut self, monitor: &mut dyn ProgressMonitor) -> RefactoringStatus {
        monitor.begin_task("", 1);
        let status = self.check_validity();
        monitor.worked(1);
        monitor.done();
        status
    }

    fn check_validity(&mut self) -> RefactoringStatus {
        let document = match self.current_document() {
            Ok(document) => document,
            Err(err) => {
                return self.status_entry(
                    Severity::Fatal,
                    format!("cannot access the document: {err}"),
                )
            }
        };

        let mut status = RefactoringStatus::ok();
        if let Some(stamp) = self.validation_stamp {
            if stamp != content_stamp(&document) {
                status.merge(self.status_entry(
                    Severity::Fatal,
                    "the document has been modified since the change was created",
                ));
            }
        }
        if let Some(root) = &self.edit {
            if let Some(range) = root.range(root.root()) {
                if let Err(err) = document.check_range(range) {
                    status.merge(self.status_entry(Severity::Error, err.to_string()));
                }
            }
        }
        status
    }

    /// [`TextChange::is_valid`] that also turns a pending cancellation into a
    /// fatal status.
    pub fn about_to_perform(&mut self, monitor: &mut dyn ProgressMonitor) -> RefactoringStatus {
        if monitor.is_canceled() {
            return self.status_entry(Severity::Fatal, ChangeError::Canceled.to_string());
        }
        self.is_valid(monitor)
    }

    fn status_entry(&self, severity: Severity, message: impl Into<String>) -> RefactoringStatus {
        let mut status = RefactoringStatus::ok();
        status.add_entry(severity, message, Some(self.name.clone()));
        status
    }
}

fn content_stamp(document: &Document) -> blake3::Hash {
    blake3::hash(document.as_str().as_bytes())
}

impl fmt::Debug for TextChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextChange")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("edits", &self.edit.as_ref().map(EditTree::len))
            .field("groups", &self.groups.len())
            .field("active", &self.active)
            .field("text_type", &self.text_type)
            .finish_non_exhaustive()
    }
}
