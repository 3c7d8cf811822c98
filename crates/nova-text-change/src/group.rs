use std::sync::atomic::{AtomicU32, Ordering};

use text_size::TextRange;

use crate::tree::{EditId, EditTree};

/// Process-unique identity of one [`crate::TextChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChangeId(u32);

impl ChangeId {
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        ChangeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle of a [`ChangeGroup`] inside its owning change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId {
    change: ChangeId,
    index: u32,
}

impl GroupId {
    pub(crate) fn new(change: ChangeId, index: usize) -> Self {
        Self {
            change,
            index: index as u32,
        }
    }

    pub fn change(self) -> ChangeId {
        self.change
    }

    pub(crate) fn index(self) -> usize {
        self.index as usize
    }
}

/// A named, ordered set of edits that belong together from the user's point
/// of view (for example "rename occurrence in line 12").
///
/// Groups reference edits; they never own them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditGroup {
    name: String,
    edits: Vec<EditId>,
}

impl EditGroup {
    pub fn new(name: impl Into<String>, edits: impl IntoIterator<Item = EditId>) -> Self {
        Self {
            name: name.into(),
            edits: edits.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn edits(&self) -> &[EditId] {
        &self.edits
    }

    pub fn add_edit(&mut self, edit: EditId) {
        self.edits.push(edit);
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Coverage of the members' current regions in `tree`.
    pub fn region(&self, tree: &EditTree) -> Option<TextRange> {
        tree.coverage(self.edits.iter().copied())
    }
}

/// An [`EditGroup`] registered with a [`crate::TextChange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeGroup {
    group: EditGroup,
    active: bool,
    owner: ChangeId,
}

impl ChangeGroup {
    pub(crate) fn new(owner: ChangeId, group: EditGroup) -> Self {
        Self {
            group,
            active: true,
            owner,
        }
    }

    pub fn owner(&self) -> ChangeId {
        self.owner
    }

    pub fn name(&self) -> &str {
        self.group.name()
    }

    pub fn edit_group(&self) -> &EditGroup {
        &self.group
    }

    pub fn edits(&self) -> &[EditId] {
        self.group.edits()
    }

    /// The group's own flag. The owning change decides how this combines
    /// with its own activity, see [`crate::TextChange::is_group_active`].
    pub fn is_enabled(&self) -> bool {
        self.active
    }

    pub(crate) fn set_enabled(&mut self, active: bool) {
        self.active = active;
    }
}
