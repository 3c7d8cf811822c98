use std::cell::Cell;

use tokio_util::sync::CancellationToken;

/// Progress sink handed to long-running change operations.
///
/// Cancellation is cooperative: operations poll [`ProgressMonitor::is_canceled`]
/// at well-defined points and bail out with [`crate::ChangeError::Canceled`].
pub trait ProgressMonitor {
    fn begin_task(&mut self, name: &str, total_work: u32);
    fn worked(&mut self, work: u32);
    fn sub_task(&mut self, _name: &str) {}
    fn done(&mut self);
    fn is_canceled(&self) -> bool;
}

/// Ignores progress. Can still be canceled, which is mostly useful in tests.
#[derive(Debug, Default)]
pub struct NullProgressMonitor {
    canceled: Cell<bool>,
}

impl NullProgressMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_canceled(&self, canceled: bool) {
        self.canceled.set(canceled);
    }
}

impl ProgressMonitor for NullProgressMonitor {
    fn begin_task(&mut self, _name: &str, _total_work: u32) {}

    fn worked(&mut self, _work: u32) {}

    fn done(&mut self) {}

    fn is_canceled(&self) -> bool {
        self.canceled.get()
    }
}

/// Reports progress as `tracing` events and observes a shared
/// [`CancellationToken`].
#[derive(Debug, Clone)]
pub struct TokenProgressMonitor {
    token: CancellationToken,
    task: String,
    total: u32,
    completed: u32,
}

impl TokenProgressMonitor {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            task: String::new(),
            total: 0,
            completed: 0,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    fn percentage(&self) -> Option<u32> {
        (self.total > 0).then(|| {
            let completed = u64::from(self.completed.min(self.total));
            // At most 100, so the narrowing cannot truncate.
            ((completed * 100) / u64::from(self.total)) as u32
        })
    }
}

impl ProgressMonitor for TokenProgressMonitor {
    fn begin_task(&mut self, name: &str, total_work: u32) {
        self.task = name.to_string();
        self.total = total_work;
        self.completed = 0;
        tracing::debug!(
            target: "nova.text_change.progress",
            task = %self.task,
            total = total_work,
            "begin"
        );
    }

    fn worked(&mut self, work: u32) {
        self.completed = self.completed.saturating_add(work);
        tracing::debug!(
            target: "nova.text_change.progress",
            task = %self.task,
            percentage = ?self.percentage(),
            "report"
        );
    }

    fn sub_task(&mut self, name: &str) {
        tracing::debug!(
            target: "nova.text_change.progress",
            task = %self.task,
            sub_task = name,
            "report"
        );
    }

    fn done(&mut self) {
        self.completed = self.total;
        tracing::debug!(target: "nova.text_change.progress", task = %self.task, "end");
    }

    fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }
}
