//! Outcome of validating a change before it is performed.

use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    #[default]
    Ok,
    Info,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub severity: Severity,
    pub message: String,
    /// Free-form location hint, e.g. the name of the affected change.
    pub context: Option<String>,
}

/// Accumulated validation findings. The overall severity is the maximum of
/// all entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefactoringStatus {
    entries: Vec<StatusEntry>,
}

impl RefactoringStatus {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::with_entry(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_entry(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_entry(Severity::Error, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::with_entry(Severity::Fatal, message)
    }

    fn with_entry(severity: Severity, message: impl Into<String>) -> Self {
        let mut status = Self::default();
        status.add_entry(severity, message, None);
        status
    }

    pub fn add_entry(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        context: Option<String>,
    ) {
        self.entries.push(StatusEntry {
            severity,
            message: message.into(),
            context,
        });
    }

    pub fn add_info(&mut self, message: impl Into<String>) {
        self.add_entry(Severity::Info, message, None);
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.add_entry(Severity::Warning, message, None);
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.add_entry(Severity::Error, message, None);
    }

    pub fn add_fatal_error(&mut self, message: impl Into<String>) {
        self.add_entry(Severity::Fatal, message, None);
    }

    pub fn merge(&mut self, other: RefactoringStatus) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }

    pub fn severity(&self) -> Severity {
        self.entries
            .iter()
            .map(|entry| entry.severity)
            .max()
            .unwrap_or(Severity::Ok)
    }

    pub fn is_ok(&self) -> bool {
        self.severity() == Severity::Ok
    }

    pub fn has_warning(&self) -> bool {
        self.severity() >= Severity::Warning
    }

    pub fn has_error(&self) -> bool {
        self.severity() >= Severity::Error
    }

    pub fn has_fatal_error(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// First entry whose severity is at least `severity`.
    pub fn entry_matching_severity(&self, severity: Severity) -> Option<&StatusEntry> {
        self.entries.iter().find(|entry| entry.severity >= severity)
    }
}

impl fmt::Display for RefactoringStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return f.write_str("ok");
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}: {}", entry.severity, entry.message)?;
            if let Some(context) = &entry.context {
                write!(f, " ({context})")?;
            }
        }
        Ok(())
    }
}
