use super::types::{ConversionIssue, Severity};

/// Collects recoverable issues and mirrors each one to the log.
#[derive(Debug, Default)]
pub(super) struct Diagnostics {
    issues: Vec<ConversionIssue>,
}

impl Diagnostics {
    pub(super) fn warn(&mut self, code: &str, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.push(Severity::Warning, code, message);
    }

    pub(super) fn info(&mut self, code: &str, message: impl Into<String>) {
        let message = message.into();
        log::info!("{message}");
        self.push(Severity::Info, code, message);
    }

    #[cfg(test)]
    pub(super) fn has(&self, code: &str) -> bool {
        self.issues.iter().any(|issue| issue.code == code)
    }

    pub(super) fn into_issues(self) -> Vec<ConversionIssue> {
        self.issues
    }

    fn push(&mut self, severity: Severity, code: &str, message: String) {
        self.issues.push(ConversionIssue {
            severity,
            code: code.to_string(),
            message,
        });
    }
}
