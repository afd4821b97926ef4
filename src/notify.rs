#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Receives user-facing notifications from validator gates and request
/// error paths. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);
}

/// Discards every notification.
pub struct Silent;

impl Notifier for Silent {
    fn notify(&self, _severity: Severity, _message: &str) {}
}
