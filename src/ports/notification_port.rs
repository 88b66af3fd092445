//! Notification delivery port trait.

use crate::domain::error::ScannerError;

pub trait NotificationPort {
    /// Short sink name used in logs ("telegram", "console").
    fn name(&self) -> &str;

    /// Largest message, in characters, the sink accepts.
    fn max_chars(&self) -> usize;

    fn send(&self, text: &str) -> Result<(), ScannerError>;
}
