//! Notifier that prints each message to a writer (stdout by default).

use crate::domain::error::ScannerError;
use crate::ports::notification_port::NotificationPort;
use std::io::Write;
use std::sync::Mutex;

pub struct ConsoleNotifier {
    out: Mutex<Box<dyn Write + Send>>,
    max_chars: usize,
}

impl ConsoleNotifier {
    pub fn stdout(max_chars: usize) -> Self {
        Self::new(Box::new(std::io::stdout()), max_chars)
    }

    pub fn new(out: Box<dyn Write + Send>, max_chars: usize) -> Self {
        Self {
            out: Mutex::new(out),
            max_chars,
        }
    }
}

impl NotificationPort for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    fn max_chars(&self) -> usize {
        self.max_chars
    }

    fn send(&self, text: &str) -> Result<(), ScannerError> {
        let mut out = self.out.lock().map_err(|_| ScannerError::Sink {
            sink: "console".into(),
            reason: "writer lock poisoned".into(),
        })?;
        writeln!(out, "{}\n", text)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn messages_are_separated_by_blank_lines() {
        let buf = SharedBuf::default();
        let notifier = ConsoleNotifier::new(Box::new(buf.clone()), 3500);
        notifier.send("first").unwrap();
        notifier.send("second").unwrap();
        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "first\n\nsecond\n\n");
        assert_eq!(notifier.name(), "console");
    }
}
