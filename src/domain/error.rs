//! Domain error types.

/// A parse error with position information for rule parsing.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(input[..self.position.min(input.len())].chars().count()) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for sigscan.
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("provider error for {code}: {reason}")]
    Provider { code: String, reason: String },

    #[error("provider timed out for {code}")]
    ProviderTimeout { code: String },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("insufficient data for {code}: have {bars} bars, need {minimum}")]
    InsufficientData {
        code: String,
        bars: usize,
        minimum: usize,
    },

    #[error("invalid series for {code}: {reason}")]
    InvalidSeries { code: String, reason: String },

    #[error("{sink} delivery failed: {reason}")]
    Sink { sink: String, reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    RuleParse(#[from] ParseError),

    #[error("invalid rule: {reason}")]
    RuleInvalid { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScannerError {
    /// Errors that only concern one ticker and must not stop a scan.
    pub fn is_per_ticker(&self) -> bool {
        matches!(
            self,
            ScannerError::Provider { .. }
                | ScannerError::ProviderTimeout { .. }
                | ScannerError::NoData { .. }
                | ScannerError::InsufficientData { .. }
                | ScannerError::InvalidSeries { .. }
        )
    }
}

impl ScannerError {
    /// Process exit status for a run that stops on this error.
    pub fn exit_status(&self) -> u8 {
        match self {
            ScannerError::Io(_) | ScannerError::Sink { .. } => 1,
            ScannerError::ConfigParse { .. }
            | ScannerError::ConfigMissing { .. }
            | ScannerError::ConfigInvalid { .. } => 2,
            ScannerError::Database { .. }
            | ScannerError::Provider { .. }
            | ScannerError::ProviderTimeout { .. } => 3,
            ScannerError::RuleParse(_) | ScannerError::RuleInvalid { .. } => 4,
            ScannerError::NoData { .. }
            | ScannerError::InsufficientData { .. }
            | ScannerError::InvalidSeries { .. } => 5,
        }
    }
}

impl From<&ScannerError> for std::process::ExitCode {
    fn from(err: &ScannerError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_category() {
        let cases = [
            (
                ScannerError::Sink {
                    sink: "telegram".into(),
                    reason: "503".into(),
                },
                1,
            ),
            (
                ScannerError::ConfigMissing {
                    section: "scan".into(),
                    key: "markets".into(),
                },
                2,
            ),
            (
                ScannerError::ProviderTimeout { code: "A".into() },
                3,
            ),
            (
                ScannerError::RuleInvalid {
                    reason: "zero".into(),
                },
                4,
            ),
            (ScannerError::NoData { code: "A".into() }, 5),
        ];
        for (err, expected) in cases {
            assert_eq!(err.exit_status(), expected, "{}", err);
        }
    }

    #[test]
    fn per_ticker_classification() {
        assert!(ScannerError::NoData { code: "A".into() }.is_per_ticker());
        assert!(
            ScannerError::Provider {
                code: "A".into(),
                reason: "boom".into()
            }
            .is_per_ticker()
        );
        assert!(
            !ScannerError::Database {
                reason: "locked".into()
            }
            .is_per_ticker()
        );
    }

    #[test]
    fn context_caret_under_position() {
        let err = ParseError {
            message: "expected ')'".into(),
            position: 4,
        };
        let ctx = err.display_with_context("AND(x");
        let lines: Vec<&str> = ctx.lines().collect();
        assert_eq!(lines[1], "    ^");
    }
}
