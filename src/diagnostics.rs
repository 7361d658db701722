// Operator-visible reporting of vendor faults
//
// Configuration is best-effort: a failed vendor call is reported here and the
// caller moves on to the next step.

use std::fmt::Display;
use std::sync::Arc;

use tracing::error;

/// Receives human-readable fault messages
pub trait DiagnosticsSink: Send + Sync {
    fn report_error(&self, message: &str);
}

/// Default sink: emits an `error` event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn report_error(&self, message: &str) {
        error!(target: "swerve_drive_hal::diagnostics", "{}", message);
    }
}

pub type SharedSink = Arc<dyn DiagnosticsSink>;

pub fn default_sink() -> SharedSink {
    Arc::new(TracingSink)
}

/// Anything that can tell success apart from a failure code
pub trait Status: Display {
    fn is_ok(&self) -> bool;
}

/// Report `status` as "<context>: <status>" unless it is a success.
/// Returns whether the call succeeded.
pub fn check_status<S: Status>(sink: &dyn DiagnosticsSink, status: S, context: &str) -> bool {
    if status.is_ok() {
        return true;
    }
    sink.report_error(&format!("{}: {}", context, status));
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl DiagnosticsSink for Recorder {
        fn report_error(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    struct Code(u8);

    impl fmt::Display for Code {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "code {}", self.0)
        }
    }

    impl Status for Code {
        fn is_ok(&self) -> bool {
            self.0 == 0
        }
    }

    #[test]
    fn test_success_is_silent() {
        let sink = Recorder::default();
        assert!(check_status(&sink, Code(0), "Failed to set idle mode"));
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failure_formats_context_and_status() {
        let sink = Recorder::default();
        assert!(!check_status(&sink, Code(7), "Failed to set idle mode"));
        assert_eq!(
            sink.0.lock().unwrap().as_slice(),
            ["Failed to set idle mode: code 7"]
        );
    }
}
