//! Failure values reported by test bodies

use std::any::Any;
use thiserror::Error;

/// How a body reports that it did not succeed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Logical failure detected by the body itself
    Assertion,
    /// Anything the body did not anticipate
    Unexpected,
    /// The body stopped because its cancellation token fired
    Cancelled,
}

/// Error returned by a test body or cleanup hook
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct TestFailure {
    pub kind: FailureKind,
    pub message: String,
    pub stack_trace: Option<String>,
}

impl TestFailure {
    pub fn assertion(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Assertion,
            message: message.into(),
            stack_trace: None,
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Unexpected,
            message: message.into(),
            stack_trace: None,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            kind: FailureKind::Cancelled,
            message: "cancelled".to_string(),
            stack_trace: None,
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == FailureKind::Cancelled
    }

    /// Convert a caught panic payload.
    ///
    /// `assert!` and friends produce messages starting with "assertion", so
    /// those are treated as assertion failures; every other panic is unexpected.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };

        if message.starts_with("assertion") {
            Self::assertion(message)
        } else {
            Self::unexpected(format!("panicked: {message}"))
        }
    }
}

impl From<anyhow::Error> for TestFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err.to_string()).with_stack_trace(format!("{err:?}"))
    }
}

/// Fail with an assertion failure unless the condition holds
#[macro_export]
macro_rules! ensure_that {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::models::TestFailure::assertion(format!($($arg)+)));
        }
    };
}
