use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Not a stable API; intended for internal use and may change without notice.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a planner-origin invariant violation.
    pub(crate) fn planner_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Planner,
            message.into(),
        )
    }

    /// Construct an executor-origin invariant violation.
    pub(crate) fn executor_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Executor,
            message.into(),
        )
    }

    /// Construct an explain-origin invariant violation.
    pub(crate) fn explain_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Explain,
            message.into(),
        )
    }

    /// Construct an engine-origin internal error.
    pub(crate) fn engine_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Engine, message.into())
    }

    /// Construct a serialize-origin internal error.
    pub(crate) fn serialize_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Serialize, message.into())
    }

    /// Construct the user-visible sample-scan rejection for a relation.
    ///
    /// Raised at plan-rewrite time; aborts planning for the query and is
    /// never retried or degraded.
    pub(crate) fn sample_scan_unsupported(relation: &str) -> Self {
        Self::new(
            ErrorClass::Unsupported,
            ErrorOrigin::Planner,
            format!(
                "alderdb table \"{relation}\" does not support TABLESAMPLE: \
                 sample scans are not supported for AlderDB tables yet, \
                 please send a bug report"
            ),
        )
    }

    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self.class, ErrorClass::Unsupported)
    }

    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self.class, ErrorClass::InvariantViolation)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// User-facing: the host asked for a strategy with no engine equivalent.
    Unsupported,
    /// Defect in the planner/executor/engine contract; always fatal.
    InvariantViolation,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unsupported => "unsupported",
            Self::InvariantViolation => "invariant_violation",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Planner,
    Executor,
    Engine,
    Explain,
    Serialize,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Planner => "planner",
            Self::Executor => "executor",
            Self::Engine => "engine",
            Self::Explain => "explain",
            Self::Serialize => "serialize",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_scan_rejection_names_the_relation() {
        let err = InternalError::sample_scan_unsupported("orders");
        assert!(err.is_unsupported());
        assert_eq!(err.origin, ErrorOrigin::Planner);
        assert!(err.message.contains("\"orders\""));
        assert!(err.message.contains("bug report"));
    }

    #[test]
    fn display_with_class_is_origin_then_class() {
        let err = InternalError::executor_invariant("unrecognized plan tag");
        assert_eq!(
            err.display_with_class(),
            "executor:invariant_violation: unrecognized plan tag"
        );
    }
}
