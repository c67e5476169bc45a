//! Error types for the engine.
//!
//! Script-visible failures (type/reference/range/syntax errors and thrown
//! values) travel through the evaluator as data; task lifecycle failures
//! (abort, re-entrancy, drain violations) are host-facing and never become
//! catchable inside sandboxed code.

use crate::ast::Span;
use crate::value::JsValue;
use thiserror::Error;

/// Main error type for the engine.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("SyntaxError: {message}")]
    Syntax { message: String },

    #[error("TypeError: {message}")]
    Type { message: String },

    #[error("ReferenceError: {message}")]
    Reference { message: String },

    #[error("RangeError: {message}")]
    Range { message: String },

    /// A value thrown by script code (`throw` statement or a rethrow).
    #[error("uncaught script exception")]
    Thrown { value: JsValue },

    /// The task was cancelled through `TaskIterator::abort`.
    #[error("task aborted")]
    TaskAborted,

    /// A synchronous evaluation was attempted while another task on the same
    /// realm was mid-step.
    #[error("concurrent evaluation on realm: another task is already running")]
    ConcurrentEvaluation,

    /// The host's synchronous task runner returned control without driving
    /// the iterator to completion. A host contract violation, not a normal
    /// failure.
    #[error("task runner returned before draining the iterator")]
    IncompleteDrain,

    /// A promise-like value was rejected and no handler was attached by the
    /// time the task's microtask queue drained.
    #[error("unhandled rejection in task")]
    UnhandledRejection { value: JsValue },

    /// Engine invariant violation (malformed AST, corrupted stack). These are
    /// implementation defects and are never catchable by sandboxed code.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn syntax(message: impl Into<String>) -> Self {
        EngineError::Syntax {
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        EngineError::Type {
            message: message.into(),
        }
    }

    pub fn reference_error(name: impl Into<String>) -> Self {
        EngineError::Reference {
            message: format!("{} is not defined", name.into()),
        }
    }

    /// Temporal-dead-zone access: the binding exists but is uninitialized.
    pub fn tdz(name: impl Into<String>) -> Self {
        EngineError::Reference {
            message: format!("cannot access '{}' before initialization", name.into()),
        }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        EngineError::Range {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::Internal(message.into())
    }

    pub fn thrown(value: JsValue) -> Self {
        EngineError::Thrown { value }
    }

    /// Attach a source span to an engine-raised error message. Thrown values
    /// and lifecycle errors pass through unchanged.
    pub fn at(self, span: Span) -> Self {
        match self {
            EngineError::Syntax { message } => EngineError::Syntax {
                message: format!("{message} at {span}"),
            },
            EngineError::Type { message } => EngineError::Type {
                message: format!("{message} at {span}"),
            },
            EngineError::Range { message } => EngineError::Range {
                message: format!("{message} at {span}"),
            },
            EngineError::Reference { message } => EngineError::Reference {
                message: format!("{message} at {span}"),
            },
            other => other,
        }
    }

    /// True for errors that sandboxed `try`/`catch` may observe.
    pub fn is_catchable(&self) -> bool {
        matches!(
            self,
            EngineError::Syntax { .. }
                | EngineError::Type { .. }
                | EngineError::Reference { .. }
                | EngineError::Range { .. }
                | EngineError::Thrown { .. }
        )
    }

    /// The error-class name used when this surfaces as a script error value.
    pub fn class_name(&self) -> Option<&'static str> {
        match self {
            EngineError::Syntax { .. } => Some("SyntaxError"),
            EngineError::Type { .. } => Some("TypeError"),
            EngineError::Reference { .. } => Some("ReferenceError"),
            EngineError::Range { .. } => Some("RangeError"),
            _ => None,
        }
    }

    /// The message carried by an engine-raised error class.
    pub fn class_message(&self) -> Option<String> {
        match self {
            EngineError::Syntax { message }
            | EngineError::Type { message }
            | EngineError::Range { message }
            | EngineError::Reference { message } => Some(message.clone()),
            _ => None,
        }
    }
}
