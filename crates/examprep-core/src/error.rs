//! Error types for the parse boundary and the attempt session.
//!
//! Both enums are matched on by callers (the CLI reports them verbatim, the
//! driver forwards session errors to the handle), so they are typed rather
//! than carried as `anyhow` strings.

use thiserror::Error;

use crate::attempt::Phase;

/// Errors raised while converting backend JSON into typed entities.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The payload is not valid JSON or has the wrong shape.
    #[error("invalid JSON in {source_name}: {message}")]
    Json {
        source_name: String,
        message: String,
    },

    /// A required field is absent.
    #[error("{context}: missing required field `{field}`")]
    MissingField { context: String, field: &'static str },

    /// A field is present but its value is unusable.
    #[error("{context}: invalid value for `{field}`: {message}")]
    InvalidValue {
        context: String,
        field: &'static str,
        message: String,
    },

    /// A question has no option flagged as correct.
    #[error("question {question_id}: no option is marked correct")]
    NoCorrectOption { question_id: String },
}

/// Errors raised by the test-attempt session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The test definition has no questions.
    #[error("test {test_id} has no questions")]
    EmptyTest { test_id: String },

    /// The test definition has a zero duration.
    #[error("test {test_id} has a zero duration")]
    ZeroDuration { test_id: String },

    /// Two questions share an id.
    #[error("test {test_id} contains duplicate question id {question_id}")]
    DuplicateQuestion { test_id: String, question_id: String },

    /// Two options of one question share an id.
    #[error("question {question_id} contains duplicate option id {option_id}")]
    DuplicateOption {
        question_id: String,
        option_id: String,
    },

    /// The question id is not part of the loaded test.
    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    /// The option id does not belong to the question.
    #[error("option {option_id} does not belong to question {question_id}")]
    UnknownOption {
        question_id: String,
        option_id: String,
    },

    /// The session no longer accepts mutations.
    #[error("session is {0}")]
    Closed(Phase),

    /// The driver task has gone away.
    #[error("attempt driver stopped")]
    DriverStopped,
}
