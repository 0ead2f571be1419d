//! Errors raised during function dispatch and invocation.

use thiserror::Error;

use crate::model::PathError;

/// Result alias used by every registered function.
pub type FunctionResult<T> = Result<T, FunctionError>;

/// Why a function-call expression could not be evaluated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    /// The `[Type]` is not in the closed set of invocable types.
    #[error("the type '[{type_name}]' is not allowed in property function expressions")]
    UnknownType {
        /// Name as written, without brackets.
        type_name: String,
    },

    /// The type is known but has no such member.
    #[error("'{member}' is not a recognized member of '[{type_name}]'")]
    UnknownMember { type_name: String, member: String },

    /// No method or property of that name exists on the receiver value.
    #[error("'{member}' is not available on a value of type {receiver}")]
    UnknownInstanceMember {
        /// Receiver value's type tag.
        receiver: &'static str,
        member: String,
    },

    /// Wrong number of arguments for every known overload.
    #[error("{name} takes {expected} argument(s) but was given {actual}")]
    InvalidArity {
        name: String,
        /// Rendered expectation, e.g. `2` or `1 to 3` or `at least 1`.
        expected: String,
        actual: usize,
    },

    /// An argument could not be coerced to what the function needs.
    #[error("argument {index} of {name} must be {expected}")]
    InvalidArgument {
        name: String,
        /// One-based position of the offending argument.
        index: usize,
        expected: String,
    },

    /// A version literal failed to parse.
    #[error("the string '{literal}' is not a valid version")]
    InvalidVersion { literal: String },

    /// The function ran and failed (range violations, division by
    /// zero, malformed regex patterns and the like).
    #[error("{name} failed: {message}")]
    Evaluation { name: String, message: String },

    /// A path-typed value was unusable.
    #[error(transparent)]
    Path(#[from] PathError),
}

impl FunctionError {
    pub(crate) fn evaluation(name: &str, message: impl Into<String>) -> Self {
        FunctionError::Evaluation {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn unknown_member(type_name: &str, member: &str) -> Self {
        FunctionError::UnknownMember {
            type_name: type_name.to_string(),
            member: member.to_string(),
        }
    }
}
