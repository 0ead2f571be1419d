//! Errors surfaced by expansion entry points.

use thiserror::Error;

use crate::diagnostics::ElementLocation;
use crate::model::PathError;
use crate::parser::SyntaxError;
use crate::registry::FunctionError;

/// Result alias for expansion entry points.
pub type ExpansionResult<T> = Result<T, ExpansionError>;

/// A fatal expansion failure.
///
/// Soft conditions never reach this type: an undefined property, an
/// empty item list or missing metadata all expand to empty text.
/// Every variant carries the source location of the attribute being
/// expanded and renders in compiler style, for example
/// `dir/build.proj (12,5): error MSB4184: ...`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpansionError {
    /// Malformed expression text.
    #[error("{location}: error MSB4186: invalid expression: {source}")]
    Syntax {
        /// What the parser rejected.
        #[source]
        source: SyntaxError,
        /// Where the expression came from.
        location: ElementLocation,
    },

    /// A function call failed to dispatch or to run.
    #[error("{location}: error MSB4184: the expression \"{expression}\" cannot be evaluated: {message}")]
    FunctionEvaluation {
        /// The `$()` segment as written.
        expression: String,
        /// Failure detail from the function layer.
        message: String,
        /// Where the expression came from.
        location: ElementLocation,
    },

    /// A version literal that does not parse.
    #[error("{location}: error MSB4229: the string \"{literal}\" does not describe a valid version")]
    InvalidVersionFormat {
        /// The rejected text.
        literal: String,
        /// Where the expression came from.
        location: ElementLocation,
    },

    /// A computed value could not be used as a path.
    #[error("{location}: error MSB4023: {source}")]
    Path {
        /// The underlying path failure.
        #[source]
        source: PathError,
        /// Where the expression came from.
        location: ElementLocation,
    },
}

impl ExpansionError {
    pub(crate) fn syntax(source: SyntaxError, location: &ElementLocation) -> Self {
        ExpansionError::Syntax {
            source,
            location: location.clone(),
        }
    }

    pub(crate) fn path(source: PathError, location: &ElementLocation) -> Self {
        ExpansionError::Path {
            source,
            location: location.clone(),
        }
    }

    /// Wrap a function-layer failure, lifting the variants that carry
    /// their own error code.
    pub(crate) fn function(err: FunctionError, expression: &str, location: &ElementLocation) -> Self {
        match err {
            FunctionError::InvalidVersion { literal } => ExpansionError::InvalidVersionFormat {
                literal,
                location: location.clone(),
            },
            FunctionError::Path(source) => ExpansionError::Path {
                source,
                location: location.clone(),
            },
            other => ExpansionError::FunctionEvaluation {
                expression: expression.to_string(),
                message: other.to_string(),
                location: location.clone(),
            },
        }
    }

    /// Stable error-code identifier, e.g. `MSB4184`.
    pub fn code(&self) -> &'static str {
        match self {
            ExpansionError::Syntax { .. } => "MSB4186",
            ExpansionError::FunctionEvaluation { .. } => "MSB4184",
            ExpansionError::InvalidVersionFormat { .. } => "MSB4229",
            ExpansionError::Path { .. } => "MSB4023",
        }
    }

    /// Where the failing expression came from.
    pub fn location(&self) -> &ElementLocation {
        match self {
            ExpansionError::Syntax { location, .. }
            | ExpansionError::FunctionEvaluation { location, .. }
            | ExpansionError::InvalidVersionFormat { location, .. }
            | ExpansionError::Path { location, .. } => location,
        }
    }
}
