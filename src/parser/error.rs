//! Syntax errors raised while parsing expression text.

use thiserror::Error;

/// Result alias used throughout the parser.
pub type ParseResult<T> = Result<T, SyntaxError>;

/// A malformed expression. Positions are byte offsets into the text
/// being parsed; callers add file/line context when they report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    /// An opening `$(`, `@(`, `%(` or argument-list `(` never closed.
    #[error("unbalanced parentheses starting at offset {position}")]
    UnbalancedParentheses {
        /// Offset of the opening delimiter.
        position: usize,
    },

    /// `@()` with no item type, or an argument slot with nothing in it.
    #[error("expression at offset {position} is empty")]
    EmptyExpression { position: usize },

    /// A name that is not a legal identifier.
    #[error("'{identifier}' at offset {position} is not a valid name")]
    InvalidIdentifier {
        identifier: String,
        /// Offset where the identifier started.
        position: usize,
    },

    /// Member-invocation text that does not follow the
    /// `[Type]::Method(...)` / `.Method(...)` shape.
    #[error("invalid function syntax at offset {position}: {message}")]
    InvalidFunctionSyntax { message: String, position: usize },

    /// A quoted string with no closing quote.
    #[error("unterminated quoted string starting at offset {position}")]
    UnterminatedQuote { position: usize },

    /// `[` indexer with no closing `]` or an empty index.
    #[error("malformed indexer at offset {position}")]
    MalformedIndexer { position: usize },

    /// A specific character was required.
    #[error("expected '{expected}' at offset {position}")]
    ExpectedCharacter { expected: char, position: usize },

    /// Expression nesting exceeded the configured limit.
    #[error("expression nesting exceeds the limit of {limit}")]
    NestingTooDeep { limit: usize },

    /// `$(Registry:...)` text that is not a recognized registry root.
    #[error("'{key}' is not a valid registry location")]
    InvalidRegistryLocation { key: String },
}

impl SyntaxError {
    /// Byte offset most useful for pointing at the problem, when known.
    pub fn position(&self) -> Option<usize> {
        match self {
            SyntaxError::UnbalancedParentheses { position }
            | SyntaxError::EmptyExpression { position }
            | SyntaxError::InvalidIdentifier { position, .. }
            | SyntaxError::InvalidFunctionSyntax { position, .. }
            | SyntaxError::UnterminatedQuote { position }
            | SyntaxError::MalformedIndexer { position }
            | SyntaxError::ExpectedCharacter { position, .. } => Some(*position),
            SyntaxError::NestingTooDeep { .. } | SyntaxError::InvalidRegistryLocation { .. } => {
                None
            }
        }
    }
}
