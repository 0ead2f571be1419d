//! Source location tracking for expansion diagnostics.
//!
//! Every error surfaced by the expander carries an [`ElementLocation`]
//! naming the file, line and column of the attribute or element whose
//! text was being expanded, so callers can render compiler-style
//! messages (`proj.csproj (12,5): error MSB4184: ...`).

use std::fmt;
use std::sync::Arc;

/// Location of the element or attribute whose value is being expanded.
///
/// Locations are cheap to clone; the file path is reference-counted and
/// shared between all errors raised while evaluating one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementLocation {
    file: Arc<str>,
    line: u32,
    column: u32,
}

impl ElementLocation {
    /// Create a location inside the given file.
    pub fn new(file: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Location for values that did not come from a file, e.g. strings
    /// evaluated from an API call or a command line.
    pub fn in_memory() -> Self {
        Self {
            file: Arc::from(""),
            line: 0,
            column: 0,
        }
    }

    /// File path, or the empty string for in-memory evaluation.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// One-based line number, zero when unknown.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// One-based column number, zero when unknown.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// True when this location refers to a real file on disk.
    pub fn is_file_backed(&self) -> bool {
        !self.file.is_empty()
    }
}

impl Default for ElementLocation {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Display for ElementLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            return write!(f, "<memory>");
        }
        if self.line == 0 {
            return write!(f, "{}", self.file);
        }
        write!(f, "{} ({},{})", self.file, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_line_and_column() {
        let loc = ElementLocation::new("dir/build.proj", 12, 5);
        assert_eq!(loc.to_string(), "dir/build.proj (12,5)");
    }

    #[test]
    fn display_in_memory() {
        assert_eq!(ElementLocation::in_memory().to_string(), "<memory>");
        assert!(!ElementLocation::in_memory().is_file_backed());
    }

    #[test]
    fn file_path_is_shared() {
        let loc = ElementLocation::new("a.proj", 1, 1);
        let copy = loc.clone();
        assert_eq!(loc, copy);
        assert_eq!(copy.file(), "a.proj");
    }
}
