//! Syntax tree for `$()`, `@()` and `%()` expressions.

use std::fmt;

/// A parsed `$(...)` or `%(...)` reference, or one of the pieces an
/// argument list can hold.
///
/// Composite variants box their payload so the enum stays small; the
/// evaluator matches on it in a tight loop.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expr {
    /// `$()` with nothing inside; expands to the empty string.
    Empty,
    /// `$(Name)` plain property lookup.
    Property(String),
    /// `$(Registry:...)`, raw key text after the `Registry:` prefix.
    Registry(String),
    /// `%(Name)` or `%(Type.Name)`.
    Metadata(MetadataRef),
    /// `[Type]::Member` with no argument list, a static property read.
    StaticProperty(Box<StaticMemberData>),
    /// `[Type]::Method(args...)`.
    StaticCall(Box<CallData>),
    /// `[Type]::new(args...)`.
    Constructor(Box<CallData>),
    /// `receiver.Member` or `receiver.Method(args...)`.
    Member(Box<MemberData>),
    /// `receiver[index]`.
    Indexer(Box<IndexerData>),
    /// A quoted or bare argument with no expansion triggers inside.
    Literal(String),
    /// Argument text still containing `$(`/`%(` references, expanded
    /// lazily with the caller's context.
    Template(String),
    /// The `null` keyword.
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetadataRef {
    /// Qualifier before the dot, if any: `%(Compile.Culture)`.
    pub item_type: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StaticMemberData {
    pub type_name: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallData {
    pub type_name: String,
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemberData {
    pub receiver: Expr,
    pub name: String,
    /// `None` for a property access (`.Length`), `Some` for a call,
    /// even an empty one (`.ToString()`).
    pub args: Option<Vec<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexerData {
    pub receiver: Expr,
    pub index: Expr,
}

/// A parsed `@(...)` item expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemVector {
    pub item_type: String,
    /// Transform steps, applied left to right.
    pub steps: Vec<TransformCall>,
    /// Custom join separator from `, '...'`; raw quoted content, may
    /// itself contain property references.
    pub separator: Option<String>,
}

impl ItemVector {
    /// A bare `@(Type)` with no transforms and no custom separator.
    /// Only these qualify for metadata-preserving pass-through when
    /// expanding into items.
    pub fn is_plain(&self) -> bool {
        self.steps.is_empty() && self.separator.is_none()
    }
}

/// One `->` step inside an item expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransformCall {
    /// `->'template'`: a quoted pattern evaluated once per item with
    /// that item's metadata in scope.
    Template(String),
    /// `->Name(args...)` or bare `->Name`.
    Function { name: String, args: Vec<Expr> },
}

impl Expr {
    /// Short tag used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Empty => "empty",
            Expr::Property(_) => "property",
            Expr::Registry(_) => "registry",
            Expr::Metadata(_) => "metadata",
            Expr::StaticProperty(_) => "static property",
            Expr::StaticCall(_) => "static call",
            Expr::Constructor(_) => "constructor",
            Expr::Member(_) => "member access",
            Expr::Indexer(_) => "indexer",
            Expr::Literal(_) => "literal",
            Expr::Template(_) => "template",
            Expr::Null => "null",
        }
    }
}

// Rendering a metadata reference back to source form is handy in error
// messages; nothing else round-trips through Display.
impl fmt::Display for MetadataRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.item_type {
            Some(t) => write!(f, "%({}.{})", t, self.name),
            None => write!(f, "%({})", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_vector_detection() {
        let plain = ItemVector {
            item_type: "Compile".into(),
            steps: Vec::new(),
            separator: None,
        };
        assert!(plain.is_plain());

        let with_sep = ItemVector {
            separator: Some(", ".into()),
            ..plain.clone()
        };
        assert!(!with_sep.is_plain());

        let with_step = ItemVector {
            steps: vec![TransformCall::Function {
                name: "Distinct".into(),
                args: Vec::new(),
            }],
            ..plain
        };
        assert!(!with_step.is_plain());
    }

    #[test]
    fn metadata_ref_displays_source_form() {
        let bare = MetadataRef {
            item_type: None,
            name: "Filename".into(),
        };
        assert_eq!(bare.to_string(), "%(Filename)");
        let qualified = MetadataRef {
            item_type: Some("Compile".into()),
            name: "Culture".into(),
        };
        assert_eq!(qualified.to_string(), "%(Compile.Culture)");
    }
}
