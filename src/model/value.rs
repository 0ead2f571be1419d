//! The value model shared by function dispatch and rendering.

use std::fmt;

use super::version::Version;

/// A value produced while evaluating a function-call expression.
///
/// Expansion is fundamentally string-in/string-out; typed values exist
/// only *between* dispatch steps, so a chain such as
/// `$([System.Version]::Parse($(V)).Major)` can pass a version object
/// to the next member access without re-parsing text. Rendering back
/// into the output stream goes through [`fmt::Display`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Text, the common case. Always unescaped while computation runs.
    String(String),
    /// 64-bit signed integer with wraparound arithmetic semantics.
    Integer(i64),
    /// IEEE-754 double, used once any operand stops looking integral.
    Double(f64),
    /// Renders as `True` / `False`.
    Boolean(bool),
    /// Parsed version object.
    Version(Version),
    /// Ordered list, rendered semicolon-joined.
    List(Vec<Value>),
    /// Explicit absence: the `null` keyword.
    Empty,
}

impl Value {
    /// Human-readable type tag for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "String",
            Value::Integer(_) => "Integer",
            Value::Double(_) => "Double",
            Value::Boolean(_) => "Boolean",
            Value::Version(_) => "Version",
            Value::List(_) => "List",
            Value::Empty => "Null",
        }
    }

    /// `null` or the empty string.
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Empty) || matches!(self, Value::String(s) if s.is_empty())
    }

    /// Borrow string content without rendering. `None` for non-strings.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// True when the value would participate in arithmetic as an
    /// integer: it is one, or it is text that parses as one.
    pub fn looks_like_integer(&self) -> bool {
        match self {
            Value::Integer(_) => true,
            Value::String(s) => s.trim().parse::<i64>().is_ok(),
            _ => false,
        }
    }

    /// Coerce to an integer. Strings are parsed, doubles are accepted
    /// only when they are whole numbers in range.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::String(s) => s.trim().parse().ok(),
            Value::Double(d) => {
                if d.fract() == 0.0 && *d >= i64::MIN as f64 && *d <= i64::MAX as f64 {
                    Some(*d as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Coerce to a double. Strings are parsed with invariant rules.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Integer(i) => Some(*i as f64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Coerce to a boolean; only `true`/`false` text qualifies, any
    /// case.
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::String(s) => {
                let t = s.trim();
                if t.eq_ignore_ascii_case("true") {
                    Some(true)
                } else if t.eq_ignore_ascii_case("false") {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Coerce to a version, parsing string content on demand.
    pub fn to_version(&self) -> Option<Version> {
        match self {
            Value::Version(v) => Some(*v),
            Value::String(s) => Version::parse(s).ok(),
            Value::Integer(i) if *i >= 0 => u32::try_from(*i).ok().map(|c| Version::new(&[c])),
            _ => None,
        }
    }

    /// Render exactly as [`fmt::Display`] would.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Boolean(b) => f.write_str(if *b { "True" } else { "False" }),
            Value::Version(v) => write!(f, "{v}"),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Empty => Ok(()),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Version> for Value {
    fn from(v: Version) -> Self {
        Value::Version(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
