//! Argument validation and coercion helpers.
//!
//! Arguments arrive as loosely typed [`Value`]s, mostly strings.
//! Functions state what they need through these helpers, which produce
//! uniform [`FunctionError`]s on mismatch: wrong counts become
//! `InvalidArity`, wrong shapes become `InvalidArgument` naming the
//! one-based position.

use crate::model::{Value, Version};

use super::error::{FunctionError, FunctionResult};

/// Require between `min` and `max` arguments; `None` means unbounded.
pub fn arity(name: &str, args: &[Value], min: usize, max: Option<usize>) -> FunctionResult<()> {
    let ok = args.len() >= min && max.is_none_or(|m| args.len() <= m);
    if ok {
        return Ok(());
    }
    let expected = match (min, max) {
        (min, Some(max)) if min == max => format!("{min}"),
        (min, Some(max)) => format!("{min} to {max}"),
        (min, None) => format!("at least {min}"),
    };
    Err(FunctionError::InvalidArity {
        name: name.to_string(),
        expected,
        actual: args.len(),
    })
}

/// Exactly `count` arguments.
pub fn exact(name: &str, args: &[Value], count: usize) -> FunctionResult<()> {
    arity(name, args, count, Some(count))
}

fn invalid(name: &str, index: usize, expected: &str) -> FunctionError {
    FunctionError::InvalidArgument {
        name: name.to_string(),
        index: index + 1,
        expected: expected.to_string(),
    }
}

/// Argument rendered as text; `null` renders empty.
pub fn string(name: &str, args: &[Value], index: usize) -> FunctionResult<String> {
    args.get(index)
        .map(Value::render)
        .ok_or_else(|| invalid(name, index, "a string"))
}

/// Text argument that may be omitted or passed as `null`.
pub fn optional_string(name: &str, args: &[Value], index: usize) -> FunctionResult<Option<String>> {
    let _ = name;
    match args.get(index) {
        None | Some(Value::Empty) => Ok(None),
        Some(v) => Ok(Some(v.render())),
    }
}

pub fn integer(name: &str, args: &[Value], index: usize) -> FunctionResult<i64> {
    args.get(index)
        .and_then(Value::to_i64)
        .ok_or_else(|| invalid(name, index, "an integer"))
}

pub fn optional_integer(name: &str, args: &[Value], index: usize) -> FunctionResult<Option<i64>> {
    match args.get(index) {
        None | Some(Value::Empty) => Ok(None),
        Some(v) => v
            .to_i64()
            .map(Some)
            .ok_or_else(|| invalid(name, index, "an integer")),
    }
}

/// Non-negative integer narrowed to `usize`, for indexes and counts.
pub fn index(name: &str, args: &[Value], position: usize) -> FunctionResult<usize> {
    let value = integer(name, args, position)?;
    usize::try_from(value).map_err(|_| invalid(name, position, "a non-negative integer"))
}

pub fn double(name: &str, args: &[Value], index: usize) -> FunctionResult<f64> {
    args.get(index)
        .and_then(Value::to_f64)
        .ok_or_else(|| invalid(name, index, "a number"))
}

pub fn boolean(name: &str, args: &[Value], index: usize) -> FunctionResult<bool> {
    args.get(index)
        .and_then(Value::to_bool)
        .ok_or_else(|| invalid(name, index, "a boolean"))
}

/// Version argument; string content is parsed with decoration
/// stripping, and failures carry the literal for the error message.
pub fn version(name: &str, args: &[Value], index: usize) -> FunctionResult<Version> {
    let value = args.get(index).ok_or_else(|| invalid(name, index, "a version"))?;
    value.to_version().ok_or_else(|| FunctionError::InvalidVersion {
        literal: value.render(),
    })
}

/// A single character, given as a one-character string.
pub fn character(name: &str, args: &[Value], index: usize) -> FunctionResult<char> {
    let text = string(name, args, index)?;
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(invalid(name, index, "a single character")),
    }
}

/// How string comparisons treat case. Culture-sensitive modes collapse
/// onto their ordinal equivalents; evaluation is culture-invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringComparison {
    #[default]
    Ordinal,
    OrdinalIgnoreCase,
}

impl StringComparison {
    pub fn ignores_case(self) -> bool {
        matches!(self, StringComparison::OrdinalIgnoreCase)
    }

    fn parse(text: &str) -> Option<Self> {
        let name = text
            .trim()
            .strip_prefix("StringComparison.")
            .unwrap_or_else(|| text.trim());
        match name {
            "Ordinal" | "CurrentCulture" | "InvariantCulture" => Some(StringComparison::Ordinal),
            "OrdinalIgnoreCase" | "CurrentCultureIgnoreCase" | "InvariantCultureIgnoreCase" => {
                Some(StringComparison::OrdinalIgnoreCase)
            }
            _ => None,
        }
    }
}

/// Comparison-mode argument; absent means [`StringComparison::Ordinal`].
pub fn string_comparison(
    name: &str,
    args: &[Value],
    position: usize,
) -> FunctionResult<StringComparison> {
    match args.get(position) {
        None | Some(Value::Empty) => Ok(StringComparison::default()),
        Some(v) => StringComparison::parse(&v.render())
            .ok_or_else(|| invalid(name, position, "a StringComparison value")),
    }
}

/// Regex option flags, parsed from `IgnoreCase, Multiline` style text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegexFlags {
    pub ignore_case: bool,
    pub multiline: bool,
    pub singleline: bool,
    pub ignore_pattern_whitespace: bool,
}

pub fn regex_flags(name: &str, args: &[Value], position: usize) -> FunctionResult<RegexFlags> {
    let Some(value) = args.get(position) else {
        return Ok(RegexFlags::default());
    };
    let text = value.render();
    let mut flags = RegexFlags::default();
    for part in text.split([',', '|']) {
        let option = part
            .trim()
            .strip_prefix("RegexOptions.")
            .unwrap_or_else(|| part.trim());
        match option {
            "" | "None" => {}
            "IgnoreCase" => flags.ignore_case = true,
            "Multiline" => flags.multiline = true,
            "Singleline" => flags.singleline = true,
            "IgnorePatternWhitespace" => flags.ignore_pattern_whitespace = true,
            // Capture-group bookkeeping options have no effect here.
            "ExplicitCapture" | "Compiled" | "CultureInvariant" => {}
            _ => return Err(invalid(name, position, "a RegexOptions value")),
        }
    }
    Ok(flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_messages() {
        let args = vec![Value::from("a")];
        let err = exact("Substring", &args, 2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Substring takes 2 argument(s) but was given 1"
        );
        let err = arity("Combine", &[], 1, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Combine takes at least 1 argument(s) but was given 0"
        );
        assert!(arity("f", &args, 0, Some(3)).is_ok());
    }

    #[test]
    fn integer_coercion_reports_position() {
        let args = vec![Value::from("x")];
        let err = integer("PadLeft", &args, 0).unwrap_err();
        assert_eq!(err.to_string(), "argument 1 of PadLeft must be an integer");
        assert_eq!(integer("f", &[Value::from(" 7 ")], 0).unwrap(), 7);
    }

    #[test]
    fn comparison_modes_collapse_to_ordinal() {
        let cmp = |s: &str| {
            string_comparison("IndexOf", &[Value::from(s)], 0).unwrap()
        };
        assert_eq!(cmp("Ordinal"), StringComparison::Ordinal);
        assert_eq!(cmp("StringComparison.OrdinalIgnoreCase"), StringComparison::OrdinalIgnoreCase);
        assert_eq!(cmp("CurrentCultureIgnoreCase"), StringComparison::OrdinalIgnoreCase);
        assert_eq!(cmp("InvariantCulture"), StringComparison::Ordinal);
        assert!(string_comparison("IndexOf", &[Value::from("Fancy")], 0).is_err());
        assert_eq!(
            string_comparison("IndexOf", &[], 0).unwrap(),
            StringComparison::Ordinal
        );
    }

    #[test]
    fn regex_flag_lists() {
        let flags = regex_flags(
            "IsMatch",
            &[Value::from("RegexOptions.IgnoreCase, Multiline")],
            0,
        )
        .unwrap();
        assert!(flags.ignore_case);
        assert!(flags.multiline);
        assert!(!flags.singleline);
        assert!(regex_flags("IsMatch", &[Value::from("Bogus")], 0).is_err());
    }

    #[test]
    fn version_argument_failure_keeps_literal() {
        let err = version("VersionEquals", &[Value::from("not.a.version")], 0).unwrap_err();
        assert_eq!(
            err,
            FunctionError::InvalidVersion {
                literal: "not.a.version".into()
            }
        );
    }
}
