//! Members invoked on intermediate values mid-chain, as in
//! `$(Prop.Substring(0, 3).ToUpper())`.
//!
//! Receivers keep their computed type between steps, so a version
//! produced by `[System.Version]::Parse` exposes version members while
//! everything string-shaped gets the string surface. All indexes and
//! lengths are measured in characters, not bytes.

use std::cmp::Ordering;

use crate::model::{Value, Version};
use crate::registry::args::{self, StringComparison};
use crate::registry::error::{FunctionError, FunctionResult};

/// Dispatch a member access on `receiver`. `operands` is `None` for a
/// property read and `Some` (possibly empty) for a call.
pub fn invoke_member(
    receiver: &Value,
    member: &str,
    operands: Option<&[Value]>,
) -> FunctionResult<Value> {
    match operands {
        None => property(receiver, member),
        Some(operands) => method(receiver, member, operands),
    }
}

/// Evaluate `receiver[index]`.
pub fn index_into(receiver: &Value, index: &Value) -> FunctionResult<Value> {
    let position = index
        .to_i64()
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| FunctionError::evaluation("indexing", "the index must be a non-negative integer"))?;
    match receiver {
        Value::String(s) => s
            .chars()
            .nth(position)
            .map(|c| Value::String(c.to_string()))
            .ok_or_else(|| out_of_range(s, position)),
        Value::Empty => Err(out_of_range("", position)),
        Value::List(items) => items.get(position).cloned().ok_or_else(|| {
            FunctionError::evaluation(
                "indexing",
                format!("index {position} is past the end of a {}-element list", items.len()),
            )
        }),
        other => Err(FunctionError::evaluation(
            "indexing",
            format!("a {} value cannot be indexed", other.type_name()),
        )),
    }
}

fn out_of_range(text: &str, position: usize) -> FunctionError {
    FunctionError::evaluation(
        "indexing",
        format!(
            "index {position} is past the end of a {}-character string",
            text.chars().count()
        ),
    )
}

fn unknown(receiver: &Value, member: &str) -> FunctionError {
    FunctionError::UnknownInstanceMember {
        receiver: receiver.type_name(),
        member: member.to_string(),
    }
}

fn property(receiver: &Value, member: &str) -> FunctionResult<Value> {
    match (receiver, member.to_ascii_lowercase().as_str()) {
        (Value::String(s), "length") => Ok(Value::Integer(s.chars().count() as i64)),
        (Value::Empty, "length") => Ok(Value::Integer(0)),
        (Value::Version(v), "major") => Ok(Value::Integer(v.component_or_unset(0))),
        (Value::Version(v), "minor") => Ok(Value::Integer(v.component_or_unset(1))),
        (Value::Version(v), "build") => Ok(Value::Integer(v.component_or_unset(2))),
        (Value::Version(v), "revision") => Ok(Value::Integer(v.component_or_unset(3))),
        (Value::List(items), "length" | "count") => Ok(Value::Integer(items.len() as i64)),
        _ => Err(unknown(receiver, member)),
    }
}

fn method(receiver: &Value, member: &str, operands: &[Value]) -> FunctionResult<Value> {
    match receiver {
        Value::Version(v) => version_method(*v, member, operands),
        Value::String(text) => string_method(text, member, operands),
        Value::Empty => string_method("", member, operands),
        _ => scalar_method(receiver, member, operands),
    }
}

fn version_method(version: Version, member: &str, operands: &[Value]) -> FunctionResult<Value> {
    let name = member;
    match member.to_ascii_lowercase().as_str() {
        "tostring" => match operands.len() {
            0 => Ok(Value::String(version.to_string())),
            _ => {
                args::exact(name, operands, 1)?;
                let fields = args::index(name, operands, 0)?;
                if fields > version.component_count() {
                    return Err(FunctionError::evaluation(
                        name,
                        format!("the version only has {} component(s)", version.component_count()),
                    ));
                }
                let text = (0..fields)
                    .map(|i| version.component_or_unset(i).to_string())
                    .collect::<Vec<_>>()
                    .join(".");
                Ok(Value::String(text))
            }
        },
        "compareto" => {
            args::exact(name, operands, 1)?;
            let other = args::version(name, operands, 0)?;
            Ok(Value::Integer(match version.cmp(&other) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            }))
        }
        "equals" => {
            args::exact(name, operands, 1)?;
            let matches = operands[0].to_version().is_some_and(|other| other == version);
            Ok(Value::Boolean(matches))
        }
        _ => Err(unknown(&Value::Version(version), member)),
    }
}

fn scalar_method(receiver: &Value, member: &str, operands: &[Value]) -> FunctionResult<Value> {
    let name = member;
    match member.to_ascii_lowercase().as_str() {
        "tostring" if operands.is_empty() => Ok(Value::String(receiver.render())),
        "tostring" => Err(FunctionError::evaluation(name, "format strings are not supported")),
        "equals" => {
            args::exact(name, operands, 1)?;
            Ok(Value::Boolean(receiver.render() == operands[0].render()))
        }
        _ => Err(unknown(receiver, member)),
    }
}

fn string_method(text: &str, member: &str, operands: &[Value]) -> FunctionResult<Value> {
    let name = member;
    match member.to_ascii_lowercase().as_str() {
        "substring" => {
            args::arity(name, operands, 1, Some(2))?;
            let start = args::index(name, operands, 0)?;
            let total = text.chars().count();
            if start > total {
                return Err(past_end(name, start, total));
            }
            let taken: String = if operands.len() == 2 {
                let count = args::index(name, operands, 1)?;
                if start + count > total {
                    return Err(past_end(name, start + count, total));
                }
                text.chars().skip(start).take(count).collect()
            } else {
                text.chars().skip(start).collect()
            };
            Ok(Value::String(taken))
        }
        "indexof" => index_of(name, text, operands, false),
        "lastindexof" => index_of(name, text, operands, true),
        "contains" => {
            let (hay, pat) = folded_pair(name, text, operands)?;
            Ok(Value::Boolean(hay.contains(&pat)))
        }
        "startswith" => {
            let (hay, pat) = folded_pair(name, text, operands)?;
            Ok(Value::Boolean(hay.starts_with(&pat)))
        }
        "endswith" => {
            let (hay, pat) = folded_pair(name, text, operands)?;
            Ok(Value::Boolean(hay.ends_with(&pat)))
        }
        "equals" => {
            let (hay, pat) = folded_pair(name, text, operands)?;
            Ok(Value::Boolean(hay == pat))
        }
        "replace" => {
            args::exact(name, operands, 2)?;
            let old = args::string(name, operands, 0)?;
            if old.is_empty() {
                return Err(FunctionError::evaluation(name, "the string to replace must not be empty"));
            }
            let new = args::string(name, operands, 1)?;
            Ok(Value::String(text.replace(&old, &new)))
        }
        "toupper" | "toupperinvariant" => {
            args::exact(name, operands, 0)?;
            Ok(Value::String(text.to_uppercase()))
        }
        "tolower" | "tolowerinvariant" => {
            args::exact(name, operands, 0)?;
            Ok(Value::String(text.to_lowercase()))
        }
        kind @ ("trim" | "trimstart" | "trimend") => {
            let set: Vec<char> = operands
                .iter()
                .filter(|v| !matches!(v, Value::Empty))
                .flat_map(|v| v.render().chars().collect::<Vec<_>>())
                .collect();
            let keep = |c: char| set.contains(&c);
            let trimmed = match (kind, set.is_empty()) {
                ("trim", true) => text.trim(),
                ("trim", false) => text.trim_matches(keep),
                ("trimstart", true) => text.trim_start(),
                ("trimstart", false) => text.trim_start_matches(keep),
                ("trimend", true) => text.trim_end(),
                _ => text.trim_end_matches(keep),
            };
            Ok(Value::String(trimmed.to_string()))
        }
        "padleft" | "padright" => {
            args::arity(name, operands, 1, Some(2))?;
            let width = args::index(name, operands, 0)?;
            let pad = if operands.len() == 2 {
                args::character(name, operands, 1)?
            } else {
                ' '
            };
            let current = text.chars().count();
            if current >= width {
                return Ok(Value::String(text.to_string()));
            }
            let filler: String = std::iter::repeat_n(pad, width - current).collect();
            let padded = if member.eq_ignore_ascii_case("padleft") {
                format!("{filler}{text}")
            } else {
                format!("{text}{filler}")
            };
            Ok(Value::String(padded))
        }
        "split" => {
            let separators: Vec<char> = operands
                .iter()
                .filter(|v| !matches!(v, Value::Empty))
                .flat_map(|v| v.render().chars().collect::<Vec<_>>())
                .collect();
            let parts: Vec<Value> = if separators.is_empty() {
                text.split(|c: char| c.is_whitespace())
                    .map(|s| Value::String(s.to_string()))
                    .collect()
            } else {
                text.split(|c: char| separators.contains(&c))
                    .map(|s| Value::String(s.to_string()))
                    .collect()
            };
            Ok(Value::List(parts))
        }
        "insert" => {
            args::exact(name, operands, 2)?;
            let at = args::index(name, operands, 0)?;
            let value = args::string(name, operands, 1)?;
            let total = text.chars().count();
            if at > total {
                return Err(past_end(name, at, total));
            }
            let mut out: String = text.chars().take(at).collect();
            out.push_str(&value);
            out.extend(text.chars().skip(at));
            Ok(Value::String(out))
        }
        "remove" => {
            args::arity(name, operands, 1, Some(2))?;
            let start = args::index(name, operands, 0)?;
            let total = text.chars().count();
            if start > total {
                return Err(past_end(name, start, total));
            }
            let kept: String = if operands.len() == 2 {
                let count = args::index(name, operands, 1)?;
                if start + count > total {
                    return Err(past_end(name, start + count, total));
                }
                text.chars()
                    .take(start)
                    .chain(text.chars().skip(start + count))
                    .collect()
            } else {
                text.chars().take(start).collect()
            };
            Ok(Value::String(kept))
        }
        "tostring" if operands.is_empty() => Ok(Value::String(text.to_string())),
        "tostring" => Err(FunctionError::evaluation(name, "format strings are not supported")),
        _ => Err(FunctionError::UnknownInstanceMember {
            receiver: "String",
            member: member.to_string(),
        }),
    }
}

fn past_end(name: &str, position: usize, total: usize) -> FunctionError {
    FunctionError::evaluation(
        name,
        format!("position {position} is past the end of a {total}-character string"),
    )
}

/// Case folding that keeps character positions aligned between the
/// folded and original text, so computed indexes stay valid.
fn fold(text: &str, comparison: StringComparison) -> String {
    if comparison.ignores_case() {
        text.to_ascii_lowercase()
    } else {
        text.to_string()
    }
}

/// `(value[, comparison])` pattern shared by Contains and friends.
fn folded_pair(name: &str, text: &str, operands: &[Value]) -> FunctionResult<(String, String)> {
    args::arity(name, operands, 1, Some(2))?;
    let value = args::string(name, operands, 0)?;
    let comparison = args::string_comparison(name, operands, 1)?;
    Ok((fold(text, comparison), fold(&value, comparison)))
}

/// IndexOf and LastIndexOf share overload resolution: a second
/// argument that parses as an integer is a start position, anything
/// else is a comparison mode, and both may be present in that order.
fn index_of(name: &str, text: &str, operands: &[Value], from_end: bool) -> FunctionResult<Value> {
    args::arity(name, operands, 1, Some(3))?;
    let needle = args::string(name, operands, 0)?;
    let (start, comparison) = match operands.get(1) {
        Some(v) if v.to_i64().is_some() => (
            Some(args::index(name, operands, 1)?),
            args::string_comparison(name, operands, 2)?,
        ),
        _ => {
            args::arity(name, operands, 1, Some(2))?;
            (None, args::string_comparison(name, operands, 1)?)
        }
    };

    let hay = fold(text, comparison);
    let pat = fold(&needle, comparison);
    let total = hay.chars().count();
    if let Some(start) = start {
        if start > total {
            return Err(past_end(name, start, total));
        }
    }

    let found = if from_end {
        // A match may extend past the start position but must begin at
        // or before it.
        let window = match start {
            Some(start) => (start + pat.chars().count()).min(total),
            None => total,
        };
        let end = byte_at_char(&hay, window);
        hay[..end].rfind(&pat).map(|b| hay[..b].chars().count())
    } else {
        let begin = byte_at_char(&hay, start.unwrap_or(0));
        hay[begin..]
            .find(&pat)
            .map(|b| start.unwrap_or(0) + hay[begin..begin + b].chars().count())
    };
    Ok(Value::Integer(found.map_or(-1, |i| i as i64)))
}

/// Byte offset of the character at `position`; callers guarantee the
/// position is within `0..=char count`.
fn byte_at_char(text: &str, position: usize) -> usize {
    if position == 0 {
        return 0;
    }
    text.char_indices()
        .nth(position - 1)
        .map(|(offset, c)| offset + c.len_utf8())
        .unwrap_or(text.len())
}
