//! Separator-agnostic path string manipulation.
//!
//! Build files written on Windows routinely reach evaluation on other
//! platforms, so every decomposition here treats both `/` and `\` as
//! directory separators and works on the string form directly instead
//! of going through [`std::path`]. Paths are composed and normalized
//! with the native separator of the host.

use std::borrow::Cow;
use std::path::MAIN_SEPARATOR;

use thiserror::Error;

/// Upper bound on a path produced or accepted by path-aware operations.
pub const MAX_PATH_LENGTH: usize = 4096;

/// Failure while interpreting a value as a path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The value contains a character that can never appear in a path.
    #[error("the value '{value}' contains invalid path characters")]
    InvalidCharacters {
        /// Offending value, unescaped.
        value: String,
    },

    /// The value exceeds [`MAX_PATH_LENGTH`].
    #[error("the path is {length} characters long, which exceeds the limit of {limit}")]
    TooLong {
        /// Actual length in bytes.
        length: usize,
        /// The configured maximum.
        limit: usize,
    },
}

#[inline]
pub(crate) fn is_separator(b: u8) -> bool {
    b == b'/' || b == b'\\'
}

#[inline]
fn is_separator_char(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Reject values that cannot be paths on any supported platform.
pub fn validate(value: &str) -> Result<(), PathError> {
    if value.len() > MAX_PATH_LENGTH {
        return Err(PathError::TooLong {
            length: value.len(),
            limit: MAX_PATH_LENGTH,
        });
    }
    if value.bytes().any(|b| b < 0x20 || b == b'|') {
        return Err(PathError::InvalidCharacters {
            value: value.to_string(),
        });
    }
    Ok(())
}

fn last_separator(value: &str) -> Option<usize> {
    value.bytes().rposition(is_separator)
}

/// Final path segment: everything after the last separator.
pub fn file_name_of(value: &str) -> &str {
    match last_separator(value) {
        Some(i) => &value[i + 1..],
        None => value,
    }
}

/// Directory part of `value`, without a trailing separator unless the
/// result is a filesystem root (`/`, `C:\`).
///
/// Returns the empty string when `value` has no directory part or is
/// itself a root.
pub fn directory_name_of(value: &str) -> &str {
    let Some(i) = last_separator(value) else {
        return "";
    };
    if i + 1 == value.len() && root_of(value).len() == value.len() {
        // The value is exactly a root; it has no parent directory.
        return "";
    }
    let dir = &value[..i];
    if dir.is_empty() || dir.ends_with(':') {
        // Keep the separator so roots stay roots: "/x" -> "/",
        // "C:\x" -> "C:\".
        &value[..=i]
    } else {
        dir
    }
}

/// Extension of the final segment including the dot, or `""`.
pub fn extension_of(value: &str) -> &str {
    let name = file_name_of(value);
    match name.rfind('.') {
        Some(i) if i + 1 < name.len() => &name[i..],
        _ => "",
    }
}

/// Final segment with its extension removed.
pub fn file_stem_of(value: &str) -> &str {
    let name = file_name_of(value);
    match name.rfind('.') {
        Some(i) => &name[..i],
        None => name,
    }
}

/// Root prefix of `value`: `/`, `C:\`, `C:/` or a `\\server\share\`
/// UNC root. Returns `""` for relative paths.
pub fn root_of(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 && is_separator(bytes[0]) && is_separator(bytes[1]) {
        // UNC: the root spans the server and share names.
        let mut seps = 0;
        for (i, &b) in bytes.iter().enumerate().skip(2) {
            if is_separator(b) {
                seps += 1;
                if seps == 2 {
                    return &value[..=i];
                }
            }
        }
        return value;
    }
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        if bytes.len() >= 3 && is_separator(bytes[2]) {
            return &value[..3];
        }
        return &value[..2];
    }
    if !bytes.is_empty() && is_separator(bytes[0]) {
        return &value[..1];
    }
    ""
}

/// True when `value` starts with a root prefix.
pub fn is_rooted(value: &str) -> bool {
    !root_of(value).is_empty()
}

/// Join `base` and `suffix` with the native separator. A rooted
/// `suffix` replaces `base` entirely.
pub fn combine(base: &str, suffix: &str) -> String {
    if is_rooted(suffix) || base.is_empty() {
        return suffix.to_string();
    }
    if suffix.is_empty() {
        return base.to_string();
    }
    let mut out = String::with_capacity(base.len() + suffix.len() + 1);
    out.push_str(base);
    if !out.ends_with(is_separator_char) {
        out.push(MAIN_SEPARATOR);
    }
    out.push_str(suffix);
    out
}

/// Fold any number of segments through [`combine`].
pub fn combine_all<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for segment in segments {
        out = combine(&out, segment);
    }
    out
}

/// Append the native separator when `value` does not already end with
/// one. Empty input stays empty.
pub fn ensure_trailing_slash(value: &str) -> Cow<'_, str> {
    if value.is_empty() || value.ends_with(is_separator_char) {
        Cow::Borrowed(value)
    } else {
        let mut out = String::with_capacity(value.len() + 1);
        out.push_str(value);
        out.push(MAIN_SEPARATOR);
        Cow::Owned(out)
    }
}

/// Lexically normalize `value`: native separators, duplicate separators
/// collapsed, `.` segments dropped and `..` segments resolved against
/// their parent where one exists.
pub fn normalize(value: &str) -> String {
    let root = root_of(value);
    let rest = &value[root.len()..];
    let had_trailing = rest.ends_with(is_separator_char);

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split(is_separator_char) {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(&s) if s != "..") {
                    segments.pop();
                } else if root.is_empty() {
                    // Relative paths keep leading "..", rooted paths
                    // cannot climb above their root.
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let mut out = String::with_capacity(value.len());
    for c in root.chars() {
        if c == '/' || c == '\\' {
            out.push(MAIN_SEPARATOR);
        } else {
            out.push(c);
        }
    }
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 || (!out.is_empty() && !out.ends_with(MAIN_SEPARATOR)) {
            out.push(MAIN_SEPARATOR);
        }
        out.push_str(segment);
    }
    if had_trailing && !segments.is_empty() {
        out.push(MAIN_SEPARATOR);
    }
    if out.is_empty() {
        out.push('.');
    }
    out
}

/// Resolve `value` against `base_dir` when relative, then normalize.
pub fn absolutize(base_dir: &str, value: &str) -> String {
    if is_rooted(value) {
        normalize(value)
    } else {
        normalize(&combine(base_dir, value))
    }
}

/// Lexical relative path from `base` to `target`.
///
/// Segment comparison ignores ASCII case so Windows-style paths behave
/// the same everywhere. Paths with different roots cannot be made
/// relative; the normalized `target` is returned instead. Identical
/// paths yield `"."`.
pub fn make_relative(base: &str, target: &str) -> String {
    let base_norm = normalize(base);
    let target_norm = normalize(target);
    let base_root = root_of(&base_norm);
    let target_root = root_of(&target_norm);
    if !base_root.eq_ignore_ascii_case(target_root) {
        return target_norm;
    }

    let had_trailing = target.ends_with(is_separator_char);
    let base_segs: Vec<&str> = split_segments(&base_norm[base_root.len()..]);
    let target_segs: Vec<&str> = split_segments(&target_norm[target_root.len()..]);

    let mut common = 0usize;
    while common < base_segs.len()
        && common < target_segs.len()
        && base_segs[common].eq_ignore_ascii_case(target_segs[common])
    {
        common += 1;
    }

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..base_segs.len() {
        parts.push("..");
    }
    parts.extend(&target_segs[common..]);

    if parts.is_empty() {
        return ".".to_string();
    }
    let mut out = parts.join(&MAIN_SEPARATOR.to_string());
    if had_trailing {
        out.push(MAIN_SEPARATOR);
    }
    out
}

fn split_segments(value: &str) -> Vec<&str> {
    value
        .split(is_separator_char)
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}
