//! `%XX` escaping for expression-significant characters.
//!
//! Values flow through the expander in *escaped* form: any character
//! that would otherwise be parsed as expression syntax (`$`, `@`, `%`,
//! parentheses, semicolons, quotes and wildcard characters) is encoded
//! as a percent sign followed by two hex digits, e.g. `;` becomes
//! `%3b`. Escaping a value and then expanding it is therefore a no-op,
//! which is how literal semicolons survive list splitting and literal
//! `*` survives glob matching. Unescaping happens exactly once, at the
//! very end of evaluation.

use std::borrow::Cow;

use memchr::memchr;

/// Characters that carry syntactic meaning and must be hex-encoded.
const CHARS_TO_ESCAPE: &[u8] = b"%*?@$();'";

#[inline]
fn needs_escape(b: u8) -> bool {
    CHARS_TO_ESCAPE.contains(&b)
}

#[inline]
fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Escape every expression-significant character in `value` as `%XX`.
///
/// Returns the input unchanged (borrowed) when nothing needs escaping.
pub fn escape(value: &str) -> Cow<'_, str> {
    let bytes = value.as_bytes();
    let first = match bytes.iter().position(|&b| needs_escape(b)) {
        Some(i) => i,
        None => return Cow::Borrowed(value),
    };

    let mut out = String::with_capacity(value.len() + 8);
    out.push_str(&value[..first]);
    for c in value[first..].chars() {
        if c.is_ascii() && needs_escape(c as u8) {
            let b = c as u8;
            // Lowercase hex, matching the historical on-disk form.
            out.push('%');
            out.push(char::from_digit((b >> 4) as u32, 16).unwrap_or('0'));
            out.push(char::from_digit((b & 0xf) as u32, 16).unwrap_or('0'));
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Decode every `%XX` hex pair in `value` back to its character.
///
/// Both hex digit cases are accepted. A `%` not followed by two hex
/// digits is kept verbatim. Returns the input unchanged (borrowed) when
/// it contains no decodable sequence.
pub fn unescape(value: &str) -> Cow<'_, str> {
    let bytes = value.as_bytes();
    let mut search_from = 0usize;
    let first = loop {
        match memchr(b'%', &bytes[search_from..]) {
            Some(rel) => {
                let i = search_from + rel;
                if decode_at(bytes, i).is_some() {
                    break i;
                }
                search_from = i + 1;
            }
            None => return Cow::Borrowed(value),
        }
    };

    let mut out = String::with_capacity(value.len());
    out.push_str(&value[..first]);
    let mut i = first;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(decoded) = decode_at(bytes, i) {
                out.push(decoded as char);
                i += 3;
                continue;
            }
        }
        let ch_len = utf8_len(bytes[i]);
        out.push_str(&value[i..i + ch_len]);
        i += ch_len;
    }
    Cow::Owned(out)
}

/// Decode the two hex digits following `bytes[i]`, if present.
#[inline]
pub(crate) fn decode_at(bytes: &[u8], i: usize) -> Option<u8> {
    if i + 2 >= bytes.len() {
        return None;
    }
    let hi = hex_value(bytes[i + 1])?;
    let lo = hex_value(bytes[i + 2])?;
    Some(hi << 4 | lo)
}

#[inline]
fn utf8_len(first_byte: u8) -> usize {
    match first_byte {
        b if b < 0x80 => 1,
        b if b & 0xe0 == 0xc0 => 2,
        b if b & 0xf0 == 0xe0 => 3,
        _ => 4,
    }
}

/// True when `value` contains an unescaped `*` or `?` wildcard.
pub fn has_unescaped_wildcards(value: &str) -> bool {
    memchr::memchr2(b'*', b'?', value.as_bytes()).is_some()
}

/// True when `value` contains an escaped wildcard (`%2a` or `%3f`).
///
/// Escaped wildcards mark spots the user explicitly opted out of glob
/// matching, so spec classification treats them as literal text.
pub fn has_escaped_wildcards(value: &str) -> bool {
    let bytes = value.as_bytes();
    let mut from = 0usize;
    while let Some(rel) = memchr(b'%', &bytes[from..]) {
        let i = from + rel;
        if let Some(decoded) = decode_at(bytes, i) {
            if decoded == b'*' || decoded == b'?' {
                return true;
            }
        }
        from = i + 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_leaves_plain_text_borrowed() {
        let input = "plain text with spaces";
        let out = escape(input);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, input);
    }

    #[test]
    fn escape_encodes_every_special_character() {
        assert_eq!(escape("a;b"), "a%3bb");
        assert_eq!(escape("$(P)"), "%24%28P%29");
        assert_eq!(escape("@('x')"), "%40%28%27x%27%29");
        assert_eq!(escape("*?%"), "%2a%3f%25");
    }

    #[test]
    fn unescape_decodes_both_hex_cases() {
        assert_eq!(unescape("a%3bb"), "a;b");
        assert_eq!(unescape("a%3Bb"), "a;b");
        assert_eq!(unescape("%24%28P%29"), "$(P)");
    }

    #[test]
    fn unescape_keeps_bare_percent() {
        let input = "100% done%";
        let out = unescape(input);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, input);
        assert_eq!(unescape("%zz%4"), "%zz%4");
    }

    #[test]
    fn round_trip_is_identity() {
        let original = "odd;name*with?$(everything)@('%')";
        let escaped = escape(original);
        assert_eq!(unescape(&escaped), original);
    }

    #[test]
    fn escaping_preserves_multibyte_text() {
        assert_eq!(unescape("héllo%3bwörld"), "héllo;wörld");
        assert_eq!(escape("héllo"), "héllo");
        assert_eq!(escape("a;é"), "a%3bé");
        assert_eq!(unescape(&escape("dollar$für€")), "dollar$für€");
    }

    #[test]
    fn wildcard_detection() {
        assert!(has_unescaped_wildcards("src/*.cs"));
        assert!(!has_unescaped_wildcards("src/%2a.cs"));
        assert!(has_escaped_wildcards("src/%2a.cs"));
        assert!(has_escaped_wildcards("file%3F.txt"));
        assert!(!has_escaped_wildcards("src/a.cs"));
    }
}
