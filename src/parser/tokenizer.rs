//! Semicolon list tokenizer.
//!
//! Build-file list values are semicolon-delimited, but a `;` inside an
//! item expression (`@(Files, ';')`) belongs to the expression, not the
//! list. The tokenizer walks the text byte by byte, tracking item
//! expression nesting and quoting, and yields trimmed, non-empty
//! top-level segments as subslices of the input. Nothing is allocated;
//! re-creating the tokenizer restarts the walk.

use memchr::memchr;

const QUOTES: [u8; 3] = [b'\'', b'"', b'`'];

/// Iterator over the top-level semicolon-separated segments of a list
/// string.
///
/// Segments are trimmed of surrounding ASCII whitespace; empty
/// segments (doubled or trailing separators) are skipped. Malformed
/// input never fails here: an unterminated `@(` or quote simply runs
/// to the end of the text, and the expression parser reports it later.
#[derive(Debug, Clone)]
pub struct ListTokenizer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> ListTokenizer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    /// Find the end of the segment starting at `self.pos`: the next
    /// `;` outside any item expression, or the end of the text.
    fn segment_end(&self) -> usize {
        let bytes = self.text.as_bytes();
        let mut i = self.pos;
        let mut depth = 0usize;
        let mut quote: Option<u8> = None;

        while i < bytes.len() {
            let b = bytes[i];
            if let Some(q) = quote {
                if b == q {
                    quote = None;
                }
            } else if depth == 0 {
                match b {
                    b';' => return i,
                    b'@' if bytes.get(i + 1) == Some(&b'(') => {
                        depth = 1;
                        i += 1;
                    }
                    _ => {}
                }
            } else {
                match b {
                    b'(' => depth += 1,
                    b')' => depth -= 1,
                    _ if QUOTES.contains(&b) => quote = Some(b),
                    _ => {}
                }
            }
            i += 1;
        }
        bytes.len()
    }
}

impl<'a> Iterator for ListTokenizer<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() {
            let rest = &self.text[self.pos..];
            let end = if memchr(b';', rest.as_bytes()).is_none() {
                // No separator anywhere ahead; the rest is one segment
                // regardless of any item expressions inside it.
                self.text.len()
            } else {
                self.segment_end()
            };
            let token = self.text[self.pos..end].trim();
            self.pos = end + 1;
            if !token.is_empty() {
                return Some(token);
            }
        }
        None
    }
}

/// Split `text` into its top-level segments.
pub fn split_list(text: &str) -> Vec<&str> {
    ListTokenizer::new(text).collect()
}

/// True when `text` has at least one `;` byte. Cheap pre-check before
/// constructing a tokenizer.
#[inline]
pub fn may_be_list(text: &str) -> bool {
    memchr(b';', text.as_bytes()).is_some()
}
