//! Recursive-descent parser for expansion references.
//!
//! Three reference shapes share one grammar for names, argument lists
//! and quoting:
//!
//! ```text
//! $(Name)                       $(Name.Member(args...)[i]...)
//! $([Type.Name]::Member(...))   $(Registry:HIVE\Key@Value)
//! %(Name)                       %(ItemType.Name)
//! @(ItemType)                   @(ItemType->Step(...)->'%(T)', 'sep')
//! ```
//!
//! Parsing starts at an already-located `$`, `%` or `@` trigger and
//! stops exactly past the matching close parenthesis, returning the
//! node and the end offset so the caller can resume scanning. Argument
//! text is captured with full balance tracking, then classified: a
//! whole-argument `$()`/`%()` becomes a nested node, text containing
//! triggers becomes a lazily expanded template, anything else is a
//! literal.

use unicode_xid::UnicodeXID;

use super::error::{ParseResult, SyntaxError};
use crate::ast::{
    CallData, Expr, IndexerData, ItemVector, MemberData, MetadataRef, StaticMemberData,
    TransformCall,
};

const QUOTES: [u8; 3] = [b'\'', b'"', b'`'];

/// Parse a `$(...)` reference beginning at `start` (the `$`). Returns
/// the node and the offset just past the closing parenthesis.
pub fn property_reference(text: &str, start: usize, limit: usize) -> ParseResult<(Expr, usize)> {
    let mut parser = ReferenceParser::with(text, start + 2, limit, limit, 0)?;
    let node = parser.parse_property_body(start)?;
    Ok((node, parser.pos))
}

/// Parse a `%(...)` reference beginning at `start` (the `%`).
pub fn metadata_reference(text: &str, start: usize) -> ParseResult<(MetadataRef, usize)> {
    // Metadata references cannot nest, so depth never matters here.
    let mut parser = ReferenceParser::with(text, start + 2, 1, 1, 0)?;
    let node = parser.parse_metadata_body(start)?;
    Ok((node, parser.pos))
}

/// Parse an `@(...)` reference beginning at `start` (the `@`).
pub fn item_reference(text: &str, start: usize, limit: usize) -> ParseResult<(ItemVector, usize)> {
    let mut parser = ReferenceParser::with(text, start + 2, limit, limit, 0)?;
    let node = parser.parse_item_body(start)?;
    Ok((node, parser.pos))
}

/// Parse `text` as exactly one item expression, with nothing but
/// whitespace around it. Returns `None` when the text is anything else.
pub fn whole_item_reference(text: &str, limit: usize) -> Option<ItemVector> {
    let trimmed = text.trim();
    if !trimmed.starts_with("@(") {
        return None;
    }
    match item_reference(trimmed, 0, limit) {
        Ok((vector, end)) if end == trimmed.len() => Some(vector),
        _ => None,
    }
}

/// Offset just past the `)` closing the reference whose trigger sits
/// at `start`. Lenient: unterminated expressions run to the end of the
/// text. Quote- and nesting-aware, same rules as the list tokenizer.
pub(crate) fn skip_reference(text: &str, start: usize) -> usize {
    let bytes = text.as_bytes();
    debug_assert!(matches!(bytes.get(start), Some(b'@' | b'$' | b'%')));
    debug_assert!(bytes.get(start + 1) == Some(&b'('));
    let mut depth = 1usize;
    let mut quote: Option<u8> = None;
    let mut i = start + 2;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
        } else {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return i + 1;
                    }
                }
                _ if QUOTES.contains(&b) => quote = Some(b),
                _ => {}
            }
        }
        i += 1;
    }
    bytes.len()
}

struct ReferenceParser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    /// Remaining nesting budget; reaching zero aborts the parse.
    depth_left: usize,
    /// The configured limit, kept for the error message.
    limit: usize,
    /// Offset of `text` within the original input, so errors from
    /// nested argument parses still point at the right place.
    origin: usize,
}

impl<'a> ReferenceParser<'a> {
    fn with(
        text: &'a str,
        pos: usize,
        depth_left: usize,
        limit: usize,
        origin: usize,
    ) -> ParseResult<Self> {
        if depth_left == 0 {
            return Err(SyntaxError::NestingTooDeep { limit });
        }
        Ok(Self {
            text,
            bytes: text.as_bytes(),
            pos,
            depth_left,
            limit,
            origin,
        })
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    #[inline]
    fn bump(&mut self) {
        self.pos += 1;
    }

    #[inline]
    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: u8) -> ParseResult<()> {
        if self.peek() == Some(expected) {
            self.bump();
            Ok(())
        } else {
            Err(SyntaxError::ExpectedCharacter {
                expected: expected as char,
                position: self.origin + self.pos,
            })
        }
    }

    /// Property, item-type and metadata names: XID identifiers plus
    /// `-`, which XML element names allow.
    fn read_identifier(&mut self) -> ParseResult<String> {
        self.read_name(|c, first| {
            if first {
                UnicodeXID::is_xid_start(c) || c == '_'
            } else {
                UnicodeXID::is_xid_continue(c) || c == '-'
            }
        })
    }

    /// Member (method/property) names follow CLR identifier rules.
    fn read_member_name(&mut self) -> ParseResult<String> {
        self.read_name(|c, first| {
            if first {
                UnicodeXID::is_xid_start(c) || c == '_'
            } else {
                UnicodeXID::is_xid_continue(c)
            }
        })
    }

    fn read_name(&mut self, accepts: impl Fn(char, bool) -> bool) -> ParseResult<String> {
        let start = self.pos;
        let mut chars = self.text[start..].char_indices();
        let mut end = start;
        let mut first = true;
        for (offset, c) in &mut chars {
            if accepts(c, first) {
                end = start + offset + c.len_utf8();
                first = false;
            } else {
                break;
            }
        }
        if end == start {
            let found: String = self.text[start..].chars().take(8).collect();
            return Err(SyntaxError::InvalidIdentifier {
                identifier: found,
                position: self.origin + start,
            });
        }
        self.pos = end;
        Ok(self.text[start..end].to_string())
    }

    // ---- $( ... ) ------------------------------------------------

    fn parse_property_body(&mut self, open: usize) -> ParseResult<Expr> {
        self.skip_ws();
        let node = match self.peek() {
            None => {
                return Err(SyntaxError::UnbalancedParentheses {
                    position: self.origin + open,
                });
            }
            Some(b')') => {
                self.bump();
                return Ok(Expr::Empty);
            }
            Some(b'[') => self.parse_static_reference()?,
            Some(_) => {
                let name_start = self.pos;
                let name = self.read_identifier()?;
                if self.peek() == Some(b':') && name.eq_ignore_ascii_case("registry") {
                    self.bump();
                    return self.parse_registry_body(open);
                }
                if self.peek() == Some(b'(') {
                    return Err(SyntaxError::InvalidFunctionSyntax {
                        message: format!("'{name}' is a property and cannot be invoked"),
                        position: self.origin + name_start,
                    });
                }
                Expr::Property(name)
            }
        };
        let node = self.parse_member_chain(node)?;
        self.leave_property(open)?;
        Ok(node)
    }

    fn leave_property(&mut self, open: usize) -> ParseResult<()> {
        self.skip_ws();
        match self.peek() {
            Some(b')') => {
                self.bump();
                Ok(())
            }
            None => Err(SyntaxError::UnbalancedParentheses {
                position: self.origin + open,
            }),
            Some(_) => Err(SyntaxError::ExpectedCharacter {
                expected: ')',
                position: self.origin + self.pos,
            }),
        }
    }

    /// `[Type.Name]::Member...` — the receiver of a static invocation.
    fn parse_static_reference(&mut self) -> ParseResult<Expr> {
        let bracket = self.pos;
        self.expect(b'[')?;
        let type_start = self.pos;
        let type_name = loop {
            match self.peek() {
                Some(b']') => {
                    let name = self.text[type_start..self.pos].trim();
                    self.bump();
                    break name.to_string();
                }
                Some(_) => self.bump(),
                None => {
                    return Err(SyntaxError::UnbalancedParentheses {
                        position: self.origin + bracket,
                    });
                }
            }
        };
        if !valid_type_name(&type_name) {
            return Err(SyntaxError::InvalidFunctionSyntax {
                message: format!("'[{type_name}]' is not a valid type name"),
                position: self.origin + bracket,
            });
        }

        if self.peek() != Some(b':') || self.bytes.get(self.pos + 1) != Some(&b':') {
            return Err(SyntaxError::InvalidFunctionSyntax {
                message: "expected '::' after the type name".to_string(),
                position: self.origin + self.pos,
            });
        }
        self.pos += 2;

        let member_start = self.pos;
        let member = self.read_member_name()?;
        self.skip_ws();
        if member == "new" {
            if self.peek() != Some(b'(') {
                return Err(SyntaxError::InvalidFunctionSyntax {
                    message: "expected an argument list after 'new'".to_string(),
                    position: self.origin + member_start,
                });
            }
            let args = self.parse_args()?;
            return Ok(Expr::Constructor(Box::new(CallData {
                type_name,
                name: member,
                args,
            })));
        }
        if self.peek() == Some(b'(') {
            let args = self.parse_args()?;
            Ok(Expr::StaticCall(Box::new(CallData {
                type_name,
                name: member,
                args,
            })))
        } else {
            Ok(Expr::StaticProperty(Box::new(StaticMemberData {
                type_name,
                name: member,
            })))
        }
    }

    /// Zero or more `.Member(...)` / `[index]` suffixes. Stops (without
    /// consuming) at the closing parenthesis.
    fn parse_member_chain(&mut self, mut receiver: Expr) -> ParseResult<Expr> {
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'.') => {
                    self.bump();
                    self.skip_ws();
                    let name = self.read_member_name()?;
                    self.skip_ws();
                    let args = if self.peek() == Some(b'(') {
                        Some(self.parse_args()?)
                    } else {
                        None
                    };
                    receiver = Expr::Member(Box::new(MemberData {
                        receiver,
                        name,
                        args,
                    }));
                }
                Some(b'[') => {
                    let bracket = self.pos;
                    self.bump();
                    let index = self.parse_index(bracket)?;
                    receiver = Expr::Indexer(Box::new(IndexerData { receiver, index }));
                }
                _ => return Ok(receiver),
            }
        }
    }

    fn parse_index(&mut self, bracket: usize) -> ParseResult<Expr> {
        self.skip_ws();
        let start = self.pos;
        let mut paren_depth = 0usize;
        let mut bracket_depth = 0usize;
        loop {
            match self.peek() {
                None => {
                    return Err(SyntaxError::MalformedIndexer {
                        position: self.origin + bracket,
                    });
                }
                Some(b']') if bracket_depth == 0 => break,
                Some(b'[') => {
                    bracket_depth += 1;
                    self.bump();
                }
                Some(b']') => {
                    bracket_depth -= 1;
                    self.bump();
                }
                Some(b'(') => {
                    paren_depth += 1;
                    self.bump();
                }
                Some(b')') => {
                    if paren_depth == 0 {
                        return Err(SyntaxError::MalformedIndexer {
                            position: self.origin + bracket,
                        });
                    }
                    paren_depth -= 1;
                    self.bump();
                }
                Some(q) if QUOTES.contains(&q) => self.skip_quoted()?,
                Some(_) => self.bump(),
            }
        }
        let raw = self.text[start..self.pos].trim();
        self.bump(); // the ']'
        if raw.is_empty() {
            return Err(SyntaxError::MalformedIndexer {
                position: self.origin + bracket,
            });
        }
        self.classify_raw_argument(raw, start)
    }

    // ---- argument lists ------------------------------------------

    /// Parse `( a, b, ... )` with the cursor on the opening `(`.
    fn parse_args(&mut self) -> ParseResult<Vec<Expr>> {
        let open = self.pos;
        self.expect(b'(')?;
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b')') {
            self.bump();
            return Ok(args);
        }
        loop {
            args.push(self.parse_argument()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.bump();
                }
                Some(b')') => {
                    self.bump();
                    return Ok(args);
                }
                None => {
                    return Err(SyntaxError::UnbalancedParentheses {
                        position: self.origin + open,
                    });
                }
                Some(_) => {
                    return Err(SyntaxError::ExpectedCharacter {
                        expected: ',',
                        position: self.origin + self.pos,
                    });
                }
            }
        }
    }

    fn parse_argument(&mut self) -> ParseResult<Expr> {
        self.skip_ws();
        match self.peek() {
            Some(q) if QUOTES.contains(&q) => {
                let inner = self.read_quoted()?;
                Ok(classify_quoted(inner))
            }
            Some(b',') | Some(b')') | None => Err(SyntaxError::EmptyExpression {
                position: self.origin + self.pos,
            }),
            Some(_) => {
                let start = self.pos;
                let raw = self.capture_balanced_argument()?;
                self.classify_raw_argument(raw, start)
            }
        }
    }

    /// Raw argument text up to the next top-level `,` or `)`. Nested
    /// parentheses, brackets and quoted strings are skipped whole.
    fn capture_balanced_argument(&mut self) -> ParseResult<&'a str> {
        let start = self.pos;
        let mut paren_depth = 0usize;
        let mut bracket_depth = 0usize;
        loop {
            match self.peek() {
                None => break,
                Some(b',') if paren_depth == 0 && bracket_depth == 0 => break,
                Some(b')') => {
                    if paren_depth == 0 {
                        break;
                    }
                    paren_depth -= 1;
                    self.bump();
                }
                Some(b'(') => {
                    paren_depth += 1;
                    self.bump();
                }
                Some(b'[') => {
                    bracket_depth += 1;
                    self.bump();
                }
                Some(b']') => {
                    if bracket_depth == 0 {
                        break;
                    }
                    bracket_depth -= 1;
                    self.bump();
                }
                Some(q) if QUOTES.contains(&q) => self.skip_quoted()?,
                Some(_) => self.bump(),
            }
        }
        Ok(self.text[start..self.pos].trim_end())
    }

    /// Quoted string with the cursor on the opening quote; returns the
    /// inner text.
    fn read_quoted(&mut self) -> ParseResult<&'a str> {
        let quote_pos = self.pos;
        let quote = self.bytes[quote_pos];
        self.bump();
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == quote {
                let inner = &self.text[start..self.pos];
                self.bump();
                return Ok(inner);
            }
            self.bump();
        }
        Err(SyntaxError::UnterminatedQuote {
            position: self.origin + quote_pos,
        })
    }

    fn skip_quoted(&mut self) -> ParseResult<()> {
        self.read_quoted().map(|_| ())
    }

    /// Decide what an unquoted argument is: the `null` keyword, a
    /// whole nested reference, a template needing expansion, or plain
    /// literal text.
    fn classify_raw_argument(&self, raw: &str, raw_pos: usize) -> ParseResult<Expr> {
        if raw.is_empty() {
            return Err(SyntaxError::EmptyExpression {
                position: self.origin + raw_pos,
            });
        }
        if raw.eq_ignore_ascii_case("null") {
            return Ok(Expr::Null);
        }
        if raw.starts_with("$(") {
            let mut nested = ReferenceParser::with(
                raw,
                2,
                self.depth_left - 1,
                self.limit,
                self.origin + raw_pos,
            )?;
            let node = nested.parse_property_body(0)?;
            if nested.pos == raw.len() {
                return Ok(node);
            }
            return Ok(Expr::Template(raw.to_string()));
        }
        if raw.starts_with("%(") {
            if let Ok((node, end)) = metadata_reference(raw, 0) {
                if end == raw.len() {
                    return Ok(Expr::Metadata(node));
                }
            }
            return Ok(Expr::Template(raw.to_string()));
        }
        Ok(classify_text(raw))
    }

    // ---- $(Registry: ... ) ---------------------------------------

    /// Capture the registry key text through the closing parenthesis.
    /// The key may embed nested `$()` references, resolved at
    /// evaluation time.
    fn parse_registry_body(&mut self, open: usize) -> ParseResult<Expr> {
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => {
                    return Err(SyntaxError::UnbalancedParentheses {
                        position: self.origin + open,
                    });
                }
                Some(b'(') => {
                    depth += 1;
                    self.bump();
                }
                Some(b')') => {
                    if depth == 0 {
                        let key = self.text[start..self.pos].trim().to_string();
                        self.bump();
                        return Ok(Expr::Registry(key));
                    }
                    depth -= 1;
                    self.bump();
                }
                Some(_) => self.bump(),
            }
        }
    }

    // ---- %( ... ) ------------------------------------------------

    fn parse_metadata_body(&mut self, open: usize) -> ParseResult<MetadataRef> {
        self.skip_ws();
        if self.peek() == Some(b')') {
            return Err(SyntaxError::EmptyExpression {
                position: self.origin + open,
            });
        }
        let first = self.read_identifier()?;
        self.skip_ws();
        let node = if self.peek() == Some(b'.') {
            self.bump();
            self.skip_ws();
            let name = self.read_identifier()?;
            self.skip_ws();
            MetadataRef {
                item_type: Some(first),
                name,
            }
        } else {
            MetadataRef {
                item_type: None,
                name: first,
            }
        };
        match self.peek() {
            Some(b')') => {
                self.bump();
                Ok(node)
            }
            None => Err(SyntaxError::UnbalancedParentheses {
                position: self.origin + open,
            }),
            Some(_) => Err(SyntaxError::ExpectedCharacter {
                expected: ')',
                position: self.origin + self.pos,
            }),
        }
    }

    // ---- @( ... ) ------------------------------------------------

    fn parse_item_body(&mut self, open: usize) -> ParseResult<ItemVector> {
        self.skip_ws();
        if self.peek() == Some(b')') {
            return Err(SyntaxError::EmptyExpression {
                position: self.origin + open,
            });
        }
        let item_type = self.read_identifier()?;
        let mut steps = Vec::new();
        let mut separator = None;

        loop {
            self.skip_ws();
            match self.peek() {
                Some(b')') => {
                    self.bump();
                    return Ok(ItemVector {
                        item_type,
                        steps,
                        separator,
                    });
                }
                Some(b'-') if self.bytes.get(self.pos + 1) == Some(&b'>') => {
                    self.pos += 2;
                    steps.push(self.parse_transform_step()?);
                }
                Some(b',') => {
                    self.bump();
                    self.skip_ws();
                    match self.peek() {
                        Some(q) if QUOTES.contains(&q) => {
                            separator = Some(self.read_quoted()?.to_string());
                        }
                        _ => {
                            return Err(SyntaxError::InvalidFunctionSyntax {
                                message: "expected a quoted separator after ','".to_string(),
                                position: self.origin + self.pos,
                            });
                        }
                    }
                    self.skip_ws();
                    self.expect(b')')?;
                    return Ok(ItemVector {
                        item_type,
                        steps,
                        separator,
                    });
                }
                None => {
                    return Err(SyntaxError::UnbalancedParentheses {
                        position: self.origin + open,
                    });
                }
                Some(_) => {
                    return Err(SyntaxError::ExpectedCharacter {
                        expected: ')',
                        position: self.origin + self.pos,
                    });
                }
            }
        }
    }

    fn parse_transform_step(&mut self) -> ParseResult<TransformCall> {
        self.skip_ws();
        match self.peek() {
            Some(q) if QUOTES.contains(&q) => {
                let template = self.read_quoted()?;
                Ok(TransformCall::Template(template.to_string()))
            }
            _ => {
                let name_start = self.pos;
                let name = self.read_member_name()?;
                self.skip_ws();
                if self.peek() != Some(b'(') {
                    return Err(SyntaxError::InvalidFunctionSyntax {
                        message: format!("expected '(' after transform function '{name}'"),
                        position: self.origin + name_start,
                    });
                }
                let args = self.parse_args()?;
                Ok(TransformCall::Function { name, args })
            }
        }
    }
}

fn valid_type_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(c) if UnicodeXID::is_xid_start(c) || c == '_' => {}
                _ => return false,
            }
            chars.all(|c| UnicodeXID::is_xid_continue(c))
        })
}

fn classify_quoted(inner: &str) -> Expr {
    if has_trigger(inner) {
        Expr::Template(inner.to_string())
    } else {
        Expr::Literal(inner.to_string())
    }
}

fn classify_text(raw: &str) -> Expr {
    if has_trigger(raw) {
        Expr::Template(raw.to_string())
    } else {
        Expr::Literal(raw.to_string())
    }
}

fn has_trigger(text: &str) -> bool {
    ["$(", "%(", "@("].iter().any(|t| text.contains(t))
}
