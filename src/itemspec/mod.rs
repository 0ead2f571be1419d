//! Item specifications: the `Include`/`Exclude`/`Remove` matcher.
//!
//! A spec such as `a.cs;src/**/*.resx;@(Extra)` splits into fragments
//! of three kinds: plain literals, wildcard patterns and embedded item
//! expressions. Each fragment answers "does this value match me"
//! independently; the spec matches when any fragment does.
//!
//! Fragments resolve lazily. A wildcard fragment matches candidates
//! with its compiled pattern alone and only walks the filesystem when
//! enumeration is actually requested; an item-expression fragment
//! expands its vector on the first query that needs it. Whichever path
//! is hit first resolves the fragment, and the result is cached for
//! the life of the [`ItemSpec`]. Wildcard walks are additionally
//! memoized process-wide, since the same `**` patterns recur across
//! every project in a tree; [`clear_wildcard_cache`] resets that state
//! between filesystem mutations in tests.
//!
//! Matching is always case-insensitive with `/` and `\` interchangeable,
//! regardless of how the underlying filesystem compares names. Escaped
//! wildcards (`%2a`, `%3f`) stay literal: `src/%2a.cs` matches the file
//! actually named `src/*.cs` and nothing else.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use glob::Pattern;
use log::debug;
use once_cell::sync::{Lazy, OnceCell};
use rustc_hash::FxHashSet;

use crate::model::fs::match_options;
use crate::model::{FileSystem, escaping, paths};
use crate::parser::{split_list, whole_item_reference};

/// Nesting budget when probing whether a fragment is one whole item
/// expression.
const VECTOR_NESTING_LIMIT: usize = 255;

/// Process-wide memo of wildcard walks, keyed by root, pattern and
/// case sensitivity. Two threads may enumerate the same pattern
/// concurrently; the results are identical and either insert may win.
static WILDCARD_CACHE: Lazy<DashMap<(String, String, bool), Arc<Vec<String>>>> =
    Lazy::new(DashMap::new);

/// Drop every memoized wildcard enumeration. Call between mutations of
/// a mock filesystem so later specs see fresh listings.
pub fn clear_wildcard_cache() {
    WILDCARD_CACHE.clear();
}

/// Expands the `@(...)` text of an item-expression fragment into the
/// vector's individual values, in escaped form. The expander
/// implements this; tests substitute a closure.
pub trait VectorResolver: Send + Sync {
    fn resolve_vector(&self, text: &str) -> Vec<String>;
}

impl<F> VectorResolver for F
where
    F: Fn(&str) -> Vec<String> + Send + Sync,
{
    fn resolve_vector(&self, text: &str) -> Vec<String> {
        self(text)
    }
}

/// Resolver for contexts where item expressions cannot occur.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVectors;

impl VectorResolver for NoVectors {
    fn resolve_vector(&self, _text: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Ambient state fragment resolution may need.
#[derive(Clone, Copy)]
pub struct ItemSpecContext<'a> {
    pub fs: &'a dyn FileSystem,
    /// Anchor for relative wildcard patterns.
    pub current_dir: &'a str,
    pub resolver: &'a dyn VectorResolver,
}

/// A parsed item specification.
pub struct ItemSpec<'a> {
    text: String,
    fragments: Vec<SpecFragment>,
    ctx: ItemSpecContext<'a>,
}

/// One semicolon-delimited piece of a spec.
#[derive(Debug)]
pub enum SpecFragment {
    Literal(LiteralFragment),
    Wildcard(WildcardFragment),
    ItemExpression(ItemExpressionFragment),
}

impl SpecFragment {
    /// The fragment as written, escaped.
    pub fn text(&self) -> &str {
        match self {
            SpecFragment::Literal(f) => &f.text,
            SpecFragment::Wildcard(f) => &f.text,
            SpecFragment::ItemExpression(f) => &f.text,
        }
    }
}

/// Plain text; matches only itself.
#[derive(Debug)]
pub struct LiteralFragment {
    text: String,
    /// Unescaped comparison form.
    key: String,
}

/// A `*`/`?`/`**` pattern. Matching runs against the compiled pattern
/// and never touches the disk; enumeration does, once.
#[derive(Debug)]
pub struct WildcardFragment {
    text: String,
    pattern: Pattern,
    files: OnceCell<Arc<Vec<String>>>,
}

/// An embedded `@(...)` expression, expanded on first use.
#[derive(Debug)]
pub struct ItemExpressionFragment {
    text: String,
    values: OnceCell<ResolvedVector>,
}

#[derive(Debug)]
struct ResolvedVector {
    /// Unescaped values in vector order.
    values: Vec<String>,
    /// Comparison forms of the same values.
    keys: FxHashSet<String>,
}

/// One concrete value produced by [`ItemSpec::enumerate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMatch {
    /// Unescaped path or value.
    pub value: String,
    /// Directory text matched by `**`, trailing separator included, for
    /// values found through a recursive wildcard.
    pub recursive_dir: Option<String>,
}

/// Comparison form shared by every fragment kind: separators unified,
/// case folded. Callers pass unescaped text.
fn comparison_key(unescaped: &str) -> String {
    unescaped.replace('\\', "/").to_lowercase()
}

/// Translate an escaped fragment into `glob` syntax. `\` becomes `/`,
/// escaped wildcards decode into character classes so they match
/// literally, `[` and `]` are classed for the same reason, and every
/// other escape decodes to its plain character.
fn glob_text_of(escaped: &str) -> String {
    let bytes = escaped.as_bytes();
    let mut out = String::with_capacity(escaped.len());
    let mut skip_until = 0usize;
    for (i, c) in escaped.char_indices() {
        if i < skip_until {
            continue;
        }
        if c == '%' {
            if let Some(decoded) = escaping::decode_at(bytes, i) {
                push_glob_literal(&mut out, decoded as char);
                skip_until = i + 3;
                continue;
            }
        }
        match c {
            '\\' => out.push('/'),
            '[' | ']' => push_glob_literal(&mut out, c),
            _ => out.push(c),
        }
    }
    out
}

fn push_glob_literal(out: &mut String, c: char) {
    match c {
        '*' | '?' | '[' | ']' => {
            out.push('[');
            out.push(c);
            out.push(']');
        }
        '\\' => out.push('/'),
        _ => out.push(c),
    }
}

impl<'a> ItemSpec<'a> {
    /// Split `spec` on semicolons and classify each piece. Classification
    /// is infallible: pieces that fail to compile as patterns fall back
    /// to literal matching.
    pub fn parse(spec: &str, ctx: ItemSpecContext<'a>) -> Self {
        let fragments = split_list(spec).into_iter().map(classify).collect();
        Self {
            text: spec.to_string(),
            fragments,
            ctx,
        }
    }

    /// The spec as given.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragments(&self) -> &[SpecFragment] {
        &self.fragments
    }

    /// True when any fragment matches `candidate` (unescaped).
    pub fn is_match(&self, candidate: &str) -> bool {
        let key = comparison_key(candidate);
        self.fragments
            .iter()
            .any(|fragment| self.fragment_matches(fragment, &key))
    }

    /// How many fragments match `candidate`; removal diagnostics report
    /// values matched by more than one.
    pub fn matching_fragments(&self, candidate: &str) -> usize {
        let key = comparison_key(candidate);
        self.fragments
            .iter()
            .filter(|fragment| self.fragment_matches(fragment, &key))
            .count()
    }

    fn fragment_matches(&self, fragment: &SpecFragment, key: &str) -> bool {
        match fragment {
            SpecFragment::Literal(lit) => lit.key == key,
            SpecFragment::Wildcard(wild) => {
                wild.pattern.matches_with(key, match_options(false))
            }
            SpecFragment::ItemExpression(expr) => {
                expr.resolved(&self.ctx).keys.contains(key)
            }
        }
    }

    /// Every concrete value the spec denotes: literals verbatim,
    /// wildcard fragments walked (memoized), item expressions expanded.
    /// Literal fragments are never probed against the filesystem; a
    /// literal spec names its file whether or not one exists yet.
    pub fn enumerate(&self) -> Vec<SpecMatch> {
        let mut out = Vec::new();
        for fragment in &self.fragments {
            match fragment {
                SpecFragment::Literal(lit) => out.push(SpecMatch {
                    value: escaping::unescape(&lit.text).into_owned(),
                    recursive_dir: None,
                }),
                SpecFragment::Wildcard(wild) => {
                    for file in wild.files(&self.ctx).iter() {
                        let recursive_dir = wild.recursive_dir_of(file, self.ctx.current_dir);
                        out.push(SpecMatch {
                            value: file.clone(),
                            recursive_dir,
                        });
                    }
                }
                SpecFragment::ItemExpression(expr) => {
                    for value in &expr.resolved(&self.ctx).values {
                        out.push(SpecMatch {
                            value: value.clone(),
                            recursive_dir: None,
                        });
                    }
                }
            }
        }
        out
    }

    /// Flatten into a standalone union matcher. Forces item-expression
    /// fragments to resolve; compiled wildcard patterns are reused.
    pub fn to_glob(&self) -> CompositeGlob {
        let mut keys = FxHashSet::default();
        let mut patterns = Vec::new();
        for fragment in &self.fragments {
            match fragment {
                SpecFragment::Literal(lit) => {
                    keys.insert(lit.key.clone());
                }
                SpecFragment::Wildcard(wild) => patterns.push(wild.pattern.clone()),
                SpecFragment::ItemExpression(expr) => {
                    keys.extend(expr.resolved(&self.ctx).keys.iter().cloned());
                }
            }
        }
        CompositeGlob { keys, patterns }
    }
}

fn classify(piece: &str) -> SpecFragment {
    if piece.starts_with("@(") && whole_item_reference(piece, VECTOR_NESTING_LIMIT).is_some() {
        return SpecFragment::ItemExpression(ItemExpressionFragment {
            text: piece.to_string(),
            values: OnceCell::new(),
        });
    }
    if escaping::has_unescaped_wildcards(piece) {
        if let Ok(pattern) = Pattern::new(&glob_text_of(piece)) {
            return SpecFragment::Wildcard(WildcardFragment {
                text: piece.to_string(),
                pattern,
                files: OnceCell::new(),
            });
        }
        debug!("pattern '{piece}' did not compile; matching it literally");
    }
    SpecFragment::Literal(LiteralFragment {
        key: comparison_key(&escaping::unescape(piece)),
        text: piece.to_string(),
    })
}

impl WildcardFragment {
    /// The compiled pattern text, `/`-separated.
    pub fn pattern_text(&self) -> &str {
        self.pattern.as_str()
    }

    fn files(&self, ctx: &ItemSpecContext<'_>) -> &Arc<Vec<String>> {
        self.files.get_or_init(|| {
            let pattern = self.pattern.as_str();
            let root = if paths::is_rooted(pattern) {
                ""
            } else {
                ctx.current_dir
            };
            cached_enumeration(ctx.fs, root, pattern)
        })
    }

    /// Directory text matched by `**` for a path this fragment
    /// enumerated; `None` for non-recursive patterns.
    fn recursive_dir_of(&self, matched: &str, current_dir: &str) -> Option<String> {
        let pattern = self.pattern.as_str();
        if !pattern.contains("**") {
            return None;
        }
        // Fixed prefix: pattern text before the first metacharacter,
        // cut back to the last separator.
        let meta = pattern.find(['*', '?', '[']).unwrap_or(pattern.len());
        let fixed = match pattern[..meta].rfind('/') {
            Some(i) => &pattern[..=i],
            None => "",
        };
        let anchored = if paths::is_rooted(pattern) {
            fixed.to_string()
        } else {
            let mut dir = current_dir.replace('\\', "/");
            if !dir.is_empty() && !dir.ends_with('/') {
                dir.push('/');
            }
            format!("{dir}{fixed}")
        };
        let matched = matched.replace('\\', "/");
        let dir_end = matched.rfind('/').map_or(0, |i| i + 1);
        let matched_dir = &matched[..dir_end];
        let head = matched_dir.get(..anchored.len())?;
        if !head.eq_ignore_ascii_case(&anchored) {
            return None;
        }
        Some(matched_dir[anchored.len()..].to_string())
    }
}

fn cached_enumeration(fs: &dyn FileSystem, root: &str, pattern: &str) -> Arc<Vec<String>> {
    let key = (
        root.to_string(),
        pattern.to_string(),
        fs.is_case_sensitive(),
    );
    if let Some(hit) = WILDCARD_CACHE.get(&key) {
        return Arc::clone(hit.value());
    }
    debug!("enumerating '{pattern}' under '{root}'");
    let files: Vec<String> = fs
        .enumerate_files(Path::new(root), pattern)
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    let shared = Arc::new(files);
    WILDCARD_CACHE.insert(key, Arc::clone(&shared));
    shared
}

impl ItemExpressionFragment {
    fn resolved(&self, ctx: &ItemSpecContext<'_>) -> &ResolvedVector {
        self.values.get_or_init(|| {
            debug!("resolving item-expression fragment '{}'", self.text);
            let values: Vec<String> = ctx
                .resolver
                .resolve_vector(&self.text)
                .iter()
                .map(|v| escaping::unescape(v).into_owned())
                .collect();
            let keys = values.iter().map(|v| comparison_key(v)).collect();
            ResolvedVector { values, keys }
        })
    }
}

/// A spec flattened into one reusable union matcher, detached from the
/// context it was built in.
#[derive(Debug, Clone)]
pub struct CompositeGlob {
    keys: FxHashSet<String>,
    patterns: Vec<Pattern>,
}

impl CompositeGlob {
    /// True when any literal, resolved value or pattern matches.
    pub fn is_match(&self, candidate: &str) -> bool {
        let key = comparison_key(candidate);
        self.keys.contains(&key)
            || self
                .patterns
                .iter()
                .any(|p| p.matches_with(&key, match_options(false)))
    }
}
