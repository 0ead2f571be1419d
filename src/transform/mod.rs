//! The item transform pipeline behind `@(Type->Step()->Step(), ...)`.
//!
//! A transform chain runs left to right over an ordered sequence of
//! [`TransformRow`]s, each pairing a source item with its current
//! string value. Steps may keep, rewrite, multiply, filter or collapse
//! rows; order is preserved throughout. Row values live in the escaped
//! domain like every other string inside the expander; steps that do
//! path math unescape first and re-escape their results.
//!
//! Two transform shapes are *not* steps here: quoted templates
//! (`->'%(Filename).obj'`) re-enter full expansion per row, and
//! unrecognized function names fall through to string-instance
//! dispatch. Both are driven by the evaluator, which owns the
//! machinery they need.

use std::borrow::Cow;
use std::path::Path;

use rustc_hash::FxHashSet;

use crate::model::{FileSystem, Item, MetadataSource, escaping, is_well_known_metadata, paths};
use crate::parser::split_list;
use crate::registry::{FunctionError, FunctionResult};

/// One (item, value) pair flowing through a transform chain.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRow {
    /// Source item, `None` for synthetic rows such as a `Count` result.
    pub item: Option<Item>,
    /// Current string value, escaped.
    pub value: String,
}

impl TransformRow {
    pub fn new(item: Option<Item>, value: impl Into<String>) -> Self {
        Self {
            item,
            value: value.into(),
        }
    }

    /// Starting row for an item: its escaped include as the value.
    pub fn from_item(item: &Item) -> Self {
        Self {
            item: Some(item.clone()),
            value: item.include_escaped().to_string(),
        }
    }

    /// Synthetic row carrying a computed value with no item binding.
    pub fn synthetic(value: impl Into<String>) -> Self {
        Self {
            item: None,
            value: value.into(),
        }
    }
}

/// Ambient state a transform step may consult.
pub struct TransformContext<'a> {
    pub fs: &'a dyn FileSystem,
    /// Anchor for relative paths during `FullPath`, `Exists` and the
    /// ancestor walk.
    pub current_dir: &'a str,
    /// Item-definition defaults consulted after an item's own table.
    pub defaults: &'a dyn MetadataSource,
}

/// A recognized intrinsic item function, arguments resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformStep {
    Metadata(String),
    DirectoryName,
    DirectoryPath,
    FullPath,
    Filename,
    Extension,
    Identity,
    Distinct,
    DistinctWithCase,
    Reverse,
    Count,
    HasMetadata(String),
    WithMetadataValue(String, String),
    WithoutMetadataValue(String, String),
    AnyHaveMetadataValue(String, String),
    ClearMetadata,
    Combine(Vec<String>),
    Exists,
    GetPathsOfAllDirectoriesAbove,
}

fn expect_args(name: &str, args: &[String], count: usize) -> FunctionResult<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(FunctionError::InvalidArity {
            name: name.to_string(),
            expected: count.to_string(),
            actual: args.len(),
        })
    }
}

impl TransformStep {
    /// Map a transform-function name and its already-expanded argument
    /// strings to a step. `Ok(None)` means the name is not an intrinsic
    /// item function and should fall through to string dispatch.
    pub fn resolve(name: &str, args: &[String]) -> FunctionResult<Option<TransformStep>> {
        let step = match name.to_ascii_lowercase().as_str() {
            "metadata" => {
                expect_args(name, args, 1)?;
                TransformStep::Metadata(args[0].clone())
            }
            "directoryname" => {
                expect_args(name, args, 0)?;
                TransformStep::DirectoryName
            }
            "directorypath" => {
                expect_args(name, args, 0)?;
                TransformStep::DirectoryPath
            }
            "fullpath" => {
                expect_args(name, args, 0)?;
                TransformStep::FullPath
            }
            "filename" => {
                expect_args(name, args, 0)?;
                TransformStep::Filename
            }
            "extension" => {
                expect_args(name, args, 0)?;
                TransformStep::Extension
            }
            "identity" => {
                expect_args(name, args, 0)?;
                TransformStep::Identity
            }
            "distinct" => {
                expect_args(name, args, 0)?;
                TransformStep::Distinct
            }
            "distinctwithcase" => {
                expect_args(name, args, 0)?;
                TransformStep::DistinctWithCase
            }
            "reverse" => {
                expect_args(name, args, 0)?;
                TransformStep::Reverse
            }
            "count" => {
                expect_args(name, args, 0)?;
                TransformStep::Count
            }
            "hasmetadata" => {
                expect_args(name, args, 1)?;
                TransformStep::HasMetadata(args[0].clone())
            }
            "withmetadatavalue" => {
                expect_args(name, args, 2)?;
                TransformStep::WithMetadataValue(args[0].clone(), args[1].clone())
            }
            "withoutmetadatavalue" => {
                expect_args(name, args, 2)?;
                TransformStep::WithoutMetadataValue(args[0].clone(), args[1].clone())
            }
            "anyhavemetadatavalue" => {
                expect_args(name, args, 2)?;
                TransformStep::AnyHaveMetadataValue(args[0].clone(), args[1].clone())
            }
            "clearmetadata" => {
                expect_args(name, args, 0)?;
                TransformStep::ClearMetadata
            }
            "combine" => {
                if args.is_empty() {
                    return Err(FunctionError::InvalidArity {
                        name: name.to_string(),
                        expected: "at least 1".to_string(),
                        actual: 0,
                    });
                }
                TransformStep::Combine(args.to_vec())
            }
            "exists" => {
                expect_args(name, args, 0)?;
                TransformStep::Exists
            }
            "getpathsofalldirectoriesabove" => {
                expect_args(name, args, 0)?;
                TransformStep::GetPathsOfAllDirectoriesAbove
            }
            _ => return Ok(None),
        };
        Ok(Some(step))
    }

    /// Run this step over `rows`.
    pub fn apply(
        &self,
        rows: Vec<TransformRow>,
        ctx: &TransformContext<'_>,
    ) -> FunctionResult<Vec<TransformRow>> {
        match self {
            TransformStep::Metadata(name) => metadata_step(rows, name, ctx),
            TransformStep::DirectoryName => {
                map_path(rows, |value| Ok(paths::directory_name_of(value).to_string()))
            }
            TransformStep::DirectoryPath => map_path(rows, |value| {
                let full = paths::absolutize(ctx.current_dir, value);
                Ok(paths::directory_name_of(&full).to_string())
            }),
            TransformStep::FullPath => {
                map_path(rows, |value| Ok(paths::absolutize(ctx.current_dir, value)))
            }
            TransformStep::Filename => {
                map_path(rows, |value| Ok(paths::file_stem_of(value).to_string()))
            }
            TransformStep::Extension => {
                map_path(rows, |value| Ok(paths::extension_of(value).to_string()))
            }
            TransformStep::Identity => Ok(rows),
            TransformStep::Distinct => Ok(distinct(rows, false)),
            TransformStep::DistinctWithCase => Ok(distinct(rows, true)),
            TransformStep::Reverse => {
                let mut rows = rows;
                rows.reverse();
                Ok(rows)
            }
            TransformStep::Count => Ok(vec![TransformRow::synthetic(rows.len().to_string())]),
            TransformStep::HasMetadata(name) => {
                let mut kept = Vec::with_capacity(rows.len());
                for row in rows {
                    let has = match &row.item {
                        Some(item) => {
                            is_well_known_metadata(name)
                                || item.custom_metadata(name).is_some()
                                || ctx.defaults.default_metadata(item.item_type(), name).is_some()
                        }
                        None => false,
                    };
                    if has {
                        kept.push(row);
                    }
                }
                Ok(kept)
            }
            TransformStep::WithMetadataValue(name, wanted) => {
                filter_by_metadata_value(rows, name, wanted, ctx, true)
            }
            TransformStep::WithoutMetadataValue(name, wanted) => {
                filter_by_metadata_value(rows, name, wanted, ctx, false)
            }
            TransformStep::AnyHaveMetadataValue(name, wanted) => {
                let mut any = false;
                for row in &rows {
                    if let Some(item) = &row.item {
                        if metadata_value_matches(item, name, wanted, ctx)? {
                            any = true;
                            break;
                        }
                    }
                }
                // The historical spelling is lowercase, unlike rendered
                // boolean values elsewhere.
                Ok(vec![TransformRow::synthetic(if any { "true" } else { "false" })])
            }
            TransformStep::ClearMetadata => Ok(rows
                .into_iter()
                .map(|mut row| {
                    if let Some(item) = &mut row.item {
                        item.metadata_mut().clear();
                    }
                    row
                })
                .collect()),
            TransformStep::Combine(suffixes) => {
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    let mut combined = escaping::unescape(&row.value).into_owned();
                    paths::validate(&combined)?;
                    for suffix in suffixes {
                        let suffix = escaping::unescape(suffix);
                        paths::validate(&suffix)?;
                        combined = paths::combine(&combined, &suffix);
                    }
                    out.push(TransformRow::new(
                        row.item,
                        escaping::escape(&combined).into_owned(),
                    ));
                }
                Ok(out)
            }
            TransformStep::Exists => {
                let mut kept = Vec::with_capacity(rows.len());
                for row in rows {
                    let value = escaping::unescape(&row.value);
                    if value.is_empty() {
                        continue;
                    }
                    paths::validate(&value)?;
                    let full = paths::absolutize(ctx.current_dir, &value);
                    if ctx.fs.exists(Path::new(&full)) {
                        kept.push(row);
                    }
                }
                Ok(kept)
            }
            TransformStep::GetPathsOfAllDirectoriesAbove => directories_above(rows, ctx),
        }
    }
}

/// Apply `f` to each row's unescaped value, re-escaping the result.
/// Values are validated first so malformed paths fail loudly.
fn map_path(
    rows: Vec<TransformRow>,
    f: impl Fn(&str) -> FunctionResult<String>,
) -> FunctionResult<Vec<TransformRow>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let value = escaping::unescape(&row.value);
        paths::validate(&value)?;
        let mapped = f(&value)?;
        out.push(TransformRow::new(
            row.item,
            escaping::escape(&mapped).into_owned(),
        ));
    }
    Ok(out)
}

fn metadata_step(
    rows: Vec<TransformRow>,
    name: &str,
    ctx: &TransformContext<'_>,
) -> FunctionResult<Vec<TransformRow>> {
    let mut out = Vec::new();
    for row in rows {
        let Some(item) = row.item else {
            continue;
        };
        let value = resolve_metadata(&item, name, ctx)?.unwrap_or_default();
        if value.contains(';') {
            // Multi-valued metadata fans out into one row per entry,
            // in the value's own order.
            for part in split_list(&value) {
                out.push(TransformRow::new(Some(item.clone()), part));
            }
        } else {
            out.push(TransformRow::new(Some(item), value));
        }
    }
    Ok(out)
}

/// Metadata lookup order for transforms: computed well-known values,
/// then the item's own table, then item-definition defaults.
fn resolve_metadata(
    item: &Item,
    name: &str,
    ctx: &TransformContext<'_>,
) -> FunctionResult<Option<String>> {
    if let Some(value) = item.well_known_metadata(name, ctx.fs, ctx.current_dir)? {
        return Ok(Some(value));
    }
    if let Some(value) = item.custom_metadata(name) {
        return Ok(Some(value.to_string()));
    }
    Ok(ctx
        .defaults
        .default_metadata(item.item_type(), name)
        .map(Cow::into_owned))
}

fn metadata_value_matches(
    item: &Item,
    name: &str,
    wanted: &str,
    ctx: &TransformContext<'_>,
) -> FunctionResult<bool> {
    let actual = resolve_metadata(item, name, ctx)?.unwrap_or_default();
    let actual = escaping::unescape(&actual);
    let wanted = escaping::unescape(wanted);
    Ok(actual.to_lowercase() == wanted.to_lowercase())
}

fn filter_by_metadata_value(
    rows: Vec<TransformRow>,
    name: &str,
    wanted: &str,
    ctx: &TransformContext<'_>,
    keep_matches: bool,
) -> FunctionResult<Vec<TransformRow>> {
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows {
        let matches = match &row.item {
            Some(item) => metadata_value_matches(item, name, wanted, ctx)?,
            None => false,
        };
        if matches == keep_matches {
            kept.push(row);
        }
    }
    Ok(kept)
}

fn distinct(rows: Vec<TransformRow>, case_sensitive: bool) -> Vec<TransformRow> {
    let mut seen = FxHashSet::default();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let key = if case_sensitive {
            row.value.clone()
        } else {
            row.value.to_lowercase()
        };
        if seen.insert(key) {
            out.push(row);
        }
    }
    out
}

fn directories_above(
    rows: Vec<TransformRow>,
    ctx: &TransformContext<'_>,
) -> FunctionResult<Vec<TransformRow>> {
    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    for row in rows {
        let value = escaping::unescape(&row.value);
        if value.is_empty() {
            continue;
        }
        paths::validate(&value)?;
        let full = paths::absolutize(ctx.current_dir, &value);
        let mut dir = paths::directory_name_of(&full).to_string();
        while !dir.is_empty() {
            if seen.insert(dir.to_lowercase()) {
                out.push(TransformRow::synthetic(escaping::escape(&dir).into_owned()));
            }
            dir = paths::directory_name_of(&dir).to_string();
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MockFileSystem, ProjectData};

    fn apply(step: TransformStep, rows: Vec<TransformRow>) -> FunctionResult<Vec<TransformRow>> {
        let fs = MockFileSystem::new();
        let defaults = ProjectData::new();
        step.apply(
            rows,
            &TransformContext {
                fs: &fs,
                current_dir: "/proj",
                defaults: &defaults,
            },
        )
    }

    fn values(rows: &[TransformRow]) -> Vec<&str> {
        rows.iter().map(|r| r.value.as_str()).collect()
    }

    fn item_rows(pairs: &[(&str, &[(&str, &str)])]) -> Vec<TransformRow> {
        pairs
            .iter()
            .map(|(include, metadata)| {
                let mut item = Item::new("i", *include);
                for (name, value) in *metadata {
                    item = item.with_metadata(*name, *value);
                }
                TransformRow::from_item(&item)
            })
            .collect()
    }

    #[test]
    fn resolve_recognizes_intrinsics_and_passes_the_rest() {
        let step = TransformStep::resolve("COUNT", &[]).unwrap();
        assert_eq!(step, Some(TransformStep::Count));
        let step = TransformStep::resolve("Metadata", &["Culture".to_string()]).unwrap();
        assert_eq!(step, Some(TransformStep::Metadata("Culture".into())));
        assert_eq!(TransformStep::resolve("ToUpperInvariant", &[]).unwrap(), None);
        assert!(TransformStep::resolve("Count", &["x".to_string()]).is_err());
    }

    #[test]
    fn metadata_then_directory_name_then_distinct() {
        let rows = item_rows(&[
            ("one.cs", &[("Meta0", r"C:\a\b\file.ext")]),
            ("two.cs", &[("Meta0", r"C:\a\b\other.ext")]),
        ]);
        let rows = apply(TransformStep::Metadata("Meta0".into()), rows).unwrap();
        assert_eq!(values(&rows), vec![r"C:\a\b\file.ext", r"C:\a\b\other.ext"]);

        let rows = apply(TransformStep::DirectoryName, rows).unwrap();
        assert_eq!(values(&rows), vec![r"C:\a\b", r"C:\a\b"]);

        let rows = apply(TransformStep::Distinct, rows).unwrap();
        assert_eq!(values(&rows), vec![r"C:\a\b"]);
    }

    #[test]
    fn metadata_with_semicolons_fans_out() {
        let rows = item_rows(&[("x", &[("Refs", "a;b; c;;")])]);
        let rows = apply(TransformStep::Metadata("Refs".into()), rows).unwrap();
        assert_eq!(values(&rows), vec!["a", "b", "c"]);
        // Every fanned-out row keeps its source item.
        assert!(rows.iter().all(|r| r.item.is_some()));
    }

    #[test]
    fn missing_metadata_yields_an_empty_row() {
        let rows = item_rows(&[("x", &[])]);
        let rows = apply(TransformStep::Metadata("Nope".into()), rows).unwrap();
        assert_eq!(values(&rows), vec![""]);
    }

    #[test]
    fn metadata_falls_back_to_item_definitions() {
        let fs = MockFileSystem::new();
        let mut defaults = ProjectData::new();
        defaults.set_item_definition("i", "Culture", "neutral");
        let ctx = TransformContext {
            fs: &fs,
            current_dir: "/proj",
            defaults: &defaults,
        };

        let rows = item_rows(&[("a", &[("Culture", "fr")]), ("b", &[])]);
        let rows = TransformStep::Metadata("Culture".into())
            .apply(rows, &ctx)
            .unwrap();
        assert_eq!(values(&rows), vec!["fr", "neutral"]);
    }

    #[test]
    fn count_counts_and_is_synthetic() {
        let rows = item_rows(&[("foo", &[]), ("bar", &[])]);
        let counted = apply(TransformStep::Count, rows).unwrap();
        assert_eq!(values(&counted), vec!["2"]);
        assert!(counted[0].item.is_none());
        assert_eq!(values(&apply(TransformStep::Count, Vec::new()).unwrap()), vec!["0"]);
    }

    #[test]
    fn distinct_keeps_first_occurrence_case_insensitively() {
        let rows = vec![
            TransformRow::synthetic("A.cs"),
            TransformRow::synthetic("a.CS"),
            TransformRow::synthetic("b.cs"),
            TransformRow::synthetic("A.cs"),
        ];
        let out = apply(TransformStep::Distinct, rows.clone()).unwrap();
        assert_eq!(values(&out), vec!["A.cs", "b.cs"]);
        let with_case = apply(TransformStep::DistinctWithCase, rows).unwrap();
        assert_eq!(values(&with_case), vec!["A.cs", "a.CS", "b.cs"]);
    }

    #[test]
    fn filename_and_extension_decompose_the_current_value() {
        let rows = vec![TransformRow::synthetic("src/deep/prog.g.cs")];
        assert_eq!(
            values(&apply(TransformStep::Filename, rows.clone()).unwrap()),
            vec!["prog.g"]
        );
        assert_eq!(
            values(&apply(TransformStep::Extension, rows).unwrap()),
            vec![".cs"]
        );
    }

    #[test]
    fn metadata_value_filters() {
        let rows = item_rows(&[
            ("a", &[("Culture", "fr")]),
            ("b", &[("Culture", "FR")]),
            ("c", &[("Culture", "en")]),
            ("d", &[]),
        ]);
        let with = apply(
            TransformStep::WithMetadataValue("culture".into(), "fr".into()),
            rows.clone(),
        )
        .unwrap();
        assert_eq!(values(&with), vec!["a", "b"]);

        let without = apply(
            TransformStep::WithoutMetadataValue("culture".into(), "fr".into()),
            rows.clone(),
        )
        .unwrap();
        assert_eq!(values(&without), vec!["c", "d"]);

        let any = apply(
            TransformStep::AnyHaveMetadataValue("Culture".into(), "EN".into()),
            rows.clone(),
        )
        .unwrap();
        assert_eq!(values(&any), vec!["true"]);
        let none = apply(
            TransformStep::AnyHaveMetadataValue("Culture".into(), "de".into()),
            rows,
        )
        .unwrap();
        assert_eq!(values(&none), vec!["false"]);
    }

    #[test]
    fn has_metadata_counts_well_known_names_as_present() {
        let rows = item_rows(&[("a", &[("Culture", "fr")]), ("b", &[])]);
        let custom = apply(TransformStep::HasMetadata("Culture".into()), rows.clone()).unwrap();
        assert_eq!(values(&custom), vec!["a"]);
        let known = apply(TransformStep::HasMetadata("Filename".into()), rows).unwrap();
        assert_eq!(values(&known), vec!["a", "b"]);
    }

    #[test]
    fn clear_metadata_empties_tables_but_keeps_identity() {
        let rows = item_rows(&[("a", &[("Culture", "fr")])]);
        let out = apply(TransformStep::ClearMetadata, rows).unwrap();
        assert_eq!(values(&out), vec!["a"]);
        assert!(out[0].item.as_ref().is_some_and(|i| i.metadata().is_empty()));
    }

    #[test]
    fn combine_appends_path_segments() {
        let rows = vec![TransformRow::synthetic("base")];
        let out = apply(TransformStep::Combine(vec!["sub".into(), "f.txt".into()]), rows).unwrap();
        assert_eq!(out.len(), 1);
        let value = escaping::unescape(&out[0].value).into_owned();
        assert!(value.starts_with("base"));
        assert!(value.ends_with("f.txt"));
        assert!(value.contains("sub"));
    }

    #[test]
    fn exists_filters_against_the_filesystem() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/present.txt");
        let defaults = ProjectData::new();
        let ctx = TransformContext {
            fs: &fs,
            current_dir: "/proj",
            defaults: &defaults,
        };
        let rows = vec![
            TransformRow::synthetic("present.txt"),
            TransformRow::synthetic("ghost.txt"),
            TransformRow::synthetic(""),
        ];
        let out = TransformStep::Exists.apply(rows, &ctx).unwrap();
        assert_eq!(values(&out), vec!["present.txt"]);
    }

    #[test]
    fn directories_above_walks_to_the_root_once() {
        let rows = vec![
            TransformRow::synthetic("/repo/src/a.cs"),
            TransformRow::synthetic("/repo/src/sub/b.cs"),
        ];
        let out = apply(TransformStep::GetPathsOfAllDirectoriesAbove, rows).unwrap();
        assert_eq!(values(&out), vec!["/repo/src", "/repo", "/", "/repo/src/sub"]);
    }

    #[test]
    fn reverse_reverses_order() {
        let rows = vec![TransformRow::synthetic("1"), TransformRow::synthetic("2")];
        let out = apply(TransformStep::Reverse, rows).unwrap();
        assert_eq!(values(&out), vec!["2", "1"]);
    }

    #[test]
    fn invalid_paths_are_hard_errors() {
        let rows = vec![TransformRow::synthetic("bad|path")];
        let err = apply(TransformStep::DirectoryName, rows).unwrap_err();
        assert!(matches!(err, FunctionError::Path(_)));
    }
}
