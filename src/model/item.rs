//! Items: evaluated include strings plus their metadata.

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local};
use dashmap::DashMap;
use indexmap::IndexMap;
use once_cell::sync::Lazy;

use super::escaping;
use super::fs::{FileSystem, FileTimeKind};
use super::paths::{self, PathError};

/// Metadata names computed from the item's include rather than stored.
pub const WELL_KNOWN_METADATA: &[&str] = &[
    "FullPath",
    "RootDir",
    "Filename",
    "Extension",
    "RelativeDir",
    "Directory",
    "RecursiveDir",
    "Identity",
    "ModifiedTime",
    "CreatedTime",
    "AccessedTime",
];

/// True when `name` is one of the computed path/timestamp metadata.
pub fn is_well_known_metadata(name: &str) -> bool {
    WELL_KNOWN_METADATA
        .iter()
        .any(|known| known.eq_ignore_ascii_case(name))
}

/// Ordered, case-insensitive metadata name/value table.
///
/// Names compare without regard to ASCII case but remember the casing
/// they were first written with. Values are stored escaped, like every
/// other string inside the expander. Insertion order is preserved and
/// a re-set keeps the original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataTable {
    entries: IndexMap<String, MetadataEntry>,
}

#[derive(Debug, Clone, PartialEq)]
struct MetadataEntry {
    name: String,
    value: String,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value` (escaped form). Last write wins.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        let value = value.into();
        match self.entries.get_mut(&key) {
            Some(entry) => entry.value = value,
            None => {
                self.entries.insert(key, MetadataEntry { name, value });
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|e| e.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries
            .shift_remove(&name.to_ascii_lowercase())
            .map(|e| e.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name_as_written, escaped_value)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|e| (e.name.as_str(), e.value.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|e| e.name.as_str())
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for MetadataTable {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut table = Self::new();
        for (name, value) in iter {
            table.set(name, value);
        }
        table
    }
}

/// Item-type names repeat across every project in a build, so all
/// items of one type share a single allocation. Safe to populate from
/// concurrent evaluations; [`clear_type_name_interner`] resets it.
static TYPE_NAME_INTERNER: Lazy<DashMap<String, Arc<str>>> = Lazy::new(|| {
    let map = DashMap::new();
    for name in [
        "Compile",
        "Content",
        "None",
        "EmbeddedResource",
        "Reference",
        "ProjectReference",
        "PackageReference",
        "Analyzer",
        "Folder",
        "Using",
    ] {
        map.insert(name.to_string(), Arc::from(name));
    }
    map
});

/// Canonical shared handle for an item-type name. Concurrent interns
/// of the same name converge on one allocation.
pub fn intern_type_name(name: &str) -> Arc<str> {
    if let Some(interned) = TYPE_NAME_INTERNER.get(name) {
        return Arc::clone(&interned);
    }
    // Type names are short identifiers; anything oversized stays out
    // of the shared table.
    if name.len() <= 64 {
        let entry = TYPE_NAME_INTERNER
            .entry(name.to_string())
            .or_insert_with(|| Arc::from(name));
        return Arc::clone(&entry);
    }
    Arc::from(name)
}

/// Empty the shared type-name table. Later interns repopulate it on
/// demand.
pub fn clear_type_name_interner() {
    TYPE_NAME_INTERNER.clear();
}

/// Number of distinct type names currently interned.
pub fn interned_type_name_count() -> usize {
    TYPE_NAME_INTERNER.len()
}

/// One evaluated item: an include string, its metadata and the project
/// directory it resolves paths against.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    item_type: Arc<str>,
    include_escaped: String,
    metadata: MetadataTable,
    /// Directory portion matched by `**` when this item came from a
    /// recursive wildcard; backs the `RecursiveDir` metadata.
    recursive_dir: Option<String>,
    /// Directory of the defining project, shared between all its items.
    project_dir: Option<Arc<str>>,
}

impl Item {
    pub fn new(item_type: impl AsRef<str>, include_escaped: impl Into<String>) -> Self {
        Self {
            item_type: intern_type_name(item_type.as_ref()),
            include_escaped: include_escaped.into(),
            metadata: MetadataTable::new(),
            recursive_dir: None,
            project_dir: None,
        }
    }

    pub fn with_project_dir(mut self, dir: impl Into<Arc<str>>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.set(name, value);
        self
    }

    pub fn with_recursive_dir(mut self, dir: impl Into<String>) -> Self {
        self.recursive_dir = Some(dir.into());
        self
    }

    /// Replace the include string, keeping everything else.
    pub fn with_include_escaped(mut self, include_escaped: impl Into<String>) -> Self {
        self.include_escaped = include_escaped.into();
        self
    }

    /// Copy of this item under another item type. Metadata, recursive
    /// dir and project dir carry over.
    pub fn retyped(&self, item_type: impl AsRef<str>) -> Item {
        Item {
            item_type: intern_type_name(item_type.as_ref()),
            include_escaped: self.include_escaped.clone(),
            metadata: self.metadata.clone(),
            recursive_dir: self.recursive_dir.clone(),
            project_dir: self.project_dir.clone(),
        }
    }

    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    pub fn item_type_arc(&self) -> Arc<str> {
        Arc::clone(&self.item_type)
    }

    /// Include string in escaped form, exactly as evaluated.
    pub fn include_escaped(&self) -> &str {
        &self.include_escaped
    }

    /// Include string with escape sequences decoded.
    pub fn evaluated_include(&self) -> Cow<'_, str> {
        escaping::unescape(&self.include_escaped)
    }

    /// Directory suffix walked by a `**` pattern, when this item came
    /// from a recursive wildcard match.
    pub fn recursive_dir(&self) -> Option<&str> {
        self.recursive_dir.as_deref()
    }

    pub fn project_dir(&self) -> Option<&str> {
        self.project_dir.as_deref()
    }

    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut MetadataTable {
        &mut self.metadata
    }

    /// Stored (custom) metadata only; well-known names are computed by
    /// [`Item::well_known_metadata`] instead.
    pub fn custom_metadata(&self, name: &str) -> Option<&str> {
        self.metadata.get(name)
    }

    /// Compute a well-known metadata value, escaped. Returns `Ok(None)`
    /// when `name` is not a well-known metadata name at all.
    ///
    /// `fallback_dir` anchors relative includes when the item has no
    /// project directory. Timestamp metadata of missing files is the
    /// empty string, not an error.
    pub fn well_known_metadata(
        &self,
        name: &str,
        fs: &dyn FileSystem,
        fallback_dir: &str,
    ) -> Result<Option<String>, PathError> {
        let lower = name.to_ascii_lowercase();
        if lower == "identity" {
            return Ok(Some(self.include_escaped.clone()));
        }
        if lower == "recursivedir" {
            return Ok(Some(self.recursive_dir.clone().unwrap_or_default()));
        }
        if !is_well_known_metadata(name) {
            return Ok(None);
        }

        let include = self.evaluated_include();
        paths::validate(&include)?;
        let anchor = self.project_dir.as_deref().unwrap_or(fallback_dir);

        let value = match lower.as_str() {
            "fullpath" => paths::absolutize(anchor, &include),
            "rootdir" => {
                let full = paths::absolutize(anchor, &include);
                paths::ensure_trailing_slash(paths::root_of(&full)).into_owned()
            }
            "filename" => paths::file_stem_of(&include).to_string(),
            "extension" => paths::extension_of(&include).to_string(),
            "relativedir" => {
                let dir = paths::directory_name_of(&include);
                if dir.is_empty() {
                    String::new()
                } else {
                    paths::ensure_trailing_slash(dir).into_owned()
                }
            }
            "directory" => {
                let full = paths::absolutize(anchor, &include);
                let root = paths::root_of(&full).len();
                let dir = paths::directory_name_of(&full);
                let dir = paths::ensure_trailing_slash(dir);
                dir.get(root..).unwrap_or("").to_string()
            }
            "modifiedtime" | "createdtime" | "accessedtime" => {
                let kind = match lower.as_str() {
                    "modifiedtime" => FileTimeKind::Modified,
                    "createdtime" => FileTimeKind::Created,
                    _ => FileTimeKind::Accessed,
                };
                let full = paths::absolutize(anchor, &include);
                match fs.file_time(Path::new(&full), kind) {
                    Some(time) => format_file_time(time),
                    None => String::new(),
                }
            }
            _ => unreachable!("covered by is_well_known_metadata"),
        };
        Ok(Some(escaping::escape(&value).into_owned()))
    }
}

/// Timestamps render with a seven-digit fractional second, matching
/// the historical output format consumers parse.
fn format_file_time(time: std::time::SystemTime) -> String {
    let local: DateTime<Local> = time.into();
    format!(
        "{}.{:07}",
        local.format("%Y-%m-%d %H:%M:%S"),
        local.timestamp_subsec_nanos() / 100
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fs::MockFileSystem;

    #[test]
    fn metadata_names_ignore_case_but_keep_casing() {
        let mut table = MetadataTable::new();
        table.set("Culture", "en-US");
        table.set("CULTURE", "fr-FR");
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("culture"), Some("fr-FR"));
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["Culture"]);
    }

    #[test]
    fn metadata_preserves_insertion_order() {
        let table: MetadataTable =
            [("Z", "1"), ("A", "2"), ("M", "3")].into_iter().collect();
        let names: Vec<_> = table.names().collect();
        assert_eq!(names, vec!["Z", "A", "M"]);
    }

    #[test]
    fn identity_is_the_escaped_include() {
        let fs = MockFileSystem::new();
        let item = Item::new("Compile", "odd%3bname.cs");
        let identity = item
            .well_known_metadata("Identity", &fs, "/proj")
            .unwrap()
            .unwrap();
        assert_eq!(identity, "odd%3bname.cs");
        assert_eq!(item.evaluated_include(), "odd;name.cs");
    }

    #[test]
    fn filename_and_extension_decompose_the_include() {
        let fs = MockFileSystem::new();
        let item = Item::new("Compile", "src/nested/program.g.cs");
        assert_eq!(
            item.well_known_metadata("Filename", &fs, "/proj").unwrap(),
            Some("program.g".to_string())
        );
        assert_eq!(
            item.well_known_metadata("Extension", &fs, "/proj").unwrap(),
            Some(".cs".to_string())
        );
        let relative = item
            .well_known_metadata("RelativeDir", &fs, "/proj")
            .unwrap()
            .unwrap();
        assert!(relative.starts_with("src/nested"));
    }

    #[test]
    fn full_path_anchors_on_project_dir() {
        let fs = MockFileSystem::new();
        let item = Item::new("Compile", "sub/f.cs").with_project_dir("/proj");
        let full = item
            .well_known_metadata("FullPath", &fs, "/elsewhere")
            .unwrap()
            .unwrap();
        assert!(full.ends_with("f.cs"));
        assert!(full.starts_with('/'));
        assert!(!full.contains("elsewhere"));
    }

    #[test]
    fn recursive_dir_defaults_to_empty() {
        let fs = MockFileSystem::new();
        let plain = Item::new("None", "a.txt");
        assert_eq!(
            plain.well_known_metadata("RecursiveDir", &fs, "/p").unwrap(),
            Some(String::new())
        );
        let globbed = Item::new("None", "x/y/a.txt").with_recursive_dir("x/y/");
        assert_eq!(
            globbed
                .well_known_metadata("RecursiveDir", &fs, "/p")
                .unwrap(),
            Some("x/y/".to_string())
        );
    }

    #[test]
    fn timestamps_of_missing_files_are_empty() {
        let fs = MockFileSystem::new();
        let item = Item::new("None", "ghost.txt").with_project_dir("/p");
        assert_eq!(
            item.well_known_metadata("ModifiedTime", &fs, "/p").unwrap(),
            Some(String::new())
        );
    }

    #[test]
    fn unknown_names_are_not_well_known() {
        let fs = MockFileSystem::new();
        let item = Item::new("None", "a.txt");
        assert_eq!(item.well_known_metadata("Culture", &fs, "/p").unwrap(), None);
        assert!(is_well_known_metadata("fullpath"));
        assert!(!is_well_known_metadata("Culture"));
    }

    #[test]
    fn invalid_path_characters_surface_as_errors() {
        let fs = MockFileSystem::new();
        let item = Item::new("None", "bad|name.txt");
        assert!(item.well_known_metadata("FullPath", &fs, "/p").is_err());
    }

    #[test]
    fn items_of_one_type_share_the_interned_name() {
        let a = Item::new("Compile", "a.cs");
        let b = Item::new("Compile", "b.cs");
        assert!(Arc::ptr_eq(&a.item_type_arc(), &b.item_type_arc()));
        let recast = b.retyped("Compile");
        assert!(Arc::ptr_eq(&a.item_type_arc(), &recast.item_type_arc()));
        assert!(interned_type_name_count() >= 1);
    }
}
