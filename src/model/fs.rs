//! Filesystem access behind a trait so evaluation is testable.
//!
//! Everything that touches the disk during expansion goes through
//! [`FileSystem`]: existence probes, wildcard enumeration and the
//! timestamps backing `ModifiedTime`-style metadata. Production code
//! uses [`RealFileSystem`]; tests use [`MockFileSystem`] seeded with
//! an in-memory file list.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use glob::MatchOptions;
use log::debug;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// The three timestamps a file can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTimeKind {
    Modified,
    Created,
    Accessed,
}

/// Disk operations needed during expansion.
pub trait FileSystem: Send + Sync {
    /// True when `path` names an existing file or directory.
    fn exists(&self, path: &Path) -> bool {
        self.file_exists(path) || self.dir_exists(path)
    }

    fn file_exists(&self, path: &Path) -> bool;

    fn dir_exists(&self, path: &Path) -> bool;

    /// Files under `root` matching the glob `pattern` (relative to
    /// `root`). Returned paths are absolute. Order follows directory
    /// enumeration order.
    fn enumerate_files(&self, root: &Path, pattern: &str) -> Vec<PathBuf>;

    /// Timestamp of `path`, or `None` when the file is missing or the
    /// platform does not record that kind.
    fn file_time(&self, path: &Path, kind: FileTimeKind) -> Option<SystemTime>;

    /// Contents of `path` as UTF-8 text, `None` when unreadable.
    fn read_file(&self, path: &Path) -> Option<String> {
        let _ = path;
        None
    }

    /// Whether name comparison on this filesystem honors case.
    fn is_case_sensitive(&self) -> bool {
        cfg!(not(windows))
    }
}

/// Match options used for every glob evaluation, so parsing, matching
/// and enumeration agree on semantics.
pub(crate) fn match_options(case_sensitive: bool) -> MatchOptions {
    MatchOptions {
        case_sensitive,
        // `*` must not cross directory boundaries; only `**` may.
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

/// The process's actual filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn dir_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn enumerate_files(&self, root: &Path, pattern: &str) -> Vec<PathBuf> {
        let full = root.join(pattern);
        let Some(full) = full.to_str() else {
            return Vec::new();
        };
        match glob::glob_with(full, match_options(self.is_case_sensitive())) {
            Ok(paths) => paths
                .filter_map(|entry| match entry {
                    Ok(p) if p.is_file() => Some(p),
                    Ok(_) => None,
                    Err(err) => {
                        debug!("skipping unreadable path during glob: {err}");
                        None
                    }
                })
                .collect(),
            Err(err) => {
                debug!("glob pattern '{full}' rejected: {err}");
                Vec::new()
            }
        }
    }

    fn file_time(&self, path: &Path, kind: FileTimeKind) -> Option<SystemTime> {
        let meta = std::fs::metadata(path).ok()?;
        match kind {
            FileTimeKind::Modified => meta.modified().ok(),
            FileTimeKind::Created => meta.created().ok(),
            FileTimeKind::Accessed => meta.accessed().ok(),
        }
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }
}

/// In-memory filesystem for tests.
///
/// Interior mutability lets tests add files after the mock has been
/// wrapped in an `Arc<dyn FileSystem>` and handed to an expander.
#[derive(Debug, Default)]
pub struct MockFileSystem {
    files: RwLock<FxHashMap<PathBuf, FileEntry>>,
    case_sensitive: bool,
}

#[derive(Debug, Clone, Default)]
struct FileEntry {
    modified: Option<SystemTime>,
    created: Option<SystemTime>,
    accessed: Option<SystemTime>,
    content: Option<String>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(FxHashMap::default()),
            case_sensitive: true,
        }
    }

    /// Build a case-insensitive mock, mimicking Windows volumes.
    pub fn case_insensitive() -> Self {
        Self {
            files: RwLock::new(FxHashMap::default()),
            case_sensitive: false,
        }
    }

    /// Register a file. Parent directories spring into existence
    /// implicitly.
    pub fn add_file(&self, path: impl Into<PathBuf>) -> &Self {
        self.files.write().insert(path.into(), FileEntry::default());
        self
    }

    pub fn add_files<I, P>(&self, paths: I) -> &Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut files = self.files.write();
        for path in paths {
            files.insert(path.into(), FileEntry::default());
        }
        self
    }

    /// Register a file with readable text content.
    pub fn add_file_with_content(
        &self,
        path: impl Into<PathBuf>,
        content: impl Into<String>,
    ) -> &Self {
        self.files.write().insert(
            path.into(),
            FileEntry {
                content: Some(content.into()),
                ..FileEntry::default()
            },
        );
        self
    }

    /// Register a file with an explicit modification time.
    pub fn add_file_with_mtime(&self, path: impl Into<PathBuf>, mtime: SystemTime) -> &Self {
        self.files.write().insert(
            path.into(),
            FileEntry {
                modified: Some(mtime),
                created: Some(mtime),
                accessed: Some(mtime),
                content: None,
            },
        );
        self
    }

    fn canonical(&self, path: &Path) -> PathBuf {
        if self.case_sensitive {
            path.to_path_buf()
        } else {
            PathBuf::from(path.to_string_lossy().to_ascii_lowercase())
        }
    }

    fn lookup(&self, path: &Path) -> Option<FileEntry> {
        let files = self.files.read();
        if self.case_sensitive {
            files.get(path).cloned()
        } else {
            let wanted = self.canonical(path);
            files
                .iter()
                .find(|(p, _)| self.canonical(p) == wanted)
                .map(|(_, t)| t.clone())
        }
    }
}

impl FileSystem for MockFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        self.lookup(path).is_some()
    }

    fn dir_exists(&self, path: &Path) -> bool {
        let files = self.files.read();
        files.keys().any(|p| {
            p.ancestors().skip(1).any(|ancestor| {
                if self.case_sensitive {
                    ancestor == path
                } else {
                    self.canonical(ancestor) == self.canonical(path)
                }
            })
        })
    }

    fn enumerate_files(&self, root: &Path, pattern: &str) -> Vec<PathBuf> {
        let Ok(compiled) = glob::Pattern::new(pattern) else {
            return Vec::new();
        };
        let options = match_options(self.case_sensitive);
        let mut matched: Vec<PathBuf> = self
            .files
            .read()
            .keys()
            .filter(|p| {
                p.strip_prefix(root)
                    .ok()
                    .and_then(Path::to_str)
                    .is_some_and(|rel| compiled.matches_with(rel, options))
            })
            .cloned()
            .collect();
        // Directory enumeration order is unspecified on real disks; a
        // sorted mock keeps tests deterministic.
        matched.sort();
        matched
    }

    fn file_time(&self, path: &Path, kind: FileTimeKind) -> Option<SystemTime> {
        let times = self.lookup(path)?;
        match kind {
            FileTimeKind::Modified => times.modified,
            FileTimeKind::Created => times.created,
            FileTimeKind::Accessed => times.accessed,
        }
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        self.lookup(path)?.content
    }

    fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }
}

/// Shared handle used throughout the evaluator.
pub type FileSystemHandle = Arc<dyn FileSystem>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_tracks_files_and_directories() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/src/main.cs");
        assert!(fs.file_exists(Path::new("/proj/src/main.cs")));
        assert!(fs.dir_exists(Path::new("/proj/src")));
        assert!(fs.dir_exists(Path::new("/proj")));
        assert!(!fs.file_exists(Path::new("/proj/src")));
        assert!(!fs.dir_exists(Path::new("/other")));
    }

    #[test]
    fn mock_enumerates_with_glob_semantics() {
        let fs = MockFileSystem::new();
        fs.add_files(["/p/a.cs", "/p/b.txt", "/p/sub/c.cs", "/p/sub/deep/d.cs"]);

        let shallow = fs.enumerate_files(Path::new("/p"), "*.cs");
        assert_eq!(shallow, vec![PathBuf::from("/p/a.cs")]);

        let recursive = fs.enumerate_files(Path::new("/p"), "**/*.cs");
        assert_eq!(
            recursive,
            vec![
                PathBuf::from("/p/a.cs"),
                PathBuf::from("/p/sub/c.cs"),
                PathBuf::from("/p/sub/deep/d.cs"),
            ]
        );
    }

    #[test]
    fn case_insensitive_mock_matches_any_case() {
        let fs = MockFileSystem::case_insensitive();
        fs.add_file("/P/File.CS");
        assert!(fs.file_exists(Path::new("/p/file.cs")));
        assert!(!fs.is_case_sensitive());
    }

    #[test]
    fn missing_files_have_no_times() {
        let fs = MockFileSystem::new();
        assert_eq!(
            fs.file_time(Path::new("/nope"), FileTimeKind::Modified),
            None
        );
        let t = SystemTime::UNIX_EPOCH;
        fs.add_file_with_mtime("/a", t);
        assert_eq!(fs.file_time(Path::new("/a"), FileTimeKind::Modified), Some(t));
    }
}
