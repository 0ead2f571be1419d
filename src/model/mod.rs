//! Core data model: values, items, escaping and data-source traits.

pub mod escaping;
pub mod fs;
pub mod item;
pub mod paths;
pub mod sources;
pub mod value;
pub mod version;

pub use fs::{FileSystem, FileSystemHandle, FileTimeKind, MockFileSystem, RealFileSystem};
pub use item::{
    Item, MetadataTable, WELL_KNOWN_METADATA, clear_type_name_interner, intern_type_name,
    interned_type_name_count, is_well_known_metadata,
};
pub use paths::{MAX_PATH_LENGTH, PathError};
pub use sources::{ItemSource, MetadataSource, NoProperties, ProjectData, PropertySource};
pub use value::Value;
pub use version::{Version, VersionParseError};
