//! Data sources the expander pulls from.
//!
//! The expander itself owns no build state. Property, item and
//! metadata lookups go through the three traits here, so evaluation
//! can run against a full project, a bare property bag in tests, or
//! anything in between. [`ProjectData`] is the batteries-included
//! implementation of all three.

use std::borrow::Cow;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::item::{Item, MetadataTable};

/// Resolves `$(Name)` property references. Values are escaped.
pub trait PropertySource: Send + Sync {
    fn property(&self, name: &str) -> Option<Cow<'_, str>>;
}

/// Resolves `@(Type)` item lists.
pub trait ItemSource: Send + Sync {
    /// Items of `item_type` in evaluation order. Unknown types yield an
    /// empty list, never an error.
    fn items(&self, item_type: &str) -> Cow<'_, [Item]>;
}

/// Resolves `%(Name)` and `%(Type.Name)` metadata references.
pub trait MetadataSource: Send + Sync {
    /// Metadata visible in the current evaluation context. Escaped.
    fn metadata(&self, item_type: Option<&str>, name: &str) -> Option<Cow<'_, str>>;

    /// Item-definition defaults for items of `item_type` that do not
    /// carry the metadata themselves.
    fn default_metadata(&self, item_type: &str, name: &str) -> Option<Cow<'_, str>> {
        let _ = (item_type, name);
        None
    }
}

/// In-memory project state: properties, item lists, item-definition
/// defaults and an optional batching context for bare `%()` references.
#[derive(Debug, Clone, Default)]
pub struct ProjectData {
    properties: MetadataTable,
    items: IndexMap<String, ItemBucket>,
    item_definitions: FxHashMap<String, MetadataTable>,
    context_item_type: Option<String>,
    context_metadata: MetadataTable,
}

#[derive(Debug, Clone)]
struct ItemBucket {
    items: Vec<Item>,
}

impl ProjectData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property (escaped value). Last write wins, order of first
    /// definition is preserved.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.set(name, value);
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(name, value);
        self
    }

    /// Append an item to its type's list.
    pub fn add_item(&mut self, item: Item) {
        let key = item.item_type().to_ascii_lowercase();
        self.items
            .entry(key)
            .or_insert_with(|| ItemBucket { items: Vec::new() })
            .items
            .push(item);
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.add_item(item);
        self
    }

    /// Default metadata applied to items of `item_type` that do not
    /// define `name` themselves.
    pub fn set_item_definition(
        &mut self,
        item_type: &str,
        name: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.item_definitions
            .entry(item_type.to_ascii_lowercase())
            .or_default()
            .set(name, value);
    }

    /// Enter a batching context: bare `%(Name)` references resolve
    /// against this metadata until the context is replaced.
    pub fn set_metadata_context(
        &mut self,
        item_type: Option<impl Into<String>>,
        metadata: MetadataTable,
    ) {
        self.context_item_type = item_type.map(Into::into);
        self.context_metadata = metadata;
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn item_types(&self) -> impl Iterator<Item = &str> {
        self.items.values().filter_map(|b| {
            b.items.first().map(|item| {
                // Buckets are never left empty.
                item.item_type()
            })
        })
    }
}

impl PropertySource for ProjectData {
    fn property(&self, name: &str) -> Option<Cow<'_, str>> {
        self.properties.get(name).map(Cow::Borrowed)
    }
}

impl ItemSource for ProjectData {
    fn items(&self, item_type: &str) -> Cow<'_, [Item]> {
        match self.items.get(&item_type.to_ascii_lowercase()) {
            Some(bucket) => Cow::Borrowed(&bucket.items),
            None => Cow::Borrowed(&[]),
        }
    }
}

impl MetadataSource for ProjectData {
    fn metadata(&self, item_type: Option<&str>, name: &str) -> Option<Cow<'_, str>> {
        match item_type {
            None => self.context_metadata.get(name).map(Cow::Borrowed),
            Some(qualifier) => {
                let in_context = self
                    .context_item_type
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(qualifier));
                if in_context {
                    if let Some(value) = self.context_metadata.get(name) {
                        return Some(Cow::Borrowed(value));
                    }
                }
                self.default_metadata(qualifier, name)
            }
        }
    }

    fn default_metadata(&self, item_type: &str, name: &str) -> Option<Cow<'_, str>> {
        self.item_definitions
            .get(&item_type.to_ascii_lowercase())?
            .get(name)
            .map(Cow::Borrowed)
    }
}

/// A property source with nothing in it, for expression-only contexts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProperties;

impl PropertySource for NoProperties {
    fn property(&self, _name: &str) -> Option<Cow<'_, str>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_lookup_ignores_case() {
        let data = ProjectData::new().with_property("OutDir", "bin/Debug");
        assert_eq!(data.property("outdir").as_deref(), Some("bin/Debug"));
        assert_eq!(data.property("OUTDIR").as_deref(), Some("bin/Debug"));
        assert_eq!(data.property("Missing"), None);
    }

    #[test]
    fn last_property_write_wins() {
        let mut data = ProjectData::new();
        data.set_property("P", "first");
        data.set_property("p", "second");
        assert_eq!(data.property("P").as_deref(), Some("second"));
        assert_eq!(data.property_count(), 1);
    }

    #[test]
    fn items_keep_evaluation_order() {
        let data = ProjectData::new()
            .with_item(Item::new("Compile", "b.cs"))
            .with_item(Item::new("Compile", "a.cs"))
            .with_item(Item::new("None", "readme.md"));
        let compile = data.items("compile");
        let includes: Vec<_> = compile.iter().map(Item::include_escaped).collect();
        assert_eq!(includes, vec!["b.cs", "a.cs"]);
        assert!(data.items("Absent").is_empty());
    }

    #[test]
    fn metadata_context_resolution() {
        let mut data = ProjectData::new();
        data.set_item_definition("Compile", "Culture", "neutral");
        data.set_metadata_context(
            Some("Compile"),
            [("Culture", "en-US")].into_iter().collect(),
        );

        assert_eq!(data.metadata(None, "Culture").as_deref(), Some("en-US"));
        assert_eq!(
            data.metadata(Some("Compile"), "Culture").as_deref(),
            Some("en-US")
        );
        // Other item types fall back to their definitions.
        assert_eq!(data.metadata(Some("None"), "Culture"), None);
        assert_eq!(
            data.default_metadata("compile", "culture").as_deref(),
            Some("neutral")
        );
    }
}
