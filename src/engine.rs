//! Expansion engine, the main entry point for expanding expressions
//! over a project snapshot.

use std::borrow::Cow;
use std::sync::Arc;

use log::debug;

use crate::diagnostics::ElementLocation;
use crate::evaluator::{
    Expander, ExpanderOptions, ExpansionConfig, ExpansionResult, TypedItemFactory,
};
use crate::itemspec::{ItemSpec, ItemSpecContext, clear_wildcard_cache};
use crate::model::{FileSystemHandle, Item, ProjectData, RealFileSystem, escaping};
use crate::parser::{split_list, whole_item_reference};
use crate::registry::{FunctionRegistry, shared_registry};

/// Owns one project's data sources and hands out short-lived
/// [`Expander`]s over them.
///
/// The engine itself holds the mutable state (properties, items,
/// metadata context); expansion calls borrow it immutably, so expand
/// and mutate phases alternate naturally under the borrow checker.
pub struct ExpansionEngine {
    data: ProjectData,
    fs: FileSystemHandle,
    registry: Arc<FunctionRegistry>,
    config: ExpansionConfig,
}

impl Default for ExpansionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpansionEngine {
    /// Engine over the real filesystem with the shared standard
    /// function registry and default limits.
    pub fn new() -> Self {
        Self {
            data: ProjectData::new(),
            fs: Arc::new(RealFileSystem),
            registry: shared_registry(),
            config: ExpansionConfig::default(),
        }
    }

    /// Swap the filesystem, e.g. for a test double.
    pub fn with_fs(mut self, fs: FileSystemHandle) -> Self {
        self.fs = fs;
        self
    }

    /// Swap the function registry.
    pub fn with_registry(mut self, registry: Arc<FunctionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_config(mut self, config: ExpansionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn data(&self) -> &ProjectData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ProjectData {
        &mut self.data
    }

    pub fn config(&self) -> &ExpansionConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ExpansionConfig {
        &mut self.config
    }

    /// An expander borrowing this engine's current state.
    pub fn expander(&self) -> Expander<'_> {
        Expander::for_project(&self.data, &*self.fs, &self.registry, &self.config)
    }

    /// Expand every reference kind and decode the result.
    pub fn expand(&self, input: &str, location: &ElementLocation) -> ExpansionResult<String> {
        self.expander()
            .expand_into_string_and_unescape(input, ExpanderOptions::ALL, location)
    }

    /// Expand with explicit options, keeping the escaped domain.
    pub fn expand_escaped<'i>(
        &self,
        input: &'i str,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<Cow<'i, str>> {
        self.expander()
            .expand_into_string_leave_escaped(input, options, location)
    }

    /// Expand and split into top-level `;` segments.
    pub fn expand_list(
        &self,
        input: &str,
        location: &ElementLocation,
    ) -> ExpansionResult<Vec<String>> {
        self.expander()
            .expand_into_string_list_leave_escaped(input, ExpanderOptions::ALL, location)
    }

    /// Expand for display: decoded, with long values and item lists
    /// elided.
    pub fn expand_display(
        &self,
        input: &str,
        location: &ElementLocation,
    ) -> ExpansionResult<String> {
        self.expander().expand_into_string_and_unescape(
            input,
            ExpanderOptions::ALL | ExpanderOptions::TRUNCATE,
            location,
        )
    }

    /// Expand `expression` into items of `item_type`.
    pub fn expand_items(
        &self,
        item_type: &str,
        expression: &str,
        location: &ElementLocation,
    ) -> ExpansionResult<Vec<Item>> {
        let factory = TypedItemFactory::new(item_type);
        self.expander()
            .expand_into_items(expression, &factory, ExpanderOptions::ALL, location)
    }

    /// Evaluate an item declaration's include text: references expand,
    /// wildcard segments walk the filesystem, literal segments are kept
    /// whether or not a file exists.
    ///
    /// Files matched under a `**` segment record the walked suffix so
    /// `%(RecursiveDir)` reproduces it later.
    pub fn items_from_include(
        &self,
        item_type: &str,
        include: &str,
        location: &ElementLocation,
    ) -> ExpansionResult<Vec<Item>> {
        let expander = self.expander();
        let factory = TypedItemFactory::new(item_type);
        let prepared = expander.expand_into_string_leave_escaped(
            include,
            ExpanderOptions::PROPERTIES | ExpanderOptions::METADATA,
            location,
        )?;

        let mut items = Vec::new();
        for piece in split_list(&prepared) {
            // Vector segments keep item semantics: a plain @(Type)
            // passes items through with their metadata.
            if whole_item_reference(piece, self.config.max_nesting_depth).is_some()
                || piece.contains("@(")
            {
                items.extend(expander.expand_into_items(
                    piece,
                    &factory,
                    ExpanderOptions::ALL,
                    location,
                )?);
                continue;
            }

            let ctx = ItemSpecContext {
                fs: &*self.fs,
                current_dir: &self.config.current_dir,
                resolver: &expander,
            };
            let spec = ItemSpec::parse(piece, ctx);
            for found in spec.enumerate() {
                if found.value.is_empty() {
                    continue;
                }
                let mut item = Item::new(item_type, escaping::escape(&found.value).into_owned());
                if let Some(dir) = found.recursive_dir {
                    item = item.with_recursive_dir(dir);
                }
                items.push(item);
            }
        }
        debug!("include '{include}' produced {} {item_type} item(s)", items.len());
        Ok(items)
    }

    /// An item spec matcher over this engine's state, for Exclude and
    /// Remove style filtering.
    pub fn item_spec<'e>(&'e self, spec: &str, expander: &'e Expander<'e>) -> ItemSpec<'e> {
        let ctx = ItemSpecContext {
            fs: &*self.fs,
            current_dir: &self.config.current_dir,
            resolver: expander,
        };
        ItemSpec::parse(spec, ctx)
    }

    /// Drop memoized wildcard walks, forcing the next enumeration to
    /// hit the filesystem again.
    pub fn clear_file_caches(&self) {
        clear_wildcard_cache();
    }
}
