//! The staged expansion engine for `$()`, `@()` and `%()` references.

use std::borrow::Cow;
use std::sync::Arc;

use log::{debug, trace};
use memchr::{memchr, memchr2, memchr3};
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::ast::{Expr, ItemVector, TransformCall};
use crate::diagnostics::ElementLocation;
use crate::itemspec::VectorResolver;
use crate::model::{
    FileSystem, Item, ItemSource, MetadataSource, PathError, ProjectData, PropertySource, Value,
    escaping,
};
use crate::parser::{
    SyntaxError, item_reference, may_be_list, metadata_reference, property_reference,
    skip_reference, split_list, whole_item_reference,
};
use crate::registry::{FunctionContext, FunctionError, FunctionRegistry, index_into, invoke_member};
use crate::transform::{TransformContext, TransformRow, TransformStep};

use super::error::{ExpansionError, ExpansionResult};
use super::options::{ExpanderOptions, ExpansionConfig};

/// Call arguments rarely exceed a handful of values.
type ArgVec = SmallVec<[Value; 4]>;

/// Items rendered before a truncated vector elides the rest.
const TRUNCATED_ITEM_LIMIT: usize = 3;

/// Malformed property bodies that historically expanded to empty
/// instead of failing. Matched by case-insensitive prefix against
/// exactly these spellings; nothing else with a similar shape gets
/// the treatment.
const LEGACY_EMPTY_BODIES: &[&str] = &[
    r"HKEY_LOCAL_MACHINE\Software\Microsoft\VisualStudio\9.0\VSTSDB@VSTSDBDirectory",
    "ComputerName%2c",
];

/// Hive names accepted at the head of a `$(Registry:...)` key.
const REGISTRY_HIVES: &[&str] = &[
    "HKEY_CLASSES_ROOT",
    "HKEY_CURRENT_CONFIG",
    "HKEY_CURRENT_USER",
    "HKEY_LOCAL_MACHINE",
    "HKEY_USERS",
];

/// Builds the items an [`Expander::expand_into_items`] call produces.
pub trait ItemFactory {
    /// Item type the produced items carry.
    fn item_type(&self) -> &str;

    /// Build one item from an escaped include value.
    fn create_item(&self, include_escaped: &str) -> Item {
        Item::new(self.item_type(), include_escaped)
    }
}

/// Factory producing bare items of a fixed type.
pub struct TypedItemFactory {
    item_type: Arc<str>,
}

impl TypedItemFactory {
    pub fn new(item_type: impl Into<Arc<str>>) -> Self {
        Self {
            item_type: item_type.into(),
        }
    }
}

impl ItemFactory for TypedItemFactory {
    fn item_type(&self) -> &str {
        &self.item_type
    }
}

/// The expression expander over one project snapshot.
///
/// Borrows its data sources for the duration of the call and performs
/// no locking of its own; callers keep the sources unchanged while an
/// expansion runs. Expansion is a pure function of the borrowed state,
/// so independent expanders may run concurrently over independent
/// snapshots.
pub struct Expander<'a> {
    properties: &'a dyn PropertySource,
    items: &'a dyn ItemSource,
    metadata: &'a dyn MetadataSource,
    fs: &'a dyn FileSystem,
    registry: &'a FunctionRegistry,
    config: &'a ExpansionConfig,
}

impl<'a> Expander<'a> {
    pub fn new(
        properties: &'a dyn PropertySource,
        items: &'a dyn ItemSource,
        metadata: &'a dyn MetadataSource,
        fs: &'a dyn FileSystem,
        registry: &'a FunctionRegistry,
        config: &'a ExpansionConfig,
    ) -> Self {
        Self {
            properties,
            items,
            metadata,
            fs,
            registry,
            config,
        }
    }

    /// Expander over a [`ProjectData`] snapshot, which supplies all
    /// three data sources at once.
    pub fn for_project(
        data: &'a ProjectData,
        fs: &'a dyn FileSystem,
        registry: &'a FunctionRegistry,
        config: &'a ExpansionConfig,
    ) -> Self {
        Self::new(data, data, data, fs, registry, config)
    }

    pub fn config(&self) -> &ExpansionConfig {
        self.config
    }

    /// Expand every enabled reference kind in `input`, keeping the
    /// result in the escaped domain.
    ///
    /// Runs up to three passes over the text: metadata, then
    /// properties, then item vectors. Later passes see the output of
    /// earlier ones, so a property that splices item-vector syntax is
    /// picked up by the item pass. A call that has nothing to do
    /// returns the borrowed input untouched.
    pub fn expand_into_string_leave_escaped<'i>(
        &self,
        input: &'i str,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<Cow<'i, str>> {
        if input.is_empty() || !options.intersects(ExpanderOptions::ALL) {
            return Ok(Cow::Borrowed(input));
        }
        if memchr3(b'$', b'@', b'%', input.as_bytes()).is_none() {
            return Ok(Cow::Borrowed(input));
        }

        let mut current = Cow::Borrowed(input);
        if options.contains(ExpanderOptions::METADATA) {
            if let Some(next) = self.expand_metadata(&current, options, location)? {
                current = Cow::Owned(next);
            }
        }
        if options.contains(ExpanderOptions::PROPERTIES) {
            if let Some(next) = self.expand_properties(&current, options, location)? {
                current = Cow::Owned(next);
            }
        }
        if options.contains(ExpanderOptions::ITEMS) {
            if let Some(next) = self.expand_item_vectors(&current, options, location)? {
                current = Cow::Owned(next);
            }
        }
        Ok(current)
    }

    /// Expand and decode percent sequences in one step.
    pub fn expand_into_string_and_unescape(
        &self,
        input: &str,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<String> {
        let expanded = self.expand_into_string_leave_escaped(input, options, location)?;
        Ok(escaping::unescape(&expanded).into_owned())
    }

    /// Expand, then split the result into its top-level `;` segments.
    /// Truncation never applies to list results.
    pub fn expand_into_string_list_leave_escaped(
        &self,
        input: &str,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<Vec<String>> {
        let expanded = self.expand_into_string_leave_escaped(
            input,
            options & !ExpanderOptions::TRUNCATE,
            location,
        )?;
        if !may_be_list(&expanded) {
            let single = expanded.trim();
            if single.is_empty() {
                return Ok(Vec::new());
            }
            return Ok(vec![single.to_string()]);
        }
        Ok(split_list(&expanded).into_iter().map(str::to_string).collect())
    }

    /// Expand, split on top-level `;`, then decode each segment.
    ///
    /// Splitting happens before decoding, so an escaped `%3b` inside a
    /// segment never becomes a separator.
    pub fn expand_into_string_list_and_unescape(
        &self,
        input: &str,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<Vec<String>> {
        let mut segments = self.expand_into_string_list_leave_escaped(input, options, location)?;
        for segment in &mut segments {
            if let Cow::Owned(decoded) = escaping::unescape(segment) {
                *segment = decoded;
            }
        }
        Ok(segments)
    }

    /// Expand `expression` into items built by `factory`.
    ///
    /// A segment that is exactly one plain `@(Type)` reference passes
    /// the source items through under the factory's type, keeping
    /// their metadata. Every other segment expands to text first and
    /// each resulting value becomes a fresh item with no inherited
    /// metadata.
    pub fn expand_into_items(
        &self,
        expression: &str,
        factory: &dyn ItemFactory,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<Vec<Item>> {
        // Truncation is a display concern and never shapes real item
        // lists.
        let options = options & !ExpanderOptions::TRUNCATE;
        let prepared = self.expand_into_string_leave_escaped(
            expression,
            options & !ExpanderOptions::ITEMS,
            location,
        )?;

        let mut result = Vec::new();
        for piece in split_list(&prepared) {
            if !options.contains(ExpanderOptions::ITEMS) {
                result.push(factory.create_item(piece));
                continue;
            }
            if let Some(vector) = whole_item_reference(piece, self.config.max_nesting_depth) {
                if vector.is_plain() {
                    let source = self.items.items(&vector.item_type);
                    trace!(
                        "passing {} item(s) of @({}) through as {}",
                        source.len(),
                        vector.item_type,
                        factory.item_type()
                    );
                    result.extend(source.iter().map(|item| item.retyped(factory.item_type())));
                } else {
                    let rendered =
                        self.item_vector_to_string(&vector, piece, options, location)?;
                    result.extend(
                        split_list(&rendered)
                            .into_iter()
                            .map(|value| factory.create_item(value)),
                    );
                }
                continue;
            }
            match self.expand_item_vectors(piece, options, location)? {
                Some(expanded) => result.extend(
                    split_list(&expanded)
                        .into_iter()
                        .map(|value| factory.create_item(value)),
                ),
                None => result.push(factory.create_item(piece)),
            }
        }
        Ok(result)
    }

    /// Metadata pass. Replaces `%(...)` references from the ambient
    /// metadata source, leaving regions inside `@(...)` untouched so
    /// the item pass can evaluate them per item. Returns `None` when
    /// nothing changed.
    fn expand_metadata(
        &self,
        text: &str,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<Option<String>> {
        let bytes = text.as_bytes();
        if memchr(b'%', bytes).is_none() {
            return Ok(None);
        }

        let mut out = String::with_capacity(text.len());
        let mut changed = false;
        let mut pos = 0usize;
        loop {
            let Some(rel) = memchr2(b'%', b'@', &bytes[pos..]) else {
                out.push_str(&text[pos..]);
                break;
            };
            let at = pos + rel;
            out.push_str(&text[pos..at]);
            match bytes[at] {
                b'@' if bytes.get(at + 1) == Some(&b'(') => {
                    let end = skip_reference(text, at);
                    out.push_str(&text[at..end]);
                    pos = end;
                }
                b'%' if bytes.get(at + 1) == Some(&b'(') => {
                    let (node, end) = metadata_reference(text, at)
                        .map_err(|e| ExpansionError::syntax(e, location))?;
                    match self.metadata.metadata(node.item_type.as_deref(), &node.name) {
                        Some(value) => self.push_value(&mut out, &value, options),
                        None => trace!("metadata {node} is undefined here"),
                    }
                    changed = true;
                    pos = end;
                }
                other => {
                    // A bare trigger byte, e.g. the `%` of an escape
                    // sequence. Both triggers are ASCII, so pushing the
                    // byte as a char is safe.
                    out.push(other as char);
                    pos = at + 1;
                }
            }
        }
        Ok(changed.then_some(out))
    }

    /// Property pass. Replaces every `$(...)` reference; plain lookups
    /// splice the stored escaped text verbatim, computed results are
    /// rendered and re-escaped. Returns `None` when the text has no
    /// `$(` at all.
    fn expand_properties(
        &self,
        text: &str,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<Option<String>> {
        let bytes = text.as_bytes();
        let Some(first) = next_trigger(bytes, b'$', 0) else {
            return Ok(None);
        };

        let mut out = String::with_capacity(text.len() + 16);
        out.push_str(&text[..first]);
        let mut pos = first;
        loop {
            match property_reference(text, pos, self.config.max_nesting_depth) {
                Ok((node, end)) => {
                    self.append_property(&mut out, &node, &text[pos..end], options, location)?;
                    pos = end;
                }
                Err(err) => {
                    let end = skip_reference(text, pos);
                    let body = text[pos + 2..end].trim_end_matches(')');
                    if is_legacy_empty_body(body) {
                        debug!("legacy registry-style property '{body}' expands to empty");
                        pos = end;
                    } else {
                        return Err(ExpansionError::syntax(err, location));
                    }
                }
            }
            match next_trigger(bytes, b'$', pos) {
                Some(next) => {
                    out.push_str(&text[pos..next]);
                    pos = next;
                }
                None => {
                    out.push_str(&text[pos..]);
                    break;
                }
            }
        }
        Ok(Some(out))
    }

    fn append_property(
        &self,
        out: &mut String,
        node: &Expr,
        segment: &str,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<()> {
        match node {
            Expr::Empty => {}
            // Stored values are already escaped; splicing them verbatim
            // keeps literal `%2a` and friends intact.
            Expr::Property(name) => match self.properties.property(name) {
                Some(value) => self.push_value(out, &value, options),
                None => trace!("property $({name}) is undefined here"),
            },
            Expr::Registry(key) => self.resolve_registry(key, options, location)?,
            computed => {
                let value = self.evaluate(computed, segment, options, location)?;
                let rendered = value.render();
                self.push_value(out, &escaping::escape(&rendered), options);
            }
        }
        Ok(())
    }

    /// `$(Registry:...)` reads have no backing store on this platform.
    /// A key under a recognized hive expands to empty; anything else is
    /// malformed.
    fn resolve_registry(
        &self,
        key: &str,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<()> {
        // The key may embed further property references.
        let resolved = match self.expand_properties(key, options, location)? {
            Some(expanded) => Cow::Owned(expanded),
            None => Cow::Borrowed(key),
        };
        if !recognized_hive(&resolved) {
            return Err(ExpansionError::syntax(
                SyntaxError::InvalidRegistryLocation {
                    key: resolved.into_owned(),
                },
                location,
            ));
        }
        debug!("registry value '{resolved}' is unavailable here; expanding to empty");
        Ok(())
    }

    /// Evaluate one parsed expression node to a value. Receivers and
    /// arguments live in the unescaped domain.
    fn evaluate(
        &self,
        node: &Expr,
        segment: &str,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<Value> {
        match node {
            Expr::Empty | Expr::Null => Ok(Value::Empty),
            Expr::Literal(text) => Ok(Value::String(escaping::unescape(text).into_owned())),
            Expr::Template(text) => {
                let expanded = self.expand_into_string_leave_escaped(
                    text,
                    options & !ExpanderOptions::TRUNCATE,
                    location,
                )?;
                Ok(Value::String(escaping::unescape(&expanded).into_owned()))
            }
            Expr::Property(name) => {
                let stored = self.properties.property(name).unwrap_or(Cow::Borrowed(""));
                Ok(Value::String(escaping::unescape(&stored).into_owned()))
            }
            Expr::Metadata(reference) => {
                let stored = self
                    .metadata
                    .metadata(reference.item_type.as_deref(), &reference.name)
                    .unwrap_or(Cow::Borrowed(""));
                Ok(Value::String(escaping::unescape(&stored).into_owned()))
            }
            Expr::Registry(key) => {
                self.resolve_registry(key, options, location)?;
                Ok(Value::String(String::new()))
            }
            Expr::StaticProperty(data) => self
                .registry
                .static_property(&data.type_name, &data.name, &self.function_context(location))
                .map_err(|e| self.function_error(e, segment, location)),
            Expr::StaticCall(data) => {
                let args = self.evaluate_args(&data.args, segment, options, location)?;
                self.registry
                    .static_call(
                        &data.type_name,
                        &data.name,
                        &args,
                        &self.function_context(location),
                    )
                    .map_err(|e| self.function_error(e, segment, location))
            }
            Expr::Constructor(data) => {
                let args = self.evaluate_args(&data.args, segment, options, location)?;
                self.registry
                    .construct(&data.type_name, &args, &self.function_context(location))
                    .map_err(|e| self.function_error(e, segment, location))
            }
            Expr::Member(data) => {
                let receiver = self.evaluate(&data.receiver, segment, options, location)?;
                let args = match &data.args {
                    Some(list) => Some(self.evaluate_args(list, segment, options, location)?),
                    None => None,
                };
                invoke_member(&receiver, &data.name, args.as_deref())
                    .map_err(|e| self.function_error(e, segment, location))
            }
            Expr::Indexer(data) => {
                let receiver = self.evaluate(&data.receiver, segment, options, location)?;
                let index = self.evaluate(&data.index, segment, options, location)?;
                index_into(&receiver, &index)
                    .map_err(|e| self.function_error(e, segment, location))
            }
        }
    }

    fn evaluate_args(
        &self,
        args: &[Expr],
        segment: &str,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<ArgVec> {
        args.iter()
            .map(|arg| self.evaluate(arg, segment, options, location))
            .collect()
    }

    /// Item pass. Replaces every `@(...)` vector with its rendered
    /// value list. Returns `None` when the text has no `@(` at all.
    fn expand_item_vectors(
        &self,
        text: &str,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<Option<String>> {
        let bytes = text.as_bytes();
        let Some(first) = next_trigger(bytes, b'@', 0) else {
            return Ok(None);
        };

        let mut out = String::with_capacity(text.len() + 16);
        out.push_str(&text[..first]);
        let mut pos = first;
        loop {
            let (vector, end) = item_reference(text, pos, self.config.max_nesting_depth)
                .map_err(|e| ExpansionError::syntax(e, location))?;
            let rendered =
                self.item_vector_to_string(&vector, &text[pos..end], options, location)?;
            out.push_str(&rendered);
            pos = end;
            match next_trigger(bytes, b'@', pos) {
                Some(next) => {
                    out.push_str(&text[pos..next]);
                    pos = next;
                }
                None => {
                    out.push_str(&text[pos..]);
                    break;
                }
            }
        }
        Ok(Some(out))
    }

    fn item_vector_to_string(
        &self,
        vector: &ItemVector,
        segment: &str,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<String> {
        let rows = self.expand_vector_rows(vector, segment, options, location)?;
        let separator = match &vector.separator {
            Some(raw) => self
                .expand_into_string_leave_escaped(
                    raw,
                    (options | ExpanderOptions::METADATA)
                        & !(ExpanderOptions::ITEMS | ExpanderOptions::TRUNCATE),
                    location,
                )?
                .into_owned(),
            None => ";".to_string(),
        };

        let limit = if options.contains(ExpanderOptions::TRUNCATE) {
            TRUNCATED_ITEM_LIMIT
        } else {
            usize::MAX
        };
        let mut rendered = String::new();
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                rendered.push_str(&separator);
            }
            if i == limit {
                rendered.push_str("...");
                break;
            }
            self.push_value(&mut rendered, &row.value, options);
        }
        Ok(rendered)
    }

    /// Run a vector's transform chain, starting from one row per item
    /// of the referenced type.
    fn expand_vector_rows(
        &self,
        vector: &ItemVector,
        segment: &str,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<Vec<TransformRow>> {
        let source = self.items.items(&vector.item_type);
        let mut rows: Vec<TransformRow> = source.iter().map(TransformRow::from_item).collect();
        trace!(
            "expanding @({}) over {} item(s) through {} step(s)",
            vector.item_type,
            rows.len(),
            vector.steps.len()
        );
        let ctx = TransformContext {
            fs: self.fs,
            current_dir: &self.config.current_dir,
            defaults: self.metadata,
        };
        for step in &vector.steps {
            rows = self.apply_transform_call(step, rows, &ctx, segment, options, location)?;
        }
        Ok(rows)
    }

    fn apply_transform_call(
        &self,
        call: &TransformCall,
        rows: Vec<TransformRow>,
        ctx: &TransformContext<'_>,
        segment: &str,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<Vec<TransformRow>> {
        match call {
            TransformCall::Template(template) => {
                let mut next = Vec::with_capacity(rows.len());
                for row in rows {
                    let value = self.expand_transform_template(template, &row, options, location)?;
                    next.push(TransformRow::new(row.item, value));
                }
                Ok(next)
            }
            TransformCall::Function { name, args } => {
                // Step arguments stay in the escaped domain; each step
                // unescapes what it consumes.
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.transform_argument(arg, segment, options, location)?);
                }
                match TransformStep::resolve(name, &arg_values)
                    .map_err(|e| self.function_error(e, segment, location))?
                {
                    Some(step) => step
                        .apply(rows, ctx)
                        .map_err(|e| self.function_error(e, segment, location)),
                    None => self.fallthrough_member(name, &arg_values, rows, segment, location),
                }
            }
        }
    }

    /// Evaluate one transform-step argument to escaped text.
    fn transform_argument(
        &self,
        arg: &Expr,
        segment: &str,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<String> {
        match arg {
            Expr::Literal(text) => Ok(text.clone()),
            Expr::Template(text) => Ok(self
                .expand_into_string_leave_escaped(
                    text,
                    options & !ExpanderOptions::TRUNCATE,
                    location,
                )?
                .into_owned()),
            other => {
                let value = self.evaluate(other, segment, options, location)?;
                Ok(escaping::escape(&value.render()).into_owned())
            }
        }
    }

    /// A transform name that is not a known step dispatches as a string
    /// member call on each row's value.
    fn fallthrough_member(
        &self,
        name: &str,
        escaped_args: &[String],
        rows: Vec<TransformRow>,
        segment: &str,
        location: &ElementLocation,
    ) -> ExpansionResult<Vec<TransformRow>> {
        let operands: ArgVec = escaped_args
            .iter()
            .map(|arg| Value::String(escaping::unescape(arg).into_owned()))
            .collect();
        let mut next = Vec::with_capacity(rows.len());
        for row in rows {
            let receiver = Value::String(escaping::unescape(&row.value).into_owned());
            let result = invoke_member(&receiver, name, Some(&operands))
                .map_err(|e| self.function_error(e, segment, location))?;
            let value = escaping::escape(&result.render()).into_owned();
            next.push(TransformRow::new(row.item, value));
        }
        Ok(next)
    }

    /// Re-expand a quoted transform template for one row, with that
    /// row's item metadata in scope. Rows without an item see every
    /// metadata reference as empty.
    fn expand_transform_template(
        &self,
        template: &str,
        row: &TransformRow,
        options: ExpanderOptions,
        location: &ElementLocation,
    ) -> ExpansionResult<String> {
        // Well-known names track the value as transformed so far;
        // custom names stay with the originating item. A probe item
        // carrying the current value over the original's metadata
        // gives both.
        let probe = row
            .item
            .as_ref()
            .map(|item| item.clone().with_include_escaped(row.value.clone()));
        let scope = ItemMetadataScope {
            item: probe.as_ref(),
            fs: self.fs,
            current_dir: &self.config.current_dir,
            fallback: self.metadata,
            failure: Mutex::new(None),
        };
        let scoped = Expander {
            properties: self.properties,
            items: self.items,
            metadata: &scope,
            fs: self.fs,
            registry: self.registry,
            config: self.config,
        };
        let expanded = scoped.expand_into_string_leave_escaped(
            template,
            (options | ExpanderOptions::METADATA) & !ExpanderOptions::TRUNCATE,
            location,
        )?;
        let result = expanded.into_owned();
        if let Some(err) = scope.failure.into_inner() {
            return Err(ExpansionError::path(err, location));
        }
        Ok(result)
    }

    /// Append `value`, applying the per-value character budget when
    /// truncation is on.
    fn push_value(&self, out: &mut String, value: &str, options: ExpanderOptions) {
        if options.contains(ExpanderOptions::TRUNCATE) {
            let budget = self.config.truncation_budget;
            if value.chars().count() > budget {
                out.extend(value.chars().take(budget.saturating_sub(3)));
                out.push_str("...");
                return;
            }
        }
        out.push_str(value);
    }

    fn function_context<'s>(&'s self, location: &'s ElementLocation) -> FunctionContext<'s> {
        FunctionContext {
            current_dir: &self.config.current_dir,
            fs: self.fs,
            location,
        }
    }

    fn function_error(
        &self,
        err: FunctionError,
        segment: &str,
        location: &ElementLocation,
    ) -> ExpansionError {
        let err = match err {
            FunctionError::UnknownType { type_name } if self.config.enable_all_functions => {
                FunctionError::Evaluation {
                    message: format!("the type '[{type_name}]' could not be found"),
                    name: type_name,
                }
            }
            other => other,
        };
        ExpansionError::function(err, segment, location)
    }
}

impl VectorResolver for Expander<'_> {
    fn resolve_vector(&self, text: &str) -> Vec<String> {
        let location = ElementLocation::in_memory();
        match self.expand_into_string_list_leave_escaped(text, ExpanderOptions::ALL, &location) {
            Ok(values) => values,
            Err(err) => {
                debug!("item expression '{text}' failed during spec matching: {err}");
                Vec::new()
            }
        }
    }
}

/// Metadata source scoped to one item during template expansion.
struct ItemMetadataScope<'b> {
    item: Option<&'b Item>,
    fs: &'b dyn FileSystem,
    current_dir: &'b str,
    fallback: &'b dyn MetadataSource,
    /// First path failure seen while computing well-known values.
    /// Surfaced after the template finishes, since the source trait
    /// itself cannot carry errors.
    failure: Mutex<Option<PathError>>,
}

impl MetadataSource for ItemMetadataScope<'_> {
    fn metadata(&self, item_type: Option<&str>, name: &str) -> Option<Cow<'_, str>> {
        let item = self.item?;
        if let Some(qualifier) = item_type {
            if !qualifier.eq_ignore_ascii_case(item.item_type()) {
                return None;
            }
        }
        match item.well_known_metadata(name, self.fs, self.current_dir) {
            Ok(Some(value)) => return Some(Cow::Owned(value)),
            Ok(None) => {}
            Err(err) => {
                self.failure.lock().get_or_insert(err);
                return None;
            }
        }
        if let Some(value) = item.custom_metadata(name) {
            return Some(Cow::Borrowed(value));
        }
        self.fallback.default_metadata(item.item_type(), name)
    }

    fn default_metadata(&self, item_type: &str, name: &str) -> Option<Cow<'_, str>> {
        self.fallback.default_metadata(item_type, name)
    }
}

/// Position of the next `X(` at or after `from`.
fn next_trigger(bytes: &[u8], trigger: u8, from: usize) -> Option<usize> {
    let mut search = from;
    while let Some(rel) = memchr(trigger, &bytes[search..]) {
        let at = search + rel;
        if bytes.get(at + 1) == Some(&b'(') {
            return Some(at);
        }
        search = at + 1;
    }
    None
}

fn is_legacy_empty_body(body: &str) -> bool {
    LEGACY_EMPTY_BODIES
        .iter()
        .any(|p| body.get(..p.len()).is_some_and(|head| head.eq_ignore_ascii_case(p)))
}

fn recognized_hive(key: &str) -> bool {
    let head = key.split(['\\', '/', '@']).next().unwrap_or(key);
    REGISTRY_HIVES.iter().any(|h| head.eq_ignore_ascii_case(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MetadataTable, MockFileSystem};

    struct Harness {
        data: ProjectData,
        fs: MockFileSystem,
        registry: FunctionRegistry,
        config: ExpansionConfig,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                data: ProjectData::new(),
                fs: MockFileSystem::new(),
                registry: FunctionRegistry::standard(),
                config: ExpansionConfig::rooted_at("/proj"),
            }
        }

        fn expander(&self) -> Expander<'_> {
            Expander::for_project(&self.data, &self.fs, &self.registry, &self.config)
        }

        fn expand(&self, input: &str) -> String {
            self.expand_with(input, ExpanderOptions::ALL)
        }

        fn expand_with(&self, input: &str, options: ExpanderOptions) -> String {
            self.expander()
                .expand_into_string_leave_escaped(input, options, &ElementLocation::in_memory())
                .unwrap()
                .into_owned()
        }

        fn expand_err(&self, input: &str) -> ExpansionError {
            self.expander()
                .expand_into_string_leave_escaped(
                    input,
                    ExpanderOptions::ALL,
                    &ElementLocation::in_memory(),
                )
                .unwrap_err()
        }
    }

    #[test]
    fn no_op_expansion_returns_the_same_allocation() {
        let h = Harness::new();
        let e = h.expander();
        let location = ElementLocation::in_memory();

        let plain = "no triggers here";
        let out = e
            .expand_into_string_leave_escaped(plain, ExpanderOptions::ALL, &location)
            .unwrap();
        assert!(matches!(out, Cow::Borrowed(p) if std::ptr::eq(p, plain)));

        // Triggers present but every reference kind disabled.
        let gated = "$(P)@(I)%(M)";
        let out = e
            .expand_into_string_leave_escaped(gated, ExpanderOptions::TRUNCATE, &location)
            .unwrap();
        assert!(matches!(out, Cow::Borrowed(p) if std::ptr::eq(p, gated)));

        // A bare escape sequence is not a reference.
        let encoded = "50%3B off";
        let out = e
            .expand_into_string_leave_escaped(encoded, ExpanderOptions::ALL, &location)
            .unwrap();
        assert!(matches!(out, Cow::Borrowed(p) if std::ptr::eq(p, encoded)));
    }

    #[test]
    fn properties_splice_stored_text_verbatim() {
        let mut h = Harness::new();
        h.data.set_property("Out", "bin%2afinal");
        h.data.set_property("Empty", "");

        assert_eq!(h.expand("$(Out)"), "bin%2afinal");
        assert_eq!(h.expand("pre $(Out) post"), "pre bin%2afinal post");
        assert_eq!(h.expand("$(Empty)|$(Undefined)|$()"), "||");
    }

    #[test]
    fn property_functions_render_and_reescape() {
        let mut h = Harness::new();
        h.data.set_property("Name", "core");
        h.data.set_property("List", "a%3bb");

        assert_eq!(h.expand("$(Name.Length)"), "4");
        assert_eq!(h.expand("$(Name.ToUpperInvariant())"), "CORE");
        assert_eq!(h.expand("$([System.Math]::Min(3, 8))"), "3");
        // The receiver is unescaped before the call, the result is
        // escaped after it.
        assert_eq!(h.expand("$(List.Length)"), "3");
        assert_eq!(h.expand("$(List.Replace('b', ';'))"), "a%3b%3b");
    }

    #[test]
    fn metadata_pass_skips_item_vectors() {
        let mut h = Harness::new();
        let mut context = MetadataTable::new();
        context.set("Culture", "en");
        h.data.set_metadata_context(Some("Compile"), context);

        let out = h.expand_with(
            "%(Culture)|%(Compile.Culture)|@(X->'%(Culture)')",
            ExpanderOptions::METADATA,
        );
        assert_eq!(out, "en|en|@(X->'%(Culture)')");

        // Unqualified misses and mismatched qualifiers go empty.
        assert_eq!(h.expand_with("%(Missing)|%(Other.Culture)", ExpanderOptions::METADATA), "|");
    }

    #[test]
    fn registry_reads_expand_to_empty_for_recognized_hives() {
        let h = Harness::new();
        assert_eq!(h.expand(r"$(Registry:HKEY_LOCAL_MACHINE\Software\Vendor@Value)"), "");
        assert_eq!(h.expand(r"pre$(Registry:hkey_current_user\Console)post"), "prepost");

        let err = h.expand_err(r"$(Registry:HKEY_BOGUS\Key@Value)");
        assert_eq!(err.code(), "MSB4186");
        assert!(err.to_string().contains("HKEY_BOGUS"), "{err}");
    }

    #[test]
    fn legacy_malformed_bodies_expand_to_empty() {
        let h = Harness::new();
        assert_eq!(
            h.expand(r"$(HKEY_LOCAL_MACHINE\Software\Microsoft\VisualStudio\9.0\VSTSDB@VSTSDBDirectory)"),
            ""
        );
        assert_eq!(h.expand("$(ComputerName%2c)"), "");

        // Only the documented spellings get the carve-out.
        let err = h.expand_err(r"$(HKEY_LOCAL_MACHINE\Software\Other)");
        assert_eq!(err.code(), "MSB4186");
    }

    #[test]
    fn item_vectors_join_their_values() {
        let mut h = Harness::new();
        h.data.add_item(Item::new("Compile", "src/a.cs"));
        h.data.add_item(Item::new("Compile", "src/b.cs"));

        assert_eq!(h.expand("@(Compile)"), "src/a.cs;src/b.cs");
        assert_eq!(h.expand("@(Compile, ', ')"), "src/a.cs, src/b.cs");
        assert_eq!(h.expand("@(Missing)"), "");
        assert_eq!(h.expand("left @(Compile) right"), "left src/a.cs;src/b.cs right");
    }

    #[test]
    fn transform_templates_see_item_metadata() {
        let mut h = Harness::new();
        h.data
            .add_item(Item::new("Compile", "src/a.cs").with_metadata("Culture", "en"));
        h.data
            .add_item(Item::new("Compile", "src/b.cs").with_metadata("Culture", "fr"));

        assert_eq!(h.expand("@(Compile->'%(Filename).obj')"), "a.obj;b.obj");
        assert_eq!(h.expand("@(Compile->'%(Culture)')"), "en;fr");
        // Missing metadata keeps the row, empty.
        assert_eq!(h.expand("@(Compile->'%(Missing)')"), ";");
        // Chained steps run left to right; well-known names follow the
        // value transformed so far while custom names stay with the
        // source item.
        assert_eq!(h.expand("@(Compile->'%(Filename)'->'%(Identity).g')"), "a.g;b.g");
        assert_eq!(h.expand("@(Compile->'%(Filename)'->'%(Culture)')"), "en;fr");
    }

    #[test]
    fn intrinsic_steps_and_string_fallthrough() {
        let mut h = Harness::new();
        h.data.add_item(Item::new("Compile", "a.cs"));
        h.data.add_item(Item::new("Compile", "b.cs"));
        h.data.add_item(Item::new("Compile", "a.cs"));

        assert_eq!(h.expand("@(Compile->Count())"), "3");
        assert_eq!(h.expand("@(Compile->Distinct())"), "a.cs;b.cs");
        // Not a known step, so it dispatches per value as a string
        // member.
        assert_eq!(h.expand("@(Compile->Substring(0, 1))"), "a;b;a");
        // A template after a synthetic row sees no item metadata.
        assert_eq!(h.expand("@(Compile->Count()->'%(Filename)')"), "");
    }

    #[test]
    fn properties_expand_inside_vector_syntax() {
        let mut h = Harness::new();
        h.data.set_property("Ext", "obj");
        h.data.set_property("Sep", "+");
        h.data.add_item(Item::new("Compile", "a.cs"));
        h.data.add_item(Item::new("Compile", "b.cs"));

        assert_eq!(h.expand("@(Compile->'%(Filename).$(Ext)')"), "a.obj;b.obj");
        assert_eq!(h.expand("@(Compile, '$(Sep)')"), "a.cs+b.cs");
    }

    #[test]
    fn truncation_caps_values_and_item_counts() {
        let mut h = Harness::new();
        h.config.truncation_budget = 8;
        h.data.set_property("Long", "123456789abc");
        for i in 1..=5 {
            h.data.add_item(Item::new("I", format!("i{i}")));
        }

        let options = ExpanderOptions::ALL | ExpanderOptions::TRUNCATE;
        assert_eq!(h.expand_with("$(Long)", options), "12345...");
        assert_eq!(h.expand_with("@(I)", options), "i1;i2;i3;...");
        // Without the flag nothing is cut.
        assert_eq!(h.expand("$(Long)"), "123456789abc");
        assert_eq!(h.expand("@(I)"), "i1;i2;i3;i4;i5");
    }

    #[test]
    fn truncation_is_masked_for_list_results() {
        let mut h = Harness::new();
        h.config.truncation_budget = 4;
        h.data.set_property("Long", "abcdefghij");

        let values = h
            .expander()
            .expand_into_string_list_leave_escaped(
                "$(Long);x",
                ExpanderOptions::ALL | ExpanderOptions::TRUNCATE,
                &ElementLocation::in_memory(),
            )
            .unwrap();
        assert_eq!(values, vec!["abcdefghij".to_string(), "x".to_string()]);
    }

    #[test]
    fn unescape_variant_decodes_the_final_text() {
        let mut h = Harness::new();
        h.data.set_property("P", "a%3bb");
        let location = ElementLocation::in_memory();

        let out = h
            .expander()
            .expand_into_string_and_unescape("$(P)", ExpanderOptions::ALL, &location)
            .unwrap();
        assert_eq!(out, "a;b");

        // Decoding the escaped result reproduces the one-step form.
        let escaped = h
            .expander()
            .expand_into_string_leave_escaped("x $(P)", ExpanderOptions::ALL, &location)
            .unwrap();
        let two_step = escaping::unescape(&escaped).into_owned();
        let one_step = h
            .expander()
            .expand_into_string_and_unescape("x $(P)", ExpanderOptions::ALL, &location)
            .unwrap();
        assert_eq!(two_step, one_step);
    }

    #[test]
    fn list_expansion_splits_on_top_level_semicolons() {
        let mut h = Harness::new();
        h.data.set_property("Two", "1;2");
        h.data.set_property("Safe", "1%3b2");

        let e = h.expander();
        let location = ElementLocation::in_memory();
        assert_eq!(
            e.expand_into_string_list_leave_escaped("x;$(Two);y", ExpanderOptions::ALL, &location)
                .unwrap(),
            vec!["x", "1", "2", "y"]
        );
        // Escaped separators stay inside their segment.
        assert_eq!(
            e.expand_into_string_list_leave_escaped("x;$(Safe);y", ExpanderOptions::ALL, &location)
                .unwrap(),
            vec!["x", "1%3b2", "y"]
        );
    }

    #[test]
    fn items_pass_through_with_metadata_for_plain_vectors() {
        let mut h = Harness::new();
        h.data
            .add_item(Item::new("Compile", "a.cs").with_metadata("Culture", "en"));
        h.data.add_item(Item::new("Compile", "b.cs"));

        let factory = TypedItemFactory::new("Link");
        let items = h
            .expander()
            .expand_into_items(
                "@(Compile)",
                &factory,
                ExpanderOptions::ALL,
                &ElementLocation::in_memory(),
            )
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_type(), "Link");
        assert_eq!(items[0].include_escaped(), "a.cs");
        assert_eq!(items[0].custom_metadata("Culture"), Some("en"));
        assert_eq!(items[1].custom_metadata("Culture"), None);
    }

    #[test]
    fn transformed_and_literal_segments_make_fresh_items() {
        let mut h = Harness::new();
        h.data.set_property("Extra", "x.cs");
        h.data
            .add_item(Item::new("Compile", "a.cs").with_metadata("Culture", "en"));
        h.data.add_item(Item::new("Compile", "b.cs"));

        let factory = TypedItemFactory::new("Link");
        let e = h.expander();
        let location = ElementLocation::in_memory();

        let items = e
            .expand_into_items(
                "$(Extra);@(Compile->'%(Filename).o')",
                &factory,
                ExpanderOptions::ALL,
                &location,
            )
            .unwrap();
        let includes: Vec<&str> = items.iter().map(Item::include_escaped).collect();
        assert_eq!(includes, vec!["x.cs", "a.o", "b.o"]);
        assert!(items.iter().all(|i| i.item_type() == "Link"));
        // No metadata inheritance outside the pass-through case.
        assert_eq!(items[1].custom_metadata("Culture"), None);

        // A separator vector yields its joined text as one value.
        let items = e
            .expand_into_items("@(Compile, '|')", &factory, ExpanderOptions::ALL, &location)
            .unwrap();
        let includes: Vec<&str> = items.iter().map(Item::include_escaped).collect();
        assert_eq!(includes, vec!["a.cs|b.cs"]);
    }

    #[test]
    fn errors_carry_the_source_location() {
        let h = Harness::new();
        let location = ElementLocation::new("dir/app.proj", 3, 7);
        let err = h
            .expander()
            .expand_into_string_leave_escaped("$(Unterminated", ExpanderOptions::ALL, &location)
            .unwrap_err();
        assert!(err.to_string().starts_with("dir/app.proj (3,7): error MSB4186"), "{err}");
        assert_eq!(err.location().file(), "dir/app.proj");
    }

    #[test]
    fn nesting_limit_bounds_recursion() {
        let mut h = Harness::new();
        h.config.max_nesting_depth = 2;
        h.data.set_property("A", "x");

        assert_eq!(h.expand("$(A.Replace('x', 'y'))"), "y");
        let err = h.expand_err("$(A.Replace($(A.Replace($(A), 'z')), 'y'))");
        assert_eq!(err.code(), "MSB4186");
        assert!(err.to_string().contains("nest"), "{err}");
    }

    #[test]
    fn unknown_type_wording_follows_the_function_toggle() {
        let mut h = Harness::new();
        let strict = h.expand_err("$([System.Bogus]::Call())");
        assert!(strict.to_string().contains("not allowed"), "{strict}");

        h.config.enable_all_functions = true;
        let relaxed = h.expand_err("$([System.Bogus]::Call())");
        assert_eq!(relaxed.code(), "MSB4184");
        assert!(relaxed.to_string().contains("could not be found"), "{relaxed}");
    }
}
