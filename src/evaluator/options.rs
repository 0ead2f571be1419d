//! Expansion options and shared configuration.

use bitflags::bitflags;

/// Default expression nesting budget.
pub const DEFAULT_NESTING_LIMIT: usize = 255;

/// Default character budget per expanded value under `TRUNCATE`.
pub const DEFAULT_TRUNCATION_BUDGET: usize = 1024;

bitflags! {
    /// Which reference kinds one expansion call replaces.
    ///
    /// Callers narrow this by context: a property-only attribute
    /// passes `PROPERTIES`, full attribute evaluation passes `ALL`,
    /// log renderers add `TRUNCATE` on top. Reference kinds left out
    /// of the set flow through as literal text.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExpanderOptions: u8 {
        /// Replace `$(...)` property references.
        const PROPERTIES = 1;
        /// Replace `@(...)` item vectors.
        const ITEMS = 1 << 1;
        /// Replace `%(...)` metadata references.
        const METADATA = 1 << 2;
        /// Cap each expanded value for display contexts: long values
        /// keep their head with a `...` tail, item vectors render a
        /// handful of entries before eliding the rest.
        const TRUNCATE = 1 << 3;
        /// Properties, items and metadata together.
        const ALL = Self::PROPERTIES.bits() | Self::ITEMS.bits() | Self::METADATA.bits();
    }
}

/// Knobs shared by every expansion an expander runs.
#[derive(Debug, Clone)]
pub struct ExpansionConfig {
    /// Directory anchoring relative paths.
    pub current_dir: String,
    /// Report unknown static types as missing rather than disallowed.
    /// The invocable set itself never widens; only the failure wording
    /// changes.
    pub enable_all_functions: bool,
    /// Expression nesting budget handed to the parser.
    pub max_nesting_depth: usize,
    /// Character budget per expanded value under
    /// [`ExpanderOptions::TRUNCATE`].
    pub truncation_budget: usize,
}

impl ExpansionConfig {
    /// Configuration anchored at `current_dir` with default limits.
    pub fn rooted_at(current_dir: impl Into<String>) -> Self {
        Self {
            current_dir: current_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            current_dir: ".".to_string(),
            enable_all_functions: false,
            max_nesting_depth: DEFAULT_NESTING_LIMIT,
            truncation_budget: DEFAULT_TRUNCATION_BUDGET,
        }
    }
}
