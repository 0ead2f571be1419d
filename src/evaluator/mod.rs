//! Staged expansion of `$()`, `@()` and `%()` references.
//!
//! The [`Expander`] replaces references in up to three passes over the
//! text: metadata first, then properties, then item vectors. Each pass
//! scans the previous pass's output, so a property value that splices
//! vector syntax is picked up by the item pass, while `%()` regions
//! inside `@(...)` are left for per-item evaluation during transforms.
//! All intermediate composition happens in the escaped domain; callers
//! choose between escaped and decoded results at the entry points.

mod error;
mod expander;
mod options;

pub use error::{ExpansionError, ExpansionResult};
pub use expander::{Expander, ItemFactory, TypedItemFactory};
pub use options::{
    DEFAULT_NESTING_LIMIT, DEFAULT_TRUNCATION_BUDGET, ExpanderOptions, ExpansionConfig,
};
