//! MSBuild-style expression expansion in Rust
//!
//! Staged expansion of `$(property)`, `@(item)` and `%(metadata)`
//! references: property functions, item transform pipelines, percent
//! escaping and wildcard item specs with lazy filesystem walks.

pub mod ast;
pub mod diagnostics;
pub mod engine;
pub mod evaluator;
pub mod itemspec;
pub mod model;
pub mod parser;
pub mod registry;
pub mod transform;

// Re-export main types
pub use diagnostics::ElementLocation;
pub use engine::ExpansionEngine;
pub use evaluator::{Expander, ExpanderOptions, ExpansionConfig, ExpansionError, ExpansionResult};
pub use itemspec::{ItemSpec, ItemSpecContext, SpecMatch};
pub use model::{FileSystem, Item, MetadataTable, ProjectData, Value};
pub use parser::SyntaxError;
pub use registry::FunctionRegistry;
