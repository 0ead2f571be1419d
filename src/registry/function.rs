//! The static-type provider trait and invocation context.

use crate::diagnostics::ElementLocation;
use crate::model::FileSystem;

use super::error::{FunctionError, FunctionResult};
use crate::model::Value;

/// Ambient state a function may consult while executing.
///
/// Functions are pure with respect to everything except the filesystem
/// handle and the process environment; the context is how path-aware
/// functions learn what "relative" is relative to.
pub struct FunctionContext<'a> {
    /// Directory that anchors relative paths, normally the directory
    /// of the file being evaluated or the process working directory.
    pub current_dir: &'a str,
    /// Filesystem used for probes (`Exists`, file-above searches).
    pub fs: &'a dyn FileSystem,
    /// Where the expression came from, for messages and for functions
    /// that walk upward from "this file".
    pub location: &'a ElementLocation,
}

/// One entry in the closed set of invocable static types.
///
/// A provider owns every member of its type: `call` receives the
/// member name as written and is responsible for matching it
/// case-insensitively, validating arity and coercing arguments. This
/// mirrors how the framework types themselves are organized and keeps
/// each type's overload rules in one place.
pub trait StaticType: Send + Sync {
    /// Accepted spellings, primary name first. Short forms let callers
    /// omit the namespace: `[String]` for `[System.String]`.
    fn type_names(&self) -> &'static [&'static str];

    /// Invoke `Type::member(args...)`.
    fn call(&self, member: &str, args: &[Value], ctx: &FunctionContext<'_>)
    -> FunctionResult<Value>;

    /// Read `Type::Member` without an argument list.
    fn property(&self, member: &str, ctx: &FunctionContext<'_>) -> FunctionResult<Value> {
        let _ = ctx;
        Err(FunctionError::unknown_member(self.display_name(), member))
    }

    /// Invoke `Type::new(args...)`.
    fn construct(&self, args: &[Value], ctx: &FunctionContext<'_>) -> FunctionResult<Value> {
        let _ = (args, ctx);
        Err(FunctionError::unknown_member(self.display_name(), "new"))
    }

    /// Name used in diagnostics.
    fn display_name(&self) -> &'static str {
        self.type_names()[0]
    }
}
