//! Dispatch for `$([Type]::Member(...))` function expressions.
//!
//! Only a fixed allow-list of types is reachable from expressions;
//! everything else is rejected by name before any member lookup
//! happens. The registry maps every accepted spelling of each type,
//! case-insensitively, to its provider.

pub mod args;
mod error;
mod function;
pub mod functions;

use std::sync::Arc;

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::model::Value;

pub use self::error::{FunctionError, FunctionResult};
pub use self::function::{FunctionContext, StaticType};
pub use self::functions::instance::{index_into, invoke_member};

/// The closed set of static types reachable from expressions.
pub struct FunctionRegistry {
    types: FxHashMap<String, Arc<dyn StaticType>>,
}

impl FunctionRegistry {
    /// A registry with no invocable types at all.
    pub fn empty() -> Self {
        Self {
            types: FxHashMap::default(),
        }
    }

    /// The standard provider set.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(functions::intrinsic::IntrinsicFunctions));
        registry.register(Arc::new(functions::math::MathFunctions));
        registry.register(Arc::new(functions::strings::StringFunctions));
        registry.register(Arc::new(functions::path::PathFunctions));
        registry.register(Arc::new(functions::io::FileFunctions));
        registry.register(Arc::new(functions::io::DirectoryFunctions));
        registry.register(Arc::new(functions::environment::EnvironmentFunctions));
        registry.register(Arc::new(functions::regex::RegexFunctions));
        registry.register(Arc::new(functions::version_type::VersionFunctions));
        registry
    }

    /// Add a provider under every spelling it declares. Later
    /// registrations win on name collisions, so hosts can shadow a
    /// standard type.
    pub fn register(&mut self, provider: Arc<dyn StaticType>) {
        for name in provider.type_names() {
            self.types
                .insert(name.to_ascii_lowercase(), Arc::clone(&provider));
        }
    }

    /// Whether `type_name` names an invocable type.
    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(&type_name.to_ascii_lowercase())
    }

    fn provider(&self, type_name: &str) -> FunctionResult<&Arc<dyn StaticType>> {
        self.types
            .get(&type_name.to_ascii_lowercase())
            .ok_or_else(|| FunctionError::UnknownType {
                type_name: type_name.to_string(),
            })
    }

    /// `[Type]::Member(args...)`
    pub fn static_call(
        &self,
        type_name: &str,
        member: &str,
        args: &[Value],
        ctx: &FunctionContext<'_>,
    ) -> FunctionResult<Value> {
        self.provider(type_name)?.call(member, args, ctx)
    }

    /// `[Type]::Member`
    pub fn static_property(
        &self,
        type_name: &str,
        member: &str,
        ctx: &FunctionContext<'_>,
    ) -> FunctionResult<Value> {
        self.provider(type_name)?.property(member, ctx)
    }

    /// `[Type]::new(args...)`
    pub fn construct(
        &self,
        type_name: &str,
        args: &[Value],
        ctx: &FunctionContext<'_>,
    ) -> FunctionResult<Value> {
        self.provider(type_name)?.construct(args, ctx)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Process-wide standard registry, built once and shared.
pub fn shared_registry() -> Arc<FunctionRegistry> {
    static SHARED: Lazy<Arc<FunctionRegistry>> =
        Lazy::new(|| Arc::new(FunctionRegistry::standard()));
    Arc::clone(&SHARED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ElementLocation;
    use crate::model::MockFileSystem;

    fn with_ctx<T>(f: impl FnOnce(&FunctionContext<'_>) -> T) -> T {
        let fs = MockFileSystem::new();
        let location = ElementLocation::in_memory();
        f(&FunctionContext {
            current_dir: "/",
            fs: &fs,
            location: &location,
        })
    }

    #[test]
    fn aliases_and_case_do_not_matter() {
        let registry = FunctionRegistry::standard();
        for spelling in ["System.String", "string", "SYSTEM.STRING"] {
            assert!(registry.contains(spelling), "missing {spelling}");
        }
        let out = with_ctx(|ctx| {
            registry.static_call("string", "Concat", &["a".into(), "b".into()], ctx)
        })
        .unwrap();
        assert_eq!(out.render(), "ab");
    }

    #[test]
    fn unknown_types_are_rejected_by_name() {
        let registry = FunctionRegistry::standard();
        let err = with_ctx(|ctx| registry.static_call("System.Diagnostics.Process", "Start", &[], ctx))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "the type '[System.Diagnostics.Process]' is not allowed in property function expressions"
        );
    }

    #[test]
    fn hosts_can_register_their_own_providers() {
        struct Greeter;
        impl StaticType for Greeter {
            fn type_names(&self) -> &'static [&'static str] {
                &["Demo.Greeter", "Greeter"]
            }
            fn call(
                &self,
                member: &str,
                _args: &[Value],
                _ctx: &FunctionContext<'_>,
            ) -> FunctionResult<Value> {
                match member.to_ascii_lowercase().as_str() {
                    "hello" => Ok("hi".into()),
                    _ => Err(FunctionError::unknown_member(self.display_name(), member)),
                }
            }
        }

        let mut registry = FunctionRegistry::standard();
        registry.register(Arc::new(Greeter));
        let out = with_ctx(|ctx| registry.static_call("greeter", "Hello", &[], ctx)).unwrap();
        assert_eq!(out.render(), "hi");
    }

    #[test]
    fn shared_registry_is_one_instance() {
        assert!(Arc::ptr_eq(&shared_registry(), &shared_registry()));
    }
}
