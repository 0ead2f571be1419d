//! Providers for the closed set of invocable static types.
//!
//! Each submodule owns one framework type (or a small family): the
//! `[MSBuild]` intrinsics, `[System.Math]`, `[System.String]`, the
//! `System.IO` types, `[System.Environment]`, regular expressions and
//! `[System.Version]`. [`instance`] is different in kind: it dispatches
//! members on intermediate *values* rather than on named types.

pub mod environment;
pub mod instance;
pub mod intrinsic;
pub mod io;
pub mod math;
pub mod path;
pub mod regex;
pub mod strings;
pub mod version_type;
