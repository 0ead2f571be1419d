//! `[System.IO.File]` and `[System.IO.Directory]` members.
//!
//! Only read-only operations are exposed; expansion never mutates the
//! filesystem. Paths resolve against the context's current directory
//! and all probes go through the [`FileSystem`](crate::model::FileSystem)
//! trait so they can be mocked.

use std::path::Path;

use crate::model::{Value, paths};
use crate::registry::args;
use crate::registry::error::{FunctionError, FunctionResult};
use crate::registry::function::{FunctionContext, StaticType};

pub struct FileFunctions;

impl StaticType for FileFunctions {
    fn type_names(&self) -> &'static [&'static str] {
        &["System.IO.File", "IO.File", "File"]
    }

    fn call(
        &self,
        member: &str,
        operands: &[Value],
        ctx: &FunctionContext<'_>,
    ) -> FunctionResult<Value> {
        let name = member;
        match member.to_ascii_lowercase().as_str() {
            "exists" => {
                let path = resolved_path(name, operands, ctx)?;
                Ok(Value::Boolean(ctx.fs.file_exists(Path::new(&path))))
            }
            "readalltext" => {
                let path = resolved_path(name, operands, ctx)?;
                ctx.fs
                    .read_file(Path::new(&path))
                    .map(Value::String)
                    .ok_or_else(|| {
                        FunctionError::evaluation(name, format!("could not read '{path}'"))
                    })
            }
            _ => Err(FunctionError::unknown_member(self.display_name(), member)),
        }
    }
}

pub struct DirectoryFunctions;

impl StaticType for DirectoryFunctions {
    fn type_names(&self) -> &'static [&'static str] {
        &["System.IO.Directory", "IO.Directory", "Directory"]
    }

    fn call(
        &self,
        member: &str,
        operands: &[Value],
        ctx: &FunctionContext<'_>,
    ) -> FunctionResult<Value> {
        let name = member;
        match member.to_ascii_lowercase().as_str() {
            "exists" => {
                let path = resolved_path(name, operands, ctx)?;
                Ok(Value::Boolean(ctx.fs.dir_exists(Path::new(&path))))
            }
            "getparent" => {
                let path = resolved_path(name, operands, ctx)?;
                Ok(Value::String(paths::directory_name_of(&path).to_string()))
            }
            _ => Err(FunctionError::unknown_member(self.display_name(), member)),
        }
    }
}

fn resolved_path(
    name: &str,
    operands: &[Value],
    ctx: &FunctionContext<'_>,
) -> FunctionResult<String> {
    args::exact(name, operands, 1)?;
    let raw = args::string(name, operands, 0)?;
    paths::validate(&raw)?;
    Ok(paths::absolutize(ctx.current_dir, &raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ElementLocation;
    use crate::model::MockFileSystem;

    #[test]
    fn existence_probes_resolve_relative_paths() {
        let fs = MockFileSystem::new();
        fs.add_file("/work/conf/app.config");
        let location = ElementLocation::in_memory();
        let ctx = FunctionContext {
            current_dir: "/work",
            fs: &fs,
            location: &location,
        };

        let hit = FileFunctions
            .call("Exists", &["conf/app.config".into()], &ctx)
            .unwrap();
        assert_eq!(hit.render(), "True");
        let miss = FileFunctions
            .call("Exists", &["conf/missing".into()], &ctx)
            .unwrap();
        assert_eq!(miss.render(), "False");
        let dir = DirectoryFunctions.call("Exists", &["conf".into()], &ctx).unwrap();
        assert_eq!(dir.render(), "True");
    }

    #[test]
    fn read_all_text() {
        let fs = MockFileSystem::new();
        fs.add_file_with_content("/work/version.txt", "1.2.3");
        let location = ElementLocation::in_memory();
        let ctx = FunctionContext {
            current_dir: "/work",
            fs: &fs,
            location: &location,
        };
        let text = FileFunctions
            .call("ReadAllText", &["version.txt".into()], &ctx)
            .unwrap();
        assert_eq!(text.render(), "1.2.3");
        assert!(FileFunctions.call("ReadAllText", &["nope.txt".into()], &ctx).is_err());
    }
}
