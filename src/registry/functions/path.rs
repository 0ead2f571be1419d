//! `[System.IO.Path]` members.

use std::path::MAIN_SEPARATOR;

use crate::model::{Value, paths};
use crate::registry::args;
use crate::registry::error::{FunctionError, FunctionResult};
use crate::registry::function::{FunctionContext, StaticType};

pub struct PathFunctions;

impl StaticType for PathFunctions {
    fn type_names(&self) -> &'static [&'static str] {
        &["System.IO.Path", "IO.Path", "Path"]
    }

    fn call(
        &self,
        member: &str,
        operands: &[Value],
        ctx: &FunctionContext<'_>,
    ) -> FunctionResult<Value> {
        let name = member;
        match member.to_ascii_lowercase().as_str() {
            "combine" => {
                args::arity(name, operands, 1, None)?;
                let mut combined = String::new();
                for i in 0..operands.len() {
                    let part = args::string(name, operands, i)?;
                    paths::validate(&part)?;
                    combined = paths::combine(&combined, &part);
                }
                Ok(Value::String(combined))
            }
            "getfullpath" => {
                let path = single_path(name, operands)?;
                Ok(Value::String(paths::absolutize(ctx.current_dir, &path)))
            }
            "getfilename" => {
                let path = single_path(name, operands)?;
                Ok(Value::String(paths::file_name_of(&path).to_string()))
            }
            "getfilenamewithoutextension" => {
                let path = single_path(name, operands)?;
                Ok(Value::String(paths::file_stem_of(&path).to_string()))
            }
            "getextension" => {
                let path = single_path(name, operands)?;
                Ok(Value::String(paths::extension_of(&path).to_string()))
            }
            "getdirectoryname" => {
                let path = single_path(name, operands)?;
                Ok(Value::String(paths::directory_name_of(&path).to_string()))
            }
            "getpathroot" => {
                let path = single_path(name, operands)?;
                Ok(Value::String(paths::root_of(&path).to_string()))
            }
            "haspathextension" | "hasextension" => {
                let path = single_path(name, operands)?;
                Ok(Value::Boolean(!paths::extension_of(&path).is_empty()))
            }
            "ispathrooted" => {
                let path = single_path(name, operands)?;
                Ok(Value::Boolean(paths::is_rooted(&path)))
            }
            "changeextension" => {
                args::exact(name, operands, 2)?;
                let path = args::string(name, operands, 0)?;
                paths::validate(&path)?;
                let stem_end = path.len() - paths::extension_of(&path).len();
                let mut out = path[..stem_end].to_string();
                if let Some(ext) = args::optional_string(name, operands, 1)? {
                    if !ext.is_empty() {
                        if !ext.starts_with('.') {
                            out.push('.');
                        }
                        out.push_str(&ext);
                    }
                }
                Ok(Value::String(out))
            }
            _ => Err(FunctionError::unknown_member(self.display_name(), member)),
        }
    }

    fn property(&self, member: &str, _ctx: &FunctionContext<'_>) -> FunctionResult<Value> {
        match member.to_ascii_lowercase().as_str() {
            "directoryseparatorchar" => Ok(Value::String(MAIN_SEPARATOR.to_string())),
            "altdirectoryseparatorchar" => Ok(Value::String("/".to_string())),
            "pathseparator" => Ok(Value::String(
                if cfg!(windows) { ";" } else { ":" }.to_string(),
            )),
            _ => Err(FunctionError::unknown_member(self.display_name(), member)),
        }
    }
}

fn single_path(name: &str, operands: &[Value]) -> FunctionResult<String> {
    args::exact(name, operands, 1)?;
    let path = args::string(name, operands, 0)?;
    paths::validate(&path)?;
    Ok(path)
}
