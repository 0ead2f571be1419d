//! `[System.Environment]` members.

use crate::model::Value;
use crate::registry::args;
use crate::registry::error::{FunctionError, FunctionResult};
use crate::registry::function::{FunctionContext, StaticType};

pub struct EnvironmentFunctions;

impl StaticType for EnvironmentFunctions {
    fn type_names(&self) -> &'static [&'static str] {
        &["System.Environment", "Environment"]
    }

    fn call(
        &self,
        member: &str,
        operands: &[Value],
        _ctx: &FunctionContext<'_>,
    ) -> FunctionResult<Value> {
        let name = member;
        match member.to_ascii_lowercase().as_str() {
            // Unset variables read as empty, matching how property
            // fallbacks behave elsewhere.
            "getenvironmentvariable" => {
                args::exact(name, operands, 1)?;
                let variable = args::string(name, operands, 0)?;
                Ok(Value::String(std::env::var(&variable).unwrap_or_default()))
            }
            _ => Err(FunctionError::unknown_member(self.display_name(), member)),
        }
    }

    fn property(&self, member: &str, ctx: &FunctionContext<'_>) -> FunctionResult<Value> {
        match member.to_ascii_lowercase().as_str() {
            "newline" => Ok(Value::String(
                if cfg!(windows) { "\r\n" } else { "\n" }.to_string(),
            )),
            "currentdirectory" => Ok(Value::String(ctx.current_dir.to_string())),
            "machinename" => Ok(Value::String(
                std::env::var("COMPUTERNAME")
                    .or_else(|_| std::env::var("HOSTNAME"))
                    .unwrap_or_default(),
            )),
            "username" => Ok(Value::String(
                std::env::var("USERNAME")
                    .or_else(|_| std::env::var("USER"))
                    .unwrap_or_default(),
            )),
            "is64bitoperatingsystem" | "is64bitprocess" => {
                Ok(Value::Boolean(cfg!(target_pointer_width = "64")))
            }
            "processorcount" => Ok(Value::Integer(
                std::thread::available_parallelism()
                    .map(|n| n.get() as i64)
                    .unwrap_or(1),
            )),
            _ => Err(FunctionError::unknown_member(self.display_name(), member)),
        }
    }
}
