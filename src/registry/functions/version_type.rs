//! `[System.Version]` members.

use crate::model::{Value, Version};
use crate::registry::args;
use crate::registry::error::{FunctionError, FunctionResult};
use crate::registry::function::{FunctionContext, StaticType};

pub struct VersionFunctions;

impl StaticType for VersionFunctions {
    fn type_names(&self) -> &'static [&'static str] {
        &["System.Version", "Version"]
    }

    fn call(
        &self,
        member: &str,
        operands: &[Value],
        _ctx: &FunctionContext<'_>,
    ) -> FunctionResult<Value> {
        let name = member;
        match member.to_ascii_lowercase().as_str() {
            "parse" => {
                args::exact(name, operands, 1)?;
                Ok(Value::Version(args::version(name, operands, 0)?))
            }
            _ => Err(FunctionError::unknown_member(self.display_name(), member)),
        }
    }

    fn construct(&self, operands: &[Value], _ctx: &FunctionContext<'_>) -> FunctionResult<Value> {
        let name = "new";
        match operands.len() {
            1 => Ok(Value::Version(args::version(name, operands, 0)?)),
            2..=4 => {
                let mut components = Vec::with_capacity(operands.len());
                for index in 0..operands.len() {
                    let component = args::integer(name, operands, index)?;
                    let component = u32::try_from(component).map_err(|_| {
                        FunctionError::InvalidArgument {
                            name: name.to_string(),
                            index: index + 1,
                            expected: "a non-negative version component".to_string(),
                        }
                    })?;
                    components.push(component);
                }
                Ok(Value::Version(Version::new(&components)))
            }
            _ => Err(FunctionError::InvalidArity {
                name: name.to_string(),
                expected: "1 to 4".to_string(),
                actual: operands.len(),
            }),
        }
    }
}
