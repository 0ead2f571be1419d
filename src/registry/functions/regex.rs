//! `[System.Text.RegularExpressions.Regex]` members.

use regex::RegexBuilder;

use crate::model::Value;
use crate::registry::args::{self, RegexFlags};
use crate::registry::error::{FunctionError, FunctionResult};
use crate::registry::function::{FunctionContext, StaticType};

pub struct RegexFunctions;

fn build(name: &str, pattern: &str, flags: RegexFlags) -> FunctionResult<regex::Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(flags.ignore_case)
        .multi_line(flags.multiline)
        .dot_matches_new_line(flags.singleline)
        .ignore_whitespace(flags.ignore_pattern_whitespace)
        .build()
        .map_err(|e| FunctionError::evaluation(name, e.to_string()))
}

impl StaticType for RegexFunctions {
    fn type_names(&self) -> &'static [&'static str] {
        &[
            "System.Text.RegularExpressions.Regex",
            "Text.RegularExpressions.Regex",
            "Regex",
        ]
    }

    fn call(
        &self,
        member: &str,
        operands: &[Value],
        _ctx: &FunctionContext<'_>,
    ) -> FunctionResult<Value> {
        let name = member;
        match member.to_ascii_lowercase().as_str() {
            "ismatch" => {
                args::arity(name, operands, 2, Some(3))?;
                let input = args::string(name, operands, 0)?;
                let pattern = args::string(name, operands, 1)?;
                let flags = args::regex_flags(name, operands, 2)?;
                Ok(Value::Boolean(build(name, &pattern, flags)?.is_match(&input)))
            }
            "replace" => {
                args::arity(name, operands, 3, Some(4))?;
                let input = args::string(name, operands, 0)?;
                let pattern = args::string(name, operands, 1)?;
                let replacement = args::string(name, operands, 2)?;
                let flags = args::regex_flags(name, operands, 3)?;
                let re = build(name, &pattern, flags)?;
                Ok(Value::String(
                    re.replace_all(&input, replacement.as_str()).into_owned(),
                ))
            }
            "split" => {
                args::arity(name, operands, 2, Some(3))?;
                let input = args::string(name, operands, 0)?;
                let pattern = args::string(name, operands, 1)?;
                let flags = args::regex_flags(name, operands, 2)?;
                let re = build(name, &pattern, flags)?;
                Ok(Value::List(
                    re.split(&input).map(|s| Value::String(s.to_string())).collect(),
                ))
            }
            "escape" => {
                args::exact(name, operands, 1)?;
                Ok(Value::String(regex::escape(&args::string(name, operands, 0)?)))
            }
            _ => Err(FunctionError::unknown_member(self.display_name(), member)),
        }
    }
}
