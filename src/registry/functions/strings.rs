//! `[System.String]` static members.

use crate::model::Value;
use crate::registry::args;
use crate::registry::error::{FunctionError, FunctionResult};
use crate::registry::function::{FunctionContext, StaticType};

pub struct StringFunctions;

impl StaticType for StringFunctions {
    fn type_names(&self) -> &'static [&'static str] {
        &["System.String", "String"]
    }

    fn call(
        &self,
        member: &str,
        operands: &[Value],
        _ctx: &FunctionContext<'_>,
    ) -> FunctionResult<Value> {
        let name = member;
        match member.to_ascii_lowercase().as_str() {
            "isnullorempty" => {
                args::exact(name, operands, 1)?;
                Ok(Value::Boolean(operands[0].render().is_empty()))
            }
            "isnullorwhitespace" => {
                args::exact(name, operands, 1)?;
                Ok(Value::Boolean(operands[0].render().trim().is_empty()))
            }
            "concat" => {
                let mut out = String::new();
                for operand in operands {
                    out.push_str(&operand.render());
                }
                Ok(Value::String(out))
            }
            "join" => {
                args::arity(name, operands, 2, None)?;
                let separator = args::string(name, operands, 0)?;
                let parts: Vec<String> = match &operands[1] {
                    // Join(sep, list) — the usual partner of Split.
                    Value::List(items) if operands.len() == 2 => {
                        items.iter().map(Value::render).collect()
                    }
                    _ => operands[1..].iter().map(Value::render).collect(),
                };
                Ok(Value::String(parts.join(&separator)))
            }
            "format" => {
                args::arity(name, operands, 1, None)?;
                let template = args::string(name, operands, 0)?;
                format_positional(name, &template, &operands[1..]).map(Value::String)
            }
            "copy" => {
                args::exact(name, operands, 1)?;
                Ok(Value::String(args::string(name, operands, 0)?))
            }
            "equals" => {
                args::arity(name, operands, 2, Some(3))?;
                let a = args::string(name, operands, 0)?;
                let b = args::string(name, operands, 1)?;
                let cmp = args::string_comparison(name, operands, 2)?;
                Ok(Value::Boolean(if cmp.ignores_case() {
                    a.eq_ignore_ascii_case(&b)
                } else {
                    a == b
                }))
            }
            "compare" => {
                args::arity(name, operands, 2, Some(3))?;
                let a = args::string(name, operands, 0)?;
                let b = args::string(name, operands, 1)?;
                let cmp = args::string_comparison(name, operands, 2)?;
                let ordering = if cmp.ignores_case() {
                    a.to_lowercase().cmp(&b.to_lowercase())
                } else {
                    a.cmp(&b)
                };
                Ok(Value::Integer(match ordering {
                    std::cmp::Ordering::Less => -1,
                    std::cmp::Ordering::Equal => 0,
                    std::cmp::Ordering::Greater => 1,
                }))
            }
            _ => Err(FunctionError::unknown_member(self.display_name(), member)),
        }
    }

    fn construct(&self, operands: &[Value], _ctx: &FunctionContext<'_>) -> FunctionResult<Value> {
        args::arity("String constructor", operands, 0, Some(1))?;
        match operands.first() {
            None => Ok(Value::String(String::new())),
            Some(v) => Ok(Value::String(v.render())),
        }
    }
}

/// `{0}`-style positional formatting. Doubled braces escape; format
/// specifiers after `:` are not supported.
fn format_positional(name: &str, template: &str, fill: &[Value]) -> FunctionResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    digits.push(*d);
                    chars.next();
                }
                match chars.next() {
                    Some('}') if !digits.is_empty() => {
                        let index: usize = digits.parse().map_err(|_| {
                            FunctionError::evaluation(name, "format placeholder is not a number")
                        })?;
                        let value = fill.get(index).ok_or_else(|| {
                            FunctionError::evaluation(
                                name,
                                format!("no argument for placeholder {{{index}}}"),
                            )
                        })?;
                        out.push_str(&value.render());
                    }
                    _ => {
                        return Err(FunctionError::evaluation(
                            name,
                            "malformed format placeholder",
                        ));
                    }
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ElementLocation;
    use crate::model::MockFileSystem;

    fn call(member: &str, operands: &[Value]) -> FunctionResult<Value> {
        let fs = MockFileSystem::new();
        let location = ElementLocation::in_memory();
        StringFunctions.call(
            member,
            operands,
            &FunctionContext {
                current_dir: "/",
                fs: &fs,
                location: &location,
            },
        )
    }

    #[test]
    fn null_and_whitespace_probes() {
        assert_eq!(call("IsNullOrEmpty", &[Value::Empty]).unwrap().render(), "True");
        assert_eq!(call("IsNullOrEmpty", &["x".into()]).unwrap().render(), "False");
        assert_eq!(
            call("IsNullOrWhiteSpace", &["  \t ".into()]).unwrap().render(),
            "True"
        );
    }

    #[test]
    fn concat_and_join() {
        assert_eq!(
            call("Concat", &["a".into(), "b".into(), "c".into()]).unwrap().render(),
            "abc"
        );
        assert_eq!(
            call("Join", &["-".into(), "a".into(), "b".into()]).unwrap().render(),
            "a-b"
        );
        let list = Value::List(vec!["x".into(), "y".into()]);
        assert_eq!(call("Join", &[", ".into(), list]).unwrap().render(), "x, y");
    }

    #[test]
    fn positional_format() {
        assert_eq!(
            call("Format", &["{0}-{1}-{0}".into(), "a".into(), "b".into()])
                .unwrap()
                .render(),
            "a-b-a"
        );
        assert_eq!(
            call("Format", &["{{literal}} {0}".into(), "x".into()]).unwrap().render(),
            "{literal} x"
        );
        assert!(call("Format", &["{9}".into(), "x".into()]).is_err());
    }

    #[test]
    fn equality_with_comparison_mode() {
        assert_eq!(
            call("Equals", &["ABC".into(), "abc".into(), "OrdinalIgnoreCase".into()])
                .unwrap()
                .render(),
            "True"
        );
        assert_eq!(
            call("Equals", &["ABC".into(), "abc".into()]).unwrap().render(),
            "False"
        );
    }

    #[test]
    fn constructor_copies_text() {
        let fs = MockFileSystem::new();
        let location = ElementLocation::in_memory();
        let ctx = FunctionContext {
            current_dir: "/",
            fs: &fs,
            location: &location,
        };
        assert_eq!(
            StringFunctions.construct(&["seed".into()], &ctx).unwrap().render(),
            "seed"
        );
        assert_eq!(StringFunctions.construct(&[], &ctx).unwrap().render(), "");
    }
}
