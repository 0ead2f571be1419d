//! `[System.Math]` members.

use crate::model::Value;
use crate::registry::args;
use crate::registry::error::{FunctionError, FunctionResult};
use crate::registry::function::{FunctionContext, StaticType};

pub struct MathFunctions;

impl StaticType for MathFunctions {
    fn type_names(&self) -> &'static [&'static str] {
        &["System.Math", "Math"]
    }

    fn call(
        &self,
        member: &str,
        operands: &[Value],
        _ctx: &FunctionContext<'_>,
    ) -> FunctionResult<Value> {
        let name = member;
        match member.to_ascii_lowercase().as_str() {
            // Min/Max/Abs preserve integrality when the inputs have it.
            "min" => pairwise(name, operands, i64::min, f64::min),
            "max" => pairwise(name, operands, i64::max, f64::max),
            "abs" => {
                args::exact(name, operands, 1)?;
                if operands[0].looks_like_integer() {
                    let v = args::integer(name, operands, 0)?;
                    Ok(Value::Integer(v.wrapping_abs()))
                } else {
                    Ok(Value::Double(args::double(name, operands, 0)?.abs()))
                }
            }
            "floor" => unary_double(name, operands, f64::floor),
            "ceiling" => unary_double(name, operands, f64::ceil),
            "sqrt" => unary_double(name, operands, f64::sqrt),
            "exp" => unary_double(name, operands, f64::exp),
            "round" => {
                args::arity(name, operands, 1, Some(2))?;
                let value = args::double(name, operands, 0)?;
                match args::optional_integer(name, operands, 1)? {
                    None => Ok(Value::Double(round_half_even(value, 0))),
                    Some(digits) => {
                        let digits = u32::try_from(digits).map_err(|_| {
                            FunctionError::InvalidArgument {
                                name: name.to_string(),
                                index: 2,
                                expected: "a non-negative digit count".to_string(),
                            }
                        })?;
                        Ok(Value::Double(round_half_even(value, digits)))
                    }
                }
            }
            "pow" => {
                args::exact(name, operands, 2)?;
                let base = args::double(name, operands, 0)?;
                let exponent = args::double(name, operands, 1)?;
                Ok(Value::Double(base.powf(exponent)))
            }
            "log" => {
                args::arity(name, operands, 1, Some(2))?;
                let value = args::double(name, operands, 0)?;
                if operands.len() == 2 {
                    Ok(Value::Double(value.log(args::double(name, operands, 1)?)))
                } else {
                    Ok(Value::Double(value.ln()))
                }
            }
            "log10" => unary_double(name, operands, f64::log10),
            "truncate" => unary_double(name, operands, f64::trunc),
            _ => Err(FunctionError::unknown_member(self.display_name(), member)),
        }
    }
}

fn unary_double(
    name: &str,
    operands: &[Value],
    op: impl Fn(f64) -> f64,
) -> FunctionResult<Value> {
    args::exact(name, operands, 1)?;
    Ok(Value::Double(op(args::double(name, operands, 0)?)))
}

fn pairwise(
    name: &str,
    operands: &[Value],
    int_op: impl Fn(i64, i64) -> i64,
    double_op: impl Fn(f64, f64) -> f64,
) -> FunctionResult<Value> {
    args::exact(name, operands, 2)?;
    if operands[0].looks_like_integer() && operands[1].looks_like_integer() {
        let a = args::integer(name, operands, 0)?;
        let b = args::integer(name, operands, 1)?;
        Ok(Value::Integer(int_op(a, b)))
    } else {
        let a = args::double(name, operands, 0)?;
        let b = args::double(name, operands, 1)?;
        Ok(Value::Double(double_op(a, b)))
    }
}

/// Banker's rounding, the framework default.
fn round_half_even(value: f64, digits: u32) -> f64 {
    let scale = 10f64.powi(digits as i32);
    let scaled = value * scale;
    let floor = scaled.floor();
    let diff = scaled - floor;
    let rounded = if (diff - 0.5).abs() < f64::EPSILON {
        if (floor as i64) % 2 == 0 { floor } else { floor + 1.0 }
    } else {
        scaled.round()
    };
    rounded / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ElementLocation;
    use crate::model::MockFileSystem;

    fn call(member: &str, operands: &[Value]) -> FunctionResult<Value> {
        let fs = MockFileSystem::new();
        let location = ElementLocation::in_memory();
        MathFunctions.call(
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
    fn min_max_keep_integer_track() {
        assert_eq!(
            call("Min", &["3".into(), "7".into()]).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            call("Max", &["3.5".into(), "7".into()]).unwrap(),
            Value::Double(7.0)
        );
    }

    #[test]
    fn rounding_is_half_even() {
        assert_eq!(call("Round", &["2.5".into()]).unwrap().render(), "2");
        assert_eq!(call("Round", &["3.5".into()]).unwrap().render(), "4");
        assert_eq!(
            call("Round", &["2.346".into(), "2".into()]).unwrap().render(),
            "2.35"
        );
    }

    #[test]
    fn floor_ceiling_pow() {
        assert_eq!(call("Floor", &["3.9".into()]).unwrap().render(), "3");
        assert_eq!(call("Ceiling", &["3.1".into()]).unwrap().render(), "4");
        assert_eq!(call("Pow", &["2".into(), "10".into()]).unwrap().render(), "1024");
    }

    #[test]
    fn abs_handles_both_tracks() {
        assert_eq!(call("Abs", &["-4".into()]).unwrap(), Value::Integer(4));
        assert_eq!(call("Abs", &["-4.5".into()]).unwrap(), Value::Double(4.5));
    }
}
