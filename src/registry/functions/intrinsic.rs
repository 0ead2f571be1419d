//! The `[MSBuild]` intrinsic function set.
//!
//! Arithmetic follows the two-track rule: when every operand is an
//! integer or a string that parses as one, math runs on `i64` with
//! wraparound; otherwise operands are re-read as doubles and the
//! result is floating point. Integer division by zero is an error, not
//! a NaN.

use std::hash::Hasher;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rustc_hash::FxHasher;

use crate::model::{Value, escaping, paths};
use crate::registry::args;
use crate::registry::error::{FunctionError, FunctionResult};
use crate::registry::function::{FunctionContext, StaticType};

pub struct IntrinsicFunctions;

enum Numbers {
    Longs(i64, i64),
    Doubles(f64, f64),
}

/// Read the canonical two-operand numeric pair.
fn numeric_pair(name: &str, operands: &[Value]) -> FunctionResult<Numbers> {
    args::exact(name, operands, 2)?;
    let (a, b) = (&operands[0], &operands[1]);
    if a.looks_like_integer() && b.looks_like_integer() {
        // Both fit i64; unwraps cannot fail after looks_like_integer.
        return Ok(Numbers::Longs(
            a.to_i64().unwrap_or_default(),
            b.to_i64().unwrap_or_default(),
        ));
    }
    let da = args::double(name, operands, 0)?;
    let db = args::double(name, operands, 1)?;
    Ok(Numbers::Doubles(da, db))
}

fn nonzero(name: &str, divisor: i64) -> FunctionResult<i64> {
    if divisor == 0 {
        Err(FunctionError::evaluation(name, "attempt to divide by zero"))
    } else {
        Ok(divisor)
    }
}

/// Shift counts mask to the low six bits, like 64-bit shifts do in the
/// source language.
fn shift_amount(name: &str, operands: &[Value], index: usize) -> FunctionResult<u32> {
    Ok((args::integer(name, operands, index)? & 0x3f) as u32)
}

fn stable_hash(text: &str) -> i64 {
    let mut hasher = FxHasher::default();
    hasher.write(text.as_bytes());
    hasher.finish() as i64
}

fn os_platform_matches(name: &str) -> bool {
    match name.trim().to_ascii_uppercase().as_str() {
        "WINDOWS" => cfg!(windows),
        "LINUX" => cfg!(target_os = "linux"),
        "OSX" | "MACOS" => cfg!(target_os = "macos"),
        "FREEBSD" => cfg!(target_os = "freebsd"),
        "NETBSD" => cfg!(target_os = "netbsd"),
        "OPENBSD" => cfg!(target_os = "openbsd"),
        "ANDROID" => cfg!(target_os = "android"),
        "IOS" => cfg!(target_os = "ios"),
        // Unknown platform names compare unequal rather than failing.
        _ => false,
    }
}

/// Walk from `start_dir` toward the root looking for `file_name`,
/// returning the directory that contains it, or `""`.
fn find_file_above(
    name: &str,
    ctx: &FunctionContext<'_>,
    start_dir: &str,
    file_name: &str,
) -> FunctionResult<String> {
    if file_name.is_empty() || file_name.bytes().any(paths::is_separator) {
        return Err(FunctionError::evaluation(
            name,
            format!("'{file_name}' must be a bare file name"),
        ));
    }
    let mut dir = paths::absolutize(ctx.current_dir, start_dir);
    loop {
        let candidate = paths::combine(&dir, file_name);
        if ctx.fs.file_exists(Path::new(&candidate)) {
            return Ok(dir);
        }
        let parent = paths::directory_name_of(&dir).to_string();
        if parent.is_empty() || parent == dir {
            return Ok(String::new());
        }
        dir = parent;
    }
}

/// Default starting directory for the file-above searches: the
/// directory of the file being evaluated.
fn this_file_dir(name: &str, ctx: &FunctionContext<'_>) -> FunctionResult<String> {
    if !ctx.location.is_file_backed() {
        return Err(FunctionError::evaluation(
            name,
            "there is no containing file to search from in this context",
        ));
    }
    Ok(paths::directory_name_of(ctx.location.file()).to_string())
}

impl StaticType for IntrinsicFunctions {
    fn type_names(&self) -> &'static [&'static str] {
        &["MSBuild"]
    }

    fn call(
        &self,
        member: &str,
        operands: &[Value],
        ctx: &FunctionContext<'_>,
    ) -> FunctionResult<Value> {
        let name = member;
        match member.to_ascii_lowercase().as_str() {
            "add" => Ok(match numeric_pair(name, operands)? {
                Numbers::Longs(a, b) => Value::Integer(a.wrapping_add(b)),
                Numbers::Doubles(a, b) => Value::Double(a + b),
            }),
            "subtract" => Ok(match numeric_pair(name, operands)? {
                Numbers::Longs(a, b) => Value::Integer(a.wrapping_sub(b)),
                Numbers::Doubles(a, b) => Value::Double(a - b),
            }),
            "multiply" => Ok(match numeric_pair(name, operands)? {
                Numbers::Longs(a, b) => Value::Integer(a.wrapping_mul(b)),
                Numbers::Doubles(a, b) => Value::Double(a * b),
            }),
            "divide" => Ok(match numeric_pair(name, operands)? {
                Numbers::Longs(a, b) => Value::Integer(a.wrapping_div(nonzero(name, b)?)),
                Numbers::Doubles(a, b) => Value::Double(a / b),
            }),
            "modulo" => Ok(match numeric_pair(name, operands)? {
                Numbers::Longs(a, b) => Value::Integer(a.wrapping_rem(nonzero(name, b)?)),
                Numbers::Doubles(a, b) => Value::Double(a % b),
            }),

            "bitwiseand" => {
                args::exact(name, operands, 2)?;
                Ok(Value::Integer(
                    args::integer(name, operands, 0)? & args::integer(name, operands, 1)?,
                ))
            }
            "bitwiseor" => {
                args::exact(name, operands, 2)?;
                Ok(Value::Integer(
                    args::integer(name, operands, 0)? | args::integer(name, operands, 1)?,
                ))
            }
            "bitwisexor" => {
                args::exact(name, operands, 2)?;
                Ok(Value::Integer(
                    args::integer(name, operands, 0)? ^ args::integer(name, operands, 1)?,
                ))
            }
            "bitwisenot" => {
                args::exact(name, operands, 1)?;
                Ok(Value::Integer(!args::integer(name, operands, 0)?))
            }
            "leftshift" => {
                args::exact(name, operands, 2)?;
                let a = args::integer(name, operands, 0)?;
                Ok(Value::Integer(a.wrapping_shl(shift_amount(name, operands, 1)?)))
            }
            "rightshift" => {
                args::exact(name, operands, 2)?;
                let a = args::integer(name, operands, 0)?;
                Ok(Value::Integer(a.wrapping_shr(shift_amount(name, operands, 1)?)))
            }
            "rightshiftunsigned" => {
                args::exact(name, operands, 2)?;
                let a = args::integer(name, operands, 0)? as u64;
                Ok(Value::Integer(
                    (a.wrapping_shr(shift_amount(name, operands, 1)?)) as i64,
                ))
            }

            "versionequals" => version_compare(name, operands, |o| o == std::cmp::Ordering::Equal),
            "versionnotequals" => {
                version_compare(name, operands, |o| o != std::cmp::Ordering::Equal)
            }
            "versiongreaterthan" => {
                version_compare(name, operands, |o| o == std::cmp::Ordering::Greater)
            }
            "versiongreaterthanorequals" => {
                version_compare(name, operands, |o| o != std::cmp::Ordering::Less)
            }
            "versionlessthan" => version_compare(name, operands, |o| o == std::cmp::Ordering::Less),
            "versionlessthanorequals" => {
                version_compare(name, operands, |o| o != std::cmp::Ordering::Greater)
            }

            "escape" => {
                args::exact(name, operands, 1)?;
                let text = args::string(name, operands, 0)?;
                Ok(Value::String(escaping::escape(&text).into_owned()))
            }
            "unescape" => {
                args::exact(name, operands, 1)?;
                let text = args::string(name, operands, 0)?;
                Ok(Value::String(escaping::unescape(&text).into_owned()))
            }
            "valueordefault" => {
                args::exact(name, operands, 2)?;
                let value = args::string(name, operands, 0)?;
                if value.is_empty() {
                    Ok(Value::String(args::string(name, operands, 1)?))
                } else {
                    Ok(Value::String(value))
                }
            }
            "converttobase64" => {
                args::exact(name, operands, 1)?;
                let text = args::string(name, operands, 0)?;
                Ok(Value::String(BASE64.encode(text.as_bytes())))
            }
            "convertfrombase64" => {
                args::exact(name, operands, 1)?;
                let text = args::string(name, operands, 0)?;
                let bytes = BASE64
                    .decode(text.trim())
                    .map_err(|e| FunctionError::evaluation(name, e.to_string()))?;
                String::from_utf8(bytes)
                    .map(Value::String)
                    .map_err(|e| FunctionError::evaluation(name, e.to_string()))
            }
            "stablestringhash" => {
                args::exact(name, operands, 1)?;
                Ok(Value::Integer(stable_hash(&args::string(name, operands, 0)?)))
            }
            "isosplatform" => {
                args::exact(name, operands, 1)?;
                let platform = args::string(name, operands, 0)?;
                Ok(Value::Boolean(os_platform_matches(&platform)))
            }
            "isosunixlike" => {
                args::exact(name, operands, 0)?;
                Ok(Value::Boolean(cfg!(unix)))
            }

            "ensuretrailingslash" => {
                args::exact(name, operands, 1)?;
                let path = args::string(name, operands, 0)?;
                Ok(Value::String(paths::ensure_trailing_slash(&path).into_owned()))
            }
            "normalizepath" => {
                args::arity(name, operands, 1, None)?;
                let joined = join_operands(name, operands)?;
                paths::validate(&joined)?;
                Ok(Value::String(paths::absolutize(ctx.current_dir, &joined)))
            }
            "normalizedirectory" => {
                args::arity(name, operands, 1, None)?;
                let joined = join_operands(name, operands)?;
                paths::validate(&joined)?;
                let normalized = paths::absolutize(ctx.current_dir, &joined);
                Ok(Value::String(
                    paths::ensure_trailing_slash(&normalized).into_owned(),
                ))
            }
            "makerelative" => {
                args::exact(name, operands, 2)?;
                let base = args::string(name, operands, 0)?;
                let target = args::string(name, operands, 1)?;
                Ok(Value::String(paths::make_relative(&base, &target)))
            }
            "getdirectorynameoffileabove" => {
                args::exact(name, operands, 2)?;
                let start = args::string(name, operands, 0)?;
                let file = args::string(name, operands, 1)?;
                find_file_above(name, ctx, &start, &file).map(Value::String)
            }
            "getpathoffileabove" => {
                args::arity(name, operands, 1, Some(2))?;
                let file = args::string(name, operands, 0)?;
                let start = match args::optional_string(name, operands, 1)? {
                    Some(dir) if !dir.is_empty() => dir,
                    _ => this_file_dir(name, ctx)?,
                };
                let dir = find_file_above(name, ctx, &start, &file)?;
                if dir.is_empty() {
                    Ok(Value::String(String::new()))
                } else {
                    Ok(Value::String(paths::combine(&dir, &file)))
                }
            }

            _ => Err(FunctionError::unknown_member(self.display_name(), member)),
        }
    }
}

fn version_compare(
    name: &str,
    operands: &[Value],
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> FunctionResult<Value> {
    args::exact(name, operands, 2)?;
    let a = args::version(name, operands, 0)?;
    let b = args::version(name, operands, 1)?;
    Ok(Value::Boolean(accept(a.cmp(&b))))
}

fn join_operands(name: &str, operands: &[Value]) -> FunctionResult<String> {
    let mut joined = String::new();
    for i in 0..operands.len() {
        joined = paths::combine(&joined, &args::string(name, operands, i)?);
    }
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ElementLocation;
    use crate::model::MockFileSystem;

    fn ctx<'a>(fs: &'a MockFileSystem, location: &'a ElementLocation) -> FunctionContext<'a> {
        FunctionContext {
            current_dir: "/work",
            fs,
            location,
        }
    }

    fn call(member: &str, operands: &[Value]) -> FunctionResult<Value> {
        let fs = MockFileSystem::new();
        let location = ElementLocation::in_memory();
        IntrinsicFunctions.call(member, operands, &ctx(&fs, &location))
    }

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    #[test]
    fn add_integers_stays_integral() {
        assert_eq!(call("Add", &[s("40"), s("2")]).unwrap().render(), "42");
    }

    #[test]
    fn add_wraps_at_integer_maximum() {
        let max = i64::MAX.to_string();
        let result = call("Add", &[s(&max), s("1")]).unwrap();
        assert_eq!(result, Value::Integer(i64::MIN));
    }

    #[test]
    fn fractional_operand_promotes_to_double() {
        assert_eq!(call("Add", &[s("40.5"), s("2")]).unwrap().render(), "42.5");
        // Beyond i64 range the integer track is abandoned too; the sum
        // renders with double precision loss.
        let huge = "9223372036854775808";
        let promoted = call("Add", &[s(huge), s("1")]).unwrap();
        assert!(matches!(promoted, Value::Double(_)));
        assert_eq!(promoted.render(), "9223372036854776000");
    }

    #[test]
    fn division_tracks() {
        assert_eq!(call("Divide", &[s("84"), s("2")]).unwrap().render(), "42");
        let floating = call("Divide", &[s("84.4"), s("2.0")]).unwrap();
        assert_eq!(floating.render(), "42.2");
        assert!(matches!(
            call("Divide", &[s("1"), s("0")]).unwrap_err(),
            FunctionError::Evaluation { .. }
        ));
        // Double division by zero is defined.
        assert_eq!(call("Divide", &[s("1.0"), s("0.0")]).unwrap().render(), "inf");
    }

    #[test]
    fn modulo_and_min_overflow() {
        assert_eq!(call("Modulo", &[s("7"), s("3")]).unwrap().render(), "1");
        let min = i64::MIN.to_string();
        // MIN / -1 overflows in twos-complement; wraparound keeps it.
        assert_eq!(
            call("Divide", &[s(&min), s("-1")]).unwrap(),
            Value::Integer(i64::MIN)
        );
    }

    #[test]
    fn bitwise_operations() {
        assert_eq!(call("BitwiseAnd", &[s("12"), s("10")]).unwrap().render(), "8");
        assert_eq!(call("BitwiseOr", &[s("12"), s("10")]).unwrap().render(), "14");
        assert_eq!(call("BitwiseXor", &[s("12"), s("10")]).unwrap().render(), "6");
        assert_eq!(call("BitwiseNot", &[s("0")]).unwrap().render(), "-1");
        assert_eq!(call("LeftShift", &[s("1"), s("4")]).unwrap().render(), "16");
    }

    #[test]
    fn version_comparisons() {
        let t = |m: &str, a: &str, b: &str| call(m, &[s(a), s(b)]).unwrap().render();
        assert_eq!(t("VersionEquals", "1.2", "1.2.0.0"), "True");
        // Components compare numerically, not as text.
        assert_eq!(t("VersionGreaterThan", "3.14", "3.2"), "True");
        assert_eq!(t("VersionEquals", "3+metadata", "3.0"), "True");
        assert_eq!(t("VersionGreaterThan", "v2.0-rc1", "1.999"), "True");
        assert_eq!(t("VersionLessThanOrEquals", "3.5", "3.5"), "True");
        assert_eq!(t("VersionNotEquals", "1.0", "1.0.1"), "True");
        assert!(matches!(
            call("VersionEquals", &[s("nope"), s("1.0")]).unwrap_err(),
            FunctionError::InvalidVersion { .. }
        ));
    }

    #[test]
    fn escape_round_trip() {
        assert_eq!(call("Escape", &[s("a;b")]).unwrap().render(), "a%3bb");
        assert_eq!(call("Unescape", &[s("a%3bb")]).unwrap().render(), "a;b");
    }

    #[test]
    fn value_or_default() {
        assert_eq!(call("ValueOrDefault", &[s(""), s("fb")]).unwrap().render(), "fb");
        assert_eq!(call("ValueOrDefault", &[s("x"), s("fb")]).unwrap().render(), "x");
    }

    #[test]
    fn base64_round_trip() {
        let encoded = call("ConvertToBase64", &[s("hello")]).unwrap().render();
        assert_eq!(encoded, "aGVsbG8=");
        assert_eq!(
            call("ConvertFromBase64", &[s(&encoded)]).unwrap().render(),
            "hello"
        );
        assert!(call("ConvertFromBase64", &[s("!!!")]).is_err());
    }

    #[test]
    fn stable_hash_is_deterministic() {
        let a = call("StableStringHash", &[s("input")]).unwrap();
        let b = call("StableStringHash", &[s("input")]).unwrap();
        assert_eq!(a, b);
        assert!(matches!(a, Value::Integer(_)));
        let c = call("StableStringHash", &[s("other")]).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn file_above_search() {
        let fs = MockFileSystem::new();
        fs.add_file("/repo/Directory.Build.props");
        fs.add_file("/repo/src/deep/project.csproj");
        let location = ElementLocation::new("/repo/src/deep/project.csproj", 1, 1);
        let context = ctx(&fs, &location);

        let dir = IntrinsicFunctions
            .call(
                "GetDirectoryNameOfFileAbove",
                &[s("/repo/src/deep"), s("Directory.Build.props")],
                &context,
            )
            .unwrap();
        assert_eq!(dir.render(), "/repo");

        let path = IntrinsicFunctions
            .call("GetPathOfFileAbove", &[s("Directory.Build.props")], &context)
            .unwrap();
        assert_eq!(path.render(), "/repo/Directory.Build.props");

        let missing = IntrinsicFunctions
            .call("GetPathOfFileAbove", &[s("NoSuch.file")], &context)
            .unwrap();
        assert_eq!(missing.render(), "");
    }

    #[test]
    fn file_above_requires_bare_name_and_file_context() {
        let err = call("GetDirectoryNameOfFileAbove", &[s("/x"), s("dir/file")]).unwrap_err();
        assert!(matches!(err, FunctionError::Evaluation { .. }));
        // In-memory locations cannot anchor the single-argument form.
        let err = call("GetPathOfFileAbove", &[s("whatever.props")]).unwrap_err();
        assert!(matches!(err, FunctionError::Evaluation { .. }));
    }

    #[test]
    fn unknown_member_is_rejected() {
        assert!(matches!(
            call("LaunchMissiles", &[]).unwrap_err(),
            FunctionError::UnknownMember { .. }
        ));
    }
}
