//! Built-in functions callable from template expressions
//!
//! `isset` and `empty` are listed here so the parser accepts them, but the
//! renderer evaluates them itself: their arguments may be undefined.

use serde_json::{Map, Value};

use crate::{
    error::EvalError,
    value::{self, Num},
};

/// Names of all built-in functions
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "count",
    "e",
    "empty",
    "implode",
    "in_array",
    "isset",
    "json_encode",
    "array_keys",
    "max",
    "min",
    "nl2br",
    "number_format",
    "range",
    "str_repeat",
    "strlen",
    "strtolower",
    "strtoupper",
    "trim",
    "ucfirst",
];

/// Upper bound on the length of lists produced by `range`
const MAX_RANGE_LEN: u64 = 100_000;

/// Upper bound on the byte length of strings produced by `str_repeat`
const MAX_STRING_LEN: u64 = 16 * 1024 * 1024;

/// Whether `name` (lowercase) is a built-in function
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_FUNCTIONS.contains(&name)
}

/// Call built-in `name` with evaluated arguments
pub fn call(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "count" => {
            let [target] = expect_args::<1>(name, args)?;
            match target {
                Value::Array(items) => Ok(Value::from(items.len())),
                Value::Object(map) => Ok(Value::from(map.len())),
                other => Err(invalid(
                    name,
                    format!("Argument #1 must be of type array, {} given", value::type_name(other)),
                )),
            }
        }
        "e" => {
            let [target] = expect_args::<1>(name, args)?;
            Ok(Value::String(value::escape_html(&value::to_display_string(target))))
        }
        "strtoupper" => map_string(name, args, |s| s.to_uppercase()),
        "strtolower" => map_string(name, args, |s| s.to_lowercase()),
        "trim" => map_string(name, args, |s| s.trim().to_string()),
        "nl2br" => map_string(name, args, |s| s.replace('\n', "<br />\n")),
        "ucfirst" => map_string(name, args, |s| {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }),
        "strlen" => {
            let [target] = expect_args::<1>(name, args)?;
            Ok(Value::from(value::to_display_string(target).len()))
        }
        "implode" => {
            let [glue, pieces] = expect_args::<2>(name, args)?;
            let items = list_values(name, pieces)?;
            let parts: Vec<String> = items.iter().map(value::to_display_string).collect();
            Ok(Value::String(parts.join(&value::to_display_string(glue))))
        }
        "json_encode" => {
            let [target] = expect_args::<1>(name, args)?;
            serde_json::to_string(target)
                .map(Value::String)
                .map_err(|e| invalid(name, e.to_string()))
        }
        "number_format" => number_format(args),
        "in_array" => {
            let [needle, haystack] = expect_args::<2>(name, args)?;
            let items = list_values(name, haystack)?;
            Ok(Value::Bool(items.iter().any(|item| value::loose_eq(item, needle))))
        }
        "array_keys" => {
            let [target] = expect_args::<1>(name, args)?;
            match target {
                Value::Array(items) => Ok(Value::Array((0..items.len()).map(Value::from).collect())),
                Value::Object(map) => Ok(Value::Array(
                    map.keys().map(|k| Value::String(k.clone())).collect(),
                )),
                other => Err(invalid(
                    name,
                    format!("Argument #1 must be of type array, {} given", value::type_name(other)),
                )),
            }
        }
        "range" => {
            let [start, end] = expect_args::<2>(name, args)?;
            let (start, end) = (int_arg(name, start)?, int_arg(name, end)?);
            if end.abs_diff(start) >= MAX_RANGE_LEN {
                return Err(invalid(name, "range is too large".to_string()));
            }
            let values: Vec<Value> = if start <= end {
                (start..=end).map(Value::from).collect()
            } else {
                (end..=start).rev().map(Value::from).collect()
            };
            Ok(Value::Array(values))
        }
        "str_repeat" => {
            let [text, times] = expect_args::<2>(name, args)?;
            let times = int_arg(name, times)?;
            if times < 0 {
                return Err(invalid(name, "Argument #2 must be greater than or equal to 0".to_string()));
            }
            let text = value::to_display_string(text);
            let too_long = usize::try_from(times)
                .ok()
                .and_then(|times| text.len().checked_mul(times))
                .map_or(true, |len| len as u64 > MAX_STRING_LEN);
            if too_long {
                return Err(invalid(name, "result is too large".to_string()));
            }
            Ok(Value::String(text.repeat(times as usize)))
        }
        "max" | "min" => extreme(name, args),
        "isset" | "empty" => Err(invalid(name, "must be evaluated lazily".to_string())),
        other => Err(invalid(other, "undefined function".to_string())),
    }
}

fn expect_args<'a, const N: usize>(name: &str, args: &'a [Value]) -> Result<[&'a Value; N], EvalError> {
    if args.len() != N {
        return Err(invalid(
            name,
            format!("expects exactly {} argument(s), {} given", N, args.len()),
        ));
    }
    let mut out = [&Value::Null; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg;
    }
    Ok(out)
}

fn map_string(name: &str, args: &[Value], f: impl Fn(&str) -> String) -> Result<Value, EvalError> {
    let [target] = expect_args::<1>(name, args)?;
    Ok(Value::String(f(&value::to_display_string(target))))
}

fn list_values(name: &str, target: &Value) -> Result<Vec<Value>, EvalError> {
    match target {
        Value::Array(items) => Ok(items.clone()),
        Value::Object(map) => Ok(map.values().cloned().collect()),
        other => Err(invalid(
            name,
            format!("expects an array, {} given", value::type_name(other)),
        )),
    }
}

fn int_arg(name: &str, arg: &Value) -> Result<i64, EvalError> {
    match value::to_number(arg) {
        Some(Num::Int(i)) => Ok(i),
        Some(Num::Float(f)) => Ok(f.trunc() as i64),
        None => Err(invalid(
            name,
            format!("expects a number, {} given", value::type_name(arg)),
        )),
    }
}

fn number_format(args: &[Value]) -> Result<Value, EvalError> {
    let name = "number_format";
    let (number, decimals) = match args {
        [number] => (number, 0),
        [number, decimals] => (number, int_arg(name, decimals)?.clamp(0, 20) as usize),
        _ => return Err(invalid(name, format!("expects 1 or 2 arguments, {} given", args.len()))),
    };
    let number = value::to_number(number)
        .ok_or_else(|| invalid(name, format!("expects a number, {} given", value::type_name(number))))?
        .as_f64();

    let formatted = format!("{:.*}", decimals, number.abs());
    let (whole, fraction) = match formatted.split_once('.') {
        Some((whole, fraction)) => (whole.to_string(), Some(fraction.to_string())),
        None => (formatted.clone(), None),
    };

    let mut grouped = String::new();
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let is_zero = grouped.chars().all(|c| c == '0' || c == ',')
        && fraction.as_deref().map_or(true, |f| f.chars().all(|c| c == '0'));
    let mut result = String::new();
    if number < 0.0 && !is_zero {
        result.push('-');
    }
    result.push_str(&grouped);
    if let Some(fraction) = fraction {
        result.push('.');
        result.push_str(&fraction);
    }
    Ok(Value::String(result))
}

fn extreme(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    let candidates: Vec<Value> = match args {
        [] => return Err(invalid(name, "expects at least 1 argument, 0 given".to_string())),
        [single] => list_values(name, single)?,
        many => many.to_vec(),
    };
    let mut best: Option<Value> = None;
    for candidate in candidates {
        best = match best {
            None => Some(candidate),
            Some(current) => {
                let ordering = value::compare(&candidate, &current).ok_or_else(|| {
                    invalid(name, "arguments are not comparable".to_string())
                })?;
                let replace = if name == "max" {
                    ordering.is_gt()
                } else {
                    ordering.is_lt()
                };
                Some(if replace { candidate } else { current })
            }
        };
    }
    best.ok_or_else(|| invalid(name, "Argument #1 must contain at least one element".to_string()))
}

fn invalid(function: &str, message: String) -> EvalError {
    EvalError::InvalidArgument {
        function: function.to_string(),
        message,
    }
}

/// Build an object value from key/value pairs
pub fn object<I>(entries: I) -> Value
where
    I: IntoIterator<Item = (String, Value)>,
{
    Value::Object(entries.into_iter().collect::<Map<String, Value>>())
}
