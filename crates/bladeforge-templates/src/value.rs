//! Value semantics for template expressions
//!
//! Template data is plain JSON. These helpers give it the loose, PHP-like
//! behaviour template authors expect: truthiness, string conversion, numeric
//! coercion and comparison.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// Numeric view of a value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
}

impl Num {
    /// Value as f64
    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    /// Convert back into a JSON value
    pub fn into_value(self) -> Value {
        match self {
            Num::Int(i) => Value::from(i),
            Num::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        }
    }
}

/// PHP truthiness: `null`, `false`, `0`, `0.0`, `""`, `"0"` and empty arrays are falsy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// String form used by echoes and concatenation
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => format_number(n),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Escape HTML special characters, including both quote styles
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Numeric coercion; `None` for values with no numeric meaning
pub fn to_number(value: &Value) -> Option<Num> {
    match value {
        Value::Null => Some(Num::Int(0)),
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        Value::Number(n) => n
            .as_i64()
            .map(Num::Int)
            .or_else(|| n.as_f64().map(Num::Float)),
        Value::String(s) => parse_numeric(s),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Parse a numeric string (surrounding whitespace allowed)
pub fn parse_numeric(s: &str) -> Option<Num> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Num::Int(i));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Num::Float)
}

/// Human-readable type name for error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) | Value::Object(_) => "array",
    }
}

/// Loose equality (`==`)
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Bool(_), _) | (_, Value::Bool(_)) => is_truthy(left) == is_truthy(right),
        (Value::Null, Value::Null) => true,
        (Value::Null, other) | (other, Value::Null) => match other {
            Value::String(s) => s.is_empty(),
            _ => !is_truthy(other),
        },
        (Value::String(a), Value::String(b)) => match (parse_numeric(a), parse_numeric(b)) {
            (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
            _ => a == b,
        },
        (Value::Number(_), Value::String(s)) | (Value::String(s), Value::Number(_)) => {
            match parse_numeric(s) {
                Some(_) => numbers_eq(left, right),
                None => to_display_string(left) == to_display_string(right),
            }
        }
        (Value::Number(_), Value::Number(_)) => numbers_eq(left, right),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| loose_eq(v, other)))
        }
        _ => false,
    }
}

fn numbers_eq(left: &Value, right: &Value) -> bool {
    match (to_number(left), to_number(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        _ => false,
    }
}

/// Strict equality (`===`): same type and value
pub fn strict_eq(left: &Value, right: &Value) -> bool {
    left == right
}

/// Ordering for `<`, `<=`, `>`, `>=`; `None` when the operands are not comparable
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => None,
        (Value::String(a), Value::String(b)) => match (parse_numeric(a), parse_numeric(b)) {
            (Some(x), Some(y)) => x.as_f64().partial_cmp(&y.as_f64()),
            _ => Some(a.cmp(b)),
        },
        (Value::String(s), _) if parse_numeric(s).is_none() => {
            Some(s.as_str().cmp(to_display_string(right).as_str()))
        }
        (_, Value::String(s)) if parse_numeric(s).is_none() => {
            Some(to_display_string(left).as_str().cmp(s.as_str()))
        }
        _ => {
            let a = to_number(left)?;
            let b = to_number(right)?;
            match (a, b) {
                (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
                _ => a.as_f64().partial_cmp(&b.as_f64()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!("0"), json!([])] {
            assert!(!is_truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy in [json!(true), json!(1), json!("a"), json!("0.0"), json!([0]), json!({"a": 1})] {
            assert!(is_truthy(&truthy), "{truthy} should be truthy");
        }
    }

    #[test]
    fn test_display_string() {
        assert_eq!(to_display_string(&json!(null)), "");
        assert_eq!(to_display_string(&json!(true)), "1");
        assert_eq!(to_display_string(&json!(false)), "");
        assert_eq!(to_display_string(&json!(42)), "42");
        assert_eq!(to_display_string(&json!(2.0)), "2");
        assert_eq!(to_display_string(&json!(2.5)), "2.5");
        assert_eq!(to_display_string(&json!("x")), "x");
        assert_eq!(to_display_string(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>alert('x') & \"y\"</script>"),
            "&lt;script&gt;alert(&#039;x&#039;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_loose_equality() {
        assert!(loose_eq(&json!(1), &json!("1")));
        assert!(loose_eq(&json!(1), &json!(1.0)));
        assert!(loose_eq(&json!(null), &json!(false)));
        assert!(loose_eq(&json!(null), &json!("")));
        assert!(!loose_eq(&json!(null), &json!("0")));
        assert!(loose_eq(&json!("abc"), &json!("abc")));
        assert!(!loose_eq(&json!(0), &json!("a")));
        assert!(loose_eq(&json!(true), &json!("yes")));
    }

    #[test]
    fn test_strict_equality() {
        assert!(strict_eq(&json!(1), &json!(1)));
        assert!(!strict_eq(&json!(1), &json!("1")));
        assert!(!strict_eq(&json!(1), &json!(1.0)));
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(&json!(1), &json!(2)), Some(Ordering::Less));
        assert_eq!(compare(&json!("10"), &json!("9")), Some(Ordering::Greater));
        assert_eq!(compare(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(compare(&json!(2.5), &json!(2)), Some(Ordering::Greater));
        assert_eq!(compare(&json!([1]), &json!(1)), None);
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&json!("12")), Some(Num::Int(12)));
        assert_eq!(to_number(&json!(" 1.5 ")), Some(Num::Float(1.5)));
        assert_eq!(to_number(&json!("abc")), None);
        assert_eq!(to_number(&json!(true)), Some(Num::Int(1)));
        assert_eq!(to_number(&json!({})), None);
    }
}
