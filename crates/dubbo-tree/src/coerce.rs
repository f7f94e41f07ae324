//! Conversion of literal command line values into typed scalars.
use crate::Scalar;

const ESCAPED_COMMA: &str = "\\,";

/// Converts `literal` into the most specific scalar it can represent.
///
/// Integers take precedence over floats, floats over booleans. Anything else
/// is kept as a string in which the escape `\,` is replaced by a plain comma.
///
/// Only decimal notation (digits, sign, `.` and exponent) is read as a float.
/// The spellings of non-finite values (`inf`, `infinity`, `NaN`), which a
/// plain float parse accepts, stay strings, so a component named `nan` is not
/// turned into a number.
///
/// ```
/// use dubbo_tree::{Scalar, coerce::coerce_scalar};
///
/// assert_eq!(coerce_scalar("2"), Scalar::Int(2));
/// assert_eq!(coerce_scalar("0.5"), Scalar::Float(0.5));
/// assert_eq!(coerce_scalar("true"), Scalar::Bool(true));
/// assert_eq!(coerce_scalar(r"a\,b"), Scalar::String("a,b".to_owned()));
/// assert_eq!(coerce_scalar("nan"), Scalar::String("nan".to_owned()));
/// ```
pub fn coerce_scalar(literal: &str) -> Scalar {
    if let Ok(value) = literal.parse::<i64>() {
        return Scalar::Int(value);
    }

    if is_float_literal(literal) {
        if let Ok(value) = literal.parse::<f64>() {
            return Scalar::Float(value);
        }
    }

    if let Some(value) = parse_bool(literal) {
        return Scalar::Bool(value);
    }

    Scalar::String(literal.replace(ESCAPED_COMMA, ","))
}

fn is_float_literal(literal: &str) -> bool {
    literal
        .bytes()
        .any(|byte| byte.is_ascii_digit())
        && literal
            .bytes()
            .all(|byte| byte.is_ascii_digit() || matches!(byte, b'.' | b'-' | b'+' | b'e' | b'E'))
}

fn parse_bool(literal: &str) -> Option<bool> {
    match literal {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
