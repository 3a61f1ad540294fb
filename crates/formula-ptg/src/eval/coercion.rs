//! Scalar coercions shared by operators and built-in functions.

use std::cmp::Ordering;

use crate::value::{ErrorKind, ValueEval};

pub fn to_number(v: &ValueEval) -> Result<f64, ErrorKind> {
    match v {
        ValueEval::Number(n) => Ok(*n),
        ValueEval::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        ValueEval::Blank | ValueEval::Missing => Ok(0.0),
        ValueEval::Text(s) => parse_number(s),
        ValueEval::Error(e) => Err(*e),
        ValueEval::Area(_) => Err(ErrorKind::Value),
    }
}

pub fn to_bool(v: &ValueEval) -> Result<bool, ErrorKind> {
    match v {
        ValueEval::Boolean(b) => Ok(*b),
        ValueEval::Number(n) => Ok(*n != 0.0),
        ValueEval::Blank | ValueEval::Missing => Ok(false),
        ValueEval::Text(s) => {
            let trimmed = s.trim();
            if trimmed.eq_ignore_ascii_case("TRUE") {
                Ok(true)
            } else if trimmed.eq_ignore_ascii_case("FALSE") {
                Ok(false)
            } else {
                Err(ErrorKind::Value)
            }
        }
        ValueEval::Error(e) => Err(*e),
        ValueEval::Area(_) => Err(ErrorKind::Value),
    }
}

pub fn to_text(v: &ValueEval) -> Result<String, ErrorKind> {
    match v {
        ValueEval::Text(s) => Ok(s.clone()),
        ValueEval::Number(n) => Ok(format_number(*n)),
        ValueEval::Boolean(true) => Ok("TRUE".to_string()),
        ValueEval::Boolean(false) => Ok("FALSE".to_string()),
        ValueEval::Blank | ValueEval::Missing => Ok(String::new()),
        ValueEval::Error(e) => Err(*e),
        ValueEval::Area(_) => Err(ErrorKind::Value),
    }
}

/// Parse worksheet text as a number: surrounding whitespace, a sign, an exponent and a trailing
/// `%` are accepted. Anything else is `#VALUE!`.
pub fn parse_number(text: &str) -> Result<f64, ErrorKind> {
    let trimmed = text.trim();
    let (body, scale) = match trimmed.strip_suffix('%') {
        Some(rest) => (rest.trim_end(), 0.01),
        None => (trimmed, 1.0),
    };
    if body.is_empty()
        || !body
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
        || !body.bytes().any(|b| b.is_ascii_digit())
    {
        return Err(ErrorKind::Value);
    }
    body.parse::<f64>()
        .map(|n| n * scale)
        .map_err(|_| ErrorKind::Value)
}

/// Render a number the way the General format does: integers without a fraction, at most 15
/// significant digits, scientific notation outside `1e-9..1e15`.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if !n.is_finite() {
        return ErrorKind::Num.as_code().to_string();
    }
    let rounded: f64 = format!("{n:.14e}").parse().unwrap_or(n);
    let magnitude = rounded.abs();
    if (1e-9..1e15).contains(&magnitude) {
        if rounded.fract() == 0.0 {
            return format!("{}", rounded as i64);
        }
        return format!("{rounded}");
    }

    let sci = format!("{rounded:E}");
    match sci.split_once('E') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}E{sign}{digits:0>2}")
        }
        None => sci,
    }
}

/// Ordering used by the comparison operators: numbers < text < booleans, text compared without
/// case, blanks taking the type of the other side.
pub fn excel_order(left: &ValueEval, right: &ValueEval) -> Result<Ordering, ErrorKind> {
    if let ValueEval::Error(e) = left {
        return Err(*e);
    }
    if let ValueEval::Error(e) = right {
        return Err(*e);
    }

    let blank = |v: &ValueEval| matches!(v, ValueEval::Blank | ValueEval::Missing);
    let (l, r) = match (left, right) {
        (l, ValueEval::Number(_)) if blank(l) => (ValueEval::Number(0.0), right.clone()),
        (ValueEval::Number(_), r) if blank(r) => (left.clone(), ValueEval::Number(0.0)),
        (l, ValueEval::Boolean(_)) if blank(l) => (ValueEval::Boolean(false), right.clone()),
        (ValueEval::Boolean(_), r) if blank(r) => (left.clone(), ValueEval::Boolean(false)),
        (l, ValueEval::Text(_)) if blank(l) => (ValueEval::Text(String::new()), right.clone()),
        (ValueEval::Text(_), r) if blank(r) => (left.clone(), ValueEval::Text(String::new())),
        _ => (left.clone(), right.clone()),
    };

    Ok(match (&l, &r) {
        (ValueEval::Number(a), ValueEval::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (ValueEval::Text(a), ValueEval::Text(b)) => {
            a.to_uppercase().cmp(&b.to_uppercase())
        }
        (ValueEval::Boolean(a), ValueEval::Boolean(b)) => a.cmp(b),
        (ValueEval::Number(_), ValueEval::Text(_) | ValueEval::Boolean(_)) => Ordering::Less,
        (ValueEval::Text(_), ValueEval::Boolean(_)) => Ordering::Less,
        (ValueEval::Text(_), ValueEval::Number(_)) => Ordering::Greater,
        (ValueEval::Boolean(_), ValueEval::Number(_) | ValueEval::Text(_)) => Ordering::Greater,
        (ValueEval::Area(_), _) | (_, ValueEval::Area(_)) => return Err(ErrorKind::Value),
        (a, b) if blank(a) && blank(b) => Ordering::Equal,
        (a, _) if blank(a) => Ordering::Less,
        _ => Ordering::Greater,
    })
}
