//! Scalar operator semantics and element-wise broadcasting over areas.

use std::cmp::Ordering;

use super::coercion::{excel_order, to_number, to_text};
use crate::matrix::Matrix;
use crate::token::Operator;
use crate::value::{AreaEval, ErrorKind, ValueEval};

/// Apply `f` element-wise when any argument is an area.
///
/// The result has the largest row and column counts among the area arguments. A scalar, or an
/// area with a single row (column), is repeated along that axis; positions beyond a shorter
/// area's extent evaluate to `#N/A`. The result is anchored at the first area argument.
pub fn broadcast(args: &[&ValueEval], mut f: impl FnMut(&[&ValueEval]) -> ValueEval) -> ValueEval {
    let areas: Vec<&AreaEval> = args
        .iter()
        .filter_map(|v| match v {
            ValueEval::Area(area) => Some(area),
            _ => None,
        })
        .collect();
    let Some(anchor) = areas.first() else {
        return f(args);
    };
    let rows = areas.iter().map(|a| a.rows()).max().unwrap_or(1);
    let cols = areas.iter().map(|a| a.cols()).max().unwrap_or(1);

    let na = ValueEval::Error(ErrorKind::NA);
    let cells = Matrix::from_fn(rows, cols, |r, c| {
        let mut element: Vec<&ValueEval> = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                ValueEval::Area(area) => {
                    let rr = if area.rows() == 1 { 0 } else { r };
                    let cc = if area.cols() == 1 { 0 } else { c };
                    match area.get(rr, cc) {
                        Some(v) => element.push(v),
                        None => return na.clone(),
                    }
                }
                other => element.push(other),
            }
        }
        f(&element)
    });

    match cells {
        Ok(cells) => ValueEval::Area(AreaEval::new(anchor.first_row(), anchor.first_col(), cells)),
        Err(e) => ValueEval::Error(e.to_error_kind()),
    }
}

/// Evaluate a value operator (everything except range, union and intersection) on scalars.
pub fn apply_scalar(op: Operator, args: &[&ValueEval]) -> ValueEval {
    match (op, args) {
        (Operator::UnaryPlus, [v]) => match v {
            ValueEval::Missing => ValueEval::Blank,
            other => (*other).clone(),
        },
        (Operator::UnaryMinus, [v]) => ValueEval::from_result(to_number(v).map(|n| -n)),
        (Operator::Percent, [v]) => ValueEval::from_result(to_number(v).map(|n| n / 100.0)),
        (Operator::Concat, [l, r]) => match (to_text(l), to_text(r)) {
            (Err(e), _) | (_, Err(e)) => ValueEval::Error(e),
            (Ok(mut l), Ok(r)) => {
                l.push_str(&r);
                ValueEval::Text(l)
            }
        },
        (
            Operator::Less
            | Operator::LessEqual
            | Operator::Equal
            | Operator::GreaterEqual
            | Operator::Greater
            | Operator::NotEqual,
            [l, r],
        ) => match excel_order(l, r) {
            Ok(ord) => ValueEval::Boolean(compare(op, ord)),
            Err(e) => ValueEval::Error(e),
        },
        (_, [l, r]) => {
            let result = to_number(l).and_then(|a| to_number(r).and_then(|b| arithmetic(op, a, b)));
            ValueEval::from_result(result)
        }
        _ => ValueEval::Error(ErrorKind::Value),
    }
}

fn compare(op: Operator, ord: Ordering) -> bool {
    match op {
        Operator::Less => ord == Ordering::Less,
        Operator::LessEqual => ord != Ordering::Greater,
        Operator::Equal => ord == Ordering::Equal,
        Operator::GreaterEqual => ord != Ordering::Less,
        Operator::Greater => ord == Ordering::Greater,
        _ => ord != Ordering::Equal,
    }
}

fn arithmetic(op: Operator, a: f64, b: f64) -> Result<f64, ErrorKind> {
    let out = match op {
        Operator::Add => a + b,
        Operator::Subtract => a - b,
        Operator::Multiply => a * b,
        Operator::Divide => {
            if b == 0.0 {
                return Err(ErrorKind::Div0);
            }
            a / b
        }
        Operator::Power => return power(a, b),
        _ => return Err(ErrorKind::Value),
    };
    if out.is_finite() {
        Ok(out)
    } else {
        Err(ErrorKind::Num)
    }
}

/// `^` / `POWER`.
pub fn power(number: f64, exponent: f64) -> Result<f64, ErrorKind> {
    if !number.is_finite() || !exponent.is_finite() {
        return Err(ErrorKind::Num);
    }
    if number == 0.0 {
        if exponent == 0.0 {
            return Err(ErrorKind::Num);
        }
        if exponent < 0.0 {
            return Err(ErrorKind::Div0);
        }
    }
    if number < 0.0 && !is_effectively_integer(exponent) {
        return Err(ErrorKind::Num);
    }
    let out = number.powf(exponent);
    if out.is_finite() {
        Ok(out)
    } else {
        Err(ErrorKind::Num)
    }
}

fn is_effectively_integer(x: f64) -> bool {
    const TOL: f64 = 1.0e-10;
    (x - x.round()).abs() <= TOL
}
