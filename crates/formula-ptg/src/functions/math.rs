use super::{lift_number, lift_number2, optional, BuiltinFunction, CallContext};
use crate::eval::coercion::{parse_number, to_number};
use crate::eval::operators::power;
use crate::value::{ErrorKind, ValueEval};

/// Walk the numbers an aggregate sees. Inside areas only numeric cells count and the first
/// error cell aborts; direct arguments are coerced, with an empty slot counting as zero.
fn for_each_number(args: &[ValueEval], mut visit: impl FnMut(f64)) -> Result<(), ErrorKind> {
    for arg in args {
        match arg {
            ValueEval::Area(area) => {
                for cell in area.values() {
                    match cell {
                        ValueEval::Number(n) => visit(*n),
                        ValueEval::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            other => visit(to_number(other)?),
        }
    }
    Ok(())
}

fn aggregate(args: &[ValueEval], f: impl FnOnce(&[f64]) -> Result<f64, ErrorKind>) -> ValueEval {
    let mut numbers = Vec::new();
    ValueEval::from_result(for_each_number(args, |n| numbers.push(n)).and_then(|()| f(&numbers)))
}

inventory::submit! {
    BuiltinFunction { name: "SUM", inspects_errors: false, implementation: sum }
}

fn sum(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    aggregate(args, |ns| Ok(ns.iter().sum()))
}

inventory::submit! {
    BuiltinFunction { name: "AVERAGE", inspects_errors: false, implementation: average }
}

fn average(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    aggregate(args, |ns| {
        if ns.is_empty() {
            return Err(ErrorKind::Div0);
        }
        Ok(ns.iter().sum::<f64>() / ns.len() as f64)
    })
}

inventory::submit! {
    BuiltinFunction { name: "MIN", inspects_errors: false, implementation: min }
}

fn min(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    aggregate(args, |ns| Ok(ns.iter().copied().reduce(f64::min).unwrap_or(0.0)))
}

inventory::submit! {
    BuiltinFunction { name: "MAX", inspects_errors: false, implementation: max }
}

fn max(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    aggregate(args, |ns| Ok(ns.iter().copied().reduce(f64::max).unwrap_or(0.0)))
}

inventory::submit! {
    BuiltinFunction { name: "PRODUCT", inspects_errors: false, implementation: product }
}

fn product(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    aggregate(args, |ns| {
        if ns.is_empty() {
            return Ok(0.0);
        }
        Ok(ns.iter().product())
    })
}

inventory::submit! {
    BuiltinFunction { name: "COUNT", inspects_errors: true, implementation: count }
}

fn count(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    let mut total = 0usize;
    for arg in args {
        match arg {
            ValueEval::Area(area) => {
                total += area
                    .values()
                    .filter(|v| matches!(v, ValueEval::Number(_)))
                    .count();
            }
            ValueEval::Number(_) | ValueEval::Boolean(_) => total += 1,
            ValueEval::Text(s) => {
                if parse_number(s).is_ok() {
                    total += 1;
                }
            }
            ValueEval::Blank | ValueEval::Missing | ValueEval::Error(_) => {}
        }
    }
    ValueEval::Number(total as f64)
}

inventory::submit! {
    BuiltinFunction { name: "COUNTA", inspects_errors: true, implementation: counta }
}

fn counta(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    let mut total = 0usize;
    for arg in args {
        match arg {
            ValueEval::Area(area) => {
                total += area
                    .values()
                    .filter(|v| !matches!(v, ValueEval::Blank))
                    .count();
            }
            ValueEval::Missing => {}
            _ => total += 1,
        }
    }
    ValueEval::Number(total as f64)
}

inventory::submit! {
    BuiltinFunction { name: "ABS", inspects_errors: false, implementation: abs }
}

fn abs(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift_number(args, |n| Ok(n.abs()))
}

inventory::submit! {
    BuiltinFunction { name: "INT", inspects_errors: false, implementation: int }
}

fn int(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift_number(args, |n| Ok(n.floor()))
}

inventory::submit! {
    BuiltinFunction { name: "SIGN", inspects_errors: false, implementation: sign }
}

fn sign(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift_number(args, |n| {
        Ok(if n > 0.0 {
            1.0
        } else if n < 0.0 {
            -1.0
        } else {
            0.0
        })
    })
}

inventory::submit! {
    BuiltinFunction { name: "SQRT", inspects_errors: false, implementation: sqrt }
}

fn sqrt(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift_number(args, |n| {
        if n < 0.0 {
            Err(ErrorKind::Num)
        } else {
            Ok(n.sqrt())
        }
    })
}

inventory::submit! {
    BuiltinFunction { name: "EXP", inspects_errors: false, implementation: exp }
}

fn exp(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift_number(args, |n| Ok(n.exp()))
}

fn positive(n: f64) -> Result<f64, ErrorKind> {
    if n > 0.0 {
        Ok(n)
    } else {
        Err(ErrorKind::Num)
    }
}

inventory::submit! {
    BuiltinFunction { name: "LN", inspects_errors: false, implementation: ln }
}

fn ln(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift_number(args, |n| positive(n).map(f64::ln))
}

inventory::submit! {
    BuiltinFunction { name: "LOG10", inspects_errors: false, implementation: log10 }
}

fn log10(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift_number(args, |n| positive(n).map(f64::log10))
}

inventory::submit! {
    BuiltinFunction { name: "LOG", inspects_errors: false, implementation: log }
}

fn log(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    if optional(args, 1).is_none() {
        return lift_number(&args[..1], |n| positive(n).map(f64::log10));
    }
    lift_number2(args, |n, base| {
        let n = positive(n)?;
        let base = positive(base)?;
        if base == 1.0 {
            return Err(ErrorKind::Div0);
        }
        Ok(n.ln() / base.ln())
    })
}

inventory::submit! {
    BuiltinFunction { name: "MOD", inspects_errors: false, implementation: modulo }
}

fn modulo(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift_number2(args, |n, d| {
        if d == 0.0 {
            return Err(ErrorKind::Div0);
        }
        Ok(n - d * (n / d).floor())
    })
}

inventory::submit! {
    BuiltinFunction { name: "POWER", inspects_errors: false, implementation: power_fn }
}

fn power_fn(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift_number2(args, power)
}

inventory::submit! {
    BuiltinFunction { name: "PI", inspects_errors: false, implementation: pi }
}

fn pi(_ctx: &CallContext<'_>, _args: &[ValueEval]) -> ValueEval {
    ValueEval::Number(std::f64::consts::PI)
}

inventory::submit! {
    BuiltinFunction { name: "SIN", inspects_errors: false, implementation: sin }
}

fn sin(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift_number(args, |n| Ok(n.sin()))
}

inventory::submit! {
    BuiltinFunction { name: "COS", inspects_errors: false, implementation: cos }
}

fn cos(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift_number(args, |n| Ok(n.cos()))
}

inventory::submit! {
    BuiltinFunction { name: "TAN", inspects_errors: false, implementation: tan }
}

fn tan(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift_number(args, |n| Ok(n.tan()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundMode {
    Nearest,
    Down,
    Up,
}

fn round_with_mode(n: f64, digits: f64, mode: RoundMode) -> f64 {
    let digits = digits.trunc().clamp(-308.0, 308.0) as i32;
    let factor = 10f64.powi(digits.saturating_abs());
    if !factor.is_finite() || factor == 0.0 {
        return n;
    }

    let scaled = if digits >= 0 { n * factor } else { n / factor };
    let rounded = match mode {
        RoundMode::Down => scaled.trunc(),
        RoundMode::Up => {
            if scaled.fract() == 0.0 {
                scaled
            } else {
                scaled.trunc() + scaled.signum()
            }
        }
        // Halves round away from zero.
        RoundMode::Nearest => {
            if scaled.fract().abs() < 0.5 {
                scaled.trunc()
            } else {
                scaled.trunc() + scaled.signum()
            }
        }
    };

    if digits >= 0 {
        rounded / factor
    } else {
        rounded * factor
    }
}

fn round_impl(args: &[ValueEval], mode: RoundMode) -> ValueEval {
    if optional(args, 1).is_none() {
        return lift_number(&args[..1], |n| Ok(round_with_mode(n, 0.0, mode)));
    }
    lift_number2(args, |n, digits| Ok(round_with_mode(n, digits, mode)))
}

inventory::submit! {
    BuiltinFunction { name: "ROUND", inspects_errors: false, implementation: round }
}

fn round(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    round_impl(args, RoundMode::Nearest)
}

inventory::submit! {
    BuiltinFunction { name: "ROUNDUP", inspects_errors: false, implementation: roundup }
}

fn roundup(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    round_impl(args, RoundMode::Up)
}

inventory::submit! {
    BuiltinFunction { name: "ROUNDDOWN", inspects_errors: false, implementation: rounddown }
}

fn rounddown(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    round_impl(args, RoundMode::Down)
}

inventory::submit! {
    BuiltinFunction { name: "TRUNC", inspects_errors: false, implementation: trunc }
}

fn trunc(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    round_impl(args, RoundMode::Down)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::EvalContext;
    use crate::ftab::function_by_name;
    use crate::functions::BuiltinImpl;
    use crate::matrix::Matrix;
    use crate::value::AreaEval;
    use pretty_assertions::assert_eq;

    fn call(name: &str, f: BuiltinImpl, args: &[ValueEval]) -> ValueEval {
        let eval = EvalContext::default();
        let ctx = CallContext {
            eval: &eval,
            metadata: function_by_name(name).unwrap(),
        };
        f(&ctx, args)
    }

    fn column(values: Vec<ValueEval>) -> ValueEval {
        let rows = values.len();
        ValueEval::Area(AreaEval::new(0, 0, Matrix::new(rows, 1, values).unwrap()))
    }

    #[test]
    fn aggregates_skip_non_numeric_area_cells() {
        let area = column(vec![
            ValueEval::Number(1.0),
            ValueEval::Text("5".into()),
            ValueEval::Boolean(true),
            ValueEval::Blank,
            ValueEval::Number(2.0),
        ]);
        assert_eq!(call("SUM", sum, &[area.clone()]), ValueEval::Number(3.0));
        assert_eq!(call("AVERAGE", average, &[area.clone()]), ValueEval::Number(1.5));
        assert_eq!(call("COUNT", count, &[area.clone()]), ValueEval::Number(2.0));
        assert_eq!(call("COUNTA", counta, &[area]), ValueEval::Number(4.0));
    }

    #[test]
    fn direct_arguments_are_coerced() {
        let args = [ValueEval::Text("5".into()), ValueEval::Boolean(true)];
        assert_eq!(call("SUM", sum, &args), ValueEval::Number(6.0));
        assert_eq!(
            call("SUM", sum, &[ValueEval::Text("x".into())]),
            ValueEval::Error(ErrorKind::Value)
        );
    }

    #[test]
    fn area_errors_propagate() {
        let area = column(vec![ValueEval::Number(1.0), ValueEval::Error(ErrorKind::NA)]);
        assert_eq!(call("SUM", sum, &[area]), ValueEval::Error(ErrorKind::NA));
    }

    #[test]
    fn empty_aggregates() {
        let blank = column(vec![ValueEval::Blank]);
        assert_eq!(
            call("AVERAGE", average, &[blank.clone()]),
            ValueEval::Error(ErrorKind::Div0)
        );
        assert_eq!(call("MAX", max, &[blank]), ValueEval::Number(0.0));
    }

    #[test]
    fn rounding_modes() {
        let n = |x: f64| ValueEval::Number(x);
        assert_eq!(call("ROUND", round, &[n(2.5), n(0.0)]), n(3.0));
        assert_eq!(call("ROUND", round, &[n(-2.5), n(0.0)]), n(-3.0));
        assert_eq!(call("ROUND", round, &[n(1234.0), n(-2.0)]), n(1200.0));
        assert_eq!(call("ROUNDUP", roundup, &[n(1.21), n(1.0)]), n(1.3));
        assert_eq!(call("ROUNDDOWN", rounddown, &[n(-1.29), n(1.0)]), n(-1.2));
        assert_eq!(call("TRUNC", trunc, &[n(8.9)]), n(8.0));
    }

    #[test]
    fn domain_errors() {
        let n = |x: f64| ValueEval::Number(x);
        assert_eq!(call("SQRT", sqrt, &[n(-1.0)]), ValueEval::Error(ErrorKind::Num));
        assert_eq!(call("LN", ln, &[n(0.0)]), ValueEval::Error(ErrorKind::Num));
        assert_eq!(call("MOD", modulo, &[n(1.0), n(0.0)]), ValueEval::Error(ErrorKind::Div0));
        assert_eq!(call("MOD", modulo, &[n(-3.0), n(2.0)]), n(1.0));
        assert_eq!(call("LOG", log, &[n(8.0), n(2.0)]), n(3.0));
        assert_eq!(call("LOG", log, &[n(100.0)]), n(2.0));
    }

    #[test]
    fn scalar_functions_lift_over_areas() {
        let area = column(vec![ValueEval::Number(-1.0), ValueEval::Number(2.0)]);
        assert_eq!(
            call("ABS", abs, &[area]),
            column(vec![ValueEval::Number(1.0), ValueEval::Number(2.0)])
        );
    }
}
