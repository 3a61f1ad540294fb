use super::{lift, BuiltinFunction, CallContext};
use crate::eval::coercion::{to_bool, to_number};
use crate::value::{ErrorKind, ValueEval};

/// A branch that was left empty (`IF(c,,x)`) yields zero.
fn branch(value: Option<&ValueEval>) -> ValueEval {
    match value {
        None | Some(ValueEval::Missing) => ValueEval::Number(0.0),
        Some(v) => v.clone(),
    }
}

inventory::submit! {
    BuiltinFunction { name: "IF", inspects_errors: true, implementation: if_fn }
}

fn if_fn(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    let when_false = || match args.get(2) {
        None => ValueEval::Boolean(false),
        other => branch(other),
    };
    match &args[0] {
        ValueEval::Area(_) => {
            let otherwise = when_false();
            let then = branch(args.get(1));
            let element_args = [args[0].clone(), then, otherwise];
            lift(&element_args, |element| match to_bool(element[0]) {
                Ok(true) => element[1].clone(),
                Ok(false) => element[2].clone(),
                Err(e) => ValueEval::Error(e),
            })
        }
        condition => match to_bool(condition) {
            Ok(true) => branch(args.get(1)),
            Ok(false) => when_false(),
            Err(e) => ValueEval::Error(e),
        },
    }
}

inventory::submit! {
    BuiltinFunction { name: "CHOOSE", inspects_errors: true, implementation: choose }
}

fn choose(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    let (selector, choices) = match args.split_first() {
        Some(split) => split,
        None => return ValueEval::Error(ErrorKind::Value),
    };
    let pick = |selector: &ValueEval| -> ValueEval {
        let index = match to_number(selector) {
            Ok(n) => n.trunc(),
            Err(e) => return ValueEval::Error(e),
        };
        if index < 1.0 || index > choices.len() as f64 {
            return ValueEval::Error(ErrorKind::Value);
        }
        branch(choices.get(index as usize - 1))
    };
    match selector {
        ValueEval::Area(_) => lift(std::slice::from_ref(selector), |element| pick(element[0])),
        scalar => pick(scalar),
    }
}

/// Fold the logical values AND/OR see. Text and blanks inside areas are skipped; with nothing
/// left to fold the result is `#VALUE!`.
fn fold_logical(args: &[ValueEval], init: bool, f: impl Fn(bool, bool) -> bool) -> ValueEval {
    let mut acc = init;
    let mut seen = false;
    for arg in args {
        match arg {
            ValueEval::Area(area) => {
                for cell in area.values() {
                    match cell {
                        ValueEval::Boolean(b) => {
                            acc = f(acc, *b);
                            seen = true;
                        }
                        ValueEval::Number(n) => {
                            acc = f(acc, *n != 0.0);
                            seen = true;
                        }
                        ValueEval::Error(e) => return ValueEval::Error(*e),
                        _ => {}
                    }
                }
            }
            ValueEval::Blank | ValueEval::Missing => {}
            other => match to_bool(other) {
                Ok(b) => {
                    acc = f(acc, b);
                    seen = true;
                }
                Err(e) => return ValueEval::Error(e),
            },
        }
    }
    if seen {
        ValueEval::Boolean(acc)
    } else {
        ValueEval::Error(ErrorKind::Value)
    }
}

inventory::submit! {
    BuiltinFunction { name: "AND", inspects_errors: false, implementation: and }
}

fn and(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    fold_logical(args, true, |a, b| a && b)
}

inventory::submit! {
    BuiltinFunction { name: "OR", inspects_errors: false, implementation: or }
}

fn or(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    fold_logical(args, false, |a, b| a || b)
}

inventory::submit! {
    BuiltinFunction { name: "NOT", inspects_errors: false, implementation: not }
}

fn not(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift(args, |element| match to_bool(element[0]) {
        Ok(b) => ValueEval::Boolean(!b),
        Err(e) => ValueEval::Error(e),
    })
}

inventory::submit! {
    BuiltinFunction { name: "TRUE", inspects_errors: false, implementation: true_fn }
}

fn true_fn(_ctx: &CallContext<'_>, _args: &[ValueEval]) -> ValueEval {
    ValueEval::Boolean(true)
}

inventory::submit! {
    BuiltinFunction { name: "FALSE", inspects_errors: false, implementation: false_fn }
}

fn false_fn(_ctx: &CallContext<'_>, _args: &[ValueEval]) -> ValueEval {
    ValueEval::Boolean(false)
}

inventory::submit! {
    BuiltinFunction { name: "NA", inspects_errors: false, implementation: na }
}

fn na(_ctx: &CallContext<'_>, _args: &[ValueEval]) -> ValueEval {
    ValueEval::Error(ErrorKind::NA)
}

fn is_fn(args: &[ValueEval], test: fn(&ValueEval) -> bool) -> ValueEval {
    lift(args, |element| ValueEval::Boolean(test(element[0])))
}

inventory::submit! {
    BuiltinFunction { name: "ISERROR", inspects_errors: true, implementation: iserror }
}

fn iserror(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    is_fn(args, |v| v.is_error())
}

inventory::submit! {
    BuiltinFunction { name: "ISERR", inspects_errors: true, implementation: iserr }
}

fn iserr(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    is_fn(args, |v| matches!(v.error(), Some(e) if e != ErrorKind::NA))
}

inventory::submit! {
    BuiltinFunction { name: "ISNA", inspects_errors: true, implementation: isna }
}

fn isna(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    is_fn(args, |v| v.error() == Some(ErrorKind::NA))
}

inventory::submit! {
    BuiltinFunction { name: "ISNUMBER", inspects_errors: true, implementation: isnumber }
}

fn isnumber(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    is_fn(args, |v| matches!(v, ValueEval::Number(_)))
}

inventory::submit! {
    BuiltinFunction { name: "ISTEXT", inspects_errors: true, implementation: istext }
}

fn istext(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    is_fn(args, |v| matches!(v, ValueEval::Text(_)))
}

inventory::submit! {
    BuiltinFunction { name: "ISBLANK", inspects_errors: true, implementation: isblank }
}

fn isblank(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    is_fn(args, |v| matches!(v, ValueEval::Blank))
}

inventory::submit! {
    BuiltinFunction { name: "ISLOGICAL", inspects_errors: true, implementation: islogical }
}

fn islogical(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    is_fn(args, |v| matches!(v, ValueEval::Boolean(_)))
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

    #[test]
    fn if_selects_a_branch_without_evaluating_the_other_error() {
        let args = [
            ValueEval::Boolean(true),
            ValueEval::Number(1.0),
            ValueEval::Error(ErrorKind::Div0),
        ];
        assert_eq!(call("IF", if_fn, &args), ValueEval::Number(1.0));
        assert_eq!(
            call("IF", if_fn, &[ValueEval::Boolean(false), ValueEval::Number(1.0)]),
            ValueEval::Boolean(false)
        );
        assert_eq!(
            call("IF", if_fn, &[ValueEval::Boolean(true), ValueEval::Missing]),
            ValueEval::Number(0.0)
        );
    }

    #[test]
    fn if_broadcasts_an_array_condition() {
        let cond = Matrix::new(1, 2, vec![ValueEval::Boolean(true), ValueEval::Boolean(false)])
            .unwrap();
        let args = [
            ValueEval::Area(AreaEval::new(0, 0, cond)),
            ValueEval::from("y"),
            ValueEval::from("n"),
        ];
        let ValueEval::Area(out) = call("IF", if_fn, &args) else {
            panic!("expected an array result");
        };
        assert_eq!(out.get(0, 0), Some(&ValueEval::from("y")));
        assert_eq!(out.get(0, 1), Some(&ValueEval::from("n")));
    }

    #[test]
    fn choose_bounds() {
        let args = [
            ValueEval::Number(2.9),
            ValueEval::from("a"),
            ValueEval::from("b"),
        ];
        assert_eq!(call("CHOOSE", choose, &args), ValueEval::from("b"));
        let args = [ValueEval::Number(3.0), ValueEval::from("a"), ValueEval::from("b")];
        assert_eq!(call("CHOOSE", choose, &args), ValueEval::Error(ErrorKind::Value));
    }

    #[test]
    fn and_or_ignore_text_in_areas() {
        let cells = Matrix::new(
            1,
            3,
            vec![ValueEval::Boolean(true), ValueEval::from("x"), ValueEval::Number(0.0)],
        )
        .unwrap();
        let area = ValueEval::Area(AreaEval::new(0, 0, cells));
        assert_eq!(call("AND", and, &[area.clone()]), ValueEval::Boolean(false));
        assert_eq!(call("OR", or, &[area]), ValueEval::Boolean(true));
        assert_eq!(call("OR", or, &[ValueEval::from("x")]), ValueEval::Error(ErrorKind::Value));
    }

    #[test]
    fn information_functions() {
        let na = [ValueEval::Error(ErrorKind::NA)];
        assert_eq!(call("ISNA", isna, &na), ValueEval::Boolean(true));
        assert_eq!(call("ISERR", iserr, &na), ValueEval::Boolean(false));
        assert_eq!(call("ISERROR", iserror, &na), ValueEval::Boolean(true));
        assert_eq!(call("ISBLANK", isblank, &[ValueEval::Blank]), ValueEval::Boolean(true));
        assert_eq!(call("NOT", not, &[ValueEval::Number(0.0)]), ValueEval::Boolean(true));
    }
}
