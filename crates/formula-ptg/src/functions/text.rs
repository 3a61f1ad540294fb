use super::{lift, optional, BuiltinFunction, CallContext};
use crate::eval::coercion::{to_number, to_text};
use crate::value::{ErrorKind, ValueEval};

fn lift_text(args: &[ValueEval], f: impl Fn(String) -> ValueEval) -> ValueEval {
    lift(args, |element| match to_text(element[0]) {
        Ok(s) => f(s),
        Err(e) => ValueEval::Error(e),
    })
}

/// A character count argument: truncated, never negative.
fn count_arg(v: &ValueEval) -> Result<usize, ErrorKind> {
    let n = to_number(v)?.trunc();
    if n < 0.0 {
        return Err(ErrorKind::Value);
    }
    Ok(n.min(u32::MAX as f64) as usize)
}

inventory::submit! {
    BuiltinFunction { name: "LEN", inspects_errors: false, implementation: len }
}

fn len(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift_text(args, |s| ValueEval::Number(s.chars().count() as f64))
}

inventory::submit! {
    BuiltinFunction { name: "UPPER", inspects_errors: false, implementation: upper }
}

fn upper(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift_text(args, |s| ValueEval::Text(s.to_uppercase()))
}

inventory::submit! {
    BuiltinFunction { name: "LOWER", inspects_errors: false, implementation: lower }
}

fn lower(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift_text(args, |s| ValueEval::Text(s.to_lowercase()))
}

inventory::submit! {
    BuiltinFunction { name: "TRIM", inspects_errors: false, implementation: trim }
}

/// Leading and trailing spaces go; inner runs collapse to one space. Other whitespace stays.
fn trim(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift_text(args, |s| {
        let words: Vec<&str> = s.split(' ').filter(|w| !w.is_empty()).collect();
        ValueEval::Text(words.join(" "))
    })
}

fn take_side(args: &[ValueEval], from_end: bool) -> ValueEval {
    let count = optional(args, 1).cloned().unwrap_or(ValueEval::Number(1.0));
    let element_args = [args[0].clone(), count];
    lift(&element_args, |element| {
        let text = match to_text(element[0]) {
            Ok(s) => s,
            Err(e) => return ValueEval::Error(e),
        };
        let n = match count_arg(element[1]) {
            Ok(n) => n,
            Err(e) => return ValueEval::Error(e),
        };
        let out: String = if from_end {
            let total = text.chars().count();
            text.chars().skip(total.saturating_sub(n)).collect()
        } else {
            text.chars().take(n).collect()
        };
        ValueEval::Text(out)
    })
}

inventory::submit! {
    BuiltinFunction { name: "LEFT", inspects_errors: false, implementation: left }
}

fn left(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    take_side(args, false)
}

inventory::submit! {
    BuiltinFunction { name: "RIGHT", inspects_errors: false, implementation: right }
}

fn right(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    take_side(args, true)
}

inventory::submit! {
    BuiltinFunction { name: "MID", inspects_errors: false, implementation: mid }
}

fn mid(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift(args, |element| {
        let [text, start, count] = element else {
            return ValueEval::Error(ErrorKind::Value);
        };
        let text = match to_text(text) {
            Ok(s) => s,
            Err(e) => return ValueEval::Error(e),
        };
        let start = match to_number(start) {
            Ok(n) if n.trunc() >= 1.0 => n.trunc() as usize,
            Ok(_) => return ValueEval::Error(ErrorKind::Value),
            Err(e) => return ValueEval::Error(e),
        };
        let count = match count_arg(count) {
            Ok(n) => n,
            Err(e) => return ValueEval::Error(e),
        };
        ValueEval::Text(text.chars().skip(start - 1).take(count).collect())
    })
}

inventory::submit! {
    BuiltinFunction { name: "CONCATENATE", inspects_errors: false, implementation: concatenate }
}

fn concatenate(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    lift(args, |element| {
        let mut out = String::new();
        for v in element {
            match to_text(v) {
                Ok(s) => out.push_str(&s),
                Err(e) => return ValueEval::Error(e),
            }
        }
        ValueEval::Text(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::EvalContext;
    use crate::ftab::function_by_name;
    use crate::functions::BuiltinImpl;
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
    fn slicing_counts_characters() {
        let s = ValueEval::from("héllo");
        assert_eq!(call("LEN", len, &[s.clone()]), ValueEval::Number(5.0));
        assert_eq!(call("LEFT", left, &[s.clone()]), ValueEval::from("h"));
        assert_eq!(
            call("RIGHT", right, &[s.clone(), ValueEval::Number(3.0)]),
            ValueEval::from("llo")
        );
        assert_eq!(
            call("MID", mid, &[s.clone(), ValueEval::Number(2.0), ValueEval::Number(10.0)]),
            ValueEval::from("éllo")
        );
        assert_eq!(
            call("MID", mid, &[s, ValueEval::Number(0.0), ValueEval::Number(1.0)]),
            ValueEval::Error(ErrorKind::Value)
        );
    }

    #[test]
    fn trim_collapses_spaces() {
        assert_eq!(
            call("TRIM", trim, &[ValueEval::from("  a   b ")]),
            ValueEval::from("a b")
        );
    }

    #[test]
    fn concatenate_formats_numbers() {
        let args = [
            ValueEval::from("x"),
            ValueEval::Number(1.5),
            ValueEval::Boolean(true),
        ];
        assert_eq!(call("CONCATENATE", concatenate, &args), ValueEval::from("x1.5TRUE"));
        assert_eq!(call("UPPER", upper, &[ValueEval::from("aB")]), ValueEval::from("AB"));
    }
}
