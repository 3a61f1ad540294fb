//! Array-shaped worksheet functions.
//!
//! Operands are read as dense numeric matrices: a scalar is a 1x1 matrix and every cell of an
//! area must hold a number. Results are areas anchored at the first operand's top-left cell, or
//! at the formula's cell when that operand is a scalar.

use super::{BuiltinFunction, CallContext};
use crate::eval::coercion::to_number;
use crate::matrix::{Matrix, MatrixError};
use crate::value::{AreaEval, ErrorKind, ValueEval};

fn numeric_matrix(v: &ValueEval) -> Result<Matrix<f64>, ErrorKind> {
    match v {
        ValueEval::Area(area) => area.cells().try_map(|cell| match cell {
            ValueEval::Number(n) => Ok(*n),
            ValueEval::Error(e) => Err(*e),
            _ => Err(ErrorKind::Value),
        }),
        other => Ok(Matrix::scalar(to_number(other)?)),
    }
}

fn anchor(ctx: &CallContext<'_>, v: &ValueEval) -> (u32, u32) {
    match v {
        ValueEval::Area(area) => (area.first_row(), area.first_col()),
        _ => (ctx.eval.row, ctx.eval.col),
    }
}

/// A single non-finite element poisons the whole result.
fn numeric_result((row, col): (u32, u32), m: Matrix<f64>) -> ValueEval {
    if m.iter().any(|n| !n.is_finite()) {
        return ValueEval::Error(ErrorKind::Num);
    }
    ValueEval::Area(AreaEval::new(row, col, m.map(|n| ValueEval::Number(*n))))
}

fn matrix_error(err: MatrixError) -> ValueEval {
    log::debug!("matrix function failed: {err}");
    ValueEval::Error(err.to_error_kind())
}

inventory::submit! {
    BuiltinFunction { name: "TRANSPOSE", inspects_errors: false, implementation: transpose }
}

fn transpose(ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    let (row, col) = anchor(ctx, &args[0]);
    let cells = match &args[0] {
        ValueEval::Area(area) => area.cells().transpose(),
        scalar => Matrix::scalar(scalar.clone()),
    };
    ValueEval::Area(AreaEval::new(row, col, cells))
}

inventory::submit! {
    BuiltinFunction { name: "MDETERM", inspects_errors: false, implementation: mdeterm }
}

fn mdeterm(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    let m = match numeric_matrix(&args[0]) {
        Ok(m) => m,
        Err(e) => return ValueEval::Error(e),
    };
    match m.determinant() {
        Ok(det) => ValueEval::number(det),
        Err(err) => matrix_error(err),
    }
}

inventory::submit! {
    BuiltinFunction { name: "MINVERSE", inspects_errors: false, implementation: minverse }
}

fn minverse(ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    let m = match numeric_matrix(&args[0]) {
        Ok(m) => m,
        Err(e) => return ValueEval::Error(e),
    };
    match m.inverse() {
        Ok(inv) => numeric_result(anchor(ctx, &args[0]), inv),
        Err(err) => matrix_error(err),
    }
}

inventory::submit! {
    BuiltinFunction { name: "MMULT", inspects_errors: false, implementation: mmult }
}

fn mmult(ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    let (left, right) = match (numeric_matrix(&args[0]), numeric_matrix(&args[1])) {
        (Ok(l), Ok(r)) => (l, r),
        (Err(e), _) | (_, Err(e)) => return ValueEval::Error(e),
    };
    match left.multiply(&right) {
        Ok(product) => numeric_result(anchor(ctx, &args[0]), product),
        Err(err) => matrix_error(err),
    }
}

inventory::submit! {
    BuiltinFunction { name: "ROWS", inspects_errors: false, implementation: rows }
}

fn rows(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    match &args[0] {
        ValueEval::Area(area) => ValueEval::Number(area.rows() as f64),
        _ => ValueEval::Number(1.0),
    }
}

inventory::submit! {
    BuiltinFunction { name: "COLUMNS", inspects_errors: false, implementation: columns }
}

fn columns(_ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
    match &args[0] {
        ValueEval::Area(area) => ValueEval::Number(area.cols() as f64),
        _ => ValueEval::Number(1.0),
    }
}
