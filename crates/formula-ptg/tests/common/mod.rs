#![allow(dead_code)]

use formula_ptg::ftab::function_by_name;
use formula_ptg::{
    AreaEval, ConstantValue, EvalContext, Formula, FunctionCall, Matrix, OperandClass,
    SparseGrid, Token, ValueEval,
};

/// A function call token, `PtgFunc` when the function's arity is fixed.
pub fn call(name: &str, argc: u8) -> Token {
    let meta = function_by_name(name).expect("known function");
    let call = if meta.has_fixed_arity() {
        assert_eq!(argc, meta.min_params, "{name} takes {} args", meta.min_params);
        FunctionCall::fixed(meta.index)
    } else {
        FunctionCall::variable(meta.index, argc)
    };
    Token::function(call, meta.return_class)
}

pub fn grid(cells: &[(u32, u32, ValueEval)]) -> SparseGrid {
    let mut grid = SparseGrid::new();
    for (row, col, value) in cells {
        grid.set(*row, *col, value.clone());
    }
    grid
}

pub fn eval(tokens: Vec<Token>, grid: &SparseGrid) -> ValueEval {
    Formula::new(tokens).evaluate(grid).expect("evaluate")
}

pub fn eval_array(tokens: Vec<Token>, grid: &SparseGrid) -> ValueEval {
    Formula::new(tokens)
        .evaluate_at(grid, EvalContext::default().array())
        .expect("evaluate")
}

pub fn numbers(rows: usize, cols: usize, values: &[f64]) -> Matrix<ValueEval> {
    let cells = values.iter().map(|n| ValueEval::Number(*n)).collect();
    Matrix::new(rows, cols, cells).expect("matrix shape")
}

/// Row-major numbers of an area result.
pub fn area_numbers(value: &ValueEval) -> (usize, usize, Vec<f64>) {
    let ValueEval::Area(area) = value else {
        panic!("expected an area, got {value:?}");
    };
    let values = area
        .values()
        .map(|v| match v {
            ValueEval::Number(n) => *n,
            other => panic!("expected a number, got {other:?}"),
        })
        .collect();
    (area.rows(), area.cols(), values)
}

pub fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
    }
}

pub fn number_array(rows: usize, cols: usize, values: &[f64]) -> Token {
    let cells = values.iter().map(|n| ConstantValue::Number(*n)).collect();
    Token::array(formula_ptg::ArrayConstant::new(rows, cols, cells).expect("array shape"))
}

pub fn area_value(first_row: u32, first_col: u32, cells: Matrix<ValueEval>) -> ValueEval {
    ValueEval::Area(AreaEval::new(first_row, first_col, cells))
}

pub fn reference_class(token: Token) -> Token {
    token.with_operand_class(OperandClass::Reference)
}
