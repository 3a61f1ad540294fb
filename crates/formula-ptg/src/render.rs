//! Formula text (no leading `=`) from a token sequence.
//!
//! Stored formulas carry explicit `PtgParen` tokens, so the text mostly follows the tokens
//! verbatim. Sequences assembled by hand may omit them; an operand that binds more loosely than
//! its operator is parenthesized so the text still parses back to the same tree.

use crate::error::RenderError;
use crate::eval::coercion::format_number;
use crate::ftab::{function_by_index, FTAB_USER_DEFINED};
use crate::token::{
    ArrayConstant, CellRef, Control, FunctionCall, NameRef, Operator, Reference, ScalarOperand,
    Token,
};
use crate::value::ValueEval;

/// Workbook-level labels the token stream only references by index.
pub trait RenderContext {
    /// Sheet label for an `EXTERNSHEET` index.
    fn sheet_name(&self, ixti: u16) -> String {
        format!("Sheet{}", u32::from(ixti) + 1)
    }

    fn defined_name(&self, name: NameRef) -> String {
        match name {
            NameRef::Defined { index } => format!("Name{index}"),
            NameRef::External { ixti, index } => {
                format!("{}!Name{index}", quote_sheet(&self.sheet_name(ixti)))
            }
        }
    }

    /// Cell that relative (`N`) references are displayed against.
    fn origin(&self) -> (u32, u32) {
        (0, 0)
    }
}

/// Placeholder labels (`Sheet1`, `Name3`) for every index.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderNames;

impl RenderContext for PlaceholderNames {}

const ATOM: u8 = u8::MAX;
const UNARY_PRECEDENCE: u8 = 6;
const PERCENT_PRECEDENCE: u8 = 5;

struct Expr {
    text: String,
    precedence: u8,
}

impl Expr {
    fn atom(text: String) -> Self {
        Self {
            text,
            precedence: ATOM,
        }
    }

    fn wrapped_if(self, wrap: bool) -> String {
        if wrap {
            format!("({})", self.text)
        } else {
            self.text
        }
    }
}

pub fn render_tokens(tokens: &[Token], ctx: &dyn RenderContext) -> Result<String, RenderError> {
    let mut stack: Vec<Expr> = Vec::with_capacity(tokens.len());

    for (index, token) in tokens.iter().enumerate() {
        match token {
            Token::Scalar(scalar) => stack.push(Expr::atom(scalar_text(scalar))),
            Token::Reference { reference, .. } => {
                stack.push(Expr::atom(reference_text(reference, ctx)));
            }
            Token::Name { name, .. } => stack.push(Expr::atom(ctx.defined_name(*name))),
            Token::Array { array, .. } => stack.push(Expr::atom(match array {
                Some(array) => array_text(array),
                None => "{}".to_string(),
            })),
            Token::Mem { .. } => {}
            Token::Control(control) => match control {
                Control::Exp { .. } | Control::Tbl { .. } => {
                    return Err(RenderError::UnresolvedSharedFormula { index });
                }
                Control::Paren => {
                    let inner = pop(&mut stack, 1, index, token)?.remove(0);
                    stack.push(Expr::atom(format!("({})", inner.text)));
                }
                Control::MissingArg => stack.push(Expr::atom(String::new())),
                Control::Attr(attr) if attr.is_sum() => {
                    let arg = pop(&mut stack, 1, index, token)?.remove(0);
                    stack.push(Expr::atom(format!("SUM({})", argument_text(arg))));
                }
                Control::Attr(_) => {}
            },
            Token::Operator(op) => {
                let mut operands = pop(&mut stack, op.arity(), index, token)?;
                let expr = if op.is_unary() {
                    let operand = operands.remove(0);
                    if *op == Operator::Percent {
                        let wrap = operand.precedence < PERCENT_PRECEDENCE;
                        Expr {
                            text: format!("{}%", operand.wrapped_if(wrap)),
                            precedence: PERCENT_PRECEDENCE,
                        }
                    } else {
                        let wrap = operand.precedence < UNARY_PRECEDENCE;
                        Expr {
                            text: format!("{}{}", op.symbol(), operand.wrapped_if(wrap)),
                            precedence: UNARY_PRECEDENCE,
                        }
                    }
                } else {
                    let precedence = op.precedence();
                    let right = operands.remove(1);
                    let left = operands.remove(0);
                    let wrap_left = left.precedence < precedence;
                    let wrap_right = right.precedence <= precedence;
                    Expr {
                        text: format!(
                            "{}{}{}",
                            left.wrapped_if(wrap_left),
                            op.symbol(),
                            right.wrapped_if(wrap_right)
                        ),
                        precedence,
                    }
                };
                stack.push(expr);
            }
            Token::Function { call, .. } => {
                let func_id = call.index();
                let meta = function_by_index(func_id)
                    .ok_or(RenderError::UnknownFunctionId { index, func_id })?;
                let argc = match *call {
                    FunctionCall::Fixed { .. } => meta.min_params as usize,
                    FunctionCall::Variable { argc, .. } => argc as usize,
                };
                let mut args = pop(&mut stack, argc, index, token)?;
                // The add-in dispatcher's first argument names the function being called.
                let name = if meta.index == FTAB_USER_DEFINED && !args.is_empty() {
                    args.remove(0).text
                } else {
                    meta.name.to_string()
                };
                let args: Vec<String> = args.into_iter().map(argument_text).collect();
                stack.push(Expr::atom(format!("{name}({})", args.join(","))));
            }
        }
    }

    if stack.len() != 1 {
        return Err(RenderError::StackNotSingular {
            stack_len: stack.len(),
        });
    }
    Ok(stack.pop().map(|e| e.text).unwrap_or_default())
}

fn pop(
    stack: &mut Vec<Expr>,
    count: usize,
    index: usize,
    token: &Token,
) -> Result<Vec<Expr>, RenderError> {
    if stack.len() < count {
        return Err(RenderError::StackUnderflow {
            index,
            ptg: token.opcode(),
            needed: count,
            available: stack.len(),
        });
    }
    Ok(stack.split_off(stack.len() - count))
}

/// A bare union inside an argument list would read as two arguments.
fn argument_text(arg: Expr) -> String {
    let wrap = arg.precedence == Operator::Union.precedence();
    arg.wrapped_if(wrap)
}

fn scalar_text(scalar: &ScalarOperand) -> String {
    match scalar {
        ScalarOperand::Int(n) => n.to_string(),
        ScalarOperand::Number(n) => format_number(*n),
        ScalarOperand::Text(s) => quote_text(s),
        ScalarOperand::Boolean(true) => "TRUE".to_string(),
        ScalarOperand::Boolean(false) => "FALSE".to_string(),
        ScalarOperand::Error(e) => e.as_code().to_string(),
    }
}

fn quote_text(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn array_text(array: &ArrayConstant) -> String {
    let rows: Vec<String> = array
        .matrix()
        .row_slices()
        .map(|row| {
            let cells: Vec<String> = row
                .iter()
                .map(|c| match c.to_value() {
                    ValueEval::Number(n) => format_number(n),
                    ValueEval::Text(s) => quote_text(&s),
                    ValueEval::Boolean(true) => "TRUE".to_string(),
                    ValueEval::Boolean(false) => "FALSE".to_string(),
                    ValueEval::Error(e) => e.as_code().to_string(),
                    _ => String::new(),
                })
                .collect();
            cells.join(",")
        })
        .collect();
    format!("{{{}}}", rows.join(";"))
}

/// Append the A1 column label for a zero-based column index.
pub fn push_column_label(col: u32, out: &mut String) {
    let mut col = col + 1;
    let mut buf = [0u8; 8];
    let mut i = 0usize;
    while col > 0 {
        buf[i] = b'A' + ((col - 1) % 26) as u8;
        i += 1;
        col = (col - 1) / 26;
    }
    for ch in buf[..i].iter().rev() {
        out.push(*ch as char);
    }
}

fn push_cell(row: u32, col: u32, row_absolute: bool, col_absolute: bool, out: &mut String) {
    if col_absolute {
        out.push('$');
    }
    push_column_label(col, out);
    if row_absolute {
        out.push('$');
    }
    out.push_str(&(row + 1).to_string());
}

fn push_cell_ref(cell: &CellRef, out: &mut String) {
    push_cell(
        u32::from(cell.row),
        u32::from(cell.col),
        !cell.row_relative,
        !cell.col_relative,
        out,
    );
}

/// Shared-formula offsets rendered against `origin`; `false` when they leave the grid.
fn push_offset_ref(cell: &CellRef, origin: (u32, u32), out: &mut String) -> bool {
    match cell.resolve_offset(origin.0, origin.1) {
        Some((row, col)) => {
            push_cell(row, col, !cell.row_relative, !cell.col_relative, out);
            true
        }
        None => false,
    }
}

/// Sheet labels that are not plain identifiers are single-quoted.
fn quote_sheet(name: &str) -> String {
    let plain = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

fn reference_text(reference: &Reference, ctx: &dyn RenderContext) -> String {
    const REF_ERROR: &str = "#REF!";
    let mut out = String::new();
    match reference {
        Reference::Cell(cell) => push_cell_ref(cell, &mut out),
        Reference::Area(area) => {
            push_cell_ref(&area.first, &mut out);
            out.push(':');
            push_cell_ref(&area.last, &mut out);
        }
        Reference::CellN(cell) => {
            if !push_offset_ref(cell, ctx.origin(), &mut out) {
                return REF_ERROR.to_string();
            }
        }
        Reference::AreaN(area) => {
            let origin = ctx.origin();
            let first = push_offset_ref(&area.first, origin, &mut out);
            out.push(':');
            if !first || !push_offset_ref(&area.last, origin, &mut out) {
                return REF_ERROR.to_string();
            }
        }
        Reference::CellErr | Reference::AreaErr => out.push_str(REF_ERROR),
        Reference::Cell3d { ixti, cell } => {
            out.push_str(&quote_sheet(&ctx.sheet_name(*ixti)));
            out.push('!');
            push_cell_ref(cell, &mut out);
        }
        Reference::Area3d { ixti, area } => {
            out.push_str(&quote_sheet(&ctx.sheet_name(*ixti)));
            out.push('!');
            push_cell_ref(&area.first, &mut out);
            out.push(':');
            push_cell_ref(&area.last, &mut out);
        }
        Reference::CellErr3d { ixti } | Reference::AreaErr3d { ixti } => {
            out.push_str(&quote_sheet(&ctx.sheet_name(*ixti)));
            out.push('!');
            out.push_str(REF_ERROR);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{AreaRef, Attr, OperandClass};
    use crate::value::ErrorKind;
    use pretty_assertions::assert_eq;

    fn text(tokens: &[Token]) -> String {
        render_tokens(tokens, &PlaceholderNames).unwrap()
    }

    #[test]
    fn column_labels() {
        for (col, want) in [(0, "A"), (25, "Z"), (26, "AA"), (255, "IV"), (16383, "XFD")] {
            let mut out = String::new();
            push_column_label(col, &mut out);
            assert_eq!(out, want);
        }
    }

    #[test]
    fn absolute_markers_follow_flags() {
        let cell = Reference::Cell(CellRef {
            row: 4,
            col: 2,
            row_relative: false,
            col_relative: true,
        });
        assert_eq!(text(&[Token::reference(cell, OperandClass::Value)]), "C$5");
    }

    #[test]
    fn explicit_parentheses_are_not_doubled() {
        let tokens = [
            Token::int(1),
            Token::int(2),
            Token::op(Operator::Add),
            Token::Control(Control::Paren),
            Token::int(3),
            Token::op(Operator::Multiply),
        ];
        assert_eq!(text(&tokens), "(1+2)*3");
    }

    #[test]
    fn missing_parentheses_are_inserted() {
        let tokens = [
            Token::int(1),
            Token::int(2),
            Token::int(3),
            Token::op(Operator::Subtract),
            Token::op(Operator::Subtract),
        ];
        assert_eq!(text(&tokens), "1-(2-3)");
        let tokens = [
            Token::int(1),
            Token::int(2),
            Token::op(Operator::Add),
            Token::op(Operator::UnaryMinus),
        ];
        assert_eq!(text(&tokens), "-(1+2)");
    }

    #[test]
    fn functions_strings_and_attr_sum() {
        let tokens = [
            Token::area(0, 0, 9, 0),
            Token::Control(Control::Attr(Attr::sum())),
            Token::text("say \"hi\""),
            Token::error(ErrorKind::NA),
            Token::function(FunctionCall::variable(1, 3), OperandClass::Value),
        ];
        assert_eq!(text(&tokens), "IF(SUM(A1:A10),\"say \"\"hi\"\"\",#N/A)");
    }

    #[test]
    fn array_literals_and_sheets() {
        let array = ArrayConstant::new(
            2,
            2,
            vec![
                crate::ConstantValue::Number(1.0),
                crate::ConstantValue::Text("a".into()),
                crate::ConstantValue::Boolean(true),
                crate::ConstantValue::Number(0.5),
            ],
        )
        .unwrap();
        assert_eq!(text(&[Token::array(array)]), "{1,\"a\";TRUE,0.5}");

        struct Named;
        impl RenderContext for Named {
            fn sheet_name(&self, _ixti: u16) -> String {
                "My Sheet".to_string()
            }
        }
        let area = Reference::Area3d {
            ixti: 0,
            area: AreaRef::new(CellRef::absolute(0, 0), CellRef::absolute(1, 1)),
        };
        let tokens = [Token::reference(area, OperandClass::Reference)];
        assert_eq!(render_tokens(&tokens, &Named).unwrap(), "'My Sheet'!$A$1:$B$2");
    }

    #[test]
    fn shared_formula_markers_have_no_text() {
        let tokens = [Token::Control(Control::Exp { row: 0, col: 0 })];
        assert_eq!(
            render_tokens(&tokens, &PlaceholderNames),
            Err(RenderError::UnresolvedSharedFormula { index: 0 })
        );
    }
}
