use smallvec::{smallvec, SmallVec};

use super::context::{EvalContext, EvalSettings};
use super::operators::{apply_scalar, broadcast};
use super::source::{CellValueSource, ResolvedRange, SheetRef};
use crate::error::EvalError;
use crate::ftab::{FunctionMetadata, FunctionMetadataRegistry, FTAB_USER_DEFINED};
use crate::functions::{CallContext, FunctionTable};
use crate::token::{
    ArrayConstant, Control, FunctionCall, OperandClass, Operator, Reference, ScalarOperand, Token,
};
use crate::value::{AreaEval, ErrorKind, ValueEval};

const SUM_INDEX: u16 = 4;

/// One or more rectangles; more than one only after the union operator.
type Ranges = SmallVec<[ResolvedRange; 1]>;

#[derive(Debug, Clone)]
enum StackValue {
    Value(ValueEval),
    /// References stay unresolved until an operator or function decides how to read them.
    Reference(Ranges),
}

/// Stack machine over a token sequence in reverse Polish order.
pub struct Evaluator<'a, S: CellValueSource + ?Sized> {
    source: &'a S,
    ctx: EvalContext,
    settings: EvalSettings,
    functions: &'a FunctionTable,
}

impl<'a, S: CellValueSource + ?Sized> Evaluator<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            ctx: EvalContext::default(),
            settings: EvalSettings::default(),
            functions: FunctionTable::builtin(),
        }
    }

    pub fn with_context(mut self, ctx: EvalContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn with_settings(mut self, settings: EvalSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_functions(mut self, functions: &'a FunctionTable) -> Self {
        self.functions = functions;
        self
    }

    pub fn context(&self) -> &EvalContext {
        &self.ctx
    }

    pub fn evaluate(&self, tokens: &[Token]) -> Result<ValueEval, EvalError> {
        let result = self.run(tokens);
        if let Err(err) = &result {
            log::warn!(
                "formula evaluation aborted at row {} col {}: {err}",
                self.ctx.row,
                self.ctx.col
            );
        }
        result
    }

    fn run(&self, tokens: &[Token]) -> Result<ValueEval, EvalError> {
        let registry = FunctionMetadataRegistry::global();
        let mut stack: Vec<StackValue> =
            Vec::with_capacity(tokens.len().min(self.settings.max_stack_depth));

        for (index, token) in tokens.iter().enumerate() {
            let pushed = match token {
                Token::Scalar(scalar) => Some(StackValue::Value(scalar_value(scalar))),
                Token::Reference { reference, .. } => Some(self.reference_value(reference)),
                Token::Name { name, .. } => Some(StackValue::Value(self.source.resolve_name(*name))),
                Token::Array { array, .. } => Some(StackValue::Value(match array {
                    Some(array) => self.array_value(array),
                    None => ValueEval::Error(ErrorKind::Value),
                })),
                Token::Mem { .. } => None,
                Token::Control(control) => match control {
                    Control::Exp { .. } | Control::Tbl { .. } => {
                        return Err(EvalError::UnresolvedSharedFormula { index });
                    }
                    Control::Paren => None,
                    Control::MissingArg => Some(StackValue::Value(ValueEval::Missing)),
                    Control::Attr(attr) if attr.is_sum() => {
                        let args = pop_args(&mut stack, 1, index, token)?;
                        let meta = registry.by_index(SUM_INDEX).ok_or(
                            EvalError::UnknownFunctionId {
                                index,
                                func_id: SUM_INDEX,
                            },
                        )?;
                        Some(self.call_function(meta, args)?)
                    }
                    Control::Attr(_) => None,
                },
                Token::Operator(op) => {
                    let args = pop_args(&mut stack, op.arity(), index, token)?;
                    Some(self.apply_operator(*op, args))
                }
                Token::Function { call, .. } => {
                    let func_id = call.index();
                    let meta = registry
                        .by_index(func_id)
                        .ok_or(EvalError::UnknownFunctionId { index, func_id })?;
                    let argc = match *call {
                        FunctionCall::Fixed { .. } => meta.min_params as usize,
                        FunctionCall::Variable { argc, .. } => argc as usize,
                    };
                    let args = pop_args(&mut stack, argc, index, token)?;
                    Some(self.call_function(meta, args)?)
                }
            };

            if let Some(value) = pushed {
                if stack.len() >= self.settings.max_stack_depth {
                    return Err(EvalError::StackOverflow {
                        index,
                        limit: self.settings.max_stack_depth,
                    });
                }
                stack.push(value);
            }
        }

        if stack.len() != 1 {
            return Err(EvalError::StackNotSingular {
                stack_len: stack.len(),
            });
        }
        match stack.pop() {
            Some(StackValue::Value(v)) => Ok(finish_value(v)),
            Some(StackValue::Reference(ranges)) => Ok(finish_value(self.value_operand(&ranges))),
            None => Err(EvalError::StackNotSingular { stack_len: 0 }),
        }
    }

    fn reference_value(&self, reference: &Reference) -> StackValue {
        let (row, col) = (self.ctx.row, self.ctx.col);
        let range = match reference {
            Reference::Cell(cell) => {
                ResolvedRange::cell(SheetRef::Current, u32::from(cell.row), u32::from(cell.col))
            }
            Reference::Area(area) => ResolvedRange::new(
                SheetRef::Current,
                u32::from(area.first.row),
                u32::from(area.first.col),
                u32::from(area.last.row),
                u32::from(area.last.col),
            ),
            Reference::CellN(cell) => match cell.resolve_offset(row, col) {
                Some((r, c)) => ResolvedRange::cell(SheetRef::Current, r, c),
                None => return StackValue::Value(ValueEval::Error(ErrorKind::Ref)),
            },
            Reference::AreaN(area) => match (
                area.first.resolve_offset(row, col),
                area.last.resolve_offset(row, col),
            ) {
                (Some((r1, c1)), Some((r2, c2))) => {
                    ResolvedRange::new(SheetRef::Current, r1, c1, r2, c2)
                }
                _ => return StackValue::Value(ValueEval::Error(ErrorKind::Ref)),
            },
            Reference::Cell3d { ixti, cell } => {
                let sheet = SheetRef::External(*ixti);
                if !self.source.sheet_exists(sheet) {
                    return StackValue::Value(ValueEval::Error(ErrorKind::Ref));
                }
                ResolvedRange::cell(sheet, u32::from(cell.row), u32::from(cell.col))
            }
            Reference::Area3d { ixti, area } => {
                let sheet = SheetRef::External(*ixti);
                if !self.source.sheet_exists(sheet) {
                    return StackValue::Value(ValueEval::Error(ErrorKind::Ref));
                }
                ResolvedRange::new(
                    sheet,
                    u32::from(area.first.row),
                    u32::from(area.first.col),
                    u32::from(area.last.row),
                    u32::from(area.last.col),
                )
            }
            Reference::CellErr
            | Reference::AreaErr
            | Reference::CellErr3d { .. }
            | Reference::AreaErr3d { .. } => {
                return StackValue::Value(ValueEval::Error(ErrorKind::Ref))
            }
        };
        StackValue::Reference(smallvec![range])
    }

    /// Array literals carry no sheet position; they are anchored at the formula's cell.
    fn array_value(&self, array: &ArrayConstant) -> ValueEval {
        let cells = array.matrix().map(|c| c.to_value());
        ValueEval::Area(AreaEval::new(self.ctx.row, self.ctx.col, cells))
    }

    fn apply_operator(&self, op: Operator, args: Vec<StackValue>) -> StackValue {
        if op.is_reference_operator() {
            return reference_operator(op, args);
        }
        let values: SmallVec<[ValueEval; 2]> =
            args.into_iter().map(|arg| self.operand(arg)).collect();
        let refs: SmallVec<[&ValueEval; 2]> = values.iter().collect();
        StackValue::Value(broadcast(&refs, |element| apply_scalar(op, element)))
    }

    /// Read a stack entry as an operator operand.
    fn operand(&self, arg: StackValue) -> ValueEval {
        match arg {
            StackValue::Value(v) => v,
            StackValue::Reference(ranges) => self.value_operand(&ranges),
        }
    }

    /// A reference read where a value is expected: intersected with the formula's cell, or read
    /// whole in an array formula.
    fn value_operand(&self, ranges: &[ResolvedRange]) -> ValueEval {
        let [range] = ranges else {
            return ValueEval::Error(ErrorKind::Value);
        };
        if self.ctx.array_formula {
            if range.is_single_cell() {
                self.cell_value(range.sheet, range.first_row, range.first_col)
            } else {
                self.materialize(range)
            }
        } else {
            self.implicit_intersection(range)
        }
    }

    fn implicit_intersection(&self, range: &ResolvedRange) -> ValueEval {
        if range.is_single_cell() {
            return self.cell_value(range.sheet, range.first_row, range.first_col);
        }
        let (row, col) = (self.ctx.row, self.ctx.col);

        // 1D ranges intersect on the matching row/column.
        if range.first_col == range.last_col {
            if (range.first_row..=range.last_row).contains(&row) {
                return self.cell_value(range.sheet, row, range.first_col);
            }
            return ValueEval::Error(ErrorKind::Value);
        }
        if range.first_row == range.last_row {
            if (range.first_col..=range.last_col).contains(&col) {
                return self.cell_value(range.sheet, range.first_row, col);
            }
            return ValueEval::Error(ErrorKind::Value);
        }

        if range.contains(row, col) {
            return self.cell_value(range.sheet, row, col);
        }
        ValueEval::Error(ErrorKind::Value)
    }

    fn cell_value(&self, sheet: SheetRef, row: u32, col: u32) -> ValueEval {
        let mut value = self.source.resolve(sheet, row, col);
        for _ in 0..self.settings.max_value_nesting {
            match value {
                ValueEval::Area(area) => {
                    value = area
                        .get(0, 0)
                        .cloned()
                        .unwrap_or(ValueEval::Error(ErrorKind::Value));
                }
                other => return other,
            }
        }
        match value {
            ValueEval::Area(_) => ValueEval::Error(ErrorKind::Value),
            other => other,
        }
    }

    fn materialize(&self, range: &ResolvedRange) -> ValueEval {
        if range.cell_count() > self.settings.max_area_cells {
            log::debug!(
                "refusing to materialize {}x{} area (limit {} cells)",
                range.rows(),
                range.cols(),
                self.settings.max_area_cells
            );
            return ValueEval::Error(ErrorKind::Num);
        }
        match self.source.resolve_area(range) {
            Ok(area) => ValueEval::Area(area),
            Err(e) => ValueEval::Error(e),
        }
    }

    fn call_function(
        &self,
        meta: &'static FunctionMetadata,
        raw: Vec<StackValue>,
    ) -> Result<StackValue, EvalError> {
        if !meta.accepts(raw.len()) {
            log::debug!("{} called with {} arguments", meta.name, raw.len());
            return Ok(StackValue::Value(ValueEval::Error(ErrorKind::Value)));
        }
        if meta.index == FTAB_USER_DEFINED {
            log::debug!("add-in/user-defined call with {} args evaluates to #NAME?", raw.len());
            return Ok(StackValue::Value(ValueEval::Error(ErrorKind::Name)));
        }
        let imp = self
            .functions
            .get(meta.index)
            .ok_or(EvalError::FunctionNotImplemented {
                func_id: meta.index,
                name: meta.name,
            })?;

        let mut args: SmallVec<[ValueEval; 4]> = SmallVec::with_capacity(raw.len());
        for (position, arg) in raw.into_iter().enumerate() {
            match arg {
                StackValue::Value(v) => args.push(v),
                StackValue::Reference(ranges) if ranges.len() > 1 => {
                    log::debug!("{} receives a union of {} areas", meta.name, ranges.len());
                    args.extend(ranges.iter().map(|r| self.materialize(r)));
                }
                StackValue::Reference(ranges) => {
                    let reads_whole = matches!(
                        meta.parameter_class(position),
                        OperandClass::Reference | OperandClass::Array
                    );
                    if reads_whole {
                        args.extend(ranges.iter().map(|r| self.materialize(r)));
                    } else {
                        args.push(self.value_operand(&ranges));
                    }
                }
            }
        }

        if !imp.inspects_errors() {
            if let Some(err) = args.iter().find_map(ValueEval::error) {
                return Ok(StackValue::Value(ValueEval::Error(err)));
            }
        }

        let ctx = CallContext {
            eval: &self.ctx,
            metadata: meta,
        };
        Ok(StackValue::Value(normalize(imp.evaluate(&ctx, &args))))
    }
}

fn scalar_value(scalar: &ScalarOperand) -> ValueEval {
    match scalar {
        ScalarOperand::Int(n) => ValueEval::Number(f64::from(*n)),
        ScalarOperand::Number(n) => ValueEval::number(*n),
        ScalarOperand::Text(s) => ValueEval::Text(s.clone()),
        ScalarOperand::Boolean(b) => ValueEval::Boolean(*b),
        ScalarOperand::Error(e) => ValueEval::Error(*e),
    }
}

fn pop_args(
    stack: &mut Vec<StackValue>,
    count: usize,
    index: usize,
    token: &Token,
) -> Result<Vec<StackValue>, EvalError> {
    if stack.len() < count {
        return Err(EvalError::StackUnderflow {
            index,
            ptg: token.opcode(),
            needed: count,
            available: stack.len(),
        });
    }
    Ok(stack.split_off(stack.len() - count))
}

fn reference_operator(op: Operator, args: Vec<StackValue>) -> StackValue {
    let Ok([left, right]) = <[StackValue; 2]>::try_from(args) else {
        return StackValue::Value(ValueEval::Error(ErrorKind::Value));
    };
    match (left, right) {
        (StackValue::Reference(l), StackValue::Reference(r)) => match op {
            Operator::Union => {
                let mut out = l;
                out.extend(r);
                StackValue::Reference(out)
            }
            Operator::Range => {
                let mut all = l.iter().chain(r.iter());
                let Some(first) = all.next().copied() else {
                    return StackValue::Value(ValueEval::Error(ErrorKind::Ref));
                };
                match all.try_fold(first, |acc, next| acc.bounding(next)) {
                    Some(bounds) => StackValue::Reference(smallvec![bounds]),
                    None => StackValue::Value(ValueEval::Error(ErrorKind::Ref)),
                }
            }
            _ => {
                let out: Ranges = l
                    .iter()
                    .flat_map(|a| r.iter().filter_map(move |b| a.intersect(b)))
                    .collect();
                if out.is_empty() {
                    StackValue::Value(ValueEval::Error(ErrorKind::Null))
                } else {
                    StackValue::Reference(out)
                }
            }
        },
        (StackValue::Value(ValueEval::Error(e)), _) | (_, StackValue::Value(ValueEval::Error(e))) => {
            StackValue::Value(ValueEval::Error(e))
        }
        _ => StackValue::Value(ValueEval::Error(ErrorKind::Value)),
    }
}

fn normalize(value: ValueEval) -> ValueEval {
    match value {
        ValueEval::Number(n) => ValueEval::number(n),
        other => other,
    }
}

fn finish_value(value: ValueEval) -> ValueEval {
    match value {
        ValueEval::Missing => ValueEval::Blank,
        other => normalize(other),
    }
}
