//! BIFF8 parsed-expression tokens (`Ptg`s).
//!
//! A classed token's opcode is `base + class offset`: `PtgRef` is `0x24` (reference), `0x44`
//! (value) or `0x64` (array). Unclassed tokens (`0x01..=0x1F`) always report
//! [`OperandClass::Value`] and ignore [`Token::with_operand_class`].

use serde::{Deserialize, Serialize};

use crate::constants::{self, ConstantValue};
use crate::matrix::{Matrix, MatrixError};
use crate::value::ErrorKind;

pub(crate) const COL_INDEX_MASK: u16 = 0x3FFF;
pub(crate) const COL_RELATIVE_BIT: u16 = 0x4000;
pub(crate) const ROW_RELATIVE_BIT: u16 = 0x8000;

/// Largest zero-based row/column addressable in a BIFF8 sheet.
pub const BIFF8_MAX_ROW: u32 = 0xFFFF;
pub const BIFF8_MAX_COL: u32 = 0xFF;

/// Largest array literal BIFF8 can store (the dimensions are stored minus one).
pub const MAX_ARRAY_COLS: usize = 0x100;
pub const MAX_ARRAY_ROWS: usize = 0x1_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandClass {
    Reference,
    Value,
    Array,
}

impl OperandClass {
    pub fn opcode_offset(self) -> u8 {
        match self {
            OperandClass::Reference => 0x00,
            OperandClass::Value => 0x20,
            OperandClass::Array => 0x40,
        }
    }

    /// Split a classed opcode (`0x20..=0x7F`) into its base id and class.
    pub fn split_opcode(opcode: u8) -> Option<(u8, OperandClass)> {
        let class = match opcode & 0x60 {
            0x20 => OperandClass::Reference,
            0x40 => OperandClass::Value,
            0x60 => OperandClass::Array,
            _ => return None,
        };
        if opcode & 0x80 != 0 {
            return None;
        }
        Some((0x20 | (opcode & 0x1F), class))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Concat,
    Less,
    LessEqual,
    Equal,
    GreaterEqual,
    Greater,
    NotEqual,
    Intersect,
    Union,
    Range,
    UnaryPlus,
    UnaryMinus,
    Percent,
}

impl Operator {
    const ALL: [Operator; 18] = [
        Operator::Add,
        Operator::Subtract,
        Operator::Multiply,
        Operator::Divide,
        Operator::Power,
        Operator::Concat,
        Operator::Less,
        Operator::LessEqual,
        Operator::Equal,
        Operator::GreaterEqual,
        Operator::Greater,
        Operator::NotEqual,
        Operator::Intersect,
        Operator::Union,
        Operator::Range,
        Operator::UnaryPlus,
        Operator::UnaryMinus,
        Operator::Percent,
    ];

    pub fn base_opcode(self) -> u8 {
        match self {
            Operator::Add => 0x03,
            Operator::Subtract => 0x04,
            Operator::Multiply => 0x05,
            Operator::Divide => 0x06,
            Operator::Power => 0x07,
            Operator::Concat => 0x08,
            Operator::Less => 0x09,
            Operator::LessEqual => 0x0A,
            Operator::Equal => 0x0B,
            Operator::GreaterEqual => 0x0C,
            Operator::Greater => 0x0D,
            Operator::NotEqual => 0x0E,
            Operator::Intersect => 0x0F,
            Operator::Union => 0x10,
            Operator::Range => 0x11,
            Operator::UnaryPlus => 0x12,
            Operator::UnaryMinus => 0x13,
            Operator::Percent => 0x14,
        }
    }

    pub fn from_opcode(opcode: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.base_opcode() == opcode)
    }

    pub fn arity(self) -> usize {
        if self.is_unary() {
            1
        } else {
            2
        }
    }

    pub fn is_unary(self) -> bool {
        matches!(
            self,
            Operator::UnaryPlus | Operator::UnaryMinus | Operator::Percent
        )
    }

    /// Operators that combine references rather than values.
    pub fn is_reference_operator(self) -> bool {
        matches!(self, Operator::Intersect | Operator::Union | Operator::Range)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add | Operator::UnaryPlus => "+",
            Operator::Subtract | Operator::UnaryMinus => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Power => "^",
            Operator::Concat => "&",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::Equal => "=",
            Operator::GreaterEqual => ">=",
            Operator::Greater => ">",
            Operator::NotEqual => "<>",
            Operator::Intersect => " ",
            Operator::Union => ",",
            Operator::Range => ":",
            Operator::Percent => "%",
        }
    }

    /// Binding strength used when rendering; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Range => 9,
            Operator::Intersect => 8,
            Operator::Union => 7,
            Operator::UnaryPlus | Operator::UnaryMinus => 6,
            Operator::Percent => 5,
            Operator::Power => 4,
            Operator::Multiply | Operator::Divide => 3,
            Operator::Add | Operator::Subtract => 2,
            Operator::Concat => 1,
            Operator::Less
            | Operator::LessEqual
            | Operator::Equal
            | Operator::GreaterEqual
            | Operator::Greater
            | Operator::NotEqual => 0,
        }
    }
}

/// Literal operands embedded directly in the token stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarOperand {
    /// `PtgInt`: an unsigned 16-bit integer.
    Int(u16),
    Number(f64),
    /// `PtgStr`: at most 255 UTF-16 code units.
    Text(String),
    Boolean(bool),
    Error(ErrorKind),
}

/// A cell address as stored in BIFF8: 16-bit row, 14-bit column plus two relative flags.
///
/// For the `N` (shared-formula) token variants a relative axis holds a signed offset from the
/// formula's cell instead of an absolute index: the row as `i16`, the column's low byte as `i8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub row: u16,
    pub col: u16,
    pub row_relative: bool,
    pub col_relative: bool,
}

impl CellRef {
    /// A reference written without `$` markers.
    pub fn new(row: u16, col: u16) -> Self {
        Self {
            row,
            col: col & COL_INDEX_MASK,
            row_relative: true,
            col_relative: true,
        }
    }

    pub fn absolute(row: u16, col: u16) -> Self {
        Self {
            row,
            col: col & COL_INDEX_MASK,
            row_relative: false,
            col_relative: false,
        }
    }

    pub(crate) fn from_fields(row: u16, col_field: u16) -> Self {
        Self {
            row,
            col: col_field & COL_INDEX_MASK,
            row_relative: col_field & ROW_RELATIVE_BIT != 0,
            col_relative: col_field & COL_RELATIVE_BIT != 0,
        }
    }

    pub(crate) fn col_field(&self) -> u16 {
        let mut field = self.col & COL_INDEX_MASK;
        if self.row_relative {
            field |= ROW_RELATIVE_BIT;
        }
        if self.col_relative {
            field |= COL_RELATIVE_BIT;
        }
        field
    }

    /// Resolve an `N`-variant reference against the cell `(base_row, base_col)`.
    ///
    /// Returns `None` when the shifted address leaves the BIFF8 grid.
    pub fn resolve_offset(&self, base_row: u32, base_col: u32) -> Option<(u32, u32)> {
        let row = if self.row_relative {
            i64::from(base_row) + i64::from(self.row as i16)
        } else {
            i64::from(self.row)
        };
        let col = if self.col_relative {
            i64::from(base_col) + i64::from((self.col & 0xFF) as u8 as i8)
        } else {
            i64::from(self.col)
        };
        in_grid(row, col)
    }
}

fn in_grid(row: i64, col: i64) -> Option<(u32, u32)> {
    if (0..=i64::from(BIFF8_MAX_ROW)).contains(&row) && (0..=i64::from(BIFF8_MAX_COL)).contains(&col)
    {
        Some((row as u32, col as u32))
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AreaRef {
    pub first: CellRef,
    pub last: CellRef,
}

impl AreaRef {
    pub fn new(first: CellRef, last: CellRef) -> Self {
        Self { first, last }
    }
}

/// Reference operands. `ixti` indexes the workbook's `EXTERNSHEET` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reference {
    Cell(CellRef),
    Area(AreaRef),
    /// `PtgRefErr`: a cell reference that was deleted.
    CellErr,
    AreaErr,
    /// `PtgRefN`: shared-formula cell reference, relative to the formula's cell.
    CellN(CellRef),
    AreaN(AreaRef),
    Cell3d { ixti: u16, cell: CellRef },
    Area3d { ixti: u16, area: AreaRef },
    CellErr3d { ixti: u16 },
    AreaErr3d { ixti: u16 },
}

impl Reference {
    pub fn base_opcode(&self) -> u8 {
        match self {
            Reference::Cell(_) => 0x24,
            Reference::Area(_) => 0x25,
            Reference::CellErr => 0x2A,
            Reference::AreaErr => 0x2B,
            Reference::CellN(_) => 0x2C,
            Reference::AreaN(_) => 0x2D,
            Reference::Cell3d { .. } => 0x3A,
            Reference::Area3d { .. } => 0x3B,
            Reference::CellErr3d { .. } => 0x3C,
            Reference::AreaErr3d { .. } => 0x3D,
        }
    }

    fn payload_size(&self) -> usize {
        match self {
            Reference::Cell(_) | Reference::CellErr | Reference::CellN(_) => 4,
            Reference::Area(_) | Reference::AreaErr | Reference::AreaN(_) => 8,
            Reference::Cell3d { .. } | Reference::CellErr3d { .. } => 6,
            Reference::Area3d { .. } | Reference::AreaErr3d { .. } => 10,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Reference::CellErr
                | Reference::AreaErr
                | Reference::CellErr3d { .. }
                | Reference::AreaErr3d { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameRef {
    /// `PtgName`: one-based index into the workbook's defined names.
    Defined { index: u16 },
    /// `PtgNameX`: one-based name index inside the book selected by `ixti`.
    External { ixti: u16, index: u16 },
}

/// One `Ref8U` rectangle of a `PtgMemArea`'s trailing area list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemRange {
    pub first_row: u16,
    pub last_row: u16,
    pub first_col: u16,
    pub last_col: u16,
}

/// `PtgMem*` tokens. They prefix a sub-expression of `cce` bytes that computes a reference and
/// carry no value of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemToken {
    /// `PtgMemArea`; `areas` is the precomputed result stored in the trailing payload.
    Area { cce: u16, areas: Option<Vec<MemRange>> },
    Err { code: u8, cce: u16 },
    NoMem { cce: u16 },
    Func { cce: u16 },
    AreaN { cce: u16 },
    NoMemN { cce: u16 },
}

impl MemToken {
    pub fn base_opcode(&self) -> u8 {
        match self {
            MemToken::Area { .. } => 0x26,
            MemToken::Err { .. } => 0x27,
            MemToken::NoMem { .. } => 0x28,
            MemToken::Func { .. } => 0x29,
            MemToken::AreaN { .. } => 0x2E,
            MemToken::NoMemN { .. } => 0x2F,
        }
    }

    pub fn cce(&self) -> u16 {
        match *self {
            MemToken::Area { cce, .. }
            | MemToken::Err { cce, .. }
            | MemToken::NoMem { cce }
            | MemToken::Func { cce }
            | MemToken::AreaN { cce }
            | MemToken::NoMemN { cce } => cce,
        }
    }

    fn payload_size(&self) -> usize {
        match self {
            MemToken::Area { .. } | MemToken::Err { .. } | MemToken::NoMem { .. } => 6,
            MemToken::Func { .. } | MemToken::AreaN { .. } | MemToken::NoMemN { .. } => 2,
        }
    }
}

/// `PtgAttr`: evaluation hints and control-flow metadata.
///
/// The raw option bits and data word are kept so every attribute (including combinations Excel
/// writes, such as volatile + space) re-encodes byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attr {
    pub options: u8,
    pub data: u16,
    /// `tAttrChoose` jump offsets (`data + 1` entries); empty for every other attribute.
    pub jump_table: Vec<u16>,
}

impl Attr {
    pub const VOLATILE: u8 = 0x01;
    pub const IF: u8 = 0x02;
    pub const CHOOSE: u8 = 0x04;
    pub const SKIP: u8 = 0x08;
    pub const SUM: u8 = 0x10;
    pub const BAXCEL: u8 = 0x20;
    pub const SPACE: u8 = 0x40;

    pub fn new(options: u8, data: u16) -> Self {
        Self {
            options,
            data,
            jump_table: Vec::new(),
        }
    }

    pub fn volatile() -> Self {
        Self::new(Self::VOLATILE, 0)
    }

    pub fn sum() -> Self {
        Self::new(Self::SUM, 0)
    }

    /// `tAttrChoose` with one jump offset per case plus the trailing offset.
    pub fn choose(jump_table: Vec<u16>) -> Self {
        Self {
            options: Self::CHOOSE,
            data: jump_table.len().saturating_sub(1) as u16,
            jump_table,
        }
    }

    pub fn is_volatile(&self) -> bool {
        self.options & Self::VOLATILE != 0
    }

    pub fn is_sum(&self) -> bool {
        self.options & Self::SUM != 0
    }

    pub fn is_choose(&self) -> bool {
        self.options & Self::CHOOSE != 0
    }

    pub fn is_space(&self) -> bool {
        self.options & Self::SPACE != 0
    }

    fn payload_size(&self) -> usize {
        let table = if self.is_choose() {
            2 * self.jump_table.len()
        } else {
            0
        };
        3 + table
    }
}

/// Tokens that steer evaluation or rendering without producing a value of their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Control {
    /// `PtgExp`: this cell's formula lives in the shared formula anchored at `(row, col)`.
    Exp { row: u16, col: u16 },
    /// `PtgTbl`: this cell belongs to the data table anchored at `(row, col)`.
    Tbl { row: u16, col: u16 },
    Paren,
    MissingArg,
    Attr(Attr),
}

impl Control {
    pub fn base_opcode(&self) -> u8 {
        match self {
            Control::Exp { .. } => 0x01,
            Control::Tbl { .. } => 0x02,
            Control::Paren => 0x15,
            Control::MissingArg => 0x16,
            Control::Attr(_) => 0x19,
        }
    }

    fn payload_size(&self) -> usize {
        match self {
            Control::Exp { .. } | Control::Tbl { .. } => 4,
            Control::Paren | Control::MissingArg => 0,
            Control::Attr(attr) => attr.payload_size(),
        }
    }
}

/// An array literal such as `{1,2;3,4}`.
///
/// Cells are held in [`Matrix`] (row-major), the same order the BIFF8 trailing payload stores them.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayConstant {
    values: Matrix<ConstantValue>,
}

impl ArrayConstant {
    /// Build from row-major values.
    pub fn new(rows: usize, cols: usize, values: Vec<ConstantValue>) -> Result<Self, MatrixError> {
        Ok(Self {
            values: Matrix::new(rows, cols, values)?,
        })
    }

    pub fn from_matrix(values: Matrix<ConstantValue>) -> Self {
        Self { values }
    }

    pub fn rows(&self) -> usize {
        self.values.rows()
    }

    pub fn cols(&self) -> usize {
        self.values.cols()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&ConstantValue> {
        self.values.get(row, col)
    }

    pub fn matrix(&self) -> &Matrix<ConstantValue> {
        &self.values
    }

    /// Bytes this literal occupies in the trailing payload: dimensions plus tagged constants.
    pub fn payload_size(&self) -> usize {
        3 + self
            .values
            .iter()
            .map(|v| 1 + constants::encoded_size(v))
            .sum::<usize>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCall {
    /// `PtgFunc`: argument count comes from the function's metadata.
    Fixed { index: u16 },
    /// `PtgFuncVar`: argument count is stored in the token.
    Variable {
        index: u16,
        argc: u8,
        prompt: bool,
        command_equivalent: bool,
    },
}

impl FunctionCall {
    pub fn fixed(index: u16) -> Self {
        FunctionCall::Fixed { index }
    }

    pub fn variable(index: u16, argc: u8) -> Self {
        FunctionCall::Variable {
            index,
            argc,
            prompt: false,
            command_equivalent: false,
        }
    }

    pub fn index(&self) -> u16 {
        match *self {
            FunctionCall::Fixed { index } | FunctionCall::Variable { index, .. } => index,
        }
    }

    pub fn base_opcode(&self) -> u8 {
        match self {
            FunctionCall::Fixed { .. } => 0x21,
            FunctionCall::Variable { .. } => 0x22,
        }
    }
}

/// One formula instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Operator(Operator),
    Control(Control),
    Scalar(ScalarOperand),
    Reference {
        reference: Reference,
        class: OperandClass,
    },
    Name {
        name: NameRef,
        class: OperandClass,
    },
    Mem {
        mem: MemToken,
        class: OperandClass,
    },
    /// `PtgArray`. `array` is `None` only for a token built without its literal, which cannot be
    /// encoded.
    Array {
        array: Option<ArrayConstant>,
        class: OperandClass,
    },
    Function {
        call: FunctionCall,
        class: OperandClass,
    },
}

impl Token {
    pub fn int(n: u16) -> Self {
        Token::Scalar(ScalarOperand::Int(n))
    }

    pub fn number(n: f64) -> Self {
        Token::Scalar(ScalarOperand::Number(n))
    }

    pub fn text(s: impl Into<String>) -> Self {
        Token::Scalar(ScalarOperand::Text(s.into()))
    }

    pub fn boolean(b: bool) -> Self {
        Token::Scalar(ScalarOperand::Boolean(b))
    }

    pub fn error(kind: ErrorKind) -> Self {
        Token::Scalar(ScalarOperand::Error(kind))
    }

    pub fn op(op: Operator) -> Self {
        Token::Operator(op)
    }

    pub fn reference(reference: Reference, class: OperandClass) -> Self {
        Token::Reference { reference, class }
    }

    /// Value-class single cell reference without `$` markers.
    pub fn cell(row: u16, col: u16) -> Self {
        Token::reference(Reference::Cell(CellRef::new(row, col)), OperandClass::Value)
    }

    /// Reference-class area without `$` markers.
    pub fn area(first_row: u16, first_col: u16, last_row: u16, last_col: u16) -> Self {
        Token::reference(
            Reference::Area(AreaRef::new(
                CellRef::new(first_row, first_col),
                CellRef::new(last_row, last_col),
            )),
            OperandClass::Reference,
        )
    }

    pub fn array(array: ArrayConstant) -> Self {
        Token::Array {
            array: Some(array),
            class: OperandClass::Array,
        }
    }

    pub fn function(call: FunctionCall, class: OperandClass) -> Self {
        Token::Function { call, class }
    }

    pub fn base_opcode(&self) -> u8 {
        match self {
            Token::Operator(op) => op.base_opcode(),
            Token::Control(control) => control.base_opcode(),
            Token::Scalar(scalar) => match scalar {
                ScalarOperand::Text(_) => 0x17,
                ScalarOperand::Error(_) => 0x1C,
                ScalarOperand::Boolean(_) => 0x1D,
                ScalarOperand::Int(_) => 0x1E,
                ScalarOperand::Number(_) => 0x1F,
            },
            Token::Reference { reference, .. } => reference.base_opcode(),
            Token::Name { name, .. } => match name {
                NameRef::Defined { .. } => 0x23,
                NameRef::External { .. } => 0x39,
            },
            Token::Mem { mem, .. } => mem.base_opcode(),
            Token::Array { .. } => 0x20,
            Token::Function { call, .. } => call.base_opcode(),
        }
    }

    pub fn operand_class(&self) -> OperandClass {
        match self {
            Token::Reference { class, .. }
            | Token::Name { class, .. }
            | Token::Mem { class, .. }
            | Token::Array { class, .. }
            | Token::Function { class, .. } => *class,
            Token::Operator(_) | Token::Control(_) | Token::Scalar(_) => OperandClass::Value,
        }
    }

    pub fn is_classed(&self) -> bool {
        self.base_opcode() >= 0x20
    }

    /// Copy of this token carrying `class`. Unclassed tokens are returned unchanged.
    pub fn with_operand_class(&self, class: OperandClass) -> Token {
        let mut out = self.clone();
        match &mut out {
            Token::Reference { class: c, .. }
            | Token::Name { class: c, .. }
            | Token::Mem { class: c, .. }
            | Token::Array { class: c, .. }
            | Token::Function { class: c, .. } => *c = class,
            Token::Operator(_) | Token::Control(_) | Token::Scalar(_) => {}
        }
        out
    }

    /// The byte written to the token stream.
    pub fn opcode(&self) -> u8 {
        let base = self.base_opcode();
        if self.is_classed() {
            base + self.operand_class().opcode_offset()
        } else {
            base
        }
    }

    /// Bytes occupied in the primary token stream, opcode included. Trailing payloads (array
    /// literals, mem-area lists) are never counted here.
    pub fn in_stream_size(&self) -> usize {
        1 + match self {
            Token::Operator(_) => 0,
            Token::Control(control) => control.payload_size(),
            Token::Scalar(scalar) => match scalar {
                ScalarOperand::Text(s) => {
                    let units = constants::utf16_units(s);
                    let body = if units.iter().all(|&u| u <= 0xFF) {
                        units.len()
                    } else {
                        units.len() * 2
                    };
                    2 + body
                }
                ScalarOperand::Error(_) | ScalarOperand::Boolean(_) => 1,
                ScalarOperand::Int(_) => 2,
                ScalarOperand::Number(_) => 8,
            },
            Token::Reference { reference, .. } => reference.payload_size(),
            Token::Name { name, .. } => match name {
                NameRef::Defined { .. } => 4,
                NameRef::External { .. } => 6,
            },
            Token::Mem { mem, .. } => mem.payload_size(),
            Token::Array { .. } => 7,
            Token::Function { call, .. } => match call {
                FunctionCall::Fixed { .. } => 2,
                FunctionCall::Variable { .. } => 3,
            },
        }
    }

    /// Bytes this token contributes to the trailing payload.
    pub fn trailing_size(&self) -> usize {
        match self {
            Token::Array {
                array: Some(array), ..
            } => array.payload_size(),
            Token::Mem {
                mem: MemToken::Area {
                    areas: Some(areas), ..
                },
                ..
            } => 2 + 8 * areas.len(),
            _ => 0,
        }
    }

    pub fn has_trailing_payload(&self) -> bool {
        matches!(
            self,
            Token::Array { .. }
                | Token::Mem {
                    mem: MemToken::Area { .. },
                    ..
                }
        )
    }
}

impl From<Operator> for Token {
    fn from(op: Operator) -> Self {
        Token::Operator(op)
    }
}
