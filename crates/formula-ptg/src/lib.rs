//! BIFF8 parsed formulas (`Ptg` token streams).
//!
//! Covers the binary round trip of a cell formula (`rgce` plus its trailing `rgcb` array and
//! mem-area payloads), the built-in function table the tokens refer to, formula text rendering,
//! and a stack evaluator over an external cell source.
//!
//! ```
//! use formula_ptg::{Formula, SparseGrid, ValueEval};
//!
//! // `=A1+B1`, value class
//! let bytes = [0x44, 0x00, 0x00, 0x00, 0xC0, 0x44, 0x00, 0x00, 0x01, 0xC0, 0x03];
//! let formula = Formula::decode(&bytes, bytes.len()).unwrap();
//!
//! let mut grid = SparseGrid::new();
//! grid.set(0, 0, 2.0);
//! grid.set(0, 1, 3.0);
//! assert_eq!(formula.evaluate(&grid).unwrap(), ValueEval::Number(5.0));
//! assert_eq!(formula.encode().unwrap(), bytes);
//! ```

pub mod constants;
mod error;
pub mod eval;
pub mod ftab;
mod formula;
pub mod functions;
pub mod matrix;
pub mod reader;
pub mod render;
pub mod rgce;
pub mod token;
mod value;

pub use constants::ConstantValue;
pub use error::{ConstantDecodeError, DecodeError, EncodeError, EvalError, RenderError};
pub use eval::{
    CellValueSource, EvalContext, EvalSettings, Evaluator, ResolvedRange, SheetRef, SparseGrid,
};
pub use formula::Formula;
pub use ftab::{FunctionMetadata, FunctionMetadataRegistry};
pub use functions::{CallContext, FunctionImplementation, FunctionTable};
pub use matrix::{Matrix, MatrixError};
pub use reader::ByteReader;
pub use render::{PlaceholderNames, RenderContext};
pub use token::{
    AreaRef, ArrayConstant, Attr, CellRef, Control, FunctionCall, MemRange, MemToken, NameRef,
    OperandClass, Operator, Reference, ScalarOperand, Token,
};
pub use value::{AreaEval, ErrorKind, ValueEval};
