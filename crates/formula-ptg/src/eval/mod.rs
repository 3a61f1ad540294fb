//! Stack evaluation of decoded token sequences.

pub mod coercion;
mod context;
mod evaluator;
pub mod operators;
mod source;

pub use context::{EvalContext, EvalSettings};
pub use evaluator::Evaluator;
pub use source::{CellValueSource, ResolvedRange, SheetRef, SparseGrid};
