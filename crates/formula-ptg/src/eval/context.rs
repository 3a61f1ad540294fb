/// The cell a formula is evaluated for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalContext {
    pub row: u32,
    pub col: u32,
    /// Array (CSE) formula: operators and value parameters broadcast over areas instead of
    /// implicitly intersecting them with this cell.
    pub array_formula: bool,
}

impl EvalContext {
    pub fn at(row: u32, col: u32) -> Self {
        Self {
            row,
            col,
            array_formula: false,
        }
    }

    pub fn array(mut self) -> Self {
        self.array_formula = true;
        self
    }
}

/// Defensive bounds applied while evaluating a single formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalSettings {
    /// Operand stack entries before evaluation aborts with [`crate::EvalError::StackOverflow`].
    pub max_stack_depth: usize,
    /// Cells a single area operand may materialize; larger areas evaluate to `#NUM!`.
    pub max_area_cells: usize,
    /// Times a single-cell lookup is unwrapped when the cell source hands back an area.
    pub max_value_nesting: usize,
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self {
            max_stack_depth: 1024,
            max_area_cells: 5_000_000,
            max_value_nesting: 8,
        }
    }
}
