use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::matrix::Matrix;

/// Excel error values reachable from BIFF8 formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Null,
    Div0,
    Value,
    Ref,
    Name,
    Num,
    NA,
    GettingData,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::Null,
        ErrorKind::Div0,
        ErrorKind::Value,
        ErrorKind::Ref,
        ErrorKind::Name,
        ErrorKind::Num,
        ErrorKind::NA,
        ErrorKind::GettingData,
    ];

    pub fn as_code(self) -> &'static str {
        match self {
            ErrorKind::Null => "#NULL!",
            ErrorKind::Div0 => "#DIV/0!",
            ErrorKind::Value => "#VALUE!",
            ErrorKind::Ref => "#REF!",
            ErrorKind::Name => "#NAME?",
            ErrorKind::Num => "#NUM!",
            ErrorKind::NA => "#N/A",
            ErrorKind::GettingData => "#GETTING_DATA",
        }
    }

    /// BIFF error byte (`BErr`), as stored by `PtgErr`, `PtgMemErr` and array constants.
    pub fn biff_code(self) -> u8 {
        match self {
            ErrorKind::Null => 0x00,
            ErrorKind::Div0 => 0x07,
            ErrorKind::Value => 0x0F,
            ErrorKind::Ref => 0x17,
            ErrorKind::Name => 0x1D,
            ErrorKind::Num => 0x24,
            ErrorKind::NA => 0x2A,
            ErrorKind::GettingData => 0x2B,
        }
    }

    pub fn from_biff_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.biff_code() == code)
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_code().eq_ignore_ascii_case(code))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// A value produced while evaluating a formula.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueEval {
    /// An empty cell.
    Blank,
    /// An omitted function argument (`PtgMissArg`).
    Missing,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(ErrorKind),
    Area(AreaEval),
}

impl ValueEval {
    pub fn is_error(&self) -> bool {
        matches!(self, ValueEval::Error(_))
    }

    pub fn error(&self) -> Option<ErrorKind> {
        match self {
            ValueEval::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Number result, with non-finite values folded to `#NUM!`.
    pub fn number(n: f64) -> Self {
        if n.is_finite() {
            ValueEval::Number(n)
        } else {
            ValueEval::Error(ErrorKind::Num)
        }
    }

    pub(crate) fn from_result(result: Result<f64, ErrorKind>) -> Self {
        match result {
            Ok(n) => ValueEval::number(n),
            Err(e) => ValueEval::Error(e),
        }
    }
}

impl From<ErrorKind> for ValueEval {
    fn from(value: ErrorKind) -> Self {
        ValueEval::Error(value)
    }
}

impl From<f64> for ValueEval {
    fn from(value: f64) -> Self {
        ValueEval::number(value)
    }
}

impl From<bool> for ValueEval {
    fn from(value: bool) -> Self {
        ValueEval::Boolean(value)
    }
}

impl From<&str> for ValueEval {
    fn from(value: &str) -> Self {
        ValueEval::Text(value.to_string())
    }
}

/// A rectangular block of values anchored at a sheet position.
///
/// Cells are held row-major. The block is shared (`Arc`) so copying an area between stack slots
/// or function arguments never clones the cells.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaEval {
    first_row: u32,
    first_col: u32,
    cells: Arc<Matrix<ValueEval>>,
}

impl AreaEval {
    pub fn new(first_row: u32, first_col: u32, cells: Matrix<ValueEval>) -> Self {
        Self {
            first_row,
            first_col,
            cells: Arc::new(cells),
        }
    }

    pub fn first_row(&self) -> u32 {
        self.first_row
    }

    pub fn first_col(&self) -> u32 {
        self.first_col
    }

    pub fn last_row(&self) -> u32 {
        self.first_row + self.rows() as u32 - 1
    }

    pub fn last_col(&self) -> u32 {
        self.first_col + self.cols() as u32 - 1
    }

    pub fn rows(&self) -> usize {
        self.cells.rows()
    }

    pub fn cols(&self) -> usize {
        self.cells.cols()
    }

    pub fn cells(&self) -> &Matrix<ValueEval> {
        &self.cells
    }

    /// Cell at a position relative to the top-left corner.
    pub fn get(&self, row_offset: usize, col_offset: usize) -> Option<&ValueEval> {
        self.cells.get(row_offset, col_offset)
    }

    /// Cell at an absolute sheet position, if it lies inside the area.
    pub fn get_absolute(&self, row: u32, col: u32) -> Option<&ValueEval> {
        let row_offset = row.checked_sub(self.first_row)? as usize;
        let col_offset = col.checked_sub(self.first_col)? as usize;
        self.get(row_offset, col_offset)
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        self.get_absolute(row, col).is_some()
    }

    /// Row-major iteration over every cell.
    pub fn values(&self) -> impl Iterator<Item = &ValueEval> {
        self.cells.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn biff_codes_round_trip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_biff_code(kind.biff_code()), Some(kind));
            assert_eq!(ErrorKind::from_code(kind.as_code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_biff_code(0x01), None);
        assert_eq!(ErrorKind::Div0.to_string(), "#DIV/0!");
    }

    #[test]
    fn area_addresses_cells_absolutely() {
        let cells = Matrix::new(
            2,
            2,
            vec![
                ValueEval::Number(1.0),
                ValueEval::Number(2.0),
                ValueEval::Number(3.0),
                ValueEval::Number(4.0),
            ],
        )
        .unwrap();
        let area = AreaEval::new(4, 2, cells);
        assert_eq!(area.last_row(), 5);
        assert_eq!(area.last_col(), 3);
        assert_eq!(area.get_absolute(5, 2), Some(&ValueEval::Number(3.0)));
        assert_eq!(area.get_absolute(3, 2), None);
        assert_eq!(area.get_absolute(4, 4), None);
    }

    #[test]
    fn non_finite_numbers_become_num_errors() {
        assert_eq!(ValueEval::number(f64::NAN), ValueEval::Error(ErrorKind::Num));
        assert_eq!(ValueEval::number(f64::INFINITY), ValueEval::Error(ErrorKind::Num));
        assert_eq!(ValueEval::number(2.5), ValueEval::Number(2.5));
    }
}
