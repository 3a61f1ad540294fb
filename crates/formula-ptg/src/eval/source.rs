use std::collections::{HashMap, HashSet};

use crate::matrix::Matrix;
use crate::token::NameRef;
use crate::value::{AreaEval, ErrorKind, ValueEval};

/// Which sheet a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SheetRef {
    /// The sheet holding the formula.
    Current,
    /// A sheet selected through the workbook's `EXTERNSHEET` table (`ixti`).
    External(u16),
}

/// A normalized rectangular reference (`first_* <= last_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedRange {
    pub sheet: SheetRef,
    pub first_row: u32,
    pub first_col: u32,
    pub last_row: u32,
    pub last_col: u32,
}

impl ResolvedRange {
    pub fn new(sheet: SheetRef, row1: u32, col1: u32, row2: u32, col2: u32) -> Self {
        Self {
            sheet,
            first_row: row1.min(row2),
            first_col: col1.min(col2),
            last_row: row1.max(row2),
            last_col: col1.max(col2),
        }
    }

    pub fn cell(sheet: SheetRef, row: u32, col: u32) -> Self {
        Self::new(sheet, row, col, row, col)
    }

    pub fn rows(&self) -> usize {
        (self.last_row - self.first_row) as usize + 1
    }

    pub fn cols(&self) -> usize {
        (self.last_col - self.first_col) as usize + 1
    }

    pub fn cell_count(&self) -> usize {
        self.rows().saturating_mul(self.cols())
    }

    pub fn is_single_cell(&self) -> bool {
        self.first_row == self.last_row && self.first_col == self.last_col
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }

    /// Smallest range covering both (`A1:B2:C3` style range operator).
    pub fn bounding(&self, other: &ResolvedRange) -> Option<ResolvedRange> {
        (self.sheet == other.sheet).then(|| ResolvedRange {
            sheet: self.sheet,
            first_row: self.first_row.min(other.first_row),
            first_col: self.first_col.min(other.first_col),
            last_row: self.last_row.max(other.last_row),
            last_col: self.last_col.max(other.last_col),
        })
    }

    /// Overlap of two ranges, if any.
    pub fn intersect(&self, other: &ResolvedRange) -> Option<ResolvedRange> {
        if self.sheet != other.sheet {
            return None;
        }
        let first_row = self.first_row.max(other.first_row);
        let first_col = self.first_col.max(other.first_col);
        let last_row = self.last_row.min(other.last_row);
        let last_col = self.last_col.min(other.last_col);
        (first_row <= last_row && first_col <= last_col).then_some(ResolvedRange {
            sheet: self.sheet,
            first_row,
            first_col,
            last_row,
            last_col,
        })
    }
}

/// Read access to the cells (and names) a formula refers to.
///
/// Implementations must be side-effect free for the duration of an evaluation. The evaluator
/// assumes the reference graph is acyclic; cycle detection belongs to the caller.
pub trait CellValueSource {
    fn resolve(&self, sheet: SheetRef, row: u32, col: u32) -> ValueEval;

    /// Materialize a rectangle. The default implementation calls [`CellValueSource::resolve`]
    /// once per cell, row by row.
    fn resolve_area(&self, range: &ResolvedRange) -> Result<AreaEval, ErrorKind> {
        let cells = Matrix::from_fn(range.rows(), range.cols(), |r, c| {
            self.resolve(
                range.sheet,
                range.first_row + r as u32,
                range.first_col + c as u32,
            )
        })
        .map_err(|_| ErrorKind::Ref)?;
        Ok(AreaEval::new(range.first_row, range.first_col, cells))
    }

    fn resolve_name(&self, name: NameRef) -> ValueEval {
        let _ = name;
        ValueEval::Error(ErrorKind::Name)
    }

    fn sheet_exists(&self, sheet: SheetRef) -> bool {
        let _ = sheet;
        true
    }
}

impl<T: CellValueSource + ?Sized> CellValueSource for &T {
    fn resolve(&self, sheet: SheetRef, row: u32, col: u32) -> ValueEval {
        (**self).resolve(sheet, row, col)
    }

    fn resolve_area(&self, range: &ResolvedRange) -> Result<AreaEval, ErrorKind> {
        (**self).resolve_area(range)
    }

    fn resolve_name(&self, name: NameRef) -> ValueEval {
        (**self).resolve_name(name)
    }

    fn sheet_exists(&self, sheet: SheetRef) -> bool {
        (**self).sheet_exists(sheet)
    }
}

/// In-memory [`CellValueSource`] backed by hash maps. Unset cells are blank.
#[derive(Debug, Clone, Default)]
pub struct SparseGrid {
    cells: HashMap<(SheetRef, u32, u32), ValueEval>,
    names: HashMap<NameRef, ValueEval>,
    external_sheets: HashSet<u16>,
}

impl SparseGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cell on the current sheet.
    pub fn set(&mut self, row: u32, col: u32, value: impl Into<ValueEval>) {
        self.set_on(SheetRef::Current, row, col, value);
    }

    pub fn set_on(&mut self, sheet: SheetRef, row: u32, col: u32, value: impl Into<ValueEval>) {
        if let SheetRef::External(ixti) = sheet {
            self.external_sheets.insert(ixti);
        }
        self.cells.insert((sheet, row, col), value.into());
    }

    pub fn add_external_sheet(&mut self, ixti: u16) {
        self.external_sheets.insert(ixti);
    }

    pub fn define_name(&mut self, name: NameRef, value: impl Into<ValueEval>) {
        self.names.insert(name, value.into());
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl CellValueSource for SparseGrid {
    fn resolve(&self, sheet: SheetRef, row: u32, col: u32) -> ValueEval {
        self.cells
            .get(&(sheet, row, col))
            .cloned()
            .unwrap_or(ValueEval::Blank)
    }

    fn resolve_name(&self, name: NameRef) -> ValueEval {
        self.names
            .get(&name)
            .cloned()
            .unwrap_or(ValueEval::Error(ErrorKind::Name))
    }

    fn sheet_exists(&self, sheet: SheetRef) -> bool {
        match sheet {
            SheetRef::Current => true,
            SheetRef::External(ixti) => self.external_sheets.contains(&ixti),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_normalize_and_combine() {
        let a = ResolvedRange::new(SheetRef::Current, 3, 2, 0, 0);
        assert_eq!((a.first_row, a.first_col, a.last_row, a.last_col), (0, 0, 3, 2));
        assert_eq!(a.cell_count(), 12);

        let b = ResolvedRange::new(SheetRef::Current, 2, 1, 5, 5);
        assert_eq!(
            a.intersect(&b),
            Some(ResolvedRange::new(SheetRef::Current, 2, 1, 3, 2))
        );
        assert_eq!(
            a.bounding(&b),
            Some(ResolvedRange::new(SheetRef::Current, 0, 0, 5, 5))
        );

        let other_sheet = ResolvedRange::cell(SheetRef::External(1), 0, 0);
        assert_eq!(a.intersect(&other_sheet), None);
        assert_eq!(a.bounding(&other_sheet), None);
    }

    #[test]
    fn sparse_grid_defaults() {
        let mut grid = SparseGrid::new();
        grid.set(0, 0, 1.5);
        grid.set_on(SheetRef::External(2), 0, 0, "x");
        assert_eq!(grid.resolve(SheetRef::Current, 0, 0), ValueEval::Number(1.5));
        assert_eq!(grid.resolve(SheetRef::Current, 9, 9), ValueEval::Blank);
        assert!(grid.sheet_exists(SheetRef::External(2)));
        assert!(!grid.sheet_exists(SheetRef::External(3)));
        assert_eq!(
            grid.resolve_name(NameRef::Defined { index: 1 }),
            ValueEval::Error(ErrorKind::Name)
        );

        let area = grid
            .resolve_area(&ResolvedRange::new(SheetRef::Current, 0, 0, 1, 0))
            .unwrap();
        assert_eq!(area.rows(), 2);
        assert_eq!(area.get(1, 0), Some(&ValueEval::Blank));
    }
}
