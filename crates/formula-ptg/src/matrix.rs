//! Dense two-dimensional storage and the numeric routines behind the matrix worksheet functions.
//!
//! [`Matrix`] is always row-major: `data[row * cols + col]`. Wire-format array literals keep their
//! own order inside [`crate::ArrayConstant`]; the two never share index arithmetic.

use thiserror::Error;

use crate::value::ErrorKind;

/// Relative pivot magnitude below which a matrix is treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MatrixError {
    #[error("expected {expected} cells, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("matrix must be non-empty")]
    Empty,
    #[error("{rows}x{cols} matrix is not square")]
    NotSquare { rows: usize, cols: usize },
    #[error("cannot multiply a matrix with {left_cols} columns by one with {right_rows} rows")]
    DimensionMismatch { left_cols: usize, right_rows: usize },
    #[error("matrix is singular")]
    Singular,
}

impl MatrixError {
    /// Worksheet error a matrix function reports for this failure.
    pub fn to_error_kind(self) -> ErrorKind {
        match self {
            MatrixError::Singular => ErrorKind::Num,
            MatrixError::ShapeMismatch { .. }
            | MatrixError::Empty
            | MatrixError::NotSquare { .. }
            | MatrixError::DimensionMismatch { .. } => ErrorKind::Value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T> Matrix<T> {
    /// Wrap row-major `data`. Both dimensions must be at least 1.
    pub fn new(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, MatrixError> {
        if rows == 0 || cols == 0 {
            return Err(MatrixError::Empty);
        }
        let expected = rows.checked_mul(cols).ok_or(MatrixError::ShapeMismatch {
            expected: usize::MAX,
            actual: data.len(),
        })?;
        if data.len() != expected {
            return Err(MatrixError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn from_fn(
        rows: usize,
        cols: usize,
        mut f: impl FnMut(usize, usize) -> T,
    ) -> Result<Self, MatrixError> {
        let mut data = Vec::with_capacity(rows.saturating_mul(cols));
        for row in 0..rows {
            for col in 0..cols {
                data.push(f(row, col));
            }
        }
        Self::new(rows, cols, data)
    }

    /// A 1x1 matrix.
    pub fn scalar(value: T) -> Self {
        Self {
            rows: 1,
            cols: 1,
            data: vec![value],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    fn index_of(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols).then(|| row * self.cols + col)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        self.index_of(row, col).map(|idx| &self.data[idx])
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
        self.index_of(row, col).map(move |idx| &mut self.data[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    /// Iterate rows as slices.
    pub fn row_slices(&self) -> impl Iterator<Item = &[T]> {
        self.data.chunks(self.cols)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Matrix<U> {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(f).collect(),
        }
    }

    pub fn try_map<U, E>(&self, f: impl FnMut(&T) -> Result<U, E>) -> Result<Matrix<U>, E> {
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(f).collect::<Result<_, _>>()?,
        })
    }
}

impl<T: Clone> Matrix<T> {
    pub fn filled(rows: usize, cols: usize, value: T) -> Result<Self, MatrixError> {
        Self::new(rows, cols, vec![value; rows.saturating_mul(cols)])
    }

    pub fn transpose(&self) -> Matrix<T> {
        let mut data = Vec::with_capacity(self.data.len());
        for col in 0..self.cols {
            for row in 0..self.rows {
                data.push(self.data[row * self.cols + col].clone());
            }
        }
        Matrix {
            rows: self.cols,
            cols: self.rows,
            data,
        }
    }
}

impl Matrix<f64> {
    pub fn identity(n: usize) -> Result<Self, MatrixError> {
        Self::from_fn(n, n, |row, col| if row == col { 1.0 } else { 0.0 })
    }

    pub fn multiply(&self, other: &Matrix<f64>) -> Result<Matrix<f64>, MatrixError> {
        if self.cols != other.rows {
            return Err(MatrixError::DimensionMismatch {
                left_cols: self.cols,
                right_rows: other.rows,
            });
        }
        let mut out = vec![0.0; self.rows * other.cols];
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                if a == 0.0 {
                    continue;
                }
                for j in 0..other.cols {
                    out[i * other.cols + j] += a * other.data[k * other.cols + j];
                }
            }
        }
        Matrix::new(self.rows, other.cols, out)
    }

    /// Determinant by Gaussian elimination with partial pivoting. Singular matrices yield `0`.
    pub fn determinant(&self) -> Result<f64, MatrixError> {
        if !self.is_square() {
            return Err(MatrixError::NotSquare {
                rows: self.rows,
                cols: self.cols,
            });
        }
        let n = self.rows;
        let mut a = self.data.clone();
        let tolerance = pivot_tolerance(&a);
        let mut det = 1.0;

        for k in 0..n {
            let pivot_row = pivot_row(&a, n, k);
            let pivot = a[pivot_row * n + k];
            if pivot.abs() <= tolerance {
                return Ok(0.0);
            }
            if pivot_row != k {
                swap_rows(&mut a, n, k, pivot_row);
                det = -det;
            }
            det *= pivot;
            for i in (k + 1)..n {
                let factor = a[i * n + k] / pivot;
                if factor == 0.0 {
                    continue;
                }
                for j in k..n {
                    a[i * n + j] -= factor * a[k * n + j];
                }
            }
        }
        Ok(det)
    }

    /// Inverse by Gauss-Jordan elimination with partial pivoting.
    pub fn inverse(&self) -> Result<Matrix<f64>, MatrixError> {
        if !self.is_square() {
            return Err(MatrixError::NotSquare {
                rows: self.rows,
                cols: self.cols,
            });
        }
        let n = self.rows;
        let mut a = self.data.clone();
        let mut inv = Matrix::identity(n)?.data;
        let tolerance = pivot_tolerance(&a);

        for k in 0..n {
            let pivot_row = pivot_row(&a, n, k);
            if a[pivot_row * n + k].abs() <= tolerance {
                return Err(MatrixError::Singular);
            }
            if pivot_row != k {
                swap_rows(&mut a, n, k, pivot_row);
                swap_rows(&mut inv, n, k, pivot_row);
            }

            let pivot = a[k * n + k];
            for j in 0..n {
                a[k * n + j] /= pivot;
                inv[k * n + j] /= pivot;
            }

            for i in 0..n {
                if i == k {
                    continue;
                }
                let factor = a[i * n + k];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..n {
                    a[i * n + j] -= factor * a[k * n + j];
                    inv[i * n + j] -= factor * inv[k * n + j];
                }
            }
        }
        Matrix::new(n, n, inv)
    }
}

fn pivot_tolerance(a: &[f64]) -> f64 {
    let scale = a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    scale * SINGULAR_EPSILON
}

fn pivot_row(a: &[f64], n: usize, k: usize) -> usize {
    let mut best = k;
    let mut best_abs = a[k * n + k].abs();
    for i in (k + 1)..n {
        let v = a[i * n + k].abs();
        if v > best_abs {
            best = i;
            best_abs = v;
        }
    }
    best
}

fn swap_rows(a: &mut [f64], n: usize, r1: usize, r2: usize) {
    for j in 0..n {
        a.swap(r1 * n + j, r2 * n + j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(rows: usize, cols: usize, data: &[f64]) -> Matrix<f64> {
        Matrix::new(rows, cols, data.to_vec()).unwrap()
    }

    fn assert_close(actual: &Matrix<f64>, expected: &Matrix<f64>) {
        assert_eq!((actual.rows(), actual.cols()), (expected.rows(), expected.cols()));
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-9, "expected {expected:?}, got {actual:?}");
        }
    }

    #[test]
    fn storage_is_row_major() {
        let a = m(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(a.get(0, 2), Some(&3.0));
        assert_eq!(a.get(1, 0), Some(&4.0));
        assert_eq!(a.get(2, 0), None);
        assert_eq!(a.get(0, 3), None);
    }

    #[test]
    fn rejects_bad_shapes() {
        assert_eq!(
            Matrix::new(2, 2, vec![1.0; 3]),
            Err(MatrixError::ShapeMismatch {
                expected: 4,
                actual: 3
            })
        );
        assert_eq!(Matrix::<f64>::new(0, 2, vec![]), Err(MatrixError::Empty));
    }

    #[test]
    fn transpose_swaps_axes() {
        let a = m(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let t = a.transpose();
        assert_eq!(t, m(3, 2, &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]));
        assert_eq!(t.transpose(), a);
    }

    #[test]
    fn multiply_checks_inner_dimension() {
        let a = m(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = m(3, 1, &[1.0, 0.0, -1.0]);
        assert_eq!(a.multiply(&b), Ok(m(2, 1, &[-2.0, -2.0])));
        assert_eq!(
            b.multiply(&a),
            Err(MatrixError::DimensionMismatch {
                left_cols: 1,
                right_rows: 2
            })
        );
    }

    #[test]
    fn determinant_with_row_swap() {
        let a = m(3, 3, &[0.0, 1.0, 2.0, 1.0, 0.0, 3.0, 4.0, -3.0, 8.0]);
        let det = a.determinant().unwrap();
        assert!((det - -2.0).abs() < 1e-9, "got {det}");
        assert_eq!(m(2, 2, &[1.0, 2.0, 2.0, 4.0]).determinant(), Ok(0.0));
        assert_eq!(
            m(2, 3, &[0.0; 6]).determinant(),
            Err(MatrixError::NotSquare { rows: 2, cols: 3 })
        );
    }

    #[test]
    fn inverse_round_trips_to_identity() {
        let a = m(3, 3, &[2.0, -1.0, 0.0, -1.0, 2.0, -1.0, 0.0, -1.0, 2.0]);
        let inv = a.inverse().unwrap();
        assert_close(&a.multiply(&inv).unwrap(), &Matrix::identity(3).unwrap());
        assert_eq!(
            m(2, 2, &[1.0, 2.0, 2.0, 4.0]).inverse(),
            Err(MatrixError::Singular)
        );
    }

    #[test]
    fn errors_map_to_worksheet_errors() {
        assert_eq!(MatrixError::Singular.to_error_kind(), ErrorKind::Num);
        assert_eq!(
            MatrixError::NotSquare { rows: 1, cols: 2 }.to_error_kind(),
            ErrorKind::Value
        );
    }
}
