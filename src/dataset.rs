//! Dense n×p feature matrix shared by every stage of a clustering run.
//!
//! Rows are points, columns are features. A `Dataset` is validated once on
//! construction (non-empty, rectangular, finite) and is immutable afterwards,
//! so downstream code can index it without re-checking.

use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Validated n×p matrix of real-valued features.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    data: Array2<f64>,
}

impl Dataset {
    /// Wrap an existing matrix.
    pub fn new(data: Array2<f64>) -> Result<Self> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(Error::EmptyInput);
        }
        for ((row, col), value) in data.indexed_iter() {
            if !value.is_finite() {
                return Err(Error::NonFiniteValue { row, col });
            }
        }
        Ok(Self { data })
    }

    /// Build from row-oriented records, one `Vec` per point.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::EmptyInput);
        }

        let n = rows.len();
        let d = rows[0].len();

        let mut flat: Vec<f64> = Vec::with_capacity(n * d);
        for row in rows {
            if row.len() != d {
                return Err(Error::DimensionMismatch {
                    expected: d,
                    found: row.len(),
                });
            }
            flat.extend(row);
        }

        let data =
            Array2::from_shape_vec((n, d), flat).map_err(|e| Error::ShapeMismatch {
                expected: format!("{n}x{d}"),
                actual: e.to_string(),
            })?;
        Self::new(data)
    }

    /// Build from column-oriented records, one `Vec` per feature
    /// (the layout of a typical data frame).
    pub fn from_columns(columns: &[Vec<f64>]) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::EmptyInput);
        }

        let n = columns[0].len();
        for column in columns {
            if column.len() != n {
                return Err(Error::DimensionMismatch {
                    expected: n,
                    found: column.len(),
                });
            }
        }

        Self::new(Array2::from_shape_fn((n, columns.len()), |(i, j)| {
            columns[j][i]
        }))
    }

    /// Number of points (rows).
    pub fn n_points(&self) -> usize {
        self.data.nrows()
    }

    /// Number of features (columns).
    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    /// Borrow the underlying matrix.
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Borrow one point.
    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.data.row(i)
    }

    /// Consume into the underlying matrix.
    pub fn into_inner(self) -> Array2<f64> {
        self.data
    }
}
