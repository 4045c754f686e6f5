use core::convert::TryFrom;

use crate::error::GraphError;

/// Compressed-column sparsity pattern.
///
/// The null pattern is a distinct canonical value: it is not the same as a
/// `0 x 0` pattern or as a pattern with defined dimensions and no nonzeros.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Sparsity {
    shape: Option<Pattern>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct Pattern {
    nrow: usize,
    ncol: usize,
    colind: Vec<usize>,
    row: Vec<usize>,
}

impl Sparsity {
    /// The canonical null pattern.
    pub fn null() -> Self {
        Self { shape: None }
    }

    /// Builds a pattern from column offsets and row indices.
    pub fn new(
        nrow: usize,
        ncol: usize,
        colind: Vec<usize>,
        row: Vec<usize>,
    ) -> Result<Self, GraphError> {
        if ncol.checked_add(1) != Some(colind.len()) {
            return Err(GraphError::InvalidSparsity(format!(
                "expected {ncol} + 1 column offsets, got {}",
                colind.len()
            )));
        }
        if colind[0] != 0 {
            return Err(GraphError::InvalidSparsity(
                "first column offset must be zero".into(),
            ));
        }
        if colind[ncol] != row.len() {
            return Err(GraphError::InvalidSparsity(format!(
                "last column offset {} does not match {} row indices",
                colind[ncol],
                row.len()
            )));
        }
        for c in 0..ncol {
            let (start, end) = (colind[c], colind[c + 1]);
            if start > end || end > row.len() {
                return Err(GraphError::InvalidSparsity(format!(
                    "column offsets not monotone at column {c}"
                )));
            }
            let rows = &row[start..end];
            if rows.iter().any(|&r| r >= nrow) {
                return Err(GraphError::InvalidSparsity(format!(
                    "row index out of range in column {c}"
                )));
            }
            if rows.windows(2).any(|w| w[0] >= w[1]) {
                return Err(GraphError::InvalidSparsity(format!(
                    "row indices not strictly increasing in column {c}"
                )));
            }
        }
        Ok(Self {
            shape: Some(Pattern {
                nrow,
                ncol,
                colind,
                row,
            }),
        })
    }

    /// Fully populated `nrow x ncol` pattern.
    pub fn dense(nrow: usize, ncol: usize) -> Self {
        let colind = (0..=ncol).map(|c| c * nrow).collect();
        let row = (0..ncol).flat_map(|_| 0..nrow).collect();
        Self {
            shape: Some(Pattern {
                nrow,
                ncol,
                colind,
                row,
            }),
        }
    }

    /// Dense `1 x 1` pattern.
    pub fn scalar() -> Self {
        Self::dense(1, 1)
    }

    /// Dense `n x 1` pattern.
    pub fn column(n: usize) -> Self {
        Self::dense(n, 1)
    }

    /// `nrow x ncol` pattern without nonzeros.
    pub fn empty(nrow: usize, ncol: usize) -> Self {
        Self {
            shape: Some(Pattern {
                nrow,
                ncol,
                colind: vec![0; ncol + 1],
                row: Vec::new(),
            }),
        }
    }

    /// Whether this is the canonical null pattern.
    pub fn is_null(&self) -> bool {
        self.shape.is_none()
    }

    /// Number of rows (zero for the null pattern).
    pub fn nrow(&self) -> usize {
        self.shape.as_ref().map_or(0, |p| p.nrow)
    }

    /// Number of columns (zero for the null pattern).
    pub fn ncol(&self) -> usize {
        self.shape.as_ref().map_or(0, |p| p.ncol)
    }

    /// Number of structural nonzeros.
    pub fn nnz(&self) -> usize {
        self.shape.as_ref().map_or(0, |p| p.row.len())
    }

    /// Column offsets; empty for the null pattern.
    pub fn colind(&self) -> &[usize] {
        self.shape.as_ref().map(|p| p.colind.as_slice()).unwrap_or(&[])
    }

    /// Row index of every nonzero; empty for the null pattern.
    pub fn row(&self) -> &[usize] {
        self.shape.as_ref().map(|p| p.row.as_slice()).unwrap_or(&[])
    }

    /// Compressed form `[nrow, ncol, colind.., row..]`; empty for the null pattern.
    pub fn compress(&self) -> Result<Vec<i64>, GraphError> {
        let Some(p) = &self.shape else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(2 + p.colind.len() + p.row.len());
        for v in [p.nrow, p.ncol]
            .iter()
            .chain(p.colind.iter())
            .chain(p.row.iter())
        {
            let v = i64::try_from(*v).map_err(|_| {
                GraphError::InvalidSparsity("dimension exceeds i64::MAX".into())
            })?;
            out.push(v);
        }
        Ok(out)
    }

    /// Rebuilds a pattern from its compressed form; the empty slice is the null pattern.
    pub fn compressed(data: &[i64]) -> Result<Self, GraphError> {
        if data.is_empty() {
            return Ok(Self::null());
        }
        if data.len() < 3 {
            return Err(GraphError::InvalidSparsity(format!(
                "compressed pattern too short ({} entries)",
                data.len()
            )));
        }
        let to_usize = |v: i64| {
            usize::try_from(v)
                .map_err(|_| GraphError::InvalidSparsity(format!("negative entry {v}")))
        };
        let nrow = to_usize(data[0])?;
        let ncol = to_usize(data[1])?;
        let colind_end = ncol
            .checked_add(3)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                GraphError::InvalidSparsity(format!(
                    "{ncol} columns do not fit {} entries",
                    data.len()
                ))
            })?;
        let colind = data[2..colind_end]
            .iter()
            .map(|&v| to_usize(v))
            .collect::<Result<Vec<_>, _>>()?;
        let row = data[colind_end..]
            .iter()
            .map(|&v| to_usize(v))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(nrow, ncol, colind, row)
    }
}
