//! # PBQP Costs
//!
//! Saturating cost arithmetic plus the vector/matrix primitives the solver
//! is built from. `Cost::INF` marks forbidden choices; it is absorbing
//! under addition so a forbidden choice can never look cheap.

/// A saturating scalar cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cost(u64);

impl Cost {
    pub const ZERO: Self = Self(0);
    /// Forbidden: absorbing under addition
    pub const INF: Self = Self(u64::MAX);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn is_infinite(self) -> bool {
        self.0 == Self::INF.0
    }
}

impl std::ops::Add for Cost {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        if self.is_infinite() || rhs.is_infinite() {
            Self::INF
        } else {
            // finite costs saturate strictly below INF
            Self(self.0.saturating_add(rhs.0).min(u64::MAX - 1))
        }
    }
}

impl std::ops::AddAssign for Cost {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::fmt::Display for Cost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_infinite() {
            write!(f, "inf")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A per-node cost vector: one entry per choice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostVector {
    entries: Vec<Cost>,
}

impl CostVector {
    pub fn new(entries: Vec<Cost>) -> Self {
        assert!(!entries.is_empty(), "cost vector must have a choice");
        Self { entries }
    }

    pub fn zeros(len: usize) -> Self {
        Self::new(vec![Cost::ZERO; len])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Cost {
        self.entries[index]
    }

    pub fn add_at(&mut self, index: usize, cost: Cost) {
        self.entries[index] += cost;
    }

    /// Adds `matrix[.., col]` entrywise
    pub fn add_matrix_col(&mut self, matrix: &CostMatrix, col: usize) {
        assert_eq!(self.len(), matrix.rows());
        for row in 0..matrix.rows() {
            self.entries[row] += matrix.get(row, col);
        }
    }

    /// Adds `matrix[row, ..]` entrywise
    pub fn add_matrix_row(&mut self, matrix: &CostMatrix, row: usize) {
        assert_eq!(self.len(), matrix.cols());
        for col in 0..matrix.cols() {
            self.entries[col] += matrix.get(row, col);
        }
    }

    pub fn min(&self) -> Cost {
        *self.entries.iter().min().expect("non-empty")
    }

    /// Index of the minimum entry; the first one on ties
    pub fn min_index(&self) -> usize {
        let mut best = 0;
        for (index, &cost) in self.entries.iter().enumerate() {
            if cost < self.entries[best] {
                best = index;
            }
        }
        best
    }
}

/// A per-edge cost matrix of shape `|src choices| x |tgt choices|`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostMatrix {
    rows: usize,
    cols: usize,
    entries: Vec<Cost>,
}

impl CostMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        assert!(rows > 0 && cols > 0, "cost matrix must have a shape");
        Self {
            rows,
            cols,
            entries: vec![Cost::ZERO; rows * cols],
        }
    }

    /// Builds a matrix from row-major raw values, `u64::MAX` meaning
    /// forbidden
    pub fn from_rows(rows: &[&[u64]]) -> Self {
        let n_rows = rows.len();
        let n_cols = rows[0].len();
        let mut matrix = Self::zeros(n_rows, n_cols);
        for (r, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), n_cols);
            for (c, &value) in row.iter().enumerate() {
                matrix.set(r, c, Cost::new(value));
            }
        }
        matrix
    }

    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub const fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Cost {
        self.entries[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, cost: Cost) {
        self.entries[row * self.cols + col] = cost;
    }

    pub fn add_at(&mut self, row: usize, col: usize, cost: Cost) {
        self.entries[row * self.cols + col] += cost;
    }

    /// `argmin_i (offset[i] + matrix[i, col])`
    pub fn col_min_index(&self, col: usize, offset: &CostVector) -> usize {
        assert_eq!(offset.len(), self.rows);
        let mut best = 0;
        let mut best_cost = offset.get(0) + self.get(0, col);
        for row in 1..self.rows {
            let cost = offset.get(row) + self.get(row, col);
            if cost < best_cost {
                best = row;
                best_cost = cost;
            }
        }
        best
    }

    /// `argmin_i (offset[i] + matrix[row, i])`
    pub fn row_min_index(&self, row: usize, offset: &CostVector) -> usize {
        assert_eq!(offset.len(), self.cols);
        let mut best = 0;
        let mut best_cost = offset.get(0) + self.get(row, 0);
        for col in 1..self.cols {
            let cost = offset.get(col) + self.get(row, col);
            if cost < best_cost {
                best = col;
                best_cost = cost;
            }
        }
        best
    }
}
