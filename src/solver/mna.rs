//! MNA matrix assembly and solving.

use crate::error::{BreadboardError, Result};

/// MNA matrix system Ax = z.
///
/// Rows `0..num_nodes` are node current balances (ground excluded), the
/// remaining rows are branch voltage constraints.
#[derive(Debug)]
pub struct MnaMatrix {
    /// System matrix A (row-major)
    pub a: Vec<f64>,
    /// Source vector z
    pub z: Vec<f64>,
    /// Solution vector x
    pub x: Vec<f64>,
    /// Matrix dimension
    pub size: usize,
    /// Node rows; branch rows follow
    pub num_nodes: usize,
    /// LU decomposition of A
    pub lu: Vec<f64>,
    /// Pivot indices for LU decomposition
    pub pivots: Vec<usize>,
}

impl MnaMatrix {
    /// Create a zeroed system with `num_nodes` node rows and `num_branches` branch rows.
    pub fn new(num_nodes: usize, num_branches: usize) -> Self {
        let size = num_nodes + num_branches;
        Self {
            a: vec![0.0; size * size],
            z: vec![0.0; size],
            x: vec![0.0; size],
            size,
            num_nodes,
            lu: vec![0.0; size * size],
            pivots: vec![0; size],
        }
    }

    /// Get matrix element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.a[row * self.size + col]
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.a[row * self.size + col] += value;
    }

    /// Add to source vector element.
    pub fn add_source(&mut self, row: usize, value: f64) {
        self.z[row] += value;
    }

    /// Row of branch `br` in the full system.
    pub fn branch_row(&self, br: usize) -> usize {
        self.num_nodes + br
    }

    /// Stamp a conductance between two nodes.
    /// For a conductance G between nodes n1 and n2:
    ///   A[n1,n1] += G
    ///   A[n2,n2] += G
    ///   A[n1,n2] -= G
    ///   A[n2,n1] -= G
    pub fn stamp_conductance(&mut self, n1: Option<usize>, n2: Option<usize>, g: f64) {
        if let Some(i) = n1 {
            self.add(i, i, g);
        }
        if let Some(j) = n2 {
            self.add(j, j, g);
        }
        if let (Some(i), Some(j)) = (n1, n2) {
            self.add(i, j, -g);
            self.add(j, i, -g);
        }
    }

    /// Stamp a voltage source between two nodes on branch `br`.
    /// V[n+] - V[n-] = E, with the branch current flowing n+ to n- inside the source.
    pub fn stamp_voltage_source(
        &mut self,
        n_pos: Option<usize>,
        n_neg: Option<usize>,
        br: usize,
        voltage: f64,
    ) {
        let row = self.branch_row(br);
        if let Some(i) = n_pos {
            self.add(row, i, 1.0);
            self.add(i, row, 1.0);
        }
        if let Some(j) = n_neg {
            self.add(row, j, -1.0);
            self.add(j, row, -1.0);
        }
        self.z[row] += voltage;
    }

    /// Stamp a current source carrying `current` from `from` to `to` through itself.
    pub fn stamp_current_source(&mut self, from: Option<usize>, to: Option<usize>, current: f64) {
        // Current leaves `from` and enters `to`
        if let Some(i) = from {
            self.add_source(i, -current);
        }
        if let Some(j) = to {
            self.add_source(j, current);
        }
    }

    /// Stamp a CCCS (Current-Controlled Current Source).
    /// I = gain * J[control], flowing `from` to `to` through the source.
    pub fn stamp_cccs(&mut self, from: Option<usize>, to: Option<usize>, control: usize, gain: f64) {
        let col = self.branch_row(control);
        if let Some(i) = from {
            self.add(i, col, gain);
        }
        if let Some(j) = to {
            self.add(j, col, -gain);
        }
    }

    /// Add a shunt conductance to ground on every node row.
    pub fn add_gmin(&mut self, gmin: f64) {
        for i in 0..self.num_nodes {
            self.add(i, i, gmin);
        }
    }

    /// Perform LU decomposition with partial pivoting.
    pub fn factor(&mut self, tolerance: f64) -> Result<()> {
        let n = self.size;
        self.lu.copy_from_slice(&self.a);

        for i in 0..n {
            self.pivots[i] = i;
        }

        for k in 0..n {
            // Find pivot
            let mut max_val = self.lu[k * n + k].abs();
            let mut max_row = k;

            for i in (k + 1)..n {
                let val = self.lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if max_val < tolerance {
                return Err(BreadboardError::SingularMatrix {
                    row: k,
                    pivot: max_val,
                });
            }

            // Swap rows if needed
            if max_row != k {
                self.pivots.swap(k, max_row);
                for j in 0..n {
                    self.lu.swap(k * n + j, max_row * n + j);
                }
            }

            // Eliminate
            let pivot = self.lu[k * n + k];
            for i in (k + 1)..n {
                let factor = self.lu[i * n + k] / pivot;
                self.lu[i * n + k] = factor;
                for j in (k + 1)..n {
                    self.lu[i * n + j] -= factor * self.lu[k * n + j];
                }
            }
        }

        Ok(())
    }

    /// Solve the system using the pre-computed LU decomposition.
    pub fn solve(&mut self) {
        let n = self.size;

        // Apply pivot permutation to z
        for i in 0..n {
            self.x[i] = self.z[self.pivots[i]];
        }

        // Forward substitution (L * y = Pb)
        for i in 0..n {
            for j in 0..i {
                self.x[i] -= self.lu[i * n + j] * self.x[j];
            }
        }

        // Back substitution (U * x = y); factor() already rejected tiny pivots
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                self.x[i] -= self.lu[i * n + j] * self.x[j];
            }
            self.x[i] /= self.lu[i * n + i];
        }
    }

    /// Factor and solve in one go.
    pub fn factor_and_solve(&mut self, tolerance: f64) -> Result<&[f64]> {
        self.factor(tolerance)?;
        self.solve();
        Ok(&self.x)
    }

    /// Get the voltage at a node row.
    pub fn voltage(&self, node: Option<usize>) -> f64 {
        match node {
            Some(i) => self.x[i],
            None => 0.0, // Ground
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_voltage_divider() {
        // V1 on node 0, two 1k resistors to ground via node 1
        let mut m = MnaMatrix::new(2, 1);
        m.stamp_voltage_source(Some(0), None, 0, 10.0);
        m.stamp_conductance(Some(0), Some(1), 1e-3);
        m.stamp_conductance(Some(1), None, 1e-3);
        m.factor_and_solve(1e-13).unwrap();
        assert_relative_eq!(m.voltage(Some(1)), 5.0, epsilon = 1e-9);
        // Source branch current flows pos to neg inside the source
        assert_relative_eq!(m.x[2], -5e-3, epsilon = 1e-12);
    }

    #[test]
    fn test_current_source_into_resistor() {
        let mut m = MnaMatrix::new(1, 0);
        m.stamp_conductance(Some(0), None, 0.01);
        m.stamp_current_source(None, Some(0), 0.02);
        m.factor_and_solve(1e-13).unwrap();
        assert_relative_eq!(m.voltage(Some(0)), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_floating_node_is_singular_until_gmin() {
        let mut m = MnaMatrix::new(2, 0);
        m.stamp_conductance(Some(0), None, 1.0);
        let err = m.factor(1e-13).unwrap_err();
        assert!(matches!(err, BreadboardError::SingularMatrix { row: 1, .. }));

        m.add_gmin(1e-9);
        assert!(m.factor(1e-13).is_ok());
    }

    #[test]
    fn test_cccs_mirrors_branch_current() {
        // 1V across 1k on branch 0; CCCS of gain 10 pulls current out of node 1 to ground
        let mut m = MnaMatrix::new(2, 1);
        m.stamp_voltage_source(Some(0), None, 0, 1.0);
        m.stamp_conductance(Some(0), None, 1e-3);
        m.stamp_conductance(Some(1), None, 1e-3);
        m.stamp_cccs(Some(1), None, 0, 10.0);
        m.factor_and_solve(1e-13).unwrap();
        // J = -1mA, so the source pushes 10mA into node 1
        assert_relative_eq!(m.voltage(Some(1)), 10.0, epsilon = 1e-9);
    }
}
