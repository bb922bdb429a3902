//! Problem description and solver interface for
//!
//! ```text
//! minimize    0.5 x'Px + q'x
//! subject to  l <= Ax <= u
//! ```

#![allow(non_snake_case)]

use nalgebra::{DVector, RealField, Scalar, SimdRealField};

use crate::csc::{CscMatrix, is_upper_triangular, symmetric_to_dense};
use crate::error::{MpcError, check_dim};

/// Outcome of a QP solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    Optimal,
    /// A certificate of primal infeasibility was found
    Infeasible,
    /// A certificate of dual infeasibility was found
    Unbounded,
    MaxIterations,
    /// The reduced KKT matrix could not be factorized, P is not PSD
    NonConvex,
}

/// Result of one solve. Owned by the caller for as long as it needs it.
#[derive(Debug, Clone)]
pub struct Solution<F> {
    /// Primal solution
    pub x: DVector<F>,
    /// Constraint multipliers
    pub y: DVector<F>,
    /// `0.5 x'Px + q'x` at `x`
    pub objective: F,
    pub status: SolverStatus,
    pub iterations: usize,
}

impl<F> Solution<F> {
    pub fn is_optimal(&self) -> bool {
        self.status == SolverStatus::Optimal
    }
}

/// Which parts of a [`QpProblem`] changed since the solver last consumed it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProblemChanges {
    pub quadratic: bool,
    pub linear: bool,
    pub constraints: bool,
    pub bounds: bool,
}

impl ProblemChanges {
    /// The factorization depends on P and A only.
    pub fn needs_factorization(&self) -> bool {
        self.quadratic || self.constraints
    }
}

/// A QP kept in place across solves, updated part by part.
#[derive(Debug, Clone)]
pub struct QpProblem<F> {
    /// Upper triangle of the symmetric quadratic term, n_var * n_var
    pub(crate) P: CscMatrix<F>,
    /// n_var
    pub(crate) q: DVector<F>,
    /// n_con * n_var
    pub(crate) A: CscMatrix<F>,
    /// n_con
    pub(crate) l: DVector<F>,
    /// n_con
    pub(crate) u: DVector<F>,
    pub(crate) changes: ProblemChanges,
}

impl<F> QpProblem<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    /// An empty problem, filled in with the `update_*` operations.
    pub fn new() -> Self {
        Self {
            P: CscMatrix::zeros(0, 0),
            q: DVector::zeros(0),
            A: CscMatrix::zeros(0, 0),
            l: DVector::zeros(0),
            u: DVector::zeros(0),
            changes: ProblemChanges::default(),
        }
    }

    pub fn num_variables(&self) -> usize {
        self.P.ncols()
    }

    pub fn num_constraints(&self) -> usize {
        self.A.nrows()
    }

    pub fn changes(&self) -> ProblemChanges {
        self.changes
    }

    pub(crate) fn clear_changes(&mut self) {
        self.changes = ProblemChanges::default();
    }

    pub fn quadratic(&self) -> &CscMatrix<F> {
        &self.P
    }

    pub fn linear(&self) -> &DVector<F> {
        &self.q
    }

    pub fn constraint_matrix(&self) -> &CscMatrix<F> {
        &self.A
    }

    pub fn lower(&self) -> &DVector<F> {
        &self.l
    }

    pub fn upper(&self) -> &DVector<F> {
        &self.u
    }

    /// Replace P. Only the upper triangle is stored; anything below is rejected.
    pub fn update_quadratic(&mut self, P: &CscMatrix<F>) -> Result<(), MpcError> {
        check_dim("quadratic term columns", P.nrows(), P.ncols())?;
        if !is_upper_triangular(P) {
            return Err(MpcError::dim("quadratic term lower triangle entries", 0, 1));
        }
        self.P = P.clone();
        self.changes.quadratic = true;
        Ok(())
    }

    pub fn update_linear(&mut self, q: &DVector<F>) -> Result<(), MpcError> {
        self.q = q.clone();
        self.changes.linear = true;
        Ok(())
    }

    pub fn update_constraints(&mut self, A: &CscMatrix<F>) -> Result<(), MpcError> {
        self.A = A.clone();
        self.changes.constraints = true;
        Ok(())
    }

    pub fn update_bounds(&mut self, l: &DVector<F>, u: &DVector<F>) -> Result<(), MpcError> {
        check_dim("upper bound length", l.len(), u.len())?;
        if let Some(index) = l.iter().zip(u.iter()).position(|(lo, hi)| lo > hi) {
            return Err(MpcError::InvalidBounds { index });
        }
        self.l = l.clone();
        self.u = u.clone();
        self.changes.bounds = true;
        Ok(())
    }

    /// Check that all parts agree with each other before a solve.
    pub fn validate(&self) -> Result<(), MpcError> {
        let n = self.num_variables();
        check_dim("linear term length", n, self.q.len())?;
        check_dim("constraint matrix columns", n, self.A.ncols())?;
        check_dim("lower bound length", self.A.nrows(), self.l.len())?;
        check_dim("upper bound length", self.A.nrows(), self.u.len())
    }

    /// `0.5 x'Px + q'x`
    pub fn objective(&self, x: &DVector<F>) -> Result<F, MpcError> {
        check_dim("objective operand", self.P.ncols(), x.len())?;
        check_dim("objective operand", self.q.len(), x.len())?;
        let half: F = nalgebra::convert(0.5);
        let Px = symmetric_to_dense(&self.P) * x;
        Ok(x.dot(&Px) * half + self.q.dot(x))
    }
}

impl<F> Default for QpProblem<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A QP solver that keeps its problem between solves and is updated in place.
pub trait QpSolver<F> {
    fn set_quadratic_term(&mut self, P: &CscMatrix<F>) -> Result<(), MpcError>;

    fn set_linear_term(&mut self, q: &DVector<F>) -> Result<(), MpcError>;

    fn set_constraint_matrix(&mut self, A: &CscMatrix<F>) -> Result<(), MpcError>;

    fn set_bounds(&mut self, l: &DVector<F>, u: &DVector<F>) -> Result<(), MpcError>;

    /// Solve the stored problem.
    ///
    /// `Err` only for malformed problem data; numerical outcomes are reported
    /// through [`Solution::status`].
    fn solve(&mut self) -> Result<Solution<F>, MpcError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csc::upper_triangular;
    use nalgebra::dmatrix;

    #[test]
    fn bounds_are_ordered() {
        let mut qp = QpProblem::<f64>::new();
        let l = DVector::from_vec(vec![0.0, 2.0]);
        let u = DVector::from_vec(vec![1.0, 1.0]);
        assert_eq!(
            qp.update_bounds(&l, &u),
            Err(MpcError::InvalidBounds { index: 1 })
        );
        assert!(!qp.changes().bounds);
    }

    #[test]
    fn lower_triangle_is_rejected() {
        let mut qp = QpProblem::<f64>::new();
        let full = CscMatrix::from(&dmatrix![2.0, 1.0; 1.0, 2.0]);
        assert!(qp.update_quadratic(&full).is_err());
        let upper = upper_triangular(&dmatrix![2.0, 1.0; 1.0, 2.0]);
        assert!(qp.update_quadratic(&upper).is_ok());
        assert!(qp.changes().needs_factorization());
    }

    #[test]
    fn validate_reports_mismatch() {
        let mut qp = QpProblem::<f64>::new();
        qp.update_quadratic(&CscMatrix::identity(2)).unwrap();
        qp.update_linear(&DVector::zeros(3)).unwrap();
        assert!(matches!(
            qp.validate(),
            Err(MpcError::DimensionMismatch { expected: 2, got: 3, .. })
        ));
    }

    #[test]
    fn objective_uses_half_quadratic() {
        let mut qp = QpProblem::<f64>::new();
        qp.update_quadratic(&upper_triangular(&dmatrix![2.0, 0.0; 0.0, 4.0]))
            .unwrap();
        qp.update_linear(&DVector::from_vec(vec![1.0, -1.0])).unwrap();
        let x = DVector::from_vec(vec![1.0, 1.0]);
        assert_eq!(qp.objective(&x).unwrap(), 3.0);
    }
}
