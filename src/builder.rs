#![allow(non_snake_case)]

//! Assembles the tracking problem over the stacked decision vector
//!
//! ```text
//! [x_0, ..., x_{N-1}, u_0, ..., u_{M-1}]
//! ```
//!
//! into `(P, q, A, l, u)`. Rows of `A` are the dynamics equalities followed by
//! an identity block carrying the state and input box constraints.

use log::debug;
use nalgebra::{DMatrix, DVector, RealField, Scalar, SimdRealField, convert};

use crate::csc::{CscMatrix, upper_triangular};
use crate::error::{MpcError, check_dim};
use crate::solver::INFTY;

/// Prediction horizon `N` and control horizon `M`, `1 <= M <= N`.
///
/// The last move is held from step `M` through step `N - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizon {
    pub prediction: usize,
    pub control: usize,
}

impl Horizon {
    pub fn new(prediction: usize, control: usize) -> Result<Self, MpcError> {
        if control == 0 {
            return Err(MpcError::dim("control horizon", 1, 0));
        }
        if control > prediction {
            return Err(MpcError::dim("control horizon", prediction, control));
        }
        Ok(Self {
            prediction,
            control,
        })
    }
}

/// Weights of the tracking cost
///
/// ```text
/// sum_k (x_k - r_k)' Q (x_k - r_k) + u_k' R u_k + (u_k - u_{k-1})' S (u_k - u_{k-1})
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CostWeights<F> {
    /// State tracking cost, n_x * n_x
    pub Q: DMatrix<F>,
    /// Input cost, n_u * n_u
    pub R: DMatrix<F>,
    /// Input rate cost, n_u * n_u
    pub S: DMatrix<F>,
    /// `C' Q_y`, n_x * n_y, when the cost was given in output space
    pub output_tracking: Option<DMatrix<F>>,
}

/// Box constraints broadcast across the horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraints<F> {
    pub x_min: DVector<F>,
    pub x_max: DVector<F>,
    pub u_min: DVector<F>,
    pub u_max: DVector<F>,
}

impl<F> Constraints<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    /// Input bounds only; the state is left unbounded.
    pub fn inputs(n_x: usize, u_min: DVector<F>, u_max: DVector<F>) -> Self {
        let infty: F = convert(INFTY);
        Self {
            x_min: DVector::from_element(n_x, -infty),
            x_max: DVector::from_element(n_x, infty),
            u_min,
            u_max,
        }
    }

    fn validate(&self, n_x: usize, n_u: usize) -> Result<(), MpcError> {
        check_dim("state lower bound", n_x, self.x_min.len())?;
        check_dim("state upper bound", n_x, self.x_max.len())?;
        check_dim("input lower bound", n_u, self.u_min.len())?;
        check_dim("input upper bound", n_u, self.u_max.len())?;

        let lower = self.x_min.iter().chain(self.u_min.iter());
        let upper = self.x_max.iter().chain(self.u_max.iter());
        match lower.zip(upper).position(|(lo, hi)| lo > hi) {
            Some(index) => Err(MpcError::InvalidBounds { index }),
            None => Ok(()),
        }
    }
}

/// Which quantity a reference trajectory describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// n_x rows, weighted by `Q`
    State,
    /// n_y rows of linearised output, weighted by `C' Q_y`
    Output,
}

/// Square `n * n` matrix with ones where `col = row + offset`.
pub fn shifted_identity<F>(n: usize, offset: isize) -> DMatrix<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    DMatrix::from_fn(n, n, |i, j| {
        if j as isize == i as isize + offset {
            F::one()
        } else {
            F::zero()
        }
    })
}

pub fn block_diag<F>(a: &DMatrix<F>, b: &DMatrix<F>) -> DMatrix<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    let (ra, ca) = a.shape();
    let (rb, cb) = b.shape();
    let mut out = DMatrix::zeros(ra + rb, ca + cb);
    out.view_mut((0, 0), (ra, ca)).copy_from(a);
    out.view_mut((ra, ca), (rb, cb)).copy_from(b);
    out
}

/// `(A^n_sim, sum_{i < n_sim} A^i)`: state and input multipliers over one
/// control interval of `n_sim` native steps.
pub fn propagation<F>(A: &DMatrix<F>, n_sim: usize) -> (DMatrix<F>, DMatrix<F>)
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    let n = A.nrows();
    let mut power = DMatrix::identity(n, n);
    let mut sum = DMatrix::zeros(n, n);
    for _ in 0..n_sim {
        sum += &power;
        power = &power * A;
    }
    (power, sum)
}

/// N * M map from prediction step to the move acting on it. Step 0 is the
/// measured state, steps `1..=M` take one move each, later steps hold the last.
pub fn input_coupling<F>(horizon: &Horizon) -> DMatrix<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    let last = horizon.control - 1;
    DMatrix::from_fn(horizon.prediction, horizon.control, |k, j| {
        if k >= 1 && j == (k - 1).min(last) {
            F::one()
        } else {
            F::zero()
        }
    })
}

/// `[kron(I_N, -I) + kron(shift(N, -1), A^n_sim) | kron(G, B_eff)]`
pub fn dynamics_constraint<F>(
    A: &DMatrix<F>,
    B: &DMatrix<F>,
    horizon: &Horizon,
    n_sim: usize,
) -> DMatrix<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    let (n, m) = (A.nrows(), B.ncols());
    let (N, M) = (horizon.prediction, horizon.control);

    let (A_step, A_sum) = propagation(A, n_sim);
    let B_eff = A_sum * B;

    let state = DMatrix::<F>::identity(N, N).kronecker(&-DMatrix::<F>::identity(n, n))
        + shifted_identity::<F>(N, -1).kronecker(&A_step);
    let input = input_coupling::<F>(horizon).kronecker(&B_eff);

    let mut Aeq = DMatrix::zeros(N * n, N * n + M * m);
    Aeq.view_mut((0, 0), (N * n, N * n)).copy_from(&state);
    Aeq.view_mut((0, N * n), (N * n, M * m)).copy_from(&input);
    Aeq
}

/// Builds the QP pieces for one system and keeps the cost and constraint
/// configuration between ticks.
#[derive(Debug, Clone)]
pub struct QpBuilder<F> {
    n_x: usize,
    n_u: usize,
    horizon: Option<Horizon>,
    weights: Option<CostWeights<F>>,
    constraints: Constraints<F>,
    /// Dynamics equalities and the `n_sim` they were built for
    dynamics: Option<(usize, DMatrix<F>)>,
}

impl<F> QpBuilder<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    pub fn new(n_x: usize, n_u: usize, u_min: DVector<F>, u_max: DVector<F>) -> Result<Self, MpcError> {
        let constraints = Constraints::inputs(n_x, u_min, u_max);
        constraints.validate(n_x, n_u)?;
        Ok(Self {
            n_x,
            n_u,
            horizon: None,
            weights: None,
            constraints,
            dynamics: None,
        })
    }

    pub fn horizon(&self) -> Option<Horizon> {
        self.horizon
    }

    pub fn weights(&self) -> Option<&CostWeights<F>> {
        self.weights.as_ref()
    }

    pub fn constraints(&self) -> &Constraints<F> {
        &self.constraints
    }

    /// Cached dynamics equalities, if built for the current horizon.
    pub fn dynamics(&self) -> Option<&DMatrix<F>> {
        self.dynamics.as_ref().map(|(_, Aeq)| Aeq)
    }

    /// Length of the decision vector, `N n_x + M n_u`.
    pub fn num_variables(&self) -> usize {
        self.horizon
            .map_or(0, |h| h.prediction * self.n_x + h.control * self.n_u)
    }

    /// Index of `u_0` in the decision vector.
    pub fn control_offset(&self) -> usize {
        self.horizon.map_or(0, |h| h.prediction * self.n_x)
    }

    pub fn set_cost(
        &mut self,
        Q: DMatrix<F>,
        R: DMatrix<F>,
        S: DMatrix<F>,
        horizon: Horizon,
    ) -> Result<(), MpcError> {
        let weights = CostWeights {
            Q,
            R,
            S,
            output_tracking: None,
        };
        self.check_weights(&weights)?;
        self.weights = Some(weights);
        self.horizon = Some(horizon);
        self.dynamics = None;
        Ok(())
    }

    /// Cost on the output `C x`: `Q = C' Q_y C`.
    pub fn set_output_cost(
        &mut self,
        C: &DMatrix<F>,
        Q_y: DMatrix<F>,
        R: DMatrix<F>,
        S: DMatrix<F>,
        horizon: Horizon,
    ) -> Result<(), MpcError> {
        check_dim("output matrix columns", self.n_x, C.ncols())?;
        check_dim("Q_y rows", C.nrows(), Q_y.nrows())?;
        check_dim("Q_y columns", C.nrows(), Q_y.ncols())?;

        let tracking = C.transpose() * Q_y;
        let weights = CostWeights {
            Q: &tracking * C,
            R,
            S,
            output_tracking: Some(tracking),
        };
        self.check_weights(&weights)?;
        self.weights = Some(weights);
        self.horizon = Some(horizon);
        self.dynamics = None;
        Ok(())
    }

    pub fn set_constraint(&mut self, constraints: Constraints<F>) -> Result<(), MpcError> {
        constraints.validate(self.n_x, self.n_u)?;
        self.constraints = constraints;
        Ok(())
    }

    fn check_weights(&self, weights: &CostWeights<F>) -> Result<(), MpcError> {
        check_dim("Q rows", self.n_x, weights.Q.nrows())?;
        check_dim("Q columns", self.n_x, weights.Q.ncols())?;
        check_dim("R rows", self.n_u, weights.R.nrows())?;
        check_dim("R columns", self.n_u, weights.R.ncols())?;
        check_dim("S rows", self.n_u, weights.S.nrows())?;
        check_dim("S columns", self.n_u, weights.S.ncols())
    }

    fn configured(&self) -> Result<(Horizon, &CostWeights<F>), MpcError> {
        match (self.horizon, self.weights.as_ref()) {
            (Some(horizon), Some(weights)) => Ok((horizon, weights)),
            _ => Err(MpcError::MissingCost),
        }
    }

    /// Upper triangle of `2 blockdiag(kron(I_N, Q), Pu)` where `Pu` carries
    /// `R` on the diagonal and the tridiagonal rate penalty in `S`.
    pub fn quadratic_term(&self) -> Result<CscMatrix<F>, MpcError> {
        let (horizon, w) = self.configured()?;
        let (N, M, m) = (horizon.prediction, horizon.control, self.n_u);
        let two: F = convert(2.0);

        let Px = DMatrix::<F>::identity(N, N).kronecker(&w.Q);

        let mut Pu = DMatrix::<F>::identity(M, M).kronecker(&(w.S.scale(two) + &w.R))
            + (shifted_identity::<F>(M, -1) + shifted_identity::<F>(M, 1)).kronecker(&-&w.S);
        // the last move has no successor
        let o = (M - 1) * m;
        let last = Pu.view((o, o), (m, m)) - &w.S;
        Pu.view_mut((o, o), (m, m)).copy_from(&last);

        Ok(upper_triangular(&block_diag(&Px, &Pu).scale(two)))
    }

    /// Dynamics equalities stacked over the identity for the box constraints.
    ///
    /// The dynamics block is kept until the cost, horizon or `n_sim` changes;
    /// a call after a bounds-only change restacks the cached block.
    pub fn constraint_matrix(
        &mut self,
        A: &DMatrix<F>,
        B: &DMatrix<F>,
        n_sim: usize,
    ) -> Result<CscMatrix<F>, MpcError> {
        let (horizon, _) = self.configured()?;
        check_dim("A rows", self.n_x, A.nrows())?;
        check_dim("B columns", self.n_u, B.ncols())?;

        let Aeq = match self.dynamics.take() {
            Some((cached, Aeq)) if cached == n_sim => Aeq,
            _ => {
                debug!("Building dynamics equalities for {n_sim} steps per interval");
                dynamics_constraint(A, B, &horizon, n_sim)
            }
        };
        let n_var = Aeq.ncols();
        let mut Acon = DMatrix::zeros(Aeq.nrows() + n_var, n_var);
        Acon.view_mut((0, 0), Aeq.shape()).copy_from(&Aeq);
        Acon.view_mut((Aeq.nrows(), 0), (n_var, n_var))
            .fill_with_identity();
        self.dynamics = Some((n_sim, Aeq));
        Ok(CscMatrix::from(&Acon))
    }

    /// `l = [-x0, 0, ..., x_min, ..., u_min, ...]`, `u` alike.
    pub fn bounds(&self, x0: &DVector<F>) -> Result<(DVector<F>, DVector<F>), MpcError> {
        let (horizon, _) = self.configured()?;
        check_dim("initial state", self.n_x, x0.len())?;
        let (N, M, n, m) = (horizon.prediction, horizon.control, self.n_x, self.n_u);
        let c = &self.constraints;

        let n_con = 2 * N * n + M * m;
        let mut l = DVector::zeros(n_con);
        let mut u = DVector::zeros(n_con);

        l.rows_mut(0, n).copy_from(&-x0);
        u.rows_mut(0, n).copy_from(&-x0);

        let states = N * n;
        for k in 0..N {
            l.rows_mut(states + k * n, n).copy_from(&c.x_min);
            u.rows_mut(states + k * n, n).copy_from(&c.x_max);
        }
        let inputs = 2 * N * n;
        for k in 0..M {
            l.rows_mut(inputs + k * m, m).copy_from(&c.u_min);
            u.rows_mut(inputs + k * m, m).copy_from(&c.u_max);
        }
        Ok((l, u))
    }

    /// Fail unless `reference` can drive a tick of `n_sim` steps.
    pub fn check_reference(
        &self,
        reference: &DMatrix<F>,
        kind: ReferenceKind,
        n_sim: usize,
    ) -> Result<(), MpcError> {
        let (horizon, w) = self.configured()?;
        let rows = match kind {
            ReferenceKind::State => self.n_x,
            ReferenceKind::Output => match &w.output_tracking {
                Some(tracking) => tracking.ncols(),
                None => return Err(MpcError::MissingCost),
            },
        };
        check_dim("reference rows", rows, reference.nrows())?;
        let needed = horizon.prediction.saturating_mul(n_sim);
        if reference.ncols() < needed {
            return Err(MpcError::dim("reference columns", needed, reference.ncols()));
        }
        Ok(())
    }

    /// `q = [-2 W r_0, -2 W r_{n_sim}, ..., -2 S u_prev, 0, ...]`.
    ///
    /// `R` only enters the quadratic term.
    pub fn linear_term(
        &self,
        reference: &DMatrix<F>,
        kind: ReferenceKind,
        u_prev: &DVector<F>,
        n_sim: usize,
    ) -> Result<DVector<F>, MpcError> {
        self.check_reference(reference, kind, n_sim)?;
        check_dim("previous control", self.n_u, u_prev.len())?;
        let (horizon, w) = self.configured()?;
        let (N, n, m) = (horizon.prediction, self.n_x, self.n_u);

        let W = match (kind, &w.output_tracking) {
            (ReferenceKind::Output, Some(tracking)) => tracking,
            _ => &w.Q,
        };
        let minus_two: F = convert(-2.0);

        let mut q = DVector::zeros(self.num_variables());
        for k in 0..N {
            let qk = (W * reference.column(k * n_sim)).scale(minus_two);
            q.rows_mut(k * n, n).copy_from(&qk);
        }
        let qu = (&w.S * u_prev).scale(minus_two);
        q.rows_mut(N * n, m).copy_from(&qu);
        Ok(q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csc::{is_upper_triangular, symmetric_to_dense};
    use approx::assert_relative_eq;
    use nalgebra::{dmatrix, dvector};

    fn scalar_builder(N: usize, M: usize) -> QpBuilder<f64> {
        let mut builder = QpBuilder::new(1, 1, dvector![0.0], dvector![5.0]).unwrap();
        builder
            .set_cost(dmatrix![1.0], dmatrix![0.5], dmatrix![0.2], Horizon::new(N, M).unwrap())
            .unwrap();
        builder
    }

    #[test]
    fn horizon_requires_one_move_within_prediction() {
        assert!(Horizon::new(5, 0).is_err());
        assert!(Horizon::new(5, 6).is_err());
        assert!(Horizon::new(5, 5).is_ok());
    }

    #[test]
    fn quadratic_term_is_symmetric_psd() {
        let builder = scalar_builder(4, 3);
        let P = builder.quadratic_term().unwrap();
        assert!(is_upper_triangular(&P));

        let full = symmetric_to_dense(&P);
        assert_eq!(full.shape(), (7, 7));
        assert_eq!(full, full.transpose());
        let min_eig = full.symmetric_eigenvalues().min();
        assert!(min_eig >= -1e-12);

        // rate penalty: 2 (2S + R) on inner moves, 2 (S + R) on the last
        assert_relative_eq!(full[(4, 4)], 1.8, epsilon = 1e-12);
        assert_relative_eq!(full[(6, 6)], 1.4, epsilon = 1e-12);
        assert_relative_eq!(full[(4, 5)], -0.4, epsilon = 1e-12);
    }

    #[test]
    fn propagation_over_several_steps() {
        let (A_step, A_sum) = propagation(&dmatrix![0.5], 3);
        assert_relative_eq!(A_step[(0, 0)], 0.125);
        assert_relative_eq!(A_sum[(0, 0)], 1.75);

        let (A_step, A_sum) = propagation(&dmatrix![0.5], 1);
        assert_relative_eq!(A_step[(0, 0)], 0.5);
        assert_relative_eq!(A_sum[(0, 0)], 1.0);
    }

    #[test]
    fn full_control_horizon_has_no_held_rows() {
        let horizon = Horizon::new(4, 4).unwrap();
        let G = input_coupling::<f64>(&horizon);
        assert_eq!(G, shifted_identity(4, -1));
    }

    #[test]
    fn short_control_horizon_holds_last_move() {
        let horizon = Horizon::new(5, 2).unwrap();
        let A = dmatrix![0.9, 0.1; 0.0, 0.8];
        let B = dmatrix![0.0; 1.0];
        let Aeq = dynamics_constraint(&A, &B, &horizon, 2);
        assert_eq!(Aeq.shape(), (10, 14));

        let (A_step, A_sum) = propagation(&A, 2);
        let B_eff = A_sum * &B;
        let (n, m) = (2, 1);
        let inputs = 5 * n;
        for k in 0..5 {
            let rows = Aeq.view((k * n, 0), (n, inputs));
            let diag = rows.view((0, k * n), (n, n));
            assert_eq!(diag, -DMatrix::<f64>::identity(n, n));
            if k >= 1 {
                assert_eq!(rows.view((0, (k - 1) * n), (n, n)), A_step);
            }
            for j in 0..2 {
                let block = Aeq.view((k * n, inputs + j * m), (n, m));
                if k >= 1 && j == (k - 1).min(1) {
                    assert_eq!(block, B_eff);
                } else {
                    assert_eq!(block, DMatrix::<f64>::zeros(n, m));
                }
            }
        }
    }

    #[test]
    fn dynamics_block_survives_bounds_change() {
        let mut builder = scalar_builder(3, 2);
        assert!(builder.dynamics().is_none());
        let first = builder.constraint_matrix(&dmatrix![0.9], &dmatrix![1.0], 1).unwrap();
        assert_eq!(first.nrows(), 3 + 5);
        let Aeq = builder.dynamics().cloned().unwrap();

        builder
            .set_constraint(Constraints {
                x_min: dvector![-1.0],
                x_max: dvector![1.0],
                u_min: dvector![0.0],
                u_max: dvector![2.0],
            })
            .unwrap();
        // only the identity block is restacked
        let again = builder.constraint_matrix(&dmatrix![0.5], &dmatrix![1.0], 1).unwrap();
        assert_eq!(again, first);
        assert_eq!(builder.dynamics(), Some(&Aeq));

        // a new interval rebuilds the equalities
        let longer = builder.constraint_matrix(&dmatrix![0.9], &dmatrix![1.0], 2).unwrap();
        assert_ne!(longer, first);
        assert_relative_eq!(DMatrix::from(&longer)[(1, 0)], 0.81, epsilon = 1e-12);

        builder
            .set_cost(dmatrix![1.0], dmatrix![0.5], dmatrix![0.2], Horizon::new(3, 2).unwrap())
            .unwrap();
        assert!(builder.dynamics().is_none());
    }

    #[test]
    fn bounds_pin_initial_state() {
        let builder = scalar_builder(3, 2);
        let (l, u) = builder.bounds(&dvector![0.7]).unwrap();
        assert_eq!(l.len(), 2 * 3 + 2);
        assert_eq!(l[0], -0.7);
        assert_eq!(u[0], -0.7);
        assert_eq!((l[1], u[1]), (0.0, 0.0));
        assert!(l[3] <= -1e30 && u[3] >= 1e30);
        assert_eq!((l[6], u[6]), (0.0, 5.0));
        assert_eq!((l[7], u[7]), (0.0, 5.0));
    }

    #[test]
    fn input_cost_stays_out_of_linear_term() {
        let mut builder = scalar_builder(3, 2);
        let reference = DMatrix::from_element(1, 6, 2.0);
        let q = builder
            .linear_term(&reference, ReferenceKind::State, &dvector![1.0], 2)
            .unwrap();
        assert_eq!(q.as_slice(), &[-4.0, -4.0, -4.0, -0.4, 0.0]);

        builder
            .set_cost(dmatrix![1.0], dmatrix![100.0], dmatrix![0.2], Horizon::new(3, 2).unwrap())
            .unwrap();
        let q_heavy = builder
            .linear_term(&reference, ReferenceKind::State, &dvector![1.0], 2)
            .unwrap();
        assert_eq!(q, q_heavy);
    }

    #[test]
    fn reference_samples_every_control_interval() {
        let builder = scalar_builder(3, 1);
        let reference = DMatrix::from_row_slice(1, 6, &[1.0, 9.0, 2.0, 9.0, 3.0, 9.0]);
        let q = builder
            .linear_term(&reference, ReferenceKind::State, &dvector![0.0], 2)
            .unwrap();
        assert_eq!(q.as_slice(), &[-2.0, -4.0, -6.0, 0.0]);
    }

    #[test]
    fn short_reference_is_rejected() {
        let builder = scalar_builder(3, 2);
        let reference = DMatrix::zeros(1, 5);
        assert_eq!(
            builder.check_reference(&reference, ReferenceKind::State, 2),
            Err(MpcError::dim("reference columns", 6, 5))
        );
        assert_eq!(
            builder.check_reference(&DMatrix::zeros(1, 6), ReferenceKind::Output, 2),
            Err(MpcError::MissingCost)
        );
    }

    #[test]
    fn output_cost_weights_through_output_matrix() {
        let mut builder = QpBuilder::new(2, 1, dvector![-1.0], dvector![1.0]).unwrap();
        let C = dmatrix![1.0, 2.0];
        builder
            .set_output_cost(&C, dmatrix![3.0], dmatrix![0.0], dmatrix![0.0], Horizon::new(2, 1).unwrap())
            .unwrap();
        let w = builder.weights().unwrap();
        assert_eq!(w.Q, dmatrix![3.0, 6.0; 6.0, 12.0]);

        let q = builder
            .linear_term(&DMatrix::from_element(1, 2, 1.0), ReferenceKind::Output, &dvector![0.0], 1)
            .unwrap();
        assert_eq!(q.as_slice(), &[-6.0, -12.0, -6.0, -12.0, 0.0]);
    }

    #[test]
    fn weights_must_match_system() {
        let mut builder = QpBuilder::<f64>::new(2, 1, dvector![0.0], dvector![1.0]).unwrap();
        let err = builder.set_cost(
            DMatrix::identity(3, 3),
            dmatrix![1.0],
            dmatrix![1.0],
            Horizon::new(2, 2).unwrap(),
        );
        assert_eq!(err, Err(MpcError::dim("Q rows", 2, 3)));
        assert!(builder.quadratic_term().is_err());
        assert!(matches!(
            builder.set_constraint(Constraints::inputs(2, dvector![1.0], dvector![0.0])),
            Err(MpcError::InvalidBounds { index: 2 })
        ));
    }
}
