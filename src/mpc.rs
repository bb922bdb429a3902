#![allow(non_snake_case)]

//! Receding-horizon controller: filter the measurement, solve the tracking
//! QP from the new estimate, apply the first move and advance the system.

use log::{debug, warn};
use nalgebra::{DMatrix, DVector, RealField, Scalar, SimdRealField, convert, try_convert};

use crate::builder::{Constraints, Horizon, QpBuilder, ReferenceKind};
use crate::error::{MpcError, check_dim};
use crate::qp::{QpSolver, SolverStatus};
use crate::solver::AdmmSolver;
use crate::system::System;

/// Allowed deviation of `elapsed` from a whole number of sample periods,
/// relative to the sample period.
const INTERVAL_TOLERANCE: f64 = 1e-06;

/// Longest tick accepted, in sample periods. Past this the tolerance above is
/// below the resolution of `elapsed / dt`.
const MAX_STEPS_PER_TICK: f64 = 1e09;

/// Which parts of the QP are out of date with the controller configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Clean,
    /// Cost, horizon or control interval changed: rebuild P and A
    StructuralDirty,
    /// Box constraints changed: rebuild A
    ConstraintDirty,
    BothDirty,
}

impl CacheState {
    #[must_use]
    pub fn mark_structural(self) -> Self {
        match self {
            CacheState::Clean | CacheState::StructuralDirty => CacheState::StructuralDirty,
            CacheState::ConstraintDirty | CacheState::BothDirty => CacheState::BothDirty,
        }
    }

    #[must_use]
    pub fn mark_constraint(self) -> Self {
        match self {
            CacheState::Clean | CacheState::ConstraintDirty => CacheState::ConstraintDirty,
            CacheState::StructuralDirty | CacheState::BothDirty => CacheState::BothDirty,
        }
    }

    pub fn is_clean(self) -> bool {
        self == CacheState::Clean
    }

    pub fn structural(self) -> bool {
        matches!(self, CacheState::StructuralDirty | CacheState::BothDirty)
    }
}

/// Solver report for a tick that solved the QP.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diagnostics<F> {
    pub objective: F,
    pub status: SolverStatus,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlOutput<F> {
    /// Control applied over the tick
    pub control: DVector<F>,
    /// Present whenever the QP was solved
    pub diagnostics: Option<Diagnostics<F>>,
}

/// Model predictive controller for a linear dynamical system.
pub struct MpcController<F: RealField, S, Q = AdmmSolver<F>> {
    sys: S,
    solver: Q,
    builder: QpBuilder<F>,
    cache: CacheState,

    /// Last applied control, n_u
    u: DVector<F>,
    /// Native steps per tick the QP dynamics were built for
    n_sim: usize,
    /// Predicted states of the last solve, n_x * N
    trajectory: DMatrix<F>,
    objective: Option<F>,
}

impl<F, S> MpcController<F, S, AdmmSolver<F>>
where
    F: Scalar + Copy + SimdRealField + RealField,
    S: System<F>,
{
    /// Controller with the default ADMM solver. The state is unconstrained
    /// until [`set_constraint`](Self::set_constraint) is called.
    pub fn new(sys: S, u_min: DVector<F>, u_max: DVector<F>) -> Result<Self, MpcError> {
        Self::with_solver(sys, AdmmSolver::new(), u_min, u_max)
    }
}

impl<F, S, Q> MpcController<F, S, Q>
where
    F: Scalar + Copy + SimdRealField + RealField,
    S: System<F>,
    Q: QpSolver<F>,
{
    pub fn with_solver(sys: S, solver: Q, u_min: DVector<F>, u_max: DVector<F>) -> Result<Self, MpcError> {
        check_dim("A columns", sys.n_x(), sys.a().ncols())?;
        check_dim("B rows", sys.n_x(), sys.b().nrows())?;
        check_dim("C columns", sys.n_x(), sys.c().ncols())?;
        let builder = QpBuilder::new(sys.n_x(), sys.n_u(), u_min, u_max)?;
        Ok(Self {
            u: DVector::zeros(sys.n_u()),
            trajectory: DMatrix::zeros(sys.n_x(), 0),
            sys,
            solver,
            builder,
            cache: CacheState::BothDirty,
            n_sim: 0,
            objective: None,
        })
    }

    pub fn sys(&self) -> &S {
        &self.sys
    }

    pub fn sys_mut(&mut self) -> &mut S {
        &mut self.sys
    }

    pub fn solver(&self) -> &Q {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut Q {
        &mut self.solver
    }

    pub fn cache_state(&self) -> CacheState {
        self.cache
    }

    pub fn horizon(&self) -> Option<Horizon> {
        self.builder.horizon()
    }

    pub fn builder(&self) -> &QpBuilder<F> {
        &self.builder
    }

    /// Control applied during the last tick.
    pub fn control(&self) -> &DVector<F> {
        &self.u
    }

    /// Predicted state trajectory `[x_0 ... x_{N-1}]` from the last solve.
    pub fn predicted_trajectory(&self) -> &DMatrix<F> {
        &self.trajectory
    }

    /// Objective value of the last solve.
    pub fn objective(&self) -> Option<F> {
        self.objective
    }

    /// State-space tracking cost with prediction and control horizons.
    pub fn set_cost(
        &mut self,
        Q: DMatrix<F>,
        R: DMatrix<F>,
        S: DMatrix<F>,
        horizon: Horizon,
    ) -> Result<(), MpcError> {
        self.builder.set_cost(Q, R, S, horizon)?;
        self.cache = self.cache.mark_structural();
        Ok(())
    }

    /// Output-space tracking cost `(y - y_ref)' Q_y (y - y_ref)`.
    pub fn set_output_cost(
        &mut self,
        Q_y: DMatrix<F>,
        R: DMatrix<F>,
        S: DMatrix<F>,
        horizon: Horizon,
    ) -> Result<(), MpcError> {
        self.builder.set_output_cost(self.sys.c(), Q_y, R, S, horizon)?;
        self.cache = self.cache.mark_structural();
        Ok(())
    }

    pub fn set_constraint(
        &mut self,
        x_min: DVector<F>,
        x_max: DVector<F>,
        u_min: DVector<F>,
        u_max: DVector<F>,
    ) -> Result<(), MpcError> {
        self.builder.set_constraint(Constraints {
            x_min,
            x_max,
            u_min,
            u_max,
        })?;
        self.cache = self.cache.mark_constraint();
        Ok(())
    }

    /// Run one tick of `elapsed` seconds against a state reference
    /// (n_x rows, at least `N * n_sim` columns at the native sample rate).
    ///
    /// With `apply_control` false the previous control is held and no QP is
    /// solved.
    pub fn step(
        &mut self,
        elapsed: F,
        z: &DVector<F>,
        reference: &DMatrix<F>,
        apply_control: bool,
    ) -> Result<ControlOutput<F>, MpcError> {
        self.tick(elapsed, z, reference, ReferenceKind::State, apply_control)
    }

    /// As [`step`](Self::step), against an output reference (n_y rows)
    /// under the cost from [`set_output_cost`](Self::set_output_cost).
    pub fn step_output_reference(
        &mut self,
        elapsed: F,
        z: &DVector<F>,
        y_ref: &DMatrix<F>,
        apply_control: bool,
    ) -> Result<ControlOutput<F>, MpcError> {
        let mut linear = DMatrix::zeros(y_ref.nrows(), y_ref.ncols());
        for (j, col) in y_ref.column_iter().enumerate() {
            linear.set_column(j, &self.sys.linearize_output(&col.into_owned()));
        }
        self.tick(elapsed, z, &linear, ReferenceKind::Output, apply_control)
    }

    fn tick(
        &mut self,
        elapsed: F,
        z: &DVector<F>,
        reference: &DMatrix<F>,
        kind: ReferenceKind,
        apply_control: bool,
    ) -> Result<ControlOutput<F>, MpcError> {
        let n_sim = self.interval(elapsed)?;
        check_dim("measurement", self.sys.n_y(), z.len())?;
        self.builder.check_reference(reference, kind, n_sim)?;

        self.sys.filter(&self.u, z)?;

        let solved = apply_control.then(|| self.solve(reference, kind, n_sim));

        // The model follows real time even when the solve failed; the held
        // control stays in place in that case.
        for _ in 0..n_sim {
            self.sys.simulate(&self.u);
        }
        let diagnostics = solved.transpose()?;

        Ok(ControlOutput {
            control: self.u.clone(),
            diagnostics,
        })
    }

    /// Number of native steps in `elapsed`.
    fn interval(&self, elapsed: F) -> Result<usize, MpcError> {
        let dt = self.sys.sample_period();
        let invalid = || MpcError::InvalidInterval {
            elapsed: try_convert(elapsed).unwrap_or(f64::NAN),
            sample_period: try_convert(dt).unwrap_or(f64::NAN),
        };
        if !elapsed.is_finite() || !dt.is_finite() || elapsed <= F::zero() || dt <= F::zero() {
            return Err(invalid());
        }

        let tolerance: F = convert(INTERVAL_TOLERANCE);
        let ratio = elapsed / dt;
        let steps = ratio.round();
        if (ratio - steps).abs() > tolerance {
            return Err(invalid());
        }
        match try_convert::<F, f64>(steps) {
            Some(steps) if (1.0..=MAX_STEPS_PER_TICK).contains(&steps) => Ok(steps as usize),
            _ => Err(invalid()),
        }
    }

    fn solve(
        &mut self,
        reference: &DMatrix<F>,
        kind: ReferenceKind,
        n_sim: usize,
    ) -> Result<Diagnostics<F>, MpcError> {
        if n_sim != self.n_sim {
            debug!("Control interval changed from {} to {} steps", self.n_sim, n_sim);
            self.cache = self.cache.mark_structural();
        }

        if self.cache.structural() {
            let P = self.builder.quadratic_term()?;
            self.solver.set_quadratic_term(&P)?;
        }
        if !self.cache.is_clean() {
            debug!("Rebuilding QP constraints ({:?})", self.cache);
            let A = self
                .builder
                .constraint_matrix(self.sys.a(), self.sys.b(), n_sim)?;
            self.solver.set_constraint_matrix(&A)?;
            self.n_sim = n_sim;
            self.cache = CacheState::Clean;
        }

        let (l, u) = self.builder.bounds(self.sys.x())?;
        self.solver.set_bounds(&l, &u)?;
        let q = self.builder.linear_term(reference, kind, &self.u, n_sim)?;
        self.solver.set_linear_term(&q)?;

        let solution = self.solver.solve()?;
        if !solution.is_optimal() {
            warn!(
                "QP solve failed with {:?} after {} iterations",
                solution.status, solution.iterations
            );
            return Err(MpcError::SolverFailure(solution.status));
        }
        check_dim("solution length", self.builder.num_variables(), solution.x.len())?;

        let n_x = self.sys.n_x();
        let offset = self.builder.control_offset();
        let steps = offset / n_x.max(1);
        self.u = solution.x.rows(offset, self.sys.n_u()).into_owned();
        self.trajectory = DMatrix::from_column_slice(n_x, steps, &solution.x.as_slice()[..offset]);
        self.objective = Some(solution.objective);

        Ok(Diagnostics {
            objective: solution.objective,
            status: solution.status,
            iterations: solution.iterations,
        })
    }
}
