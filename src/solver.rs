#![allow(non_snake_case)]

use log::{debug, warn};
use nalgebra::{Cholesky, DMatrix, DVector, Dyn, RealField, Scalar, SimdRealField, convert};

use crate::csc::{CscMatrix, symmetric_to_dense};
use crate::error::MpcError;
use crate::qp::{QpProblem, QpSolver, Solution, SolverStatus};

// Default settings
const DEFAULT_RHO: f64 = 0.1;
const DEFAULT_SIGMA: f64 = 1e-06;
const DEFAULT_ALPHA: f64 = 1.6;
const DEFAULT_EPS_ABS: f64 = 1e-03;
const DEFAULT_EPS_REL: f64 = 1e-03;
const DEFAULT_EPS_PRIM_INF: f64 = 1e-04;
const DEFAULT_EPS_DUAL_INF: f64 = 1e-04;
const DEFAULT_MAX_ITER: usize = 4000;
const DEFAULT_CHECK_TERMINATION: usize = 1;
const DEFAULT_WARM_START: bool = true;
const DEFAULT_ADAPTIVE_RHO: bool = true;
const DEFAULT_ADAPTIVE_RHO_INTERVAL: usize = 25;
const DEFAULT_ADAPTIVE_RHO_TOLERANCE: f64 = 5.0;
const DEFAULT_RHO_MIN: f64 = 1e-06;
const DEFAULT_RHO_MAX: f64 = 1e06;

/// Bounds at or beyond this magnitude are treated as infinite.
pub(crate) const INFTY: f64 = 1e30;
/// Penalty multiplier for equality rows (`l == u`)
pub(crate) const RHO_EQ_SCALE: f64 = 1e03;

/// User settings
#[derive(Debug, Clone)]
pub struct AdmmSettings<F> {
    /// Initial ADMM penalty
    pub rho: F,
    /// Regularization on the primal variable
    pub sigma: F,
    /// Over-relaxation, in (0, 2)
    pub alpha: F,
    pub eps_abs: F,
    pub eps_rel: F,
    pub eps_prim_inf: F,
    pub eps_dual_inf: F,
    pub max_iter: usize,
    /// Evaluate termination every this many iterations
    pub check_termination: usize,
    /// Start from the previous solution instead of zero
    pub warm_start: bool,

    pub adaptive_rho: bool,
    pub adaptive_rho_interval: usize,
    /// Refactorize only when rho moves by more than this factor
    pub adaptive_rho_tolerance: F,
    pub rho_min: F,
    pub rho_max: F,
}

impl<F> Default for AdmmSettings<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    fn default() -> Self {
        Self {
            rho: convert(DEFAULT_RHO),
            sigma: convert(DEFAULT_SIGMA),
            alpha: convert(DEFAULT_ALPHA),
            eps_abs: convert(DEFAULT_EPS_ABS),
            eps_rel: convert(DEFAULT_EPS_REL),
            eps_prim_inf: convert(DEFAULT_EPS_PRIM_INF),
            eps_dual_inf: convert(DEFAULT_EPS_DUAL_INF),
            max_iter: DEFAULT_MAX_ITER,
            check_termination: DEFAULT_CHECK_TERMINATION,
            warm_start: DEFAULT_WARM_START,
            adaptive_rho: DEFAULT_ADAPTIVE_RHO,
            adaptive_rho_interval: DEFAULT_ADAPTIVE_RHO_INTERVAL,
            adaptive_rho_tolerance: convert(DEFAULT_ADAPTIVE_RHO_TOLERANCE),
            rho_min: convert(DEFAULT_RHO_MIN),
            rho_max: convert(DEFAULT_RHO_MAX),
        }
    }
}

impl<F> AdmmSettings<F> {
    pub fn update(&mut self, eps_abs: F, eps_rel: F, max_iter: usize, check_termination: usize) {
        self.eps_abs = eps_abs;
        self.eps_rel = eps_rel;
        self.max_iter = max_iter;
        self.check_termination = check_termination;
    }
}

/// Matrices that must be recomputed with changes in P, A, or rho
#[derive(Debug)]
pub struct AdmmCache<F: RealField> {
    pub rho: F,
    /// Per-row penalty, `RHO_EQ_SCALE * rho` on equality rows
    pub rho_vec: DVector<F>, // n_con

    /// Full symmetric quadratic term
    pub P: DMatrix<F>, // n_var * n_var
    pub A: DMatrix<F>, // n_con * n_var
    pub At: DMatrix<F>, // n_var * n_con

    /// Bounds clipped to [-INFTY, INFTY]
    pub l: DVector<F>, // n_con
    pub u: DVector<F>, // n_con
    pub equality: Vec<bool>,

    /// Factor of `P + sigma I + A' diag(rho_vec) A`
    pub kkt: Option<Cholesky<F, Dyn>>,
}

impl<F> AdmmCache<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    fn empty(rho: F) -> Self {
        Self {
            rho,
            rho_vec: DVector::zeros(0),
            P: DMatrix::zeros(0, 0),
            A: DMatrix::zeros(0, 0),
            At: DMatrix::zeros(0, 0),
            l: DVector::zeros(0),
            u: DVector::zeros(0),
            equality: Vec::new(),
            kkt: None,
        }
    }

    /// Recompute the per-row penalties for the current `rho`.
    pub(crate) fn update_rho_vec(&mut self) {
        let scale: F = convert(RHO_EQ_SCALE);
        let rho_eq = self.rho * scale;
        self.rho_vec = DVector::from_iterator(
            self.equality.len(),
            self.equality.iter().map(|&eq| if eq { rho_eq } else { self.rho }),
        );
    }

    /// Factor the reduced KKT matrix. Returns false when it is not positive definite.
    pub(crate) fn factorize(&mut self, sigma: F) -> bool {
        let n = self.P.nrows();
        let mut kkt = &self.P + DMatrix::<F>::identity(n, n).scale(sigma);
        if self.A.nrows() > 0 {
            kkt += &self.At * DMatrix::from_diagonal(&self.rho_vec) * &self.A;
        }
        self.kkt = Cholesky::new(kkt);
        if self.kkt.is_none() {
            warn!("KKT factorization failed, quadratic term is not positive semidefinite");
        }
        self.kkt.is_some()
    }
}

/// Problem variables
#[derive(Debug)]
pub struct AdmmWorkspace<F> {
    pub(crate) n_var: usize,
    pub(crate) n_con: usize,

    // Iterates
    pub(crate) x: DVector<F>, // n_var
    pub(crate) z: DVector<F>, // n_con
    pub(crate) y: DVector<F>, // n_con

    // Previous iterates
    pub(crate) x_prev: DVector<F>, // n_var
    pub(crate) z_prev: DVector<F>, // n_con

    // Solution of the reduced KKT system and its image
    pub(crate) xt: DVector<F>, // n_var
    pub(crate) zt: DVector<F>, // n_con

    // Iterate differences for infeasibility detection
    pub(crate) delta_x: DVector<F>, // n_var
    pub(crate) delta_y: DVector<F>, // n_con

    // Products reused by residuals and rho adaptation
    pub(crate) Ax: DVector<F>,  // n_con
    pub(crate) Px: DVector<F>,  // n_var
    pub(crate) Aty: DVector<F>, // n_var

    /// Variables for keeping track of solve status
    pub(crate) primal_residual: F,
    pub(crate) dual_residual: F,
    pub(crate) status: SolverStatus,
    pub(crate) iter: usize,
}

impl<F> AdmmWorkspace<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    fn new(n_var: usize, n_con: usize) -> Self {
        Self {
            n_var,
            n_con,
            x: DVector::zeros(n_var),
            z: DVector::zeros(n_con),
            y: DVector::zeros(n_con),
            x_prev: DVector::zeros(n_var),
            z_prev: DVector::zeros(n_con),
            xt: DVector::zeros(n_var),
            zt: DVector::zeros(n_con),
            delta_x: DVector::zeros(n_var),
            delta_y: DVector::zeros(n_con),
            Ax: DVector::zeros(n_con),
            Px: DVector::zeros(n_var),
            Aty: DVector::zeros(n_var),
            primal_residual: convert(0.0),
            dual_residual: convert(0.0),
            status: SolverStatus::MaxIterations,
            iter: 0,
        }
    }

    /// Forget the previous solution.
    pub(crate) fn cold_start(&mut self) {
        self.x.fill(convert(0.0));
        self.z.fill(convert(0.0));
        self.y.fill(convert(0.0));
    }
}

/// Operator-splitting QP solver.
#[derive(Debug)]
pub struct AdmmSolver<F: RealField> {
    pub settings: AdmmSettings<F>, // Problem settings
    pub(crate) problem: QpProblem<F>,
    pub(crate) cache: AdmmCache<F>,     // Problem cache
    pub(crate) work: AdmmWorkspace<F>,  // Solver workspace
    pub(crate) factorizations: usize,
}

impl<F> AdmmSolver<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(AdmmSettings::default())
    }

    #[must_use]
    pub fn with_settings(settings: AdmmSettings<F>) -> Self {
        Self {
            cache: AdmmCache::empty(settings.rho),
            settings,
            problem: QpProblem::new(),
            work: AdmmWorkspace::new(0, 0),
            factorizations: 0,
        }
    }

    pub fn problem(&self) -> &QpProblem<F> {
        &self.problem
    }

    pub fn get_num_iters(&self) -> usize {
        self.work.iter
    }

    /// Number of KKT factorizations performed so far.
    pub fn get_num_factorizations(&self) -> usize {
        self.factorizations
    }

    pub fn get_rho(&self) -> F {
        self.cache.rho
    }

    /// Bring the cache in line with whatever changed in the problem.
    ///
    /// Returns false when the KKT matrix cannot be factorized.
    pub(crate) fn setup(&mut self) -> Result<bool, MpcError> {
        self.problem.validate()?;
        let changes = self.problem.changes();
        let n_var = self.problem.num_variables();
        let n_con = self.problem.num_constraints();

        let mut refactor = changes.needs_factorization() || self.cache.kkt.is_none();

        if n_var != self.work.n_var || n_con != self.work.n_con {
            debug!("Problem dimensions changed to {n_var} variables, {n_con} constraints");
            self.work = AdmmWorkspace::new(n_var, n_con);
            refactor = true;
        } else if !self.settings.warm_start {
            self.work.cold_start();
        }

        if changes.quadratic {
            self.cache.P = symmetric_to_dense(&self.problem.P);
        }
        if changes.constraints {
            self.cache.A = DMatrix::from(&self.problem.A);
            self.cache.At = self.cache.A.transpose();
        }
        if changes.bounds || changes.constraints {
            let infty: F = convert(INFTY);
            self.cache.l = self.problem.l.map(|v| v.max(-infty));
            self.cache.u = self.problem.u.map(|v| v.min(infty));
            let equality: Vec<bool> = self
                .cache
                .l
                .iter()
                .zip(self.cache.u.iter())
                .map(|(lo, hi)| lo == hi)
                .collect();
            if equality != self.cache.equality {
                self.cache.equality = equality;
                refactor = true;
            }
        }
        self.problem.clear_changes();

        if refactor {
            self.cache.update_rho_vec();
            self.factorizations += 1;
            return Ok(self.cache.factorize(self.settings.sigma));
        }
        Ok(true)
    }

    /// Solution handed back to the caller.
    pub(crate) fn solution(&self) -> Solution<F> {
        Solution {
            x: self.work.x.clone(),
            y: self.work.y.clone(),
            objective: self.objective(),
            status: self.work.status,
            iterations: self.work.iter,
        }
    }

    fn objective(&self) -> F {
        let half: F = convert(0.5);
        self.work.x.dot(&(&self.cache.P * &self.work.x)) * half + self.problem.q.dot(&self.work.x)
    }
}

impl<F> Default for AdmmSolver<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<F> QpSolver<F> for AdmmSolver<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    fn set_quadratic_term(&mut self, P: &CscMatrix<F>) -> Result<(), MpcError> {
        self.problem.update_quadratic(P)
    }

    fn set_linear_term(&mut self, q: &DVector<F>) -> Result<(), MpcError> {
        self.problem.update_linear(q)
    }

    fn set_constraint_matrix(&mut self, A: &CscMatrix<F>) -> Result<(), MpcError> {
        self.problem.update_constraints(A)
    }

    fn set_bounds(&mut self, l: &DVector<F>, u: &DVector<F>) -> Result<(), MpcError> {
        self.problem.update_bounds(l, u)
    }

    fn solve(&mut self) -> Result<Solution<F>, MpcError> {
        if !self.setup()? {
            self.work.status = SolverStatus::NonConvex;
            self.work.iter = 0;
            return Ok(self.solution());
        }
        self.admm_solve();
        let solution = self.solution();
        if !solution.is_optimal() {
            // Diverged iterates make a poor starting point
            self.work.cold_start();
        }
        Ok(solution)
    }
}
