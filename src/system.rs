#![allow(non_snake_case)]

//! The plant/estimator interface consumed by the controller, plus the linear
//! dynamics shared by the concrete systems.
//!
//! ```text
//! x[t+1] = A x[t] + B u[t] + m[t]
//! m[t+1] = m[t]              (random walk with covariance Q_m when adapting)
//! ```

use nalgebra::{DMatrix, DVector, RealField, Scalar, SimdRealField, convert};

use crate::error::{MpcError, check_dim};

// Default initial covariances
const DEFAULT_P0: f64 = 1e-06;
const DEFAULT_Q0: f64 = 1e-06;

/// Capabilities the controller needs from a model of the controlled system.
pub trait System<F: Scalar> {
    /// State transition matrix, n_x * n_x
    fn a(&self) -> &DMatrix<F>;
    /// Input matrix, n_x * n_u
    fn b(&self) -> &DMatrix<F>;
    /// Output matrix, n_y * n_x
    fn c(&self) -> &DMatrix<F>;

    /// Current state estimate
    fn x(&self) -> &DVector<F>;
    /// Current output estimate
    fn y(&self) -> &DVector<F>;
    /// Current process disturbance estimate
    fn disturbance(&self) -> &DVector<F>;

    /// Correct the state estimate with a new measurement `z`, taken after
    /// `u_prev` was applied.
    fn filter(&mut self, u_prev: &DVector<F>, z: &DVector<F>) -> Result<(), MpcError>;

    /// Advance one sample period under `u`, returning the new output.
    fn simulate(&mut self, u: &DVector<F>) -> DVector<F>;

    /// Native time step in seconds.
    fn sample_period(&self) -> F;

    /// Map an output-space reference onto the linear output `C x`.
    fn linearize_output(&self, y_ref: &DVector<F>) -> DVector<F> {
        y_ref.clone()
    }

    fn n_x(&self) -> usize {
        self.a().nrows()
    }

    fn n_u(&self) -> usize {
        self.b().ncols()
    }

    fn n_y(&self) -> usize {
        self.c().nrows()
    }
}

/// Linear dynamics and the process half of the estimator.
#[derive(Debug, Clone)]
pub struct Lds<F> {
    pub(crate) n_u: usize,
    pub(crate) n_x: usize,
    pub(crate) n_y: usize,
    pub(crate) dt: F,

    pub(crate) A: DMatrix<F>, // n_x * n_x
    pub(crate) B: DMatrix<F>, // n_x * n_u
    pub(crate) C: DMatrix<F>, // n_y * n_x
    /// Output bias
    pub(crate) d: DVector<F>, // n_y

    // Estimates and their covariances
    pub(crate) x: DVector<F>,   // n_x
    pub(crate) P: DMatrix<F>,   // n_x * n_x
    pub(crate) m: DVector<F>,   // n_x
    pub(crate) P_m: DMatrix<F>, // n_x * n_x
    pub(crate) y: DVector<F>,   // n_y

    // Initial conditions restored by `reset`
    pub(crate) x0: DVector<F>,
    pub(crate) P0: DMatrix<F>,
    pub(crate) m0: DVector<F>,
    pub(crate) P0_m: DMatrix<F>,

    /// Process noise covariance
    pub(crate) Q: DMatrix<F>, // n_x * n_x
    /// Disturbance random-walk covariance
    pub(crate) Q_m: DMatrix<F>, // n_x * n_x

    pub(crate) adapt_m: bool,
    /// The prior has been propagated by `simulate` since the last correction
    pub(crate) prior_ready: bool,
}

impl<F> Lds<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    pub fn new(n_u: usize, n_x: usize, n_y: usize, dt: F) -> Self {
        let p0: F = convert(DEFAULT_P0);
        let q0: F = convert(DEFAULT_Q0);
        Self {
            n_u,
            n_x,
            n_y,
            dt,
            A: DMatrix::identity(n_x, n_x),
            B: DMatrix::zeros(n_x, n_u),
            C: DMatrix::identity(n_y, n_x),
            d: DVector::zeros(n_y),
            x: DVector::zeros(n_x),
            P: DMatrix::identity(n_x, n_x).scale(p0),
            m: DVector::zeros(n_x),
            P_m: DMatrix::identity(n_x, n_x).scale(p0),
            y: DVector::zeros(n_y),
            x0: DVector::zeros(n_x),
            P0: DMatrix::identity(n_x, n_x).scale(p0),
            m0: DVector::zeros(n_x),
            P0_m: DMatrix::identity(n_x, n_x).scale(p0),
            Q: DMatrix::identity(n_x, n_x).scale(q0),
            Q_m: DMatrix::identity(n_x, n_x).scale(q0),
            adapt_m: false,
            prior_ready: false,
        }
    }

    pub fn set_A(&mut self, A: DMatrix<F>) -> Result<(), MpcError> {
        check_square("A", self.n_x, &A)?;
        self.A = A;
        Ok(())
    }

    pub fn set_B(&mut self, B: DMatrix<F>) -> Result<(), MpcError> {
        check_dim("B rows", self.n_x, B.nrows())?;
        check_dim("B columns", self.n_u, B.ncols())?;
        self.B = B;
        Ok(())
    }

    pub fn set_C(&mut self, C: DMatrix<F>) -> Result<(), MpcError> {
        check_dim("C rows", self.n_y, C.nrows())?;
        check_dim("C columns", self.n_x, C.ncols())?;
        self.C = C;
        Ok(())
    }

    pub fn set_d(&mut self, d: DVector<F>) -> Result<(), MpcError> {
        check_dim("output bias", self.n_y, d.len())?;
        self.d = d;
        Ok(())
    }

    /// Set the disturbance estimate and its initial value.
    pub fn set_m(&mut self, m: DVector<F>) -> Result<(), MpcError> {
        check_dim("disturbance", self.n_x, m.len())?;
        self.m0 = m.clone();
        self.m = m;
        Ok(())
    }

    pub fn set_x0(&mut self, x0: DVector<F>) -> Result<(), MpcError> {
        check_dim("initial state", self.n_x, x0.len())?;
        self.x0 = x0;
        Ok(())
    }

    pub fn set_P0(&mut self, P0: DMatrix<F>) -> Result<(), MpcError> {
        check_square("P0", self.n_x, &P0)?;
        self.P0 = P0;
        Ok(())
    }

    pub fn set_P0_m(&mut self, P0_m: DMatrix<F>) -> Result<(), MpcError> {
        check_square("P0_m", self.n_x, &P0_m)?;
        self.P0_m = P0_m;
        Ok(())
    }

    pub fn set_Q(&mut self, Q: DMatrix<F>) -> Result<(), MpcError> {
        check_square("Q", self.n_x, &Q)?;
        self.Q = Q;
        Ok(())
    }

    pub fn set_Q_m(&mut self, Q_m: DMatrix<F>) -> Result<(), MpcError> {
        check_square("Q_m", self.n_x, &Q_m)?;
        self.Q_m = Q_m;
        Ok(())
    }

    /// Restore the initial state, disturbance and covariances.
    pub fn reset(&mut self) {
        self.x = self.x0.clone();
        self.P = self.P0.clone();
        self.m = self.m0.clone();
        self.P_m = self.P0_m.clone();
        self.prior_ready = false;
    }

    /// Time update of the state estimate and covariances.
    pub(crate) fn predict(&mut self, u: &DVector<F>) {
        self.x = &self.A * &self.x + &self.B * u + &self.m;
        self.P = &self.A * &self.P * self.A.transpose() + &self.Q;
        if self.adapt_m {
            self.P_m += &self.Q_m;
        }
    }

    /// Predict with `u_prev` unless `simulate` already moved the prior forward.
    pub(crate) fn prior(&mut self, u_prev: &DVector<F>) -> Result<(), MpcError> {
        check_dim("previous control", self.n_u, u_prev.len())?;
        if !self.prior_ready {
            self.predict(u_prev);
        }
        self.prior_ready = false;
        Ok(())
    }

    pub(crate) fn advance(&mut self, u: &DVector<F>) {
        self.predict(u);
        self.prior_ready = true;
    }

    /// The linear part of the output, `C x + d`.
    pub(crate) fn linear_output(&self) -> DVector<F> {
        &self.C * &self.x + &self.d
    }
}

fn check_square<F>(what: &'static str, n: usize, m: &DMatrix<F>) -> Result<(), MpcError> {
    check_dim(what, n, m.nrows())?;
    check_dim(what, n, m.ncols())
}
