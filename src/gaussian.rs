#![allow(non_snake_case)]

//! Linear dynamics with Gaussian observations, `y = C x + d`, estimated
//! by a Kalman filter.

use nalgebra::{DMatrix, DVector, RealField, Scalar, SimdRealField, convert};

use crate::error::{MpcError, check_dim};
use crate::system::{Lds, System};

const DEFAULT_R0: f64 = 1e-02;

#[derive(Debug, Clone)]
pub struct GaussianSystem<F> {
    lds: Lds<F>,
    /// Measurement noise covariance, n_y * n_y
    R: DMatrix<F>,
}

impl<F> GaussianSystem<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    pub fn new(n_u: usize, n_x: usize, n_y: usize, dt: F) -> Self {
        let r0: F = convert(DEFAULT_R0);
        let mut sys = Self {
            lds: Lds::new(n_u, n_x, n_y, dt),
            R: DMatrix::identity(n_y, n_y).scale(r0),
        };
        sys.reset();
        sys
    }

    pub fn dynamics(&self) -> &Lds<F> {
        &self.lds
    }

    /// Matrices and initial conditions. Call [`reset`](Self::reset) after
    /// changing the initial conditions.
    pub fn dynamics_mut(&mut self) -> &mut Lds<F> {
        &mut self.lds
    }

    pub fn set_R(&mut self, R: DMatrix<F>) -> Result<(), MpcError> {
        check_dim("R", self.lds.n_y, R.nrows())?;
        check_dim("R", self.lds.n_y, R.ncols())?;
        self.R = R;
        Ok(())
    }

    /// Estimate the process disturbance alongside the state.
    pub fn set_adapt_disturbance(&mut self, adapt: bool) {
        self.lds.adapt_m = adapt;
    }

    pub fn adapt_disturbance(&self) -> bool {
        self.lds.adapt_m
    }

    pub fn reset(&mut self) {
        self.lds.reset();
        self.lds.y = self.lds.linear_output();
    }
}

impl<F> System<F> for GaussianSystem<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    fn a(&self) -> &DMatrix<F> {
        &self.lds.A
    }

    fn b(&self) -> &DMatrix<F> {
        &self.lds.B
    }

    fn c(&self) -> &DMatrix<F> {
        &self.lds.C
    }

    fn x(&self) -> &DVector<F> {
        &self.lds.x
    }

    fn y(&self) -> &DVector<F> {
        &self.lds.y
    }

    fn disturbance(&self) -> &DVector<F> {
        &self.lds.m
    }

    fn sample_period(&self) -> F {
        self.lds.dt
    }

    fn filter(&mut self, u_prev: &DVector<F>, z: &DVector<F>) -> Result<(), MpcError> {
        check_dim("measurement", self.lds.n_y, z.len())?;
        // Work on a copy so a failed correction leaves the estimate untouched
        let mut lds = self.lds.clone();
        lds.prior(u_prev)?;

        let Ct = lds.C.transpose();
        let innovation = z - lds.linear_output();

        let S = &lds.C * &lds.P * &Ct + &self.R;
        let S_inv = S
            .try_inverse()
            .ok_or(MpcError::Singular("innovation covariance"))?;
        let K = &lds.P * &Ct * S_inv;

        if lds.adapt_m {
            let S_m = &lds.C * &lds.P_m * &Ct + &self.R;
            let S_m_inv = S_m
                .try_inverse()
                .ok_or(MpcError::Singular("disturbance innovation covariance"))?;
            let K_m = &lds.P_m * &Ct * S_m_inv;
            lds.m += &K_m * &innovation;
            lds.P_m = (DMatrix::identity(lds.n_x, lds.n_x) - &K_m * &lds.C) * &lds.P_m;
        }

        lds.x += &K * &innovation;
        lds.P = (DMatrix::identity(lds.n_x, lds.n_x) - &K * &lds.C) * &lds.P;
        lds.y = lds.linear_output();
        self.lds = lds;
        Ok(())
    }

    fn simulate(&mut self, u: &DVector<F>) -> DVector<F> {
        self.lds.advance(u);
        self.lds.y = self.lds.linear_output();
        self.lds.y.clone()
    }

    fn linearize_output(&self, y_ref: &DVector<F>) -> DVector<F> {
        y_ref - &self.lds.d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    fn scalar(a: f64) -> GaussianSystem<f64> {
        let mut sys = GaussianSystem::new(1, 1, 1, 1e-3);
        sys.dynamics_mut().set_A(dmatrix![a]).unwrap();
        sys
    }

    #[test]
    fn kalman_filter_tracks_constant_measurement() {
        let mut sys = scalar(1.0);
        sys.dynamics_mut().set_Q(dmatrix![1e-4]).unwrap();
        sys.dynamics_mut().set_P0(dmatrix![1.0]).unwrap();
        sys.reset();

        let u = dvector![0.0];
        for _ in 0..200 {
            sys.filter(&u, &dvector![2.0]).unwrap();
        }
        assert!((sys.x()[0] - 2.0).abs() < 1e-3);
        assert!((sys.y()[0] - 2.0).abs() < 1e-3);
    }

    #[test]
    fn disturbance_is_learned_when_adapting() {
        let mut sys = scalar(0.9);
        sys.dynamics_mut().set_Q_m(dmatrix![1e-3]).unwrap();
        sys.set_adapt_disturbance(true);
        sys.reset();

        // steady state of x = 0.9 x + 0.5
        let u = dvector![0.0];
        for _ in 0..3000 {
            sys.filter(&u, &dvector![5.0]).unwrap();
        }
        assert!((sys.disturbance()[0] - 0.5).abs() < 1e-2);
    }

    #[test]
    fn simulate_applies_input_and_bias() {
        let mut sys = scalar(0.5);
        sys.dynamics_mut().set_B(dmatrix![2.0]).unwrap();
        sys.dynamics_mut().set_d(dvector![1.0]).unwrap();
        sys.dynamics_mut().set_x0(dvector![2.0]).unwrap();
        sys.reset();
        assert_eq!(sys.y()[0], 3.0);

        let y = sys.simulate(&dvector![1.0]);
        assert_eq!(sys.x()[0], 3.0);
        assert_eq!(y[0], 4.0);
        assert_eq!(sys.linearize_output(&y)[0], 3.0);
    }

    #[test]
    fn singular_innovation_keeps_estimate() {
        let mut sys = scalar(0.5);
        sys.dynamics_mut().set_x0(dvector![1.0]).unwrap();
        sys.dynamics_mut().set_P0(dmatrix![0.0]).unwrap();
        sys.dynamics_mut().set_Q(dmatrix![0.0]).unwrap();
        sys.set_R(dmatrix![0.0]).unwrap();
        sys.reset();

        assert_eq!(
            sys.filter(&dvector![0.0], &dvector![3.0]),
            Err(MpcError::Singular("innovation covariance"))
        );
        assert_eq!(sys.x(), &dvector![1.0]);
        assert_eq!(sys.y(), &dvector![1.0]);

        // the prior is still pending, so the next good update predicts once
        sys.set_R(dmatrix![1.0]).unwrap();
        sys.filter(&dvector![0.0], &dvector![3.0]).unwrap();
        assert_eq!(sys.x(), &dvector![0.5]);
    }

    #[test]
    fn filter_rejects_wrong_measurement_length() {
        let mut sys = scalar(1.0);
        let before = sys.x().clone();
        assert!(matches!(
            sys.filter(&dvector![0.0], &dvector![1.0, 2.0]),
            Err(MpcError::DimensionMismatch { expected: 1, got: 2, .. })
        ));
        assert_eq!(sys.x(), &before);
    }
}
