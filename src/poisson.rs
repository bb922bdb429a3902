#![allow(non_snake_case)]

//! Linear dynamics with Poisson observations, `y = exp(C x + d)`, estimated
//! by a point-process filter.

use nalgebra::{DMatrix, DVector, RealField, Scalar, SimdRealField, convert};

use crate::error::{MpcError, check_dim};
use crate::system::{Lds, System};

// Floor applied to rates before taking the log
const MIN_RATE: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct PoissonSystem<F> {
    lds: Lds<F>,
}

impl<F> PoissonSystem<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    pub fn new(n_u: usize, n_x: usize, n_y: usize, dt: F) -> Self {
        let mut sys = Self {
            lds: Lds::new(n_u, n_x, n_y, dt),
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

    pub fn set_adapt_disturbance(&mut self, adapt: bool) {
        self.lds.adapt_m = adapt;
    }

    pub fn adapt_disturbance(&self) -> bool {
        self.lds.adapt_m
    }

    pub fn reset(&mut self) {
        self.lds.reset();
        self.lds.y = rate(&self.lds);
    }
}

fn rate<F>(lds: &Lds<F>) -> DVector<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    lds.linear_output().map(|v| v.exp())
}

/// `(P^-1 + C' diag(y) C)^-1`
fn posterior_covariance<F>(
    P: &DMatrix<F>,
    C: &DMatrix<F>,
    y: &DVector<F>,
    what: &'static str,
) -> Result<DMatrix<F>, MpcError>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    let information = C.transpose() * DMatrix::from_diagonal(y) * C;
    let P_inv = P.clone().try_inverse().ok_or(MpcError::Singular(what))?;
    (P_inv + information)
        .try_inverse()
        .ok_or(MpcError::Singular(what))
}

impl<F> System<F> for PoissonSystem<F>
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
        let mut lds = self.lds.clone();
        lds.prior(u_prev)?;

        let y_prior = rate(&lds);
        let Ct = lds.C.transpose();
        let innovation = z - &y_prior;

        let P = posterior_covariance(&lds.P, &lds.C, &y_prior, "state covariance")?;
        if lds.adapt_m {
            let P_m = posterior_covariance(&lds.P_m, &lds.C, &y_prior, "disturbance covariance")?;
            lds.m += &P_m * &Ct * &innovation;
            lds.P_m = P_m;
        }
        lds.x += &P * &Ct * &innovation;
        lds.P = P;
        lds.y = rate(&lds);

        self.lds = lds;
        Ok(())
    }

    fn simulate(&mut self, u: &DVector<F>) -> DVector<F> {
        self.lds.advance(u);
        self.lds.y = rate(&self.lds);
        self.lds.y.clone()
    }

    /// `ln(y) - d`, the linear output that produces rate `y`.
    fn linearize_output(&self, y_ref: &DVector<F>) -> DVector<F> {
        let floor: F = convert(MIN_RATE);
        y_ref.map(|v| v.max(floor).ln()) - &self.lds.d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn output_is_exponential_of_linear_part() {
        let mut sys = PoissonSystem::<f64>::new(1, 1, 1, 1e-3);
        sys.dynamics_mut().set_A(dmatrix![0.5]).unwrap();
        sys.dynamics_mut().set_B(dmatrix![1.0]).unwrap();
        sys.dynamics_mut().set_d(dvector![-1.0]).unwrap();
        sys.dynamics_mut().set_x0(dvector![2.0]).unwrap();
        sys.reset();
        assert_relative_eq!(sys.y()[0], 1f64.exp(), epsilon = 1e-12);

        let y = sys.simulate(&dvector![0.5]);
        assert_relative_eq!(y[0], 0.5f64.exp(), epsilon = 1e-12);
        assert_relative_eq!(sys.linearize_output(&y)[0], 1.5, epsilon = 1e-12);
    }

    #[test]
    fn point_process_filter_tracks_rate() {
        let mut sys = PoissonSystem::<f64>::new(1, 1, 1, 1e-3);
        sys.dynamics_mut().set_Q(dmatrix![1e-4]).unwrap();
        sys.dynamics_mut().set_P0(dmatrix![1e-2]).unwrap();
        sys.dynamics_mut().set_x0(dvector![0.01f64.ln()]).unwrap();
        sys.reset();

        let u = dvector![0.0];
        for _ in 0..5000 {
            sys.filter(&u, &dvector![0.05]).unwrap();
        }
        assert_relative_eq!(sys.y()[0], 0.05, epsilon = 1e-3);
    }

    #[test]
    fn singular_covariance_keeps_estimate() {
        let mut sys = PoissonSystem::<f64>::new(1, 1, 1, 1e-3);
        sys.dynamics_mut().set_A(dmatrix![0.5]).unwrap();
        sys.dynamics_mut().set_x0(dvector![-2.0]).unwrap();
        sys.dynamics_mut().set_P0(dmatrix![0.0]).unwrap();
        sys.dynamics_mut().set_Q(dmatrix![0.0]).unwrap();
        sys.reset();
        let before = sys.clone();

        assert_eq!(
            sys.filter(&dvector![0.0], &dvector![1.0]),
            Err(MpcError::Singular("state covariance"))
        );
        assert_eq!(sys.x(), before.x());
        assert_eq!(sys.y(), before.y());
        assert_eq!(sys.dynamics().P, before.dynamics().P);
    }

    #[test]
    fn zero_rate_reference_is_floored() {
        let sys = PoissonSystem::<f64>::new(1, 1, 1, 1e-3);
        let linear = sys.linearize_output(&dvector![0.0]);
        assert!(linear[0].is_finite());
    }
}
