use nalgebra::{RealField, Scalar, SimdRealField, convert};

use crate::admm::inf_norm;
use crate::solver::{AdmmCache, AdmmSolver};

/// Residuals and their normalisers at the current iterate.
#[derive(Debug, Clone, Copy)]
pub struct ResidualNorms<F> {
    pub pri_res: F,
    pub dual_res: F,
    pub pri_norm: F,
    pub dual_norm: F,
}

/// Balances primal and dual progress by rescaling the ADMM penalty.
#[derive(Debug, Clone, Copy)]
pub struct RhoAdapter<F> {
    pub rho_min: F,
    pub rho_max: F,
    /// Factor by which rho must move before the KKT matrix is refactored
    pub tolerance: F,
}

impl<F> RhoAdapter<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    /// Residuals from the products cached in the solver workspace.
    pub fn compute_residuals(&self, solver: &AdmmSolver<F>) -> ResidualNorms<F> {
        let work = &solver.work;

        let pri_res = inf_norm(&(&work.Ax - &work.z));
        let pri_norm = inf_norm(&work.Ax).max(inf_norm(&work.z));

        let dual_res = inf_norm(&(&work.Px + &solver.problem.q + &work.Aty));
        let dual_norm = inf_norm(&work.Px)
            .max(inf_norm(&work.Aty))
            .max(inf_norm(&solver.problem.q));

        ResidualNorms {
            pri_res,
            dual_res,
            pri_norm,
            dual_norm,
        }
    }

    /// Predict new rho value
    pub fn predict_rho(&self, residuals: &ResidualNorms<F>, current_rho: F) -> F {
        let eps: F = convert(1e-10);

        let normalized_pri = residuals.pri_res / (residuals.pri_norm + eps);
        let normalized_dual = residuals.dual_res / (residuals.dual_norm + eps);

        let ratio = normalized_pri / (normalized_dual + eps);

        (current_rho * ratio.sqrt()).max(self.rho_min).min(self.rho_max)
    }

    pub fn should_update(&self, current_rho: F, new_rho: F) -> bool {
        new_rho > current_rho * self.tolerance || new_rho < current_rho / self.tolerance
    }

    /// Switch to `new_rho` and refactor the KKT matrix.
    pub fn update_rho(&self, cache: &mut AdmmCache<F>, new_rho: F, sigma: F) -> bool {
        cache.rho = new_rho;
        cache.update_rho_vec();
        cache.factorize(sigma)
    }
}
