#![allow(non_snake_case)]

use log::{debug, trace};
use nalgebra::{DVector, RealField, Scalar, SimdRealField, convert};

use crate::qp::SolverStatus;
use crate::rho::RhoAdapter;
use crate::solver::{AdmmSolver, INFTY};

/// Largest absolute entry, zero for an empty vector.
pub(crate) fn inf_norm<F>(v: &DVector<F>) -> F
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    v.abs().max()
}

impl<F> AdmmSolver<F>
where
    F: Scalar + Copy + SimdRealField + RealField,
{
    /// Solve the reduced KKT system for the next primal candidate
    pub(crate) fn update_xt(&mut self) {
        let rhs = self.work.x_prev.scale(self.settings.sigma) - &self.problem.q
            + &self.cache.At
                * (self.cache.rho_vec.component_mul(&self.work.z_prev) - &self.work.y);
        if let Some(kkt) = &self.cache.kkt {
            self.work.xt = kkt.solve(&rhs);
        }
        self.work.zt = &self.cache.A * &self.work.xt;
    }

    /// Relax the primal candidate and project the slack into `[l, u]`
    pub(crate) fn update_slack(&mut self) {
        let alpha = self.settings.alpha;
        let beta = F::one() - alpha;

        self.work.x = self.work.xt.scale(alpha) + self.work.x_prev.scale(beta);

        // Relaxed slack, kept in zt for the dual update
        self.work.zt = self.work.zt.scale(alpha) + self.work.z_prev.scale(beta);
        self.work.z = &self.work.zt + self.work.y.component_div(&self.cache.rho_vec);
        self.work
            .z
            .zip_zip_apply(&self.cache.l, &self.cache.u, |z, min, max| {
                *z = (*z).clamp(min, max)
            });
    }

    /// Update next iteration of dual variables by performing the augmented lagrangian multiplier update
    pub(crate) fn update_dual(&mut self) {
        let step = (&self.work.zt - &self.work.z).component_mul(&self.cache.rho_vec);
        self.work.y += &step;
        self.work.delta_y = step;
        self.work.delta_x = &self.work.x - &self.work.x_prev;
    }

    /// Recompute the products shared by residuals and rho adaptation
    pub(crate) fn update_products(&mut self) {
        self.work.Ax = &self.cache.A * &self.work.x;
        self.work.Px = &self.cache.P * &self.work.x;
        self.work.Aty = &self.cache.At * &self.work.y;
    }

    /// Check for termination condition by evaluating whether the largest absolute primal and dual residuals are below threshold.
    pub(crate) fn termination_condition(&mut self) -> bool {
        self.work.primal_residual = inf_norm(&(&self.work.Ax - &self.work.z));
        self.work.dual_residual =
            inf_norm(&(&self.work.Px + &self.problem.q + &self.work.Aty));

        let eps_prim = self.settings.eps_abs
            + self.settings.eps_rel * inf_norm(&self.work.Ax).max(inf_norm(&self.work.z));
        let eps_dual = self.settings.eps_abs
            + self.settings.eps_rel
                * inf_norm(&self.work.Px)
                    .max(inf_norm(&self.work.Aty))
                    .max(inf_norm(&self.problem.q));

        self.work.primal_residual <= eps_prim && self.work.dual_residual <= eps_dual
    }

    /// Whether the last dual step certifies that no feasible point exists.
    pub(crate) fn primal_infeasible(&self) -> bool {
        let eps = self.settings.eps_prim_inf;
        let infty: F = convert(INFTY);
        let zero = F::zero();

        // Project delta_y onto the polar of the recession cone of [l, u]
        let mut dy = self.work.delta_y.clone();
        for i in 0..dy.len() {
            let upper_inf = self.cache.u[i] >= infty;
            let lower_inf = self.cache.l[i] <= -infty;
            if upper_inf && lower_inf {
                dy[i] = zero;
            } else if upper_inf {
                dy[i] = dy[i].min(zero);
            } else if lower_inf {
                dy[i] = dy[i].max(zero);
            }
        }

        let norm = inf_norm(&dy);
        if norm <= eps {
            return false;
        }

        let mut support = zero;
        for i in 0..dy.len() {
            support += self.cache.u[i] * dy[i].max(zero) + self.cache.l[i] * dy[i].min(zero);
        }
        if support >= -eps * norm {
            return false;
        }

        inf_norm(&(&self.cache.At * &dy)) < eps * norm
    }

    /// Whether the last primal step certifies an unbounded objective.
    pub(crate) fn dual_infeasible(&self) -> bool {
        let eps = self.settings.eps_dual_inf;
        let infty: F = convert(INFTY);
        let dx = &self.work.delta_x;

        let norm = inf_norm(dx);
        if norm <= eps {
            return false;
        }
        if self.problem.q.dot(dx) >= -eps * norm {
            return false;
        }
        if inf_norm(&(&self.cache.P * dx)) >= eps * norm {
            return false;
        }

        let Adx = &self.cache.A * dx;
        (0..Adx.len()).all(|i| {
            let below_upper = self.cache.u[i] >= infty || Adx[i] <= eps * norm;
            let above_lower = self.cache.l[i] <= -infty || Adx[i] >= -eps * norm;
            below_upper && above_lower
        })
    }

    pub(crate) fn admm_solve(&mut self) {
        // Initialize variables
        self.work.status = SolverStatus::MaxIterations;
        self.work.iter = 0;

        // Setup for adaptive rho
        let adapter = RhoAdapter {
            rho_min: self.settings.rho_min,
            rho_max: self.settings.rho_max,
            tolerance: self.settings.adaptive_rho_tolerance,
        };

        for i in 0..self.settings.max_iter {
            // Store previous values for residuals
            self.work.x_prev.copy_from(&self.work.x);
            self.work.z_prev.copy_from(&self.work.z);

            self.update_xt();

            // Project slack variables into feasible domain
            self.update_slack();

            // Compute next iteration of dual variables
            self.update_dual();

            self.work.iter += 1;

            let check = self.work.iter.is_multiple_of(self.settings.check_termination.max(1));
            let adapt = self.settings.adaptive_rho
                && i > 0
                && self.work.iter.is_multiple_of(self.settings.adaptive_rho_interval.max(1));

            if check || adapt {
                self.update_products();
            }

            if check {
                if self.termination_condition() {
                    self.work.status = SolverStatus::Optimal;
                    debug!("Solver converged in {} iterations", self.work.iter);
                    return;
                }
                if self.primal_infeasible() {
                    self.work.status = SolverStatus::Infeasible;
                    debug!("Primal infeasibility detected after {} iterations", self.work.iter);
                    return;
                }
                if self.dual_infeasible() {
                    self.work.status = SolverStatus::Unbounded;
                    debug!("Dual infeasibility detected after {} iterations", self.work.iter);
                    return;
                }
            }

            if adapt {
                let residuals = adapter.compute_residuals(self);
                let new_rho = adapter.predict_rho(&residuals, self.cache.rho);
                trace!("rho {} -> {} at iteration {}", self.cache.rho, new_rho, self.work.iter);
                if adapter.should_update(self.cache.rho, new_rho) {
                    self.factorizations += 1;
                    if !adapter.update_rho(&mut self.cache, new_rho, self.settings.sigma) {
                        self.work.status = SolverStatus::NonConvex;
                        return;
                    }
                }
            }
        }

        debug!(
            "Solver stopped at the iteration limit: primal {} dual {}",
            self.work.primal_residual, self.work.dual_residual
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csc::{CscMatrix, upper_triangular};
    use crate::qp::QpSolver;
    use crate::solver::AdmmSettings;
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, dmatrix, dvector};

    fn tight() -> AdmmSolver<f64> {
        let mut settings = AdmmSettings::default();
        settings.update(1e-7, 1e-7, 20000, 1);
        AdmmSolver::with_settings(settings)
    }

    #[test]
    fn box_constrained_quadratic() {
        // min (x0 - 2)^2 + (x1 + 1)^2, 0 <= x <= 1
        let mut solver = tight();
        solver
            .set_quadratic_term(&upper_triangular(&dmatrix![2.0, 0.0; 0.0, 2.0]))
            .unwrap();
        solver.set_linear_term(&dvector![-4.0, 2.0]).unwrap();
        solver.set_constraint_matrix(&CscMatrix::identity(2)).unwrap();
        solver.set_bounds(&dvector![0.0, 0.0], &dvector![1.0, 1.0]).unwrap();

        let sol = solver.solve().unwrap();
        assert_eq!(sol.status, SolverStatus::Optimal);
        assert_relative_eq!(sol.x[0], 1.0, epsilon = 1e-4);
        assert_relative_eq!(sol.x[1], 0.0, epsilon = 1e-4);
        assert_relative_eq!(sol.objective, -3.0, epsilon = 1e-3);
    }

    #[test]
    fn equality_constrained_quadratic() {
        // min x0^2 + x1^2 s.t. x0 + x1 = 1
        let mut solver = tight();
        let P = DMatrix::<f64>::identity(2, 2).scale(2.0);
        solver.set_quadratic_term(&upper_triangular(&P)).unwrap();
        solver.set_linear_term(&dvector![0.0, 0.0]).unwrap();
        solver.set_constraint_matrix(&CscMatrix::from(&dmatrix![1.0, 1.0])).unwrap();
        solver.set_bounds(&dvector![1.0], &dvector![1.0]).unwrap();

        let sol = solver.solve().unwrap();
        assert!(sol.is_optimal());
        assert_relative_eq!(sol.x[0], 0.5, epsilon = 1e-4);
        assert_relative_eq!(sol.x[1], 0.5, epsilon = 1e-4);
    }

    #[test]
    fn detects_primal_infeasibility() {
        // x = 1 and x <= 0
        let mut solver = AdmmSolver::<f64>::new();
        solver.set_quadratic_term(&upper_triangular(&dmatrix![2.0])).unwrap();
        solver.set_linear_term(&dvector![0.0]).unwrap();
        solver.set_constraint_matrix(&CscMatrix::from(&dmatrix![1.0; 1.0])).unwrap();
        solver
            .set_bounds(&dvector![1.0, f64::NEG_INFINITY], &dvector![1.0, 0.0])
            .unwrap();

        let sol = solver.solve().unwrap();
        assert_eq!(sol.status, SolverStatus::Infeasible);
    }

    #[test]
    fn detects_unbounded_objective() {
        // min -x, x >= 0
        let mut solver = AdmmSolver::<f64>::new();
        solver.set_quadratic_term(&CscMatrix::zeros(1, 1)).unwrap();
        solver.set_linear_term(&dvector![-1.0]).unwrap();
        solver.set_constraint_matrix(&CscMatrix::identity(1)).unwrap();
        solver.set_bounds(&dvector![0.0], &dvector![f64::INFINITY]).unwrap();

        let sol = solver.solve().unwrap();
        assert_eq!(sol.status, SolverStatus::Unbounded);
    }

    #[test]
    fn bounds_update_keeps_factorization() {
        let mut solver = tight();
        solver.set_quadratic_term(&upper_triangular(&dmatrix![2.0])).unwrap();
        solver.set_linear_term(&dvector![-2.0]).unwrap();
        solver.set_constraint_matrix(&CscMatrix::identity(1)).unwrap();
        solver.settings.adaptive_rho = false;

        solver.set_bounds(&dvector![-5.0], &dvector![5.0]).unwrap();
        assert_relative_eq!(solver.solve().unwrap().x[0], 1.0, epsilon = 1e-4);
        let factorizations = solver.get_num_factorizations();

        solver.set_bounds(&dvector![-5.0], &dvector![0.5]).unwrap();
        assert_relative_eq!(solver.solve().unwrap().x[0], 0.5, epsilon = 1e-4);
        assert_eq!(solver.get_num_factorizations(), factorizations);
    }

    #[test]
    fn indefinite_quadratic_is_non_convex() {
        let mut solver = AdmmSolver::<f64>::new();
        solver.set_quadratic_term(&upper_triangular(&dmatrix![-1.0])).unwrap();
        solver.set_linear_term(&dvector![0.0]).unwrap();
        solver.set_constraint_matrix(&CscMatrix::zeros(0, 1)).unwrap();
        solver.set_bounds(&DVector::zeros(0), &DVector::zeros(0)).unwrap();

        assert_eq!(solver.solve().unwrap().status, SolverStatus::NonConvex);
    }

    #[test]
    fn malformed_problem_is_an_error() {
        let mut solver = AdmmSolver::<f64>::new();
        solver.set_quadratic_term(&CscMatrix::identity(2)).unwrap();
        solver.set_linear_term(&dvector![0.0]).unwrap();
        assert!(solver.solve().is_err());
    }
}
