// Model predictive control for linear dynamical systems

mod admm;
pub mod builder;
pub mod csc;
mod error;
pub mod gaussian;
pub mod mpc;
pub mod poisson;
pub mod qp;
mod rho;
pub mod solver;
pub mod system;

pub use builder::{Constraints, CostWeights, Horizon, QpBuilder, ReferenceKind};
pub use csc::CscMatrix;
pub use error::MpcError;
pub use gaussian::GaussianSystem;
pub use mpc::{CacheState, ControlOutput, Diagnostics, MpcController};
pub use poisson::PoissonSystem;
pub use qp::{QpProblem, QpSolver, Solution, SolverStatus};
pub use rho::{ResidualNorms, RhoAdapter};
pub use solver::{AdmmSettings, AdmmSolver};
pub use system::{Lds, System};
