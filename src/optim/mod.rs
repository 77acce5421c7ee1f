//! Nonlinear root-finding and constrained optimization
//!
//! The stepping drivers never solve their implicit update equations directly;
//! they build a residual closure and hand it to a [`NonlinearSolver`]. This
//! keeps the correction strategy swappable (Newton for well-conditioned square
//! systems, Levenberg-Marquardt for stiff starts and least-squares blocks)
//! without touching the driver loops. The cable-shape solvers use the
//! [`Sqp`](sqp::Sqp) constrained minimizer from the same module family.

pub mod jacobian;
pub mod levenberg;
pub mod newton;
pub mod sqp;

pub use jacobian::{gradient, jacobian, jacobian_at};
pub use levenberg::LevenbergMarquardt;
pub use newton::NewtonRaphson;
pub use sqp::{ConstrainedSolution, Sqp};

use nalgebra::DVector;
use thiserror::Error;

/// Errors reported by the nonlinear layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimError {
    /// Initial guess has zero length
    #[error("empty initial guess")]
    EmptyGuess,

    /// Residual length differs from the unknown count where a square system
    /// is required
    #[error("residual has {residuals} rows for {unknowns} unknowns")]
    DimensionMismatch { residuals: usize, unknowns: usize },

    /// Iteration budget exhausted without meeting the residual tolerance
    #[error("no convergence after {iterations} iterations (residual norm {residual:.3e})")]
    ConvergenceFailure { iterations: usize, residual: f64 },

    /// Linear solve inside the iteration failed
    #[error("singular iteration matrix")]
    SingularMatrix,

    /// A residual or objective evaluation produced NaN or infinity
    #[error("non-finite value during iteration")]
    NonFinite,
}

/// Converged output of a [`NonlinearSolver`]
#[derive(Debug, Clone)]
pub struct Solution {
    /// Solution vector
    pub x: DVector<f64>,
    /// Residual norm at the solution
    pub residual_norm: f64,
    /// Iterations consumed
    pub iterations: usize,
}

/// Root-finder interface for residual systems `R(x) = 0`
///
/// Implementations must treat `f` as a black box and report the final
/// residual norm so callers can apply their own acceptance thresholds.
pub trait NonlinearSolver {
    fn solve(
        &self,
        f: &mut dyn FnMut(&DVector<f64>) -> DVector<f64>,
        x0: &DVector<f64>,
    ) -> Result<Solution, OptimError>;
}

/// Correction strategy selector carried by the driver options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Corrector {
    /// Damped Newton iteration (default)
    #[default]
    Newton,
    /// Levenberg-Marquardt iteration
    LevenbergMarquardt,
}

impl Corrector {
    /// Build the configured solver
    pub fn build(self, tolerance: f64, max_iterations: usize) -> Box<dyn NonlinearSolver> {
        match self {
            Corrector::Newton => Box::new(
                NewtonRaphson::new()
                    .with_tolerance(tolerance)
                    .with_max_iterations(max_iterations),
            ),
            Corrector::LevenbergMarquardt => Box::new(
                LevenbergMarquardt::new()
                    .with_tolerance(tolerance)
                    .with_max_iterations(max_iterations),
            ),
        }
    }
}
