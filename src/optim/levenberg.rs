//! Levenberg-Marquardt iteration for root-finding and least squares

use nalgebra::{DMatrix, DVector};

use super::jacobian::jacobian;
use super::newton::solve_linear;
use super::{NonlinearSolver, OptimError, Solution};

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 0.1;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e10;

/// Levenberg-Marquardt solver on the damped normal equations
///
/// Interpolates between Newton and gradient descent by damping
/// `(J^T J + lambda I) dx = -J^T r`. Accepts rectangular systems with more
/// residuals than unknowns, in which case it converges to the least-squares
/// minimizer; the converged residual norm is reported in the solution so the
/// caller can distinguish a true root from a least-squares fit.
///
/// # Note
/// A stationary point (vanishing gradient `J^T r`) counts as converged even
/// when the residual itself is not zero. Re-running from such a point
/// returns it unchanged.
#[derive(Debug, Clone)]
pub struct LevenbergMarquardt {
    tolerance: f64,
    max_iterations: usize,
}

impl LevenbergMarquardt {
    pub fn new() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 100,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self::new()
    }
}

impl NonlinearSolver for LevenbergMarquardt {
    fn solve(
        &self,
        f: &mut dyn FnMut(&DVector<f64>) -> DVector<f64>,
        x0: &DVector<f64>,
    ) -> Result<Solution, OptimError> {
        let n = x0.len();
        if n == 0 {
            return Err(OptimError::EmptyGuess);
        }

        let mut x = x0.clone();
        let mut fx = f(&x);
        if fx.len() < n {
            return Err(OptimError::DimensionMismatch {
                residuals: fx.len(),
                unknowns: n,
            });
        }

        let mut res_norm = fx.norm();
        let mut lambda = LAMBDA_INIT;
        let identity = DMatrix::<f64>::identity(n, n);

        for iter in 0..self.max_iterations {
            if !res_norm.is_finite() {
                return Err(OptimError::NonFinite);
            }
            if res_norm < self.tolerance {
                return Ok(Solution {
                    x,
                    residual_norm: res_norm,
                    iterations: iter,
                });
            }

            let jac = jacobian(f, &x);
            let grad = jac.transpose() * &fx;

            // Stationary point of the squared residual: least-squares minimum
            if grad.norm() < self.tolerance * (1.0 + res_norm) {
                return Ok(Solution {
                    x,
                    residual_norm: res_norm,
                    iterations: iter,
                });
            }

            let jtj = jac.transpose() * &jac;
            let mut stepped = false;

            while lambda <= LAMBDA_MAX {
                let damped = &jtj + lambda * &identity;
                let dx = match solve_linear(&damped, &(-&grad)) {
                    Some(dx) => dx,
                    None => {
                        lambda *= LAMBDA_UP;
                        continue;
                    }
                };

                let x_try = &x + &dx;
                let f_try = f(&x_try);
                let norm_try = f_try.norm();

                if norm_try.is_finite() && norm_try < res_norm {
                    x = x_try;
                    fx = f_try;
                    res_norm = norm_try;
                    lambda = (lambda * LAMBDA_DOWN).max(LAMBDA_MIN);
                    stepped = true;
                    break;
                }

                // Tiny rejected steps mean the current point is as good as
                // the quadratic model gets
                if dx.norm() < 1e-14 * (1.0 + x.norm()) {
                    return Ok(Solution {
                        x,
                        residual_norm: res_norm,
                        iterations: iter,
                    });
                }

                lambda *= LAMBDA_UP;
            }

            if !stepped {
                return Err(OptimError::ConvergenceFailure {
                    iterations: iter + 1,
                    residual: res_norm,
                });
            }
        }

        if res_norm < self.tolerance {
            return Ok(Solution {
                x,
                residual_norm: res_norm,
                iterations: self.max_iterations,
            });
        }

        Err(OptimError::ConvergenceFailure {
            iterations: self.max_iterations,
            residual: res_norm,
        })
    }
}
