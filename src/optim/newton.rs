//! Damped Newton iteration for square residual systems

use nalgebra::{DMatrix, DVector};

use super::jacobian::jacobian;
use super::{NonlinearSolver, OptimError, Solution};

/// Newton root-finder with step halving
///
/// Solves `R(x) = 0` for square systems. The Jacobian is recomputed every
/// iteration by central differences and the linear update is solved by LU
/// with an SVD fallback. When a full Newton step increases the residual the
/// step is halved a few times before being accepted, which keeps the
/// iteration from overshooting on strongly nonlinear residuals.
///
/// # Note
/// The residual tolerance applies to the 2-norm of `R`. Callers with their
/// own acceptance thresholds should inspect [`Solution::residual_norm`].
#[derive(Debug, Clone)]
pub struct NewtonRaphson {
    tolerance: f64,
    max_iterations: usize,
    max_halvings: usize,
}

impl NewtonRaphson {
    pub fn new() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 50,
            max_halvings: 6,
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

impl Default for NewtonRaphson {
    fn default() -> Self {
        Self::new()
    }
}

impl NonlinearSolver for NewtonRaphson {
    fn solve(
        &self,
        f: &mut dyn FnMut(&DVector<f64>) -> DVector<f64>,
        x0: &DVector<f64>,
    ) -> Result<Solution, OptimError> {
        if x0.is_empty() {
            return Err(OptimError::EmptyGuess);
        }

        let mut x = x0.clone();
        let mut fx = f(&x);
        if fx.len() != x.len() {
            return Err(OptimError::DimensionMismatch {
                residuals: fx.len(),
                unknowns: x.len(),
            });
        }

        let mut res_norm = fx.norm();

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
            let dx = solve_linear(&jac, &(-&fx)).ok_or(OptimError::SingularMatrix)?;

            // Step halving: back off while the residual grows
            let mut scale = 1.0;
            let mut accepted = false;
            for _ in 0..=self.max_halvings {
                let x_try = &x + scale * &dx;
                let f_try = f(&x_try);
                let norm_try = f_try.norm();

                if norm_try.is_finite() && norm_try < res_norm {
                    x = x_try;
                    fx = f_try;
                    res_norm = norm_try;
                    accepted = true;
                    break;
                }
                scale *= 0.5;
            }

            if !accepted {
                // Full and damped steps all diverged
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

/// LU solve with an SVD fallback for poorly conditioned systems
///
/// The SVD path returns a least-squares vector for any matrix, so its result
/// only counts when it actually solves the system; otherwise the matrix is
/// singular with an inconsistent right-hand side and the solve reports
/// `None`.
pub(crate) fn solve_linear(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(x) = a.clone().lu().solve(b) {
        if x.iter().all(|v| v.is_finite()) {
            return Some(x);
        }
    }
    let x = a.clone().svd(true, true).solve(b, 1e-10).ok()?;
    if (a * &x - b).norm() <= 1e-10 * (1.0 + b.norm()) {
        Some(x)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_newton_scalar_root() {
        // x^2 - 2 = 0
        let solver = NewtonRaphson::new();
        let mut f = |x: &DVector<f64>| DVector::from_vec(vec![x[0] * x[0] - 2.0]);

        let sol = solver
            .solve(&mut f, &DVector::from_vec(vec![1.0]))
            .unwrap();
        assert_relative_eq!(sol.x[0], 2.0_f64.sqrt(), epsilon = 1e-8);
    }

    #[test]
    fn test_newton_coupled_system() {
        // x^2 + y^2 = 4, x - y = 0 -> x = y = sqrt(2)
        let solver = NewtonRaphson::new();
        let mut f = |x: &DVector<f64>| {
            DVector::from_vec(vec![x[0] * x[0] + x[1] * x[1] - 4.0, x[0] - x[1]])
        };

        let sol = solver
            .solve(&mut f, &DVector::from_vec(vec![1.0, 2.0]))
            .unwrap();
        assert_relative_eq!(sol.x[0], 2.0_f64.sqrt(), epsilon = 1e-8);
        assert_relative_eq!(sol.x[1], 2.0_f64.sqrt(), epsilon = 1e-8);
    }

    #[test]
    fn test_newton_reports_failure() {
        // x^2 + 1 = 0 has no real root
        let solver = NewtonRaphson::new().with_max_iterations(20);
        let mut f = |x: &DVector<f64>| DVector::from_vec(vec![x[0] * x[0] + 1.0]);

        let result = solver.solve(&mut f, &DVector::from_vec(vec![3.0]));
        assert!(result.is_err());
    }

    #[test]
    fn test_solve_linear_rejects_inconsistent_singular_system() {
        // A zero matrix cannot reproduce a nonzero right-hand side; the SVD
        // fallback's least-squares vector must not be passed off as a
        // solution
        let a = DMatrix::<f64>::zeros(2, 2);
        let b = DVector::from_vec(vec![1.0, 1.0]);
        assert!(solve_linear(&a, &b).is_none());

        // A singular but consistent system is solvable through the fallback
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 0.0]);
        let b = DVector::from_vec(vec![3.0, 0.0]);
        let x = solve_linear(&a, &b).unwrap();
        assert_relative_eq!(x[0], 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_newton_rejects_rectangular_system() {
        let solver = NewtonRaphson::new();
        let mut f = |x: &DVector<f64>| DVector::from_vec(vec![x[0], x[0] + 1.0]);

        let result = solver.solve(&mut f, &DVector::from_vec(vec![0.0]));
        assert!(matches!(
            result,
            Err(OptimError::DimensionMismatch { .. })
        ));
    }
}
