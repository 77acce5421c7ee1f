//! Sequential quadratic programming for small constrained problems

use log::debug;
use nalgebra::{DMatrix, DVector};

use super::jacobian::{gradient, jacobian};
use super::newton::solve_linear;
use super::OptimError;

/// Result of a constrained minimization
#[derive(Debug, Clone)]
pub struct ConstrainedSolution {
    /// Minimizer
    pub x: DVector<f64>,
    /// Objective value at the minimizer
    pub objective: f64,
    /// Max-norm of the constraint violation at the minimizer
    pub constraint_violation: f64,
    /// Iterations consumed
    pub iterations: usize,
}

/// SQP minimizer with a BFGS Hessian approximation
///
/// Solves `min f(x)` subject to `ce(x) = 0` and `ci(x) >= 0`. Each iteration
/// linearizes the constraints, solves an equality-constrained QP over an
/// active set of the inequalities, and globalizes with a backtracking line
/// search on an L1 merit function. Derivatives are taken by central
/// differences; problem sizes here are a handful of unknowns, so the dense
/// KKT solves are cheap.
///
/// # References
/// - Nocedal, J., & Wright, S. J. (2006). "Numerical Optimization",
///   chapter 18 (SQP methods).
#[derive(Debug, Clone)]
pub struct Sqp {
    tolerance: f64,
    constraint_tolerance: f64,
    max_iterations: usize,
}

impl Sqp {
    pub fn new() -> Self {
        Self {
            tolerance: 1e-8,
            constraint_tolerance: 1e-8,
            max_iterations: 100,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_constraint_tolerance(mut self, constraint_tolerance: f64) -> Self {
        self.constraint_tolerance = constraint_tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Minimize `objective` subject to `equality(x) = 0` and
    /// `inequality(x) >= 0`
    ///
    /// An empty vector from either constraint closure means that constraint
    /// family is absent.
    pub fn solve(
        &self,
        objective: &mut dyn FnMut(&DVector<f64>) -> f64,
        equality: &mut dyn FnMut(&DVector<f64>) -> DVector<f64>,
        inequality: &mut dyn FnMut(&DVector<f64>) -> DVector<f64>,
        x0: &DVector<f64>,
    ) -> Result<ConstrainedSolution, OptimError> {
        let n = x0.len();
        if n == 0 {
            return Err(OptimError::EmptyGuess);
        }

        let mut x = x0.clone();
        let mut fx = objective(&x);
        let mut ce = equality(&x);
        let mut ci = inequality(&x);

        if !fx.is_finite() || ce.iter().any(|v| !v.is_finite()) || ci.iter().any(|v| !v.is_finite())
        {
            return Err(OptimError::NonFinite);
        }

        let mut hessian = DMatrix::<f64>::identity(n, n);
        let mut grad = gradient(objective, &x);
        let mut penalty = 1.0_f64;

        for iter in 0..self.max_iterations {
            let ae = jacobian(equality, &x);
            let ai = jacobian(inequality, &x);

            let (step, nu_e, nu_i) = qp_subproblem(&hessian, &grad, &ae, &ce, &ai, &ci)
                .ok_or(OptimError::SingularMatrix)?;

            let violation = violation_norm(&ce, &ci);
            if step.norm() <= self.tolerance * (1.0 + x.norm())
                && violation <= self.constraint_tolerance
            {
                debug!(
                    "sqp converged after {} iterations (violation {:.3e})",
                    iter, violation
                );
                return Ok(ConstrainedSolution {
                    x,
                    objective: fx,
                    constraint_violation: violation,
                    iterations: iter,
                });
            }

            // Penalty must dominate the multipliers for the merit function
            // to accept constraint-restoring steps
            let nu_max = nu_e
                .iter()
                .chain(nu_i.iter())
                .fold(0.0_f64, |acc, v| acc.max(v.abs()));
            penalty = penalty.max(2.0 * nu_max + 1.0);

            let merit_0 = fx + penalty * violation_l1(&ce, &ci);

            // Backtracking on the L1 merit function
            let mut alpha = 1.0;
            let mut accepted = false;
            for _ in 0..30 {
                let x_try = &x + alpha * &step;
                let f_try = objective(&x_try);
                let ce_try = equality(&x_try);
                let ci_try = inequality(&x_try);
                let merit_try = f_try + penalty * violation_l1(&ce_try, &ci_try);

                if merit_try.is_finite() && merit_try < merit_0 {
                    x = x_try;
                    fx = f_try;
                    ce = ce_try;
                    ci = ci_try;
                    accepted = true;
                    break;
                }
                alpha *= 0.5;
            }

            if !accepted {
                // No merit decrease in any direction the QP proposes: either
                // we are at the solution or the model broke down
                let violation = violation_norm(&ce, &ci);
                if violation <= self.constraint_tolerance {
                    return Ok(ConstrainedSolution {
                        x,
                        objective: fx,
                        constraint_violation: violation,
                        iterations: iter,
                    });
                }
                return Err(OptimError::ConvergenceFailure {
                    iterations: iter + 1,
                    residual: violation,
                });
            }

            // Damped BFGS update on the Lagrangian gradient difference
            let grad_new = gradient(objective, &x);
            let ae_new = jacobian(equality, &x);
            let ai_new = jacobian(inequality, &x);

            let lag_old = &grad - ae.transpose() * &nu_e - ai.transpose() * &nu_i;
            let lag_new = &grad_new - ae_new.transpose() * &nu_e - ai_new.transpose() * &nu_i;

            let s = alpha * &step;
            let y = lag_new - lag_old;
            let sy = s.dot(&y);
            if sy > 1e-10 * s.norm() * y.norm() {
                let bs = &hessian * &s;
                let sbs = s.dot(&bs);
                if sbs > 1e-16 {
                    hessian = hessian - (&bs * bs.transpose()) / sbs + (&y * y.transpose()) / sy;
                }
            }

            grad = grad_new;
        }

        let violation = violation_norm(&ce, &ci);
        Err(OptimError::ConvergenceFailure {
            iterations: self.max_iterations,
            residual: violation,
        })
    }
}

impl Default for Sqp {
    fn default() -> Self {
        Self::new()
    }
}

/// Max-norm constraint violation
fn violation_norm(ce: &DVector<f64>, ci: &DVector<f64>) -> f64 {
    let eq = ce.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let ineq = ci.iter().fold(0.0_f64, |acc, v| acc.max((-v).max(0.0)));
    eq.max(ineq)
}

/// L1 constraint violation used by the merit function
fn violation_l1(ce: &DVector<f64>, ci: &DVector<f64>) -> f64 {
    let eq: f64 = ce.iter().map(|v| v.abs()).sum();
    let ineq: f64 = ci.iter().map(|v| (-v).max(0.0)).sum();
    eq + ineq
}

/// Solve the QP `min 1/2 d'Bd + g'd` subject to the linearized constraints
/// with an active-set loop over the inequalities
///
/// Returns the step and the multipliers for the equality rows and (full)
/// inequality rows; inactive inequalities get zero multipliers.
fn qp_subproblem(
    hessian: &DMatrix<f64>,
    grad: &DVector<f64>,
    ae: &DMatrix<f64>,
    ce: &DVector<f64>,
    ai: &DMatrix<f64>,
    ci: &DVector<f64>,
) -> Option<(DVector<f64>, DVector<f64>, DVector<f64>)> {
    let n = grad.len();
    let me = ce.len();
    let mi = ci.len();
    let tol = 1e-10;

    // Start from the violated-or-active inequalities
    let mut working: Vec<usize> = (0..mi).filter(|&j| ci[j] <= tol).collect();

    for _ in 0..(2 * mi + 4) {
        let mw = working.len();
        let rows = me + mw;

        // Assemble the KKT system [B A'; A 0] [d; lam] = [-g; -c]
        let dim = n + rows;
        let mut kkt = DMatrix::<f64>::zeros(dim, dim);
        let mut rhs = DVector::<f64>::zeros(dim);

        kkt.view_mut((0, 0), (n, n)).copy_from(hessian);
        for i in 0..n {
            rhs[i] = -grad[i];
        }
        for r in 0..me {
            for c in 0..n {
                kkt[(n + r, c)] = ae[(r, c)];
                kkt[(c, n + r)] = ae[(r, c)];
            }
            rhs[n + r] = -ce[r];
        }
        for (w, &j) in working.iter().enumerate() {
            let r = me + w;
            for c in 0..n {
                kkt[(n + r, c)] = ai[(j, c)];
                kkt[(c, n + r)] = ai[(j, c)];
            }
            rhs[n + r] = -ci[j];
        }

        let sol = solve_linear(&kkt, &rhs)?;
        let d = DVector::from_iterator(n, (0..n).map(|i| sol[i]));

        // Stationarity gives B d + g = -A' lam, so nu = -lam carries the
        // usual KKT sign (active inequality multipliers nonnegative)
        let nu_e = DVector::from_iterator(me, (0..me).map(|r| -sol[n + r]));
        let mut nu_i = DVector::<f64>::zeros(mi);
        for (w, &j) in working.iter().enumerate() {
            nu_i[j] = -sol[n + me + w];
        }

        // Drop the working constraint with the most negative multiplier
        if let Some((pos, _)) = working
            .iter()
            .enumerate()
            .filter(|(_, &j)| nu_i[j] < -tol)
            .min_by(|(_, &a), (_, &b)| nu_i[a].total_cmp(&nu_i[b]))
        {
            working.remove(pos);
            continue;
        }

        // Add the most violated non-working constraint under the step
        let mut worst: Option<(usize, f64)> = None;
        for j in 0..mi {
            if working.contains(&j) {
                continue;
            }
            let value = ci[j] + ai.row(j).transpose().dot(&d);
            if value < -tol && worst.map_or(true, |(_, v)| value < v) {
                worst = Some((j, value));
            }
        }
        if let Some((j, _)) = worst {
            working.push(j);
            continue;
        }

        return Some((d, nu_e, nu_i));
    }

    None
}
