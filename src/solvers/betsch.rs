//! Energy-consistent constrained (DAE) driver
//!
//! Integrates second-order mechanical systems
//! `M(q, v, t) * a = f(q, v, t) + J_phi^T * lambda + J_psi^T * mu` subject to
//! holonomic constraints `phi(q, t) = 0` and nonholonomic (velocity-level)
//! constraints `psi(q, t) * v = 0`.
//!
//! Each step solves implicitly for the next position together with both
//! multiplier blocks; the holonomic residual is evaluated at the *next*
//! sample, so the constraint is enforced there directly and cannot drift the
//! way index-reduced formulations do. Velocity follows from the
//! central-difference identity `v_next = 2/h * (q_next - q_n) - v_n`.
//! The holonomic Jacobian entering the force term is taken at the geometric
//! midpoint of the step, which is what makes the scheme energy-consistent
//! for quadratic constraints.
//!
//! # References
//! - Betsch & Steinmann, "Conservation properties of a time FE method",
//!   Part III: constrained mechanical systems (2002)

use log::{debug, warn};
use nalgebra::DVector;

use super::{check_mass_shape, step_count, SolverError, TimeGrid};
use crate::constraints::ConstraintSet;
use crate::mass::MassSpec;
use crate::monitor::{NoMonitor, StepMonitor};
use crate::optim::{Corrector, LevenbergMarquardt, NonlinearSolver, OptimError};
use crate::trajectory::DaeTrajectory;

/// Analytic-vs-finite-difference Jacobian deviation that triggers a warning
const JACOBIAN_WARN_TOL: f64 = 1e-4;

/// Configuration for [`betsch`]
#[derive(Debug)]
pub struct BetschOptions {
    max_step: Option<f64>,
    mass: MassSpec,
    constraints: ConstraintSet,
    corrector: Corrector,
    tolerance: f64,
    max_iterations: usize,
    max_bisections: u32,
    ic_tolerance: f64,
}

impl BetschOptions {
    pub fn new() -> Self {
        Self {
            max_step: None,
            mass: MassSpec::Identity,
            constraints: ConstraintSet::default(),
            corrector: Corrector::default(),
            tolerance: 1e-10,
            max_iterations: 50,
            max_bisections: 4,
            ic_tolerance: 1e-8,
        }
    }

    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = Some(max_step);
        self
    }

    pub fn with_mass(mut self, mass: MassSpec) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_constraints(mut self, constraints: ConstraintSet) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_corrector(mut self, corrector: Corrector) -> Self {
        self.corrector = corrector;
        self
    }

    /// Residual norm below which a step is accepted
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Bisection retries before a stalled step becomes an error
    pub fn with_max_bisections(mut self, max_bisections: u32) -> Self {
        self.max_bisections = max_bisections;
        self
    }

    /// Constraint violation allowed in the supplied initial state
    pub fn with_ic_tolerance(mut self, ic_tolerance: f64) -> Self {
        self.ic_tolerance = ic_tolerance;
        self
    }
}

impl Default for BetschOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Multipliers balancing the applied force at the initial state
///
/// Solves the static balance `f(q0, v0, t0) + J_phi^T * lambda + J_psi^T * mu
/// = 0` for the multiplier blocks in the least-squares sense, after checking
/// that `(q0, v0)` satisfy the constraints themselves to `tolerance`. The
/// returned residual norm is the force imbalance that remains; it is zero
/// only when the initial state is a static equilibrium of the constrained
/// system, and a nonzero value is normal for a moving start.
///
/// The problem is linear in the multipliers, so re-running the solve on a
/// state it already produced returns the same multipliers.
pub fn consistent_multipliers<F>(
    mut rhs: F,
    constraints: &ConstraintSet,
    q0: &DVector<f64>,
    v0: &DVector<f64>,
    t0: f64,
    tolerance: f64,
) -> Result<(DVector<f64>, DVector<f64>, f64), SolverError>
where
    F: FnMut(&DVector<f64>, &DVector<f64>, f64) -> DVector<f64>,
{
    let n = q0.len();
    if v0.len() != n {
        return Err(SolverError::DimensionMismatch {
            context: "initial velocity",
            found: v0.len(),
            expected: n,
        });
    }

    let phi0 = constraints.phi(q0, t0);
    let g = phi0.len();
    let jphi0 = constraints.phi_jacobian(q0, t0);
    if jphi0.nrows() != g {
        return Err(SolverError::DimensionMismatch {
            context: "holonomic constraint Jacobian rows",
            found: jphi0.nrows(),
            expected: g,
        });
    }
    if jphi0.ncols() != n {
        return Err(SolverError::DimensionMismatch {
            context: "holonomic constraint Jacobian columns",
            found: jphi0.ncols(),
            expected: n,
        });
    }
    let psi0 = constraints.psi(q0, t0);
    let m = psi0.nrows();
    if psi0.ncols() != n {
        return Err(SolverError::DimensionMismatch {
            context: "nonholonomic constraint matrix columns",
            found: psi0.ncols(),
            expected: n,
        });
    }

    let position_residual = phi0.norm();
    if position_residual > tolerance {
        return Err(SolverError::InconsistentInitialState {
            residual: position_residual,
            tolerance,
        });
    }
    let velocity_residual = (&psi0 * v0).norm();
    if velocity_residual > tolerance {
        return Err(SolverError::InconsistentInitialState {
            residual: velocity_residual,
            tolerance,
        });
    }

    if g + m == 0 {
        return Ok((DVector::zeros(0), DVector::zeros(0), 0.0));
    }
    if g + m > n {
        return Err(SolverError::DimensionMismatch {
            context: "constraint multiplier block",
            found: g + m,
            expected: n,
        });
    }

    let f0 = rhs(q0, v0, t0);
    let jphi_t = jphi0.transpose();
    let jpsi_t = psi0.transpose();

    // Linear in the multipliers; Levenberg-Marquardt lands on the
    // least-squares solution and reports whatever imbalance remains
    let mut residual = |z: &DVector<f64>| -> DVector<f64> {
        let mut r = -&f0;
        if g > 0 {
            r -= &jphi_t * z.rows(0, g);
        }
        if m > 0 {
            r -= &jpsi_t * z.rows(g, m);
        }
        r
    };

    let solver = LevenbergMarquardt::new();
    let sol = solver
        .solve(&mut residual, &DVector::zeros(g + m))
        .map_err(|err| match err {
            OptimError::NonFinite => SolverError::NonFinite { step: 0, t: t0 },
            OptimError::ConvergenceFailure { residual, .. } => SolverError::ConvergenceFailure {
                step: 0,
                t: t0,
                residual,
            },
            _ => SolverError::ConvergenceFailure {
                step: 0,
                t: t0,
                residual: f64::INFINITY,
            },
        })?;

    // The remaining imbalance is the net force driving the initial
    // acceleration, so its norm is no acceptance test. Convergence is judged
    // in multiplier space instead: at the least-squares solution the
    // imbalance is orthogonal to the constraint rows, and a stalled solve
    // leaves a gradient behind. Rounding caps how small the gradient can get
    // when the imbalance is nonzero, hence the square-root scale
    let imbalance = residual(&sol.x);
    let mut gradient = DVector::zeros(g + m);
    if g > 0 {
        gradient.rows_mut(0, g).copy_from(&(&jphi0 * &imbalance));
    }
    if m > 0 {
        gradient.rows_mut(g, m).copy_from(&(&psi0 * &imbalance));
    }
    if gradient.norm() > tolerance.sqrt() * (1.0 + imbalance.norm()) {
        return Err(SolverError::ConvergenceFailure {
            step: 0,
            t: t0,
            residual: imbalance.norm(),
        });
    }

    debug!(
        "betsch: consistent multipliers settled, force imbalance {:.3e}",
        sol.residual_norm
    );
    Ok((
        sol.x.rows(0, g).into_owned(),
        sol.x.rows(g, m).into_owned(),
        sol.residual_norm,
    ))
}

/// Integrate a constrained mechanical system
///
/// `rhs` is the applied force `f(q, v, t)` without the constraint forces;
/// those enter through the multipliers. The initial state must satisfy the
/// constraints to `ic_tolerance`; the multipliers at `t0` come from
/// [`consistent_multipliers`].
pub fn betsch<F>(
    rhs: F,
    grid: TimeGrid,
    q0: &DVector<f64>,
    v0: &DVector<f64>,
    options: &BetschOptions,
) -> Result<DaeTrajectory, SolverError>
where
    F: FnMut(&DVector<f64>, &DVector<f64>, f64) -> DVector<f64>,
{
    betsch_monitored(rhs, grid, q0, v0, options, &mut NoMonitor)
}

/// [`betsch`] with a [`StepMonitor`] observing the position at every
/// recorded sample
pub fn betsch_monitored<F, M>(
    mut rhs: F,
    grid: TimeGrid,
    q0: &DVector<f64>,
    v0: &DVector<f64>,
    options: &BetschOptions,
    monitor: &mut M,
) -> Result<DaeTrajectory, SolverError>
where
    F: FnMut(&DVector<f64>, &DVector<f64>, f64) -> DVector<f64>,
    M: StepMonitor + ?Sized,
{
    let (t0, tf, h) = grid.resolve(options.max_step)?;

    let n = q0.len();
    if n == 0 {
        return Err(SolverError::DimensionMismatch {
            context: "initial position",
            found: 0,
            expected: 1,
        });
    }
    if v0.len() != n {
        return Err(SolverError::DimensionMismatch {
            context: "initial velocity",
            found: v0.len(),
            expected: n,
        });
    }
    if q0.iter().chain(v0.iter()).any(|x| !x.is_finite()) {
        return Err(SolverError::NonFinite { step: 0, t: t0 });
    }
    let f0 = rhs(q0, v0, t0);
    if f0.len() != n {
        return Err(SolverError::DimensionMismatch {
            context: "rhs output",
            found: f0.len(),
            expected: n,
        });
    }
    check_mass_shape(&options.mass, q0, v0, t0)?;

    if let Some(deviation) = options.constraints.jacobian_deviation(q0, t0) {
        if deviation > JACOBIAN_WARN_TOL {
            warn!(
                "betsch: analytic constraint Jacobian deviates from finite differences by {:.3e}",
                deviation
            );
        }
    }

    let (lambda0, mu0, _) = consistent_multipliers(
        &mut rhs,
        &options.constraints,
        q0,
        v0,
        t0,
        options.ic_tolerance,
    )?;
    let g = lambda0.len();
    let m = mu0.len();

    let solver = options.corrector.build(options.tolerance, options.max_iterations);
    let ctx = DaeContext {
        mass: &options.mass,
        constraints: &options.constraints,
        solver: solver.as_ref(),
        tolerance: options.tolerance,
        holonomic: g,
        nonholonomic: m,
    };

    let mut trajectory =
        DaeTrajectory::with_expected_steps(step_count(t0, tf, h) + 1, 2 * n + g + m);
    trajectory.push(t0, q0.clone(), v0.clone(), lambda0.clone(), mu0.clone());
    monitor.init(t0, tf, q0);

    let mut q = q0.clone();
    let mut v = v0.clone();
    let mut lambda = lambda0;
    let mut mu = mu0;
    let mut t = t0;
    let mut step_index = 0usize;

    while t < tf - 0.5 * h {
        step_index += 1;
        let t_next = t0 + step_index as f64 * h;

        let step = match betsch_step(&mut rhs, &ctx, &q, &v, t, h, t_next, &lambda, &mu) {
            Ok(step) => step,
            Err(residual) => {
                warn!(
                    "betsch: corrector stalled at step {} (t = {:.6}), residual {:.3e}; bisecting",
                    step_index, t_next, residual
                );
                bisect(
                    &mut rhs,
                    &ctx,
                    &q,
                    &v,
                    &lambda,
                    &mu,
                    t,
                    t_next,
                    step_index,
                    options.max_bisections,
                    residual,
                )?
            }
        };

        if step
            .q
            .iter()
            .chain(step.v.iter())
            .any(|x| !x.is_finite())
        {
            return Err(SolverError::NonFinite {
                step: step_index,
                t: t_next,
            });
        }

        let keep_going = monitor.step(t_next, &step.q);
        trajectory.push(
            t_next,
            step.q.clone(),
            step.v.clone(),
            step.lambda.clone(),
            step.mu.clone(),
        );
        q = step.q;
        v = step.v;
        lambda = step.lambda;
        mu = step.mu;
        t = t_next;
        if !keep_going {
            break;
        }
    }

    trajectory.finish();
    monitor.done();
    Ok(trajectory)
}

/// Shared per-run pieces of a step attempt
struct DaeContext<'a> {
    mass: &'a MassSpec,
    constraints: &'a ConstraintSet,
    solver: &'a dyn NonlinearSolver,
    tolerance: f64,
    holonomic: usize,
    nonholonomic: usize,
}

/// Accepted values of one step
struct BetschStep {
    q: DVector<f64>,
    v: DVector<f64>,
    lambda: DVector<f64>,
    mu: DVector<f64>,
}

/// Advance one step; `Err` carries the residual norm of the stalled solve
#[allow(clippy::too_many_arguments)]
fn betsch_step<F>(
    rhs: &mut F,
    ctx: &DaeContext<'_>,
    q_n: &DVector<f64>,
    v_n: &DVector<f64>,
    t_n: f64,
    h: f64,
    t_next: f64,
    lambda_guess: &DVector<f64>,
    mu_guess: &DVector<f64>,
) -> Result<BetschStep, f64>
where
    F: FnMut(&DVector<f64>, &DVector<f64>, f64) -> DVector<f64>,
{
    let n = q_n.len();
    let g = ctx.holonomic;
    let m = ctx.nonholonomic;
    let t_mid = t_n + 0.5 * h;

    // Frozen at the current state for the whole solve
    let mass_n = match ctx.mass {
        MassSpec::Identity => None,
        other => Some(other.evaluate(q_n, v_n, t_n)),
    };
    let jpsi_n = if m > 0 {
        Some(ctx.constraints.psi(q_n, t_n))
    } else {
        None
    };

    let mut residual = |z: &DVector<f64>| -> DVector<f64> {
        let q = z.rows(0, n).into_owned();
        let dq = &q - q_n;
        let v_next = (2.0 / h) * &dq - v_n;
        let accel = (2.0 / (h * h)) * &dq - (2.0 / h) * v_n;
        let f = rhs(&q, &v_next, t_next);

        let mut momentum = match &mass_n {
            Some(mat) => mat * accel,
            None => accel,
        };
        momentum -= f;
        if g > 0 {
            let q_mid = 0.5 * (q_n + &q);
            let jphi = ctx.constraints.phi_jacobian(&q_mid, t_mid);
            momentum -= jphi.transpose() * z.rows(n, g);
        }
        if let Some(jpsi) = &jpsi_n {
            momentum -= jpsi.transpose() * z.rows(n + g, m);
        }

        let mut r = DVector::zeros(n + g + m);
        r.rows_mut(0, n).copy_from(&momentum);
        if g > 0 {
            r.rows_mut(n, g)
                .copy_from(&ctx.constraints.phi(&q, t_next));
        }
        if let Some(jpsi) = &jpsi_n {
            r.rows_mut(n + g, m).copy_from(&(jpsi * dq));
        }
        r
    };

    // Drift prediction for the position, previous multipliers as warm start
    let mut z0 = DVector::zeros(n + g + m);
    z0.rows_mut(0, n).copy_from(&(q_n + h * v_n));
    if g > 0 {
        z0.rows_mut(n, g).copy_from(lambda_guess);
    }
    if m > 0 {
        z0.rows_mut(n + g, m).copy_from(mu_guess);
    }

    match ctx.solver.solve(&mut residual, &z0) {
        Ok(sol) if sol.residual_norm <= ctx.tolerance => {
            let q = sol.x.rows(0, n).into_owned();
            let v = (2.0 / h) * (&q - q_n) - v_n;
            Ok(BetschStep {
                v,
                lambda: sol.x.rows(n, g).into_owned(),
                mu: sol.x.rows(n + g, m).into_owned(),
                q,
            })
        }
        Ok(sol) => Err(sol.residual_norm),
        Err(OptimError::ConvergenceFailure { residual, .. }) => Err(residual),
        Err(_) => Err(f64::INFINITY),
    }
}

/// Retry a stalled step as a walk of shorter sub-steps
///
/// The scheme is single-step, so the walk just chains states; only the
/// on-grid endpoint is recorded by the caller. The last sub-target is forced
/// to `t_next` exactly so recorded times stay on the nominal grid.
#[allow(clippy::too_many_arguments)]
fn bisect<F>(
    rhs: &mut F,
    ctx: &DaeContext<'_>,
    q_n: &DVector<f64>,
    v_n: &DVector<f64>,
    lambda_n: &DVector<f64>,
    mu_n: &DVector<f64>,
    t: f64,
    t_next: f64,
    step_index: usize,
    max_bisections: u32,
    first_residual: f64,
) -> Result<BetschStep, SolverError>
where
    F: FnMut(&DVector<f64>, &DVector<f64>, f64) -> DVector<f64>,
{
    let h = t_next - t;
    let mut last_residual = first_residual;

    for b in 1..=max_bisections {
        let pieces = 1usize << b;
        let h_sub = h / pieces as f64;

        let mut q = q_n.clone();
        let mut v = v_n.clone();
        let mut lambda = lambda_n.clone();
        let mut mu = mu_n.clone();
        let mut t_sub = t;
        let mut completed = true;

        for i in 1..=pieces {
            let target = if i == pieces {
                t_next
            } else {
                t + i as f64 * h_sub
            };
            match betsch_step(rhs, ctx, &q, &v, t_sub, target - t_sub, target, &lambda, &mu) {
                Ok(step) => {
                    q = step.q;
                    v = step.v;
                    lambda = step.lambda;
                    mu = step.mu;
                    t_sub = target;
                }
                Err(residual) => {
                    last_residual = residual;
                    completed = false;
                    break;
                }
            }
        }

        if completed {
            debug!(
                "betsch: step {} recovered with {} sub-steps",
                step_index, pieces
            );
            return Ok(BetschStep { q, v, lambda, mu });
        }
    }

    Err(SolverError::ConvergenceFailure {
        step: step_index,
        t: t_next,
        residual: last_residual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pendulum_constraints() -> ConstraintSet {
        ConstraintSet::default()
            .with_holonomic(|q: &DVector<f64>, _t| {
                DVector::from_vec(vec![q[0] * q[0] + q[1] * q[1] - 1.0])
            })
            .with_holonomic_jacobian(|q: &DVector<f64>, _t| {
                nalgebra::DMatrix::from_row_slice(1, 2, &[2.0 * q[0], 2.0 * q[1]])
            })
    }

    fn gravity(_q: &DVector<f64>, _v: &DVector<f64>, _t: f64) -> DVector<f64> {
        DVector::from_vec(vec![0.0, -9.81])
    }

    #[test]
    fn test_free_particle_moves_linearly() {
        let options = BetschOptions::new();
        let traj = betsch(
            |_q: &DVector<f64>, _v: &DVector<f64>, _t: f64| DVector::zeros(1),
            TimeGrid::span(0.0, 1.0),
            &DVector::from_vec(vec![0.0]),
            &DVector::from_vec(vec![2.0]),
            &options,
        )
        .unwrap();

        let (t, q, v) = traj.last().unwrap();
        assert_relative_eq!(t, 1.0, epsilon = 1e-12);
        assert_relative_eq!(q[0], 2.0, epsilon = 1e-8);
        assert_relative_eq!(v[0], 2.0, epsilon = 1e-8);
        assert_eq!(traj.lambda[0].len(), 0);
    }

    #[test]
    fn test_constant_force_matches_kinematics() {
        let options = BetschOptions::new().with_max_step(0.01);
        let traj = betsch(
            |_q: &DVector<f64>, _v: &DVector<f64>, _t: f64| DVector::from_vec(vec![-9.81]),
            TimeGrid::span(0.0, 0.1),
            &DVector::from_vec(vec![10.0]),
            &DVector::from_vec(vec![0.0]),
            &options,
        )
        .unwrap();

        // The scheme reproduces uniform acceleration exactly
        let (_, q, v) = traj.last().unwrap();
        assert_relative_eq!(q[0], 10.0 - 0.5 * 9.81 * 0.01, epsilon = 1e-9);
        assert_relative_eq!(v[0], -0.981, epsilon = 1e-9);
    }

    #[test]
    fn test_pendulum_constraint_stays_satisfied() {
        let options = BetschOptions::new()
            .with_max_step(0.01)
            .with_constraints(pendulum_constraints());
        let traj = betsch(
            gravity,
            TimeGrid::span(0.0, 2.0),
            &DVector::from_vec(vec![0.0, -1.0]),
            &DVector::from_vec(vec![1.0, 0.0]),
            &options,
        )
        .unwrap();

        assert_eq!(traj.len(), 201);
        for q in &traj.position {
            let violation = (q[0] * q[0] + q[1] * q[1] - 1.0).abs();
            assert!(violation < 1e-6, "constraint drifted to {violation}");
        }
    }

    #[test]
    fn test_inconsistent_start_is_rejected() {
        let options = BetschOptions::new().with_constraints(pendulum_constraints());
        let result = betsch(
            gravity,
            TimeGrid::span(0.0, 1.0),
            &DVector::from_vec(vec![1.1, 0.0]),
            &DVector::from_vec(vec![0.0, 0.0]),
            &options,
        );

        match result {
            Err(SolverError::InconsistentInitialState { residual, .. }) => {
                assert_relative_eq!(residual, 1.1 * 1.1 - 1.0, epsilon = 1e-12);
            }
            other => panic!("expected inconsistent-state error, got {other:?}"),
        }
    }

    #[test]
    fn test_consistent_multipliers_balance_gravity() {
        // Pendulum hanging at rest: the cable tension carries the weight
        let constraints = pendulum_constraints();
        let (lambda, mu, residual) = consistent_multipliers(
            gravity,
            &constraints,
            &DVector::from_vec(vec![0.0, -1.0]),
            &DVector::from_vec(vec![0.0, 0.0]),
            0.0,
            1e-8,
        )
        .unwrap();

        assert_eq!(mu.len(), 0);
        assert_relative_eq!(lambda[0], -9.81 / 2.0, epsilon = 1e-6);
        assert!(residual < 1e-8);
    }

    #[test]
    fn test_consistent_multipliers_off_equilibrium_start() {
        // Pendulum at rest 45 degrees off the bottom: the multiplier carries
        // the radial gravity component and the remaining imbalance is the
        // tangential component that accelerates the swing. The solve must
        // accept this imbalance (it is the initial net force, not a stalled
        // iteration) and still report multipliers orthogonal to it.
        let constraints = pendulum_constraints();
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let q0 = DVector::from_vec(vec![s, -s]);
        let v0 = DVector::zeros(2);

        let (lambda, _mu, residual) =
            consistent_multipliers(gravity, &constraints, &q0, &v0, 0.0, 1e-8).unwrap();

        // Radial projection: lambda = -g * s / 2, imbalance = tangential g
        assert_relative_eq!(lambda[0], -9.81 * s / 2.0, epsilon = 1e-6);
        assert_relative_eq!(residual, 9.81 * s, epsilon = 1e-6);
    }

    #[test]
    fn test_swinging_start_recovers_weight_multiplier() {
        // A dead multiplier solve once returned lambda = 0 with the whole
        // 9.81 N imbalance left in place; the gravity balance must come out
        // through the multiplier instead
        let constraints = pendulum_constraints();
        let (lambda, _, residual) = consistent_multipliers(
            gravity,
            &constraints,
            &DVector::from_vec(vec![0.0, -1.0]),
            &DVector::from_vec(vec![1.0, 0.0]),
            0.0,
            1e-8,
        )
        .unwrap();

        assert_relative_eq!(lambda[0], -9.81 / 2.0, epsilon = 1e-6);
        assert!(residual < 1e-6, "imbalance {residual} not resolved");
    }

    #[test]
    fn test_nonholonomic_plane_is_enforced() {
        // Velocity-level constraint v_z = 0 under gravity: the particle
        // slides horizontally and mu carries the support force
        let constraints = ConstraintSet::default().with_nonholonomic(|q: &DVector<f64>, _t| {
            nalgebra::DMatrix::from_row_slice(1, q.len(), &[0.0, 1.0])
        });
        let options = BetschOptions::new()
            .with_max_step(0.1)
            .with_constraints(constraints);
        let traj = betsch(
            gravity,
            TimeGrid::span(0.0, 1.0),
            &DVector::from_vec(vec![0.0, 0.0]),
            &DVector::from_vec(vec![1.0, 0.0]),
            &options,
        )
        .unwrap();

        let (_, q, v) = traj.last().unwrap();
        assert_relative_eq!(q[0], 1.0, epsilon = 1e-6);
        assert!(q[1].abs() < 1e-8);
        assert_relative_eq!(v[0], 1.0, epsilon = 1e-6);
        let mu_last = traj.mu.last().unwrap();
        assert_relative_eq!(mu_last[0], 9.81, epsilon = 1e-6);
    }
}
