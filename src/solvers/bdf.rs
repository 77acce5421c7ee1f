//! Backward Differentiation Formula (BDF) multistep driver
//!
//! Implicit fixed-step integration of `M(y, t) * y' = f(y, t)` at orders
//! 1-6. Multistep methods need a history window; the driver bootstraps it by
//! stepping through the sub-orders 1, 2, ..., k-1 while history accumulates,
//! so no separate startup method is involved.
//!
//! # Stability
//!
//! - Orders 1-2 are A-stable
//! - Orders 3-6 are A(alpha)-stable with a narrowing wedge
//!   (alpha roughly 86, 73, 51, 18 degrees)
//!
//! BDF6's wedge is narrow enough that it is provided mainly for completeness.
//!
//! # Step bisection
//!
//! A corrector failure does not abort the run immediately: the offending step
//! is retried as 2, 4, 8, ... sub-steps of the nominal step, landing exactly
//! back on the sample grid, and only the on-grid sample is recorded. The
//! history window then carries non-uniform spacings for a few steps, which
//! the formula coefficients are recomputed for.
//!
//! # References
//!
//! - Hairer, E., & Wanner, G. (1996). "Solving Ordinary Differential
//!   Equations II: Stiff and Differential-Algebraic Problems". Springer.

use std::collections::VecDeque;

use log::{debug, warn};
use nalgebra::DVector;

use super::{
    bdf_coefficients, bdf_coefficients_for_spacing, check_mass_shape, step_count, SolverError,
    TimeGrid,
};
use crate::mass::MassSpec;
use crate::monitor::{NoMonitor, StepMonitor};
use crate::optim::{Corrector, NonlinearSolver, OptimError};
use crate::trajectory::Trajectory;

/// Offsets within this distance of a whole number count as uniform spacing
const UNIFORM_OFFSET_TOL: f64 = 1e-9;

/// Configuration for [`bdf`]
#[derive(Debug)]
pub struct BdfOptions {
    max_order: usize,
    max_step: Option<f64>,
    mass: MassSpec,
    corrector: Corrector,
    tolerance: f64,
    max_iterations: usize,
    max_bisections: u32,
}

impl BdfOptions {
    pub fn new() -> Self {
        Self {
            max_order: 5,
            max_step: None,
            mass: MassSpec::Identity,
            corrector: Corrector::default(),
            tolerance: 1e-10,
            max_iterations: 50,
            max_bisections: 4,
        }
    }

    /// Method order, `1..=6`; rejected (never clamped) when out of range
    pub fn with_max_order(mut self, max_order: usize) -> Self {
        self.max_order = max_order;
        self
    }

    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = Some(max_step);
        self
    }

    pub fn with_mass(mut self, mass: MassSpec) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_corrector(mut self, corrector: Corrector) -> Self {
        self.corrector = corrector;
        self
    }

    /// Residual norm the corrector must reach for a step to be accepted
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Bisection retry budget; `b` allows sub-steps down to `h / 2^b`
    pub fn with_max_bisections(mut self, max_bisections: u32) -> Self {
        self.max_bisections = max_bisections;
        self
    }
}

impl Default for BdfOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Integrate `M(y, t) * y' = f(y, t)` with a fixed-order BDF method
///
/// # Characteristics
/// - Orders 1-6, fixed per run, ramping through the lower sub-orders while
///   the history window fills
/// - Implicit; each step solves the corrector equation through the
///   configured root-finder, seeded by an explicit Euler predictor
/// - Failed steps are retried with bounded step bisection before the run is
///   abandoned
///
/// On failure the partial trajectory is discarded and the error identifies
/// the offending step.
pub fn bdf<F>(
    rhs: F,
    grid: TimeGrid,
    y0: &DVector<f64>,
    options: &BdfOptions,
) -> Result<Trajectory, SolverError>
where
    F: FnMut(&DVector<f64>, f64) -> DVector<f64>,
{
    bdf_monitored(rhs, grid, y0, options, &mut NoMonitor)
}

/// [`bdf`] with a [`StepMonitor`] observing every recorded sample
///
/// The monitor sees `init` with the resolved span, one `step` call per
/// on-grid sample after the initial state, and `done` when the run ends.
/// Returning `false` from `step` ends the run normally with the trajectory
/// accumulated so far.
pub fn bdf_monitored<F, M>(
    mut rhs: F,
    grid: TimeGrid,
    y0: &DVector<f64>,
    options: &BdfOptions,
    monitor: &mut M,
) -> Result<Trajectory, SolverError>
where
    F: FnMut(&DVector<f64>, f64) -> DVector<f64>,
    M: StepMonitor + ?Sized,
{
    bdf_coefficients(options.max_order)?;
    let (t0, tf, h) = grid.resolve(options.max_step)?;

    let n = y0.len();
    if n == 0 {
        return Err(SolverError::DimensionMismatch {
            context: "initial state",
            found: 0,
            expected: 1,
        });
    }
    if y0.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::NonFinite { step: 0, t: t0 });
    }
    let f0 = rhs(y0, t0);
    if f0.len() != n {
        return Err(SolverError::DimensionMismatch {
            context: "rhs output",
            found: f0.len(),
            expected: n,
        });
    }
    check_mass_shape(&options.mass, y0, &DVector::zeros(n), t0)?;

    let solver = options
        .corrector
        .build(options.tolerance, options.max_iterations);
    let ctx = StepContext {
        mass: &options.mass,
        solver: solver.as_ref(),
        tolerance: options.tolerance,
        max_order: options.max_order,
    };

    let mut trajectory = Trajectory::with_expected_steps(step_count(t0, tf, h) + 1, n);
    trajectory.push(t0, y0.clone());
    monitor.init(t0, tf, y0);

    let mut history: VecDeque<(f64, DVector<f64>)> = VecDeque::with_capacity(options.max_order);
    history.push_front((t0, y0.clone()));

    let mut t = t0;
    let mut step_index = 0usize;
    let mut ramped = options.max_order == 1;

    while t < tf - 0.5 * h {
        step_index += 1;
        let t_next = t0 + step_index as f64 * h;

        let y_next = match take_step(&mut rhs, &ctx, &history, t_next, h) {
            Ok(y) => {
                push_history(&mut history, options.max_order, t_next, y.clone());
                y
            }
            Err(StepError::Fatal(e)) => return Err(e),
            Err(StepError::Recoverable(residual)) => {
                warn!(
                    "bdf: corrector stalled at step {} (t = {:.6}), residual {:.3e}; bisecting",
                    step_index, t_next, residual
                );
                bisect(
                    &mut rhs,
                    &ctx,
                    &mut history,
                    t,
                    t_next,
                    step_index,
                    options.max_bisections,
                    residual,
                )?
            }
        };

        if y_next.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::NonFinite {
                step: step_index,
                t: t_next,
            });
        }
        if !ramped && history.len() >= options.max_order {
            debug!(
                "bdf: history window filled, running at order {}",
                options.max_order
            );
            ramped = true;
        }

        let keep_going = monitor.step(t_next, &y_next);
        trajectory.push(t_next, y_next);
        t = t_next;
        if !keep_going {
            break;
        }
    }

    trajectory.finish();
    monitor.done();
    Ok(trajectory)
}

struct StepContext<'a> {
    mass: &'a MassSpec,
    solver: &'a dyn NonlinearSolver,
    tolerance: f64,
    max_order: usize,
}

enum StepError {
    /// Corrector failed; worth retrying at a smaller step
    Recoverable(f64),
    /// Structural failure that bisection cannot fix
    Fatal(SolverError),
}

/// Advance one step from the newest history point to `t_next`
///
/// The effective order is the history length, capped at the configured
/// order, which yields the ramp-up sub-orders for free. `h_sub` is the
/// spacing unit the window offsets are measured in.
fn take_step<F>(
    rhs: &mut F,
    ctx: &StepContext<'_>,
    history: &VecDeque<(f64, DVector<f64>)>,
    t_next: f64,
    h_sub: f64,
) -> Result<DVector<f64>, StepError>
where
    F: FnMut(&DVector<f64>, f64) -> DVector<f64>,
{
    let order = ctx.max_order.min(history.len());
    let (t_curr, y_curr) = &history[0];
    let n = y_curr.len();
    let zero_v = DVector::zeros(n);

    let mut offsets = Vec::with_capacity(order);
    for (t_j, _) in history.iter().take(order) {
        offsets.push((t_next - t_j) / h_sub);
    }
    let uniform = offsets
        .iter()
        .enumerate()
        .all(|(j, &s)| (s - (j + 1) as f64).abs() < UNIFORM_OFFSET_TOL);
    let (k, w) = if uniform {
        let (k, w) = bdf_coefficients(order).map_err(StepError::Fatal)?;
        (k.to_vec(), w)
    } else {
        bdf_coefficients_for_spacing(order, &offsets).map_err(StepError::Fatal)?
    };

    let mut weighted = DVector::zeros(n);
    for (k_j, (_, y_j)) in k.iter().zip(history.iter()) {
        weighted += *k_j * y_j;
    }

    // Explicit Euler predictor from the newest history point
    let f_curr = rhs(y_curr, *t_curr);
    let ydot = ctx
        .mass
        .try_solve(&f_curr, y_curr, &zero_v, *t_curr)
        .ok_or(StepError::Fatal(SolverError::SingularMass { t: *t_curr }))?;
    let y_pred = y_curr + h_sub * ydot;

    // The mass matrix can be frozen for the whole corrector unless it
    // depends on the state
    let mass = ctx.mass;
    let mass_fixed = if mass.is_state_dependent() {
        None
    } else {
        Some(mass.evaluate(y_curr, &zero_v, t_next))
    };

    let mut residual = |y: &DVector<f64>| -> DVector<f64> {
        let f = rhs(y, t_next);
        let core = y - &weighted;
        let lhs = if let MassSpec::Identity = mass {
            core
        } else if let Some(m) = &mass_fixed {
            m * core
        } else {
            mass.evaluate(y, &zero_v, t_next) * core
        };
        lhs - w * h_sub * f
    };

    match ctx.solver.solve(&mut residual, &y_pred) {
        Ok(sol) if sol.residual_norm <= ctx.tolerance => Ok(sol.x),
        Ok(sol) => Err(StepError::Recoverable(sol.residual_norm)),
        Err(OptimError::ConvergenceFailure { residual, .. }) => {
            Err(StepError::Recoverable(residual))
        }
        Err(_) => Err(StepError::Recoverable(f64::INFINITY)),
    }
}

/// Retry the step `t -> t_next` as `2^b` sub-steps for growing `b`
///
/// On success the history window (including the off-grid sub-steps) replaces
/// the caller's and the state at `t_next` is returned; the trajectory only
/// ever records the on-grid sample. The nominal step is untouched, so the
/// run continues on the original grid.
#[allow(clippy::too_many_arguments)]
fn bisect<F>(
    rhs: &mut F,
    ctx: &StepContext<'_>,
    history: &mut VecDeque<(f64, DVector<f64>)>,
    t: f64,
    t_next: f64,
    step_index: usize,
    max_bisections: u32,
    first_residual: f64,
) -> Result<DVector<f64>, SolverError>
where
    F: FnMut(&DVector<f64>, f64) -> DVector<f64>,
{
    let h = t_next - t;
    let mut last_residual = first_residual;

    for b in 1..=max_bisections {
        let pieces = 1usize << b;
        let h_sub = h / pieces as f64;
        let mut scratch = history.clone();
        let mut failed = false;

        for i in 1..=pieces {
            // Land exactly on the grid sample at the end of the walk
            let target = if i == pieces {
                t_next
            } else {
                t + i as f64 * h_sub
            };
            match take_step(rhs, ctx, &scratch, target, h_sub) {
                Ok(y) => push_history(&mut scratch, ctx.max_order, target, y),
                Err(StepError::Fatal(e)) => return Err(e),
                Err(StepError::Recoverable(residual)) => {
                    last_residual = residual;
                    failed = true;
                    break;
                }
            }
        }

        if !failed {
            debug!(
                "bdf: step {} recovered with {} sub-steps",
                step_index, pieces
            );
            let y_next = scratch[0].1.clone();
            *history = scratch;
            return Ok(y_next);
        }
    }

    Err(SolverError::ConvergenceFailure {
        step: step_index,
        t: t_next,
        residual: last_residual,
    })
}

fn push_history(
    history: &mut VecDeque<(f64, DVector<f64>)>,
    max_order: usize,
    t: f64,
    y: DVector<f64>,
) {
    while history.len() >= max_order {
        history.pop_back();
    }
    history.push_front((t, y));
}
