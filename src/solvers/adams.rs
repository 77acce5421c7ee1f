//! Adams-Bashforth explicit multistep driver
//!
//! Fixed-step explicit integration of `M(y, t) * y' = f(y, t)` at orders
//! 1-5, built on a history of derivative evaluations rather than states.
//! The window ramps through the sub-orders 1, 2, ..., k-1 exactly like the
//! implicit driver. Explicit methods have no corrector to retry, so there is
//! no bisection here; a state going non-finite surfaces as an error.

use std::collections::VecDeque;

use log::debug;
use nalgebra::DVector;

use super::{adams_coefficients, check_mass_shape, step_count, SolverError, TimeGrid};
use crate::mass::MassSpec;
use crate::monitor::{NoMonitor, StepMonitor};
use crate::trajectory::Trajectory;

/// Configuration for [`adams`]
#[derive(Debug)]
pub struct AdamsOptions {
    max_order: usize,
    max_step: Option<f64>,
    mass: MassSpec,
}

impl AdamsOptions {
    pub fn new() -> Self {
        Self {
            max_order: 3,
            max_step: None,
            mass: MassSpec::Identity,
        }
    }

    /// Method order, `1..=5`; rejected (never clamped) when out of range
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
}

impl Default for AdamsOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Integrate `M(y, t) * y' = f(y, t)` with a fixed-order Adams-Bashforth
/// method
///
/// # Characteristics
/// - Orders 1-5, fixed per run, ramping through the lower sub-orders while
///   the derivative window fills
/// - Explicit; one right-hand-side evaluation (plus a mass solve) per step
/// - Order 1 is the forward Euler method
pub fn adams<F>(
    rhs: F,
    grid: TimeGrid,
    y0: &DVector<f64>,
    options: &AdamsOptions,
) -> Result<Trajectory, SolverError>
where
    F: FnMut(&DVector<f64>, f64) -> DVector<f64>,
{
    adams_monitored(rhs, grid, y0, options, &mut NoMonitor)
}

/// [`adams`] with a [`StepMonitor`] observing every recorded sample
pub fn adams_monitored<F, M>(
    mut rhs: F,
    grid: TimeGrid,
    y0: &DVector<f64>,
    options: &AdamsOptions,
    monitor: &mut M,
) -> Result<Trajectory, SolverError>
where
    F: FnMut(&DVector<f64>, f64) -> DVector<f64>,
    M: StepMonitor + ?Sized,
{
    adams_coefficients(options.max_order)?;
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
    let zero_v = DVector::zeros(n);
    check_mass_shape(&options.mass, y0, &zero_v, t0)?;

    let mut trajectory = Trajectory::with_expected_steps(step_count(t0, tf, h) + 1, n);
    trajectory.push(t0, y0.clone());
    monitor.init(t0, tf, y0);

    // Window of derivatives, most recent first
    let ydot0 = options
        .mass
        .try_solve(&f0, y0, &zero_v, t0)
        .ok_or(SolverError::SingularMass { t: t0 })?;
    let mut derivatives: VecDeque<DVector<f64>> = VecDeque::with_capacity(options.max_order);
    derivatives.push_front(ydot0);

    let mut y = y0.clone();
    let mut t = t0;
    let mut step_index = 0usize;
    let mut ramped = options.max_order == 1;

    while t < tf - 0.5 * h {
        step_index += 1;
        let t_next = t0 + step_index as f64 * h;

        let order = options.max_order.min(derivatives.len());
        let b = adams_coefficients(order)?;

        let mut increment = DVector::zeros(n);
        for (b_j, ydot_j) in b.iter().zip(derivatives.iter()) {
            increment += *b_j * ydot_j;
        }
        let y_next = &y + h * increment;

        if y_next.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::NonFinite {
                step: step_index,
                t: t_next,
            });
        }

        let f_next = rhs(&y_next, t_next);
        let ydot_next = options
            .mass
            .try_solve(&f_next, &y_next, &zero_v, t_next)
            .ok_or(SolverError::SingularMass { t: t_next })?;
        while derivatives.len() >= options.max_order {
            derivatives.pop_back();
        }
        derivatives.push_front(ydot_next);

        if !ramped && derivatives.len() >= options.max_order {
            debug!(
                "adams: derivative window filled, running at order {}",
                options.max_order
            );
            ramped = true;
        }

        let keep_going = monitor.step(t_next, &y_next);
        trajectory.push(t_next, y_next.clone());
        y = y_next;
        t = t_next;
        if !keep_going {
            break;
        }
    }

    trajectory.finish();
    monitor.done();
    Ok(trajectory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn decay(y: &DVector<f64>, _t: f64) -> DVector<f64> {
        -y
    }

    #[test]
    fn test_order_1_is_forward_euler() {
        let options = AdamsOptions::new().with_max_order(1).with_max_step(0.1);
        let traj = adams(
            decay,
            TimeGrid::span(0.0, 0.2),
            &DVector::from_vec(vec![1.0]),
            &options,
        )
        .unwrap();

        assert_relative_eq!(traj.state[1][0], 0.9, epsilon = 1e-12);
        assert_relative_eq!(traj.state[2][0], 0.81, epsilon = 1e-12);
    }

    #[test]
    fn test_order_3_decay_accuracy() {
        let options = AdamsOptions::new().with_max_order(3).with_max_step(1e-3);
        let traj = adams(
            decay,
            TimeGrid::span(0.0, 1.0),
            &DVector::from_vec(vec![1.0]),
            &options,
        )
        .unwrap();

        let (t_last, y_last) = traj.last().unwrap();
        assert_relative_eq!(t_last, 1.0, epsilon = 1e-9);
        assert_relative_eq!(y_last[0], (-1.0_f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn test_order_out_of_range_is_rejected() {
        let y0 = DVector::from_vec(vec![1.0]);
        for bad in [0usize, 6] {
            let options = AdamsOptions::new().with_max_order(bad);
            assert!(matches!(
                adams(decay, TimeGrid::span(0.0, 1.0), &y0, &options),
                Err(SolverError::InvalidOrder { order, .. }) if order == bad
            ));
        }
    }

    #[test]
    fn test_non_finite_state_is_surfaced() {
        let options = AdamsOptions::new().with_max_order(2).with_max_step(0.1);
        let result = adams(
            |y: &DVector<f64>, _t: f64| y.map(|_| f64::NAN),
            TimeGrid::span(0.0, 1.0),
            &DVector::from_vec(vec![1.0]),
            &options,
        );
        assert!(matches!(result, Err(SolverError::NonFinite { step: 1, .. })));
    }

    #[test]
    fn test_monitor_stops_run_early() {
        let options = AdamsOptions::new().with_max_order(2).with_max_step(0.1);
        let mut monitor = |t: f64, _y: &DVector<f64>| t < 0.35;
        let traj = adams_monitored(
            decay,
            TimeGrid::span(0.0, 1.0),
            &DVector::from_vec(vec![1.0]),
            &options,
            &mut monitor,
        )
        .unwrap();

        let (t_last, _) = traj.last().unwrap();
        assert_relative_eq!(t_last, 0.4, epsilon = 1e-12);
    }
}
