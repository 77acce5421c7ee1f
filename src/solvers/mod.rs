//! Fixed-step integration drivers
//!
//! Provides the stepping front-ends of the crate:
//! - Implicit BDF multistep driver, orders 1-6 (`bdf`)
//! - Constrained mechanical (DAE) driver with drift-free constraint
//!   enforcement (`betsch`)
//! - Explicit Adams-Bashforth multistep driver, orders 1-5 (`adams`)
//! - Leapfrog (kick-drift-kick) stepper for second-order systems (`leapfrog`)
//!
//! Shared plumbing lives here: the error type, time-grid resolution, and the
//! multistep coefficient tables (constant for uniform windows, recomputed
//! from the actual spacings after a bisection retry).

pub mod adams;
pub mod bdf;
pub mod betsch;
pub mod leapfrog;

pub use adams::{adams, adams_monitored, AdamsOptions};
pub use bdf::{bdf, bdf_monitored, BdfOptions};
pub use betsch::{betsch, betsch_monitored, consistent_multipliers, BetschOptions};
pub use leapfrog::{leapfrog, leapfrog_monitored, LeapfrogOptions};

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Fraction of the span used as the default step when none is given
const DEFAULT_SPAN_FRACTION: f64 = 0.1;

/// Relative tolerance for an explicit grid to count as uniform
const UNIFORM_GRID_RTOL: f64 = 1e-9;

/// Integration driver errors
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Order {order} outside supported range {min}..={max}")]
    InvalidOrder { order: usize, min: usize, max: usize },

    #[error("Invalid time grid: {0}")]
    InvalidTimeGrid(String),

    #[error("Step size must be positive and finite, got {0}")]
    InvalidStep(f64),

    #[error("{context}: dimension {found} does not match expected {expected}")]
    DimensionMismatch {
        context: &'static str,
        found: usize,
        expected: usize,
    },

    #[error("Corrector did not converge at step {step} (t = {t}): residual {residual:.3e}")]
    ConvergenceFailure { step: usize, t: f64, residual: f64 },

    #[error(
        "Initial state violates the constraints: residual {residual:.3e} exceeds tolerance {tolerance:.1e}"
    )]
    InconsistentInitialState { residual: f64, tolerance: f64 },

    #[error("State became non-finite at step {step} (t = {t})")]
    NonFinite { step: usize, t: f64 },

    #[error("Mass matrix is singular at t = {t}")]
    SingularMass { t: f64 },
}

/// Integration interval, either a span or an explicit uniform grid
///
/// The drivers are fixed-step, so an explicit grid must be uniformly spaced;
/// it then carries its own step and any `max_step` option is ignored.
#[derive(Debug, Clone)]
pub enum TimeGrid {
    /// Closed interval `[t0, tf]`
    Span { t0: f64, tf: f64 },
    /// Explicit sample times, strictly increasing and uniformly spaced
    Points(Vec<f64>),
}

impl TimeGrid {
    pub fn span(t0: f64, tf: f64) -> Self {
        TimeGrid::Span { t0, tf }
    }

    pub fn points(times: Vec<f64>) -> Self {
        TimeGrid::Points(times)
    }

    /// Resolve to `(t0, tf, h)`, validating the grid
    ///
    /// For a span the step comes from `max_step`, defaulting to a tenth of
    /// the span, and is clamped so a single step never overshoots the
    /// interval.
    pub(crate) fn resolve(&self, max_step: Option<f64>) -> Result<(f64, f64, f64), SolverError> {
        match self {
            TimeGrid::Span { t0, tf } => {
                if !t0.is_finite() || !tf.is_finite() || tf <= t0 {
                    return Err(SolverError::InvalidTimeGrid(format!(
                        "span [{}, {}] is not a forward interval",
                        t0, tf
                    )));
                }
                let span = tf - t0;
                let h = match max_step {
                    Some(h) if !h.is_finite() || h <= 0.0 => {
                        return Err(SolverError::InvalidStep(h))
                    }
                    Some(h) => h.min(span),
                    None => DEFAULT_SPAN_FRACTION * span,
                };
                Ok((*t0, *tf, h))
            }
            TimeGrid::Points(times) => {
                if times.len() < 2 {
                    return Err(SolverError::InvalidTimeGrid(
                        "an explicit grid needs at least two points".into(),
                    ));
                }
                if times.iter().any(|t| !t.is_finite()) {
                    return Err(SolverError::InvalidTimeGrid(
                        "grid contains a non-finite time".into(),
                    ));
                }
                if times.windows(2).any(|w| w[1] <= w[0]) {
                    return Err(SolverError::InvalidTimeGrid(
                        "grid times must be strictly increasing".into(),
                    ));
                }
                let first = times[0];
                let last = times[times.len() - 1];
                let h = (last - first) / (times.len() - 1) as f64;
                if times
                    .windows(2)
                    .any(|w| ((w[1] - w[0]) - h).abs() > UNIFORM_GRID_RTOL * h)
                {
                    return Err(SolverError::InvalidTimeGrid(
                        "explicit grid is not uniformly spaced".into(),
                    ));
                }
                Ok((first, last, h))
            }
        }
    }
}

impl From<(f64, f64)> for TimeGrid {
    fn from(span: (f64, f64)) -> Self {
        TimeGrid::Span {
            t0: span.0,
            tf: span.1,
        }
    }
}

impl From<Vec<f64>> for TimeGrid {
    fn from(times: Vec<f64>) -> Self {
        TimeGrid::Points(times)
    }
}

/// Number of steps a fixed-step driver takes over `[t0, tf]` with step `h`
pub(crate) fn step_count(t0: f64, tf: f64, h: f64) -> usize {
    (((tf - t0) / h).round() as usize).max(1)
}

/// Fail fast when a non-identity mass matrix is not `n x n`
pub(crate) fn check_mass_shape(
    mass: &crate::mass::MassSpec,
    y0: &DVector<f64>,
    v0: &DVector<f64>,
    t0: f64,
) -> Result<(), SolverError> {
    if let crate::mass::MassSpec::Identity = mass {
        return Ok(());
    }
    let n = y0.len();
    let m = mass.evaluate(y0, v0, t0);
    if m.nrows() != n || m.ncols() != n {
        return Err(SolverError::DimensionMismatch {
            context: "mass matrix",
            found: m.nrows().max(m.ncols()),
            expected: n,
        });
    }
    Ok(())
}

/// BDF coefficients for a uniformly spaced history window
///
/// Returns `(k, w)` for the update
/// `y_next = sum(k[j] * y_hist[j]) + w * h * f(y_next, t_next)`, with the
/// history ordered most recent first.
pub fn bdf_coefficients(order: usize) -> Result<(&'static [f64], f64), SolverError> {
    const K1: &[f64] = &[1.0];
    const K2: &[f64] = &[4.0 / 3.0, -1.0 / 3.0];
    const K3: &[f64] = &[18.0 / 11.0, -9.0 / 11.0, 2.0 / 11.0];
    const K4: &[f64] = &[48.0 / 25.0, -36.0 / 25.0, 16.0 / 25.0, -3.0 / 25.0];
    const K5: &[f64] = &[
        300.0 / 137.0,
        -300.0 / 137.0,
        200.0 / 137.0,
        -75.0 / 137.0,
        12.0 / 137.0,
    ];
    const K6: &[f64] = &[
        360.0 / 147.0,
        -450.0 / 147.0,
        400.0 / 147.0,
        -225.0 / 147.0,
        72.0 / 147.0,
        -10.0 / 147.0,
    ];

    match order {
        1 => Ok((K1, 1.0)),
        2 => Ok((K2, 2.0 / 3.0)),
        3 => Ok((K3, 6.0 / 11.0)),
        4 => Ok((K4, 12.0 / 25.0)),
        5 => Ok((K5, 60.0 / 137.0)),
        6 => Ok((K6, 60.0 / 147.0)),
        _ => Err(SolverError::InvalidOrder {
            order,
            min: 1,
            max: 6,
        }),
    }
}

/// BDF coefficients for a non-uniform history window
///
/// `offsets[j]` is the distance from `t_next` back to the `j`-th most recent
/// history point, in units of the current step (so a uniform window is
/// `[1, 2, ..., order]`). The coefficients come from requiring the formula
/// to be exact for polynomials up to the method order, a small
/// Vandermonde-type system in the `order + 1` unknowns `(k, w)`.
///
/// Agrees with [`bdf_coefficients`] on uniform offsets.
pub fn bdf_coefficients_for_spacing(
    order: usize,
    offsets: &[f64],
) -> Result<(Vec<f64>, f64), SolverError> {
    if !(1..=6).contains(&order) {
        return Err(SolverError::InvalidOrder {
            order,
            min: 1,
            max: 6,
        });
    }
    if offsets.len() < order {
        return Err(SolverError::InvalidTimeGrid(format!(
            "multistep window holds {} spacings, order {} needs {}",
            offsets.len(),
            order,
            order
        )));
    }
    let offsets = &offsets[..order];
    if offsets[0] <= 0.0
        || offsets.iter().any(|s| !s.is_finite())
        || offsets.windows(2).any(|w| w[1] <= w[0])
    {
        return Err(SolverError::InvalidTimeGrid(
            "multistep window spacings must be finite, positive and increasing".into(),
        ));
    }

    if order == 1 {
        return Ok((vec![1.0], offsets[0]));
    }

    // Exactness rows for monomials t^d, d = 0..=order, in scaled time
    // measured backward from t_next; the unknown vector is [k..., w]
    let n = order + 1;
    let mut a = DMatrix::<f64>::zeros(n, n);
    let mut rhs = DVector::<f64>::zeros(n);
    rhs[0] = 1.0;
    for d in 0..=order {
        for (j, &s) in offsets.iter().enumerate() {
            a[(d, j)] = (-s).powi(d as i32);
        }
    }
    a[(1, order)] = 1.0;

    let sol = a.lu().solve(&rhs).ok_or_else(|| {
        SolverError::InvalidTimeGrid("degenerate spacing in the multistep window".into())
    })?;
    let k = sol.iter().take(order).copied().collect();
    Ok((k, sol[order]))
}

/// Adams-Bashforth coefficients, history of derivatives most recent first
pub fn adams_coefficients(order: usize) -> Result<&'static [f64], SolverError> {
    const B1: &[f64] = &[1.0];
    const B2: &[f64] = &[3.0 / 2.0, -1.0 / 2.0];
    const B3: &[f64] = &[23.0 / 12.0, -16.0 / 12.0, 5.0 / 12.0];
    const B4: &[f64] = &[55.0 / 24.0, -59.0 / 24.0, 37.0 / 24.0, -9.0 / 24.0];
    const B5: &[f64] = &[
        1901.0 / 720.0,
        -2774.0 / 720.0,
        2616.0 / 720.0,
        -1274.0 / 720.0,
        251.0 / 720.0,
    ];

    match order {
        1 => Ok(B1),
        2 => Ok(B2),
        3 => Ok(B3),
        4 => Ok(B4),
        5 => Ok(B5),
        _ => Err(SolverError::InvalidOrder {
            order,
            min: 1,
            max: 5,
        }),
    }
}
