//! Elastic catenary cable model
//!
//! Closed-form elastic-catenary position expressions parametrized by the
//! unstrained arc length, with the end force and unstrained length found by
//! constrained minimization: stay close to the chord seed while reproducing
//! the endpoint exactly and respecting the force-magnitude bounds.
//!
//! # References
//! - Irvine, "Cable Structures" (1981), elastic catenary closed forms

use log::debug;
use nalgebra::{DVector, Vector2};

use super::{
    simple, CableError, CableProperties, CableShape, ShapeOptions, FORCE_EPS, GRAVITY, WEIGHT_EPS,
};
use crate::optim::{OptimError, Sqp};

/// Cable position at unstrained arc length `s`, anchored at the origin
///
/// `(fx, fz)` is the force at the far end (`s = length`), `weight` the cable
/// weight per unit unstrained length, `stiffness` the axial stiffness `E*A`.
/// The tension at arc position `s` is `(fx, fz - weight * (length - s))`.
/// Returns `None` when the expressions leave the finite domain.
fn position(
    s: f64,
    fx: f64,
    fz: f64,
    length: f64,
    weight: f64,
    stiffness: f64,
) -> Option<Vector2<f64>> {
    let point = if weight.abs() < WEIGHT_EPS {
        // Weightless cable: a straight line along the force direction with
        // uniform elastic strain
        let tension = fx.hypot(fz);
        if tension < FORCE_EPS {
            return None;
        }
        Vector2::new(fx, fz) * (s * (1.0 + tension / stiffness) / tension)
    } else {
        let t_here = fz - weight * (length - s);
        let t_anchor = fz - weight * length;
        let z = fz * s / stiffness - weight * s * (length - 0.5 * s) / stiffness
            + (fx.hypot(t_here) - fx.hypot(t_anchor)) / weight;
        if fx.abs() < FORCE_EPS {
            Vector2::new(0.0, z)
        } else {
            let x = fx * s / stiffness
                + fx / weight * ((t_here / fx.abs()).asinh() - (t_anchor / fx.abs()).asinh());
            Vector2::new(x, z)
        }
    };

    if point.x.is_finite() && point.y.is_finite() {
        Some(point)
    } else {
        None
    }
}

/// Solve the elastic catenary for the given endpoint and attached mass
///
/// Unknowns are the end force components and the unstrained length, seeded
/// from the chord. Equality constraints pin the closed-form endpoint to the
/// physical one; inequalities bound the end force magnitude and keep the
/// length non-negative.
pub fn solve(
    endpoint: Vector2<f64>,
    mass: f64,
    properties: &CableProperties,
    options: &ShapeOptions,
) -> Result<CableShape, CableError> {
    let seed = simple::solve(endpoint, mass, 2)?;
    let weight = properties.weight_per_length();

    // Nothing loads the cable, so the shape is the chord
    if weight < WEIGHT_EPS && mass * GRAVITY < FORCE_EPS {
        return simple::solve(endpoint, mass, options.samples);
    }

    let stiffness = properties.axial_stiffness();
    if stiffness <= 0.0 {
        return Err(CableError::InfeasibleConfiguration {
            context: "non-positive axial stiffness".into(),
        });
    }

    let length_seed = seed.length;
    let angle_seed = endpoint.y.atan2(endpoint.x);

    let mut objective = |x: &DVector<f64>| {
        let length_miss = x[2] - length_seed;
        let angle_miss = x[1].atan2(x[0]) - angle_seed;
        length_miss * length_miss + angle_miss * angle_miss
    };
    // Endpoint map residual; NaN rows reject out-of-domain trials through
    // the merit backtracking
    let mut equality = |x: &DVector<f64>| match position(x[2], x[0], x[1], x[2], weight, stiffness)
    {
        Some(p) => DVector::from_vec(vec![p.x - endpoint.x, p.y - endpoint.y]),
        None => DVector::from_vec(vec![f64::NAN, f64::NAN]),
    };
    let force_min2 = properties.force_min * properties.force_min;
    let force_max = properties.force_max;
    let mut inequality = |x: &DVector<f64>| {
        let f2 = x[0] * x[0] + x[1] * x[1];
        let mut rows = vec![f2 - force_min2, x[2]];
        if force_max.is_finite() {
            rows.push(force_max * force_max - f2);
        }
        DVector::from_vec(rows)
    };

    let x0 = DVector::from_vec(vec![seed.force.x, seed.force.y, length_seed]);
    let sqp = Sqp::new()
        .with_tolerance(options.tolerance)
        .with_constraint_tolerance(options.constraint_tolerance)
        .with_max_iterations(options.max_iterations);
    let sol = sqp
        .solve(&mut objective, &mut equality, &mut inequality, &x0)
        .map_err(|err| match err {
            OptimError::ConvergenceFailure { residual, .. } => {
                CableError::ConvergenceFailure { violation: residual }
            }
            other => CableError::Optim(other),
        })?;

    let (fx, fz, length) = (sol.x[0], sol.x[1], sol.x[2]);
    debug!(
        "catenary: length {:.6}, end force ({:.4}, {:.4}), violation {:.3e}",
        length, fx, fz, sol.constraint_violation
    );

    let count = options.samples.max(2);
    let mut shape = Vec::with_capacity(count);
    for i in 0..count {
        let s = length * i as f64 / (count - 1) as f64;
        match position(s, fx, fz, length, weight, stiffness) {
            Some(p) => shape.push(p),
            None => {
                return Err(CableError::InfeasibleConfiguration {
                    context: "solved shape left the finite domain".into(),
                })
            }
        }
    }

    Ok(CableShape {
        length,
        shape,
        force: Vector2::new(fx, fz),
    })
}
