//! Finite-segment cable model
//!
//! The cable is discretized into straight massless segments with the cable
//! weight lumped at the nodes. A backward force sweep from the loaded end
//! gives every segment direction, so the whole chain is determined by the
//! unstrained length and the end-force direction. Those two unknowns are
//! found by constrained minimization against the endpoint closure.

use log::debug;
use nalgebra::{DVector, Vector2};

use super::{
    simple, CableError, CableProperties, CableShape, ShapeOptions, FORCE_EPS, GRAVITY, WEIGHT_EPS,
};
use crate::optim::{OptimError, Sqp};

/// Node positions for a chain with the given length and end-force direction
///
/// Sweeps the segment tensions from the endpoint back to the anchor, then
/// walks the node positions forward from the origin. Returns `None` when a
/// segment tension vanishes and no direction can be assigned.
fn chain(
    length: f64,
    angle: f64,
    nodes: usize,
    mass: f64,
    weight: f64,
) -> Option<Vec<Vector2<f64>>> {
    let node_weight = weight * length / nodes as f64;
    let end_pull = mass * GRAVITY + node_weight;

    let mut directions = vec![Vector2::zeros(); nodes];
    let mut force = Vector2::new(angle.cos(), angle.sin()) * end_pull;
    for direction in directions.iter_mut().rev() {
        let magnitude = force.norm();
        if magnitude <= FORCE_EPS || !magnitude.is_finite() {
            return None;
        }
        *direction = force / magnitude;
        force.y -= node_weight;
    }

    let span = length / nodes as f64;
    let mut points = Vec::with_capacity(nodes + 1);
    let mut point = Vector2::zeros();
    points.push(point);
    for direction in &directions {
        point += direction * span;
        points.push(point);
    }
    Some(points)
}

/// Solve the lumped-mass chain for the given endpoint and attached mass
///
/// The returned shape holds the `nodes + 1` node positions rather than a
/// resampled curve.
pub fn solve(
    endpoint: Vector2<f64>,
    mass: f64,
    properties: &CableProperties,
    nodes: usize,
    options: &ShapeOptions,
) -> Result<CableShape, CableError> {
    if nodes == 0 {
        return Err(CableError::InfeasibleConfiguration {
            context: "finite-segment model needs at least one node".into(),
        });
    }

    simple::solve(endpoint, mass, 2)?;
    let weight = properties.weight_per_length();

    // Nothing loads the chain, so the shape is the chord
    if weight < WEIGHT_EPS && mass * GRAVITY < FORCE_EPS {
        return simple::solve(endpoint, mass, nodes + 1);
    }

    let length_seed = endpoint.norm();
    let angle_seed = endpoint.y.atan2(endpoint.x);

    let mut objective = |x: &DVector<f64>| {
        let length_miss = x[0] - length_seed;
        let angle_miss = x[1] - angle_seed;
        length_miss * length_miss + angle_miss * angle_miss
    };
    let mut equality = |x: &DVector<f64>| match chain(x[0], x[1], nodes, mass, weight) {
        Some(points) => {
            let last = points[nodes];
            DVector::from_vec(vec![last.x - endpoint.x, last.y - endpoint.y])
        }
        None => DVector::from_vec(vec![f64::NAN, f64::NAN]),
    };
    let mut inequality = |x: &DVector<f64>| DVector::from_vec(vec![x[0]]);

    let x0 = DVector::from_vec(vec![length_seed, angle_seed]);
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

    let (length, angle) = (sol.x[0], sol.x[1]);
    debug!(
        "segment: length {:.6}, end angle {:.4} rad, violation {:.3e}",
        length, angle, sol.constraint_violation
    );

    let shape = chain(length, angle, nodes, mass, weight).ok_or_else(|| {
        CableError::InfeasibleConfiguration {
            context: "solved chain left the finite domain".into(),
        }
    })?;
    let end_pull = mass * GRAVITY + weight * length / nodes as f64;

    Ok(CableShape {
        length,
        shape,
        force: Vector2::new(angle.cos(), angle.sin()) * end_pull,
    })
}
