//! Straight-line (chord) cable model

use nalgebra::Vector2;

use super::{CableError, CableShape, GRAVITY};

/// Closed-form chord solution
///
/// Length is the anchor-endpoint distance, the shape a uniform sampling of
/// the chord, the force the attached weight directed along the chord. The
/// catenary and finite-segment solvers start from this solution.
pub fn solve(
    endpoint: Vector2<f64>,
    mass: f64,
    samples: usize,
) -> Result<CableShape, CableError> {
    let length = endpoint.norm();
    if length < 1e-12 {
        return Err(CableError::DegenerateEndpoint);
    }

    let count = samples.max(2);
    let shape = (0..count)
        .map(|i| endpoint * (i as f64 / (count - 1) as f64))
        .collect();

    Ok(CableShape {
        length,
        shape,
        force: endpoint * (mass * GRAVITY / length),
    })
}
