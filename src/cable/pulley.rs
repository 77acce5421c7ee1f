//! Pulley wrap geometry
//!
//! Where a cable leaves a guide pulley or winch drum, the path splits into a
//! circular arc on the pulley surface and a free straight span to the far
//! endpoint. Given the pulley center, its radius, the polar angle where the
//! cable meets the drum and the endpoint, [`wrap`] finds the tangent exit
//! point, the wrapped arc and the free-span length.

use nalgebra::Vector2;

use super::CableError;

/// Tangent exit solution for a cable wrapped on a pulley
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulleyWrap {
    /// Point where the cable leaves the pulley surface
    pub exit_point: Vector2<f64>,
    /// Arc swept on the pulley between entry and exit, non-negative
    pub wrap_angle: f64,
    /// Straight length from the exit point to the endpoint
    pub free_length: f64,
    /// Wrapped arc length plus the free span
    pub total_length: f64,
}

/// Normalize an angle into `(-pi, pi]`
fn wrap_to_pi(angle: f64) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    let mut wrapped = angle % two_pi;
    if wrapped > std::f64::consts::PI {
        wrapped -= two_pi;
    } else if wrapped <= -std::f64::consts::PI {
        wrapped += two_pi;
    }
    wrapped
}

/// Resolve the wrap of a cable entering a pulley at `entry_angle`
///
/// `entry_angle` is the polar angle on the pulley circle where the cable
/// first touches the surface. Of the two tangent lines through `endpoint`,
/// the one with the smaller swept arc from the entry point is taken.
pub fn wrap(
    center: Vector2<f64>,
    radius: f64,
    entry_angle: f64,
    endpoint: Vector2<f64>,
) -> Result<PulleyWrap, CableError> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(CableError::InfeasibleConfiguration {
            context: "pulley radius must be positive".into(),
        });
    }
    if !entry_angle.is_finite() {
        return Err(CableError::InfeasibleConfiguration {
            context: "non-finite pulley entry angle".into(),
        });
    }

    let offset = endpoint - center;
    let distance = offset.norm();
    if !distance.is_finite() {
        return Err(CableError::InfeasibleConfiguration {
            context: "non-finite pulley geometry".into(),
        });
    }
    if distance <= radius {
        return Err(CableError::InsidePulley { distance, radius });
    }

    let free_length = (distance * distance - radius * radius).sqrt();
    let polar = offset.y.atan2(offset.x);
    let tangent = (radius / distance).acos();

    let plus = polar + tangent;
    let minus = polar - tangent;
    let swept_plus = wrap_to_pi(plus - entry_angle);
    let swept_minus = wrap_to_pi(minus - entry_angle);
    let (exit_angle, swept) = if swept_plus.abs() <= swept_minus.abs() {
        (plus, swept_plus)
    } else {
        (minus, swept_minus)
    };

    let wrap_angle = swept.abs();
    let exit_point = center + Vector2::new(exit_angle.cos(), exit_angle.sin()) * radius;

    Ok(PulleyWrap {
        exit_point,
        wrap_angle,
        free_length,
        total_length: radius * wrap_angle + free_length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_quarter_turn_exit_geometry() {
        // Unit pulley at the origin, cable enters at the top, leaves toward
        // a point two radii out on the x axis
        let wrapped = wrap(Vector2::zeros(), 1.0, PI / 2.0, Vector2::new(2.0, 0.0)).unwrap();

        assert_relative_eq!(wrapped.exit_point.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(wrapped.exit_point.y, 3.0_f64.sqrt() / 2.0, epsilon = 1e-12);
        assert_relative_eq!(wrapped.wrap_angle, PI / 6.0, epsilon = 1e-12);
        assert_relative_eq!(wrapped.free_length, 3.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(
            wrapped.total_length,
            PI / 6.0 + 3.0_f64.sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_mirror_entry_picks_other_tangent() {
        let wrapped = wrap(Vector2::zeros(), 1.0, -PI / 2.0, Vector2::new(2.0, 0.0)).unwrap();

        assert_relative_eq!(wrapped.exit_point.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(wrapped.exit_point.y, -(3.0_f64.sqrt()) / 2.0, epsilon = 1e-12);
        assert_relative_eq!(wrapped.wrap_angle, PI / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_endpoint_inside_pulley_rejected() {
        let result = wrap(Vector2::zeros(), 1.0, 0.0, Vector2::new(0.5, 0.0));
        match result {
            Err(CableError::InsidePulley { distance, radius }) => {
                assert_relative_eq!(distance, 0.5, epsilon = 1e-12);
                assert_relative_eq!(radius, 1.0, epsilon = 1e-12);
            }
            other => panic!("expected InsidePulley, got {other:?}"),
        }
    }

    #[test]
    fn test_wrap_to_pi_normalizes() {
        assert_relative_eq!(wrap_to_pi(3.0 * PI), PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_to_pi(-3.0 * PI), PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_to_pi(PI / 4.0), PI / 4.0, epsilon = 1e-12);
        assert_relative_eq!(wrap_to_pi(-PI), PI, epsilon = 1e-12);
    }
}
