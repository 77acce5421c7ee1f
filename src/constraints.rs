//! Position and velocity constraints for constrained mechanical systems
//!
//! Holonomic constraints are equations `phi(q, t) = 0` on the positions.
//! Nonholonomic constraints restrict velocities through a matrix
//! `psi(q, t)` with `psi(q, t) * v = 0`; they cannot be integrated into
//! position-level equations (a skate or rolling contact is the classic
//! example).

use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::optim::jacobian::jacobian_at;

type ResidualFn = Box<dyn Fn(&DVector<f64>, f64) -> DVector<f64>>;
type MatrixFn = Box<dyn Fn(&DVector<f64>, f64) -> DMatrix<f64>>;

/// Constraint equations attached to a second-order system
///
/// Both families are optional. The holonomic Jacobian `d(phi)/dq` may be
/// supplied analytically; when it is absent the stepper falls back to a
/// central-difference approximation of it.
#[derive(Default)]
pub struct ConstraintSet {
    holonomic: Option<ResidualFn>,
    holonomic_jacobian: Option<MatrixFn>,
    nonholonomic: Option<MatrixFn>,
}

impl ConstraintSet {
    /// Empty constraint set
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach holonomic constraints `phi(q, t) = 0`
    pub fn with_holonomic<F>(mut self, phi: F) -> Self
    where
        F: Fn(&DVector<f64>, f64) -> DVector<f64> + 'static,
    {
        self.holonomic = Some(Box::new(phi));
        self
    }

    /// Attach the analytic Jacobian `d(phi)/dq`, one row per constraint
    pub fn with_holonomic_jacobian<F>(mut self, jacobian: F) -> Self
    where
        F: Fn(&DVector<f64>, f64) -> DMatrix<f64> + 'static,
    {
        self.holonomic_jacobian = Some(Box::new(jacobian));
        self
    }

    /// Attach nonholonomic constraints `psi(q, t) * v = 0`
    pub fn with_nonholonomic<F>(mut self, psi: F) -> Self
    where
        F: Fn(&DVector<f64>, f64) -> DMatrix<f64> + 'static,
    {
        self.nonholonomic = Some(Box::new(psi));
        self
    }

    pub fn has_holonomic(&self) -> bool {
        self.holonomic.is_some()
    }

    pub fn has_nonholonomic(&self) -> bool {
        self.nonholonomic.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.holonomic.is_none() && self.nonholonomic.is_none()
    }

    /// Holonomic residual `phi(q, t)`; empty when no holonomic constraints
    /// are attached
    pub fn phi(&self, q: &DVector<f64>, t: f64) -> DVector<f64> {
        match &self.holonomic {
            Some(f) => f(q, t),
            None => DVector::zeros(0),
        }
    }

    /// Holonomic Jacobian `d(phi)/dq`, analytic when supplied and central
    /// differences otherwise; `0 x n` when no holonomic constraints are
    /// attached
    pub fn phi_jacobian(&self, q: &DVector<f64>, t: f64) -> DMatrix<f64> {
        match (&self.holonomic_jacobian, &self.holonomic) {
            (Some(jac), _) => jac(q, t),
            (None, Some(phi)) => jacobian_at(phi.as_ref(), q, t),
            (None, None) => DMatrix::zeros(0, q.len()),
        }
    }

    /// Velocity constraint matrix `psi(q, t)`; `0 x n` when no nonholonomic
    /// constraints are attached
    pub fn psi(&self, q: &DVector<f64>, t: f64) -> DMatrix<f64> {
        match &self.nonholonomic {
            Some(f) => f(q, t),
            None => DMatrix::zeros(0, q.len()),
        }
    }

    /// Check a user-supplied analytic Jacobian against central differences
    ///
    /// Vacuously true when there is nothing to verify (no constraints, or no
    /// analytic Jacobian attached).
    pub fn verify_jacobian(&self, q: &DVector<f64>, t: f64, tol: f64) -> bool {
        self.jacobian_deviation(q, t).map_or(true, |dev| dev <= tol)
    }

    /// Largest entrywise difference between the analytic Jacobian and its
    /// finite-difference counterpart at `(q, t)`
    ///
    /// Returns `None` unless both the constraints and an analytic Jacobian
    /// are attached. A shape mismatch reports as infinite deviation.
    pub fn jacobian_deviation(&self, q: &DVector<f64>, t: f64) -> Option<f64> {
        let jac = self.holonomic_jacobian.as_ref()?;
        let phi = self.holonomic.as_ref()?;

        let analytic = jac(q, t);
        let numeric = jacobian_at(phi.as_ref(), q, t);
        if analytic.shape() != numeric.shape() {
            return Some(f64::INFINITY);
        }
        Some(
            (analytic - numeric)
                .iter()
                .fold(0.0_f64, |acc, v| acc.max(v.abs())),
        )
    }
}

impl fmt::Debug for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintSet")
            .field("holonomic", &self.holonomic.is_some())
            .field("holonomic_jacobian", &self.holonomic_jacobian.is_some())
            .field("nonholonomic", &self.nonholonomic.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn circle() -> ConstraintSet {
        // Unit circle: q stays on x^2 + z^2 = 1
        ConstraintSet::new()
            .with_holonomic(|q, _t| DVector::from_vec(vec![q[0] * q[0] + q[1] * q[1] - 1.0]))
    }

    #[test]
    fn test_empty_set_has_zero_rows() {
        let set = ConstraintSet::new();
        let q = DVector::from_vec(vec![1.0, 2.0]);
        assert!(set.is_empty());
        assert_eq!(set.phi(&q, 0.0).len(), 0);
        assert_eq!(set.psi(&q, 0.0).nrows(), 0);
        assert_eq!(set.psi(&q, 0.0).ncols(), 2);
        assert_eq!(set.phi_jacobian(&q, 0.0).nrows(), 0);
    }

    #[test]
    fn test_finite_difference_jacobian_matches_analytic() {
        let set = circle();
        let q = DVector::from_vec(vec![0.6, -0.8]);
        let jac = set.phi_jacobian(&q, 0.0);
        assert_eq!(jac.shape(), (1, 2));
        assert_relative_eq!(jac[(0, 0)], 1.2, epsilon = 1e-6);
        assert_relative_eq!(jac[(0, 1)], -1.6, epsilon = 1e-6);
    }

    #[test]
    fn test_jacobian_deviation_small_for_correct_jacobian() {
        let set = circle().with_holonomic_jacobian(|q, _t| {
            DMatrix::from_row_slice(1, 2, &[2.0 * q[0], 2.0 * q[1]])
        });
        let q = DVector::from_vec(vec![0.6, -0.8]);
        let deviation = set.jacobian_deviation(&q, 0.0).unwrap();
        assert!(deviation < 1e-6, "deviation {} too large", deviation);
        assert!(set.verify_jacobian(&q, 0.0, 1e-6));
    }

    #[test]
    fn test_jacobian_deviation_flags_wrong_jacobian() {
        let set = circle()
            .with_holonomic_jacobian(|q, _t| DMatrix::from_row_slice(1, 2, &[q[0], q[1]]));
        let q = DVector::from_vec(vec![0.6, -0.8]);
        let deviation = set.jacobian_deviation(&q, 0.0).unwrap();
        assert!(deviation > 0.5, "deviation {} unexpectedly small", deviation);
        assert!(!set.verify_jacobian(&q, 0.0, 1e-6));
    }

    #[test]
    fn test_nonholonomic_rows() {
        let set = ConstraintSet::new()
            .with_nonholonomic(|_q, _t| DMatrix::from_row_slice(1, 2, &[1.0, -1.0]));
        let q = DVector::from_vec(vec![0.0, 0.0]);
        let psi = set.psi(&q, 0.0);
        assert_eq!(psi.shape(), (1, 2));
        assert!(!set.is_empty());
        assert!(set.has_nonholonomic());
    }
}
