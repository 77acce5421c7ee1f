//! Mass matrix forms accepted by the steppers
//!
//! Every solver in this crate integrates systems of the form
//! `M * y' = f(y, t)` (or `M * a = f(q, v, t)` for the second-order
//! steppers). [`MassSpec`] captures how much of the state the mass matrix
//! depends on, so drivers can evaluate it as rarely as the problem allows.

use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::optim::newton::solve_linear;

/// Mass matrix of a first- or second-order system
///
/// The variants are ordered from cheapest to most general. `Identity`
/// never allocates a matrix, and a driver only needs to refactorize inside
/// its corrector loop when [`MassSpec::is_state_dependent`] returns true.
pub enum MassSpec {
    /// `M = I`; the system is in explicit form
    Identity,
    /// A fixed matrix, factored anew at each solve
    Constant(DMatrix<f64>),
    /// `M = M(t)`
    TimeVarying(Box<dyn Fn(f64) -> DMatrix<f64>>),
    /// `M = M(y, t)` for first-order systems, `M = M(q, t)` for second-order
    StateDependent(Box<dyn Fn(&DVector<f64>, f64) -> DMatrix<f64>>),
    /// `M = M(q, v, t)`; only meaningful for second-order systems
    StateVelocity(Box<dyn Fn(&DVector<f64>, &DVector<f64>, f64) -> DMatrix<f64>>),
}

impl MassSpec {
    /// Fixed mass matrix
    pub fn constant(matrix: DMatrix<f64>) -> Self {
        MassSpec::Constant(matrix)
    }

    /// Mass matrix depending on time alone
    pub fn time_varying<F>(f: F) -> Self
    where
        F: Fn(f64) -> DMatrix<f64> + 'static,
    {
        MassSpec::TimeVarying(Box::new(f))
    }

    /// Mass matrix depending on the state (position) and time
    pub fn state_dependent<F>(f: F) -> Self
    where
        F: Fn(&DVector<f64>, f64) -> DMatrix<f64> + 'static,
    {
        MassSpec::StateDependent(Box::new(f))
    }

    /// Mass matrix depending on position, velocity and time
    pub fn state_velocity<F>(f: F) -> Self
    where
        F: Fn(&DVector<f64>, &DVector<f64>, f64) -> DMatrix<f64> + 'static,
    {
        MassSpec::StateVelocity(Box::new(f))
    }

    /// True when the matrix changes with the state within a single step
    pub fn is_state_dependent(&self) -> bool {
        matches!(
            self,
            MassSpec::StateDependent(_) | MassSpec::StateVelocity(_)
        )
    }

    /// Evaluate the matrix at the given state
    ///
    /// First-order drivers pass a zero velocity; the `StateVelocity` variant
    /// is the only one that reads it.
    pub fn evaluate(&self, y: &DVector<f64>, v: &DVector<f64>, t: f64) -> DMatrix<f64> {
        match self {
            MassSpec::Identity => DMatrix::identity(y.len(), y.len()),
            MassSpec::Constant(m) => m.clone(),
            MassSpec::TimeVarying(f) => f(t),
            MassSpec::StateDependent(f) => f(y, t),
            MassSpec::StateVelocity(f) => f(y, v, t),
        }
    }

    /// Solve `M * x = rhs` at the given state
    ///
    /// Returns `None` when the matrix is singular to working precision. The
    /// identity variant short-circuits without factoring anything.
    pub fn try_solve(
        &self,
        rhs: &DVector<f64>,
        y: &DVector<f64>,
        v: &DVector<f64>,
        t: f64,
    ) -> Option<DVector<f64>> {
        match self {
            MassSpec::Identity => Some(rhs.clone()),
            _ => {
                let m = self.evaluate(y, v, t);
                solve_linear(&m, rhs)
            }
        }
    }
}

impl Default for MassSpec {
    fn default() -> Self {
        MassSpec::Identity
    }
}

impl fmt::Debug for MassSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MassSpec::Identity => write!(f, "MassSpec::Identity"),
            MassSpec::Constant(m) => write!(f, "MassSpec::Constant({}x{})", m.nrows(), m.ncols()),
            MassSpec::TimeVarying(_) => write!(f, "MassSpec::TimeVarying"),
            MassSpec::StateDependent(_) => write!(f, "MassSpec::StateDependent"),
            MassSpec::StateVelocity(_) => write!(f, "MassSpec::StateVelocity"),
        }
    }
}
