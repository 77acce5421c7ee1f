//! CableSim - Numerical core for cable-driven robot simulation
//!
//! Fixed-step integration of ODE and constrained mechanical (DAE) systems
//! together with static cable-shape solvers, built on dynamically sized
//! `nalgebra` vectors.
//!
//! # Components
//!
//! - Implicit BDF and explicit Adams-Bashforth multistep drivers, plus a
//!   leapfrog stepper for second-order systems
//! - A constrained DAE driver enforcing holonomic and nonholonomic
//!   constraints without drift, with consistent initial multipliers
//! - Elastic catenary, lumped-mass chain and straight-line cable models,
//!   and pulley wrap geometry
//! - Newton and Levenberg-Marquardt correctors plus an SQP solver shared by
//!   the steppers and the cable models
//!
//! # Example
//!
//! ```rust,ignore
//! use cablesim::prelude::*;
//! use nalgebra::{DMatrix, DVector};
//!
//! // Planar pendulum on a unit rod, integrated as a constrained system
//! let constraints = ConstraintSet::new()
//!     .with_holonomic(|q, _t| DVector::from_vec(vec![q[0] * q[0] + q[1] * q[1] - 1.0]))
//!     .with_holonomic_jacobian(|q, _t| DMatrix::from_row_slice(1, 2, &[2.0 * q[0], 2.0 * q[1]]));
//!
//! let gravity = |_q: &DVector<f64>, _v: &DVector<f64>, _t: f64| {
//!     DVector::from_vec(vec![0.0, -9.81])
//! };
//!
//! let options = BetschOptions::new()
//!     .with_constraints(constraints)
//!     .with_max_step(0.01);
//! let q0 = DVector::from_vec(vec![0.0, -1.0]);
//! let v0 = DVector::from_vec(vec![1.0, 0.0]);
//! let run = betsch(gravity, TimeGrid::span(0.0, 2.0), &q0, &v0, &options)?;
//! ```

pub mod cable;
pub mod constraints;
pub mod mass;
pub mod monitor;
pub mod optim;
pub mod solvers;
pub mod trajectory;

pub use cable::{
    solve_cable_shape, solve_cable_shape_with, CableError, CableProperties, CableShape,
    ShapeModel, ShapeOptions,
};
pub use constraints::ConstraintSet;
pub use mass::MassSpec;
pub use monitor::{NoMonitor, StepMonitor};
pub use solvers::{
    adams, bdf, betsch, leapfrog, AdamsOptions, BdfOptions, BetschOptions, LeapfrogOptions,
    SolverError, TimeGrid,
};
pub use trajectory::{DaeTrajectory, PhaseTrajectory, Trajectory};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cable::*;
    pub use crate::constraints::ConstraintSet;
    pub use crate::mass::MassSpec;
    pub use crate::monitor::{NoMonitor, StepMonitor};
    pub use crate::optim::{Corrector, NonlinearSolver};
    pub use crate::solvers::*;
    pub use crate::trajectory::*;
}
