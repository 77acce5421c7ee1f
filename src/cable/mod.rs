//! Static cable-shape solvers
//!
//! Equilibrium shape of a cable anchored at the origin with its far end at a
//! given 2-D offset, carrying an attached point mass. Three models:
//! - [`simple`]: the straight chord, closed form; also the seed for the
//!   other two
//! - [`catenary`]: elastic catenary under self-weight, solved as a
//!   constrained minimization over the end force and unstrained length
//! - [`segment`]: chain of point-mass nodes with a recursive equilibrium
//!   sweep, solved over length and the last-node force angle
//!
//! [`pulley`] adds routing geometry for cables guided over a pulley.
//!
//! Coordinates are `(horizontal, vertical)` with gravity pulling the second
//! component down. Lengths are meters, forces Newtons. The reported force is
//! the pull the attachment exerts on the cable end.

pub mod catenary;
pub mod pulley;
pub mod segment;
pub mod simple;

use nalgebra::Vector2;
use thiserror::Error;

use crate::optim::OptimError;

/// Standard gravity, m/s^2
pub const GRAVITY: f64 = 9.81;

/// Default sample count of a discretized shape
pub const SHAPE_SAMPLES: usize = 10_000;

/// Force magnitudes below this count as a slack cable
pub(crate) const FORCE_EPS: f64 = 1e-9;

/// Weight per length below this counts as a weightless cable
pub(crate) const WEIGHT_EPS: f64 = 1e-12;

/// Cable-shape solver errors
#[derive(Error, Debug)]
pub enum CableError {
    #[error("Endpoint coincides with the anchor")]
    DegenerateEndpoint,

    #[error("Infeasible cable configuration: {context}")]
    InfeasibleConfiguration { context: String },

    #[error("Shape optimization stalled: constraint violation {violation:.3e}")]
    ConvergenceFailure { violation: f64 },

    #[error("Endpoint distance {distance:.4} is inside the pulley radius {radius:.4}")]
    InsidePulley { distance: f64, radius: f64 },

    #[error(transparent)]
    Optim(#[from] OptimError),
}

/// Physical cable parameters
#[derive(Debug, Clone, Copy)]
pub struct CableProperties {
    /// Young's modulus, Pa
    pub youngs_modulus: f64,
    /// Unstrained cross-section area, m^2
    pub unstrained_section: f64,
    /// Material density, kg/m^3
    pub density: f64,
    /// Lower bound on the end force magnitude, N
    pub force_min: f64,
    /// Upper bound on the end force magnitude, N; may be infinite
    pub force_max: f64,
}

impl CableProperties {
    /// Properties with unbounded end force
    pub fn new(youngs_modulus: f64, unstrained_section: f64, density: f64) -> Self {
        Self {
            youngs_modulus,
            unstrained_section,
            density,
            force_min: 0.0,
            force_max: f64::INFINITY,
        }
    }

    pub fn with_force_bounds(mut self, force_min: f64, force_max: f64) -> Self {
        self.force_min = force_min;
        self.force_max = force_max;
        self
    }

    /// Cable weight per unit unstrained length, N/m
    pub fn weight_per_length(&self) -> f64 {
        self.density * self.unstrained_section * GRAVITY
    }

    /// Axial stiffness `E*A`, N
    pub fn axial_stiffness(&self) -> f64 {
        self.youngs_modulus * self.unstrained_section
    }

    pub(crate) fn validate(&self) -> Result<(), CableError> {
        let material = [self.youngs_modulus, self.unstrained_section, self.density];
        if material.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(CableError::InfeasibleConfiguration {
                context: "material properties must be finite and non-negative".into(),
            });
        }
        if !self.force_min.is_finite() || self.force_min < 0.0 || self.force_max < self.force_min
        {
            return Err(CableError::InfeasibleConfiguration {
                context: "force bounds must satisfy 0 <= min <= max".into(),
            });
        }
        Ok(())
    }
}

/// Solved cable shape
#[derive(Debug, Clone)]
pub struct CableShape {
    /// Unstrained cable length, m
    pub length: f64,
    /// Discretized shape from the anchor to the endpoint
    pub shape: Vec<Vector2<f64>>,
    /// Force the attachment applies to the cable end, N
    pub force: Vector2<f64>,
}

/// Shape model selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShapeModel {
    /// Straight chord, no sag
    Simple,
    /// Elastic catenary under self-weight
    #[default]
    Catenary,
    /// Chain of point-mass nodes; the shape holds `nodes + 1` points
    FiniteSegment { nodes: usize },
}

/// Configuration for [`solve_cable_shape_with`]
#[derive(Debug, Clone)]
pub struct ShapeOptions {
    model: ShapeModel,
    samples: usize,
    tolerance: f64,
    constraint_tolerance: f64,
    max_iterations: usize,
}

impl ShapeOptions {
    pub fn new() -> Self {
        Self {
            model: ShapeModel::default(),
            samples: SHAPE_SAMPLES,
            tolerance: 1e-8,
            constraint_tolerance: 1e-8,
            max_iterations: 100,
        }
    }

    pub fn with_model(mut self, model: ShapeModel) -> Self {
        self.model = model;
        self
    }

    /// Sample count of the returned shape (chord and catenary models)
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_constraint_tolerance(mut self, constraint_tolerance: f64) -> Self {
        self.constraint_tolerance = constraint_tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

impl Default for ShapeOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Solve for the equilibrium shape with the default elastic-catenary model
pub fn solve_cable_shape(
    endpoint: Vector2<f64>,
    mass: f64,
    properties: &CableProperties,
) -> Result<CableShape, CableError> {
    solve_cable_shape_with(endpoint, mass, properties, &ShapeOptions::default())
}

/// Solve for the equilibrium shape of the configured model
///
/// `endpoint` is the cable's far end relative to the anchor, `mass` the
/// attached point mass in kg.
pub fn solve_cable_shape_with(
    endpoint: Vector2<f64>,
    mass: f64,
    properties: &CableProperties,
    options: &ShapeOptions,
) -> Result<CableShape, CableError> {
    if !endpoint.x.is_finite() || !endpoint.y.is_finite() {
        return Err(CableError::InfeasibleConfiguration {
            context: "endpoint must be finite".into(),
        });
    }
    if !mass.is_finite() || mass < 0.0 {
        return Err(CableError::InfeasibleConfiguration {
            context: "attached mass must be finite and non-negative".into(),
        });
    }
    properties.validate()?;

    match options.model {
        ShapeModel::Simple => simple::solve(endpoint, mass, options.samples),
        ShapeModel::Catenary => catenary::solve(endpoint, mass, properties, options),
        ShapeModel::FiniteSegment { nodes } => {
            segment::solve(endpoint, mass, properties, nodes, options)
        }
    }
}
