//! Trajectory containers returned by the steppers
//!
//! Fixed-step runs know their sample count up front, so the containers
//! preallocate, capped so a pathological span/step combination cannot
//! request gigabytes before the first step is taken. Storage is one
//! `DVector` per sample; columns-of-a-matrix storage would save a little
//! memory but makes incremental growth and early termination awkward.

use nalgebra::DVector;

/// Preallocation floor, in samples
const MIN_CHUNK: usize = 128;

/// Preallocation ceiling, in scalar elements across all samples
const MAX_PREALLOC_ELEMS: usize = 1 << 24;

/// Sample capacity to reserve for an expected number of steps of the given
/// state width
pub(crate) fn preallocation(steps: usize, width: usize) -> usize {
    let cap = (MAX_PREALLOC_ELEMS / width.max(1)).max(MIN_CHUNK);
    steps.clamp(MIN_CHUNK, cap)
}

/// Time history of a first-order system
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    /// Sample times, strictly increasing
    pub time: Vec<f64>,
    /// State at each sample time
    pub state: Vec<DVector<f64>>,
}

impl Trajectory {
    pub(crate) fn with_expected_steps(steps: usize, width: usize) -> Self {
        let capacity = preallocation(steps, width);
        Self {
            time: Vec::with_capacity(capacity),
            state: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, t: f64, y: DVector<f64>) {
        debug_assert!(self.time.last().map_or(true, |&prev| t > prev));
        self.time.push(t);
        self.state.push(y);
    }

    pub(crate) fn finish(&mut self) {
        self.time.shrink_to_fit();
        self.state.shrink_to_fit();
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Final sample, if any steps were recorded
    pub fn last(&self) -> Option<(f64, &DVector<f64>)> {
        match (self.time.last(), self.state.last()) {
            (Some(&t), Some(y)) => Some((t, y)),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &DVector<f64>)> {
        self.time.iter().copied().zip(self.state.iter())
    }
}

/// Time history of a second-order system
#[derive(Debug, Clone, Default)]
pub struct PhaseTrajectory {
    /// Sample times, strictly increasing
    pub time: Vec<f64>,
    /// Position at each sample time
    pub position: Vec<DVector<f64>>,
    /// Velocity at each sample time
    pub velocity: Vec<DVector<f64>>,
}

impl PhaseTrajectory {
    pub(crate) fn with_expected_steps(steps: usize, width: usize) -> Self {
        let capacity = preallocation(steps, 2 * width);
        Self {
            time: Vec::with_capacity(capacity),
            position: Vec::with_capacity(capacity),
            velocity: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, t: f64, q: DVector<f64>, v: DVector<f64>) {
        debug_assert!(self.time.last().map_or(true, |&prev| t > prev));
        self.time.push(t);
        self.position.push(q);
        self.velocity.push(v);
    }

    pub(crate) fn finish(&mut self) {
        self.time.shrink_to_fit();
        self.position.shrink_to_fit();
        self.velocity.shrink_to_fit();
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Final sample, if any steps were recorded
    pub fn last(&self) -> Option<(f64, &DVector<f64>, &DVector<f64>)> {
        match (self.time.last(), self.position.last(), self.velocity.last()) {
            (Some(&t), Some(q), Some(v)) => Some((t, q, v)),
            _ => None,
        }
    }
}

/// Time history of a constrained second-order system
///
/// Multiplier columns follow the constraint families: `lambda` for the
/// holonomic equations, `mu` for the nonholonomic ones. The entries at the
/// initial time are the consistent multipliers recovered before stepping.
#[derive(Debug, Clone, Default)]
pub struct DaeTrajectory {
    /// Sample times, strictly increasing
    pub time: Vec<f64>,
    /// Position at each sample time
    pub position: Vec<DVector<f64>>,
    /// Velocity at each sample time
    pub velocity: Vec<DVector<f64>>,
    /// Holonomic constraint multipliers
    pub lambda: Vec<DVector<f64>>,
    /// Nonholonomic constraint multipliers
    pub mu: Vec<DVector<f64>>,
}

impl DaeTrajectory {
    pub(crate) fn with_expected_steps(steps: usize, width: usize) -> Self {
        let capacity = preallocation(steps, width);
        Self {
            time: Vec::with_capacity(capacity),
            position: Vec::with_capacity(capacity),
            velocity: Vec::with_capacity(capacity),
            lambda: Vec::with_capacity(capacity),
            mu: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(
        &mut self,
        t: f64,
        q: DVector<f64>,
        v: DVector<f64>,
        lambda: DVector<f64>,
        mu: DVector<f64>,
    ) {
        debug_assert!(self.time.last().map_or(true, |&prev| t > prev));
        self.time.push(t);
        self.position.push(q);
        self.velocity.push(v);
        self.lambda.push(lambda);
        self.mu.push(mu);
    }

    pub(crate) fn finish(&mut self) {
        self.time.shrink_to_fit();
        self.position.shrink_to_fit();
        self.velocity.shrink_to_fit();
        self.lambda.shrink_to_fit();
        self.mu.shrink_to_fit();
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Final sample, if any steps were recorded
    pub fn last(&self) -> Option<(f64, &DVector<f64>, &DVector<f64>)> {
        match (self.time.last(), self.position.last(), self.velocity.last()) {
            (Some(&t), Some(q), Some(v)) => Some((t, q, v)),
            _ => None,
        }
    }
}
