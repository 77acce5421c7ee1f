//! Step observation and early termination

use nalgebra::DVector;

/// Observer invoked by the monitored drivers as the integration proceeds
///
/// `step` runs after each accepted on-grid sample and may stop the run by
/// returning `false`; the trajectory up to and including that sample is
/// returned as a normal result. Closures of the shape
/// `FnMut(f64, &DVector<f64>) -> bool` implement this trait directly.
pub trait StepMonitor {
    /// Called once before the first step
    fn init(&mut self, _t0: f64, _tf: f64, _y0: &DVector<f64>) {}

    /// Called after each recorded sample; return `false` to stop the run
    fn step(&mut self, _t: f64, _y: &DVector<f64>) -> bool {
        true
    }

    /// Called once after the run ends, whether it completed or was stopped
    fn done(&mut self) {}
}

/// Monitor that observes nothing and never stops the run
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMonitor;

impl StepMonitor for NoMonitor {}

impl<F> StepMonitor for F
where
    F: FnMut(f64, &DVector<f64>) -> bool,
{
    fn step(&mut self, t: f64, y: &DVector<f64>) -> bool {
        self(t, y)
    }
}
