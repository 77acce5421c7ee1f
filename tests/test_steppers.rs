//! Integration tests for the explicit steppers
//!
//! Adams-Bashforth convergence against known solutions and leapfrog
//! conservation behavior.

use approx::assert_relative_eq;
use cablesim::solvers::{adams, leapfrog, AdamsOptions, LeapfrogOptions, TimeGrid};
use nalgebra::DVector;

/// Final-time error for dx/dt = -x, x(0) = 1 over [0, 1]
fn decay_error(order: usize, h: f64) -> f64 {
    let options = AdamsOptions::new().with_max_order(order).with_max_step(h);
    let run = adams(
        |x, _t| -x,
        TimeGrid::span(0.0, 1.0),
        &DVector::from_vec(vec![1.0]),
        &options,
    )
    .unwrap();
    let (_, y) = run.last().unwrap();
    (y[0] - (-1.0_f64).exp()).abs()
}

/// Least-squares slope of log(error) against log(h)
fn convergence_slope(errors: &[f64], steps: &[f64]) -> f64 {
    let log_h: Vec<f64> = steps.iter().map(|&h| h.ln()).collect();
    let log_e: Vec<f64> = errors.iter().map(|&e| e.ln()).collect();

    let n = log_h.len() as f64;
    let sum_h: f64 = log_h.iter().sum();
    let sum_e: f64 = log_e.iter().sum();
    let sum_hh: f64 = log_h.iter().map(|&h| h * h).sum();
    let sum_he: f64 = log_h.iter().zip(&log_e).map(|(&h, &e)| h * e).sum();

    (n * sum_he - sum_h * sum_e) / (n * sum_hh - sum_h * sum_h)
}

#[test]
fn test_adams1_convergence_order() {
    let steps = [1.0 / 16.0, 1.0 / 32.0, 1.0 / 64.0, 1.0 / 128.0];
    let errors: Vec<f64> = steps.iter().map(|&h| decay_error(1, h)).collect();

    for i in 1..errors.len() {
        assert!(
            errors[i] < errors[i - 1],
            "error not decreasing at step {}",
            i
        );
    }
    let slope = convergence_slope(&errors, &steps);
    assert!(slope > 0.9, "convergence order {} < 0.9", slope);
}

#[test]
fn test_adams2_convergence_order() {
    let steps = [1.0 / 16.0, 1.0 / 32.0, 1.0 / 64.0, 1.0 / 128.0];
    let errors: Vec<f64> = steps.iter().map(|&h| decay_error(2, h)).collect();

    for i in 1..errors.len() {
        assert!(
            errors[i] < errors[i - 1],
            "error not decreasing at step {}",
            i
        );
    }
    let slope = convergence_slope(&errors, &steps);
    assert!(slope > 1.7, "convergence order {} < 1.7", slope);
}

#[test]
fn test_adams_high_order_accuracy() {
    let error = decay_error(5, 1e-3);
    assert!(error < 1e-6, "order-5 error {} too large", error);
}

#[test]
fn test_adams_circular_rotation() {
    // dx/dt = y, dy/dt = -x rotates (1, 0) to (cos t, -sin t)
    let options = AdamsOptions::new().with_max_order(4).with_max_step(1e-3);
    let run = adams(
        |x: &DVector<f64>, _t| DVector::from_vec(vec![x[1], -x[0]]),
        TimeGrid::span(0.0, 1.0),
        &DVector::from_vec(vec![1.0, 0.0]),
        &options,
    )
    .unwrap();

    let (t, y) = run.last().unwrap();
    assert_relative_eq!(t, 1.0, epsilon = 1e-12);
    assert_relative_eq!(y[0], 1.0_f64.cos(), epsilon = 1e-5);
    assert_relative_eq!(y[1], -(1.0_f64.sin()), epsilon = 1e-5);
}

#[test]
fn test_leapfrog_projectile_is_exact() {
    // Constant acceleration is integrated without truncation error
    let options = LeapfrogOptions::new().with_max_step(0.01);
    let q0 = DVector::from_vec(vec![0.0, 10.0]);
    let v0 = DVector::from_vec(vec![3.0, 4.0]);
    let run = leapfrog(
        |_q: &DVector<f64>, _v: &DVector<f64>, _t: f64| DVector::from_vec(vec![0.0, -9.81]),
        TimeGrid::span(0.0, 2.0),
        &q0,
        &v0,
        &options,
    )
    .unwrap();

    let (t, q, v) = run.last().unwrap();
    assert_relative_eq!(t, 2.0, epsilon = 1e-12);
    assert_relative_eq!(q[0], 6.0, epsilon = 1e-9);
    assert_relative_eq!(q[1], 10.0 + 8.0 - 0.5 * 9.81 * 4.0, epsilon = 1e-9);
    assert_relative_eq!(v[0], 3.0, epsilon = 1e-9);
    assert_relative_eq!(v[1], 4.0 - 9.81 * 2.0, epsilon = 1e-9);
}

#[test]
fn test_leapfrog_energy_bounded_long_run() {
    // Harmonic oscillator over 10000 steps; a symplectic stepper keeps the
    // energy error oscillatory instead of secular
    let options = LeapfrogOptions::new().with_max_step(0.01);
    let q0 = DVector::from_vec(vec![1.0]);
    let v0 = DVector::from_vec(vec![0.0]);
    let run = leapfrog(
        |q: &DVector<f64>, _v: &DVector<f64>, _t: f64| -q,
        TimeGrid::span(0.0, 100.0),
        &q0,
        &v0,
        &options,
    )
    .unwrap();

    assert_eq!(run.len(), 10_001);
    for i in 0..run.len() {
        let energy = 0.5 * (run.velocity[i][0].powi(2) + run.position[i][0].powi(2));
        assert!(
            (energy - 0.5).abs() < 1e-3,
            "energy drifted to {energy} at sample {i}"
        );
    }
}

#[test]
fn test_leapfrog_second_order_convergence() {
    let steps = [0.1, 0.05, 0.025, 0.0125];
    let mut errors = Vec::new();
    for &h in &steps {
        let options = LeapfrogOptions::new().with_max_step(h);
        let run = leapfrog(
            |q: &DVector<f64>, _v: &DVector<f64>, _t: f64| -q,
            TimeGrid::span(0.0, 1.0),
            &DVector::from_vec(vec![1.0]),
            &DVector::from_vec(vec![0.0]),
            &options,
        )
        .unwrap();
        let (_, q, _) = run.last().unwrap();
        errors.push((q[0] - 1.0_f64.cos()).abs());
    }

    let slope = convergence_slope(&errors, &steps);
    assert!(slope > 1.9, "convergence order {} < 1.9", slope);
}
