//! Integration tests for the constrained mechanical driver
//!
//! A planar pendulum written as a constrained particle is the reference
//! problem: the rod is the holonomic constraint x^2 + z^2 = 1 and gravity
//! the only applied force.

use approx::assert_relative_eq;
use cablesim::solvers::{betsch, betsch_monitored, consistent_multipliers, BetschOptions, TimeGrid};
use cablesim::ConstraintSet;
use nalgebra::{DMatrix, DVector};

const G: f64 = 9.81;

fn unit_rod() -> ConstraintSet {
    ConstraintSet::new()
        .with_holonomic(|q, _t| DVector::from_vec(vec![q[0] * q[0] + q[1] * q[1] - 1.0]))
        .with_holonomic_jacobian(|q, _t| DMatrix::from_row_slice(1, 2, &[2.0 * q[0], 2.0 * q[1]]))
}

fn gravity(_q: &DVector<f64>, _v: &DVector<f64>, _t: f64) -> DVector<f64> {
    DVector::from_vec(vec![0.0, -G])
}

#[test]
fn test_pendulum_long_run_invariants() {
    // Swinging start; over 500 steps the constraint must hold without
    // drift, the velocity must stay tangent and the energy must not leak
    let options = BetschOptions::new()
        .with_constraints(unit_rod())
        .with_max_step(0.01);
    let q0 = DVector::from_vec(vec![0.0, -1.0]);
    let v0 = DVector::from_vec(vec![1.0, 0.0]);
    let run = betsch(gravity, TimeGrid::span(0.0, 5.0), &q0, &v0, &options).unwrap();

    assert_eq!(run.len(), 501);
    let energy0 = 0.5 * v0.norm_squared() + G * q0[1];

    for i in 0..run.len() {
        let q = &run.position[i];
        let v = &run.velocity[i];

        let violation = (q[0] * q[0] + q[1] * q[1] - 1.0).abs();
        assert!(violation < 1e-6, "constraint drifted to {violation}");

        let tangency = (2.0 * (q[0] * v[0] + q[1] * v[1])).abs();
        assert!(tangency < 1e-2, "velocity left the tangent: {tangency}");

        // Constant force and a midpoint constraint Jacobian make the
        // discrete work balance exact, so energy is held to corrector
        // precision
        let energy = 0.5 * v.norm_squared() + G * q[1];
        assert!(
            (energy - energy0).abs() < 1e-6,
            "energy drifted by {}",
            energy - energy0
        );
    }
}

#[test]
fn test_hanging_pendulum_stays_at_rest() {
    let options = BetschOptions::new()
        .with_constraints(unit_rod())
        .with_max_step(0.1);
    let q0 = DVector::from_vec(vec![0.0, -1.0]);
    let v0 = DVector::zeros(2);
    let run = betsch(gravity, TimeGrid::span(0.0, 1.0), &q0, &v0, &options).unwrap();

    for i in 0..run.len() {
        assert_relative_eq!(run.position[i][0], 0.0, epsilon = 1e-9);
        assert_relative_eq!(run.position[i][1], -1.0, epsilon = 1e-9);
        assert!(run.velocity[i].norm() < 1e-9);
        // Rod tension balances gravity through the multiplier
        assert_relative_eq!(run.lambda[i][0], -G / 2.0, epsilon = 1e-6);
    }
}

#[test]
fn test_combined_constraint_families_at_rest() {
    // Rod plus a velocity-level lock on the x direction; at the bottom both
    // families are consistent with staying put
    let constraints =
        unit_rod().with_nonholonomic(|_q, _t| DMatrix::from_row_slice(1, 2, &[1.0, 0.0]));
    let options = BetschOptions::new()
        .with_constraints(constraints)
        .with_max_step(0.05);
    let q0 = DVector::from_vec(vec![0.0, -1.0]);
    let v0 = DVector::zeros(2);
    let run = betsch(gravity, TimeGrid::span(0.0, 0.5), &q0, &v0, &options).unwrap();

    let last = run.len() - 1;
    assert_relative_eq!(run.position[last][0], 0.0, epsilon = 1e-9);
    assert_relative_eq!(run.position[last][1], -1.0, epsilon = 1e-9);
    assert_relative_eq!(run.lambda[last][0], -G / 2.0, epsilon = 1e-6);
    assert_relative_eq!(run.mu[last][0], 0.0, epsilon = 1e-6);
}

#[test]
fn test_pendulum_released_from_an_angle() {
    // Released at rest 45 degrees off the bottom: the initial net force is
    // the tangential gravity component, which the multiplier solve must
    // accept, and the run must still hold the rod constraint throughout
    let options = BetschOptions::new()
        .with_constraints(unit_rod())
        .with_max_step(0.01);
    let s = std::f64::consts::FRAC_1_SQRT_2;
    let q0 = DVector::from_vec(vec![s, -s]);
    let v0 = DVector::zeros(2);
    let run = betsch(gravity, TimeGrid::span(0.0, 2.0), &q0, &v0, &options).unwrap();

    assert_eq!(run.len(), 201);
    for q in &run.position {
        let violation = (q[0] * q[0] + q[1] * q[1] - 1.0).abs();
        assert!(violation < 1e-6, "constraint drifted to {violation}");
    }

    // The pendulum actually swings: it passes well below the release height
    let lowest = run.position.iter().map(|q| q[1]).fold(0.0_f64, f64::min);
    assert!(lowest < -0.95, "pendulum never swung down, lowest {lowest}");
}

#[test]
fn test_consistent_multipliers_are_a_fixed_point() {
    // The initial multiplier solve is deterministic: solving the same
    // configuration again reproduces the multipliers exactly
    let constraints = unit_rod();
    let q0 = DVector::from_vec(vec![0.0, -1.0]);
    let v0 = DVector::zeros(2);

    let (lambda_a, mu_a, residual_a) =
        consistent_multipliers(gravity, &constraints, &q0, &v0, 0.0, 1e-8).unwrap();
    let (lambda_b, mu_b, residual_b) =
        consistent_multipliers(gravity, &constraints, &q0, &v0, 0.0, 1e-8).unwrap();

    assert_eq!(lambda_a, lambda_b);
    assert_eq!(mu_a, mu_b);
    assert_eq!(residual_a, residual_b);
    assert_relative_eq!(lambda_a[0], -G / 2.0, epsilon = 1e-6);
    assert!(residual_a < 1e-8);
}

#[test]
fn test_monitored_run_stops_early() {
    let options = BetschOptions::new().with_max_step(0.01);
    let q0 = DVector::from_vec(vec![0.0, 0.0]);
    let v0 = DVector::from_vec(vec![1.0, 0.0]);
    let mut stop_after = |t: f64, _q: &DVector<f64>| t < 0.05;
    let run = betsch_monitored(
        gravity,
        TimeGrid::span(0.0, 1.0),
        &q0,
        &v0,
        &options,
        &mut stop_after,
    )
    .unwrap();

    assert_eq!(run.len(), 6);
    let (t, _, _) = run.last().unwrap();
    assert_relative_eq!(t, 0.05, epsilon = 1e-12);
}
