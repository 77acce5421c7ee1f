//! Central-difference derivatives for residual and constraint functions

use nalgebra::{DMatrix, DVector};

/// Relative perturbation for central differences; the `1 + |x|` scaling
/// keeps the perturbation finite on zero components
const STEP_RATIO: f64 = 1e-3;

/// Compute the Jacobian of `f` at `x` using central differences
///
/// Works for rectangular systems: the result is `m x n` where `m` is the
/// residual length and `n` the unknown count.
pub fn jacobian<F>(f: &mut F, x: &DVector<f64>) -> DMatrix<f64>
where
    F: FnMut(&DVector<f64>) -> DVector<f64> + ?Sized,
{
    let n = x.len();
    let f0 = f(x);
    let m = f0.len();
    let mut jac = DMatrix::<f64>::zeros(m, n);

    let mut x_plus = x.clone();
    let mut x_minus = x.clone();

    for i in 0..n {
        let h = STEP_RATIO * (1.0 + x[i].abs());
        x_plus[i] = x[i] + h;
        x_minus[i] = x[i] - h;

        let f_plus = f(&x_plus);
        let f_minus = f(&x_minus);
        jac.set_column(i, &((f_plus - f_minus) / (2.0 * h)));

        x_plus[i] = x[i];
        x_minus[i] = x[i];
    }

    jac
}

/// Jacobian of a time-parameterized map `g(x, t)` with respect to `x`
///
/// Used for constraint functions evaluated along a trajectory.
pub fn jacobian_at<G>(g: &G, x: &DVector<f64>, t: f64) -> DMatrix<f64>
where
    G: Fn(&DVector<f64>, f64) -> DVector<f64> + ?Sized,
{
    let mut frozen = |x: &DVector<f64>| g(x, t);
    jacobian(&mut frozen, x)
}

/// Gradient of a scalar function by central differences
pub fn gradient<F>(f: &mut F, x: &DVector<f64>) -> DVector<f64>
where
    F: FnMut(&DVector<f64>) -> f64 + ?Sized,
{
    let n = x.len();
    let mut grad = DVector::<f64>::zeros(n);

    let mut x_plus = x.clone();
    let mut x_minus = x.clone();

    for i in 0..n {
        let h = STEP_RATIO * (1.0 + x[i].abs());
        x_plus[i] = x[i] + h;
        x_minus[i] = x[i] - h;

        grad[i] = (f(&x_plus) - f(&x_minus)) / (2.0 * h);

        x_plus[i] = x[i];
        x_minus[i] = x[i];
    }

    grad
}
