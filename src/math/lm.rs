//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimizes `0.5 * ||r(x)||^2` for a residual function `r: R^p -> R^n`.
//!
//! Two entry points:
//!
//! - [`least_squares`]: free parameters.
//! - [`least_squares_bounded`]: box-constrained parameters. Every trial point,
//!   including finite-difference probes, is clamped into the box, so the
//!   residual function is never evaluated outside it.
//!
//! Implementation choices:
//! - Forward-difference Jacobian (backward at an upper bound).
//! - Marquardt scaling with running-max column norms, so the iteration is
//!   invariant to parameter units (`rho0 ~ 1e-21` next to `r0 ~ 1e20`).
//! - Each damped step solves the augmented system
//!   `[J D^-1; sqrt(lambda) I] u = [-r; 0]`, `step = D^-1 u`, via SVD.
//! - Nielsen's damping update.
//! - Stopping rules follow MINPACK: scaled gradient (`gtol`), relative cost
//!   reduction (`ftol`), scaled step (`xtol`).
//! - Bounds use an active set: a variable sitting on a bound whose gradient
//!   points outward is frozen for that iteration.

use nalgebra::{DMatrix, DVector};

use crate::domain::{SolverOptions, Termination};
use crate::math::linalg::{column_norms, covariance_from_jacobian, solve_least_squares};

const INITIAL_DAMPING: f64 = 1e-3;
const MIN_DAMPING: f64 = 1e-15;
const MAX_DAMPING: f64 = 1e32;

/// Box constraints `lower <= x <= upper`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl Bounds {
    /// # Panics
    /// Panics if `lower` and `upper` differ in length.
    pub fn new(lower: &[f64], upper: &[f64]) -> Self {
        assert_eq!(lower.len(), upper.len(), "bounds must have matching lengths");
        Self {
            lower: DVector::from_column_slice(lower),
            upper: DVector::from_column_slice(upper),
        }
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    pub fn lower(&self) -> &DVector<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &DVector<f64> {
        &self.upper
    }

    pub fn contains(&self, x: &DVector<f64>) -> bool {
        x.len() == self.len()
            && x
                .iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(&v, (&lo, &hi))| v >= lo && v <= hi)
    }

    fn clamp(&self, x: &mut DVector<f64>) {
        for j in 0..x.len() {
            x[j] = x[j].clamp(self.lower[j], self.upper[j]);
        }
    }
}

/// Successful solve: the iterate reached a stationary point.
#[derive(Debug, Clone)]
pub struct LmReport {
    pub x: DVector<f64>,
    pub residuals: DVector<f64>,
    /// Jacobian at `x`.
    pub jacobian: DMatrix<f64>,
    /// `0.5 * ||r||^2`.
    pub cost: f64,
    pub termination: Termination,
    /// Trial steps taken.
    pub iterations: usize,
    /// Residual function evaluations, Jacobian probes included.
    pub evaluations: usize,
}

impl LmReport {
    pub fn sse(&self) -> f64 {
        2.0 * self.cost
    }

    /// Parameter covariance from the final linearization.
    pub fn covariance(&self) -> Option<DMatrix<f64>> {
        covariance_from_jacobian(&self.jacobian, self.sse())
    }
}

/// The solver stopped without reaching a stationary point.
#[derive(Debug, Clone)]
pub struct SolverFailure {
    pub iterations: usize,
    pub evaluations: usize,
    pub reason: String,
}

/// Unconstrained Levenberg–Marquardt.
pub fn least_squares<F>(residuals: F, x0: &[f64], opts: &SolverOptions) -> Result<LmReport, SolverFailure>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    minimize(&residuals, DVector::from_column_slice(x0), None, opts)
}

/// Box-constrained Levenberg–Marquardt. `x0` must lie inside `bounds`.
pub fn least_squares_bounded<F>(
    residuals: F,
    x0: &[f64],
    bounds: &Bounds,
    opts: &SolverOptions,
) -> Result<LmReport, SolverFailure>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let x = DVector::from_column_slice(x0);
    if !bounds.contains(&x) {
        return Err(SolverFailure {
            iterations: 0,
            evaluations: 0,
            reason: "initial guess lies outside the bounds".to_string(),
        });
    }
    minimize(&residuals, x, Some(bounds), opts)
}

struct Objective<'a, F> {
    f: &'a F,
    evaluations: usize,
}

impl<F> Objective<'_, F>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    fn eval(&mut self, x: &DVector<f64>) -> DVector<f64> {
        self.evaluations += 1;
        (self.f)(x)
    }

    fn jacobian(&mut self, x: &DVector<f64>, r: &DVector<f64>, bounds: Option<&Bounds>) -> DMatrix<f64> {
        let sqrt_eps = f64::EPSILON.sqrt();
        let mut jac = DMatrix::<f64>::zeros(r.len(), x.len());

        for j in 0..x.len() {
            let mut h = sqrt_eps * x[j].abs().max(f64::MIN_POSITIVE.sqrt());
            if let Some(b) = bounds {
                if x[j] + h > b.upper[j] {
                    h = -h;
                }
                if x[j] + h < b.lower[j] {
                    // Box narrower than the probe: use whatever room there is.
                    let up = b.upper[j] - x[j];
                    let down = b.lower[j] - x[j];
                    h = if up.abs() >= down.abs() { up } else { down };
                }
            }
            if h == 0.0 {
                continue;
            }

            let mut probe = x.clone();
            probe[j] += h;
            let h = probe[j] - x[j];
            let r_probe = self.eval(&probe);
            jac.set_column(j, &((r_probe - r) / h));
        }

        jac
    }
}

fn minimize<F>(
    f: &F,
    mut x: DVector<f64>,
    bounds: Option<&Bounds>,
    opts: &SolverOptions,
) -> Result<LmReport, SolverFailure>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut obj = Objective { f, evaluations: 0 };
    let mut iterations = 0usize;

    let fail = |iterations: usize, evaluations: usize, reason: &str| SolverFailure {
        iterations,
        evaluations,
        reason: reason.to_string(),
    };

    let mut r = obj.eval(&x);
    if !all_finite(&r) {
        return Err(fail(0, obj.evaluations, "residuals are not finite at the initial guess"));
    }
    if r.len() < x.len() {
        return Err(fail(0, obj.evaluations, "fewer residuals than parameters"));
    }
    let mut cost = 0.5 * r.norm_squared();

    let mut jac = obj.jacobian(&x, &r, bounds);
    if !all_finite_m(&jac) {
        return Err(fail(0, obj.evaluations, "Jacobian is not finite at the initial guess"));
    }
    let mut diag = column_norms(&jac).map(|c| if c > 0.0 { c } else { 1.0 });

    let mut lambda = INITIAL_DAMPING;
    let mut nu = 2.0;

    loop {
        if cost == 0.0 {
            return Ok(report(x, r, jac, cost, Termination::ZeroResidual, iterations, obj.evaluations));
        }

        let g = jac.transpose() * &r;
        let free = free_variables(&x, &g, bounds);
        if free.is_empty() || scaled_gradient_norm(&jac, &r, &g, &free) <= opts.gtol {
            return Ok(report(x, r, jac, cost, Termination::Gradient, iterations, obj.evaluations));
        }

        // Inner loop: grow the damping until a step lowers the cost.
        loop {
            if iterations >= opts.max_iterations {
                return Err(fail(iterations, obj.evaluations, "iteration budget exhausted"));
            }
            iterations += 1;

            let Some(step) = damped_step(&jac, &r, &diag, lambda, &free) else {
                lambda *= nu;
                nu *= 2.0;
                if lambda > MAX_DAMPING {
                    return Err(fail(iterations, obj.evaluations, "damped system could not be solved"));
                }
                continue;
            };

            let mut x_new = &x + &step;
            if let Some(b) = bounds {
                b.clamp(&mut x_new);
            }
            let s = &x_new - &x;
            let step_norm = diag.component_mul(&s).norm();
            let x_norm = diag.component_mul(&x).norm();
            let step_small = step_norm <= opts.xtol * (opts.xtol + x_norm);

            if step_norm == 0.0 {
                return Ok(report(x, r, jac, cost, Termination::StepSize, iterations, obj.evaluations));
            }

            let r_new = obj.eval(&x_new);
            let cost_new = if all_finite(&r_new) {
                0.5 * r_new.norm_squared()
            } else {
                f64::INFINITY
            };

            if cost_new < cost {
                let actual = cost - cost_new;
                let predicted = cost - 0.5 * (&r + &jac * &s).norm_squared();
                let rho = if predicted > 0.0 { actual / predicted } else { 1.0 };
                let cost_old = cost;

                x = x_new;
                r = r_new;
                cost = cost_new;
                lambda = (lambda * (1.0_f64 / 3.0).max(1.0 - (2.0 * rho - 1.0).powi(3))).max(MIN_DAMPING);
                nu = 2.0;

                let termination = if actual <= opts.ftol * cost_old && predicted <= opts.ftol * cost_old {
                    Some(Termination::CostReduction)
                } else if step_small {
                    Some(Termination::StepSize)
                } else {
                    None
                };

                jac = obj.jacobian(&x, &r, bounds);
                if !all_finite_m(&jac) {
                    return Err(fail(iterations, obj.evaluations, "Jacobian became non-finite"));
                }
                if let Some(termination) = termination {
                    return Ok(report(x, r, jac, cost, termination, iterations, obj.evaluations));
                }
                for (d, c) in diag.iter_mut().zip(column_norms(&jac).iter()) {
                    *d = d.max(*c);
                }
                break;
            }

            if step_small {
                return Ok(report(x, r, jac, cost, Termination::StepSize, iterations, obj.evaluations));
            }
            lambda *= nu;
            nu *= 2.0;
            if lambda > MAX_DAMPING {
                return Err(fail(iterations, obj.evaluations, "no descent step found"));
            }
        }
    }
}

fn report(
    x: DVector<f64>,
    residuals: DVector<f64>,
    jacobian: DMatrix<f64>,
    cost: f64,
    termination: Termination,
    iterations: usize,
    evaluations: usize,
) -> LmReport {
    LmReport {
        x,
        residuals,
        jacobian,
        cost,
        termination,
        iterations,
        evaluations,
    }
}

/// Indices not pinned against a bound by the gradient.
fn free_variables(x: &DVector<f64>, g: &DVector<f64>, bounds: Option<&Bounds>) -> Vec<usize> {
    (0..x.len())
        .filter(|&j| match bounds {
            None => true,
            Some(b) => {
                let at_lower = x[j] <= b.lower[j] && g[j] > 0.0;
                let at_upper = x[j] >= b.upper[j] && g[j] < 0.0;
                !(at_lower || at_upper)
            }
        })
        .collect()
}

/// MINPACK `gnorm`: largest cosine between the residual and a Jacobian column.
fn scaled_gradient_norm(jac: &DMatrix<f64>, r: &DVector<f64>, g: &DVector<f64>, free: &[usize]) -> f64 {
    let r_norm = r.norm();
    free.iter()
        .map(|&j| {
            let c = jac.column(j).norm();
            if c > 0.0 { (g[j] / (c * r_norm)).abs() } else { 0.0 }
        })
        .fold(0.0, f64::max)
}

fn damped_step(
    jac: &DMatrix<f64>,
    r: &DVector<f64>,
    diag: &DVector<f64>,
    lambda: f64,
    free: &[usize],
) -> Option<DVector<f64>> {
    let n = r.len();
    let k = free.len();
    let sqrt_lambda = lambda.sqrt();

    let mut a = DMatrix::<f64>::zeros(n + k, k);
    let mut rhs = DVector::<f64>::zeros(n + k);
    for (col, &j) in free.iter().enumerate() {
        for i in 0..n {
            a[(i, col)] = jac[(i, j)] / diag[j];
        }
        a[(n + col, col)] = sqrt_lambda;
    }
    for i in 0..n {
        rhs[i] = -r[i];
    }

    let u = solve_least_squares(&a, &rhs)?;
    let mut step = DVector::<f64>::zeros(jac.ncols());
    for (col, &j) in free.iter().enumerate() {
        step[j] = u[col] / diag[j];
    }
    all_finite(&step).then_some(step)
}

fn all_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

fn all_finite_m(m: &DMatrix<f64>) -> bool {
    m.iter().all(|x| x.is_finite())
}
