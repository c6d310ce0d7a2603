//! Bounded Levenberg-Marquardt least squares.
//!
//! Minimises `sum_i (y_i - f(x_i; p))^2` with box constraints on `p`, using the
//! analytic Jacobian of the function. Trial points are projected onto the
//! bounds. The damping follows Nielsen's update rule.

use super::traits::ParametricFunction;
use crate::data::Curve;
use nalgebra::{DMatrix, DVector};
use tracing::debug;

/// Scale of the initial damping relative to the largest diagonal entry of `JᵀJ`.
pub const LM_INIT_MU: f64 = 1e-3;
/// Stop when `‖Jᵀe‖∞` falls below this.
pub const LM_STOP_GRADIENT: f64 = 1e-12;
/// Stop when the step is this small relative to `‖p‖`.
pub const LM_STOP_STEP: f64 = 1e-12;
/// Stop when `‖e‖²` falls below this.
pub const LM_STOP_RESIDUAL: f64 = 1e-18;
/// Iteration cap.
pub const LM_MAX_ITERATIONS: usize = 1000;

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Nothing to fit.
    EmptyCurve,
    /// The function has no parameters.
    NoParameters,
    SmallGradient,
    SmallStep,
    SmallResidual,
    MaxIterations,
    /// The solver broke down on non-finite values.
    Singular,
}

/// Outcome of a fit besides the parameter values written back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    pub stop: StopReason,
    pub iterations: usize,
    /// Final `‖e‖²`.
    pub sum_sq: f64,
}

impl FitReport {
    fn skipped(stop: StopReason) -> Self {
        Self {
            stop,
            iterations: 0,
            sum_sq: f64::NAN,
        }
    }

    /// Stopped on one of the regular convergence criteria.
    pub fn converged(&self) -> bool {
        matches!(
            self.stop,
            StopReason::SmallGradient | StopReason::SmallStep | StopReason::SmallResidual
        )
    }
}

struct Problem<'a, F: ?Sized> {
    function: &'a F,
    xs: &'a [f64],
    ys: &'a [f64],
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl<F: ParametricFunction + ?Sized> Problem<'_, F> {
    /// Clamp onto the bounds. NaN stays NaN.
    fn project(&self, p: &DVector<f64>) -> DVector<f64> {
        DVector::from_fn(p.len(), |k, _| {
            let v = p[k];
            if v.is_nan() {
                v
            } else {
                v.max(self.lower[k]).min(self.upper[k])
            }
        })
    }

    fn residuals(&self, p: &DVector<f64>) -> DVector<f64> {
        let params = p.as_slice();
        DVector::from_fn(self.xs.len(), |i, _| {
            self.ys[i] - self.function.y(self.xs[i], Some(params))
        })
    }

    fn jacobian(&self, p: &DVector<f64>) -> DMatrix<f64> {
        let params = p.as_slice();
        DMatrix::from_fn(self.xs.len(), p.len(), |i, k| {
            self.function.dy(self.xs[i], k, Some(params))
        })
    }
}

/// Fit `function` to `curve`, writing the solved values and their standard
/// errors back into the function's parameters.
///
/// Values are written back whether or not the solver converged; the returned
/// report tells which. An empty curve leaves the function untouched.
pub fn fit<F: ParametricFunction + ?Sized>(function: &mut F, curve: &Curve) -> FitReport {
    if curve.is_empty() {
        return FitReport::skipped(StopReason::EmptyCurve);
    }
    let m = function.parameter_count();
    if m == 0 {
        return FitReport::skipped(StopReason::NoParameters);
    }

    let pars = function.parameters();
    let lower = DVector::from_iterator(m, pars.iter().map(|p| p.allowed_min()));
    let upper = DVector::from_iterator(m, pars.iter().map(|p| p.allowed_max()));
    let start = DVector::from_iterator(m, pars.iter().map(|p| p.value()));

    let problem = Problem {
        function: &*function,
        xs: curve.xs(),
        ys: curve.ys(),
        lower,
        upper,
    };
    let (p, report) = solve(&problem, start);
    let errors = parameter_errors(&problem, &p, report.sum_sq);

    debug!(
        function = function.name(),
        points = curve.len(),
        iterations = report.iterations,
        stop = ?report.stop,
        sum_sq = report.sum_sq,
        "fit finished"
    );

    for (k, par) in function.parameters_mut().iter_mut().enumerate() {
        par.set(p[k], errors[k]);
    }
    report
}

fn solve<F: ParametricFunction + ?Sized>(
    problem: &Problem<'_, F>,
    start: DVector<f64>,
) -> (DVector<f64>, FitReport) {
    let m = start.len();
    let mut p = problem.project(&start);
    let mut e = problem.residuals(&p);
    let mut sum_sq = e.norm_squared();
    let mut jac = problem.jacobian(&p);
    let mut jtj = jac.transpose() * &jac;
    let mut jte = jac.transpose() * &e;

    let max_diag = jtj.diagonal().amax();
    let mut mu = if max_diag > 0.0 {
        LM_INIT_MU * max_diag
    } else {
        LM_INIT_MU
    };
    let mut nu = 2.0;

    let mut stop = if sum_sq.is_finite() {
        StopReason::MaxIterations
    } else {
        StopReason::Singular
    };
    let mut iterations = 0;
    while stop != StopReason::Singular && iterations < LM_MAX_ITERATIONS {
        if jte.amax() <= LM_STOP_GRADIENT {
            stop = StopReason::SmallGradient;
            break;
        }
        if sum_sq <= LM_STOP_RESIDUAL {
            stop = StopReason::SmallResidual;
            break;
        }
        iterations += 1;

        let mut damped = jtj.clone();
        for k in 0..m {
            damped[(k, k)] += mu;
        }
        let step = match damped.cholesky() {
            Some(chol) => chol.solve(&jte),
            None => {
                mu *= nu;
                nu *= 2.0;
                if !mu.is_finite() {
                    stop = StopReason::Singular;
                    break;
                }
                continue;
            }
        };
        if step.iter().any(|v| !v.is_finite()) {
            stop = StopReason::Singular;
            break;
        }

        let p_new = problem.project(&(&p + &step));
        let dp = &p_new - &p;
        if dp.norm() <= LM_STOP_STEP * (p.norm() + LM_STOP_STEP) {
            stop = StopReason::SmallStep;
            break;
        }

        let e_new = problem.residuals(&p_new);
        let sum_sq_new = e_new.norm_squared();

        if sum_sq_new.is_finite() && sum_sq_new < sum_sq {
            let predicted = dp.dot(&(&dp * mu + &jte));
            let rho = if predicted > 0.0 {
                (sum_sq - sum_sq_new) / predicted
            } else {
                1.0
            };
            mu *= (1.0f64 / 3.0).max(1.0 - (2.0 * rho - 1.0).powi(3));
            nu = 2.0;

            p = p_new;
            e = e_new;
            sum_sq = sum_sq_new;
            jac = problem.jacobian(&p);
            jtj = jac.transpose() * &jac;
            jte = jac.transpose() * &e;
        } else {
            mu *= nu;
            nu *= 2.0;
            if !mu.is_finite() {
                stop = StopReason::Singular;
                break;
            }
        }
    }

    (
        p,
        FitReport {
            stop,
            iterations,
            sum_sq,
        },
    )
}

/// Standard errors from the covariance `pinv(JᵀJ) · ‖e‖² / (n - rank)`.
/// NaN when the covariance is undefined.
fn parameter_errors<F: ParametricFunction + ?Sized>(
    problem: &Problem<'_, F>,
    p: &DVector<f64>,
    sum_sq: f64,
) -> Vec<f64> {
    let m = p.len();
    let n = problem.xs.len();
    let nan = vec![f64::NAN; m];

    let jac = problem.jacobian(p);
    let jtj = jac.transpose() * &jac;
    if jtj.iter().any(|v| !v.is_finite()) {
        return nan;
    }

    let svd = jtj.svd(true, true);
    let max_sv = svd.singular_values.max();
    let tol = f64::EPSILON * m as f64 * max_sv;
    let rank = svd.rank(tol);
    if rank == 0 || n <= rank {
        return nan;
    }
    let covar = match svd.pseudo_inverse(tol) {
        Ok(inv) => inv * (sum_sq / (n - rank) as f64),
        Err(_) => return nan,
    };
    (0..m).map(|k| covar[(k, k)].max(0.0).sqrt()).collect()
}
