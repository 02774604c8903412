//! Steady-state solution of the discrete algebraic Riccati equation.
//!
//! The solver uses the Structured Doubling Algorithm (SDA). Starting from
//! G₀ = B R⁻¹ Bᵀ, H₀ = Q and A₀ = A, each step squares the underlying
//! symplectic pencil:
//!
//! W_k     = I + G_k H_k
//! A_{k+1} = A_k W_k⁻¹ A_k
//! G_{k+1} = G_k + A_k W_k⁻¹ G_k A_kᵀ
//! H_{k+1} = H_k + A_kᵀ H_k W_k⁻¹ A_k
//!
//! H_k converges quadratically to the stabilizing solution P whenever
//! (A, B) is stabilizable and (A, Q^½) is detectable. The converged candidate
//! is then checked against the equation itself, for semidefiniteness and for
//! closed-loop stability before it is handed out.

use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

use crate::dynamics::DynamicsModel;
use crate::error::{LqrError, Result};
use crate::gain;
use crate::stability;

/// Iteration controls for [`solve`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Relative step size ‖H_{k+1} - H_k‖ / max(1, ‖H_{k+1}‖) at which the
    /// doubling iteration is considered converged
    pub tolerance: f64,
    /// Upper bound on doubling steps. The method converges in a handful of
    /// steps for well-posed problems.
    pub max_iterations: usize,
    /// Largest accepted DARE residual, relative to max(1, ‖P‖)
    pub residual_tolerance: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            max_iterations: 100,
            residual_tolerance: 1e-8,
        }
    }
}

/// The stabilizing solution P of the DARE for one model.
#[derive(Clone, Debug, PartialEq)]
pub struct RiccatiSolution {
    p: DMatrix<f64>,
    iterations: usize,
    residual: f64,
}

impl RiccatiSolution {
    /// The solution matrix P (n×n, symmetric positive-semidefinite).
    pub fn p(&self) -> &DMatrix<f64> {
        &self.p
    }

    /// Number of doubling steps taken.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Frobenius norm of the DARE residual at P.
    pub fn residual(&self) -> f64 {
        self.residual
    }
}

/// Solves the DARE for `model` with default [`SolverOptions`].
pub fn solve(model: &DynamicsModel) -> Result<RiccatiSolution> {
    solve_with(model, &SolverOptions::default())
}

/// Solves
///
/// P = AᵀPA − (AᵀPB)(R + BᵀPB)⁻¹(BᵀPA) + Q
///
/// for the unique stabilizing symmetric positive-semidefinite P.
///
/// # Errors
///
/// `NoStabilizingSolution` when the doubling iteration breaks down (singular
/// W_k, non-finite iterates, no convergence) or when the converged matrix is
/// not a stabilizing PSD solution of the equation.
pub fn solve_with(model: &DynamicsModel, options: &SolverOptions) -> Result<RiccatiSolution> {
    let n = model.state_dim();
    let a = model.a();
    let b = model.b();

    let r_inv = model
        .r()
        .clone()
        .try_inverse()
        .ok_or_else(|| no_solution("R is not invertible"))?;

    let identity = DMatrix::<f64>::identity(n, n);
    let mut a_k = a.clone();
    let mut g_k = symmetrize(&(b * r_inv * b.transpose()));
    let mut h_k = model.q().clone();

    let mut converged = None;
    for iteration in 1..=options.max_iterations {
        let w = &identity + &g_k * &h_k;
        let w_inv = w
            .lu()
            .try_inverse()
            .ok_or_else(|| no_solution("doubling step produced a singular I + GH"))?;

        let a_w = &a_k * &w_inv;
        let a_next = &a_w * &a_k;
        let g_next = symmetrize(&(&g_k + &a_w * &g_k * a_k.transpose()));
        let h_next = symmetrize(&(&h_k + a_k.transpose() * &h_k * &w_inv * &a_k));

        if !all_finite(&a_next) || !all_finite(&g_next) || !all_finite(&h_next) {
            return Err(no_solution(format!(
                "doubling iterates diverged at step {iteration}"
            )));
        }

        let step = (&h_next - &h_k).norm();
        let scale = h_next.norm().max(1.0);
        if !(step.is_finite() && scale.is_finite()) {
            return Err(no_solution(format!(
                "doubling iterates overflowed at step {iteration}"
            )));
        }
        log::trace!("riccati step {iteration}: ‖ΔH‖ = {step:e}, ‖H‖ = {scale:e}");

        a_k = a_next;
        g_k = g_next;
        h_k = h_next;

        if step <= options.tolerance * scale {
            converged = Some(iteration);
            break;
        }
    }

    let iterations = converged.ok_or_else(|| {
        no_solution(format!(
            "doubling did not converge within {} steps",
            options.max_iterations
        ))
    })?;
    let p = h_k;

    check_semidefinite(&p)?;

    let k = gain::derive(model, &p).map_err(|_| no_solution("BᵀPB + R is singular at P"))?;
    let a_cl = a - b * k.k();
    let radius = stability::spectral_radius(&a_cl)
        .map_err(|e| no_solution(format!("closed-loop eigenvalues unavailable: {e}")))?;
    if radius >= 1.0 {
        return Err(no_solution(format!(
            "closed loop is not stable (spectral radius {radius:.6}); \
             (A, B) must be stabilizable and (A, Q^½) detectable"
        )));
    }

    let residual = dare_residual(model, &p)
        .ok_or_else(|| no_solution("R + BᵀPB is singular at P"))?
        .norm();
    let scale = p.norm().max(1.0);
    if !(residual <= options.residual_tolerance * scale) {
        return Err(no_solution(format!(
            "DARE residual {residual:e} exceeds tolerance"
        )));
    }

    log::debug!(
        "riccati converged in {iterations} steps (residual {residual:e}, closed-loop radius {radius:.6})"
    );

    Ok(RiccatiSolution {
        p,
        iterations,
        residual,
    })
}

/// Evaluates AᵀPA − P − (AᵀPB)(R + BᵀPB)⁻¹(BᵀPA) + Q.
///
/// Returns `None` if R + BᵀPB is singular.
pub fn dare_residual(model: &DynamicsModel, p: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let a = model.a();
    let b = model.b();
    let at_p = a.transpose() * p;
    let bt_p = b.transpose() * p;
    let denominator = (model.r() + &bt_p * b).lu().try_inverse()?;

    Some(&at_p * a - p - &at_p * b * denominator * bt_p * a + model.q())
}

fn check_semidefinite(p: &DMatrix<f64>) -> Result<()> {
    let eigen = SymmetricEigen::try_new(p.clone(), f64::EPSILON, 10_000)
        .ok_or_else(|| no_solution("eigen decomposition of P did not converge"))?;
    let smallest = eigen.eigenvalues.min();
    if smallest < -1e-9 * p.norm().max(1.0) {
        return Err(no_solution(format!(
            "P is not positive-semidefinite (smallest eigenvalue {smallest:e})"
        )));
    }
    Ok(())
}

fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    (m + m.transpose()) * 0.5
}

fn all_finite(m: &DMatrix<f64>) -> bool {
    m.iter().all(|x| x.is_finite())
}

fn no_solution(reason: impl Into<String>) -> LqrError {
    LqrError::NoStabilizingSolution(reason.into())
}
