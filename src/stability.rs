//! Closed-loop modal analysis.
//!
//! A discrete-time system under the law u = −Kx evolves as
//! x[k+1] = (A − BK) x[k]; it is asymptotically stable iff every eigenvalue
//! of A − BK lies strictly inside the unit circle. This is purely a
//! diagnostic for checking a Q/R tuning before flight. Nothing in the
//! controller runtime consults it.

use nalgebra::{Complex, DMatrix, DVector, Schur, SVD};

use crate::dynamics::DynamicsModel;
use crate::error::{LqrError, Result};
use crate::gain::GainMatrix;

const MAX_ITERATIONS: usize = 10_000;

/// One closed-loop mode.
#[derive(Clone, Debug, PartialEq)]
pub struct Mode {
    pub eigenvalue: Complex<f64>,
    /// |λ|
    pub magnitude: f64,
    /// Unit-norm right eigenvector (A − BK) v = λ v
    pub eigenvector: DVector<Complex<f64>>,
}

impl Mode {
    pub fn is_stable(&self) -> bool {
        self.magnitude < 1.0
    }
}

/// Result of [`analyze`].
#[derive(Clone, Debug, PartialEq)]
pub struct StabilityReport {
    closed_loop: DMatrix<f64>,
    modes: Vec<Mode>,
}

impl StabilityReport {
    /// The closed-loop transition matrix A − BK.
    pub fn closed_loop(&self) -> &DMatrix<f64> {
        &self.closed_loop
    }

    /// Modes ordered from largest to smallest magnitude.
    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    pub fn eigenvalues(&self) -> Vec<Complex<f64>> {
        self.modes.iter().map(|mode| mode.eigenvalue).collect()
    }

    pub fn magnitudes(&self) -> Vec<f64> {
        self.modes.iter().map(|mode| mode.magnitude).collect()
    }

    /// Largest eigenvalue magnitude.
    pub fn spectral_radius(&self) -> f64 {
        self.modes
            .first()
            .map(|mode| mode.magnitude)
            .unwrap_or(0.0)
    }

    /// True iff every eigenvalue magnitude is strictly less than 1.
    pub fn is_stable(&self) -> bool {
        self.modes.iter().all(Mode::is_stable)
    }
}

/// Forms A − BK and eigen-decomposes it.
///
/// # Errors
///
/// * `DimensionMismatch` - `gain` is not m×n for `model`
/// * `EigenDecomposition` - the closed loop has non-finite entries or the
///   Schur iteration fails to converge
pub fn analyze(model: &DynamicsModel, gain: &GainMatrix) -> Result<StabilityReport> {
    let expected = (model.input_dim(), model.state_dim());
    if gain.shape() != expected {
        return Err(LqrError::DimensionMismatch(format!(
            "K must be {}x{}, got {}x{}",
            expected.0,
            expected.1,
            gain.shape().0,
            gain.shape().1
        )));
    }

    let closed_loop = model.a() - model.b() * gain.k();
    let eigenvalues = eigenvalues(&closed_loop)?;

    let mut modes = eigenvalues
        .iter()
        .map(|&eigenvalue| {
            Ok(Mode {
                eigenvalue,
                magnitude: eigenvalue.norm(),
                eigenvector: eigenvector(&closed_loop, eigenvalue)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    modes.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));

    log::debug!(
        "closed-loop spectral radius {:.6} over {} modes",
        modes.first().map(|mode| mode.magnitude).unwrap_or(0.0),
        modes.len()
    );

    Ok(StabilityReport { closed_loop, modes })
}

/// Largest eigenvalue magnitude of a square matrix.
pub fn spectral_radius(m: &DMatrix<f64>) -> Result<f64> {
    Ok(eigenvalues(m)?
        .iter()
        .map(|lambda| lambda.norm())
        .fold(0.0, f64::max))
}

fn eigenvalues(m: &DMatrix<f64>) -> Result<DVector<Complex<f64>>> {
    if !m.iter().all(|x| x.is_finite()) {
        return Err(LqrError::EigenDecomposition(
            "matrix has non-finite entries".into(),
        ));
    }
    let schur = Schur::try_new(m.clone(), f64::EPSILON, MAX_ITERATIONS).ok_or_else(|| {
        LqrError::EigenDecomposition("Schur iteration did not converge".into())
    })?;
    Ok(schur.complex_eigenvalues())
}

/// Right singular vector of (M − λI) with the smallest singular value.
fn eigenvector(m: &DMatrix<f64>, lambda: Complex<f64>) -> Result<DVector<Complex<f64>>> {
    let mut shifted = m.map(|x| Complex::new(x, 0.0));
    for i in 0..shifted.nrows() {
        shifted[(i, i)] -= lambda;
    }

    let svd = SVD::try_new(shifted, false, true, f64::EPSILON, MAX_ITERATIONS)
        .ok_or_else(|| LqrError::EigenDecomposition("SVD did not converge".into()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| LqrError::EigenDecomposition("SVD returned no right vectors".into()))?;

    let smallest = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(index, _)| index)
        .unwrap_or(0);

    Ok(v_t.row(smallest).adjoint().normalize())
}
