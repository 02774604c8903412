use nalgebra::{DMatrix, DVector};

use crate::dynamics::DynamicsModel;
use crate::error::{LqrError, Result};

/// Static state-feedback gain K (m×n) of the law u = −K x.
#[derive(Clone, Debug, PartialEq)]
pub struct GainMatrix {
    k: DMatrix<f64>,
}

impl GainMatrix {
    pub fn k(&self) -> &DMatrix<f64> {
        &self.k
    }

    /// Raw feedback u = −K·error.
    pub fn feedback(&self, error: &DVector<f64>) -> DVector<f64> {
        -(&self.k * error)
    }

    /// Shape as (inputs, states).
    pub fn shape(&self) -> (usize, usize) {
        self.k.shape()
    }
}

/// Computes K = (BᵀPB + R)⁻¹ BᵀPA.
///
/// # Errors
///
/// * `DimensionMismatch` - `p` is not n×n for this model
/// * `SingularGainDenominator` - BᵀPB + R cannot be inverted
pub fn derive(model: &DynamicsModel, p: &DMatrix<f64>) -> Result<GainMatrix> {
    let n = model.state_dim();
    if p.shape() != (n, n) {
        return Err(LqrError::DimensionMismatch(format!(
            "P must be {n}x{n}, got {}x{}",
            p.nrows(),
            p.ncols()
        )));
    }

    let b = model.b();
    let bt_p = b.transpose() * p;
    let denominator = &bt_p * b + model.r();

    let k = denominator
        .lu()
        .solve(&(bt_p * model.a()))
        .ok_or(LqrError::SingularGainDenominator)?;

    if !k.iter().all(|x| x.is_finite()) {
        return Err(LqrError::SingularGainDenominator);
    }

    Ok(GainMatrix { k })
}
