use nalgebra::{DMatrix, SymmetricEigen};

use crate::error::{LqrError, Result};

/// Relative tolerance used when checking that a cost matrix is symmetric
/// and semidefinite.
const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Linearized discrete-time vehicle model with its quadratic cost weights.
///
/// The model describes the system
///
/// x[k+1] = A x[k] + B u[k]
///
/// together with the infinite-horizon cost
///
/// J = Σ x[k]ᵀ Q x[k] + u[k]ᵀ R u[k]
///
/// # Fields
///
/// * `a` - State transition matrix (n×n)
/// * `b` - Input matrix (n×m)
/// * `q` - State cost (n×n, symmetric positive-semidefinite)
/// * `r` - Input cost (m×m, symmetric positive-definite)
///
/// A `DynamicsModel` can only be obtained through [`DynamicsModel::build`]
/// (or [`DynamicsModel::from_continuous`]), so every instance in the program
/// is dimensionally conformant.
#[derive(Clone, Debug, PartialEq)]
pub struct DynamicsModel {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    q: DMatrix<f64>,
    r: DMatrix<f64>,
}

impl DynamicsModel {
    /// Validates and stores a discrete-time model.
    ///
    /// # Errors
    ///
    /// * `DimensionMismatch` - `A` is not square, `B` does not have n rows,
    ///   `Q` is not n×n, `R` is not m×m, or n or m is zero
    /// * `InvalidWeights` - a matrix holds non-finite entries, `Q` is not
    ///   symmetric positive-semidefinite, or `R` is not symmetric
    ///   positive-definite
    ///
    /// # Example
    ///
    /// let model = DynamicsModel::build(
    ///     DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]),
    ///     DMatrix::from_row_slice(2, 1, &[0.5, 1.0]),
    ///     DMatrix::identity(2, 2),
    ///     DMatrix::identity(1, 1),
    /// )?;
    /// assert_eq!(model.state_dim(), 2);
    pub fn build(
        a: DMatrix<f64>,
        b: DMatrix<f64>,
        q: DMatrix<f64>,
        r: DMatrix<f64>,
    ) -> Result<Self> {
        check_dimensions(&a, &b, &q, &r)?;

        for (name, m) in [("A", &a), ("B", &b), ("Q", &q), ("R", &r)] {
            if !m.iter().all(|x| x.is_finite()) {
                return Err(LqrError::InvalidWeights(format!(
                    "{name} contains non-finite entries"
                )));
            }
        }

        check_symmetric("Q", &q)?;
        check_symmetric("R", &r)?;

        let q_eigen = SymmetricEigen::try_new(q.clone(), f64::EPSILON, 10_000).ok_or_else(
            || LqrError::InvalidWeights("Q eigen decomposition did not converge".into()),
        )?;
        let q_min = q_eigen.eigenvalues.min();
        if q_min < -WEIGHT_TOLERANCE * q.norm().max(1.0) {
            return Err(LqrError::InvalidWeights(format!(
                "Q must be positive-semidefinite (smallest eigenvalue {q_min:e})"
            )));
        }

        if r.clone().cholesky().is_none() {
            return Err(LqrError::InvalidWeights(
                "R must be positive-definite".into(),
            ));
        }

        Ok(Self { a, b, q, r })
    }

    /// Builds a discrete model from a continuous-time linearization using a
    /// zero-order hold on the input.
    ///
    /// The augmented matrix M = [[A_c, B_c], [0, 0]]·dt is exponentiated and
    /// the discrete matrices read off its top blocks:
    ///
    /// e^M = [[A_d, B_d], [0, I]]
    ///
    /// # Arguments
    ///
    /// * `a_c` - Continuous state matrix (ẋ = A_c x + B_c u)
    /// * `b_c` - Continuous input matrix
    /// * `q`, `r` - Cost weights, used unchanged for the discrete problem
    /// * `dt` - Sample period in seconds, finite and strictly positive
    pub fn from_continuous(
        a_c: DMatrix<f64>,
        b_c: DMatrix<f64>,
        q: DMatrix<f64>,
        r: DMatrix<f64>,
        dt: f64,
    ) -> Result<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(LqrError::InvalidWeights(format!(
                "sample period must be finite and positive, got {dt}"
            )));
        }
        check_dimensions(&a_c, &b_c, &q, &r)?;

        let n = a_c.nrows();
        let m = b_c.ncols();

        let mut augmented = DMatrix::zeros(n + m, n + m);
        augmented.view_mut((0, 0), (n, n)).copy_from(&(&a_c * dt));
        augmented.view_mut((0, n), (n, m)).copy_from(&(&b_c * dt));

        let transition = augmented.exp();
        let a_d = transition.view((0, 0), (n, n)).into_owned();
        let b_d = transition.view((0, n), (n, m)).into_owned();

        Self::build(a_d, b_d, q, r)
    }

    /// Returns a copy of this model with new cost weights.
    pub fn with_weights(&self, q: DMatrix<f64>, r: DMatrix<f64>) -> Result<Self> {
        Self::build(self.a.clone(), self.b.clone(), q, r)
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b(&self) -> &DMatrix<f64> {
        &self.b
    }

    pub fn q(&self) -> &DMatrix<f64> {
        &self.q
    }

    pub fn r(&self) -> &DMatrix<f64> {
        &self.r
    }

    /// Number of states (n).
    pub fn state_dim(&self) -> usize {
        self.a.nrows()
    }

    /// Number of inputs (m).
    pub fn input_dim(&self) -> usize {
        self.b.ncols()
    }
}

fn check_dimensions(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> Result<()> {
    let n = a.nrows();
    if n == 0 || !a.is_square() {
        return Err(LqrError::DimensionMismatch(format!(
            "A must be square and non-empty, got {}x{}",
            a.nrows(),
            a.ncols()
        )));
    }
    if b.nrows() != n || b.ncols() == 0 {
        return Err(LqrError::DimensionMismatch(format!(
            "B must be {n}xm with m > 0, got {}x{}",
            b.nrows(),
            b.ncols()
        )));
    }
    let m = b.ncols();
    if q.shape() != (n, n) {
        return Err(LqrError::DimensionMismatch(format!(
            "Q must be {n}x{n}, got {}x{}",
            q.nrows(),
            q.ncols()
        )));
    }
    if r.shape() != (m, m) {
        return Err(LqrError::DimensionMismatch(format!(
            "R must be {m}x{m}, got {}x{}",
            r.nrows(),
            r.ncols()
        )));
    }
    Ok(())
}

fn check_symmetric(name: &str, m: &DMatrix<f64>) -> Result<()> {
    let asymmetry = (m - m.transpose()).norm();
    if asymmetry > WEIGHT_TOLERANCE * m.norm().max(1.0) {
        return Err(LqrError::InvalidWeights(format!(
            "{name} must be symmetric (‖{name} - {name}ᵀ‖ = {asymmetry:e})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn double_integrator() -> (DMatrix<f64>, DMatrix<f64>) {
        (
            DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]),
            DMatrix::from_row_slice(2, 1, &[0.5, 1.0]),
        )
    }

    #[test]
    fn test_build_conformant_model() {
        let (a, b) = double_integrator();
        let model =
            DynamicsModel::build(a, b, DMatrix::identity(2, 2), DMatrix::identity(1, 1)).unwrap();

        assert_eq!(model.state_dim(), 2);
        assert_eq!(model.input_dim(), 1);
    }

    #[test]
    fn test_wrong_b_rows_is_dimension_mismatch() {
        let (a, _) = double_integrator();
        let b = DMatrix::from_row_slice(3, 1, &[0.5, 1.0, 0.0]);

        let result = DynamicsModel::build(a, b, DMatrix::identity(2, 2), DMatrix::identity(1, 1));

        assert!(matches!(result, Err(LqrError::DimensionMismatch(_))));
    }

    #[test]
    fn test_non_square_a_and_wrong_weights() {
        let a = DMatrix::zeros(2, 3);
        let b = DMatrix::zeros(2, 1);
        let result = DynamicsModel::build(a, b, DMatrix::identity(2, 2), DMatrix::identity(1, 1));
        assert!(matches!(result, Err(LqrError::DimensionMismatch(_))));

        let (a, b) = double_integrator();
        let result = DynamicsModel::build(
            a.clone(),
            b.clone(),
            DMatrix::identity(3, 3),
            DMatrix::identity(1, 1),
        );
        assert!(matches!(result, Err(LqrError::DimensionMismatch(_))));

        let result = DynamicsModel::build(a, b, DMatrix::identity(2, 2), DMatrix::identity(2, 2));
        assert!(matches!(result, Err(LqrError::DimensionMismatch(_))));
    }

    #[test]
    fn test_rejects_bad_weights() {
        let (a, b) = double_integrator();

        // Indefinite Q
        let q = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]);
        let result = DynamicsModel::build(a.clone(), b.clone(), q, DMatrix::identity(1, 1));
        assert!(matches!(result, Err(LqrError::InvalidWeights(_))));

        // Asymmetric Q
        let q = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.0, 1.0]);
        let result = DynamicsModel::build(a.clone(), b.clone(), q, DMatrix::identity(1, 1));
        assert!(matches!(result, Err(LqrError::InvalidWeights(_))));

        // Zero R is only semidefinite
        let result = DynamicsModel::build(a.clone(), b.clone(), DMatrix::identity(2, 2), DMatrix::zeros(1, 1));
        assert!(matches!(result, Err(LqrError::InvalidWeights(_))));

        // NaN in A
        let mut bad_a = a;
        bad_a[(0, 1)] = f64::NAN;
        let result = DynamicsModel::build(bad_a, b, DMatrix::identity(2, 2), DMatrix::identity(1, 1));
        assert!(matches!(result, Err(LqrError::InvalidWeights(_))));
    }

    #[test]
    fn test_zero_order_hold_double_integrator() {
        let a_c = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 0.0]);
        let b_c = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let dt = 0.1;

        let model = DynamicsModel::from_continuous(
            a_c,
            b_c,
            DMatrix::identity(2, 2),
            DMatrix::identity(1, 1),
            dt,
        )
        .unwrap();

        let expected_a = DMatrix::from_row_slice(2, 2, &[1.0, dt, 0.0, 1.0]);
        let expected_b = DMatrix::from_row_slice(2, 1, &[0.5 * dt * dt, dt]);
        assert_relative_eq!(*model.a(), expected_a, epsilon = 1e-12);
        assert_relative_eq!(*model.b(), expected_b, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_order_hold_rejects_bad_period() {
        let a_c = DMatrix::zeros(1, 1);
        let b_c = DMatrix::identity(1, 1);
        for dt in [0.0, -0.01, f64::NAN] {
            let result = DynamicsModel::from_continuous(
                a_c.clone(),
                b_c.clone(),
                DMatrix::identity(1, 1),
                DMatrix::identity(1, 1),
                dt,
            );
            assert!(matches!(result, Err(LqrError::InvalidWeights(_))));
        }
    }

    #[test]
    fn test_with_weights_revalidates() {
        let (a, b) = double_integrator();
        let model =
            DynamicsModel::build(a, b, DMatrix::identity(2, 2), DMatrix::identity(1, 1)).unwrap();

        let heavier = model
            .with_weights(DMatrix::identity(2, 2) * 10.0, DMatrix::identity(1, 1))
            .unwrap();
        assert_eq!(heavier.q()[(0, 0)], 10.0);
        assert_eq!(heavier.a(), model.a());

        assert!(model
            .with_weights(DMatrix::identity(3, 3), DMatrix::identity(1, 1))
            .is_err());
    }
}
