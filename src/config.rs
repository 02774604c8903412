//! Plain-data controller configuration.
//!
//! Matrices are written row-major as nested arrays, e.g.
//!
//! {
//!   "model": { "a": [[1.0]], "b": [[1.0, 0.0, 0.0, 0.0]], ... },
//!   "limits": { "roll": 10.0, "pitch": 10.0, "yaw": 5.0, "vertical_movement": 20.0 },
//!   "channel_order": ["roll", "pitch", "yaw", "vertical_movement"],
//!   "solver": { "tolerance": 1e-12, "max_iterations": 100 }
//! }
//!
//! Everything except `model` may be omitted.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::control::{ActuationLimits, Channel, PositionController, ACTUATION_CHANNELS};
use crate::dynamics::DynamicsModel;
use crate::error::{LqrError, Result};
use crate::riccati::SolverOptions;

/// Row-major model matrices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub a: Vec<Vec<f64>>,
    pub b: Vec<Vec<f64>>,
    pub q: Vec<Vec<f64>>,
    pub r: Vec<Vec<f64>>,
}

impl ModelConfig {
    pub fn from_model(model: &DynamicsModel) -> Self {
        ModelConfig {
            a: to_rows(model.a()),
            b: to_rows(model.b()),
            q: to_rows(model.q()),
            r: to_rows(model.r()),
        }
    }

    pub fn to_model(&self) -> Result<DynamicsModel> {
        DynamicsModel::build(
            to_matrix("a", &self.a)?,
            to_matrix("b", &self.b)?,
            to_matrix("q", &self.q)?,
            to_matrix("r", &self.r)?,
        )
    }
}

/// Everything needed to construct a [`PositionController`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub limits: ActuationLimits,
    #[serde(default = "default_channel_order")]
    pub channel_order: [Channel; ACTUATION_CHANNELS],
    #[serde(default)]
    pub solver: SolverOptions,
}

fn default_channel_order() -> [Channel; ACTUATION_CHANNELS] {
    Channel::ALL
}

impl ControllerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Captures a running controller's configuration.
    pub fn from_controller(controller: &PositionController) -> Self {
        ControllerConfig {
            model: ModelConfig::from_model(controller.model()),
            limits: *controller.limits(),
            channel_order: *controller.channel_order(),
            solver: *controller.solver_options(),
        }
    }

    pub fn build(&self) -> Result<PositionController> {
        PositionController::builder(self.model.to_model()?)
            .limits(self.limits)
            .channel_order(self.channel_order)
            .solver_options(self.solver)
            .build()
    }
}

fn to_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter()
        .map(|row| row.iter().copied().collect())
        .collect()
}

fn to_matrix(name: &str, rows: &[Vec<f64>]) -> Result<DMatrix<f64>> {
    let ncols = rows.first().map(Vec::len).unwrap_or(0);
    if let Some((index, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != ncols) {
        return Err(LqrError::DimensionMismatch(format!(
            "{name}: row {index} has {} columns, expected {ncols}",
            row.len()
        )));
    }
    Ok(DMatrix::from_row_iterator(
        rows.len(),
        ncols,
        rows.iter().flatten().copied(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    const DECOUPLED: &str = r#"{
        "model": {
            "a": [[1, 0, 0, 0], [0, 1, 0, 0], [0, 0, 1, 0], [0, 0, 0, 1]],
            "b": [[1, 0, 0, 0], [0, 1, 0, 0], [0, 0, 1, 0], [0, 0, 0, 1]],
            "q": [[1, 0, 0, 0], [0, 1, 0, 0], [0, 0, 1, 0], [0, 0, 0, 1]],
            "r": [[1, 0, 0, 0], [0, 1, 0, 0], [0, 0, 1, 0], [0, 0, 0, 1]]
        },
        "limits": { "roll": 0.5 }
    }"#;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = ControllerConfig::from_json(DECOUPLED).unwrap();

        assert_eq!(config.limits.roll, 0.5);
        assert_eq!(config.limits.pitch, 20.0);
        assert_eq!(config.channel_order, Channel::ALL);
        assert_eq!(config.solver, SolverOptions::default());
    }

    #[test]
    fn test_build_from_json() {
        let mut controller = ControllerConfig::from_json(DECOUPLED).unwrap().build().unwrap();
        controller.set_desired_state(DVector::zeros(4)).unwrap();
        controller
            .set_current_state(DVector::from_vec(vec![10.0, 0.0, 0.0, 0.0]))
            .unwrap();

        assert_eq!(controller.compute_command().unwrap().roll, -0.5);
    }

    #[test]
    fn test_json_round_trip() {
        let config = ControllerConfig::from_json(DECOUPLED).unwrap();
        let controller = config.build().unwrap();

        let captured = ControllerConfig::from_controller(&controller);
        let reparsed = ControllerConfig::from_json(&captured.to_json().unwrap()).unwrap();

        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_ragged_matrix_rejected() {
        let json = r#"{ "model": { "a": [[1, 0], [0]], "b": [[1], [0]], "q": [[1, 0], [0, 1]], "r": [[1]] } }"#;
        let config = ControllerConfig::from_json(json).unwrap();

        assert!(matches!(
            config.model.to_model(),
            Err(LqrError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_parse_errors_are_config_errors() {
        assert!(matches!(
            ControllerConfig::from_json("{ \"limits\": {} }"),
            Err(LqrError::Config(_))
        ));
        assert!(matches!(
            ControllerConfig::from_json(
                r#"{ "model": { "a": [], "b": [], "q": [], "r": [] }, "channel_order": ["up"] }"#
            ),
            Err(LqrError::Config(_))
        ));
    }
}
