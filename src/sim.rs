use nalgebra::DVector;

use crate::control::{Channel, CommandVector, PositionController, ACTUATION_CHANNELS};
use crate::dynamics::DynamicsModel;
use crate::error::{LqrError, Result};

/// Discrete linear plant x[k+1] = A x[k] + B u[k].
///
/// Stands in for the vehicle when exercising a controller without hardware.
/// The plant consumes the same bounded [`CommandVector`] the vehicle would,
/// so saturation effects show up in the rollout.
#[derive(Clone, Debug)]
pub struct LinearPlant {
    model: DynamicsModel,
    state: DVector<f64>,
}

impl LinearPlant {
    /// # Errors
    ///
    /// `DimensionMismatch` if `initial_state` does not have n elements or the
    /// model does not have four inputs.
    pub fn new(model: DynamicsModel, initial_state: DVector<f64>) -> Result<Self> {
        if initial_state.len() != model.state_dim() {
            return Err(LqrError::DimensionMismatch(format!(
                "initial state must have {} elements, got {}",
                model.state_dim(),
                initial_state.len()
            )));
        }
        if model.input_dim() != ACTUATION_CHANNELS {
            return Err(LqrError::DimensionMismatch(format!(
                "plant must have {ACTUATION_CHANNELS} inputs, got {}",
                model.input_dim()
            )));
        }
        Ok(Self {
            model,
            state: initial_state,
        })
    }

    pub fn state(&self) -> &DVector<f64> {
        &self.state
    }

    /// Applies one command. `channel_order[j]` names the channel feeding
    /// input column j, as in [`PositionController::channel_order`].
    pub fn step(
        &mut self,
        command: &CommandVector,
        channel_order: &[Channel; ACTUATION_CHANNELS],
    ) -> &DVector<f64> {
        let u = DVector::from_iterator(
            ACTUATION_CHANNELS,
            channel_order.iter().map(|&channel| command.get(channel)),
        );
        self.state = self.model.a() * &self.state + self.model.b() * u;
        &self.state
    }
}

/// Runs `ticks` control ticks of `controller` against `plant`, holding
/// `desired` as the waypoint.
///
/// Returns the plant state after every tick.
pub fn closed_loop_rollout(
    controller: &mut PositionController,
    plant: &mut LinearPlant,
    desired: &DVector<f64>,
    ticks: usize,
) -> Result<Vec<DVector<f64>>> {
    controller.set_desired_state(desired.clone())?;

    let mut trajectory = Vec::with_capacity(ticks);
    for _ in 0..ticks {
        controller.set_current_state(plant.state().clone())?;
        let command = controller.compute_command()?;
        let next = plant.step(&command, controller.channel_order());
        trajectory.push(next.clone());
    }
    Ok(trajectory)
}
