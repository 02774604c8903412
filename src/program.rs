//! Seams between the controller and the mission layer.
//!
//! A mission implements [`FlightProgram`]; the vehicle link implements
//! [`CommandSink`]. Neither knows about the other, and the controller knows
//! about neither.

use nalgebra::DVector;

use crate::control::{CommandVector, PositionController};
use crate::error::Result;

/// Per-mission behaviour driven by the external flight loop.
pub trait FlightProgram {
    /// Called once per control tick, after the latest state estimate has
    /// been delivered through [`FlightProgram::on_sensor_update`].
    ///
    /// Returns the command to send, or `None` to send nothing this tick.
    fn on_tick(&mut self, controller: &mut PositionController) -> Result<Option<CommandVector>>;

    /// Called for every estimator update.
    fn on_sensor_update(
        &mut self,
        controller: &mut PositionController,
        state: &DVector<f64>,
    ) -> Result<()> {
        controller.set_current_state(state.clone())
    }

    /// Called for every decoded video frame. Ignored by default.
    fn on_vision_frame(&mut self, _frame: &[u8]) {}
}

/// Outbound half of the vehicle link.
pub trait CommandSink {
    type Error;

    fn send(&mut self, command: &CommandVector) -> std::result::Result<(), Self::Error>;
}

/// Holds a single waypoint for the whole flight.
#[derive(Clone, Debug)]
pub struct HoldWaypoint {
    waypoint: DVector<f64>,
    armed: bool,
}

impl HoldWaypoint {
    pub fn new(waypoint: DVector<f64>) -> Self {
        Self {
            waypoint,
            armed: false,
        }
    }

    pub fn waypoint(&self) -> &DVector<f64> {
        &self.waypoint
    }
}

impl FlightProgram for HoldWaypoint {
    fn on_tick(&mut self, controller: &mut PositionController) -> Result<Option<CommandVector>> {
        if !self.armed {
            controller.set_desired_state(self.waypoint.clone())?;
            self.armed = true;
        }
        if controller.current_state().is_none() {
            return Ok(None);
        }
        controller.compute_command().map(Some)
    }
}
