use nalgebra::DVector;
use uav_lqr::presets::{self, MamboState};
use uav_lqr::program::{CommandSink, FlightProgram, HoldWaypoint};
use uav_lqr::sim::LinearPlant;
use uav_lqr::ActuationLimits;

/// Prints every command instead of sending it to a vehicle.
struct ConsoleSink;

impl CommandSink for ConsoleSink {
    type Error = std::convert::Infallible;

    fn send(&mut self, cmd: &uav_lqr::CommandVector) -> Result<(), Self::Error> {
        println!(
            "  cmd roll {:+.6} pitch {:+.6} yaw {:+.6} vertical {:+.6}",
            cmd.roll, cmd.pitch, cmd.yaw, cmd.vertical_movement
        );
        Ok(())
    }
}

// Example usage
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut controller = presets::mambo_controller(ActuationLimits::default())?;
    let model = controller.model().clone();

    let initial_state = MamboState {
        pitch: 0.1,
        velocity_x: 0.5,
        velocity_y: -0.2,
        roll_rate: 0.2,
        ..Default::default()
    };
    let mut plant = LinearPlant::new(model, initial_state.to_vector())?;
    let mut program = HoldWaypoint::new(DVector::zeros(presets::MAMBO_STATES));
    let mut sink = ConsoleSink;

    let ticks = 20;
    for tick in 0..ticks {
        program.on_sensor_update(&mut controller, plant.state())?;

        if let Some(command) = program.on_tick(&mut controller)? {
            sink.send(&command)?;
            plant.step(&command, controller.channel_order());
        }

        if let Some(state) = MamboState::from_vector(plant.state()) {
            println!(
                "{tick:3} vel ({:+.4}, {:+.4}, {:+.4}) att ({:+.4}, {:+.4}, {:+.4})",
                state.velocity_x,
                state.velocity_y,
                state.velocity_z,
                state.roll,
                state.pitch,
                state.yaw
            );
        }
    }

    Ok(())
}
