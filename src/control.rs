use nalgebra::{DVector, Vector4};
use serde::{Deserialize, Serialize};

use crate::dynamics::DynamicsModel;
use crate::error::{LqrError, Result};
use crate::gain::{self, GainMatrix};
use crate::riccati::{self, RiccatiSolution, SolverOptions};
use crate::stability::{self, StabilityReport};

/// Number of actuation channels accepted by the vehicle's direct command
/// interface.
pub const ACTUATION_CHANNELS: usize = 4;

/// One scalar axis of the direct command interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Roll,
    Pitch,
    Yaw,
    VerticalMovement,
}

impl Channel {
    /// All channels in command-vector order.
    pub const ALL: [Channel; ACTUATION_CHANNELS] = [
        Channel::Roll,
        Channel::Pitch,
        Channel::Yaw,
        Channel::VerticalMovement,
    ];

    /// Position of this channel in a [`CommandVector`] array.
    pub fn index(self) -> usize {
        match self {
            Channel::Roll => 0,
            Channel::Pitch => 1,
            Channel::Yaw => 2,
            Channel::VerticalMovement => 3,
        }
    }
}

/// Four-channel actuation command `[roll, pitch, yaw, vertical_movement]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandVector {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub vertical_movement: f64,
}

impl CommandVector {
    pub fn to_array(&self) -> [f64; ACTUATION_CHANNELS] {
        [self.roll, self.pitch, self.yaw, self.vertical_movement]
    }

    pub fn from_array(arr: &[f64; ACTUATION_CHANNELS]) -> Self {
        CommandVector {
            roll: arr[0],
            pitch: arr[1],
            yaw: arr[2],
            vertical_movement: arr[3],
        }
    }

    pub fn as_vector(&self) -> Vector4<f64> {
        Vector4::from(self.to_array())
    }

    pub fn get(&self, channel: Channel) -> f64 {
        self.to_array()[channel.index()]
    }

    /// Channels whose magnitude has reached the configured limit.
    pub fn saturated_channels(&self, limits: &ActuationLimits) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|&channel| self.get(channel).abs() >= limits.get(channel))
            .collect()
    }
}

/// Symmetric per-channel command bounds: channel i is kept in
/// [-limit_i, +limit_i].
///
/// The default of 20 on every channel corresponds to 20% of the normalized
/// ±100 power range of the Mambo's direct-drive interface.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuationLimits {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub vertical_movement: f64,
}

impl Default for ActuationLimits {
    fn default() -> Self {
        Self::uniform(20.0)
    }
}

impl ActuationLimits {
    /// The same limit on all four channels.
    pub fn uniform(limit: f64) -> Self {
        Self {
            roll: limit,
            pitch: limit,
            yaw: limit,
            vertical_movement: limit,
        }
    }

    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Roll => self.roll,
            Channel::Pitch => self.pitch,
            Channel::Yaw => self.yaw,
            Channel::VerticalMovement => self.vertical_movement,
        }
    }

    /// Checks that every limit is finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        for channel in Channel::ALL {
            let limit = self.get(channel);
            if !(limit.is_finite() && limit >= 0.0) {
                return Err(LqrError::InvalidLimits(format!(
                    "{channel:?} limit must be finite and non-negative, got {limit}"
                )));
            }
        }
        Ok(())
    }

    /// Independently saturates each channel.
    ///
    /// A NaN channel becomes 0 so the result always lies within the limits.
    pub fn clip(&self, command: &CommandVector) -> CommandVector {
        let mut clipped = command.to_array();
        for channel in Channel::ALL {
            let limit = self.get(channel);
            let value = clipped[channel.index()];
            clipped[channel.index()] = if value.is_nan() {
                0.0
            } else {
                value.clamp(-limit, limit)
            };
        }
        CommandVector::from_array(&clipped)
    }
}

/// Validates that `order` assigns every channel exactly once.
pub fn validate_channel_order(order: &[Channel; ACTUATION_CHANNELS]) -> Result<()> {
    for channel in Channel::ALL {
        if !order.contains(&channel) {
            return Err(LqrError::InvalidChannelOrder(format!(
                "{channel:?} is not driven by any input column of {order:?}"
            )));
        }
    }
    Ok(())
}

/// Builder for [`PositionController`] when the defaults do not fit.
///
/// # Example
///
/// let controller = PositionController::builder(model)
///     .limits(ActuationLimits::uniform(10.0))
///     .channel_order([Channel::VerticalMovement, Channel::Yaw, Channel::Pitch, Channel::Roll])
///     .build()?;
#[derive(Clone, Debug)]
pub struct PositionControllerBuilder {
    model: DynamicsModel,
    limits: ActuationLimits,
    channel_order: [Channel; ACTUATION_CHANNELS],
    solver: SolverOptions,
}

impl PositionControllerBuilder {
    pub fn limits(mut self, limits: ActuationLimits) -> Self {
        self.limits = limits;
        self
    }

    /// `order[j]` is the command channel driven by column j of B.
    pub fn channel_order(mut self, order: [Channel; ACTUATION_CHANNELS]) -> Self {
        self.channel_order = order;
        self
    }

    pub fn solver_options(mut self, options: SolverOptions) -> Self {
        self.solver = options;
        self
    }

    /// Solves the Riccati equation, derives the gain and returns a
    /// controller with both states unset.
    ///
    /// # Errors
    ///
    /// * `DimensionMismatch` - B does not have exactly four input columns
    /// * `InvalidLimits`, `InvalidChannelOrder` - bad configuration
    /// * `NoStabilizingSolution`, `SingularGainDenominator` - the model and
    ///   weights cannot produce a valid controller
    pub fn build(self) -> Result<PositionController> {
        if self.model.input_dim() != ACTUATION_CHANNELS {
            return Err(LqrError::DimensionMismatch(format!(
                "B must have {ACTUATION_CHANNELS} input columns, got {}",
                self.model.input_dim()
            )));
        }
        self.limits.validate()?;
        validate_channel_order(&self.channel_order)?;

        let riccati = riccati::solve_with(&self.model, &self.solver)?;
        let gain = gain::derive(&self.model, riccati.p())?;

        log::info!(
            "LQR controller ready: {} states, {} inputs, riccati solved in {} steps",
            self.model.state_dim(),
            self.model.input_dim(),
            riccati.iterations()
        );

        Ok(PositionController {
            model: self.model,
            riccati,
            gain,
            limits: self.limits,
            channel_order: self.channel_order,
            solver: self.solver,
            current_state: None,
            desired_state: None,
            current_cmd: None,
        })
    }
}

/// Static-gain LQR position controller.
///
/// The Riccati solution and gain are computed once at construction and reused
/// for every control tick. Each tick the flight loop feeds the latest
/// estimate and waypoint and reads back a bounded command:
///
/// set_current_state → (set_desired_state) → compute_command
///
/// The control law is
///
/// u = −K (x − x_des)
///
/// followed by independent per-channel saturation. There is no integral
/// action, filtering or rate limiting; each call is evaluated fresh from the
/// stored states.
#[derive(Clone, Debug)]
pub struct PositionController {
    model: DynamicsModel,
    riccati: RiccatiSolution,
    gain: GainMatrix,
    limits: ActuationLimits,
    channel_order: [Channel; ACTUATION_CHANNELS],
    solver: SolverOptions,

    current_state: Option<DVector<f64>>,
    desired_state: Option<DVector<f64>>,
    current_cmd: Option<CommandVector>,
}

impl PositionController {
    /// Creates a controller with default solver options, where column j of B
    /// drives channel `Channel::ALL[j]`.
    pub fn new(model: DynamicsModel, limits: ActuationLimits) -> Result<Self> {
        Self::builder(model).limits(limits).build()
    }

    pub fn builder(model: DynamicsModel) -> PositionControllerBuilder {
        PositionControllerBuilder {
            model,
            limits: ActuationLimits::default(),
            channel_order: Channel::ALL,
            solver: SolverOptions::default(),
        }
    }

    /// Overwrites the current state estimate.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if the state length differs from the model's n.
    pub fn set_current_state(&mut self, state: DVector<f64>) -> Result<()> {
        self.check_state("current", &state)?;
        self.current_state = Some(state);
        Ok(())
    }

    /// Overwrites the desired state (waypoint).
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if the state length differs from the model's n.
    pub fn set_desired_state(&mut self, state: DVector<f64>) -> Result<()> {
        self.check_state("desired", &state)?;
        self.desired_state = Some(state);
        Ok(())
    }

    /// Un-clipped feedback −K (x − x_des), arranged in channel order.
    pub fn raw_command(&self) -> Result<CommandVector> {
        let current = self
            .current_state
            .as_ref()
            .ok_or(LqrError::StateNotInitialized("current state has not been set"))?;
        let desired = self
            .desired_state
            .as_ref()
            .ok_or(LqrError::StateNotInitialized("desired state has not been set"))?;

        let u = self.gain.feedback(&(current - desired));

        let mut channels = [0.0; ACTUATION_CHANNELS];
        for (column, channel) in self.channel_order.iter().enumerate() {
            channels[channel.index()] = u[column];
        }
        Ok(CommandVector::from_array(&channels))
    }

    /// Evaluates the feedback law and saturates each channel to its limit.
    ///
    /// # Returns
    ///
    /// The bounded command, which is also stored for [`get_current_cmd`].
    ///
    /// # Errors
    ///
    /// `StateNotInitialized` until both the current and desired state have
    /// been set at least once.
    ///
    /// [`get_current_cmd`]: PositionController::get_current_cmd
    pub fn compute_command(&mut self) -> Result<CommandVector> {
        let raw = self.raw_command()?;
        let command = self.limits.clip(&raw);

        let saturated = raw.saturated_channels(&self.limits);
        if !saturated.is_empty() {
            log::debug!("command saturated on {saturated:?}: raw {:?}", raw.to_array());
        }

        self.current_cmd = Some(command);
        Ok(command)
    }

    /// The most recently computed command.
    ///
    /// # Errors
    ///
    /// `StateNotInitialized` if `compute_command` has never succeeded.
    pub fn get_current_cmd(&self) -> Result<CommandVector> {
        self.current_cmd
            .ok_or(LqrError::StateNotInitialized("no command has been computed"))
    }

    /// Closed-loop eigen-analysis of the cached gain.
    pub fn stability(&self) -> Result<StabilityReport> {
        stability::analyze(&self.model, &self.gain)
    }

    /// Forgets both states and the last command.
    pub fn reset(&mut self) {
        self.current_state = None;
        self.desired_state = None;
        self.current_cmd = None;
    }

    pub fn model(&self) -> &DynamicsModel {
        &self.model
    }

    pub fn riccati(&self) -> &RiccatiSolution {
        &self.riccati
    }

    pub fn gain(&self) -> &GainMatrix {
        &self.gain
    }

    pub fn limits(&self) -> &ActuationLimits {
        &self.limits
    }

    pub fn solver_options(&self) -> &SolverOptions {
        &self.solver
    }

    pub fn channel_order(&self) -> &[Channel; ACTUATION_CHANNELS] {
        &self.channel_order
    }

    pub fn current_state(&self) -> Option<&DVector<f64>> {
        self.current_state.as_ref()
    }

    pub fn desired_state(&self) -> Option<&DVector<f64>> {
        self.desired_state.as_ref()
    }

    fn check_state(&self, which: &str, state: &DVector<f64>) -> Result<()> {
        let n = self.model.state_dim();
        if state.len() != n {
            return Err(LqrError::DimensionMismatch(format!(
                "{which} state must have {n} elements, got {}",
                state.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    /// Four decoupled integrators, one per input.
    fn decoupled_model() -> DynamicsModel {
        DynamicsModel::build(
            DMatrix::identity(4, 4),
            DMatrix::identity(4, 4),
            DMatrix::identity(4, 4),
            DMatrix::identity(4, 4),
        )
        .unwrap()
    }

    fn primed_controller(limits: ActuationLimits) -> PositionController {
        let mut controller = PositionController::new(decoupled_model(), limits).unwrap();
        controller.set_current_state(DVector::zeros(4)).unwrap();
        controller.set_desired_state(DVector::zeros(4)).unwrap();
        controller
    }

    #[test]
    fn test_controller_creation() {
        let controller = PositionController::new(decoupled_model(), ActuationLimits::default())
            .unwrap();

        assert_eq!(controller.gain().shape(), (4, 4));
        assert_eq!(controller.limits().roll, 20.0);
        assert!(controller.current_state().is_none());
        assert!(controller.stability().unwrap().is_stable());
    }

    #[test]
    fn test_compute_before_states_are_set() {
        let mut controller = PositionController::new(decoupled_model(), ActuationLimits::default())
            .unwrap();

        assert!(matches!(
            controller.compute_command(),
            Err(LqrError::StateNotInitialized(_))
        ));
        assert!(matches!(
            controller.get_current_cmd(),
            Err(LqrError::StateNotInitialized(_))
        ));

        controller.set_current_state(DVector::zeros(4)).unwrap();
        assert!(matches!(
            controller.compute_command(),
            Err(LqrError::StateNotInitialized(_))
        ));
    }

    #[test]
    fn test_zero_error_gives_zero_command() {
        let mut controller = primed_controller(ActuationLimits::default());
        let state = DVector::from_vec(vec![1.5, -2.0, 0.3, 7.0]);
        controller.set_current_state(state.clone()).unwrap();
        controller.set_desired_state(state).unwrap();

        assert_eq!(controller.raw_command().unwrap(), CommandVector::default());
        assert_eq!(controller.compute_command().unwrap(), CommandVector::default());
    }

    #[test]
    fn test_feedback_opposes_error() {
        let mut controller = primed_controller(ActuationLimits::default());
        controller
            .set_current_state(DVector::from_vec(vec![1.0, 0.0, 0.0, 0.0]))
            .unwrap();

        let k = controller.gain().k()[(0, 0)];
        let command = controller.compute_command().unwrap();

        assert_relative_eq!(command.roll, -k, epsilon = 1e-12);
        assert_eq!(command.pitch, 0.0);
        assert_eq!(command.yaw, 0.0);
        assert_eq!(command.vertical_movement, 0.0);
    }

    #[test]
    fn test_independent_channel_clipping() {
        let mut controller = primed_controller(ActuationLimits {
            roll: 1.0,
            pitch: 2.0,
            yaw: 0.5,
            vertical_movement: 100.0,
        });
        controller
            .set_current_state(DVector::from_vec(vec![50.0, -50.0, 50.0, 1.0]))
            .unwrap();

        let raw = controller.raw_command().unwrap();
        let command = controller.compute_command().unwrap();

        assert_eq!(command.roll, -1.0);
        assert_eq!(command.pitch, 2.0);
        assert_eq!(command.yaw, -0.5);
        // Unsaturated channel passes through untouched
        assert_eq!(command.vertical_movement, raw.vertical_movement);
        assert_eq!(
            raw.saturated_channels(controller.limits()),
            vec![Channel::Roll, Channel::Pitch, Channel::Yaw]
        );
    }

    #[test]
    fn test_command_always_within_limits() {
        let limits = ActuationLimits {
            roll: 0.1,
            pitch: 3.0,
            yaw: 20.0,
            vertical_movement: 0.0,
        };
        let mut controller = primed_controller(limits);

        for i in 0..200 {
            let t = i as f64;
            let offset = DVector::from_vec(vec![
                1e6 * (0.37 * t).sin(),
                -(t * t),
                (1.3 * t).cos() * 1e-3,
                t - 100.0,
            ]);
            controller.set_current_state(offset).unwrap();
            let command = controller.compute_command().unwrap();

            for channel in Channel::ALL {
                assert!(command.get(channel).abs() <= limits.get(channel));
            }
        }
    }

    #[test]
    fn test_compute_is_idempotent_and_cached() {
        let mut controller = primed_controller(ActuationLimits::default());
        controller
            .set_current_state(DVector::from_vec(vec![0.2, -0.4, 1.0, 3.0]))
            .unwrap();

        let first = controller.compute_command().unwrap();
        let second = controller.compute_command().unwrap();
        assert_eq!(first, second);
        assert_eq!(controller.get_current_cmd().unwrap(), second);

        // Setting a new state does not recompute the cached command
        controller.set_current_state(DVector::zeros(4)).unwrap();
        assert_eq!(controller.get_current_cmd().unwrap(), first);
    }

    #[test]
    fn test_channel_order_routes_columns() {
        let mut controller = PositionController::builder(decoupled_model())
            .channel_order([
                Channel::VerticalMovement,
                Channel::Yaw,
                Channel::Pitch,
                Channel::Roll,
            ])
            .build()
            .unwrap();
        controller.set_desired_state(DVector::zeros(4)).unwrap();
        // Error only in state 0, which input column 0 corrects
        controller
            .set_current_state(DVector::from_vec(vec![1.0, 0.0, 0.0, 0.0]))
            .unwrap();

        let command = controller.compute_command().unwrap();
        assert!(command.vertical_movement < 0.0);
        assert_eq!(command.roll, 0.0);
    }

    #[test]
    fn test_wrong_state_length() {
        let mut controller = primed_controller(ActuationLimits::default());

        assert!(matches!(
            controller.set_current_state(DVector::zeros(6)),
            Err(LqrError::DimensionMismatch(_))
        ));
        assert!(matches!(
            controller.set_desired_state(DVector::zeros(3)),
            Err(LqrError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let result = PositionController::new(decoupled_model(), ActuationLimits::uniform(-1.0));
        assert!(matches!(result, Err(LqrError::InvalidLimits(_))));

        let result = PositionController::builder(decoupled_model())
            .channel_order([Channel::Roll, Channel::Roll, Channel::Yaw, Channel::Pitch])
            .build();
        assert!(matches!(result, Err(LqrError::InvalidChannelOrder(_))));

        let two_inputs = DynamicsModel::build(
            DMatrix::identity(2, 2),
            DMatrix::identity(2, 2),
            DMatrix::identity(2, 2),
            DMatrix::identity(2, 2),
        )
        .unwrap();
        let result = PositionController::new(two_inputs, ActuationLimits::default());
        assert!(matches!(result, Err(LqrError::DimensionMismatch(_))));
    }

    #[test]
    fn test_nan_channel_is_zeroed() {
        let limits = ActuationLimits::uniform(5.0);
        let command = CommandVector {
            roll: f64::NAN,
            pitch: f64::INFINITY,
            yaw: f64::NEG_INFINITY,
            vertical_movement: 1.0,
        };

        let clipped = limits.clip(&command);
        assert_eq!(clipped.to_array(), [0.0, 5.0, -5.0, 1.0]);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut controller = primed_controller(ActuationLimits::default());
        controller.compute_command().unwrap();

        controller.reset();

        assert!(controller.get_current_cmd().is_err());
        assert!(controller.compute_command().is_err());
    }
}
