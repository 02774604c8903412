//! Fixed-number vehicle models.

use nalgebra::{DMatrix, DVector};

use crate::control::{ActuationLimits, Channel, PositionController, ACTUATION_CHANNELS};
use crate::dynamics::DynamicsModel;
use crate::error::Result;

/// Number of states in the Mambo linearization.
pub const MAMBO_STATES: usize = 12;

/// Scale applied to the Mambo input matrix.
pub const MAMBO_INPUT_SCALE: f64 = 10_000.0;

/// Column j of the Mambo input matrix drives `MAMBO_CHANNEL_ORDER[j]`.
pub const MAMBO_CHANNEL_ORDER: [Channel; ACTUATION_CHANNELS] = [
    Channel::VerticalMovement,
    Channel::Yaw,
    Channel::Pitch,
    Channel::Roll,
];

#[rustfmt::skip]
const MAMBO_A: [f64; MAMBO_STATES * MAMBO_STATES] = [
    0.0, 0.0, 0.0, 0.0, 0.0,   0.0,  1.0,    0.0,     0.0, 0.0,     0.0,     0.0,
    0.0, 0.0, 0.0, 0.0, 0.0,   0.0,  0.0,    1.0,     0.0, 0.0,     0.0,     0.0,
    0.0, 0.0, 0.0, 0.0, 0.0,   0.0,  0.0,    0.0,     1.0, 0.0,     0.0,     0.0,
    0.0, 0.0, 0.0, 0.0, 0.0,   0.0,  0.0,    0.0,     0.0, 0.0,     0.0,     1.0,
    0.0, 0.0, 0.0, 0.0, 0.0,   0.0,  0.0,    0.0,     0.0, 0.0,     1.0,     0.0,
    0.0, 0.0, 0.0, 0.0, 0.0,   0.0,  0.0,    0.0,     0.0, 1.0,     0.0,     0.0,
    0.0, 0.0, 0.0, 0.0, -9.81, 0.0,  -0.064, 0.0,     0.0, 0.0,     0.1382,  0.0,
    0.0, 0.0, 0.0, 0.0, 0.0,   9.81, 0.0,    -0.64,   0.0, -0.1382, 0.0,     0.0,
    0.0, 0.0, 0.0, 0.0, 0.0,   0.0,  0.0,    0.0,     0.0, 0.0,     0.0,     0.0,
    0.0, 0.0, 0.0, 0.0, 0.0,   0.0,  0.0,    -1.1999, 0.0, -2.5898, 0.0,     0.0,
    0.0, 0.0, 0.0, 0.0, 0.0,   0.0,  0.9755, 0.0,     0.0, 0.0,     -2.1056, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0,   0.0,  0.0,    0.0,     0.0, 0.0,     0.0,     -0.1715,
];

#[rustfmt::skip]
const MAMBO_B: [f64; MAMBO_STATES * ACTUATION_CHANNELS] = [
    0.0,    0.0, 0.0,    0.0,
    0.0,    0.0, 0.0,    0.0,
    0.0,    0.0, 0.0,    0.0,
    0.0,    0.0, 0.0,    0.0,
    0.0,    0.0, 0.0,    0.0,
    0.0,    0.0, 0.0,    0.0,
    0.0,    0.0, 0.0,    0.0,
    0.0,    0.0, 0.0,    0.0,
    0.0015, 0.0, 0.0,    0.0,
    0.0,    0.0, 0.0,    1.7157,
    0.0,    0.0, 1.3949, 0.0,
    0.0,    1.0, 0.0,    0.0,
];

/// Mambo state transition matrix (12×12).
pub fn mambo_a() -> DMatrix<f64> {
    DMatrix::from_row_slice(MAMBO_STATES, MAMBO_STATES, &MAMBO_A)
}

/// Mambo input matrix (12×4), already scaled by [`MAMBO_INPUT_SCALE`].
pub fn mambo_b() -> DMatrix<f64> {
    DMatrix::from_row_slice(MAMBO_STATES, ACTUATION_CHANNELS, &MAMBO_B) * MAMBO_INPUT_SCALE
}

/// The Parrot Mambo linearization with Q = I₁₂ and R = I₄.
pub fn mambo() -> Result<DynamicsModel> {
    mambo_with_weights(
        DMatrix::identity(MAMBO_STATES, MAMBO_STATES),
        DMatrix::identity(ACTUATION_CHANNELS, ACTUATION_CHANNELS),
    )
}

/// The Mambo linearization with custom cost weights.
pub fn mambo_with_weights(q: DMatrix<f64>, r: DMatrix<f64>) -> Result<DynamicsModel> {
    DynamicsModel::build(mambo_a(), mambo_b(), q, r)
}

/// A controller for [`mambo`] with the Mambo channel order and `limits`.
pub fn mambo_controller(limits: ActuationLimits) -> Result<PositionController> {
    PositionController::builder(mambo()?)
        .limits(limits)
        .channel_order(MAMBO_CHANNEL_ORDER)
        .build()
}

/// Named view of the Mambo state vector.
///
/// # Fields
///
/// * `position_x`, `position_y`, `position_z` - Position (m)
/// * `yaw`, `pitch`, `roll` - Euler angles (rad)
/// * `velocity_x`, `velocity_y`, `velocity_z` - Linear velocity (m/s)
/// * `roll_rate`, `pitch_rate`, `yaw_rate` - Body rates (rad/s)
///
/// The field order above is the model's state order, which differs from the
/// usual position/velocity/attitude/rate layout.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MamboState {
    pub position_x: f64,
    pub position_y: f64,
    pub position_z: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub velocity_z: f64,
    pub roll_rate: f64,
    pub pitch_rate: f64,
    pub yaw_rate: f64,
}

impl MamboState {
    /// A hover state at the given position.
    pub fn at_position(x: f64, y: f64, z: f64) -> Self {
        MamboState {
            position_x: x,
            position_y: y,
            position_z: z,
            ..Default::default()
        }
    }

    pub fn to_array(&self) -> [f64; MAMBO_STATES] {
        [
            self.position_x,
            self.position_y,
            self.position_z,
            self.yaw,
            self.pitch,
            self.roll,
            self.velocity_x,
            self.velocity_y,
            self.velocity_z,
            self.roll_rate,
            self.pitch_rate,
            self.yaw_rate,
        ]
    }

    pub fn from_array(arr: &[f64; MAMBO_STATES]) -> Self {
        MamboState {
            position_x: arr[0],
            position_y: arr[1],
            position_z: arr[2],
            yaw: arr[3],
            pitch: arr[4],
            roll: arr[5],
            velocity_x: arr[6],
            velocity_y: arr[7],
            velocity_z: arr[8],
            roll_rate: arr[9],
            pitch_rate: arr[10],
            yaw_rate: arr[11],
        }
    }

    pub fn to_vector(&self) -> DVector<f64> {
        DVector::from_row_slice(&self.to_array())
    }

    /// Returns `None` unless `v` has exactly 12 elements.
    pub fn from_vector(v: &DVector<f64>) -> Option<Self> {
        let arr: [f64; MAMBO_STATES] = v.as_slice().try_into().ok()?;
        Some(Self::from_array(&arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mambo_shapes() {
        let model = mambo().unwrap();
        assert_eq!(model.state_dim(), 12);
        assert_eq!(model.input_dim(), 4);
        assert_relative_eq!(model.b()[(8, 0)], 15.0, epsilon = 1e-12);
        assert_eq!(model.b()[(11, 1)], 10_000.0);
    }

    #[test]
    fn test_integrator_rows_match_state_layout() {
        // Each position/angle state integrates its rate state
        let a = mambo_a();
        let pairs = [(0, 6), (1, 7), (2, 8), (3, 11), (4, 10), (5, 9)];
        for (state, rate) in pairs {
            assert_eq!(a[(state, rate)], 1.0);
        }
        // Each input column drives the rate its channel name implies
        let b = mambo_b();
        let driven = [8, 11, 10, 9];
        for (column, row) in driven.into_iter().enumerate() {
            assert!(b[(row, column)] > 0.0);
        }
    }

    #[test]
    fn test_state_vector_round_trip_keeps_layout() {
        let state = MamboState {
            position_z: 1.0,
            yaw: 0.3,
            velocity_x: -2.0,
            yaw_rate: 0.5,
            ..Default::default()
        };
        let v = state.to_vector();

        assert_eq!(v[2], 1.0);
        assert_eq!(v[3], 0.3);
        assert_eq!(v[6], -2.0);
        assert_eq!(v[11], 0.5);
        assert_eq!(MamboState::from_vector(&v), Some(state));
        assert_eq!(MamboState::from_vector(&DVector::zeros(6)), None);
    }
}
