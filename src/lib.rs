//! # uav-lqr
//! Discrete-time LQR position control for small quadrotors.
//!
//! The pipeline, leaves first:
//!
//! [`DynamicsModel`] (A, B, Q, R) → [`riccati::solve`] (P) → [`gain::derive`] (K)
//! → [`PositionController`] (per-tick bounded commands) and
//! [`stability::analyze`] (closed-loop eigenvalues of A − BK).
//!
//! [`presets`] holds the Parrot Mambo linearization, [`config`] loads a
//! controller from JSON and [`sim`] closes the loop around a linear plant.
//! [`program`] defines the traits a mission and a vehicle link implement.

pub mod config;
pub mod control;
pub mod dynamics;
pub mod error;
pub mod gain;
pub mod presets;
pub mod program;
pub mod riccati;
pub mod sim;
pub mod stability;

pub use control::{
    ActuationLimits, Channel, CommandVector, PositionController, PositionControllerBuilder,
    ACTUATION_CHANNELS,
};
pub use dynamics::DynamicsModel;
pub use error::{LqrError, Result};
pub use gain::GainMatrix;
pub use riccati::{RiccatiSolution, SolverOptions};
pub use stability::StabilityReport;
