//! Actuator abstraction for the robot's drive motors
//!
//! The dispatcher only ever talks to the [`Actuator`] trait, so the GPIO
//! driver and the simulated robot are interchangeable.

mod gpio;
mod sim;

pub use gpio::{GpioRobot, MotorPins};
pub use sim::SimulatedRobot;
#[cfg(test)]
pub use sim::{ActuatorCall, ActuatorJournal};

use crate::config::{ActuatorKind, BridgeConfig};
use anyhow::Result;
use tracing::info;

/// What the robot is currently doing. Each call overwrites the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Motion {
    #[default]
    Halted,
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
}

/// A two-motor differential drive
pub trait Actuator: Send {
    /// Human-readable name for this actuator
    fn name(&self) -> &'static str;

    fn forward(&mut self, speed: f32) -> Result<()>;

    fn backward(&mut self, speed: f32) -> Result<()>;

    /// Spin left in place
    fn left(&mut self, speed: f32) -> Result<()>;

    /// Spin right in place
    fn right(&mut self, speed: f32) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Most recently commanded motion
    fn motion(&self) -> Motion;
}

/// Build the actuator selected by configuration
pub fn from_config(config: &BridgeConfig) -> Result<Box<dyn Actuator>> {
    let actuator: Box<dyn Actuator> = match config.actuator {
        ActuatorKind::Gpio => Box::new(GpioRobot::open(config.motors)?),
        ActuatorKind::Simulated => Box::new(SimulatedRobot::new()),
    };
    info!("Actuator ready: {}", actuator.name());
    Ok(actuator)
}
