//! Simulated robot that records every actuator call

use super::{Actuator, Motion};
use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// A single call made on the actuator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCall {
    Forward(f32),
    Backward(f32),
    Left(f32),
    Right(f32),
    Stop,
}

/// Shared record of actuator calls. Clones observe the same journal.
#[derive(Debug, Clone, Default)]
pub struct ActuatorJournal {
    calls: Arc<Mutex<Vec<ActuatorCall>>>,
}

impl ActuatorJournal {
    fn lock(&self) -> MutexGuard<'_, Vec<ActuatorCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: ActuatorCall) {
        self.lock().push(call);
    }

    /// All calls so far, oldest first
    #[cfg(test)]
    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.lock().clone()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<ActuatorCall> {
        self.lock().last().copied()
    }
}

/// In-memory robot for running without motor hardware
#[derive(Debug, Default)]
pub struct SimulatedRobot {
    journal: ActuatorJournal,
    motion: Motion,
}

impl SimulatedRobot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on the call journal, usable after the robot has been moved away
    #[cfg(test)]
    pub fn journal(&self) -> ActuatorJournal {
        self.journal.clone()
    }

    fn apply(&mut self, call: ActuatorCall, motion: Motion) -> Result<()> {
        debug!("[SIM] {:?}", call);
        self.journal.record(call);
        self.motion = motion;
        Ok(())
    }
}

impl Actuator for SimulatedRobot {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn forward(&mut self, speed: f32) -> Result<()> {
        self.apply(ActuatorCall::Forward(speed), Motion::Forward)
    }

    fn backward(&mut self, speed: f32) -> Result<()> {
        self.apply(ActuatorCall::Backward(speed), Motion::Backward)
    }

    fn left(&mut self, speed: f32) -> Result<()> {
        self.apply(ActuatorCall::Left(speed), Motion::TurnLeft)
    }

    fn right(&mut self, speed: f32) -> Result<()> {
        self.apply(ActuatorCall::Right(speed), Motion::TurnRight)
    }

    fn stop(&mut self) -> Result<()> {
        self.apply(ActuatorCall::Stop, Motion::Halted)
    }

    fn motion(&self) -> Motion {
        self.motion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_calls_in_order() {
        let mut robot = SimulatedRobot::new();
        let journal = robot.journal();

        robot.forward(1.0).unwrap();
        robot.left(0.5).unwrap();
        robot.stop().unwrap();

        assert_eq!(
            journal.calls(),
            vec![
                ActuatorCall::Forward(1.0),
                ActuatorCall::Left(0.5),
                ActuatorCall::Stop,
            ]
        );
        assert_eq!(robot.motion(), Motion::Halted);
    }

    #[test]
    fn test_last_call_wins() {
        let mut robot = SimulatedRobot::new();
        robot.backward(1.0).unwrap();
        robot.right(1.0).unwrap();

        assert_eq!(robot.motion(), Motion::TurnRight);
        assert_eq!(robot.journal().last(), Some(ActuatorCall::Right(1.0)));
    }
}
