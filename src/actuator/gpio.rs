//! GPIO motor driver
//!
//! Drives an H-bridge motor controller through the Linux sysfs GPIO
//! interface. Each motor has a forward and a backward input; driving one
//! high (and the other low) spins the motor in that direction.
//!
//! Pins are switched on/off only, so every non-zero speed is full speed.
//!
//! Sysfs addresses lines by global number, which is the BCM pin plus the
//! base of the SoC's GPIO chip. Older kernels put that chip at 0; Raspberry
//! Pi kernels since 6.6 put it at 512 or higher. The base is read from the
//! `gpiochip*` entries unless `chip_base` is configured. The sysfs interface
//! is deprecated upstream and kernels built without it are not supported.

use super::{Actuator, Motion};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Root of the sysfs GPIO tree
const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Label prefix of the SoC pin controller (`pinctrl-bcm2835`, `pinctrl-rp1`, ...)
const SOC_CHIP_LABEL: &str = "pinctrl-";

/// BCM pin numbers wired to the motor controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MotorPins {
    pub left_forward: u8,
    pub left_backward: u8,
    pub right_forward: u8,
    pub right_backward: u8,
    /// Global number of BCM pin 0; detected when unset
    pub chip_base: Option<u32>,
}

impl Default for MotorPins {
    fn default() -> Self {
        Self {
            left_forward: 19,
            left_backward: 26,
            right_forward: 16,
            right_backward: 20,
            chip_base: None,
        }
    }
}

/// Find the base of the SoC GPIO chip, or 0 if no chip advertises itself
fn detect_chip_base(root: &Path) -> Result<u32> {
    let entries = fs::read_dir(root)
        .with_context(|| format!("Failed to read GPIO chips under {}", root.display()))?;

    for entry in entries {
        let chip = entry?.path();
        let is_chip = chip
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("gpiochip"));
        if !is_chip {
            continue;
        }

        let Ok(label) = fs::read_to_string(chip.join("label")) else {
            continue;
        };
        if label.trim().starts_with(SOC_CHIP_LABEL) {
            let base = fs::read_to_string(chip.join("base"))
                .with_context(|| format!("Failed to read base of {}", chip.display()))?;
            return base
                .trim()
                .parse()
                .with_context(|| format!("Invalid base {:?} for {}", base.trim(), label.trim()));
        }
    }

    Ok(0)
}

/// A sysfs GPIO line configured as an output
struct OutputPin {
    line: u32,
    value_path: PathBuf,
}

impl OutputPin {
    /// Export the line (if not already exported) and set it to output, low
    fn export(root: &Path, line: u32) -> Result<Self> {
        let line_dir = root.join(format!("gpio{}", line));

        if !line_dir.exists() {
            fs::write(root.join("export"), line.to_string())
                .with_context(|| format!("Failed to export GPIO line {}", line))?;
        }

        // "low" sets the direction and drives the line low in one write
        fs::write(line_dir.join("direction"), "low")
            .with_context(|| format!("Failed to configure GPIO line {} as output", line))?;

        Ok(Self {
            line,
            value_path: line_dir.join("value"),
        })
    }

    fn set(&self, high: bool) -> Result<()> {
        fs::write(&self.value_path, if high { "1" } else { "0" })
            .with_context(|| format!("Failed to drive GPIO line {}", self.line))
    }
}

/// One motor on the H-bridge
struct Motor {
    forward: OutputPin,
    backward: OutputPin,
}

impl Motor {
    fn open(root: &Path, base: u32, forward: u8, backward: u8) -> Result<Self> {
        Ok(Self {
            forward: OutputPin::export(root, base + u32::from(forward))?,
            backward: OutputPin::export(root, base + u32::from(backward))?,
        })
    }

    fn forward(&self) -> Result<()> {
        // Release the opposite input first so both are never high together
        self.backward.set(false)?;
        self.forward.set(true)
    }

    fn backward(&self) -> Result<()> {
        self.forward.set(false)?;
        self.backward.set(true)
    }

    fn stop(&self) -> Result<()> {
        self.forward.set(false)?;
        self.backward.set(false)
    }
}

/// Two-motor robot on sysfs GPIO
pub struct GpioRobot {
    left: Motor,
    right: Motor,
    motion: Motion,
}

impl GpioRobot {
    /// Open the motor pins under `/sys/class/gpio`
    pub fn open(pins: MotorPins) -> Result<Self> {
        Self::open_at(Path::new(SYSFS_GPIO_ROOT), pins)
    }

    /// Open the motor pins under an arbitrary sysfs-like root
    pub fn open_at(root: &Path, pins: MotorPins) -> Result<Self> {
        let base = match pins.chip_base {
            Some(base) => base,
            None => detect_chip_base(root)?,
        };
        info!(
            "Opening GPIO motors: left=({}, {}) right=({}, {}) chip base {}",
            pins.left_forward, pins.left_backward, pins.right_forward, pins.right_backward, base
        );

        Ok(Self {
            left: Motor::open(root, base, pins.left_forward, pins.left_backward)?,
            right: Motor::open(root, base, pins.right_forward, pins.right_backward)?,
            motion: Motion::Halted,
        })
    }

    fn drive(&mut self, speed: f32, motion: Motion) -> Result<()> {
        if speed <= 0.0 {
            return self.stop();
        }

        debug!("[GPIO] {:?}", motion);
        match motion {
            Motion::Forward => {
                self.left.forward()?;
                self.right.forward()?;
            }
            Motion::Backward => {
                self.left.backward()?;
                self.right.backward()?;
            }
            Motion::TurnLeft => {
                self.left.backward()?;
                self.right.forward()?;
            }
            Motion::TurnRight => {
                self.left.forward()?;
                self.right.backward()?;
            }
            Motion::Halted => {
                self.left.stop()?;
                self.right.stop()?;
            }
        }

        self.motion = motion;
        Ok(())
    }
}

impl Actuator for GpioRobot {
    fn name(&self) -> &'static str {
        "gpio"
    }

    fn forward(&mut self, speed: f32) -> Result<()> {
        self.drive(speed, Motion::Forward)
    }

    fn backward(&mut self, speed: f32) -> Result<()> {
        self.drive(speed, Motion::Backward)
    }

    fn left(&mut self, speed: f32) -> Result<()> {
        self.drive(speed, Motion::TurnLeft)
    }

    fn right(&mut self, speed: f32) -> Result<()> {
        self.drive(speed, Motion::TurnRight)
    }

    fn stop(&mut self) -> Result<()> {
        self.left.stop()?;
        self.right.stop()?;
        self.motion = Motion::Halted;
        Ok(())
    }

    fn motion(&self) -> Motion {
        self.motion
    }
}
