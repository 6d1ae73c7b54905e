use super::defs::RAMP_STEP_MS;
use crate::Duration;

/// How outputs come up on power-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerUpRamp {
  /// Ramp up in configured steps.
  #[default]
  Stepped,
  /// Jump straight to the target in one step.
  Immediate,
}

/// Gain steps per ramp tick, left and right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RampSteps {
  pub left: u8,
  pub right: u8,
}

impl RampSteps {
  pub const fn new(left: u8, right: u8) -> Self {
    Self { left, right }
  }

  pub const fn uniform(step: u8) -> Self {
    Self::new(step, step)
  }
}

impl Default for RampSteps {
  fn default() -> Self {
    Self::uniform(1)
  }
}

/// Codec configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CodecConfig {
  pub headset_steps: RampSteps,
  pub handsfree_steps: RampSteps,
  pub earpiece_step: u8,
  /// Delay between ramp steps; stretched by half towards the end of a ramp.
  pub step_delay: Duration,
  pub power_up: PowerUpRamp,
  /// Extra headset gain applied on top of the mixer volume.
  pub volume_boost: u8,
}

impl CodecConfig {
  pub const fn new() -> Self {
    Self {
      headset_steps: RampSteps::uniform(1),
      handsfree_steps: RampSteps::uniform(1),
      earpiece_step: 1,
      step_delay: Duration::millis(RAMP_STEP_MS),
      power_up: PowerUpRamp::Stepped,
      volume_boost: 0,
    }
  }

  pub const fn with_headset_steps(mut self, steps: RampSteps) -> Self {
    self.headset_steps = steps;
    self
  }

  pub const fn with_handsfree_steps(mut self, steps: RampSteps) -> Self {
    self.handsfree_steps = steps;
    self
  }

  pub const fn with_earpiece_step(mut self, step: u8) -> Self {
    self.earpiece_step = step;
    self
  }

  pub const fn with_step_delay(mut self, delay: Duration) -> Self {
    self.step_delay = delay;
    self
  }

  pub const fn with_power_up(mut self, power_up: PowerUpRamp) -> Self {
    self.power_up = power_up;
    self
  }

  pub const fn with_volume_boost(mut self, boost: u8) -> Self {
    self.volume_boost = boost;
    self
  }
}

impl Default for CodecConfig {
  fn default() -> Self {
    Self::new()
  }
}
