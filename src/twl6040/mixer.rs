use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use super::config::PowerUpRamp;
use super::defs::*;
use super::ramp::{Output, Ramp};
use super::Twl6040;
use crate::{Duration, Error, Instant};

/// DAC/driver operating point of the headset path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeadsetPowerMode {
  #[default]
  HighPerformance,
  LowPower,
}

impl<I, E, D> Twl6040<I, D>
where
  I: I2c<SevenBitAddress, Error = E>,
  D: DelayNs,
{
  /// Store a new mixer volume, clamped to the output's range. An active
  /// output takes it immediately.
  pub async fn set_volume(&mut self, output: Output, left: u8, right: u8) -> Result<(), Error<E>> {
    let max = output.max_volume();
    let state = &mut self.outputs[output.index()];
    state.left = left.min(max);
    state.right = if output.is_stereo() { right.min(max) } else { state.left };
    if state.active && state.job.is_none() {
      self.apply_gain(output).await?;
    }
    Ok(())
  }

  /// Stored mixer volume. Reflects the request, not the gain currently in the
  /// register.
  pub fn volume(&self, output: Output) -> (u8, u8) {
    self.outputs[output.index()].volume()
  }

  /// Configured step sizes of `output`, clamped to its gain range.
  fn configured_steps(&self, output: Output) -> (u8, u8) {
    let clamp = |s: u8| s.clamp(1, output.max_volume());
    match output {
      Output::Headset => (clamp(self.config.headset_steps.left), clamp(self.config.headset_steps.right)),
      Output::Handsfree => (clamp(self.config.handsfree_steps.left), clamp(self.config.handsfree_steps.right)),
      Output::Earpiece => (clamp(self.config.earpiece_step), clamp(self.config.earpiece_step)),
    }
  }

  /// Queue a job on `output` with the configured steps. A pending job keeps
  /// its steps and the request is dropped.
  fn start_ramp(&mut self, output: Output, ramp: Ramp, now: Instant) -> bool {
    let steps = self.configured_steps(output);
    let state = &mut self.outputs[output.index()];
    if state.job.is_some() {
      return false;
    }
    (state.left_step, state.right_step) = steps;
    state.start(ramp, now)
  }

  /// Bring an output up from silence in steps.
  pub fn power_up(&mut self, output: Output, now: Instant) {
    if self.outputs[output.index()].active {
      return;
    }
    if !self.start_ramp(output, Ramp::Up, now) {
      debug!("{:?} power-up while a ramp is pending", output);
      return;
    }
    if self.config.power_up == PowerUpRamp::Immediate {
      let max = output.max_volume();
      let state = &mut self.outputs[output.index()];
      (state.left_step, state.right_step) = (max, max);
    }
  }

  /// Ramp an output down and wait for it to finish, servicing deadlines
  /// through the delay provider. Gives up after two seconds and marks the
  /// output off regardless. Returns the time reached.
  pub async fn power_down(&mut self, output: Output, now: Instant) -> Instant {
    if !self.outputs[output.index()].active {
      return now;
    }
    if !self.start_ramp(output, output.power_down_ramp(), now) {
      debug!("{:?} power-down while a ramp is pending", output);
    }

    let limit = now + Duration::millis(RAMP_DONE_TIMEOUT_MS);
    let mut t = now;
    loop {
      let next = self.poll(t).await;
      let state = &self.outputs[output.index()];
      if state.done || (!state.active && state.job.is_none()) {
        return t;
      }
      let Some(deadline) = next else { break };
      if t >= limit {
        break;
      }
      let until = deadline.min(limit);
      if until > t {
        self.bus.delay_ms((until - t).to_millis() as u32).await;
        t = until;
      }
    }

    warn!("{:?} power-down ramp timed out", output);
    let state = &mut self.outputs[output.index()];
    state.active = false;
    state.ramp = Ramp::Idle;
    state.job = None;
    t
  }

  /// Change the extra headset gain. A running headset output is walked to
  /// the new level; a ramp already in flight picks it up on its next step.
  pub fn set_volume_boost(&mut self, boost: u8, now: Instant) {
    let old = self.boost;
    if boost == old {
      return;
    }
    self.boost = boost;
    let state = &self.outputs[Output::Headset.index()];
    if state.active && state.job.is_none() {
      let ramp = if boost > old { Ramp::Up } else { Ramp::Down };
      self.start_ramp(Output::Headset, ramp, now);
    }
  }

  pub fn volume_boost(&self) -> u8 {
    self.boost
  }

  /// Select the headset DAC and driver operating point. Refused while either
  /// headset DAC is running.
  pub async fn set_headset_power_mode(&mut self, mode: HeadsetPowerMode) -> Result<(), Error<E>> {
    let left = self.read_reg(Reg::HsLeftCtl).await?;
    let right = self.read_reg(Reg::HsRightCtl).await?;
    if (left | right) & HS_DAC_ENABLE != 0 {
      return Err(Error::Busy);
    }
    let low_power = mode == HeadsetPowerMode::LowPower;
    let mask = HS_DAC_MODE | HS_DRIVER_MODE;
    self.set_bits(Reg::HsLeftCtl, mask, low_power).await?;
    self.set_bits(Reg::HsRightCtl, mask, low_power).await?;
    self.headset_power_mode = mode;
    Ok(())
  }

  pub fn headset_power_mode(&self) -> HeadsetPowerMode {
    self.headset_power_mode
  }
}
