use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use super::defs::{Reg, RAMP_START_MS};
use super::Twl6040;
use crate::{Duration, Error, Instant};

/// Analog outputs with a gain ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Output {
  /// Stereo, 4-bit gain.
  Headset,
  /// Stereo, 5-bit gain.
  Handsfree,
  /// Mono, 4-bit gain.
  Earpiece,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Channel {
  Left,
  Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coding {
  /// Register holds the bitwise complement of the volume.
  Inverted,
  /// Register holds `max - volume`.
  Offset(u8),
}

/// Where one channel's gain lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GainField {
  pub(crate) reg: Reg,
  pub(crate) channel: Channel,
  mask: u8,
  shift: u8,
  coding: Coding,
}

impl GainField {
  const fn new(reg: Reg, channel: Channel, mask: u8, shift: u8, coding: Coding) -> Self {
    Self { reg, channel, mask, shift, coding }
  }

  fn width(&self) -> u8 {
    self.mask >> self.shift
  }

  pub(crate) fn decode(&self, reg: u8) -> u8 {
    let raw = (reg & self.mask) >> self.shift;
    match self.coding {
      Coding::Inverted => !raw & self.width(),
      Coding::Offset(max) => max.saturating_sub(raw),
    }
  }

  pub(crate) fn encode(&self, reg: u8, volume: u8) -> u8 {
    let raw = match self.coding {
      Coding::Inverted => !volume & self.width(),
      Coding::Offset(max) => max.saturating_sub(volume),
    };
    (reg & !self.mask) | ((raw << self.shift) & self.mask)
  }
}

const HEADSET_FIELDS: [GainField; 2] = [
  GainField::new(Reg::HsGain, Channel::Left, 0x0F, 0, Coding::Inverted),
  GainField::new(Reg::HsGain, Channel::Right, 0xF0, 4, Coding::Inverted),
];
const HANDSFREE_FIELDS: [GainField; 2] = [
  GainField::new(Reg::HfLeftGain, Channel::Left, 0x1F, 0, Coding::Offset(0x1D)),
  GainField::new(Reg::HfRightGain, Channel::Right, 0x1F, 0, Coding::Offset(0x1D)),
];
const EARPIECE_FIELDS: [GainField; 1] = [GainField::new(Reg::EarCtl, Channel::Left, 0x1E, 1, Coding::Inverted)];

impl Output {
  pub const ALL: [Output; 3] = [Output::Headset, Output::Handsfree, Output::Earpiece];

  pub(crate) const fn index(self) -> usize {
    self as usize
  }

  pub const fn max_volume(self) -> u8 {
    match self {
      Output::Headset | Output::Earpiece => 0x0F,
      Output::Handsfree => 0x1D,
    }
  }

  pub const fn is_stereo(self) -> bool {
    !matches!(self, Output::Earpiece)
  }

  /// Last iteration index of one ramp job.
  const fn last_iteration(self) -> u8 {
    match self {
      Output::Handsfree => 32,
      _ => 16,
    }
  }

  /// Iteration from which the step delay is stretched.
  const fn slow_from(self) -> u8 {
    match self {
      Output::Handsfree => 16,
      _ => 8,
    }
  }

  /// Direction that ends with the output powered off.
  pub const fn power_down_ramp(self) -> Ramp {
    match self {
      Output::Headset => Ramp::Zero,
      _ => Ramp::Down,
    }
  }

  pub(crate) fn gain_fields(self) -> &'static [GainField] {
    match self {
      Output::Headset => &HEADSET_FIELDS,
      Output::Handsfree => &HANDSFREE_FIELDS,
      Output::Earpiece => &EARPIECE_FIELDS,
    }
  }

  /// Gain registers in write order, each listed once.
  pub(crate) fn gain_regs(self) -> &'static [Reg] {
    match self {
      Output::Headset => &[Reg::HsGain],
      Output::Handsfree => &[Reg::HfLeftGain, Reg::HfRightGain],
      Output::Earpiece => &[Reg::EarCtl],
    }
  }
}

/// Direction of a ramp job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ramp {
  #[default]
  Idle,
  Up,
  Down,
  Zero,
}

/// The one scheduled job of an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RampJob {
  pub next_at: Instant,
  pub iteration: u8,
}

/// Ramp bookkeeping for one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputState {
  pub(crate) active: bool,
  pub(crate) left: u8,
  pub(crate) right: u8,
  pub(crate) left_step: u8,
  pub(crate) right_step: u8,
  pub(crate) step_delay: Duration,
  pub(crate) ramp: Ramp,
  pub(crate) job: Option<RampJob>,
  pub(crate) done: bool,
}

impl OutputState {
  pub(crate) const fn new(step_delay: Duration) -> Self {
    Self {
      active: false,
      left: 0,
      right: 0,
      left_step: 1,
      right_step: 1,
      step_delay,
      ramp: Ramp::Idle,
      job: None,
      done: false,
    }
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn ramp(&self) -> Ramp {
    self.ramp
  }

  pub fn job(&self) -> Option<RampJob> {
    self.job
  }

  /// Set once a power-down ramp has finished; cleared when the next one
  /// starts.
  pub fn is_done(&self) -> bool {
    self.done
  }

  pub fn volume(&self) -> (u8, u8) {
    (self.left, self.right)
  }

  fn step(&self, channel: Channel) -> u8 {
    match channel {
      Channel::Left => self.left_step,
      Channel::Right => self.right_step,
    }
  }

  fn stored(&self, channel: Channel) -> u8 {
    match channel {
      Channel::Left => self.left,
      Channel::Right => self.right,
    }
  }

  /// Gain the output should sit at for the current direction.
  pub(crate) fn target(&self, output: Output, channel: Channel, boost: u8) -> u8 {
    let boosted = || {
      let extra = if output == Output::Headset { boost } else { 0 };
      self.stored(channel).saturating_add(extra).min(output.max_volume())
    };
    match (self.ramp, output) {
      (Ramp::Zero, _) => 0,
      (Ramp::Down, Output::Headset) => boosted(),
      (Ramp::Down, _) => 0,
      (Ramp::Up | Ramp::Idle, _) => boosted(),
    }
  }

  /// Queue a job in direction `ramp` unless one is already pending.
  pub(crate) fn start(&mut self, ramp: Ramp, now: Instant) -> bool {
    if self.job.is_some() {
      return false;
    }
    self.ramp = ramp;
    self.done = false;
    self.job = Some(RampJob { next_at: now + Duration::millis(RAMP_START_MS), iteration: 0 });
    true
  }

  fn finish(&mut self, output: Output) {
    let powered_off = self.ramp == output.power_down_ramp();
    self.active = !powered_off;
    self.done = powered_off;
    self.ramp = Ramp::Idle;
    self.job = None;
  }
}

/// Move `current` towards `target` by `step` without passing it.
pub(crate) fn step_toward(current: u8, target: u8, step: u8) -> u8 {
  if current < target {
    current.saturating_add(step).min(target)
  } else {
    current.saturating_sub(step).max(target)
  }
}

impl<I, E, D> Twl6040<I, D>
where
  I: I2c<SevenBitAddress, Error = E>,
  D: DelayNs,
{
  /// One step call: move every channel of `output` one step towards its
  /// target. Returns `true` when all channels were already there.
  pub(crate) async fn ramp_step(&mut self, output: Output) -> Result<bool, Error<E>> {
    let state = self.outputs[output.index()];
    let mut complete = true;
    for &reg in output.gain_regs() {
      let old = self.cached(reg);
      let mut new = old;
      for field in output.gain_fields().iter().filter(|f| f.reg == reg) {
        let target = state.target(output, field.channel, self.boost);
        let current = field.decode(new);
        if current != target {
          new = field.encode(new, step_toward(current, target, state.step(field.channel)));
        }
      }
      if new != old {
        self.write_reg(reg, new).await?;
        complete = false;
      }
    }
    Ok(complete)
  }

  /// Run the job of `output` if its deadline has passed.
  pub(crate) async fn service_ramp(&mut self, output: Output, now: Instant) {
    let Some(job) = self.outputs[output.index()].job else { return };
    if job.next_at > now {
      return;
    }
    let complete = match self.ramp_step(output).await {
      Ok(complete) => complete,
      Err(_) => {
        warn!("{:?} ramp step failed", output);
        false
      }
    };

    let state = &mut self.outputs[output.index()];
    if complete || job.iteration >= output.last_iteration() {
      trace!("{:?} ramp {:?} finished after {} steps", output, state.ramp, job.iteration + 1);
      state.finish(output);
      return;
    }
    let mut delay = state.step_delay;
    if job.iteration >= output.slow_from() {
      delay = delay + delay / 2;
    }
    state.job = Some(RampJob { next_at: now + delay, iteration: job.iteration + 1 });
  }

  /// Write the current targets of an active output straight to the gain
  /// registers.
  pub(crate) async fn apply_gain(&mut self, output: Output) -> Result<(), Error<E>> {
    let state = self.outputs[output.index()];
    for &reg in output.gain_regs() {
      let old = self.cached(reg);
      let mut new = old;
      for field in output.gain_fields().iter().filter(|f| f.reg == reg) {
        new = field.encode(new, state.target(output, field.channel, self.boost));
      }
      if new != old {
        self.write_reg(reg, new).await?;
      }
    }
    Ok(())
  }
}
