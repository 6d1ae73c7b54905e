use bitfield_struct::bitfield;

pub(crate) const I2C_ADDR: u8 = 0x4B;

/// Codec registers the driver touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Reg {
  AsicId = 0x01,
  AsicRev = 0x02,
  IntId = 0x03,
  IntMask = 0x04,
  MicBias = 0x0A,
  HsLeftCtl = 0x10,
  HsRightCtl = 0x11,
  HsGain = 0x12,
  EarCtl = 0x13,
  HfLeftCtl = 0x14,
  HfLeftGain = 0x15,
  HfRightCtl = 0x16,
  HfRightGain = 0x17,
  HookCtl1 = 0x1C,
  HookCtl2 = 0x1D,
  Status = 0x30,
}

impl From<Reg> for u8 {
  fn from(r: Reg) -> Self {
    r as u8
  }
}

/// Registers shadowed by the cache, 0x00 through STATUS.
pub(crate) const CACHE_SIZE: usize = Reg::Status as usize + 1;

/// Power-on register values.
pub(crate) const fn reset_values() -> [u8; CACHE_SIZE] {
  let mut regs = [0u8; CACHE_SIZE];
  regs[Reg::IntMask as usize] = 0x7F;
  regs[Reg::HsGain as usize] = 0xFF;
  regs[Reg::EarCtl as usize] = 0x1E;
  regs[Reg::HfLeftGain as usize] = 0x1D;
  regs[Reg::HfRightGain as usize] = 0x1D;
  regs
}

/// AMICBCTL: headset microphone bias.
pub(crate) const MIC_BIAS_ENABLE: u8 = 0x01;
/// HKCTL1: hook comparator.
pub(crate) const HOOK_ENABLE: u8 = 0x01;
/// INTMR: handsfree short-circuit interrupt mask.
pub(crate) const HF_SHORT_MASK: u8 = 0x10;

/// HSLCTL / HSRCTL bits.
pub(crate) const HS_DAC_ENABLE: u8 = 0x01;
pub(crate) const HS_DAC_MODE: u8 = 0x02;
pub(crate) const HS_DRIVER_MODE: u8 = 0x08;

/// Delays of the accessory detection chain, in milliseconds.
pub(crate) const PLUG_SETTLE_MS: u64 = 200;
pub(crate) const BIAS_SETTLE_MS: u64 = 1000;
pub(crate) const MIC_JUDGE_MS: u64 = 30;
pub(crate) const REARM_MS: u64 = 30;
pub(crate) const REPORT_DELAY_MS: u64 = 50;
pub(crate) const HOOK_POLL_MS: u64 = 60;

/// Ramp timing, in milliseconds.
pub(crate) const RAMP_START_MS: u64 = 1;
pub(crate) const RAMP_STEP_MS: u64 = 5;
pub(crate) const RAMP_DONE_TIMEOUT_MS: u64 = 2000;

/// STATUS register.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct Status {
  /// Hook comparator: set while the microphone line is pulled low.
  pub hook_comp: bool,
  /// Plug comparator: set while a jack is inserted.
  pub plug_comp: bool,
  #[bits(6)]
  __: u8,
}

/// INTID register, cleared on read.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct IntId {
  pub thermal: bool,
  pub plug: bool,
  pub unplug: bool,
  pub hook: bool,
  pub handsfree_short: bool,
  pub vibra: bool,
  pub ready: bool,
  __: bool,
}
