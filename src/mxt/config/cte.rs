use crate::mxt::defs::{MODE0_X_CHANNELS, MODE0_Y_CHANNELS};

/// Capacitive touch engine configuration (T46).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CteConfig {
  pub ctrl: u8,
  /// Channel layout; every step moves one Y line over to X.
  pub mode: u8,
  pub idle_syncs_per_x: u8,
  pub active_syncs_per_x: u8,
  pub adcs_per_sync: u8,
  pub pulses_per_adc: u8,
  pub x_slew: u8,
  pub sync_delay: u16,
}

impl CteConfig {
  pub const fn new() -> Self {
    Self {
      ctrl: 0,
      mode: 3,
      idle_syncs_per_x: 16,
      active_syncs_per_x: 32,
      adcs_per_sync: 0,
      pulses_per_adc: 0,
      x_slew: 1,
      sync_delay: 0,
    }
  }

  pub const fn with_mode(mut self, mode: u8) -> Self {
    self.mode = mode;
    self
  }

  pub const fn with_syncs_per_x(mut self, idle: u8, active: u8) -> Self {
    self.idle_syncs_per_x = idle;
    self.active_syncs_per_x = active;
    self
  }

  /// X lines scanned in this mode.
  pub const fn x_channels(&self) -> u8 {
    MODE0_X_CHANNELS.saturating_add(self.mode)
  }

  /// Y lines scanned in this mode.
  pub const fn y_channels(&self) -> u8 {
    MODE0_Y_CHANNELS.saturating_sub(self.mode)
  }
}

impl Default for CteConfig {
  fn default() -> Self {
    Self::new()
  }
}

impl From<CteConfig> for [u8; 9] {
  fn from(c: CteConfig) -> Self {
    let [lo, hi] = c.sync_delay.to_le_bytes();
    [c.ctrl, c.mode, c.idle_syncs_per_x, c.active_syncs_per_x, c.adcs_per_sync, c.pulses_per_adc, c.x_slew, lo, hi]
  }
}
