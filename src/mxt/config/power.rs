/// Power configuration (T7).
///
/// Acquisition intervals are in milliseconds; an interval of 0 stops
/// acquisition, which is how the controller is put to sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerConfig {
  pub idle_acquisition_interval: u8,
  pub active_acquisition_interval: u8,
  /// Time in 200 ms units before falling back from active to idle.
  pub active_to_idle_timeout: u8,
}

impl PowerConfig {
  pub const fn new() -> Self {
    Self { idle_acquisition_interval: 64, active_acquisition_interval: 16, active_to_idle_timeout: 50 }
  }

  /// Acquisition halted.
  pub const fn sleep() -> Self {
    Self { idle_acquisition_interval: 0, active_acquisition_interval: 0, ..Self::new() }
  }

  pub const fn with_intervals(mut self, idle: u8, active: u8) -> Self {
    self.idle_acquisition_interval = idle;
    self.active_acquisition_interval = active;
    self
  }

  pub const fn with_active_to_idle_timeout(mut self, timeout: u8) -> Self {
    self.active_to_idle_timeout = timeout;
    self
  }

  /// The two acquisition interval bytes, as written on suspend and resume.
  pub(crate) const fn intervals(&self) -> [u8; 2] {
    [self.idle_acquisition_interval, self.active_acquisition_interval]
  }
}

impl Default for PowerConfig {
  fn default() -> Self {
    Self::new()
  }
}

impl From<PowerConfig> for [u8; 3] {
  fn from(c: PowerConfig) -> Self {
    [c.idle_acquisition_interval, c.active_acquisition_interval, c.active_to_idle_timeout]
  }
}
