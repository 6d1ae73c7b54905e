/// Acquisition configuration (T8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcquisitionConfig {
  /// Charge time in 0.25 µs units.
  pub charge_time: u8,
  pub touch_drift: u8,
  pub drift_suspend: u8,
  pub auto_calibration: AutoCalibration,
}

impl AcquisitionConfig {
  pub const fn new() -> Self {
    Self { charge_time: 10, touch_drift: 5, drift_suspend: 1, auto_calibration: AutoCalibration::new() }
  }

  pub const fn with_charge_time(mut self, charge_time: u8) -> Self {
    self.charge_time = charge_time;
    self
  }

  pub const fn with_drift(mut self, touch_drift: u8, drift_suspend: u8) -> Self {
    self.touch_drift = touch_drift;
    self.drift_suspend = drift_suspend;
    self
  }

  pub const fn with_auto_calibration(mut self, auto_calibration: AutoCalibration) -> Self {
    self.auto_calibration = auto_calibration;
    self
  }
}

impl Default for AcquisitionConfig {
  fn default() -> Self {
    Self::new()
  }
}

impl From<AcquisitionConfig> for [u8; 10] {
  fn from(c: AcquisitionConfig) -> Self {
    let a: [u8; 6] = c.auto_calibration.into();
    [c.charge_time, 0, c.touch_drift, c.drift_suspend, a[0], a[1], a[2], a[3], a[4], a[5]]
  }
}

/// Auto-calibration tail of T8, starting at TCHAUTOCAL.
///
/// The driver swaps this block at runtime: a strict image while a fresh
/// calibration is unconfirmed, a relaxed one once touches have proven it good,
/// and only the anti-touch part of the platform image while suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AutoCalibration {
  /// Touch auto-calibration period in 200 ms units, 0 disables.
  pub touch_auto_calibration: u8,
  pub sync: u8,
  pub anti_touch_suspend_time: u8,
  pub anti_touch_suspend_threshold: u8,
  pub anti_touch_force_threshold: u8,
  pub anti_touch_force_ratio: u8,
}

impl AutoCalibration {
  pub const fn new() -> Self {
    Self {
      touch_auto_calibration: 0,
      sync: 0,
      anti_touch_suspend_time: 5,
      anti_touch_suspend_threshold: 1,
      anti_touch_force_threshold: 10,
      anti_touch_force_ratio: 192,
    }
  }

  /// Image written once a calibration has been confirmed and held for a
  /// while: anti-touch recovery switched off.
  pub const fn settled() -> Self {
    Self {
      anti_touch_suspend_time: 0,
      anti_touch_suspend_threshold: 1,
      anti_touch_force_threshold: 0,
      anti_touch_force_ratio: 0,
      ..Self::new()
    }
  }

  pub const fn with_anti_touch(mut self, suspend_time: u8, suspend_threshold: u8, force_threshold: u8, force_ratio: u8) -> Self {
    self.anti_touch_suspend_time = suspend_time;
    self.anti_touch_suspend_threshold = suspend_threshold;
    self.anti_touch_force_threshold = force_threshold;
    self.anti_touch_force_ratio = force_ratio;
    self
  }

  pub const fn with_touch_auto_calibration(mut self, period: u8) -> Self {
    self.touch_auto_calibration = period;
    self
  }

  /// The four anti-touch bytes (T8 offset 6).
  pub(crate) const fn anti_touch(&self) -> [u8; 4] {
    [
      self.anti_touch_suspend_time,
      self.anti_touch_suspend_threshold,
      self.anti_touch_force_threshold,
      self.anti_touch_force_ratio,
    ]
  }
}

impl Default for AutoCalibration {
  fn default() -> Self {
    Self::new()
  }
}

impl From<AutoCalibration> for [u8; 6] {
  fn from(a: AutoCalibration) -> Self {
    let t = a.anti_touch();
    [a.touch_auto_calibration, a.sync, t[0], t[1], t[2], t[3]]
  }
}
