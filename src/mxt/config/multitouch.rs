use crate::mxt::MAX_FINGERS;

/// Multitouch screen configuration (T9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MultitouchConfig {
  pub ctrl: u8,
  pub x_origin: u8,
  pub y_origin: u8,
  pub x_size: u8,
  pub y_size: u8,
  pub aks_config: u8,
  pub burst_length: u8,
  pub touch_threshold: u8,
  pub touch_detect_integration: u8,
  pub orientation: u8,
  pub merge_timeout: u8,
  pub move_hysteresis_initial: u8,
  pub move_hysteresis_next: u8,
  pub move_filter: u8,
  /// Contacts the controller reports; also how many slots the driver tracks.
  pub num_touch: u8,
  pub merge_hysteresis: u8,
  pub merge_threshold: u8,
  pub amplitude_hysteresis: u8,
  /// Highest reported X coordinate.
  pub x_range: u16,
  /// Highest reported Y coordinate.
  pub y_range: u16,
  pub x_low_clip: u8,
  pub x_high_clip: u8,
  pub y_low_clip: u8,
  pub y_high_clip: u8,
  pub x_edge_ctrl: u8,
  pub x_edge_dist: u8,
  pub y_edge_ctrl: u8,
  pub y_edge_dist: u8,
  pub jump_limit: u8,
  pub touch_hysteresis: u8,
  pub x_pitch: u8,
  pub y_pitch: u8,
  pub next_touch_detect_integration: u8,
}

impl MultitouchConfig {
  pub const fn new() -> Self {
    Self {
      ctrl: 0x8B,
      x_origin: 0,
      y_origin: 0,
      x_size: 16,
      y_size: 14,
      aks_config: 0,
      burst_length: 0x10,
      touch_threshold: 40,
      touch_detect_integration: 2,
      orientation: 1,
      merge_timeout: 0,
      move_hysteresis_initial: 5,
      move_hysteresis_next: 1,
      move_filter: 0,
      num_touch: MAX_FINGERS as u8,
      merge_hysteresis: 10,
      merge_threshold: 20,
      amplitude_hysteresis: 10,
      x_range: 799,
      y_range: 1349,
      x_low_clip: 0,
      x_high_clip: 0,
      y_low_clip: 0,
      y_high_clip: 0,
      x_edge_ctrl: 0,
      x_edge_dist: 0,
      y_edge_ctrl: 0,
      y_edge_dist: 0,
      jump_limit: 25,
      touch_hysteresis: 10,
      x_pitch: 0,
      y_pitch: 0,
      next_touch_detect_integration: 0,
    }
  }

  pub const fn with_num_touch(mut self, num_touch: u8) -> Self {
    self.num_touch = num_touch;
    self
  }

  pub const fn with_touch_threshold(mut self, threshold: u8, hysteresis: u8) -> Self {
    self.touch_threshold = threshold;
    self.touch_hysteresis = hysteresis;
    self
  }

  pub const fn with_range(mut self, x_range: u16, y_range: u16) -> Self {
    self.x_range = x_range;
    self.y_range = y_range;
    self
  }

  pub const fn with_matrix(mut self, x_origin: u8, y_origin: u8, x_size: u8, y_size: u8) -> Self {
    self.x_origin = x_origin;
    self.y_origin = y_origin;
    self.x_size = x_size;
    self.y_size = y_size;
    self
  }

  pub const fn with_orientation(mut self, orientation: u8) -> Self {
    self.orientation = orientation;
    self
  }

  /// Number of tracked slots, never above [`MAX_FINGERS`].
  pub(crate) const fn finger_support(&self) -> u8 {
    if self.num_touch as usize > MAX_FINGERS {
      MAX_FINGERS as u8
    } else {
      self.num_touch
    }
  }
}

impl Default for MultitouchConfig {
  fn default() -> Self {
    Self::new()
  }
}

impl From<MultitouchConfig> for [u8; 35] {
  fn from(c: MultitouchConfig) -> Self {
    let [xr_lo, xr_hi] = c.x_range.to_le_bytes();
    let [yr_lo, yr_hi] = c.y_range.to_le_bytes();
    [
      c.ctrl,
      c.x_origin,
      c.y_origin,
      c.x_size,
      c.y_size,
      c.aks_config,
      c.burst_length,
      c.touch_threshold,
      c.touch_detect_integration,
      c.orientation,
      c.merge_timeout,
      c.move_hysteresis_initial,
      c.move_hysteresis_next,
      c.move_filter,
      c.num_touch,
      c.merge_hysteresis,
      c.merge_threshold,
      c.amplitude_hysteresis,
      xr_lo,
      xr_hi,
      yr_lo,
      yr_hi,
      c.x_low_clip,
      c.x_high_clip,
      c.y_low_clip,
      c.y_high_clip,
      c.x_edge_ctrl,
      c.x_edge_dist,
      c.y_edge_ctrl,
      c.y_edge_dist,
      c.jump_limit,
      c.touch_hysteresis,
      c.x_pitch,
      c.y_pitch,
      c.next_touch_detect_integration,
    ]
  }
}
