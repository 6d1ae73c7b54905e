use heapless::Vec;

use super::calibration::CalibrationState;
use super::defs::{TouchStatus, MAX_FINGERS};
use super::event::Finger;
use crate::Instant;

/// One pressed contact in a [`Report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Contact {
  pub slot: u8,
  pub x: u16,
  pub y: u16,
  /// Signal amplitude of the contact.
  pub touch_major: u8,
  /// Contact width in channels.
  pub width_major: u8,
}

/// Outcome of one interrupt, as seen by the input layer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Report {
  /// Every contact currently down.
  Contacts(Vec<Contact, MAX_FINGERS>),
  /// Nothing is touching any more.
  Released,
  /// Frame carries no pointer data (first contact sits on the key strip
  /// with the keypad disabled).
  Silent,
}

/// Side effects the tracker asks the driver to carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct TouchActions {
  pub recalibrate: bool,
  /// Install the settled auto-calibration image.
  pub settle: bool,
}

/// Per-slot finger state and the pressed set.
#[derive(Debug, Clone)]
pub(crate) struct FingerTracker {
  slots: [Finger; MAX_FINGERS],
  pressed: u16,
  count: u8,
  support: u8,
  pub(crate) face_suppressed: bool,
}

impl FingerTracker {
  pub(crate) fn new(support: u8) -> Self {
    Self { slots: [Finger::default(); MAX_FINGERS], pressed: 0, count: 0, support, face_suppressed: false }
  }

  pub(crate) fn support(&self) -> u8 {
    self.support
  }

  pub(crate) fn count(&self) -> u8 {
    self.count
  }

  pub(crate) fn pressed(&self) -> u16 {
    self.pressed
  }

  pub(crate) fn slot(&self, slot: u8) -> Finger {
    self.slots[slot as usize]
  }

  /// Apply one multitouch message for `slot`.
  pub(crate) fn process(
    &mut self,
    slot: u8,
    status: TouchStatus,
    finger: Finger,
    calibration: &mut CalibrationState,
    now: Instant,
  ) -> TouchActions {
    let mut actions = TouchActions::default();
    if slot >= self.support {
      return actions;
    }
    self.slots[slot as usize] = finger;
    let bit = 1u16 << slot;

    if status.release() {
      if self.pressed & bit != 0 {
        self.pressed &= !bit;
        self.count -= 1;
        actions.recalibrate = calibration.on_release(self.count);
      }
    } else if status.is_touching() && self.pressed & bit == 0 {
      if calibration.should_settle(now) {
        calibration.settle();
        actions.settle = true;
      }
      self.pressed |= bit;
      self.count += 1;
      actions.recalibrate = calibration.on_press(slot, finger.x, finger.y, self.count, self.support);
    } else if status.is_touching() {
      let (x, y) = calibration.anchor();
      let (dx, dy) = finger.offset_from(x, y);
      calibration.on_move(slot, dx, dy, self.count, now);
    }
    actions
  }

  /// Forget every contact.
  pub(crate) fn clear(&mut self) {
    self.pressed = 0;
    self.count = 0;
  }

  /// Build the frame for the input layer. Face suppression or an empty set
  /// clears the pressed state.
  pub(crate) fn report(&mut self, keypad_enabled: bool, release_y_threshold: u16) -> Report {
    let visible = keypad_enabled || self.slots[0].y < release_y_threshold;
    if self.count == 0 || self.face_suppressed {
      self.clear();
      return if visible { Report::Released } else { Report::Silent };
    }
    if !visible {
      return Report::Silent;
    }
    let contacts = (0..self.support)
      .filter(|s| self.pressed & (1 << s) != 0)
      .map(|s| {
        let f = self.slots[s as usize];
        Contact { slot: s, x: f.x, y: f.y, touch_major: f.amplitude, width_major: f.width }
      })
      .collect();
    Report::Contacts(contacts)
  }
}
