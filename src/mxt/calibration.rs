use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use super::defs::*;
use super::{Mxt224e, ObjectType};
use crate::{Duration, Error, Instant};

/// A fresh calibration must hold this long before it is confirmed.
const CONFIRM_AFTER: Duration = Duration::millis(500);
/// An unlocked calibration switches to the settled image after this.
const SETTLE_AFTER: Duration = Duration::secs(20);
/// Hold-off applied at attach before the settle timer can run out.
const ATTACH_HOLDOFF: Duration = Duration::secs(60);
/// Single-finger travel that proves the reference is not stuck.
const UNLOCK_DISTANCE: u16 = 120;

/// How far the driver trusts the current reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Confidence {
  #[default]
  Unconfirmed,
  /// One clean sample seen.
  Pending,
  Confirmed,
}

/// Progress of the first-touch check that runs after each calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Guard {
  #[default]
  Idle,
  /// A lone finger is down; its start position is the anchor.
  Armed,
  /// The settled auto-calibration image is in place; heuristics are done.
  Settled,
}

/// Touch and anti-touch channel counts from one diagnostic sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelCounts {
  pub touch: u32,
  pub anti_touch: u32,
}

impl ChannelCounts {
  /// Count flagged channels in a touch-flag page. `flags` starts at the page
  /// data; only the first `x_channels` X lines are scanned, and nothing is
  /// counted when that exceeds what the page holds.
  pub fn from_flags(flags: &[u8], x_channels: u8) -> Self {
    let width = x_channels as usize * 2;
    if width > ANTI_TOUCH_FLAG_OFFSET || flags.len() < ANTI_TOUCH_FLAG_OFFSET + width {
      return Self::default();
    }
    let ones = |bytes: &[u8]| -> u32 { bytes.iter().map(|b| b.count_ones()).sum() };
    Self {
      touch: ones(&flags[..width]),
      anti_touch: ones(&flags[ANTI_TOUCH_FLAG_OFFSET..ANTI_TOUCH_FLAG_OFFSET + width]),
    }
  }
}

/// Calibration bookkeeping: confidence, guard and the unlock heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationState {
  pub(crate) confidence: Confidence,
  pub(crate) guard: Guard,
  pub(crate) unlocked: bool,
  pub(crate) timestamp: Instant,
  anchor: (u16, u16),
  /// Firmware needs the guard (version 0x10 and later).
  guarded: bool,
}

impl CalibrationState {
  pub(crate) fn new(guarded: bool, now: Instant) -> Self {
    let timestamp = if guarded { now + ATTACH_HOLDOFF } else { now };
    Self { confidence: Confidence::Unconfirmed, guard: Guard::Idle, unlocked: false, timestamp, anchor: (0, 0), guarded }
  }

  pub fn confidence(&self) -> Confidence {
    self.confidence
  }

  pub fn guard(&self) -> Guard {
    self.guard
  }

  pub fn unlocked(&self) -> bool {
    self.unlocked
  }

  /// Fold in one diagnostic sample. Returns `true` when the reference is bad
  /// and a recalibration is due.
  pub(crate) fn on_sample(&mut self, counts: ChannelCounts, now: Instant) -> bool {
    if counts.touch > 0 && counts.anti_touch == 0 {
      if self.confidence == Confidence::Pending && now > self.timestamp + CONFIRM_AFTER {
        self.confidence = Confidence::Confirmed;
      }
      if self.confidence < Confidence::Confirmed {
        self.confidence = Confidence::Pending;
      }
      self.timestamp = now;
      false
    } else if counts.anti_touch > 1 || counts.touch > 8 {
      self.confidence = Confidence::Unconfirmed;
      true
    } else {
      false
    }
  }

  /// The controller started a calibration.
  pub(crate) fn on_calibrating(&mut self, now: Instant) {
    self.timestamp = now;
  }

  /// Guard heuristics still running for a new or released contact.
  pub(crate) fn watching(&self) -> bool {
    self.guarded && self.guard < Guard::Settled
  }

  /// A new contact arrived after the reference was unlocked long enough ago.
  pub(crate) fn should_settle(&self, now: Instant) -> bool {
    self.watching() && self.unlocked && now > self.timestamp + SETTLE_AFTER
  }

  pub(crate) fn settle(&mut self) {
    self.guard = Guard::Settled;
  }

  /// A new contact went down. `count` includes it.
  pub(crate) fn on_press(&mut self, slot: u8, x: u16, y: u16, count: u8, support: u8) -> bool {
    if !self.watching() {
      return false;
    }
    if slot == 0 {
      self.anchor = (x, y);
    }
    if count == support {
      return true;
    }
    if self.guard == Guard::Idle && count == 1 {
      self.guard = Guard::Armed;
    }
    false
  }

  /// A tracked contact moved. A lone first finger travelling far enough
  /// unlocks and confirms the reference.
  pub(crate) fn on_move(&mut self, slot: u8, dx: u16, dy: u16, count: u8, now: Instant) {
    if self.guard >= Guard::Settled || self.unlocked {
      return;
    }
    if count == 1 && self.guard != Guard::Idle && slot == 0 && (dx > UNLOCK_DISTANCE || dy > UNLOCK_DISTANCE) {
      self.unlocked = true;
      self.confidence = Confidence::Confirmed;
      self.timestamp = now;
    }
  }

  /// A contact lifted; `remaining` are still down. Returns `true` when a
  /// recalibration is due.
  pub(crate) fn on_release(&mut self, remaining: u8) -> bool {
    if self.guard >= Guard::Settled || self.unlocked {
      return false;
    }
    if remaining > 0 {
      return true;
    }
    if self.guard == Guard::Armed {
      self.guard = Guard::Idle;
    }
    false
  }

  pub(crate) fn anchor(&self) -> (u16, u16) {
    self.anchor
  }

  pub(crate) fn on_profile_change(&mut self) {
    self.unlocked = false;
    self.confidence = Confidence::Unconfirmed;
  }

  pub(crate) fn on_suspend(&mut self) {
    if self.guarded {
      self.guard = Guard::Idle;
    }
  }

  pub(crate) fn on_resume(&mut self, now: Instant) {
    if self.guarded {
      self.timestamp = now;
    }
    self.unlocked = false;
    self.confidence = Confidence::Unconfirmed;
  }
}

impl<I, E, D, CHG> Mxt224e<I, D, CHG>
where
  I: I2c<SevenBitAddress, Error = E>,
  D: DelayNs,
  CHG: InputPin,
{
  /// Sample the touch and anti-touch flags and fold them into the
  /// calibration state, recalibrating when they look wrong.
  pub(crate) async fn check_calibration(&mut self, now: Instant) -> Result<(), Error<E>> {
    let counts = self.sample_touch_flags().await?;
    trace!("touch flags: {} touch, {} anti-touch", counts.touch, counts.anti_touch);
    if self.calibration.on_sample(counts, now) {
      debug!("reference looks wrong, recalibrating");
      self.calibrate().await?;
    }
    Ok(())
  }

  async fn sample_touch_flags(&mut self) -> Result<ChannelCounts, Error<E>> {
    let diag = self.objects.address(ObjectType::Diagnostic);
    if diag == 0 {
      return Ok(ChannelCounts::default());
    }
    self.command(Command::Diagnostic, DIAG_TOUCH_FLAGS).await?;

    let mut header = [0xFFu8; 2];
    let mut tries = 0;
    while header != [DIAG_TOUCH_FLAGS, 0] {
      if tries == DIAG_POLL_LIMIT {
        warn!("touch flag page not ready");
        break;
      }
      self.bus.delay_ms(DIAG_POLL_MS).await;
      self.read_at(diag + DIAG_MODE, &mut header).await?;
      tries += 1;
    }

    let mut page = [0u8; 2 + TOUCH_FLAG_SIZE];
    self.read_at(diag, &mut page).await?;
    let counts = if page[DIAG_MODE as usize] == DIAG_TOUCH_FLAGS && page[DIAG_PAGE as usize] == 0 {
      ChannelCounts::from_flags(&page[DIAG_DATA as usize..], self.config.cte.x_channels())
    } else {
      ChannelCounts::default()
    };

    self.command(Command::Diagnostic, DIAG_PAGE_UP).await?;
    Ok(counts)
  }
}
