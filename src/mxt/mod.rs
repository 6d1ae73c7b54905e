//! Atmel mXT224E capacitive touchscreen controller.
//!
//! The controller describes itself through an object table read at attach:
//! every function (messages, commands, power, acquisition, multitouch, ...)
//! is an object with its own address and report ids. [`Mxt224e::attach`]
//! discovers the table, reloads the platform configuration when the stored
//! checksum does not match, and from then on [`Mxt224e::handle_interrupt`]
//! turns each CHG interrupt into a [`Report`].
//!
//! Besides finger tracking the driver watches over the controller's reference
//! calibration. A calibration taken while something touched the panel leaves
//! "anti-touch" ghosts; the driver samples the touch flags until a clean
//! calibration is confirmed, recalibrates when the flags look wrong, and
//! relaxes the auto-calibration once a long single-finger stroke has proven the
//! reference good.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::bus::Bus;
use crate::{Error, Instant};

mod calibration;
mod config;
mod defs;
mod diag;
mod event;
mod init;
mod object;
mod rw;
mod tracker;

pub use calibration::{CalibrationState, ChannelCounts, Confidence, Guard};
pub use config::*;
pub use defs::{CommandStatus, DiagMode, ObjectType, TouchStatus, MAX_FINGERS, MAX_OBJECTS};
pub use diag::{DiagDump, MAX_CLEAR_LEN};
pub use event::{Finger, Message, Resolution};
pub use init::AttachStep;
pub use object::{InfoBlock, ObjectEntry, ObjectTable};
pub use tracker::{Contact, Report};

use defs::*;
use tracker::FingerTracker;

/// A touch driver shared between the interrupt task and the rest of the
/// system. Interrupt handling, charger changes, suspend and resume all run
/// under the one lock.
pub type SharedMxt<M, I, D, CHG> = Mutex<M, Mxt224e<I, D, CHG>>;

/// Coarse view of the touch state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TouchState {
  /// No contact, calibration not yet confirmed.
  Idle,
  /// Contacts down.
  FingerActive(u8),
  /// A clean sample was seen; waiting for it to hold.
  CalibrationPending,
  CalibrationConfirmed,
}

/// Driver for one mXT224E.
pub struct Mxt224e<I, D, CHG> {
  bus: Bus<I, D>,
  chg: CHG,
  config: Config,
  info: InfoBlock,
  objects: ObjectTable,
  resolution: Resolution,
  tracker: FingerTracker,
  calibration: CalibrationState,
  charger: ChargerState,
  keypad_enabled: bool,
}

impl<I, E, D, CHG> Mxt224e<I, D, CHG>
where
  I: I2c<SevenBitAddress, Error = E>,
  D: DelayNs,
  CHG: InputPin,
{
  /// Find the controller, read its object table, make sure it runs `config`
  /// and apply the profile for the current charger state.
  pub async fn attach(
    i2c: I,
    delay: D,
    chg: CHG,
    config: Config,
    charger: ChargerState,
    now: Instant,
  ) -> Result<Self, Error<E>> {
    let mut dev = Self {
      bus: Bus::new(i2c, delay, I2C_ADDR),
      chg,
      config,
      info: InfoBlock::default(),
      objects: ObjectTable::default(),
      resolution: Resolution::for_y_range(config.multitouch.y_range),
      tracker: FingerTracker::new(config.multitouch.finger_support()),
      calibration: CalibrationState::new(false, now),
      charger,
      keypad_enabled: true,
    };
    dev.bring_up(now).await?;
    Ok(dev)
  }

  /// Wrap the driver for sharing between tasks.
  pub fn into_shared<M: RawMutex>(self) -> SharedMxt<M, I, D, CHG> {
    Mutex::new(self)
  }

  pub fn info(&self) -> InfoBlock {
    self.info
  }

  pub fn objects(&self) -> &ObjectTable {
    &self.objects
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn calibration(&self) -> &CalibrationState {
    &self.calibration
  }

  pub fn charger_state(&self) -> ChargerState {
    self.charger
  }

  pub fn resolution(&self) -> Resolution {
    self.resolution
  }

  /// Number of contacts currently down.
  pub fn finger_count(&self) -> u8 {
    self.tracker.count()
  }

  /// Last known data of a slot.
  pub fn finger(&self, slot: u8) -> Option<Finger> {
    (slot < self.tracker.support()).then(|| self.tracker.slot(slot))
  }

  pub fn face_suppressed(&self) -> bool {
    self.tracker.face_suppressed
  }

  pub fn state(&self) -> TouchState {
    if self.tracker.count() > 0 {
      return TouchState::FingerActive(self.tracker.count());
    }
    match self.calibration.confidence() {
      Confidence::Unconfirmed => TouchState::Idle,
      Confidence::Pending => TouchState::CalibrationPending,
      Confidence::Confirmed => TouchState::CalibrationConfirmed,
    }
  }

  /// Switch the sensitivity profile for a new charger state and recalibrate.
  /// Nothing happens if the state did not change.
  pub async fn set_charger_state(&mut self, charger: ChargerState) -> Result<(), Error<E>> {
    if charger == self.charger {
      return Ok(());
    }
    info!("charger {:?}, switching touch profile", charger);
    self.charger = charger;
    self.write_profile(charger).await?;
    self.calibration.on_profile_change();
    self.bus.delay_ms(PROFILE_SETTLE_MS).await;
    self.calibrate().await
  }

  /// Stop acquisition. Contacts are forgotten; the anti-touch recovery of the
  /// platform image is restored so the next wake-up starts conservative.
  pub async fn suspend(&mut self) -> Result<(), Error<E>> {
    self.tracker.clear();
    if self.info.guarded() {
      self.calibration.on_suspend();
      let anti_touch = self.config.acquisition.auto_calibration.anti_touch();
      self.write_object(ObjectType::AcquisitionConfig, T8_ANTI_TOUCH, &anti_touch).await?;
    }
    self.write_object(ObjectType::PowerConfig, 0, &PowerConfig::sleep().intervals()).await
  }

  /// Restart acquisition with the current profile and a fresh calibration.
  pub async fn resume(&mut self, now: Instant) -> Result<(), Error<E>> {
    self.calibration.on_resume(now);
    let power: [u8; 3] = self.config.profile(self.charger).power.into();
    self.write_object(ObjectType::PowerConfig, 0, &power).await?;
    self.bus.delay_ms(RESUME_SETTLE_MS).await;
    let image: [u8; 6] = self.config.normal_auto_calibration.into();
    self.write_object(ObjectType::AcquisitionConfig, T8_AUTO_CALIBRATION, &image).await?;
    self.calibrate().await
  }
}
