use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use super::{Mxt224e, ObjectType};
use crate::Error;

mod acquisition;
mod cte;
mod multitouch;
mod power;
mod raw;

pub use acquisition::*;
pub use cte::*;
pub use multitouch::*;
pub use power::*;
pub use raw::*;

/// Slot 0 positions at or below this Y line belong to the capacitive keys
/// under the panel; they are only reported while the keypad is enabled.
pub const DEFAULT_RELEASE_Y_THRESHOLD: u16 = 1305;

/// External power as seen by the touch panel. A charger couples noise into
/// the sensor, so each state has its own sensitivity profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargerState {
  #[default]
  Disconnected,
  Connected,
}

/// Platform configuration for the controller.
///
/// Nothing is sent to the device until attach decides the stored
/// configuration is stale (checksum mismatch or no checksum given).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
  pub command: RawObject<6>,
  pub power: PowerConfig,
  pub acquisition: AcquisitionConfig,
  pub multitouch: MultitouchConfig,
  pub key_array: RawObject<11>,
  pub gpio_pwm: RawObject<16>,
  pub proximity: RawObject<15>,
  pub self_test: RawObject<14>,
  pub grip_suppression: RawObject<5>,
  pub touch_suppression: RawObject<8>,
  pub cte: CteConfig,
  pub stylus: RawObject<10>,
  pub noise_suppression: RawObject<54>,
  /// Overrides used while a charger is connected.
  pub cable: CableConfig,
  /// Expected configuration checksum; `None` forces a reload at attach.
  pub checksum: Option<[u8; 3]>,
  /// Auto-calibration image used while a calibration is unconfirmed.
  pub normal_auto_calibration: AutoCalibration,
  /// Auto-calibration image used once a calibration has held.
  pub settled_auto_calibration: AutoCalibration,
  pub release_y_threshold: u16,
}

impl Config {
  pub const fn new() -> Self {
    Self {
      command: RawObject::disabled(),
      power: PowerConfig::new(),
      acquisition: AcquisitionConfig::new(),
      multitouch: MultitouchConfig::new(),
      key_array: RawObject::disabled(),
      gpio_pwm: RawObject::disabled(),
      proximity: RawObject::disabled(),
      self_test: RawObject::disabled(),
      grip_suppression: RawObject::disabled(),
      touch_suppression: RawObject::disabled(),
      cte: CteConfig::new(),
      stylus: RawObject::disabled(),
      noise_suppression: RawObject::disabled(),
      cable: CableConfig::new(),
      checksum: None,
      normal_auto_calibration: AutoCalibration::new(),
      settled_auto_calibration: AutoCalibration::settled(),
      release_y_threshold: DEFAULT_RELEASE_Y_THRESHOLD,
    }
  }

  pub const fn with_power(mut self, power: PowerConfig) -> Self {
    self.power = power;
    self
  }

  pub const fn with_acquisition(mut self, acquisition: AcquisitionConfig) -> Self {
    self.acquisition = acquisition;
    self
  }

  pub const fn with_multitouch(mut self, multitouch: MultitouchConfig) -> Self {
    self.multitouch = multitouch;
    self
  }

  pub const fn with_cte(mut self, cte: CteConfig) -> Self {
    self.cte = cte;
    self
  }

  pub const fn with_noise_suppression(mut self, noise_suppression: RawObject<54>) -> Self {
    self.noise_suppression = noise_suppression;
    self
  }

  pub const fn with_cable(mut self, cable: CableConfig) -> Self {
    self.cable = cable;
    self
  }

  pub const fn with_checksum(mut self, checksum: [u8; 3]) -> Self {
    self.checksum = Some(checksum);
    self
  }

  pub const fn with_auto_calibration(mut self, normal: AutoCalibration, settled: AutoCalibration) -> Self {
    self.normal_auto_calibration = normal;
    self.settled_auto_calibration = settled;
    self
  }

  pub const fn with_release_y_threshold(mut self, threshold: u16) -> Self {
    self.release_y_threshold = threshold;
    self
  }

  /// Objects rewritten when the charger state changes.
  pub fn profile(&self, charger: ChargerState) -> Profile {
    match charger {
      ChargerState::Disconnected => Profile {
        power: self.power,
        acquisition: Some(self.acquisition),
        cte: Some(self.cte),
        noise_suppression: Some(self.noise_suppression),
      },
      ChargerState::Connected => Profile {
        power: self.cable.power.unwrap_or(self.power),
        acquisition: self.cable.acquisition,
        cte: self.cable.cte,
        noise_suppression: self.cable.noise_suppression,
      },
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::new()
  }
}

/// Charger-connected overrides. Missing entries are left as they are on the
/// device when switching profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CableConfig {
  pub power: Option<PowerConfig>,
  pub acquisition: Option<AcquisitionConfig>,
  pub cte: Option<CteConfig>,
  pub noise_suppression: Option<RawObject<54>>,
}

impl CableConfig {
  pub const fn new() -> Self {
    Self { power: None, acquisition: None, cte: None, noise_suppression: None }
  }

  pub const fn with_power(mut self, power: PowerConfig) -> Self {
    self.power = Some(power);
    self
  }

  pub const fn with_acquisition(mut self, acquisition: AcquisitionConfig) -> Self {
    self.acquisition = Some(acquisition);
    self
  }

  pub const fn with_cte(mut self, cte: CteConfig) -> Self {
    self.cte = Some(cte);
    self
  }

  pub const fn with_noise_suppression(mut self, noise_suppression: RawObject<54>) -> Self {
    self.noise_suppression = Some(noise_suppression);
    self
  }
}

/// Per-charger-state subset of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Profile {
  pub power: PowerConfig,
  pub acquisition: Option<AcquisitionConfig>,
  pub cte: Option<CteConfig>,
  pub noise_suppression: Option<RawObject<54>>,
}

impl<I, E, D, CHG> Mxt224e<I, D, CHG>
where
  I: I2c<SevenBitAddress, Error = E>,
  D: DelayNs,
  CHG: InputPin,
{
  /// Push every configured object to the controller.
  pub(crate) async fn write_config(&mut self) -> Result<(), Error<E>> {
    let c = self.config;
    self.write_object(ObjectType::CommandProcessor, 0, c.command.as_bytes()).await?;
    self.write_object(ObjectType::PowerConfig, 0, &<[u8; 3]>::from(c.power)).await?;
    self.write_object(ObjectType::AcquisitionConfig, 0, &<[u8; 10]>::from(c.acquisition)).await?;
    self.write_object(ObjectType::Multitouch, 0, &<[u8; 35]>::from(c.multitouch)).await?;
    self.write_object(ObjectType::KeyArray, 0, c.key_array.as_bytes()).await?;
    self.write_object(ObjectType::GpioPwm, 0, c.gpio_pwm.as_bytes()).await?;
    self.write_object(ObjectType::Proximity, 0, c.proximity.as_bytes()).await?;
    self.write_object(ObjectType::SelfTest, 0, c.self_test.as_bytes()).await?;
    self.write_object(ObjectType::GripSuppression, 0, c.grip_suppression.as_bytes()).await?;
    self.write_object(ObjectType::TouchSuppression, 0, c.touch_suppression.as_bytes()).await?;
    self.write_object(ObjectType::CteConfig, 0, &<[u8; 9]>::from(c.cte)).await?;
    self.write_object(ObjectType::Stylus, 0, c.stylus.as_bytes()).await?;
    self.write_object(ObjectType::NoiseSuppression, 0, c.noise_suppression.as_bytes()).await
  }

  /// Write the charger-dependent objects of a profile.
  pub(crate) async fn write_profile(&mut self, charger: ChargerState) -> Result<(), Error<E>> {
    let profile = self.config.profile(charger);
    if let Some(acquisition) = profile.acquisition {
      self.write_object(ObjectType::AcquisitionConfig, 0, &<[u8; 10]>::from(acquisition)).await?;
    }
    if let Some(cte) = profile.cte {
      self.write_object(ObjectType::CteConfig, 0, &<[u8; 9]>::from(cte)).await?;
    }
    if let Some(noise) = profile.noise_suppression {
      self.write_object(ObjectType::NoiseSuppression, 0, noise.as_bytes()).await?;
    }
    Ok(())
  }
}
