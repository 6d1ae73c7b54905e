use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use super::defs::*;
use super::{ChargerState, Mxt224e, ObjectTable, ObjectType, Report};
use crate::{Error, Instant};

mod finger;

pub use finger::*;

/// A message read from the controller's message processor, by source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
  Finger { slot: u8, status: TouchStatus, finger: Finger },
  Command(CommandStatus),
  Suppression { active: bool },
  Other(u8),
}

impl Message {
  /// Sort a raw message by the object owning its report id.
  pub fn classify(raw: &[u8; MESSAGE_LEN], objects: &ObjectTable, support: u8, resolution: Resolution) -> Self {
    let report_id = raw[0];
    let fingers = objects.lookup(ObjectType::Multitouch).report_id_base;
    if fingers != 0 && report_id >= fingers && report_id - fingers < support {
      return Self::Finger {
        slot: report_id - fingers,
        status: TouchStatus::from(raw[1]),
        finger: Finger::decode(raw, resolution),
      };
    }
    if objects.lookup(ObjectType::CommandProcessor).owns_report_id(report_id) {
      return Self::Command(CommandStatus::from(raw[1]));
    }
    if objects.lookup(ObjectType::TouchSuppression).owns_report_id(report_id) {
      return Self::Suppression { active: raw[1] != 0 };
    }
    Self::Other(report_id)
  }
}

impl<I, E, D, CHG> Mxt224e<I, D, CHG>
where
  I: I2c<SevenBitAddress, Error = E>,
  D: DelayNs,
  CHG: InputPin,
{
  /// Service one CHG interrupt.
  ///
  /// Reads and applies one message, then builds the frame for the input
  /// layer and applies a charger change if `charger` differs from the last
  /// call. Bus failures are logged and the message is dropped; the returned
  /// report then reflects the last known state.
  pub async fn handle_interrupt(&mut self, now: Instant, charger: ChargerState) -> Report {
    match self.read_message().await {
      Ok(raw) => {
        if let Err(_e) = self.process_message(&raw, now).await {
          warn!("touch message {} dropped after bus error", raw[0]);
        }
      }
      Err(_e) => warn!("touch message read failed"),
    }

    let report = self.tracker.report(self.keypad_enabled, self.config.release_y_threshold);

    if let Err(_e) = self.set_charger_state(charger).await {
      warn!("charger profile switch failed");
    }
    report
  }

  async fn process_message(&mut self, raw: &[u8; MESSAGE_LEN], now: Instant) -> Result<(), Error<E>> {
    match Message::classify(raw, &self.objects, self.tracker.support(), self.resolution) {
      Message::Finger { slot, status, finger } => {
        if self.calibration.confidence() < super::Confidence::Confirmed && self.info.samples_diagnostics() {
          self.check_calibration(now).await?;
        }
        let actions = self.tracker.process(slot, status, finger, &mut self.calibration, now);
        if actions.settle {
          debug!("calibration held, installing settled auto-calibration");
          let image: [u8; 6] = self.config.settled_auto_calibration.into();
          self.write_object(ObjectType::AcquisitionConfig, T8_AUTO_CALIBRATION, &image).await?;
        }
        if actions.recalibrate {
          self.calibrate().await?;
        }
      }
      Message::Command(status) => {
        if status.calibrating() {
          self.calibration.on_calibrating(now);
        }
        if status.reset() {
          info!("touch controller reset");
          self.bus.delay_ms(RESET_SETTLE_MS).await;
          self.calibrate().await?;
        }
      }
      Message::Suppression { active } => {
        if self.calibration.confidence() < super::Confidence::Confirmed && self.info.samples_diagnostics() {
          self.calibrate().await?;
        }
        if active != self.tracker.face_suppressed {
          info!("face suppression {}", active);
        }
        self.tracker.face_suppressed = active;
      }
      Message::Other(_id) => trace!("ignoring report id {}", _id),
    }
    Ok(())
  }
}
