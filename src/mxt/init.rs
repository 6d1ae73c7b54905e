use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};
use heapless::Vec;

use super::calibration::CalibrationState;
use super::defs::*;
use super::{ChargerState, InfoBlock, Mxt224e, ObjectTable, ObjectType};
use crate::{Error, Instant};

/// Steps of the attach sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttachStep {
  WaitForMessage,
  Detect,
  Drain,
  ReadInfo,
  ReadObjects,
  VerifyChecksum,
  ReloadConfig,
  ApplyProfile,
}

impl<I, E, D, CHG> Mxt224e<I, D, CHG>
where
  I: I2c<SevenBitAddress, Error = E>,
  D: DelayNs,
  CHG: InputPin,
{
  pub(super) async fn bring_up(&mut self, now: Instant) -> Result<(), Error<E>> {
    let mut step = AttachStep::WaitForMessage;

    loop {
      trace!("attach step {:?}", step);
      match step {
        AttachStep::WaitForMessage => {
          if !self.wait_for_message().await {
            debug!("no touch messages pending at attach");
          }
          step = AttachStep::Detect;
        }

        AttachStep::Detect => {
          let mut msg = [0u8; MESSAGE_LEN];
          if self.bus.read_raw(&mut msg).await.is_err() {
            error!("no touch controller answering");
            return Err(Error::NoDevice);
          }
          // The first message after power-up comes from the command processor.
          if msg[0] == 1 && CommandStatus::from(msg[1]).is_fatal() {
            error!("touch controller fault {}", msg[1]);
            return Err(Error::DeviceFault(msg[1]));
          }
          step = AttachStep::Drain;
        }

        AttachStep::Drain => {
          let mut msg = [0u8; MESSAGE_LEN];
          for _ in 0..CHG_POLL_LIMIT {
            if !self.message_pending() {
              break;
            }
            self.bus.read_raw(&mut msg).await?;
          }
          step = AttachStep::ReadInfo;
        }

        AttachStep::ReadInfo => {
          let mut raw = [0u8; INFO_BLOCK_LEN];
          self.read_at(INFO_BLOCK_ADDR, &mut raw).await?;
          self.info = InfoBlock::from(raw);
          info!(
            "mXT family {} variant {} version {} build {}",
            self.info.family_id,
            self.info.variant_id,
            self.info.version,
            self.info.build
          );
          step = AttachStep::ReadObjects;
        }

        AttachStep::ReadObjects => {
          let count = self.info.object_count;
          if count as usize > MAX_OBJECTS {
            error!("{} objects declared, table holds {}", count, MAX_OBJECTS);
            return Err(Error::ObjectTableOverflow(count));
          }
          let mut rows: Vec<[u8; OBJECT_ROW_LEN], MAX_OBJECTS> = Vec::new();
          for i in 0..count as u16 {
            let mut row = [0u8; OBJECT_ROW_LEN];
            self.read_at(OBJECT_TABLE_ADDR + i * OBJECT_ROW_LEN as u16, &mut row).await?;
            rows.push(row).map_err(|_| Error::ObjectTableOverflow(count))?;
          }
          self.objects = ObjectTable::from_rows(rows).map_err(Error::ObjectTableOverflow)?;
          step = AttachStep::VerifyChecksum;
        }

        AttachStep::VerifyChecksum => {
          let configured = self.config.checksum;
          step = match configured {
            Some(expected) if self.stored_checksum().await? == Some(expected) => AttachStep::ApplyProfile,
            Some(_) => {
              info!("touch config checksum mismatch");
              AttachStep::ReloadConfig
            }
            None => AttachStep::ReloadConfig,
          };
        }

        AttachStep::ReloadConfig => {
          info!("touch config reload");
          self.backup().await?;
          self.bus.delay_ms(BACKUP_SETTLE_MS).await;
          self.reset().await?;
          self.bus.delay_ms(RESET_SETTLE_MS).await;
          self.write_config().await?;
          self.backup().await?;
          self.wait_for_message().await;
          self.read_message().await?;
          self.reset().await?;
          self.bus.delay_ms(RESET_SETTLE_MS).await;
          step = AttachStep::ApplyProfile;
        }

        AttachStep::ApplyProfile => {
          if self.charger == ChargerState::Connected {
            info!("charger connected at attach");
            self.write_profile(ChargerState::Connected).await?;
          }
          self.calibration = CalibrationState::new(self.info.guarded(), now);
          return Ok(());
        }
      }
    }
  }

  /// Trigger a calibration and pick the config checksum out of the command
  /// processor's answer. `None` when no answer arrived in time.
  async fn stored_checksum(&mut self) -> Result<Option<[u8; 3]>, Error<E>> {
    let command_ids = self.objects.lookup(ObjectType::CommandProcessor);
    self.calibrate().await?;
    for _ in 0..CHG_POLL_LIMIT {
      if self.message_pending() {
        let msg = self.read_message().await?;
        if command_ids.owns_report_id(msg[0]) {
          return Ok(Some([msg[2], msg[3], msg[4]]));
        }
      }
      self.bus.delay_ms(CHG_POLL_MS).await;
    }
    Ok(None)
  }
}
