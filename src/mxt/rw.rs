use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use super::defs::*;
use super::{Mxt224e, ObjectType};
use crate::Error;

impl<I, E, D, CHG> Mxt224e<I, D, CHG>
where
  I: I2c<SevenBitAddress, Error = E>,
  D: DelayNs,
  CHG: InputPin,
{
  /// The controller holds CHG low while messages are waiting.
  pub(crate) fn message_pending(&mut self) -> bool {
    self.chg.is_low().unwrap_or(false)
  }

  pub(crate) async fn read_at(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), Error<E>> {
    self.bus.read(&addr.to_le_bytes(), buf).await
  }

  pub(crate) async fn write_at(&mut self, addr: u16, data: &[u8]) -> Result<(), Error<E>> {
    self.bus.write(&addr.to_le_bytes(), data).await
  }

  /// Next message from the message processor.
  pub(crate) async fn read_message(&mut self) -> Result<[u8; MESSAGE_LEN], Error<E>> {
    let addr = self.objects.address(ObjectType::MessageProcessor);
    let mut msg = [0u8; MESSAGE_LEN];
    self.read_at(addr, &mut msg).await?;
    Ok(msg)
  }

  /// Write into an object starting at `offset`.
  ///
  /// Absent objects are skipped and data past the object's end is dropped,
  /// so a missing or smaller object never leads to a stray write.
  pub(crate) async fn write_object(&mut self, object: ObjectType, offset: u16, data: &[u8]) -> Result<(), Error<E>> {
    let entry = self.objects.lookup(object);
    if !entry.is_present() {
      trace!("skipping write to absent object {}", u8::from(object));
      return Ok(());
    }
    if offset >= entry.size {
      return Ok(());
    }
    let len = data.len().min((entry.size - offset) as usize);
    self.write_at(entry.address + offset, &data[..len]).await
  }

  pub(crate) async fn command(&mut self, command: Command, value: u8) -> Result<(), Error<E>> {
    self.write_object(ObjectType::CommandProcessor, command as u16, &[value]).await
  }

  /// Ask the controller to recapture its references.
  pub async fn calibrate(&mut self) -> Result<(), Error<E>> {
    self.command(Command::Calibrate, CALIBRATE_VALUE).await
  }

  pub(crate) async fn backup(&mut self) -> Result<(), Error<E>> {
    self.command(Command::BackupNv, BACKUP_VALUE).await
  }

  pub(crate) async fn reset(&mut self) -> Result<(), Error<E>> {
    self.command(Command::Reset, RESET_VALUE).await
  }

  /// Wait for CHG to drop, up to the attach poll budget.
  pub(crate) async fn wait_for_message(&mut self) -> bool {
    for _ in 0..CHG_POLL_LIMIT {
      if self.message_pending() {
        return true;
      }
      self.bus.delay_ms(CHG_POLL_MS).await;
    }
    self.message_pending()
  }
}
