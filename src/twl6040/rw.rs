use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use super::defs::{Reg, Status};
use super::Twl6040;
use crate::Error;

impl<I, E, D> Twl6040<I, D>
where
  I: I2c<SevenBitAddress, Error = E>,
  D: DelayNs,
{
  /// Read a register from the device, refreshing the cache.
  pub(crate) async fn read_reg(&mut self, reg: Reg) -> Result<u8, Error<E>> {
    let mut b = [0u8];
    self.bus.read(&[reg.into()], &mut b).await?;
    self.cache[reg as usize] = b[0];
    Ok(b[0])
  }

  pub(crate) fn cached(&self, reg: Reg) -> u8 {
    self.cache[reg as usize]
  }

  pub(crate) async fn write_reg(&mut self, reg: Reg, value: u8) -> Result<(), Error<E>> {
    self.bus.write(&[reg.into()], &[value]).await?;
    self.cache[reg as usize] = value;
    Ok(())
  }

  /// Read-modify-write against the cached value; skips the bus when nothing
  /// changes.
  pub(crate) async fn update_bits(&mut self, reg: Reg, mask: u8, value: u8) -> Result<(), Error<E>> {
    let old = self.cached(reg);
    let new = (old & !mask) | (value & mask);
    if new == old {
      return Ok(());
    }
    self.write_reg(reg, new).await
  }

  pub(crate) async fn set_bits(&mut self, reg: Reg, mask: u8, on: bool) -> Result<(), Error<E>> {
    self.update_bits(reg, mask, if on { mask } else { 0 }).await
  }

  /// Live jack comparator state.
  pub(crate) async fn status(&mut self) -> Result<Status, Error<E>> {
    self.read_reg(Reg::Status).await.map(Status::from)
  }
}
