use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::Error;

/// Attempts per transfer before the bus error is handed back.
pub(crate) const RETRY_LIMIT: u8 = 10;
/// Pause between attempts.
pub(crate) const RETRY_DELAY_MS: u32 = 10;
/// Largest register address prefix (16-bit object addresses).
const MAX_HEADER: usize = 2;
/// Largest payload written in one frame.
pub(crate) const MAX_PAYLOAD: usize = 64;

/// Retrying register transport shared by both drivers.
///
/// Every transfer is an addressed write-then-read (or a single write with the
/// address prefixed). Failed transfers are retried after a short pause; the
/// last bus error is surfaced once the budget is spent.
pub(crate) struct Bus<I, D> {
  i2c: I,
  delay: D,
  address: SevenBitAddress,
}

impl<I, E, D> Bus<I, D>
where
  I: I2c<SevenBitAddress, Error = E>,
  D: DelayNs,
{
  pub(crate) fn new(i2c: I, delay: D, address: SevenBitAddress) -> Self {
    Self { i2c, delay, address }
  }

  pub(crate) async fn delay_ms(&mut self, ms: u32) {
    self.delay.delay_ms(ms).await
  }

  /// Read `buf.len()` bytes starting at the register named by `reg`.
  pub(crate) async fn read(&mut self, reg: &[u8], buf: &mut [u8]) -> Result<(), Error<E>> {
    let mut attempt = 1;
    loop {
      match self.i2c.write_read(self.address, reg, buf).await {
        Ok(()) => return Ok(()),
        Err(e) if attempt >= RETRY_LIMIT => {
          error!("i2c read failed after {} attempts", attempt);
          return Err(Error::I2c(e));
        }
        Err(_) => {
          attempt += 1;
          self.delay.delay_ms(RETRY_DELAY_MS).await;
        }
      }
    }
  }

  /// Write `data` to the register named by `reg` in one frame.
  pub(crate) async fn write(&mut self, reg: &[u8], data: &[u8]) -> Result<(), Error<E>> {
    let header = reg.len();
    let len = header + data.len();
    if header > MAX_HEADER || data.len() > MAX_PAYLOAD {
      return Err(Error::BufferOverflow);
    }
    let mut buf = [0u8; MAX_HEADER + MAX_PAYLOAD];
    buf[..header].copy_from_slice(reg);
    buf[header..len].copy_from_slice(data);

    let mut attempt = 1;
    loop {
      match self.i2c.write(self.address, &buf[..len]).await {
        Ok(()) => return Ok(()),
        Err(e) if attempt >= RETRY_LIMIT => {
          error!("i2c write failed after {} attempts", attempt);
          return Err(Error::I2c(e));
        }
        Err(_) => {
          attempt += 1;
          self.delay.delay_ms(RETRY_DELAY_MS).await;
        }
      }
    }
  }

  /// Single unaddressed read, no retry. Used to probe for the device.
  pub(crate) async fn read_raw(&mut self, buf: &mut [u8]) -> Result<(), Error<E>> {
    self.i2c.read(self.address, buf).await.map_err(Error::I2c)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{FakeDelay, FakeTwl};
  use embassy_futures::block_on;
  use embedded_hal::i2c::ErrorKind;

  #[test]
  fn read_retries_until_the_device_answers() {
    let twl = FakeTwl::new();
    twl.fail_next(3);
    twl.set(0x30, 0x02);
    let delay = FakeDelay::new();
    let mut bus = Bus::new(twl.clone(), delay.clone(), 0x4B);

    let mut buf = [0u8];
    block_on(bus.read(&[0x30], &mut buf)).unwrap();
    assert_eq!(buf[0], 0x02);
    assert_eq!(delay.elapsed_ms(), 3 * RETRY_DELAY_MS as u64);
  }

  #[test]
  fn read_gives_up_after_retry_budget() {
    let twl = FakeTwl::new();
    twl.fail_next(u32::MAX);
    let delay = FakeDelay::new();
    let mut bus = Bus::new(twl.clone(), delay.clone(), 0x4B);

    let mut buf = [0u8];
    let err = block_on(bus.read(&[0x30], &mut buf)).unwrap_err();
    assert_eq!(err, Error::I2c(ErrorKind::Other));
    assert_eq!(delay.elapsed_ms(), (RETRY_LIMIT as u64 - 1) * RETRY_DELAY_MS as u64);
  }

  #[test]
  fn oversized_write_never_reaches_the_bus() {
    let twl = FakeTwl::new();
    let mut bus = Bus::new(twl.clone(), FakeDelay::new(), 0x4B);
    let data = [0u8; MAX_PAYLOAD + 1];
    assert_eq!(block_on(bus.write(&[0x12], &data)), Err(Error::BufferOverflow));
    assert!(twl.writes().is_empty());
  }
}
