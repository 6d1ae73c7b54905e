use core::fmt::Write;

use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};
use heapless::{String, Vec};

use super::defs::*;
use super::{Mxt224e, ObjectType};
use crate::Error;

const DIAG_VALUES: usize = DIAG_PAGES as usize * DIAG_PAGE_SIZE / 2;
const OBJECT_WINDOW: usize = MAX_DIAG_OBJECT_SIZE as usize;
/// Longest range [`Mxt224e::clear_registers`] zeroes in one call.
pub const MAX_CLEAR_LEN: u16 = 200;

/// One channel-by-channel diagnostic capture.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiagDump {
  pub mode: DiagMode,
  pub x_channels: u8,
  pub y_channels: u8,
  /// Values in channel order, at most `x_channels * y_channels`.
  pub values: Vec<i16, DIAG_VALUES>,
  /// `false` when a page never became ready and the capture stopped early.
  pub complete: bool,
}

impl<I, E, D, CHG> Mxt224e<I, D, CHG>
where
  I: I2c<SevenBitAddress, Error = E>,
  D: DelayNs,
  CHG: InputPin,
{
  /// Vendor tag in the form `ATMEL_x<family>_x<version>`.
  pub fn vendor(&self) -> String<24> {
    let mut s = String::new();
    let _ = write!(s, "ATMEL_x{:04X}_x{:04X}", self.info.family_id, self.info.version);
    s
  }

  pub fn keypad_enabled(&self) -> bool {
    self.keypad_enabled
  }

  /// With the keypad disabled, contacts whose first slot sits on the key
  /// strip are not reported.
  pub fn set_keypad_enabled(&mut self, enabled: bool) {
    self.keypad_enabled = enabled;
  }

  pub async fn read_register(&mut self, addr: u16) -> Result<u8, Error<E>> {
    let mut b = [0u8];
    self.read_at(addr, &mut b).await?;
    Ok(b[0])
  }

  pub async fn write_register(&mut self, addr: u16, value: u8) -> Result<(), Error<E>> {
    self.write_at(addr, &[value]).await
  }

  /// Read a contiguous range of the memory map into `out`.
  pub async fn dump_registers(&mut self, start: u16, out: &mut [u8]) -> Result<(), Error<E>> {
    self.read_at(start, out).await
  }

  /// Zero the registers `first..=last`. With `restart`, the result is
  /// backed up to NV memory and the controller reset.
  pub async fn clear_registers(&mut self, first: u16, last: u16, restart: bool) -> Result<(), Error<E>> {
    if last < first || last - first >= MAX_CLEAR_LEN {
      return Err(Error::BufferOverflow);
    }
    let zeros = [0u8; crate::bus::MAX_PAYLOAD];
    let mut addr = first;
    while addr <= last {
      let len = ((last - addr) as usize + 1).min(zeros.len());
      self.write_at(addr, &zeros[..len]).await?;
      addr += len as u16;
    }
    if restart {
      self.backup().await?;
      self.reset().await?;
    }
    Ok(())
  }

  fn diag_object(&self, object_type: u8) -> Result<super::ObjectEntry, Error<E>> {
    let entry = self.objects.lookup(object_type);
    if object_type > MAX_OBJECT_TYPE || !entry.is_present() {
      return Err(Error::InvalidObject(object_type));
    }
    if entry.size > MAX_DIAG_OBJECT_SIZE {
      return Err(Error::BufferOverflow);
    }
    Ok(entry)
  }

  /// Current contents of one object.
  pub async fn read_object(&mut self, object_type: u8) -> Result<Vec<u8, OBJECT_WINDOW>, Error<E>> {
    let entry = self.diag_object(object_type)?;
    let mut buf = [0u8; OBJECT_WINDOW];
    let data = &mut buf[..entry.size as usize];
    self.read_at(entry.address, data).await?;
    Vec::from_slice(data).map_err(|_| Error::BufferOverflow)
  }

  /// Overwrite one byte of an object.
  pub async fn write_object_byte(&mut self, object_type: u8, offset: u8, value: u8) -> Result<(), Error<E>> {
    let entry = self.diag_object(object_type)?;
    if offset as u16 >= entry.size {
      return Err(Error::InvalidObject(object_type));
    }
    self.write_at(entry.address + offset as u16, &[value]).await
  }

  /// Capture deltas or references for every channel.
  ///
  /// Pages are fetched until all `X × Y` channels are covered. If a page does
  /// not show up in time the capture stops and returns what it has.
  pub async fn diag_dump(&mut self, mode: DiagMode) -> Result<DiagDump, Error<E>> {
    let diag = self.objects.lookup(ObjectType::Diagnostic);
    if !diag.is_present() {
      return Err(Error::InvalidObject(ObjectType::Diagnostic.into()));
    }
    let cte = self.config.cte;
    let mut dump =
      DiagDump { mode, x_channels: cte.x_channels(), y_channels: cte.y_channels(), values: Vec::new(), complete: true };
    let total = (dump.x_channels as usize * dump.y_channels as usize).min(DIAG_VALUES);

    self.command(Command::Diagnostic, mode as u8).await?;
    'pages: for page in 0..DIAG_PAGES {
      let mut header = [0xFFu8; 2];
      let mut tries = 0;
      while header != [mode as u8, page] {
        if tries == DIAG_POLL_LIMIT {
          warn!("diagnostic page {} not ready", page);
          dump.complete = false;
          break 'pages;
        }
        self.bus.delay_ms(DIAG_POLL_MS).await;
        self.read_at(diag.address + DIAG_MODE, &mut header).await?;
        tries += 1;
      }

      let mut data = [0u8; DIAG_PAGE_SIZE];
      self.read_at(diag.address + DIAG_DATA, &mut data).await?;
      for pair in data.chunks_exact(2) {
        if dump.values.len() >= total {
          break 'pages;
        }
        let _ = dump.values.push(i16::from_le_bytes([pair[0], pair[1]]));
      }
      self.command(Command::Diagnostic, DIAG_PAGE_UP).await?;
    }
    Ok(dump)
  }
}
