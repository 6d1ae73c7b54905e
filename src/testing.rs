//! In-memory stand-ins for the two devices and the host's delay provider.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::digital::{ErrorType as PinErrorType, InputPin};
use embedded_hal::i2c::{ErrorKind, ErrorType};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, Operation, SevenBitAddress};

/// Delay provider that only counts.
#[derive(Clone, Default)]
pub(crate) struct FakeDelay(Rc<Cell<u64>>);

impl FakeDelay {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn elapsed_ms(&self) -> u64 {
    self.0.get() / 1_000_000
  }
}

impl DelayNs for FakeDelay {
  async fn delay_ns(&mut self, ns: u32) {
    self.0.set(self.0.get() + ns as u64);
  }
}

fn take_failure(counter: &Cell<u32>) -> bool {
  let left = counter.get();
  if left == 0 {
    return false;
  }
  counter.set(left.saturating_sub(1));
  true
}

// --- TWL6040 ----------------------------------------------------------------

struct TwlModel {
  regs: [u8; 0x31],
  writes: Vec<(u8, u8)>,
  failures: Cell<u32>,
}

/// Simulated TWL6040 register file. Reads return the current register value,
/// writes land in the file and in a log.
#[derive(Clone)]
pub(crate) struct FakeTwl(Rc<RefCell<TwlModel>>);

impl FakeTwl {
  pub(crate) fn new() -> Self {
    let mut regs = [0u8; 0x31];
    regs[0x01] = 0x01;
    regs[0x04] = 0x7F;
    regs[0x12] = 0xFF;
    regs[0x13] = 0x1E;
    regs[0x15] = 0x1D;
    regs[0x17] = 0x1D;
    Self(Rc::new(RefCell::new(TwlModel { regs, writes: Vec::new(), failures: Cell::new(0) })))
  }

  pub(crate) fn set(&self, reg: u8, value: u8) {
    self.0.borrow_mut().regs[reg as usize] = value;
  }

  pub(crate) fn get(&self, reg: u8) -> u8 {
    self.0.borrow().regs[reg as usize]
  }

  pub(crate) fn fail_next(&self, n: u32) {
    self.0.borrow().failures.set(n);
  }

  pub(crate) fn writes(&self) -> Vec<(u8, u8)> {
    self.0.borrow().writes.clone()
  }

  pub(crate) fn writes_to(&self, reg: u8) -> Vec<u8> {
    self.0.borrow().writes.iter().filter(|(r, _)| *r == reg).map(|(_, v)| *v).collect()
  }

  pub(crate) fn clear_writes(&self) {
    self.0.borrow_mut().writes.clear();
  }
}

impl ErrorType for FakeTwl {
  type Error = ErrorKind;
}

impl I2c<SevenBitAddress> for FakeTwl {
  async fn transaction(&mut self, _address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
    let mut model = self.0.borrow_mut();
    if take_failure(&model.failures) {
      return Err(ErrorKind::Other);
    }
    let mut reg = 0usize;
    for op in operations.iter_mut() {
      match op {
        Operation::Write(bytes) => {
          reg = bytes[0] as usize;
          for (i, b) in bytes[1..].iter().enumerate() {
            model.regs[reg + i] = *b;
            model.writes.push(((reg + i) as u8, *b));
          }
        }
        Operation::Read(buf) => {
          for (i, b) in buf.iter_mut().enumerate() {
            *b = model.regs[reg + i];
          }
        }
      }
    }
    Ok(())
  }
}

// --- mXT224E ----------------------------------------------------------------

/// Object row as laid out in the fake's object table:
/// (type, address, size, instances, report ids).
pub(crate) type Row = (u8, u16, u16, u8, u8);

/// Default object layout used by most touch tests. Report ids come out as
/// T6 = 1, T9 = 2..=11, T42 = 12, T46 = 13, T48 = 14.
pub(crate) const STANDARD_ROWS: [Row; 9] = [
  (37, 0x0240, 130, 1, 0),
  (5, 0x0100, 9, 1, 0),
  (6, 0x0110, 6, 1, 1),
  (7, 0x0120, 3, 1, 0),
  (8, 0x0130, 10, 1, 0),
  (9, 0x0140, 35, 1, 10),
  (42, 0x01C0, 8, 1, 1),
  (46, 0x01D0, 9, 1, 1),
  (48, 0x01F0, 54, 1, 1),
];

pub(crate) const T5_ADDR: u16 = 0x0100;
pub(crate) const T6_ADDR: u16 = 0x0110;
pub(crate) const T7_ADDR: u16 = 0x0120;
pub(crate) const T8_ADDR: u16 = 0x0130;
pub(crate) const T37_ADDR: u16 = 0x0240;
pub(crate) const T46_ADDR: u16 = 0x01D0;

struct MxtModel {
  memory: Vec<u8>,
  messages: VecDeque<[u8; 7]>,
  writes: Vec<(u16, Vec<u8>)>,
  calibrate_reply: Option<[u8; 7]>,
  diag_frozen: bool,
  failures: Cell<u32>,
  absent: bool,
}

/// Simulated mXT224E. Reads at the T5 address pop the message queue; the CHG
/// line is low while messages are queued. Diagnostic commands move the T37
/// mode/page header the way the controller does.
#[derive(Clone)]
pub(crate) struct FakeMxt(Rc<RefCell<MxtModel>>);

impl FakeMxt {
  pub(crate) fn new(version: u8, rows: &[Row]) -> Self {
    let mut memory = std::vec![0u8; 0x400];
    memory[..7].copy_from_slice(&[0x81, 0x01, version, 0xAA, 16, 14, rows.len() as u8]);
    for (i, (ty, addr, size, instances, rids)) in rows.iter().enumerate() {
      let [lsb, msb] = addr.to_le_bytes();
      let at = 7 + i * 6;
      memory[at..at + 6].copy_from_slice(&[*ty, lsb, msb, (*size - 1) as u8, instances - 1, *rids]);
    }
    Self(Rc::new(RefCell::new(MxtModel {
      memory,
      messages: VecDeque::new(),
      writes: Vec::new(),
      calibrate_reply: None,
      diag_frozen: false,
      failures: Cell::new(0),
      absent: false,
    })))
  }

  pub(crate) fn standard() -> Self {
    Self::new(0x10, &STANDARD_ROWS)
  }

  pub(crate) fn chg(&self) -> FakeChg {
    FakeChg(self.0.clone())
  }

  pub(crate) fn push_message(&self, msg: [u8; 7]) {
    self.0.borrow_mut().messages.push_back(msg);
  }

  pub(crate) fn pending_messages(&self) -> usize {
    self.0.borrow().messages.len()
  }

  pub(crate) fn set_memory(&self, addr: u16, bytes: &[u8]) {
    let at = addr as usize;
    self.0.borrow_mut().memory[at..at + bytes.len()].copy_from_slice(bytes);
  }

  pub(crate) fn reply_to_calibrate(&self, msg: [u8; 7]) {
    self.0.borrow_mut().calibrate_reply = Some(msg);
  }

  /// Stop the diagnostic object from following T6.DIAG commands.
  pub(crate) fn freeze_diag(&self) {
    self.0.borrow_mut().diag_frozen = true;
  }

  pub(crate) fn remove(&self) {
    self.0.borrow_mut().absent = true;
  }

  pub(crate) fn fail_next(&self, n: u32) {
    self.0.borrow().failures.set(n);
  }

  pub(crate) fn writes(&self) -> Vec<(u16, Vec<u8>)> {
    self.0.borrow().writes.clone()
  }

  pub(crate) fn writes_to(&self, addr: u16) -> Vec<Vec<u8>> {
    self.0.borrow().writes.iter().filter(|(a, _)| *a == addr).map(|(_, d)| d.clone()).collect()
  }

  pub(crate) fn calibrations(&self) -> usize {
    self.writes_to(T6_ADDR + 2).iter().filter(|d| d.as_slice() == [0x55]).count()
  }

  pub(crate) fn clear_writes(&self) {
    self.0.borrow_mut().writes.clear();
  }
}

impl ErrorType for FakeMxt {
  type Error = ErrorKind;
}

impl I2c<SevenBitAddress> for FakeMxt {
  async fn transaction(&mut self, _address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
    let mut model = self.0.borrow_mut();
    if model.absent {
      return Err(ErrorKind::NoAcknowledge(embedded_hal::i2c::NoAcknowledgeSource::Address));
    }
    if take_failure(&model.failures) {
      return Err(ErrorKind::Other);
    }
    let mut addr: Option<u16> = None;
    for op in operations.iter_mut() {
      match op {
        Operation::Write(bytes) => {
          let a = u16::from_le_bytes([bytes[0], bytes[1]]);
          addr = Some(a);
          let data = &bytes[2..];
          if !data.is_empty() {
            let at = a as usize;
            model.memory[at..at + data.len()].copy_from_slice(data);
            model.writes.push((a, data.to_vec()));
            if a == T6_ADDR + 2 && data == [0x55] {
              if let Some(reply) = model.calibrate_reply {
                model.messages.push_back(reply);
              }
            }
            if a == T6_ADDR + 5 && !model.diag_frozen {
              let header = T37_ADDR as usize;
              match data[0] {
                0x01 => model.memory[header + 1] = model.memory[header + 1].wrapping_add(1),
                mode => {
                  model.memory[header] = mode;
                  model.memory[header + 1] = 0;
                }
              }
            }
          }
        }
        Operation::Read(buf) => match addr {
          Some(T5_ADDR) | None => {
            let msg = model.messages.pop_front().unwrap_or([0xFF; 7]);
            let n = buf.len().min(7);
            buf[..n].copy_from_slice(&msg[..n]);
          }
          Some(a) => {
            let at = a as usize;
            let len = buf.len();
            buf.copy_from_slice(&model.memory[at..at + len]);
          }
        },
      }
    }
    Ok(())
  }
}

/// CHG line of a [`FakeMxt`]: low while the device has messages queued.
pub(crate) struct FakeChg(Rc<RefCell<MxtModel>>);

impl PinErrorType for FakeChg {
  type Error = Infallible;
}

impl InputPin for FakeChg {
  fn is_high(&mut self) -> Result<bool, Self::Error> {
    Ok(self.0.borrow().messages.is_empty())
  }

  fn is_low(&mut self) -> Result<bool, Self::Error> {
    Ok(!self.0.borrow().messages.is_empty())
  }
}
