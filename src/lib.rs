#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Async, `no_std` drivers for two parts of an OMAP4 tablet's human interface:
//!
//! - the Atmel mXT224E capacitive touchscreen controller ([`mxt`]), driven
//!   through its self-describing object table, with multi-touch tracking and
//!   the calibration-confirmation heuristics the part needs to recover from
//!   bad references;
//! - the TWL6040 audio codec's accessory side ([`twl6040`]): staged headset
//!   plug / microphone / hook discrimination and click-less output gain ramps.
//!
//! Both drivers sit on `embedded-hal-async` 1.0 I²C and delay traits. Time is
//! passed in explicitly as an [`Instant`]; deferred work is exposed as
//! deadlines that the host services by calling `poll` again, so neither driver
//! owns a timer or an executor.
//!
//! ```no_run
//! use embedded_hal::digital::InputPin;
//! use embedded_hal_async::{delay::DelayNs, i2c::{I2c, SevenBitAddress}};
//! use mxt_twl::mxt::{ChargerState, Config, Mxt224e, Report};
//! use mxt_twl::Instant;
//!
//! async fn example<I2C, D, CHG, E>(i2c: I2C, delay: D, chg: CHG) -> Result<(), mxt_twl::Error<E>>
//! where
//!   I2C: I2c<SevenBitAddress, Error = E>,
//!   D: DelayNs,
//!   CHG: InputPin,
//! {
//!   let now = Instant::from_ticks(0);
//!   let mut touch = Mxt224e::attach(i2c, delay, chg, Config::default(), ChargerState::Disconnected, now).await?;
//!   if let Report::Contacts(contacts) = touch.handle_interrupt(now, ChargerState::Disconnected).await {
//!     for c in contacts.iter() {
//!       let _ = (c.slot, c.x, c.y);
//!     }
//!   }
//!   Ok(())
//! }
//! ```

#[macro_use]
mod fmt;

mod bus;
pub mod mxt;
#[cfg(test)]
mod testing;
pub mod twl6040;

/// Monotonic millisecond timestamp supplied by the host.
pub type Instant = fugit::TimerInstantU64<1000>;
/// Millisecond duration matching [`Instant`].
pub type Duration = fugit::MillisDurationU64;

/// Errors that can occur while talking to either device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
  /// I²C transaction still failing after the retry budget was spent.
  I2c(E),
  /// Nothing answered the first read during attach.
  NoDevice,
  /// The controller reported a signal or communication fault at attach
  /// (raw command-processor status byte).
  DeviceFault(u8),
  /// The device declared more objects than the table can hold.
  ObjectTableOverflow(u8),
  /// A payload did not fit in one bus frame.
  BufferOverflow,
  /// The requested object type, or offset within it, does not exist.
  InvalidObject(u8),
  /// The operation is refused while the affected hardware block is running.
  Busy,
}
