use bitfield_struct::bitfield;

pub(crate) const I2C_ADDR: u8 = 0x4A;

pub(crate) const INFO_BLOCK_ADDR: u16 = 0x00;
pub(crate) const INFO_BLOCK_LEN: usize = 7;
pub(crate) const OBJECT_TABLE_ADDR: u16 = 0x07;
pub(crate) const OBJECT_ROW_LEN: usize = 6;
pub(crate) const MESSAGE_LEN: usize = 7;

/// Capacity of the object table.
pub const MAX_OBJECTS: usize = 32;
/// Most contacts the controller tracks at once.
pub const MAX_FINGERS: usize = 10;

/// Object types the driver knows by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ObjectType {
  MessageProcessor = 5,
  CommandProcessor = 6,
  PowerConfig = 7,
  AcquisitionConfig = 8,
  Multitouch = 9,
  KeyArray = 15,
  CommsConfig = 18,
  GpioPwm = 19,
  Proximity = 23,
  SelfTest = 25,
  Diagnostic = 37,
  UserData = 38,
  GripSuppression = 40,
  TouchSuppression = 42,
  CteConfig = 46,
  Stylus = 47,
  NoiseSuppression = 48,
}

impl From<ObjectType> for u8 {
  fn from(value: ObjectType) -> Self {
    value as u8
  }
}

/// Highest object type reachable through the diagnostic surface.
pub(crate) const MAX_OBJECT_TYPE: u8 = 48;
/// Largest object the diagnostic surface will move in one go.
pub(crate) const MAX_DIAG_OBJECT_SIZE: u16 = 60;

/// Offsets of the command-processor (T6) fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Command {
  Reset = 0,
  BackupNv = 1,
  Calibrate = 2,
  Diagnostic = 5,
}

pub(crate) const RESET_VALUE: u8 = 0x11;
pub(crate) const BACKUP_VALUE: u8 = 0x55;
pub(crate) const CALIBRATE_VALUE: u8 = 0x55;

/// Diagnostic (T6.DIAG) commands.
pub(crate) const DIAG_PAGE_UP: u8 = 0x01;
pub(crate) const DIAG_TOUCH_FLAGS: u8 = 0xF3;

/// Diagnostic modes that produce one value per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DiagMode {
  Deltas = 0x10,
  References = 0x11,
}

/// Layout of the diagnostic (T37) object.
pub(crate) const DIAG_MODE: u16 = 0;
pub(crate) const DIAG_PAGE: u16 = 1;
pub(crate) const DIAG_DATA: u16 = 2;
pub(crate) const DIAG_PAGE_SIZE: usize = 128;
pub(crate) const DIAG_PAGES: u8 = 4;
pub(crate) const TOUCH_FLAG_SIZE: usize = 80;
pub(crate) const ANTI_TOUCH_FLAG_OFFSET: usize = 40;

/// Channel matrix in CTE mode 0.
pub(crate) const MODE0_X_CHANNELS: u8 = 16;
pub(crate) const MODE0_Y_CHANNELS: u8 = 14;

/// Offsets into the acquisition (T8) object.
pub(crate) const T8_AUTO_CALIBRATION: u16 = 4;
pub(crate) const T8_ANTI_TOUCH: u16 = 6;

/// Settling times, in milliseconds.
pub(crate) const RESET_SETTLE_MS: u32 = 100;
pub(crate) const BACKUP_SETTLE_MS: u32 = 10;
pub(crate) const CHG_POLL_MS: u32 = 10;
pub(crate) const CHG_POLL_LIMIT: u8 = 10;
pub(crate) const DIAG_POLL_MS: u32 = 5;
pub(crate) const DIAG_POLL_LIMIT: u8 = 10;
pub(crate) const PROFILE_SETTLE_MS: u32 = 20;
pub(crate) const RESUME_SETTLE_MS: u32 = 1;

/// Status byte of a command-processor (T6) message.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct CommandStatus {
  #[bits(2)]
  __: u8,
  pub comms_error: bool,
  pub config_error: bool,
  pub calibrating: bool,
  pub signal_error: bool,
  pub overflow: bool,
  pub reset: bool,
}

impl CommandStatus {
  /// Faults that make the controller unusable at attach.
  pub const fn is_fatal(&self) -> bool {
    self.signal_error() || self.comms_error()
  }
}

/// Status byte of a multitouch (T9) message.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct TouchStatus {
  pub ungrip: bool,
  pub suppress: bool,
  pub amplitude: bool,
  pub vector: bool,
  pub moved: bool,
  pub release: bool,
  pub press: bool,
  pub detect: bool,
}

impl TouchStatus {
  /// The contact is on the panel: newly pressed or still tracked.
  pub const fn is_touching(&self) -> bool {
    self.detect() || self.press()
  }
}
