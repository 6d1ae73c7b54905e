use crate::mxt::defs::MESSAGE_LEN;

/// Coordinate packing of multitouch messages.
///
/// X always carries 10 bits. Y carries 12 when the configured Y range needs
/// more than 10, in which case the shared low byte donates its lower nibble
/// to Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
  #[default]
  Y10,
  Y12,
}

impl Resolution {
  pub const fn for_y_range(y_range: u16) -> Self {
    if y_range >= 1024 {
      Self::Y12
    } else {
      Self::Y10
    }
  }
}

/// Last known data of one contact slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Finger {
  pub x: u16,
  pub y: u16,
  /// Contact area in channels.
  pub width: u8,
  /// Signal amplitude.
  pub amplitude: u8,
}

impl Finger {
  /// Decode the position block of a multitouch message.
  pub fn decode(msg: &[u8; MESSAGE_LEN], resolution: Resolution) -> Self {
    let (xmsb, ymsb, lsb) = (msg[2] as u16, msg[3] as u16, msg[4] as u16);
    let x = (xmsb << 2) | (lsb >> 6);
    let y = match resolution {
      Resolution::Y10 => (ymsb << 2) | ((lsb & 0x0C) >> 2),
      Resolution::Y12 => (ymsb << 4) | (lsb & 0x0F),
    };
    Self { x, y, width: msg[5], amplitude: msg[6] }
  }

  /// Distance along each axis to another position.
  pub(crate) fn offset_from(&self, x: u16, y: u16) -> (u16, u16) {
    (self.x.abs_diff(x), self.y.abs_diff(y))
  }
}
