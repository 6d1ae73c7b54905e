/// Opaque image of an object the driver writes but never interprets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawObject<const N: usize>(pub [u8; N]);

impl<const N: usize> RawObject<N> {
  pub const fn new(bytes: [u8; N]) -> Self {
    Self(bytes)
  }

  /// All-zero image, which leaves the object disabled.
  pub const fn disabled() -> Self {
    Self([0; N])
  }

  pub const fn as_bytes(&self) -> &[u8; N] {
    &self.0
  }
}

impl<const N: usize> Default for RawObject<N> {
  fn default() -> Self {
    Self::disabled()
  }
}

impl<const N: usize> From<RawObject<N>> for [u8; N] {
  fn from(r: RawObject<N>) -> Self {
    r.0
  }
}
