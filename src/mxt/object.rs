use heapless::Vec;

use super::defs::{INFO_BLOCK_LEN, MAX_OBJECTS, OBJECT_ROW_LEN};

/// Identification block at the start of the controller's memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InfoBlock {
  pub family_id: u8,
  pub variant_id: u8,
  pub version: u8,
  pub build: u8,
  pub matrix_x: u8,
  pub matrix_y: u8,
  pub object_count: u8,
}

impl InfoBlock {
  /// Firmware revisions from this one on need the calibration guard.
  pub const GUARDED_VERSION: u8 = 0x10;

  /// Calibration guard and settled auto-calibration apply.
  pub const fn guarded(&self) -> bool {
    self.version >= Self::GUARDED_VERSION
  }

  /// Touch-flag sampling and suppression-triggered recalibration apply.
  pub const fn samples_diagnostics(&self) -> bool {
    self.version == Self::GUARDED_VERSION
  }
}

impl From<[u8; INFO_BLOCK_LEN]> for InfoBlock {
  fn from(b: [u8; INFO_BLOCK_LEN]) -> Self {
    let mut version = b[2];
    // Early 0x80/0x10 parts report their version six minor steps low.
    if b[0] == 0x80 && b[1] == 0x10 {
      version = version.wrapping_add(6);
    }
    Self {
      family_id: b[0],
      variant_id: b[1],
      version,
      build: b[3],
      matrix_x: b[4],
      matrix_y: b[5],
      object_count: b[6],
    }
  }
}

/// One row of the object table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ObjectEntry {
  pub object_type: u8,
  pub address: u16,
  /// Size in bytes of one instance.
  pub size: u16,
  pub instances: u8,
  pub report_id_count: u8,
  /// First report id owned by this object, 0 when it owns none.
  pub report_id_base: u8,
}

impl ObjectEntry {
  /// Returned by [`ObjectTable::lookup`] for types the device does not have.
  pub const ABSENT: Self =
    Self { object_type: 0, address: 0, size: 0, instances: 0, report_id_count: 0, report_id_base: 0 };

  pub const fn is_present(&self) -> bool {
    self.address != 0
  }

  /// Report id belongs to this object.
  pub const fn owns_report_id(&self, report_id: u8) -> bool {
    self.report_id_base != 0
      && report_id >= self.report_id_base
      && report_id < self.report_id_base.saturating_add(self.report_id_count)
  }

  fn from_row(row: [u8; OBJECT_ROW_LEN]) -> Self {
    Self {
      object_type: row[0],
      address: u16::from_le_bytes([row[1], row[2]]),
      size: row[3] as u16 + 1,
      instances: row[4].wrapping_add(1),
      report_id_count: row[5],
      report_id_base: 0,
    }
  }
}

/// Directory of the controller's objects, discovered once at attach.
#[derive(Debug, Clone, Default)]
pub struct ObjectTable {
  entries: Vec<ObjectEntry, MAX_OBJECTS>,
  report_id_count: u8,
}

impl ObjectTable {
  /// Build a table from raw rows, assigning report ids in row order.
  ///
  /// Fails with the number of rows seen when they do not fit.
  pub fn from_rows<R>(rows: R) -> Result<Self, u8>
  where
    R: IntoIterator<Item = [u8; OBJECT_ROW_LEN]>,
  {
    let mut table = Self::default();
    for (i, row) in rows.into_iter().enumerate() {
      let mut entry = ObjectEntry::from_row(row);
      if entry.report_id_count > 0 {
        entry.report_id_base = table.report_id_count.wrapping_add(1);
        table.report_id_count = table.report_id_count.wrapping_add(entry.report_id_count);
      }
      table.entries.push(entry).map_err(|_| (i + 1) as u8)?;
    }
    Ok(table)
  }

  /// First entry of the given type, or [`ObjectEntry::ABSENT`].
  pub fn lookup(&self, object_type: impl Into<u8>) -> ObjectEntry {
    self.get(object_type).unwrap_or(ObjectEntry::ABSENT)
  }

  pub fn get(&self, object_type: impl Into<u8>) -> Option<ObjectEntry> {
    let ty = object_type.into();
    self.entries.iter().find(|e| e.object_type == ty).copied()
  }

  /// Address of the given object, 0 when absent.
  pub fn address(&self, object_type: impl Into<u8>) -> u16 {
    self.lookup(object_type).address
  }

  /// Object that owns a report id.
  pub fn owner_of(&self, report_id: u8) -> Option<ObjectEntry> {
    self.entries.iter().find(|e| e.owns_report_id(report_id)).copied()
  }

  pub fn iter(&self) -> impl Iterator<Item = &ObjectEntry> {
    self.entries.iter()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Total report ids handed out.
  pub fn report_id_count(&self) -> u8 {
    self.report_id_count
  }
}
