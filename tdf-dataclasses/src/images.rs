//! Object mapped memory images
//!
//! The snapshot memories of the trigger processor hold
//! one row per BX. Every object family occupies
//! `count * dwords` consecutive columns, the families
//! follow each other without gaps in the order of
//! [`ObjectFamily`]. This order is the on-wire format of
//! the firmware memories and of the text dumps.
//!
//! * [`ObjectSnapshot`]    - input objects (muons, calo, sums, ext. conditions)
//! * [`AlgorithmSnapshot`] - 512bit algorithm decision word per BX
//! * [`FinorSnapshot`]     - 1bit final decision per BX
//! * [`RangeMaskImage`], [`FinorVetoMask`], [`PrescaleTable`] - control tables
//!

pub mod mapped_image;
pub mod snapshots;
pub mod control_tables;

pub use mapped_image::MappedImage;
pub use snapshots::{
    ObjectSnapshot,
    AlgorithmSnapshot,
    FinorSnapshot,
};
pub use control_tables::{
    RangeMaskImage,
    FinorVetoMask,
    PrescaleTable,
};

use std::fmt;

use crate::binutils::BitValue;
use crate::fieldspec::{
    FieldSpec,
    ObjectFamily,
};
use crate::settings::Settings;

/// Position of one family in a column memory
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEntry {
  pub family : ObjectFamily,
  /// first column of the family
  pub offset : usize,
  pub spec   : FieldSpec,
}

impl LayoutEntry {
  /// First column of occurrence `index`
  pub fn column(&self, index : usize) -> usize {
    self.offset + index * self.spec.dwords() as usize
  }
}

/// Static offset table `family -> (column offset, spec)`
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLayout {
  entries : Vec<LayoutEntry>,
}

impl ObjectLayout {

  /// Lay out `families` in [`ObjectFamily`] order, whatever
  /// order they are given in
  pub fn new(families : &[ObjectFamily], settings : &Settings) -> Self {
    let mut ordered = families.to_vec();
    ordered.sort();
    ordered.dedup();
    let mut entries = Vec::<LayoutEntry>::with_capacity(ordered.len());
    let mut offset  = 0usize;
    for family in ordered {
      let spec = settings.spec(family).clone();
      let ncolumns = spec.columns() as usize;
      trace!("Placing {} at column {} ({} columns)", family, offset, ncolumns);
      entries.push(LayoutEntry { family, offset, spec });
      offset += ncolumns;
    }
    Self { entries }
  }

  /// Total number of columns
  pub fn columns(&self) -> usize {
    self.entries.iter().map(|e| e.spec.columns() as usize).sum()
  }

  pub fn entries(&self) -> &[LayoutEntry] {
    &self.entries
  }

  pub fn entry(&self, family : ObjectFamily) -> Option<&LayoutEntry> {
    self.entries.iter().find(|e| e.family == family)
  }

  /// First column of `family`
  pub fn offset(&self, family : ObjectFamily) -> Option<usize> {
    self.entry(family).map(|e| e.offset)
  }

  pub fn spec(&self, family : ObjectFamily) -> Option<&FieldSpec> {
    self.entry(family).map(|e| &e.spec)
  }

  pub fn families(&self) -> Vec<ObjectFamily> {
    self.entries.iter().map(|e| e.family).collect()
  }

  /// Number of values in one row (one per occurrence)
  pub fn fields_per_row(&self) -> usize {
    self.entries.iter().map(|e| e.spec.count() as usize).sum()
  }
}

impl fmt::Display for ObjectLayout {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<ObjectLayout:");
    for entry in &self.entries {
      repr += &(format!("\n  {:<10} : column {:>3}, {} x {} bit",
                        entry.family, entry.offset, entry.spec.count(), entry.spec.width()));
    }
    write!(f, "{}>", repr)
  }
}

/// Rotate a sequence left by `offset` (modulo its length),
/// `rotated[i] = values[(i + offset) % len]`
pub fn rotate(values : &[BitValue], offset : usize) -> Vec<BitValue> {
  if values.is_empty() {
    return Vec::new();
  }
  let shift = offset % values.len();
  let mut rotated = Vec::<BitValue>::with_capacity(values.len());
  rotated.extend_from_slice(&values[shift..]);
  rotated.extend_from_slice(&values[..shift]);
  rotated
}

/// Per family, per occurrence access to BX sequences.
///
/// Implemented by the hardware snapshots as well as by
/// test vectors, so either of them can be compared
/// against the other.
pub trait ObjectSource {

  /// Number of BX in every sequence
  fn blocksize(&self) -> usize;

  /// The families this source provides, in layout order
  fn families(&self) -> Vec<ObjectFamily>;

  fn spec(&self, family : ObjectFamily) -> Option<&FieldSpec>;

  /// The unrotated BX sequence of occurrence `index`
  fn sequence(&self, family : ObjectFamily, index : usize) -> Option<Vec<BitValue>>;

  /// The BX sequence of occurrence `index`, rotated by `offset`.
  /// Families with a single occurrence are occurrence 0.
  fn occurrence(&self,
                family : ObjectFamily,
                index  : usize,
                offset : usize) -> Option<Vec<BitValue>> {
    self.sequence(family, index).map(|values| rotate(&values, offset))
  }

  /// All occurrences of a family, each rotated by `offset`
  fn occurrences(&self,
                 family : ObjectFamily,
                 offset : usize) -> Option<Vec<Vec<BitValue>>> {
    let count = self.spec(family)?.count() as usize;
    (0..count).map(|k| self.occurrence(family, k, offset)).collect()
  }
}
