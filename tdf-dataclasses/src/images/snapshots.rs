//! Snapshot memories, one row per BX
//!
//! The object snapshot holds the trigger input objects,
//! the algorithm and finor snapshots each hold a single
//! wide bitfield per BX spread over all their columns.
//!

use std::fmt;
use std::ops::{
    Deref,
    DerefMut,
};

use crate::binutils::{
    bit_positions,
    BitValue,
};
use crate::errors::TdfError;
use crate::fieldspec::{
    FieldSpec,
    ObjectFamily,
};
use crate::images::{
    MappedImage,
    ObjectSource,
};
use crate::settings::Settings;
use crate::testvector::TestVector;

/// Generates the boilerplate shared by all snapshot kinds:
/// construction from settings and words, Deref to the
/// underlying [`MappedImage`] and the [`ObjectSource`] contract
macro_rules! snapshot_image {
  ($name:ident, $families:expr, $label:expr) => {
    impl $name {

      /// An empty (all zero) snapshot
      pub fn new(settings : &Settings) -> Result<Self, TdfError> {
        Ok(Self(MappedImage::new(&$families, settings)?))
      }

      /// A snapshot holding the words as read from the hardware
      pub fn from_words(settings : &Settings, words : &[u32]) -> Result<Self, TdfError> {
        let mut snapshot = Self::new(settings)?;
        snapshot.deserialize(words);
        Ok(snapshot)
      }

      /// A snapshot parsed from the memory dump text format
      pub fn from_dump(settings : &Settings, text : &str, source : &str) -> Result<Self, TdfError> {
        let mut snapshot = Self::new(settings)?;
        snapshot.read(text, source)?;
        Ok(snapshot)
      }

      /// Give up the snapshot semantics, keeping the mapped memory
      pub fn into_image(self) -> MappedImage {
        self.0
      }

      /// Fill the snapshot with the matching columns of a test vector
      pub fn read_from_vector(&mut self, vector : &TestVector) -> Result<(), TdfError> {
        self.0.read_from_source(vector)
      }
    }

    impl Deref for $name {
      type Target = MappedImage;
      fn deref(&self) -> &MappedImage {
        &self.0
      }
    }

    impl DerefMut for $name {
      fn deref_mut(&mut self) -> &mut MappedImage {
        &mut self.0
      }
    }

    impl ObjectSource for $name {
      fn blocksize(&self) -> usize {
        self.0.blocksize()
      }
      fn families(&self) -> Vec<ObjectFamily> {
        self.0.families()
      }
      fn spec(&self, family : ObjectFamily) -> Option<&FieldSpec> {
        self.0.spec(family)
      }
      fn sequence(&self, family : ObjectFamily, index : usize) -> Option<Vec<BitValue>> {
        self.0.sequence(family, index)
      }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}: {} columns x {} BX>", $label,
               self.0.memory().columns(), self.0.memory().blocksize())
      }
    }
  };
}

/// Trigger input objects per BX (muons, calo objects,
/// energy sums and external conditions)
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSnapshot(MappedImage);

snapshot_image!(ObjectSnapshot, ObjectFamily::OBJECTS, "ObjectSnapshot");

impl ObjectSnapshot {

  /// All occurrences of a family at one BX, e.g. the 8
  /// muons of a bunch crossing
  pub fn objects_at(&self, family : ObjectFamily, bx : usize) -> Vec<BitValue> {
    let count = self.spec(family).map(|s| s.count()).unwrap_or(0) as usize;
    (0..count).map(|k| self.value(family, k, bx)).collect()
  }

  /// Number of BX which carry at least one non-empty object
  pub fn occupied_bx(&self) -> usize {
    let families = self.families();
    (0..self.blocksize()).filter(|bx| {
      families.iter().any(|f| self.objects_at(*f, *bx).iter().any(|v| !v.is_zero()))
    }).count()
  }
}

/// The algorithm decision word (one bit per algorithm) per BX
#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmSnapshot(MappedImage);

snapshot_image!(AlgorithmSnapshot, [ObjectFamily::Algorithm], "AlgorithmSnapshot");

impl AlgorithmSnapshot {

  /// The decision words of all BX
  pub fn decisions(&self) -> Vec<BitValue> {
    self.sequence(ObjectFamily::Algorithm, 0).unwrap_or_default()
  }

  /// Set the decision words, starting at BX 0
  pub fn set_decisions(&mut self, values : &[BitValue]) {
    self.set_occurrence(ObjectFamily::Algorithm, 0, values);
  }

  /// How often each algorithm fired over the orbit,
  /// indexed by algorithm
  pub fn trigger_counts(&self) -> Vec<u64> {
    let width = self.spec(ObjectFamily::Algorithm).map(|s| s.width()).unwrap_or(0);
    let mut counts = vec![0u64; width as usize];
    for decision in self.decisions() {
      for bit in bit_positions(&decision) {
        counts[bit as usize] += 1;
      }
    }
    counts
  }

  /// Indices of the algorithms which fired at `bx`, highest first
  pub fn fired_at(&self, bx : usize) -> Vec<u32> {
    bit_positions(&self.value(ObjectFamily::Algorithm, 0, bx))
  }
}

/// The final OR decision (1 bit) per BX
#[derive(Debug, Clone, PartialEq)]
pub struct FinorSnapshot(MappedImage);

snapshot_image!(FinorSnapshot, [ObjectFamily::Finor], "FinorSnapshot");

impl FinorSnapshot {

  pub fn decisions(&self) -> Vec<bool> {
    self.sequence(ObjectFamily::Finor, 0)
        .unwrap_or_default()
        .iter()
        .map(|v| v.bit(0))
        .collect()
  }

  pub fn set_decisions(&mut self, values : &[bool]) {
    let values : Vec<BitValue> = values.iter().map(|v| BitValue::from(*v as u32)).collect();
    self.set_occurrence(ObjectFamily::Finor, 0, &values);
  }

  /// Number of BX with a positive final decision
  pub fn n_fired(&self) -> usize {
    self.decisions().iter().filter(|d| **d).count()
  }
}
