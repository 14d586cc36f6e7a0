//! Pattern comparison
//!
//! Compares the BX sequences of a measured source (a
//! snapshot read back from the hardware) with a
//! reference (usually a test vector). The measured side
//! can be rotated by a cyclic offset to account for
//! the latency between the two. Mismatches are data,
//! they end up in the [`ComparisonReport`].
//!
//! Rules per BX, in this order:
//!
//! * both values zero - the slot is empty, it counts as
//!   ignored and neither as success nor as error
//! * the measured value contains the resync gap marker
//!   in its hex representation - counted as gap
//! * otherwise the values are either equal (ok) or not
//!   (error)
//!
//! Bitfield families (algorithm, finor) are compared
//! plainly, an all-zero decision word is a valid result.
//!

use std::fmt;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::binutils::{
    bit_positions,
    bitdecode,
    BitValue,
};
use crate::errors::TdfError;
use crate::fieldspec::{
    FieldSpec,
    ObjectFamily,
};
use crate::images::ObjectSource;
use crate::settings::Settings;

/// A single disagreeing BX
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
  pub family           : ObjectFamily,
  pub occurrence       : usize,
  /// BX on the reference side
  pub bx               : usize,
  pub offset           : usize,
  pub measured         : BitValue,
  pub reference        : BitValue,
  #[serde(skip)]
  pub hex_digits       : usize,
  /// Named sub fields of both values, for families with a coding
  pub measured_fields  : BTreeMap<String, u64>,
  pub reference_fields : BTreeMap<String, u64>,
  /// Bits which differ, msb first (bitfield families only)
  pub differing_bits   : Vec<u32>,
}

impl fmt::Display for Mismatch {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}[{}] bx {:04} (offset {}): measured {} != reference {}",
           self.family, self.occurrence, self.bx, self.offset,
           self.measured.to_hex(self.hex_digits),
           self.reference.to_hex(self.hex_digits))?;
    let differing : Vec<String> = self.measured_fields.iter()
      .filter_map(|(name, value)| {
        let expected = self.reference_fields.get(name).copied().unwrap_or(0);
        if *value != expected {
          Some(format!("{}={}/{}", name, value, expected))
        } else {
          None
        }
      })
      .collect();
    if !differing.is_empty() {
      write!(f, " [{}]", differing.join(" "))?;
    }
    if !self.differing_bits.is_empty() {
      let bits : Vec<String> = self.differing_bits.iter().map(|b| b.to_string()).collect();
      write!(f, " bits {}", bits.join(","))?;
    }
    Ok(())
  }
}

/// Outcome counters of one occurrence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OccurrenceStats {
  pub ok      : usize,
  pub errors  : usize,
  /// both sides empty
  pub ignored : usize,
  /// resync gap on the measured side
  pub gaps    : usize,
}

impl OccurrenceStats {
  /// Nothing in this occurrence was actually compared
  pub fn is_empty(&self) -> bool {
    self.ok + self.errors == 0
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyReport {
  pub family      : ObjectFamily,
  pub occurrences : Vec<OccurrenceStats>,
}

impl FamilyReport {
  pub fn total(&self) -> OccurrenceStats {
    let mut total = OccurrenceStats::default();
    for stats in &self.occurrences {
      total.ok      += stats.ok;
      total.errors  += stats.errors;
      total.ignored += stats.ignored;
      total.gaps    += stats.gaps;
    }
    total
  }
}

/// Everything found by a [`Comparator`] run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonReport {
  pub offset     : usize,
  pub size       : usize,
  pub mismatches : Vec<Mismatch>,
  pub families   : Vec<FamilyReport>,
  /// Families of the measured side without reference
  pub skipped    : Vec<ObjectFamily>,
}

impl ComparisonReport {

  pub fn n_errors(&self) -> usize {
    self.mismatches.len()
  }

  pub fn n_ok(&self) -> usize {
    self.families.iter().map(|f| f.total().ok).sum()
  }

  pub fn n_ignored(&self) -> usize {
    self.families.iter().map(|f| f.total().ignored).sum()
  }

  pub fn n_gaps(&self) -> usize {
    self.families.iter().map(|f| f.total().gaps).sum()
  }

  pub fn is_success(&self) -> bool {
    self.n_errors() == 0
  }

  pub fn family(&self, family : ObjectFamily) -> Option<&FamilyReport> {
    self.families.iter().find(|f| f.family == family)
  }

  pub fn stats(&self, family : ObjectFamily, occurrence : usize) -> Option<&OccurrenceStats> {
    self.family(family)?.occurrences.get(occurrence)
  }

  /// Fold the report of another source (e.g. the algorithm
  /// snapshot of the same board) into this one
  pub fn merge(&mut self, other : ComparisonReport) {
    self.mismatches.extend(other.mismatches);
    self.families.extend(other.families);
    self.skipped.extend(other.skipped);
    self.size = self.size.max(other.size);
  }

  pub fn to_json(&self) -> Result<String, TdfError> {
    serde_json::to_string_pretty(self).map_err(|err| {
      error!("Unable to encode comparison report! {}", err);
      TdfError::JsonEncoding(err.to_string())
    })
  }
}

impl fmt::Display for ComparisonReport {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    for mismatch in &self.mismatches {
      writeln!(f, "{}", mismatch)?;
    }
    for report in &self.families {
      for (k, stats) in report.occurrences.iter().enumerate() {
        if stats.is_empty() {
          writeln!(f, "{}[{}]: no objects in pattern", report.family, k)?;
        } else {
          writeln!(f, "{}[{}]: {} ok, {} errors, {} ignored, {} gaps",
                   report.family, k, stats.ok, stats.errors, stats.ignored, stats.gaps)?;
        }
      }
    }
    for family in &self.skipped {
      writeln!(f, "{}: not in reference, skipped", family)?;
    }
    if self.is_success() {
      write!(f, "SUCCESS: {} BX compared at offset {}, 0 mismatches", self.size, self.offset)
    } else {
      write!(f, "FAILURE: {} BX compared at offset {}, {} mismatches", self.size, self.offset, self.n_errors())
    }
  }
}

/// Compares [`ObjectSource`]s family by family
#[derive(Debug, Clone, PartialEq)]
pub struct Comparator {
  gap_marker : String,
}

impl Comparator {

  pub fn new(settings : &Settings) -> Self {
    Self {
      gap_marker : settings.gap_marker().to_string(),
    }
  }

  /// An empty marker disables the gap rule
  pub fn with_gap_marker(marker : &str) -> Self {
    Self {
      gap_marker : marker.to_lowercase(),
    }
  }

  pub fn gap_marker(&self) -> &str {
    &self.gap_marker
  }

  /// Compare every family of `measured` which `reference`
  /// knows about. The measured side is rotated by `offset`
  /// (taken modulo the blocksize), at most `size` BX are
  /// compared.
  pub fn compare(&self,
                 measured  : &dyn ObjectSource,
                 reference : &dyn ObjectSource,
                 offset    : usize,
                 size      : Option<usize>) -> ComparisonReport {
    let blocksize = measured.blocksize();
    let mut report = ComparisonReport::default();
    if blocksize == 0 {
      return report;
    }
    report.offset = offset % blocksize;
    report.size   = size.unwrap_or(blocksize).min(blocksize).min(reference.blocksize());
    if reference.blocksize() != blocksize {
      warn!("Measured source has {} BX, reference {}, comparing only {} BX",
            blocksize, reference.blocksize(), report.size);
    }
    for family in measured.families() {
      let spec = match (measured.spec(family), reference.spec(family)) {
        (Some(spec), Some(_)) => spec.clone(),
        _ => {
          debug!("No reference for {}, skipping it", family);
          report.skipped.push(family);
          continue;
        }
      };
      let count = spec.count() as usize;
      let mut family_report = FamilyReport {
        family      : family,
        occurrences : Vec::<OccurrenceStats>::with_capacity(count),
      };
      for k in 0..count {
        let values = measured.occurrence(family, k, report.offset);
        let expect = reference.sequence(family, k);
        let stats  = match (values, expect) {
          (Some(values), Some(expect)) => {
            self.compare_sequence(family, k, &spec, &values, &expect,
                                  report.offset, report.size, &mut report.mismatches)
          }
          _ => OccurrenceStats::default()
        };
        trace!("{}[{}]: {:?}", family, k, stats);
        family_report.occurrences.push(stats);
      }
      report.families.push(family_report);
    }
    if report.is_success() {
      info!("Comparison at offset {} succeeded, {} ok", report.offset, report.n_ok());
    } else {
      warn!("Comparison at offset {} found {} mismatches", report.offset, report.n_errors());
    }
    report
  }

  #[allow(clippy::too_many_arguments)]
  fn compare_sequence(&self,
                      family     : ObjectFamily,
                      occurrence : usize,
                      spec       : &FieldSpec,
                      measured   : &[BitValue],
                      reference  : &[BitValue],
                      offset     : usize,
                      size       : usize,
                      mismatches : &mut Vec<Mismatch>) -> OccurrenceStats {
    let mut stats = OccurrenceStats::default();
    let bitfield  = family.is_bitfield();
    for bx in 0..size.min(measured.len()).min(reference.len()) {
      let a = &measured[bx] & spec.bitmask();
      let b = &reference[bx] & spec.bitmask();
      if !bitfield {
        if a.is_zero() && b.is_zero() {
          stats.ignored += 1;
          continue;
        }
        if self.is_gap(&a) {
          stats.gaps += 1;
          continue;
        }
      }
      if a == b {
        stats.ok += 1;
        continue;
      }
      stats.errors += 1;
      let (measured_fields, reference_fields) = if spec.coding().is_empty() {
        (BTreeMap::new(), BTreeMap::new())
      } else {
        (bitdecode(&a, spec.coding()), bitdecode(&b, spec.coding()))
      };
      let differing_bits = if bitfield {
        let diff = &(&a | &b) & &(&a.invert(spec.width()) | &b.invert(spec.width()));
        bit_positions(&diff)
      } else {
        Vec::new()
      };
      mismatches.push(Mismatch {
        family           : family,
        occurrence       : occurrence,
        bx               : bx,
        offset           : offset,
        measured         : a,
        reference        : b,
        hex_digits       : spec.hex_digits(),
        measured_fields  : measured_fields,
        reference_fields : reference_fields,
        differing_bits   : differing_bits,
      });
    }
    stats
  }

  fn is_gap(&self, value : &BitValue) -> bool {
    !self.gap_marker.is_empty() && value.to_hex(0).contains(&self.gap_marker)
  }
}

#[cfg(test)]
mod test_compare {
  use super::*;

  /// A minimal source with a single family
  struct Sequences {
    spec   : FieldSpec,
    family : ObjectFamily,
    values : Vec<Vec<BitValue>>,
  }

  impl Sequences {
    fn new(family : ObjectFamily, width : u32, values : &[&[u32]]) -> Self {
      Self {
        spec   : FieldSpec::new(values.len() as u32, width).unwrap(),
        family : family,
        values : values.iter()
                       .map(|v| v.iter().map(|x| BitValue::from(*x)).collect())
                       .collect(),
      }
    }
  }

  impl ObjectSource for Sequences {
    fn blocksize(&self) -> usize {
      self.values[0].len()
    }
    fn families(&self) -> Vec<ObjectFamily> {
      vec![self.family]
    }
    fn spec(&self, family : ObjectFamily) -> Option<&FieldSpec> {
      if family == self.family { Some(&self.spec) } else { None }
    }
    fn sequence(&self, family : ObjectFamily, index : usize) -> Option<Vec<BitValue>> {
      if family == self.family { self.values.get(index).cloned() } else { None }
    }
  }

  #[test]
  fn empty_slots_are_ignored() {
    let measured  = Sequences::new(ObjectFamily::Ett, 32, &[&[0, 0, 5, 0]]);
    let reference = Sequences::new(ObjectFamily::Ett, 32, &[&[0, 1, 5, 0]]);
    let report = Comparator::with_gap_marker("").compare(&measured, &reference, 0, None);
    assert_eq!(report.n_errors(), 1);
    assert_eq!(report.mismatches[0].bx, 1);
    let stats = report.stats(ObjectFamily::Ett, 0).unwrap();
    assert_eq!(stats.ignored, 2);
    assert_eq!(stats.ok, 1);
    assert_eq!(stats.errors, 1);
    assert!(!report.is_success());
    assert!(report.to_string().ends_with("1 mismatches"));
  }

  #[test]
  fn cyclic_offset_aligns() {
    let reference = Sequences::new(ObjectFamily::Ht, 32, &[&[1, 2, 3, 4, 5]]);
    let measured  = Sequences::new(ObjectFamily::Ht, 32, &[&[4, 5, 1, 2, 3]]);
    let comparator = Comparator::with_gap_marker("badc0de");
    assert!(!comparator.compare(&measured, &reference, 0, None).is_success());
    let report = comparator.compare(&measured, &reference, 2, None);
    assert!(report.is_success());
    assert_eq!(report.n_ok(), 5);
    let report = comparator.compare(&measured, &reference, 7, Some(100));
    assert_eq!(report.offset, 2);
    assert_eq!(report.size, 5);
    assert!(report.is_success());
  }

  #[test]
  fn size_limits_the_comparison() {
    let measured  = Sequences::new(ObjectFamily::Ett, 32, &[&[1, 2, 3, 9]]);
    let reference = Sequences::new(ObjectFamily::Ett, 32, &[&[1, 2, 3, 4]]);
    let report = Comparator::with_gap_marker("").compare(&measured, &reference, 0, Some(3));
    assert!(report.is_success());
    assert_eq!(report.n_ok(), 3);
  }

  #[test]
  fn gap_marker_is_not_an_error() {
    let measured  = Sequences::new(ObjectFamily::Etm, 32, &[&[0x0badc0de, 7]]);
    let reference = Sequences::new(ObjectFamily::Etm, 32, &[&[3, 7]]);
    let report = Comparator::with_gap_marker("BADC0DE").compare(&measured, &reference, 0, None);
    assert!(report.is_success());
    assert_eq!(report.n_gaps(), 1);
    let report = Comparator::with_gap_marker("").compare(&measured, &reference, 0, None);
    assert_eq!(report.n_errors(), 1);
  }

  #[test]
  fn unused_occurrences_are_reported() {
    let measured  = Sequences::new(ObjectFamily::Eg, 32, &[&[0, 0], &[1, 0]]);
    let reference = Sequences::new(ObjectFamily::Eg, 32, &[&[0, 0], &[1, 0]]);
    let report = Comparator::with_gap_marker("").compare(&measured, &reference, 0, None);
    let text = report.to_string();
    assert!(text.contains("eg[0]: no objects in pattern"));
    assert!(text.contains("eg[1]: 1 ok, 0 errors, 1 ignored, 0 gaps"));
    assert!(text.ends_with("0 mismatches"));
  }

  #[test]
  fn bitfields_report_differing_bits() {
    let measured  = Sequences::new(ObjectFamily::Algorithm, 8, &[&[0b1000_0001, 0]]);
    let reference = Sequences::new(ObjectFamily::Algorithm, 8, &[&[0b0000_0101, 0]]);
    let report = Comparator::with_gap_marker("").compare(&measured, &reference, 0, None);
    assert_eq!(report.n_errors(), 1);
    assert_eq!(report.mismatches[0].differing_bits, vec![7, 2]);
    // an empty decision word is a regular result
    assert_eq!(report.stats(ObjectFamily::Algorithm, 0).unwrap().ok, 1);
    assert_eq!(report.n_ignored(), 0);
    assert!(report.to_string().contains("bits 7,2"));
  }

  #[test]
  fn coded_fields_are_decoded() {
    let settings  = Settings::default();
    let spec      = settings.spec(ObjectFamily::Jet).clone();
    let mut measured  = Sequences::new(ObjectFamily::Jet, 32, &[&[(3 << 11) | 10]]);
    let mut reference = Sequences::new(ObjectFamily::Jet, 32, &[&[(3 << 11) | 12]]);
    measured.spec  = spec.clone();
    reference.spec = spec;
    let report = Comparator::new(&settings).compare(&measured, &reference, 0, None);
    let mismatch = &report.mismatches[0];
    assert_eq!(mismatch.measured_fields["et"], 10);
    assert_eq!(mismatch.reference_fields["et"], 12);
    assert_eq!(mismatch.measured_fields["eta"], 3);
    assert!(mismatch.to_string().contains("et=10/12"));
    assert!(!mismatch.to_string().contains("eta="));
  }

  #[test]
  fn missing_reference_family_is_skipped() {
    let measured  = Sequences::new(ObjectFamily::Ett, 32, &[&[1]]);
    let reference = Sequences::new(ObjectFamily::Ht, 32, &[&[1]]);
    let report = Comparator::with_gap_marker("").compare(&measured, &reference, 0, None);
    assert_eq!(report.skipped, vec![ObjectFamily::Ett]);
    assert!(report.is_success());
  }

  #[test]
  fn json_summary() {
    let measured  = Sequences::new(ObjectFamily::Ett, 32, &[&[0, 2]]);
    let reference = Sequences::new(ObjectFamily::Ett, 32, &[&[0, 1]]);
    let report = Comparator::with_gap_marker("").compare(&measured, &reference, 0, None);
    let json   = report.to_json().unwrap();
    let value : serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["mismatches"][0]["measured"], "0x2");
    assert_eq!(value["families"][0]["family"], "ett");
    assert_eq!(value["families"][0]["occurrences"][0]["ignored"], 1);
  }
}
