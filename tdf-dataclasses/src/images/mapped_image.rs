//! A column memory with a static object layout on top

use std::fmt;

use crate::binutils::BitValue;
use crate::compare::{
    Comparator,
    ComparisonReport,
};
use crate::constants::DATA_WIDTH;
use crate::errors::TdfError;
use crate::fieldspec::{
    FieldSpec,
    ObjectFamily,
};
use crate::images::{
    LayoutEntry,
    ObjectLayout,
    ObjectSource,
};
use crate::memory::ColumnMemoryImage;
use crate::settings::Settings;

/// Column memory with one row per BX and a set of
/// object families mapped onto its columns
///
/// The image is field level: column bits above the
/// width of the field they belong to are never kept,
/// so that a dump carries the complete image.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedImage {
  memory     : ColumnMemoryImage,
  layout     : ObjectLayout,
  comparator : Comparator,
}

impl MappedImage {

  pub fn new(families : &[ObjectFamily],
             settings : &Settings) -> Result<Self, TdfError> {
    let layout = ObjectLayout::new(families, settings);
    let memory = ColumnMemoryImage::new(layout.columns(), settings.orbit_length() as usize)?;
    Ok(Self {
      memory     : memory,
      layout     : layout,
      comparator : Comparator::new(settings),
    })
  }

  pub fn memory(&self) -> &ColumnMemoryImage {
    &self.memory
  }

  pub fn layout(&self) -> &ObjectLayout {
    &self.layout
  }

  pub fn size(&self) -> usize {
    self.memory.size()
  }

  pub fn clear(&mut self) {
    self.memory.clear(0);
  }

  pub fn serialize(&self) -> Vec<u32> {
    self.memory.serialize()
  }

  /// Load words as read from the hardware, bits outside
  /// of the mapped fields are dropped
  pub fn deserialize(&mut self, words : &[u32]) {
    self.memory.deserialize(words);
    self.mask_unused();
  }

  /// Every word holds its own address, cut to the fields
  pub fn fill_counter(&mut self, reverse : bool) {
    self.memory.fill_counter(reverse);
    self.mask_unused();
  }

  pub fn fill_random(&mut self) {
    self.memory.fill_random();
    self.mask_unused();
  }

  fn mask_unused(&mut self) {
    for entry in self.layout.entries() {
      let dwords = entry.spec.dwords() as usize;
      if entry.spec.width() as usize == dwords * DATA_WIDTH as usize {
        continue;
      }
      for k in 0..entry.spec.count() as usize {
        let column = entry.column(k);
        let masked : Vec<BitValue> = self.memory.extract(column, dwords).iter()
                                         .map(|v| v & entry.spec.bitmask())
                                         .collect();
        self.memory.inject(&masked, column, dwords);
      }
    }
  }

  fn layout_entry(&self, family : ObjectFamily, index : usize) -> &LayoutEntry {
    let entry = self.layout.entry(family)
                    .unwrap_or_else(|| panic!("Family {} is not mapped onto this memory!", family));
    assert!(index < entry.spec.count() as usize,
            "Occurrence {} of {} does not exist, only {} are mapped!", index, family, entry.spec.count());
    entry
  }

  /// Overwrite the BX sequence of one occurrence.
  /// Values are truncated to the field width.
  pub fn set_occurrence(&mut self,
                        family : ObjectFamily,
                        index  : usize,
                        values : &[BitValue]) {
    let entry  = self.layout_entry(family, index).clone();
    let masked : Vec<BitValue> = values.iter().map(|v| v & entry.spec.bitmask()).collect();
    self.memory.inject(&masked, entry.column(index), entry.spec.dwords() as usize);
  }

  /// The value of one occurrence at one BX
  pub fn value(&self, family : ObjectFamily, index : usize, bx : usize) -> BitValue {
    let entry  = self.layout_entry(family, index);
    let column = entry.column(index);
    let words : Vec<u32> = (0..entry.spec.dwords() as usize)
                            .map(|k| self.memory.word(bx, column + k))
                            .collect();
    &BitValue::from_limbs(words) & entry.spec.bitmask()
  }

  /// Copy every family both sides know about from
  /// another source, e.g. a test vector
  pub fn read_from_source(&mut self, source : &dyn ObjectSource) -> Result<(), TdfError> {
    if source.blocksize() != self.memory.blocksize() {
      error!("Source has {} BX, memory has {}!", source.blocksize(), self.memory.blocksize());
      return Err(TdfError::InvalidLayout(
        format!("source blocksize {} does not match memory blocksize {}",
                source.blocksize(), self.memory.blocksize())));
    }
    self.clear();
    let families = self.layout.families();
    for family in families {
      let count = self.layout_entry(family, 0).spec.count() as usize;
      match source.occurrences(family, 0) {
        None => {
          warn!("Source does not provide {}, leaving it empty", family);
        }
        Some(sequences) => {
          for (k, values) in sequences.iter().take(count).enumerate() {
            self.set_occurrence(family, k, values);
          }
        }
      }
    }
    Ok(())
  }

  /// Render the memory dump text format: one line per BX,
  /// one zero padded hex field per occurrence
  pub fn dump(&self) -> String {
    let sequences : Vec<(usize, Vec<BitValue>)> = self.layout.entries().iter()
      .flat_map(|e| (0..e.spec.count() as usize).map(move |k| (e, k)))
      .map(|(e, k)| (e.spec.hex_digits(), self.sequence(e.family, k).unwrap_or_default()))
      .collect();
    let mut text = String::with_capacity(self.memory.blocksize() * (sequences.len() * 9 + 1));
    for bx in 0..self.memory.blocksize() {
      let fields : Vec<String> = sequences.iter()
                                          .map(|(digits, values)| values[bx].to_hex(*digits))
                                          .collect();
      text += &fields.join(" ");
      text.push('\n');
    }
    text
  }

  /// Parse the memory dump text format (see [`dump`](Self::dump)).
  /// Empty lines and lines starting with '#' are skipped.
  pub fn read(&mut self, text : &str, source : &str) -> Result<(), TdfError> {
    self.clear();
    let specs : Vec<(ObjectFamily, usize, FieldSpec)> = self.layout.entries().iter()
      .flat_map(|e| (0..e.spec.count() as usize).map(move |k| (e.family, k, e.spec.clone())))
      .collect();
    let mut rows = vec![Vec::<BitValue>::new(); specs.len()];
    let mut bx   = 0usize;
    for (k, line) in text.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      if bx >= self.memory.blocksize() {
        return Err(TdfError::format(source, k + 1,
                   format!("more than {} BX in dump", self.memory.blocksize())));
      }
      let tokens : Vec<&str> = line.split_whitespace().collect();
      if tokens.len() != specs.len() {
        return Err(TdfError::format(source, k + 1,
                   format!("expected {} fields, found {}", specs.len(), tokens.len())));
      }
      for (n, (token, (family, index, spec))) in tokens.iter().zip(specs.iter()).enumerate() {
        let value = parse_field(token, spec).map_err(|reason| {
          TdfError::format(source, k + 1, format!("{}[{}]: {}", family, index, reason))
        })?;
        rows[n].push(value);
      }
      bx += 1;
    }
    debug!("Read {} BX from {}", bx, source);
    for ((family, index, _), values) in specs.iter().zip(rows.iter()) {
      self.set_occurrence(*family, *index, values);
    }
    Ok(())
  }

  /// Compare against a reference, `self` being the measured side
  pub fn compare(&self,
                 reference : &dyn ObjectSource,
                 offset    : usize,
                 size      : Option<usize>) -> ComparisonReport {
    self.comparator.compare(self, reference, offset, size)
  }
}

/// Parse one zero padded hex field of exactly
/// `hex_digits` characters which fits the field width
pub fn parse_field(token : &str, spec : &FieldSpec) -> Result<BitValue, String> {
  if token.len() != spec.hex_digits() {
    return Err(format!("'{}' has {} digits, expected {}", token, token.len(), spec.hex_digits()));
  }
  let value = BitValue::from_hex(token).ok_or_else(|| format!("'{}' is not a hex number", token))?;
  if value.bits() > spec.width() {
    return Err(format!("'{}' exceeds {} bits", token, spec.width()));
  }
  Ok(value)
}

impl ObjectSource for MappedImage {

  fn blocksize(&self) -> usize {
    self.memory.blocksize()
  }

  fn families(&self) -> Vec<ObjectFamily> {
    self.layout.families()
  }

  fn spec(&self, family : ObjectFamily) -> Option<&FieldSpec> {
    self.layout.entry(family).map(|e| &e.spec)
  }

  fn sequence(&self, family : ObjectFamily, index : usize) -> Option<Vec<BitValue>> {
    let entry = self.layout.entry(family)?;
    if index >= entry.spec.count() as usize {
      return None;
    }
    let values = self.memory.extract(entry.column(index), entry.spec.dwords() as usize);
    Some(values.iter().map(|v| v & entry.spec.bitmask()).collect())
  }
}

impl fmt::Display for MappedImage {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let families : Vec<&str> = self.layout.entries().iter().map(|e| e.family.name()).collect();
    write!(f, "<MappedImage: {} columns x {} BX [{}]>",
           self.memory.columns(), self.memory.blocksize(), families.join(", "))
  }
}
