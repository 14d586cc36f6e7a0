//! Control tables
//!
//! Unlike the snapshots these memories do not hold
//! data per BX, but one entry per controllable unit
//! (an algorithm, or a BX for the bx mask). They are
//! built from human written definition files and
//! written to the hardware.
//!

use std::fmt;

use crate::binutils::{
    requires,
    BitValue,
};
use crate::constants::{
    DATA_WIDTH,
    DEFAULT_FINOR_VETO,
    DEFAULT_PRESCALE,
    FINOR_MASK_BIT,
    FINOR_VETO_WIDTH,
    VETO_MASK_BIT,
};
use crate::errors::TdfError;
use crate::fieldspec::ObjectFamily;
use crate::io::{
    parse_definitions,
    parse_index,
    parse_range_list,
};
use crate::memory::ColumnMemoryImage;
use crate::settings::Settings;

fn check_unit(unit : u32, units : usize, source : &str, line : usize) -> Result<usize, TdfError> {
  if unit as usize >= units {
    error!("Unit {} in {}:{} is out of range (only {} units)", unit, source, line, units);
    return Err(TdfError::format(source, line, format!("unit {} out of range 0..{}", unit, units)));
  }
  Ok(unit as usize)
}

/// Enable/disable table built from range lists
///
/// Each unit holds a `width` bit entry, spread over
/// `ceil(width/32)` columns. A definition line
/// `<bit>: <units>` marks `bit` in every listed unit,
/// afterwards every entry is inverted: listed positions
/// end up cleared, everything else set.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeMaskImage {
  memory : ColumnMemoryImage,
  width  : u32,
}

impl RangeMaskImage {

  /// An all zero table
  pub fn new(units : usize, width : u32) -> Result<Self, TdfError> {
    if width == 0 {
      return Err(TdfError::InvalidLayout(String::from("mask entries need at least 1 bit")));
    }
    let columns = requires(width, DATA_WIDTH) as usize;
    Ok(Self {
      memory : ColumnMemoryImage::new(columns, units)?,
      width  : width,
    })
  }

  /// The algorithm bx mask: one entry per BX of the
  /// orbit, one bit per algorithm
  pub fn algo_bx_mask(settings : &Settings) -> Result<Self, TdfError> {
    let width = settings.spec(ObjectFamily::Algorithm).width();
    Self::new(settings.orbit_length() as usize, width)
  }

  pub fn from_definition(text   : &str,
                         source : &str,
                         units  : usize,
                         width  : u32) -> Result<Self, TdfError> {
    let mut mask = Self::new(units, width)?;
    mask.load_definition(text, source)?;
    Ok(mask)
  }

  /// Rebuild the table from a definition file
  pub fn load_definition(&mut self, text : &str, source : &str) -> Result<(), TdfError> {
    let units = self.units();
    let mut entries = vec![BitValue::zero(); units];
    for def in parse_definitions(text, source)? {
      let bit = parse_index(&def.key, source, def.line)?;
      if bit >= self.width {
        return Err(TdfError::format(source, def.line,
                   format!("bit {} does not fit into {} bit entries", bit, self.width)));
      }
      for unit in parse_range_list(&def.value, units, source, def.line)? {
        let unit = check_unit(unit, units, source, def.line)?;
        entries[unit].set_bit(bit);
      }
    }
    let inverted : Vec<BitValue> = entries.iter().map(|e| e.invert(self.width)).collect();
    self.memory.clear(0);
    self.memory.inject_merged(&inverted);
    debug!("Built mask with {} units from {}", units, source);
    Ok(())
  }

  pub fn units(&self) -> usize {
    self.memory.blocksize()
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn memory(&self) -> &ColumnMemoryImage {
    &self.memory
  }

  /// The entries of all units
  pub fn entries(&self) -> Vec<BitValue> {
    self.memory.merged()
  }

  pub fn is_set(&self, unit : usize, bit : u32) -> bool {
    if bit >= self.width {
      return false;
    }
    let word = self.memory.word(unit, (bit / DATA_WIDTH) as usize);
    (word >> (bit % DATA_WIDTH)) & 0x1 == 1
  }

  pub fn serialize(&self) -> Vec<u32> {
    self.memory.serialize()
  }

  pub fn deserialize(&mut self, words : &[u32]) {
    self.memory.deserialize(words);
  }
}

impl fmt::Display for RangeMaskImage {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<RangeMaskImage: {} units x {} bit>", self.units(), self.width)
  }
}

/// Finor/veto mask, a 2 bit entry per algorithm
///
/// Bit 0 includes the algorithm in the final OR, bit 1
/// marks it as veto. The default entry is `0b01`.
/// The definition file needs exactly the keys
/// `finor_mask` (algorithms removed from the final OR)
/// and `veto_mask` (algorithms acting as veto).
#[derive(Debug, Clone, PartialEq)]
pub struct FinorVetoMask {
  memory : ColumnMemoryImage,
}

impl FinorVetoMask {

  pub const FINOR_KEY : &'static str = "finor_mask";
  pub const VETO_KEY  : &'static str = "veto_mask";

  /// A table with the default entry for every unit
  pub fn new(units : usize) -> Result<Self, TdfError> {
    let mut memory = ColumnMemoryImage::new(1, units)?;
    memory.clear(DEFAULT_FINOR_VETO);
    Ok(Self { memory })
  }

  /// One entry per algorithm
  pub fn for_algorithms(settings : &Settings) -> Result<Self, TdfError> {
    Self::new(settings.spec(ObjectFamily::Algorithm).width() as usize)
  }

  pub fn from_definition(text : &str, source : &str, units : usize) -> Result<Self, TdfError> {
    let mut mask = Self::new(units)?;
    mask.load_definition(text, source)?;
    Ok(mask)
  }

  pub fn load_definition(&mut self, text : &str, source : &str) -> Result<(), TdfError> {
    let units = self.units();
    let mut entries = vec![DEFAULT_FINOR_VETO; units];
    let mut seen_finor = false;
    let mut seen_veto  = false;
    for def in parse_definitions(text, source)? {
      let (bit, set) = match def.key.as_str() {
        Self::FINOR_KEY => {
          seen_finor = true;
          (FINOR_MASK_BIT, false)
        }
        Self::VETO_KEY => {
          seen_veto = true;
          (VETO_MASK_BIT, true)
        }
        _ => {
          error!("Unknown key '{}' in {}:{}", def.key, source, def.line);
          return Err(TdfError::UnknownKey {
            source : source.to_string(),
            key    : def.key,
          });
        }
      };
      for unit in parse_range_list(&def.value, units, source, def.line)? {
        let unit = check_unit(unit, units, source, def.line)?;
        if set {
          entries[unit] |= 1 << bit;
        } else {
          entries[unit] &= !(1 << bit);
        }
      }
    }
    for (seen, key) in [(seen_finor, Self::FINOR_KEY), (seen_veto, Self::VETO_KEY)] {
      if !seen {
        error!("Key '{}' missing in {}", key, source);
        return Err(TdfError::MissingKey {
          source : source.to_string(),
          key    : key.to_string(),
        });
      }
    }
    let mask = (1u32 << FINOR_VETO_WIDTH) - 1;
    let entries : Vec<u32> = entries.iter().map(|e| e & mask).collect();
    self.memory.deserialize(&entries);
    Ok(())
  }

  pub fn units(&self) -> usize {
    self.memory.blocksize()
  }

  pub fn memory(&self) -> &ColumnMemoryImage {
    &self.memory
  }

  pub fn entry(&self, unit : usize) -> u32 {
    self.memory.word(unit, 0)
  }

  /// Algorithm contributes to the final OR
  pub fn finor(&self, unit : usize) -> bool {
    (self.entry(unit) >> FINOR_MASK_BIT) & 0x1 == 1
  }

  pub fn veto(&self, unit : usize) -> bool {
    (self.entry(unit) >> VETO_MASK_BIT) & 0x1 == 1
  }

  pub fn serialize(&self) -> Vec<u32> {
    self.memory.serialize()
  }

  pub fn deserialize(&mut self, words : &[u32]) {
    self.memory.deserialize(words);
  }
}

impl fmt::Display for FinorVetoMask {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let masked = (0..self.units()).filter(|k| !self.finor(*k)).count();
    let vetos  = (0..self.units()).filter(|k| self.veto(*k)).count();
    write!(f, "<FinorVetoMask: {} units, {} masked, {} veto>", self.units(), masked, vetos)
  }
}

/// Prescale factor per algorithm, one word each
#[derive(Debug, Clone, PartialEq)]
pub struct PrescaleTable {
  memory : ColumnMemoryImage,
}

impl PrescaleTable {

  /// Every unit has the default prescale
  pub fn new(units : usize) -> Result<Self, TdfError> {
    let mut memory = ColumnMemoryImage::new(1, units)?;
    memory.clear(DEFAULT_PRESCALE);
    Ok(Self { memory })
  }

  pub fn for_algorithms(settings : &Settings) -> Result<Self, TdfError> {
    Self::new(settings.spec(ObjectFamily::Algorithm).width() as usize)
  }

  pub fn from_definition(text : &str, source : &str, units : usize) -> Result<Self, TdfError> {
    let mut table = Self::new(units)?;
    table.load_definition(text, source)?;
    Ok(table)
  }

  /// Lines `<unit>: <factor>`, unlisted units get the default
  pub fn load_definition(&mut self, text : &str, source : &str) -> Result<(), TdfError> {
    let units = self.units();
    let mut factors = vec![DEFAULT_PRESCALE; units];
    for def in parse_definitions(text, source)? {
      let unit   = parse_index(&def.key, source, def.line)?;
      let unit   = check_unit(unit, units, source, def.line)?;
      factors[unit] = parse_index(&def.value, source, def.line)?;
    }
    self.memory.deserialize(&factors);
    Ok(())
  }

  pub fn units(&self) -> usize {
    self.memory.blocksize()
  }

  pub fn memory(&self) -> &ColumnMemoryImage {
    &self.memory
  }

  pub fn prescale(&self, unit : usize) -> u32 {
    self.memory.word(unit, 0)
  }

  pub fn factors(&self) -> Vec<u32> {
    self.memory.serialize()
  }

  pub fn serialize(&self) -> Vec<u32> {
    self.memory.serialize()
  }

  pub fn deserialize(&mut self, words : &[u32]) {
    self.memory.deserialize(words);
  }
}

impl fmt::Display for PrescaleTable {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let non_default = self.factors().iter().filter(|f| **f != DEFAULT_PRESCALE).count();
    write!(f, "<PrescaleTable: {} units, {} non default>", self.units(), non_default)
  }
}
