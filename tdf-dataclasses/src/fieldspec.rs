//! Object families and their field specifications
//!
//! A [`FieldSpec`] describes one family of trigger
//! objects (e.g. 8 muons of 64 bit each) and optionally
//! the named bit slices within one object.
//!

use std::fmt;
use std::collections::BTreeMap;

use crate::binutils::{
    bitmask,
    charcount,
    requires,
    BitValue,
};
use crate::constants::{
    DATA_WIDTH,
    MAX_SUBFIELD_WIDTH,
    N_ALGORITHMS,
};
use crate::errors::TdfError;

/// All object families known to the memories.
///
/// The declaration order is the memory layout order,
/// families are placed at increasing column offsets
/// in exactly this sequence.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectFamily {
  Muon,
  Eg,
  Tau,
  Jet,
  Ett,
  Ht,
  Etm,
  Htm,
  Etmhf,
  Htmhf,
  Extcond,
  Algorithm,
  Finor,
}

impl ObjectFamily {

  /// The families present in the object (sim/spy) memory
  pub const OBJECTS : [ObjectFamily; 11] = [
    ObjectFamily::Muon,
    ObjectFamily::Eg,
    ObjectFamily::Tau,
    ObjectFamily::Jet,
    ObjectFamily::Ett,
    ObjectFamily::Ht,
    ObjectFamily::Etm,
    ObjectFamily::Htm,
    ObjectFamily::Etmhf,
    ObjectFamily::Htmhf,
    ObjectFamily::Extcond,
  ];

  /// Every family, in layout order
  pub const ALL : [ObjectFamily; 13] = [
    ObjectFamily::Muon,
    ObjectFamily::Eg,
    ObjectFamily::Tau,
    ObjectFamily::Jet,
    ObjectFamily::Ett,
    ObjectFamily::Ht,
    ObjectFamily::Etm,
    ObjectFamily::Htm,
    ObjectFamily::Etmhf,
    ObjectFamily::Htmhf,
    ObjectFamily::Extcond,
    ObjectFamily::Algorithm,
    ObjectFamily::Finor,
  ];

  pub fn name(&self) -> &'static str {
    match self {
      ObjectFamily::Muon      => "muon",
      ObjectFamily::Eg        => "eg",
      ObjectFamily::Tau       => "tau",
      ObjectFamily::Jet       => "jet",
      ObjectFamily::Ett       => "ett",
      ObjectFamily::Ht        => "ht",
      ObjectFamily::Etm       => "etm",
      ObjectFamily::Htm       => "htm",
      ObjectFamily::Etmhf     => "etmhf",
      ObjectFamily::Htmhf     => "htmhf",
      ObjectFamily::Extcond   => "extcond",
      ObjectFamily::Algorithm => "algorithm",
      ObjectFamily::Finor     => "finor",
    }
  }

  pub fn from_name(name : &str) -> Option<Self> {
    ObjectFamily::ALL.iter().find(|f| f.name() == name).copied()
  }

  /// Families which hold a single wide bitfield per BX,
  /// compared bit by bit
  pub fn is_bitfield(&self) -> bool {
    matches!(self, ObjectFamily::Algorithm | ObjectFamily::Finor)
  }

  /// The specification used if the settings do
  /// not say otherwise
  pub fn default_spec(&self) -> FieldSpec {
    let calo   = [("et", (8, 0)), ("eta", (16, 9)), ("phi", (24, 17)), ("iso", (26, 25))];
    let scalar = [("et", (11, 0))];
    let vector = [("et", (11, 0)), ("phi", (19, 12))];
    let built = match self {
      ObjectFamily::Muon => FieldSpec::with_coding(8, 64, &[
        ("phi",          (9, 0)),
        ("pt",           (18, 10)),
        ("qual",         (22, 19)),
        ("eta",          (31, 23)),
        ("iso",          (33, 32)),
        ("charge_sign",  (34, 34)),
        ("charge_valid", (35, 35)),
      ]),
      ObjectFamily::Eg  |
      ObjectFamily::Tau => FieldSpec::with_coding(12, DATA_WIDTH, &calo),
      ObjectFamily::Jet => FieldSpec::with_coding(12, DATA_WIDTH, &[
        ("et",  (10, 0)),
        ("eta", (18, 11)),
        ("phi", (26, 19)),
      ]),
      ObjectFamily::Ett |
      ObjectFamily::Ht  => FieldSpec::with_coding(1, DATA_WIDTH, &scalar),
      ObjectFamily::Etm   |
      ObjectFamily::Htm   |
      ObjectFamily::Etmhf |
      ObjectFamily::Htmhf => FieldSpec::with_coding(1, DATA_WIDTH, &vector),
      ObjectFamily::Extcond   => FieldSpec::new(1, 256),
      ObjectFamily::Algorithm => FieldSpec::new(1, N_ALGORITHMS),
      ObjectFamily::Finor     => FieldSpec::new(1, 1),
    };
    // the table above is static and satisfies the invariants
    built.unwrap_or_else(|err| panic!("Default spec for {} is broken! {}", self, err))
  }
}

impl fmt::Display for ObjectFamily {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

/// The serialized form of a [`FieldSpec`], without
/// the derived quantities
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct FieldSpecConfig {
  pub count  : u32,
  pub width  : u32,
  #[serde(default)]
  pub coding : BTreeMap<String, (u32, u32)>,
}

/// Immutable descriptor of one object family
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "FieldSpecConfig", into = "FieldSpecConfig")]
pub struct FieldSpec {
  count      : u32,
  width      : u32,
  coding     : BTreeMap<String, (u32, u32)>,
  dwords     : u32,
  bitmask    : BitValue,
  hex_digits : usize,
}

impl FieldSpec {

  /// An opaque field without sub-field coding
  pub fn new(count : u32, width : u32) -> Result<Self, TdfError> {
    Self::from_config(FieldSpecConfig {
      count  : count,
      width  : width,
      coding : BTreeMap::new(),
    })
  }

  pub fn with_coding(count  : u32,
                     width  : u32,
                     coding : &[(&str, (u32, u32))]) -> Result<Self, TdfError> {
    let coding = coding.iter()
                       .map(|(name, slice)| (name.to_string(), *slice))
                       .collect();
    Self::from_config(FieldSpecConfig { count, width, coding })
  }

  pub fn from_config(config : FieldSpecConfig) -> Result<Self, TdfError> {
    if config.count == 0 {
      return Err(TdfError::InvalidFieldSpec(String::from("count has to be at least 1")));
    }
    if config.width == 0 {
      return Err(TdfError::InvalidFieldSpec(String::from("width has to be at least 1 bit")));
    }
    for (name, (msb, lsb)) in &config.coding {
      if msb < lsb || *msb >= config.width {
        return Err(TdfError::InvalidFieldSpec(
          format!("slice {} [{}:{}] does not fit into {} bits", name, msb, lsb, config.width)));
      }
      if msb - lsb + 1 > MAX_SUBFIELD_WIDTH {
        return Err(TdfError::InvalidFieldSpec(
          format!("slice {} [{}:{}] is wider than {} bits", name, msb, lsb, MAX_SUBFIELD_WIDTH)));
      }
    }
    Ok(Self {
      count      : config.count,
      width      : config.width,
      dwords     : requires(config.width, DATA_WIDTH),
      bitmask    : bitmask(config.width),
      hex_digits : charcount(config.width),
      coding     : config.coding,
    })
  }

  /// Number of occurrences per BX
  pub fn count(&self) -> u32 {
    self.count
  }

  /// Width of one occurrence in bits
  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn coding(&self) -> &BTreeMap<String, (u32, u32)> {
    &self.coding
  }

  /// Number of 32bit words (columns) per occurrence
  pub fn dwords(&self) -> u32 {
    self.dwords
  }

  pub fn bitmask(&self) -> &BitValue {
    &self.bitmask
  }

  pub fn hex_digits(&self) -> usize {
    self.hex_digits
  }

  /// Number of columns the whole family occupies
  pub fn columns(&self) -> u32 {
    self.count * self.dwords
  }
}

impl TryFrom<FieldSpecConfig> for FieldSpec {
  type Error = TdfError;

  fn try_from(config : FieldSpecConfig) -> Result<Self, Self::Error> {
    Self::from_config(config)
  }
}

impl From<FieldSpec> for FieldSpecConfig {
  fn from(spec : FieldSpec) -> Self {
    Self {
      count  : spec.count,
      width  : spec.width,
      coding : spec.coding,
    }
  }
}

impl fmt::Display for FieldSpec {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let mut repr = String::from("<FieldSpec:");
    repr += &(format!("\n  count      : {}", self.count));
    repr += &(format!("\n  width      : {}", self.width));
    repr += &(format!("\n  dwords     : {}", self.dwords));
    repr += &(format!("\n  hex digits : {}", self.hex_digits));
    for (name, (msb, lsb)) in &self.coding {
      repr += &(format!("\n    {:<12} [{}:{}]", name, msb, lsb));
    }
    write!(f, "{}>", repr)
  }
}

#[cfg(test)]
mod test_fieldspec {
  use super::*;

  #[test]
  fn derived_quantities() {
    let spec = FieldSpec::new(8, 64).unwrap();
    assert_eq!(spec.dwords(), 2);
    assert_eq!(spec.hex_digits(), 16);
    assert_eq!(spec.columns(), 16);
    assert_eq!(spec.bitmask(), &BitValue::from(u64::MAX));
    let finor = FieldSpec::new(1, 1).unwrap();
    assert_eq!(finor.dwords(), 1);
    assert_eq!(finor.hex_digits(), 1);
  }

  #[test]
  fn invariants_are_enforced() {
    assert!(FieldSpec::new(1, 0).is_err());
    assert!(FieldSpec::new(0, 32).is_err());
    assert!(FieldSpec::with_coding(1, 32, &[("et", (32, 0))]).is_err());
    assert!(FieldSpec::with_coding(1, 32, &[("et", (3, 4))]).is_err());
    assert!(FieldSpec::with_coding(1, 32, &[("et", (31, 31))]).is_ok());
    assert!(FieldSpec::with_coding(1, 256, &[("wide", (99, 0))]).is_err());
    assert!(FieldSpec::with_coding(1, 256, &[("wide", (127, 64))]).is_ok());
    match FieldSpec::with_coding(1, 256, &[("wide", (64, 0))]) {
      Err(TdfError::InvalidFieldSpec(reason)) => assert!(reason.contains("wide")),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn default_specs_are_valid() {
    let columns : u32 = ObjectFamily::OBJECTS.iter().map(|f| f.default_spec().columns()).sum();
    assert_eq!(columns, 66);
    assert_eq!(ObjectFamily::Algorithm.default_spec().columns(), 16);
  }

  #[test]
  fn toml_round_trip() {
    let spec = ObjectFamily::Jet.default_spec();
    let repr = toml::to_string(&spec).unwrap();
    let back : FieldSpec = toml::from_str(&repr).unwrap();
    assert_eq!(spec, back);
    let broken = "count = 1\nwidth = 4\n[coding]\net = [7, 0]\n";
    assert!(toml::from_str::<FieldSpec>(broken).is_err());
  }
}
