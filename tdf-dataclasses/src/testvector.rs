//! Reference (test) vectors
//!
//! A test vector is the simulated expectation for one
//! orbit. It is a columnar text file, one line per BX:
//!
//! ```text
//! # menu_uuid: 4f2c...
//! # firmware_uuid: 91a0...
//! 0000 <muon 0> .. <muon 7> <eg 0> .. <extcond> <algorithm> <finor>
//! 0001 ...
//! ```
//!
//! The BX column is zero padded decimal, every other
//! column is zero padded lowercase hex with exactly
//! the number of digits of its field.
//!

use std::fmt;
use std::path::Path;
use std::collections::BTreeMap;

use chrono::Utc;
use regex::Regex;

use crate::binutils::BitValue;
use crate::constants::BX_DIGITS;
use crate::errors::TdfError;
use crate::fieldspec::{
    FieldSpec,
    ObjectFamily,
};
use crate::images::{
    AlgorithmSnapshot,
    FinorSnapshot,
    ObjectLayout,
    ObjectSnapshot,
    ObjectSource,
};
use crate::images::mapped_image::parse_field;
use crate::io::read_text;
use crate::settings::Settings;

const HEADER_LINE : &str = r"^#\s*(menu_uuid|firmware_uuid)\s*:\s*(\S+)\s*$";

/// Expected content of all memories for one orbit
#[derive(Debug, Clone, PartialEq)]
pub struct TestVector {
  pub menu_uuid     : Option<String>,
  pub firmware_uuid : Option<String>,
  blocksize         : usize,
  layout            : ObjectLayout,
  /// family -> occurrence -> BX
  values            : BTreeMap<ObjectFamily, Vec<Vec<BitValue>>>,
}

impl TestVector {

  /// An empty vector covering every family
  pub fn new(settings : &Settings) -> Self {
    let layout    = ObjectLayout::new(&ObjectFamily::ALL, settings);
    let blocksize = settings.orbit_length() as usize;
    let mut values = BTreeMap::<ObjectFamily, Vec<Vec<BitValue>>>::new();
    for entry in layout.entries() {
      values.insert(entry.family,
                    vec![vec![BitValue::zero(); blocksize]; entry.spec.count() as usize]);
    }
    Self {
      menu_uuid     : None,
      firmware_uuid : None,
      blocksize     : blocksize,
      layout        : layout,
      values        : values,
    }
  }

  pub fn from_file(filename : &Path, settings : &Settings) -> Result<Self, TdfError> {
    let text = read_text(filename)?;
    Self::parse(&text, &filename.display().to_string(), settings)
  }

  /// Parse the test vector text format. BX which
  /// are not listed stay empty.
  pub fn parse(text : &str, source : &str, settings : &Settings) -> Result<Self, TdfError> {
    let mut vector = Self::new(settings);
    let header = Regex::new(HEADER_LINE).map_err(|err| TdfError::format(source, 0, err.to_string()))?;
    let columns : Vec<(ObjectFamily, usize, FieldSpec)> = vector.layout.entries().iter()
      .flat_map(|e| (0..e.spec.count() as usize).map(move |k| (e.family, k, e.spec.clone())))
      .collect();
    let mut seen = vec![false; vector.blocksize];
    let mut nrows = 0usize;
    for (k, line) in text.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() {
        continue;
      }
      if line.starts_with('#') {
        if let Some(caps) = header.captures(line) {
          let uuid = caps[2].to_string();
          match &caps[1] {
            "menu_uuid" => vector.menu_uuid     = Some(uuid),
            _           => vector.firmware_uuid = Some(uuid),
          }
        }
        continue;
      }
      let tokens : Vec<&str> = line.split_whitespace().collect();
      if tokens.len() != columns.len() + 1 {
        error!("Line {} of {} has {} columns, expected {}", k + 1, source, tokens.len(), columns.len() + 1);
        return Err(TdfError::format(source, k + 1,
                   format!("expected {} columns, found {}", columns.len() + 1, tokens.len())));
      }
      let bx = parse_bx(tokens[0]).ok_or_else(|| {
        TdfError::format(source, k + 1, format!("'{}' is not a BX number", tokens[0]))
      })?;
      if bx >= vector.blocksize {
        return Err(TdfError::format(source, k + 1,
                   format!("BX {} outside of orbit with {} BX", bx, vector.blocksize)));
      }
      if seen[bx] {
        return Err(TdfError::format(source, k + 1, format!("BX {} appears twice", bx)));
      }
      seen[bx] = true;
      for (token, (family, index, spec)) in tokens[1..].iter().zip(columns.iter()) {
        let value = parse_field(token, spec).map_err(|reason| {
          TdfError::format(source, k + 1, format!("{}[{}]: {}", family, index, reason))
        })?;
        if let Some(occurrences) = vector.values.get_mut(family) {
          occurrences[*index][bx] = value;
        }
      }
      nrows += 1;
    }
    if nrows < vector.blocksize {
      warn!("{} lists only {} of {} BX, the rest is empty", source, nrows, vector.blocksize);
    }
    debug!("Read test vector {} (menu {:?}, firmware {:?})", source, vector.menu_uuid, vector.firmware_uuid);
    Ok(vector)
  }

  /// Assemble a vector from the content of the snapshot memories
  pub fn from_images(settings  : &Settings,
                     objects   : &ObjectSnapshot,
                     algorithm : &AlgorithmSnapshot,
                     finor     : &FinorSnapshot) -> Result<Self, TdfError> {
    let mut vector = Self::new(settings);
    let sources : [&dyn ObjectSource; 3] = [objects, algorithm, finor];
    for source in sources {
      if source.blocksize() != vector.blocksize {
        error!("Snapshot with {} BX can not go into a vector with {} BX", source.blocksize(), vector.blocksize);
        return Err(TdfError::InvalidLayout(
          format!("snapshot blocksize {} does not match orbit length {}", source.blocksize(), vector.blocksize)));
      }
      for family in source.families() {
        if let Some(sequences) = source.occurrences(family, 0) {
          for (k, values) in sequences.iter().enumerate() {
            vector.set_sequence(family, k, values);
          }
        }
      }
    }
    Ok(vector)
  }

  /// Render in the test vector text format
  pub fn render(&self) -> String {
    let mut text = String::new();
    if let Some(uuid) = &self.menu_uuid {
      text += &format!("# menu_uuid: {}\n", uuid);
    }
    if let Some(uuid) = &self.firmware_uuid {
      text += &format!("# firmware_uuid: {}\n", uuid);
    }
    text += &format!("# created: {}\n", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"));
    let columns : Vec<(usize, &Vec<BitValue>)> = self.layout.entries().iter()
      .flat_map(|e| {
        let occurrences = &self.values[&e.family];
        occurrences.iter().map(move |o| (e.spec.hex_digits(), o))
      })
      .collect();
    for bx in 0..self.blocksize {
      text += &format!("{:0width$}", bx, width = BX_DIGITS);
      for (digits, values) in columns.iter() {
        text.push(' ');
        text += &values[bx].to_hex(*digits);
      }
      text.push('\n');
    }
    text
  }

  pub fn blocksize(&self) -> usize {
    self.blocksize
  }

  pub fn layout(&self) -> &ObjectLayout {
    &self.layout
  }

  /// Overwrite the sequence of one occurrence,
  /// values are truncated to the field width
  pub fn set_sequence(&mut self, family : ObjectFamily, index : usize, values : &[BitValue]) {
    let spec = match self.layout.entry(family) {
      None        => return,
      Some(entry) => entry.spec.clone(),
    };
    if let Some(occurrences) = self.values.get_mut(&family) {
      if let Some(sequence) = occurrences.get_mut(index) {
        for (bx, value) in values.iter().take(self.blocksize).enumerate() {
          sequence[bx] = value & spec.bitmask();
        }
      }
    }
  }

  /// The algorithm decision word per BX
  pub fn algorithms(&self) -> Vec<BitValue> {
    self.sequence(ObjectFamily::Algorithm, 0).unwrap_or_default()
  }

  /// The final decision per BX
  pub fn finor(&self) -> Vec<bool> {
    self.sequence(ObjectFamily::Finor, 0)
        .unwrap_or_default()
        .iter()
        .map(|v| v.bit(0))
        .collect()
  }

  /// Make sure the vector was produced for the menu and
  /// firmware the device runs. Only identifiers which
  /// are known on both sides are checked.
  pub fn check_compatibility(&self,
                             menu_uuid     : Option<&str>,
                             firmware_uuid : Option<&str>) -> Result<(), TdfError> {
    let checks = [("menu_uuid", menu_uuid, &self.menu_uuid),
                  ("firmware_uuid", firmware_uuid, &self.firmware_uuid)];
    for (what, expected, found) in checks {
      match (expected, found) {
        (Some(expected), Some(found)) => {
          if !expected.eq_ignore_ascii_case(found) {
            error!("Test vector {} {} does not match {}", what, found, expected);
            return Err(TdfError::Incompatible {
              what     : what.to_string(),
              expected : expected.to_string(),
              found    : found.clone(),
            });
          }
        }
        (Some(expected), None) => {
          warn!("Test vector does not carry a {}, can not check against {}", what, expected);
        }
        _ => ()
      }
    }
    Ok(())
  }
}

fn parse_bx(token : &str) -> Option<usize> {
  if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
    return None;
  }
  token.parse::<usize>().ok()
}

impl ObjectSource for TestVector {

  fn blocksize(&self) -> usize {
    self.blocksize
  }

  fn families(&self) -> Vec<ObjectFamily> {
    self.layout.families()
  }

  fn spec(&self, family : ObjectFamily) -> Option<&FieldSpec> {
    self.layout.entry(family).map(|e| &e.spec)
  }

  fn sequence(&self, family : ObjectFamily, index : usize) -> Option<Vec<BitValue>> {
    self.values.get(&family)?.get(index).cloned()
  }
}

impl fmt::Display for TestVector {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let menu = self.menu_uuid.clone().unwrap_or(String::from("unknown"));
    let fw   = self.firmware_uuid.clone().unwrap_or(String::from("unknown"));
    let n_fired = self.finor().iter().filter(|d| **d).count();
    write!(f, "<TestVector: {} BX, menu {}, firmware {}, finor fired {} times>",
           self.blocksize, menu, fw, n_fired)
  }
}

#[cfg(test)]
mod test_testvector {
  use super::*;

  fn short_settings() -> Settings {
    Settings::new().with_orbit_length(4).unwrap()
  }

  /// A vector line with a single non zero column at `column`
  fn line(bx : usize, column : usize, token : &str, settings : &Settings) -> String {
    let layout = ObjectLayout::new(&ObjectFamily::ALL, settings);
    let mut fields = vec![format!("{:04}", bx)];
    let mut n = 0usize;
    for entry in layout.entries() {
      for _ in 0..entry.spec.count() {
        if n == column {
          fields.push(token.to_string());
        } else {
          fields.push(BitValue::zero().to_hex(entry.spec.hex_digits()));
        }
        n += 1;
      }
    }
    fields.join(" ")
  }

  #[test]
  fn parse_headers_and_rows() {
    let settings = short_settings();
    let text = format!("# menu_uuid: abc-123\n# firmware_uuid: fff\n# any comment\n{}\n{}\n",
                       line(0, 0, "0000000000000007", &settings),
                       line(2, 52, "1", &settings));
    let vector = TestVector::parse(&text, "tv", &settings).unwrap();
    assert_eq!(vector.menu_uuid.as_deref(), Some("abc-123"));
    assert_eq!(vector.firmware_uuid.as_deref(), Some("fff"));
    assert_eq!(vector.sequence(ObjectFamily::Muon, 0).unwrap()[0], BitValue::from(7u32));
    assert_eq!(vector.finor(), vec![false, false, true, false]);
    assert_eq!(vector.occurrences(ObjectFamily::Eg, 0).unwrap().len(), 12);
  }

  #[test]
  fn render_parse_round_trip() {
    let settings = short_settings();
    let mut vector = TestVector::new(&settings);
    vector.menu_uuid = Some(String::from("menu"));
    let mut word = BitValue::zero();
    word.set_bit(300);
    vector.set_sequence(ObjectFamily::Algorithm, 0, &[BitValue::zero(), word]);
    vector.set_sequence(ObjectFamily::Jet, 11, &vec![BitValue::from(0x1234u32); 4]);
    let text = vector.render();
    assert!(text.contains("# created: "));
    let back = TestVector::parse(&text, "rendered", &settings).unwrap();
    assert_eq!(back, vector);
    assert_eq!(back.algorithms()[1].count_ones(), 1);
  }

  #[test]
  fn malformed_rows() {
    let settings = short_settings();
    assert!(TestVector::parse("0000 1 2 3\n", "tv", &settings).is_err());
    let row = line(4, 0, "0000000000000000", &settings);
    assert!(TestVector::parse(&row, "tv", &settings).is_err());
    let row = line(1, 0, "0000000000000000", &settings);
    assert!(TestVector::parse(&format!("{}\n{}\n", row, row), "tv", &settings).is_err());
    let row = line(1, 51, &format!("{:0>128}", "2"), &settings);
    assert!(TestVector::parse(&row, "tv", &settings).is_ok());
    let row = line(1, 51, "2", &settings);
    assert!(TestVector::parse(&row, "tv", &settings).is_err());
    let row = line(1, 52, "2", &settings);
    assert!(TestVector::parse(&row, "tv", &settings).is_err());
    let row = line(0, 0, "123", &settings);
    assert!(TestVector::parse(&row, "tv", &settings).is_err());
  }

  #[test]
  fn compatibility() {
    let mut vector = TestVector::new(&short_settings());
    vector.menu_uuid = Some(String::from("ABC"));
    assert!(vector.check_compatibility(Some("abc"), Some("whatever")).is_ok());
    assert!(vector.check_compatibility(None, None).is_ok());
    match vector.check_compatibility(Some("def"), None) {
      Err(TdfError::Incompatible { what, .. }) => assert_eq!(what, "menu_uuid"),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn vector_from_snapshots() {
    let settings = short_settings();
    let mut objects = ObjectSnapshot::new(&settings).unwrap();
    let algos       = AlgorithmSnapshot::new(&settings).unwrap();
    let mut finor   = FinorSnapshot::new(&settings).unwrap();
    objects.set_occurrence(ObjectFamily::Ett, 0, &[BitValue::from(5u32)]);
    finor.set_decisions(&[false, true]);
    let vector = TestVector::from_images(&settings, &objects, &algos, &finor).unwrap();
    assert_eq!(vector.sequence(ObjectFamily::Ett, 0).unwrap()[0], BitValue::from(5u32));
    assert_eq!(vector.finor(), vec![false, true, false, false]);
    let mut copy = ObjectSnapshot::new(&settings).unwrap();
    copy.read_from_vector(&vector).unwrap();
    assert_eq!(copy, objects);
    let other = ObjectSnapshot::new(&Settings::default()).unwrap();
    assert!(TestVector::from_images(&settings, &other, &algos, &finor).is_err());
  }
}
