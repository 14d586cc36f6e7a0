//! Bit manipulation primitives
//!
//! The trigger memories store fields which are wider than
//! a single 32bit word (muons are 64bit, the algorithm
//! decision word is 512bit). [`BitValue`] represents such
//! a field as a little-endian sequence of 32bit limbs,
//! all functions here are defined purely in terms of
//! integer arithmetic, so they do not depend on the
//! machine byte order.
//!

use std::fmt;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::{
    BitAnd,
    BitOr,
    Shl,
    Shr,
};

use crate::constants::DATA_WIDTH;

/// An unsigned integer of arbitrary width
///
/// The limbs are stored least significant first,
/// trailing zero limbs are always stripped, so
/// that two values are equal exactly when they
/// are numerically equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BitValue {
  limbs : Vec<u32>,
}

impl BitValue {

  pub fn zero() -> Self {
    Self {
      limbs : Vec::<u32>::new(),
    }
  }

  /// Build a value from 32bit limbs, least significant limb first
  pub fn from_limbs(limbs : Vec<u32>) -> Self {
    let mut value = Self { limbs };
    value.normalize();
    value
  }

  fn normalize(&mut self) {
    while let Some(&0) = self.limbs.last() {
      self.limbs.pop();
    }
  }

  /// The (normalized) limbs, least significant first
  pub fn limbs(&self) -> &[u32] {
    &self.limbs
  }

  /// The limb at position `index`, 0 beyond the
  /// most significant limb
  pub fn limb(&self, index : usize) -> u32 {
    self.limbs.get(index).copied().unwrap_or(0)
  }

  pub fn is_zero(&self) -> bool {
    self.limbs.is_empty()
  }

  /// Number of significant bits
  pub fn bits(&self) -> u32 {
    match self.limbs.last() {
      None        => 0,
      Some(last)  => (self.limbs.len() as u32 - 1) * DATA_WIDTH + (DATA_WIDTH - last.leading_zeros())
    }
  }

  /// The lowest 64 bits
  pub fn to_u64(&self) -> u64 {
    (self.limb(1) as u64) << 32 | self.limb(0) as u64
  }

  /// The lowest 32 bits
  pub fn to_u32(&self) -> u32 {
    self.limb(0)
  }

  pub fn bit(&self, index : u32) -> bool {
    let limb = self.limb((index / DATA_WIDTH) as usize);
    (limb >> (index % DATA_WIDTH)) & 0x1 == 1
  }

  pub fn set_bit(&mut self, index : u32) {
    let pos = (index / DATA_WIDTH) as usize;
    if self.limbs.len() <= pos {
      self.limbs.resize(pos + 1, 0);
    }
    self.limbs[pos] |= 1 << (index % DATA_WIDTH);
  }

  pub fn clear_bit(&mut self, index : u32) {
    let pos = (index / DATA_WIDTH) as usize;
    if pos < self.limbs.len() {
      self.limbs[pos] &= !(1 << (index % DATA_WIDTH));
      self.normalize();
    }
  }

  pub fn count_ones(&self) -> u32 {
    self.limbs.iter().map(|l| l.count_ones()).sum()
  }

  /// Bitwise complement within a field of `width` bits
  pub fn invert(&self, width : u32) -> Self {
    let nlimbs = requires(width, DATA_WIDTH) as usize;
    let limbs  = (0..nlimbs).map(|k| !self.limb(k)).collect();
    &BitValue::from_limbs(limbs) & &bitmask(width)
  }

  /// Lowercase hex representation, zero padded
  /// to at least `digits` characters
  pub fn to_hex(&self, digits : usize) -> String {
    let mut repr = String::new();
    for (k, limb) in self.limbs.iter().rev().enumerate() {
      if k == 0 {
        repr += &format!("{:x}", limb);
      } else {
        repr += &format!("{:08x}", limb);
      }
    }
    if repr.is_empty() {
      repr.push('0');
    }
    format!("{:0>width$}", repr, width = digits)
  }

  /// Parse a plain hex string (no prefix, no sign)
  pub fn from_hex(repr : &str) -> Option<Self> {
    if repr.is_empty() || !repr.chars().all(|c| c.is_ascii_hexdigit()) {
      return None;
    }
    let digits : Vec<char> = repr.chars().collect();
    let mut limbs = Vec::<u32>::with_capacity(requires(digits.len() as u32, 8) as usize);
    for chunk in digits.rchunks(8) {
      let part : String = chunk.iter().collect();
      limbs.push(u32::from_str_radix(&part, 16).ok()?);
    }
    Some(Self::from_limbs(limbs))
  }
}

impl From<u32> for BitValue {
  fn from(value : u32) -> Self {
    Self::from_limbs(vec![value])
  }
}

impl From<u64> for BitValue {
  fn from(value : u64) -> Self {
    Self::from_limbs(vec![value as u32, (value >> 32) as u32])
  }
}

impl Ord for BitValue {
  fn cmp(&self, other : &Self) -> Ordering {
    self.limbs.len().cmp(&other.limbs.len())
      .then_with(|| self.limbs.iter().rev().cmp(other.limbs.iter().rev()))
  }
}

impl PartialOrd for BitValue {
  fn partial_cmp(&self, other : &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Shl<u32> for &BitValue {
  type Output = BitValue;

  fn shl(self, n : u32) -> BitValue {
    if self.is_zero() {
      return BitValue::zero();
    }
    let word_shift = (n / DATA_WIDTH) as usize;
    let bit_shift  = n % DATA_WIDTH;
    let mut limbs  = vec![0u32; self.limbs.len() + word_shift + 1];
    for (k, limb) in self.limbs.iter().enumerate() {
      limbs[k + word_shift] |= limb << bit_shift;
      if bit_shift > 0 {
        limbs[k + word_shift + 1] |= limb >> (DATA_WIDTH - bit_shift);
      }
    }
    BitValue::from_limbs(limbs)
  }
}

impl Shr<u32> for &BitValue {
  type Output = BitValue;

  fn shr(self, n : u32) -> BitValue {
    let word_shift = (n / DATA_WIDTH) as usize;
    let bit_shift  = n % DATA_WIDTH;
    if word_shift >= self.limbs.len() {
      return BitValue::zero();
    }
    let mut limbs = Vec::<u32>::with_capacity(self.limbs.len() - word_shift);
    for k in word_shift..self.limbs.len() {
      let mut limb = self.limbs[k] >> bit_shift;
      if bit_shift > 0 {
        limb |= self.limb(k + 1) << (DATA_WIDTH - bit_shift);
      }
      limbs.push(limb);
    }
    BitValue::from_limbs(limbs)
  }
}

impl BitAnd for &BitValue {
  type Output = BitValue;

  fn bitand(self, other : &BitValue) -> BitValue {
    let limbs = self.limbs.iter()
                          .zip(other.limbs.iter())
                          .map(|(a, b)| a & b)
                          .collect();
    BitValue::from_limbs(limbs)
  }
}

impl BitOr for &BitValue {
  type Output = BitValue;

  fn bitor(self, other : &BitValue) -> BitValue {
    let nlimbs = self.limbs.len().max(other.limbs.len());
    let limbs  = (0..nlimbs).map(|k| self.limb(k) | other.limb(k)).collect();
    BitValue::from_limbs(limbs)
  }
}

impl fmt::LowerHex for BitValue {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.to_hex(0))
  }
}

impl fmt::Display for BitValue {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "0x{}", self.to_hex(0))
  }
}

/// Serialized as a "0x" prefixed hex string, so that
/// wide values survive JSON
impl serde::Serialize for BitValue {
  fn serialize<S : serde::Serializer>(&self, serializer : S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.to_string())
  }
}

impl<'de> serde::Deserialize<'de> for BitValue {
  fn deserialize<D : serde::Deserializer<'de>>(deserializer : D) -> Result<Self, D::Error> {
    let repr = <String as serde::Deserialize>::deserialize(deserializer)?;
    let digits = repr.trim_start_matches("0x");
    BitValue::from_hex(digits).ok_or_else(|| {
      serde::de::Error::custom(format!("'{}' is not a hex number", repr))
    })
  }
}

/// `(1 << n) - 1`, for n = 0 this is 0
pub fn bitmask(n : u32) -> BitValue {
  let mut limbs = vec![u32::MAX; (n / DATA_WIDTH) as usize];
  let rest = n % DATA_WIDTH;
  if rest > 0 {
    limbs.push((1u32 << rest) - 1);
  }
  BitValue::from_limbs(limbs)
}

/// `(1 << n) - 1` for fields of at most 64 bits
pub fn bitmask_u64(n : u32) -> u64 {
  if n >= 64 {
    u64::MAX
  } else {
    (1u64 << n) - 1
  }
}

/// Number of hex digits needed to represent n bits
pub fn charcount(n : u32) -> usize {
  requires(n, 4) as usize
}

/// Ceiling division, e.g. the number of 32bit
/// words needed for a field of n bits
///
/// A width of 0 is a programming error and panics.
pub fn requires(n : u32, width : u32) -> u32 {
  n / width + if n % width == 0 {0} else {1}
}

/// Split `value` into `n` chunks of `width` bits,
/// the least significant chunk comes first.
///
/// Bits above `n*width` are silently dropped.
pub fn bitsplit(value : &BitValue, n : usize, width : u32) -> Vec<BitValue> {
  if width == DATA_WIDTH {
    return (0..n).map(|k| BitValue::from(value.limb(k))).collect();
  }
  let mask = bitmask(width);
  (0..n).map(|k| &(value >> (k as u32 * width)) & &mask).collect()
}

/// Inverse of [`bitsplit`], the first value occupies
/// the least significant chunk
pub fn bitjoin(values : &[BitValue], width : u32) -> BitValue {
  if width == DATA_WIDTH {
    return BitValue::from_limbs(values.iter().map(|v| v.limb(0)).collect());
  }
  let mask = bitmask(width);
  let mut joined = BitValue::zero();
  for (k, value) in values.iter().enumerate() {
    let chunk = &(value & &mask) << (k as u32 * width);
    joined = &joined | &chunk;
  }
  joined
}

/// Decode named sub-fields `(msb, lsb)` of a value
pub fn bitdecode(value  : &BitValue,
                 slices : &BTreeMap<String, (u32, u32)>) -> BTreeMap<String, u64> {
  let mut decoded = BTreeMap::<String, u64>::new();
  for (name, (msb, lsb)) in slices {
    let field = &(value >> *lsb) & &bitmask(msb - lsb + 1);
    decoded.insert(name.clone(), field.to_u64());
  }
  decoded
}

/// Indices of all set bits, most significant first
pub fn bit_positions(value : &BitValue) -> Vec<u32> {
  let mut positions = Vec::<u32>::new();
  for (k, limb) in value.limbs().iter().enumerate().rev() {
    for bit in (0..DATA_WIDTH).rev() {
      if (limb >> bit) & 0x1 == 1 {
        positions.push(k as u32 * DATA_WIDTH + bit);
      }
    }
  }
  positions
}

#[cfg(test)]
mod test_binutils {
  use super::*;

  #[test]
  fn bitmask_widths() {
    assert!(bitmask(0).is_zero());
    assert_eq!(bitmask(1), BitValue::from(1u32));
    assert_eq!(bitmask(32), BitValue::from(u32::MAX));
    assert_eq!(bitmask(36), BitValue::from(0xf_ffff_ffffu64));
    assert_eq!(bitmask(512).count_ones(), 512);
    assert_eq!(bitmask_u64(12), 0xfff);
    assert_eq!(bitmask_u64(64), u64::MAX);
  }

  #[test]
  fn charcount_and_requires() {
    assert_eq!(charcount(1), 1);
    assert_eq!(charcount(32), 8);
    assert_eq!(charcount(33), 9);
    assert_eq!(charcount(512), 128);
    assert_eq!(requires(64, 32), 2);
    assert_eq!(requires(65, 32), 3);
    assert_eq!(requires(0, 32), 0);
  }

  #[test]
  fn split_and_join_bytes() {
    let value  = BitValue::from(0xAABBCCDDu32);
    let chunks = bitsplit(&value, 4, 8);
    let expected : Vec<BitValue> = [0xDDu32, 0xCC, 0xBB, 0xAA].iter().map(|v| BitValue::from(*v)).collect();
    assert_eq!(chunks, expected);
    assert_eq!(bitjoin(&expected, 8), value);
  }

  #[test]
  fn split_truncates_silently() {
    let value  = BitValue::from(0x1_2345_6789u64);
    let chunks = bitsplit(&value, 1, 32);
    assert_eq!(chunks, vec![BitValue::from(0x23456789u32)]);
  }

  #[test]
  fn join_of_split_is_masked_value() {
    let value = BitValue::from_limbs(vec![0xdeadbeef, 0x01234567, 0x89abcdef]);
    for width in [1u32, 3, 7, 8, 13, 32, 33] {
      for n in [1usize, 2, 5, 9] {
        let joined = bitjoin(&bitsplit(&value, n, width), width);
        assert_eq!(joined, &value & &bitmask(n as u32 * width), "n={} width={}", n, width);
      }
    }
  }

  #[test]
  fn shifts_across_limbs() {
    let value = BitValue::from(0x8000_0001u32);
    assert_eq!(&value << 1, BitValue::from(0x1_0000_0002u64));
    assert_eq!(&(&value << 40) >> 40, value);
    assert!((&value >> 32).is_zero());
  }

  #[test]
  fn hex_round_trip() {
    let value = BitValue::from_limbs(vec![0x1, 0x0, 0xabc]);
    assert_eq!(value.to_hex(0), "abc0000000000000001");
    assert_eq!(BitValue::from_hex(&value.to_hex(32)), Some(value));
    assert_eq!(BitValue::zero().to_hex(4), "0000");
    assert_eq!(BitValue::from_hex("+1"), None);
    assert_eq!(BitValue::from_hex(""), None);
  }

  #[test]
  fn decode_slices() {
    let mut slices = BTreeMap::<String, (u32, u32)>::new();
    slices.insert(String::from("et"),  (8, 0));
    slices.insert(String::from("eta"), (16, 9));
    let value   = BitValue::from((0x42u32 << 9) | 0x1ff);
    let decoded = bitdecode(&value, &slices);
    assert_eq!(decoded["et"], 0x1ff);
    assert_eq!(decoded["eta"], 0x42);
  }

  #[test]
  fn positions_msb_first() {
    let value = BitValue::from(0x1_0000_0005u64);
    assert_eq!(bit_positions(&value), vec![32, 2, 0]);
  }

  #[test]
  fn invert_within_width() {
    let value = BitValue::from(0b0101u32);
    assert_eq!(value.invert(4), BitValue::from(0b1010u32));
    assert_eq!(BitValue::zero().invert(40), bitmask(40));
  }

  #[test]
  fn json_as_hex_string() {
    let value = BitValue::from(0xdead_0000_beefu64);
    let repr  = serde_json::to_string(&value).unwrap();
    assert_eq!(repr, "\"0xdead0000beef\"");
    let back : BitValue = serde_json::from_str(&repr).unwrap();
    assert_eq!(back, value);
    assert!(serde_json::from_str::<BitValue>("\"0xzz\"").is_err());
  }
}
