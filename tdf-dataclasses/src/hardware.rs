//! Register access boundary
//!
//! The memory images do not talk to the hardware
//! themselves. Whatever transport is used (IPBus,
//! a PCIe bridge, a simulation) implements
//! [`RegisterDevice`], which moves blocks of words
//! to and from a named memory item.
//!

use std::fmt;
use std::collections::HashMap;

use crate::errors::TdfError;
use crate::images::MappedImage;

/// Block wise access to named memory items of a device
pub trait RegisterDevice {
  /// Read `nwords` words from the start of `item`
  fn read_block(&mut self, item : &str, nwords : usize) -> Result<Vec<u32>, TdfError>;
  /// Write `words` to the start of `item`
  fn write_block(&mut self, item : &str, words : &[u32]) -> Result<(), TdfError>;
}

/// A word which did not read back as written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordMismatch {
  pub index    : usize,
  pub expected : u32,
  pub actual   : u32,
}

impl fmt::Display for WordMismatch {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "word {}: wrote {:08x}, read {:08x}", self.index, self.expected, self.actual)
  }
}

/// Outcome of a verified write. A failed verification
/// is a result, not an error: the transfer itself worked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
  Ok,
  Mismatch(Vec<WordMismatch>),
}

impl Verification {
  pub fn is_ok(&self) -> bool {
    matches!(self, Verification::Ok)
  }
}

impl fmt::Display for Verification {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Verification::Ok => write!(f, "<Verification: OK>"),
      Verification::Mismatch(words) => {
        write!(f, "<Verification: {} words differ", words.len())?;
        for word in words.iter().take(8) {
          write!(f, "\n  {}", word)?;
        }
        if words.len() > 8 {
          write!(f, "\n  ...")?;
        }
        write!(f, ">")
      }
    }
  }
}

/// Write `words` to `item` and read them back
pub fn write_verified(device : &mut dyn RegisterDevice,
                      item   : &str,
                      words  : &[u32]) -> Result<Verification, TdfError> {
  device.write_block(item, words)?;
  let readback = device.read_block(item, words.len())?;
  let mismatches : Vec<WordMismatch> = words.iter()
    .zip(readback.iter().chain(std::iter::repeat(&0u32)))
    .enumerate()
    .filter(|(_, (expected, actual))| expected != actual)
    .map(|(index, (expected, actual))| WordMismatch {
      index    : index,
      expected : *expected,
      actual   : *actual,
    })
    .collect();
  if mismatches.is_empty() {
    debug!("Wrote and verified {} words to {}", words.len(), item);
    Ok(Verification::Ok)
  } else {
    warn!("{} of {} words written to {} did not read back", mismatches.len(), words.len(), item);
    Ok(Verification::Mismatch(mismatches))
  }
}

/// Fill `image` with the content of `item`
pub fn read_image(device : &mut dyn RegisterDevice,
                  item   : &str,
                  image  : &mut MappedImage) -> Result<(), TdfError> {
  let words = device.read_block(item, image.size())?;
  if words.len() < image.size() {
    warn!("Read only {} of {} words from {}", words.len(), image.size(), item);
  }
  image.deserialize(&words);
  Ok(())
}

/// Write `image` to `item` and verify it
pub fn write_image(device : &mut dyn RegisterDevice,
                   item   : &str,
                   image  : &MappedImage) -> Result<Verification, TdfError> {
  write_verified(device, item, &image.serialize())
}

/// A device kept entirely in memory, used for dry runs
/// and to test the tools without hardware
#[derive(Debug, Clone, Default)]
pub struct MemoryDevice {
  items      : HashMap<String, Vec<u32>>,
  /// bits which always read back as zero
  stuck_low  : u32,
}

impl MemoryDevice {

  pub fn new() -> Self {
    Self::default()
  }

  /// Declare a memory item of `size` words
  pub fn with_item(mut self, item : &str, size : usize) -> Self {
    self.items.insert(item.to_string(), vec![0u32; size]);
    self
  }

  /// Simulate a broken data line
  pub fn with_stuck_low(mut self, mask : u32) -> Self {
    self.stuck_low = mask;
    self
  }

  pub fn items(&self) -> Vec<&str> {
    let mut names : Vec<&str> = self.items.keys().map(|k| k.as_str()).collect();
    names.sort();
    names
  }

  fn item_mut(&mut self, item : &str) -> Result<&mut Vec<u32>, TdfError> {
    match self.items.get_mut(item) {
      None => {
        error!("Device has no memory item {}!", item);
        Err(TdfError::Device(format!("unknown item {}", item)))
      }
      Some(words) => Ok(words)
    }
  }
}

impl RegisterDevice for MemoryDevice {

  fn read_block(&mut self, item : &str, nwords : usize) -> Result<Vec<u32>, TdfError> {
    let stuck = self.stuck_low;
    let words = self.item_mut(item)?;
    if nwords > words.len() {
      return Err(TdfError::Device(
        format!("read of {} words exceeds {} ({} words)", nwords, item, words.len())));
    }
    Ok(words[..nwords].iter().map(|w| w & !stuck).collect())
  }

  fn write_block(&mut self, item : &str, data : &[u32]) -> Result<(), TdfError> {
    let words = self.item_mut(item)?;
    if data.len() > words.len() {
      return Err(TdfError::Device(
        format!("write of {} words exceeds {} ({} words)", data.len(), item, words.len())));
    }
    words[..data.len()].copy_from_slice(data);
    Ok(())
  }
}

impl fmt::Display for MemoryDevice {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<MemoryDevice: items [{}]>", self.items().join(", "))
  }
}
