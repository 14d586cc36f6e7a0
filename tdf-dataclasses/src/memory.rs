//! Memory images
//!
//! A [`MemoryImage`] is the software copy of a block of
//! FPGA memory, a fixed number of 32bit words.
//! The [`ColumnMemoryImage`] interprets the same words
//! as `columns x blocksize` cells stored column by column,
//! which is how the trigger firmware lays out its
//! snapshot memories (one column is one 32bit lane,
//! one row is one BX).
//!

use std::fmt;
use std::io::{
    self,
    Write,
};

use rand::Rng;

use crate::binutils::{
    bitjoin,
    bitsplit,
    BitValue,
};
use crate::constants::DATA_WIDTH;
use crate::errors::TdfError;

/// A flat, fixed size sequence of 32bit words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryImage {
  words : Vec<u32>,
}

impl MemoryImage {

  /// An all-zero image of `size` words
  pub fn new(size : usize) -> Self {
    Self {
      words : vec![0u32; size],
    }
  }

  pub fn size(&self) -> usize {
    self.words.len()
  }

  pub fn words(&self) -> &[u32] {
    &self.words
  }

  pub fn clear(&mut self, value : u32) {
    for word in self.words.iter_mut() {
      *word = value;
    }
  }

  /// Every word holds its own index (or the index
  /// counted from the end), so that addressing
  /// problems show up as wrong read back values
  pub fn fill_counter(&mut self, reverse : bool) {
    let size = self.words.len();
    for (k, word) in self.words.iter_mut().enumerate() {
      let index = if reverse { size - 1 - k } else { k };
      *word = index as u32;
    }
  }

  pub fn fill_random(&mut self) {
    let mut rng = rand::thread_rng();
    for word in self.words.iter_mut() {
      *word = rng.gen::<u32>();
    }
  }

  pub fn serialize(&self) -> Vec<u32> {
    self.words.clone()
  }

  /// Copy up to `size` words into the image. The image
  /// is cleared first, surplus input words are dropped.
  pub fn deserialize(&mut self, values : &[u32]) {
    self.clear(0);
    if values.len() > self.words.len() {
      debug!("Discarding {} surplus words", values.len() - self.words.len());
    }
    for (word, value) in self.words.iter_mut().zip(values.iter()) {
      *word = *value;
    }
  }

  /// Naive word by word comparison
  ///
  /// The own words are rotated left by `offset` (taken
  /// modulo the image size) before they are compared to
  /// the first `size` words of `other`. Writes one line
  /// per mismatch and a summary to `out` and returns the
  /// number of mismatches.
  pub fn compare<W : Write>(&self,
                            other  : &MemoryImage,
                            offset : usize,
                            size   : Option<usize>,
                            out    : &mut W) -> io::Result<usize> {
    let own_size = self.words.len();
    let size     = size.unwrap_or(own_size).min(own_size).min(other.size());
    let offset   = if own_size == 0 { 0 } else { offset % own_size };
    let mut n_errors = 0usize;
    for k in 0..size {
      let a = self.words[(k + offset) % own_size];
      let b = other.words[k];
      if a != b {
        writeln!(out, "mismatch at word {:>6} (offset {}): {:08x} != {:08x}", k, offset, a, b)?;
        n_errors += 1;
      }
    }
    if n_errors == 0 {
      writeln!(out, "memory images are identical ({} words compared)", size)?;
    } else {
      writeln!(out, "{} mismatches in {} words", n_errors, size)?;
    }
    Ok(n_errors)
  }
}

impl fmt::Display for MemoryImage {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<MemoryImage: {} words>", self.words.len())
  }
}

/// A memory image reshaped into `columns x blocksize`
/// cells, stored column major: the word of `(row, column)`
/// lives at `column*blocksize + row`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMemoryImage {
  image     : MemoryImage,
  blocksize : usize,
}

impl ColumnMemoryImage {

  pub fn new(columns : usize, blocksize : usize) -> Result<Self, TdfError> {
    if blocksize == 0 || columns == 0 {
      return Err(TdfError::InvalidLayout(
        format!("{} columns with blocksize {} do not make a memory", columns, blocksize)));
    }
    Ok(Self {
      image     : MemoryImage::new(columns * blocksize),
      blocksize : blocksize,
    })
  }

  /// Wrap an existing image, its size has to be
  /// a multiple of the blocksize
  pub fn from_image(image : MemoryImage, blocksize : usize) -> Result<Self, TdfError> {
    if blocksize == 0 || image.size() == 0 || image.size() % blocksize != 0 {
      return Err(TdfError::InvalidLayout(
        format!("size {} is not a multiple of blocksize {}", image.size(), blocksize)));
    }
    Ok(Self { image, blocksize })
  }

  pub fn blocksize(&self) -> usize {
    self.blocksize
  }

  pub fn columns(&self) -> usize {
    self.image.size() / self.blocksize
  }

  pub fn size(&self) -> usize {
    self.image.size()
  }

  pub fn image(&self) -> &MemoryImage {
    &self.image
  }

  pub fn image_mut(&mut self) -> &mut MemoryImage {
    &mut self.image
  }

  pub fn clear(&mut self, value : u32) {
    self.image.clear(value);
  }

  pub fn fill_counter(&mut self, reverse : bool) {
    self.image.fill_counter(reverse);
  }

  pub fn fill_random(&mut self) {
    self.image.fill_random();
  }

  pub fn serialize(&self) -> Vec<u32> {
    self.image.serialize()
  }

  pub fn deserialize(&mut self, values : &[u32]) {
    self.image.deserialize(values);
  }

  fn check_columns(&self, column : usize, count : usize) {
    assert!(count >= 1 && column + count <= self.columns(),
            "Column range {}..{} outside of memory with {} columns!",
            column, column + count, self.columns());
  }

  /// The word of a single cell
  pub fn word(&self, row : usize, column : usize) -> u32 {
    self.check_columns(column, 1);
    assert!(row < self.blocksize, "Row {} outside of blocksize {}!", row, self.blocksize);
    self.image.words[column * self.blocksize + row]
  }

  /// One value per row, joined from `count` adjacent
  /// columns starting at `column` (lowest column is
  /// the least significant word)
  pub fn extract(&self, column : usize, count : usize) -> Vec<BitValue> {
    self.check_columns(column, count);
    let mut values = Vec::<BitValue>::with_capacity(self.blocksize);
    let mut chunks = Vec::<BitValue>::with_capacity(count);
    for row in 0..self.blocksize {
      chunks.clear();
      for k in 0..count {
        let word = self.image.words[(column + k) * self.blocksize + row];
        chunks.push(BitValue::from(word));
      }
      values.push(bitjoin(&chunks, DATA_WIDTH));
    }
    values
  }

  /// Inverse of [`extract`](Self::extract). Rows beyond
  /// `values` are left untouched, bits above `count*32`
  /// are dropped.
  pub fn inject(&mut self, values : &[BitValue], column : usize, count : usize) {
    self.check_columns(column, count);
    for (row, value) in values.iter().take(self.blocksize).enumerate() {
      for (k, chunk) in bitsplit(value, count, DATA_WIDTH).iter().enumerate() {
        self.image.words[(column + k) * self.blocksize + row] = chunk.to_u32();
      }
    }
  }

  /// All columns joined into one value per row
  pub fn merged(&self) -> Vec<BitValue> {
    self.extract(0, self.columns())
  }

  /// Inverse of [`merged`](Self::merged)
  pub fn inject_merged(&mut self, values : &[BitValue]) {
    let columns = self.columns();
    self.inject(values, 0, columns);
  }
}

impl fmt::Display for ColumnMemoryImage {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<ColumnMemoryImage: {} columns x {} rows>", self.columns(), self.blocksize)
  }
}
