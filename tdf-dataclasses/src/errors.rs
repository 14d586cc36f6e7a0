//! Errors of the memory image codec
//!
//! Comparison mismatches are not errors, they are
//! collected in a [`crate::compare::ComparisonReport`].
//! Out of range column accesses are programming errors
//! and panic.

use std::error::Error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum TdfError {
  /// Underlying file system error
  Io(io::Error),
  /// Malformed line in one of the text formats
  Format {
    source : String,
    line   : usize,
    reason : String,
  },
  /// A field specification violates its invariants
  InvalidFieldSpec(String),
  /// Memory geometry does not work out
  InvalidLayout(String),
  /// A definition file contains a key we do not know
  UnknownKey {
    source : String,
    key    : String,
  },
  /// A definition file lacks a required key
  MissingKey {
    source : String,
    key    : String,
  },
  TomlDecoding(String),
  JsonEncoding(String),
  /// Test vector and device do not belong together
  Incompatible {
    what     : String,
    expected : String,
    found    : String,
  },
  /// Raised by implementations of the register access layer
  Device(String),
}

impl TdfError {
  pub fn format(source : &str, line : usize, reason : impl Into<String>) -> Self {
    TdfError::Format {
      source : source.to_string(),
      line   : line,
      reason : reason.into(),
    }
  }
}

impl fmt::Display for TdfError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let repr : String;
    match self {
      TdfError::Io(err) => {
        repr = format!("Io: {}", err);
      }
      TdfError::Format { source, line, reason } => {
        repr = format!("Format: {}:{}: {}", source, line, reason);
      }
      TdfError::InvalidFieldSpec(reason) => {
        repr = format!("InvalidFieldSpec: {}", reason);
      }
      TdfError::InvalidLayout(reason) => {
        repr = format!("InvalidLayout: {}", reason);
      }
      TdfError::UnknownKey { source, key } => {
        repr = format!("UnknownKey: '{}' in {}", key, source);
      }
      TdfError::MissingKey { source, key } => {
        repr = format!("MissingKey: '{}' missing in {}", key, source);
      }
      TdfError::TomlDecoding(reason) => {
        repr = format!("TomlDecoding: {}", reason);
      }
      TdfError::JsonEncoding(reason) => {
        repr = format!("JsonEncoding: {}", reason);
      }
      TdfError::Incompatible { what, expected, found } => {
        repr = format!("Incompatible: {} expected {}, found {}", what, expected, found);
      }
      TdfError::Device(reason) => {
        repr = format!("Device: {}", reason);
      }
    }
    write!(f, "<TdfError: {}>", repr)
  }
}

impl Error for TdfError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      TdfError::Io(err) => Some(err),
      _                 => None
    }
  }
}

impl From<io::Error> for TdfError {
  fn from(err : io::Error) -> Self {
    TdfError::Io(err)
  }
}
