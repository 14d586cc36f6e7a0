//! Input/Output
//!
//! * Read text files (dumps, test vectors, definition files)
//! * Parse `key: value` definition files and range lists
//! * Raw word files, one 32bit hex word per line
//!

use std::fs;
use std::io::Write;
use std::path::Path;

use regex::Regex;

use crate::errors::TdfError;

const DEFINITION_LINE : &str = r"^\s*([A-Za-z0-9_]+)\s*:\s*(.*?)\s*$";
const RANGE_TOKEN     : &str = r"^(\d+)\s*-\s*(\d+)$";

/// Read an entire text file into memory
pub fn read_text(filename : &Path) -> Result<String, TdfError> {
  info!("Reading file {}", filename.display());
  match fs::read_to_string(filename) {
    Err(err) => {
      error!("Unable to read {}! {}", filename.display(), err);
      Err(TdfError::Io(err))
    }
    Ok(text) => {
      debug!("Read {} bytes from {}", text.len(), filename.display());
      Ok(text)
    }
  }
}

pub fn write_text(filename : &Path, text : &str) -> Result<(), TdfError> {
  info!("Writing file {}", filename.display());
  let mut file = fs::File::create(filename)?;
  file.write_all(text.as_bytes())?;
  Ok(())
}

/// One line of a definition file
#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionLine {
  /// line number (starting at 1)
  pub line  : usize,
  pub key   : String,
  pub value : String,
}

/// Split a definition file into `key: value` lines.
///
/// Empty lines and lines starting with '#' are
/// skipped, everything else has to match.
pub fn parse_definitions(text : &str, source : &str) -> Result<Vec<DefinitionLine>, TdfError> {
  let pattern = Regex::new(DEFINITION_LINE).map_err(|err| TdfError::format(source, 0, err.to_string()))?;
  let mut definitions = Vec::<DefinitionLine>::new();
  for (k, line) in text.lines().enumerate() {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
      continue;
    }
    match pattern.captures(trimmed) {
      None => {
        error!("Can not interpret line {} of {}: '{}'", k + 1, source, trimmed);
        return Err(TdfError::format(source, k + 1, format!("expected '<key>: <value>', found '{}'", trimmed)));
      }
      Some(caps) => {
        definitions.push(DefinitionLine {
          line  : k + 1,
          key   : caps[1].to_string(),
          value : caps[2].to_string(),
        });
      }
    }
  }
  Ok(definitions)
}

/// Parse an integer, reporting the offending line on failure
pub fn parse_index(token : &str, source : &str, line : usize) -> Result<u32, TdfError> {
  token.trim().parse::<u32>().map_err(|_| {
    TdfError::format(source, line, format!("'{}' is not an unsigned integer", token.trim()))
  })
}

fn check_limit(index : u32, limit : usize, source : &str, line : usize) -> Result<(), TdfError> {
  if index as usize >= limit {
    error!("Index {} in {}:{} is out of range (limit {})", index, source, line, limit);
    return Err(TdfError::format(source, line, format!("unit {} out of range 0..{}", index, limit)));
  }
  Ok(())
}

/// Expand a comma separated list of integers and
/// inclusive ranges `a-b`, optionally in brackets,
/// e.g. `[1, 4-6, 9]` -> `[1, 4, 5, 6, 9]`.
/// Every index has to be below `limit`, ranges are
/// checked before they are expanded.
pub fn parse_range_list(value  : &str,
                        limit  : usize,
                        source : &str,
                        line   : usize) -> Result<Vec<u32>, TdfError> {
  let range = Regex::new(RANGE_TOKEN).map_err(|err| TdfError::format(source, line, err.to_string()))?;
  let mut inner = value.trim();
  if inner.starts_with('[') && inner.ends_with(']') {
    inner = &inner[1..inner.len() - 1];
  }
  let mut indices = Vec::<u32>::new();
  for token in inner.split(',') {
    let token = token.trim();
    if token.is_empty() {
      continue;
    }
    match range.captures(token) {
      Some(caps) => {
        let first = parse_index(&caps[1], source, line)?;
        let last  = parse_index(&caps[2], source, line)?;
        if first > last {
          return Err(TdfError::format(source, line, format!("range '{}' is descending", token)));
        }
        check_limit(last, limit, source, line)?;
        indices.extend(first..=last);
      }
      None => {
        let index = parse_index(token, source, line)?;
        check_limit(index, limit, source, line)?;
        indices.push(index);
      }
    }
  }
  Ok(indices)
}

/// Parse a raw word file, one hex word per line
/// (optional 0x prefix, '#' comments allowed)
pub fn parse_words(text : &str, source : &str) -> Result<Vec<u32>, TdfError> {
  let mut words = Vec::<u32>::new();
  for (k, line) in text.lines().enumerate() {
    let token = line.trim();
    if token.is_empty() || token.starts_with('#') {
      continue;
    }
    let digits = token.trim_start_matches("0x");
    match u32::from_str_radix(digits, 16) {
      Err(_) => {
        return Err(TdfError::format(source, k + 1, format!("'{}' is not a 32bit hex word", token)));
      }
      Ok(word) => words.push(word)
    }
  }
  Ok(words)
}

/// Render words in the raw word file format
pub fn render_words(words : &[u32]) -> String {
  let mut text = String::with_capacity(words.len() * 9);
  for word in words {
    text += &format!("{:08x}\n", word);
  }
  text
}
