//! Shared functionality of the tdf command line tools
//!
//! * logging setup
//! * settings loading
//! * loading a memory dump of any snapshot kind and
//!   comparing it against a test vector
//!

#[macro_use] extern crate log;
extern crate env_logger;

use std::io::Write;
use std::path::Path;

use colored::{Colorize, ColoredString};
use log::Level;

use tdf_dataclasses::compare::ComparisonReport;
use tdf_dataclasses::errors::TdfError;
use tdf_dataclasses::images::{
    AlgorithmSnapshot,
    FinorSnapshot,
    MappedImage,
    ObjectSnapshot,
};
use tdf_dataclasses::io::{
    parse_words,
    read_text,
};
use tdf_dataclasses::settings::Settings;
use tdf_dataclasses::testvector::TestVector;

/// Make sure that the loglevel is in color, even
/// though not using pretty_env logger
pub fn color_log(level : &Level) -> ColoredString {
  match level {
    Level::Error    => String::from(" ERROR!").red(),
    Level::Warn     => String::from(" WARN  ").yellow(),
    Level::Info     => String::from(" Info  ").green(),
    Level::Debug    => String::from(" debug ").blue(),
    Level::Trace    => String::from(" trace ").cyan(),
  }
}

/// Set up the environmental (env) logger
/// with our format
pub fn init_env_logger() {
  env_logger::builder()
    .format(|buf, record| {
    writeln!( buf, "[{level}][{module_path}:{line}] {args}",
      level = color_log(&record.level()),
      module_path = record.module_path().unwrap_or("<unknown>"),
      line = record.line().unwrap_or(0),
      args = record.args()
      )
    }).init();
}

/// Settings from a .toml file, or the defaults
pub fn load_settings(filename : Option<&Path>) -> Result<Settings, TdfError> {
  match filename {
    None => {
      info!("No settings file given, using defaults");
      Ok(Settings::default())
    }
    Some(fname) => Settings::from_toml(fname)
  }
}

/// The snapshot memories a dump can come from
#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum MemoryKind {
  /// Input objects (muons, calo, sums, ext. conditions)
  Objects,
  /// Algorithm decisions
  Algorithms,
  /// Final OR
  Finor,
}

impl MemoryKind {

  /// An empty snapshot of this kind
  pub fn image(&self, settings : &Settings) -> Result<MappedImage, TdfError> {
    let image = match self {
      MemoryKind::Objects    => ObjectSnapshot::new(settings)?.into_image(),
      MemoryKind::Algorithms => AlgorithmSnapshot::new(settings)?.into_image(),
      MemoryKind::Finor      => FinorSnapshot::new(settings)?.into_image(),
    };
    Ok(image)
  }
}

/// Load a snapshot of `kind` from a file, either in the
/// memory dump text format or as raw words
pub fn load_image(settings : &Settings,
                  kind     : MemoryKind,
                  filename : &Path,
                  raw      : bool) -> Result<MappedImage, TdfError> {
  let text   = read_text(filename)?;
  let source = filename.display().to_string();
  let mut image = kind.image(settings)?;
  if raw {
    let words = parse_words(&text, &source)?;
    if words.len() != image.size() {
      warn!("{} holds {} words, the memory has {}", source, words.len(), image.size());
    }
    image.deserialize(&words);
  } else {
    image.read(&text, &source)?;
  }
  Ok(image)
}

/// Load a dump and compare it against `vector`
pub fn compare_file(settings : &Settings,
                    kind     : MemoryKind,
                    filename : &Path,
                    raw      : bool,
                    vector   : &TestVector,
                    offset   : usize,
                    size     : Option<usize>) -> Result<ComparisonReport, TdfError> {
  let image = load_image(settings, kind, filename, raw)?;
  Ok(image.compare(vector, offset, size))
}

/// The summary line of a report, colored by outcome
pub fn summary_line(name : &str, report : &ComparisonReport) -> ColoredString {
  let line = format!("{}: {} ok, {} errors, {} ignored, {} gaps (offset {})",
                     name, report.n_ok(), report.n_errors(), report.n_ignored(),
                     report.n_gaps(), report.offset);
  if report.is_success() {
    line.green()
  } else {
    line.red().bold()
  }
}
