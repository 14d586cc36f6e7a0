//! TDF-PATTERN - generate memory patterns for the
//! snapshot memories, e.g. to load them into the
//! simulation memory or to produce reference dumps
//!

#[macro_use] extern crate log;
extern crate clap;
extern crate colored;
extern crate chrono;
extern crate tdf_dataclasses;
extern crate tdf_tools;

use std::path::PathBuf;
use std::process::exit;

use clap::{arg,
           command,
           Args,
           Parser,
           Subcommand};
use colored::Colorize;

use tdf_dataclasses::errors::TdfError;
use tdf_dataclasses::images::MappedImage;
use tdf_dataclasses::io::{
    render_words,
    write_text,
};
use tdf_dataclasses::settings::Settings;
use tdf_dataclasses::testvector::TestVector;
use tdf_tools::{
    init_env_logger,
    load_settings,
    MemoryKind,
};

#[derive(Parser, Debug)]
#[command(author = "tdf developers", version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: PatternCmd,
  /// The snapshot memory to generate a pattern for
  #[arg(short, long, value_enum, default_value_t = MemoryKind::Objects, global = true)]
  kind: MemoryKind,
  /// A .toml settings file, defaults are used otherwise
  #[arg(long, global = true)]
  settings: Option<PathBuf>,
  /// Write raw words (one per line) instead of the dump format
  #[arg(long, default_value_t = false, global = true)]
  raw: bool,
  /// Write the pattern here instead of stdout
  #[arg(short, long, global = true)]
  output: Option<PathBuf>,
}

#[derive(Debug, Subcommand, PartialEq)]
enum PatternCmd {
  /// Every word holds its own address
  Counter(CounterOpts),
  /// Random words
  Random,
  /// The content of a test vector
  FromVector(VectorOpts),
}

#[derive(Debug, Args, PartialEq)]
struct CounterOpts {
  /// Count down instead of up
  #[arg(long, default_value_t = false)]
  reverse: bool,
}

#[derive(Debug, Args, PartialEq)]
struct VectorOpts {
  /// The test vector file
  #[arg(required = true)]
  vector: PathBuf,
}

fn generate(cli : &Cli, settings : &Settings) -> Result<MappedImage, TdfError> {
  let mut image = cli.kind.image(settings)?;
  match &cli.command {
    PatternCmd::Counter(opts) => image.fill_counter(opts.reverse),
    PatternCmd::Random        => image.fill_random(),
    PatternCmd::FromVector(opts) => {
      let vector = TestVector::from_file(&opts.vector, settings)?;
      info!("Using {}", vector);
      image.read_from_source(&vector)?;
    }
  }
  Ok(image)
}

fn main() {
  init_env_logger();
  let cli = Cli::parse();
  let settings = match load_settings(cli.settings.as_deref()) {
    Err(err) => {
      error!("Unable to load settings! {}", err);
      exit(1);
    }
    Ok(settings) => settings
  };
  let image = match generate(&cli, &settings) {
    Err(err) => {
      eprintln!("{}", format!("{}", err).red());
      exit(1);
    }
    Ok(image) => image
  };
  let text = if cli.raw {
    render_words(&image.serialize())
  } else {
    format!("# {:?} pattern, {}\n# created {}\n{}",
            cli.command, image, chrono::Utc::now().to_rfc3339(), image.dump())
  };
  match &cli.output {
    None => print!("{}", text),
    Some(fname) => {
      if let Err(err) = write_text(fname, &text) {
        eprintln!("{}", format!("{}", err).red());
        exit(1);
      }
      eprintln!("{}", format!("Wrote {} to {}", image, fname.display()).green());
    }
  }
}
