//! TDF-MASK - build the control table memories (algorithm
//! bx mask, finor/veto mask, prescales) from their
//! definition files and write them as raw words
//!

#[macro_use] extern crate log;
extern crate clap;
extern crate colored;
extern crate tdf_dataclasses;
extern crate tdf_tools;

use std::path::{Path, PathBuf};
use std::process::exit;

use clap::{arg,
           command,
           Args,
           Parser,
           Subcommand};
use colored::Colorize;

use tdf_dataclasses::errors::TdfError;
use tdf_dataclasses::hardware::{
    write_verified,
    MemoryDevice,
    Verification,
};
use tdf_dataclasses::images::{
    FinorVetoMask,
    PrescaleTable,
    RangeMaskImage,
};
use tdf_dataclasses::io::{
    read_text,
    render_words,
    write_text,
};
use tdf_dataclasses::settings::Settings;
use tdf_tools::{
    init_env_logger,
    load_settings,
};

#[derive(Parser, Debug)]
#[command(author = "tdf developers", version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: MaskCmd,
  /// A .toml settings file, defaults are used otherwise
  #[arg(long, global = true)]
  settings: Option<PathBuf>,
}

#[derive(Debug, Subcommand, PartialEq)]
enum MaskCmd {
  /// Algorithm bx mask, lines "<algorithm>: <bx ranges>"
  BxMask(MaskOpts),
  /// Finor/veto mask, keys "finor_mask" and "veto_mask"
  FinorVeto(MaskOpts),
  /// Prescale factors, lines "<algorithm>: <factor>"
  Prescale(MaskOpts),
}

#[derive(Debug, Args, PartialEq)]
struct MaskOpts {
  /// The definition file
  #[arg(required = true)]
  definition: PathBuf,
  /// Write the words here instead of stdout
  #[arg(short, long)]
  output: Option<PathBuf>,
  /// Write the table to an in-memory device and read it back
  #[arg(long, default_value_t = false)]
  verify: bool,
}

fn build(command : &MaskCmd, settings : &Settings) -> Result<(String, Vec<u32>), TdfError> {
  let (opts, name) = match command {
    MaskCmd::BxMask(opts)    => (opts, "algo_bx_mask"),
    MaskCmd::FinorVeto(opts) => (opts, "finor_veto_mask"),
    MaskCmd::Prescale(opts)  => (opts, "prescale"),
  };
  let text   = read_text(&opts.definition)?;
  let source = opts.definition.display().to_string();
  let words = match command {
    MaskCmd::BxMask(_) => {
      let mut mask = RangeMaskImage::algo_bx_mask(settings)?;
      mask.load_definition(&text, &source)?;
      info!("Built {}", mask);
      mask.serialize()
    }
    MaskCmd::FinorVeto(_) => {
      let mut mask = FinorVetoMask::for_algorithms(settings)?;
      mask.load_definition(&text, &source)?;
      info!("Built {}", mask);
      mask.serialize()
    }
    MaskCmd::Prescale(_) => {
      let mut table = PrescaleTable::for_algorithms(settings)?;
      table.load_definition(&text, &source)?;
      info!("Built {}", table);
      table.serialize()
    }
  };
  Ok((String::from(name), words))
}

fn options(command : &MaskCmd) -> &MaskOpts {
  match command {
    MaskCmd::BxMask(opts)    |
    MaskCmd::FinorVeto(opts) |
    MaskCmd::Prescale(opts)  => opts,
  }
}

fn verify(item : &str, words : &[u32]) -> Result<Verification, TdfError> {
  let mut device = MemoryDevice::new().with_item(item, words.len());
  write_verified(&mut device, item, words)
}

fn write_output(output : Option<&Path>, words : &[u32]) -> Result<(), TdfError> {
  let text = render_words(words);
  match output {
    None        => print!("{}", text),
    Some(fname) => write_text(fname, &text)?,
  }
  Ok(())
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
  let (item, words) = match build(&cli.command, &settings) {
    Err(err) => {
      eprintln!("{}", format!("{}", err).red());
      exit(1);
    }
    Ok(built) => built
  };
  let opts = options(&cli.command);
  if opts.verify {
    match verify(&item, &words) {
      Err(err) => {
        eprintln!("{}", format!("{}", err).red());
        exit(1);
      }
      Ok(Verification::Ok) => {
        eprintln!("{}", format!("{}: {} words verified", item, words.len()).green());
      }
      Ok(mismatch) => {
        eprintln!("{}", format!("{}", mismatch).red());
        exit(1);
      }
    }
  }
  if let Err(err) = write_output(opts.output.as_deref(), &words) {
    eprintln!("{}", format!("{}", err).red());
    exit(1);
  }
}
