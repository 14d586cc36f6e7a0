//! TDF-COMPARE - compare snapshot memory dumps of one
//! or more boards against a test vector
//!
//! Every dump is loaded and compared in its own thread,
//! the reports are collected over a channel and printed
//! in the order the dumps were given.
//!

#[macro_use] extern crate log;
extern crate clap;
extern crate colored;
extern crate crossbeam_channel;
extern crate tdf_dataclasses;
extern crate tdf_tools;

use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use std::thread;

use clap::{arg,
           command,
           Parser};
use colored::Colorize;
use crossbeam_channel as cbc;

use tdf_dataclasses::compare::ComparisonReport;
use tdf_dataclasses::errors::TdfError;
use tdf_dataclasses::testvector::TestVector;
use tdf_tools::{
    compare_file,
    init_env_logger,
    load_settings,
    summary_line,
    MemoryKind,
};

#[derive(Parser, Debug)]
#[command(author = "tdf developers", version, about, long_about = None)]
struct Args {
  /// Memory dumps to check, one per board
  #[arg(required = true)]
  dumps: Vec<PathBuf>,
  /// The reference test vector
  #[arg(short, long)]
  vector: PathBuf,
  /// Which snapshot memory the dumps were taken from
  #[arg(short, long, value_enum, default_value_t = MemoryKind::Objects)]
  kind: MemoryKind,
  /// Cyclic offset (in BX) of the measured data
  #[arg(short, long, default_value_t = 0)]
  offset: usize,
  /// Compare only the first SIZE BX
  #[arg(short, long)]
  size: Option<usize>,
  /// A .toml settings file, defaults are used otherwise
  #[arg(long)]
  settings: Option<PathBuf>,
  /// Dumps are raw word files (one hex word per line)
  #[arg(long, default_value_t = false)]
  raw: bool,
  /// Print the reports as json instead of text
  #[arg(long, default_value_t = false)]
  json: bool,
  /// Refuse vectors made for another menu
  #[arg(long)]
  menu_uuid: Option<String>,
  /// Refuse vectors made for another firmware
  #[arg(long)]
  firmware_uuid: Option<String>,
  /// Enhance output to console
  #[arg(long, default_value_t = false)]
  verbose: bool,
}

fn main() {
  init_env_logger();
  let args = Args::parse();

  let settings = match load_settings(args.settings.as_deref()) {
    Err(err) => {
      error!("Unable to load settings! {}", err);
      exit(1);
    }
    Ok(settings) => settings
  };
  let vector = match TestVector::from_file(&args.vector, &settings) {
    Err(err) => {
      error!("Unable to load test vector {}! {}", args.vector.display(), err);
      exit(1);
    }
    Ok(vector) => vector
  };
  if let Err(err) = vector.check_compatibility(args.menu_uuid.as_deref(),
                                               args.firmware_uuid.as_deref()) {
    error!("{}", err);
    exit(1);
  }
  if args.verbose {
    println!("==> Loaded {}", vector);
  }

  let vector = Arc::new(vector);
  let (tx, rx) : (cbc::Sender<(usize, Result<ComparisonReport, TdfError>)>,
                  cbc::Receiver<(usize, Result<ComparisonReport, TdfError>)>) = cbc::unbounded();
  let mut workers = Vec::<thread::JoinHandle<()>>::with_capacity(args.dumps.len());
  for (k, dump) in args.dumps.iter().enumerate() {
    let tx       = tx.clone();
    let vector   = Arc::clone(&vector);
    let settings = settings.clone();
    let dump     = dump.clone();
    let kind     = args.kind;
    let raw      = args.raw;
    let offset   = args.offset;
    let size     = args.size;
    let handle = thread::Builder::new()
      .name(format!("compare-{}", k))
      .spawn(move || {
        let result = compare_file(&settings, kind, &dump, raw, &vector, offset, size);
        if let Err(err) = tx.send((k, result)) {
          error!("Unable to send report for {}! {}", dump.display(), err);
        }
      });
    match handle {
      Err(err) => {
        error!("Unable to spawn thread for {}! {}", args.dumps[k].display(), err);
        exit(1);
      }
      Ok(handle) => workers.push(handle)
    }
  }
  drop(tx);

  let mut results : Vec<Option<Result<ComparisonReport, TdfError>>> = args.dumps.iter().map(|_| None).collect();
  for (k, result) in rx.iter() {
    results[k] = Some(result);
  }
  for worker in workers {
    if worker.join().is_err() {
      error!("A comparison thread panicked!");
    }
  }

  let mut n_failed = 0usize;
  for (dump, result) in args.dumps.iter().zip(results.into_iter()) {
    let name = dump.display().to_string();
    match result {
      None => {
        n_failed += 1;
        println!("{}", format!("{}: no result", name).red());
      }
      Some(Err(err)) => {
        n_failed += 1;
        println!("{}", format!("{}: {}", name, err).red());
      }
      Some(Ok(report)) => {
        if !report.is_success() {
          n_failed += 1;
        }
        if args.json {
          match report.to_json() {
            Err(err) => error!("{}", err),
            Ok(json) => println!("{}", json),
          }
        } else {
          println!("==> {}", name.bold());
          println!("{}", report);
          println!("{}", summary_line(&name, &report));
        }
      }
    }
  }
  if n_failed > 0 {
    println!("{}", format!("{} of {} dumps FAILED", n_failed, args.dumps.len()).red().bold());
    exit(1);
  }
  println!("{}", format!("All {} dumps match the test vector", args.dumps.len()).green());
}
