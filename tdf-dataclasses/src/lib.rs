//! Memory image codec for the trigger processor
//!
//! The trigger processor exposes its state through
//! memories of 32bit words: snapshots of the input
//! objects and the algorithm/final decisions per bunch
//! crossing (BX), and control tables (masks, prescales).
//! This crate translates between the raw words and the
//! named, per BX physics objects, reads the reference
//! test vectors and compares both.
//!
//! * [`binutils`]  - wide values and bit slicing
//! * [`memory`]    - flat and column organized memory images
//! * [`images`]    - object mapped snapshots and control tables
//! * [`testvector`] - the reference vector format
//! * [`compare`]   - cyclic offset aware pattern comparison
//! * [`hardware`]  - the boundary towards the register access layer
//!

#[macro_use] extern crate log;

pub mod binutils;
pub mod constants;
pub mod errors;
pub mod fieldspec;
pub mod settings;
pub mod memory;
pub mod images;
pub mod testvector;
pub mod compare;
pub mod io;
pub mod hardware;
pub mod prelude;
