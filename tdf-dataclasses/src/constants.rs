//! Global constants for the trigger memories
//!
//! Values which are expected to change between firmware
//! versions (object counts, widths, the orbit length)
//! are only defaults here, the authoritative values live
//! in [`crate::settings::Settings`].
//!

/// Width of a single memory word (every register
/// and memory cell is 32bit)
pub const DATA_WIDTH            : u32 = 32;

/// Number of bunch crossings (BX) per LHC orbit,
/// which is the depth of every snapshot memory
pub const ORBIT_LENGTH          : u32 = 3564;

/// Number of trigger algorithms (bits in the
/// algorithm decision word)
pub const N_ALGORITHMS          : u32 = 512;

/// Number of decimal digits of the BX column
/// in test vectors
pub const BX_DIGITS             : usize = 4;

/// Prescale factor for algorithms which are not
/// mentioned in a prescale definition file
pub const DEFAULT_PRESCALE      : u32 = 1;

/// Default finor/veto mask entry: bit 0 set (algorithm
/// contributes to the final OR), bit 1 clear (no veto)
pub const DEFAULT_FINOR_VETO    : u32 = 0x1;

/// Width of a finor/veto mask entry
pub const FINOR_VETO_WIDTH      : u32 = 2;

/// Bit in the finor/veto mask entry which includes
/// an algorithm in the final OR
pub const FINOR_MASK_BIT        : u32 = 0;

/// Bit in the finor/veto mask entry which marks
/// an algorithm as veto
pub const VETO_MASK_BIT         : u32 = 1;

/// Widest named sub-field of an object
pub const MAX_SUBFIELD_WIDTH    : u32 = 64;

/// Substring in the hex representation of a
/// measured value which marks a resynchronization
/// gap inserted by the firmware
pub const DEFAULT_GAP_MARKER    : &str = "badc0de";
