pub use crate::binutils::*;
pub use crate::errors::*;
pub use crate::fieldspec::*;
pub use crate::settings::*;
pub use crate::memory::*;
pub use crate::images::*;
pub use crate::testvector::*;
pub use crate::compare::*;
pub use crate::hardware::{
  RegisterDevice,
  MemoryDevice,
  Verification,
  WordMismatch,
  write_verified,
  read_image,
  write_image,
};
