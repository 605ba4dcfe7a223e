pub mod patch;
pub mod vocab;

pub use patch::{PatchFile, ResourceType, find_patch_file};
pub use vocab::{Endian, NameTableLayout, parse_name_table, parse_packed_name_table};

/// Vocabulary holding every selector name of the class hierarchy.
pub const VOCAB_SELECTORS: u16 = 997;

/// Vocabulary holding the kernel function names (debugger only in Sierra's
/// interpreter, and notoriously out of date).
pub const VOCAB_KERNEL: u16 = 999;
