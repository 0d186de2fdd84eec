/// I/O operations for reading and writing ATR files

/// Reader implementation for ATR files
pub mod reader;
/// Writer implementation for ATR files
pub mod writer;

pub use reader::{decode, read_atr};
pub use writer::{encode, write_atr};
