//! Big-endian cursor types used by every codec in this crate.

mod reader;
mod writer;

pub use reader::Reader;
pub use writer::Writer;
