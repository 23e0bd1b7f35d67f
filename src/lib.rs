pub mod error;
pub mod filter;
pub mod format;

pub use error::{Error, Result};

pub use format::header::{Endianness, Header};
pub use format::particle::Particle;
pub use format::reader::FileReader;
pub use format::writer::FileWriter;
pub use format::{FORMAT_VERSION, MAGIC};

pub use filter::translate::{translate_x, PassStats, ZWindow};
