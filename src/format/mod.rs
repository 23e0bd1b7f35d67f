pub mod header;
pub mod particle;
pub mod reader;
pub mod writer;

/// Container magic, first four bytes of every file.
pub const MAGIC: [u8; 4] = *b"PSPF";

/// Format version written (and the only one accepted), three ASCII digits.
pub const FORMAT_VERSION: [u8; 3] = *b"003";

/// Gzip stream magic, used to sniff compressed inputs.
pub(crate) const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
