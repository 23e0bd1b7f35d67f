use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the particle-file codec and the filter pass built on it.
///
/// Every fallible library operation returns this through the crate [`Result`]
/// alias; the binary converts it into a fatal exit via `anyhow`.
#[derive(Debug, Error)]
pub enum Error {
    /// The file does not start with the phase-space container magic.
    #[error("not a phase-space particle file: bad magic")]
    BadMagic,

    /// The container version is newer or older than this codec understands.
    #[error("unsupported format version {0:?}")]
    UnsupportedVersion(String),

    /// The endianness marker byte is neither 'L' nor 'B'.
    #[error("invalid endianness marker {0:#04x}")]
    BadEndianness(u8),

    /// Structurally invalid header (bad lengths, non-UTF-8 text, mismatched
    /// record size).
    #[error("corrupt header: {0}")]
    CorruptHeader(String),

    /// End of file in the middle of a particle record.
    #[error("truncated particle record: got {got} of {want} bytes")]
    TruncatedRecord { got: usize, want: usize },

    /// Metadata mutation attempted after the first particle was written.
    #[error("header is frozen once the first particle has been written")]
    HeaderFrozen,

    /// Raw record transfer requested before any record was read.
    #[error("no record has been read from the input yet")]
    NoRecordRead,

    /// Propagated I/O errors from the underlying file streams.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_is_informative() {
        let e = Error::TruncatedRecord { got: 12, want: 60 };
        let msg = format!("{e}");
        assert!(msg.contains("truncated"));
        assert!(msg.contains("12"));
        assert!(msg.contains("60"));
    }

    #[test]
    fn io_errors_convert() {
        fn fails() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(Error::Io(_))));
    }
}
