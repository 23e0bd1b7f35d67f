//! Sequential reader for phase-space particle files.
//!
//! Opens plain or gzip-compressed containers (sniffed from the stream, not
//! the file name), parses the header eagerly, then yields particles one at a
//! time in a single forward pass. The raw serialized bytes of the most
//! recently read record are retained so a writer with a matching layout can
//! transfer them verbatim.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::format::header::Header;
use crate::format::particle::Particle;
use crate::format::GZIP_MAGIC;

/// Read handle over one particle file.
///
/// Not restartable: records come back in file order exactly once.
pub struct FileReader {
    stream: Box<dyn Read>,
    header: Header,
    record_size: usize, // cached header.particle_size()
    read_count: u64,    // records yielded so far
    last_raw: Vec<u8>,  // serialized bytes of the last complete record
    scratch: Vec<u8>,   // in-flight record bytes, committed to last_raw on success
}

impl FileReader {
    /// Open `path` and parse its header. Gzip-compressed files are
    /// decompressed transparently.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<FileReader> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut buffered = BufReader::new(file);
        let head = buffered.fill_buf()?;
        let compressed = head.len() >= 2 && head[..2] == GZIP_MAGIC;
        let mut stream: Box<dyn Read> = if compressed {
            Box::new(GzDecoder::new(buffered))
        } else {
            Box::new(buffered)
        };
        let header = Header::decode(&mut stream)?;
        debug!(
            "opened {} ({}, {} particles declared, record length {})",
            path.display(),
            if compressed { "gzip" } else { "plain" },
            header.nparticles,
            header.particle_size(),
        );
        let record_size = header.particle_size();
        Ok(FileReader {
            stream,
            header,
            record_size,
            read_count: 0,
            last_raw: Vec::new(),
            scratch: Vec::new(),
        })
    }

    /// File header, as parsed at open time.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Particle count declared by the header. Zero either means an empty
    /// file or a writer that never closed; the true count is only known
    /// once the sequence is exhausted.
    pub fn declared_count(&self) -> u64 {
        self.header.nparticles
    }

    /// Records yielded so far.
    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    /// Serialized bytes of the last successfully read record, or `None`
    /// before the first read. A failed read leaves this untouched.
    pub fn last_raw(&self) -> Option<&[u8]> {
        if self.read_count == 0 {
            None
        } else {
            Some(&self.last_raw)
        }
    }

    /// Read the next record. `Ok(None)` signals a clean end of sequence;
    /// end of file inside a record is an error.
    pub fn read(&mut self) -> Result<Option<Particle>> {
        self.scratch.resize(self.record_size, 0);
        let mut filled = 0;
        while filled < self.record_size {
            let n = self.stream.read(&mut self.scratch[filled..])?;
            if n == 0 {
                if filled == 0 {
                    if self.header.nparticles != 0 && self.read_count != self.header.nparticles {
                        warn!(
                            "header declared {} particles but the file holds {}",
                            self.header.nparticles, self.read_count
                        );
                    }
                    return Ok(None);
                }
                return Err(Error::TruncatedRecord {
                    got: filled,
                    want: self.record_size,
                });
            }
            filled += n;
        }
        // commit only once the record is complete, so last_raw never holds
        // partial bytes after a failed read
        std::mem::swap(&mut self.last_raw, &mut self.scratch);
        self.read_count += 1;
        Ok(Some(Particle::decode(&self.last_raw, &self.header)))
    }
}

impl Iterator for FileReader {
    type Item = Result<Particle>;

    fn next(&mut self) -> Option<Result<Particle>> {
        self.read().transpose()
    }
}
