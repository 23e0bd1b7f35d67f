//! Writer for phase-space particle files.
//!
//! A writer holds its header open for mutation until the first particle is
//! appended; from then on the metadata is frozen and records stream out back
//! to back. The particle count is written as zero up front and patched in
//! place on close, so a file without the patch (writer crashed) is still
//! readable to its last complete record. Output is always uncompressed
//! little-endian; compression is a read-side concern.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use crate::error::{Error, Result};
use crate::format::header::Header;
use crate::format::particle::Particle;
use crate::format::reader::FileReader;

/// Byte offset of the u64 particle count, right after the 8-byte prelude.
const COUNT_OFFSET: u64 = 8;

/// Write handle over one particle file being created.
pub struct FileWriter {
    file: BufWriter<File>,
    header: Header,
    started: bool,   // header flushed, metadata frozen
    closed: bool,    // count patched, nothing more to do in drop
    nwritten: u64,   // records appended so far
    record_buf: Vec<u8>,
}

impl FileWriter {
    /// Create (or truncate) `path` as a new particle file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<FileWriter> {
        let path = path.as_ref();
        let file = File::create(path)?;
        debug!("created {}", path.display());
        Ok(FileWriter {
            file: BufWriter::new(file),
            header: Header::default(),
            started: false,
            closed: false,
            nwritten: 0,
            record_buf: Vec::new(),
        })
    }

    /// Header as it will be written. Frozen once the first particle is in.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Copy source name, comments, blobs, and all storage options from an
    /// open input file. Must happen before the first particle.
    pub fn transfer_metadata(&mut self, src: &FileReader) -> Result<()> {
        self.mutable_header()?;
        let from = src.header();
        self.header.source_name = from.source_name.clone();
        self.header.comments = from.comments.clone();
        self.header.blobs = from.blobs.clone();
        self.header.userflags = from.userflags;
        self.header.polarisation = from.polarisation;
        self.header.single_precision = from.single_precision;
        self.header.universal_pdgcode = from.universal_pdgcode;
        self.header.universal_weight = from.universal_weight;
        Ok(())
    }

    /// Set the free-form source description.
    pub fn set_source_name(&mut self, name: &str) -> Result<()> {
        self.mutable_header()?;
        self.header.source_name = name.to_owned();
        Ok(())
    }

    /// Append one human-readable comment to the header.
    pub fn add_comment(&mut self, comment: &str) -> Result<()> {
        self.mutable_header()?;
        self.header.comments.push(comment.to_owned());
        Ok(())
    }

    /// Attach a keyed binary payload to the header.
    pub fn add_blob(&mut self, key: &str, data: Vec<u8>) -> Result<()> {
        self.mutable_header()?;
        self.header.blobs.push((key.to_owned(), data));
        Ok(())
    }

    /// Store the per-particle u32 user flags field.
    pub fn enable_userflags(&mut self) -> Result<()> {
        self.mutable_header()?;
        self.header.userflags = true;
        Ok(())
    }

    /// Store the per-particle polarisation vector.
    pub fn enable_polarisation(&mut self) -> Result<()> {
        self.mutable_header()?;
        self.header.polarisation = true;
        Ok(())
    }

    /// Store floats as f32 instead of f64.
    pub fn enable_single_precision(&mut self) -> Result<()> {
        self.mutable_header()?;
        self.header.single_precision = true;
        Ok(())
    }

    /// Give every particle the same weight and drop the per-particle field.
    pub fn set_universal_weight(&mut self, weight: f64) -> Result<()> {
        self.mutable_header()?;
        self.header.universal_weight = Some(weight);
        Ok(())
    }

    /// Give every particle the same PDG code and drop the per-particle
    /// field. Zero restores per-particle storage.
    pub fn set_universal_pdgcode(&mut self, pdg: i32) -> Result<()> {
        self.mutable_header()?;
        self.header.universal_pdgcode = pdg;
        Ok(())
    }

    /// Encode and append one record, writing the header first if this is
    /// the initial particle.
    pub fn add_particle(&mut self, p: &Particle) -> Result<()> {
        self.ensure_started()?;
        self.record_buf.clear();
        p.encode(&self.header, &mut self.record_buf);
        self.file.write_all(&self.record_buf)?;
        self.nwritten += 1;
        Ok(())
    }

    /// Append the input reader's last-read record. When the record layouts
    /// match the serialized bytes are copied verbatim; otherwise the record
    /// is re-encoded under this writer's layout.
    pub fn transfer_raw(&mut self, src: &FileReader) -> Result<()> {
        let raw = src.last_raw().ok_or(Error::NoRecordRead)?;
        if self.header.layout_matches(src.header()) {
            self.ensure_started()?;
            self.file.write_all(raw)?;
            self.nwritten += 1;
            Ok(())
        } else {
            let p = Particle::decode(raw, src.header());
            self.add_particle(&p)
        }
    }

    /// Flush everything and patch the particle count into the header.
    /// Returns the number of records written. An empty writer still
    /// produces a valid zero-particle file.
    pub fn close(mut self) -> Result<u64> {
        self.closed = true;
        self.finalize()
    }

    fn mutable_header(&mut self) -> Result<()> {
        if self.started {
            return Err(Error::HeaderFrozen);
        }
        Ok(())
    }

    fn ensure_started(&mut self) -> Result<()> {
        if !self.started {
            let bytes = self.header.encode();
            self.file.write_all(&bytes)?;
            self.started = true;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<u64> {
        self.ensure_started()?;
        self.file.flush()?;
        let file = self.file.get_mut();
        file.seek(SeekFrom::Start(COUNT_OFFSET))?;
        file.write_all(&self.nwritten.to_le_bytes())?;
        file.flush()?;
        debug!("closed output with {} particles", self.nwritten);
        Ok(self.nwritten)
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if !self.closed {
            // best effort; an unpatched count still leaves a readable file
            let _ = self.finalize();
        }
    }
}
