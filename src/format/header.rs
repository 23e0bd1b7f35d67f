//! File-level header of the phase-space container.
//!
//! The header carries everything that is not a particle record:
//! - the magic/version/endianness prelude,
//! - the particle count (patched in place when a writer closes),
//! - storage options that change the per-record layout,
//! - free-form metadata: source name, comments, binary blobs.
//!
//! On-disk layout after the 8-byte prelude (all integers in file endianness):
//!
//! ```text
//! u64 particle count           (0 while a write is in progress)
//! u32 number of comments
//! u32 number of blobs
//! u32 user flags enabled       (0/1)
//! u32 polarisation enabled     (0/1)
//! u32 single precision enabled (0/1)
//! i32 universal PDG code       (0 = stored per particle)
//! u32 particle record length in bytes
//! u32 universal weight enabled (0/1), f64 weight value iff enabled
//! source name, comments, blob keys, blob payloads (each u32 length + bytes)
//! ```

use std::io::Read;

use crate::error::{Error, Result};
use crate::format::{FORMAT_VERSION, MAGIC};

/// Upper bound on any length-prefixed header field (source name, comment,
/// blob key, blob payload). Lengths beyond this are treated as corruption
/// rather than allocated.
pub const MAX_METADATA_LEN: usize = 64 * 1024 * 1024;

/// Byte order of the integers and floats in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little, // marker byte 'L', the only order the writer emits
    Big,    // marker byte 'B', accepted on read and byte-swapped
}

impl Endianness {
    pub(crate) fn u32(self, b: [u8; 4]) -> u32 {
        match self {
            Endianness::Little => u32::from_le_bytes(b),
            Endianness::Big => u32::from_be_bytes(b),
        }
    }

    pub(crate) fn i32(self, b: [u8; 4]) -> i32 {
        match self {
            Endianness::Little => i32::from_le_bytes(b),
            Endianness::Big => i32::from_be_bytes(b),
        }
    }

    pub(crate) fn u64(self, b: [u8; 8]) -> u64 {
        match self {
            Endianness::Little => u64::from_le_bytes(b),
            Endianness::Big => u64::from_be_bytes(b),
        }
    }

    pub(crate) fn f32(self, b: [u8; 4]) -> f32 {
        f32::from_bits(self.u32(b))
    }

    pub(crate) fn f64(self, b: [u8; 8]) -> f64 {
        f64::from_bits(self.u64(b))
    }
}

/// Parsed file header.
///
/// A reader fills this from disk; a writer mutates a fresh one until the
/// first particle freezes it.
#[derive(Debug, Clone)]
pub struct Header {
    pub endianness: Endianness,         // byte order of the whole file
    pub nparticles: u64,                // record count, 0 while write in progress
    pub source_name: String,            // free-form origin description
    pub comments: Vec<String>,          // ordered human-readable comments
    pub blobs: Vec<(String, Vec<u8>)>,  // keyed opaque payloads
    pub userflags: bool,                // per-particle u32 user flags stored
    pub polarisation: bool,             // per-particle polarisation vector stored
    pub single_precision: bool,         // floats stored as f32 instead of f64
    pub universal_pdgcode: i32,         // nonzero: PDG code omitted per particle
    pub universal_weight: Option<f64>,  // set: weight omitted per particle
}

impl Default for Header {
    fn default() -> Self {
        Header {
            endianness: Endianness::Little,
            nparticles: 0,
            source_name: String::new(),
            comments: Vec::new(),
            blobs: Vec::new(),
            userflags: false,
            polarisation: false,
            single_precision: false,
            universal_pdgcode: 0,
            universal_weight: None,
        }
    }
}

impl Header {
    /// Serialized length in bytes of one particle record under these options.
    pub fn particle_size(&self) -> usize {
        let fp = if self.single_precision { 4 } else { 8 };
        // position + direction + ekin + time, always stored
        let mut nfp = 3 + 3 + 1 + 1;
        if self.polarisation {
            nfp += 3;
        }
        if self.universal_weight.is_none() {
            nfp += 1;
        }
        let mut bytes = nfp * fp;
        if self.universal_pdgcode == 0 {
            bytes += 4;
        }
        if self.userflags {
            bytes += 4;
        }
        bytes
    }

    /// True when records encoded under `other` can be appended byte-for-byte
    /// to a file with this header.
    pub fn layout_matches(&self, other: &Header) -> bool {
        self.endianness == other.endianness
            && self.userflags == other.userflags
            && self.polarisation == other.polarisation
            && self.single_precision == other.single_precision
            && self.universal_pdgcode == other.universal_pdgcode
            && self.universal_weight.is_none() == other.universal_weight.is_none()
    }

    /// Serialize the full header, prelude included, in little-endian order.
    /// The particle count is written as stored; writers pass 0 and patch it
    /// on close.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&FORMAT_VERSION);
        out.push(b'L');
        out.extend_from_slice(&self.nparticles.to_le_bytes());
        out.extend_from_slice(&(self.comments.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.blobs.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.userflags as u32).to_le_bytes());
        out.extend_from_slice(&(self.polarisation as u32).to_le_bytes());
        out.extend_from_slice(&(self.single_precision as u32).to_le_bytes());
        out.extend_from_slice(&self.universal_pdgcode.to_le_bytes());
        out.extend_from_slice(&(self.particle_size() as u32).to_le_bytes());
        match self.universal_weight {
            Some(w) => {
                out.extend_from_slice(&1u32.to_le_bytes());
                out.extend_from_slice(&w.to_le_bytes());
            }
            None => out.extend_from_slice(&0u32.to_le_bytes()),
        }
        push_bytes(&mut out, self.source_name.as_bytes());
        for c in &self.comments {
            push_bytes(&mut out, c.as_bytes());
        }
        for (key, _) in &self.blobs {
            push_bytes(&mut out, key.as_bytes());
        }
        for (_, data) in &self.blobs {
            push_bytes(&mut out, data);
        }
        out
    }

    /// Parse a header from the start of `stream`, prelude included.
    pub(crate) fn decode(stream: &mut impl Read) -> Result<Header> {
        let mut magic = [0u8; 4];
        stream.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::BadMagic);
        }
        let mut version = [0u8; 3];
        stream.read_exact(&mut version)?;
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(
                String::from_utf8_lossy(&version).into_owned(),
            ));
        }
        let mut marker = [0u8; 1];
        stream.read_exact(&mut marker)?;
        let endianness = match marker[0] {
            b'L' => Endianness::Little,
            b'B' => Endianness::Big,
            other => return Err(Error::BadEndianness(other)),
        };

        let nparticles = read_u64(stream, endianness)?;
        let ncomments = read_u32(stream, endianness)? as usize;
        let nblobs = read_u32(stream, endianness)? as usize;
        let userflags = read_flag(stream, endianness, "user flags")?;
        let polarisation = read_flag(stream, endianness, "polarisation")?;
        let single_precision = read_flag(stream, endianness, "single precision")?;
        let universal_pdgcode = read_i32(stream, endianness)?;
        let stored_size = read_u32(stream, endianness)? as usize;
        let universal_weight = if read_flag(stream, endianness, "universal weight")? {
            Some(read_f64(stream, endianness)?)
        } else {
            None
        };

        let source_name = read_string(stream, endianness)?;
        let mut comments = Vec::with_capacity(ncomments);
        for _ in 0..ncomments {
            comments.push(read_string(stream, endianness)?);
        }
        let mut keys = Vec::with_capacity(nblobs);
        for _ in 0..nblobs {
            keys.push(read_string(stream, endianness)?);
        }
        let mut blobs = Vec::with_capacity(nblobs);
        for key in keys {
            blobs.push((key, read_buffer(stream, endianness)?));
        }

        let header = Header {
            endianness,
            nparticles,
            source_name,
            comments,
            blobs,
            userflags,
            polarisation,
            single_precision,
            universal_pdgcode,
            universal_weight,
        };
        if stored_size != header.particle_size() {
            return Err(Error::CorruptHeader(format!(
                "stored record length {} does not match options ({} expected)",
                stored_size,
                header.particle_size()
            )));
        }
        Ok(header)
    }
}

fn push_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn read_u32(stream: &mut impl Read, e: Endianness) -> Result<u32> {
    let mut b = [0u8; 4];
    stream.read_exact(&mut b)?;
    Ok(e.u32(b))
}

fn read_i32(stream: &mut impl Read, e: Endianness) -> Result<i32> {
    let mut b = [0u8; 4];
    stream.read_exact(&mut b)?;
    Ok(e.i32(b))
}

fn read_u64(stream: &mut impl Read, e: Endianness) -> Result<u64> {
    let mut b = [0u8; 8];
    stream.read_exact(&mut b)?;
    Ok(e.u64(b))
}

fn read_f64(stream: &mut impl Read, e: Endianness) -> Result<f64> {
    let mut b = [0u8; 8];
    stream.read_exact(&mut b)?;
    Ok(e.f64(b))
}

fn read_flag(stream: &mut impl Read, e: Endianness, what: &str) -> Result<bool> {
    match read_u32(stream, e)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Error::CorruptHeader(format!(
            "{what} flag must be 0 or 1, found {other}"
        ))),
    }
}

fn read_buffer(stream: &mut impl Read, e: Endianness) -> Result<Vec<u8>> {
    let len = read_u32(stream, e)? as usize;
    if len > MAX_METADATA_LEN {
        return Err(Error::CorruptHeader(format!(
            "metadata field of {len} bytes exceeds the {MAX_METADATA_LEN} byte limit"
        )));
    }
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_string(stream: &mut impl Read, e: Endianness) -> Result<String> {
    let buf = read_buffer(stream, e)?;
    String::from_utf8(buf).map_err(|_| Error::CorruptHeader("non-UTF-8 text field".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn particle_size_tracks_options() {
        let mut h = Header::default();
        // position, direction, ekin, time, weight: 9 doubles + i32 pdg code
        assert_eq!(h.particle_size(), 9 * 8 + 4);

        h.polarisation = true;
        h.userflags = true;
        assert_eq!(h.particle_size(), 12 * 8 + 4 + 4);

        h.single_precision = true;
        assert_eq!(h.particle_size(), 12 * 4 + 4 + 4);

        h.universal_weight = Some(1.0);
        h.universal_pdgcode = 2112;
        assert_eq!(h.particle_size(), 11 * 4 + 4);
    }

    #[test]
    fn header_round_trip() {
        let mut h = Header::default();
        h.source_name = "reactor shield run 12".into();
        h.comments.push("first".into());
        h.comments.push("second".into());
        h.blobs.push(("geometry".into(), vec![1, 2, 3, 4]));
        h.userflags = true;
        h.universal_weight = Some(0.25);
        h.nparticles = 7;

        let bytes = h.encode();
        let back = Header::decode(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(back.nparticles, 7);
        assert_eq!(back.source_name, "reactor shield run 12");
        assert_eq!(back.comments, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(back.blobs, vec![("geometry".to_string(), vec![1, 2, 3, 4])]);
        assert!(back.userflags);
        assert_eq!(back.universal_weight, Some(0.25));
        assert_eq!(back.particle_size(), h.particle_size());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = Header::default().encode();
        bytes[0] = b'X';
        assert!(matches!(
            Header::decode(&mut Cursor::new(bytes)),
            Err(Error::BadMagic)
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = Header::default().encode();
        bytes[4..7].copy_from_slice(b"009");
        assert!(matches!(
            Header::decode(&mut Cursor::new(bytes)),
            Err(Error::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn rejects_inconsistent_record_length() {
        let h = Header::default();
        let mut bytes = h.encode();
        // record length field sits after count + 5 u32s + i32
        let off = 8 + 8 + 4 * 5 + 4;
        bytes[off..off + 4].copy_from_slice(&999u32.to_le_bytes());
        assert!(matches!(
            Header::decode(&mut Cursor::new(bytes)),
            Err(Error::CorruptHeader(_))
        ));
    }

    #[test]
    fn decodes_big_endian_headers() {
        // hand-built: only the read path handles big-endian files
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"PSPF003B");
        bytes.extend_from_slice(&2u64.to_be_bytes()); // particle count
        bytes.extend_from_slice(&1u32.to_be_bytes()); // comments
        bytes.extend_from_slice(&0u32.to_be_bytes()); // blobs
        bytes.extend_from_slice(&0u32.to_be_bytes()); // user flags
        bytes.extend_from_slice(&0u32.to_be_bytes()); // polarisation
        bytes.extend_from_slice(&0u32.to_be_bytes()); // single precision
        bytes.extend_from_slice(&2112i32.to_be_bytes()); // universal pdg
        bytes.extend_from_slice(&64u32.to_be_bytes()); // 8 doubles per record
        bytes.extend_from_slice(&1u32.to_be_bytes()); // universal weight on
        bytes.extend_from_slice(&0.25f64.to_be_bytes());
        bytes.extend_from_slice(&4u32.to_be_bytes());
        bytes.extend_from_slice(b"beam");
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(b"c1");

        let h = Header::decode(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(h.endianness, Endianness::Big);
        assert_eq!(h.nparticles, 2);
        assert_eq!(h.universal_pdgcode, 2112);
        assert_eq!(h.universal_weight, Some(0.25));
        assert_eq!(h.source_name, "beam");
        assert_eq!(h.comments, vec!["c1".to_string()]);
        assert_eq!(h.particle_size(), 64);
        // a little-endian writer cannot take these records verbatim
        assert!(!Header::default().layout_matches(&h));
    }

    #[test]
    fn oversized_metadata_length_is_corruption() {
        let mut bytes = Header::default().encode();
        // source name length field sits right after the fixed header
        let off = 8 + 8 + 4 * 5 + 4 + 4 + 4;
        bytes.truncate(off);
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            Header::decode(&mut Cursor::new(bytes)),
            Err(Error::CorruptHeader(_))
        ));
    }

    #[test]
    fn layout_match_ignores_metadata() {
        let mut a = Header::default();
        let mut b = Header::default();
        a.comments.push("only in a".into());
        assert!(a.layout_matches(&b));
        b.single_precision = true;
        assert!(!a.layout_matches(&b));
    }
}
