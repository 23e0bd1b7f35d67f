//! Particle record type and its per-record serialization.
//!
//! In memory a [`Particle`] always carries the full field set; the header
//! options of the surrounding file decide which fields hit the disk and at
//! what floating-point width. Fields omitted on disk are reconstructed on
//! decode from the header (universal weight / PDG code) or zeroed
//! (polarisation, user flags).

use crate::format::header::{Endianness, Header};

/// One phase-space record.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub pdg_code: i32,          // PDG particle id (2112 neutron, 22 photon, ...)
    pub position: [f64; 3],     // position x/y/z in cm
    pub direction: [f64; 3],    // unit direction vector
    pub ekin: f64,              // kinetic energy in MeV
    pub time: f64,              // time in ms
    pub weight: f64,            // statistical weight
    pub polarisation: [f64; 3], // polarisation vector, zero unless enabled
    pub userflags: u32,         // application-defined flags, zero unless enabled
}

impl Default for Particle {
    fn default() -> Self {
        Particle {
            pdg_code: 0,
            position: [0.0; 3],
            direction: [0.0, 0.0, 1.0],
            ekin: 0.0,
            time: 0.0,
            weight: 1.0,
            polarisation: [0.0; 3],
            userflags: 0,
        }
    }
}

impl Particle {
    /// Append this record to `out` in the layout `layout` prescribes.
    /// Always little-endian; the writer never emits big-endian files.
    pub(crate) fn encode(&self, layout: &Header, out: &mut Vec<u8>) {
        let mut fp = |v: f64| {
            if layout.single_precision {
                out.extend_from_slice(&(v as f32).to_le_bytes());
            } else {
                out.extend_from_slice(&v.to_le_bytes());
            }
        };
        if layout.polarisation {
            for &v in &self.polarisation {
                fp(v);
            }
        }
        for &v in &self.position {
            fp(v);
        }
        for &v in &self.direction {
            fp(v);
        }
        fp(self.ekin);
        fp(self.time);
        if layout.universal_weight.is_none() {
            fp(self.weight);
        }
        if layout.universal_pdgcode == 0 {
            out.extend_from_slice(&self.pdg_code.to_le_bytes());
        }
        if layout.userflags {
            out.extend_from_slice(&self.userflags.to_le_bytes());
        }
    }

    /// Decode one record from `buf`, which must hold exactly
    /// `layout.particle_size()` bytes (the reader guarantees this).
    pub(crate) fn decode(buf: &[u8], layout: &Header) -> Particle {
        let mut cur = Cursor {
            buf,
            pos: 0,
            e: layout.endianness,
            single: layout.single_precision,
        };
        let mut p = Particle::default();
        if layout.polarisation {
            for v in p.polarisation.iter_mut() {
                *v = cur.fp();
            }
        }
        for v in p.position.iter_mut() {
            *v = cur.fp();
        }
        for v in p.direction.iter_mut() {
            *v = cur.fp();
        }
        p.ekin = cur.fp();
        p.time = cur.fp();
        p.weight = match layout.universal_weight {
            Some(w) => w,
            None => cur.fp(),
        };
        p.pdg_code = if layout.universal_pdgcode != 0 {
            layout.universal_pdgcode
        } else {
            cur.i32()
        };
        p.userflags = if layout.userflags { cur.u32() } else { 0 };
        p
    }
}

/// Field-by-field view over one validated record buffer.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    e: Endianness,
    single: bool,
}

impl Cursor<'_> {
    fn take4(&mut self) -> [u8; 4] {
        let mut b = [0u8; 4];
        b.copy_from_slice(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        b
    }

    fn take8(&mut self) -> [u8; 8] {
        let mut b = [0u8; 8];
        b.copy_from_slice(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        b
    }

    fn fp(&mut self) -> f64 {
        if self.single {
            let b = self.take4();
            self.e.f32(b) as f64
        } else {
            let b = self.take8();
            self.e.f64(b)
        }
    }

    fn i32(&mut self) -> i32 {
        let b = self.take4();
        self.e.i32(b)
    }

    fn u32(&mut self) -> u32 {
        let b = self.take4();
        self.e.u32(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Particle {
        Particle {
            pdg_code: 2112,
            position: [1.5, -2.25, 40.0],
            direction: [0.0, 0.6, 0.8],
            ekin: 2.0,
            time: 0.125,
            weight: 0.25,
            polarisation: [0.1, 0.0, -0.1],
            userflags: 0x1f48,
        }
    }

    #[test]
    fn round_trip_double_precision_all_fields() {
        let mut layout = Header::default();
        layout.polarisation = true;
        layout.userflags = true;

        let p = sample();
        let mut buf = Vec::new();
        p.encode(&layout, &mut buf);
        assert_eq!(buf.len(), layout.particle_size());

        let back = Particle::decode(&buf, &layout);
        assert_eq!(back, p);
    }

    #[test]
    fn round_trip_single_precision_within_f32() {
        let mut layout = Header::default();
        layout.single_precision = true;

        let p = sample();
        let mut buf = Vec::new();
        p.encode(&layout, &mut buf);
        assert_eq!(buf.len(), layout.particle_size());

        let back = Particle::decode(&buf, &layout);
        for i in 0..3 {
            assert!((back.position[i] - p.position[i]).abs() < 1e-5);
        }
        assert!((back.ekin - p.ekin).abs() < 1e-5);
    }

    #[test]
    fn decodes_big_endian_records() {
        let mut layout = Header::default();
        layout.endianness = Endianness::Big;

        // position, direction, ekin, time, weight, then the pdg code
        let fields = [1.5f64, -2.25, 40.0, 0.0, 0.6, 0.8, 2.0, 0.125, 0.25];
        let mut buf = Vec::new();
        for v in fields {
            buf.extend_from_slice(&v.to_be_bytes());
        }
        buf.extend_from_slice(&2112i32.to_be_bytes());
        assert_eq!(buf.len(), layout.particle_size());

        let p = Particle::decode(&buf, &layout);
        assert_eq!(p.position, [1.5, -2.25, 40.0]);
        assert_eq!(p.direction, [0.0, 0.6, 0.8]);
        assert_eq!(p.ekin, 2.0);
        assert_eq!(p.time, 0.125);
        assert_eq!(p.weight, 0.25);
        assert_eq!(p.pdg_code, 2112);
    }

    #[test]
    fn omitted_fields_come_from_header() {
        let mut layout = Header::default();
        layout.universal_weight = Some(0.75);
        layout.universal_pdgcode = 22;

        let p = sample();
        let mut buf = Vec::new();
        p.encode(&layout, &mut buf);
        assert_eq!(buf.len(), layout.particle_size());

        let back = Particle::decode(&buf, &layout);
        assert_eq!(back.weight, 0.75);
        assert_eq!(back.pdg_code, 22);
        // disabled options decode to their defaults
        assert_eq!(back.polarisation, [0.0; 3]);
        assert_eq!(back.userflags, 0);
    }
}
