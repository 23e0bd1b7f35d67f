//! Z-gated X translation pass.
//!
//! One forward sweep over an input file: particles whose position z falls
//! strictly inside a [`ZWindow`] get a fixed offset added to position x,
//! everything is appended to the output in input order. Record count and
//! ordering are preserved exactly; nothing is filtered out or duplicated.

use log::debug;

use crate::error::Result;
use crate::format::reader::FileReader;
use crate::format::writer::FileWriter;

/// Strict open interval on the z coordinate.
/// Values exactly equal to either bound are outside.
#[derive(Debug, Clone, Copy)]
pub struct ZWindow {
    pub zmin: f64, // lower bound, excluded
    pub zmax: f64, // upper bound, excluded
}

impl ZWindow {
    /// Strict membership test: `zmin < z && z < zmax`.
    pub fn contains(&self, z: f64) -> bool {
        self.zmin < z && z < self.zmax
    }
}

/// Counters accumulated by one pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassStats {
    pub read: u64,       // records consumed from the input
    pub translated: u64, // records that fell inside the window
}

/// Run the pass: translate x by `dx` for every record inside `window`,
/// append every record to `writer` in input order.
///
/// Untranslated records take the writer's verbatim transfer path, so they
/// survive byte for byte when the output layout matches the input.
pub fn translate_x(
    reader: &mut FileReader,
    writer: &mut FileWriter,
    window: ZWindow,
    dx: f64,
) -> Result<PassStats> {
    let mut stats = PassStats::default();
    while let Some(mut p) = reader.read()? {
        stats.read += 1;
        if window.contains(p.position[2]) {
            p.position[0] += dx;
            stats.translated += 1;
            writer.add_particle(&p)?;
        } else {
            writer.transfer_raw(reader)?;
        }
    }
    debug!(
        "pass done: {} read, {} translated",
        stats.read, stats.translated
    );
    Ok(stats)
}
