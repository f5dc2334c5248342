//! Parser for the Linux block device statistics table.

use super::ScrapeError;
use std::path::Path;

/// Sector size the kernel reports statistics in, independent of the device.
const SECTOR_BYTES: u64 = 512;

/// Cumulative I/O counters of one block device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskStats {
    /// Device name, e.g. `sda`.
    pub device: String,
    /// Completed reads.
    pub reads: u64,
    /// Completed writes.
    pub writes: u64,
    /// Bytes read.
    pub read_bytes: u64,
    /// Bytes written.
    pub written_bytes: u64,
}

/// Reads and parses the table at `path`.
///
/// # Errors
///
/// Returns [`ScrapeError::Io`] if the file cannot be read.
pub fn read_diskstats(path: &Path) -> Result<Vec<DiskStats>, ScrapeError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ScrapeError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_diskstats(&raw))
}

/// Parses the table. Lines with too few or non-numeric fields are skipped,
/// as are devices that never did any I/O.
#[must_use]
pub fn parse_diskstats(raw: &str) -> Vec<DiskStats> {
    raw.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 {
                return None;
            }
            let number = |i: usize| fields[i].parse::<u64>().ok();
            let stats = DiskStats {
                device: fields[2].to_string(),
                reads: number(3)?,
                read_bytes: number(5)?.saturating_mul(SECTOR_BYTES),
                writes: number(7)?,
                written_bytes: number(9)?.saturating_mul(SECTOR_BYTES),
            };
            (stats.reads > 0 || stats.writes > 0).then_some(stats)
        })
        .collect()
}
