//! Snapshot Round-Trip Use Case
//!
//! Seeds a drive with a known pattern, stores the medium to a file,
//! restores it into a fresh drive, and verifies the re-read contents.

use std::path::PathBuf;

use log::info;

use crate::application::memio::MemIo;
use crate::application::use_cases::exercise::pattern_pages;
use crate::domain::geometry::NandGeometry;
use crate::domain::types::Progress;
use crate::error::{Error, Result};
use crate::infrastructure::ramdrive::DriveOptions;

/// Parameters for a snapshot round trip
pub struct SnapshotParams {
    /// Snapshot file path
    pub file: PathBuf,
    /// Number of pages to seed before the round trip
    pub pages: u64,
    pub seed: u64,
}

/// Outcome of a verified snapshot round trip
pub struct SnapshotReport {
    pub snapshot_bytes: u64,
    pub pages_verified: u64,
}

/// Use case for proving snapshot persistence
pub struct SnapshotRoundTripUseCase {
    geometry: NandGeometry,
    options: DriveOptions,
}

impl SnapshotRoundTripUseCase {
    pub fn new(geometry: NandGeometry, options: DriveOptions) -> Self {
        Self { geometry, options }
    }

    pub fn execute<P>(&self, params: SnapshotParams, on_progress: P) -> Result<SnapshotReport>
    where
        P: Fn(Progress),
    {
        let mut mio = MemIo::with_options(self.geometry.clone(), self.options.clone())?;
        let io_size = mio.io_size();
        let pages = params.pages.min(mio.capacity() / io_size as u64);
        let total_steps = pages * 2;

        let stride = mio.nr_punits() as u64;
        let mut lba = 0;
        while lba < pages {
            let batch = stride.min(pages - lba);
            mio.write(lba, &pattern_pages(io_size, params.seed, lba, batch))?;
            lba += batch;
            on_progress(Progress::new(lba, total_steps));
        }
        mio.wait();
        mio.drive().save(&params.file)?;
        mio.close();

        // A restored medium has no shadow history, so the fresh drive runs
        // with data checking off.
        let mut restored = MemIo::with_options(
            self.geometry.clone(),
            DriveOptions { data_check: false },
        )?;
        restored.drive().load(&params.file)?;

        let mut mismatches = 0;
        let mut buf = vec![0u8; io_size * stride as usize];
        let mut lba = 0;
        while lba < pages {
            let batch = stride.min(pages - lba);
            let slice = &mut buf[..io_size * batch as usize];
            restored.read(lba, slice)?;
            let expected = pattern_pages(io_size, params.seed, lba, batch);
            for page in 0..batch as usize {
                let range = page * io_size..(page + 1) * io_size;
                if slice[range.clone()] != expected[range] {
                    mismatches += 1;
                }
            }
            lba += batch;
            on_progress(Progress::new(pages + lba, total_steps));
        }
        restored.close();

        if mismatches > 0 {
            return Err(Error::VerificationFailed { mismatches, pages });
        }
        info!("snapshot round trip verified: {} pages", pages);
        Ok(SnapshotReport {
            snapshot_bytes: self.geometry.ssd_size() as u64,
            pages_verified: pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::DeviceType;

    #[test]
    fn test_snapshot_roundtrip_verifies() {
        let geometry = NandGeometry {
            nr_channels: 2,
            nr_chips_per_channel: 1,
            nr_blocks_per_chip: 4,
            nr_pages_per_block: 4,
            nr_subpages_per_block: 4,
            page_main_size: 4096,
            page_oob_size: 64,
            page_prog_time_us: 500,
            page_read_time_us: 50,
            block_erase_time_us: 3000,
            device_type: DeviceType::Ramdrive,
        };
        let file = tempfile::NamedTempFile::new().unwrap();
        let report = SnapshotRoundTripUseCase::new(geometry.clone(), DriveOptions::default())
            .execute(
                SnapshotParams {
                    file: file.path().to_path_buf(),
                    pages: 8,
                    seed: 3,
                },
                |_| {},
            )
            .unwrap();
        assert_eq!(report.pages_verified, 8);
        assert_eq!(report.snapshot_bytes, geometry.ssd_size() as u64);
        assert_eq!(
            std::fs::metadata(file.path()).unwrap().len(),
            geometry.ssd_size() as u64
        );
    }
}
