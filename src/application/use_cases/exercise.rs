//! Exercise Use Case
//!
//! Drives a write/read-back/verify workload through the memio client to
//! prove out a device profile without external tooling. Data is a
//! deterministic pseudo-random stream, so verification needs no second
//! copy of the medium.

use crate::application::memio::MemIo;
use crate::domain::types::Progress;
use crate::error::Result;

/// Parameters for an exercise run
pub struct ExerciseParams {
    /// Number of flash pages to touch (clamped to the device capacity)
    pub pages: u64,
    /// Seed for the data pattern
    pub seed: u64,
}

/// Outcome of an exercise run
pub struct ExerciseReport {
    pub pages_written: u64,
    pub bytes_verified: u64,
    /// Pages whose read-back differed from the written pattern
    pub mismatches: u64,
    /// Shadow-verifier events observed by the drive, when data checking
    /// is enabled
    pub corruption_events: u64,
}

/// Use case for exercising a drive end to end
pub struct ExerciseUseCase<'a> {
    mio: &'a mut MemIo,
}

impl<'a> ExerciseUseCase<'a> {
    pub fn new(mio: &'a mut MemIo) -> Self {
        Self { mio }
    }

    /// Execute the workload, reporting progress in pages (write phase then
    /// read phase).
    pub fn execute<P>(&mut self, params: ExerciseParams, on_progress: P) -> Result<ExerciseReport>
    where
        P: Fn(Progress),
    {
        let io_size = self.mio.io_size();
        let capacity_pages = self.mio.capacity() / io_size as u64;
        let pages = params.pages.min(capacity_pages);
        // batches as wide as the device is parallel
        let stride = self.mio.nr_punits() as u64;
        let total_steps = pages * 2;

        let mut lba = 0;
        while lba < pages {
            let batch = stride.min(pages - lba);
            let data = pattern_pages(io_size, params.seed, lba, batch);
            self.mio.write(lba, &data)?;
            lba += batch;
            on_progress(Progress::new(lba, total_steps));
        }
        self.mio.wait();

        let mut mismatches = 0;
        let mut lba = 0;
        let mut buf = vec![0u8; io_size * stride as usize];
        while lba < pages {
            let batch = stride.min(pages - lba);
            let slice = &mut buf[..io_size * batch as usize];
            self.mio.read(lba, slice)?;
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

        Ok(ExerciseReport {
            pages_written: pages,
            bytes_verified: pages * io_size as u64,
            mismatches,
            corruption_events: self.mio.drive().corruption_events(),
        })
    }
}

/// Deterministic pseudo-random fill for `count` consecutive pages,
/// xorshift-derived from the seed and starting LBA.
pub fn pattern_pages(io_size: usize, seed: u64, lba: u64, count: u64) -> Vec<u8> {
    let mut out = vec![0u8; io_size * count as usize];
    for page in 0..count {
        let mut state = (seed ^ (lba + page).wrapping_mul(0x9E37_79B9_7F4A_7C15)) | 1;
        let base = page as usize * io_size;
        for word in out[base..base + io_size].chunks_exact_mut(8) {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            word.copy_from_slice(&state.to_le_bytes());
        }
    }
    out
}
