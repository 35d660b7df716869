//! Bulk-I/O client for the RAM drive
//!
//! Splits byte-granular reads and writes into page-sized device commands
//! and fans them out across the drive's parallel units through a fixed
//! pool of submission slots, one per unit, each guarded by an atomic busy
//! flag. Every command carries its own request buffers; a slot only
//! bounds how many commands are outstanding and remembers the in-flight
//! handle, so read payloads survive slot reuse until they are copied out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::domain::geometry::NandGeometry;
use crate::domain::request::{
    FlashRequest, KpState, PhysAddr, ReqType, RequestHandle, HOST_PAGE_SIZE,
};
use crate::error::{Error, Result};
use crate::infrastructure::ramdrive::{DriveOptions, RamDrive};

/// Pool sweeps between voluntary yields while hunting for a free slot
const YIELD_PERIOD: usize = 64;
/// Polls on one busy slot before its request is re-issued
const REISSUE_POLLS: u32 = 500_000;
/// LBAs covered by one trim segment
const TRIM_LBAS: u64 = 1 << 14;

struct PoolSlot {
    busy: AtomicBool,
    /// Request currently holding this slot, kept for the self-healing
    /// re-issue; overwritten on the next claim
    in_flight: Mutex<Option<RequestHandle>>,
}

/// An open session against an emulated drive.
///
/// I/O methods take `&mut self`: a session is single-threaded on the
/// outside, parallel across the drive's units on the inside.
pub struct MemIo {
    drive: RamDrive,
    pool: Arc<Vec<PoolSlot>>,
    io_size: usize,
    trim_size: u64,
}

impl MemIo {
    /// Open a drive with the given profile and build the submission pool,
    /// one slot per parallel unit.
    pub fn open(geometry: NandGeometry) -> Result<Self> {
        Self::with_options(geometry, DriveOptions::default())
    }

    pub fn with_options(geometry: NandGeometry, options: DriveOptions) -> Result<Self> {
        geometry.validate()?;
        let nr_punits = geometry.chips_per_ssd();
        let io_size = geometry.page_main_size;

        let pool: Arc<Vec<PoolSlot>> = Arc::new(
            (0..nr_punits)
                .map(|_| PoolSlot {
                    busy: AtomicBool::new(false),
                    in_flight: Mutex::new(None),
                })
                .collect(),
        );

        let completion_pool = Arc::clone(&pool);
        let drive = RamDrive::with_options(geometry, options, move |handle: RequestHandle| {
            // runs on whatever context the timing driver completes from
            let tag = handle.lock().expect("request lock poisoned").tag;
            if let Some(tag) = tag {
                completion_pool[tag].busy.store(false, Ordering::Release);
            }
        })?;

        debug!("memio open: {} slots, io_size {}", nr_punits, io_size);
        Ok(Self {
            drive,
            pool,
            io_size,
            trim_size: TRIM_LBAS * io_size as u64,
        })
    }

    /// Bytes moved by one LBA
    pub fn io_size(&self) -> usize {
        self.io_size
    }

    pub fn nr_punits(&self) -> usize {
        self.pool.len()
    }

    /// Usable capacity in bytes (main areas only)
    pub fn capacity(&self) -> u64 {
        let geometry = self.drive.geometry();
        geometry.pages_per_ssd() as u64 * geometry.page_main_size as u64
    }

    /// The drive underneath, for snapshots and diagnostics
    pub fn drive(&self) -> &RamDrive {
        &self.drive
    }

    /// Write `data` at `lba`. The length must be a multiple of
    /// [`io_size`]; returns the number of bytes submitted. Call [`wait`]
    /// before relying on the data being in the array.
    ///
    /// [`io_size`]: MemIo::io_size
    /// [`wait`]: MemIo::wait
    pub fn write(&mut self, lba: u64, data: &[u8]) -> Result<usize> {
        check_alignment(data.len() as u64, self.io_size as u64)?;
        let kpages = self.drive.geometry().kpages_per_page();
        let page_mapped = self.drive.geometry().is_page_mapped();
        let mut sent = 0;
        for (nth, chunk) in data.chunks_exact(self.io_size).enumerate() {
            self.submission_pause(nth);
            let cur_lba = lba + nth as u64;
            let phys = self.map_lba(cur_lba)?;
            let slot = self.alloc_slot();
            let mut req = FlashRequest::new(ReqType::Write, phys, self.drive.geometry());
            req.tag = Some(slot);
            for idx in 0..kpages {
                req.kp_stt[idx] = KpState::DATA;
                req.main[idx]
                    .copy_from_slice(&chunk[idx * HOST_PAGE_SIZE..(idx + 1) * HOST_PAGE_SIZE]);
            }
            if page_mapped {
                req.set_lpa(0, cur_lba);
            } else {
                for idx in 0..kpages {
                    req.set_lpa(idx, cur_lba * kpages as u64 + idx as u64);
                }
            }
            self.submit_pooled(slot, req.into_handle())?;
            sent += self.io_size;
        }
        Ok(sent)
    }

    /// Read `buf.len()` bytes at `lba`. The length must be a multiple of
    /// [`io_size`]. Blocks until the data has landed in `buf`.
    ///
    /// [`io_size`]: MemIo::io_size
    pub fn read(&mut self, lba: u64, buf: &mut [u8]) -> Result<usize> {
        check_alignment(buf.len() as u64, self.io_size as u64)?;
        let kpages = self.drive.geometry().kpages_per_page();
        let mut issued: Vec<(usize, RequestHandle, usize)> = Vec::new();
        for nth in 0..buf.len() / self.io_size {
            self.submission_pause(nth);
            let cur_lba = lba + nth as u64;
            let phys = self.map_lba(cur_lba)?;
            let slot = self.alloc_slot();
            let mut req = FlashRequest::new(ReqType::Read, phys, self.drive.geometry());
            req.tag = Some(slot);
            for idx in 0..kpages {
                req.kp_stt[idx] = KpState::DATA;
            }
            let handle = req.into_handle();
            self.submit_pooled(slot, Arc::clone(&handle))?;
            issued.push((slot, handle, nth * self.io_size));
        }

        // Each command landed in its own buffers, so collection can run
        // after every slot has been reused.
        let mut received = 0;
        for (slot, handle, offset) in issued {
            self.wait_slot(slot);
            let req = handle.lock().expect("request lock poisoned");
            for idx in 0..kpages {
                let start = offset + idx * HOST_PAGE_SIZE;
                buf[start..start + HOST_PAGE_SIZE].copy_from_slice(&req.main[idx]);
            }
            received += self.io_size;
        }
        Ok(received)
    }

    /// Discard whole segments: `lba` must be aligned to 2^14 LBAs and
    /// `len` to the segment byte size. Issues one erase per parallel unit
    /// per segment.
    pub fn trim(&mut self, lba: u64, len: u64) -> Result<u64> {
        check_alignment(lba, TRIM_LBAS)?;
        check_alignment(len, self.trim_size)?;
        let mut cur_lba = lba;
        let end = lba + len / self.io_size as u64;
        let mut sent = 0;
        while cur_lba < end {
            for unit in 0..self.nr_punits() {
                let phys = self.map_lba(cur_lba + unit as u64)?;
                let slot = self.alloc_slot();
                let mut req = FlashRequest::new(ReqType::GcErase, phys, self.drive.geometry());
                req.tag = Some(slot);
                self.submit_pooled(slot, req.into_handle())?;
            }
            cur_lba += TRIM_LBAS;
            sent += self.trim_size;
        }
        Ok(sent)
    }

    /// Block until every slot in the pool is idle. A slot stuck past the
    /// poll budget has its request re-issued, which recovers from
    /// completions lost in unreliable timing modes.
    pub fn wait(&self) {
        for slot in 0..self.pool.len() {
            self.wait_slot(slot);
        }
    }

    /// Drain all outstanding commands and release the device.
    pub fn close(self) {
        self.wait();
        debug!("memio closed");
    }

    /// Consecutive LBAs stripe across parallel units so bulk transfers
    /// keep every unit busy.
    fn map_lba(&self, lba: u64) -> Result<PhysAddr> {
        let geometry = self.drive.geometry();
        let nr_punits = geometry.chips_per_ssd() as u64;
        let unit = (lba % nr_punits) as usize;
        let stripe = (lba / nr_punits) as usize;
        let block = stripe / geometry.nr_pages_per_block;
        let page = stripe % geometry.nr_pages_per_block;
        if block >= geometry.nr_blocks_per_chip {
            return Err(Error::InvalidParameter(format!(
                "lba {lba} beyond device capacity"
            )));
        }
        Ok(PhysAddr {
            channel: unit / geometry.nr_chips_per_channel,
            chip: unit % geometry.nr_chips_per_channel,
            block,
            page,
        })
    }

    /// Claim a free submission slot, sweeping the pool until one frees up.
    fn alloc_slot(&self) -> usize {
        let mut sweeps = 0;
        loop {
            for (idx, slot) in self.pool.iter().enumerate() {
                if slot
                    .busy
                    .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    return idx;
                }
            }
            sweeps += 1;
            if sweeps % YIELD_PERIOD == 0 {
                thread::yield_now();
            }
        }
    }

    /// Record `handle` as the slot's in-flight request and submit it,
    /// releasing the slot again if the drive rejects the command.
    fn submit_pooled(&self, slot: usize, handle: RequestHandle) -> Result<()> {
        *self.pool[slot]
            .in_flight
            .lock()
            .expect("pool slot lock poisoned") = Some(Arc::clone(&handle));
        if let Err(err) = self.drive.submit(handle) {
            self.pool[slot].busy.store(false, Ordering::Release);
            return Err(err);
        }
        Ok(())
    }

    /// Spin until `slot` is free, re-issuing its request if the completion
    /// appears lost.
    fn wait_slot(&self, slot: usize) {
        let mut polls = 0u32;
        while self.pool[slot].busy.load(Ordering::Acquire) {
            polls += 1;
            if polls == REISSUE_POLLS {
                warn!("timeout at tag {}, re-issuing command", slot);
                let in_flight = self.pool[slot]
                    .in_flight
                    .lock()
                    .expect("pool slot lock poisoned")
                    .clone();
                if let Some(handle) = in_flight {
                    if let Err(err) = self.drive.submit(handle) {
                        debug!("re-issue for tag {} rejected: {}", slot, err);
                    }
                }
                polls = 0;
            }
            std::hint::spin_loop();
        }
    }

    /// Brief pause every batch of submissions, letting completion contexts
    /// catch up on loaded machines.
    fn submission_pause(&self, nth: usize) {
        if nth > 0 && nth % YIELD_PERIOD == 0 {
            thread::sleep(Duration::from_nanos(100));
        }
    }
}

fn check_alignment(value: u64, alignment: u64) -> Result<()> {
    if value % alignment != 0 {
        return Err(Error::InvalidParameter(format!(
            "length {value} is not a multiple of {alignment}"
        )));
    }
    Ok(())
}
