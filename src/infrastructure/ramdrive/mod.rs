//! RAM-backed NAND drive
//!
//! The whole medium lives in main memory, split into one contiguous region
//! per parallel unit (a chip's worth of blocks each). Commands execute
//! synchronously against the array; the configured timing driver decides
//! when their completions fire.

mod page_engine;
mod punit;
mod shadow;
mod timing;

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::{debug, info};

use crate::domain::geometry::{DeviceType, NandGeometry};
use crate::domain::request::{FlashRequest, PhysAddr, ReqType, RequestHandle, HOST_PAGE_SIZE};
use crate::error::{Error, Result};

use punit::{PunitTable, SystemClock};
use shadow::ShadowStore;
use timing::TimingDriver;

/// Upper-layer completion callback. Invoked exactly once per successful
/// submit, possibly from a context asynchronous to the submitter; it must
/// not block and must tolerate reentrant submits.
pub type CompletionFn = Box<dyn Fn(RequestHandle) + Send + Sync>;

/// Drive tunables that are not part of the device geometry.
#[derive(Debug, Clone)]
pub struct DriveOptions {
    /// Mirror every program into a host-addressed shadow and compare reads
    /// against it
    pub data_check: bool,
}

impl Default for DriveOptions {
    fn default() -> Self {
        Self {
            data_check: cfg!(debug_assertions),
        }
    }
}

pub(crate) struct DriveInner {
    pub(crate) geometry: NandGeometry,
    /// One region per parallel unit, channel-major; concatenated they form
    /// the canonical contiguous image of the medium
    chips: Vec<Mutex<Vec<u8>>>,
    shadow: Option<ShadowStore>,
    punits: PunitTable,
    on_complete: CompletionFn,
}

/// The emulated drive. Submissions may come from any thread; drop only
/// after draining outstanding requests (anything still registered at drop
/// will never complete).
pub struct RamDrive {
    inner: Arc<DriveInner>,
    timing: TimingDriver,
}

impl std::fmt::Debug for RamDrive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RamDrive").finish()
    }
}

impl RamDrive {
    pub fn create(
        geometry: NandGeometry,
        on_complete: impl Fn(RequestHandle) + Send + Sync + 'static,
    ) -> Result<Self> {
        Self::with_options(geometry, DriveOptions::default(), on_complete)
    }

    pub fn with_options(
        geometry: NandGeometry,
        options: DriveOptions,
        on_complete: impl Fn(RequestHandle) + Send + Sync + 'static,
    ) -> Result<Self> {
        geometry.validate()?;
        let nr_punits = geometry.chips_per_ssd();
        info!(
            "ram drive: {} bytes, {} parallel units, {:?} completion, data check {}",
            geometry.ssd_size(),
            nr_punits,
            geometry.device_type,
            if options.data_check { "on" } else { "off" },
        );

        let chips = (0..nr_punits)
            .map(|_| Mutex::new(vec![0xFF; geometry.chip_size()]))
            .collect();
        let shadow = options.data_check.then(|| ShadowStore::new(&geometry));
        let punits = PunitTable::new(nr_punits, Arc::new(SystemClock));

        let inner = Arc::new(DriveInner {
            geometry,
            chips,
            shadow,
            punits,
            on_complete: Box::new(on_complete),
        });
        let timing = TimingDriver::start(&inner)?;
        Ok(Self { inner, timing })
    }

    pub fn geometry(&self) -> &NandGeometry {
        &self.inner.geometry
    }

    /// Total shadow mismatches observed so far; zero while data checking
    /// is disabled
    pub fn corruption_events(&self) -> u64 {
        self.inner
            .shadow
            .as_ref()
            .map_or(0, ShadowStore::mismatch_count)
    }

    /// Whether no request is currently registered under any parallel unit
    pub fn is_idle(&self) -> bool {
        self.inner.punits.is_idle()
    }

    /// Execute `req` against the array and register it for completion.
    ///
    /// The page operation itself runs synchronously on the calling thread;
    /// only the completion is deferred according to the device type. On an
    /// execution or registration error the request's `ret` is set, the
    /// error is returned, and no completion fires.
    pub fn submit(&self, req: RequestHandle) -> Result<()> {
        let (punit, latency_us) = {
            let mut guard = req.lock().expect("request lock poisoned");
            self.inner.execute(&mut guard)?;
            (
                guard.phys.punit_id(&self.inner.geometry),
                self.inner.target_latency_us(guard.req_type),
            )
        };
        self.inner.punits.try_claim(punit, Arc::clone(&req), latency_us)?;
        self.timing.arm(&self.inner);
        Ok(())
    }

    /// Write the whole medium to `path` as one raw blob, parallel units in
    /// channel-major order.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        for chip in &self.inner.chips {
            let chip = chip.lock().expect("backing region lock poisoned");
            file.write_all(&chip)?;
        }
        file.sync_all()?;
        debug!("snapshot stored: {} bytes", self.inner.geometry.ssd_size());
        Ok(())
    }

    /// Restore the medium from a blob previously written by [`save`].
    ///
    /// The shadow mirror is not part of the snapshot; it repopulates from
    /// subsequent writes.
    ///
    /// [`save`]: RamDrive::save
    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::open(path)?;
        for chip in &self.inner.chips {
            let mut chip = chip.lock().expect("backing region lock poisoned");
            file.read_exact(&mut chip)?;
        }
        debug!("snapshot restored: {} bytes", self.inner.geometry.ssd_size());
        Ok(())
    }
}

impl Drop for RamDrive {
    fn drop(&mut self) {
        self.timing.shutdown();
    }
}

impl DriveInner {
    fn execute(&self, req: &mut FlashRequest) -> Result<()> {
        if let Err(err) = self.check_shape(req) {
            req.ret = 1;
            return Err(err);
        }
        let want_oob = self.geometry.page_oob_size > 0;
        let outcome = match req.req_type {
            ReqType::RmwRead => self.run_read(req, want_oob, true),
            ReqType::Read | ReqType::MetaRead | ReqType::GcRead => {
                self.run_read(req, want_oob, false)
            }
            ReqType::Write | ReqType::MetaWrite | ReqType::GcWrite | ReqType::RmwWrite => {
                self.run_prog(req, want_oob)
            }
            ReqType::GcErase => self.run_erase(req),
            ReqType::ReadDummy | ReqType::Trim => Ok(()),
        };
        match outcome {
            Ok(()) => {
                req.ret = 0;
                Ok(())
            }
            Err(err) => {
                req.ret = 1;
                Err(err)
            }
        }
    }

    /// A request whose buffers do not match the geometry is the moral
    /// equivalent of an unknown opcode: reject it before touching the
    /// array.
    fn check_shape(&self, req: &FlashRequest) -> Result<()> {
        let kpages = self.geometry.kpages_per_page();
        let shaped = req.kp_stt.len() == kpages
            && req.lpas.len() == kpages
            && req.main.len() == kpages
            && req.oob.len() == self.geometry.page_oob_size
            && req.main.iter().all(|buf| buf.len() == HOST_PAGE_SIZE);
        if shaped {
            Ok(())
        } else {
            Err(Error::BadRequest)
        }
    }

    fn run_read(&self, req: &mut FlashRequest, want_oob: bool, partial: bool) -> Result<()> {
        let (unit, offset) = self.locate(&req.phys)?;
        let chip = self.chips[unit].lock().expect("backing region lock poisoned");
        let page = &chip[offset..offset + self.geometry.page_size()];
        page_engine::read_page(
            &self.geometry,
            page,
            req,
            want_oob,
            partial,
            self.shadow.as_ref(),
        );
        Ok(())
    }

    fn run_prog(&self, req: &mut FlashRequest, want_oob: bool) -> Result<()> {
        let (unit, offset) = self.locate(&req.phys)?;
        let mut chip = self.chips[unit].lock().expect("backing region lock poisoned");
        let page = &mut chip[offset..offset + self.geometry.page_size()];
        page_engine::prog_page(&self.geometry, page, req, want_oob, self.shadow.as_ref());
        Ok(())
    }

    /// Erase validates the address and leaves the array untouched: cells
    /// start erased and programs only land on DATA sub-pages, so a
    /// well-formed issuer never observes stale bytes. (Real flash would
    /// reset the block to 0xFF here.)
    fn run_erase(&self, req: &FlashRequest) -> Result<()> {
        self.geometry
            .addr_of_block(req.phys.channel, req.phys.chip, req.phys.block)?;
        Ok(())
    }

    fn locate(&self, phys: &PhysAddr) -> Result<(usize, usize)> {
        self.geometry
            .addr_of_page(phys.channel, phys.chip, phys.block, phys.page)?;
        Ok((
            phys.punit_id(&self.geometry),
            self.geometry.page_offset_in_chip(phys.block, phys.page),
        ))
    }

    fn target_latency_us(&self, req_type: ReqType) -> u64 {
        if self.geometry.device_type != DeviceType::RamdriveTiming {
            return 0;
        }
        let nominal = if req_type.is_write() {
            self.geometry.page_prog_time_us
        } else if req_type.is_read() {
            self.geometry.page_read_time_us
        } else if req_type == ReqType::GcErase {
            self.geometry.block_erase_time_us
        } else {
            0
        };
        // 10% headroom under the nominal time absorbs scheduling jitter
        nominal - nominal / 10
    }

    /// Hand every expired request to the completion callback. Runs outside
    /// the parallel-unit lock so callbacks may resubmit.
    pub(crate) fn scan_completions(&self) {
        for handle in self.punits.reap_due() {
            (self.on_complete)(handle);
        }
    }
}
