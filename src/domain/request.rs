//! Domain Model - Flash I/O Requests
//!
//! The request objects exchanged between an issuing layer (an FTL, or the
//! bundled memio client) and the RAM drive. A request is owned by its
//! issuer for its whole life; the drive only keeps an opaque handle while
//! the command is in flight and hands the same handle back through the
//! completion callback.

use std::sync::{Arc, Mutex};

use super::geometry::NandGeometry;

/// Size of the fixed host-side transfer unit, in bytes.
///
/// Upper layers deliver data in buffers of this size; a flash page holds
/// `page_main_size / HOST_PAGE_SIZE` of them.
pub const HOST_PAGE_SIZE: usize = 4096;

/// Sentinel stored in the OOB area for sub-pages that carry no data.
pub const LPA_NONE: u64 = u64::MAX;

/// Request classes understood by the drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqType {
    Read,
    Write,
    /// Partial read feeding a read-modify-write; sub-pages the issuer
    /// already holds fresh are left alone
    RmwRead,
    RmwWrite,
    GcRead,
    GcWrite,
    GcErase,
    MetaRead,
    MetaWrite,
    /// Accepted and completed without touching the array
    ReadDummy,
    Trim,
}

impl ReqType {
    /// Whether this request programs the flash array
    pub fn is_write(self) -> bool {
        matches!(
            self,
            ReqType::Write | ReqType::RmwWrite | ReqType::GcWrite | ReqType::MetaWrite
        )
    }

    /// Whether this request reads the flash array
    pub fn is_read(self) -> bool {
        matches!(
            self,
            ReqType::Read | ReqType::RmwRead | ReqType::GcRead | ReqType::MetaRead
        )
    }
}

/// Per-sub-page payload state, maintained by the issuing layer.
///
/// `DATA` marks a fresh payload that must reach (or come from) the array;
/// the `DONE` bit marks sub-pages already serviced at a higher layer and
/// may be OR'd onto another state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KpState(u8);

impl KpState {
    pub const HOLE: KpState = KpState(0x01);
    pub const DATA: KpState = KpState(0x02);
    pub const DONE: KpState = KpState(0x80);

    pub fn is_data(self) -> bool {
        self == KpState::DATA
    }

    pub fn is_done(self) -> bool {
        self.0 & KpState::DONE.0 != 0
    }

    /// This state with the `DONE` bit set on top
    pub fn done(self) -> KpState {
        KpState(self.0 | KpState::DONE.0)
    }
}

/// Physical flash location targeted by a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhysAddr {
    pub channel: usize,
    pub chip: usize,
    pub block: usize,
    pub page: usize,
}

impl PhysAddr {
    /// Flat index of the parallel unit this address belongs to
    pub fn punit_id(&self, geometry: &NandGeometry) -> usize {
        geometry.punit_id(self.channel, self.chip)
    }
}

/// One page-granular command for the drive.
#[derive(Debug)]
pub struct FlashRequest {
    pub req_type: ReqType,
    pub phys: PhysAddr,
    /// Logical page address of each sub-page, as known to the issuer
    pub lpas: Vec<u64>,
    /// Payload state of each sub-page
    pub kp_stt: Vec<KpState>,
    /// One host-page buffer per sub-page
    pub main: Vec<Vec<u8>>,
    /// Out-of-band area transferred alongside the main payload
    pub oob: Vec<u8>,
    /// Command status recorded by the drive: 0 on success, 1 on failure
    pub ret: u8,
    /// Slot index inside the memio request pool, if any
    pub tag: Option<usize>,
}

/// Shared handle under which a request travels through the drive.
pub type RequestHandle = Arc<Mutex<FlashRequest>>;

impl FlashRequest {
    /// Build an empty request shaped for `geometry`: every sub-page a hole,
    /// the OOB area erased.
    pub fn new(req_type: ReqType, phys: PhysAddr, geometry: &NandGeometry) -> Self {
        let kpages = geometry.kpages_per_page();
        Self {
            req_type,
            phys,
            lpas: vec![LPA_NONE; kpages],
            kp_stt: vec![KpState::HOLE; kpages],
            main: vec![vec![0u8; HOST_PAGE_SIZE]; kpages],
            oob: vec![0xFF; geometry.page_oob_size],
            ret: 0,
            tag: None,
        }
    }

    pub fn into_handle(self) -> RequestHandle {
        Arc::new(Mutex::new(self))
    }

    /// Record `lpa` for sub-page `idx`, both in the logical-address array
    /// and in the little-endian OOB slot the drive reads it back from.
    pub fn set_lpa(&mut self, idx: usize, lpa: u64) {
        self.lpas[idx] = lpa;
        let start = idx * 8;
        if start + 8 <= self.oob.len() {
            self.oob[start..start + 8].copy_from_slice(&lpa.to_le_bytes());
        }
    }

    /// Logical page address stored in the OOB slot of sub-page `idx`.
    /// Returns the sentinel when the OOB area has no room for the slot.
    pub fn oob_lpa(&self, idx: usize) -> u64 {
        let start = idx * 8;
        if start + 8 <= self.oob.len() {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&self.oob[start..start + 8]);
            u64::from_le_bytes(raw)
        } else {
            LPA_NONE
        }
    }
}
