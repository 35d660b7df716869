//! Shadow verifier
//!
//! A host-addressed mirror of everything programmed into the array, keyed
//! by logical page address. Programs are duplicated into it; reads are
//! compared against it. A mismatch means the issuing layer handed back the
//! wrong physical location for an lpa — it is reported with enough context
//! to reconstruct the fault, and the read proceeds untouched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use log::{error, warn};

use crate::domain::geometry::NandGeometry;
use crate::domain::request::{FlashRequest, HOST_PAGE_SIZE, LPA_NONE};

/// Bytes of the mismatch excerpt included in a corruption report
const REPORT_EXCERPT: usize = 16;

pub(super) struct ShadowStore {
    data: Mutex<Vec<u8>>,
    /// Bytes per logical page address: a whole flash page on page-mapped
    /// devices, one host page otherwise
    slot_size: usize,
    mismatches: AtomicU64,
}

impl ShadowStore {
    pub fn new(geometry: &NandGeometry) -> Self {
        let slot_size = if geometry.is_page_mapped() {
            geometry.page_main_size
        } else {
            HOST_PAGE_SIZE
        };
        // One host page per addressable lpa; both mappings total the main
        // area of the device.
        let size = geometry.pages_per_ssd() * geometry.page_main_size;
        Self {
            data: Mutex::new(vec![0xFF; size]),
            slot_size,
            mismatches: AtomicU64::new(0),
        }
    }

    /// Total number of read mismatches observed so far
    pub fn mismatch_count(&self) -> u64 {
        self.mismatches.load(Ordering::Relaxed)
    }

    /// Duplicate a just-programmed request into the mirror.
    pub fn mirror_program(&self, geometry: &NandGeometry, req: &FlashRequest) {
        let kpages = geometry.kpages_per_page();
        let mut data = self.data.lock().expect("shadow store lock poisoned");
        if geometry.is_page_mapped() {
            let lpa = req.oob_lpa(0);
            if is_lpa_none(lpa) {
                return;
            }
            let Some(base) = self.slot_range(&data, lpa, geometry.page_main_size) else {
                return;
            };
            for (idx, buf) in req.main.iter().enumerate().take(kpages) {
                let start = base + idx * HOST_PAGE_SIZE;
                data[start..start + HOST_PAGE_SIZE].copy_from_slice(buf);
            }
        } else {
            for idx in 0..kpages {
                let lpa = req.oob_lpa(idx);
                if is_lpa_none(lpa) || !req.kp_stt[idx].is_data() {
                    continue;
                }
                let Some(start) = self.slot_range(&data, lpa, HOST_PAGE_SIZE) else {
                    continue;
                };
                data[start..start + HOST_PAGE_SIZE].copy_from_slice(&req.main[idx]);
            }
        }
    }

    /// Compare the sub-pages a read just filled against the mirror.
    ///
    /// Skip rules match the read copy loop exactly: sub-pages the copy did
    /// not touch are not judged.
    pub fn check_read(&self, geometry: &NandGeometry, req: &FlashRequest, partial: bool) {
        let kpages = geometry.kpages_per_page();
        let page_mapped = geometry.is_page_mapped();
        let data = self.data.lock().expect("shadow store lock poisoned");
        for idx in 0..kpages {
            let lpa = if page_mapped {
                req.oob_lpa(0)
            } else {
                req.oob_lpa(idx)
            };
            if is_lpa_none(lpa) {
                continue;
            }
            if partial && req.kp_stt[idx].is_data() {
                continue;
            }
            if req.kp_stt[idx].is_done() {
                continue;
            }
            if !partial && !req.kp_stt[idx].is_data() {
                continue;
            }
            let expected = if page_mapped {
                let Some(base) = self.slot_range(&data, lpa, geometry.page_main_size) else {
                    continue;
                };
                let start = base + idx * HOST_PAGE_SIZE;
                &data[start..start + HOST_PAGE_SIZE]
            } else {
                let Some(start) = self.slot_range(&data, lpa, HOST_PAGE_SIZE) else {
                    continue;
                };
                &data[start..start + HOST_PAGE_SIZE]
            };
            let got = &req.main[idx];
            if let Some(pos) = got.iter().zip(expected).position(|(a, b)| a != b) {
                self.mismatches.fetch_add(1, Ordering::Relaxed);
                let end = (pos + REPORT_EXCERPT).min(HOST_PAGE_SIZE);
                error!(
                    "data corruption: lpa={} (0x{:x}) sub_page={} offset={} host={} flash={}",
                    lpa,
                    lpa,
                    idx,
                    pos,
                    hex::encode(&got[pos..end]),
                    hex::encode(&expected[pos..end]),
                );
            }
        }
    }

    /// Start offset of the slot for `lpa`, or `None` (with a warning) when
    /// the lpa falls outside the mirror
    fn slot_range(&self, data: &[u8], lpa: u64, len: usize) -> Option<usize> {
        let start = (lpa as usize).checked_mul(self.slot_size)?;
        if start + len > data.len() {
            warn!("lpa {} outside the shadow mirror, skipping check", lpa);
            return None;
        }
        Some(start)
    }
}

/// Both sentinel spellings appear in the wild: all-ones as unsigned, and
/// any negative value when the issuer treats the lpa as signed.
fn is_lpa_none(lpa: u64) -> bool {
    (lpa as i64) < 0 || lpa == LPA_NONE
}
