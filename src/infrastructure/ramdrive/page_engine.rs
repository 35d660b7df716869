//! Page engine
//!
//! Sub-page-gated read and program against one page region of the backing
//! store. The gates encode the flash programming contract: only sub-pages
//! the issuer marks `DATA` carry a payload, and cells admit no rewrite
//! without an erase, so everything else is left exactly as it was.

use crate::domain::geometry::NandGeometry;
use crate::domain::request::{FlashRequest, HOST_PAGE_SIZE, LPA_NONE};

use super::shadow::ShadowStore;

/// Copy sub-pages of one flash page into the request's host buffers.
///
/// `page` is the full stored page, main area followed by OOB. With
/// `partial` set (read-modify-write), sub-pages the issuer already holds
/// fresh (`DATA`) are left alone and the OOB is not transferred.
pub(super) fn read_page(
    geometry: &NandGeometry,
    page: &[u8],
    req: &mut FlashRequest,
    want_oob: bool,
    partial: bool,
    shadow: Option<&ShadowStore>,
) {
    let kpages = geometry.kpages_per_page();
    for idx in 0..kpages {
        if partial && req.kp_stt[idx].is_data() {
            continue;
        }
        // part of the page may already have been read at the cache level
        if req.kp_stt[idx].is_done() {
            continue;
        }
        if shadow.is_some() && !partial && !req.kp_stt[idx].is_data() {
            continue;
        }
        let start = idx * HOST_PAGE_SIZE;
        req.main[idx].copy_from_slice(&page[start..start + HOST_PAGE_SIZE]);
    }

    if !partial && want_oob {
        let main = geometry.page_main_size;
        req.oob
            .copy_from_slice(&page[main..main + geometry.page_oob_size]);
    }

    if let Some(shadow) = shadow {
        shadow.check_read(geometry, req, partial);
    }
}

/// Program the request's host buffers into one flash page.
///
/// Only `DATA` sub-pages are persisted; on devices with per-sub-page
/// logical addressing a sub-page whose OOB lpa is a sentinel is skipped as
/// well. This is what lets the issuer fill a page a few sub-pages at a
/// time.
pub(super) fn prog_page(
    geometry: &NandGeometry,
    page: &mut [u8],
    req: &FlashRequest,
    want_oob: bool,
    shadow: Option<&ShadowStore>,
) {
    let kpages = geometry.kpages_per_page();
    let page_mapped = geometry.is_page_mapped();
    for idx in 0..kpages {
        if !page_mapped {
            let lpa = req.oob_lpa(idx);
            if (lpa as i64) < 0 || lpa == LPA_NONE {
                continue;
            }
        }
        if !req.kp_stt[idx].is_data() {
            continue;
        }
        let start = idx * HOST_PAGE_SIZE;
        page[start..start + HOST_PAGE_SIZE].copy_from_slice(&req.main[idx]);
    }

    if want_oob {
        let main = geometry.page_main_size;
        page[main..main + geometry.page_oob_size].copy_from_slice(&req.oob);
    }

    if let Some(shadow) = shadow {
        shadow.mirror_program(geometry, req);
    }
}
