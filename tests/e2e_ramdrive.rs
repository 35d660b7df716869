use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use ramssd_rs::application::MemIo;
use ramssd_rs::domain::{
    DeviceType, FlashRequest, KpState, NandGeometry, PhysAddr, ReqType, RequestHandle,
    HOST_PAGE_SIZE,
};
use ramssd_rs::infrastructure::ramdrive::{DriveOptions, RamDrive};
use ramssd_rs::Error;

/// Collects completion callbacks so tests can block on them.
struct CompletionLog {
    completed: Mutex<Vec<RequestHandle>>,
    cv: Condvar,
}

impl CompletionLog {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            completed: Mutex::new(Vec::new()),
            cv: Condvar::new(),
        })
    }

    fn hook(log: &Arc<Self>) -> impl Fn(RequestHandle) + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |handle| {
            log.completed.lock().unwrap().push(handle);
            log.cv.notify_all();
        }
    }

    /// Wait until at least `count` completions arrived; returns how many
    /// actually did within the timeout.
    fn wait_for(&self, count: usize, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut completed = self.completed.lock().unwrap();
        while completed.len() < count {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = self.cv.wait_timeout(completed, deadline - now).unwrap();
            completed = guard;
        }
        completed.len()
    }
}

/// 2 channels x 2 chips x 2 blocks x 4 pages of 4 KiB + 128 B OOB
fn small_geometry(device_type: DeviceType) -> NandGeometry {
    NandGeometry {
        nr_channels: 2,
        nr_chips_per_channel: 2,
        nr_blocks_per_chip: 2,
        nr_pages_per_block: 4,
        nr_subpages_per_block: 4,
        page_main_size: 4096,
        page_oob_size: 128,
        page_prog_time_us: 500,
        page_read_time_us: 50,
        block_erase_time_us: 3000,
        device_type,
    }
}

fn checked_drive(geometry: NandGeometry) -> (RamDrive, Arc<CompletionLog>) {
    let log = CompletionLog::new();
    let drive = RamDrive::with_options(
        geometry,
        DriveOptions { data_check: true },
        CompletionLog::hook(&log),
    )
    .unwrap();
    (drive, log)
}

#[test]
fn test_erased_read_returns_all_ones() {
    let geometry = small_geometry(DeviceType::Ramdrive);
    let (drive, log) = checked_drive(geometry.clone());

    let mut req = FlashRequest::new(ReqType::Read, PhysAddr::default(), &geometry);
    req.kp_stt[0] = KpState::DATA;
    req.main[0].fill(0);
    req.oob.fill(0);
    let handle = req.into_handle();
    drive.submit(Arc::clone(&handle)).unwrap();

    assert_eq!(log.wait_for(1, Duration::from_secs(1)), 1);
    let req = handle.lock().unwrap();
    assert_eq!(req.ret, 0);
    assert!(req.main[0].iter().all(|&b| b == 0xFF));
    assert!(req.oob.iter().all(|&b| b == 0xFF));
    assert_eq!(drive.corruption_events(), 0);
}

#[test]
fn test_program_then_read_back() {
    let geometry = small_geometry(DeviceType::Ramdrive);
    let (drive, log) = checked_drive(geometry.clone());
    let phys = PhysAddr {
        channel: 1,
        chip: 0,
        block: 1,
        page: 2,
    };

    let mut write = FlashRequest::new(ReqType::Write, phys, &geometry);
    write.kp_stt[0] = KpState::DATA;
    write.main[0].fill(0x42);
    write.set_lpa(0, 7);
    drive.submit(write.into_handle()).unwrap();

    let mut read = FlashRequest::new(ReqType::Read, phys, &geometry);
    read.kp_stt[0] = KpState::DATA;
    let handle = read.into_handle();
    drive.submit(Arc::clone(&handle)).unwrap();

    assert_eq!(log.wait_for(2, Duration::from_secs(1)), 2);
    let read = handle.lock().unwrap();
    assert_eq!(read.ret, 0);
    assert!(read.main[0].iter().all(|&b| b == 0x42));
    assert_eq!(read.oob_lpa(0), 7);
    assert_eq!(drive.corruption_events(), 0);
}

#[test]
fn test_subpage_gating_preserves_holes() {
    let mut geometry = small_geometry(DeviceType::Ramdrive);
    geometry.page_main_size = 8192; // two host pages per flash page
    let log = CompletionLog::new();
    let drive = RamDrive::with_options(
        geometry.clone(),
        DriveOptions { data_check: false },
        CompletionLog::hook(&log),
    )
    .unwrap();

    let mut write = FlashRequest::new(ReqType::Write, PhysAddr::default(), &geometry);
    write.kp_stt = vec![KpState::DATA, KpState::HOLE];
    write.main[0].fill(0x11);
    write.main[1].fill(0x22);
    write.set_lpa(0, 0);
    drive.submit(write.into_handle()).unwrap();

    let mut read = FlashRequest::new(ReqType::Read, PhysAddr::default(), &geometry);
    read.kp_stt = vec![KpState::DATA, KpState::DATA];
    let handle = read.into_handle();
    drive.submit(Arc::clone(&handle)).unwrap();

    assert_eq!(log.wait_for(2, Duration::from_secs(1)), 2);
    let read = handle.lock().unwrap();
    assert!(read.main[0].iter().all(|&b| b == 0x11));
    // the hole sub-page was never programmed
    assert!(read.main[1].iter().all(|&b| b == 0xFF));
}

#[test]
fn test_double_issue_to_busy_unit() {
    // In timing mode the first command keeps its unit busy for the
    // simulated latency, so a back-to-back second issue must be rejected.
    let mut geometry = small_geometry(DeviceType::RamdriveTiming);
    geometry.page_prog_time_us = 20_000;
    let (drive, log) = checked_drive(geometry.clone());
    let phys = PhysAddr {
        channel: 1,
        chip: 1,
        block: 0,
        page: 0,
    };

    let mut write = FlashRequest::new(ReqType::Write, phys, &geometry);
    write.kp_stt[0] = KpState::DATA;
    write.set_lpa(0, 3);
    drive.submit(write.into_handle()).unwrap();

    let mut read = FlashRequest::new(ReqType::Read, phys, &geometry);
    read.kp_stt[0] = KpState::DATA;
    let err = drive.submit(read.into_handle()).unwrap_err();
    assert!(matches!(err, Error::DoubleIssue { punit: 3 }));

    // drain before dropping the drive
    assert_eq!(log.wait_for(1, Duration::from_secs(5)), 1);
}

#[test]
fn test_timing_mode_latency_floor() {
    let geometry = small_geometry(DeviceType::RamdriveTiming);
    let (drive, log) = checked_drive(geometry.clone());

    let mut read = FlashRequest::new(ReqType::Read, PhysAddr::default(), &geometry);
    read.kp_stt[0] = KpState::DATA;
    let started = Instant::now();
    drive.submit(read.into_handle()).unwrap();
    assert_eq!(log.wait_for(1, Duration::from_secs(5)), 1);

    // page_read_time_us = 50, minus the 10% headroom
    assert!(started.elapsed() >= Duration::from_micros(45));
}

#[test]
fn test_intr_mode_completes_off_thread() {
    let geometry = small_geometry(DeviceType::RamdriveIntr);
    let (drive, log) = checked_drive(geometry.clone());

    for page in 0..4 {
        let phys = PhysAddr {
            channel: 0,
            chip: 1,
            block: 0,
            page,
        };
        let mut write = FlashRequest::new(ReqType::Write, phys, &geometry);
        write.kp_stt[0] = KpState::DATA;
        write.main[0].fill(page as u8);
        write.set_lpa(0, page as u64);
        drive.submit(write.into_handle()).unwrap();
        // one unit: each command must have completed before the next
        assert_eq!(log.wait_for(page + 1, Duration::from_secs(1)), page + 1);
    }
    assert!(drive.is_idle());
    assert_eq!(drive.corruption_events(), 0);
}

#[test]
fn test_snapshot_roundtrip_over_memio() {
    let geometry = NandGeometry {
        nr_channels: 2,
        nr_chips_per_channel: 2,
        nr_blocks_per_chip: 8,
        nr_pages_per_block: 8,
        nr_subpages_per_block: 8,
        page_main_size: 4096,
        page_oob_size: 64,
        page_prog_time_us: 500,
        page_read_time_us: 50,
        block_erase_time_us: 3000,
        device_type: DeviceType::Ramdrive,
    };
    let snapshot = tempfile::NamedTempFile::new().unwrap();
    let pages = 100u64;

    // seed 100 pseudo-random pages and store the medium
    let mut mio = MemIo::open(geometry.clone()).unwrap();
    let io_size = mio.io_size();
    let mut expected = Vec::new();
    for lba in 0..pages {
        let page: Vec<u8> = (0..io_size)
            .map(|i| (lba as usize * 31 + i * 7) as u8)
            .collect();
        mio.write(lba, &page).unwrap();
        expected.push(page);
    }
    mio.wait();
    mio.drive().save(snapshot.path()).unwrap();
    mio.close();

    // restore into a fresh drive and verify every page
    let mut restored =
        MemIo::with_options(geometry.clone(), DriveOptions { data_check: false }).unwrap();
    restored.drive().load(snapshot.path()).unwrap();
    let mut buf = vec![0u8; io_size];
    for lba in 0..pages {
        restored.read(lba, &mut buf).unwrap();
        assert_eq!(buf, expected[lba as usize], "page {} differs", lba);
    }
    restored.close();

    assert_eq!(
        std::fs::metadata(snapshot.path()).unwrap().len(),
        geometry.ssd_size() as u64
    );
}

#[test]
fn test_memio_bulk_io_in_intr_mode() {
    let geometry = NandGeometry {
        nr_channels: 2,
        nr_chips_per_channel: 2,
        nr_blocks_per_chip: 4,
        nr_pages_per_block: 4,
        nr_subpages_per_block: 4,
        page_main_size: 8192,
        page_oob_size: 64,
        page_prog_time_us: 500,
        page_read_time_us: 50,
        block_erase_time_us: 3000,
        device_type: DeviceType::RamdriveIntr,
    };
    let mut mio =
        MemIo::with_options(geometry, DriveOptions { data_check: true }).unwrap();

    let bytes = 16 * mio.io_size();
    let data: Vec<u8> = (0..bytes).map(|i| (i / 3) as u8).collect();
    assert_eq!(mio.write(0, &data).unwrap(), bytes);
    mio.wait();

    let mut back = vec![0u8; bytes];
    assert_eq!(mio.read(0, &mut back).unwrap(), bytes);
    assert_eq!(back, data);
    assert_eq!(mio.drive().corruption_events(), 0);
    mio.close();
}

#[test]
fn test_trim_issues_per_unit_erases() {
    // capacity covers exactly one trim segment (2^14 LBAs)
    let geometry = NandGeometry {
        nr_channels: 2,
        nr_chips_per_channel: 2,
        nr_blocks_per_chip: 128,
        nr_pages_per_block: 32,
        nr_subpages_per_block: 32,
        page_main_size: 4096,
        page_oob_size: 64,
        page_prog_time_us: 500,
        page_read_time_us: 50,
        block_erase_time_us: 3000,
        device_type: DeviceType::Ramdrive,
    };
    let mut mio = MemIo::with_options(geometry, DriveOptions { data_check: false }).unwrap();
    let segment = (1u64 << 14) * mio.io_size() as u64;

    let sent = mio.trim(0, segment).unwrap();
    assert_eq!(sent, segment);
    mio.wait();

    // misaligned trims are rejected
    assert!(matches!(
        mio.trim(1, segment),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        mio.trim(0, segment - 1),
        Err(Error::InvalidParameter(_))
    ));
    mio.close();
}

#[test]
fn test_rmw_read_merges_with_cached_subpages() {
    let mut geometry = small_geometry(DeviceType::Ramdrive);
    geometry.page_main_size = 8192;
    let (drive, log) = checked_drive(geometry.clone());

    let mut write = FlashRequest::new(ReqType::Write, PhysAddr::default(), &geometry);
    write.kp_stt = vec![KpState::DATA, KpState::DATA];
    write.main[0].fill(0xA0);
    write.main[1].fill(0xB0);
    write.set_lpa(0, 4);
    drive.submit(write.into_handle()).unwrap();

    // the issuer holds sub-page 0 fresh; only sub-page 1 comes from flash
    let mut rmw = FlashRequest::new(ReqType::RmwRead, PhysAddr::default(), &geometry);
    rmw.kp_stt = vec![KpState::DATA, KpState::HOLE];
    rmw.main[0].fill(0xC0);
    rmw.set_lpa(0, 4);
    let handle = rmw.into_handle();
    drive.submit(Arc::clone(&handle)).unwrap();

    assert_eq!(log.wait_for(2, Duration::from_secs(1)), 2);
    let rmw = handle.lock().unwrap();
    assert!(rmw.main[0].iter().all(|&b| b == 0xC0));
    assert!(rmw.main[1].iter().all(|&b| b == 0xB0));
    assert_eq!(drive.corruption_events(), 0);
}

#[test]
fn test_unaligned_page_size_fails_construction() {
    // geometry that does not divide into host pages must not construct
    let mut geometry = small_geometry(DeviceType::Ramdrive);
    geometry.page_main_size = HOST_PAGE_SIZE + 512;
    let err = RamDrive::create(geometry, |_| {}).unwrap_err();
    assert!(matches!(err, Error::GeometryMismatch { .. }));
}
