//! Timing drivers
//!
//! Decides on which context, and when, the per-unit completion scan runs:
//! inline on the submitter, on a deferred worker thread, or from a
//! free-running periodic tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::trace;

use crate::domain::geometry::DeviceType;
use crate::error::Result;

use super::DriveInner;

/// Interval of the periodic completion tick. Short enough to sit well
/// under nominal NAND read service times.
const TICK_INTERVAL: Duration = Duration::from_micros(5);

pub(super) enum TimingDriver {
    /// Scan runs inline, immediately after every submit
    Inline,
    /// Scan runs on a worker thread, kicked once per submit
    Deferred(DeferredWorker),
    /// Scan runs on every tick of a timer thread
    Periodic(PeriodicTicker),
}

impl TimingDriver {
    pub fn start(inner: &Arc<DriveInner>) -> Result<Self> {
        Ok(match inner.geometry.device_type {
            DeviceType::Ramdrive | DeviceType::UserRamdrive => TimingDriver::Inline,
            DeviceType::RamdriveIntr => {
                TimingDriver::Deferred(DeferredWorker::spawn(Arc::clone(inner))?)
            }
            DeviceType::RamdriveTiming => {
                TimingDriver::Periodic(PeriodicTicker::spawn(Arc::clone(inner))?)
            }
        })
    }

    /// Called after a request has been registered under its parallel unit.
    pub fn arm(&self, inner: &DriveInner) {
        match self {
            TimingDriver::Inline => inner.scan_completions(),
            TimingDriver::Deferred(worker) => worker.kick(),
            // the tick drives completion on its own
            TimingDriver::Periodic(_) => {}
        }
    }

    pub fn shutdown(&mut self) {
        match self {
            TimingDriver::Inline => {}
            TimingDriver::Deferred(worker) => worker.shutdown(),
            TimingDriver::Periodic(ticker) => ticker.shutdown(),
        }
    }
}

struct WorkerState {
    pending: Mutex<Pending>,
    wakeup: Condvar,
}

struct Pending {
    kicks: u64,
    shutdown: bool,
}

/// Completion worker for interrupt-style operation: submits enqueue a
/// kick, the worker scans once per batch of kicks. The counter makes
/// wakeups between scans impossible to miss.
pub(super) struct DeferredWorker {
    state: Arc<WorkerState>,
    handle: Option<JoinHandle<()>>,
}

impl DeferredWorker {
    fn spawn(inner: Arc<DriveInner>) -> Result<Self> {
        let state = Arc::new(WorkerState {
            pending: Mutex::new(Pending {
                kicks: 0,
                shutdown: false,
            }),
            wakeup: Condvar::new(),
        });
        let thread_state = Arc::clone(&state);
        let handle = thread::Builder::new()
            .name("ramssd-intr".to_string())
            .spawn(move || loop {
                {
                    let mut pending = thread_state
                        .pending
                        .lock()
                        .expect("completion worker lock poisoned");
                    while pending.kicks == 0 && !pending.shutdown {
                        pending = thread_state
                            .wakeup
                            .wait(pending)
                            .expect("completion worker lock poisoned");
                    }
                    if pending.kicks == 0 {
                        return;
                    }
                    trace!("completion worker: draining {} kicks", pending.kicks);
                    pending.kicks = 0;
                }
                inner.scan_completions();
            })?;
        Ok(Self {
            state,
            handle: Some(handle),
        })
    }

    fn kick(&self) {
        let mut pending = self
            .state
            .pending
            .lock()
            .expect("completion worker lock poisoned");
        pending.kicks += 1;
        self.state.wakeup.notify_one();
    }

    fn shutdown(&mut self) {
        {
            let mut pending = self
                .state
                .pending
                .lock()
                .expect("completion worker lock poisoned");
            pending.shutdown = true;
        }
        self.state.wakeup.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Free-running tick for timing emulation: every interval, scan for units
/// whose simulated latency has elapsed.
pub(super) struct PeriodicTicker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTicker {
    fn spawn(inner: Arc<DriveInner>) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("ramssd-tick".to_string())
            .spawn(move || {
                while !thread_stop.load(Ordering::Relaxed) {
                    inner.scan_completions();
                    thread::sleep(TICK_INTERVAL);
                }
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
