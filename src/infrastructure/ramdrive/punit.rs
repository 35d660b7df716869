//! Parallel-unit registration table
//!
//! One slot per (channel, chip) pair. A slot holds at most one in-flight
//! request together with its submission stamp and simulated latency; the
//! completion scan detaches expired requests so that callbacks run with no
//! table lock held.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::domain::request::RequestHandle;
use crate::error::{Error, Result};

/// Time source used to stamp submissions and judge completion deadlines.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct InFlight {
    req: RequestHandle,
    submitted_at: Instant,
    target_latency_us: u64,
}

pub(super) struct PunitTable {
    slots: Mutex<Vec<Option<InFlight>>>,
    clock: Arc<dyn Clock>,
}

impl PunitTable {
    pub fn new(nr_punits: usize, clock: Arc<dyn Clock>) -> Self {
        let mut slots = Vec::with_capacity(nr_punits);
        slots.resize_with(nr_punits, || None);
        Self {
            slots: Mutex::new(slots),
            clock,
        }
    }

    /// Register `req` under `punit` with a completion deadline
    /// `target_latency_us` from now. A unit holds at most one request; a
    /// second registration means the issuer lost track of a completion.
    pub fn try_claim(
        &self,
        punit: usize,
        req: RequestHandle,
        target_latency_us: u64,
    ) -> Result<()> {
        let mut slots = self.slots.lock().expect("punit table lock poisoned");
        if punit >= slots.len() {
            return Err(Error::InvalidParameter(format!(
                "parallel unit {punit} out of range"
            )));
        }
        if slots[punit].is_some() {
            return Err(Error::DoubleIssue { punit });
        }
        slots[punit] = Some(InFlight {
            req,
            submitted_at: self.clock.now(),
            target_latency_us,
        });
        Ok(())
    }

    /// Detach and return every request whose simulated latency has elapsed.
    pub fn reap_due(&self) -> Vec<RequestHandle> {
        let now = self.clock.now();
        let mut due = Vec::new();
        let mut slots = self.slots.lock().expect("punit table lock poisoned");
        for slot in slots.iter_mut() {
            let expired = slot.as_ref().is_some_and(|inflight| {
                now.duration_since(inflight.submitted_at).as_micros() as u64
                    >= inflight.target_latency_us
            });
            if expired {
                if let Some(inflight) = slot.take() {
                    due.push(inflight.req);
                }
            }
        }
        due
    }

    /// Whether no request is registered anywhere
    pub fn is_idle(&self) -> bool {
        self.slots
            .lock()
            .expect("punit table lock poisoned")
            .iter()
            .all(|slot| slot.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::{DeviceType, NandGeometry};
    use crate::domain::request::{FlashRequest, PhysAddr, ReqType};
    use std::time::Duration;

    fn handle() -> RequestHandle {
        let geometry = NandGeometry {
            nr_channels: 1,
            nr_chips_per_channel: 1,
            nr_blocks_per_chip: 1,
            nr_pages_per_block: 1,
            nr_subpages_per_block: 1,
            page_main_size: 4096,
            page_oob_size: 0,
            page_prog_time_us: 0,
            page_read_time_us: 0,
            block_erase_time_us: 0,
            device_type: DeviceType::Ramdrive,
        };
        FlashRequest::new(ReqType::Read, PhysAddr::default(), &geometry).into_handle()
    }

    #[test]
    fn test_claim_then_reap_after_deadline() {
        let t0 = Instant::now();
        let mut clock = MockClock::new();
        // claim at t0, first scan 10us later, second scan past the deadline
        let mut times = vec![t0, t0 + Duration::from_micros(10), t0 + Duration::from_micros(60)]
            .into_iter();
        clock.expect_now().returning(move || times.next().unwrap());

        let table = PunitTable::new(2, Arc::new(clock));
        table.try_claim(1, handle(), 50).unwrap();
        assert!(!table.is_idle());

        assert!(table.reap_due().is_empty());
        let done = table.reap_due();
        assert_eq!(done.len(), 1);
        assert!(table.is_idle());
    }

    #[test]
    fn test_zero_latency_is_due_immediately() {
        let t0 = Instant::now();
        let mut clock = MockClock::new();
        clock.expect_now().returning(move || t0);

        let table = PunitTable::new(1, Arc::new(clock));
        table.try_claim(0, handle(), 0).unwrap();
        assert_eq!(table.reap_due().len(), 1);
    }

    #[test]
    fn test_double_claim_is_rejected() {
        let t0 = Instant::now();
        let mut clock = MockClock::new();
        clock.expect_now().returning(move || t0);

        let table = PunitTable::new(4, Arc::new(clock));
        table.try_claim(3, handle(), 1000).unwrap();
        let second = table.try_claim(3, handle(), 1000);
        assert!(matches!(second, Err(Error::DoubleIssue { punit: 3 })));
    }

    #[test]
    fn test_slot_is_reusable_after_reap() {
        let t0 = Instant::now();
        let mut clock = MockClock::new();
        let mut times =
            vec![t0, t0 + Duration::from_micros(2000), t0 + Duration::from_micros(2000)]
                .into_iter();
        clock.expect_now().returning(move || times.next().unwrap());

        let table = PunitTable::new(4, Arc::new(clock));
        table.try_claim(3, handle(), 1000).unwrap();
        assert_eq!(table.reap_due().len(), 1);
        table.try_claim(3, handle(), 1000).unwrap();
    }

    #[test]
    fn test_out_of_range_punit_is_rejected() {
        let mut clock = MockClock::new();
        clock.expect_now().never();
        let table = PunitTable::new(2, Arc::new(clock));
        assert!(matches!(
            table.try_claim(2, handle(), 0),
            Err(Error::InvalidParameter(_))
        ));
    }
}
