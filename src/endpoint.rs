// CLASSIFICATION: COMMUNITY
// Filename: endpoint.rs v0.5
// Author: Lukas Bower
// Date Modified: 2026-07-23

//! Per-socket endpoint state: exclusive mailbox access and the sticky
//! failure latch.
//!
//! Each socket owns one mailbox, and the two hardware registers behind it
//! are a single shared resource. At most one exchange may be in flight per
//! endpoint; callers that cannot take the slot within the poll budget get
//! `Busy` without touching hardware. A timed-out exchange latches the
//! endpoint as failed for the life of the process, since a controller that
//! stopped answering is presumed wedged.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::error::SmpError;
use crate::mbox::{self, MailboxLayout, PollPolicy};
use crate::msg::{Message, MsgId};
use crate::port::RegisterPort;

/// Argument of the startup self-test; the controller answers with the
/// pattern plus one.
pub const SELF_TEST_PATTERN: u32 = 0xDEAD_BEEF;

/// Endpoint health. The only transition is Healthy -> Failed, taken when
/// an exchange times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Failed,
}

/// Bounded-wait exclusion slot. A plain mutex would block without bound;
/// the protocol wants lock acquisition to give up on the same budget the
/// exchange itself runs under.
struct ExchangeSlot {
    busy: Mutex<bool>,
    freed: Condvar,
}

struct SlotGuard<'a> {
    slot: &'a ExchangeSlot,
}

impl ExchangeSlot {
    fn new() -> Self {
        Self { busy: Mutex::new(false), freed: Condvar::new() }
    }

    fn lock_busy(&self) -> MutexGuard<'_, bool> {
        // The flag is restored by SlotGuard::drop, so a poisoned lock
        // still holds a consistent value.
        self.busy.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn acquire(&self, budget: Duration) -> Result<SlotGuard<'_>, SmpError> {
        let deadline = Instant::now() + budget;
        let mut busy = self.lock_busy();
        while *busy {
            let now = Instant::now();
            if now >= deadline {
                return Err(SmpError::Busy);
            }
            let (guard, _) = self
                .freed
                .wait_timeout(busy, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            busy = guard;
        }
        *busy = true;
        Ok(SlotGuard { slot: self })
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock_busy() = false;
        self.slot.freed.notify_one();
    }
}

/// One socket's mailbox endpoint. Created during discovery, lives until
/// shutdown.
pub struct Endpoint {
    socket_id: u16,
    port: Box<dyn RegisterPort>,
    layout: MailboxLayout,
    policy: PollPolicy,
    slot: ExchangeSlot,
    failed: AtomicBool,
}

impl Endpoint {
    pub fn new(
        socket_id: u16,
        port: Box<dyn RegisterPort>,
        layout: MailboxLayout,
        policy: PollPolicy,
    ) -> Self {
        Self {
            socket_id,
            port,
            layout,
            policy,
            slot: ExchangeSlot::new(),
            failed: AtomicBool::new(false),
        }
    }

    pub fn socket_id(&self) -> u16 {
        self.socket_id
    }

    pub fn health(&self) -> Health {
        if self.failed.load(Ordering::Acquire) {
            Health::Failed
        } else {
            Health::Healthy
        }
    }

    /// Run one serialized exchange on this endpoint.
    ///
    /// A failed endpoint answers `Timeout` immediately and never touches
    /// hardware again. The slot is released on every path; the failure
    /// latch is set before release when the exchange itself timed out.
    pub fn send(&self, msg: &mut Message) -> Result<(), SmpError> {
        if self.failed.load(Ordering::Acquire) {
            return Err(SmpError::Timeout);
        }

        let _guard = self.slot.acquire(self.policy.budget)?;
        let ret = mbox::exchange(self.port.as_ref(), &self.layout, &self.policy, msg);
        if matches!(ret, Err(SmpError::Timeout)) {
            warn!(
                "socket {}: mailbox wedged, endpoint taken out of service",
                self.socket_id
            );
            self.failed.store(true, Ordering::Release);
        }
        ret
    }

    /// Startup conformance check: the test message echoes its argument
    /// plus one. An endpoint that fails this is unusable.
    pub fn self_test(&self) -> Result<(), SmpError> {
        let mut msg = Message::with_arg(MsgId::Test, self.socket_id, SELF_TEST_PATTERN);
        self.send(&mut msg)?;
        let expect = SELF_TEST_PATTERN.wrapping_add(1);
        if msg.response[0] != expect {
            warn!(
                "socket {}: self test expected {:#010x}, got {:#010x}",
                self.socket_id, expect, msg.response[0]
            );
            return Err(SmpError::RequestFailed);
        }
        info!("socket {}: mailbox self test passed", self.socket_id);
        Ok(())
    }
}
