// CLASSIFICATION: COMMUNITY
// Filename: mbox.rs v0.6
// Author: Lukas Bower
// Date Modified: 2026-07-21

//! Mailbox protocol engine.
//!
//! One exchange is a synchronous command/response cycle against a single
//! endpoint: clear the status register, post the argument words, write the
//! message id to trigger the controller, poll the status register under a
//! two-phase backoff until it leaves the not-ready sentinel or the budget
//! runs out, classify the terminal status, and on success drain the
//! response words. The engine is terminal on the first failing step.

use std::time::{Duration, Instant};

use log::{debug, error};

use crate::error::SmpError;
use crate::msg::Message;
use crate::port::RegisterPort;

/// Status register sentinel: the controller has not responded yet.
pub const STATUS_NOT_READY: u32 = 0x00;
/// Status register value: request completed successfully.
pub const STATUS_OK: u32 = 0x01;
/// Status register value: message id not supported.
pub const STATUS_INVALID_MSG: u32 = 0xFE;
/// Status register value: message accepted, input or operation rejected.
pub const STATUS_INVALID_INPUT: u32 = 0xFF;

/// Base of the mailbox window within the controller register space.
pub const MBOX_BASE: u32 = 0x03B0_0000;
/// Message-id register offset from the base.
pub const MBOX_MSG_ID_OFF: u32 = 0x0001_0534;
/// Message-id register offset on second-generation parts, which relocate
/// the register within the same window.
pub const MBOX_MSG_ID_OFF_GEN2: u32 = 0x0001_0934;
/// Status register offset from the base.
pub const MBOX_STATUS_OFF: u32 = 0x0001_0980;
/// First data register offset from the base; argument and response words
/// occupy successive 32-bit slots.
pub const MBOX_DATA_OFF: u32 = 0x0001_09E0;

/// Hardware generation of an endpoint. Generations relocate the
/// message-id register and answer on different budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Generation {
    #[default]
    Gen1,
    Gen2,
}

/// Resolved addresses of the three logical mailbox registers.
#[derive(Debug, Clone, Copy)]
pub struct MailboxLayout {
    pub msg_id: u32,
    pub status: u32,
    pub data: u32,
}

impl MailboxLayout {
    pub fn for_generation(gen: Generation) -> Self {
        let msg_id_off = match gen {
            Generation::Gen1 => MBOX_MSG_ID_OFF,
            Generation::Gen2 => MBOX_MSG_ID_OFF_GEN2,
        };
        Self {
            msg_id: MBOX_BASE + msg_id_off,
            status: MBOX_BASE + MBOX_STATUS_OFF,
            data: MBOX_BASE + MBOX_DATA_OFF,
        }
    }
}

/// Poll backoff policy for one exchange.
///
/// The controller usually answers within tens of microseconds to a couple
/// of milliseconds, so the engine busy-polls on a fine interval for a
/// short window and then falls back to a coarse interval for the rest of
/// the budget.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Elapsed time under which the fine interval applies.
    pub short_window: Duration,
    /// Poll interval inside the short window.
    pub short_interval: Duration,
    /// Poll interval after the short window.
    pub long_interval: Duration,
    /// Total time allowed for the status register to leave not-ready.
    pub budget: Duration,
}

impl PollPolicy {
    /// Default policy for a hardware generation, honoring a configured
    /// budget override.
    pub fn for_generation(gen: Generation) -> Self {
        let default_budget = match gen {
            Generation::Gen1 => Duration::from_millis(100),
            Generation::Gen2 => Duration::from_millis(500),
        };
        let budget = crate::config::get_config()
            .ok()
            .and_then(|c| c.poll_budget_ms)
            .map(Duration::from_millis)
            .unwrap_or(default_budget);
        Self {
            short_window: Duration::from_millis(1),
            short_interval: Duration::from_micros(50),
            long_interval: Duration::from_millis(1),
            budget,
        }
    }
}

/// Run one command/response cycle. On success the requested number of
/// response words is populated in `msg.response`; on any error the
/// response is untouched and no partial data is surfaced.
pub fn exchange(
    port: &dyn RegisterPort,
    layout: &MailboxLayout,
    policy: &PollPolicy,
    msg: &mut Message,
) -> Result<(), SmpError> {
    // Clear the status register so a stale response cannot be mistaken
    // for this exchange's completion.
    port.write(layout.status, STATUS_NOT_READY)?;

    for i in 0..msg.num_args as usize {
        port.write(layout.data + 4 * i as u32, msg.args[i])?;
    }

    // Writing the message id is what starts the controller working.
    port.write(layout.msg_id, msg.msg_id)?;

    let start = Instant::now();
    let mut status;
    loop {
        status = port.read(layout.status)?;
        if status != STATUS_NOT_READY {
            break;
        }
        let elapsed = start.elapsed();
        if elapsed >= policy.budget {
            break;
        }
        if elapsed < policy.short_window {
            std::thread::sleep(policy.short_interval);
        } else {
            std::thread::sleep(policy.long_interval);
        }
    }

    match status {
        STATUS_NOT_READY => {
            debug!(
                "message {} timed out after {:?}",
                msg.msg_id, policy.budget
            );
            return Err(SmpError::Timeout);
        }
        STATUS_OK => {}
        STATUS_INVALID_MSG => return Err(SmpError::InvalidCommand),
        STATUS_INVALID_INPUT => return Err(SmpError::RequestFailed),
        other => {
            error!("message {} unknown failure, status {:#x}", msg.msg_id, other);
            return Err(SmpError::UnknownFailure(other));
        }
    }

    // Stage the drain so a failed read cannot leave a half-written
    // response in the caller's buffer.
    let n = msg.response_sz as usize;
    let mut words = [0u32; crate::msg::MAX_MSG_WORDS];
    for (i, word) in words.iter_mut().enumerate().take(n) {
        *word = port.read(layout.data + 4 * i as u32)?;
    }
    msg.response[..n].copy_from_slice(&words[..n]);

    Ok(())
}
