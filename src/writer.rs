//! Streams a [`Dump`] onto an unlocked card, block 0 through 63.

use crate::crc;
use crate::dump::{Block, Dump};
use crate::picc::{self, BLOCK_COUNT, PAYLOAD_FRAME_LEN, WRITE_FRAME_LEN};
use crate::sequencer::Unlocked;
use crate::transport::{FrameTransport, Transceiver};
use crate::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What to do once a frame of a block fails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FailurePolicy {
    /// Record the failure and carry on with the next frame. Nothing is
    /// retried.
    Continue,
    /// Stop at the first failure.
    Abort,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Continue
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    Command,
    Payload,
}

#[derive(Debug)]
pub struct BlockFailure {
    pub stage: Stage,
    pub error: Error,
}

#[derive(Debug)]
pub struct BlockOutcome {
    pub index: u8,
    pub failures: Vec<BlockFailure>,
}

impl BlockOutcome {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stop {
    /// Strict mode hit a failure on this block.
    Aborted { index: u8, stage: Stage },
    /// Cancelled before this block was started.
    Cancelled { next_index: u8 },
}

#[derive(Debug, Default)]
pub struct WriteReport {
    pub outcomes: Vec<BlockOutcome>,
    pub stop: Option<Stop>,
}

impl WriteReport {
    pub fn failed(&self) -> impl Iterator<Item = &BlockOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    /// Every block attempted, none failed.
    pub fn is_clean(&self) -> bool {
        self.stop.is_none()
            && self.outcomes.len() == BLOCK_COUNT
            && self.outcomes.iter().all(BlockOutcome::is_ok)
    }
}

/// `A0 <block> CRC CRC`.
pub fn write_command_frame(block: u8) -> [u8; WRITE_FRAME_LEN] {
    let payload = [picc::Command::MfWrite as u8, block];
    let crc = crc::compute_checksum(&payload);
    [payload[0], payload[1], crc[0], crc[1]]
}

/// 16 bytes to store in `block`. Trailers are rebuilt from their key A,
/// access bits and key B fields.
pub fn block_payload(dump: &Dump, block: u8) -> Block {
    match dump.trailer(block) {
        Some(trailer) => trailer.to_bytes(),
        None => *dump.block(block),
    }
}

/// Block payload followed by its CRC_A.
pub fn payload_frame(dump: &Dump, block: u8) -> [u8; PAYLOAD_FRAME_LEN] {
    let payload = block_payload(dump, block);
    let crc = crc::compute_checksum(&payload);
    let mut frame = [0u8; PAYLOAD_FRAME_LEN];
    frame[..payload.len()].copy_from_slice(&payload);
    frame[payload.len()..].copy_from_slice(&crc);
    frame
}

pub struct BlockWriter<'a> {
    dump: &'a Dump,
    policy: FailurePolicy,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> BlockWriter<'a> {
    pub fn new(dump: &'a Dump) -> Self {
        Self {
            dump,
            policy: FailurePolicy::default(),
            cancel: None,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Checked between blocks; a block that has started is always finished.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::SeqCst))
    }

    /// Writes blocks 0..=63 in ascending order. `_unlocked` is only obtainable
    /// from a successful backdoor detection.
    pub fn run<T: Transceiver>(
        &self,
        transport: &mut FrameTransport<T>,
        _unlocked: &Unlocked,
    ) -> WriteReport {
        let mut report = WriteReport::default();
        for index in 0..BLOCK_COUNT as u8 {
            if self.cancelled() {
                log::warn!("cancelled before block {}", index);
                report.stop = Some(Stop::Cancelled { next_index: index });
                break;
            }

            let mut outcome = BlockOutcome {
                index,
                failures: Vec::new(),
            };

            if let Err(error) = transport.send_bytes(&write_command_frame(index)) {
                log::warn!("block {}: WRITE command failed: {}", index, error);
                outcome.failures.push(BlockFailure {
                    stage: Stage::Command,
                    error,
                });
                if self.policy == FailurePolicy::Abort {
                    report.outcomes.push(outcome);
                    report.stop = Some(Stop::Aborted {
                        index,
                        stage: Stage::Command,
                    });
                    break;
                }
            }

            if let Err(error) = transport.send_bytes(&payload_frame(self.dump, index)) {
                log::warn!("block {}: payload failed: {}", index, error);
                outcome.failures.push(BlockFailure {
                    stage: Stage::Payload,
                    error,
                });
                if self.policy == FailurePolicy::Abort {
                    report.outcomes.push(outcome);
                    report.stop = Some(Stop::Aborted {
                        index,
                        stage: Stage::Payload,
                    });
                    break;
                }
            }

            report.outcomes.push(outcome);
        }
        report
    }
}
