//! Block plan for the socket flow-control protocol.
//!
//! The stream is cut into blocks of [`BLOCK_UNITS`] size-units, each
//! acknowledged by the consumer, plus an unacknowledged remainder. Payloads of
//! at most one block are sent entirely as remainder.

use crate::error::TransportError;
use ipcbench_core::PayloadSize;
use std::ops::Range;

/// Size-units per acknowledged block.
pub const BLOCK_UNITS: u32 = 2;

/// Split of a payload into acknowledged blocks and a remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlan {
    blocks: u32,
    remainder_units: u32,
    total_messages: usize,
    remainder_messages: usize,
    block_messages: usize,
}

impl BlockPlan {
    /// Computes the plan for `payload`.
    #[must_use]
    pub fn for_payload(payload: PayloadSize) -> Self {
        let units = payload.units();
        let (blocks, remainder_units) = if units <= BLOCK_UNITS {
            (0, units)
        } else {
            (units / BLOCK_UNITS, units % BLOCK_UNITS)
        };
        Self::from_parts(payload, blocks, remainder_units)
    }

    fn from_parts(payload: PayloadSize, blocks: u32, remainder_units: u32) -> Self {
        let total_messages = payload.message_count();
        let remainder_messages = PayloadSize::messages_in_units(remainder_units);
        let block_messages = if blocks == 0 {
            0
        } else {
            (total_messages - remainder_messages) / blocks as usize
        };
        Self {
            blocks,
            remainder_units,
            total_messages,
            remainder_messages,
            block_messages,
        }
    }

    /// Rebuilds the plan from the two integers the consumer sent.
    ///
    /// # Errors
    /// Returns [`TransportError::Protocol`] for negative values or a plan that
    /// differs from the one derived from this side's own payload size.
    pub fn from_negotiation(
        payload: PayloadSize,
        blocks: i32,
        remainder_units: i32,
    ) -> Result<Self, TransportError> {
        let expected = Self::for_payload(payload);
        let (Ok(blocks), Ok(remainder_units)) =
            (u32::try_from(blocks), u32::try_from(remainder_units))
        else {
            return Err(TransportError::protocol(format!(
                "negative block plan: {blocks} blocks, {remainder_units} remainder units"
            )));
        };
        if blocks != expected.blocks || remainder_units != expected.remainder_units {
            return Err(TransportError::protocol(format!(
                "block plan {blocks}+{remainder_units} does not match payload {payload} \
                 (expected {}+{})",
                expected.blocks, expected.remainder_units
            )));
        }
        Ok(Self::from_parts(payload, blocks, remainder_units))
    }

    /// Number of acknowledged blocks.
    #[must_use]
    pub fn blocks(&self) -> u32 {
        self.blocks
    }

    /// Remainder in size-units.
    #[must_use]
    pub fn remainder_units(&self) -> u32 {
        self.remainder_units
    }

    /// Messages in the whole stream.
    #[must_use]
    pub fn total_messages(&self) -> usize {
        self.total_messages
    }

    /// Messages per block.
    #[must_use]
    pub fn block_messages(&self) -> usize {
        self.block_messages
    }

    /// Messages in the remainder.
    #[must_use]
    pub fn remainder_messages(&self) -> usize {
        self.remainder_messages
    }

    /// Index range of block `index` within the stream.
    #[must_use]
    pub fn block_range(&self, index: u32) -> Range<usize> {
        let start = index as usize * self.block_messages;
        start..start + self.block_messages
    }

    /// Index range of the remainder within the stream.
    #[must_use]
    pub fn remainder_range(&self) -> Range<usize> {
        let start = self.blocks as usize * self.block_messages;
        start..start + self.remainder_messages
    }

    /// True when the consumer closes the exchange with a zero acknowledgment.
    #[must_use]
    pub fn expects_final_ack(&self) -> bool {
        self.remainder_units == 0
    }
}
