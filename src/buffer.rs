//! Whole-buffer convenience encoder.
//!
//! Slices one application buffer into a single coding group and drives a
//! [`FecEncoder`] over it. Mostly useful for message-oriented senders and
//! for exercising encode/decode round trips.

use tracing::debug;

use crate::block::FecBlock;
use crate::encoder::FecEncoder;

/// Encodes one buffer per call, each as its own coding group.
#[derive(Debug)]
pub struct FecBufferEncoder {
    /// Largest payload a single data block may carry.
    max_block_size: u16,
    /// Parity shards per data shard, rounded up per group.
    fec_ratio: f32,
    /// Sequence number for the next group. Never 0.
    seq_num: u8,
}

impl FecBufferEncoder {
    pub fn new(max_block_size: u16, fec_ratio: f32) -> Self {
        Self {
            max_block_size,
            fec_ratio,
            seq_num: 1,
        }
    }

    /// Slice `buf` into one group and return every outgoing block, data
    /// blocks first.
    ///
    /// Shards are rebalanced to near-equal size so the final shard is at
    /// most one byte short of the others before padding. Returns an empty
    /// vector when the buffer would need more than 255 data shards.
    pub fn encode(&mut self, buf: &[u8]) -> Vec<FecBlock> {
        let len = buf.len();
        let max = usize::from(self.max_block_size);
        if max == 0 {
            return Vec::new();
        }
        let n_blocks = len.div_ceil(max).max(1);
        if n_blocks > 255 {
            return Vec::new();
        }
        let block_size = if n_blocks == 1 {
            len
        } else {
            len.div_ceil(n_blocks)
        };
        let n_fec = (((n_blocks as f32) * self.fec_ratio).ceil() as usize).min(255 - n_blocks);

        let mut enc = FecEncoder::new(
            n_blocks as u8,
            n_fec as u8,
            block_size as u16,
            self.seq_num,
        );
        self.seq_num = self.seq_num.wrapping_add(1);
        if self.seq_num == 0 {
            self.seq_num = 1;
        }

        let step = usize::from(enc.max_block_size());
        for i in 0..n_blocks {
            let start = i * step;
            let end = len.min(start + step);
            let mut block = enc.next_empty_block((end - start) as u16);
            block.data_mut().copy_from_slice(&buf[start..end]);
            enc.submit(block);
        }
        debug!(
            bytes = len,
            blocks = n_blocks,
            parity = n_fec,
            shard = block_size,
            "encoded buffer"
        );

        let mut out = Vec::with_capacity(n_blocks + n_fec);
        while let Some(block) = enc.take() {
            out.push(block);
        }
        out
    }
}
