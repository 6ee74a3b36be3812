//! Streaming group encoder.
//!
//! Data blocks are submitted one at a time. When a group of `n_blocks`
//! is complete (or on [`flush`](FecEncoder::flush)), the encoder computes
//! parity and queues the whole group for transmission: data blocks in
//! position order, then parity blocks in position order.

use std::collections::VecDeque;

use tracing::debug;

use crate::block::{FecBlock, FecHeader};
use crate::coder;

/// Streaming encoder for one outgoing flow.
///
/// Single-threaded; every operation runs to completion. Callers drain
/// the output queue with [`take`](FecEncoder::take).
#[derive(Debug)]
pub struct FecEncoder {
    /// Data shards per group (`k`).
    n_blocks: u8,
    /// Parity shards per group (`m`).
    n_fec_blocks: u8,
    /// Largest payload a single data block may carry.
    max_block_size: u16,
    /// Sequence number stamped on the in-flight group. Never 0.
    seq_num: u8,
    /// Data blocks of the in-flight group.
    in_blocks: Vec<FecBlock>,
    /// Encoded blocks awaiting transmission.
    out_blocks: VecDeque<FecBlock>,
}

impl FecEncoder {
    /// Create an encoder for `(n_blocks, n_fec_blocks)` groups.
    ///
    /// A `start_seq` of 0 is promoted to 1; 0 is reserved on the wire as
    /// "never used".
    pub fn new(n_blocks: u8, n_fec_blocks: u8, max_block_size: u16, start_seq: u8) -> Self {
        Self {
            n_blocks,
            n_fec_blocks,
            max_block_size,
            seq_num: if start_seq == 0 { 1 } else { start_seq },
            in_blocks: Vec::with_capacity(n_blocks as usize),
            out_blocks: VecDeque::new(),
        }
    }

    /// Largest payload a single data block may carry.
    pub fn max_block_size(&self) -> u16 {
        self.max_block_size
    }

    /// Sequence number the in-flight group carries.
    pub fn seq_num(&self) -> u8 {
        self.seq_num
    }

    /// Allocate the next data block, sized for `length` payload bytes and
    /// pre-stamped with the current sequence and in-group position.
    pub fn next_empty_block(&self, length: u16) -> FecBlock {
        FecBlock::new(
            FecHeader {
                seq_num: self.seq_num,
                block: self.in_blocks.len() as u8,
                n_blocks: self.n_blocks,
                n_fec_blocks: self.n_fec_blocks,
            },
            length,
        )
    }

    /// Add a data block to the in-flight group.
    ///
    /// The block's position is restamped to the submission order. When
    /// the group reaches `n_blocks` members, parity is computed and the
    /// group moves to the output queue. With `n_blocks == 0` or
    /// `n_fec_blocks == 0` coding is bypassed: the block goes straight to
    /// the output and the sequence advances per block.
    pub fn submit(&mut self, mut block: FecBlock) {
        block.set_block(self.in_blocks.len() as u8);

        if self.n_blocks == 0 || self.n_fec_blocks == 0 {
            self.out_blocks.push_back(block);
            self.advance_seq();
            return;
        }

        self.in_blocks.push(block);
        if self.in_blocks.len() == self.n_blocks as usize {
            self.encode_group();
        }
    }

    /// Complete the in-flight group even if it is short.
    ///
    /// The emitted headers carry the actual group size, so a partial
    /// group decodes like any other. A no-op when the group is empty.
    pub fn flush(&mut self) {
        self.encode_group();
    }

    /// Dequeue the next block to transmit.
    pub fn take(&mut self) -> Option<FecBlock> {
        self.out_blocks.pop_front()
    }

    fn advance_seq(&mut self) {
        self.seq_num = self.seq_num.wrapping_add(1);
        if self.seq_num == 0 {
            self.seq_num = 1;
        }
    }

    fn encode_group(&mut self) {
        let group = self.in_blocks.len();
        if group == 0 {
            return;
        }

        // The group's shard size is set by its largest data block; short
        // shards are zero-extended to match.
        let coded_len = self
            .in_blocks
            .iter()
            .map(|b| b.payload_len() as usize + 2)
            .max()
            .unwrap_or(2);
        for b in self.in_blocks.iter_mut() {
            b.set_n_blocks(group as u8);
            b.grow_coded(coded_len);
        }

        let mut parity: Vec<FecBlock> = (0..self.n_fec_blocks as usize)
            .map(|i| {
                FecBlock::new(
                    FecHeader {
                        seq_num: self.seq_num,
                        block: (group + i) as u8,
                        n_blocks: group as u8,
                        n_fec_blocks: self.n_fec_blocks,
                    },
                    (coded_len - 2) as u16,
                )
            })
            .collect();

        {
            let data_refs: Vec<&[u8]> = self.in_blocks.iter().map(|b| b.coded()).collect();
            let mut parity_refs: Vec<&mut [u8]> =
                parity.iter_mut().map(|b| b.coded_mut()).collect();
            if let Err(error) = coder::encode(&data_refs, &mut parity_refs) {
                debug!(group, %error, "parity computation rejected, emitting data only");
                parity.clear();
            }
        }

        self.out_blocks.extend(self.in_blocks.drain(..));
        self.out_blocks.extend(parity);
        self.advance_seq();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submit_filled(enc: &mut FecEncoder, len: u16, fill: u8) {
        let mut blk = enc.next_empty_block(len);
        blk.data_mut().fill(fill);
        enc.submit(blk);
    }

    #[test]
    fn test_group_emits_data_then_parity_in_order() {
        let mut enc = FecEncoder::new(4, 2, 64, 1);
        for i in 0..4 {
            submit_filled(&mut enc, 64, i);
        }

        let out: Vec<FecBlock> = std::iter::from_fn(|| enc.take()).collect();
        assert_eq!(out.len(), 6);
        for (i, blk) in out.iter().enumerate() {
            let h = blk.header();
            assert_eq!(h.block as usize, i);
            assert_eq!(h.seq_num, 1);
            assert_eq!(h.n_blocks, 4);
            assert_eq!(h.n_fec_blocks, 2);
            assert_eq!(blk.is_data(), i < 4);
        }
        assert_eq!(enc.seq_num(), 2);
    }

    #[test]
    fn test_systematic_data_passes_through() {
        let mut enc = FecEncoder::new(2, 1, 16, 9);
        let mut a = enc.next_empty_block(16);
        a.data_mut().copy_from_slice(&[0x11; 16]);
        enc.submit(a);
        let mut b = enc.next_empty_block(16);
        b.data_mut().copy_from_slice(&[0x22; 16]);
        enc.submit(b);

        let first = enc.take().unwrap();
        let second = enc.take().unwrap();
        assert_eq!(first.data(), &[0x11; 16]);
        assert_eq!(second.data(), &[0x22; 16]);
    }

    #[test]
    fn test_short_group_shards_share_one_size() {
        let mut enc = FecEncoder::new(3, 1, 100, 1);
        submit_filled(&mut enc, 100, 1);
        submit_filled(&mut enc, 100, 2);
        submit_filled(&mut enc, 40, 3);

        let out: Vec<FecBlock> = std::iter::from_fn(|| enc.take()).collect();
        assert_eq!(out.len(), 4);
        for blk in &out {
            assert_eq!(blk.coded_len(), 102);
        }
        // The short block keeps its true length and its pad stays zero.
        assert_eq!(out[2].payload_len(), 40);
        assert!(out[2].coded()[42..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_flush_emits_partial_group() {
        let mut enc = FecEncoder::new(8, 2, 32, 5);
        submit_filled(&mut enc, 32, 1);
        submit_filled(&mut enc, 32, 2);
        submit_filled(&mut enc, 32, 3);
        assert!(enc.take().is_none());

        enc.flush();
        let out: Vec<FecBlock> = std::iter::from_fn(|| enc.take()).collect();
        assert_eq!(out.len(), 5); // 3 data + 2 parity
        for blk in &out {
            assert_eq!(blk.header().n_blocks, 3);
        }
        assert_eq!(out[3].header().block, 3);
        assert_eq!(out[4].header().block, 4);
    }

    #[test]
    fn test_flush_on_empty_group_is_noop() {
        let mut enc = FecEncoder::new(4, 2, 32, 1);
        enc.flush();
        assert!(enc.take().is_none());
        assert_eq!(enc.seq_num(), 1);
    }

    #[test]
    fn test_degenerate_mode_passes_through() {
        let mut enc = FecEncoder::new(0, 0, 32, 1);
        for i in 0..3 {
            submit_filled(&mut enc, 8, i);
        }
        let out: Vec<FecBlock> = std::iter::from_fn(|| enc.take()).collect();
        assert_eq!(out.len(), 3);
        // Sequence advances per block in passthrough mode.
        assert_eq!(out[0].header().seq_num, 1);
        assert_eq!(out[1].header().seq_num, 2);
        assert_eq!(out[2].header().seq_num, 3);
    }

    #[test]
    fn test_sequence_skips_zero_on_wrap() {
        let mut enc = FecEncoder::new(1, 1, 8, 254);
        let mut seqs = Vec::new();
        for _ in 0..4 {
            submit_filled(&mut enc, 8, 0);
        }
        while let Some(blk) = enc.take() {
            if blk.is_data() {
                seqs.push(blk.header().seq_num);
            }
        }
        assert_eq!(seqs, vec![254, 255, 1, 2]);
    }

    #[test]
    fn test_start_seq_zero_is_promoted() {
        let enc = FecEncoder::new(1, 1, 8, 0);
        assert_eq!(enc.seq_num(), 1);
    }
}
