//! Streaming group decoder with loss statistics.
//!
//! Blocks are submitted in arrival order, possibly reordered, duplicated,
//! or with gaps. The decoder tracks one group at a time: data blocks
//! arriving contiguously from position 0 are released immediately, a gap
//! withholds later blocks until enough shards arrive to reconstruct, and
//! a sequence break abandons the group and charges the statistics.
//!
//! Nothing here returns an error: the codec sits on a best-effort
//! channel, so every failure mode is a counter or a silently dropped
//! block.

use std::collections::VecDeque;
use std::ops::{Add, Sub};

use tracing::debug;

use crate::block::{FecBlock, FecHeader};
use crate::coder;

/// Monotonic decoder counters.
///
/// Counters only grow across submissions; interval reports are taken by
/// subtracting two snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Groups fully delivered or reconstructed.
    pub total_blocks: u64,
    /// Packets presented to `submit`, malformed ones included.
    pub total_packets: u64,
    /// Groups lost, abandoned, or rejected after reconstruction.
    pub dropped_blocks: u64,
    /// Packets observed missing, duplicated, or unusable. A lower-bound
    /// estimate under heavy reordering.
    pub dropped_packets: u64,
    /// Backward sequence motion events.
    pub lost_sync: u64,
    /// Bytes presented to `submit`.
    pub bytes: u64,
}

impl Add for DecoderStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            total_blocks: self.total_blocks + rhs.total_blocks,
            total_packets: self.total_packets + rhs.total_packets,
            dropped_blocks: self.dropped_blocks + rhs.dropped_blocks,
            dropped_packets: self.dropped_packets + rhs.dropped_packets,
            lost_sync: self.lost_sync + rhs.lost_sync,
            bytes: self.bytes + rhs.bytes,
        }
    }
}

impl Sub for DecoderStats {
    type Output = Self;

    /// Fieldwise difference for interval reporting. Saturates so a
    /// misordered pair of snapshots cannot panic.
    fn sub(self, rhs: Self) -> Self {
        Self {
            total_blocks: self.total_blocks.saturating_sub(rhs.total_blocks),
            total_packets: self.total_packets.saturating_sub(rhs.total_packets),
            dropped_blocks: self.dropped_blocks.saturating_sub(rhs.dropped_blocks),
            dropped_packets: self.dropped_packets.saturating_sub(rhs.dropped_packets),
            lost_sync: self.lost_sync.saturating_sub(rhs.lost_sync),
            bytes: self.bytes.saturating_sub(rhs.bytes),
        }
    }
}

/// Signed distance from `prev` to `cur` on the u8 sequence cycle.
///
/// The wrap window is 128: results land in `[-128, 127]`, so forward and
/// backward motion are both detected on either edge of the cycle. A
/// result of 0 means the same group.
fn seq_delta(prev: u8, cur: u8) -> i32 {
    let d = cur.wrapping_sub(prev);
    if d < 128 {
        i32::from(d)
    } else {
        i32::from(d) - 256
    }
}

/// Streaming decoder for one incoming flow.
#[derive(Debug, Default)]
pub struct FecDecoder {
    /// Header of the most recently observed block.
    prev_header: FecHeader,
    /// Shard size of the active group's coded region; 0 while idle.
    coded_len: usize,
    /// Received data blocks of the active group, indexed by position.
    data_slots: Vec<Option<FecBlock>>,
    /// Number of filled entries in `data_slots`.
    data_count: usize,
    /// Lowest position not yet released to the consumer.
    next_release: usize,
    /// Parity blocks of the active group.
    fec_blocks: Vec<FecBlock>,
    /// Decoded blocks awaiting the consumer.
    out_blocks: VecDeque<FecBlock>,
    stats: DecoderStats,
}

impl FecDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the statistics counters.
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Dequeue the next decoded data block.
    pub fn take(&mut self) -> Option<FecBlock> {
        self.out_blocks.pop_front()
    }

    /// Feed one received datagram to the decoder.
    pub fn submit(&mut self, packet: &[u8]) {
        self.stats.total_packets += 1;
        self.stats.bytes += packet.len() as u64;

        let block = match FecBlock::from_wire(packet) {
            Some(b) => b,
            None => {
                self.stats.dropped_packets += 1;
                return;
            }
        };
        let h = block.header();
        let delta = seq_delta(self.prev_header.seq_num, h.seq_num);

        if self.coded_len != 0 {
            // An active group: did the sequence move on before it completed?
            if delta != 0 {
                if delta < 0 {
                    debug!(
                        prev = self.prev_header.seq_num,
                        seq = h.seq_num,
                        "sequence moved backwards, sync lost"
                    );
                    self.stats.lost_sync += 1;
                } else {
                    self.stats.dropped_blocks += delta as u64;

                    // Estimate the packets lost across the break from the
                    // per-group packet count carried in the header.
                    let span = i64::from(h.n_blocks) + i64::from(h.n_fec_blocks);
                    let pbn = i64::from(self.prev_header.seq_num) * span
                        + i64::from(self.prev_header.block);
                    let bn = (i64::from(self.prev_header.seq_num) + i64::from(delta)) * span
                        + i64::from(h.block);
                    if pbn < bn {
                        self.stats.dropped_packets += (bn - pbn) as u64;
                    }
                }
                self.reset_group();
            } else if h.block <= self.prev_header.block {
                // Duplicate or reordered within the group. Counted as one
                // drop regardless of how far backwards it reached.
                self.stats.dropped_packets += 1;
                self.prev_header = h;
                return;
            } else {
                // Positions skipped since the previous packet.
                self.stats.dropped_packets += u64::from(h.block - self.prev_header.block) - 1;
            }
        } else if delta == 0 {
            // A straggler from the group we already completed.
            self.prev_header = h;
            return;
        }
        self.prev_header = h;

        // Positions skipped at the head of a group we are joining.
        if self.coded_len == 0 {
            self.stats.dropped_packets += u64::from(h.block);
        }

        // No coding on this flow: release immediately.
        if h.n_blocks == 0 || h.n_fec_blocks == 0 {
            self.out_blocks.push_back(block);
            return;
        }

        // Opening block of a new group fixes the group's shape.
        if self.coded_len == 0 {
            self.data_slots = vec![None; usize::from(h.n_blocks)];
            self.data_count = 0;
            self.next_release = 0;
        }
        self.coded_len = self.coded_len.max(block.coded_len());

        if block.is_data() {
            let pos = usize::from(h.block);
            match self.data_slots.get_mut(pos) {
                Some(slot) if slot.is_none() => {
                    *slot = Some(block);
                    self.data_count += 1;
                }
                _ => {
                    // Position already held, or inconsistent with the
                    // group shape announced by the opening block.
                    self.stats.dropped_packets += 1;
                    return;
                }
            }

            // Low-latency path: everything contiguous from position 0
            // goes out now. A copy stays behind for reconstruction.
            while let Some(Some(b)) = self.data_slots.get(self.next_release) {
                self.out_blocks.push_back(b.clone());
                self.next_release += 1;
            }

            if self.data_count == self.data_slots.len() {
                self.reset_group();
                self.stats.total_blocks += 1;
            }
        } else {
            self.fec_blocks.push(block);
            if self.data_count + self.fec_blocks.len() == self.data_slots.len() {
                self.decode_group();
                self.reset_group();
                self.stats.total_blocks += 1;
            }
        }
    }

    fn reset_group(&mut self) {
        self.coded_len = 0;
        self.data_slots.clear();
        self.data_count = 0;
        self.next_release = 0;
        self.fec_blocks.clear();
    }

    /// Reconstruct the active group's missing data blocks and release
    /// everything withheld behind the first gap, in position order.
    fn decode_group(&mut self) {
        let header = match self
            .data_slots
            .iter()
            .flatten()
            .next()
            .or_else(|| self.fec_blocks.first())
        {
            Some(b) => b.header(),
            None => return,
        };
        let k = self.data_slots.len();
        let coded_len = self.coded_len;

        let missing_pos: Vec<usize> =
            (0..k).filter(|&i| self.data_slots[i].is_none()).collect();
        if missing_pos.is_empty() {
            return;
        }
        let mut recovered: Vec<FecBlock> = missing_pos
            .iter()
            .map(|&pos| {
                FecBlock::new(
                    FecHeader {
                        seq_num: header.seq_num,
                        block: pos as u8,
                        n_blocks: header.n_blocks,
                        n_fec_blocks: header.n_fec_blocks,
                    },
                    (coded_len - 2) as u16,
                )
            })
            .collect();

        // Every shard participates at the group's shard size; received
        // blocks may be shorter and are zero-extended.
        for b in self.data_slots.iter_mut().flatten() {
            b.grow_coded(coded_len);
        }
        for b in self.fec_blocks.iter_mut() {
            b.grow_coded(coded_len);
        }

        let ok = {
            let present: Vec<(usize, &[u8])> = self
                .data_slots
                .iter()
                .flatten()
                .map(|b| (usize::from(b.header().block), b.coded()))
                .collect();
            let parity: Vec<(usize, &[u8])> = self
                .fec_blocks
                .iter()
                .filter_map(|b| {
                    usize::from(b.header().block)
                        .checked_sub(k)
                        .map(|idx| (idx, b.coded()))
                })
                .collect();
            let mut missing: Vec<(usize, &mut [u8])> = recovered
                .iter_mut()
                .map(|b| (usize::from(b.header().block), b.coded_mut()))
                .collect();
            match coder::reconstruct(k, &present, &parity, &mut missing) {
                Ok(()) => true,
                Err(error) => {
                    debug!(seq = header.seq_num, %error, "group reconstruction failed");
                    false
                }
            }
        };
        if !ok {
            self.stats.lost_sync += 1;
            return;
        }
        debug!(
            seq = header.seq_num,
            recovered = recovered.len(),
            "reconstructed missing data blocks"
        );

        // Everything before the first gap was already released on arrival.
        let first_missing = missing_pos[0];
        let mut recovered = recovered.into_iter();
        for pos in first_missing..k {
            if let Some(b) = self.data_slots[pos].take() {
                self.out_blocks.push_back(b);
            } else if let Some(b) = recovered.next() {
                // A reconstructed length that cannot fit the shard means
                // the reconstruction consumed bad input; drop the block.
                if usize::from(b.payload_len()) <= coded_len - 2 {
                    self.out_blocks.push_back(b);
                } else {
                    self.stats.dropped_blocks += 1;
                }
            }
        }
    }
}
