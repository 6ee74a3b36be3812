//! Wire block model.
//!
//! One block is one datagram:
//!
//! ```text
//! ┌─────────┬─────────┬───────────┬──────────────┬─────────┬──────────┐
//! │ seq_num │ block   │ n_blocks  │ n_fec_blocks │ length  │ payload  │
//! │ (1B)    │ (1B)    │ (1B)      │ (1B)         │ (2B LE) │ + 0-pad  │
//! └─────────┴─────────┴───────────┴──────────────┴─────────┴──────────┘
//! ```
//!
//! The erasure coder operates on the *coded region*, everything from the
//! `length` field onward. Coding the length prefix together with the
//! payload lets the decoder recover the true length of a reconstructed
//! shard. Bytes past `length` are zero padding and must stay zero, since
//! every shard in a group is logically extended to the group's shard
//! size before parity is computed.

/// Fixed per-block header preceding the coded region.
///
/// All fields are single bytes; `seq_num` identifies the coding group
/// (0 is reserved as "never used"), `block` is the position within the
/// group, with `0..n_blocks` denoting data and
/// `n_blocks..n_blocks + n_fec_blocks` denoting parity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FecHeader {
    /// Group sequence number, wraps mod 256 skipping 0.
    pub seq_num: u8,
    /// Position within the group.
    pub block: u8,
    /// Number of data shards in the group.
    pub n_blocks: u8,
    /// Number of parity shards in the group.
    pub n_fec_blocks: u8,
}

impl FecHeader {
    /// Header size on the wire.
    pub const SIZE: usize = 4;

    /// Serialize into the first [`FecHeader::SIZE`] bytes of `buf`.
    fn write(&self, buf: &mut [u8]) {
        buf[0] = self.seq_num;
        buf[1] = self.block;
        buf[2] = self.n_blocks;
        buf[3] = self.n_fec_blocks;
    }

    /// Parse a header from the start of `buf`.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            seq_num: buf[0],
            block: buf[1],
            n_blocks: buf[2],
            n_fec_blocks: buf[3],
        })
    }

    /// Whether this header describes a data block (as opposed to parity).
    pub fn is_data(&self) -> bool {
        self.block < self.n_blocks
    }
}

/// Byte offset of the little-endian `length` prefix.
const LENGTH_OFFSET: usize = FecHeader::SIZE;

/// Bytes preceding the payload: header plus length prefix.
pub const BLOCK_OVERHEAD: usize = FecHeader::SIZE + 2;

/// One owned wire block: header, length prefix, payload, zero pad.
///
/// Blocks are created by the encoder (outgoing) or parsed from received
/// datagrams (incoming), and handed to the consumer by value when
/// dequeued from a codec's output queue.
#[derive(Debug, Clone)]
pub struct FecBlock {
    buf: Vec<u8>,
}

impl FecBlock {
    /// Allocate a zeroed block sized for `length` payload bytes.
    pub fn new(header: FecHeader, length: u16) -> Self {
        let mut buf = vec![0u8; BLOCK_OVERHEAD + length as usize];
        header.write(&mut buf);
        buf[LENGTH_OFFSET..LENGTH_OFFSET + 2].copy_from_slice(&length.to_le_bytes());
        Self { buf }
    }

    /// Take ownership of a received datagram.
    ///
    /// Returns `None` when the packet is too short to carry a header and
    /// length prefix. Header fields are otherwise trusted as-is; garbage
    /// is absorbed by the decoder's statistics, not rejected here.
    pub fn from_wire(packet: &[u8]) -> Option<Self> {
        if packet.len() < BLOCK_OVERHEAD {
            return None;
        }
        Some(Self {
            buf: packet.to_vec(),
        })
    }

    /// The block's header.
    pub fn header(&self) -> FecHeader {
        FecHeader {
            seq_num: self.buf[0],
            block: self.buf[1],
            n_blocks: self.buf[2],
            n_fec_blocks: self.buf[3],
        }
    }

    pub(crate) fn set_block(&mut self, block: u8) {
        self.buf[1] = block;
    }

    pub(crate) fn set_n_blocks(&mut self, n_blocks: u8) {
        self.buf[2] = n_blocks;
    }

    /// True payload length in bytes.
    ///
    /// Meaningful for data blocks only; on parity blocks the prefix holds
    /// coded bytes like the rest of the shard.
    pub fn payload_len(&self) -> u16 {
        u16::from_le_bytes([self.buf[LENGTH_OFFSET], self.buf[LENGTH_OFFSET + 1]])
    }

    /// The payload, clamped to the owned buffer.
    ///
    /// A corrupt length prefix yields a short slice rather than a panic.
    pub fn data(&self) -> &[u8] {
        let end = (BLOCK_OVERHEAD + self.payload_len() as usize).min(self.buf.len());
        &self.buf[BLOCK_OVERHEAD..end]
    }

    /// Mutable payload, for filling a freshly allocated block.
    pub fn data_mut(&mut self) -> &mut [u8] {
        let end = (BLOCK_OVERHEAD + self.payload_len() as usize).min(self.buf.len());
        &mut self.buf[BLOCK_OVERHEAD..end]
    }

    /// The coded region: length prefix, payload, and zero padding.
    pub fn coded(&self) -> &[u8] {
        &self.buf[FecHeader::SIZE..]
    }

    pub(crate) fn coded_mut(&mut self) -> &mut [u8] {
        &mut self.buf[FecHeader::SIZE..]
    }

    /// Length of the coded region in bytes.
    pub fn coded_len(&self) -> usize {
        self.buf.len() - FecHeader::SIZE
    }

    /// The full packet to transmit.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Whether this is a data block (as opposed to parity).
    pub fn is_data(&self) -> bool {
        self.header().is_data()
    }

    /// Zero-extend the coded region to `coded_len` bytes.
    ///
    /// All shards of a group must share the group's shard size before
    /// parity is computed or consumed; the pad bytes are zero.
    pub(crate) fn grow_coded(&mut self, coded_len: usize) {
        let want = FecHeader::SIZE + coded_len;
        if self.buf.len() < want {
            self.buf.resize(want, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_block_layout() {
        let h = FecHeader {
            seq_num: 7,
            block: 2,
            n_blocks: 4,
            n_fec_blocks: 2,
        };
        let mut blk = FecBlock::new(h, 5);
        blk.data_mut().copy_from_slice(&[1, 2, 3, 4, 5]);

        assert_eq!(blk.header(), h);
        assert_eq!(blk.payload_len(), 5);
        assert_eq!(blk.data(), &[1, 2, 3, 4, 5]);
        assert_eq!(blk.coded_len(), 7);
        assert_eq!(blk.as_bytes(), &[7, 2, 4, 2, 5, 0, 1, 2, 3, 4, 5]);
        assert!(blk.is_data());
    }

    #[test]
    fn test_length_prefix_is_little_endian() {
        let blk = FecBlock::new(FecHeader::default(), 0x0102);
        assert_eq!(blk.as_bytes()[LENGTH_OFFSET], 0x02);
        assert_eq!(blk.as_bytes()[LENGTH_OFFSET + 1], 0x01);
    }

    #[test]
    fn test_wire_roundtrip() {
        let h = FecHeader {
            seq_num: 200,
            block: 9,
            n_blocks: 8,
            n_fec_blocks: 2,
        };
        let blk = FecBlock::new(h, 3);
        let parsed = FecBlock::from_wire(blk.as_bytes()).unwrap();
        assert_eq!(parsed.header(), h);
        assert!(!parsed.is_data());
        assert_eq!(parsed.coded_len(), blk.coded_len());
    }

    #[test]
    fn test_from_wire_rejects_short_packets() {
        assert!(FecBlock::from_wire(&[]).is_none());
        assert!(FecBlock::from_wire(&[1, 2, 3, 4, 5]).is_none());
        assert!(FecBlock::from_wire(&[1, 2, 3, 4, 5, 6]).is_some());
    }

    #[test]
    fn test_corrupt_length_is_clamped() {
        // length claims 1000 bytes but the packet carries only 4.
        let mut packet = vec![1u8, 0, 1, 1, 0xe8, 0x03];
        packet.extend_from_slice(&[9, 9, 9, 9]);
        let blk = FecBlock::from_wire(&packet).unwrap();
        assert_eq!(blk.payload_len(), 1000);
        assert_eq!(blk.data(), &[9, 9, 9, 9]);
    }

    #[test]
    fn test_grow_coded_zero_pads() {
        let mut blk = FecBlock::new(FecHeader::default(), 2);
        blk.data_mut().copy_from_slice(&[0xAA, 0xBB]);
        blk.grow_coded(8);
        assert_eq!(blk.coded_len(), 8);
        assert_eq!(&blk.coded()[2..], &[0xAA, 0xBB, 0, 0, 0, 0]);
        // Growing to a smaller size never truncates.
        blk.grow_coded(4);
        assert_eq!(blk.coded_len(), 8);
    }

    #[test]
    fn test_header_from_bytes() {
        assert!(FecHeader::from_bytes(&[1, 2, 3]).is_none());
        let h = FecHeader::from_bytes(&[5, 1, 8, 4]).unwrap();
        assert_eq!(h.seq_num, 5);
        assert_eq!(h.block, 1);
        assert_eq!(h.n_blocks, 8);
        assert_eq!(h.n_fec_blocks, 4);
        assert!(h.is_data());
    }
}
