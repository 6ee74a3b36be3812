//! # fecstream - streaming erasure coding for lossy packet links
//!
//! A streaming Forward-Error-Correction codec for one-way, best-effort
//! packet channels (wireless video and telemetry downlinks, UDP media
//! flows). The sender fragments application data into fixed-size blocks,
//! computes parity blocks with a systematic Cauchy Reed-Solomon code over
//! GF(2^8), and serializes each block behind a 4-byte header plus a coded
//! 2-byte length prefix. The receiver tolerates loss of up to the parity
//! count per group, releases in-order data with minimal latency, and
//! keeps loss statistics under reordering, duplication, and drops.
//!
//! The codec is transport-agnostic: the embedding program moves the
//! datagrams. Each [`FecEncoder`]/[`FecDecoder`] instance is a
//! single-threaded state machine; run one per flow.
//!
//! ## Example
//!
//! ```rust
//! use fecstream::{FecBufferEncoder, FecDecoder};
//!
//! let mut encoder = FecBufferEncoder::new(1400, 0.5);
//! let payload = vec![0x42u8; 4096];
//! let blocks = encoder.encode(&payload);
//!
//! // Half the blocks are parity: any loss within that budget is
//! // transparent. Here everything arrives.
//! let mut decoder = FecDecoder::new();
//! for block in &blocks {
//!     decoder.submit(block.as_bytes());
//! }
//!
//! let mut out = Vec::new();
//! while let Some(block) = decoder.take() {
//!     out.extend_from_slice(block.data());
//! }
//! assert_eq!(out, payload);
//! ```
//!
//! ## Failure model
//!
//! Nothing in the decode path returns an error or panics: a codec facing
//! an adversarial channel must treat malformed input as noise. Failures
//! are visible as [`DecoderStats`] counters and silently dropped blocks.
//! The [`Error`] type only surfaces from the [`coder`] kernel, whose
//! callers state shard geometry explicitly.

mod block;
mod buffer;
pub mod coder;
mod decoder;
mod encoder;
mod gf;
pub mod sim;

pub use block::{FecBlock, FecHeader, BLOCK_OVERHEAD};
pub use buffer::FecBufferEncoder;
pub use decoder::{DecoderStats, FecDecoder};
pub use encoder::FecEncoder;

/// Errors reported by the Reed-Solomon kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Zero data shards, or more than [`coder::MAX_SHARDS`] total.
    InvalidShardCount,
    /// Shards of differing or zero length in one call.
    ShardSizeMismatch,
    /// Fewer parity shards available than missing data shards.
    InsufficientShards,
    /// Elimination hit a zero pivot; the erasure pattern is unsolvable.
    SingularMatrix,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidShardCount => write!(f, "invalid shard count"),
            Error::ShardSizeMismatch => write!(f, "shard sizes differ or are zero"),
            Error::InsufficientShards => write!(f, "not enough shards to reconstruct"),
            Error::SingularMatrix => write!(f, "unsolvable erasure pattern"),
        }
    }
}

impl std::error::Error for Error {}
