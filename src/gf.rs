//! GF(2^8) arithmetic for the erasure coder.
//!
//! The field type is generated by the `gf256` crate over the polynomial
//! `0x14d` with generator `0x2`. Bulk slice operations go through a
//! 64 KiB multiplication table built at compile time, so there is no
//! runtime table initialization to synchronize across threads.

use gf256::gf::gf;

/// GF(2^8) element over the polynomial `0x14d` with generator `0x2`.
#[gf(polynomial = 0x14d, generator = 0x2)]
pub type Gf256;

/// Per-coefficient multiplication rows: `rows[c][x] = x * c` in GF(2^8).
struct MulTable {
    rows: [[u8; 256]; 256],
}

impl MulTable {
    const fn build() -> Self {
        let mut rows = [[0u8; 256]; 256];
        let mut c = 0usize;
        while c < 256 {
            let mut x = 0usize;
            while x < 256 {
                rows[c][x] = gf_mul(x as u8, c as u8);
                x += 1;
            }
            c += 1;
        }
        Self { rows }
    }
}

static MUL_TABLE: MulTable = MulTable::build();

/// Multiply-and-reduce over the polynomial `0x14d`, usable in const context.
const fn gf_mul(a: u8, b: u8) -> u8 {
    let mut prod = 0u16;
    let mut i = 0;
    while i < 8 {
        if (b >> i) & 1 != 0 {
            prod ^= (a as u16) << i;
        }
        i += 1;
    }
    let mut bit = 15;
    while bit >= 8 {
        if prod & (1 << bit) != 0 {
            prod ^= 0x14d << (bit - 8);
        }
        bit -= 1;
    }
    prod as u8
}

/// `dst[i] ^= src[i] * c` over the overlapping length.
///
/// Addition in GF(2^8) is XOR, so this both accumulates parity and
/// cancels known terms during reconstruction.
pub(crate) fn gf_muladd_slice(dst: &mut [u8], src: &[u8], c: Gf256) {
    if c.0 == 0 {
        return;
    }
    let row = &MUL_TABLE.rows[c.0 as usize];
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d ^= row[*s as usize];
    }
}

/// `dst[i] *= c` in place.
pub(crate) fn gf_mul_slice_inplace(dst: &mut [u8], c: Gf256) {
    let row = &MUL_TABLE.rows[c.0 as usize];
    for d in dst.iter_mut() {
        *d = row[*d as usize];
    }
}
