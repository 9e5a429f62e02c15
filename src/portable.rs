use arrayref::{array_ref, array_refs};
use zeroize::Zeroize;

use super::*;

// G is the mixing function, called eight times per round in the compression
// function. V is the 16-word state vector of the compression function, usually
// described as a 4x4 matrix. A, B, C, and D are the mixing indices, set by the
// caller first to the four columns of V, and then to its four diagonals. X and
// Y are words of input, chosen by the caller according to the message
// schedule, SIGMA.
#[cfg_attr(not(feature = "uninline_portable"), inline(always))]
fn g(v: &mut [u64; 16], a: usize, b: usize, c: usize, d: usize, x: u64, y: u64) {
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(x);
    v[d] = (v[d] ^ v[a]).rotate_right(32);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(24);
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(y);
    v[d] = (v[d] ^ v[a]).rotate_right(16);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(63);
}

#[cfg_attr(not(feature = "uninline_portable"), inline(always))]
fn round(r: usize, m: &[u64; 16], v: &mut [u64; 16]) {
    // Select the message schedule based on the round.
    let s = SIGMA[r];

    // Mix the columns.
    g(v, 0, 4, 8, 12, m[s[0] as usize], m[s[1] as usize]);
    g(v, 1, 5, 9, 13, m[s[2] as usize], m[s[3] as usize]);
    g(v, 2, 6, 10, 14, m[s[4] as usize], m[s[5] as usize]);
    g(v, 3, 7, 11, 15, m[s[6] as usize], m[s[7] as usize]);

    // Mix the diagonals.
    g(v, 0, 5, 10, 15, m[s[8] as usize], m[s[9] as usize]);
    g(v, 1, 6, 11, 12, m[s[10] as usize], m[s[11] as usize]);
    g(v, 2, 7, 8, 13, m[s[12] as usize], m[s[13] as usize]);
    g(v, 3, 4, 9, 14, m[s[14] as usize], m[s[15] as usize]);
}

#[inline(always)]
fn le64(bytes: &[u8; 8]) -> u64 {
    u64::from_le_bytes(*bytes)
}

// H is the 8-word chain value. `msg` is BLOCKBYTES of input, zero padded in
// the final block. `count` is the number of bytes fed so far, including in
// this call, though not including padding in the final call. `last_block` is
// all ones for the final call and zero otherwise.
//
// The scratch state and the decoded message words are wiped before return.
pub fn compress(h: &mut StateWords, msg: &Block, count: u128, last_block: u64) {
    // Initialize the compression state.
    let mut v = [
        h[0],
        h[1],
        h[2],
        h[3],
        h[4],
        h[5],
        h[6],
        h[7],
        IV[0],
        IV[1],
        IV[2],
        IV[3],
        IV[4] ^ count as u64,
        IV[5] ^ (count >> 64) as u64,
        IV[6] ^ last_block,
        IV[7],
    ];

    // Parse the message bytes as ints in little endian order.
    let msg_refs = array_refs!(msg, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8);
    let mut m = [
        le64(msg_refs.0),
        le64(msg_refs.1),
        le64(msg_refs.2),
        le64(msg_refs.3),
        le64(msg_refs.4),
        le64(msg_refs.5),
        le64(msg_refs.6),
        le64(msg_refs.7),
        le64(msg_refs.8),
        le64(msg_refs.9),
        le64(msg_refs.10),
        le64(msg_refs.11),
        le64(msg_refs.12),
        le64(msg_refs.13),
        le64(msg_refs.14),
        le64(msg_refs.15),
    ];

    for r in 0..12 {
        round(r, &m, &mut v);
    }

    for i in 0..8 {
        h[i] ^= v[i] ^ v[i + 8];
    }

    v.zeroize();
    m.zeroize();
}

// Compress a run of whole blocks that are all known not to be the last block
// of the message. Returns the updated count.
pub fn compress_blocks(h: &mut StateWords, input: &[u8], mut count: u128) -> u128 {
    debug_assert_eq!(input.len() % BLOCKBYTES, 0);
    let mut offset = 0;
    while offset < input.len() {
        count = count.wrapping_add(BLOCKBYTES as u128);
        compress(h, array_ref!(input, offset, BLOCKBYTES), count, 0);
        offset += BLOCKBYTES;
    }
    count
}
