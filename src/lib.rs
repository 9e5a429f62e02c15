//! An incremental implementation of the BLAKE2b hash and MAC with:
//!
//! - 100% safe, stable Rust, with a portable compression function.
//! - Variable digest length (1 to 64 bytes), keying (up to 64 bytes), and a 16-byte salt.
//! - Byte, slice, and sub-range input, in any chunking.
//! - Secret state that is wiped on every exit path: the key copy, the salt, the block buffer, the
//!   chain value, and the compression scratch space.
//! - `no_std` support. `std` is on by default, for `std::io::Write` and `std::error::Error`.
//!
//! # Example
//!
//! ```
//! let mut params = blake2b_keyed::Params::new();
//! params.hash_length(32);
//! let mut state = params.to_state()?;
//! state.update(b"a");
//! state.update(b"b");
//! state.update(b"c");
//! let hash = state.finalize()?;
//! assert_eq!(
//!     "bddd813c634239723171ef3fee98579b94964e3bb1cb3e427262c8c068d52319",
//!     &hash.to_hex(),
//! );
//! # Ok::<(), blake2b_keyed::Error>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use arrayvec::ArrayString;
use core::fmt;

mod error;
mod params;
mod portable;
pub mod secure;
mod state;


pub use crate::error::{ConfigError, Error};
pub use crate::params::Params;
pub use crate::secure::SecretBuffer;
pub use crate::state::State;

/// The size of one compression block.
pub const BLOCKBYTES: usize = 128;
/// The max hash length.
pub const OUTBYTES: usize = 64;
/// The max key length.
pub const KEYBYTES: usize = 64;
/// The salt length. Salts are either absent or exactly this long.
pub const SALTBYTES: usize = 16;

const IV: [u64; 8] = [
    0x6A09E667F3BCC908,
    0xBB67AE8584CAA73B,
    0x3C6EF372FE94F82B,
    0xA54FF53A5F1D36F1,
    0x510E527FADE682D1,
    0x9B05688C2B3E6C1F,
    0x1F83D9ABFB41BD6B,
    0x5BE0CD19137E2179,
];

const SIGMA: [[u8; 16]; 12] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
    [11, 8, 12, 0, 5, 2, 15, 13, 10, 14, 3, 6, 7, 1, 9, 4],
    [7, 9, 3, 1, 13, 12, 11, 14, 2, 6, 5, 10, 4, 0, 15, 8],
    [9, 0, 5, 7, 2, 4, 10, 15, 14, 1, 11, 12, 6, 8, 3, 13],
    [2, 12, 6, 10, 0, 11, 8, 3, 4, 13, 7, 5, 15, 14, 1, 9],
    [12, 5, 1, 15, 14, 13, 4, 10, 0, 7, 6, 3, 9, 2, 8, 11],
    [13, 11, 7, 14, 12, 1, 3, 9, 5, 0, 15, 4, 8, 6, 2, 10],
    [6, 15, 14, 9, 11, 3, 0, 8, 12, 2, 13, 7, 1, 4, 10, 5],
    [10, 2, 8, 4, 7, 6, 1, 5, 15, 11, 9, 14, 3, 12, 13, 0],
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
];

type StateWords = [u64; 8];
type Block = [u8; BLOCKBYTES];

/// Compute the BLAKE2b hash of a slice of bytes all at once, using default parameters.
///
/// # Example
///
/// ```
/// # use blake2b_keyed::blake2b;
/// let expected = "ca002330e69d3e6b84a46a56a6533fd79d51d97a3bb7cad6c2ff43b354185d6d\
///                 c1e723fb3db4ae0737e120378424c714bb982d9dc5bbd7a0ab318240ddd18f8d";
/// let hash = blake2b(b"foo");
/// assert_eq!(expected, &hash.to_hex());
/// ```
pub fn blake2b(input: &[u8]) -> Hash {
    let mut state = State::new();
    state.update(input);
    state.into_hash()
}

/// A finalized BLAKE2b hash, with constant-time equality.
#[derive(Clone, Copy)]
pub struct Hash {
    bytes: [u8; OUTBYTES],
    len: u8,
}

impl Hash {
    pub(crate) fn zeroed(len: u8) -> Self {
        Self {
            bytes: [0; OUTBYTES],
            len,
        }
    }

    pub(crate) fn full_buffer(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.len as usize]
    }

    /// Convert the hash to a byte slice. Note that if you're using BLAKE2b as a MAC, you need
    /// constant time equality, which `&[u8]` doesn't provide.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Convert the hash to a lowercase hexadecimal
    /// [`ArrayString`](https://docs.rs/arrayvec/0.7/arrayvec/struct.ArrayString.html).
    pub fn to_hex(&self) -> ArrayString<{ 2 * OUTBYTES }> {
        let mut s = ArrayString::new();
        let table = b"0123456789abcdef";
        for &b in self.as_bytes() {
            s.push(table[(b >> 4) as usize] as char);
            s.push(table[(b & 0xf) as usize] as char);
        }
        s
    }
}

/// This implementation is constant time, if the two hashes are the same length.
impl PartialEq for Hash {
    fn eq(&self, other: &Hash) -> bool {
        constant_time_eq::constant_time_eq(self.as_bytes(), other.as_bytes())
    }
}

/// This implementation is constant time, if the slice is the same length as the hash.
impl PartialEq<[u8]> for Hash {
    fn eq(&self, other: &[u8]) -> bool {
        constant_time_eq::constant_time_eq(self.as_bytes(), other)
    }
}

impl Eq for Hash {}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Hash(0x{})", self.to_hex())
    }
}
