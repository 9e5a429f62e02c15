//! Owned storage for secret bytes.
//!
//! A `SecretBuffer` is allocated once at a fixed length and never grown, so its contents are
//! never silently copied to a new allocation. `wipe` zeroes it in place, and dropping it wipes
//! and releases it. The zeroing goes through `zeroize`, so it isn't optimized away.

use alloc::vec::Vec;
use core::fmt;
use core::ops::{Deref, DerefMut};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::Error;

/// A fixed-length heap buffer for key material.
pub struct SecretBuffer {
    bytes: Vec<u8>,
}

impl SecretBuffer {
    /// Allocate `len` zero bytes. Allocation failure is reported rather than aborting.
    pub fn new(len: usize) -> Result<Self, Error> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(len).map_err(|_| Error::Allocation)?;
        bytes.resize(len, 0);
        Ok(Self { bytes })
    }

    /// Allocate a buffer holding a copy of `secret`.
    pub fn from_slice(secret: &[u8]) -> Result<Self, Error> {
        let mut buf = Self::new(secret.len())?;
        buf.bytes.copy_from_slice(secret);
        Ok(buf)
    }

    /// Overwrite every byte with zero. The length is unchanged. Calling this more than once is
    /// harmless.
    pub fn wipe(&mut self) {
        self.bytes.as_mut_slice().zeroize();
    }

    /// Whether every byte is zero.
    pub fn is_wiped(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }
}

impl Deref for SecretBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for SecretBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        // Vec's Zeroize clears the whole capacity, then truncates.
        self.bytes.zeroize();
    }
}

impl ZeroizeOnDrop for SecretBuffer {}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // NB: Don't print the contents.
        write!(f, "SecretBuffer {{ len: {} }}", self.bytes.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_copy_and_wipe() {
        let mut buf = SecretBuffer::from_slice(b"hunter2").unwrap();
        assert_eq!(&buf[..], b"hunter2");
        assert!(!buf.is_wiped());
        buf.wipe();
        assert_eq!(buf.len(), 7);
        assert!(buf.is_wiped());
        buf.wipe();
        assert!(buf.is_wiped());
    }

    #[test]
    fn test_index_write() {
        let mut buf = SecretBuffer::new(4).unwrap();
        assert!(buf.is_wiped());
        buf[2] = 0xff;
        assert_eq!(&buf[..], &[0, 0, 0xff, 0]);
    }

    #[test]
    fn test_impossible_allocation() {
        assert_eq!(
            Error::Allocation,
            SecretBuffer::new(usize::MAX).unwrap_err()
        );
    }

    #[test]
    fn test_debug_hides_contents() {
        let buf = SecretBuffer::from_slice(&[0xab; 3]).unwrap();
        let debug = alloc::format!("{:?}", buf);
        assert_eq!("SecretBuffer { len: 3 }", debug);
    }
}
