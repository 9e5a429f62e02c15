use core::cmp;
use core::fmt;
use core::ops::{Deref, DerefMut};
use zeroize::{Zeroize, Zeroizing};

use crate::portable;
use crate::secure::SecretBuffer;
use crate::{Block, Error, Hash, StateWords, BLOCKBYTES, IV, OUTBYTES, SALTBYTES};

// Everything that changes while a message is absorbed. Kept in one record so
// that wiping it is a single operation.
#[derive(Zeroize)]
struct Session {
    // The chain value.
    h: StateWords,
    buf: Block,
    buflen: usize,
    // Bytes handed to the compression function so far. The low and high
    // halves are the t0 and t1 counter words.
    count: u128,
}

impl Session {
    fn empty() -> Self {
        Self {
            h: [0; 8],
            buf: [0; BLOCKBYTES],
            buflen: 0,
            count: 0,
        }
    }

    fn fill_buf(&mut self, input: &mut &[u8]) {
        let take = cmp::min(BLOCKBYTES - self.buflen, input.len());
        self.buf[self.buflen..self.buflen + take].copy_from_slice(&input[..take]);
        self.buflen += take;
        *input = &input[take..];
    }

    // Only called once more input is known to follow, so the buffer can't be
    // the last block.
    fn compress_buf(&mut self) {
        debug_assert_eq!(self.buflen, BLOCKBYTES);
        self.count = self.count.wrapping_add(BLOCKBYTES as u128);
        portable::compress(&mut self.h, &self.buf, self.count, 0);
        self.buf.zeroize();
        self.buflen = 0;
    }

    fn absorb_byte(&mut self, byte: u8) {
        if self.buflen == BLOCKBYTES {
            self.compress_buf();
        }
        self.buf[self.buflen] = byte;
        self.buflen += 1;
    }

    fn absorb(&mut self, mut input: &[u8]) {
        // If we have a partial buffer, try to complete it. If we complete it and there's more
        // input waiting (so we know we don't need to finalize), compress it.
        if self.buflen > 0 {
            self.fill_buf(&mut input);
            if !input.is_empty() {
                self.compress_buf();
            }
        }
        // If there's more than a block of input left, compress whole blocks directly instead of
        // buffering them. The final block, even if it's full, is always left for the buffer.
        if input.len() > BLOCKBYTES {
            let end = (input.len() - 1) / BLOCKBYTES * BLOCKBYTES;
            self.count = portable::compress_blocks(&mut self.h, &input[..end], self.count);
            input = &input[end..];
        }
        // Buffer any remaining input, to be either compressed or finalized in a subsequent call.
        self.fill_buf(&mut input);
    }

    // Compress the final block and write the first `out.len()` bytes of the
    // chain value into `out`. Leaves the session wiped.
    fn finish(&mut self, out: &mut [u8]) {
        debug_assert!(out.len() <= OUTBYTES);
        self.count = self.count.wrapping_add(self.buflen as u128);
        for b in &mut self.buf[self.buflen..] {
            *b = 0;
        }
        portable::compress(&mut self.h, &self.buf, self.count, !0);
        for (chunk, word) in out.chunks_mut(8).zip(self.h.iter()) {
            let mut word_bytes = word.to_le_bytes();
            chunk.copy_from_slice(&word_bytes[..chunk.len()]);
            word_bytes.zeroize();
        }
        self.zeroize();
    }
}

// Scoped access to the session for one update. Unless the update commits, the
// block buffer is wiped on the way out, whether by an early return or by
// unwinding.
struct WipeOnExit<'a> {
    session: &'a mut Session,
    committed: bool,
}

impl<'a> WipeOnExit<'a> {
    fn new(session: &'a mut Session) -> Self {
        Self {
            session,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl<'a> Deref for WipeOnExit<'a> {
    type Target = Session;

    fn deref(&self) -> &Session {
        &*self.session
    }
}

impl<'a> DerefMut for WipeOnExit<'a> {
    fn deref_mut(&mut self) -> &mut Session {
        &mut *self.session
    }
}

impl<'a> Drop for WipeOnExit<'a> {
    fn drop(&mut self) {
        if !self.committed {
            log::warn!("update did not complete, wiping the block buffer");
            self.session.buf.zeroize();
            self.session.buflen = 0;
        }
    }
}

// Finalization always ends with a reset, successful or not.
struct ResetOnExit<'a> {
    state: &'a mut State,
}

impl<'a> Drop for ResetOnExit<'a> {
    fn drop(&mut self) {
        self.state.restart();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Absorbing,
    Poisoned,
    Disposed,
}

/// An incremental hasher for BLAKE2b.
///
/// Finalizing resets the state to how it was constructed, with the same key, salt, and hash
/// length, so a `State` can be reused for any number of messages.
///
/// # Example
///
/// ```
/// let mut state = blake2b_keyed::State::new();
/// state.update(b"foo");
/// let hash1 = state.finalize()?;
/// state.update(b"bar");
/// let hash2 = state.finalize()?;
/// assert!(hash1 != hash2);
/// # Ok::<(), blake2b_keyed::Error>(())
/// ```
pub struct State {
    session: Session,
    key: Option<SecretBuffer>,
    salt: Option<Zeroizing<[u8; SALTBYTES]>>,
    hash_length: u8,
    status: Status,
}

impl State {
    /// Construct a new `State` with default parameters: a 64-byte hash, no key, and no salt.
    pub fn new() -> Self {
        Self::with_parts(OUTBYTES as u8, None, None)
    }

    // The parameters have already been validated by `Params::to_state`.
    pub(crate) fn with_parts(
        hash_length: u8,
        key: Option<SecretBuffer>,
        salt: Option<[u8; SALTBYTES]>,
    ) -> Self {
        let mut state = Self {
            session: Session::empty(),
            key,
            salt: salt.map(Zeroizing::new),
            hash_length,
            status: Status::Absorbing,
        };
        state.restart();
        log::debug!(
            "new BLAKE2b state: hash_length={} key_length={} salted={}",
            state.hash_length,
            state.key_length(),
            state.salt.is_some(),
        );
        state
    }

    fn key_length(&self) -> u8 {
        self.key.as_ref().map_or(0, |key| key.len() as u8)
    }

    fn initial_words(&self) -> StateWords {
        let mut words = IV;
        words[0] ^= self.hash_length as u64;
        words[0] ^= (self.key_length() as u64) << 8;
        // Fanout and max depth are both 1, for sequential hashing.
        words[0] ^= 0x01010000;
        if let Some(salt) = &self.salt {
            let salt: &[u8; SALTBYTES] = salt;
            let (salt0, salt1) = arrayref::array_refs!(salt, 8, 8);
            words[4] ^= u64::from_le_bytes(*salt0);
            words[5] ^= u64::from_le_bytes(*salt1);
        }
        words
    }

    // Wipe the session and set it up for a new message. A no-op once the
    // state has been disposed, since by then the key and salt are gone.
    fn restart(&mut self) {
        if self.status == Status::Disposed {
            return;
        }
        self.session.zeroize();
        self.session.h = self.initial_words();
        if let Some(key) = &self.key {
            // The key block counts as ordinary input. It stays buffered until more input or
            // finalization shows whether it's the last block.
            self.session.buf[..key.len()].copy_from_slice(key);
            self.session.buflen = BLOCKBYTES;
        }
        self.status = Status::Absorbing;
    }

    /// Add a single byte to the hash.
    pub fn update_byte(&mut self, byte: u8) -> &mut Self {
        if self.status == Status::Disposed {
            return self;
        }
        let mut session = WipeOnExit::new(&mut self.session);
        session.absorb_byte(byte);
        session.commit();
        self
    }

    /// Add input to the hash. You can call `update` any number of times.
    pub fn update(&mut self, input: &[u8]) -> &mut Self {
        if self.status == Status::Disposed || input.is_empty() {
            return self;
        }
        let mut session = WipeOnExit::new(&mut self.session);
        session.absorb(input);
        session.commit();
        self
    }

    /// Add `length` bytes of `input`, starting at `offset`, to the hash. A zero `length` is
    /// always a no-op.
    ///
    /// If the range doesn't fit in `input`, the block buffer is wiped and the state is poisoned:
    /// it won't finalize again until it's `reset`.
    pub fn update_range(
        &mut self,
        input: &[u8],
        offset: usize,
        length: usize,
    ) -> Result<&mut Self, Error> {
        if self.status == Status::Disposed {
            return Err(Error::Disposed);
        }
        if length == 0 {
            return Ok(self);
        }
        let mut session = WipeOnExit::new(&mut self.session);
        match offset
            .checked_add(length)
            .and_then(|end| input.get(offset..end))
        {
            Some(chunk) => {
                session.absorb(chunk);
                session.commit();
                Ok(self)
            }
            None => {
                drop(session);
                self.status = Status::Poisoned;
                Err(Error::InvalidRange {
                    offset,
                    length,
                    available: input.len(),
                })
            }
        }
    }

    /// Finalize the state and write exactly `hash_length()` bytes of output into `output`,
    /// starting at `offset`. Bytes of `output` outside that range aren't touched. Returns the
    /// number of bytes written.
    ///
    /// Whether this succeeds or fails, afterwards the state is reset and ready for a new message.
    pub fn finalize_into(&mut self, output: &mut [u8], offset: usize) -> Result<usize, Error> {
        if self.status == Status::Disposed {
            return Err(Error::Disposed);
        }
        let len = self.hash_length as usize;
        let cleanup = ResetOnExit { state: self };
        if cleanup.state.status == Status::Poisoned {
            return Err(Error::Poisoned);
        }
        let available = output.len();
        let dest = match offset
            .checked_add(len)
            .and_then(|end| output.get_mut(offset..end))
        {
            Some(dest) => dest,
            None => {
                return Err(Error::OutputTooSmall {
                    needed: offset.saturating_add(len),
                    available,
                })
            }
        };
        log::trace!("finalizing after {} bytes", cleanup.state.count());
        cleanup.state.session.finish(dest);
        Ok(len)
    }

    /// Finalize the state and return a `Hash`. The state is reset afterwards, so calling this
    /// again without any new input gives the hash of an empty message.
    pub fn finalize(&mut self) -> Result<Hash, Error> {
        let mut hash = Hash::zeroed(self.hash_length);
        self.finalize_into(hash.full_buffer(), 0)?;
        Ok(hash)
    }

    // For states that can't be poisoned or disposed yet, like the ones built
    // and consumed inside the one-shot hashing functions.
    pub(crate) fn into_hash(mut self) -> Hash {
        debug_assert_eq!(self.status, Status::Absorbing);
        let mut hash = Hash::zeroed(self.hash_length);
        self.session.finish(hash.full_buffer());
        hash
    }

    /// Discard any input so far and return to the state right after construction. The key, if
    /// any, is absorbed again, and the salt and hash length are kept. This also clears the
    /// poisoning from a failed `update_range`.
    pub fn reset(&mut self) -> &mut Self {
        if self.status != Status::Disposed {
            log::debug!("resetting BLAKE2b state");
        }
        self.restart();
        self
    }

    /// Wipe the key, the salt, and all intermediate state. Afterwards the `State` can't be used:
    /// updates are ignored and finalizing returns `Error::Disposed`. Disposing more than once is
    /// harmless, and dropping a `State` disposes it.
    pub fn dispose(&mut self) {
        if self.status == Status::Disposed {
            return;
        }
        self.session.zeroize();
        if let Some(key) = &mut self.key {
            key.wipe();
        }
        if let Some(salt) = &mut self.salt {
            salt.zeroize();
        }
        self.status = Status::Disposed;
        log::debug!("disposed BLAKE2b state");
    }

    /// The length of the final hash in bytes.
    pub fn hash_length(&self) -> usize {
        self.hash_length as usize
    }

    /// The compression block size, always `BLOCKBYTES` (128).
    pub fn block_size(&self) -> usize {
        BLOCKBYTES
    }

    /// The total number of bytes fed to the state since construction or the last reset,
    /// including the 128-byte block holding the key, if any.
    pub fn count(&self) -> u128 {
        self.session.count.wrapping_add(self.session.buflen as u128)
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for State {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(feature = "std")]
impl std::io::Write for State {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // NB: Don't print the words. Leaking them would allow length extension.
        write!(
            f,
            "State {{ count: {}, hash_length: {}, key_length: {}, salted: {}, status: {:?} }}",
            self.count(),
            self.hash_length,
            self.key_length(),
            self.salt.is_some(),
            self.status,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Params;

    #[test]
    fn test_last_full_block_stays_buffered() {
        let mut state = State::new();
        state.update(&[1; BLOCKBYTES]);
        assert_eq!(0, state.session.count);
        assert_eq!(BLOCKBYTES, state.session.buflen);

        state.update(&[2; 2 * BLOCKBYTES]);
        assert_eq!(2 * BLOCKBYTES as u128, state.session.count);
        assert_eq!(BLOCKBYTES, state.session.buflen);
        assert_eq!(3 * BLOCKBYTES as u128, state.count());

        state.update_byte(3);
        assert_eq!(3 * BLOCKBYTES as u128, state.session.count);
        assert_eq!(1, state.session.buflen);
    }

    #[test]
    fn test_key_block_preloaded() {
        let state = Params::new().key(b"caw caw").to_state().unwrap();
        assert_eq!(BLOCKBYTES, state.session.buflen);
        assert_eq!(0, state.session.count);
        assert_eq!(&state.session.buf[..7], b"caw caw");
        assert!(state.session.buf[7..].iter().all(|&b| b == 0));
        assert_eq!(BLOCKBYTES as u128, state.count());
    }

    #[test]
    fn test_empty_key_is_no_key() {
        let state = Params::new().key(b"").to_state().unwrap();
        assert!(state.key.is_none());
        assert_eq!(0, state.session.buflen);
        assert_eq!(State::new().session.h, state.session.h);
    }

    #[test]
    fn test_initial_words() {
        let salt = *b"0123456789abcdef";
        let state = Params::new()
            .hash_length(32)
            .key(&[9; 20])
            .salt(&salt)
            .to_state()
            .unwrap();
        let h = state.session.h;
        assert_eq!(IV[0] ^ 0x01010000 ^ (20 << 8) ^ 32, h[0]);
        assert_eq!(&IV[1..4], &h[1..4]);
        assert_eq!(IV[4] ^ u64::from_le_bytes(*b"01234567"), h[4]);
        assert_eq!(IV[5] ^ u64::from_le_bytes(*b"89abcdef"), h[5]);
        assert_eq!(&IV[6..8], &h[6..8]);

        let unsalted = State::new();
        assert_eq!(IV[0] ^ 0x01010040, unsalted.session.h[0]);
        assert_eq!(&IV[1..], &unsalted.session.h[1..]);
    }

    #[test]
    fn test_dispose_wipes_key_and_salt() {
        let salt = [0x5a; SALTBYTES];
        let mut state = Params::new()
            .key(b"caw caw")
            .salt(&salt)
            .to_state()
            .unwrap();
        state.update(b"caw caw caw");
        state.dispose();

        let key = state.key.as_ref().unwrap();
        assert_eq!(7, key.len());
        assert!(key.is_wiped());
        let salt = state.salt.as_ref().unwrap();
        assert_eq!(&[0; SALTBYTES], &**salt);
        assert_eq!([0; 8], state.session.h);
        assert_eq!([0; BLOCKBYTES], state.session.buf);
        assert_eq!(0, state.session.buflen);
        assert_eq!(0, state.session.count);

        // Idempotent, and the state stays unusable.
        state.dispose();
        state.reset();
        state.update(b"more");
        assert_eq!(0, state.session.buflen);
        assert_eq!(Err(Error::Disposed), state.finalize());
        assert!(state.update_range(b"abc", 0, 1).is_err());
        let mut out = [0xee; OUTBYTES];
        assert_eq!(Err(Error::Disposed), state.finalize_into(&mut out, 0));
        assert_eq!([0xee; OUTBYTES], out);
    }

    #[test]
    fn test_bad_range_wipes_and_poisons() {
        let mut state = State::new();
        state.update(b"partial block");
        assert_eq!(13, state.session.buflen);

        let err = state.update_range(b"abc", 2, 2).unwrap_err();
        assert_eq!(
            Error::InvalidRange {
                offset: 2,
                length: 2,
                available: 3
            },
            err
        );
        assert!(err.is_transient());
        assert_eq!(0, state.session.buflen);
        assert_eq!([0; BLOCKBYTES], state.session.buf);

        // Offsets that overflow are caught too.
        assert!(state.update_range(b"abc", usize::MAX, 2).is_err());

        // Finalizing refuses, but the cleanup still resets the state.
        assert_eq!(Err(Error::Poisoned), state.finalize());
        assert_eq!(Status::Absorbing, state.status);
        state.update(b"abc");
        assert_eq!(crate::blake2b(b"abc"), state.finalize().unwrap());
    }

    #[test]
    fn test_zero_length_range_is_noop() {
        let mut state = State::new();
        state.update_range(b"abc", 3, 0).unwrap();
        state.update_range(b"abc", 99, 0).unwrap();
        assert_eq!(0, state.count());
        assert_eq!(Status::Absorbing, state.status);
    }

    #[test]
    fn test_reset_clears_poison() {
        let mut state = State::new();
        state.update_range(b"", 1, 1).unwrap_err();
        assert_eq!(Status::Poisoned, state.status);
        state.reset();
        assert_eq!(Status::Absorbing, state.status);
        assert_eq!(crate::blake2b(b""), state.finalize().unwrap());
    }

    #[test]
    fn test_wipe_guard_without_commit() {
        let mut session = Session::empty();
        session.absorb(b"secret");
        {
            let guard = WipeOnExit::new(&mut session);
            assert_eq!(6, guard.buflen);
        }
        assert_eq!(0, session.buflen);
        assert_eq!([0; BLOCKBYTES], session.buf);

        session.absorb(b"kept");
        let guard = WipeOnExit::new(&mut session);
        guard.commit();
        assert_eq!(4, session.buflen);
    }

    #[test]
    fn test_finalize_wipes_session() {
        let mut session = Session::empty();
        session.h = IV;
        session.absorb(&[0xab; 300]);
        let mut out = [0; 20];
        session.finish(&mut out);
        assert_eq!([0; 8], session.h);
        assert_eq!([0; BLOCKBYTES], session.buf);
        assert_eq!(0, session.buflen);
        assert_eq!(0, session.count);
    }

    #[test]
    fn test_output_too_small() {
        let mut state = State::new();
        state.update(b"abc");
        let mut out = [0; OUTBYTES + 3];
        assert_eq!(
            Err(Error::OutputTooSmall {
                needed: OUTBYTES + 4,
                available: OUTBYTES + 3
            }),
            state.finalize_into(&mut out, 4)
        );
        assert_eq!([0; OUTBYTES + 3], out);
        // The failed finalize discarded the message.
        assert_eq!(0, state.count());
        assert_eq!(OUTBYTES, state.finalize_into(&mut out, 3).unwrap());
        assert_eq!(crate::blake2b(b"").as_bytes(), &out[3..]);
        assert_eq!([0; 3], out[..3]);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let mut state = Params::new().key(b"k").to_state().unwrap();
        state.update(b"ab");
        assert_eq!(
            "State { count: 130, hash_length: 64, key_length: 1, salted: false, status: Absorbing }",
            alloc::format!("{:?}", state)
        );
    }
}
