use core::fmt;

use crate::secure::SecretBuffer;
use crate::{ConfigError, Error, Hash, State, KEYBYTES, OUTBYTES, SALTBYTES};

/// A parameter builder for `State`.
///
/// `Params` only borrows the key and salt. Nothing is validated or copied until `to_state`, which
/// rejects bad parameters before building any state, and copies the key into a `SecretBuffer`
/// owned by the new `State`.
///
/// # Example
///
/// ```
/// let key = b"The Magic Words are Squeamish Ossifrage";
/// let mut params = blake2b_keyed::Params::new();
/// params.hash_length(16).key(key);
/// let mut state = params.to_state()?;
/// state.update(b"foo").update(b"bar");
/// let mac = state.finalize()?;
/// assert_eq!(16, mac.as_bytes().len());
/// # Ok::<(), blake2b_keyed::Error>(())
/// ```
#[derive(Clone, Copy)]
pub struct Params<'a> {
    hash_length: usize,
    key: Option<&'a [u8]>,
    salt: Option<&'a [u8]>,
}

impl<'a> Params<'a> {
    /// Equivalent to `Params::default()`.
    pub fn new() -> Self {
        Self {
            hash_length: OUTBYTES,
            key: None,
            salt: None,
        }
    }

    /// Set the length of the final hash in bytes, from 1 to `OUTBYTES` (64). Apart from
    /// controlling the length of the final `Hash`, this is also associated data, and changing it
    /// will result in a totally different hash.
    pub fn hash_length(&mut self, length: usize) -> &mut Self {
        self.hash_length = length;
        self
    }

    /// Use a secret key, so that BLAKE2b acts as a MAC. The maximum key length is `KEYBYTES`
    /// (64). An empty key is equivalent to having no key at all.
    pub fn key(&mut self, key: &'a [u8]) -> &mut Self {
        self.key = Some(key);
        self
    }

    /// Use a salt of exactly `SALTBYTES` (16) bytes.
    pub fn salt(&mut self, salt: &'a [u8]) -> &mut Self {
        self.salt = Some(salt);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.hash_length < 1 || self.hash_length > OUTBYTES {
            return Err(ConfigError::HashLength(self.hash_length));
        }
        if let Some(key) = self.key {
            if key.len() > KEYBYTES {
                return Err(ConfigError::KeyLength(key.len()));
            }
        }
        if let Some(salt) = self.salt {
            if salt.len() != SALTBYTES {
                return Err(ConfigError::SaltLength(salt.len()));
            }
        }
        Ok(())
    }

    /// Construct a `State` from these parameters.
    pub fn to_state(&self) -> Result<State, Error> {
        if let Err(e) = self.validate() {
            log::debug!("rejecting BLAKE2b parameters: {}", e);
            return Err(e.into());
        }
        let key = match self.key {
            Some(key) if !key.is_empty() => Some(SecretBuffer::from_slice(key)?),
            _ => None,
        };
        let salt = self.salt.map(|salt| {
            let mut array = [0; SALTBYTES];
            array.copy_from_slice(salt);
            array
        });
        Ok(State::with_parts(self.hash_length as u8, key, salt))
    }

    /// Hash an input all at once with these parameters.
    pub fn hash(&self, input: &[u8]) -> Result<Hash, Error> {
        let mut state = self.to_state()?;
        state.update(input);
        Ok(state.into_hash())
    }
}

impl<'a> Default for Params<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> fmt::Debug for Params<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Params {{ hash_length: {}, key_length: {}, salted: {} }}",
            self.hash_length,
            // NB: Don't print the key itself. Debug shouldn't leak secrets.
            self.key.map_or(0, |k| k.len()),
            self.salt.is_some(),
        )
    }
}
