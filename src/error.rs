//! Errors reported by `Params` and `State`.
//!
//! None of these carry secret material. Lengths and offsets are reported, key and salt bytes
//! never are.

use core::fmt;

/// A parameter rejected at construction time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The hash length was outside `1..=OUTBYTES`.
    HashLength(usize),
    /// The key was longer than `KEYBYTES`.
    KeyLength(usize),
    /// A salt was supplied that wasn't exactly `SALTBYTES` long.
    SaltLength(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ConfigError::HashLength(len) => {
                write!(f, "bad hash length: {} (must be 1 to {})", len, crate::OUTBYTES)
            }
            ConfigError::KeyLength(len) => {
                write!(f, "bad key length: {} (max {})", len, crate::KEYBYTES)
            }
            ConfigError::SaltLength(len) => {
                write!(f, "bad salt length: {} (must be {})", len, crate::SALTBYTES)
            }
        }
    }
}

/// Errors from building or driving a `State`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The parameters were rejected before any state was built.
    InvalidConfiguration(ConfigError),
    /// Secure memory for the key copy couldn't be allocated.
    Allocation,
    /// `update_range` was asked for bytes outside its input. The block buffer has been wiped and
    /// the state must be `reset` before it can finalize again.
    InvalidRange {
        offset: usize,
        length: usize,
        available: usize,
    },
    /// The `finalize_into` destination can't hold the digest at the requested offset.
    OutputTooSmall { needed: usize, available: usize },
    /// A previous update failed and the state hasn't been `reset` since.
    Poisoned,
    /// The state has been disposed.
    Disposed,
}

impl Error {
    /// Whether this is a failure of a particular call rather than of the configuration. After a
    /// transient failure the state can be brought back with `reset`.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Allocation | Error::InvalidRange { .. } | Error::Poisoned
        )
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::InvalidConfiguration(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfiguration(e) => write!(f, "invalid configuration: {}", e),
            Error::Allocation => f.write_str("secure memory allocation failed"),
            Error::InvalidRange {
                offset,
                length,
                available,
            } => write!(
                f,
                "input range {}+{} is out of bounds for {} bytes",
                offset, length, available
            ),
            Error::OutputTooSmall { needed, available } => write!(
                f,
                "output buffer too small: need {} bytes, have {}",
                needed, available
            ),
            Error::Poisoned => f.write_str("state poisoned by a failed update, reset required"),
            Error::Disposed => f.write_str("state has been disposed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidConfiguration(e) => Some(e),
            _ => None,
        }
    }
}
