//! Runtime failures reported by token operations.
//!
//! Illegal conversions never get this far: they are rejected by the type
//! system. What remains are the two conditions a caller is expected to handle.

/// The error type for token operations that can fail at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    /// Another read lock was held when the upgrade was attempted, or this read
    /// token already failed an upgrade. Drop the read token, optionally call
    /// `rd2wryield`, and start over with a fresh read token.
    UpgradeContended,
    /// The tracked wrapper no longer exists.
    ObjectGone,
}

impl AccessError {
    /// Returns `true` if retrying the whole read-then-write sequence can succeed.
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::UpgradeContended)
    }
}

impl core::fmt::Display for AccessError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UpgradeContended => f.write_str("read-to-write upgrade refused while other readers hold the lock"),
            Self::ObjectGone => f.write_str("tracked object no longer exists"),
        }
    }
}

impl std::error::Error for AccessError {}
