//! Working buffers for the AEAD modes
//!
//! CCM and GCM assemble their MAC input in one contiguous buffer. A
//! connection encrypting many messages can hand in a buffer it keeps around
//! ([`Scratch::Borrowed`]); otherwise a fresh one is allocated per call.
//! Allocation is fallible and a failure aborts the call before any output is
//! written.

use tracing::error;

use crate::error::CryptoError;

/// Borrowed or per-call working buffer
pub enum Scratch<'a> {
    /// Allocated for this call and dropped with it
    Owned(Vec<u8>),
    /// Caller-owned buffer, grown if needed and reused across calls
    Borrowed(&'a mut Vec<u8>),
}

impl Scratch<'_> {
    /// A per-call buffer
    pub const fn owned() -> Self {
        Self::Owned(Vec::new())
    }

    /// Clear the buffer and make room for `needed` bytes.
    pub(crate) fn prepare(
        &mut self,
        operation: &'static str,
        needed: usize,
    ) -> Result<&mut Vec<u8>, CryptoError> {
        let buffer = match self {
            Self::Owned(buffer) => buffer,
            Self::Borrowed(buffer) => &mut **buffer,
        };
        buffer.clear();
        if let Err(e) = buffer.try_reserve_exact(needed) {
            error!(operation, needed, "working buffer allocation failed: {e}");
            return Err(CryptoError::Allocation { operation, needed });
        }
        Ok(buffer)
    }
}

impl std::fmt::Debug for Scratch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (kind, buffer) = match self {
            Self::Owned(buffer) => ("Owned", buffer),
            Self::Borrowed(buffer) => ("Borrowed", &**buffer),
        };
        f.debug_struct("Scratch")
            .field("kind", &kind)
            .field("len", &buffer.len())
            .finish()
    }
}

impl Default for Scratch<'_> {
    fn default() -> Self {
        Self::owned()
    }
}

impl<'a> From<&'a mut Vec<u8>> for Scratch<'a> {
    fn from(buffer: &'a mut Vec<u8>) -> Self {
        Self::Borrowed(buffer)
    }
}
