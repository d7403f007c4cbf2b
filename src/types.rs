use derive_more::{Display, From, Into};
use rustc_hash::FxBuildHasher;
use std::collections::HashMap as _HashMap;
use thiserror::Error;

pub(crate) type HashMap<K, V> = _HashMap<K, V, FxBuildHasher>;

/// Compact identifier of a channel (graph edge).
///
/// The wire form packs the funding transaction's location as
/// `block_height (24 bits) | tx_index (24 bits) | output_index (16 bits)`.
/// Persisted channel ids are the same packed integer, so both forms map onto
/// one key space through `From<u64>`. Displays as
/// `block_height:tx_index:output_index`.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
#[display("{}:{}:{}", _0 >> 40, (_0 >> 16) & 0xff_ffff, _0 & 0xffff)]
pub struct ShortChannelId(u64);

impl ShortChannelId {
    /// Pack a channel location into an identifier.
    ///
    /// `block_height` and `tx_index` are truncated to 24 bits.
    #[must_use]
    pub const fn new(block_height: u32, tx_index: u32, output_index: u16) -> Self {
        Self(
            ((block_height as u64 & 0xff_ffff) << 40)
                | ((tx_index as u64 & 0xff_ffff) << 16)
                | output_index as u64,
        )
    }

    /// Height of the block containing the funding transaction.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn block_height(self) -> u32 {
        (self.0 >> 40) as u32
    }

    /// Index of the funding transaction within its block.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn tx_index(self) -> u32 {
        ((self.0 >> 16) & 0xff_ffff) as u32
    }

    /// Index of the funding output within the transaction.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn output_index(self) -> u16 {
        self.0 as u16
    }

    /// The packed integer form.
    #[must_use]
    pub const fn to_u64(self) -> u64 {
        self.0
    }
}

/// Length in bytes of a compressed node public key.
pub const VERTEX_LEN: usize = 33;

/// Error produced when building a [`Vertex`] from raw bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VertexError {
    /// The key is not a 33-byte compressed public key.
    #[error("node key must be {VERTEX_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// Identifier of a graph node: its compressed public key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
pub struct Vertex([u8; VERTEX_LEN]);

impl Vertex {
    /// Build a vertex from a serialized compressed public key.
    ///
    /// # Errors
    /// If `bytes` is not exactly [`VERTEX_LEN`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, VertexError> {
        <[u8; VERTEX_LEN]>::try_from(bytes)
            .map(Self)
            .map_err(|_| VertexError::InvalidLength(bytes.len()))
    }

    /// The raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; VERTEX_LEN] {
        &self.0
    }
}

impl core::fmt::Display for Vertex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
    }
}
