//! Identifier types.
//!
//! [`GameId`] is stable across processes: it is a pure function of the
//! replay's path relative to the replay root, so re-ingesting the same
//! file targets the same rows. [`UnitTag`] is only unique inside a single
//! replay and must never be persisted or compared across games.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Number of bits the decoder's tag index is shifted by before the
/// recycle counter is added.
const TAG_INDEX_SHIFT: u32 = 18;

/// Stable 64-bit identifier of an ingested game.
///
/// Serialized as a decimal string so 64-bit values survive JSON clients
/// that only have double-precision numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameId(i64);

impl GameId {
    /// Wrap a raw identifier read back from the store.
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Derive the identifier from a replay's relative path.
    ///
    /// The first eight bytes of the SHA-256 digest of the path, read as a
    /// big-endian signed integer.
    pub fn from_relative_path(relative_path: &str) -> Self {
        let digest = Sha256::digest(relative_path.as_bytes());
        let mut prefix = [0_u8; 8];
        for (dst, src) in prefix.iter_mut().zip(digest.iter()) {
            *dst = *src;
        }
        Self(i64::from_be_bytes(prefix))
    }

    /// Return the raw value as stored in the `game_id` columns.
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GameId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl Serialize for GameId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GameId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-replay identifier of a unit.
///
/// The decoder recycles tag indices; the recycle counter disambiguates
/// successive units sharing a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitTag(i64);

impl UnitTag {
    /// Combine a tag index and recycle counter.
    pub const fn new(index: i64, recycle: i64) -> Self {
        Self(index.wrapping_shl(TAG_INDEX_SHIFT).wrapping_add(recycle))
    }

    /// Return the combined value.
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UnitTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
