use std::convert::TryFrom;
use std::fmt;

use itertools::Itertools;

use crate::error::FormatError;

/// A 32-byte SHA-256 hash identifying a change (spec §3).
///
/// On the wire this is raw bytes; in memory and in logs it round-trips
/// through a 64-character lowercase hex string, matching the teacher's
/// `ChangeHash` hex `Serialize`/`Deserialize` impls.
#[derive(Eq, PartialEq, Debug, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct ChangeHash(pub [u8; 32]);

impl ChangeHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl TryFrom<&[u8]> for ChangeHash {
    type Error = FormatError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != 32 {
            return Err(FormatError::BadHashLength(bytes.len()));
        }
        let mut array = [0u8; 32];
        array.copy_from_slice(bytes);
        Ok(ChangeHash(array))
    }
}

impl fmt::Display for ChangeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl serde::Serialize for ChangeHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_hex().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for ChangeHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(|_| {
            serde::de::Error::invalid_value(serde::de::Unexpected::Str(&s), &"a hex string")
        })?;
        ChangeHash::try_from(bytes.as_slice()).map_err(|_| {
            serde::de::Error::invalid_value(
                serde::de::Unexpected::Str(&s),
                &"a 32 byte hex encoded hash",
            )
        })
    }
}

/// Encodes a sorted hash vector: a 4-byte little-endian count followed by
/// that many raw 32-byte hashes, in ascending lexicographic order of their
/// hex form (spec §4.2). Panics via an error if `hashes` is not strictly
/// ascending with no duplicates — callers are expected to sort+dedup their
/// head/need sets before encoding.
pub fn encode_hash_vec(buf: &mut Vec<u8>, hashes: &[ChangeHash]) -> Result<(), FormatError> {
    if hashes.windows(2).any(|w| w[0] >= w[1]) {
        return Err(FormatError::UnsortedHashes);
    }
    buf.extend_from_slice(&(hashes.len() as u32).to_le_bytes());
    for hash in hashes {
        buf.extend_from_slice(&hash.0);
    }
    Ok(())
}

/// Decodes a hash vector written by [`encode_hash_vec`]. Does not re-sort;
/// returns `(remaining_input, hashes)` in whatever order was on the wire.
pub fn decode_hash_vec(input: &[u8]) -> Result<(&[u8], Vec<ChangeHash>), FormatError> {
    let (count, mut rest) = read_u32(input)?;
    let mut hashes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if rest.len() < 32 {
            return Err(FormatError::Truncated);
        }
        let (head, tail) = rest.split_at(32);
        hashes.push(ChangeHash::try_from(head)?);
        rest = tail;
    }
    Ok((rest, hashes))
}

pub(crate) fn read_u32(input: &[u8]) -> Result<(u32, &[u8]), FormatError> {
    if input.len() < 4 {
        return Err(FormatError::Truncated);
    }
    let (head, tail) = input.split_at(4);
    let mut arr = [0u8; 4];
    arr.copy_from_slice(head);
    Ok((u32::from_le_bytes(arr), tail))
}

/// Sorts and removes duplicates from a vector of hashes (used throughout
/// the sync state machine whenever heads/need sets are combined), matching
/// the teacher's own `.unique().sorted()` combinator at the equivalent call
/// site in its shared-heads update.
pub fn sorted_unique(hashes: impl IntoIterator<Item = ChangeHash>) -> Vec<ChangeHash> {
    hashes.into_iter().unique().sorted().collect()
}
