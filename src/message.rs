use crate::bloom::BloomFilter;
use crate::error::MessageCodecError;
use crate::hash::{decode_hash_vec, encode_hash_vec, read_u32, ChangeHash};

const MESSAGE_TYPE_SYNC: u8 = 0x42;

/// A summary of the changes the sender already has: "I hold everything
/// reachable from `last_sync`, plus what `bloom` matches" (spec §3).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Have {
    pub last_sync: Vec<ChangeHash>,
    pub bloom: BloomFilter,
}

/// A sync message exchanged between two peers (spec §3, §4.3).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Message {
    pub heads: Vec<ChangeHash>,
    pub need: Vec<ChangeHash>,
    pub have: Vec<Have>,
    pub changes: Vec<Vec<u8>>,
}

impl Message {
    /// Wire layout (spec §4.3), sequential with no padding:
    /// `0x42, heads, need, haveCount, have entries, changeCount, changes`.
    /// `have` and `changes` entries are each a 4-byte LE length prefix
    /// followed by their bytes.
    pub fn encode(&self) -> Result<Vec<u8>, MessageCodecError> {
        let mut buf = vec![MESSAGE_TYPE_SYNC];
        encode_hash_vec(&mut buf, &self.heads)?;
        encode_hash_vec(&mut buf, &self.need)?;

        buf.extend_from_slice(&(self.have.len() as u32).to_le_bytes());
        for have in &self.have {
            encode_hash_vec(&mut buf, &have.last_sync)?;
            let bloom_bytes = have.bloom.to_bytes();
            buf.extend_from_slice(&(bloom_bytes.len() as u32).to_le_bytes());
            buf.extend_from_slice(&bloom_bytes);
        }

        buf.extend_from_slice(&(self.changes.len() as u32).to_le_bytes());
        for change in &self.changes {
            buf.extend_from_slice(&(change.len() as u32).to_le_bytes());
            buf.extend_from_slice(change);
        }

        Ok(buf)
    }

    /// Decodes a message produced by [`Message::encode`]. Trailing bytes
    /// after the final change are ignored for forward compatibility.
    pub fn decode(input: &[u8]) -> Result<Self, MessageCodecError> {
        let (first, rest) = input
            .split_first()
            .ok_or(MessageCodecError::Truncated)?;
        if *first != MESSAGE_TYPE_SYNC {
            return Err(MessageCodecError::WrongType(*first));
        }

        let (rest, heads) = decode_hash_vec(rest)?;
        let (rest, need) = decode_hash_vec(rest)?;

        let (have_count, mut rest) = read_u32(rest)?;
        let mut have = Vec::with_capacity(have_count as usize);
        for _ in 0..have_count {
            let (after_hashes, last_sync) = decode_hash_vec(rest)?;
            let (bloom_len, after_len) = read_u32(after_hashes)?;
            let bloom_len = bloom_len as usize;
            if after_len.len() < bloom_len {
                return Err(MessageCodecError::Truncated);
            }
            let (bloom_bytes, after_bloom) = after_len.split_at(bloom_len);
            have.push(Have {
                last_sync,
                bloom: BloomFilter::from_bytes(bloom_bytes),
            });
            rest = after_bloom;
        }

        let (change_count, mut rest) = read_u32(rest)?;
        let mut changes = Vec::with_capacity(change_count as usize);
        for _ in 0..change_count {
            let (len, after_len) = read_u32(rest)?;
            let len = len as usize;
            if after_len.len() < len {
                return Err(MessageCodecError::Truncated);
            }
            let (bytes, after_bytes) = after_len.split_at(len);
            changes.push(bytes.to_vec());
            rest = after_bytes;
        }

        Ok(Message {
            heads,
            need,
            have,
            changes,
        })
    }
}
