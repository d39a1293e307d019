use crate::error::StateCodecError;
use crate::hash::{decode_hash_vec, encode_hash_vec, ChangeHash};
use crate::message::Have;

const STATE_TYPE_PERSISTED: u8 = 0x43;

/// Per-remote-peer sync state (spec §3). Only [`State::shared_heads`] is
/// persisted across restarts; every other field is ephemeral and reset to
/// its empty default on reload, matching the teacher's
/// `SyncState`/`sync::State`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    /// Hashes the sender is confident both peers hold. Monotone across
    /// successful exchanges.
    pub shared_heads: Vec<ChangeHash>,
    /// Heads reported in our most recent outgoing message, used to
    /// suppress redundant sends.
    pub last_sent_heads: Vec<ChangeHash>,
    /// Last heads the peer told us.
    pub their_heads: Option<Vec<ChangeHash>>,
    /// Last explicit needs the peer told us.
    pub their_need: Option<Vec<ChangeHash>>,
    /// Hashes we are still missing to apply `unapplied_changes`.
    pub our_need: Vec<ChangeHash>,
    /// The peer's most recent `Have` entries, consumed on our next send.
    pub their_have: Option<Vec<Have>>,
    /// Changes the peer has sent that we cannot yet apply because
    /// intermediate dependencies are still missing.
    pub unapplied_changes: Vec<Vec<u8>>,
    /// Raw change blobs already transmitted to this peer, for
    /// checksum-indexed deduplication (§4.6).
    pub sent_changes: Vec<Vec<u8>>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes the persisted subset of peer state (spec §4.4):
    /// `0x43` followed by the `shared_heads` hash vector. Everything else
    /// is ephemeral and is not written.
    pub fn encode(&self) -> Result<Vec<u8>, StateCodecError> {
        let mut buf = vec![STATE_TYPE_PERSISTED];
        encode_hash_vec(&mut buf, &self.shared_heads)?;
        Ok(buf)
    }

    /// Reconstructs a [`State`] from bytes written by [`State::encode`],
    /// with `shared_heads` restored and every other field reset to its
    /// empty default. Trailing bytes are ignored.
    pub fn decode(input: &[u8]) -> Result<Self, StateCodecError> {
        let (first, rest) = input
            .split_first()
            .ok_or(StateCodecError::Truncated)?;
        if *first != STATE_TYPE_PERSISTED {
            return Err(StateCodecError::WrongType(*first));
        }
        let (_, shared_heads) = decode_hash_vec(rest)?;
        Ok(State {
            shared_heads,
            ..State::default()
        })
    }
}
