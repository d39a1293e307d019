use crate::hash::ChangeHash;

/// Metadata the sync core needs about a change without understanding its
/// contents (spec §3, §6.4 `decode_change_meta`): its hash and explicit
/// dependency hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMeta {
    pub hash: ChangeHash,
    pub deps: Vec<ChangeHash>,
}

/// Reads the 32-bit checksum the document layer stores at byte offset 4..8
/// of a change blob (spec §3, §6.4 `get_change_checksum`), used only for
/// cheap deduplication (§4.6). Opaque to the sync core beyond its byte
/// offset and uniform distribution.
pub fn checksum_of(change: &[u8]) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&change[4..8]);
    u32::from_le_bytes(bytes)
}

/// The contract the sync core requires of the document store that owns the
/// change DAG (spec §6.4). Document semantics, CRDT merge rules, and
/// on-disk storage are the implementor's concern; the sync core only reads
/// heads, reads/writes changes by hash, and asks about missing
/// dependencies.
pub trait Backend {
    type Error: std::error::Error;
    /// Opaque result of applying changes (spec calls this a "patch").
    type Patch;

    /// The current heads of the change DAG (order-independent; the sync
    /// core sorts where it needs to).
    fn heads(&self) -> Vec<ChangeHash>;

    /// The change blob for `hash`, if known, alongside its metadata.
    fn change_by_hash(&self, hash: &ChangeHash) -> Option<(&[u8], ChangeMeta)>;

    /// All changes not reachable from `frontier`, in DAG-topological order
    /// (dependencies before dependents), alongside their metadata.
    fn changes_since(&self, frontier: &[ChangeHash]) -> Vec<(&[u8], ChangeMeta)>;

    /// Hashes referenced as dependencies of `changes` or as entries of
    /// `heads` that this backend lacks even after considering `changes`.
    fn missing_deps(&self, changes: &[Vec<u8>], heads: &[ChangeHash]) -> Vec<ChangeHash>;

    /// Applies `changes` to the store. Must be idempotent and tolerant of
    /// duplicates, and must respect DAG order.
    fn apply_changes(&mut self, changes: Vec<Vec<u8>>) -> Result<Self::Patch, Self::Error>;
}
