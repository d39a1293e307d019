//! A minimal in-memory [`Backend`] implementation.
//!
//! This is grounded on `automerge-backend::Backend`'s public shape
//! (`get_heads`/`get_changes`/`get_missing_deps`/`apply_changes`) but
//! without any of that crate's CRDT op-set machinery — document semantics
//! are explicitly out of scope here (spec §1), so a change is just an
//! opaque byte payload plus an explicit dependency list. It exists for the
//! test suite and as a worked example for integrators bringing their own
//! store; it is not meant to be a production document store.

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;

use sha2::{Digest, Sha256};

use crate::backend::{Backend, ChangeMeta};
use crate::hash::ChangeHash;

/// Encodes a change as `[reserved:4][checksum:4][num_deps:4][deps...][payload]`,
/// matching spec §3's "32-bit checksum at byte offset 4..8" convention.
/// This layout is `MemBackend`'s own; the sync core never interprets it.
fn encode_change(deps: &[ChangeHash], payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let checksum = u32::from_le_bytes(Sha256::digest(payload)[0..4].try_into().unwrap());
    buf.extend_from_slice(&checksum.to_le_bytes());
    buf.extend_from_slice(&(deps.len() as u32).to_le_bytes());
    for dep in deps {
        buf.extend_from_slice(dep.as_bytes());
    }
    buf.extend_from_slice(payload);
    buf
}

fn decode_deps(blob: &[u8]) -> Vec<ChangeHash> {
    let num_deps = u32::from_le_bytes(blob[8..12].try_into().unwrap()) as usize;
    let mut deps = Vec::with_capacity(num_deps);
    let mut offset = 12;
    for _ in 0..num_deps {
        let bytes: [u8; 32] = blob[offset..offset + 32].try_into().unwrap();
        deps.push(ChangeHash(bytes));
        offset += 32;
    }
    deps
}

fn hash_of(blob: &[u8]) -> ChangeHash {
    ChangeHash(Sha256::digest(blob).into())
}

struct StoredChange {
    bytes: Vec<u8>,
    deps: Vec<ChangeHash>,
}

/// A flat, in-memory hash-DAG store.
#[derive(Default)]
pub struct MemBackend {
    changes: HashMap<ChangeHash, StoredChange>,
    heads: HashSet<ChangeHash>,
    insertion_order: Vec<ChangeHash>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and stores a change with the given explicit dependencies
    /// and payload, returning its hash. Convenience for tests; a real
    /// integration would construct changes through its own document API.
    pub fn push(&mut self, deps: Vec<ChangeHash>, payload: &[u8]) -> ChangeHash {
        let bytes = encode_change(&deps, payload);
        let hash = hash_of(&bytes);
        self.insert_raw(hash, deps, bytes);
        hash
    }

    fn insert_raw(&mut self, hash: ChangeHash, deps: Vec<ChangeHash>, bytes: Vec<u8>) {
        if self.changes.contains_key(&hash) {
            return;
        }
        for dep in &deps {
            self.heads.remove(dep);
        }
        self.heads.insert(hash);
        self.insertion_order.push(hash);
        self.changes.insert(hash, StoredChange { bytes, deps });
    }

    /// All hashes reachable (inclusive) from `frontier` by walking deps.
    fn ancestors_of(&self, frontier: &[ChangeHash]) -> HashSet<ChangeHash> {
        let mut seen: HashSet<ChangeHash> = HashSet::new();
        let mut stack: Vec<ChangeHash> = frontier.to_vec();
        while let Some(hash) = stack.pop() {
            if !seen.insert(hash) {
                continue;
            }
            if let Some(change) = self.changes.get(&hash) {
                stack.extend(change.deps.iter().copied());
            }
        }
        seen
    }
}

impl Backend for MemBackend {
    type Error = Infallible;
    type Patch = Vec<ChangeHash>;

    fn heads(&self) -> Vec<ChangeHash> {
        self.heads.iter().copied().collect()
    }

    fn change_by_hash(&self, hash: &ChangeHash) -> Option<(&[u8], ChangeMeta)> {
        self.changes.get(hash).map(|c| {
            (
                c.bytes.as_slice(),
                ChangeMeta {
                    hash: *hash,
                    deps: c.deps.clone(),
                },
            )
        })
    }

    fn changes_since(&self, frontier: &[ChangeHash]) -> Vec<(&[u8], ChangeMeta)> {
        let excluded = self.ancestors_of(frontier);
        // insertion_order is already a valid topological order since a
        // change can only be pushed once its deps are already stored.
        self.insertion_order
            .iter()
            .filter(|hash| !excluded.contains(hash))
            .map(|hash| {
                let change = &self.changes[hash];
                (
                    change.bytes.as_slice(),
                    ChangeMeta {
                        hash: *hash,
                        deps: change.deps.clone(),
                    },
                )
            })
            .collect()
    }

    fn missing_deps(&self, changes: &[Vec<u8>], heads: &[ChangeHash]) -> Vec<ChangeHash> {
        let pending_hashes: HashSet<ChangeHash> =
            changes.iter().map(|bytes| hash_of(bytes)).collect();

        let mut needed: HashSet<ChangeHash> = HashSet::new();
        for bytes in changes {
            for dep in decode_deps(bytes) {
                if !self.changes.contains_key(&dep) && !pending_hashes.contains(&dep) {
                    needed.insert(dep);
                }
            }
        }
        for head in heads {
            if !self.changes.contains_key(head) && !pending_hashes.contains(head) {
                needed.insert(*head);
            }
        }

        let mut out: Vec<ChangeHash> = needed.into_iter().collect();
        out.sort();
        out
    }

    fn apply_changes(&mut self, changes: Vec<Vec<u8>>) -> Result<Self::Patch, Self::Error> {
        // Apply in dependency order: repeatedly insert any change whose
        // deps are already satisfied, until no more progress is made.
        let mut pending: HashMap<ChangeHash, Vec<u8>> = changes
            .into_iter()
            .map(|bytes| (hash_of(&bytes), bytes))
            .collect();
        let mut applied = Vec::new();

        loop {
            let ready: Vec<ChangeHash> = pending
                .keys()
                .filter(|hash| {
                    let bytes = &pending[*hash];
                    decode_deps(bytes)
                        .iter()
                        .all(|dep| self.changes.contains_key(dep))
                })
                .copied()
                .collect();
            if ready.is_empty() {
                break;
            }
            for hash in ready {
                if let Some(bytes) = pending.remove(&hash) {
                    if self.changes.contains_key(&hash) {
                        applied.push(hash);
                        continue;
                    }
                    let deps = decode_deps(&bytes);
                    self.insert_raw(hash, deps, bytes);
                    applied.push(hash);
                }
            }
        }

        Ok(applied)
    }
}
