use std::collections::{HashMap, HashSet};

use crate::backend::{Backend, ChangeMeta};
use crate::hash::ChangeHash;
use crate::message::Have;

/// Computes the dependency-closed set of changes to transmit, given what
/// the peer claims to already have (`have`) and what it explicitly asked
/// for (`need`) (spec §4.5).
///
/// The WHY: send a dependency-closed superset of what the peer lacks,
/// compensating for Bloom-filter false negatives via dependency closure
/// and for false positives via the next round of exchange.
pub fn changes_to_send<'b, B: Backend>(
    backend: &'b B,
    have: &[Have],
    need: &[ChangeHash],
) -> Vec<(&'b [u8], ChangeMeta)> {
    if have.is_empty() {
        // Fast path: nothing to reconcile against, answer the explicit ask.
        return need
            .iter()
            .filter_map(|hash| backend.change_by_hash(hash))
            .collect();
    }

    let mut last_sync_hashes: HashSet<ChangeHash> = HashSet::new();
    for h in have {
        last_sync_hashes.extend(h.last_sync.iter().copied());
    }
    let last_sync_hashes: Vec<ChangeHash> = last_sync_hashes.into_iter().collect();

    let candidates: Vec<(&[u8], ChangeMeta)> = backend.changes_since(&last_sync_hashes);

    let mut known_hashes: HashSet<ChangeHash> = HashSet::with_capacity(candidates.len());
    let mut dependents: HashMap<ChangeHash, Vec<ChangeHash>> = HashMap::new();
    let mut to_send: HashSet<ChangeHash> = HashSet::new();

    for (_, meta) in &candidates {
        known_hashes.insert(meta.hash);
        for dep in &meta.deps {
            dependents.entry(*dep).or_default().push(meta.hash);
        }
        if have.iter().all(|h| !h.bloom.contains_hash(&meta.hash)) {
            to_send.insert(meta.hash);
        }
    }

    // Dependency closure: anything Bloom-negative pulls its dependents in
    // too, so the peer never ends up with a missing-dependency gap caused
    // by a false positive upstream of something we do send.
    let mut stack: Vec<ChangeHash> = to_send.iter().copied().collect();
    while let Some(hash) = stack.pop() {
        if let Some(deps) = dependents.get(&hash) {
            for dep in deps {
                if to_send.insert(*dep) {
                    stack.push(*dep);
                }
            }
        }
    }

    let mut out = Vec::new();
    for hash in need {
        to_send.insert(*hash);
        if !known_hashes.contains(hash) {
            if let Some(entry) = backend.change_by_hash(hash) {
                out.push(entry);
            }
        }
    }

    for (bytes, meta) in candidates {
        if to_send.contains(&meta.hash) {
            out.push((bytes, meta));
        }
    }

    out
}
