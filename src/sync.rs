use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::backend::Backend;
use crate::bloom::BloomFilter;
use crate::dedup::deduplicate;
use crate::error::DagsyncError;
use crate::hash::{sorted_unique, ChangeHash};
use crate::message::{Have, Message};
use crate::selector::changes_to_send;
use crate::state::State;

/// Generates the next outgoing message for a peer, advancing `sync_state`
/// in place (spec §4.7). Returns `None` when nothing needs to cross the
/// wire (the convergence short-circuit).
#[instrument(level = "debug", skip(backend, sync_state))]
pub fn generate_sync_message<B: Backend>(backend: &B, sync_state: &mut State) -> Option<Message> {
    let our_heads = sorted_unique(backend.heads());

    let their_heads_set: HashSet<ChangeHash> = sync_state
        .their_heads
        .as_ref()
        .map(|heads| heads.iter().copied().collect())
        .unwrap_or_default();

    // Have construction: only solicit more if we're not purely blocked on
    // explicit missing deps the peer already knows about (§4.7 step 2).
    let have = if sync_state
        .our_need
        .iter()
        .all(|h| their_heads_set.contains(h))
    {
        vec![make_have(backend, &sync_state.shared_heads)]
    } else {
        Vec::new()
    };

    // Reset detection: the peer's last reported `have.last_sync` names a
    // hash we don't have at all. Reply with a from-scratch request without
    // mutating persistent state (§4.7 step 3).
    if let Some(their_have) = sync_state.their_have.as_ref() {
        if let Some(first) = their_have.first() {
            let unknown_history = first
                .last_sync
                .iter()
                .any(|hash| backend.change_by_hash(hash).is_none());
            if unknown_history {
                debug!("peer's last_sync references unknown history, sending reset");
                return Some(Message {
                    heads: our_heads,
                    need: Vec::new(),
                    have: vec![Have::default()],
                    changes: Vec::new(),
                });
            }
        }
    }

    let candidates = if let (Some(their_have), Some(their_need)) =
        (sync_state.their_have.as_ref(), sync_state.their_need.as_ref())
    {
        changes_to_send(backend, their_have, their_need)
    } else {
        Vec::new()
    };

    let heads_unchanged = sync_state.last_sent_heads == our_heads;
    let heads_equal = sync_state
        .their_heads
        .as_ref()
        .map(|theirs| theirs == &our_heads)
        .unwrap_or(false);

    if heads_unchanged && heads_equal && candidates.is_empty() && sync_state.our_need.is_empty() {
        return None;
    }

    let candidate_bytes: Vec<&[u8]> = candidates.iter().map(|(bytes, _)| *bytes).collect();
    let to_send: Vec<Vec<u8>> = deduplicate(&sync_state.sent_changes, candidate_bytes)
        .into_iter()
        .map(|bytes| bytes.to_vec())
        .collect();

    debug!(sent = to_send.len(), "emitting sync message");

    let message = Message {
        heads: our_heads.clone(),
        have,
        need: sync_state.our_need.clone(),
        changes: to_send.clone(),
    };

    sync_state.last_sent_heads = our_heads;
    sync_state.sent_changes.extend(to_send);

    Some(message)
}

/// Applies an incoming message, advancing `sync_state` (spec §4.8).
/// Returns the patch produced by applying any changes, if the message
/// carried changes that were fully applicable.
#[instrument(level = "debug", skip(backend, sync_state, message))]
pub fn receive_sync_message<B: Backend>(
    backend: &mut B,
    sync_state: &mut State,
    message: Message,
) -> Result<Option<B::Patch>, DagsyncError<B::Error>> {
    let before_heads = sorted_unique(backend.heads());

    let Message {
        heads: message_heads,
        need: message_need,
        have: message_have,
        changes: message_changes,
    } = message;

    let mut patch = None;

    if !message_changes.is_empty() {
        sync_state.unapplied_changes.extend(message_changes);

        let recomputed_need = backend.missing_deps(&sync_state.unapplied_changes, &message_heads);

        // "No unresolved intermediate dependencies": the only hashes we're
        // still missing are the message's own heads (§4.8 step 2).
        let only_missing_are_heads = recomputed_need
            .iter()
            .all(|hash| message_heads.contains(hash));

        if only_missing_are_heads {
            let pending = std::mem::take(&mut sync_state.unapplied_changes);
            patch = Some(
                backend
                    .apply_changes(pending)
                    .map_err(DagsyncError::Backend)?,
            );
            sync_state.shared_heads = advance_heads(
                &before_heads,
                &sorted_unique(backend.heads()),
                &sync_state.shared_heads,
            );
        }
        sync_state.our_need = recomputed_need;
    } else if message_heads == before_heads {
        sync_state.last_sent_heads = message_heads.clone();
    }

    // Shared-head update by coverage (§4.8 step 4): conservative when the
    // peer is ahead of us, exact once we know every reported head.
    let known_heads: Vec<ChangeHash> = message_heads
        .iter()
        .filter(|hash| backend.change_by_hash(hash).is_some())
        .copied()
        .collect();

    if known_heads.len() == message_heads.len() {
        sync_state.shared_heads = message_heads.clone();
    } else {
        sync_state.shared_heads = sorted_unique(
            sync_state
                .shared_heads
                .iter()
                .chain(known_heads.iter())
                .copied()
                .collect(),
        );
    }

    sync_state.their_have = Some(message_have);
    sync_state.their_heads = Some(message_heads);
    sync_state.their_need = Some(message_need);

    Ok(patch)
}

/// `advanceHeads` (spec §4.9): heads newly produced by applying received
/// changes, plus previously-shared heads not displaced by them.
pub fn advance_heads(
    my_old_heads: &[ChangeHash],
    my_new_heads: &[ChangeHash],
    our_old_shared_heads: &[ChangeHash],
) -> Vec<ChangeHash> {
    let new_heads = my_new_heads.iter().filter(|h| !my_old_heads.contains(h));
    let common_heads = our_old_shared_heads
        .iter()
        .filter(|h| my_new_heads.contains(h));
    sorted_unique(new_heads.chain(common_heads).copied().collect())
}

fn make_have<B: Backend>(backend: &B, last_sync: &[ChangeHash]) -> Have {
    let hashes = backend
        .changes_since(last_sync)
        .into_iter()
        .map(|(_, meta)| meta.hash);
    Have {
        last_sync: last_sync.to_vec(),
        bloom: BloomFilter::from_hashes(hashes),
    }
}
