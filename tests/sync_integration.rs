use pretty_assertions::assert_eq;

use dagsync::mem::MemBackend;
use dagsync::state::State;
use dagsync::{sync, Backend, BloomFilter, Have, Message};

/// Runs both peers until neither has anything left to send, returning the
/// number of messages exchanged. Mirrors the teacher's own sync test
/// harness (`rust/automerge/src/sync.rs`'s `fn sync`): generate from both
/// sides against the *current* state before delivering either, so a reply
/// is never derived from a message the other side just produced this same
/// round.
const MAX_ITER: usize = 10;

/// Turns on the `debug!` traces `generate_sync_message`/
/// `receive_sync_message` emit so `cargo test -- --nocapture` shows the
/// sync round-trip; harmless (and idempotent) when a subscriber is already
/// installed.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn run_to_convergence(
    a: &mut MemBackend,
    a_state: &mut State,
    b: &mut MemBackend,
    b_state: &mut State,
) -> usize {
    let mut messages = 0;
    let mut iterations = 0;
    loop {
        let a_to_b = sync::generate_sync_message(a, a_state);
        let b_to_a = sync::generate_sync_message(b, b_state);
        if a_to_b.is_none() && b_to_a.is_none() {
            break;
        }
        if iterations > MAX_ITER {
            panic!("failed to converge in {MAX_ITER} iterations");
        }
        if let Some(msg) = a_to_b {
            messages += 1;
            sync::receive_sync_message(b, b_state, msg).unwrap();
        }
        if let Some(msg) = b_to_a {
            messages += 1;
            sync::receive_sync_message(a, a_state, msg).unwrap();
        }
        iterations += 1;
    }
    messages
}

#[test]
fn empty_document_both_sides_exchanges_and_sends_nothing() {
    let mut a = MemBackend::new();
    let mut b = MemBackend::new();
    let mut a_state = State::new();
    let mut b_state = State::new();

    let messages = run_to_convergence(&mut a, &mut a_state, &mut b, &mut b_state);

    assert!(messages <= 2, "expected at most two messages, got {messages}");
    assert!(a.heads().is_empty());
    assert!(b.heads().is_empty());
}

#[test]
fn first_contact_single_change_converges() {
    init_tracing();
    let mut a = MemBackend::new();
    let c1 = a.push(vec![], b"one");
    let mut b = MemBackend::new();

    let mut a_state = State::new();
    let mut b_state = State::new();

    run_to_convergence(&mut a, &mut a_state, &mut b, &mut b_state);

    assert_eq!(a.heads(), vec![c1]);
    assert_eq!(b.heads(), vec![c1]);
}

#[test]
fn peer_with_many_changes_converges_with_empty_peer() {
    let mut a = MemBackend::new();
    let mut prev = Vec::new();
    for i in 0..10u8 {
        let hash = a.push(prev.clone(), &[i]);
        prev = vec![hash];
    }
    let mut b = MemBackend::new();

    let mut a_state = State::new();
    let mut b_state = State::new();

    run_to_convergence(&mut a, &mut a_state, &mut b, &mut b_state);

    let mut a_heads = a.heads();
    let mut b_heads = b.heads();
    a_heads.sort();
    b_heads.sort();
    assert_eq!(a_heads, b_heads);
    assert_eq!(a_heads.len(), 1);
}

#[test]
fn convergence_short_circuits_once_in_sync() {
    let mut a = MemBackend::new();
    a.push(vec![], b"one");
    let mut b = MemBackend::new();

    let mut a_state = State::new();
    let mut b_state = State::new();

    run_to_convergence(&mut a, &mut a_state, &mut b, &mut b_state);

    // Once converged, generating again must produce no message and no
    // bytes crossing the wire, per spec.md §8's convergence short-circuit.
    assert!(sync::generate_sync_message(&a, &mut a_state).is_none());
    assert!(sync::generate_sync_message(&b, &mut b_state).is_none());
}

#[test]
fn dependency_closure_pulls_in_a_chain() {
    // c1 <- c2 <- c3; peer B's bloom will be arranged (via an empty
    // last_sync) to report everything absent, forcing a fresh closure
    // computation rather than relying on a stale bloom matching real data.
    let mut a = MemBackend::new();
    let c1 = a.push(vec![], b"1");
    let c2 = a.push(vec![c1], b"2");
    let c3 = a.push(vec![c2], b"3");
    let mut b = MemBackend::new();

    let mut a_state = State::new();
    let mut b_state = State::new();

    run_to_convergence(&mut a, &mut a_state, &mut b, &mut b_state);

    let mut b_heads = b.heads();
    b_heads.sort();
    assert_eq!(b_heads, vec![c3]);
    assert!(b.change_by_hash(&c1).is_some());
    assert!(b.change_by_hash(&c2).is_some());
    assert!(b.change_by_hash(&c3).is_some());
}

#[test]
fn closure_forces_descendants_of_a_bloom_negative_ancestor() {
    // A bloom filter has no false negatives, so a bloom-negative hash is
    // known absent for real. Since a change can't be truly applied at a
    // peer missing one of its dependencies, any bloom "positive" for a
    // descendant of that missing hash must be a false positive - the
    // selector has to force those descendants in too, even though the
    // bloom alone would have called them satisfied.
    let mut a = MemBackend::new();
    let c1 = a.push(vec![], b"1");
    let c2 = a.push(vec![c1], b"2");
    let c3 = a.push(vec![c2], b"3");

    let bloom = BloomFilter::from_hashes(vec![c2, c3].into_iter());
    let have = Have {
        last_sync: Vec::new(),
        bloom,
    };

    let sent = dagsync::selector::changes_to_send(&a, std::slice::from_ref(&have), &[]);
    let sent_hashes: std::collections::HashSet<_> = sent.iter().map(|(_, meta)| meta.hash).collect();

    assert!(sent_hashes.contains(&c1), "truly-absent ancestor must be sent");
    assert!(
        sent_hashes.contains(&c2),
        "descendant of an absent ancestor can't really be present despite the bloom hit"
    );
    assert!(
        sent_hashes.contains(&c3),
        "transitive descendant must also be forced in"
    );
}

#[test]
fn reset_triggers_when_peers_last_sync_is_unknown_history() {
    // The peer's most recent `have.last_sync` names a hash we've never
    // stored (e.g. the peer rolled back, or we lost our data). The reset
    // reply carries no `need` and a single empty `Have`, without touching
    // any persisted state.
    let a = MemBackend::new();
    let mut a_state = State::new();

    let unknown_to_a = {
        let mut elsewhere = MemBackend::new();
        elsewhere.push(vec![], b"history a never received")
    };
    a_state.their_have = Some(vec![Have {
        last_sync: vec![unknown_to_a],
        bloom: BloomFilter::from_hashes(std::iter::empty()),
    }]);
    let shared_heads_before = a_state.shared_heads.clone();

    let msg = sync::generate_sync_message(&a, &mut a_state).expect("reset message");

    assert!(msg.need.is_empty());
    assert_eq!(msg.have, vec![Have::default()]);
    assert!(msg.changes.is_empty());
    assert_eq!(a_state.shared_heads, shared_heads_before);
}

#[test]
fn receiving_a_reset_message_clears_shared_heads() {
    // The reset reply itself (empty heads, a single default `Have`) is what
    // a receiver gets back; applying it must not error and must collapse
    // `shared_heads` down rather than keep stale agreement around.
    let mut a = MemBackend::new();
    a.push(vec![], b"one");
    let mut a_state = State::new();
    a_state.shared_heads = vec![{
        let mut elsewhere = MemBackend::new();
        elsewhere.push(vec![], b"stale shared head")
    }];

    let reset = Message {
        heads: Vec::new(),
        need: Vec::new(),
        have: vec![Have::default()],
        changes: Vec::new(),
    };

    let patch = sync::receive_sync_message(&mut a, &mut a_state, reset).unwrap();
    assert!(patch.is_none());
    assert!(a_state.shared_heads.is_empty());
    assert_eq!(a_state.their_heads, Some(Vec::new()));
}

#[test]
fn dedup_does_not_resend_within_a_single_unacked_round() {
    let mut a = MemBackend::new();
    let c1 = a.push(vec![], b"one");
    let mut b = MemBackend::new();

    let mut a_state = State::new();
    let mut b_state = State::new();

    let first = sync::generate_sync_message(&a, &mut a_state).unwrap();
    assert!(first.changes.is_empty(), "first message is a have-only probe");

    sync::receive_sync_message(&mut b, &mut b_state, first).unwrap();
    let reply = sync::generate_sync_message(&b, &mut b_state).unwrap();
    sync::receive_sync_message(&mut a, &mut a_state, reply).unwrap();

    let with_change = sync::generate_sync_message(&a, &mut a_state).unwrap();
    assert_eq!(with_change.changes.len(), 1);
    let (c1_bytes, _) = a.change_by_hash(&c1).unwrap();
    assert!(a_state.sent_changes.iter().any(|c| c.as_slice() == c1_bytes));

    // Calling generate again without a reply must not include c1 twice.
    let again = sync::generate_sync_message(&a, &mut a_state);
    if let Some(msg) = again {
        assert!(!msg.changes.iter().any(|c| c.as_slice() == c1_bytes));
    }
}

#[test]
fn persisted_state_round_trips_shared_heads_across_a_reload() {
    let mut a = MemBackend::new();
    let c1 = a.push(vec![], b"one");
    let mut b = MemBackend::new();

    let mut a_state = State::new();
    let mut b_state = State::new();
    run_to_convergence(&mut a, &mut a_state, &mut b, &mut b_state);

    let persisted = a_state.encode().unwrap();
    let reloaded = State::decode(&persisted).unwrap();

    assert_eq!(reloaded.shared_heads, vec![c1]);
    assert!(reloaded.their_heads.is_none());
    assert!(reloaded.sent_changes.is_empty());
}
