//! # dagsync
//!
//! A peer-to-peer synchronization protocol for reconciling two replicas of
//! a content-addressed, hash-DAG-based CRDT document, after the Byzantine
//! Eventual Consistency construction of Kleppmann & Howard
//! (<https://arxiv.org/abs/2012.00472>).
//!
//! This crate implements the *sync core* only: the per-peer state machine,
//! the change-selection algorithm, and the wire codec (sync messages,
//! persisted peer state, and the content-addressed Bloom filter used for
//! set reconciliation). The document store that actually holds the change
//! DAG and applies changes is an external collaborator, represented here
//! by the [`Backend`] trait — implement it over your own storage and
//! change format to use this crate.
//!
//! ## Example
//!
//! ```
//! use dagsync::{mem::MemBackend, state::State, sync, Backend};
//!
//! let mut peer_a = MemBackend::new();
//! let c1 = peer_a.push(vec![], b"hello");
//! let mut peer_b = MemBackend::new();
//!
//! let mut a_state = State::new();
//! let mut b_state = State::new();
//!
//! let mut msg = sync::generate_sync_message(&peer_a, &mut a_state);
//! loop {
//!     let mut progressed = false;
//!     if let Some(m) = msg.take() {
//!         sync::receive_sync_message(&mut peer_b, &mut b_state, m).unwrap();
//!         progressed = true;
//!     }
//!     let b_to_a = sync::generate_sync_message(&peer_b, &mut b_state);
//!     if let Some(m) = b_to_a {
//!         sync::receive_sync_message(&mut peer_a, &mut a_state, m).unwrap();
//!         progressed = true;
//!     }
//!     msg = sync::generate_sync_message(&peer_a, &mut a_state);
//!     if msg.is_none() && !progressed {
//!         break;
//!     }
//! }
//!
//! assert_eq!(peer_a.heads(), peer_b.heads());
//! assert_eq!(peer_a.heads(), vec![c1]);
//! ```

pub mod backend;
pub mod bloom;
pub mod dedup;
pub mod error;
pub mod hash;
pub mod message;
pub mod selector;
pub mod state;
pub mod sync;

#[cfg(feature = "mem-backend")]
pub mod mem;

pub use backend::{Backend, ChangeMeta};
pub use bloom::BloomFilter;
pub use error::{DagsyncError, FormatError, MessageCodecError, StateCodecError};
pub use hash::ChangeHash;
pub use message::{Have, Message};
pub use state::State;
