//! Client-side synchronization of backend state.
//!
//! Views subscribe to `ResourceKey`s on the `SyncStore`, read typed
//! `ResourceView`s from it, and get a callback whenever the cached value
//! changes. Polling, job lifecycle tracking and mutation reconciliation all
//! happen behind the store.

pub mod cache;
pub mod clock;
pub mod entry;
pub mod key;
pub mod lifecycle;
pub mod mutation;
pub mod poller;
pub mod registry;
pub mod store;

pub use cache::{ListenerId, ResourceCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, FetchStatus, Resource};
pub use key::{ResourceKey, ResourceKind};
pub use mutation::{Mutation, MutationOutcome, MutationResponse, PendingMutation};
pub use poller::{Cadence, PollIntervals};
pub use registry::{Interest, SubscriptionHandle};
pub use store::{ResourceView, SyncOptions, SyncStore};
