//! Synchronization of declarative records to search clusters
//!
//! [`Reconciler`] runs the diff/apply/delete algorithm for any record and
//! reports the outcome through a [`StatusStore`]. The per-kind request shapes
//! live behind [`KindAdapter`].

#![deny(missing_docs)]

pub mod adapter;
pub mod reconciler;
pub mod record;
pub mod status;

pub use adapter::{adapter_for, KindAdapter};
pub use reconciler::{Outcome, Reconciler};
pub use record::{EventKind, SyncRecord};
pub use status::StatusStore;
