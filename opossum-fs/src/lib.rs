//! Filesystem-backed implementation of the `opossum-core` [`EventStore`]
//! trait: one directory per store, one file per event, flat sorted-position
//! files for the secondary indices, a single-file ledger, and an OS-level
//! exclusive lock serializing writers across processes.
//!
//! [`EventStore`]: opossum_core::EventStore

mod append_condition;
mod atomic_file;
mod config;
mod cross_process_lock;
mod event_file;
mod index;
mod index_coordinator;
mod ledger;
mod paths;
mod position_index;
mod query_evaluator;
mod store;

pub use config::StoreConfig;
pub use store::Store;
