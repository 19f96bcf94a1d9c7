//! Persistence layer for the local backend: WAL, snapshots, and crash recovery.

pub mod serialization;
pub mod snapshot;
pub mod wal;
