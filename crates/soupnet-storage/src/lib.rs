//! Event store, block engine, view materializer and backtest validator.
//!
//! The [`Store`] owns one community's on-disk state under a single
//! directory: the append-only `events.log`, the hash-linked
//! `blockdata.dat` timeline, the invalid-event quarantine log,
//! checkpoints and the state snapshot. Every mutation refolds the full
//! event log into the materialized views, so replaying the same log from
//! scratch reproduces identical blocks and views.

mod backtest;
mod blocks;
mod record;
mod store;
mod views;

pub use record::BlockRecord;
pub use store::Store;
