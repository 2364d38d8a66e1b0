//! Headless engine of the UniScan attendance app: registry, term-table
//! scheduling, QR attendance sessions and workspace backups, served over a
//! line-delimited JSON sidecar protocol.

pub mod backup;
pub mod catalog;
pub mod conflict;
pub mod db;
pub mod error;
pub mod export;
pub mod ipc;
pub mod logging;
pub mod registry;
pub mod schedule;
pub mod store;
pub mod timegrid;
