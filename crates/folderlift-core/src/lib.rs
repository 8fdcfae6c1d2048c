//! FolderLift Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `FolderFingerprint`, `LedgerEntry`, `TransferUnit`, `UploadOutcome`
//! - **Error taxonomy** - `ErrorKind` and the classified `RemoteError`
//! - **Port definitions** - Traits for adapters: `IRemoteDrive`, `ILedger`, `ILocalWalker`
//! - **Configuration** - YAML-backed `Config` and the validated `UploadOptions`
//!
//! # Architecture
//!
//! The domain module holds plain data and pure functions. Ports define the
//! trait interfaces that the engine depends on and adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
