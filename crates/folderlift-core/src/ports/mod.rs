//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the upload engine depends on; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteDrive`] - Remote folder/file namespace and resumable uploads
//! - [`ILedger`] - Durable record of completed subtree uploads
//! - [`ILocalWalker`] - Enumeration of local folder trees

pub mod ledger;
pub mod local_walker;
pub mod remote_drive;

pub use ledger::ILedger;
pub use local_walker::{ILocalWalker, LocalFile, LocalFolder, LocalTree};
pub use remote_drive::{IRemoteDrive, RemoteObject, UploadProgress, UploadSession};
