//! Domain entities and business rules
//!
//! - Newtypes for remote identifiers and fingerprint hashes
//! - Folder fingerprints (identity of an upload unit)
//! - Ledger entries recording completed uploads
//! - Transfer units and chunk sizing
//! - Per-unit outcomes, the failure taxonomy and run reports

pub mod errors;
pub mod fingerprint;
pub mod ledger;
pub mod newtypes;
pub mod outcome;
pub mod transfer;

pub use errors::{DomainError, ErrorKind, RemoteError};
pub use fingerprint::FolderFingerprint;
pub use ledger::{LedgerEntry, LedgerStatus};
pub use newtypes::{FingerprintHash, RemoteId};
pub use outcome::{FailedUnit, SubtreeReport, SubtreeStatus, UploadOutcome, UploadReport};
pub use transfer::{chunk_size_for, TransferUnit};
