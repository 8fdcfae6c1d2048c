//! Integration tests for folderlift-drive
//!
//! Uses wiremock to stand in for the Drive v3 metadata and upload endpoints
//! and checks requests, response parsing and error classification.

mod common;

mod test_errors;
mod test_folders;
mod test_upload;
