//! Integration tests for folderlift-engine
//!
//! Drives the planner, scheduler and chunked uploader end to end against an
//! in-memory remote and real temporary directories.


mod test_upload_all;
mod test_upload_tree;
