//! Fatal resource failures for a single connection worker.
//!
//! Filesystem outcomes such as a missing or unreadable file are ordinary
//! values (see [`crate::dispatch::Outcome`]). Anything in this module ends
//! the worker that hit it: the connection is dropped without a response.

use std::{collections::TryReserveError, io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to grow response buffer to {requested} bytes")]
    Allocation {
        requested: usize,
        #[source]
        source: TryReserveError,
    },
    #[error("response of {requested} bytes does not fit in memory")]
    Oversized { requested: u64 },
    #[error("failed to scan directory {path}: {source}")]
    DirectoryScan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open audit log {path}: {source}")]
    AuditOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to append to audit log {path}: {source}")]
    AuditWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("audit logger is no longer running")]
    AuditClosed,
}
