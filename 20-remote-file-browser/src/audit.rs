//! Audit logger shared by every connection worker.
//!
//! A single writer task owns the log store. Workers hold a cloneable
//! [`AuditLog`] handle and send it requests over a channel; the writer
//! performs them one at a time, so lines from different workers can never
//! interleave. Each request carries a oneshot reply, which makes
//! [`AuditLog::append`] return only once the line has reached the file.
//!
//! The `log` command reads the store through the same task, so a reader
//! always sees whole lines.

use std::{io, path::PathBuf};

use chrono::{Local, NaiveDateTime};
use tokio::{
    fs::OpenOptions,
    io::AsyncWriteExt,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{error::ResourceError, request::Request};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Workers block on a full queue; there is no other backpressure.
const QUEUE_DEPTH: usize = 256;

/// One event destined for the log store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    client: String,
    command_line: String,
    message: String,
}

impl LogEntry {
    pub fn new(request: &Request, message: impl Into<String>) -> Self {
        Self {
            client: request.client().to_string(),
            command_line: request.line().to_owned(),
            message: message.into(),
        }
    }

    /// Formats the entry as `[YYYY-MM-DD HH:MM:SS] <client> <line> <message>\n`.
    pub fn render(&self, at: NaiveDateTime) -> String {
        format!(
            "[{}] {} {} {}\n",
            at.format(TIMESTAMP_FORMAT),
            self.client,
            self.command_line,
            self.message
        )
    }
}

enum AuditRequest {
    Append {
        entry: LogEntry,
        respond_to: oneshot::Sender<Result<(), ResourceError>>,
    },
    Read {
        respond_to: oneshot::Sender<Option<Vec<u8>>>,
    },
}

/// Handle to the audit writer task.
///
/// The task stops once every clone of the handle has been dropped and the
/// queue has drained.
#[derive(Clone)]
pub struct AuditLog {
    requests: mpsc::Sender<AuditRequest>,
}

impl AuditLog {
    /// Starts the writer task for the log store at `path`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(path: impl Into<PathBuf>) -> (Self, JoinHandle<()>) {
        let (requests, inbox) = mpsc::channel(QUEUE_DEPTH);
        let writer = AuditWriter { path: path.into() };
        let task = tokio::spawn(writer.run(inbox));
        (Self { requests }, task)
    }

    /// Appends one line and waits until it has been written.
    pub async fn append(&self, entry: LogEntry) -> Result<(), ResourceError> {
        let (respond_to, response) = oneshot::channel();
        self.requests
            .send(AuditRequest::Append { entry, respond_to })
            .await
            .map_err(|_| ResourceError::AuditClosed)?;
        response.await.map_err(|_| ResourceError::AuditClosed)?
    }

    /// Returns the whole log store, or `None` when it cannot be opened.
    pub async fn read(&self) -> Result<Option<Vec<u8>>, ResourceError> {
        let (respond_to, response) = oneshot::channel();
        self.requests
            .send(AuditRequest::Read { respond_to })
            .await
            .map_err(|_| ResourceError::AuditClosed)?;
        response.await.map_err(|_| ResourceError::AuditClosed)
    }
}

struct AuditWriter {
    path: PathBuf,
}

impl AuditWriter {
    async fn run(self, mut inbox: mpsc::Receiver<AuditRequest>) {
        while let Some(request) = inbox.recv().await {
            match request {
                AuditRequest::Append { entry, respond_to } => {
                    let result = self.write(&entry).await;
                    if let Err(err) = &result {
                        warn!(error = %err, "audit append failed");
                    }
                    let _ = respond_to.send(result);
                }
                AuditRequest::Read { respond_to } => {
                    let _ = respond_to.send(self.read().await);
                }
            }
        }
        debug!(path = %self.path.display(), "audit logger stopped");
    }

    async fn write(&self, entry: &LogEntry) -> Result<(), ResourceError> {
        let line = entry.render(Local::now().naive_local());

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(0o666);

        let mut file = options
            .open(&self.path)
            .await
            .map_err(|source| ResourceError::AuditOpen {
                path: self.path.clone(),
                source,
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|source| self.write_error(source))?;
        file.flush().await.map_err(|source| self.write_error(source))
    }

    fn write_error(&self, source: io::Error) -> ResourceError {
        ResourceError::AuditWrite {
            path: self.path.clone(),
            source,
        }
    }

    async fn read(&self) -> Option<Vec<u8>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "audit log unreadable");
                None
            }
        }
    }
}
