//! Command dispatcher.
//!
//! The first token of a request names the command:
//!
//! | command            | response                          | audit message          |
//! |--------------------|-----------------------------------|------------------------|
//! | `index`            | one name per line, then `\n`      | `index <bytes>`        |
//! | `log`              | the audit log plus sentinel       | `log <bytes>`          |
//! | `server`, `client` | empty                             | `<name> NOT_ALLOWED`   |
//! | anything else      | the named file plus sentinel      | `<bytes>` / `bigfile <bytes>` or a failure |
//!
//! Failures never reach the response body; they only show up in the audit
//! log. Every dispatched request produces exactly one audit entry.

use std::{ffi::OsString, fmt, io, path::PathBuf};

use tokio::{fs::File, io::AsyncReadExt};
use tracing::debug;

use crate::{
    audit::{AuditLog, LogEntry},
    buffer::ResponseBuffer,
    error::ResourceError,
    request::Request,
};

/// Characters that disqualify a requested filename outright.
pub const REJECTED_FILENAME_CHARS: &str = ")(*&^%$#@?!`~-+0123456789";

/// Files at least this large are logged as `bigfile`.
pub const BIGFILE_THRESHOLD: usize = 1000;

const READ_CHUNK: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Index,
    Log,
    /// Names that must never be served from disk.
    Reserved(&'a str),
    File(&'a str),
}

impl<'a> Command<'a> {
    pub fn classify(name: &'a str) -> Self {
        match name {
            "index" => Command::Index,
            "log" => Command::Log,
            "server" | "client" => Command::Reserved(name),
            other => Command::File(other),
        }
    }
}

/// What a dispatched command did, in the form written to the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Listed { bytes: usize },
    LogServed { bytes: usize },
    NotAllowed(String),
    BadFilename,
    NotFound,
    NotReadable,
    Served { bytes: usize },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Listed { bytes } => write!(f, "index {bytes}"),
            Outcome::LogServed { bytes } => write!(f, "log {bytes}"),
            Outcome::NotAllowed(name) => write!(f, "{name} NOT_ALLOWED"),
            Outcome::BadFilename => f.write_str("BAD_FILENAME"),
            Outcome::NotFound => f.write_str("NOT_FOUND"),
            Outcome::NotReadable => f.write_str("NOT_READABLE"),
            Outcome::Served { bytes } if *bytes < BIGFILE_THRESHOLD => write!(f, "{bytes}"),
            Outcome::Served { bytes } => write!(f, "bigfile {bytes}"),
        }
    }
}

/// Whether `name` may be looked up at all.
pub fn is_valid_filename(name: &str) -> bool {
    !name.starts_with('.') && !name.contains(|c: char| REJECTED_FILENAME_CHARS.contains(c))
}

pub struct Dispatcher {
    root: PathBuf,
    audit: AuditLog,
}

impl Dispatcher {
    pub fn new(root: impl Into<PathBuf>, audit: AuditLog) -> Self {
        Self {
            root: root.into(),
            audit,
        }
    }

    /// Runs the request's command and records the outcome.
    ///
    /// A request without tokens gets an empty response and no audit entry.
    pub async fn dispatch(&self, request: &Request) -> Result<ResponseBuffer, ResourceError> {
        let mut response = ResponseBuffer::new()?;
        let Some(name) = request.command() else {
            return Ok(response);
        };

        let outcome = self.execute(Command::classify(name), &mut response).await?;
        debug!(client = %request.client(), command = name, %outcome, "command executed");
        self.audit
            .append(LogEntry::new(request, outcome.to_string()))
            .await?;
        Ok(response)
    }

    pub async fn execute(
        &self,
        command: Command<'_>,
        response: &mut ResponseBuffer,
    ) -> Result<Outcome, ResourceError> {
        match command {
            Command::Index => self.list(response).await,
            Command::Log => self.serve_log(response).await,
            Command::Reserved(name) => Ok(Outcome::NotAllowed(name.to_owned())),
            Command::File(name) => self.serve_file(name, response).await,
        }
    }

    async fn list(&self, response: &mut ResponseBuffer) -> Result<Outcome, ResourceError> {
        let names = self.entry_names().await?;
        for name in &names {
            response.extend_from_slice(name.to_string_lossy().as_bytes())?;
            response.extend_from_slice(b"\n")?;
        }
        response.extend_from_slice(b"\n")?;
        Ok(Outcome::Listed {
            bytes: response.len(),
        })
    }

    async fn serve_log(&self, response: &mut ResponseBuffer) -> Result<Outcome, ResourceError> {
        let Some(contents) = self.audit.read().await? else {
            return Ok(Outcome::LogServed { bytes: 0 });
        };
        response.reserve_for_file(contents.len() as u64)?;
        response.extend_from_slice(&contents)?;
        response.push_sentinel()?;
        Ok(Outcome::LogServed {
            bytes: contents.len(),
        })
    }

    async fn serve_file(
        &self,
        name: &str,
        response: &mut ResponseBuffer,
    ) -> Result<Outcome, ResourceError> {
        if !is_valid_filename(name) {
            return Ok(Outcome::BadFilename);
        }
        // Raw names are compared, so a non-UTF-8 entry never matches.
        if !self.entry_names().await?.iter().any(|entry| entry == name) {
            return Ok(Outcome::NotFound);
        }

        let mut file = match File::open(self.root.join(name)).await {
            Ok(file) => file,
            Err(err) => {
                debug!(file = name, error = %err, "open failed");
                return Ok(Outcome::NotReadable);
            }
        };
        match read_into(&mut file, response).await? {
            Ok(bytes) => {
                response.push_sentinel()?;
                Ok(Outcome::Served { bytes })
            }
            Err(err) => {
                debug!(file = name, error = %err, "read failed");
                response.clear();
                Ok(Outcome::NotReadable)
            }
        }
    }

    /// Names in the root directory, sorted, without `.` and `..`.
    ///
    /// Recomputed on every call; concurrent changes to the directory are
    /// simply observed or missed.
    async fn entry_names(&self) -> Result<Vec<OsString>, ResourceError> {
        let scan_error = |source| ResourceError::DirectoryScan {
            path: self.root.clone(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(scan_error)?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(scan_error)? {
            let name = entry.file_name();
            if name != "." && name != ".." {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Reads all of `file` into `response`.
///
/// The outer error is a fatal allocation failure; the inner one is an I/O
/// failure that the caller reports as `NOT_READABLE`.
async fn read_into(
    file: &mut File,
    response: &mut ResponseBuffer,
) -> Result<io::Result<usize>, ResourceError> {
    let size = match file.metadata().await {
        Ok(metadata) => metadata.len(),
        Err(err) => return Ok(Err(err)),
    };
    response.reserve_for_file(size)?;

    let mut chunk = vec![0_u8; READ_CHUNK];
    let mut total = 0;
    loop {
        let read = match file.read(&mut chunk).await {
            Ok(0) => return Ok(Ok(total)),
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Ok(Err(err)),
        };
        response.extend_from_slice(&chunk[..read])?;
        total += read;
    }
}
