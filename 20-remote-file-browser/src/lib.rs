//! Minimal remote file browser over TCP.
//!
//! A client sends one whitespace-separated command line; the server answers
//! with a directory listing, its own audit log, or a file's contents, then
//! closes the connection. See `README.md` for usage. Modules, leaf first:
//!
//! - [`buffer`] is the growable response buffer with its capacity policy.
//! - [`request`] tokenizes a request and carries the peer identity.
//! - [`audit`] owns the shared audit log through a single writer task.
//! - [`dispatch`] maps the command name to `index`, `log`, reserved names,
//!   or a file lookup, and records one audit entry per request.
//! - [`server`] accepts connections and runs one worker task per
//!   connection.
//! - [`client`] sends a request and prints the response body.
//! - [`cli`] and [`config`] parse the command line and hold server settings.
//!
//! Integration tests drive the server over real sockets and the binary end
//! to end.

pub mod audit;
pub mod buffer;
pub mod cli;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod request;
pub mod server;
