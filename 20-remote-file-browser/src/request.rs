//! Request tokenizer and per-request context.
//!
//! A [`Request`] bundles everything one worker knows about the request it is
//! serving: the tokens, the normalized command line used for auditing, and
//! the peer that sent it. Nothing here is shared between workers.

use std::{fmt, net::SocketAddr};

/// Remote peer of a connection, rendered as `ip:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<SocketAddr> for ClientIdentity {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    tokens: Vec<String>,
    line: String,
    client: ClientIdentity,
}

impl Request {
    /// Splits raw request bytes on runs of whitespace.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; an empty or
    /// all-whitespace input yields a request with no tokens.
    pub fn parse(raw: &[u8], client: ClientIdentity) -> Self {
        let text = String::from_utf8_lossy(raw);
        let tokens: Vec<String> = text.split_whitespace().map(str::to_owned).collect();
        let line = tokens.join(" ");
        Self {
            tokens,
            line,
            client,
        }
    }

    pub fn command(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    /// First argument after the command.
    ///
    /// No command consumes it today; it only reaches the audit line through
    /// [`Request::line`].
    pub fn argument(&self) -> Option<&str> {
        self.tokens.get(1).map(String::as_str)
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Command line as it appears in the audit log, always a single line.
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn client(&self) -> &ClientIdentity {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> ClientIdentity {
        ClientIdentity::from(SocketAddr::from(([10, 0, 0, 7], 40_123)))
    }

    #[test]
    fn identity_renders_ip_and_port() {
        assert_eq!(peer().as_str(), "10.0.0.7:40123");
    }

    #[test]
    fn splits_on_whitespace_runs() {
        let request = Request::parse(b"  hello.txt \t extra\r\n", peer());
        assert_eq!(request.tokens(), ["hello.txt", "extra"]);
        assert_eq!(request.command(), Some("hello.txt"));
        assert_eq!(request.argument(), Some("extra"));
        assert_eq!(request.line(), "hello.txt extra");
    }

    #[test]
    fn empty_input_has_no_command() {
        for raw in [&b""[..], b"   ", b"\n", b"\r\n\t"] {
            let request = Request::parse(raw, peer());
            assert!(request.tokens().is_empty());
            assert_eq!(request.command(), None);
            assert_eq!(request.argument(), None);
            assert_eq!(request.line(), "");
        }
    }

    #[test]
    fn single_token_has_no_argument() {
        let request = Request::parse(b"index", peer());
        assert_eq!(request.command(), Some("index"));
        assert_eq!(request.argument(), None);
    }

    #[test]
    fn embedded_newlines_collapse_into_one_line() {
        let request = Request::parse(b"log\nsecond\nthird", peer());
        assert_eq!(request.line(), "log second third");
        assert_eq!(request.tokens().len(), 3);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let request = Request::parse(b"caf\xff index", peer());
        assert_eq!(request.tokens().len(), 2);
        assert_eq!(request.argument(), Some("index"));
        assert!(request.command().is_some_and(|cmd| cmd.starts_with("caf")));
    }

    #[test]
    fn identity_comes_from_transport_not_text() {
        let request = Request::parse(b"1.2.3.4:99 index", peer());
        assert_eq!(request.client(), &peer());
        assert_eq!(request.command(), Some("1.2.3.4:99"));
    }
}
