use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_LOG_FILE, DEFAULT_RECV_LIMIT, ServerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the working directory over TCP.
    Server(ServerArgs),
    /// Send one request to a server and print the response.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Port to listen on. Use 0 for an ephemeral port.
    pub port: u16,

    /// Interface to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Directory to serve.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Audit log location, relative to the served directory unless absolute.
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,
}

impl ServerArgs {
    pub fn config(&self) -> ServerConfig {
        ServerConfig {
            root: self.root.clone(),
            log_file: self.log_file.clone(),
            recv_limit: DEFAULT_RECV_LIMIT,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Server address as `host:port`.
    pub server: String,

    /// `index`, `log`, or a filename. Omit to send an empty request.
    pub command: Option<String>,

    /// Optional argument forwarded after the command.
    pub argument: Option<String>,
}

impl ClientArgs {
    /// The request line sent on the wire.
    pub fn request_line(&self) -> String {
        [self.command.as_deref(), self.argument.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_port_and_defaults() {
        let cli = Cli::parse_from(["remote-file-browser", "server", "4443"]);
        let Command::Server(args) = cli.command else {
            panic!("expected server command");
        };
        assert_eq!(args.port, 4443);
        assert_eq!(args.host, "0.0.0.0");
        let config = args.config();
        assert_eq!(config.log_path(), PathBuf::from("./log.log"));
    }

    #[test]
    fn joins_client_command_and_argument() {
        let cli = Cli::parse_from(["remote-file-browser", "client", "127.0.0.1:4443", "index", "x"]);
        let Command::Client(args) = cli.command else {
            panic!("expected client command");
        };
        assert_eq!(args.server, "127.0.0.1:4443");
        assert_eq!(args.request_line(), "index x");
    }

    #[test]
    fn client_without_command_sends_empty_line() {
        let cli = Cli::parse_from(["remote-file-browser", "client", "localhost:1"]);
        let Command::Client(args) = cli.command else {
            panic!("expected client command");
        };
        assert_eq!(args.request_line(), "");
    }
}
