use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    select,
    sync::watch,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    audit::AuditLog,
    config::ServerConfig,
    dispatch::Dispatcher,
    request::{ClientIdentity, Request},
};

pub struct Server {
    listener: TcpListener,
    state: Arc<ServerState>,
    audit_task: JoinHandle<()>,
    stopping: watch::Sender<bool>,
}

impl Server {
    /// Wraps a bound listener and starts the audit writer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(listener: TcpListener, config: &ServerConfig) -> Self {
        let (audit, audit_task) = AuditLog::spawn(config.log_path());
        Self {
            listener,
            state: Arc::new(ServerState {
                dispatcher: Dispatcher::new(&config.root, audit),
                recv_limit: config.recv_limit,
            }),
            audit_task,
            stopping: watch::Sender::new(false),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// The listener is closed first. Workers that already hold a request
    /// finish it; workers still waiting for one drop their connection. The
    /// audit writer exits once the last worker lets go of its handle.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            listener,
            state,
            audit_task,
            stopping,
        } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("server shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &state, &stopping);
                }
            }
        }

        drop(listener);
        stopping.send_replace(true);
        drop(state);
        audit_task.await.context("audit writer panicked")?;
        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

struct ServerState {
    dispatcher: Dispatcher,
    recv_limit: usize,
}

fn handle_accept_result(
    result: std::io::Result<(TcpStream, SocketAddr)>,
    state: &Arc<ServerState>,
    stopping: &watch::Sender<bool>,
) {
    match result {
        Ok((stream, peer)) => spawn_worker(stream, peer, state, stopping.subscribe()),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_worker(
    stream: TcpStream,
    peer: SocketAddr,
    state: &Arc<ServerState>,
    stopping: watch::Receiver<bool>,
) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        if let Err(err) = handle_connection(stream, peer, &state, stopping).await {
            warn!(peer = %peer, error = ?err, "worker aborted");
        }
    });
}

/// Serves exactly one request, then closes the connection.
///
/// Any error drops the connection without writing a response, as does a
/// shutdown that arrives before the request does.
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: &ServerState,
    mut stopping: watch::Receiver<bool>,
) -> Result<()> {
    let raw = select! {
        raw = read_request(&mut stream, state.recv_limit) => {
            raw.context("failed to read request")?
        }
        _ = stopped(&mut stopping) => {
            debug!(%peer, "dropping idle connection at shutdown");
            return Ok(());
        }
    };
    let request = Request::parse(&raw, ClientIdentity::from(peer));

    let response = state.dispatcher.dispatch(&request).await?;

    stream
        .write_all(response.as_bytes())
        .await
        .context("failed to send response")?;
    stream.shutdown().await.context("failed to close connection")?;

    debug!(%peer, command = request.command(), bytes = response.len(), "request served");
    Ok(())
}

async fn stopped(stopping: &mut watch::Receiver<bool>) {
    // A dropped sender also means the server is gone.
    let _ = stopping.wait_for(|stopping| *stopping).await;
}

/// Reads one request line: up to a newline, end of stream, or `limit` bytes.
pub async fn read_request<R>(reader: &mut R, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut raw = Vec::with_capacity(limit.min(1024));
    let mut chunk = [0_u8; 1024];
    while raw.len() < limit {
        let want = chunk.len().min(limit - raw.len());
        let read = reader.read(&mut chunk[..want]).await?;
        if read == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..read]);
        if chunk[..read].contains(&b'\n') {
            break;
        }
    }
    Ok(raw)
}
