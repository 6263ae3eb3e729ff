use anyhow::{Context, Result};
use tokio::{
    io::{self, AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tracing::info;

use crate::{buffer::ResponseBuffer, cli::ClientArgs};

const READ_CHUNK: usize = 1024;

pub async fn run(args: ClientArgs) -> Result<()> {
    let body = fetch(&args.server, &args.request_line()).await?;
    write_stdout(strip_sentinel(&body)).await?;
    Ok(())
}

/// Sends one request line and returns the raw response.
///
/// The server closes the connection after answering, so the response is
/// everything read until end of stream.
pub async fn fetch(server: &str, line: &str) -> Result<Vec<u8>> {
    let mut stream = TcpStream::connect(server)
        .await
        .with_context(|| format!("failed to connect to {server}"))?;
    info!("connected to {server}");

    stream.write_all(line.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.shutdown().await?;

    let mut response = ResponseBuffer::new()?;
    let mut chunk = [0_u8; READ_CHUNK];
    loop {
        let read = stream
            .read(&mut chunk)
            .await
            .context("failed to read response")?;
        if read == 0 {
            break;
        }
        response.extend_from_slice(&chunk[..read])?;
    }
    Ok(response.into_bytes())
}

/// Drops the final byte: the sentinel after a file body, or the blank
/// line that ends a listing.
pub fn strip_sentinel(body: &[u8]) -> &[u8] {
    body.split_last().map_or(body, |(_, rest)| rest)
}

async fn write_stdout(bytes: &[u8]) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(bytes).await?;
    stdout.flush().await
}
