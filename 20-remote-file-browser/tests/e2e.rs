use std::{path::Path, process::Stdio, time::Duration};

use anyhow::{Context, Result, anyhow};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, ChildStderr, Command},
    time::timeout,
};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn cli_browse_end_to_end() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin!("remote-file-browser");
    let root = tempfile::tempdir()?;
    std::fs::write(root.path().join("hello.txt"), "hi")?;
    std::fs::write(root.path().join("notes.md"), "line one\nline two\n")?;

    let (mut server_child, mut server_stderr) = spawn_server(binary, root.path()).await?;
    let addr = read_server_addr(&mut server_stderr).await?;

    // Drain additional server logs in the background so the pipe never fills.
    let server_log_task = tokio::spawn(async move {
        drain(server_stderr).await;
    });

    // The audit log lives in the served directory, so it shows up after
    // the first request has been logged.
    let listing = run_client(binary, &addr, &["index"]).await?;
    assert_eq!(listing, "hello.txt\nnotes.md\n");

    let hello = run_client(binary, &addr, &["hello.txt"]).await?;
    assert_eq!(hello, "hi");

    let notes = run_client(binary, &addr, &["notes.md"]).await?;
    assert_eq!(notes, "line one\nline two\n");

    let ghost = run_client(binary, &addr, &["ghost.txt"]).await?;
    assert_eq!(ghost, "");

    let empty = run_client(binary, &addr, &[]).await?;
    assert_eq!(empty, "");

    let listing = run_client(binary, &addr, &["index"]).await?;
    assert_eq!(listing, "hello.txt\nlog.log\nnotes.md\n");

    let log = run_client(binary, &addr, &["log"]).await?;
    let messages: Vec<&str> = log
        .lines()
        .map(|line| line.rsplit(' ').next().unwrap_or_default())
        .collect();
    assert_eq!(messages, ["20", "2", "18", "NOT_FOUND", "28"]);

    let _ = server_child.kill().await;
    let _ = server_child.wait().await;
    let _ = server_log_task.await;

    Ok(())
}

async fn spawn_server(binary: &Path, root: &Path) -> Result<(Child, BufReader<ChildStderr>)> {
    let mut cmd = Command::new(binary);
    cmd.arg("server")
        .arg("0")
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--root")
        .arg(root)
        .env("RUST_LOG", "info")
        .env("NO_COLOR", "1")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().context("failed to spawn server")?;
    let stderr = child
        .stderr
        .take()
        .context("server stderr missing after spawn")?;

    Ok((child, BufReader::new(stderr)))
}

async fn read_server_addr(reader: &mut BufReader<ChildStderr>) -> Result<String> {
    let mut line = String::new();
    let bytes = timeout(READ_TIMEOUT, reader.read_line(&mut line))
        .await
        .map_err(|_| anyhow!("timed out waiting for server banner"))??;
    if bytes == 0 {
        return Err(anyhow!("server exited before announcing its address"));
    }
    let trimmed = line.trim();
    let addr = trimmed
        .split_whitespace()
        .last()
        .context("unexpected server banner format")?;
    if !addr.contains(':') {
        return Err(anyhow!("server banner missing socket: {trimmed}"));
    }
    Ok(addr.to_string())
}

async fn run_client(binary: &Path, addr: &str, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new(binary);
    cmd.arg("client")
        .arg(addr)
        .args(args)
        .env("RUST_LOG", "warn")
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let output = timeout(READ_TIMEOUT, cmd.output())
        .await
        .map_err(|_| anyhow!("client {args:?} timed out"))??;
    if !output.status.success() {
        return Err(anyhow!("client {args:?} exited with {}", output.status));
    }
    String::from_utf8(output.stdout).context("client output was not utf-8")
}

async fn drain(mut reader: BufReader<ChildStderr>) {
    let mut buffer = String::new();
    while reader
        .read_line(&mut buffer)
        .await
        .map(|bytes| {
            let has_data = bytes > 0;
            if has_data {
                buffer.clear();
            }
            has_data
        })
        .unwrap_or(false)
    {}
}
