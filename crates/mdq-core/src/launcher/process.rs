//! Spawning the downloader and draining its output streams.

use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::extractor::LineDecoder;

const READ_CHUNK: usize = 8 * 1024;

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

/// Starts `program args` in `job_dir` with both output streams piped.
pub fn spawn_downloader(program: &str, args: &[String], job_dir: &Path) -> io::Result<Child> {
    Command::new(program)
        .args(args)
        .current_dir(job_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

/// Reads `src` until EOF, sending each complete line (and a trailing partial
/// line) to `tx`. Stops early if the receiver is gone.
pub fn spawn_reader<R>(
    src: R,
    stream: Stream,
    tx: mpsc::UnboundedSender<(Stream, String)>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut src = src;
        let mut decoder = LineDecoder::new();
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = match src.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!(stream = stream.as_str(), "read failed: {}", e);
                    break;
                }
            };
            for line in decoder.feed(&buf[..n]) {
                if tx.send((stream, line)).is_err() {
                    return;
                }
            }
        }
        if let Some(line) = decoder.finish() {
            let _ = tx.send((stream, line));
        }
    })
}
