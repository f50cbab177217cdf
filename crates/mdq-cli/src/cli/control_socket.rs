//! Control socket: server (during `mdq serve`) and client (every other subcommand).
//! Protocol: one JSON request per line, one JSON reply per line.

use anyhow::{bail, Context, Result};
use mdq_core::{JobId, JobQueue, JobSummary, SubmitRequest};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Submit(SubmitRequest),
    List,
    Get { id: String },
    Cancel { id: String },
    Resume { id: String },
    Remove { id: String },
    Sweep,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Response {
    Submitted { id: JobId },
    Jobs { jobs: Vec<JobSummary> },
    Job { job: JobSummary },
    Done,
    Swept { removed: usize },
    Error { message: String },
}

impl Response {
    fn error(e: impl std::fmt::Display) -> Self {
        Response::Error {
            message: e.to_string(),
        }
    }
}

/// Runs one request against the queue. Failures become `Response::Error`.
pub async fn handle_request(queue: &JobQueue, req: Request) -> Response {
    let parse_id = |id: &str| JobId::parse(id).ok_or_else(|| format!("invalid job id {id:?}"));
    let by_id = |res: Result<(), mdq_core::QueueError>| match res {
        Ok(()) => Response::Done,
        Err(e) => Response::error(e),
    };
    match req {
        Request::Submit(sub) => match queue.submit(sub).await {
            Ok(id) => Response::Submitted { id },
            Err(e) => Response::error(e),
        },
        Request::List => Response::Jobs {
            jobs: queue.list().await,
        },
        Request::Get { id } => match parse_id(&id) {
            Ok(id) => match queue.get(&id).await {
                Ok(job) => Response::Job { job },
                Err(e) => Response::error(e),
            },
            Err(e) => Response::error(e),
        },
        Request::Cancel { id } => match parse_id(&id) {
            Ok(id) => by_id(queue.cancel(&id).await),
            Err(e) => Response::error(e),
        },
        Request::Resume { id } => match parse_id(&id) {
            Ok(id) => by_id(queue.resume(&id).await),
            Err(e) => Response::error(e),
        },
        Request::Remove { id } => match parse_id(&id) {
            Ok(id) => by_id(queue.remove(&id).await),
            Err(e) => Response::error(e),
        },
        Request::Sweep => Response::Swept {
            removed: queue.sweep().await,
        },
    }
}

/// Binds `path` (replacing a stale socket file) and serves requests until the task is aborted.
pub fn spawn_control_listener(
    queue: Arc<JobQueue>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create socket dir {}", parent.display()))?;
    }
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;
    tracing::info!(path = %path.display(), "control socket listening");

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let queue = Arc::clone(&queue);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(&queue, stream).await {
                            tracing::debug!("control connection: {}", e);
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve_connection(queue: &JobQueue, stream: UnixStream) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<Request>(line) {
            Ok(req) => {
                tracing::debug!(?req, "control request");
                handle_request(queue, req).await
            }
            Err(e) => Response::error(format!("bad request: {e}")),
        };
        let mut out = serde_json::to_vec(&reply)?;
        out.push(b'\n');
        write.write_all(&out).await?;
    }
    Ok(())
}

/// Sends one request to the daemon at `socket_path` and waits for its reply.
pub async fn send_request(socket_path: &Path, req: &Request) -> Result<Response> {
    if !socket_path.exists() {
        bail!(
            "mdq daemon is not running (no control socket at {}); start it with `mdq serve`",
            socket_path.display()
        );
    }
    let stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connect to {}", socket_path.display()))?;
    let (read, mut write) = stream.into_split();
    let mut msg = serde_json::to_vec(req)?;
    msg.push(b'\n');
    write.write_all(&msg).await?;

    let mut lines = BufReader::new(read).lines();
    let line = lines
        .next_line()
        .await?
        .context("daemon closed the connection without replying")?;
    Ok(serde_json::from_str(&line)?)
}
