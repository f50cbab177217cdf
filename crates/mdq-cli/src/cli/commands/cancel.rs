//! `mdq cancel <id>` – stop a pending or running job.

use anyhow::Result;
use std::path::Path;

use super::call;
use crate::cli::control_socket::Request;

pub async fn run_cancel(socket: &Path, id: String) -> Result<()> {
    call(socket, Request::Cancel { id: id.clone() }).await?;
    println!("Cancelled job {id}");
    Ok(())
}
