//! `mdq resume <id>` – restart an interrupted job.

use anyhow::Result;
use std::path::Path;

use super::call;
use crate::cli::control_socket::Request;

pub async fn run_resume(socket: &Path, id: String) -> Result<()> {
    call(socket, Request::Resume { id: id.clone() }).await?;
    println!("Resumed job {id}");
    Ok(())
}
