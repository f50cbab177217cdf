//! `mdq remove <id>` – delete a finished job and its directory.

use anyhow::Result;
use std::path::Path;

use super::call;
use crate::cli::control_socket::Request;

pub async fn run_remove(socket: &Path, id: String) -> Result<()> {
    call(socket, Request::Remove { id: id.clone() }).await?;
    println!("Removed job {id}");
    Ok(())
}
