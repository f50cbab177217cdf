//! `mdq sweep` – manual cleanup pass.

use anyhow::{bail, Result};
use std::path::Path;

use super::call;
use crate::cli::control_socket::{Request, Response};

pub async fn run_sweep(socket: &Path) -> Result<()> {
    match call(socket, Request::Sweep).await? {
        Response::Swept { removed } => {
            println!("Removed {removed} item(s)");
            Ok(())
        }
        other => bail!("unexpected reply: {other:?}"),
    }
}
