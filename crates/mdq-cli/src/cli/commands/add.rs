//! `mdq add <url>` – submit a download job to the daemon.

use anyhow::{bail, Result};
use mdq_core::{MediaFormat, SubmitRequest};
use std::path::Path;

use super::call;
use crate::cli::control_socket::{Request, Response};

#[derive(Debug, Clone, PartialEq)]
pub struct AddArgs {
    pub url: String,
    pub format: MediaFormat,
    pub quality: String,
    pub playlist_hint: Option<bool>,
}

pub async fn run_add(socket: &Path, args: AddArgs) -> Result<()> {
    let req = Request::Submit(SubmitRequest {
        url: args.url,
        format: args.format,
        quality: args.quality,
        playlist_hint: args.playlist_hint,
    });
    match call(socket, req).await? {
        Response::Submitted { id } => {
            println!("Added job {id}");
            Ok(())
        }
        other => bail!("unexpected reply: {other:?}"),
    }
}
