//! CLI command handlers, one file per subcommand.

mod add;
mod cancel;
mod remove;
mod resume;
mod serve;
mod status;
mod sweep;

pub use add::{run_add, AddArgs};
pub use cancel::run_cancel;
pub use remove::run_remove;
pub use resume::run_resume;
pub use serve::run_serve;
pub use status::run_status;
pub use sweep::run_sweep;

use anyhow::{bail, Result};
use std::path::Path;

use crate::cli::control_socket::{send_request, Request, Response};

/// Sends `req` and turns an error reply into an error.
async fn call(socket: &Path, req: Request) -> Result<Response> {
    match send_request(socket, &req).await? {
        Response::Error { message } => bail!("{message}"),
        reply => Ok(reply),
    }
}
