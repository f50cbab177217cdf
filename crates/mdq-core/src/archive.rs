//! Playlist bundling through an external archive program.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::ArchiverConfig;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("no files to archive")]
    Empty,

    #[error("could not run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {code}: {stderr}")]
    Failed {
        program: String,
        code: String,
        stderr: String,
    },

    #[error("archive not found after bundling: {0}")]
    MissingOutput(PathBuf),
}

/// Bundles a set of files from one directory into a single artifact.
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Creates `dir/archive_name` from `files` (all inside `dir`) and returns its path.
    async fn bundle(
        &self,
        dir: &Path,
        files: &[PathBuf],
        archive_name: &str,
    ) -> Result<PathBuf, ArchiveError>;
}

/// Platform archive command: `zip -q -j` on unix, `Compress-Archive` on Windows.
#[derive(Debug, Clone, Default)]
pub struct CommandArchiver {
    program: Option<String>,
}

impl CommandArchiver {
    pub fn new(program: Option<String>) -> Self {
        Self { program }
    }

    pub fn from_config(cfg: &ArchiverConfig) -> Self {
        Self::new(cfg.program.clone())
    }

    fn command(&self, files: &[String], archive_name: &str) -> (String, Vec<String>) {
        if cfg!(windows) && self.program.is_none() {
            let quote = |s: &str| format!("'{}'", s.replace('\'', "''"));
            let paths = files.iter().map(|f| quote(f)).collect::<Vec<_>>().join(",");
            let script = format!(
                "Compress-Archive -Path {paths} -DestinationPath {} -Force",
                quote(archive_name)
            );
            return (
                "powershell".to_string(),
                vec!["-NoProfile".to_string(), "-Command".to_string(), script],
            );
        }
        let program = self.program.clone().unwrap_or_else(|| "zip".to_string());
        // `./` keeps names starting with `-` from being parsed as options.
        let local = |name: &str| format!("./{name}");
        let mut args = vec!["-q".to_string(), "-j".to_string(), local(archive_name)];
        args.extend(files.iter().map(|f| local(f)));
        (program, args)
    }
}

#[async_trait]
impl Archiver for CommandArchiver {
    async fn bundle(
        &self,
        dir: &Path,
        files: &[PathBuf],
        archive_name: &str,
    ) -> Result<PathBuf, ArchiveError> {
        if files.is_empty() {
            return Err(ArchiveError::Empty);
        }
        let names: Vec<String> = files
            .iter()
            .map(|f| {
                f.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| f.to_string_lossy().into_owned())
            })
            .collect();
        let target = dir.join(archive_name);
        // A stale bundle from an earlier run would otherwise be appended to.
        match tokio::fs::remove_file(&target).await {
            Ok(()) => tracing::debug!(path = %target.display(), "removed stale archive"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %target.display(), "could not remove stale archive: {}", e),
        }

        let (program, args) = self.command(&names, archive_name);
        tracing::debug!(%program, files = names.len(), archive = archive_name, "bundling playlist");
        let output = Command::new(&program)
            .args(&args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ArchiveError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(ArchiveError::Failed {
                program,
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if !tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Err(ArchiveError::MissingOutput(target));
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_command_uses_local_paths() {
        let a = CommandArchiver::new(Some("zip".to_string()));
        let (program, args) = a.command(
            &["001 - One.mp3".to_string(), "-x.mp3".to_string()],
            "-rf Mix.zip",
        );
        assert_eq!(program, "zip");
        assert_eq!(
            args,
            vec!["-q", "-j", "./-rf Mix.zip", "./001 - One.mp3", "./-x.mp3"]
        );
    }

    #[tokio::test]
    async fn empty_file_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = CommandArchiver::default()
            .bundle(dir.path(), &[], "x.zip")
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Empty));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        let err = CommandArchiver::new(Some("mdq-no-such-archiver".to_string()))
            .bundle(dir.path(), &[dir.path().join("a.mp3")], "x.zip")
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Spawn { .. }));
    }
}
