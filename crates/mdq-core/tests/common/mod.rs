#![allow(dead_code)]

pub mod fake_downloader;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mdq_core::archive::{ArchiveError, Archiver};
use mdq_core::config::MdqConfig;
use mdq_core::{JobId, JobQueue, JobStatus, JobSummary};

/// Archiver that writes the member names into the bundle instead of compressing.
#[derive(Default)]
pub struct ListArchiver {
    pub bundles: Mutex<Vec<(String, Vec<String>)>>,
}

#[async_trait]
impl Archiver for ListArchiver {
    async fn bundle(
        &self,
        dir: &Path,
        files: &[PathBuf],
        archive_name: &str,
    ) -> Result<PathBuf, ArchiveError> {
        let names: Vec<String> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let out = dir.join(archive_name);
        std::fs::write(&out, names.join("\n")).unwrap();
        self.bundles
            .lock()
            .unwrap()
            .push((archive_name.to_string(), names));
        Ok(out)
    }
}

/// Config pointing at the fake downloader, with cleanup loops disabled.
pub fn test_config(jobs_dir: &Path) -> MdqConfig {
    let mut cfg = MdqConfig::default();
    cfg.jobs_dir = Some(jobs_dir.to_path_buf());
    cfg.downloader.binary = fake_downloader::path().to_string_lossy().into_owned();
    cfg.cleanup.enabled = false;
    cfg.status_write_interval_ms = 0;
    cfg
}

pub async fn start_queue(cfg: &MdqConfig) -> (JobQueue, Arc<ListArchiver>) {
    let archiver = Arc::new(ListArchiver::default());
    let jobs_dir = cfg.jobs_dir.clone().unwrap();
    let queue = JobQueue::start_with(cfg, jobs_dir, archiver.clone())
        .await
        .unwrap();
    (queue, archiver)
}

/// Polls until the job reaches a status accepted by `done`, or panics after 10s.
pub async fn wait_for(
    queue: &JobQueue,
    id: &JobId,
    done: impl Fn(JobStatus) -> bool,
) -> JobSummary {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let job = queue.get(id).await.unwrap();
        if done(job.status) {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} stuck in {}",
            job.status
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub async fn wait_terminal(queue: &JobQueue, id: &JobId) -> JobSummary {
    wait_for(queue, id, |s| s.is_terminal()).await
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}
