//! Integration tests: full job runs against a fake downloader script.
//!
//! Each test gets its own jobs directory; the fake downloader's behaviour is
//! selected by the submitted URL.
#![cfg(unix)]

mod common;

use std::time::Duration;

use mdq_core::launcher::{NO_OUTPUT_MESSAGE, SPAWN_FAILED_PREFIX};
use mdq_core::persist::{METADATA_FILE, STATUS_FILE};
use mdq_core::queue::CANCELLED_MESSAGE;
use mdq_core::{JobId, JobStatus, MediaFormat, QueueError, SubmitRequest};
use tempfile::tempdir;
use tokio::io::AsyncReadExt;

fn request(url: &str, format: MediaFormat) -> SubmitRequest {
    SubmitRequest {
        url: url.to_string(),
        format,
        quality: "best".to_string(),
        playlist_hint: None,
    }
}

fn recorded_args(dir: &std::path::Path) -> String {
    std::fs::read_to_string(dir.join(".args")).unwrap()
}

#[tokio::test]
async fn single_audio_job_completes() {
    let root = tempdir().unwrap();
    let cfg = common::test_config(root.path());
    let (queue, archiver) = common::start_queue(&cfg).await;

    let id = queue
        .submit(request(
            "https://media.test/watch?v=single-ok",
            MediaFormat::Audio,
        ))
        .await
        .unwrap();
    let dir = root.path().join(id.as_str());
    let status = common::read_json(&dir.join(STATUS_FILE));
    assert_eq!(status["status"], "queued");
    let meta = common::read_json(&dir.join(METADATA_FILE));
    assert_eq!(meta["id"], id.as_str());
    assert_eq!(meta["isPlaylist"], false);

    let job = common::wait_terminal(&queue, &id).await;
    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.error_message);
    assert_eq!(job.percent, 100.0);
    assert!(!job.is_playlist);
    assert_eq!(job.output_name.as_deref(), Some("Song Title.mp3"));
    assert!(job.track_titles.contains(&"Song Title".to_string()));

    let args = recorded_args(&dir);
    assert!(args.contains("--no-playlist"));
    assert!(!args.contains("--yes-playlist"));
    assert!(!args.contains("--ignore-errors"));
    assert!(args.contains("-x"));
    assert!(args.contains("--no-continue"));
    assert!(archiver.bundles.lock().unwrap().is_empty());

    let status = common::read_json(&dir.join(STATUS_FILE));
    assert_eq!(status["status"], "complete");
    assert_eq!(status["progress"], 100.0);
    let meta = common::read_json(&dir.join(METADATA_FILE));
    assert!(meta["outputPath"]
        .as_str()
        .unwrap()
        .ends_with("Song Title.mp3"));

    let mut read = queue.open_artifact(&id, Some("bytes=0-4")).await.unwrap();
    assert!(read.partial);
    assert_eq!(read.total_len, "audio-bytes".len() as u64);
    let mut buf = Vec::new();
    read.reader.read_to_end(&mut buf).await.unwrap();
    assert_eq!(buf, b"audio");

    // Cleanup is disabled in the test config.
    assert!(!queue.mark_served(&id).await.unwrap());

    queue.remove(&id).await.unwrap();
    assert!(queue.list().await.is_empty());
    assert!(!dir.exists());
}

#[tokio::test]
async fn playlist_with_skipped_item_is_a_soft_success() {
    let root = tempdir().unwrap();
    let cfg = common::test_config(root.path());
    let (queue, archiver) = common::start_queue(&cfg).await;

    let id = queue
        .submit(request(
            "https://media.test/playlist?list=PL1&case=playlist-partial",
            MediaFormat::Audio,
        ))
        .await
        .unwrap();
    let job = common::wait_terminal(&queue, &id).await;

    assert_eq!(job.status, JobStatus::Completed, "{:?}", job.error_message);
    assert!(job.is_playlist);
    assert_eq!(job.playlist_title.as_deref(), Some("Road Trip"));
    assert_eq!(job.total_tracks, Some(3));
    assert_eq!(job.skipped_titles.len(), 1);
    assert!(job.track_titles.contains(&"First Song".to_string()));
    assert!(job.track_titles.contains(&"Third Song".to_string()));
    assert_eq!(job.output_name.as_deref(), Some("Road Trip.zip"));

    let bundles = archiver.bundles.lock().unwrap().clone();
    assert_eq!(
        bundles,
        vec![(
            "Road Trip.zip".to_string(),
            vec!["001 - First Song.mp3".to_string(), "003 - Third Song.mp3".to_string()]
        )]
    );

    let args = recorded_args(&root.path().join(id.as_str()));
    assert!(args.contains("--yes-playlist"));
    assert!(args.contains("--ignore-errors"));
    assert!(args.contains("%(playlist_index)03d - %(title)s.%(ext)s"));
}

#[tokio::test]
async fn playlist_without_files_fails_with_condensed_error() {
    let root = tempdir().unwrap();
    let cfg = common::test_config(root.path());
    let (queue, archiver) = common::start_queue(&cfg).await;

    let id = queue
        .submit(request(
            "https://media.test/playlist?list=PL2&case=playlist-empty",
            MediaFormat::Audio,
        ))
        .await
        .unwrap();
    let job = common::wait_terminal(&queue, &id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error_message.as_deref(),
        Some("This playlist does not exist")
    );
    assert!(archiver.bundles.lock().unwrap().is_empty());

    let status = common::read_json(&root.path().join(id.as_str()).join(STATUS_FILE));
    assert_eq!(status["status"], "failed");
}

#[tokio::test]
async fn clean_exit_without_files_fails_with_generic_message() {
    let root = tempdir().unwrap();
    let cfg = common::test_config(root.path());
    let (queue, _) = common::start_queue(&cfg).await;

    let id = queue
        .submit(request(
            "https://media.test/watch?v=no-output",
            MediaFormat::Video,
        ))
        .await
        .unwrap();
    let job = common::wait_terminal(&queue, &id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some(NO_OUTPUT_MESSAGE));
}

#[tokio::test]
async fn cancel_stops_the_process_and_deletes_the_directory() {
    let root = tempdir().unwrap();
    let cfg = common::test_config(root.path());
    let (queue, _) = common::start_queue(&cfg).await;

    let id = queue
        .submit(request("https://media.test/watch?v=slow", MediaFormat::Audio))
        .await
        .unwrap();
    common::wait_for(&queue, &id, |s| s.is_active()).await;

    queue.cancel(&id).await.unwrap();
    let dir = root.path().join(id.as_str());
    let job = queue.get(&id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some(CANCELLED_MESSAGE));
    assert!(!dir.exists());

    // The launcher's late result must not overwrite the cancellation.
    tokio::time::sleep(Duration::from_millis(600)).await;
    let job = queue.get(&id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some(CANCELLED_MESSAGE));
    assert!(!dir.exists());

    let err = queue.cancel(&id).await.unwrap_err();
    assert!(matches!(err, QueueError::InvalidState { .. }));
}

#[tokio::test]
async fn cancel_after_exit_removes_files_written_late() {
    let root = tempdir().unwrap();
    let cfg = common::test_config(root.path());
    let (queue, _) = common::start_queue(&cfg).await;

    let id = queue
        .submit(request("https://media.test/watch?v=linger", MediaFormat::Audio))
        .await
        .unwrap();
    common::wait_for(&queue, &id, |s| s.is_active()).await;
    // The downloader has exited; its output is still being drained.
    tokio::time::sleep(Duration::from_millis(300)).await;
    queue.cancel(&id).await.unwrap();

    let dir = root.path().join(id.as_str());
    tokio::time::sleep(Duration::from_millis(2000)).await;
    let job = queue.get(&id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some(CANCELLED_MESSAGE));
    assert!(!dir.exists());
}

#[tokio::test]
async fn cancel_a_job_still_waiting_for_a_slot() {
    let root = tempdir().unwrap();
    let mut cfg = common::test_config(root.path());
    cfg.max_concurrent_jobs = Some(1);
    let (queue, _) = common::start_queue(&cfg).await;

    let running = queue
        .submit(request("https://media.test/watch?v=slow", MediaFormat::Audio))
        .await
        .unwrap();
    common::wait_for(&queue, &running, |s| s.is_active()).await;
    let waiting = queue
        .submit(request(
            "https://media.test/watch?v=single-ok",
            MediaFormat::Audio,
        ))
        .await
        .unwrap();
    assert_eq!(queue.get(&waiting).await.unwrap().status, JobStatus::Pending);

    queue.cancel(&waiting).await.unwrap();
    let job = queue.get(&waiting).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some(CANCELLED_MESSAGE));
    assert!(!root.path().join(waiting.as_str()).exists());

    // Freeing the slot must not start the cancelled job.
    queue.cancel(&running).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let job = queue.get(&waiting).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(!root.path().join(waiting.as_str()).exists());
}

#[tokio::test]
async fn resume_and_remove_are_rejected_in_wrong_states() {
    let root = tempdir().unwrap();
    let cfg = common::test_config(root.path());
    let (queue, _) = common::start_queue(&cfg).await;

    let id = queue
        .submit(request(
            "https://media.test/watch?v=single-ok",
            MediaFormat::Audio,
        ))
        .await
        .unwrap();
    let before = common::wait_terminal(&queue, &id).await;

    let err = queue.resume(&id).await.unwrap_err();
    assert!(matches!(
        err,
        QueueError::InvalidState {
            status: JobStatus::Completed,
            ..
        }
    ));
    assert_eq!(queue.get(&id).await.unwrap(), before);

    let unknown = JobId::new();
    assert!(matches!(
        queue.resume(&unknown).await,
        Err(QueueError::NotFound(_))
    ));
    assert!(matches!(
        queue.cancel(&unknown).await,
        Err(QueueError::NotFound(_))
    ));
    assert!(matches!(
        queue.remove(&unknown).await,
        Err(QueueError::NotFound(_))
    ));
}

#[tokio::test]
async fn missing_downloader_fails_the_job() {
    let root = tempdir().unwrap();
    let mut cfg = common::test_config(root.path());
    cfg.downloader.binary = "/nonexistent/mdq-yt-dlp".to_string();
    let (queue, _) = common::start_queue(&cfg).await;

    let id = queue
        .submit(request(
            "https://media.test/watch?v=single-ok",
            MediaFormat::Audio,
        ))
        .await
        .unwrap();
    let job = common::wait_terminal(&queue, &id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job
        .error_message
        .unwrap()
        .starts_with(SPAWN_FAILED_PREFIX));
}

#[tokio::test]
async fn invalid_submission_creates_nothing() {
    let root = tempdir().unwrap();
    let cfg = common::test_config(root.path());
    let (queue, _) = common::start_queue(&cfg).await;

    let err = queue
        .submit(request("ftp://media.test/file", MediaFormat::Audio))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::InvalidRequest(_)));
    assert!(queue.list().await.is_empty());
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn concurrency_cap_still_runs_every_job() {
    let root = tempdir().unwrap();
    let mut cfg = common::test_config(root.path());
    cfg.max_concurrent_jobs = Some(1);
    let (queue, _) = common::start_queue(&cfg).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(
            queue
                .submit(request(
                    "https://media.test/watch?v=single-ok",
                    MediaFormat::Audio,
                ))
                .await
                .unwrap(),
        );
    }
    for id in &ids {
        let job = common::wait_terminal(&queue, id).await;
        assert_eq!(job.status, JobStatus::Completed);
    }
}
