#![cfg(unix)]

mod support;

use ezmp3_core::acquirer::{Acquirer, SourceUrl};
use ezmp3_core::error::AcquireError;
use std::path::PathBuf;
use support::{FakeYtDlp, FetchMode};

fn source() -> SourceUrl {
    SourceUrl::parse("https://video.example/watch?id=abc").unwrap()
}

#[tokio::test]
async fn acquires_non_empty_file_with_info() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let yt_dlp = FakeYtDlp::install(tools.path(), FetchMode::Ok);
    let output = work.path().join("audio.webm");

    let acquired = Acquirer::new(yt_dlp.path.clone())
        .acquire(&source(), &output)
        .await
        .unwrap();

    assert_eq!(acquired.path, output);
    assert!(acquired.size > 0);
    assert_eq!(std::fs::metadata(&output).unwrap().len(), acquired.size);
    let info = acquired.info.unwrap();
    assert_eq!(info.title, "Ten Seconds");
    assert_eq!(info.duration, Some(10.0));
}

#[tokio::test]
async fn requests_best_audio_without_playlists() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let yt_dlp = FakeYtDlp::install(tools.path(), FetchMode::Ok);

    Acquirer::new(yt_dlp.path.clone())
        .acquire(&source(), &work.path().join("audio.webm"))
        .await
        .unwrap();

    let call = &yt_dlp.invocations()[0];
    assert!(call.contains("-f bestaudio/best"));
    assert!(call.contains("--no-playlist"));
    assert!(call.contains("--force-overwrites"));
    assert!(call.ends_with("-- https://video.example/watch?id=abc"));
}

#[tokio::test]
async fn overwrites_a_stale_file() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let yt_dlp = FakeYtDlp::install(tools.path(), FetchMode::Ok);
    let output = work.path().join("audio.webm");
    std::fs::write(&output, b"stale audio from an earlier job").unwrap();

    Acquirer::new(yt_dlp.path.clone())
        .acquire(&source(), &output)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), b"webm-audio-ten-seconds");
}

#[tokio::test]
async fn removed_video_is_unavailable() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let yt_dlp = FakeYtDlp::install(tools.path(), FetchMode::Removed);
    let output = work.path().join("audio.webm");

    let err = Acquirer::new(yt_dlp.path.clone())
        .acquire(&source(), &output)
        .await
        .unwrap_err();

    assert!(matches!(err, AcquireError::VideoUnavailable(_)));
    assert!(!output.exists());
}

#[tokio::test]
async fn rate_limited_request_is_blocked() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let yt_dlp = FakeYtDlp::install(tools.path(), FetchMode::Blocked);

    let err = Acquirer::new(yt_dlp.path.clone())
        .acquire(&source(), &work.path().join("audio.webm"))
        .await
        .unwrap_err();

    assert!(matches!(err, AcquireError::Blocked(_)));
}

#[tokio::test]
async fn zero_byte_download_is_a_failure() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let yt_dlp = FakeYtDlp::install(tools.path(), FetchMode::EmptyFile);
    let output = work.path().join("audio.webm");

    let err = Acquirer::new(yt_dlp.path.clone())
        .acquire(&source(), &output)
        .await
        .unwrap_err();

    // The file is there, but it must not be trusted
    assert!(matches!(err, AcquireError::EmptyDownload(ref p) if *p == output));
    assert_eq!(std::fs::metadata(&output).unwrap().len(), 0);
}

#[tokio::test]
async fn missing_fetcher_binary() {
    let work = tempfile::tempdir().unwrap();

    let err = Acquirer::new(PathBuf::from("/nonexistent/yt-dlp"))
        .acquire(&source(), &work.path().join("audio.webm"))
        .await
        .unwrap_err();

    assert!(matches!(err, AcquireError::FetcherNotFound));
}
