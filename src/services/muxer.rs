//! Combines a silent generated video with a separately synthesized speech track.

use async_trait::async_trait;
use reqwest::Client;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Silence inserted before speech starts.
pub const LEAD_SILENCE_MS: u32 = 300;

/// Padding appended after speech so the last word is not cut against the video.
pub const TAIL_PADDING_SECS: f32 = 0.5;

#[async_trait]
pub trait MediaMuxer: Send + Sync {
    /// Download both inputs and return one MP4 carrying the video stream
    /// untouched and the audio re-encoded.
    async fn mux(&self, video_url: &str, audio_url: &str) -> Result<Vec<u8>, MuxError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    #[error("Failed to download mux input {url}: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("Mux input {url} returned HTTP {status}")]
    Download { url: String, status: u16 },

    #[error("Mux input {url} is too large: {size} bytes (limit {limit})")]
    InputTooLarge { url: String, size: usize, limit: usize },

    #[error("ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs a local `ffmpeg` binary in a scratch directory.
pub struct FfmpegMuxer {
    http: Client,
    ffmpeg_path: String,
    max_input_bytes: usize,
    /// Parent of the per-run scratch directories; the system temp dir when unset.
    scratch_root: Option<PathBuf>,
}

impl FfmpegMuxer {
    pub fn new(http: Client, ffmpeg_path: String, max_input_bytes: usize) -> Self {
        Self {
            http,
            ffmpeg_path,
            max_input_bytes,
            scratch_root: None,
        }
    }

    pub fn with_scratch_root(mut self, root: PathBuf) -> Self {
        self.scratch_root = Some(root);
        self
    }

    fn scratch_dir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("mux-");
        match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }

    fn too_large(&self, url: &str, size: usize) -> MuxError {
        MuxError::InputTooLarge {
            url: url.to_string(),
            size,
            limit: self.max_input_bytes,
        }
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), MuxError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| MuxError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MuxError::Download {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_input_bytes {
                return Err(self.too_large(url, length as usize));
            }
        }

        let bytes = response.bytes().await.map_err(|source| MuxError::Transport {
            url: url.to_string(),
            source,
        })?;
        if bytes.len() > self.max_input_bytes {
            return Err(self.too_large(url, bytes.len()));
        }
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }
}

/// ffmpeg arguments: copy video, re-encode delayed and padded audio, stop at
/// the shorter stream.
pub fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    let filter = format!(
        "[1:a]adelay={LEAD_SILENCE_MS}:all=1,apad=pad_dur={TAIL_PADDING_SECS}[speech]"
    );

    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into()];
    args.push(video.into());
    args.push("-i".into());
    args.push(audio.into());
    args.extend(
        [
            "-filter_complex",
            filter.as_str(),
            "-map",
            "0:v:0",
            "-map",
            "[speech]",
            "-c:v",
            "copy",
            "-c:a",
            "aac",
            "-b:a",
            "128k",
            "-shortest",
            "-movflags",
            "+faststart",
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(output.into());
    args
}

#[async_trait]
impl MediaMuxer for FfmpegMuxer {
    async fn mux(&self, video_url: &str, audio_url: &str) -> Result<Vec<u8>, MuxError> {
        // Removed on drop, including every early return below.
        let scratch = self.scratch_dir()?;
        let video_path = scratch.path().join("video.mp4");
        let audio_path = scratch.path().join("audio.mp3");
        let output_path = scratch.path().join("final.mp4");

        self.download(video_url, &video_path).await?;
        self.download(audio_url, &audio_path).await?;

        let output = tokio::process::Command::new(&self.ffmpeg_path)
            .args(mux_args(&video_path, &audio_path, &output_path))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(MuxError::NotFound)?;

        if !output.status.success() {
            return Err(MuxError::ExecutionFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let muxed = tokio::fs::read(&output_path).await?;
        tracing::info!(bytes = muxed.len(), "Video and speech muxed");
        Ok(muxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::stub_server;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    async fn media_host() -> String {
        stub_server::serve(
            Router::new()
                .route("/v.mp4", get(|| async { vec![1u8; 64] }))
                .route("/a.mp3", get(|| async { vec![2u8; 32] }))
                .route("/gone.mp3", get(|| async { StatusCode::NOT_FOUND })),
        )
        .await
    }

    fn is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    fn args() -> Vec<String> {
        mux_args(
            Path::new("/tmp/v.mp4"),
            Path::new("/tmp/a.mp3"),
            Path::new("/tmp/out.mp4"),
        )
        .into_iter()
        .map(|a| a.to_string_lossy().to_string())
        .collect()
    }

    #[test]
    fn test_video_is_copied_and_audio_reencoded() {
        let args = args();
        let copy = args.iter().position(|a| a == "-c:v").unwrap();
        assert_eq!(args[copy + 1], "copy");
        let audio = args.iter().position(|a| a == "-c:a").unwrap();
        assert_eq!(args[audio + 1], "aac");
        assert!(args.contains(&"-shortest".to_string()));
    }

    #[test]
    fn test_speech_is_delayed_and_padded() {
        let args = args();
        let filter = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert_eq!(args[filter + 1], "[1:a]adelay=300:all=1,apad=pad_dur=0.5[speech]");
    }

    #[test]
    fn test_inputs_precede_output() {
        let args = args();
        assert_eq!(args[2], "/tmp/v.mp4");
        assert_eq!(args[4], "/tmp/a.mp3");
        assert_eq!(args.last().unwrap(), "/tmp/out.mp4");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_encoder_failure_leaves_no_scratch_files() {
        let base = media_host().await;
        let root = tempfile::tempdir().unwrap();
        let muxer = FfmpegMuxer::new(Client::new(), "false".to_string(), 1024)
            .with_scratch_root(root.path().to_path_buf());

        let err = muxer
            .mux(&format!("{base}/v.mp4"), &format!("{base}/a.mp3"))
            .await
            .unwrap_err();

        assert!(matches!(err, MuxError::ExecutionFailed { exit_code: Some(1), .. }));
        assert!(is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_scratch_files() {
        let base = media_host().await;
        let root = tempfile::tempdir().unwrap();
        let muxer = FfmpegMuxer::new(Client::new(), "ffmpeg".to_string(), 1024)
            .with_scratch_root(root.path().to_path_buf());

        let err = muxer
            .mux(&format!("{base}/v.mp4"), &format!("{base}/gone.mp3"))
            .await
            .unwrap_err();

        assert!(matches!(err, MuxError::Download { status: 404, .. }));
        assert!(is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_oversized_input_is_rejected_before_encoding() {
        let base = media_host().await;
        let root = tempfile::tempdir().unwrap();
        let muxer = FfmpegMuxer::new(Client::new(), "ffmpeg".to_string(), 48)
            .with_scratch_root(root.path().to_path_buf());

        let err = muxer
            .mux(&format!("{base}/v.mp4"), &format!("{base}/a.mp3"))
            .await
            .unwrap_err();

        assert!(matches!(err, MuxError::InputTooLarge { size: 64, limit: 48, .. }));
        assert!(is_empty(root.path()));
    }
}
