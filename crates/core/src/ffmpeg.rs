//! FFmpeg/FFprobe command builders and process helpers used by assembly.
//!
//! Argument builders are pure so they can be tested without the binaries;
//! [`run_ffmpeg`] and [`probe_media`] shell out via `tokio::process`.

use std::path::Path;

use serde::Deserialize;

use crate::assembly::NARRATION_VOLUME;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("media file not found: {0}")]
    MediaNotFound(String),
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    pub duration: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------------------

/// Build a concat-demuxer manifest listing `slots` in order.
pub fn concat_manifest<S: AsRef<str>>(slots: &[S]) -> String {
    slots
        .iter()
        .map(|s| format!("file '{}'\n", s.as_ref().replace('\'', "'\\''")))
        .collect()
}

/// Arguments concatenating the manifest's clips without re-encoding.
pub fn concat_args(manifest: &str, output: &str) -> Vec<String> {
    [
        "-y", "-f", "concat", "-safe", "0", "-i", manifest, "-c", "copy", output,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Arguments mixing a background track under the video's own audio.
///
/// The video stream is copied untouched; only audio is re-encoded. The
/// mix ends with the shorter input, so a longer background track is
/// truncated and never extends the video.
pub fn mix_args(video: &str, music: &str, music_volume: f32, output: &str) -> Vec<String> {
    let filter = format!(
        "[0:a]volume={NARRATION_VOLUME:.1}[a0];[1:a]volume={music_volume}[a1];\
         [a0][a1]amix=inputs=2:duration=shortest:dropout_transition=0:normalize=0[aout]"
    );
    [
        "-y",
        "-i",
        video,
        "-i",
        music,
        "-filter_complex",
        filter.as_str(),
        "-map",
        "0:v",
        "-map",
        "[aout]",
        "-c:v",
        "copy",
        "-c:a",
        "aac",
        "-shortest",
        output,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Arguments laying a background track under a video that has no audio
/// stream of its own.
pub fn music_only_args(video: &str, music: &str, music_volume: f32, output: &str) -> Vec<String> {
    let filter = format!("[1:a]volume={music_volume}[aout]");
    [
        "-y",
        "-i",
        video,
        "-i",
        music,
        "-filter_complex",
        filter.as_str(),
        "-map",
        "0:v",
        "-map",
        "[aout]",
        "-c:v",
        "copy",
        "-c:a",
        "aac",
        "-shortest",
        output,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// ---------------------------------------------------------------------------
// Process helpers
// ---------------------------------------------------------------------------

/// Check that the `ffmpeg` binary is callable.
pub async fn ffmpeg_version() -> Result<String, FfmpegError> {
    let output = tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().to_string())
}

/// Run `ffmpeg` with `args` inside `work_dir`.
pub async fn run_ffmpeg(work_dir: &Path, args: &[String]) -> Result<(), FfmpegError> {
    let output = tokio::process::Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error"])
        .args(args)
        .current_dir(work_dir)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(())
}

/// Run `ffprobe` on a media file and return the parsed JSON output.
pub async fn probe_media(path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    if !path.exists() {
        return Err(FfmpegError::MediaNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse the media duration in seconds from ffprobe output.
pub fn parse_duration(probe: &FfprobeOutput) -> f64 {
    // Try format-level duration first.
    if let Some(secs) = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
    {
        return secs;
    }
    // Fall back to the longest stream duration.
    probe
        .streams
        .iter()
        .filter_map(|s| s.duration.as_deref()?.parse::<f64>().ok())
        .fold(0.0, f64::max)
}

/// Whether the probed file carries at least one audio stream.
pub fn has_audio(probe: &FfprobeOutput) -> bool {
    probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"))
}
