//! Audio track extraction.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{StageError, StageResult};

/// Sample rate expected by speech-to-text models.
pub const SPEECH_SAMPLE_RATE: u32 = 16_000;

/// Path of the WAV file extracted from `video` into `out_dir`.
pub fn audio_path_for(video: &Path, out_dir: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string());
    out_dir.join(format!("{stem}_audio.wav"))
}

/// Build the extraction command: mono 16-bit PCM at 16 kHz, video dropped.
pub fn extraction_command(video: &Path, out_dir: &Path) -> FfmpegCommand {
    FfmpegCommand::new(video, audio_path_for(video, out_dir))
        .no_video()
        .audio_codec("pcm_s16le")
        .audio_rate(SPEECH_SAMPLE_RATE)
        .audio_channels(1)
}

/// Extract the audio track of `video` into `out_dir` and return the WAV path.
pub async fn extract_audio(
    runner: &FfmpegRunner,
    video: &Path,
    out_dir: &Path,
) -> StageResult<PathBuf> {
    if !video.exists() {
        return Err(StageError::FileNotFound(video.to_path_buf()));
    }

    let cmd = extraction_command(video, out_dir);
    info!("Extracting audio from {}", video.display());
    runner.run(&cmd).await?;

    let output = cmd.output().to_path_buf();
    if !output.exists() {
        return Err(StageError::ffmpeg_failed(
            "FFmpeg produced no audio file",
            None,
            None,
        ));
    }
    info!("Audio extracted to {}", output.display());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_audio_path_for() {
        let path = audio_path_for(Path::new("/uploads/abc_talk.mp4"), Path::new("/tmp/work"));
        assert_eq!(path, PathBuf::from("/tmp/work/abc_talk_audio.wav"));
    }

    #[tokio::test]
    async fn test_missing_video() {
        let runner = FfmpegRunner::new(Duration::from_secs(1));
        let err = extract_audio(&runner, Path::new("/nope/talk.mp4"), Path::new("/tmp"))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::FileNotFound(_)));
    }
}
