//! Local transcription orchestration.
//!
//! A transcription job takes a browser-recorded audio payload (a base64
//! data URI), converts it to the 16 kHz mono WAV the engine expects, runs
//! the whisper CLI, and joins the returned segments. Each job gets its own
//! timestamped temp-file pair, and both files are removed on every exit
//! path before the result is returned.

pub mod engine;

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ffmpeg_sidecar::command::FfmpegCommand;
use tokio::sync::broadcast;
use tracing::{info, warn};

use cheddar_common::DEFAULT_MODEL;

use crate::models;
use crate::paths::{self, DataDirs};
use crate::state::ServiceEvent;

/// Returned when the engine's output is neither segments nor a string.
const UNEXPECTED_FORMAT_SENTINEL: &str = "[Transcription produced an unexpected format]";

/// Transcribe a recorded audio payload.
///
/// Every failure is a `String` the caller can surface directly; temp files
/// never outlive the call regardless of which step failed.
pub async fn transcribe(
    dirs: &DataDirs,
    models_dir: &Path,
    events: &broadcast::Sender<ServiceEvent>,
    audio_data_uri: &str,
) -> Result<String, String> {
    let uri = audio_data_uri.trim();
    if uri.is_empty() {
        return Err("No audio data provided.".to_string());
    }
    let (audio_bytes, extension) = decode_data_uri(uri)?;

    let stamp = chrono::Utc::now().timestamp_millis();
    let input_path = dirs
        .converter_temp
        .join(format!("converter_input_{}.{}", stamp, extension));
    let output_path = dirs
        .converter_temp
        .join(format!("converter_output_{}.wav", stamp));

    // The guard owns both paths from here on; dropping it deletes whatever
    // was actually created, on success and failure alike.
    let _guard = TempFiles::new([input_path.clone(), output_path.clone()]);

    run_job(
        models_dir,
        events,
        audio_bytes,
        &input_path,
        &output_path,
    )
    .await
}

async fn run_job(
    models_dir: &Path,
    events: &broadcast::Sender<ServiceEvent>,
    audio_bytes: Vec<u8>,
    input_path: &Path,
    output_path: &Path,
) -> Result<String, String> {
    tokio::fs::write(input_path, &audio_bytes)
        .await
        .map_err(|e| format!("Failed to write temp audio file: {}", e))?;

    convert_to_wav(input_path, output_path).await?;

    let model_file = models::model_path(models_dir, DEFAULT_MODEL);
    if !model_file.exists() {
        // One remediation attempt before giving up.
        let recovered = models::ensure_model(events, models_dir, DEFAULT_MODEL).await;
        if !recovered || !model_file.exists() {
            return Err(format!(
                "Model file not found: {}. Please download it.",
                models::model_file_name(DEFAULT_MODEL)
            ));
        }
    }

    let cli = paths::resolve_engine_path().ok_or_else(|| {
        "Transcription engine (whisper-cli) could not be located. \
         Install it or set CHEDDAR_WHISPER_CLI."
            .to_string()
    })?;

    let output = engine::transcribe_wav(&cli, &model_file, output_path, "en").await?;
    let text = match output {
        engine::EngineOutput::Segments(segments) => engine::join_segments(&segments),
        engine::EngineOutput::Text(text) => text.trim().to_string(),
        engine::EngineOutput::Unrecognized => UNEXPECTED_FORMAT_SENTINEL.to_string(),
    };

    info!("Transcription finished ({} chars)", text.len());
    Ok(text)
}

/// Split a `data:<mime>;base64,<payload>` URI into raw bytes and a container
/// file extension.
fn decode_data_uri(uri: &str) -> Result<(Vec<u8>, &'static str), String> {
    let (header, payload) = uri
        .split_once(',')
        .ok_or_else(|| "Invalid audio data URI format.".to_string())?;
    if payload.is_empty() || !header.starts_with("data:") {
        return Err("Invalid audio data URI format.".to_string());
    }

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|_| "Invalid audio data URI format.".to_string())?;

    Ok((bytes, container_extension(header)))
}

/// Map the data URI's mime type onto a container extension the converter
/// can recognize. Browser recorders produce webm by default.
fn container_extension(header: &str) -> &'static str {
    let mime = header
        .trim_start_matches("data:")
        .split(';')
        .next()
        .unwrap_or("");
    match mime {
        "audio/ogg" | "application/ogg" => "ogg",
        "audio/mp4" | "audio/x-m4a" => "m4a",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        _ => "webm",
    }
}

/// Convert the recorded container to a 16 kHz mono signed-16-bit WAV.
async fn convert_to_wav(input: &Path, output: &Path) -> Result<(), String> {
    let converter = paths::resolve_converter_path();
    let input = input.to_path_buf();
    let output = output.to_path_buf();

    tokio::task::spawn_blocking(move || convert_to_wav_blocking(&converter, &input, &output))
        .await
        .map_err(|e| format!("Audio conversion task failed: {}", e))?
}

fn convert_to_wav_blocking(converter: &Path, input: &Path, output: &Path) -> Result<(), String> {
    let mut command = FfmpegCommand::new_with_path(converter);
    command.args(["-i", input.to_string_lossy().as_ref()]);
    command.args(["-ar", "16000"]);
    command.args(["-ac", "1"]);
    command.args(["-c:a", "pcm_s16le"]);
    command.args(["-y"]);
    command.arg(output.to_string_lossy().as_ref());

    let inner = command.as_inner_mut();
    inner.stdout(std::process::Stdio::null());
    inner.stderr(std::process::Stdio::piped());

    let mut child = inner
        .spawn()
        .map_err(|e| format!("Failed to start audio converter: {}", e))?;

    let stderr_output = if let Some(mut stderr) = child.stderr.take() {
        use std::io::Read;
        let mut collected = String::new();
        let _ = stderr.read_to_string(&mut collected);
        collected
    } else {
        String::new()
    };

    let status = child
        .wait()
        .map_err(|e| format!("Audio converter process error: {}", e))?;

    if !status.success() {
        return Err(format!(
            "Audio conversion failed (exit code {:?}): {}",
            status.code(),
            stderr_output.trim()
        ));
    }

    Ok(())
}

/// Verify the converter binary is runnable (called once at startup).
pub fn ensure_converter_blocking() -> Result<(), String> {
    let converter = paths::resolve_converter_path();
    match std::process::Command::new(&converter)
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
    {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(format!(
            "Converter at {} exited with status: {}",
            converter.display(),
            status
        )),
        Err(e) => Err(format!(
            "Converter not found at {}: {}",
            converter.display(),
            e
        )),
    }
}

/// Deletes its paths on drop; missing files are fine, other failures are
/// logged and swallowed.
struct TempFiles {
    paths: [PathBuf; 2],
}

impl TempFiles {
    fn new(paths: [PathBuf; 2]) -> Self {
        Self { paths }
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove temp file {}: {}", path.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dirs(root: &Path) -> DataDirs {
        let dirs = DataDirs {
            root: root.to_path_buf(),
            image_dir: root.join("image"),
            audio_dir: root.join("audio"),
            temp_dir: root.join("temp"),
            converter_temp: root.join("temp").join("converter_temp"),
        };
        for dir in [
            &dirs.image_dir,
            &dirs.audio_dir,
            &dirs.temp_dir,
            &dirs.converter_temp,
        ] {
            std::fs::create_dir_all(dir).unwrap();
        }
        dirs
    }

    fn converter_temp_entries(dirs: &DataDirs) -> usize {
        std::fs::read_dir(&dirs.converter_temp).unwrap().count()
    }

    #[tokio::test]
    async fn empty_payload_is_rejected_without_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = test_dirs(tmp.path());
        let (events, _) = broadcast::channel(16);

        let result = transcribe(&dirs, tmp.path(), &events, "").await;
        assert!(result.is_err());
        assert_eq!(converter_temp_entries(&dirs), 0);

        let result = transcribe(&dirs, tmp.path(), &events, "   ").await;
        assert!(result.is_err());
        assert_eq!(converter_temp_entries(&dirs), 0);
    }

    #[tokio::test]
    async fn malformed_data_uri_is_rejected_without_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = test_dirs(tmp.path());
        let (events, _) = broadcast::channel(16);

        for bad in ["no comma here", "data:audio/webm;base64,", "header,%%%"] {
            let result = transcribe(&dirs, tmp.path(), &events, bad).await;
            assert!(result.is_err(), "expected rejection for {:?}", bad);
        }
        assert_eq!(converter_temp_entries(&dirs), 0);
    }

    #[tokio::test]
    async fn failed_conversion_surfaces_diagnostics_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = test_dirs(tmp.path());
        let (events, _) = broadcast::channel(16);

        // Garbage bytes: the converter either fails to parse them (error
        // result) or is missing entirely (also an error result). Both ways
        // the converter_temp dir must be empty afterwards.
        let payload = BASE64.encode(b"definitely not audio");
        let uri = format!("data:audio/webm;base64,{}", payload);
        let result = transcribe(&dirs, tmp.path(), &events, &uri).await;

        assert!(result.is_err());
        assert_eq!(converter_temp_entries(&dirs), 0);
    }

    #[test]
    fn container_extension_follows_mime_type() {
        assert_eq!(container_extension("data:audio/webm;base64"), "webm");
        assert_eq!(
            container_extension("data:audio/webm;codecs=opus;base64"),
            "webm"
        );
        assert_eq!(container_extension("data:audio/ogg;base64"), "ogg");
        assert_eq!(container_extension("data:audio/wav;base64"), "wav");
        assert_eq!(container_extension("data:application/unknown;base64"), "webm");
    }

    #[test]
    fn data_uri_decoding_roundtrips() {
        let payload = BASE64.encode(b"hello");
        let uri = format!("data:audio/ogg;base64,{}", payload);
        let (bytes, extension) = decode_data_uri(&uri).unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(extension, "ogg");
    }

    #[test]
    fn temp_guard_removes_existing_files_and_ignores_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let existing = tmp.path().join("a.bin");
        let missing = tmp.path().join("b.bin");
        std::fs::write(&existing, b"x").unwrap();

        drop(TempFiles::new([existing.clone(), missing.clone()]));

        assert!(!existing.exists());
        assert!(!missing.exists());
    }
}
