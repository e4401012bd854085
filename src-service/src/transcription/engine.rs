//! Transcription engine invocation.
//!
//! The engine is the external whisper CLI. It is asked for JSON output,
//! which yields a sequence of timed segments; when no usable JSON appears
//! the CLI's stdout is treated as a plain-string transcript. Anything else
//! is reported as unrecognized so the caller can substitute its sentinel.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

/// One timed transcript segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptSegment {
    pub start: String,
    pub end: String,
    pub speech: String,
}

/// What the engine handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutput {
    /// Timed segments parsed from the engine's JSON output
    Segments(Vec<TranscriptSegment>),
    /// Plain transcript text from the engine's stdout
    Text(String),
    /// The engine produced something we cannot interpret
    Unrecognized,
}

/// Run the whisper CLI against a 16 kHz mono WAV file.
///
/// A non-zero exit is an error carrying the engine's diagnostic output; a
/// successful exit always yields an [`EngineOutput`].
pub async fn transcribe_wav(
    cli: &Path,
    model_path: &Path,
    wav_path: &Path,
    language: &str,
) -> Result<EngineOutput, String> {
    let output = Command::new(cli)
        .arg("-m")
        .arg(model_path)
        .arg("-f")
        .arg(wav_path)
        .arg("-l")
        .arg(language)
        .arg("-oj")
        .arg("-of")
        .arg(wav_path)
        .arg("-np")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .output()
        .await
        .map_err(|e| format!("Failed to start transcription engine {}: {}", cli.display(), e))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        let details = if stderr.trim().is_empty() {
            stdout.trim()
        } else {
            stderr.trim()
        };
        return Err(format!(
            "Transcription engine failed ({}): {}",
            output.status, details
        ));
    }

    // `-of <base>` makes the engine write `<base>.json` next to the WAV.
    let json_path = PathBuf::from(format!("{}.json", wav_path.display()));
    let parsed = read_segments_file(&json_path);
    let _ = std::fs::remove_file(&json_path);

    match parsed {
        Some(segments) => Ok(EngineOutput::Segments(segments)),
        None if !stdout.trim().is_empty() => Ok(EngineOutput::Text(stdout.trim().to_string())),
        None => {
            warn!(
                "Transcription engine produced neither segments nor text for {}",
                wav_path.display()
            );
            Ok(EngineOutput::Unrecognized)
        }
    }
}

/// Parse the engine's JSON output file into segments.
fn read_segments_file(path: &Path) -> Option<Vec<TranscriptSegment>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("No engine JSON at {}: {}", path.display(), e);
            return None;
        }
    };
    parse_segments(&raw)
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    transcription: Vec<WhisperEntry>,
}

#[derive(Debug, Deserialize)]
struct WhisperEntry {
    #[serde(default)]
    timestamps: WhisperTimestamps,
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct WhisperTimestamps {
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: String,
}

/// Parse whisper JSON (`{"transcription": [{"timestamps": {"from", "to"},
/// "text"}, ...]}`) into segments. Returns `None` for any other shape.
pub(crate) fn parse_segments(raw: &str) -> Option<Vec<TranscriptSegment>> {
    let output: WhisperOutput = serde_json::from_str(raw).ok()?;
    Some(
        output
            .transcription
            .into_iter()
            .map(|entry| TranscriptSegment {
                start: entry.timestamps.from,
                end: entry.timestamps.to,
                speech: entry.text.trim().to_string(),
            })
            .collect(),
    )
}

/// Concatenate segment texts with single spaces, dropping empty ones.
pub fn join_segments(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|segment| segment.speech.as_str())
        .filter(|speech| !speech.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "transcription": [
            {"timestamps": {"from": "00:00:00,000", "to": "00:00:02,100"}, "text": " Hello"},
            {"timestamps": {"from": "00:00:02,100", "to": "00:00:04,000"}, "text": " world."}
        ]
    }"#;

    #[test]
    fn whisper_json_parses_into_segments() {
        let segments = parse_segments(SAMPLE).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].speech, "Hello");
        assert_eq!(segments[0].start, "00:00:00,000");
        assert_eq!(segments[1].end, "00:00:04,000");
    }

    #[test]
    fn segments_join_with_single_spaces() {
        let segments = parse_segments(SAMPLE).unwrap();
        assert_eq!(join_segments(&segments), "Hello world.");
    }

    #[test]
    fn empty_segments_are_skipped_when_joining() {
        let segments = vec![
            TranscriptSegment {
                start: String::new(),
                end: String::new(),
                speech: "one".to_string(),
            },
            TranscriptSegment {
                start: String::new(),
                end: String::new(),
                speech: String::new(),
            },
            TranscriptSegment {
                start: String::new(),
                end: String::new(),
                speech: "two".to_string(),
            },
        ];
        assert_eq!(join_segments(&segments), "one two");
    }

    #[test]
    fn silent_audio_yields_empty_transcript() {
        let segments = parse_segments(r#"{"transcription": []}"#).unwrap();
        assert_eq!(join_segments(&segments), "");
    }

    #[test]
    fn unexpected_shapes_are_rejected() {
        assert!(parse_segments("[]").is_none());
        assert!(parse_segments(r#"{"other": 1}"#).is_none());
        assert!(parse_segments("not json").is_none());
        assert!(parse_segments(r#"{"transcription": [{"no_text": true}]}"#).is_none());
    }
}
