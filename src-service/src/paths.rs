//! Data-directory provisioning and external-executable resolution.
//!
//! All capture and transcription state lives under `<home>/cheddar/`. The
//! external tools (audio dump, converter, whisper CLI, model downloader) are
//! resolved the same way everywhere: explicit env override, then a copy next
//! to our own executable, then PATH.

use std::fs;
use std::path::{Path, PathBuf};

/// The fixed on-disk layout created before any capture or transcription runs.
#[derive(Debug, Clone)]
pub struct DataDirs {
    /// `<home>/cheddar/data`
    pub root: PathBuf,
    /// Screenshot frames relayed to the session
    pub image_dir: PathBuf,
    /// Debug audio dumps
    pub audio_dir: PathBuf,
    /// Scratch space
    pub temp_dir: PathBuf,
    /// Converter input/output files, one pair per transcription job
    pub converter_temp: PathBuf,
}

/// Create the data directory tree, idempotently.
pub fn ensure_data_dirs() -> Result<DataDirs, String> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| "Could not determine the user home directory".to_string())?
        .home_dir()
        .to_path_buf();

    let root = home.join("cheddar").join("data");
    let temp_dir = root.join("temp");
    let dirs = DataDirs {
        image_dir: root.join("image"),
        audio_dir: root.join("audio"),
        converter_temp: temp_dir.join("converter_temp"),
        temp_dir,
        root,
    };

    for dir in [
        &dirs.root,
        &dirs.image_dir,
        &dirs.audio_dir,
        &dirs.temp_dir,
        &dirs.converter_temp,
    ] {
        fs::create_dir_all(dir)
            .map_err(|e| format!("Failed to create data directory {}: {}", dir.display(), e))?;
    }

    Ok(dirs)
}

/// Directory holding whisper model artifacts.
///
/// `CHEDDAR_MODEL_DIR` overrides the default `<home>/cheddar/models`.
pub fn models_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHEDDAR_MODEL_DIR") {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join("cheddar").join("models"))
        .unwrap_or_else(|| PathBuf::from("models"))
}

fn env_override(var: &str) -> Option<PathBuf> {
    let value = std::env::var(var).ok()?;
    let candidate = PathBuf::from(value.trim());
    candidate.exists().then_some(candidate)
}

fn exe_adjacent(name: &str) -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let exe_dir = exe.parent()?;
    let candidates = [exe_dir.join(name), exe_dir.join("bin").join(name)];
    candidates.into_iter().find(|path| path.exists())
}

/// Locate the system-audio dump binary.
///
/// The capture subprocess only exists for macOS; on other platforms this
/// resolves to `None` unless `CHEDDAR_AUDIO_DUMP` points at a substitute.
pub fn resolve_audio_dump_path() -> Option<PathBuf> {
    if let Some(path) = env_override("CHEDDAR_AUDIO_DUMP") {
        return Some(path);
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(path) = exe_adjacent("SystemAudioDump") {
            return Some(path);
        }
    }

    None
}

/// Locate the audio format converter (ffmpeg).
///
/// Always returns a path; if nothing is found the bare name is returned and
/// the spawn error surfaces at invocation time.
pub fn resolve_converter_path() -> PathBuf {
    if let Some(path) = env_override("CHEDDAR_FFMPEG") {
        return path;
    }
    if let Some(path) = exe_adjacent(converter_binary_name()) {
        return path;
    }
    if let Ok(path) = which::which("ffmpeg") {
        return path;
    }
    PathBuf::from("ffmpeg")
}

fn converter_binary_name() -> &'static str {
    if cfg!(windows) {
        "ffmpeg.exe"
    } else {
        "ffmpeg"
    }
}

/// Locate the whisper CLI used as the transcription engine.
pub fn resolve_engine_path() -> Option<PathBuf> {
    if let Some(path) = env_override("CHEDDAR_WHISPER_CLI") {
        return Some(path);
    }
    if let Some(path) = exe_adjacent("whisper-cli") {
        return Some(path);
    }
    which::which("whisper-cli").ok()
}

/// Locate the model downloader helper.
///
/// A vendored copy next to the service binary wins over one on PATH.
pub fn resolve_downloader_path() -> Option<PathBuf> {
    if let Some(path) = env_override("CHEDDAR_MODEL_DOWNLOADER") {
        return Some(path);
    }
    if let Some(path) = exe_adjacent("whisper-model-download") {
        return Some(path);
    }
    which::which("whisper-model-download").ok()
}

/// Path for an exported transcript file under the data root.
pub fn transcript_export_path(root: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    root.join(format!("transcript_{}.txt", stamp))
}
