//! Continuous system-audio capture pipeline.
//!
//! Spawns the platform audio-dump subprocess, accumulates its raw PCM output
//! into a rolling buffer, slices fixed-duration chunks, downmixes them to
//! mono, and relays each chunk (base64-encoded) to the realtime session in
//! arrival order.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use cheddar_common::PCM_MIME_TYPE;

use super::downmix::stereo_to_mono;
use crate::paths::{resolve_audio_dump_path, DataDirs};
use crate::session::SessionManager;

/// Capture format emitted by the audio-dump subprocess.
pub const SAMPLE_RATE: usize = 24_000;
pub const BYTES_PER_SAMPLE: usize = 2;
pub const CHANNELS: usize = 2;

/// One chunk is 0.1 s of audio: 24000 Hz * 2 B * 2 ch / 10 = 9600 bytes.
pub const CHUNK_SIZE: usize = SAMPLE_RATE * BYTES_PER_SAMPLE * CHANNELS / 10;

/// Rolling-buffer cap. The reference implementation computes "one second"
/// without the channel factor; kept verbatim for compatibility.
pub const MAX_BUFFER_BYTES: usize = SAMPLE_RATE * BYTES_PER_SAMPLE;

/// Rolling accumulator over the subprocess output stream.
///
/// `push` appends bytes and returns every complete chunk in arrival order.
/// After slicing, anything still above the cap is discarded from the front
/// (oldest audio first) so the buffer never outgrows one second.
pub struct ChunkBuffer {
    data: Vec<u8>,
    chunk_size: usize,
    max_bytes: usize,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::with_limits(CHUNK_SIZE, MAX_BUFFER_BYTES)
    }

    pub fn with_limits(chunk_size: usize, max_bytes: usize) -> Self {
        Self {
            data: Vec::new(),
            chunk_size: chunk_size.max(1),
            max_bytes,
        }
    }

    /// Append bytes and slice off every complete chunk.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.data.extend_from_slice(bytes);

        let mut chunks = Vec::new();
        while self.data.len() >= self.chunk_size {
            chunks.push(self.data.drain(..self.chunk_size).collect());
        }

        if self.data.len() > self.max_bytes {
            let excess = self.data.len() - self.max_bytes;
            self.data.drain(..excess);
        }

        chunks
    }

    /// Bytes currently buffered (always below one chunk after `push`).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for ChunkBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the audio-dump subprocess handle.
pub struct CapturePipeline {
    child: Mutex<Option<Child>>,
}

impl CapturePipeline {
    pub fn new() -> Self {
        Self {
            child: Mutex::new(None),
        }
    }

    /// Whether the capture subprocess is currently running.
    pub async fn is_running(&self) -> bool {
        let mut guard = self.child.lock().await;
        match guard.as_mut() {
            // try_wait returns Ok(None) while the child is still alive
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Spawn the audio-dump subprocess and start relaying chunks.
    ///
    /// Fails when capture is already running, when the platform has no
    /// audio-dump binary, or when the spawn does not yield a live process.
    pub async fn start(
        self: Arc<Self>,
        session: Arc<SessionManager>,
        dirs: &DataDirs,
    ) -> Result<(), String> {
        let mut guard = self.child.lock().await;
        if guard.is_some() {
            return Err("System audio capture is already running".to_string());
        }

        let dump_path = resolve_audio_dump_path()
            .ok_or_else(|| "System audio capture is only available on macOS".to_string())?;
        info!("Starting system audio capture: {}", dump_path.display());

        let mut child = Command::new(&dump_path)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| format!("Failed to start {}: {}", dump_path.display(), e))?;

        let pid = child
            .id()
            .ok_or_else(|| "Audio capture process exited during spawn".to_string())?;
        info!("Audio capture process started (pid: {})", pid);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| "Audio capture process has no stdout".to_string())?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr));
        }

        *guard = Some(child);
        drop(guard);

        let debug_dir = std::env::var("DEBUG_AUDIO")
            .is_ok()
            .then(|| dirs.audio_dir.clone());
        tokio::spawn(relay_loop(self, session, stdout, debug_dir));

        Ok(())
    }

    /// Stop the capture subprocess. Idempotent when already stopped.
    pub async fn stop(&self) {
        let mut guard = self.child.lock().await;
        let Some(mut child) = guard.take() else {
            return;
        };
        info!("Stopping system audio capture");

        // Ask politely first; the dump tool exits cleanly on SIGTERM.
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
        }

        match tokio::time::timeout(Duration::from_secs(2), child.wait()).await {
            Ok(Ok(status)) => debug!("Audio capture process exited: {}", status),
            Ok(Err(e)) => warn!("Failed to reap audio capture process: {}", e),
            Err(_) => {
                warn!("Audio capture process ignored SIGTERM, killing");
                let _ = child.kill().await;
            }
        }
    }

    /// Clear the handle after the subprocess died on its own, so a
    /// subsequent `start` can recover.
    async fn clear_dead_child(&self) {
        let mut guard = self.child.lock().await;
        if let Some(child) = guard.as_mut() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    warn!("Audio capture process exited unexpectedly: {}", status);
                    *guard = None;
                }
                Ok(None) => {} // still alive; stdout EOF was a stop() kill
                Err(e) => {
                    warn!("Failed to query audio capture process: {}", e);
                    *guard = None;
                }
            }
        }
    }
}

impl Default for CapturePipeline {
    fn default() -> Self {
        Self::new()
    }
}

async fn drain_stderr(stderr: tokio::process::ChildStderr) {
    use tokio::io::{AsyncBufReadExt, BufReader};
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        warn!("audio capture stderr: {}", line);
    }
}

/// Read subprocess output, chunk it, and hand each chunk to the relay.
async fn relay_loop(
    pipeline: Arc<CapturePipeline>,
    session: Arc<SessionManager>,
    mut stdout: tokio::process::ChildStdout,
    debug_dir: Option<PathBuf>,
) {
    let mut buffer = ChunkBuffer::new();
    let mut read_buf = vec![0u8; 8192];

    loop {
        match stdout.read(&mut read_buf).await {
            Ok(0) => break,
            Ok(n) => {
                for chunk in buffer.push(&read_buf[..n]) {
                    let mono = if CHANNELS == 2 {
                        stereo_to_mono(&chunk)
                    } else {
                        chunk
                    };
                    if let Some(dir) = &debug_dir {
                        save_debug_chunk(dir, &mono);
                    }
                    let encoded = BASE64.encode(&mono);
                    // A missing session just drops the chunk; capture keeps
                    // running so audio resumes when a session opens.
                    if let Err(err) = session.send_audio(encoded, PCM_MIME_TYPE.to_string()).await {
                        debug!("Dropping capture chunk: {}", err);
                    }
                }
            }
            Err(e) => {
                warn!("Audio capture read error: {}", e);
                break;
            }
        }
    }

    pipeline.clear_dead_child().await;
}

fn save_debug_chunk(dir: &std::path::Path, mono: &[u8]) {
    let stamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let path = dir.join(format!("system_audio_{}.pcm", stamp));
    if let Err(e) = std::fs::write(&path, mono) {
        warn!("Failed to write debug audio chunk {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_constants_match_capture_format() {
        assert_eq!(CHUNK_SIZE, 9600);
        assert_eq!(MAX_BUFFER_BYTES, 48000);
    }

    #[test]
    fn five_small_events_produce_one_chunk() {
        // 5 events of 2400 bytes = 12000 bytes with a 9600-byte chunk size:
        // exactly one chunk out, 2400 bytes left buffered.
        let mut buffer = ChunkBuffer::new();
        let mut chunks = Vec::new();
        for _ in 0..5 {
            chunks.extend(buffer.push(&[0u8; 2400]));
        }

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), CHUNK_SIZE);
        assert_eq!(stereo_to_mono(&chunks[0]).len(), 4800);
        assert_eq!(buffer.len(), 2400);
    }

    #[test]
    fn chunks_preserve_arrival_order() {
        let mut buffer = ChunkBuffer::with_limits(4, 16);
        let chunks = buffer.push(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);

        assert_eq!(chunks, vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]]);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn remainder_is_capped_by_dropping_oldest_bytes() {
        // Chunk size larger than the cap forces the overflow path.
        let mut buffer = ChunkBuffer::with_limits(100, 6);
        let chunks = buffer.push(&[1, 2, 3, 4, 5, 6, 7, 8]);

        assert!(chunks.is_empty());
        assert_eq!(buffer.len(), 6);
        // Oldest bytes (1, 2) were discarded; the rest chunk out in order.
        let chunks = buffer.push(&[0u8; 94]);
        assert_eq!(&chunks[0][..6], &[3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn buffer_never_exceeds_cap_for_arbitrary_event_sizes() {
        let mut buffer = ChunkBuffer::new();
        for size in [1usize, 2399, 9600, 9601, 40000, 123457] {
            buffer.push(&vec![0u8; size]);
            assert!(buffer.len() <= MAX_BUFFER_BYTES);
            assert!(buffer.len() < CHUNK_SIZE);
        }
    }

    #[test]
    fn default_buffer_starts_empty() {
        assert!(ChunkBuffer::default().is_empty());
    }
}
