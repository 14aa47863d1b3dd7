// Optional ffmpeg/ffplay bridge for streamable video storage and playback.
//
// Grounded on `hbak_common::system`'s `Command::new(...).stdin(Stdio::...)
// .spawn()?.wait()?` subprocess idiom (see `init_btrfs`/`deinit_btrfs`), and
// on the original `vault.py`'s `USE_FFMPEG = shutil.which('ffmpeg') and
// shutil.which('ffplay')` availability gate. The original's `video.py`
// transcoder internals are out of scope here -- only the interface between
// a `Vault` and the two binaries is implemented, not a reimplementation of
// `video.py`.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, Write};
use std::path::Path;
use std::process::{ChildStdin, Command, Stdio};

use which::which;

use crate::error::{Result, VaultError};
use crate::vault::Vault;

const PLAY_CHUNK_SIZE: usize = 1_000_000;

/// Transcoding parameters for [`MediaBridge::store_streamable_video`].
#[derive(Clone, Debug)]
pub struct TranscodeOptions {
    pub codec: String,
    pub preset: String,
    pub crf: String,
}

impl From<&crate::config::VaultDefaults> for TranscodeOptions {
    fn from(defaults: &crate::config::VaultDefaults) -> Self {
        Self {
            codec: defaults.video_codec.clone(),
            preset: defaults.video_preset.clone(),
            crf: defaults.video_crf.clone(),
        }
    }
}

/// Detects `ffmpeg`/`ffplay` on `PATH` and, when present, bridges them to a
/// [`Vault`]'s store/read pipeline.
pub struct MediaBridge {
    ffmpeg: Option<String>,
    ffplay: Option<String>,
}

impl MediaBridge {
    /// Looks up `ffmpeg_bin`/`ffplay_bin` on `PATH`. Missing binaries are not
    /// an error here -- callers check [`MediaBridge::is_available`] before
    /// offering the feature.
    pub fn detect(ffmpeg_bin: &str, ffplay_bin: &str) -> Self {
        Self {
            ffmpeg: which(ffmpeg_bin).ok().map(|_| ffmpeg_bin.to_string()),
            ffplay: which(ffplay_bin).ok().map(|_| ffplay_bin.to_string()),
        }
    }

    /// Whether both `ffmpeg` and `ffplay` were found on `PATH`.
    pub fn is_available(&self) -> bool {
        self.ffmpeg.is_some() && self.ffplay.is_some()
    }

    /// Transcodes `path` to Matroska with `opts` via `ffmpeg`, streaming its
    /// stdout directly into `vault`'s store pipeline under `name` (the
    /// source file's name). `ffmpeg`'s stderr is redirected to `log_path`.
    pub fn store_streamable_video<B: Read + Write + Seek>(
        &self,
        vault: &mut Vault<B>,
        path: &Path,
        opts: &TranscodeOptions,
        chunk_size: usize,
        log_path: &Path,
    ) -> Result<()> {
        let ffmpeg = self.ffmpeg.as_deref().ok_or(VaultError::MediaUnavailable("ffmpeg"))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unnamed Data".to_string());

        let log = File::create(log_path)?;
        tracing::debug!(ffmpeg, path = %path.display(), "spawning transcoder");

        let mut child = Command::new(ffmpeg)
            .arg("-i")
            .arg(path)
            .arg("-c:v")
            .arg(&opts.codec)
            .arg("-preset")
            .arg(&opts.preset)
            .arg("-crf")
            .arg(&opts.crf)
            .arg("-f")
            .arg("matroska")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(log))
            .spawn()
            .map_err(|e| VaultError::Subprocess(e.to_string()))?;

        let mut stdout = child.stdout.take().expect("ffmpeg stdout was piped");
        let store_result = vault.store_from_reader(&mut stdout, chunk_size, &name);
        let status = child.wait().map_err(|e| VaultError::Subprocess(e.to_string()))?;

        store_result?;
        // The item is already committed to the record table by the time
        // ffmpeg exits; its exit status is informational only, never an
        // error -- matching the original, which never inspects it.
        tracing::debug!(%status, "ffmpeg exited");

        Ok(())
    }

    /// Decrypts entry `index` of `vault` and streams it into `ffplay` for
    /// playback. `ffplay`'s stderr is redirected to `log_path`. A broken
    /// pipe while writing is the normal way playback ends (the user closed
    /// the player window) and is not reported as an error.
    pub fn play_video<B: Read + Write + Seek>(
        &self,
        vault: &mut Vault<B>,
        index: usize,
        log_path: &Path,
    ) -> Result<()> {
        let ffplay = self.ffplay.as_deref().ok_or(VaultError::MediaUnavailable("ffplay"))?;

        let log = File::create(log_path)?;
        tracing::debug!(ffplay, index, "spawning player");

        let mut child = Command::new(ffplay)
            .arg("-autoexit")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .spawn()
            .map_err(|e| VaultError::Subprocess(e.to_string()))?;

        let mut stdin = child.stdin.take().expect("ffplay stdin was piped");
        let feed_result = Self::feed_chunks(vault, index, &mut stdin);
        drop(stdin);

        let status = child.wait().map_err(|e| VaultError::Subprocess(e.to_string()))?;
        feed_result?;

        if !status.success() {
            return Err(VaultError::Subprocess(format!("ffplay exited with {status}")));
        }

        Ok(())
    }

    fn feed_chunks<B: Read + Write + Seek>(
        vault: &mut Vault<B>,
        index: usize,
        stdin: &mut ChildStdin,
    ) -> Result<()> {
        for chunk in vault.read_chunks(index, PLAY_CHUNK_SIZE)? {
            let chunk = chunk?;
            if let Err(e) = stdin.write_all(&chunk) {
                if e.kind() == ErrorKind::BrokenPipe {
                    return Ok(());
                }
                return Err(VaultError::Io(e));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_reports_unavailable_for_bogus_binaries() {
        let bridge = MediaBridge::detect("definitely-not-a-real-binary", "also-not-real");
        assert!(!bridge.is_available());
    }

    #[test]
    fn transcode_options_from_defaults() {
        let defaults = crate::config::VaultDefaults::default();
        let opts = TranscodeOptions::from(&defaults);
        assert_eq!(opts.codec, defaults.video_codec);
        assert_eq!(opts.preset, defaults.video_preset);
        assert_eq!(opts.crf, defaults.video_crf);
    }
}
