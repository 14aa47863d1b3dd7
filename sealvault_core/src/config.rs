// Non-secret operational defaults for the media bridge and chunked I/O.
//
// Unlike a vault's password, `VaultDefaults` carries nothing that needs to be
// kept secret, so it is loaded without the permission check hbak_common's
// NodeConfig performs on its passphrase-bearing configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Non-secret, user-editable defaults for vault operations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VaultDefaults {
    /// Chunk size in bytes used by [`crate::vault::Vault::store_from_buffer`]
    /// and [`crate::vault::Vault::store_file`] when the caller doesn't override it.
    pub store_chunk_size: usize,
    /// Chunk size in bytes used by [`crate::vault::Vault::export_item_to_file`].
    pub export_chunk_size: usize,
    /// Default video codec passed to the `ffmpeg` transcoder.
    pub video_codec: String,
    /// Default `ffmpeg` preset (encoding speed/efficiency tradeoff).
    pub video_preset: String,
    /// Default constant rate factor passed to `ffmpeg`.
    pub video_crf: String,
    /// Name of the transcoder binary looked up on `PATH`.
    pub ffmpeg_bin: String,
    /// Name of the player binary looked up on `PATH`.
    pub ffplay_bin: String,
}

impl Default for VaultDefaults {
    fn default() -> Self {
        Self {
            store_chunk_size: 10_000_000,
            export_chunk_size: 10_000_000,
            video_codec: "libx265".to_string(),
            video_preset: "medium".to_string(),
            video_crf: "23".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            ffplay_bin: "ffplay".to_string(),
        }
    }
}

impl VaultDefaults {
    /// Loads the defaults from the given path, falling back to
    /// [`VaultDefaults::default`] when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let s = fs::read_to_string(path)?;
        Ok(toml::from_str(&s)?)
    }

    /// Saves the defaults to the given path, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let s = toml::to_string_pretty(self)?;
        fs::write(path, s)?;

        Ok(())
    }

    /// Returns the conventional path for the defaults file
    /// (`~/.config/sealvault/config.toml`), if a home directory can be determined.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(PathBuf::from(home).join(".config/sealvault/config.toml"))
    }
}
