use std::io;

use sealvault_core::VaultError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("The media bridge (ffmpeg/ffplay) is not available on PATH")]
    MediaBridgeUnavailable,
}

impl Error {
    /// Maps this error to the CLI's documented exit code: 1 password/corruption
    /// failure, 2 I/O failure, 3 usage error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Vault(VaultError::CorruptionOrBadPassword) => 1,
            Error::Vault(VaultError::Io(_)) | Error::Io(_) => 2,
            Error::Vault(VaultError::Subprocess(_)) => 2,
            Error::Vault(VaultError::ConfigDe(_)) | Error::Vault(VaultError::ConfigSer(_)) => 2,
            Error::Vault(VaultError::AlreadyExists(_))
            | Error::Vault(VaultError::NameTooLong(_))
            | Error::Vault(VaultError::InvalidChunkSize)
            | Error::Vault(VaultError::NoSuchItem(_))
            | Error::Vault(VaultError::MediaUnavailable(_))
            | Error::MediaBridgeUnavailable => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
