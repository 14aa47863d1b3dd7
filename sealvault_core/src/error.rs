// sealvault_core implements the on-disk vault format and its cryptographic primitives.

use std::io;

use thiserror::Error;

/// A `VaultError` indicates a failure condition raised by [`crate::vault::Vault`]
/// or one of the components it depends on.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A vault was asked to be created at a path that already holds a file.
    #[error("A file already exists at \"{0}\"")]
    AlreadyExists(String),

    /// An item name exceeds the 64-byte on-disk field width once UTF-8 encoded.
    #[error("Item name \"{0}\" is longer than 64 bytes once encoded")]
    NameTooLong(String),
    /// A chunk size of zero was requested for a streaming operation.
    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,
    /// The requested item index does not exist in the vault's record list.
    #[error("No item at index {0}")]
    NoSuchItem(usize),

    /// The record table scan produced a `data_size` that extends past the end
    /// of the buffer, a short read in the middle of a record, or a name that
    /// could not be decoded as UTF-8. Indistinguishable from a wrong password.
    #[error("Vault is corrupted or the password is incorrect")]
    CorruptionOrBadPassword,

    /// A `std::io::Error` I/O error occurred on the backing buffer.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// TOML deserialization of the vault defaults configuration file failed.
    #[error("Configuration parse error: {0}")]
    ConfigDe(#[from] toml::de::Error),
    /// TOML serialization of the vault defaults configuration file failed.
    #[error("Configuration serialization error: {0}")]
    ConfigSer(#[from] toml::ser::Error),

    /// The media bridge binaries (`ffmpeg`/`ffplay`) are not available on `PATH`.
    #[error("Media bridge is unavailable: {0} not found on PATH")]
    MediaUnavailable(&'static str),
    /// The media bridge subprocess could not be spawned or exited abnormally.
    #[error("Media bridge subprocess failure: {0}")]
    Subprocess(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;
