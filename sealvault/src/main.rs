mod error;
use error::*;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sealvault_core::config::VaultDefaults;
use sealvault_core::media::{MediaBridge, TranscodeOptions};
use sealvault_core::vault::Vault;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the vault file.
    vault: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new, empty vault at this path.
    New,
    /// Store a file's contents under its own file name.
    Store {
        file: PathBuf,
        /// Override the stored entry's name.
        #[arg(long)]
        name: Option<String>,
    },
    /// Decrypt an entry and write it to a file.
    Read { index: usize, out: PathBuf },
    /// List the vault's entries.
    Ls,
    /// Tombstone an entry without reclaiming its space.
    Delete { index: usize },
    /// Transcode a video file and store it, streamed through ffmpeg.
    StoreVideo { file: PathBuf },
    /// Decrypt a stored video and play it through ffplay.
    PlayVideo { index: usize },
}

fn logic() -> Result<()> {
    let cli = Cli::parse();
    let defaults = VaultDefaults::load(
        &VaultDefaults::default_path().unwrap_or_else(|| PathBuf::from("sealvault.toml")),
    )?;

    match cli.command {
        Commands::New => {
            let password = rpassword::prompt_password("Enter new vault password: ")?;
            let vault = Vault::new_at_path(&cli.vault, password.as_bytes())?;
            vault.close();
            tracing::info!(path = %cli.vault.display(), "created vault");
        }
        Commands::Store { file, name } => {
            let password = rpassword::prompt_password("Password: ")?;
            let mut vault = Vault::open_at_path(&cli.vault, password.as_bytes())?;

            if let Some(name) = name {
                let data = std::fs::read(&file)?;
                vault.store_item(&data, &name)?;
            } else {
                vault.store_file(&file, defaults.store_chunk_size)?;
            }

            print!("{}", vault.ls());
        }
        Commands::Read { index, out } => {
            let password = rpassword::prompt_password("Password: ")?;
            let mut vault = Vault::open_at_path(&cli.vault, password.as_bytes())?;
            vault.export_item_to_file(index, &out)?;
            println!("Wrote entry {index} to {}", out.display());
        }
        Commands::Ls => {
            let password = rpassword::prompt_password("Password: ")?;
            let vault = Vault::open_at_path(&cli.vault, password.as_bytes())?;
            print!("{}", vault.ls());
        }
        Commands::Delete { index } => {
            let password = rpassword::prompt_password("Password: ")?;
            let mut vault = Vault::open_at_path(&cli.vault, password.as_bytes())?;
            vault.delete(index)?;
            println!("Tombstoned entry {index}");
        }
        Commands::StoreVideo { file } => {
            let bridge = MediaBridge::detect(&defaults.ffmpeg_bin, &defaults.ffplay_bin);
            if !bridge.is_available() {
                return Err(Error::MediaBridgeUnavailable);
            }

            let password = rpassword::prompt_password("Password: ")?;
            let mut vault = Vault::open_at_path(&cli.vault, password.as_bytes())?;
            let opts = TranscodeOptions::from(&defaults);

            println!("Transcoding and storing video, this may take a while...");
            bridge.store_streamable_video(
                &mut vault,
                &file,
                &opts,
                defaults.store_chunk_size,
                &PathBuf::from("video_write.log"),
            )?;
            print!("{}", vault.ls());
        }
        Commands::PlayVideo { index } => {
            let bridge = MediaBridge::detect(&defaults.ffmpeg_bin, &defaults.ffplay_bin);
            if !bridge.is_available() {
                return Err(Error::MediaBridgeUnavailable);
            }

            let password = rpassword::prompt_password("Password: ")?;
            let mut vault = Vault::open_at_path(&cli.vault, password.as_bytes())?;
            bridge.play_video(&mut vault, index, &PathBuf::from("video_play.log"))?;
        }
    }

    Ok(())
}

fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match logic() {
        Ok(_) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::ExitCode::from(e.exit_code())
        }
    }
}
