// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cueboard::audio::{self, mixer::AudioMixer, Device};
use cueboard::config::{self, BoardConfig};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A keyboard-triggered soundboard with cue lists."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Start will start the soundboard and read commands from the keyboard.
    Start {
        /// The path to the board config.
        config_path: String,
    },
    /// Verifies a board: every saved sound is read back and the grid is printed.
    Verify {
        /// The path to the board config.
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Start { config_path } => {
            config::init_soundboard_and_controller(&PathBuf::from(config_path))?
                .join()
                .await?;
        }
        Commands::Verify { config_path } => {
            let board_config = BoardConfig::deserialize(&PathBuf::from(config_path))?;
            // Sounds are resampled to the mixer rate, so verify at the rate the board plays at.
            let sample_rate = match audio::get_device(board_config.audio()) {
                Ok(device) => device.sample_rate(),
                Err(_) => board_config.audio().sample_rate(),
            };
            let mixer = Arc::new(AudioMixer::new(board_config.audio().channels(), sample_rate));
            let mut soundboard = config::init_soundboard(&board_config, mixer)?;

            let failed = soundboard.preload();
            println!("{}", soundboard);
            for event in soundboard.take_events() {
                if let cueboard::engine::StatusEvent::Alert(text) = event {
                    println!("{}", text);
                }
            }
            if !failed.is_empty() {
                return Err(format!("{} sound(s) could not be read", failed.len()).into());
            }
        }
    }

    Ok(())
}
