// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
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

use clap::{crate_version, Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use soundbus::audio::{self, Mixer};
use soundbus::config::{Overrides, Soundbus};
use soundbus::controller::Controller;
use soundbus::engine::Engine;
use soundbus::samples::SampleLoader;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sample playback server with a real-time mixer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists and verifies all samples in the library.
    Samples {
        #[clap(flatten)]
        config: ConfigArgs,
    },
    /// Starts the playback server.
    Start {
        #[clap(flatten)]
        config: ConfigArgs,
        /// The address of the HTTP listener.
        #[arg(long)]
        http: Option<String>,
        /// The address of the raw TCP listener.
        #[arg(long)]
        socket: Option<String>,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// The path to the configuration file.
    config_path: Option<PathBuf>,
    /// The output device to play through.
    #[arg(short, long)]
    device: Option<String>,
    /// The output sample rate.
    #[arg(short = 'r', long)]
    sample_rate: Option<u32>,
    /// The sample library directory.
    #[arg(short, long)]
    library: Option<String>,
}

impl ConfigArgs {
    fn load(
        self,
        http: Option<String>,
        socket: Option<String>,
    ) -> Result<Soundbus, Box<dyn Error>> {
        let overrides = Overrides {
            device: self.device,
            sample_rate: self.sample_rate,
            library: self.library,
            http,
            socket,
        };
        Ok(Soundbus::load(self.config_path.as_deref(), &overrides)?)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
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
        Commands::Samples { config } => {
            let config = config.load(None, None)?;
            let loader =
                SampleLoader::from_config(config.library(), config.audio().sample_rate());
            let names = loader.available()?;

            if names.is_empty() {
                println!("No samples found in {}.", loader.path().display());
                return Ok(());
            }

            println!("Samples (count: {}):", names.len());
            let mut failed = 0;
            for name in names {
                match loader.load(&name) {
                    Ok(buffer) => println!(
                        "- {} ({:.3}s, {}Hz)",
                        name,
                        buffer.duration().as_secs_f64(),
                        buffer.format().sample_rate
                    ),
                    Err(e) => {
                        failed += 1;
                        println!("- {} (ERROR: {})", name, e);
                    }
                }
            }

            if failed > 0 {
                return Err(format!("{} samples failed to load", failed).into());
            }
        }
        Commands::Start {
            config,
            http,
            socket,
        } => {
            let config = config.load(http, socket)?;

            let device = audio::get_device(config.audio())?;
            info!(device = %device, "Using output device");
            let mixer = Arc::new(Mixer::new());
            device.start(mixer.clone())?;

            let loader = SampleLoader::from_config(config.library(), device.sample_rate());
            let engine = Arc::new(Engine::new(mixer, loader));

            let preload = config.library().preload().to_vec();
            if !preload.is_empty() {
                let engine = engine.clone();
                tokio::task::spawn_blocking(move || engine.preload(&preload)).await?;
            }

            let controller = Controller::new(engine, config.controller())?;
            controller
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!(err = %e, "Unable to listen for interrupt");
                    }
                })
                .await?;
        }
    }

    Ok(())
}
