use clap::Parser;
use log::{error, info};
use shadow_mapping::app::{run_gui, run_headless};
use shadow_mapping::io::config::Config;
use std::process;

/// Shadow mapping on a fixed-function pipeline: a torus casts a shadow from
/// an orbiting light onto a floor.
#[derive(Parser, Debug)]
#[command(name = "shadow-mapping")]
#[command(about = "Shadow mapping without shaders")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Render without a window and save the last frame
    #[arg(long)]
    headless: bool,

    /// Number of frames to render in headless mode
    #[arg(long, value_name = "N")]
    frames: Option<u32>,

    /// Output image for headless mode
    #[arg(short, long, value_name = "FILE")]
    output: Option<String>,

    /// Shadow map resolution in texels
    #[arg(long, value_name = "N")]
    shadow_map_size: Option<usize>,

    /// Window side in pixels
    #[arg(long, value_name = "N")]
    screen_size: Option<usize>,
}

impl Cli {
    fn load_config(&self) -> shadow_mapping::Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading configuration from '{path}'");
                Config::load(path)?
            }
            None => {
                info!("Using default configuration");
                Config::default()
            }
        };

        if let Some(frames) = self.frames {
            config.output.frames = frames;
        }
        if let Some(output) = &self.output {
            config.output.path = output.clone();
        }
        if let Some(size) = self.shadow_map_size {
            config.shadow.map_size = size;
        }
        if let Some(size) = self.screen_size {
            config.window.size = size;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    let result = cli.load_config().and_then(|config| {
        if cli.headless {
            run_headless(&config)
        } else {
            run_gui(&config)
        }
    });

    if let Err(e) = result {
        error!("{e}");
        process::exit(1);
    }
}
