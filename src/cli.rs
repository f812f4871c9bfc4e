use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::SyncConfig;
use crate::mesh_asset::ModelRegistry;
use crate::workspace::Workspace;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay scripted graph edits and gestures, then print the resulting scene
    Replay {
        /// JSON file holding an array of steps
        #[arg(long)]
        input: PathBuf,

        /// JSON sync configuration; defaults apply to missing keys
        #[arg(long)]
        config: Option<PathBuf>,

        /// Extra OBJ models, registered under their file stem
        #[arg(long = "model")]
        models: Vec<PathBuf>,

        /// Frames to tick after the last step so pending loads land
        #[arg(long, default_value_t = 1)]
        settle: u32,

        /// Pretty-print the summary
        #[arg(long)]
        pretty: bool,
    },
    /// Print the default configuration
    Config,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            input,
            config,
            models,
            settle,
            pretty,
        } => replay(input, config, models, settle, pretty),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&SyncConfig::default())?);
            Ok(())
        }
    }
}

fn load_models(paths: &[PathBuf]) -> Result<ModelRegistry> {
    let mut registry = ModelRegistry::with_builtins();
    for path in paths {
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("no usable model name in {}", path.display()))?;
        let obj = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        registry
            .register_from_obj(id, &obj)
            .with_context(|| format!("failed to load model {}", path.display()))?;
        log::info!("registered model '{id}' from {}", path.display());
    }
    Ok(registry)
}

fn replay(input: PathBuf, config: Option<PathBuf>, models: Vec<PathBuf>, settle: u32, pretty: bool) -> Result<()> {
    let config = match config {
        Some(path) => SyncConfig::load(&path)?,
        None => SyncConfig::default(),
    };
    let contents =
        std::fs::read_to_string(&input).with_context(|| format!("failed to read steps {}", input.display()))?;
    let steps = Workspace::parse_steps(&contents)?;

    let mut workspace = Workspace::new(config);
    *workspace.engine.models_mut() = load_models(&models)?;
    log::info!("replaying {} steps from {}", steps.len(), input.display());
    workspace.run(&steps)?;
    for _ in 0..settle {
        workspace.tick();
    }
    workspace.pump();

    let summary = workspace.summary();
    let json = if pretty {
        serde_json::to_string_pretty(&summary)?
    } else {
        serde_json::to_string(&summary)?
    };
    println!("{json}");
    Ok(())
}
