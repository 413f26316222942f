//! DrawPen CLI - Bridge interface for the whiteboard shell
//!
//! Commands: generate, history, pinned, pin
//! Outputs JSON to stdout
//! Returns non-zero when generation failed

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use drawpen_core::{paths, Canvas, Config, DrawingPipeline, PipelineError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "drawpen-cli")]
#[command(about = "DrawPen CLI - Prompt-to-Drawing Compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// State directory (config, cache, history)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn a prompt into figures
    Generate {
        /// Free-text description
        prompt: String,

        /// Canvas width
        #[arg(long, default_value_t = 1920.0)]
        width: f64,

        /// Canvas height
        #[arg(long, default_value_t = 1080.0)]
        height: f64,
    },

    /// List recent prompts, or suggestions matching a filter
    History {
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// List pinned prompts
    Pinned,

    /// Pin or unpin a prompt
    Pin {
        prompt: String,
    },
}

fn load_config(data_dir: Option<PathBuf>) -> Result<(Config, PathBuf), PipelineError> {
    let config_path = match &data_dir {
        Some(dir) => dir.join("config.json"),
        None => paths::get_config_path()?,
    };
    let mut config = Config::load(&config_path)?;
    if data_dir.is_some() {
        config.data_dir = data_dir;
    }
    let dir = config.data_dir()?;
    Ok((config, dir))
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!(r#"{{"error": "Failed to serialize output: {}"}}"#, e),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let pipeline = load_config(cli.data_dir)
        .and_then(|(config, dir)| DrawingPipeline::open(config, &dir));
    let mut pipeline = match pipeline {
        Ok(p) => p,
        Err(e) => {
            eprintln!(r#"{{"error": "Failed to open pipeline: {}"}}"#, e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Generate { prompt, width, height } => {
            let outcome = pipeline
                .generate_detailed(&prompt, Canvas::new(width, height))
                .await;

            print_json(&serde_json::json!(outcome.figures));

            match outcome.error {
                Some(PipelineError::EmptyPrompt) | None => ExitCode::SUCCESS,
                Some(e) => {
                    let output = serde_json::json!({ "error": e.to_string() });
                    eprintln!("{}", output);
                    ExitCode::from(2)
                }
            }
        }

        Commands::History { filter } => {
            let entries = match filter {
                Some(f) => pipeline.suggestions(&f),
                None => pipeline.history(),
            };
            print_json(&serde_json::json!(entries));
            ExitCode::SUCCESS
        }

        Commands::Pinned => {
            print_json(&serde_json::json!(pipeline.pinned_prompts()));
            ExitCode::SUCCESS
        }

        Commands::Pin { prompt } => match pipeline.toggle_pin(&prompt) {
            Ok(pinned) => {
                print_json(&serde_json::json!(pinned));
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
                ExitCode::FAILURE
            }
        },
    }
}
