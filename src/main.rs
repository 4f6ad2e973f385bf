// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};

use melodygen::bundle::list_bundles;
use melodygen::config::{Settings, DEFAULT_CONFIG_FILE};
use melodygen::generator::GeneratorMap;
use melodygen::pipeline::generate_melodies;
use melodygen::request::{FormInput, GenerationRequest};
use melodygen::ui::App;

/// Log file used while the terminal form owns the screen
const LOG_FILE: &str = "melodygen.log";

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Generate melodies from a primer MIDI file with a melody RNN bundle", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate melodies without opening the form
    Generate(GenerateArgs),

    /// List bundle files in the checkpoints folder
    Bundles,

    /// Print the effective settings
    Config {
        /// Write the settings to this file instead of printing them
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

/// Overrides for the configured defaults
#[derive(Args)]
struct GenerateArgs {
    /// Bundle file, or a bundle name in the checkpoints folder
    #[arg(long)]
    bundle: Option<String>,

    /// Primer MIDI file
    #[arg(long)]
    primer: Option<String>,

    /// Folder receiving output_<n>.mid
    #[arg(long)]
    output_dir: Option<String>,

    /// Number of melodies to generate
    #[arg(long)]
    num_outputs: Option<usize>,

    /// Length of each melody in steps, primer included
    #[arg(long)]
    num_steps: Option<usize>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f64>,
}

/// Unset options stay blank and take the configured default
impl From<GenerateArgs> for FormInput {
    fn from(args: GenerateArgs) -> Self {
        FormInput {
            bundle_file: args.bundle.unwrap_or_default(),
            primer_midi: args.primer.unwrap_or_default(),
            output_dir: args.output_dir.unwrap_or_default(),
            num_outputs: args.num_outputs.map(|n| n.to_string()).unwrap_or_default(),
            num_steps: args.num_steps.map(|n| n.to_string()).unwrap_or_default(),
            temperature: args.temperature.map(|t| t.to_string()).unwrap_or_default(),
        }
    }
}

fn init_logging(verbose: bool, to_file: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    if to_file {
        let path = std::env::temp_dir().join(LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn load_settings(path: &Path) -> Result<Settings> {
    Settings::load(path).with_context(|| format!("failed to load configuration from {}", path.display()))
}

fn run_form(settings: Settings) -> Result<()> {
    let map = GeneratorMap::from_settings(&settings);
    let mut app = App::new(settings, map).context("failed to initialize terminal")?;
    app.run().context("terminal error")?;
    Ok(())
}

fn run_generate(settings: &Settings, args: GenerateArgs) -> Result<()> {
    let request = GenerationRequest::from_form(&FormInput::from(args), settings)?;
    let map = GeneratorMap::from_settings(settings);

    let report = generate_melodies(&map, &request).context("generation failed")?;
    println!("{}", report.status_text());
    Ok(())
}

fn list_bundle_files(settings: &Settings) {
    let bundles = list_bundles(&settings.checkpoints_folder);
    if bundles.is_empty() {
        println!("No bundle files in {}", settings.checkpoints_folder.display());
        return;
    }
    for bundle in bundles {
        println!("{}", bundle.display());
    }
}

fn show_config(settings: &Settings, write: Option<PathBuf>) -> Result<()> {
    match write {
        Some(path) => {
            settings
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", settings.to_toml()?),
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.command.is_none())?;
    let settings = load_settings(&cli.config)?;
    info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        None => run_form(settings),
        Some(Commands::Generate(args)) => run_generate(&settings, args),
        Some(Commands::Bundles) => {
            list_bundle_files(&settings);
            Ok(())
        }
        Some(Commands::Config { write }) => show_config(&settings, write),
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_args(args: &[&str]) -> GenerateArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Some(Commands::Generate(args)) => args,
            _ => panic!("expected the generate command"),
        }
    }

    #[test]
    fn test_defaults_without_subcommand() {
        let cli = Cli::try_parse_from(["melodygen"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_generate_options_to_form_input() {
        let args = generate_args(&[
            "melodygen",
            "generate",
            "--bundle",
            "basic_rnn.mag",
            "--num-outputs",
            "3",
            "--temperature",
            "0.5",
        ]);

        let input = FormInput::from(args);
        assert_eq!(input.bundle_file, "basic_rnn.mag");
        assert_eq!(input.num_outputs, "3");
        assert_eq!(input.temperature, "0.5");
        assert_eq!(input.num_steps, "");
        assert_eq!(input.primer_midi, "");
    }

    #[test]
    fn test_bad_numbers_rejected_by_parser() {
        assert!(Cli::try_parse_from(["melodygen", "generate", "--num-steps", "lots"]).is_err());
        assert!(Cli::try_parse_from(["melodygen", "generate", "--num-outputs", "-2"]).is_err());
        assert!(Cli::try_parse_from(["melodygen", "generate", "--temperature", "warm"]).is_err());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["melodygen", "bundles", "-v", "--config", "alt.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
    }
}
