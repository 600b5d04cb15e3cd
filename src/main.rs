use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

use prepkit::{init_logging, Settings, StageRegistry};

#[derive(Parser, Debug)]
#[command(name = "prepkit")]
#[command(about = "G-code preprocessor for multi-tool 3D printers", long_about = None)]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATE"), ")"))]
struct Cli {
    /// Settings file (JSON or TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Preprocess G-code files in place
    Process {
        /// G-code files to preprocess
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Tool roster from the printer profile (e.g. 0,1,2,3)
        #[arg(long, value_delimiter = ',')]
        tools: Vec<u16>,

        /// Print each outcome as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// List the available stages
    Stages,
}

fn load_settings(config: Option<&Path>) -> Result<Settings> {
    match config {
        Some(path) => Settings::load_from_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => Ok(Settings::default()),
    }
}

fn process_files(
    registry: &StageRegistry,
    settings: &Settings,
    files: Vec<PathBuf>,
    tools: Vec<u16>,
    json: bool,
) -> Result<()> {
    let mut pipeline = registry.build_pipeline(settings)?;
    if !tools.is_empty() {
        pipeline.set_tool_roster(tools);
    }

    for file in files {
        let outcome = pipeline
            .run(&file)
            .with_context(|| format!("failed to preprocess {}", file.display()))?;
        if json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else if outcome.processed {
            println!("{}: {}", file.display(), outcome.message);
        } else {
            println!("{}: skipped ({})", file.display(), outcome.message);
        }
    }
    Ok(())
}

fn list_stages(registry: &StageRegistry, settings: &Settings) -> Result<()> {
    let pipeline = registry.build_pipeline(settings)?;
    println!("Configured pipeline (in order):");
    for (position, (name, description)) in pipeline.stages().iter().enumerate() {
        println!("  {}. {:<14} {}", position + 1, name, description);
    }

    let configured = settings.stage_names();
    let available: Vec<String> = registry
        .stage_names()
        .into_iter()
        .filter(|name| !configured.contains(name))
        .collect();
    if !available.is_empty() {
        println!();
        println!("Other available stages:");
        for name in available {
            let stage = registry.create(&name, &settings.stage_config(&name))?;
            println!("     {:<14} {}", name, stage.description());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    let registry = StageRegistry::builtin();

    match cli.command {
        Commands::Process { files, tools, json } => {
            process_files(&registry, &settings, files, tools, json)
        }
        Commands::Stages => list_stages(&registry, &settings),
    }
}
