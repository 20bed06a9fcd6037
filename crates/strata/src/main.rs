use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use strata_core::config::Config;
use strata_core::pipeline::{AnalysisPipeline, CorpusModel};
use strata_cpp::CppAnalyzer;
use strata_report::{dot, json, text};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Triage a legacy C++ codebase before a rewrite")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify entities, estimate effort and print a report
    Analyze {
        /// Path to the project root
        path: PathBuf,
        /// Config file path (defaults to .strata.toml in the project or an ancestor)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
        /// Reuse cached extraction results for unchanged files
        #[arg(long)]
        incremental: bool,
    },
    /// Print a GraphViz DOT graph of file includes or entity relationships
    Graph {
        /// Path to the project root
        path: PathBuf,
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Draw entity relationships instead of file includes
        #[arg(long)]
        entities: bool,
    },
    /// Create a default .strata.toml configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze {
            path,
            config,
            format,
            incremental,
        } => cmd_analyze(&path, config.as_deref(), format, incremental),
        Commands::Graph {
            path,
            config,
            entities,
        } => cmd_graph(&path, config.as_deref(), entities),
        Commands::Init { force } => cmd_init(force),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(2);
    }
}

fn cmd_analyze(
    path: &Path,
    config_path: Option<&Path>,
    format: OutputFormat,
    incremental: bool,
) -> Result<()> {
    let model = run_analysis(path, config_path, incremental)?;
    let report = match format {
        OutputFormat::Text => text::format_report(&model),
        OutputFormat::Json => {
            let mut report = json::format_report(&model, false)?;
            report.push('\n');
            report
        }
    };
    print!("{report}");
    Ok(())
}

fn cmd_graph(path: &Path, config_path: Option<&Path>, entities: bool) -> Result<()> {
    let model = run_analysis(path, config_path, false)?;
    let graph = if entities {
        dot::entity_graph(&model.graph)
    } else {
        dot::include_graph(&model)
    };
    print!("{graph}");
    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let target = PathBuf::from(".strata.toml");
    if target.exists() && !force {
        anyhow::bail!(".strata.toml already exists. Use --force to overwrite.");
    }
    std::fs::write(&target, Config::default_toml()).context("failed to write .strata.toml")?;
    println!("Created .strata.toml with default configuration.");
    Ok(())
}

fn load_config(project_path: &Path, config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(p) => Config::load(p),
        None => Ok(Config::load_or_default(project_path)),
    }
}

fn run_analysis(
    project_path: &Path,
    config_path: Option<&Path>,
    incremental: bool,
) -> Result<CorpusModel> {
    let config = load_config(project_path, config_path)?;
    let analyzer = CppAnalyzer::new().context("failed to initialize C++ analyzer")?;
    let pipeline = AnalysisPipeline::new(Box::new(analyzer), config)?;
    let model = if incremental {
        pipeline.analyze_incremental(project_path)?
    } else {
        pipeline.analyze(project_path)?
    };
    tracing::debug!(
        modules = model.modules.len(),
        entities = model.graph.len(),
        "analysis complete"
    );
    Ok(model)
}
