//! safelens CLI: moderate images for nudity and drug content.

use clap::{Args, Parser, Subcommand};
use safelens::{
    BodyPartDetector, ModerationConfig, ModerationError, Moderator, PrecomputedPartsDetector,
};
use std::path::{Path, PathBuf};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "safelens")]
#[command(about = "Classify images for nudity and drug-related content")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Moderate one image and emit the verdict as JSON.
    Moderate(CliModerateArgs),

    /// Print the effective configuration as JSON.
    PrintConfig {
        /// Configuration file to load before printing.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct CliModerateArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Write JSON here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// JSON configuration file (defaults are used for missing fields).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Body-part detections produced by an external model (JSON array).
    #[arg(long)]
    parts_json: Option<PathBuf>,

    /// Override the drugs flagging threshold.
    #[arg(long)]
    drugs_threshold: Option<f32>,

    /// Override the nudity flagging threshold.
    #[arg(long)]
    nudity_threshold: Option<f32>,

    /// Override the drug-signal penalty applied under body context.
    #[arg(long)]
    context_penalty: Option<f32>,

    /// Emit the full analysis report instead of the verdict.
    #[arg(long)]
    detailed: bool,
}

impl CliModerateArgs {
    fn apply_overrides(&self, config: &mut ModerationConfig) {
        if let Some(t) = self.drugs_threshold {
            config.thresholds.drugs = t;
        }
        if let Some(t) = self.nudity_threshold {
            config.thresholds.nudity = t;
        }
        if let Some(p) = self.context_penalty {
            config.context.drug_penalty = p;
        }
    }
}

fn load_config(path: Option<&Path>) -> CliResult<ModerationConfig> {
    match path {
        Some(p) => {
            tracing::info!("Loading config: {}", p.display());
            Ok(ModerationConfig::from_json_file(p)?)
        }
        None => Ok(ModerationConfig::default()),
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Moderate(args) => run_moderate(&args),
        Commands::PrintConfig { config } => run_print_config(config.as_deref()),
    }
}

// ── print-config ───────────────────────────────────────────────────────

fn run_print_config(path: Option<&Path>) -> CliResult<()> {
    let config = load_config(path)?;
    if let Err(e) = config.validate() {
        tracing::warn!("Configuration does not validate: {e}");
    }
    println!("{}", config.to_json_pretty()?);
    Ok(())
}

// ── moderate ───────────────────────────────────────────────────────────

fn run_moderate(args: &CliModerateArgs) -> CliResult<()> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply_overrides(&mut config);

    let detector: Result<Box<dyn BodyPartDetector>, ModerationError> = match &args.parts_json {
        Some(path) => PrecomputedPartsDetector::from_json_file(path)
            .map(|d| Box::new(d) as Box<dyn BodyPartDetector>),
        None => Ok(Box::new(safelens::NoPartsDetector)),
    };
    let moderator = Moderator::with_parts_detector(config, detector);

    tracing::info!("Reading image: {}", args.image.display());
    let bytes = std::fs::read(&args.image).map_err(|e| -> CliError {
        format!("Failed to read image {}: {}", args.image.display(), e).into()
    })?;
    let filename = args
        .image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.image.display().to_string());

    let report = moderator.moderate_detailed(&bytes, &filename);
    let json = if args.detailed {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string_pretty(&report.verdict)?
    };

    match &args.out {
        Some(out) => {
            std::fs::write(out, &json)?;
            tracing::info!("Results written to {}", out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
