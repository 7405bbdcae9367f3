use clap::Parser;
use oquare_metrics::config::{self, ReportConfig};
use oquare_metrics::report::{self, Format, Report, Section};
use oquare_metrics::MetricsParser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Extract OQuaRE ontology-quality metrics from an XML report and print
/// them as JSON or text.
#[derive(Parser, Debug)]
#[command(name = "oquare-metrics", version, about)]
pub struct Cli {
    /// OQuaRE metrics XML file
    #[arg(value_name = "METRICS_FILE")]
    metrics_file: PathBuf,

    /// Config file path
    #[arg(short, long, default_value = "oquare.toml")]
    config: PathBuf,

    /// Sections to include (repeatable, overrides config)
    #[arg(short, long = "section", value_enum)]
    sections: Vec<Section>,

    /// Output format (overrides config)
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Write the report to this file instead of stdout (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit JSON on a single line
    #[arg(long)]
    compact: bool,

    /// Print resolved settings, don't read the metrics file
    #[arg(long)]
    dry_run: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn resolve(&self, mut settings: ReportConfig) -> ReportConfig {
        if !self.sections.is_empty() {
            settings.sections = self.sections.clone();
        }
        if let Some(format) = self.format {
            settings.format = format;
        }
        if let Some(output) = &self.output {
            settings.output = Some(output.clone());
        }
        if self.compact {
            settings.pretty = false;
        }
        settings
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = cli.resolve(config::load_config(&cli.config).report);
    tracing::debug!(?settings, "resolved report settings");

    if cli.dry_run {
        println!("Metrics file: {}", cli.metrics_file.display());
        println!("Config file:  {}", cli.config.display());
        println!("Sections:     {:?}", settings.sections);
        println!("Format:       {:?}", settings.format);
        println!("Pretty:       {}", settings.pretty);
        match &settings.output {
            Some(path) => println!("Output:       {}", path.display()),
            None => println!("Output:       stdout"),
        }
        return Ok(());
    }

    let parser = MetricsParser::open(&cli.metrics_file)?;
    let source = cli.metrics_file.display().to_string();
    let report = Report::build(&parser, &source, &settings.sections)?;
    let rendered = report.render(settings.format, settings.pretty)?;

    match &settings.output {
        Some(path) => {
            report::write_report(path, &rendered)?;
            tracing::info!(file = %path.display(), "report written");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    tracing::debug!(?cli, "parsed CLI arguments");

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, file = %cli.metrics_file.display(), "failed to extract metrics");
            ExitCode::FAILURE
        }
    }
}
