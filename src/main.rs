//! # irms-sort
//!
//! Command-line importer for GC-IRMS run exports.
//!
//! ```bash
//! # δD run, output folder ./Lake cores next to the export
//! irms-sort export.csv --isotope dD --name "Lake cores"
//!
//! # δ13C run with preset reference times
//! irms-sort export.csv --isotope dC --config irms.toml -v
//! ```

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use irms_sort::app::ConsoleOperator;
use irms_sort::config::Config;
use irms_sort::data::loader::load_file;
use irms_sort::data::model::{IsotopeMode, RunTable};
use irms_sort::pipeline::process_run;
use irms_sort::runlog::OutputFolder;
use irms_sort::ui::prompt::Prompter;

/// Sort GC-IRMS peaks into linearity standards, drift standards and samples
#[derive(Parser)]
#[command(name = "irms-sort")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Run export (.csv, .json or .parquet)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Isotope measured in this run
    #[arg(short, long, value_parser = parse_isotope)]
    isotope: IsotopeMode,

    /// Output folder name (defaults to the input file stem)
    #[arg(short, long)]
    name: Option<String>,

    /// Directory the output folder is created in (defaults to the current one)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Relative tie band around the closest retention time (overrides config)
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_isotope(s: &str) -> std::result::Result<IsotopeMode, String> {
    s.parse()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(threshold) = cli.threshold {
        config.threshold = threshold;
    }

    let raw = load_file(&cli.input)
        .with_context(|| format!("loading {}", cli.input.display()))?;

    let name = match cli.name {
        Some(name) => name,
        None => cli
            .input
            .file_stem()
            .and_then(|s| s.to_str())
            .context("input file has no usable name, pass --name")?
            .to_string(),
    };
    let parent = cli.output_dir.unwrap_or_else(|| PathBuf::from("."));
    let mut folder = OutputFolder::create(&parent, &name, cli.isotope)
        .with_context(|| format!("creating output folder in {}", parent.display()))?;
    let rt_figures = folder.rt_figures().context("creating figure folder")?;

    let preset = config
        .reference_table()
        .map_err(|e| anyhow::anyhow!("invalid [reference] table: {e}"))?;
    let prompter = Prompter::new(io::stdin().lock(), io::stdout(), config.max_prompt_attempts);
    let mut operator =
        ConsoleOperator::new(prompter, Box::new(config.tokens()), config.skip_token.clone())
            .with_preset(preset)
            .with_figures(rt_figures);

    let run = process_run(&raw, cli.isotope, config.band(), &mut operator, &mut folder.log)
        .with_context(|| format!("processing {}", cli.input.display()))?;
    info!("Run log written to {}", folder.log.path().display());

    println!();
    println!("Run: {}  ({})", name, cli.isotope.display_name());
    print_subset("Linearity standards", &run.linearity);
    print_subset("Drift standards", &run.drift);
    print_subset("Samples", &run.unknown);
    if !run.warnings.is_empty() {
        println!("Warnings:");
        for warning in &run.warnings {
            println!("  - {warning}");
        }
    }
    println!("Correction log:");
    println!("{}", run.corrections.to_json()?);
    println!("Output folder: {}", folder.root.display());
    Ok(())
}

fn print_subset(title: &str, table: &RunTable) {
    let labels: std::collections::BTreeSet<_> =
        table.peaks.iter().filter_map(|p| p.chain).collect();
    let labels: Vec<String> = labels.iter().map(|c| c.to_string()).collect();
    let injections = table.groups().len();
    println!(
        "{title:<22} {:>5} peaks in {:>3} injections  [{}]",
        table.len(),
        injections,
        labels.join(", ")
    );
}
