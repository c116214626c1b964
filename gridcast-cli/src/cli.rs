use std::{fs::File, io::BufWriter, path::PathBuf};

use anyhow::{Context, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use gridcast_core::{
    Config, PredictionLedger, RunContext, collect::collect_pages, config::MAX_FORECAST_DAYS,
    load_model, metrics::history_accuracy, pipeline, provider::sources_from_config,
};
use inquire::{CustomType, Text};
use tracing::info;

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "gridcast", version, about = "Daily grid generation and load-shedding forecasts")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long = "json-logs", global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Forecast the coming days, label yesterday's forecast and update the ledger.
    Run {
        /// Treat this date (YYYY-MM-DD) as today; defaults to the local date.
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show the pending forecast and the accuracy of past forecasts.
    Show,

    /// Scrape a range of historical report pages into a CSV file.
    Collect {
        #[arg(long)]
        start: u32,

        #[arg(long)]
        end: u32,

        /// Output CSV path.
        #[arg(long, default_value = "electricity_data.csv")]
        out: PathBuf,
    },

    /// Interactively set ledger/model paths and the forecast horizon.
    Configure,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = self.load_config()?;

        match self.command {
            Command::Run { date } => {
                let today = date.unwrap_or_else(|| Local::now().date_naive());
                run_forecast(&config, today).await
            }
            Command::Show => {
                let ledger = PredictionLedger::load(&config.ledger_path)?;
                output::print_forecast(&ledger.forecast);
                output::print_accuracy(history_accuracy(&ledger.history).as_ref());
                Ok(())
            }
            Command::Collect { start, end, out } => collect(&config, start, end, out).await,
            Command::Configure => configure(config, self.config),
        }
    }

    fn load_config(&self) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => Config::load_from(path),
            None => Config::load(),
        }
    }
}

async fn run_forecast(config: &Config, today: NaiveDate) -> anyhow::Result<()> {
    let generation_model = load_model(&config.generation_model_path)?;
    let loadshed_model = load_model(&config.loadshed_model_path)?;
    let (weather, actuals) = sources_from_config(config)?;

    let ctx = RunContext {
        weather: &weather,
        actuals: &actuals,
        generation_model: generation_model.as_ref(),
        loadshed_model: loadshed_model.as_ref(),
        locations: &config.locations,
        forecast_days: config.forecast_days,
        ledger_path: &config.ledger_path,
    };

    let report = pipeline::run(&ctx, today).await?;

    println!("Lags seeded from {}.", report.seed_source);
    println!("Reconciliation: {}.", report.reconciliation);
    output::print_forecast(&report.forecast);
    println!("Saved predictions to {}", config.ledger_path.display());
    Ok(())
}

async fn collect(config: &Config, start: u32, end: u32, out: PathBuf) -> anyhow::Result<()> {
    if start == 0 || start > end {
        bail!("Invalid page range {start}..={end}; pages start at 1 and --start must not exceed --end.");
    }

    let (_, actuals) = sources_from_config(config)?;
    let file = File::create(&out)
        .with_context(|| format!("Failed to create output file: {}", out.display()))?;

    let summary = collect_pages(&actuals, start, end, BufWriter::new(file)).await?;

    println!(
        "Wrote {} rows from {} pages to {}",
        summary.rows,
        summary.pages_ok,
        out.display()
    );
    if !summary.pages_failed.is_empty() {
        println!("Failed pages: {:?}", summary.pages_failed);
    }
    Ok(())
}

fn configure(mut config: Config, path: Option<PathBuf>) -> anyhow::Result<()> {
    let ledger = Text::new("Ledger file:")
        .with_default(&config.ledger_path.to_string_lossy())
        .prompt()?;
    let generation = Text::new("Generation model file:")
        .with_default(&config.generation_model_path.to_string_lossy())
        .prompt()?;
    let loadshed = Text::new("Load-shedding model file:")
        .with_default(&config.loadshed_model_path.to_string_lossy())
        .prompt()?;
    let days = CustomType::<u32>::new("Forecast days:")
        .with_default(config.forecast_days)
        .with_help_message(&format!("1 to {MAX_FORECAST_DAYS}"))
        .prompt()?;

    config.ledger_path = ledger.into();
    config.generation_model_path = generation.into();
    config.loadshed_model_path = loadshed.into();
    config.forecast_days = days;
    config.validate()?;

    let saved_to = match path {
        Some(p) => {
            config.save_to(&p)?;
            p
        }
        None => config.save()?,
    };

    info!(path = %saved_to.display(), "configuration saved");
    println!("Configuration saved to {}", saved_to.display());
    Ok(())
}
