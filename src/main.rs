use anyhow::{bail, Context, Result};
use arrow::util::pretty::pretty_format_batches;
use clap::Parser;
use salesboard::{
    aggregate::Series,
    format::{format_count, format_currency, format_optional_currency},
    pipeline::{Outcome, Report, Session},
    CanonicalRole, FilterSpec,
};
use serde::Serialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Sales dashboard for a single CSV or Excel file.
#[derive(Parser, Debug)]
#[command(name = "salesboard", version)]
struct Cli {
    /// Sales file to load (.csv or .xlsx)
    file: PathBuf,

    /// YAML file of accepted values per role, e.g. `region: [USA, France]`
    #[arg(long, value_name = "YAML")]
    filters: Option<PathBuf>,

    /// Narrow one role; repeatable and applied over `--filters`
    #[arg(long = "filter", value_name = "ROLE=V1,V2")]
    filter: Vec<String>,

    /// Rows of raw data to preview
    #[arg(long, default_value_t = 5)]
    preview: usize,

    /// Emit the report as JSON instead of a text dashboard
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    source: &'a str,
    report: &'a Report,
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,salesboard=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // ─── 2) load the file, fully buffered ────────────────────────────
    let data = fs::read(&cli.file).with_context(|| format!("reading {:?}", cli.file))?;
    let source_name = cli
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| cli.file.display().to_string());
    info!(source = %source_name, bytes = data.len(), "loaded file");

    let mut session = Session::new();
    session.upload(&source_name, &data);

    // ─── 3) apply user filters over the "all observed" default ───────
    let overrides = user_filters(&cli)?;
    if !overrides.is_empty() {
        let mut filters = session.filters().clone();
        filters.merge(overrides);
        session.set_filters(filters);
    }

    // ─── 4) render ───────────────────────────────────────────────────
    match session.outcome() {
        Outcome::AwaitingInput { notice } => match notice {
            Some(e) => bail!("{}", e),
            None => bail!("no data loaded; please provide a CSV or Excel file"),
        },
        Outcome::ResolutionFailed(e) => {
            if !cli.json {
                print_preview(&session, cli.preview)?;
            }
            bail!("{}", e)
        }
        Outcome::Aggregated(report) => {
            if cli.json {
                let out = JsonOutput {
                    source: &source_name,
                    report,
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&out).context("serializing report")?
                );
            } else {
                print_preview(&session, cli.preview)?;
                print_dashboard(&session, report);
            }
        }
    }
    Ok(())
}

/// `--filters` YAML, then each `--filter`, later entries winning per role.
fn user_filters(cli: &Cli) -> Result<FilterSpec> {
    let mut spec = FilterSpec::new();
    if let Some(path) = &cli.filters {
        let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        let from_file =
            FilterSpec::from_yaml(&text).with_context(|| format!("parsing {:?}", path))?;
        spec.merge(from_file);
    }
    for arg in &cli.filter {
        let (role, values) = parse_filter_arg(arg)?;
        spec.narrow(role, values);
    }
    Ok(spec)
}

fn parse_filter_arg(arg: &str) -> Result<(CanonicalRole, Vec<String>)> {
    let Some((role, values)) = arg.split_once('=') else {
        bail!("filter `{}` must look like ROLE=V1,V2", arg);
    };
    let Some(role) = CanonicalRole::from_str(role) else {
        bail!("unknown role `{}` in filter `{}`", role.trim(), arg);
    };
    let values = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    Ok((role, values))
}

fn print_preview(session: &Session, rows: usize) -> Result<()> {
    if rows == 0 {
        return Ok(());
    }
    if let Some(batch) = session.preview(rows) {
        let batch = batch.context("building preview")?;
        println!("Raw Data Preview");
        println!("{}", pretty_format_batches(&[batch]).context("formatting preview")?);
    }
    Ok(())
}

fn print_dashboard(session: &Session, report: &Report) {
    let agg = &report.aggregates;
    println!();
    println!("Total Sales:   {}", format_currency(agg.total));
    println!("Average Sales: {}", format_optional_currency(agg.mean));
    println!("Transactions:  {}", format_count(agg.count));

    for option in session.filter_options() {
        let selected = report
            .filters
            .accepted(option.role)
            .map(|s| s.len())
            .unwrap_or(option.values.len());
        println!(
            "Filter {}: {} of {} selected",
            option.title,
            selected,
            option.values.len()
        );
    }

    if report.is_empty() {
        warn!("filters matched no rows");
        println!("\nNo data matches the current filters.");
        return;
    }

    for series in &agg.categories {
        print_series(series);
    }
    if let Some(trend) = &agg.trend {
        print_series(trend);
    }
}

fn print_series(series: &Series) {
    const WIDTH: f64 = 40.0;
    println!("\n{}", series.title);
    let max = series
        .points
        .iter()
        .map(|p| p.value.abs())
        .fold(0.0_f64, f64::max);
    let label_width = series
        .points
        .iter()
        .map(|p| p.label.chars().count())
        .max()
        .unwrap_or(0);
    for p in &series.points {
        let bar = if max > 0.0 {
            "█".repeat(((p.value.abs() / max) * WIDTH).round() as usize)
        } else {
            String::new()
        };
        println!(
            "  {:<width$}  {:>16}  {}",
            p.label,
            format_currency(p.value),
            bar,
            width = label_width
        );
    }
}
