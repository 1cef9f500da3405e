// Entry point and high-level CLI flow.
//
// Each subcommand runs one pipeline to completion:
// - `consolidate` copies the result block of an inspection export into the
//   master template and saves it under a dated name.
// - `analyze` forecasts plan completion from a consolidated report and
//   writes the Word analysis.
// - `compare` joins two consolidated reports and writes the Word comparison
//   plus a flat spreadsheet export.
use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use meter_report::config::Config;
use meter_report::loader::{load_table, Workbook};
use meter_report::output;
use meter_report::pipeline::{self, Artifact};
use meter_report::reports::{comparison_rows, evaluation_rows, narrative, summary_lines, verdict_line};
use meter_report::util::{format_int, format_percent};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meter-report")]
#[command(about = "Meter inspection consolidation, forecast and comparison reports", long_about = None)]
struct Cli {
    /// TOML file overriding sheet names, offsets, period anchors and output names
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy the inspection result block into the master template
    Consolidate {
        /// Inspection export; its active sheet is read unless
        /// `consolidation.source_sheet` is set in the config
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        template: PathBuf,
        /// Defaults to `output.directory` from the config
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Date stamped into the file name (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Forecast plan completion from a consolidated report
    Analyze {
        #[arg(long)]
        input: PathBuf,
        /// Report date used for elapsed days (defaults to today)
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        summary_json: Option<PathBuf>,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Compare a previous and a current consolidated report
    Compare {
        #[arg(long)]
        old: PathBuf,
        #[arg(long)]
        new: PathBuf,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        out_docx: Option<PathBuf>,
        #[arg(long)]
        out_xlsx: Option<PathBuf>,
    },
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Write an artifact to `explicit` if given, else into the output directory.
fn save(artifact: &Artifact, explicit: Option<&Path>, config: &Config) -> anyhow::Result<PathBuf> {
    let path = match explicit {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(&artifact.file_name);
            output::save_bytes(dir, name, &artifact.bytes)?
        }
        None => output::save_bytes(&config.output.directory, &artifact.file_name, &artifact.bytes)?,
    };
    Ok(path)
}

fn handle_consolidate(
    config: &Config,
    source: &Path,
    template: &Path,
    out_dir: Option<PathBuf>,
    date: NaiveDate,
) -> anyhow::Result<()> {
    let mut source_book = Workbook::open(source)
        .with_context(|| format!("failed to open source file {}", source.display()))?;
    let template_bytes = std::fs::read(template)
        .with_context(|| format!("failed to read template file {}", template.display()))?;
    let consolidated = pipeline::run_consolidation(
        &mut source_book,
        &template_bytes,
        &template.display().to_string(),
        config,
        date,
    )?;
    let dir = out_dir.unwrap_or_else(|| config.output.directory.clone());
    let path = output::save_bytes(&dir, &consolidated.file_name, &consolidated.bytes)?;
    println!(
        "Consolidated {} cells ({} blank) into {}",
        consolidated.copied + consolidated.blanked,
        consolidated.blanked,
        path.display()
    );
    Ok(())
}

fn handle_analyze(
    config: &Config,
    input: &Path,
    as_of: NaiveDate,
    out: Option<PathBuf>,
    summary_json: Option<PathBuf>,
    csv: Option<PathBuf>,
) -> anyhow::Result<()> {
    let locale = config.output.locale()?;
    let (table, load_report) = load_table(input, &config.layout)
        .with_context(|| format!("failed to load {}", input.display()))?;
    println!(
        "Loaded {} entities ({} rows without an entity skipped).\n",
        format_int(load_report.kept_rows, &locale),
        format_int(load_report.dropped_rows, &locale)
    );

    let analysis = pipeline::analyze(table, config, as_of)?;
    for line in summary_lines(&analysis.forecast, &locale) {
        println!("{}", line);
    }
    println!("{}\n", verdict_line(&analysis.forecast));

    let rows = evaluation_rows(&analysis.rows, &locale);
    println!("Evaluation by entity\n");
    output::preview_table_rows(&rows, rows.len());

    if let Some(path) = csv {
        output::write_csv(&path, &rows)?;
        println!("(Evaluation table exported to {})", path.display());
    }
    if let Some(path) = summary_json {
        output::write_json(&path, &analysis.forecast.summary(analysis.table.len()))?;
        println!("(Summary stats written to {})", path.display());
    }

    let artifact = analysis.render(config).context("failed to render the analysis report")?;
    let path = save(&artifact, out.as_deref(), config)?;
    println!("Analysis report saved to {}", path.display());
    Ok(())
}

fn handle_compare(
    config: &Config,
    old: &Path,
    new: &Path,
    date: NaiveDate,
    out_docx: Option<PathBuf>,
    out_xlsx: Option<PathBuf>,
) -> anyhow::Result<()> {
    let locale = config.output.locale()?;
    let (old_table, _) = load_table(old, &config.layout)
        .with_context(|| format!("failed to load {}", old.display()))?;
    let (new_table, _) = load_table(new, &config.layout)
        .with_context(|| format!("failed to load {}", new.display()))?;

    let cmp = pipeline::compare(&old_table, &new_table);
    println!("Comparison table\n");
    let rows = comparison_rows(&cmp, &locale);
    output::preview_table_rows(&rows, rows.len());
    println!(
        "Overall completion change: {}\n",
        format_percent(cmp.overall_ratio_delta(), &locale)
    );
    for line in narrative(&cmp) {
        println!("{}", line);
    }
    if !cmp.only_old.is_empty() || !cmp.only_new.is_empty() {
        println!(
            "\nNot compared: only previous [{}], only current [{}]",
            cmp.only_old.join(", "),
            cmp.only_new.join(", ")
        );
    }

    let (document, workbook) =
        pipeline::render_comparison(&cmp, config, date).context("failed to render the comparison report")?;
    let doc_path = save(&document, out_docx.as_deref(), config)?;
    let xlsx_path = save(&workbook, out_xlsx.as_deref(), config)?;
    println!("\nComparison report saved to {}", doc_path.display());
    println!("Comparison table exported to {}", xlsx_path.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Consolidate {
            source,
            template,
            out_dir,
            date,
        } => handle_consolidate(&config, &source, &template, out_dir, date.unwrap_or_else(today))?,
        Commands::Analyze {
            input,
            as_of,
            out,
            summary_json,
            csv,
        } => handle_analyze(
            &config,
            &input,
            as_of.unwrap_or_else(today),
            out,
            summary_json,
            csv,
        )?,
        Commands::Compare {
            old,
            new,
            date,
            out_docx,
            out_xlsx,
        } => handle_compare(
            &config,
            &old,
            &new,
            date.unwrap_or_else(today),
            out_docx,
            out_xlsx,
        )?,
    }

    Ok(())
}
