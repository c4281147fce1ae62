use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use skyjoin::catalog::Catalog;
use skyjoin::dedup::{DedupConfig, deduplicate};
use skyjoin::extract::{
    CoordinateReport, IndexReport, attach_column, extract_matched, validate_coordinates,
    validate_indices,
};
use skyjoin::geom::CoordinateFormat;
use skyjoin::matcher::MatchMode;
use skyjoin::normalize::normalize_coordinates;
use skyjoin::pipeline::{Completion, CrossmatchConfig, MatchStats, crossmatch};
use skyjoin::store::{
    AssignmentColumns, AssignmentDetail, DEFAULT_PRECISION, read_assignment, read_catalog,
    write_assignment, write_catalog,
};

#[derive(Parser)]
#[command(name = "skyjoin", about = "Crossmatch astronomical catalogs by sky position")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Every pair within tolerance competes in the greedy assignment.
    All,
    /// Only each left row's single nearest right row is considered.
    Nearest,
}

impl From<ModeArg> for MatchMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::All => MatchMode::AllCandidates,
            ModeArg::Nearest => MatchMode::Nearest,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Degrees,
    Sexagesimal,
}

impl From<FormatArg> for CoordinateFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Degrees => CoordinateFormat::Degrees,
            FormatArg::Sexagesimal => CoordinateFormat::Sexagesimal,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Match a left catalog against a right catalog and write the assignment.
    Crossmatch {
        /// Left (e.g. optical) catalog CSV.
        #[arg(long)]
        left: PathBuf,

        /// Right (e.g. X-ray) catalog CSV.
        #[arg(long)]
        right: PathBuf,

        /// Output assignment CSV.
        #[arg(short, long)]
        output: PathBuf,

        /// Matching radius in arcseconds.
        #[arg(long, default_value = "45.0")]
        tolerance: f64,

        #[arg(long, value_enum, default_value = "all")]
        mode: ModeArg,

        /// Columns that identify duplicate rows (comma separated).
        #[arg(long, value_delimiter = ',')]
        dedup_keys: Vec<String>,

        /// Round dedup keys to this many decimals before comparing.
        #[arg(long)]
        dedup_decimals: Option<u32>,

        #[arg(long, default_value = "ra_deg")]
        ra_column: String,

        #[arg(long, default_value = "dec_deg")]
        dec_column: String,

        /// Decimals written for the separation column.
        #[arg(long, default_value_t = DEFAULT_PRECISION)]
        precision: usize,

        #[arg(long, default_value = "left")]
        left_name: String,

        #[arg(long, default_value = "right")]
        right_name: String,

        /// Right-catalog columns copied into the assignment (comma separated).
        /// Also adds both sides' coordinates.
        #[arg(long, value_delimiter = ',')]
        carry: Vec<String>,

        /// Write run statistics as JSON.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Write the deduplicated catalogs next to the output. Required to
        /// extract later when dedup keys are given.
        #[arg(long)]
        save_deduped: bool,
    },

    /// Drop duplicate rows, keeping the most complete one of each group.
    Dedup {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Key columns (comma separated).
        #[arg(long, value_delimiter = ',', required = true)]
        keys: Vec<String>,

        #[arg(long)]
        decimals: Option<u32>,
    },

    /// Convert coordinate columns into decimal-degree ra_deg/dec_deg.
    Normalize {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long)]
        ra_column: String,

        #[arg(long)]
        dec_column: String,

        #[arg(long, value_enum, default_value = "degrees")]
        format: FormatArg,
    },

    /// Pull matched rows out of both catalogs using an assignment file.
    Extract {
        #[arg(long)]
        assignment: PathBuf,

        #[arg(long)]
        left: PathBuf,

        #[arg(long)]
        right: PathBuf,

        #[arg(long)]
        left_output: PathBuf,

        #[arg(long)]
        right_output: PathBuf,

        /// Side-by-side CSV of both matched rows.
        #[arg(long)]
        combined_output: Option<PathBuf>,

        #[arg(long, default_value = "left")]
        left_name: String,

        #[arg(long, default_value = "right")]
        right_name: String,

        /// Right-catalog column copied onto the extracted left rows as
        /// `xray_<column>`.
        #[arg(long)]
        attach: Option<String>,
    },

    /// Report coordinate health and, optionally, assignment index validity.
    Validate {
        #[arg(long)]
        left: PathBuf,

        #[arg(long)]
        right: PathBuf,

        #[arg(long)]
        assignment: Option<PathBuf>,

        #[arg(long, default_value = "ra_deg")]
        ra_column: String,

        #[arg(long, default_value = "dec_deg")]
        dec_column: String,

        #[arg(long, default_value = "left")]
        left_name: String,

        #[arg(long, default_value = "right")]
        right_name: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Crossmatch {
            left,
            right,
            output,
            tolerance,
            mode,
            dedup_keys,
            dedup_decimals,
            ra_column,
            dec_column,
            precision,
            left_name,
            right_name,
            carry,
            report,
            save_deduped,
        } => {
            let config = CrossmatchConfig {
                tolerance_arcsec: tolerance,
                mode: mode.into(),
                dedup_keys,
                dedup_decimals,
                ra_column,
                dec_column,
                ..CrossmatchConfig::default()
            };
            let columns = AssignmentColumns::labeled(&left_name, &right_name);
            cmd_crossmatch(
                &left,
                &right,
                &output,
                &config,
                &columns,
                precision,
                &carry,
                report.as_deref(),
                save_deduped,
            )
        }
        Commands::Dedup {
            input,
            output,
            keys,
            decimals,
        } => cmd_dedup(&input, &output, &DedupConfig::new(keys, decimals)),
        Commands::Normalize {
            input,
            output,
            ra_column,
            dec_column,
            format,
        } => cmd_normalize(&input, &output, &ra_column, &dec_column, format.into()),
        Commands::Extract {
            assignment,
            left,
            right,
            left_output,
            right_output,
            combined_output,
            left_name,
            right_name,
            attach,
        } => cmd_extract(
            &assignment,
            &left,
            &right,
            &left_output,
            &right_output,
            combined_output.as_deref(),
            &AssignmentColumns::labeled(&left_name, &right_name),
            attach.as_deref(),
        ),
        Commands::Validate {
            left,
            right,
            assignment,
            ra_column,
            dec_column,
            left_name,
            right_name,
        } => cmd_validate(
            &left,
            &right,
            assignment.as_deref(),
            &ra_column,
            &dec_column,
            &AssignmentColumns::labeled(&left_name, &right_name),
        ),
    }
}

fn load(path: &Path) -> Result<Catalog> {
    let catalog = read_catalog(path).with_context(|| format!("failed to read {}", path.display()))?;
    info!(path = %path.display(), rows = catalog.len(), "loaded catalog");
    Ok(catalog)
}

fn save(path: &Path, catalog: &Catalog) -> Result<()> {
    write_catalog(path, catalog).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), rows = catalog.len(), "wrote catalog");
    Ok(())
}

/// `out.csv` -> `out.<suffix>.csv`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    path.with_file_name(format!("{stem}.{suffix}.csv"))
}

#[derive(Serialize)]
struct CrossmatchReport<'a> {
    config: &'a CrossmatchConfig,
    completion: Completion,
    stats: &'a MatchStats,
}

#[allow(clippy::too_many_arguments)]
fn cmd_crossmatch(
    left_path: &Path,
    right_path: &Path,
    output: &Path,
    config: &CrossmatchConfig,
    columns: &AssignmentColumns,
    precision: usize,
    carry: &[String],
    report: Option<&Path>,
    save_deduped: bool,
) -> Result<()> {
    let left = load(left_path)?;
    let right = load(right_path)?;

    let outcome = crossmatch(&left, &right, config)?;
    let left_cat = outcome.left_catalog(&left);
    let right_cat = outcome.right_catalog(&right);

    let detail = (!carry.is_empty()).then(|| AssignmentDetail {
        left: left_cat,
        right: right_cat,
        ra_column: &config.ra_column,
        dec_column: &config.dec_column,
        carry,
    });
    write_assignment(output, &outcome.assignment, columns, precision, detail.as_ref())
        .with_context(|| format!("failed to write {}", output.display()))?;

    if save_deduped {
        if let Some(cat) = &outcome.left_deduped {
            save(&sibling(output, &columns.left_label), cat)?;
        }
        if let Some(cat) = &outcome.right_deduped {
            save(&sibling(output, &columns.right_label), cat)?;
        }
    }

    let s = &outcome.stats;
    eprintln!(
        "Matched {} of {} {} / {} {} rows within {}\" ({} candidates)",
        s.matched,
        s.left_total,
        columns.left_label,
        s.right_total,
        columns.right_label,
        config.tolerance_arcsec,
        s.candidates
    );
    if let (Some(med), Some(max)) = (s.median_separation_arcsec, s.max_separation_arcsec) {
        eprintln!("  Separation: median={med:.3}\", max={max:.3}\"");
    }
    if let Some(eff) = s.efficiency {
        eprintln!("  Efficiency: {:.1}%", eff * 100.0);
    }
    if outcome.completion() == Completion::Partial {
        eprintln!(
            "  Partial: {} {} and {} {} rows had unusable coordinates",
            s.left_rejected, columns.left_label, s.right_rejected, columns.right_label
        );
    }

    if let Some(path) = report {
        let body = CrossmatchReport {
            config,
            completion: outcome.completion(),
            stats: s,
        };
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &body)?;
        info!(path = %path.display(), "wrote report");
    }
    Ok(())
}

fn cmd_dedup(input: &Path, output: &Path, config: &DedupConfig) -> Result<()> {
    let catalog = load(input)?;
    let (deduped, summary) = deduplicate(&catalog, config)?;
    save(output, &deduped)?;
    eprintln!(
        "Kept {} of {} rows ({} duplicates removed)",
        summary.after,
        summary.before,
        summary.dropped()
    );
    Ok(())
}

fn cmd_normalize(
    input: &Path,
    output: &Path,
    ra_column: &str,
    dec_column: &str,
    format: CoordinateFormat,
) -> Result<()> {
    let catalog = load(input)?;
    let (normalized, summary) = normalize_coordinates(&catalog, ra_column, dec_column, format)?;
    save(output, &normalized)?;
    eprintln!(
        "Normalized {} of {} rows ({} dropped)",
        summary.kept, summary.total, summary.dropped
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_extract(
    assignment_path: &Path,
    left_path: &Path,
    right_path: &Path,
    left_output: &Path,
    right_output: &Path,
    combined_output: Option<&Path>,
    columns: &AssignmentColumns,
    attach: Option<&str>,
) -> Result<()> {
    let assignment = read_assignment(assignment_path, columns)
        .with_context(|| format!("failed to read {}", assignment_path.display()))?;
    let left = load(left_path)?;
    let right = load(right_path)?;

    let mut extraction = extract_matched(&assignment, &left, &right);
    if let Some(column) = attach {
        attach_column(&mut extraction.left, &extraction.right, column, &format!("xray_{column}"))?;
    }

    save(left_output, &extraction.left)?;
    save(right_output, &extraction.right)?;
    if let Some(path) = combined_output {
        save(path, &extraction.combined()?)?;
    }
    eprintln!(
        "Extracted {} matched pairs ({} out-of-bounds entries dropped)",
        extraction.matches.len(),
        extraction.dropped
    );
    Ok(())
}

fn print_coordinate_report(name: &str, r: &CoordinateReport) {
    eprintln!(
        "{name}: {} rows, {} missing RA, {} missing Dec, {} unusable",
        r.total, r.missing_ra, r.missing_dec, r.invalid
    );
    if !r.sample.is_empty() {
        eprintln!("  First unusable rows: {:?}", r.sample);
    }
}

fn print_index_report(r: &IndexReport, columns: &AssignmentColumns) {
    eprintln!("Assignment: {} entries", r.entries);
    eprintln!(
        "  {}: {}/{} in bounds, {} duplicated",
        columns.left_label, r.valid_left, r.entries, r.duplicate_left
    );
    eprintln!(
        "  {}: {}/{} in bounds, {} duplicated",
        columns.right_label, r.valid_right, r.entries, r.duplicate_right
    );
}

fn cmd_validate(
    left_path: &Path,
    right_path: &Path,
    assignment_path: Option<&Path>,
    ra_column: &str,
    dec_column: &str,
    columns: &AssignmentColumns,
) -> Result<()> {
    let left = load(left_path)?;
    let right = load(right_path)?;

    for (name, catalog) in [(&columns.left_label, &left), (&columns.right_label, &right)] {
        let report =
            validate_coordinates(catalog, ra_column, dec_column, CoordinateFormat::Degrees)?;
        print_coordinate_report(name, &report);
    }

    if let Some(path) = assignment_path {
        let assignment = read_assignment(path, columns)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let report = validate_indices(&assignment, &left, &right);
        print_index_report(&report, columns);
        if !report.passed() {
            bail!("assignment failed index validation");
        }
        eprintln!("Assignment passed index validation");
    }
    Ok(())
}
