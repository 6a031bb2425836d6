//! Symgraph CLI
//!
//! Command-line tools over the symbol-type graph engine:
//!
//! - `symgraph pack`: read a graph file, normalise it (forward declaration
//!   resolution and deduplication), and write it back out.
//! - `symgraph diff`: compare two graph files and render an ABI report.
//!
//! Exit codes: 0 on success/no differences, 4 when `diff` finds ABI
//! differences, 1 on any error.

use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use symgraph_core::comparison::{Ignore, IgnoreKind};
use symgraph_core::reporting::OutputFormat;
use symgraph_core::{Error, Graph, Id, Metrics, serial};
use tracing::debug;

const EXIT_ABI_CHANGE: u8 = 4;

#[derive(Parser)]
#[command(name = "symgraph")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "ABI surface graph tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Dump pass statistics to stderr
    #[arg(long, global = true)]
    metrics: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FileFormat {
    Json,
    Binary,
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FileFormat::Json => "json",
            FileFormat::Binary => "binary",
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Plain,
    Flat,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ReportFormat::Plain => "plain",
            ReportFormat::Flat => "flat",
        })
    }
}

impl From<ReportFormat> for OutputFormat {
    fn from(format: ReportFormat) -> Self {
        match format {
            ReportFormat::Plain => OutputFormat::Plain,
            ReportFormat::Flat => OutputFormat::Flat,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Normalise a graph file: resolve forward declarations, deduplicate,
    /// and write the canonical graph
    Pack {
        /// Input graph file
        input: PathBuf,

        /// Output path (defaults to rewriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Input file encoding
        #[arg(long, value_enum, default_value_t = FileFormat::Json)]
        input_format: FileFormat,

        /// Output file encoding
        #[arg(long, value_enum, default_value_t = FileFormat::Json)]
        output_format: FileFormat,
    },

    /// Compare two graph files and report ABI differences
    Diff {
        /// Baseline graph file
        before: PathBuf,

        /// Changed graph file
        after: PathBuf,

        /// Input file encoding
        #[arg(long, value_enum, default_value_t = FileFormat::Json)]
        format: FileFormat,

        /// Report style
        #[arg(long, value_enum, default_value_t = ReportFormat::Plain)]
        report: ReportFormat,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Comma-separated diff classes to suppress
        /// (e.g. symbol_crc,member_size)
        #[arg(long, value_delimiter = ',')]
        ignore: Vec<IgnoreKind>,

        /// Check for exact equality only, with no report
        #[arg(long)]
        exact: bool,
    },
}

/// Reads one graph file and runs the normalisation pipeline on it.
fn load(
    graph: &mut Graph,
    path: &Path,
    format: FileFormat,
    metrics: &mut Metrics,
) -> Result<Id, Error> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let root = match format {
        FileFormat::Json => serial::read_json(graph, &mut reader)?,
        FileFormat::Binary => serial::read_binary(graph, &mut reader)?,
    };
    let root = symgraph_core::resolve_types(graph, root, metrics)?;
    let hashes = symgraph_core::fingerprint(graph, root, metrics);
    let root = symgraph_core::deduplicate(graph, root, &hashes, metrics);
    debug!("loaded and normalised {} as {root}", path.display());
    Ok(root)
}

fn save(graph: &Graph, root: Id, path: &Path, format: FileFormat) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    match format {
        FileFormat::Json => serial::write_json(graph, root, &mut writer)?,
        FileFormat::Binary => serial::write_binary(graph, root, &mut writer)?,
    }
    writer.flush()?;
    Ok(())
}

fn run_pack(
    input: &Path,
    output: Option<&Path>,
    input_format: FileFormat,
    output_format: FileFormat,
    metrics: &mut Metrics,
) -> Result<ExitCode, Error> {
    let mut graph = Graph::new();
    let root = load(&mut graph, input, input_format, metrics)?;
    save(&graph, root, output.unwrap_or(input), output_format)?;
    Ok(ExitCode::SUCCESS)
}

#[allow(clippy::too_many_arguments)]
fn run_diff(
    before: &Path,
    after: &Path,
    format: FileFormat,
    report: ReportFormat,
    output: Option<&Path>,
    ignore: Ignore,
    exact: bool,
    metrics: &mut Metrics,
) -> Result<ExitCode, Error> {
    // both surfaces share one graph so comparisons can span them
    let mut graph = Graph::new();
    let root1 = load(&mut graph, before, format, metrics)?;
    let root2 = load(&mut graph, after, format, metrics)?;

    if exact {
        let mut equals = symgraph_core::equality::Equals::new(
            &graph,
            symgraph_core::equality::SimpleEqualityCache::new(),
        );
        return Ok(if equals.eq(root1, root2) {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(EXIT_ABI_CHANGE)
        });
    }

    let outcome = symgraph_core::diff(&graph, root1, root2, ignore, metrics);
    if let Some(comparison) = outcome.comparison {
        match output {
            Some(path) => {
                let file = File::create(path)?;
                let mut writer = BufWriter::new(file);
                symgraph_core::report(
                    &graph,
                    &outcome.outcomes,
                    &comparison,
                    report.into(),
                    &mut writer,
                )?;
                writer.flush()?;
            }
            None => {
                let stdout = std::io::stdout();
                let mut writer = stdout.lock();
                symgraph_core::report(
                    &graph,
                    &outcome.outcomes,
                    &comparison,
                    report.into(),
                    &mut writer,
                )?;
            }
        }
    }
    Ok(if outcome.equals {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_ABI_CHANGE)
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut metrics = Metrics::new();
    let result = match &cli.command {
        Commands::Pack {
            input,
            output,
            input_format,
            output_format,
        } => run_pack(
            input,
            output.as_deref(),
            *input_format,
            *output_format,
            &mut metrics,
        ),
        Commands::Diff {
            before,
            after,
            format,
            report,
            output,
            ignore,
            exact,
        } => run_diff(
            before,
            after,
            *format,
            *report,
            output.as_deref(),
            Ignore::new(ignore.iter().copied()),
            *exact,
            &mut metrics,
        ),
    };
    if cli.metrics {
        eprint!("{metrics}");
    }
    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}
