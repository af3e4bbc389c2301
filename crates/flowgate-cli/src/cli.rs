use std::io::Write;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use flowgate_workspace::{
    AnalysisConfig, EventTable, HierarchyAnalysis, HierarchyKind, LogFormat, ReportFormat,
    Workspace, WorkspaceError, analyze, analyze_file, reports, write_csv, write_json,
    write_report_file,
};

use crate::error::Result;
use crate::logging;

#[derive(Debug, Parser)]
#[command(
    name = "flowgate",
    about = "Evaluate cytometry gating hierarchies and export population counts",
    version
)]
pub struct Cli {
    /// Analysis configuration (TOML, or JSON with a .json extension).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format; overrides `log.format`.
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormatArg>,

    /// Print errors as a JSON object on stderr.
    #[arg(long, global = true)]
    pub json_errors: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List sample and group hierarchies in a workspace.
    List(ListArgs),

    /// Show which hierarchies apply to an event file.
    Match(MatchArgs),

    /// Evaluate hierarchies against an event file and write reports.
    Analyze(AnalyzeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    pub workspace: PathBuf,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct MatchArgs {
    pub workspace: PathBuf,

    pub event_file: PathBuf,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct AnalyzeArgs {
    pub workspace: PathBuf,

    pub event_file: PathBuf,

    /// Analyze only this sample's hierarchy.
    #[arg(long, conflicts_with = "group")]
    pub sample: Option<String>,

    /// Analyze only this group's hierarchy.
    #[arg(long)]
    pub group: Option<String>,

    /// Directory for report files; reports go to stdout when omitted.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Report format; overrides `report.format`.
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Csv => Self::Csv,
            FormatArg::Json => Self::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

pub fn load_config(cli: &Cli) -> Result<AnalysisConfig> {
    match &cli.config {
        Some(path) => Ok(AnalysisConfig::from_file(path)?),
        None => Ok(AnalysisConfig::default()),
    }
}

/// Load configuration, install logging, and run against stdout.
pub fn run_from(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    logging::init(&config.log, cli.verbose, cli.log_format.map(Into::into))?;
    let stdout = std::io::stdout();
    execute(&cli, &config, &mut stdout.lock())
}

pub fn execute(cli: &Cli, config: &AnalysisConfig, out: &mut dyn Write) -> Result<()> {
    match &cli.command {
        Commands::List(args) => run_list(args, out),
        Commands::Match(args) => run_match(args, out),
        Commands::Analyze(args) => run_analyze(args, config, out),
    }
}

fn run_list(args: &ListArgs, out: &mut dyn Write) -> Result<()> {
    let listing = Workspace::load(&args.workspace)?.hierarchies();

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &listing)?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "samples:")?;
    for sample in &listing.samples {
        writeln!(out, "  {}\t{}", sample.id, sample.name)?;
    }
    writeln!(out, "groups:")?;
    for group in &listing.groups {
        writeln!(
            out,
            "  {}\t{}\t(samples: {})",
            group.id,
            group.name,
            group.samples.join(", ")
        )?;
    }
    Ok(())
}

fn run_match(args: &MatchArgs, out: &mut dyn Write) -> Result<()> {
    let workspace = Workspace::load(&args.workspace)?;
    let matching = workspace.find_matching(&args.event_file).ok_or_else(|| {
        WorkspaceError::NoMatch {
            file: args.event_file.display().to_string(),
        }
    })?;

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &matching)?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "sample\t{}", matching.sample_id)?;
    for group in &matching.groups {
        writeln!(out, "group\t{group}")?;
    }
    Ok(())
}

fn run_analyze(args: &AnalyzeArgs, config: &AnalysisConfig, out: &mut dyn Write) -> Result<()> {
    let workspace = Workspace::load(&args.workspace)?;
    let format = args
        .format
        .map(ReportFormat::from)
        .unwrap_or(config.report.format);

    // clap rejects --sample together with --group.
    let target = match (&args.sample, &args.group) {
        (Some(id), _) => Some((HierarchyKind::Sample, id.as_str())),
        (None, Some(id)) => Some((HierarchyKind::Group, id.as_str())),
        (None, None) => None,
    };

    let analyses: Vec<HierarchyAnalysis> = match target {
        Some((kind, id)) => {
            let table = EventTable::read(&args.event_file, config.delimiter())?;
            vec![analyze(
                &workspace,
                kind,
                id,
                &table.events,
                &table.channels,
                config,
            )?]
        }
        None => analyze_file(&workspace, &args.event_file, config)?.analyses,
    };

    let problems: usize = analyses.iter().map(|a| a.run.problems().len()).sum();
    if problems > 0 {
        tracing::warn!(target: "flowgate.cli", problems, "some populations failed or were degraded");
    }

    let reports = reports(&workspace, &analyses, config)?;
    match &args.out {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|source| WorkspaceError::io(dir.as_path(), source))?;
            for report in &reports {
                let path = write_report_file(dir, &args.event_file, report, format)?;
                writeln!(out, "{}", path.display())?;
            }
        }
        None => match format {
            ReportFormat::Csv => {
                for report in &reports {
                    writeln!(out, "# {} {}: {}", report.kind, report.id, report.group)?;
                    write_csv(&mut *out, &report.rows)?;
                }
            }
            ReportFormat::Json => {
                write_json(&mut *out, &reports)?;
                writeln!(out)?;
            }
        },
    }
    Ok(())
}
