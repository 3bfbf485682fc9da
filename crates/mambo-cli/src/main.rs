//! Mambo CLI
//!
//! Command-line front end for the mambo id registry:
//! - `mode` / `mapped-mode`: assign mambo node ids to a dataset's entities
//! - `crossnet`: assign mambo edge ids to a dataset's relationships
//! - `mapping`: merge a two-scheme pair file into a mapping dictionary
//! - `run`: execute a JSON plan of the above, in order
//!
//! Output files default to `<output-dir>/miner-...-<date>.tsv` names.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use mambo_registry::format::DEFAULT_DELIMITER;
use mambo_registry::{
    CanonicalId, CrossnetTableConfig, CrossnetTablePaths, DatasetId, EdgeId, KeyTransform,
    MappedModeTableConfig, MappingMergeConfig, ModeRunSummary, ModeTableConfig, ModeTablePaths,
    ReaderOptions,
};

mod naming;
mod plan;

use naming::ModeFileName;
use plan::{PlanStep, RunPlan};

#[derive(Parser)]
#[command(name = "mambo")]
#[command(author, version, about = "Mambo: stable ids for multi-modal biological networks")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign fresh mambo ids to every distinct key of a dataset.
    Mode(ModeArgs),

    /// Assign mambo ids through a mapping dictionary shared across datasets.
    MappedMode(MappedModeArgs),

    /// Assign mambo edge ids to a dataset's relationships between two modes.
    ///
    /// Source and destination files are per-dataset mode tables named
    /// `miner-<mode>-<dataset_id>-<dataset>-<date>.tsv`.
    Crossnet(CrossnetArgs),

    /// Merge (scheme A, scheme B) pairs into a mapping dictionary.
    Mapping(MappingArgs),

    /// Execute a JSON run plan.
    Run {
        /// Plan file (`{"steps": [...]}`)
        plan: PathBuf,
    },
}

// ============================================================================
// Arguments (shared by subcommands and run plans)
// ============================================================================

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_delimiter() -> char {
    DEFAULT_DELIMITER
}

fn default_one() -> usize {
    1
}

fn rebase(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

fn rebase_opt(base: &Path, path: &mut Option<PathBuf>) {
    if let Some(path) = path {
        rebase(base, path);
    }
}

#[derive(Args, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModeArgs {
    /// Input table (delimited, `#`/`!` comments)
    pub input: PathBuf,
    /// Mode name, e.g. `gene`
    pub mode: String,
    /// Dataset name, e.g. `GO`
    pub dataset: String,
    pub dataset_id: DatasetId,
    /// Column holding the native key
    #[arg(long, default_value_t = 0)]
    #[serde(default)]
    pub node_index: usize,
    #[arg(long, default_value = ".")]
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Full mode file (appended to); overrides --output-dir
    #[arg(long)]
    #[serde(default)]
    pub full_mode_file: Option<PathBuf>,
    /// Per-dataset mode table (overwritten); overrides --output-dir
    #[arg(long)]
    #[serde(default)]
    pub db_node_file: Option<PathBuf>,
    /// First id to assign; must exceed every id in the full mode file
    #[arg(long)]
    #[serde(default)]
    pub mambo_id_counter_start: Option<u64>,
    /// Skip the first non-comment input line
    #[arg(long)]
    #[serde(default)]
    pub header_row: bool,
    #[arg(long, default_value_t = DEFAULT_DELIMITER, hide_default_value = true)]
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl ModeArgs {
    pub(crate) fn rebase(&mut self, base: &Path) {
        rebase(base, &mut self.input);
        rebase(base, &mut self.output_dir);
        rebase_opt(base, &mut self.full_mode_file);
        rebase_opt(base, &mut self.db_node_file);
    }
}

#[derive(Args, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappedModeArgs {
    /// Mode name, e.g. `protein`
    pub mode: String,
    pub input: PathBuf,
    pub dataset: String,
    pub dataset_id: DatasetId,
    /// Mapping dictionary (`mambo_id<TAB>scheme...`)
    pub mapping_file: PathBuf,
    /// Column of the mapping file holding this dataset's scheme (0 is the id)
    pub map_index: usize,
    #[arg(long, default_value_t = 0)]
    #[serde(default)]
    pub node_index: usize,
    #[arg(long, default_value = ".")]
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[arg(long)]
    #[serde(default)]
    pub full_mode_file: Option<PathBuf>,
    #[arg(long)]
    #[serde(default)]
    pub db_node_file: Option<PathBuf>,
    /// Do not add unknown keys to the mapping file
    #[arg(long)]
    #[serde(default)]
    pub skip_missing_ids: bool,
    /// Keys look like `9606.ENSP...`; match on the part after the first dot
    #[arg(long)]
    #[serde(default)]
    pub qualified_keys: bool,
    #[arg(long)]
    #[serde(default)]
    pub header_row: bool,
    #[arg(long, default_value_t = DEFAULT_DELIMITER, hide_default_value = true)]
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl MappedModeArgs {
    pub(crate) fn rebase(&mut self, base: &Path) {
        rebase(base, &mut self.input);
        rebase(base, &mut self.mapping_file);
        rebase(base, &mut self.output_dir);
        rebase_opt(base, &mut self.full_mode_file);
        rebase_opt(base, &mut self.db_node_file);
    }
}

#[derive(Args, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrossnetArgs {
    /// Edge table
    pub input: PathBuf,
    /// Per-dataset mode table of the source mode
    pub src_file: PathBuf,
    /// Per-dataset mode table of the destination mode
    pub dst_file: PathBuf,
    pub dataset: String,
    pub dataset_id: DatasetId,
    /// Source mode name (default: parsed from the source file name)
    #[arg(long)]
    #[serde(default)]
    pub mode_name1: Option<String>,
    /// Destination mode name (default: parsed from the destination file name)
    #[arg(long)]
    #[serde(default)]
    pub mode_name2: Option<String>,
    /// Source dataset id (default: parsed from the source file name)
    #[arg(long)]
    #[serde(default)]
    pub src_dataset_id: Option<DatasetId>,
    /// Destination dataset id (default: parsed from the destination file name)
    #[arg(long)]
    #[serde(default)]
    pub dst_dataset_id: Option<DatasetId>,
    #[arg(long, default_value_t = 0)]
    #[serde(default)]
    pub src_node_index: usize,
    #[arg(long, default_value_t = 1)]
    #[serde(default = "default_one")]
    pub dst_node_index: usize,
    #[arg(long, default_value = ".")]
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[arg(long)]
    #[serde(default)]
    pub full_crossnet_file: Option<PathBuf>,
    #[arg(long)]
    #[serde(default)]
    pub db_edge_file: Option<PathBuf>,
    /// Skip edges whose endpoints have no mambo id instead of failing
    #[arg(long)]
    #[serde(default)]
    pub skip_missing_ids: bool,
    #[arg(long)]
    #[serde(default)]
    pub mambo_id_counter_start: Option<u64>,
    /// Transform applied to source keys before lookup
    /// (identity, strip-version, after-dot, uppercase, lowercase, strip-prefix:<p>)
    #[arg(long)]
    #[serde(default)]
    pub src_mode_filter: Option<KeyTransform>,
    /// Transform applied to destination keys before lookup
    #[arg(long)]
    #[serde(default)]
    pub dst_mode_filter: Option<KeyTransform>,
    #[arg(long)]
    #[serde(default)]
    pub header_row: bool,
    #[arg(long, default_value_t = DEFAULT_DELIMITER, hide_default_value = true)]
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl CrossnetArgs {
    pub(crate) fn rebase(&mut self, base: &Path) {
        rebase(base, &mut self.input);
        rebase(base, &mut self.src_file);
        rebase(base, &mut self.dst_file);
        rebase(base, &mut self.output_dir);
        rebase_opt(base, &mut self.full_crossnet_file);
        rebase_opt(base, &mut self.db_edge_file);
    }
}

#[derive(Args, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingArgs {
    /// Source pair file
    pub mapping_file: PathBuf,
    /// Mapping dictionary to create or update
    pub output_file: PathBuf,
    #[arg(long, default_value_t = 0)]
    #[serde(default)]
    pub map_index1: usize,
    #[arg(long, default_value_t = 1)]
    #[serde(default = "default_one")]
    pub map_index2: usize,
    #[arg(long, default_value_t = 0)]
    #[serde(default)]
    pub output_index1: usize,
    #[arg(long, default_value_t = 1)]
    #[serde(default = "default_one")]
    pub output_index2: usize,
    #[arg(long)]
    #[serde(default)]
    pub output_title1: Option<String>,
    #[arg(long)]
    #[serde(default)]
    pub output_title2: Option<String>,
    #[arg(long, default_value_t = DEFAULT_DELIMITER, hide_default_value = true)]
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl MappingArgs {
    pub(crate) fn rebase(&mut self, base: &Path) {
        rebase(base, &mut self.mapping_file);
        rebase(base, &mut self.output_file);
    }
}

// ============================================================================
// Entry point
// ============================================================================

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("mambo=debug")
        } else {
            EnvFilter::new("mambo=info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Mode(args) => cmd_mode(&args),
        Commands::MappedMode(args) => cmd_mapped_mode(&args),
        Commands::Crossnet(args) => cmd_crossnet(&args),
        Commands::Mapping(args) => cmd_mapping(&args),
        Commands::Run { plan } => cmd_run(&plan),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn reader_options(delimiter: char, header_row: bool) -> ReaderOptions {
    ReaderOptions {
        delimiter,
        skip_header_row: header_row,
    }
}

fn mode_paths(
    input: &Path,
    mode: &str,
    dataset: &str,
    dataset_id: DatasetId,
    output_dir: &Path,
    full_mode_file: Option<&PathBuf>,
    db_node_file: Option<&PathBuf>,
) -> ModeTablePaths {
    let date = naming::current_date();
    ModeTablePaths {
        input: input.to_path_buf(),
        full_mode_file: full_mode_file
            .cloned()
            .unwrap_or_else(|| output_dir.join(naming::full_mode_file_name(mode, &date))),
        db_node_file: db_node_file.cloned().unwrap_or_else(|| {
            output_dir.join(naming::mode_file_name(mode, dataset_id, dataset, &date))
        }),
    }
}

fn print_mode_summary(paths: &ModeTablePaths, summary: &ModeRunSummary) {
    println!("  {} {}", "→".cyan(), paths.full_mode_file.display());
    println!("  {} {}", "→".cyan(), paths.db_node_file.display());
    let ids = match (summary.start_id, summary.end_id) {
        (Some(start), Some(end)) if end > start => format!("{start}..{}", end.0 - 1),
        _ => "none".to_string(),
    };
    println!(
        "  {} rows, {} new ids ({}), {} reused, {} duplicates skipped",
        summary.rows_written, summary.minted, ids, summary.reused, summary.duplicates_skipped
    );
    if summary.carried_forward > 0 || summary.unmapped > 0 {
        println!(
            "  {} carried forward, {} unmapped, {} mapping rows added",
            summary.carried_forward, summary.unmapped, summary.mapping_rows_appended
        );
    }
}

fn cmd_mode(args: &ModeArgs) -> Result<()> {
    println!(
        "{} {} ids for {} ({})",
        "Creating".green().bold(),
        args.mode,
        args.dataset,
        args.input.display()
    );
    let config = ModeTableConfig {
        mode_name: args.mode.clone(),
        dataset_name: args.dataset.clone(),
        dataset_id: args.dataset_id,
        node_index: args.node_index,
        reader: reader_options(args.delimiter, args.header_row),
    };
    let paths = mode_paths(
        &args.input,
        &args.mode,
        &args.dataset,
        args.dataset_id,
        &args.output_dir,
        args.full_mode_file.as_ref(),
        args.db_node_file.as_ref(),
    );
    let summary = mambo_registry::create_mode_table(
        &config,
        &paths,
        args.mambo_id_counter_start.map(CanonicalId),
    )
    .with_context(|| format!("mode table for {} failed", args.dataset))?;
    print_mode_summary(&paths, &summary);
    Ok(())
}

fn cmd_mapped_mode(args: &MappedModeArgs) -> Result<()> {
    println!(
        "{} {} ids for {} via {}",
        "Mapping".green().bold(),
        args.mode,
        args.dataset,
        args.mapping_file.display()
    );
    let config = MappedModeTableConfig {
        mode: ModeTableConfig {
            mode_name: args.mode.clone(),
            dataset_name: args.dataset.clone(),
            dataset_id: args.dataset_id,
            node_index: args.node_index,
            reader: reader_options(args.delimiter, args.header_row),
        },
        map_index: args.map_index,
        skip_missing_ids: args.skip_missing_ids,
        qualified_keys: args.qualified_keys,
    };
    let paths = mode_paths(
        &args.input,
        &args.mode,
        &args.dataset,
        args.dataset_id,
        &args.output_dir,
        args.full_mode_file.as_ref(),
        args.db_node_file.as_ref(),
    );
    let summary = mambo_registry::create_mapped_mode_table(&config, &paths, &args.mapping_file)
        .with_context(|| format!("mapped mode table for {} failed", args.dataset))?;
    print_mode_summary(&paths, &summary);
    Ok(())
}

/// Mode name and dataset id of one crossnet endpoint, from overrides or the
/// mode file name.
fn endpoint(
    file: &Path,
    mode: Option<&String>,
    dataset_id: Option<DatasetId>,
) -> Result<(String, DatasetId)> {
    if let (Some(mode), Some(id)) = (mode, dataset_id) {
        return Ok((mode.clone(), id));
    }
    let ModeFileName {
        mode: parsed_mode,
        dataset_id: parsed_id,
    } = naming::parse_mode_file_name(file)?;
    Ok((
        mode.cloned().unwrap_or(parsed_mode),
        dataset_id.unwrap_or(parsed_id),
    ))
}

fn cmd_crossnet(args: &CrossnetArgs) -> Result<()> {
    let (src_mode, src_dataset_id) = endpoint(
        &args.src_file,
        args.mode_name1.as_ref(),
        args.src_dataset_id,
    )
    .context("cannot identify the source mode table")?;
    let (dst_mode, dst_dataset_id) = endpoint(
        &args.dst_file,
        args.mode_name2.as_ref(),
        args.dst_dataset_id,
    )
    .context("cannot identify the destination mode table")?;

    println!(
        "{} {}-{} edges for {} ({})",
        "Creating".green().bold(),
        src_mode,
        dst_mode,
        args.dataset,
        args.input.display()
    );

    let date = naming::current_date();
    let paths = CrossnetTablePaths {
        input: args.input.clone(),
        src_mode_file: args.src_file.clone(),
        dst_mode_file: args.dst_file.clone(),
        full_crossnet_file: args.full_crossnet_file.clone().unwrap_or_else(|| {
            args.output_dir
                .join(naming::full_crossnet_file_name(&src_mode, &dst_mode, &date))
        }),
        db_edge_file: args.db_edge_file.clone().unwrap_or_else(|| {
            args.output_dir.join(naming::crossnet_file_name(
                &src_mode,
                &dst_mode,
                args.dataset_id,
                &args.dataset,
                &date,
            ))
        }),
    };
    let config = CrossnetTableConfig {
        src_mode_name: src_mode,
        dst_mode_name: dst_mode,
        dataset_name: args.dataset.clone(),
        dataset_id: args.dataset_id,
        src_dataset_id,
        dst_dataset_id,
        src_node_index: args.src_node_index,
        dst_node_index: args.dst_node_index,
        skip_missing_ids: args.skip_missing_ids,
        src_transform: args.src_mode_filter.clone().unwrap_or_default(),
        dst_transform: args.dst_mode_filter.clone().unwrap_or_default(),
        reader: reader_options(args.delimiter, args.header_row),
    };

    let summary = mambo_registry::create_crossnet_table(
        &config,
        &paths,
        args.mambo_id_counter_start.map(EdgeId),
    )
    .with_context(|| format!("crossnet table for {} failed", args.dataset))?;

    println!("  {} {}", "→".cyan(), paths.full_crossnet_file.display());
    println!("  {} {}", "→".cyan(), paths.db_edge_file.display());
    println!(
        "  {} edges, {} skipped (missing ids), {} skipped (empty keys)",
        summary.edges_written, summary.missing_skipped, summary.empty_skipped
    );
    Ok(())
}

fn cmd_mapping(args: &MappingArgs) -> Result<()> {
    println!(
        "{} {} into {}",
        "Merging".green().bold(),
        args.mapping_file.display(),
        args.output_file.display()
    );
    let config = MappingMergeConfig {
        map_index1: args.map_index1,
        map_index2: args.map_index2,
        output_index1: args.output_index1,
        output_index2: args.output_index2,
        output_title1: args.output_title1.clone(),
        output_title2: args.output_title2.clone(),
        delimiter: args.delimiter,
    };
    let summary =
        mambo_registry::create_mapping_table(&args.mapping_file, &args.output_file, &config)
            .with_context(|| format!("merging {} failed", args.mapping_file.display()))?;

    println!("  {} {}", "→".cyan(), args.output_file.display());
    println!(
        "  {} pairs: {} new rows, {} filled, {} unchanged, {} conflicts",
        summary.pairs, summary.created, summary.filled, summary.unchanged, summary.conflicts
    );
    if summary.conflicts > 0 {
        println!(
            "  {} {} existing values kept over conflicting pairs",
            "warning:".yellow().bold(),
            summary.conflicts
        );
    }
    Ok(())
}

fn cmd_run(plan_path: &Path) -> Result<()> {
    let plan = RunPlan::load(plan_path)?;
    if plan.steps.is_empty() {
        return Err(anyhow!("plan {} has no steps", plan_path.display()));
    }
    let total = plan.steps.len();
    tracing::debug!(plan = %plan_path.display(), steps = total, "loaded run plan");
    for (i, step) in plan.steps.iter().enumerate() {
        println!(
            "{} step {}/{}: {}",
            "Running".blue().bold(),
            i + 1,
            total,
            step.name()
        );
        let result = match step {
            PlanStep::Mode(args) => cmd_mode(args),
            PlanStep::MappedMode(args) => cmd_mapped_mode(args),
            PlanStep::Crossnet(args) => cmd_crossnet(args),
            PlanStep::Mapping(args) => cmd_mapping(args),
        };
        result.with_context(|| format!("step {} ({}) failed", i + 1, step.name()))?;
    }
    println!("{} {} steps", "Done".green().bold(), total);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_crossnet_defaults() {
        let cli = Cli::try_parse_from([
            "mambo",
            "crossnet",
            "go.tsv",
            "miner-gene-0-GO-20160520.tsv",
            "miner-function-0-GO-20160520.tsv",
            "GO",
            "0",
            "--src-mode-filter",
            "strip-prefix:UniProtKB:",
        ])
        .unwrap();
        let Commands::Crossnet(args) = cli.command else {
            panic!("expected crossnet");
        };
        assert_eq!(args.src_node_index, 0);
        assert_eq!(args.dst_node_index, 1);
        assert_eq!(args.delimiter, '\t');
        assert_eq!(
            args.src_mode_filter,
            Some(KeyTransform::StripPrefix("UniProtKB:".to_string()))
        );
    }

    #[test]
    fn test_endpoint_prefers_overrides() {
        let (mode, id) = endpoint(
            Path::new("anything.tsv"),
            Some(&"gene".to_string()),
            Some(DatasetId(4)),
        )
        .unwrap();
        assert_eq!((mode.as_str(), id), ("gene", DatasetId(4)));

        let (mode, id) =
            endpoint(Path::new("miner-function-2-GO-20160520.tsv"), None, None).unwrap();
        assert_eq!((mode.as_str(), id), ("function", DatasetId(2)));

        assert!(endpoint(Path::new("function.tsv"), None, None).is_err());
    }
}
