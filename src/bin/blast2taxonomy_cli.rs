use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process;

use blast2taxonomy_rs::config::{
    parse_rank_list, AnnotationConfig, DEFAULT_FAILED_FILE, DEFAULT_LENGTH_COLUMN,
    DEFAULT_PERCENT_COLUMN, DEFAULT_TAXON_COLUMN,
};
use blast2taxonomy_rs::error::Blast2TaxError;
use blast2taxonomy_rs::types::DEFAULT_RANKS;
use blast2taxonomy_rs::{annotate_blast_results, RunOptions};

/// Extract a consensus taxonomy for every query of a tabular BLAST result.
#[derive(Parser, Debug)]
#[command(name = "blast2taxonomy-rs", version, about)]
struct Cli {
    /// Tabular BLAST results input file (plain or .gz)
    #[arg(short = 'i', long = "ifile")]
    input: PathBuf,

    /// Output file
    #[arg(short = 'o', long = "ofile")]
    output: PathBuf,

    /// Comma separated list of taxonomic ranks to extract
    #[arg(short = 'r', long, default_value_t = DEFAULT_RANKS.join(","))]
    ranks: String,

    /// Column number containing the staxids
    #[arg(short = 'c', long, default_value_t = DEFAULT_TAXON_COLUMN)]
    tax_column: usize,

    /// Column number containing the percent identity
    #[arg(short = 'p', long, default_value_t = DEFAULT_PERCENT_COLUMN)]
    perc_column: usize,

    /// Column number containing the length of the subject
    #[arg(short = 'l', long, default_value_t = DEFAULT_LENGTH_COLUMN)]
    len_column: usize,

    /// Number of threads
    #[arg(short = 't', long, default_value_t = 1)]
    threads: usize,

    /// Skip taxonomy database update
    #[arg(short = 's', long)]
    skip_update: bool,

    /// Skip failed taxids and write those rows to the failure file
    #[arg(short = 'f', long)]
    skip_failed: bool,

    /// Failure file for rows diverted by '-f'
    #[arg(long, default_value = DEFAULT_FAILED_FILE)]
    failed_file: PathBuf,

    /// NCBI taxdump directory (nodes.dmp, names.dmp) or krakenuniq taxDB file
    #[arg(short = 'd', long, env = "BLAST2TAX_DB", default_value = "taxdump")]
    taxdb: PathBuf,
}

fn spinner(color: &str, msg: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template(&format!("{{spinner:.{color}}} {{msg}}"))
            .expect("Invalid spinner template"),
    );
    spinner.set_message(msg);
    spinner
}

fn exit_code(err: &Blast2TaxError) -> i32 {
    match err {
        Blast2TaxError::Configuration(_) => 2,
        Blast2TaxError::Io(_) => 3,
        Blast2TaxError::UnknownTaxon { .. } => 4,
        Blast2TaxError::Taxonomy(_) | Blast2TaxError::Refresh(_) => 5,
        Blast2TaxError::WorkerCoordination(_) => 6,
    }
}

fn run(cli: Cli) -> Result<(), Blast2TaxError> {
    if cli.output.as_os_str().is_empty() {
        return Err(Blast2TaxError::Configuration(
            "output path must not be empty".to_string(),
        ));
    }

    let options = RunOptions {
        input: cli.input,
        taxdb: cli.taxdb,
        failed_file: cli.failed_file,
        skip_refresh: cli.skip_update,
        config: AnnotationConfig {
            ranks: parse_rank_list(&cli.ranks),
            taxon_column: cli.tax_column,
            percent_column: cli.perc_column,
            length_column: cli.len_column,
            workers: cli.threads,
            divert_failures: cli.skip_failed,
            refresh_skipped: cli.skip_update,
        },
    };

    let bar = spinner("green", "Resolving taxonomy...");
    let results = annotate_blast_results(&options);
    bar.finish_and_clear();
    let results = results?;
    log::info!(
        "Annotated {} row(s), diverted {}",
        results.annotated.len(),
        results.failures.len()
    );

    let bar = spinner("yellow", "Writing output file...");
    log::info!("Writing Taxonomy Information to: {}", cli.output.display());
    results.write_table(&cli.output)?;
    bar.finish_with_message("Output file created.");

    log::info!("Done");
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        log::error!("{}", e);
        process::exit(exit_code(&e));
    }
}
