use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use pprl_link::config::{
    candidate_links_path, compared_links_path, matched_links_path, ArtifactPaths, Config,
};
use pprl_link::error::Result;
use pprl_link::{blocker, bloom, hierarchy, io, matcher, mondrian};

/// Two mutually distrusting data holders link their records without either
/// side ever seeing the other's raw identifiers: anonymize, block on the
/// anonymized quasi-identifiers, encode candidate identifiers into Bloom
/// filters, then compare and classify.
#[derive(Parser, Debug)]
#[command(name = "pprl-link", version, about = "Privacy-preserving record linkage")]
struct Cli {
    /// Path to a TOML config file (falls back to built-in defaults).
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Quiet mode: suppresses stage progress messages on stdout.
    #[arg(short = 'q', long = "quiet", global = true, default_value_t = false)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Anonymize a holder's dataset and write the full and QI-only tables.
    Anonymize {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        holder: String,
    },
    /// Derive candidate pairs from two holders' anonymized QI-only tables.
    Block {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        holder_a: String,
        #[arg(long)]
        holder_b: String,
        #[arg(long)]
        hierarchy_dir: PathBuf,
    },
    /// Bloom-encode one holder's identifier fields for its candidate rows only.
    Encode {
        #[arg(long)]
        original: PathBuf,
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        holder: String,
    },
    /// Compute the Dice-coefficient vector for every candidate pair.
    Compare {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        holder_a: String,
        #[arg(long)]
        holder_b: String,
    },
    /// Filter compared links down to matches at the configured threshold.
    Classify {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Run anonymize, block, encode, compare, and classify end to end.
    Run {
        #[arg(long)]
        input_a: PathBuf,
        #[arg(long)]
        input_b: PathBuf,
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        hierarchy_dir: PathBuf,
        #[arg(long, default_value = "A")]
        holder_a: String,
        #[arg(long, default_value = "B")]
        holder_b: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let cfg = match load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Anonymize { input, data_dir, holder } => run_anonymize(&cfg, &input, &data_dir, &holder, cli.quiet),
        Command::Block { data_dir, holder_a, holder_b, hierarchy_dir } => {
            run_block(&cfg, &data_dir, &holder_a, &holder_b, &hierarchy_dir, cli.quiet)
        }
        Command::Encode { original, data_dir, holder } => run_encode(&cfg, &original, &data_dir, &holder, cli.quiet),
        Command::Compare { data_dir, holder_a, holder_b } => {
            run_compare(&cfg, &data_dir, &holder_a, &holder_b, cli.quiet)
        }
        Command::Classify { data_dir, threshold } => run_classify(&cfg, &data_dir, threshold, cli.quiet),
        Command::Run { input_a, input_b, data_dir, hierarchy_dir, holder_a, holder_b } => {
            run_pipeline(&cfg, &input_a, &input_b, &data_dir, &hierarchy_dir, &holder_a, &holder_b, cli.quiet)
        }
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(2);
    }
}

fn load_config(path: &Option<PathBuf>) -> Result<Config> {
    let cfg = match path {
        Some(p) => Config::from_toml_file(p)?,
        None => Config::default(),
    };
    if !cfg.quasi_identifiers.is_empty() {
        cfg.validate()?;
    }
    Ok(cfg)
}

fn log_if(show: bool, msg: impl AsRef<str>) {
    if show {
        println!("{}", msg.as_ref());
    }
}

fn run_anonymize(cfg: &Config, input: &PathBuf, data_dir: &PathBuf, holder: &str, quiet: bool) -> Result<()> {
    let paths = ArtifactPaths::derive(data_dir, holder, cfg.k);

    let t0 = Instant::now();
    let anonymized = mondrian::anonymize_dataset(input, &cfg.quasi_identifiers, cfg.k)?;
    log_if(!quiet, format!("{holder}: anonymized {} rows in {:.3}s", anonymized.len(), t0.elapsed().as_secs_f64()));

    let mut full_columns: Vec<String> = cfg.quasi_identifiers.clone();
    full_columns.extend(cfg.sensitive_attributes.iter().cloned());
    full_columns.extend(cfg.identifiers.iter().cloned());
    io::write_rows(&paths.anonymized_data, &full_columns, &anonymized)?;

    let projected = mondrian::project_quasi_identifiers(&anonymized, &cfg.quasi_identifiers);
    io::write_rows(&paths.anonymized_data_no_sa_ident, &cfg.quasi_identifiers, &projected)?;
    log_if(!quiet, format!("{holder}: wrote {:?}", paths.anonymized_data_no_sa_ident));
    Ok(())
}

fn run_block(
    cfg: &Config,
    data_dir: &PathBuf,
    holder_a: &str,
    holder_b: &str,
    hierarchy_dir: &PathBuf,
    quiet: bool,
) -> Result<()> {
    let paths_a = ArtifactPaths::derive(data_dir, holder_a, cfg.k);
    let paths_b = ArtifactPaths::derive(data_dir, holder_b, cfg.k);

    let t0 = Instant::now();
    let rows_a = io::read_rows(&paths_a.anonymized_data_no_sa_ident)?;
    let rows_b = io::read_rows(&paths_b.anonymized_data_no_sa_ident)?;
    let partitions_a = blocker::partition_by_qi(&rows_a, &cfg.quasi_identifiers);
    let partitions_b = blocker::partition_by_qi(&rows_b, &cfg.quasi_identifiers);
    let trees = hierarchy::load_hierarchies(hierarchy_dir)?;

    let result = blocker::find_candidate_links(&partitions_a, &partitions_b, &cfg.quasi_identifiers, &trees)?;
    log_if(
        !quiet,
        format!(
            "blocked {} candidate pairs from {} x {} partitions in {:.3}s",
            result.candidate_pairs.len(),
            partitions_a.len(),
            partitions_b.len(),
            t0.elapsed().as_secs_f64()
        ),
    );

    io::write_pairs(&candidate_links_path(data_dir), &result.candidate_pairs)?;
    io::write_index_list(&paths_a.candidate_records_index, &result.candidate_indices_a)?;
    io::write_index_list(&paths_b.candidate_records_index, &result.candidate_indices_b)?;
    Ok(())
}

fn run_encode(cfg: &Config, original: &PathBuf, data_dir: &PathBuf, holder: &str, quiet: bool) -> Result<()> {
    let paths = ArtifactPaths::derive(data_dir, holder, cfg.k);
    let candidates: HashSet<String> = io::read_index_list(&paths.candidate_records_index)?.into_iter().collect();

    let t0 = Instant::now();
    let rows = io::read_rows(original)?;
    let mut encoded = std::collections::HashMap::new();
    for row in rows.into_iter().filter(|r| r.get("index").map(|i| candidates.contains(i)).unwrap_or(false)) {
        let index = row.get("index").cloned().unwrap_or_default();
        let fields = bloom::encode_record_fields(
            row.get("given_name").map(String::as_str),
            row.get("surname").map(String::as_str),
            row.get("street_number").map(String::as_str),
            row.get("address_1").map(String::as_str),
            row.get("address_2").map(String::as_str),
            row.get("suburb").map(String::as_str),
            row.get("postcode").map(String::as_str),
            row.get("state").map(String::as_str),
            cfg,
        );
        encoded.insert(index, fields.into_iter().collect());
    }
    log_if(!quiet, format!("{holder}: encoded {} candidate records in {:.3}s", encoded.len(), t0.elapsed().as_secs_f64()));
    io::write_encoded_records(&paths.encoded_identifiers, &encoded)?;
    Ok(())
}

fn run_compare(cfg: &Config, data_dir: &PathBuf, holder_a: &str, holder_b: &str, quiet: bool) -> Result<()> {
    let paths_a = ArtifactPaths::derive(data_dir, holder_a, cfg.k);
    let paths_b = ArtifactPaths::derive(data_dir, holder_b, cfg.k);

    let encoded_a = io::read_encoded_records(&paths_a.encoded_identifiers)?;
    let encoded_b = io::read_encoded_records(&paths_b.encoded_identifiers)?;
    let pairs = io::read_pairs(&candidate_links_path(data_dir))?;

    let t0 = Instant::now();
    let compared = matcher::compare_links(&pairs, &encoded_a, &encoded_b)?;
    log_if(!quiet, format!("compared {} candidate pairs in {:.3}s", compared.len(), t0.elapsed().as_secs_f64()));

    io::write_compared_links(&compared_links_path(data_dir), &compared)
}

fn run_classify(cfg: &Config, data_dir: &PathBuf, threshold: Option<f64>, quiet: bool) -> Result<()> {
    let threshold = threshold.unwrap_or(cfg.threshold);
    let compared = io::read_compared_links(&compared_links_path(data_dir))?;

    let t0 = Instant::now();
    let matched = matcher::classify(&compared, threshold);
    log_if(
        !quiet,
        format!("classified {} matches out of {} compared pairs at threshold {threshold} in {:.3}s",
            matched.len(), compared.len(), t0.elapsed().as_secs_f64()),
    );

    io::write_pairs(&matched_links_path(data_dir), &matched)
}

#[allow(clippy::too_many_arguments)]
fn run_pipeline(
    cfg: &Config,
    input_a: &PathBuf,
    input_b: &PathBuf,
    data_dir: &PathBuf,
    hierarchy_dir: &PathBuf,
    holder_a: &str,
    holder_b: &str,
    quiet: bool,
) -> Result<()> {
    run_anonymize(cfg, input_a, data_dir, holder_a, quiet)?;
    run_anonymize(cfg, input_b, data_dir, holder_b, quiet)?;
    run_block(cfg, data_dir, holder_a, holder_b, hierarchy_dir, quiet)?;
    run_encode(cfg, input_a, data_dir, holder_a, quiet)?;
    run_encode(cfg, input_b, data_dir, holder_b, quiet)?;
    run_compare(cfg, data_dir, holder_a, holder_b, quiet)?;
    run_classify(cfg, data_dir, None, quiet)?;
    log_if(!quiet, format!("done: matched links written to {:?}", matched_links_path(data_dir)));
    Ok(())
}
