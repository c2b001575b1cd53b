//main.rs
use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use game_cluster::features::extract_features;
use game_cluster::{
    normalize, ClusteringPipeline, DataSet, FeatureList, Init, KMeans, Pca, PipelineConfig,
    PipelineOutput, ScalingTable, GAME_FEATURES,
};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Copy, ValueEnum)]
enum InitArg {
    Uniform,
    KmeansPlusPlus,
}

impl From<InitArg> for Init {
    fn from(arg: InitArg) -> Self {
        match arg {
            InitArg::Uniform => Init::Uniform,
            InitArg::KmeansPlusPlus => Init::KMeansPlusPlus,
        }
    }
}

/// Pipeline output plus the table needed to map features back to raw units
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    result: &'a PipelineOutput,
    scaling_params: &'a ScalingTable,
}

#[derive(Parser)]
#[clap(
    version,
    about = "Cluster games by their features and project them onto two principal components"
)]
struct Opts {
    /// Delimited game records with a header row
    #[clap(short, long)]
    file: String,

    /// Field delimiter
    #[clap(short, long, default_value_t = '\t')]
    delimiter: char,

    /// Comma-separated feature columns, in order
    #[clap(long, value_delimiter = ',', default_values_t = GAME_FEATURES.map(String::from))]
    features: Vec<String>,

    /// Cluster count; chosen by the elbow method when omitted
    #[clap(short, long)]
    k: Option<usize>,

    /// Largest cluster count tried by the elbow method
    #[clap(long, default_value_t = 10)]
    max_k: usize,

    /// Principal components to keep
    #[clap(long, default_value_t = 2)]
    components: usize,

    #[clap(long, default_value_t = 100)]
    max_iter: usize,

    #[clap(long, default_value_t = 1e-4)]
    tol: f64,

    #[clap(long, value_enum, default_value_t = InitArg::Uniform)]
    init: InitArg,

    /// Seed for reproducible runs
    #[clap(long)]
    seed: Option<u64>,

    /// JSON output file
    #[clap(short, long)]
    outfile: String,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    let filter = match opts.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    if !opts.delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character");
    }
    let features = FeatureList::new(opts.features.clone()).context("invalid feature list")?;

    let ds = DataSet::from_path(&opts.file, opts.delimiter as u8)
        .with_context(|| format!("failed to read {}", opts.file))?;
    println!(
        "Loaded {} rows × {} columns",
        ds.records.len(),
        ds.headers.len()
    );

    let extracted: Vec<_> = ds
        .records
        .iter()
        .map(|r| extract_features(r, &features))
        .collect();
    let normalized = normalize(&extracted, &features).context("normalization failed")?;

    let config = PipelineConfig::new(features)
        .with_k(opts.k)
        .with_max_k(opts.max_k)
        .with_kmeans(
            KMeans::default()
                .with_max_iter(opts.max_iter)
                .with_tol(opts.tol)
                .with_init(opts.init.into()),
        )
        .with_pca(Pca::new(opts.components))
        .with_seed(opts.seed);

    let output = ClusteringPipeline::new(config)
        .run(&normalized.normalized_data)
        .context("clustering failed")?;
    println!(
        "Assigned {} points into {} clusters ({} iterations, inertia {:.4})",
        output.pca.data.len(),
        output.clustering.k,
        output.clustering.iterations,
        output.clustering.inertia
    );

    let report = Report {
        result: &output,
        scaling_params: &normalized.scaling_params,
    };
    let text = serde_json::to_string_pretty(&report)?;
    std::fs::write(&opts.outfile, text)
        .with_context(|| format!("failed to write {}", opts.outfile))?;

    Ok(())
}
