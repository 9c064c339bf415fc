use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use qeval::batch::{self, RunOptions};
use qeval::config::Params;
use qeval::index::IndexReader;
use qeval::index::stats::show_stats;
use qeval::output::print_rows;
use qeval::query::{Bm25Params, IndriParams, QueryExecutor, RetrievalModel, optimize};
use qeval::utils::Analyzer;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qeval")]
#[command(about = "Structured query evaluation with Boolean, BM25 and Indri ranking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every query of a parameter file and write the ranking file
    Run {
        /// Parameter file (key=value lines)
        params: PathBuf,

        /// Also print the ranking rows
        #[arg(short, long)]
        print: bool,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// Evaluate a single query
    Search {
        /// Query text
        #[arg(required = true, trailing_var_arg = true)]
        query: Vec<String>,

        /// Index file or directory
        #[arg(short, long)]
        index: PathBuf,

        /// Number of rows to print
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,

        #[command(flatten)]
        model: ModelArgs,
    },
    /// Print the parsed and optimized operator tree of a query
    Explain {
        /// Query text
        #[arg(required = true, trailing_var_arg = true)]
        query: Vec<String>,

        /// Index whose stopwords apply (English stopwords otherwise)
        #[arg(short, long)]
        index: Option<PathBuf>,

        #[command(flatten)]
        model: ModelArgs,
    },
    /// Show index statistics
    Stats {
        /// Index file or directory
        #[arg(short, long)]
        index: PathBuf,
    },
}

#[derive(Args)]
struct ModelArgs {
    /// Retrieval model: unrankedboolean, rankedboolean, bm25 or indri
    #[arg(short, long, default_value = "indri")]
    model: String,

    /// BM25 k_1
    #[arg(long, default_value_t = 1.2)]
    k1: f64,

    /// BM25 b
    #[arg(long, default_value_t = 0.75)]
    b: f64,

    /// BM25 k_3
    #[arg(long, default_value_t = 0.0)]
    k3: f64,

    /// Indri lambda
    #[arg(long, default_value_t = 0.4)]
    lambda: f64,

    /// Indri mu
    #[arg(long, default_value_t = 2500.0)]
    mu: f64,
}

impl ModelArgs {
    fn build(&self) -> qeval::Result<RetrievalModel> {
        RetrievalModel::from_name(
            &self.model,
            Bm25Params {
                k1: self.k1,
                b: self.b,
                k3: self.k3,
            },
            IndriParams {
                lambda: self.lambda,
                mu: self.mu,
            },
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let color = !cli.no_color;

    match cli.command {
        Commands::Run {
            params,
            print,
            no_progress,
        } => {
            let params = Params::load(&params)
                .with_context(|| format!("Failed to load parameters from {}", params.display()))?;
            let options = RunOptions {
                print,
                color,
                progress: !no_progress,
            };
            batch::run(&params, options)?;
        }
        Commands::Search {
            query,
            index,
            limit,
            model,
        } => {
            let model = model.build()?;
            let reader = IndexReader::open(&index)
                .with_context(|| format!("Failed to open index {}", index.display()))?;
            let analyzer = reader.analyzer();
            let executor = QueryExecutor::new(&reader, &model, &analyzer);

            let rows = batch::search(&executor, &reader, &query.join(" "), limit)?;
            print_rows(&rows, color)?;
        }
        Commands::Explain {
            query,
            index,
            model,
        } => {
            let model = model.build()?;
            let analyzer = match index {
                Some(path) => IndexReader::open(&path)
                    .with_context(|| format!("Failed to open index {}", path.display()))?
                    .analyzer(),
                None => Analyzer::english(),
            };

            let tree = qeval::query::parse_query(&query.join(" "), &model, &analyzer)?;
            println!("parsed:    {}", tree);
            match optimize(tree) {
                Some(plan) => println!("optimized: {}", plan),
                None => println!("optimized: (matches nothing)"),
            }
        }
        Commands::Stats { index } => {
            show_stats(&index)?;
        }
    }

    Ok(())
}
