//! tokenlens CLI
//!
//! Rare-token discovery, nearest-token search and token counting over a
//! Hugging Face `tokenizer.json` plus the embedding tensor of a
//! `.safetensors` weight file.
//!
//! # Commands
//!
//! - `rare`: typeable single tokens furthest from the common-token centroid
//! - `nearest`: tokens nearest to a text's mean sub-token embedding
//! - `count`: number of token ids for a text (special tokens included)

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use tokenlens::report::{write_nearest, write_rare};
use tokenlens::{
    EmbeddingSource, HfTokenizer, LensConfig, NearestTokenSearch, NormalizedMatrix,
    RareTokenFinder, SafetensorsEmbeddings, Tokenizer,
};

/// Embedding-space token analysis
#[derive(Parser)]
#[command(name = "tokenlens")]
#[command(version)]
#[command(about = "Find rare tokens and nearest tokens in a model's embedding space")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON file overriding analysis parameters
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ModelArgs {
    /// Path to tokenizer.json
    #[arg(long)]
    tokenizer: PathBuf,

    /// Path to a .safetensors file holding the input embeddings
    #[arg(long)]
    weights: PathBuf,

    /// Embedding tensor name (probes common names when omitted)
    #[arg(long)]
    tensor: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rare single-token candidates, most unusual first
    Rare {
        #[command(flatten)]
        model: ModelArgs,

        /// Number of tokens to return
        #[arg(short, default_value_t = 50)]
        n: usize,
    },
    /// Tokens nearest to TEXT in embedding space
    Nearest {
        /// Text to find nearest tokens for
        text: String,

        #[command(flatten)]
        model: ModelArgs,

        /// Number of nearest tokens to return
        #[arg(short, default_value_t = 20)]
        k: usize,
    },
    /// Count tokens in TEXT
    Count {
        /// Text to count tokens for
        text: String,

        /// Path to tokenizer.json
        #[arg(long)]
        tokenizer: PathBuf,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn load_config(path: Option<&PathBuf>) -> tokenlens::LensResult<LensConfig> {
    match path {
        Some(p) => LensConfig::from_json_file(p),
        None => Ok(LensConfig::default()),
    }
}

fn load_model(args: &ModelArgs) -> tokenlens::LensResult<(HfTokenizer, tokenlens::EmbeddingMatrix)> {
    let tokenizer = HfTokenizer::from_file(&args.tokenizer)?;
    let mut source = SafetensorsEmbeddings::new(&args.weights);
    if let Some(name) = &args.tensor {
        source = source.with_tensor(name);
    }
    let matrix = source.embeddings()?;
    tracing::info!(
        vocab = matrix.vocab_size(),
        dim = matrix.dim(),
        fingerprint = %matrix.fingerprint().short(),
        "embedding matrix ready"
    );
    Ok((tokenizer, matrix))
}

fn run(cli: Cli) -> CliResult {
    let config = load_config(cli.config.as_ref())?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Rare { model, n } => {
            let finder = RareTokenFinder::new(config.clone())?;
            let (tokenizer, matrix) = load_model(&model)?;
            let normalized = NormalizedMatrix::new(&matrix, config.norm_floor);
            let report = finder.run(&normalized, &tokenizer, n)?;
            if report.non_finite > 0 {
                tracing::warn!(count = report.non_finite, "non-finite similarities in rare-token run");
            }
            if cli.json {
                serde_json::to_writer_pretty(&mut out, &report)?;
                writeln!(out)?;
            } else {
                write_rare(&mut out, &report)?;
            }
        }
        Commands::Nearest { text, model, k } => {
            let search = NearestTokenSearch::new(config)?;
            let (tokenizer, matrix) = load_model(&model)?;
            let result = search.search(&matrix, &tokenizer, &text, k)?;
            if cli.json {
                serde_json::to_writer_pretty(&mut out, &result)?;
                writeln!(out)?;
            } else {
                write_nearest(&mut out, &result)?;
            }
        }
        Commands::Count { text, tokenizer } => {
            let tokenizer = HfTokenizer::from_file(&tokenizer)?;
            let ids = tokenizer.encode(&text, true)?;
            writeln!(out, "{}", ids.len())?;
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
