//! Astro Thesaurus index builder
//!
//! Embeds the concept definitions and catalog bodies and writes the JSON
//! document index the server loads at startup.

use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::{fmt, EnvFilter};

use astro_thesaurus::catalog::OrbitalCatalog;
use astro_thesaurus::index_builder::{build_index, DEFAULT_HASHING_DIMENSION};
use astro_thesaurus::retriever::{Embedder, HashingEmbedder, OllamaEmbedder, HASHING_MODEL};
use astro_thesaurus::Config;

struct Args {
    output: PathBuf,
    /// `hashing`, or an Ollama embedding model
    model: String,
    dimension: usize,
    catalog: Option<PathBuf>,
    ollama_url: String,
}

fn parse_args(config: &Config) -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        output: config.index_path.clone(),
        model: HASHING_MODEL.to_string(),
        dimension: DEFAULT_HASHING_DIMENSION,
        catalog: config.catalog_path.clone(),
        ollama_url: config.ollama_url.clone(),
    };

    let value = |i: usize, flag: &str| -> String {
        match args.get(i + 1) {
            Some(v) => v.clone(),
            None => {
                eprintln!("error: {} requires a value", flag);
                std::process::exit(1);
            }
        }
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--output" | "-o" => {
                parsed.output = PathBuf::from(value(i, "--output"));
                i += 2;
            }
            "--model" | "-m" => {
                parsed.model = value(i, "--model");
                i += 2;
            }
            "--dimension" | "-d" => {
                let raw = value(i, "--dimension");
                parsed.dimension = raw.parse().unwrap_or_else(|_| {
                    eprintln!("error: invalid dimension: {}", raw);
                    std::process::exit(1);
                });
                i += 2;
            }
            "--catalog" | "-c" => {
                parsed.catalog = Some(PathBuf::from(value(i, "--catalog")));
                i += 2;
            }
            "--ollama-url" => {
                parsed.ollama_url = value(i, "--ollama-url");
                i += 2;
            }
            "--help" | "-h" => {
                println!("astro-build-index - Build the retrieval index");
                println!();
                println!("USAGE:");
                println!("    astro-build-index [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -o, --output <FILE>        Index file [default: ASTRO_INDEX_PATH]");
                println!("    -m, --model <MODEL>        'hashing' or an Ollama embedding model [default: hashing]");
                println!("    -d, --dimension <N>        Hashing embedder dimension [default: 384]");
                println!("    -c, --catalog <FILE>       Catalog JSON merged over the built-in tables");
                println!("        --ollama-url <URL>     Ollama base URL [default: ASTRO_OLLAMA_URL]");
                println!("    -h, --help                 Print help information");
                std::process::exit(0);
            }
            arg => {
                eprintln!("error: unknown argument: {}", arg);
                std::process::exit(1);
            }
        }
    }

    parsed
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    let args = parse_args(&config);

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).compact().init();

    let catalog = match &args.catalog {
        Some(path) => OrbitalCatalog::load(path).with_context(|| format!("loading catalog {}", path.display()))?,
        None => OrbitalCatalog::builtin(),
    };

    let embedder: Box<dyn Embedder> = if args.model == HASHING_MODEL {
        Box::new(HashingEmbedder::new(args.dimension))
    } else {
        Box::new(OllamaEmbedder::new(&args.ollama_url, &args.model))
    };

    let index = build_index(embedder.as_ref(), &catalog)
        .await
        .context("embedding reference chunks")?;
    index
        .save(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    tracing::info!(
        documents = index.documents.len(),
        model = %index.model,
        dimension = index.dimension,
        output = %args.output.display(),
        "Index written"
    );
    Ok(())
}
