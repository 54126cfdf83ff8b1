//! Loads fixture directories into an in-memory store and prints the records.
//!
//! Run with:
//! ```
//! cargo run -p fixture-loader --bin load-fixtures -- fixtures/blog --schema fixtures/blog_schema.yml
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use fixture_loader::config::DEFAULT_SEED;
use fixture_loader::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "load-fixtures", about = "Render fixture templates and create their records")]
struct Args {
    /// Directories containing fixture templates.
    #[arg(required = true)]
    dirs: Vec<PathBuf>,

    /// YAML file mapping class -> reference field -> target class.
    #[arg(long, env = "FIXTURES_SCHEMA")]
    schema: Option<PathBuf>,

    /// Seed for synthetic data and random references.
    #[arg(long, env = "FIXTURES_SEED", default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Fail when a record is declared more than once.
    #[arg(long)]
    strict: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let schema = match &args.schema {
        Some(path) => Schema::from_yaml_file(path)
            .with_context(|| format!("reading schema {}", path.display()))?,
        None => Schema::new(),
    };

    let config = LoaderConfig::new(args.dirs)
        .with_seed(args.seed)
        .with_strict_duplicates(args.strict);
    let mut loader = FixturesLoader::new(MemoryFactory::new(schema), config);

    let mut created_count = 0usize;
    let mut progress = |_: &Reference, _: &MemoryRecord, created: bool| {
        if created {
            created_count += 1;
        }
    };
    let instances = loader.create_all(Some(&mut progress))?;

    tracing::info!("Load completed!");
    tracing::info!("  Records: {}", instances.len());
    tracing::info!("  Created: {}", created_count);

    let records: Vec<&MemoryRecord> = loader.factory().records().collect();
    println!("{}", serde_json::to_string_pretty(&records)?);

    Ok(())
}
