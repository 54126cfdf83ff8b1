//! Example: Load the blog fixtures into an in-memory store.
//!
//! This renders the templates under `fixtures/blog`:
//! - 5 users with fake names, emails and hashed passwords
//! - tags, and posts pointing at users and tags
//! - comments on random posts by random users
//!
//! Run with:
//! ```
//! cargo run --example load_blog
//! ```

use std::path::Path;

use fixture_loader::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    let schema = Schema::from_yaml_file(root.join("blog_schema.yml"))?;
    let config = LoaderConfig::new([root.join("blog")]).with_seed(54321);

    let mut loader = FixturesLoader::new(MemoryFactory::new(schema), config);
    tracing::info!("Creation order: {:?}", loader.creation_order()?);

    let instances = loader.create_all(None)?;
    tracing::info!("Loaded {} records", instances.len());

    // Show where each comment landed
    for record in loader.factory().records() {
        if record.reference.class_name != "comment" {
            continue;
        }
        tracing::info!(
            "  {} -> post #{}, author #{}",
            record.reference,
            record.fields["post"],
            record.fields["author"]
        );
    }

    // Resolving a reference again returns the same record
    let post = loader.convert_identifiers(Reference::new("post", "hello-world"))?;
    if let Some(post) = post.one() {
        tracing::info!("hello-world is record #{} ({})", post.id, post.fields["title"]);
    }

    Ok(())
}
