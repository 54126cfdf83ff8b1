//! Error types for fixture loading.

use std::path::PathBuf;

use thiserror::Error;

use crate::identifier::Reference;

/// Errors surfaced by a fixture-loading session.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template error in {template}: {}", render_chain(source))]
    Template {
        template: String,
        #[source]
        source: tera::Error,
    },

    #[error("YAML error in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid identifiers: {0}")]
    InvalidIdentifiers(String),

    #[error("Factory error: {0}")]
    Factory(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl FixtureError {
    pub(crate) fn factory(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Factory(Box::new(err))
    }

    /// Returns the configuration error, if this is one.
    pub fn as_config(&self) -> Option<&ConfigError> {
        match self {
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

/// Mistakes in the fixture files or the declared relationships.
///
/// These are never transient: the fixtures have to be fixed before rerunning.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot map `{value}` in reference field `{class_name}.{field}` to a class: {reason}")]
    UnresolvableReference {
        class_name: String,
        field: String,
        value: String,
        reason: String,
    },

    #[error("`{from}` field `{field}` references unknown class `{class_name}`")]
    UnknownClass {
        from: Reference,
        field: String,
        class_name: String,
    },

    #[error("`{from}` field `{field}` references unknown key `{target}`")]
    UnknownKey {
        from: Reference,
        field: String,
        target: Reference,
    },

    #[error("Circular dependency detected between models: {}", format_edges(edges))]
    CircularDependency { edges: Vec<(String, String)> },

    #[error("class `{class_name}` is declared more than once in {}", path.display())]
    DuplicateClass { path: PathBuf, class_name: String },

    #[error("`{reference}` is declared again in {}", path.display())]
    DuplicateKey { path: PathBuf, reference: Reference },
}

/// Result type alias for fixture operations.
pub type FixtureResult<T> = Result<T, FixtureError>;

fn format_edges(edges: &[(String, String)]) -> String {
    edges
        .iter()
        .map(|(a, b)| format!("{a} -> {b}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Tera hides the useful message in the source chain.
fn render_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    message
}
