//! Configuration for a fixture-loading session.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File names whose content maps class names to fixtures instead of keys to fields.
pub const MULTI_CLASS_FILENAMES: [&str; 2] = ["fixtures.yml", "fixtures.yaml"];

/// Seed used when none is configured, so fixtures are reproducible by default.
pub const DEFAULT_SEED: u64 = 1234;

/// Configuration for a [`FixturesLoader`](crate::loader::FixturesLoader).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directories scanned (non-recursively) for fixture templates.
    pub fixture_dirs: Vec<PathBuf>,

    /// File extensions treated as fixture templates.
    pub extensions: Vec<String>,

    /// Reserved file names holding several classes.
    pub multi_class_filenames: Vec<String>,

    /// Seed for the synthetic-data provider and the random reference pickers.
    pub seed: u64,

    /// Reject a (class, key) declared more than once instead of overwriting it.
    pub strict_duplicates: bool,

    /// Lower bound on how many keys `random_models` picks without an explicit count.
    pub random_models_min: usize,

    /// Upper bound on how many keys `random_models` picks without an explicit count.
    pub random_models_max: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            fixture_dirs: Vec::new(),
            extensions: vec!["yml".to_string(), "yaml".to_string()],
            multi_class_filenames: MULTI_CLASS_FILENAMES.iter().map(|s| s.to_string()).collect(),
            seed: DEFAULT_SEED,
            strict_duplicates: false,
            random_models_min: 0,
            random_models_max: 3,
        }
    }
}

impl LoaderConfig {
    /// Creates a configuration scanning the given directories.
    pub fn new<P: Into<PathBuf>>(fixture_dirs: impl IntoIterator<Item = P>) -> Self {
        Self {
            fixture_dirs: fixture_dirs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enables or disables strict duplicate checking.
    pub fn with_strict_duplicates(mut self, strict: bool) -> Self {
        self.strict_duplicates = strict;
        self
    }

    /// Sets the default pick range for `random_models`.
    pub fn with_random_models_range(mut self, range: RangeInclusive<usize>) -> Self {
        self.random_models_min = *range.start();
        self.random_models_max = *range.end();
        self
    }

    /// Returns true when the path has one of the configured template extensions.
    pub fn is_fixture_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|known| known == ext))
    }

    /// Returns true when the file name is reserved for multi-class content.
    pub fn is_multi_class(&self, file_name: &str) -> bool {
        self.multi_class_filenames.iter().any(|name| name == file_name)
    }

    pub(crate) fn random_models_range(&self) -> RangeInclusive<usize> {
        let max = self.random_models_max.max(self.random_models_min);
        self.random_models_min..=max
    }
}
