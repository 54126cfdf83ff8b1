//! Fixture file discovery and parsing of rendered documents.

use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use tracing::{debug, warn};

use crate::config::LoaderConfig;
use crate::error::{ConfigError, FixtureError, FixtureResult};
use crate::template::DeclaredKeys;

/// Field name to value, straight out of the rendered document.
pub type RecordFields = IndexMap<String, serde_json::Value>;

/// How a file's top-level mapping is keyed, decided once from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureLayout {
    /// `{ key: { field: value } }`, class taken from the file stem.
    SingleClass { class_name: String },
    /// `{ class_name: { key: { field: value } } }`, reserved file names only.
    MultiClass,
}

/// A discovered fixture template and its raw text, read once.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    pub path: PathBuf,
    pub layout: FixtureLayout,
    pub text: String,
}

impl FixtureSource {
    /// Name the template is registered under.
    pub fn template_name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Records of one class as declared in one file, duplicates included.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFixtures {
    pub class_name: String,
    pub records: Vec<(String, RecordFields)>,
}

/// Finds fixture templates in each directory, in file-name order.
///
/// Directories are not searched recursively. Files whose extension is not a
/// configured template extension are ignored.
pub fn discover(config: &LoaderConfig) -> FixtureResult<Vec<FixtureSource>> {
    let mut sources = Vec::new();

    for dir in &config.fixture_dirs {
        let mut paths = std::fs::read_dir(dir)
            .map_err(|source| FixtureError::Io {
                path: dir.clone(),
                source,
            })?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| FixtureError::Io {
                path: dir.clone(),
                source,
            })?;
        paths.sort();

        for path in paths {
            if !path.is_file() || !config.is_fixture_file(&path) {
                continue;
            }
            let Some(layout) = classify(&path, config) else {
                warn!("Skipping fixture file with non UTF-8 name: {}", path.display());
                continue;
            };

            let text = std::fs::read_to_string(&path).map_err(|source| FixtureError::Io {
                path: path.clone(),
                source,
            })?;
            debug!("Discovered {} ({:?})", path.display(), layout);
            sources.push(FixtureSource { path, layout, text });
        }
    }

    Ok(sources)
}

/// Decides the layout of a fixture file from its name.
pub fn classify(path: &Path, config: &LoaderConfig) -> Option<FixtureLayout> {
    let file_name = path.file_name()?.to_str()?;
    if config.is_multi_class(file_name) {
        return Some(FixtureLayout::MultiClass);
    }
    let class_name = path.file_stem()?.to_str()?;
    Some(FixtureLayout::SingleClass {
        class_name: class_name.to_string(),
    })
}

/// Parses a rendered document into per-class records.
///
/// An empty document (blank, comments only) yields nothing. A class declared
/// twice in a multi-class file is a configuration error.
pub fn parse_document(
    path: &Path,
    layout: &FixtureLayout,
    rendered: &str,
) -> FixtureResult<Vec<ClassFixtures>> {
    if is_blank_document(rendered) {
        return Ok(Vec::new());
    }
    let yaml_error = |source| FixtureError::Yaml {
        path: path.to_path_buf(),
        source,
    };

    match layout {
        FixtureLayout::SingleClass { class_name } => {
            let records: Option<Entries<Option<RecordFields>>> =
                serde_yaml::from_str(rendered).map_err(yaml_error)?;
            Ok(records
                .map(|records| {
                    vec![ClassFixtures {
                        class_name: class_name.clone(),
                        records: records.into_records(),
                    }]
                })
                .unwrap_or_default())
        }
        FixtureLayout::MultiClass => {
            let sections: Option<Entries<Option<Entries<Option<RecordFields>>>>> =
                serde_yaml::from_str(rendered).map_err(yaml_error)?;
            let Some(sections) = sections else {
                return Ok(Vec::new());
            };

            let mut classes: Vec<ClassFixtures> = Vec::with_capacity(sections.0.len());
            for (class_name, records) in sections.0 {
                if classes.iter().any(|c| c.class_name == class_name) {
                    return Err(ConfigError::DuplicateClass {
                        path: path.to_path_buf(),
                        class_name,
                    }
                    .into());
                }
                classes.push(ClassFixtures {
                    class_name,
                    records: records.map(Entries::into_records).unwrap_or_default(),
                });
            }
            Ok(classes)
        }
    }
}

/// Collects the declared keys of parsed documents into `keys`.
///
/// Keys keep the order of their first declaration; repeats are skipped.
pub fn collect_keys(keys: &mut DeclaredKeys, classes: &[ClassFixtures]) {
    for class in classes {
        let class_keys = keys.entry(class.class_name.clone()).or_default();
        for (key, _) in &class.records {
            if !class_keys.contains(key) {
                class_keys.push(key.clone());
            }
        }
    }
}

fn is_blank_document(rendered: &str) -> bool {
    rendered.lines().map(str::trim).all(|line| {
        line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
    })
}

/// A YAML mapping read as ordered entries, keeping duplicate keys.
struct Entries<V>(Vec<(String, V)>);

impl Entries<Option<RecordFields>> {
    fn into_records(self) -> Vec<(String, RecordFields)> {
        self.0
            .into_iter()
            .map(|(key, fields)| (key, fields.unwrap_or_default()))
            .collect()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Entries<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = Entries<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, V>()? {
                    entries.push(entry);
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}
