//! The fixture loading driver.
//!
//! [`FixturesLoader`] discovers fixture templates, renders them in two
//! passes, normalizes references, orders classes by dependency and drives a
//! [`Factory`] to create every record.

mod cache;
pub mod discovery;
mod graph;
pub mod normalize;

use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::error::{ConfigError, FixtureError, FixtureResult};
use crate::factory::Factory;
use crate::identifier::{FieldValue, Identifiers, Instances, RawRecordData, Reference};
use crate::template::{DeclaredKeys, TemplateContext};

pub use cache::InstanceCache;
pub use discovery::{ClassFixtures, FixtureLayout, FixtureSource, RecordFields};
pub use graph::DependencyGraph;

/// Called once per record during [`FixturesLoader::create_all`] with the
/// record's identifier, its instance and whether it was newly created.
pub type ProgressCallback<'a, I> = &'a mut dyn FnMut(&Reference, &I, bool);

/// Loads fixture templates and creates their records through a factory.
///
/// One loader drives one loading session. Templates are read, rendered and
/// normalized once, on first use; everything after that works from the
/// in-memory caches.
pub struct FixturesLoader<F: Factory> {
    factory: F,
    config: LoaderConfig,
    context: TemplateContext,
    sources: Vec<FixtureSource>,
    fixtures: IndexMap<String, IndexMap<String, RawRecordData>>,
    relationships: IndexMap<String, IndexSet<String>>,
    graph: Option<DependencyGraph>,
    cache: InstanceCache<F::Instance>,
    loaded: bool,
}

impl<F: Factory> FixturesLoader<F> {
    /// Creates a loader with a default template engine.
    pub fn new(factory: F, config: LoaderConfig) -> Self {
        let context = TemplateContext::new(&config);
        Self::with_context(factory, config, context)
    }

    /// Creates a loader rendering through a caller-configured engine.
    pub fn with_tera(factory: F, config: LoaderConfig, tera: tera::Tera) -> Self {
        let context = TemplateContext::with_tera(tera, &config);
        Self::with_context(factory, config, context)
    }

    fn with_context(factory: F, config: LoaderConfig, context: TemplateContext) -> Self {
        Self {
            factory,
            config,
            context,
            sources: Vec::new(),
            fixtures: IndexMap::new(),
            relationships: IndexMap::new(),
            graph: None,
            cache: InstanceCache::new(),
            loaded: false,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    pub fn into_factory(self) -> F {
        self.factory
    }

    /// Discovered templates with their raw text.
    pub fn sources(&self) -> &[FixtureSource] {
        &self.sources
    }

    /// Normalized data per class, then per key.
    pub fn fixtures(&self) -> &IndexMap<String, IndexMap<String, RawRecordData>> {
        &self.fixtures
    }

    /// Normalized data of one record.
    pub fn fixture(&self, reference: &Reference) -> Option<&RawRecordData> {
        self.fixtures
            .get(&reference.class_name)
            .and_then(|records| records.get(&reference.key))
    }

    /// Classes each class references, derived from the merged data.
    pub fn relationships(&self) -> &IndexMap<String, IndexSet<String>> {
        &self.relationships
    }

    /// Instances created so far.
    pub fn instances(&self) -> &InstanceCache<F::Instance> {
        &self.cache
    }

    /// Discovers, renders and normalizes every fixture file. Runs once.
    pub fn load(&mut self) -> FixtureResult<()> {
        if self.loaded {
            return Ok(());
        }

        let sources = discovery::discover(&self.config)?;
        info!("Discovered {} fixture files", sources.len());
        for source in &sources {
            self.context.add_template(&source.template_name(), &source.text)?;
        }

        let declared_keys = self.discover_keys(&sources)?;
        debug!(
            "Discovery pass found {} classes, {} keys",
            declared_keys.len(),
            declared_keys.values().map(Vec::len).sum::<usize>()
        );

        self.context.reseed();
        self.context.set_declared_keys(declared_keys);
        for source in &sources {
            let rendered = self.context.render(&source.template_name())?;
            let classes = discovery::parse_document(&source.path, &source.layout, &rendered)?;
            for class in classes {
                self.merge_class(&source.path, class)?;
            }
        }
        self.relationships = class_dependencies(&self.fixtures);
        info!(
            "Loaded {} records across {} classes",
            self.fixtures.values().map(IndexMap::len).sum::<usize>(),
            self.fixtures.len()
        );

        self.sources = sources;
        self.loaded = true;
        Ok(())
    }

    /// First pass: render with the reference pickers disabled and keep only
    /// the keys each class declares.
    fn discover_keys(&mut self, sources: &[FixtureSource]) -> FixtureResult<DeclaredKeys> {
        let stripped = self.context.discovery();
        stripped.reseed();

        let mut declared_keys = DeclaredKeys::new();
        for source in sources {
            let rendered = stripped.render(&source.template_name())?;
            let classes = discovery::parse_document(&source.path, &source.layout, &rendered)?;
            discovery::collect_keys(&mut declared_keys, &classes);
        }
        Ok(declared_keys)
    }

    /// Normalizes one class block and merges it, later declarations winning.
    fn merge_class(&mut self, path: &Path, class: ClassFixtures) -> FixtureResult<()> {
        let relationships = self.factory.get_relationships(&class.class_name);
        let normalized =
            normalize::normalize_records(&class.class_name, class.records, &relationships)?;

        let records = self.fixtures.entry(class.class_name.clone()).or_default();
        for (key, data) in normalized {
            if records.contains_key(&key) {
                let reference = Reference::new(class.class_name.as_str(), key.as_str());
                if self.config.strict_duplicates {
                    return Err(ConfigError::DuplicateKey {
                        path: path.to_path_buf(),
                        reference,
                    }
                    .into());
                }
                warn!(
                    "{reference} declared again in {}, the later declaration wins",
                    path.display()
                );
            }
            records.insert(key, data);
        }
        Ok(())
    }

    /// Checks that every reference points at a declared record.
    pub fn validate_references(&mut self) -> FixtureResult<()> {
        self.load()?;

        for (class_name, records) in &self.fixtures {
            for (key, data) in records {
                for (field, value) in data {
                    for target in value.references() {
                        let Some(targets) = self.fixtures.get(&target.class_name) else {
                            return Err(ConfigError::UnknownClass {
                                from: Reference::new(class_name.as_str(), key.as_str()),
                                field: field.clone(),
                                class_name: target.class_name.clone(),
                            }
                            .into());
                        };
                        if !targets.contains_key(&target.key) {
                            return Err(ConfigError::UnknownKey {
                                from: Reference::new(class_name.as_str(), key.as_str()),
                                field: field.clone(),
                                target: target.clone(),
                            }
                            .into());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// The class dependency graph, built once per session.
    pub fn dependency_graph(&mut self) -> FixtureResult<&DependencyGraph> {
        self.load()?;
        Ok(self
            .graph
            .get_or_insert_with(|| DependencyGraph::build(&self.relationships)))
    }

    /// Classes in the order their records are created.
    pub fn creation_order(&mut self) -> FixtureResult<Vec<String>> {
        Ok(self.dependency_graph()?.creation_order()?)
    }

    /// Creates or updates every fixture record, dependencies first.
    ///
    /// Reference and ordering problems are reported before the factory sees
    /// any record. Factory errors propagate as they happen; whatever was
    /// created before is left to the factory, as `commit` is only called
    /// after the last record.
    ///
    /// Returns instances keyed by record key. Keys are not namespaced by
    /// class, so a key reused across classes maps to the one created last.
    pub fn create_all(
        &mut self,
        mut progress: Option<ProgressCallback<'_, F::Instance>>,
    ) -> FixtureResult<IndexMap<String, F::Instance>> {
        self.validate_references()?;
        let creation_order = self.creation_order()?;
        info!("Creation order: {}", creation_order.join(", "));
        if let Some(graph) = &self.graph {
            for class_name in &creation_order {
                debug!(
                    "{class_name} depends on [{}]",
                    graph.dependencies(class_name).join(", ")
                );
            }
        }

        let mut created = IndexMap::new();
        for class_name in &creation_order {
            let Some(records) = self.fixtures.get(class_name) else {
                continue;
            };
            info!("Creating {} {} records...", records.len(), class_name);

            let mut new_count = 0;
            for (key, data) in records {
                let identifier = Reference::new(class_name.as_str(), key.as_str());
                let data = self
                    .factory
                    .maybe_convert_values(&identifier, data.clone())
                    .map_err(FixtureError::factory)?;

                let (instance, was_created) = self
                    .factory
                    .create_or_update(&identifier, &data, &self.cache)
                    .map_err(FixtureError::factory)?;
                if was_created {
                    new_count += 1;
                }
                if let Some(progress) = progress.as_mut() {
                    progress(&identifier, &instance, was_created);
                }

                self.cache.insert_data(identifier.clone(), data);
                self.cache.insert_instance(identifier, instance.clone());
                created.insert(key.clone(), instance);
            }
            debug!(
                "{class_name}: {new_count} created, {} updated",
                records.len() - new_count
            );
        }

        self.factory.commit().map_err(FixtureError::factory)?;
        info!("Committed {} records", self.cache.len());
        Ok(created)
    }

    /// Resolves identifiers to instances through the factory again.
    ///
    /// Uses the data cached by [`create_all`](Self::create_all), so the
    /// factory sees the same input as on creation and returns the existing
    /// record. An empty list, or an identifier that was never created, is
    /// rejected before the factory is called.
    pub fn convert_identifiers(
        &mut self,
        identifiers: impl Into<Identifiers>,
    ) -> FixtureResult<Instances<F::Instance>> {
        match identifiers.into() {
            Identifiers::One(reference) => self
                .recreate_all(std::slice::from_ref(&reference))?
                .into_iter()
                .next()
                .map(Instances::One)
                .ok_or_else(|| {
                    FixtureError::InvalidIdentifiers(format!("`{reference}` could not be resolved"))
                }),
            Identifiers::Many(references) if references.is_empty() => {
                Err(FixtureError::InvalidIdentifiers(
                    "expected a Reference or a non-empty list of References, got an empty list"
                        .to_string(),
                ))
            }
            Identifiers::Many(references) => {
                Ok(Instances::Many(self.recreate_all(&references)?))
            }
        }
    }

    /// Like [`convert_identifiers`](Self::convert_identifiers), for a
    /// normalized reference field.
    pub fn convert_field(&mut self, value: &FieldValue) -> FixtureResult<Instances<F::Instance>> {
        let identifiers = Identifiers::try_from(value)?;
        self.convert_identifiers(identifiers)
    }

    fn recreate_all(&mut self, references: &[Reference]) -> FixtureResult<Vec<F::Instance>> {
        if let Some(missing) = references.iter().find(|r| self.cache.data(r).is_none()) {
            return Err(FixtureError::InvalidIdentifiers(format!(
                "`{missing}` has not been created in this session"
            )));
        }

        let mut instances = Vec::with_capacity(references.len());
        for reference in references {
            let Some(data) = self.cache.data(reference).cloned() else {
                continue;
            };
            let (instance, _) = self
                .factory
                .create_or_update(reference, &data, &self.cache)
                .map_err(FixtureError::factory)?;
            self.cache.insert_instance(reference.clone(), instance.clone());
            instances.push(instance);
        }
        Ok(instances)
    }
}

/// Classes referenced by the records of each class.
///
/// Computed after merging, so overwritten declarations add no edges.
fn class_dependencies(
    fixtures: &IndexMap<String, IndexMap<String, RawRecordData>>,
) -> IndexMap<String, IndexSet<String>> {
    fixtures
        .iter()
        .map(|(class_name, records)| {
            let targets = records
                .values()
                .flat_map(|data| data.values())
                .flat_map(FieldValue::references)
                .map(|reference| reference.class_name.clone())
                .collect();
            (class_name.clone(), targets)
        })
        .collect()
}
