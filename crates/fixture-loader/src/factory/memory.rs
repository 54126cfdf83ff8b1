//! In-memory factory.

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{Factory, Relationships};
use crate::identifier::{FieldValue, RawRecordData, Reference};
use crate::loader::InstanceCache;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("`{from}` field `{field}` points at `{target}`, which has not been created")]
    Unresolved {
        from: Reference,
        field: String,
        target: Reference,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Schema error: {0}")]
    Schema(#[from] serde_yaml::Error),
}

/// Reference fields per class, each with an optional target class.
///
/// Reads from YAML as `class: { field: target_class }`; a null target marks
/// a field whose values name their class explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    classes: IndexMap<String, IndexMap<String, Option<String>>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Declares `class_name.field` as a reference to `target_class`.
    pub fn relationship(
        mut self,
        class_name: impl Into<String>,
        field: impl Into<String>,
        target_class: impl Into<String>,
    ) -> Self {
        self.classes
            .entry(class_name.into())
            .or_default()
            .insert(field.into(), Some(target_class.into()));
        self
    }

    pub fn relationships(&self, class_name: &str) -> Relationships {
        self.classes
            .get(class_name)
            .map(|fields| fields.clone().into_iter().collect())
            .unwrap_or_default()
    }
}

/// A record held by [`MemoryFactory`].
///
/// Reference fields are stored as the ids of the records they point to: a
/// number for to-one, a list for to-many, null when empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryRecord {
    pub id: u64,
    pub reference: Reference,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Stores records in memory, keyed by [`Reference`].
///
/// Writes are staged until [`Factory::commit`]; committed records are what
/// [`MemoryFactory::records`] returns.
#[derive(Debug, Default)]
pub struct MemoryFactory {
    schema: Schema,
    staged: IndexMap<Reference, MemoryRecord>,
    committed: IndexMap<Reference, MemoryRecord>,
    next_id: u64,
    calls: HashMap<Reference, usize>,
}

impl MemoryFactory {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            next_id: 1,
            ..Self::default()
        }
    }

    /// Committed records in creation order.
    pub fn records(&self) -> impl Iterator<Item = &MemoryRecord> {
        self.committed.values()
    }

    pub fn record(&self, reference: &Reference) -> Option<&MemoryRecord> {
        self.committed
            .get(reference)
            .or_else(|| self.staged.get(reference))
    }

    /// Records written but not committed yet.
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// How many times `create_or_update` ran for `reference`.
    pub fn call_count(&self, reference: &Reference) -> usize {
        self.calls.get(reference).copied().unwrap_or(0)
    }

    fn resolve(
        identifier: &Reference,
        field: &str,
        value: &FieldValue,
        instances: &InstanceCache<MemoryRecord>,
    ) -> Result<serde_json::Value, MemoryError> {
        let unresolved = |target: &Reference| MemoryError::Unresolved {
            from: identifier.clone(),
            field: field.to_string(),
            target: target.clone(),
        };

        Ok(match value {
            FieldValue::Literal(value) => value.clone(),
            FieldValue::Reference(None) => serde_json::Value::Null,
            FieldValue::Reference(Some(target)) => instances
                .get(target)
                .map(|record| serde_json::Value::from(record.id))
                .ok_or_else(|| unresolved(target))?,
            FieldValue::References(targets) => serde_json::Value::Array(
                instances
                    .get_all(targets)
                    .map_err(unresolved)?
                    .into_iter()
                    .map(|record| serde_json::Value::from(record.id))
                    .collect(),
            ),
        })
    }
}

impl Factory for MemoryFactory {
    type Instance = MemoryRecord;
    type Error = MemoryError;

    fn get_relationships(&self, class_name: &str) -> Relationships {
        self.schema.relationships(class_name)
    }

    fn create_or_update(
        &mut self,
        identifier: &Reference,
        data: &RawRecordData,
        instances: &InstanceCache<MemoryRecord>,
    ) -> Result<(MemoryRecord, bool), MemoryError> {
        *self.calls.entry(identifier.clone()).or_default() += 1;

        let mut fields = serde_json::Map::with_capacity(data.len());
        for (field, value) in data {
            fields.insert(field.clone(), Self::resolve(identifier, field, value, instances)?);
        }

        let existing = self
            .staged
            .get(identifier)
            .or_else(|| self.committed.get(identifier))
            .map(|record| record.id);
        let (id, created) = match existing {
            Some(id) => (id, false),
            None => {
                let id = self.next_id;
                self.next_id += 1;
                (id, true)
            }
        };

        let record = MemoryRecord {
            id,
            reference: identifier.clone(),
            fields,
        };
        debug!("{} {identifier} as #{id}", if created { "Created" } else { "Updated" });
        self.staged.insert(identifier.clone(), record.clone());
        Ok((record, created))
    }

    fn commit(&mut self) -> Result<(), MemoryError> {
        debug!("Committing {} staged records", self.staged.len());
        for (reference, record) in self.staged.drain(..) {
            self.committed.insert(reference, record);
        }
        Ok(())
    }
}
