//! The persistence boundary.
//!
//! The loader never creates records itself. A [`Factory`] declares which
//! fields are references, gets a last chance to coerce values, and performs
//! the actual create-or-update. [`MemoryFactory`] is an in-memory
//! implementation used by the CLI and the tests.

mod memory;

use indexmap::IndexMap;

use crate::identifier::{RawRecordData, Reference};
use crate::loader::InstanceCache;

pub use memory::{MemoryError, MemoryFactory, MemoryRecord, Schema};

/// Reference fields of one class, each with the class it points to if known.
///
/// A field without a target only accepts explicit `class(key)` references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    fields: IndexMap<String, Option<String>>,
}

impl Relationships {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a reference field pointing at `target_class`.
    pub fn field(mut self, name: impl Into<String>, target_class: impl Into<String>) -> Self {
        self.fields.insert(name.into(), Some(target_class.into()));
        self
    }

    /// Declares a reference field whose values name their class explicitly.
    pub fn untyped_field(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), None);
        self
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Target class of `field`, if it is a typed reference field.
    pub fn target(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|target| target.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Option<String>)> for Relationships {
    fn from_iter<T: IntoIterator<Item = (String, Option<String>)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Creates records for the loader.
///
/// Calls arrive in creation order: by the time a record is passed to
/// [`Factory::create_or_update`], every record it references has an instance
/// in the supplied [`InstanceCache`].
pub trait Factory {
    /// What a created record is represented by.
    type Instance: Clone;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Which fields of `class_name` hold references.
    fn get_relationships(&self, class_name: &str) -> Relationships;

    /// Last-chance coercion of raw values before creation.
    fn maybe_convert_values(
        &mut self,
        identifier: &Reference,
        data: RawRecordData,
    ) -> Result<RawRecordData, Self::Error> {
        let _ = identifier;
        Ok(data)
    }

    /// Creates the record, or updates it if it already exists.
    ///
    /// Returns the instance and whether it was newly created. Calling this
    /// again for the same identifier must not duplicate the record.
    fn create_or_update(
        &mut self,
        identifier: &Reference,
        data: &RawRecordData,
        instances: &InstanceCache<Self::Instance>,
    ) -> Result<(Self::Instance, bool), Self::Error>;

    /// Makes everything created so far durable.
    fn commit(&mut self) -> Result<(), Self::Error>;
}
