//! Instances created during a session, keyed by [`Reference`].

use std::collections::HashMap;

use crate::identifier::{RawRecordData, Reference};

/// Created instances plus the data each was created from.
///
/// The data is kept so a reference can be resolved again later with the
/// same input, e.g. by [`convert_identifiers`](super::FixturesLoader::convert_identifiers).
#[derive(Debug, Clone)]
pub struct InstanceCache<I> {
    instances: HashMap<Reference, I>,
    data: HashMap<Reference, RawRecordData>,
}

impl<I> Default for InstanceCache<I> {
    fn default() -> Self {
        Self {
            instances: HashMap::new(),
            data: HashMap::new(),
        }
    }
}

impl<I> InstanceCache<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reference: &Reference) -> Option<&I> {
        self.instances.get(reference)
    }

    /// Instances for every reference, or the first one not created yet.
    pub fn get_all<'a>(&self, references: &'a [Reference]) -> Result<Vec<&I>, &'a Reference> {
        references
            .iter()
            .map(|reference| self.instances.get(reference).ok_or(reference))
            .collect()
    }

    /// Data the instance for `reference` was created from.
    pub fn data(&self, reference: &Reference) -> Option<&RawRecordData> {
        self.data.get(reference)
    }

    pub fn contains(&self, reference: &Reference) -> bool {
        self.instances.contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Reference, &I)> {
        self.instances.iter()
    }

    pub(crate) fn insert_data(&mut self, reference: Reference, data: RawRecordData) {
        self.data.insert(reference, data);
    }

    pub(crate) fn insert_instance(&mut self, reference: Reference, instance: I) {
        self.instances.insert(reference, instance);
    }
}
