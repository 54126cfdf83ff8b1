//! References between fixture records and the field values that carry them.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::FixtureError;

/// Identity of a fixture record that may not exist yet.
///
/// Displays as `class_name(key)`, the same form templates may use to write
/// an explicit reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    pub class_name: String,
    pub key: String,
}

impl Reference {
    pub fn new(class_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.class_name, self.key)
    }
}

/// A single field of a fixture record after reference normalization.
///
/// The scalar/list split of reference fields is significant: factories read
/// `Reference` as a to-one association and `References` as to-many.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Plain data, passed through untouched.
    Literal(serde_json::Value),
    /// To-one reference; `None` when the template left the field empty.
    Reference(Option<Reference>),
    /// To-many reference, possibly empty or holding a single element.
    References(Vec<Reference>),
}

impl FieldValue {
    /// All references held by this field, in declaration order.
    pub fn references(&self) -> &[Reference] {
        match self {
            Self::Literal(_) | Self::Reference(None) => &[],
            Self::Reference(Some(reference)) => std::slice::from_ref(reference),
            Self::References(references) => references,
        }
    }

    pub fn as_literal(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Literal(value) => Some(value),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Literal(value)
    }
}

/// Field name to value, in the order the template declared them.
pub type RawRecordData = IndexMap<String, FieldValue>;

/// Input to [`FixturesLoader::convert_identifiers`](crate::loader::FixturesLoader::convert_identifiers).
#[derive(Debug, Clone, PartialEq)]
pub enum Identifiers {
    One(Reference),
    Many(Vec<Reference>),
}

impl From<Reference> for Identifiers {
    fn from(reference: Reference) -> Self {
        Self::One(reference)
    }
}

impl From<Vec<Reference>> for Identifiers {
    fn from(references: Vec<Reference>) -> Self {
        Self::Many(references)
    }
}

impl TryFrom<&FieldValue> for Identifiers {
    type Error = FixtureError;

    fn try_from(value: &FieldValue) -> Result<Self, Self::Error> {
        match value {
            FieldValue::Reference(Some(reference)) => Ok(Self::One(reference.clone())),
            FieldValue::References(references) => Ok(Self::Many(references.clone())),
            FieldValue::Reference(None) => Err(FixtureError::InvalidIdentifiers(
                "expected a Reference or list of References, got an empty reference".to_string(),
            )),
            FieldValue::Literal(value) => Err(FixtureError::InvalidIdentifiers(format!(
                "expected a Reference or list of References, got `{value}`"
            ))),
        }
    }
}

/// Output of [`FixturesLoader::convert_identifiers`](crate::loader::FixturesLoader::convert_identifiers),
/// shaped like its input.
#[derive(Debug, Clone, PartialEq)]
pub enum Instances<I> {
    One(I),
    Many(Vec<I>),
}

impl<I> Instances<I> {
    pub fn into_vec(self) -> Vec<I> {
        match self {
            Self::One(instance) => vec![instance],
            Self::Many(instances) => instances,
        }
    }

    pub fn one(self) -> Option<I> {
        match self {
            Self::One(instance) => Some(instance),
            Self::Many(_) => None,
        }
    }
}
